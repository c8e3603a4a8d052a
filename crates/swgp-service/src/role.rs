// ============================================
// File: crates/swgp-service/src/role.rs
// ============================================
//! # Relay Roles
//!
//! ## Creation Reason
//! The server and client roles run the same relay engine. They only differ
//! in which direction decodes and which encodes, and in what their listen
//! and forward-to addresses point at.
//!
//! ## Main Functionality
//! - `Role`: server or client
//! - `Transform`: encode or decode, applied to one datagram
//! - `RoleDescriptor`: finalized settings for one relay instance
//! - `InstanceId`: `(role, name)`, rendered `server/wg0`
//!
//! ## Direction Table
//! ```text
//!            listen socket ──► forward_to       forward_to ──► listen socket
//! server:        decode                             encode
//! client:        encode                             decode
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial role model

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use swgp_core::{PacketCodec, ProxyMode, Psk};

use crate::error::{Result, ServiceError};

// ============================================
// Constants
// ============================================

/// Smallest accepted MTU (IPv4 minimum reassembly size).
pub const MIN_MTU: usize = 576;

/// Largest accepted MTU.
pub const MAX_MTU: usize = 65535;

/// Default path MTU.
pub const DEFAULT_MTU: usize = 1500;

/// Default idle time before a session is swept.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(180);

/// Default time between idle sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

/// Default session limit per instance.
pub const DEFAULT_MAX_SESSIONS: usize = 4096;

// ============================================
// Role & Transform
// ============================================

/// Which side of a relay pair an instance plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Accepts obfuscated traffic from remote peers, forwards plaintext
    /// to the local WireGuard endpoint.
    Server,
    /// Accepts plaintext from the local WireGuard, forwards obfuscated
    /// traffic to a remote server role.
    Client,
}

impl Role {
    /// Transform applied to datagrams arriving on the listening socket.
    #[must_use]
    pub const fn inbound(self) -> Transform {
        match self {
            Self::Server => Transform::Decode,
            Self::Client => Transform::Encode,
        }
    }

    /// Transform applied to datagrams coming back from the forward-to target.
    #[must_use]
    pub const fn outbound(self) -> Transform {
        match self {
            Self::Server => Transform::Encode,
            Self::Client => Transform::Decode,
        }
    }

    /// Returns the lowercase name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One direction of a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Plaintext to wire.
    Encode,
    /// Wire to plaintext.
    Decode,
}

impl Transform {
    /// Applies the transform to `input`, writing into `output`.
    ///
    /// # Errors
    /// Propagates the codec's per-datagram error.
    pub fn apply(
        self,
        codec: &dyn PacketCodec,
        input: &[u8],
        output: &mut [u8],
    ) -> swgp_core::Result<usize> {
        match self {
            Self::Encode => codec.encode(input, output),
            Self::Decode => codec.decode(input, output),
        }
    }

    /// Returns the verb used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Encode => "encode",
            Self::Decode => "decode",
        }
    }
}

// ============================================
// InstanceId
// ============================================

/// Identity of a relay instance within a manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId {
    /// Role kind.
    pub role: Role,
    /// Configured name.
    pub name: String,
}

impl InstanceId {
    /// Creates an identifier.
    pub fn new(role: Role, name: impl Into<String>) -> Self {
        Self {
            role,
            name: name.into(),
        }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.role, self.name)
    }
}

// ============================================
// RoleDescriptor
// ============================================

/// Finalized settings for one relay instance.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use swgp_core::{ProxyMode, Psk};
/// use swgp_service::role::{Role, RoleDescriptor};
///
/// let descriptor = RoleDescriptor::new(
///     "wg0",
///     Role::Server,
///     "[::]:20220".parse().unwrap(),
///     "[::1]:51820".parse().unwrap(),
///     ProxyMode::Paranoid,
///     Psk::generate(),
/// )
/// .with_session_timeout(Duration::from_secs(60));
///
/// assert_eq!(descriptor.id().to_string(), "server/wg0");
/// assert!(descriptor.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RoleDescriptor {
    /// Instance name, unique per role kind.
    pub name: String,
    /// Server or client.
    pub role: Role,
    /// Address of the listening socket.
    pub listen: SocketAddr,
    /// Where transformed datagrams are forwarded.
    pub forward_to: SocketAddr,
    /// Obfuscation mode.
    pub mode: ProxyMode,
    /// Shared secret.
    pub psk: Psk,
    /// Path MTU (sizes the paranoid padding budget).
    pub mtu: usize,
    /// Idle time after which a session is swept.
    pub session_timeout: Duration,
    /// Time between idle sweeps.
    pub cleanup_interval: Duration,
    /// Maximum concurrent sessions.
    pub max_sessions: usize,
}

impl RoleDescriptor {
    /// Creates a descriptor with default MTU and limits.
    pub fn new(
        name: impl Into<String>,
        role: Role,
        listen: SocketAddr,
        forward_to: SocketAddr,
        mode: ProxyMode,
        psk: Psk,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            listen,
            forward_to,
            mode,
            psk,
            mtu: DEFAULT_MTU,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    /// Sets the MTU.
    #[must_use]
    pub const fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub const fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Sets the sweep interval.
    #[must_use]
    pub const fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Sets the session limit.
    #[must_use]
    pub const fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Returns the instance identity.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        InstanceId::new(self.role, self.name.clone())
    }

    /// Validates the descriptor.
    ///
    /// A listen port of 0 is allowed (ephemeral port); a forward-to port of
    /// 0 is not.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let id = self.id();

        if self.name.trim().is_empty() {
            return Err(ServiceError::config_invalid(
                format!("{}.name", self.role),
                "cannot be empty",
            ));
        }

        if self.forward_to.port() == 0 {
            return Err(ServiceError::config_invalid(
                format!("{id}.forward_to"),
                "port cannot be 0",
            ));
        }

        if !(MIN_MTU..=MAX_MTU).contains(&self.mtu) {
            return Err(ServiceError::config_invalid(
                format!("{id}.mtu"),
                format!("must be within [{MIN_MTU}, {MAX_MTU}], got {}", self.mtu),
            ));
        }

        if self.session_timeout.is_zero() {
            return Err(ServiceError::config_invalid(
                format!("{id}.session_timeout"),
                "must be greater than 0",
            ));
        }

        if self.cleanup_interval.is_zero() {
            return Err(ServiceError::config_invalid(
                format!("{id}.cleanup_interval"),
                "must be greater than 0",
            ));
        }

        if self.max_sessions == 0 {
            return Err(ServiceError::config_invalid(
                format!("{id}.max_sessions"),
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(role: Role) -> RoleDescriptor {
        RoleDescriptor::new(
            "wg0",
            role,
            "127.0.0.1:0".parse().unwrap(),
            "127.0.0.1:51820".parse().unwrap(),
            ProxyMode::ZeroOverhead,
            Psk::generate(),
        )
    }

    #[test]
    fn test_directions_are_mirrored() {
        assert_eq!(Role::Server.inbound(), Transform::Decode);
        assert_eq!(Role::Server.outbound(), Transform::Encode);
        assert_eq!(Role::Client.inbound(), Transform::Encode);
        assert_eq!(Role::Client.outbound(), Transform::Decode);
    }

    #[test]
    fn test_instance_id_display() {
        assert_eq!(descriptor(Role::Server).id().to_string(), "server/wg0");
        assert_eq!(descriptor(Role::Client).id().to_string(), "client/wg0");
        assert_ne!(descriptor(Role::Server).id(), descriptor(Role::Client).id());
    }

    #[test]
    fn test_defaults_validate() {
        let d = descriptor(Role::Client);
        assert_eq!(d.mtu, DEFAULT_MTU);
        assert_eq!(d.session_timeout, DEFAULT_SESSION_TIMEOUT);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_fields() {
        let mut d = descriptor(Role::Server);
        d.name = String::new();
        assert!(d.validate().unwrap_err().is_config_error());

        let mut d = descriptor(Role::Server);
        d.forward_to = "127.0.0.1:0".parse().unwrap();
        let err = d.validate().unwrap_err();
        assert!(err.to_string().contains("server/wg0.forward_to"));

        assert!(descriptor(Role::Server).with_mtu(575).validate().is_err());
        assert!(descriptor(Role::Server).with_mtu(65536).validate().is_err());
        assert!(descriptor(Role::Server).with_mtu(576).validate().is_ok());
        assert!(descriptor(Role::Server).with_max_sessions(0).validate().is_err());
        assert!(descriptor(Role::Server)
            .with_session_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(descriptor(Role::Server)
            .with_cleanup_interval(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_transform_apply_roundtrip() {
        let psk = Psk::generate();
        let codec = swgp_core::new_codec(ProxyMode::Paranoid, &psk, DEFAULT_MTU).unwrap();

        let mut wire = vec![0u8; 148 + codec.max_overhead()];
        let n = Role::Client
            .inbound()
            .apply(codec.as_ref(), &[3u8; 148], &mut wire)
            .unwrap();

        let mut plain = vec![0u8; n];
        let m = Role::Server
            .inbound()
            .apply(codec.as_ref(), &wire[..n], &mut plain)
            .unwrap();
        assert_eq!(&plain[..m], &[3u8; 148][..]);
    }
}
