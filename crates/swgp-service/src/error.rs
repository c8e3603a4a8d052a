// ============================================
// File: crates/swgp-service/src/error.rs
// ============================================
//! # Service Error Types
//!
//! ## Creation Reason
//! Errors surfaced by configuration, relay lifecycle and the manager.
//!
//! ## Error Categories
//! 1. **Config Errors**: unreadable or invalid configuration
//! 2. **Lifecycle Errors**: bind failures, operations in the wrong state
//! 3. **Session Errors**: limit reached, forwarding socket unavailable.
//!    These drop one datagram and never stop an instance
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only config and lifecycle errors reach the caller of `Manager::start`
//! - Never put a PSK in an error message
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use swgp_common::error::CommonError;
use swgp_core::error::CoreError;
use swgp_transport::error::TransportError;

use crate::relay::RelayState;
use crate::role::InstanceId;

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Service error types.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// Path of the file
        path: String,
        /// Why loading failed
        reason: String,
    },

    /// Configuration parsed but is not usable.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Offending field
        field: String,
        /// What's wrong with it
        reason: String,
    },

    /// Two instances share a role and a name.
    #[error("Duplicate relay instance: {0}")]
    DuplicateInstance(InstanceId),

    /// Listening socket could not be bound.
    #[error("Relay {instance} failed to bind: {source}")]
    Bind {
        /// Instance that failed
        instance: InstanceId,
        /// Transport failure
        #[source]
        source: TransportError,
    },

    /// Lifecycle operation called in the wrong state.
    #[error("Relay {instance} cannot {operation} while {state}")]
    InvalidState {
        /// Instance concerned
        instance: InstanceId,
        /// Current state
        state: RelayState,
        /// Operation attempted
        operation: &'static str,
    },

    /// Manager is already running.
    #[error("Manager is already running")]
    AlreadyRunning,

    /// Too many concurrent sessions.
    #[error("Session limit reached: max {limit} sessions")]
    SessionLimitReached {
        /// Configured limit
        limit: usize,
    },

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Error from the codecs.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from the transport layer.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ServiceError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for configuration problems.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. } | Self::ConfigInvalid { .. } | Self::DuplicateInstance(_)
        )
    }

    /// Returns `true` for errors that only affect one session or datagram.
    #[must_use]
    pub const fn is_session_error(&self) -> bool {
        matches!(self, Self::SessionLimitReached { .. } | Self::Transport(_))
    }

    /// Returns `true` if startup cannot proceed.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. }
                | Self::ConfigInvalid { .. }
                | Self::DuplicateInstance(_)
                | Self::Bind { .. }
        )
    }

    /// Returns `true` if retrying later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::SessionLimitReached { .. } => true,
            _ => false,
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;

    #[test]
    fn test_error_display() {
        let err = ServiceError::config_load("/etc/swgp/config.toml", "file not found");
        assert!(err.to_string().contains("/etc/swgp/config.toml"));

        let err = ServiceError::DuplicateInstance(InstanceId::new(Role::Client, "wg0"));
        assert_eq!(err.to_string(), "Duplicate relay instance: client/wg0");
    }

    #[test]
    fn test_error_classification() {
        let config_err = ServiceError::config_invalid("server/wg0.mtu", "too small");
        assert!(config_err.is_config_error());
        assert!(config_err.is_fatal());

        let bind_err = ServiceError::Bind {
            instance: InstanceId::new(Role::Server, "wg0"),
            source: TransportError::AddressInUse {
                addr: "127.0.0.1:20220".parse().unwrap(),
            },
        };
        assert!(bind_err.is_fatal());
        assert!(!bind_err.is_config_error());
        assert!(bind_err.to_string().contains("server/wg0"));

        let limit = ServiceError::SessionLimitReached { limit: 4 };
        assert!(limit.is_session_error());
        assert!(limit.is_retryable());
        assert!(!limit.is_fatal());
    }
}
