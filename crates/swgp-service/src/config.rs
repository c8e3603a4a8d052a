// ============================================
// File: crates/swgp-service/src/config.rs
// ============================================
//! # Relay Configuration
//!
//! ## Creation Reason
//! Turns a TOML file into the role descriptors the manager runs.
//!
//! ## Main Functionality
//! - `Config`: top-level configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - Conversion into `RoleDescriptor`s and a `Manager`
//!
//! ## Configuration Sections
//! - `logging`: Log level
//! - `limits`: Session timeout, sweep interval, session limit
//! - `servers`: Server role instances
//! - `clients`: Client role instances
//!
//! ## Example Configuration
//! ```toml
//! [logging]
//! level = "info"
//!
//! [limits]
//! session_timeout = 180
//! cleanup_interval = 30
//! max_sessions = 4096
//!
//! [[servers]]
//! name = "wg0"
//! proxy_listen = ":20220"
//! proxy_mode = "zero-overhead"
//! proxy_psk = "sAe5RvzLJ3Q0Ll88QRM1N01dYk83Q4y0rXMP1i4rDmI="
//! wg_endpoint = "[::1]:51820"
//!
//! [[clients]]
//! name = "wg0"
//! wg_listen = ":20222"
//! proxy_endpoint = "[2001:db8:1f74:3c86:aef9:a75:5d2a:425e]:20220"
//! proxy_mode = "paranoid"
//! proxy_psk = "sAe5RvzLJ3Q0Ll88QRM1N01dYk83Q4y0rXMP1i4rDmI="
//! mtu = 1500
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Listen addresses may omit the host (`":20220"`); that means `[::]`,
//!   which is dual-stack
//! - Config changes require restart (no hot-reload)
//! - Never log a PSK
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::collections::HashSet;
use std::net::{Ipv6Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use swgp_core::{ProxyMode, Psk};

use crate::error::{Result, ServiceError};
use crate::manager::Manager;
use crate::role::{Role, RoleDescriptor, DEFAULT_MTU};

// ============================================
// Config
// ============================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Session limits shared by every instance.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Server role instances.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    /// Client role instances.
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
}

impl Config {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    /// `ConfigLoad` if the file cannot be read or parsed, `ConfigInvalid`
    /// if validation fails.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServiceError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ServiceError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!(
            servers = config.servers.len(),
            clients = config.clients.len(),
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    /// Validates every section and every instance.
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;

        if self.servers.is_empty() && self.clients.is_empty() {
            return Err(ServiceError::config_invalid(
                "servers/clients",
                "at least one server or client is required",
            ));
        }

        let server_names = self.servers.iter().map(|s| s.name.as_str());
        check_unique_names(Role::Server, server_names)?;
        let client_names = self.clients.iter().map(|c| c.name.as_str());
        check_unique_names(Role::Client, client_names)?;

        for descriptor in self.role_descriptors() {
            descriptor.validate()?;
        }

        Ok(())
    }

    /// Builds one descriptor per configured instance, servers first.
    #[must_use]
    pub fn role_descriptors(&self) -> Vec<RoleDescriptor> {
        let servers = self.servers.iter().map(|s| {
            RoleDescriptor::new(
                s.name.clone(),
                Role::Server,
                s.proxy_listen,
                s.wg_endpoint,
                s.proxy_mode,
                s.proxy_psk.clone(),
            )
            .with_mtu(s.mtu)
        });

        let clients = self.clients.iter().map(|c| {
            RoleDescriptor::new(
                c.name.clone(),
                Role::Client,
                c.wg_listen,
                c.proxy_endpoint,
                c.proxy_mode,
                c.proxy_psk.clone(),
            )
            .with_mtu(c.mtu)
        });

        servers
            .chain(clients)
            .map(|d| self.limits.apply(d))
            .collect()
    }

    /// Validates the configuration and builds a manager for it.
    ///
    /// # Errors
    /// Returns the validation error, if any.
    pub fn manager(&self) -> Result<Manager> {
        self.validate()?;
        Manager::new(self.role_descriptors())
    }
}

impl FromStr for Config {
    type Err = ServiceError;

    /// Parses configuration from a TOML string without validating it.
    fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ServiceError::config_load("<string>", e.to_string()))
    }
}

fn check_unique_names<'a>(role: Role, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ServiceError::config_invalid(
                format!("{role}s.name"),
                format!("duplicate name '{name}'"),
            ));
        }
    }
    Ok(())
}

// ============================================
// Instance Sections
// ============================================

/// One server role instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Instance name.
    pub name: String,

    /// Address receiving obfuscated traffic.
    #[serde(deserialize_with = "deserialize_listen_addr")]
    pub proxy_listen: SocketAddr,

    /// Obfuscation mode.
    pub proxy_mode: ProxyMode,

    /// Shared secret, base64.
    pub proxy_psk: Psk,

    /// Local WireGuard endpoint.
    pub wg_endpoint: SocketAddr,

    /// Path MTU.
    #[serde(default = "default_mtu")]
    pub mtu: usize,
}

/// One client role instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Instance name.
    pub name: String,

    /// Address the local WireGuard sends to.
    #[serde(deserialize_with = "deserialize_listen_addr")]
    pub wg_listen: SocketAddr,

    /// Remote server role endpoint.
    pub proxy_endpoint: SocketAddr,

    /// Obfuscation mode.
    pub proxy_mode: ProxyMode,

    /// Shared secret, base64.
    pub proxy_psk: Psk,

    /// Path MTU.
    #[serde(default = "default_mtu")]
    pub mtu: usize,
}

fn default_mtu() -> usize {
    DEFAULT_MTU
}

/// Parses a listen address, accepting `":port"` for all interfaces.
fn parse_listen_addr(s: &str) -> Option<SocketAddr> {
    match s.strip_prefix(':') {
        Some(port) => port
            .parse::<u16>()
            .ok()
            .map(|port| SocketAddr::from((Ipv6Addr::UNSPECIFIED, port))),
        None => s.parse().ok(),
    }
}

fn deserialize_listen_addr<'de, D>(deserializer: D) -> std::result::Result<SocketAddr, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_listen_addr(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid listen address '{s}'")))
}

// ============================================
// Limits
// ============================================

/// Session limits applied to every instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Idle seconds before a session is swept.
    #[serde(default = "default_session_timeout")]
    pub session_timeout: u64,

    /// Seconds between sweeps.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,

    /// Maximum sessions per instance.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_session_timeout() -> u64 {
    180
}

fn default_cleanup_interval() -> u64 {
    30
}

fn default_max_sessions() -> usize {
    4096
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.session_timeout == 0 {
            return Err(ServiceError::config_invalid(
                "limits.session_timeout",
                "must be greater than 0",
            ));
        }
        if self.cleanup_interval == 0 {
            return Err(ServiceError::config_invalid(
                "limits.cleanup_interval",
                "must be greater than 0",
            ));
        }
        if self.max_sessions == 0 {
            return Err(ServiceError::config_invalid(
                "limits.max_sessions",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    fn apply(&self, descriptor: RoleDescriptor) -> RoleDescriptor {
        descriptor
            .with_session_timeout(Duration::from_secs(self.session_timeout))
            .with_cleanup_interval(Duration::from_secs(self.cleanup_interval))
            .with_max_sessions(self.max_sessions)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            session_timeout: default_session_timeout(),
            cleanup_interval: default_cleanup_interval(),
            max_sessions: default_max_sessions(),
        }
    }
}

// ============================================
// Logging
// ============================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    const PSK: &str = "sAe5RvzLJ3Q0Ll88QRM1N01dYk83Q4y0rXMP1i4rDmI=";

    fn sample() -> String {
        format!(
            r#"
[logging]
level = "debug"

[limits]
session_timeout = 60

[[servers]]
name = "wg0"
proxy_listen = ":20220"
proxy_mode = "zero-overhead"
proxy_psk = "{PSK}"
wg_endpoint = "[::1]:51820"

[[clients]]
name = "wg0"
wg_listen = "127.0.0.1:20222"
proxy_endpoint = "[2001:db8::1]:20220"
proxy_mode = "paranoid"
proxy_psk = "{PSK}"
mtu = 1280
"#
        )
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = sample().parse().unwrap();
        config.validate().unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.limits.session_timeout, 60);
        assert_eq!(config.limits.cleanup_interval, 30);
        assert_eq!(config.limits.max_sessions, 4096);

        let server = &config.servers[0];
        assert_eq!(server.proxy_listen, "[::]:20220".parse().unwrap());
        assert_eq!(server.proxy_mode, ProxyMode::ZeroOverhead);
        assert_eq!(server.mtu, DEFAULT_MTU);

        let client = &config.clients[0];
        assert_eq!(client.proxy_mode, ProxyMode::Paranoid);
        assert_eq!(client.mtu, 1280);
    }

    #[test]
    fn test_role_descriptors() {
        let config: Config = sample().parse().unwrap();
        let descriptors = config.role_descriptors();

        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].id().to_string(), "server/wg0");
        assert_eq!(descriptors[0].forward_to, "[::1]:51820".parse().unwrap());
        assert_eq!(descriptors[0].session_timeout, Duration::from_secs(60));
        assert_eq!(descriptors[1].id().to_string(), "client/wg0");
        assert_eq!(descriptors[1].listen, "127.0.0.1:20222".parse().unwrap());
        assert_eq!(descriptors[1].mtu, 1280);
        assert_eq!(descriptors[0].psk, descriptors[1].psk);
    }

    #[test]
    fn test_empty_config_rejected() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config: Config = sample().parse().unwrap();
        let dup = config.servers[0].clone();
        config.servers.push(dup);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate name 'wg0'"));
    }

    #[test]
    fn test_bad_values_rejected() {
        let bad_psk = sample().replace(PSK, "c2hvcnQ=");
        assert!(bad_psk.parse::<Config>().is_err());

        let bad_mode = sample().replace("\"paranoid\"", "\"turbo\"");
        assert!(bad_mode.parse::<Config>().is_err());

        let bad_listen = sample().replace("\":20220\"", "\":http\"");
        assert!(bad_listen.parse::<Config>().is_err());

        let mut config: Config = sample().parse().unwrap();
        config.clients[0].mtu = 100;
        assert!(config.validate().is_err());

        let mut config: Config = sample().parse().unwrap();
        config.limits.max_sessions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_listen_addr() {
        assert_eq!(
            parse_listen_addr(":20220"),
            Some("[::]:20220".parse().unwrap())
        );
        assert_eq!(
            parse_listen_addr("0.0.0.0:1"),
            Some("0.0.0.0:1".parse().unwrap())
        );
        assert_eq!(parse_listen_addr("localhost:1"), None);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = Config::load("/nonexistent/swgp.toml").await.unwrap_err();
        assert!(matches!(err, ServiceError::ConfigLoad { .. }));
    }
}
