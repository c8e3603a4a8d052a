// ============================================
// File: crates/swgp-service/src/lib.rs
// ============================================
//! # swgp Service Library
//!
//! ## Creation Reason
//! Runs WireGuard obfuscation relays: server roles that turn obfuscated
//! traffic back into WireGuard datagrams, and client roles that do the
//! reverse, any number of each in one process.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: TOML configuration
//! - [`role`]: roles, transforms and finalized per-instance settings
//! - [`relay`]: one relay instance and its sessions
//! - [`manager`]: all-or-nothing start and stop of every instance
//! - [`error`]: service error types
//!
//! ## Architecture Overview
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Manager                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────┐      ┌───────────────────────┐    │
//! │  │ RelayInstance         │      │ RelayInstance         │    │
//! │  │ server/wg0            │ ...  │ client/wg0            │    │
//! │  │  codec + SessionTable │      │  codec + SessionTable │    │
//! │  └───────────┬───────────┘      └───────────┬───────────┘    │
//! ├──────────────┼──────────────────────────────┼────────────────┤
//! │              ▼        UDP Transport         ▼                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! WireGuard → client (encode) → network → server (decode) → WireGuard
//! WireGuard ← client (decode) ← network ← server (encode) ← WireGuard
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Configuration changes require restart (no hot-reload)
//! - Both ends of a pair must share mode and PSK; a mismatch shows up only
//!   as silently dropped datagrams
//!
//! ## Last Modified
//! v0.1.0 - Initial service library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod manager;
pub mod relay;
pub mod role;

// Re-export primary types
pub use config::Config;
pub use error::{Result, ServiceError};
pub use manager::Manager;
pub use relay::{RelayInstance, RelayState};
pub use role::{InstanceId, Role, RoleDescriptor};
