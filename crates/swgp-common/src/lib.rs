// ============================================
// File: crates/swgp-common/src/lib.rs
// ============================================
//! # swgp Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Provides foundational types and utilities shared across all swgp crates,
//! so the codec, transport and relay layers agree on identifiers, sizes and
//! timestamps.
//!
//! ## Main Functionality
//! - [`types`]: Session identifiers and datagram size constants
//! - [`time`]: Atomic timestamps for lock-free activity tracking
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               swgp-service                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │     swgp-core          swgp-transport               │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │              swgp-common  ◄── You are here          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use time::AtomicInstant;
pub use types::{SessionId, MAX_DATAGRAM_SIZE};
