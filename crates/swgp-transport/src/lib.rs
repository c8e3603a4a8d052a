// ============================================
// File: crates/swgp-transport/src/lib.rs
// ============================================
//! # swgp Transport - Network I/O Layer
//!
//! ## Creation Reason
//! Provides the datagram transport used by the relay: one listening socket
//! per relay instance and one forwarding socket per session.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: Transport trait definitions for abstraction
//! - [`udp`]: UDP socket implementation
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               swgp-service                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │     swgp-core          swgp-transport               │
//! │                        You are here ◄──             │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │              swgp-common                            │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Socket Layout
//! ```text
//!   peers ──► [listening socket] ──► relay ──► [session socket] ──► target
//!   peers ◄── [listening socket] ◄── relay ◄── [session socket] ◄── target
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Sockets are built with socket2 and handed to Tokio; keep option
//!   tweaks in `udp.rs`
//! - No SO_REUSEADDR: a second relay on the same port must fail to bind
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod traits;
pub mod udp;

// Re-export primary types
pub use error::{Result, TransportError};
pub use traits::{PacketSource, Transport};
pub use udp::UdpTransport;
