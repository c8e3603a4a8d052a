// ============================================
// File: crates/swgp-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines the datagram interface the relay is written against.
//!
//! ## Main Functionality
//! - `Transport`: datagram send/receive with explicit shutdown
//! - `PacketSource`: Metadata about received packets
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations must be Send + Sync; a listening socket is shared by
//!   the inbound loop and every session's reader task
//! - Buffer management is caller's responsibility
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::net::SocketAddr;
use std::time::Instant;

use async_trait::async_trait;

use crate::error::Result;

// ============================================
// PacketSource
// ============================================

/// Metadata about the source of a received packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketSource {
    /// Source address (IP and port).
    pub addr: SocketAddr,
    /// When the packet was received.
    pub timestamp: Instant,
}

impl PacketSource {
    /// Creates a new `PacketSource` stamped with the current time.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timestamp: Instant::now(),
        }
    }

    /// Returns the age of this packet (time since received).
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.timestamp.elapsed()
    }
}

// ============================================
// Transport Trait
// ============================================

/// Abstract interface for datagram-based transport.
///
/// # Example
/// ```ignore
/// async fn echo<T: Transport>(transport: &T) -> Result<()> {
///     let mut buf = [0u8; 65535];
///     loop {
///         let (len, source) = transport.recv(&mut buf).await?;
///         transport.send(&buf[..len], &source.addr).await?;
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Receives one datagram.
    ///
    /// # Errors
    /// `ShuttingDown` once the transport is closed, `ReceiveFailed` otherwise.
    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, PacketSource)>;

    /// Sends one datagram to `dest`.
    ///
    /// # Errors
    /// `ShuttingDown` once the transport is closed, `SendFailed` otherwise.
    async fn send(&self, buf: &[u8], dest: &SocketAddr) -> Result<usize>;

    /// Returns the local address this transport is bound to.
    ///
    /// # Errors
    /// Returns error if address cannot be determined
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Closes the transport.
    ///
    /// After shutdown, all operations will return `ShuttingDown`.
    ///
    /// # Errors
    /// Returns error if shutdown fails
    async fn shutdown(&self) -> Result<()>;

    /// Returns `true` if the transport is still active.
    fn is_active(&self) -> bool;
}

// ============================================
// Tests
// ============================================
