// ============================================
// File: crates/swgp-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes small types shared by the transport and relay layers.
//!
//! ## Main Functionality
//! - `SessionId`: Process-unique identifier for relay sessions (log correlation)
//! - Datagram size constants used to size receive and transform buffers
//!
//! ## ⚠️ Important Note for Next Developer
//! - `SessionId` is NOT a secret and never goes on the wire
//! - Sessions are keyed by peer address; the id only tells apart two
//!   generations of the same peer in the logs
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================
// Constants
// ============================================

/// Largest UDP payload a socket can hand us (IPv4 and IPv6 without jumbograms).
///
/// Receive buffers are always this large so that datagrams exceeding the
/// configured MTU are relayed intact instead of being truncated.
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Size of an IPv6 header plus a UDP header.
///
/// Subtracted from the MTU to get the largest datagram that fits a path
/// without fragmentation, whatever the address family.
pub const IPV6_UDP_HEADER_SIZE: usize = 40 + 8;

// ============================================
// SessionId
// ============================================

/// Identifier for a relay session.
///
/// # Example
/// ```
/// use swgp_common::types::SessionId;
///
/// let a = SessionId::next();
/// let b = SessionId::next();
/// assert_ne!(a, b);
/// assert!(b.as_u64() > a.as_u64());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocates the next identifier from a process-wide counter.
    #[must_use]
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw value.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_session_id_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..1000).map(|_| SessionId::next()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate session id {id}");
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId::from_u64(42).to_string(), "#42");
    }

    #[test]
    fn test_size_constants() {
        assert_eq!(IPV6_UDP_HEADER_SIZE, 48);
        assert!(MAX_DATAGRAM_SIZE > 9000);
    }
}
