// ============================================
// File: crates/swgp-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types specific to socket operations.
//!
//! ## Error Categories
//! 1. **Setup Errors**: bind failures, bad addresses
//! 2. **Network Errors**: UDP send/receive failures
//! 3. **Lifecycle Errors**: operations on a closed transport
//!
//! ## ⚠️ Important Note for Next Developer
//! - Send/receive errors on UDP are usually transient; the relay logs and
//!   carries on
//! - `ShuttingDown` is the only error that means "this socket is gone"
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use swgp_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Setup Errors
    // ========================================

    /// Failed to bind to address.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind to
        addr: SocketAddr,
        /// Why binding failed
        reason: String,
    },

    /// Address already in use.
    #[error("Address {addr} already in use")]
    AddressInUse {
        /// The address that's in use
        addr: SocketAddr,
    },

    /// Address string could not be parsed.
    #[error("Invalid socket address: {addr}")]
    InvalidAddress {
        /// The invalid address string
        addr: String,
    },

    // ========================================
    // Network Errors
    // ========================================

    /// Send operation failed.
    #[error("Failed to send to {dest}: {reason}")]
    SendFailed {
        /// Destination address
        dest: SocketAddr,
        /// Why send failed
        reason: String,
    },

    /// Socket send buffer is full; the datagram was not sent.
    #[error("Send buffer full for {dest}")]
    WouldBlock {
        /// Destination address
        dest: SocketAddr,
    },

    /// Receive operation failed.
    #[error("Failed to receive: {reason}")]
    ReceiveFailed {
        /// Why receive failed
        reason: String,
    },

    // ========================================
    // Lifecycle Errors
    // ========================================

    /// Transport has been closed.
    #[error("Transport is shutting down")]
    ShuttingDown,

    // ========================================
    // Wrapped Errors
    // ========================================

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            Self::SendFailed { .. } | Self::ReceiveFailed { .. } | Self::WouldBlock { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the transport is closed for good.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::ShuttingDown)
    }

    /// Returns `true` if binding the socket failed.
    #[must_use]
    pub const fn is_bind_error(&self) -> bool {
        matches!(
            self,
            Self::BindFailed { .. } | Self::AddressInUse { .. } | Self::InvalidAddress { .. }
        )
    }

    /// Returns `true` if this is a network-related error.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::BindFailed { .. }
                | Self::SendFailed { .. }
                | Self::ReceiveFailed { .. }
                | Self::AddressInUse { .. }
        )
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::bind_failed("127.0.0.1:20220".parse().unwrap(), "denied");
        assert!(err.to_string().contains("127.0.0.1:20220"));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_classification() {
        let send_err = TransportError::SendFailed {
            dest: "127.0.0.1:51820".parse().unwrap(),
            reason: "no buffer space".into(),
        };
        assert!(send_err.is_network_error());
        assert!(send_err.is_retryable());
        assert!(!send_err.is_closed());

        let full = TransportError::WouldBlock {
            dest: "127.0.0.1:51820".parse().unwrap(),
        };
        assert!(full.is_retryable());
        assert!(!full.is_closed());

        assert!(TransportError::ShuttingDown.is_closed());
        assert!(!TransportError::ShuttingDown.is_retryable());

        let in_use = TransportError::AddressInUse {
            addr: "[::]:20220".parse().unwrap(),
        };
        assert!(in_use.is_bind_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::WouldBlock, "would block");
        let transport_err: TransportError = io_err.into();
        assert!(transport_err.is_retryable());
    }
}
