// ============================================
// File: crates/swgp-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types for key handling and for the obfuscation codecs.
//!
//! ## Error Categories
//! 1. **Key Errors**: PSK parsing, key derivation
//! 2. **Transform Errors**: authentication failure, malformed or truncated
//!    datagrams. These are per-datagram and never fatal to a relay
//! 3. **Buffer Errors**: caller handed in an output buffer that is too small
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material in error messages
//! - Errors are logged per datagram at debug level; keep them short
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use swgp_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for key handling and packet transforms.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Key Errors
    // ========================================

    /// Key material has the wrong size.
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required length
        expected: usize,
        /// Length supplied
        actual: usize,
    },

    /// Key derivation failed.
    #[error("Key derivation failed: {reason}")]
    KeyDerivation {
        /// Why derivation failed
        reason: String,
    },

    /// Obfuscation mode name is not recognised.
    #[error("Unknown proxy mode: '{0}' (expected 'zero-overhead' or 'paranoid')")]
    UnknownMode(String),

    // ========================================
    // Transform Errors
    // ========================================

    /// Authentication tag did not verify (tampered datagram or wrong PSK).
    #[error("Authentication failed")]
    Authentication,

    /// Datagram is too short to be valid.
    #[error("Message too short: expected at least {expected} bytes, got {actual}")]
    MessageTooShort {
        /// Minimum expected length
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// Datagram exceeds what the codec can carry.
    #[error("Message too large: max {max} bytes, got {actual}")]
    MessageTooLarge {
        /// Maximum allowed size
        max: usize,
        /// Actual size received
        actual: usize,
    },

    /// Datagram authenticated but its contents are inconsistent.
    #[error("Malformed message: {reason}")]
    MalformedMessage {
        /// What's wrong with the message
        reason: String,
    },

    // ========================================
    // Buffer Errors
    // ========================================

    /// Output buffer cannot hold the result.
    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    /// Creates a `MalformedMessage` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Creates a `KeyDerivation` error.
    pub fn key_derivation(reason: impl Into<String>) -> Self {
        Self::KeyDerivation {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error concerns a single datagram.
    ///
    /// Transform errors mean "drop this datagram and carry on".
    #[must_use]
    pub const fn is_transform_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication
                | Self::MessageTooShort { .. }
                | Self::MessageTooLarge { .. }
                | Self::MalformedMessage { .. }
        )
    }

    /// Returns `true` if this error concerns key material or configuration.
    #[must_use]
    pub const fn is_key_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidKeyLength { .. } | Self::KeyDerivation { .. } | Self::UnknownMode(_)
        )
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(CoreError::Authentication.is_transform_error());
        assert!(CoreError::malformed("bad length").is_transform_error());
        assert!(!CoreError::Authentication.is_key_error());

        let key_err = CoreError::InvalidKeyLength {
            expected: 32,
            actual: 16,
        };
        assert!(key_err.is_key_error());
        assert!(!key_err.is_transform_error());
    }

    #[test]
    fn test_error_display_hides_nothing_sensitive() {
        let err = CoreError::UnknownMode("stealth".into());
        assert!(err.to_string().contains("stealth"));
        assert!(err.to_string().contains("zero-overhead"));
    }
}
