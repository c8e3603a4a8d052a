// ============================================
// File: crates/swgp-core/src/crypto/keys.rs
// ============================================
//! # Pre-Shared Key
//!
//! ## Creation Reason
//! Both ends of a relay pair share one secret. This module gives it a type
//! with the security properties key material needs.
//!
//! ## Main Functionality
//! - `Psk`: 32-byte key, zeroized on drop, redacted in `Debug`
//! - Base64 parsing and serde support for config files
//! - Constant-time comparison
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Psk` deliberately has no `Display`; use `to_base64()` explicitly
//!   when the key has to be shown (only `swgp genpsk` does)
//!
//! ## Last Modified
//! v0.1.0 - Initial key types

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use swgp_common::error::CommonError;

use crate::error::{CoreError, Result};

/// Size of the pre-shared key in bytes.
pub const PSK_SIZE: usize = 32;

// ============================================
// Psk
// ============================================

/// Pre-shared key for a relay pair.
///
/// # Example
/// ```
/// use swgp_core::crypto::Psk;
///
/// let psk = Psk::generate();
/// let parsed: Psk = psk.to_base64().parse().unwrap();
/// assert_eq!(psk, parsed);
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Psk([u8; PSK_SIZE]);

impl Psk {
    /// Generates a fresh random key from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; PSK_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    /// Returns `InvalidKeyLength` unless `bytes` is exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; PSK_SIZE] = bytes.try_into().map_err(|_| CoreError::InvalidKeyLength {
            expected: PSK_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    /// Parses a standard base64 string.
    ///
    /// # Errors
    /// Returns an error if the string is not base64 or does not decode to
    /// exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            BASE64
                .decode(encoded.trim())
                .map_err(CommonError::from)?,
        );
        Self::from_bytes(&decoded)
    }

    /// Encodes the key as standard base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Returns the raw key bytes.
    ///
    /// # Security Warning
    /// Only the key derivation should need this.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; PSK_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Psk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material
        write!(f, "Psk([REDACTED])")
    }
}

impl PartialEq for Psk {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Psk {}

impl FromStr for Psk {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base64(s)
    }
}

impl Serialize for Psk {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Psk {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Zeroizing::new(String::deserialize(deserializer)?);
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_random() {
        assert_ne!(Psk::generate(), Psk::generate());
    }

    #[test]
    fn test_base64_roundtrip() {
        let psk = Psk::from_bytes(&[0xAB; PSK_SIZE]).unwrap();
        let encoded = psk.to_base64();
        assert_eq!(encoded.len(), 44);
        assert_eq!(Psk::from_base64(&encoded).unwrap(), psk);
    }

    #[test]
    fn test_rejects_wrong_length() {
        // 16 bytes of base64
        let err = Psk::from_base64("AAAAAAAAAAAAAAAAAAAAAA==").unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidKeyLength {
                expected: 32,
                actual: 16
            }
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        let err = Psk::from_base64("definitely not a key").unwrap_err();
        assert!(matches!(err, CoreError::Common(CommonError::Decoding { .. })));
    }

    #[test]
    fn test_debug_is_redacted() {
        let psk = Psk::from_bytes(&[0x41; PSK_SIZE]).unwrap();
        let debug = format!("{psk:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&psk.to_base64()));
    }

    #[test]
    fn test_serde_as_base64_string() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            psk: Psk,
        }

        let psk = Psk::generate();
        let text = toml::to_string(&Wrapper { psk: psk.clone() }).unwrap();
        assert!(text.contains(&psk.to_base64()));

        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.psk, psk);
    }
}
