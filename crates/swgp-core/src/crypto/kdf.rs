// ============================================
// File: crates/swgp-core/src/crypto/kdf.rs
// ============================================
//! # Key Derivation Functions
//!
//! ## Creation Reason
//! Each obfuscation mode gets its own key from the shared PSK.
//!
//! ## Main Functionality
//! - `derive_key`: HKDF-SHA256 expansion of the PSK under a mode label
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use hkdf::Hkdf;
use sha2::Sha256;

use super::{Psk, DERIVED_KEY_SIZE, HKDF_SALT};
use crate::error::{CoreError, Result};

// ============================================
// Key Derivation
// ============================================

/// Derives a 32-byte key from the PSK.
///
/// # Arguments
/// * `psk` - Pre-shared key (input keying material)
/// * `info` - Label that binds the output to one use
///
/// # Derivation
/// ```text
/// key = HKDF-SHA256(ikm: psk, salt: "swgp-v1", info: label)
/// ```
///
/// The caller owns the returned bytes and must zeroize them once the
/// cipher or MAC has been keyed.
pub fn derive_key(psk: &Psk, info: &[u8]) -> Result<[u8; DERIVED_KEY_SIZE]> {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), psk.as_bytes());

    let mut key = [0u8; DERIVED_KEY_SIZE];
    hk.expand(info, &mut key)
        .map_err(|_| CoreError::key_derivation("HKDF expansion failed"))?;

    Ok(key)
}

// ============================================
// Tests
// ============================================
