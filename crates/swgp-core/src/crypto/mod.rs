// ============================================
// File: crates/swgp-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes key material handling for the obfuscation codecs, using
//! audited RustCrypto implementations.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: The 32-byte pre-shared key (`Psk`)
//! - [`kdf`]: Per-mode key derivation (HKDF-SHA256)
//!
//! ## Key Schedule
//! ```text
//!                  ┌──────────────┐
//!                  │  proxy_psk   │  32 bytes, base64 in config
//!                  └──────┬───────┘
//!                         │ HKDF-SHA256 (salt "swgp-v1")
//!            ┌────────────┴─────────────┐
//!            ▼                          ▼
//!   info "…zero-overhead…"      info "…paranoid…"
//!            │                          │
//!            ▼                          ▼
//!   HMAC-SHA256 mask key      XChaCha20-Poly1305 key
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The two modes MUST use distinct info labels so one PSK never yields
//!   the same key for both
//! - Changing the salt or a label breaks interop with every deployed peer
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod kdf;
pub mod keys;

pub use kdf::derive_key;
pub use keys::{Psk, PSK_SIZE};

// ============================================
// Constants
// ============================================

/// Size of a derived symmetric key in bytes.
pub const DERIVED_KEY_SIZE: usize = 32;

/// Size of the XChaCha20-Poly1305 nonce in bytes.
pub const XCHACHA20_NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag in bytes.
pub const POLY1305_TAG_SIZE: usize = 16;

/// HKDF salt shared by every derived key.
pub const HKDF_SALT: &[u8] = b"swgp-v1";

/// HKDF info label for the zero-overhead mask key.
pub const ZERO_OVERHEAD_KEY_INFO: &[u8] = b"swgp zero-overhead mask key";

/// HKDF info label for the paranoid AEAD key.
pub const PARANOID_KEY_INFO: &[u8] = b"swgp paranoid aead key";
