// ============================================
// File: crates/swgp-core/src/lib.rs
// ============================================
//! # swgp Core - Obfuscation Codecs
//!
//! ## Creation Reason
//! Holds the part of the relay that must be byte-exact: the keyed
//! transforms that hide WireGuard's fixed message types and sizes on the
//! wire, and the pre-shared key they are derived from.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`crypto`]: PSK type and HKDF key derivation
//! - [`codec`]: `PacketCodec` trait, zero-overhead and paranoid codecs
//! - [`error`]: Core error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               swgp-service                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │     swgp-core          swgp-transport               │
//! │   You are here ◄──            │                     │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │              swgp-common                            │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Codecs treat datagrams as opaque bytes. Never branch on a WireGuard
//!   message type or on a WireGuard packet size
//! - ALL cryptographic code uses RustCrypto implementations
//! - Key types MUST zeroize on drop
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod crypto;
pub mod error;

// Re-export commonly used items
pub use codec::{
    decode_packet, encode_packet, new_codec, PacketCodec, ParanoidCodec, ProxyMode,
    ZeroOverheadCodec,
};
pub use crypto::{Psk, PSK_SIZE};
pub use error::{CoreError, Result};
