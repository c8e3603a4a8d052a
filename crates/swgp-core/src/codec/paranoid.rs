// ============================================
// File: crates/swgp-core/src/codec/paranoid.rs
// ============================================
//! # Paranoid Codec
//!
//! ## Creation Reason
//! Zero-overhead hides header bytes but keeps sizes. This mode seals every
//! datagram with XChaCha20-Poly1305 and pads it by a random amount, so
//! neither content nor the WireGuard size classes are observable and
//! forged datagrams never reach WireGuard.
//!
//! ## Wire Format
//! ```text
//! ┌──────────────┬───────────────────────────────────────┬──────────┐
//! │ Nonce (24)   │ ciphertext of:                        │ Tag (16) │
//! │ random       │ len (u16 BE) │ payload │ zero padding │          │
//! └──────────────┴───────────────────────────────────────┴──────────┘
//! ```
//!
//! ## Padding
//! Uniform over `[0, budget]` where
//! `budget = max(0, (mtu - 48) - 42 - payload_len)`; 48 is the IPv6+UDP
//! header. A datagram that fit the path before encoding still fits after.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Nonces are random (192 bits); never switch to a counter here, both
//!   ends and every session share one key
//! - The length prefix is inside the AEAD, never trust it before the tag
//!   verifies
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{Tag, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use zeroize::Zeroize;

use swgp_common::types::IPV6_UDP_HEADER_SIZE;

use super::{ensure_capacity, PacketCodec, ProxyMode};
use crate::crypto::{derive_key, Psk, PARANOID_KEY_INFO, POLY1305_TAG_SIZE, XCHACHA20_NONCE_SIZE};
use crate::error::{CoreError, Result};

/// Size of the encrypted length prefix.
const LENGTH_PREFIX_SIZE: usize = 2;

/// Bytes added to every datagram before padding: nonce, length, tag.
pub const PARANOID_FIXED_OVERHEAD: usize =
    XCHACHA20_NONCE_SIZE + LENGTH_PREFIX_SIZE + POLY1305_TAG_SIZE;

// ============================================
// ParanoidCodec
// ============================================

/// Authenticated, padded codec.
pub struct ParanoidCodec {
    cipher: XChaCha20Poly1305,
    /// Largest datagram that fits the path MTU
    max_packet_size: usize,
}

impl ParanoidCodec {
    /// Creates a codec keyed from `psk` that pads up to `mtu`.
    ///
    /// # Errors
    /// Returns an error if key derivation fails.
    pub fn new(psk: &Psk, mtu: usize) -> Result<Self> {
        let mut key = derive_key(psk, PARANOID_KEY_INFO)?;
        let cipher = XChaCha20Poly1305::new_from_slice(&key)
            .map_err(|_| CoreError::key_derivation("cipher rejected derived key"));
        key.zeroize();

        Ok(Self {
            cipher: cipher?,
            max_packet_size: mtu.saturating_sub(IPV6_UDP_HEADER_SIZE),
        })
    }

    /// Largest padding this codec can add for a payload of `payload_len`.
    #[must_use]
    pub fn padding_budget(&self, payload_len: usize) -> usize {
        self.max_packet_size
            .saturating_sub(PARANOID_FIXED_OVERHEAD + payload_len)
    }
}

impl std::fmt::Debug for ParanoidCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParanoidCodec")
            .field("max_packet_size", &self.max_packet_size)
            .finish_non_exhaustive()
    }
}

impl PacketCodec for ParanoidCodec {
    fn mode(&self) -> ProxyMode {
        ProxyMode::Paranoid
    }

    fn max_overhead(&self) -> usize {
        PARANOID_FIXED_OVERHEAD + self.padding_budget(0)
    }

    fn encode(&self, plaintext: &[u8], output: &mut [u8]) -> Result<usize> {
        let payload_len = u16::try_from(plaintext.len()).map_err(|_| CoreError::MessageTooLarge {
            max: usize::from(u16::MAX),
            actual: plaintext.len(),
        })?;

        let padding = rand::thread_rng().gen_range(0..=self.padding_budget(plaintext.len()));
        let total = PARANOID_FIXED_OVERHEAD + plaintext.len() + padding;
        ensure_capacity(output, total)?;

        let (nonce, rest) = output[..total].split_at_mut(XCHACHA20_NONCE_SIZE);
        let (body, tag_out) = rest.split_at_mut(rest.len() - POLY1305_TAG_SIZE);
        OsRng.fill_bytes(nonce);

        let (prefix, rest) = body.split_at_mut(LENGTH_PREFIX_SIZE);
        let (payload, pad) = rest.split_at_mut(plaintext.len());
        prefix.copy_from_slice(&payload_len.to_be_bytes());
        payload.copy_from_slice(plaintext);
        pad.fill(0);

        let tag = self
            .cipher
            .encrypt_in_place_detached(XNonce::from_slice(nonce), &[], body)
            .map_err(|_| CoreError::MessageTooLarge {
                max: usize::from(u16::MAX),
                actual: plaintext.len(),
            })?;
        tag_out.copy_from_slice(&tag);

        Ok(total)
    }

    fn decode(&self, wire: &[u8], output: &mut [u8]) -> Result<usize> {
        if wire.len() < PARANOID_FIXED_OVERHEAD {
            return Err(CoreError::MessageTooShort {
                expected: PARANOID_FIXED_OVERHEAD,
                actual: wire.len(),
            });
        }

        let (nonce, rest) = wire.split_at(XCHACHA20_NONCE_SIZE);
        let (sealed, tag) = rest.split_at(rest.len() - POLY1305_TAG_SIZE);
        ensure_capacity(output, sealed.len())?;

        let body = &mut output[..sealed.len()];
        body.copy_from_slice(sealed);
        self.cipher
            .decrypt_in_place_detached(XNonce::from_slice(nonce), &[], body, Tag::from_slice(tag))
            .map_err(|_| CoreError::Authentication)?;

        let payload_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
        let available = body.len() - LENGTH_PREFIX_SIZE;
        if payload_len > available {
            return Err(CoreError::malformed(format!(
                "declared length {payload_len} exceeds body of {available} bytes"
            )));
        }

        output.copy_within(LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + payload_len, 0);
        Ok(payload_len)
    }
}

// ============================================
// Tests
// ============================================
