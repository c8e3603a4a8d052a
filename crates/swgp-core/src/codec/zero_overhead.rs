// ============================================
// File: crates/swgp-core/src/codec/zero_overhead.rs
// ============================================
//! # Zero-Overhead Codec
//!
//! ## Creation Reason
//! Hides WireGuard's fixed header bytes without growing the datagram, so
//! the relay adds nothing to the path MTU.
//!
//! ## Construction
//! The datagram is split into a head (first 16 bytes, or fewer for a short
//! datagram) and a tail (the rest). A three-round unbalanced Feistel
//! network keyed with HMAC-SHA256 mixes the two:
//!
//! ```text
//!   round 1:  H ^= HMAC(k, 0x01 || T)[..len(H)]
//!   round 2:  T ^= HMAC(k, 0x02 || H || ctr_le32) for ctr = 0, 1, ...
//!   round 3:  H ^= HMAC(k, 0x03 || T)[..len(H)]
//! ```
//!
//! Decoding runs round 3, round 2, round 1. Each round only XORs one half
//! with a function of the other, so it undoes itself.
//!
//! ## ⚠️ Important Note for Next Developer
//! - This mode has NO integrity. Garbage decodes to garbage and WireGuard
//!   rejects it
//! - The 16-byte split is a block size, not a WireGuard field boundary
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use super::{ensure_capacity, PacketCodec, ProxyMode};
use crate::crypto::{derive_key, Psk, ZERO_OVERHEAD_KEY_INFO};
use crate::error::{CoreError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Bytes in the head half.
const HEAD_SIZE: usize = 16;

/// Bytes produced per keystream block.
const BLOCK_SIZE: usize = 32;

const ROUND_HEAD_IN: u8 = 0x01;
const ROUND_TAIL: u8 = 0x02;
const ROUND_HEAD_OUT: u8 = 0x03;

// ============================================
// ZeroOverheadCodec
// ============================================

/// Length-preserving keyed permutation of a datagram.
pub struct ZeroOverheadCodec {
    /// MAC keyed once; cloned per round so the key schedule runs only here
    mac: HmacSha256,
}

impl ZeroOverheadCodec {
    /// Creates a codec keyed from `psk`.
    ///
    /// # Errors
    /// Returns an error if key derivation fails.
    pub fn new(psk: &Psk) -> Result<Self> {
        let mut key = derive_key(psk, ZERO_OVERHEAD_KEY_INFO)?;
        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|_| CoreError::key_derivation("HMAC rejected derived key"));
        key.zeroize();

        Ok(Self { mac: mac? })
    }

    /// Scrambles `buf` in place.
    pub fn scramble(&self, buf: &mut [u8]) {
        let (head, tail) = buf.split_at_mut(buf.len().min(HEAD_SIZE));
        self.mask_head(ROUND_HEAD_IN, tail, head);
        self.mask_tail(head, tail);
        self.mask_head(ROUND_HEAD_OUT, tail, head);
    }

    /// Reverses [`scramble`](Self::scramble) in place.
    pub fn unscramble(&self, buf: &mut [u8]) {
        let (head, tail) = buf.split_at_mut(buf.len().min(HEAD_SIZE));
        self.mask_head(ROUND_HEAD_OUT, tail, head);
        self.mask_tail(head, tail);
        self.mask_head(ROUND_HEAD_IN, tail, head);
    }

    fn mask_head(&self, round: u8, tail: &[u8], head: &mut [u8]) {
        let mut mac = self.mac.clone();
        mac.update(&[round]);
        mac.update(tail);
        let block = mac.finalize().into_bytes();

        xor_into(head, &block);
    }

    fn mask_tail(&self, head: &[u8], tail: &mut [u8]) {
        for (counter, chunk) in (0u32..).zip(tail.chunks_mut(BLOCK_SIZE)) {
            let mut mac = self.mac.clone();
            mac.update(&[ROUND_TAIL]);
            mac.update(head);
            mac.update(&counter.to_le_bytes());
            let block = mac.finalize().into_bytes();

            xor_into(chunk, &block);
        }
    }
}

fn xor_into(target: &mut [u8], mask: &[u8]) {
    for (byte, m) in target.iter_mut().zip(mask) {
        *byte ^= m;
    }
}

impl std::fmt::Debug for ZeroOverheadCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZeroOverheadCodec").finish_non_exhaustive()
    }
}

impl PacketCodec for ZeroOverheadCodec {
    fn mode(&self) -> ProxyMode {
        ProxyMode::ZeroOverhead
    }

    fn max_overhead(&self) -> usize {
        0
    }

    fn encode(&self, plaintext: &[u8], output: &mut [u8]) -> Result<usize> {
        ensure_capacity(output, plaintext.len())?;
        let out = &mut output[..plaintext.len()];
        out.copy_from_slice(plaintext);
        self.scramble(out);
        Ok(plaintext.len())
    }

    fn decode(&self, wire: &[u8], output: &mut [u8]) -> Result<usize> {
        ensure_capacity(output, wire.len())?;
        let out = &mut output[..wire.len()];
        out.copy_from_slice(wire);
        self.unscramble(out);
        Ok(wire.len())
    }
}

// ============================================
// Tests
// ============================================
