//! # Statistical Self-Tests
//!
//! Sanity checks for the primitive layer. These are coarse statistical
//! bounds, not cryptographic proofs; they catch gross misuse such as a
//! constant key or a broken random source.
//!
//! | Check | Compares | Expected |
//! |-------|----------|----------|
//! | Confusion | Same plaintext + nonce, two keys | ~50% bits differ |
//! | Diffusion | Same key + nonce, plaintext with one bit flipped | ~50% of tag + digest bits differ |
//! | Collisions | SHA-256 of many random inputs | All digests distinct |
//!
//! ## Diffusion and GCM
//!
//! AES-GCM encrypts the body in counter mode, so flipping one plaintext bit
//! flips exactly one ciphertext body bit. The avalanche happens in the
//! authenticated outputs: the GCM tag and the envelope integrity digest
//! (SHA-256 over the ciphertext). Diffusion is therefore measured over
//! `tag || sha256(ciphertext)`.

use std::collections::HashSet;

use super::encryption::{encrypt_with_nonce, fill_random, Nonce, KEY_SIZE, TAG_SIZE};
use super::hash::sha256;
use crate::error::{Error, Result};

/// Fraction of differing bits between two buffers
///
/// Buffers of different length are compared over the shorter one, with
/// every bit of the excess counted as differing.
pub fn bit_difference_ratio(a: &[u8], b: &[u8]) -> f64 {
    let total_bits = a.len().max(b.len()) * 8;
    if total_bits == 0 {
        return 0.0;
    }

    let common: u32 = a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum();
    let excess = (a.len().abs_diff(b.len()) * 8) as u32;

    f64::from(common + excess) / total_bits as f64
}

/// Bit difference between ciphertexts of one plaintext under two keys
///
/// Both encryptions use the same nonce; only the key differs.
pub fn measure_confusion(
    plaintext: &[u8],
    key_a: &[u8; KEY_SIZE],
    key_b: &[u8; KEY_SIZE],
    nonce: &Nonce,
) -> Result<f64> {
    let ct_a = encrypt_with_nonce(key_a, nonce, plaintext, b"")?;
    let ct_b = encrypt_with_nonce(key_b, nonce, plaintext, b"")?;
    Ok(bit_difference_ratio(&ct_a, &ct_b))
}

/// Bit difference in the authenticated outputs after flipping one input bit
///
/// `bit` indexes into `plaintext` (bit 0 is the low bit of byte 0). An index
/// outside the plaintext, including any index into an empty one, is an
/// `Error::Encryption`.
pub fn measure_diffusion(
    plaintext: &[u8],
    bit: usize,
    key: &[u8; KEY_SIZE],
    nonce: &Nonce,
) -> Result<f64> {
    if bit >= plaintext.len() * 8 {
        return Err(Error::Encryption(format!(
            "bit {} outside a {}-bit plaintext",
            bit,
            plaintext.len() * 8
        )));
    }

    let mut flipped = plaintext.to_vec();
    flipped[bit / 8] ^= 1 << (bit % 8);

    let original = authenticated_output(&encrypt_with_nonce(key, nonce, plaintext, b"")?);
    let changed = authenticated_output(&encrypt_with_nonce(key, nonce, &flipped, b"")?);

    Ok(bit_difference_ratio(&original, &changed))
}

fn authenticated_output(ciphertext: &[u8]) -> Vec<u8> {
    let tag = &ciphertext[ciphertext.len() - TAG_SIZE..];
    let mut out = tag.to_vec();
    out.extend_from_slice(&sha256(ciphertext));
    out
}

/// Hash `samples` random inputs of `input_len` bytes and count distinct digests
pub fn sample_digest_collisions(samples: usize, input_len: usize) -> Result<usize> {
    let mut seen = HashSet::with_capacity(samples);
    let mut input = vec![0u8; input_len];

    for _ in 0..samples {
        fill_random(&mut input)?;
        seen.insert(sha256(&input));
    }

    Ok(seen.len())
}
