// tern-parser - Byte string hashing
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! 32-bit hashing helpers.
//!
//! Strings, symbols and keywords hash with FNV-1a over their bytes, so the
//! result is the same on every run and every platform. [`mix32`] is the
//! murmur3 finalizer, used where a value needs spreading across the low bits
//! (identity tokens, struct entries).

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a hash of a byte string.
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |h, &b| {
        (h ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Avalanche a 32-bit value so nearby inputs land in unrelated buckets.
#[inline]
pub fn mix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
