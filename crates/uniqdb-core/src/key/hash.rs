//! Module: key::hash
//! Responsibility: fixed hash primitives shared by key encoders and estimators.
//! Does not own: key layout or per-estimator bucket placement.
//! Boundary: every function here is deterministic across platforms and releases.

use sha2::{Digest, Sha256};
use xxhash_rust::xxh3::xxh3_64;

pub(crate) const FMIX_MUL_1: u64 = 0xff51_afd7_ed55_8ccd;
pub(crate) const FMIX_MUL_2: u64 = 0xc4ce_b9fe_1a85_ec53;
const FOLD_MUL: u64 = 0x9ddf_ea08_eb38_2d69;

///
/// int_hash64
///
/// Bijective 64-bit finalizer (MurmurHash3 fmix64).
/// Distinct inputs always map to distinct outputs.
///
#[must_use]
pub const fn int_hash64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(FMIX_MUL_1);
    x ^= x >> 33;
    x = x.wrapping_mul(FMIX_MUL_2);
    x ^= x >> 33;

    x
}

/// Reduce a 64-bit key to the 32-bit hash used by the register estimator.
#[must_use]
#[expect(clippy::cast_possible_truncation)]
pub const fn int_hash32(key: u64) -> u32 {
    (int_hash64(key) >> 32) as u32
}

/// Fold two 64-bit hashes into one (CityHash `Hash128to64`).
/// Order-sensitive: `hash128_to_64(a, b) != hash128_to_64(b, a)` in general.
#[must_use]
pub const fn hash128_to_64(low: u64, high: u64) -> u64 {
    let mut a = (low ^ high).wrapping_mul(FOLD_MUL);
    a ^= a >> 47;
    let mut b = (high ^ a).wrapping_mul(FOLD_MUL);
    b ^= b >> 47;

    b.wrapping_mul(FOLD_MUL)
}

/// Fast non-cryptographic 64-bit hash of a byte string.
#[must_use]
pub fn fast_hash64(bytes: &[u8]) -> u64 {
    xxh3_64(bytes)
}

/// First 8 bytes of the SHA-256 digest, little-endian.
#[must_use]
pub fn digest64(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    let mut low = [0u8; 8];
    low.copy_from_slice(&digest[..8]);

    u64::from_le_bytes(low)
}

/// Split the first 16 bytes of a finished SHA-256 digest into two
/// little-endian halves.
#[must_use]
pub(crate) fn digest_halves(digest: &[u8]) -> (u64, u64) {
    let mut low = [0u8; 8];
    let mut high = [0u8; 8];
    low.copy_from_slice(&digest[..8]);
    high.copy_from_slice(&digest[8..16]);

    (u64::from_le_bytes(low), u64::from_le_bytes(high))
}

///
/// TESTS
///
