//! Module: key::short_string
//! Responsibility: exact 128-bit keys for string values.
//! Does not own: approximate string hashing (see `key::hash`).
//! Boundary: strings of at most 15 bytes embed losslessly; longer strings
//! are hashed and tagged so the two key spaces never overlap.

use crate::key::{
    Key128,
    hash::{FMIX_MUL_1, FMIX_MUL_2, digest_halves},
};
use sha2::{Digest, Sha256};

/// Longest string that embeds into a key without hashing.
pub const MAX_EMBEDDED_LEN: usize = 15;

/// Build the exact key for one string value.
#[must_use]
pub fn exact_string_key(bytes: &[u8]) -> Key128 {
    if bytes.len() <= MAX_EMBEDDED_LEN {
        embed_short(bytes)
    } else {
        hash_long(bytes)
    }
}

/// Build the exact key for a short string from a 16-byte window that starts
/// at the string's first byte. Bytes past `len` may hold anything.
#[must_use]
pub fn exact_window_key(window: &[u8; 16], len: usize) -> Key128 {
    debug_assert!(len <= MAX_EMBEDDED_LEN);

    #[cfg(all(target_arch = "x86_64", target_feature = "ssse3"))]
    {
        ssse3::embed_window(window, len)
    }

    #[cfg(not(all(target_arch = "x86_64", target_feature = "ssse3")))]
    {
        embed_window_portable(window, len)
    }
}

fn embed_short(bytes: &[u8]) -> Key128 {
    let mut buf = [0u8; 16];
    buf[..bytes.len()].copy_from_slice(bytes);

    embed_window_portable(&buf, bytes.len())
}

// Keep the first `len` bytes, zero the rest, then store `len` in byte 15.
// Byte 15 is the top byte of `high`, so the hashed-key tag bit stays clear.
#[expect(clippy::cast_possible_truncation)]
fn embed_window_portable(window: &[u8; 16], len: usize) -> Key128 {
    let raw = u128::from_le_bytes(*window);
    let mask = (1u128 << (len * 8)) - 1;
    let packed = (raw & mask) | ((len as u128) << 120);

    mix_embedded(packed as u64, (packed >> 64) as u64)
}

// Only `low` is mixed; `high` keeps the length byte and the tag bit intact.
// Each step is a bijection on `low` for fixed `high`, so distinct packed
// buffers stay distinct.
const fn mix_embedded(mut low: u64, high: u64) -> Key128 {
    low ^= low >> 33;
    low = low.wrapping_mul(FMIX_MUL_1);
    low ^= high;
    low ^= low >> 33;
    low = low.wrapping_mul(FMIX_MUL_2);
    low ^= low >> 33;

    Key128 { low, high }
}

fn hash_long(bytes: &[u8]) -> Key128 {
    let digest = Sha256::digest(bytes);
    let (low, high) = digest_halves(&digest);

    Key128 {
        low,
        high: high | Key128::HASHED_TAG,
    }
}

#[cfg(all(target_arch = "x86_64", target_feature = "ssse3"))]
mod ssse3 {
    use super::{Key128, mix_embedded};
    use std::arch::x86_64::{
        __m128i, _mm_loadu_si128, _mm_or_si128, _mm_set_epi8, _mm_shuffle_epi8, _mm_storeu_si128,
    };

    // Row `len` keeps lanes `0..len` and zeroes the rest (0x80 clears a lane).
    const SHUFFLE_MASKS: [[u8; 16]; 16] = build_masks();

    const fn build_masks() -> [[u8; 16]; 16] {
        let mut masks = [[0x80u8; 16]; 16];
        let mut len = 0;
        while len < 16 {
            let mut lane = 0;
            let mut index = 0u8;
            while lane < len {
                masks[len][lane] = index;
                lane += 1;
                index += 1;
            }
            len += 1;
        }

        masks
    }

    #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub(super) fn embed_window(window: &[u8; 16], len: usize) -> Key128 {
        let mut out = [0u8; 16];

        // SAFETY:
        // - `window` and `out` are 16-byte arrays, so both unaligned 128-bit
        //   accesses stay in bounds.
        // - `SHUFFLE_MASKS[len]` is in bounds because `len <= 15`.
        // - The module only compiles when the target enables `ssse3`.
        unsafe {
            let data = _mm_loadu_si128(window.as_ptr().cast::<__m128i>());
            let mask = _mm_loadu_si128(SHUFFLE_MASKS[len].as_ptr().cast::<__m128i>());
            let kept = _mm_shuffle_epi8(data, mask);
            let length = _mm_set_epi8(len as i8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0);
            _mm_storeu_si128(out.as_mut_ptr().cast::<__m128i>(), _mm_or_si128(kept, length));
        }

        let packed = u128::from_le_bytes(out);
        mix_embedded(packed as u64, (packed >> 64) as u64)
    }
}

///
/// TESTS
///
