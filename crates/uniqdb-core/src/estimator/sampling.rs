//! Module: estimator::sampling
//! Responsibility: adaptive-sampling distinct count (`uniq`).
//! Does not own: key encoding or sampling-degree configuration parsing.
//! Boundary: keeps only hashes whose low `skip_degree` bits are zero and
//! scales the retained count back up on read-out.

use crate::{
    codec::{
        CodecError, ERR_DUPLICATE_KEY, ERR_HASH_FAILS_SKIP_MASK, ERR_SKIP_DEGREE_RANGE, StateRead,
        StateWrite,
    },
    estimator::Estimator,
    key::hash::int_hash64,
    obs::sink::{MetricsEvent, record},
};

/// Initial table size degree (16 cells).
pub const INITIAL_SIZE_DEGREE: u8 = 4;

/// Default maximum table size degree; at most `2^(degree - 1)` hashes are kept.
pub const DEFAULT_MAX_SIZE_DEGREE: u8 = 17;

/// Accepted range for the configured maximum size degree.
pub const MIN_MAX_SIZE_DEGREE: u8 = 10;
pub const MAX_MAX_SIZE_DEGREE: u8 = 19;

/// Largest retained-hash count accepted from a serialized state.
pub const MAX_SERIALIZED_COUNT: u64 = 1 << MAX_MAX_SIZE_DEGREE;

const MAX_SKIP_DEGREE: u8 = 63;

///
/// SamplingParams
///
/// Per-function sampling parameters fixed when the function is resolved.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SamplingParams {
    pub max_size_degree: u8,
}

impl SamplingParams {
    #[must_use]
    pub const fn new(max_size_degree: u8) -> Self {
        Self { max_size_degree }
    }

    /// Largest number of hashes retained before the skip degree rises.
    #[must_use]
    pub const fn max_retained(self) -> u64 {
        1 << (self.max_size_degree - 1)
    }
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE_DEGREE)
    }
}

///
/// SamplingEstimator
///
/// Open-addressed set of 64-bit hashes with linear probing.
/// Zero marks an empty cell, so a zero hash is tracked by `has_zero`.
/// Cell placement uses the high bits of the hash; sampling uses the low bits.
///

#[derive(Clone, Debug)]
pub struct SamplingEstimator {
    cells: Vec<u64>,
    size_degree: u8,
    skip_degree: u8,
    count: u64,
    has_zero: bool,
    params: SamplingParams,
}

impl SamplingEstimator {
    #[must_use]
    pub const fn skip_degree(&self) -> u8 {
        self.skip_degree
    }

    /// Number of hashes currently retained.
    #[must_use]
    pub const fn retained(&self) -> u64 {
        self.count
    }

    /// Retained hashes: the zero hash first when present, then table order.
    pub fn retained_hashes(&self) -> impl Iterator<Item = u64> + '_ {
        self.has_zero
            .then_some(0)
            .into_iter()
            .chain(self.cells.iter().copied().filter(|&hash| hash != 0))
    }

    const fn skip_mask(skip_degree: u8) -> u64 {
        (1u64 << skip_degree) - 1
    }

    const fn passes(&self, hash: u64) -> bool {
        hash & Self::skip_mask(self.skip_degree) == 0
    }

    const fn max_fill(&self) -> u64 {
        1 << (self.size_degree - 1)
    }

    #[expect(clippy::cast_possible_truncation)]
    const fn place(&self, hash: u64) -> usize {
        (hash >> (64 - self.size_degree)) as usize
    }

    // Insert a hash that already passed the mask; returns false on a repeat.
    fn insert_hash(&mut self, hash: u64) -> bool {
        if hash == 0 {
            if self.has_zero {
                return false;
            }
            self.has_zero = true;
            self.count += 1;
            return true;
        }

        let mask = self.cells.len() - 1;
        let mut idx = self.place(hash);
        loop {
            match self.cells[idx] {
                0 => {
                    self.cells[idx] = hash;
                    self.count += 1;
                    return true;
                }
                existing if existing == hash => return false,
                _ => idx = (idx + 1) & mask,
            }
        }
    }

    // Rebuild the table at `size_degree`, dropping hashes that fail the
    // current skip mask.
    fn rebuild(&mut self, size_degree: u8) {
        let old = std::mem::replace(&mut self.cells, vec![0; 1 << size_degree]);
        self.size_degree = size_degree;
        self.count = u64::from(self.has_zero);

        for hash in old {
            if hash != 0 && self.passes(hash) {
                self.insert_hash(hash);
            }
        }
    }

    fn shrink_if_needed(&mut self) {
        if self.count <= self.max_fill() {
            return;
        }

        if self.count > self.params.max_retained() {
            while self.count > self.params.max_retained() && self.skip_degree < MAX_SKIP_DEGREE {
                self.skip_degree += 1;
                self.rebuild(self.size_degree);
            }
            record(MetricsEvent::SamplingDegreeRaised {
                degree: self.skip_degree,
            });
        } else {
            self.rebuild(self.size_degree + 1);
        }
    }

    fn raise_skip_to(&mut self, skip_degree: u8) {
        if skip_degree > self.skip_degree {
            self.skip_degree = skip_degree;
            self.rebuild(self.size_degree);
        }
    }

    fn admit(&mut self, hash: u64) {
        if self.passes(hash) && self.insert_hash(hash) {
            self.shrink_if_needed();
        }
    }
}

impl Estimator for SamplingEstimator {
    type Key = u64;
    type Params = SamplingParams;

    fn new(params: SamplingParams) -> Self {
        Self {
            cells: vec![0; 1 << INITIAL_SIZE_DEGREE],
            size_degree: INITIAL_SIZE_DEGREE,
            skip_degree: 0,
            count: 0,
            has_zero: false,
            params,
        }
    }

    fn insert(&mut self, key: u64) {
        self.admit(int_hash64(key));
    }

    fn merge(&mut self, other: &Self) {
        self.raise_skip_to(other.skip_degree);
        for hash in other.retained_hashes() {
            self.admit(hash);
        }
    }

    fn write<W: StateWrite + ?Sized>(&self, out: &mut W) {
        out.put_u8(self.skip_degree);
        out.put_var_uint(self.count);
        for hash in self.retained_hashes() {
            out.put_u64_le(hash);
        }
    }

    fn read<R: StateRead + ?Sized>(params: SamplingParams, reader: &mut R) -> Result<Self, CodecError> {
        let skip_degree = reader.get_u8()?;
        if skip_degree > MAX_SKIP_DEGREE {
            return Err(CodecError::Invalid {
                reason: ERR_SKIP_DEGREE_RANGE,
            });
        }
        let count = reader.get_len(MAX_SERIALIZED_COUNT)?;

        let mut state = Self::new(params);
        state.raise_skip_to(skip_degree);

        let wire_mask = Self::skip_mask(skip_degree);
        for _ in 0..count {
            let hash = reader.get_u64_le()?;
            if hash & wire_mask != 0 {
                return Err(CodecError::Invalid {
                    reason: ERR_HASH_FAILS_SKIP_MASK,
                });
            }
            // A state written under a larger maximum degree may sample
            // harder here; hashes failing the raised mask are dropped.
            if !state.passes(hash) {
                continue;
            }
            if !state.insert_hash(hash) {
                return Err(CodecError::Invalid {
                    reason: ERR_DUPLICATE_KEY,
                });
            }
            state.shrink_if_needed();
        }

        Ok(state)
    }

    /// Strictly increasing in the retained count within one skip degree.
    /// A skip raise resamples the retained set, so the estimate may drop
    /// there, by well under `4 * 2^skip * sqrt(retained)`.
    fn size(&self) -> u64 {
        if self.skip_degree == 0 {
            return self.count;
        }

        // Pseudo-random remainder hides the power-of-two granularity.
        let scaled = u128::from(self.count) << self.skip_degree;
        let remainder = u128::from(int_hash64(self.count) & Self::skip_mask(self.skip_degree));

        u64::try_from(scaled + remainder).unwrap_or(u64::MAX)
    }
}

///
/// TESTS
///
