//! Module: estimator::exact
//! Responsibility: exact distinct count over 64-bit or 128-bit surrogate keys (`uniqExact`).
//! Does not own: key encoding; collision resistance of hashed keys is the encoder's concern.
//! Boundary: the state is the full key set, so merge is plain set union.

use crate::{
    codec::{CodecError, ERR_DUPLICATE_KEY, StateRead, StateWrite},
    estimator::Estimator,
    key::{
        Key128,
        hash::{hash128_to_64, int_hash64},
    },
    obs::sink::{MetricsEvent, record},
};
use std::fmt::Debug;

/// Largest key count accepted from a serialized state.
pub const MAX_SERIALIZED_COUNT: u64 = 1 << 40;

// Above this many cells the table doubles instead of quadrupling.
const LARGE_TABLE_CELLS: usize = 1 << 23;

///
/// TableKey
///
/// Fixed-width key stored by the exact estimator.
/// The all-zero key marks an empty cell and is tracked out of band.
///

pub trait TableKey: Copy + Debug + Default + Eq + Send + Sync + 'static {
    /// Hash whose low bits pick the starting cell.
    fn bucket_hash(self) -> u64;

    fn is_zero(self) -> bool;

    fn write<W: StateWrite + ?Sized>(self, out: &mut W);

    fn read<R: StateRead + ?Sized>(reader: &mut R) -> Result<Self, CodecError>;
}

impl TableKey for u64 {
    fn bucket_hash(self) -> u64 {
        int_hash64(self)
    }

    fn is_zero(self) -> bool {
        self == 0
    }

    fn write<W: StateWrite + ?Sized>(self, out: &mut W) {
        out.put_u64_le(self);
    }

    fn read<R: StateRead + ?Sized>(reader: &mut R) -> Result<Self, CodecError> {
        reader.get_u64_le()
    }
}

// Raw wide integers may differ only in `high`, so both halves are mixed.
impl TableKey for Key128 {
    fn bucket_hash(self) -> u64 {
        hash128_to_64(self.low, self.high)
    }

    fn is_zero(self) -> bool {
        self.low == 0 && self.high == 0
    }

    fn write<W: StateWrite + ?Sized>(self, out: &mut W) {
        out.put_u64_le(self.low);
        out.put_u64_le(self.high);
    }

    fn read<R: StateRead + ?Sized>(reader: &mut R) -> Result<Self, CodecError> {
        let low = reader.get_u64_le()?;
        let high = reader.get_u64_le()?;

        Ok(Self { low, high })
    }
}

///
/// Cells
///
/// Table storage: a fixed inline array until the first growth, then a
/// heap slice. Both lengths are powers of two.
///

#[derive(Clone, Debug)]
enum Cells<K, const N: usize> {
    Inline([K; N]),
    Heap(Box<[K]>),
}

impl<K, const N: usize> Cells<K, N> {
    fn as_slice(&self) -> &[K] {
        match self {
            Self::Inline(cells) => cells.as_slice(),
            Self::Heap(cells) => &cells[..],
        }
    }

    fn as_mut_slice(&mut self) -> &mut [K] {
        match self {
            Self::Inline(cells) => cells.as_mut_slice(),
            Self::Heap(cells) => &mut cells[..],
        }
    }

    const fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }
}

///
/// ExactEstimator
///
/// Open-addressed key set with linear probing, maximum load 1/2.
/// Growth quadruples the cell count, doubling once the table is large.
///

#[derive(Clone, Debug)]
pub struct ExactEstimator<K: TableKey, const INLINE: usize> {
    cells: Cells<K, INLINE>,
    count: u64,
    has_zero: bool,
}

/// Exact set over 64-bit keys; 16 inline cells.
pub type ExactU64 = ExactEstimator<u64, 16>;

/// Exact set over 128-bit keys; 8 inline cells.
pub type ExactKey128 = ExactEstimator<Key128, 8>;

impl<K: TableKey, const INLINE: usize> ExactEstimator<K, INLINE> {
    /// Current cell count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cells.as_slice().len()
    }

    #[must_use]
    pub const fn is_inline(&self) -> bool {
        self.cells.is_inline()
    }

    /// Stored keys: the zero key first when present, then table order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.has_zero.then(K::default).into_iter().chain(
            self.cells
                .as_slice()
                .iter()
                .copied()
                .filter(|key| !key.is_zero()),
        )
    }

    #[must_use]
    pub fn contains(&self, key: K) -> bool {
        if key.is_zero() {
            return self.has_zero;
        }

        let cells = self.cells.as_slice();
        let mask = cells.len() - 1;
        let mut idx = Self::start(key, mask);
        loop {
            let cell = cells[idx];
            if cell == key {
                return true;
            }
            if cell.is_zero() {
                return false;
            }
            idx = (idx + 1) & mask;
        }
    }

    #[expect(clippy::cast_possible_truncation)]
    fn start(key: K, mask: usize) -> usize {
        key.bucket_hash() as usize & mask
    }

    // Place a key known to be absent; the table must have a free cell.
    fn place(cells: &mut [K], key: K) -> bool {
        let mask = cells.len() - 1;
        let mut idx = Self::start(key, mask);
        loop {
            let cell = cells[idx];
            if cell == key {
                return false;
            }
            if cell.is_zero() {
                cells[idx] = key;
                return true;
            }
            idx = (idx + 1) & mask;
        }
    }

    fn grow(&mut self) {
        let current = self.capacity();
        let next = if current >= LARGE_TABLE_CELLS {
            current * 2
        } else {
            current * 4
        };

        let mut heap = vec![K::default(); next].into_boxed_slice();
        for &key in self.cells.as_slice() {
            if !key.is_zero() {
                Self::place(&mut heap, key);
            }
        }

        if self.cells.is_inline() {
            record(MetricsEvent::ExactHeapSpill { cells: next as u64 });
        }
        self.cells = Cells::Heap(heap);
    }

    // Insert and report whether the key was new.
    fn insert_new(&mut self, key: K) -> bool {
        if key.is_zero() {
            if self.has_zero {
                return false;
            }
            self.has_zero = true;
            self.count += 1;
            return true;
        }

        if !Self::place(self.cells.as_mut_slice(), key) {
            return false;
        }
        self.count += 1;

        let stored = self.count - u64::from(self.has_zero);
        if stored > (self.capacity() / 2) as u64 {
            self.grow();
        }

        true
    }
}

impl<K: TableKey, const INLINE: usize> Estimator for ExactEstimator<K, INLINE> {
    type Key = K;
    type Params = ();

    fn new((): ()) -> Self {
        Self {
            cells: Cells::Inline([K::default(); INLINE]),
            count: 0,
            has_zero: false,
        }
    }

    fn insert(&mut self, key: K) {
        self.insert_new(key);
    }

    fn merge(&mut self, other: &Self) {
        for key in other.keys() {
            self.insert_new(key);
        }
    }

    fn write<W: StateWrite + ?Sized>(&self, out: &mut W) {
        out.put_var_uint(self.count);
        for key in self.keys() {
            key.write(out);
        }
    }

    fn read<R: StateRead + ?Sized>((): (), reader: &mut R) -> Result<Self, CodecError> {
        let count = reader.get_len(MAX_SERIALIZED_COUNT)?;

        let mut state = Self::new(());
        for _ in 0..count {
            let key = K::read(reader)?;
            if !state.insert_new(key) {
                return Err(CodecError::Invalid {
                    reason: ERR_DUPLICATE_KEY,
                });
            }
        }

        Ok(state)
    }

    fn size(&self) -> u64 {
        self.count
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::SliceReader, key::exact_string_key};

    fn filled_u64(keys: impl IntoIterator<Item = u64>) -> ExactU64 {
        let mut state = ExactU64::new(());
        for key in keys {
            state.insert(key);
        }
        state
    }

    fn sorted<K: TableKey + Ord, const N: usize>(state: &ExactEstimator<K, N>) -> Vec<K> {
        let mut keys: Vec<K> = state.keys().collect();
        keys.sort_unstable();
        keys
    }

    #[test]
    fn inline_storage_until_half_full() {
        let state = filled_u64(1..=8);
        assert!(state.is_inline());
        assert_eq!(state.capacity(), 16);

        let state = filled_u64(1..=9);
        assert!(!state.is_inline());
        assert_eq!(state.capacity(), 64);
        assert_eq!(state.size(), 9);
    }

    #[test]
    fn wide_keys_start_with_eight_inline_cells() {
        let mut state = ExactKey128::new(());
        for low in 1..=4 {
            state.insert(Key128::new(low, 0));
        }
        assert!(state.is_inline());
        assert_eq!(state.capacity(), 8);

        state.insert(Key128::new(5, 0));
        assert!(!state.is_inline());
        assert_eq!(state.capacity(), 32);
    }

    #[test]
    fn keys_differing_only_in_high_half_spread_across_cells() {
        let mut state = ExactKey128::new(());
        for idx in 1..=4_096u64 {
            state.insert(Key128::from_u128(u128::from(idx) << 64));
        }
        assert_eq!(state.size(), 4_096);

        // Distinct high halves must not share one starting cell.
        let mask = state.capacity() - 1;
        let mut starts: Vec<usize> = (1..=4_096u64)
            .map(|idx| ExactKey128::start(Key128::new(0, idx), mask))
            .collect();
        starts.sort_unstable();
        starts.dedup();
        assert!(starts.len() > 2_048, "only {} distinct start cells", starts.len());
        assert!((1..=4_096u64).all(|idx| state.contains(Key128::new(0, idx))));
    }

    #[test]
    fn zero_key_is_an_ordinary_member() {
        let state = filled_u64([0, 0, 5, 0]);

        assert_eq!(state.size(), 2);
        assert!(state.contains(0));
        assert!(state.contains(5));
        assert!(!state.contains(6));
    }

    #[test]
    fn repeats_are_ignored_across_growth() {
        let state = filled_u64((0..10_000).chain(0..10_000));

        assert_eq!(state.size(), 10_000);
        assert!((0..10_000).all(|key| state.contains(key)));
    }

    #[test]
    fn merge_is_set_union() {
        let mut left = filled_u64(0..600);
        let right = filled_u64(400..1_000);
        left.merge(&right);

        assert_eq!(left.size(), 1_000);
        assert_eq!(sorted(&left), (0..1_000).collect::<Vec<_>>());
    }

    #[test]
    fn string_scenario_counts_four() {
        let mut state = ExactKey128::new(());
        for value in ["a", "a", "b", "c", "bb", "b"] {
            state.insert(exact_string_key(value.as_bytes()));
        }
        assert_eq!(state.size(), 4);
    }

    #[test]
    fn wire_layout_writes_zero_key_first() {
        let state = filled_u64([9, 0]);
        let mut bytes = Vec::new();
        state.write(&mut bytes);

        let mut expected = vec![2u8];
        expected.extend_from_slice(&0u64.to_le_bytes());
        expected.extend_from_slice(&9u64.to_le_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn wide_state_round_trips() {
        let mut state = ExactKey128::new(());
        for idx in 0..500u64 {
            state.insert(Key128::new(idx, idx.rotate_left(7)));
        }
        let mut bytes = Vec::new();
        state.write(&mut bytes);

        let decoded =
            ExactKey128::read((), &mut SliceReader::new(&bytes)).expect("valid payload");
        assert_eq!(decoded.size(), 500);
        assert_eq!(sorted(&decoded), sorted(&state));
    }

    #[test]
    fn read_rejects_duplicates_and_truncation() {
        let mut bytes = Vec::new();
        bytes.put_var_uint(2);
        bytes.put_u64_le(3);
        bytes.put_u64_le(3);
        let err =
            ExactU64::read((), &mut SliceReader::new(&bytes)).expect_err("duplicate key");
        assert_eq!(
            err,
            CodecError::Invalid {
                reason: ERR_DUPLICATE_KEY
            }
        );

        let err = ExactU64::read((), &mut SliceReader::new(&bytes[..12]))
            .expect_err("truncated payload");
        assert_eq!(err, CodecError::Truncated);
    }

    #[test]
    fn read_rejects_counts_above_limit() {
        let mut bytes = Vec::new();
        bytes.put_var_uint(MAX_SERIALIZED_COUNT + 1);
        let err = ExactU64::read((), &mut SliceReader::new(&bytes)).expect_err("count limit");
        assert!(matches!(err, CodecError::LengthLimitExceeded { .. }));
    }
}
