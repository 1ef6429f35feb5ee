//! Module: estimator::hybrid
//! Responsibility: small exact set that upgrades to 4096 HyperLogLog registers (`uniqHLL12`).
//! Does not own: register packing or the HyperLogLog read-out (see `registers`).
//! Boundary: the Small -> Large upgrade is one-directional.

use crate::{
    codec::{CodecError, ERR_DUPLICATE_KEY, StateRead, StateWrite},
    estimator::{Estimator, registers::Registers},
    key::hash::int_hash32,
    obs::sink::{MetricsEvent, record},
};

/// Distinct keys held exactly before the upgrade to registers.
pub const SMALL_CAPACITY: usize = 16;

const TAG_SMALL: u8 = 0;
const TAG_LARGE: u8 = 1;

///
/// SmallSet
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
struct SmallSet {
    keys: [u64; SMALL_CAPACITY],
    len: usize,
}

impl SmallSet {
    fn as_slice(&self) -> &[u64] {
        &self.keys[..self.len]
    }

    fn contains(&self, key: u64) -> bool {
        self.as_slice().contains(&key)
    }

    const fn is_full(&self) -> bool {
        self.len == SMALL_CAPACITY
    }

    const fn push(&mut self, key: u64) {
        self.keys[self.len] = key;
        self.len += 1;
    }
}

///
/// HybridEstimator
///
/// `Small` keeps up to 16 distinct keys inline and answers exactly.
/// `Large` keeps packed 5-bit registers; a key reaching `Large` is reduced
/// to a 32-bit hash first.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HybridEstimator {
    phase: Phase,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Phase {
    Small(SmallSet),
    Large(Registers),
}

impl HybridEstimator {
    #[must_use]
    pub const fn is_large(&self) -> bool {
        matches!(self.phase, Phase::Large(_))
    }

    fn promote(small: &SmallSet) -> Registers {
        let mut registers = Registers::new();
        for &key in small.as_slice() {
            registers.observe(int_hash32(key));
        }
        record(MetricsEvent::HybridPromoted);

        registers
    }
}

impl Estimator for HybridEstimator {
    type Key = u64;
    type Params = ();

    fn new((): ()) -> Self {
        Self {
            phase: Phase::Small(SmallSet::default()),
        }
    }

    fn insert(&mut self, key: u64) {
        match &mut self.phase {
            Phase::Small(small) => {
                if small.contains(key) {
                    return;
                }
                if !small.is_full() {
                    small.push(key);
                    return;
                }

                let mut registers = Self::promote(small);
                registers.observe(int_hash32(key));
                self.phase = Phase::Large(registers);
            }
            Phase::Large(registers) => registers.observe(int_hash32(key)),
        }
    }

    fn merge(&mut self, other: &Self) {
        match &other.phase {
            Phase::Small(small) => {
                for &key in small.as_slice() {
                    self.insert(key);
                }
            }
            Phase::Large(other_registers) => match &mut self.phase {
                Phase::Large(registers) => registers.merge(other_registers),
                Phase::Small(small) => {
                    let mut registers = other_registers.clone();
                    for &key in small.as_slice() {
                        registers.observe(int_hash32(key));
                    }
                    self.phase = Phase::Large(registers);
                }
            },
        }
    }

    fn write<W: StateWrite + ?Sized>(&self, out: &mut W) {
        match &self.phase {
            Phase::Small(small) => {
                out.put_u8(TAG_SMALL);
                out.put_var_uint(small.len as u64);
                for &key in small.as_slice() {
                    out.put_u64_le(key);
                }
            }
            Phase::Large(registers) => {
                out.put_u8(TAG_LARGE);
                registers.write(out);
            }
        }
    }

    fn read<R: StateRead + ?Sized>((): (), reader: &mut R) -> Result<Self, CodecError> {
        match reader.get_u8()? {
            TAG_SMALL => {
                let count = reader.get_len(SMALL_CAPACITY as u64)?;
                let mut small = SmallSet::default();
                for _ in 0..count {
                    let key = reader.get_u64_le()?;
                    if small.contains(key) {
                        return Err(CodecError::Invalid {
                            reason: ERR_DUPLICATE_KEY,
                        });
                    }
                    small.push(key);
                }

                Ok(Self {
                    phase: Phase::Small(small),
                })
            }
            TAG_LARGE => Ok(Self {
                phase: Phase::Large(Registers::read(reader)?),
            }),
            tag => Err(CodecError::UnknownTag { tag }),
        }
    }

    fn size(&self) -> u64 {
        match &self.phase {
            Phase::Small(small) => small.len as u64,
            Phase::Large(registers) => registers.estimate(),
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::SliceReader, estimator::registers::PACKED_LEN};

    fn filled(keys: impl IntoIterator<Item = u64>) -> HybridEstimator {
        let mut state = HybridEstimator::new(());
        for key in keys {
            state.insert(key);
        }
        state
    }

    fn encoded(state: &HybridEstimator) -> Vec<u8> {
        let mut bytes = Vec::new();
        state.write(&mut bytes);
        bytes
    }

    #[test]
    fn exact_up_to_small_capacity() {
        for n in 0..=SMALL_CAPACITY as u64 {
            let state = filled((0..n).chain(0..n));
            assert!(!state.is_large(), "{n} keys must stay small");
            assert_eq!(state.size(), n);
        }
    }

    #[test]
    fn seventeenth_distinct_key_promotes() {
        let state = filled(0..=SMALL_CAPACITY as u64);
        assert!(state.is_large());

        let estimate = state.size();
        assert!((15..=19).contains(&estimate), "estimate {estimate} for 17 keys");
    }

    #[test]
    fn small_merge_overflowing_capacity_promotes() {
        let mut left = filled(0..10);
        let right = filled(5..20);
        left.merge(&right);

        assert!(left.is_large());
        assert_eq!(left, filled(0..20));
    }

    #[test]
    fn merge_with_large_matches_direct_insertion() {
        let small = filled(100..110);
        let large = filled(0..5_000);

        let mut left = small.clone();
        left.merge(&large);
        let mut right = large;
        right.merge(&small);

        assert_eq!(left, right);
        assert_eq!(left, filled((0..5_000).chain(100..110)));
    }

    #[test]
    fn small_wire_layout() {
        let state = filled([7, 9]);
        let bytes = encoded(&state);

        let mut expected = vec![TAG_SMALL, 2];
        expected.extend_from_slice(&7u64.to_le_bytes());
        expected.extend_from_slice(&9u64.to_le_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn large_state_round_trips() {
        let state = filled(0..50_000);
        let bytes = encoded(&state);
        assert_eq!(bytes.len(), 1 + PACKED_LEN);

        let decoded =
            HybridEstimator::read((), &mut SliceReader::new(&bytes)).expect("valid payload");
        assert_eq!(decoded, state);
        assert_eq!(decoded.size(), state.size());
    }

    #[test]
    fn read_rejects_bad_payloads() {
        let err = HybridEstimator::read((), &mut SliceReader::new(&[2]))
            .expect_err("tag 2 is unknown");
        assert_eq!(err, CodecError::UnknownTag { tag: 2 });

        let err = HybridEstimator::read((), &mut SliceReader::new(&[TAG_SMALL, 17]))
            .expect_err("17 small keys exceed capacity");
        assert!(matches!(err, CodecError::LengthLimitExceeded { len: 17, .. }));

        let mut bytes = vec![TAG_SMALL, 2];
        bytes.extend_from_slice(&5u64.to_le_bytes());
        bytes.extend_from_slice(&5u64.to_le_bytes());
        let err = HybridEstimator::read((), &mut SliceReader::new(&bytes))
            .expect_err("duplicate small key");
        assert_eq!(
            err,
            CodecError::Invalid {
                reason: ERR_DUPLICATE_KEY
            }
        );
    }

    #[test]
    fn size_is_non_decreasing_in_the_linear_counting_range() {
        let mut state = filled(0..=SMALL_CAPACITY as u64);
        let mut previous = state.size();
        for key in (SMALL_CAPACITY as u64 + 1)..6_000 {
            state.insert(key);
            let size = state.size();
            assert!(size >= previous, "size fell from {previous} to {size} at key {key}");
            previous = size;
        }
    }
}
