//! Module: estimator::registers
//! Responsibility: 4096 packed 5-bit bucket registers and the HyperLogLog read-out.
//! Does not own: the small-set phase or the state wire tag.
//! Boundary: registers only grow; merge is bucket-wise max.

use crate::codec::{CodecError, ERR_REGISTER_RANK_RANGE, StateRead, StateWrite};

pub(crate) const BUCKET_BITS: u32 = 12;
pub(crate) const BUCKET_COUNT: usize = 1 << BUCKET_BITS;
const REGISTER_BITS: usize = 5;
const REGISTER_MASK: u16 = (1 << REGISTER_BITS) - 1;
pub(crate) const PACKED_LEN: usize = BUCKET_COUNT * REGISTER_BITS / 8;

const BUCKET_MASK: u32 = (1 << BUCKET_BITS) - 1;

/// Largest rank a 32-bit hash can produce: all 20 non-bucket bits zero.
pub(crate) const MAX_RANK: u8 = 21;

const TWO_POW_32: f64 = 4_294_967_296.0;

///
/// Registers
///
/// Bit-packed register file, least significant bit first.
/// Register `i` occupies bits `5i..5i+5` of `packed`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Registers {
    packed: Box<[u8; PACKED_LEN]>,
}

impl Registers {
    pub(crate) fn new() -> Self {
        Self {
            packed: Box::new([0; PACKED_LEN]),
        }
    }

    #[expect(clippy::cast_possible_truncation)]
    pub(crate) fn get(&self, bucket: usize) -> u8 {
        let bit = bucket * REGISTER_BITS;
        let byte = bit / 8;
        let low = u16::from(self.packed[byte]);
        let high = self.packed.get(byte + 1).copied().map_or(0, u16::from);
        let word = low | (high << 8);

        ((word >> (bit % 8)) & REGISTER_MASK) as u8
    }

    #[expect(clippy::cast_possible_truncation)]
    fn set(&mut self, bucket: usize, rank: u8) {
        let bit = bucket * REGISTER_BITS;
        let byte = bit / 8;
        let shift = bit % 8;
        let cleared = !(REGISTER_MASK << shift);
        let value = u16::from(rank) << shift;

        self.packed[byte] = (u16::from(self.packed[byte]) & cleared | value) as u8;
        if let Some(next) = self.packed.get_mut(byte + 1) {
            *next = ((u16::from(*next) << 8 & cleared | value) >> 8) as u8;
        }
    }

    /// Fold one 32-bit hash in: the low 12 bits pick the bucket, the rank is
    /// the leading-zero run of the remaining 20 bits plus one.
    pub(crate) fn observe(&mut self, hash: u32) {
        let bucket = (hash & BUCKET_MASK) as usize;
        let rest = hash >> BUCKET_BITS;

        #[expect(clippy::cast_possible_truncation)]
        let rank = (rest.leading_zeros() - BUCKET_BITS + 1) as u8;

        if rank > self.get(bucket) {
            self.set(bucket, rank);
        }
    }

    pub(crate) fn merge(&mut self, other: &Self) {
        for bucket in 0..BUCKET_COUNT {
            let rank = other.get(bucket);
            if rank > self.get(bucket) {
                self.set(bucket, rank);
            }
        }
    }

    /// HyperLogLog estimate with small-range linear counting and
    /// large-range correction for a 32-bit hash space.
    #[expect(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub(crate) fn estimate(&self) -> u64 {
        let m = BUCKET_COUNT as f64;
        let alpha = 0.7213 / (1.0 + 1.079 / m);

        let mut sum = 0.0;
        let mut zeros = 0usize;
        for bucket in 0..BUCKET_COUNT {
            let rank = self.get(bucket);
            if rank == 0 {
                zeros += 1;
            }
            sum += 1.0 / f64::from(1u32 << rank);
        }

        let raw = alpha * m * m / sum;
        let estimate = if raw <= 2.5 * m && zeros > 0 {
            m * (m / zeros as f64).ln()
        } else if raw > TWO_POW_32 / 30.0 && raw < TWO_POW_32 {
            -TWO_POW_32 * (1.0 - raw / TWO_POW_32).ln()
        } else {
            raw
        };

        estimate.round().max(0.0) as u64
    }

    pub(crate) fn write<W: StateWrite + ?Sized>(&self, out: &mut W) {
        out.write_all(self.packed.as_slice());
    }

    pub(crate) fn read<R: StateRead + ?Sized>(reader: &mut R) -> Result<Self, CodecError> {
        let mut registers = Self::new();
        reader.read_exact(registers.packed.as_mut_slice())?;

        if (0..BUCKET_COUNT).any(|bucket| registers.get(bucket) > MAX_RANK) {
            return Err(CodecError::Invalid {
                reason: ERR_REGISTER_RANK_RANGE,
            });
        }

        Ok(registers)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SliceReader;

    #[test]
    fn packed_layout_is_2560_bytes() {
        assert_eq!(PACKED_LEN, 2560);
        assert_eq!(MAX_RANK, 21);
    }

    #[test]
    fn set_and_get_do_not_disturb_neighbours() {
        let mut registers = Registers::new();
        for bucket in 0..BUCKET_COUNT {
            let rank = u8::try_from(bucket % 22).expect("rank fits in u8");
            registers.set(bucket, rank);
        }
        for bucket in 0..BUCKET_COUNT {
            let rank = u8::try_from(bucket % 22).expect("rank fits in u8");
            assert_eq!(registers.get(bucket), rank, "bucket {bucket}");
        }
    }

    #[test]
    fn observe_uses_low_bits_for_bucket_and_leading_zeros_for_rank() {
        let mut registers = Registers::new();
        registers.observe(0x8000_0005);
        assert_eq!(registers.get(5), 1);

        registers.observe(0x0000_1005);
        assert_eq!(registers.get(5), 20);

        registers.observe(0x0000_0007);
        assert_eq!(registers.get(7), MAX_RANK);

        registers.observe(0x8000_0005);
        assert_eq!(registers.get(5), 20, "registers never decrease");
    }

    #[test]
    fn empty_registers_estimate_zero() {
        assert_eq!(Registers::new().estimate(), 0);
    }

    #[test]
    fn read_rejects_rank_above_maximum() {
        let mut bytes = vec![0u8; PACKED_LEN];
        bytes[0] = 22;
        let err = Registers::read(&mut SliceReader::new(&bytes))
            .expect_err("rank 22 cannot be produced by a 32-bit hash");
        assert_eq!(
            err,
            CodecError::Invalid {
                reason: ERR_REGISTER_RANK_RANGE
            }
        );
    }

    #[test]
    fn read_rejects_truncated_register_file() {
        let bytes = vec![0u8; PACKED_LEN - 1];
        let err = Registers::read(&mut SliceReader::new(&bytes)).expect_err("short payload");
        assert_eq!(err, CodecError::Truncated);
    }
}
