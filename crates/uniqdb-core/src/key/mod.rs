//! Module: key
//! Responsibility: canonical fixed-width surrogate keys for row values.
//! Does not own: set membership or cardinality estimation.
//! Boundary: encoders are bound once per function; estimators only see keys.

mod encoder;
pub mod hash;
mod short_string;

pub use encoder::{
    ArgumentShape, ArgumentType, DigestTupleEncoder, ExactNarrowEncoder, ExactWideEncoder,
    HashedScalarEncoder, HashedTupleEncoder, KeyEncoder,
};
pub use short_string::{MAX_EMBEDDED_LEN, exact_string_key, exact_window_key};

///
/// Key128
///
/// 128-bit surrogate key used by exact counting over strings, wide integers
/// and multi-argument rows.
///
/// The top bit of `high` marks a hashed key. Embedded short-string keys and
/// raw wide integers below 2^127 never set it.
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Key128 {
    pub low: u64,
    pub high: u64,
}

impl Key128 {
    pub const HASHED_TAG: u64 = 1 << 63;

    #[must_use]
    pub const fn new(low: u64, high: u64) -> Self {
        Self { low, high }
    }

    /// Split a 128-bit value into a key, low half first.
    #[must_use]
    #[expect(clippy::cast_possible_truncation)]
    pub const fn from_u128(value: u128) -> Self {
        Self {
            low: value as u64,
            high: (value >> 64) as u64,
        }
    }

    #[must_use]
    pub const fn is_hashed(self) -> bool {
        self.high & Self::HASHED_TAG != 0
    }
}
