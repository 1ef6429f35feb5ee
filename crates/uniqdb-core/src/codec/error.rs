//! Module: codec::error
//! Responsibility: stable reason taxonomy for partial-aggregate decode failures.
//! Does not own: error class mapping.
//! Boundary: produced by state readers, mapped by `InternalError::corrupted_state`.

use thiserror::Error as ThisError;

///
/// CodecError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CodecError {
    #[error("payload truncated")]
    Truncated,

    #[error("varint exceeds 64 bits")]
    VarintOverflow,

    #[error("element count {len} exceeds limit {max}")]
    LengthLimitExceeded { len: u64, max: u64 },

    #[error("unknown state tag {tag}")]
    UnknownTag { tag: u8 },

    #[error("{reason}")]
    Invalid { reason: &'static str },
}

pub(crate) const ERR_SKIP_DEGREE_RANGE: &str = "skip degree out of range";
pub(crate) const ERR_HASH_FAILS_SKIP_MASK: &str = "retained hash fails the skip mask";
pub(crate) const ERR_DUPLICATE_KEY: &str = "duplicate key in serialized set";
pub(crate) const ERR_REGISTER_RANK_RANGE: &str = "register rank out of range";
