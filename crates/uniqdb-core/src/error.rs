use crate::codec::CodecError;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Every fallible operation in the core reports through this type.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without structured detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a corruption error for a partial-aggregate payload that
    /// could not be decoded.
    pub(crate) fn corrupted_state(function: &str, source: CodecError) -> Self {
        Self {
            class: ErrorClass::Corruption,
            origin: ErrorOrigin::Serialize,
            message: format!("{function} state decode failed: {source}"),
            detail: Some(ErrorDetail::Codec(source)),
        }
    }

    /// Construct a function-setup invalid-argument error.
    pub(crate) fn function_invalid_argument(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvalidArgument,
            ErrorOrigin::Function,
            message.into(),
        )
    }

    /// Construct a column-shape invalid-argument error.
    pub(crate) fn column_invalid_argument(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvalidArgument,
            ErrorOrigin::Column,
            message.into(),
        )
    }

    /// Construct a function-origin unsupported error.
    pub(crate) fn function_unsupported(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::Unsupported,
            ErrorOrigin::Function,
            message.into(),
        )
    }

    /// Construct a function-origin invariant violation.
    pub(crate) fn function_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Function,
            message.into(),
        )
    }

    /// Construct a configuration error.
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Config, ErrorOrigin::Config, message.into())
    }

    #[must_use]
    pub const fn is_corrupted_state(&self) -> bool {
        matches!(self.class, ErrorClass::Corruption)
    }

    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self.class, ErrorClass::InvalidArgument)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Codec(CodecError),
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Corruption,
    InvalidArgument,
    Unsupported,
    InvariantViolation,
    Config,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Corruption => "corruption",
            Self::InvalidArgument => "invalid_argument",
            Self::Unsupported => "unsupported",
            Self::InvariantViolation => "invariant_violation",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Serialize,
    Function,
    Column,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Serialize => "serialize",
            Self::Function => "function",
            Self::Column => "column",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupted_state_carries_codec_detail() {
        let err = InternalError::corrupted_state("uniqExact", CodecError::Truncated);

        assert!(err.is_corrupted_state());
        assert_eq!(err.origin, ErrorOrigin::Serialize);
        assert!(
            matches!(err.detail, Some(ErrorDetail::Codec(CodecError::Truncated))),
            "unexpected detail: {err:?}"
        );
        assert!(
            err.message.starts_with("uniqExact state decode failed"),
            "unexpected message: {}",
            err.message
        );
    }

    #[test]
    fn display_with_class_uses_stable_labels() {
        let err = InternalError::function_invalid_argument("no arguments");
        assert_eq!(
            err.display_with_class(),
            "function:invalid_argument: no arguments"
        );
        assert!(err.is_invalid_argument());
    }
}
