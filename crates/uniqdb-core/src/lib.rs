//! Core distinct-counting runtime for UniqDB: key encoders, the sampling,
//! hybrid and exact estimators, and the aggregate functions `uniq`,
//! `uniqHLL12` and `uniqExact` built from them.

// public exports are one module level down
pub mod aggregate;
pub mod codec;
pub mod column;
pub mod config;
pub mod error;
pub mod estimator;
pub mod key;
pub mod obs;

///
/// Prelude
///
/// Types a host needs to resolve a function and drive its group states.
///

pub mod prelude {
    pub use crate::{
        aggregate::{FunctionKind, UniqAggregate, UniqState, resolve_function},
        column::{Column, StringColumn},
        config::UniqConfig,
        key::ArgumentType,
    };
}
