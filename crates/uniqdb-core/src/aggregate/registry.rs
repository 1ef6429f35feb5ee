//! Module: aggregate::registry
//! Responsibility: map a function name plus argument types to a bound aggregate.
//! Does not own: the pairings themselves.
//! Boundary: called once per query, never per row.

use crate::{
    aggregate::UniqAggregate,
    config::UniqConfig,
    error::InternalError,
    key::{ArgumentShape, ArgumentType},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names that resolve to `UniqConfig::count_distinct_implementation`.
pub const COUNT_DISTINCT_ALIASES: [&str; 2] = ["countDistinct", "count_distinct"];

///
/// FunctionKind
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum FunctionKind {
    #[serde(rename = "uniq")]
    Uniq,

    #[serde(rename = "uniqHLL12")]
    UniqHll12,

    #[default]
    #[serde(rename = "uniqExact")]
    UniqExact,
}

impl FunctionKind {
    pub const ALL: [Self; 3] = [Self::Uniq, Self::UniqHll12, Self::UniqExact];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uniq => "uniq",
            Self::UniqHll12 => "uniqHLL12",
            Self::UniqExact => "uniqExact",
        }
    }

    /// Case-sensitive lookup by function name; aliases are not included.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve a function call to a bound aggregate.
pub fn resolve_function(
    name: &str,
    args: &[ArgumentType],
    config: &UniqConfig,
) -> Result<UniqAggregate, InternalError> {
    let kind = if COUNT_DISTINCT_ALIASES.contains(&name) {
        config.count_distinct_implementation
    } else {
        FunctionKind::from_name(name).ok_or_else(|| {
            InternalError::function_unsupported(format!("unknown aggregate function '{name}'"))
        })?
    };

    let shape = ArgumentShape::resolve(kind.name(), args)?;

    UniqAggregate::bind(kind, shape, config)
}

///
/// TESTS
///
