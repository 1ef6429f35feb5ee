//! Module: config
//! Responsibility: host-tunable parameters for distinct counting, loaded from TOML.
//! Does not own: file discovery or environment overrides.
//! Boundary: validated once, then read by the function registry at resolve time.

use crate::{
    aggregate::FunctionKind,
    error::InternalError,
    estimator::sampling::{
        DEFAULT_MAX_SIZE_DEGREE, MAX_MAX_SIZE_DEGREE, MIN_MAX_SIZE_DEGREE, SamplingParams,
    },
};
use serde::{Deserialize, Serialize};

///
/// UniqConfig
///
/// Every field has a default, so an empty document is a valid config.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UniqConfig {
    /// Function that `countDistinct` resolves to.
    pub count_distinct_implementation: FunctionKind,
    pub sampling: SamplingConfig,
}

///
/// SamplingConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    /// Maximum table size degree for `uniq`; at most `2^(degree - 1)`
    /// hashes are retained per state.
    pub max_size_degree: u8,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_size_degree: DEFAULT_MAX_SIZE_DEGREE,
        }
    }
}

impl UniqConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, InternalError> {
        let config: Self = toml::from_str(source)
            .map_err(|err| InternalError::config(format!("invalid uniq config: {err}")))?;
        config.validate()?;

        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, InternalError> {
        toml::to_string(self)
            .map_err(|err| InternalError::config(format!("uniq config encode failed: {err}")))
    }

    pub fn validate(&self) -> Result<(), InternalError> {
        let degree = self.sampling.max_size_degree;
        if !(MIN_MAX_SIZE_DEGREE..=MAX_MAX_SIZE_DEGREE).contains(&degree) {
            return Err(InternalError::config(format!(
                "sampling.max_size_degree {degree} outside {MIN_MAX_SIZE_DEGREE}..={MAX_MAX_SIZE_DEGREE}"
            )));
        }

        Ok(())
    }

    #[must_use]
    pub const fn sampling_params(&self) -> SamplingParams {
        SamplingParams::new(self.sampling.max_size_degree)
    }
}

///
/// TESTS
///
