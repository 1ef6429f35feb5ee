use crate::{
    aggregate::{AggregateFunction, UniqFunction},
    estimator::{ExactKey128, ExactU64, HybridEstimator, SamplingEstimator},
    key::{
        DigestTupleEncoder, ExactNarrowEncoder, ExactWideEncoder, HashedScalarEncoder,
        HashedTupleEncoder,
    },
};

///
/// UniqState
///
/// Closed set of group states a resolved function can own.
/// One variant per (estimator, key encoder) pairing, so a state only ever
/// meets functions that encode keys the same way.
///

#[derive(Clone, Debug)]
pub enum UniqState {
    Sampling(SamplingEstimator),
    SamplingVariadic(SamplingEstimator),
    Hybrid(HybridEstimator),
    HybridVariadic(HybridEstimator),
    ExactNarrow(ExactU64),
    ExactWide(ExactKey128),
    ExactVariadic(ExactKey128),
}

impl UniqState {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Sampling(_) => "Sampling",
            Self::SamplingVariadic(_) => "SamplingVariadic",
            Self::Hybrid(_) => "Hybrid",
            Self::HybridVariadic(_) => "HybridVariadic",
            Self::ExactNarrow(_) => "ExactNarrow",
            Self::ExactWide(_) => "ExactWide",
            Self::ExactVariadic(_) => "ExactVariadic",
        }
    }
}

///
/// StateVariant
///
/// Typed access from a concrete pairing into its `UniqState` variant.
///

pub trait StateVariant: AggregateFunction + Sized {
    fn wrap(state: Self::State) -> UniqState;

    fn peek(state: &UniqState) -> Option<&Self::State>;

    fn peek_mut(state: &mut UniqState) -> Option<&mut Self::State>;
}

macro_rules! state_variant {
    ($estimator:ty, $encoder:ty, $variant:ident) => {
        impl StateVariant for UniqFunction<$estimator, $encoder> {
            fn wrap(state: $estimator) -> UniqState {
                UniqState::$variant(state)
            }

            fn peek(state: &UniqState) -> Option<&$estimator> {
                match state {
                    UniqState::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn peek_mut(state: &mut UniqState) -> Option<&mut $estimator> {
                match state {
                    UniqState::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

state_variant!(SamplingEstimator, HashedScalarEncoder, Sampling);
state_variant!(SamplingEstimator, HashedTupleEncoder, SamplingVariadic);
state_variant!(HybridEstimator, HashedScalarEncoder, Hybrid);
state_variant!(HybridEstimator, HashedTupleEncoder, HybridVariadic);
state_variant!(ExactU64, ExactNarrowEncoder, ExactNarrow);
state_variant!(ExactKey128, ExactWideEncoder, ExactWide);
state_variant!(ExactKey128, DigestTupleEncoder, ExactVariadic);
