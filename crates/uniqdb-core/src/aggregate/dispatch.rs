//! Module: aggregate::dispatch
//! Responsibility: closed-enum routing from a resolved function to its
//! monomorphized pairing.
//! Does not own: name resolution or per-row encoding.
//! Boundary: branches once per call, then hands off to `UniqFunction`.

use crate::{
    aggregate::{AggregateFunction, FunctionKind, StateVariant, UniqFunction, UniqState},
    codec::{SliceReader, StateRead, StateWrite},
    column::Column,
    config::UniqConfig,
    error::InternalError,
    estimator::{ExactKey128, ExactU64, HybridEstimator, SamplingEstimator},
    key::{
        ArgumentShape, DigestTupleEncoder, ExactNarrowEncoder, ExactWideEncoder,
        HashedScalarEncoder, HashedTupleEncoder, KeyEncoder,
    },
};
use std::ops::Range;
use uniqdb_primitives::{KeyWidth, ValueKind};

///
/// UniqAggregate
///
/// Every supported (estimator, key encoder) pairing.
/// Variadic variants hash a whole argument row into one key.
///

#[derive(Clone, Debug)]
pub enum UniqAggregate {
    Sampling(UniqFunction<SamplingEstimator, HashedScalarEncoder>),
    SamplingVariadic(UniqFunction<SamplingEstimator, HashedTupleEncoder>),
    Hybrid(UniqFunction<HybridEstimator, HashedScalarEncoder>),
    HybridVariadic(UniqFunction<HybridEstimator, HashedTupleEncoder>),
    ExactNarrow(UniqFunction<ExactU64, ExactNarrowEncoder>),
    ExactWide(UniqFunction<ExactKey128, ExactWideEncoder>),
    ExactVariadic(UniqFunction<ExactKey128, DigestTupleEncoder>),
}

macro_rules! with_function {
    ($aggregate:expr, |$function:ident| $body:expr) => {
        match $aggregate {
            UniqAggregate::Sampling($function) => $body,
            UniqAggregate::SamplingVariadic($function) => $body,
            UniqAggregate::Hybrid($function) => $body,
            UniqAggregate::HybridVariadic($function) => $body,
            UniqAggregate::ExactNarrow($function) => $body,
            UniqAggregate::ExactWide($function) => $body,
            UniqAggregate::ExactVariadic($function) => $body,
        }
    };
}

impl UniqAggregate {
    /// Every function returns an unsigned 64-bit count.
    pub const RETURN_KIND: ValueKind = ValueKind::UInt64;

    /// Bind `kind` to a resolved argument shape.
    pub fn bind(
        kind: FunctionKind,
        shape: ArgumentShape,
        config: &UniqConfig,
    ) -> Result<Self, InternalError> {
        config.validate()?;

        let aggregate = match (kind, shape.single()) {
            (FunctionKind::Uniq, Some(_)) => Self::Sampling(UniqFunction::new(
                kind,
                HashedScalarEncoder::bind(shape)?,
                config.sampling_params(),
            )),
            (FunctionKind::Uniq, None) => Self::SamplingVariadic(UniqFunction::new(
                kind,
                HashedTupleEncoder::bind(shape),
                config.sampling_params(),
            )),
            (FunctionKind::UniqHll12, Some(_)) => {
                Self::Hybrid(UniqFunction::new(kind, HashedScalarEncoder::bind(shape)?, ()))
            }
            (FunctionKind::UniqHll12, None) => {
                Self::HybridVariadic(UniqFunction::new(kind, HashedTupleEncoder::bind(shape), ()))
            }
            (FunctionKind::UniqExact, Some(value)) => match value.key_width() {
                KeyWidth::Narrow => {
                    Self::ExactNarrow(UniqFunction::new(kind, ExactNarrowEncoder::bind(shape)?, ()))
                }
                KeyWidth::Wide => {
                    Self::ExactWide(UniqFunction::new(kind, ExactWideEncoder::bind(shape)?, ()))
                }
            },
            (FunctionKind::UniqExact, None) => {
                Self::ExactVariadic(UniqFunction::new(kind, DigestTupleEncoder::bind(shape), ()))
            }
        };

        Ok(aggregate)
    }

    #[must_use]
    pub fn kind(&self) -> FunctionKind {
        with_function!(self, |function| function.kind())
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    #[must_use]
    pub fn shape(&self) -> &ArgumentShape {
        with_function!(self, |function| function.encoder().shape())
    }

    #[must_use]
    pub fn initialize(&self) -> UniqState {
        with_function!(self, |function| initial_state(function))
    }

    pub fn add(
        &self,
        state: &mut UniqState,
        columns: &[Column],
        row: usize,
    ) -> Result<(), InternalError> {
        with_function!(self, |function| function.add(
            owned_mut(function, state)?,
            columns,
            row
        ))
    }

    pub fn add_batch(
        &self,
        state: &mut UniqState,
        columns: &[Column],
        rows: Range<usize>,
    ) -> Result<(), InternalError> {
        with_function!(self, |function| function.add_batch(
            owned_mut(function, state)?,
            columns,
            rows
        ))
    }

    pub fn merge(&self, state: &mut UniqState, other: &UniqState) -> Result<(), InternalError> {
        with_function!(self, |function| {
            let other = owned(function, other)?;
            function.merge(owned_mut(function, state)?, other);

            Ok(())
        })
    }

    pub fn serialize<W: StateWrite + ?Sized>(
        &self,
        state: &UniqState,
        out: &mut W,
    ) -> Result<(), InternalError> {
        with_function!(self, |function| {
            function.serialize(owned(function, state)?, out);

            Ok(())
        })
    }

    /// Serialize into a fresh buffer.
    pub fn serialize_to_vec(&self, state: &UniqState) -> Result<Vec<u8>, InternalError> {
        let mut bytes = Vec::new();
        self.serialize(state, &mut bytes)?;

        Ok(bytes)
    }

    /// Replace `state` with a decoded payload; on error `state` is unchanged.
    pub fn deserialize<R: StateRead + ?Sized>(
        &self,
        state: &mut UniqState,
        reader: &mut R,
    ) -> Result<(), InternalError> {
        with_function!(self, |function| function.deserialize(
            owned_mut(function, state)?,
            reader
        ))
    }

    /// Decode one payload from a byte slice.
    pub fn deserialize_slice(
        &self,
        state: &mut UniqState,
        bytes: &[u8],
    ) -> Result<(), InternalError> {
        self.deserialize(state, &mut SliceReader::new(bytes))
    }

    pub fn finalize(&self, state: &UniqState) -> Result<u64, InternalError> {
        with_function!(self, |function| Ok(function.finalize(owned(function, state)?)))
    }
}

fn state_mismatch(kind: FunctionKind, label: &str) -> InternalError {
    InternalError::function_invariant(format!("{kind} cannot operate on a {label} state"))
}

fn initial_state<F: StateVariant>(function: &F) -> UniqState {
    F::wrap(function.initialize())
}

fn owned<'a, F: StateVariant>(
    function: &F,
    state: &'a UniqState,
) -> Result<&'a F::State, InternalError> {
    F::peek(state).ok_or_else(|| state_mismatch(function.kind(), state.label()))
}

fn owned_mut<'a, F: StateVariant>(
    function: &F,
    state: &'a mut UniqState,
) -> Result<&'a mut F::State, InternalError> {
    let label = state.label();
    F::peek_mut(state).ok_or_else(|| state_mismatch(function.kind(), label))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorClass, key::ArgumentType};

    fn bound(kind: FunctionKind, args: &[ArgumentType]) -> UniqAggregate {
        let shape = ArgumentShape::resolve(kind.name(), args).expect("shape resolves");
        UniqAggregate::bind(kind, shape, &UniqConfig::default()).expect("aggregate binds")
    }

    fn scalar(kind: ValueKind) -> ArgumentType {
        ArgumentType::Scalar(kind)
    }

    #[test]
    fn binds_expected_pairings() {
        let cases = [
            (FunctionKind::Uniq, vec![scalar(ValueKind::Int32)], "Sampling"),
            (
                FunctionKind::Uniq,
                vec![scalar(ValueKind::Int32), scalar(ValueKind::Text)],
                "SamplingVariadic",
            ),
            (FunctionKind::UniqHll12, vec![scalar(ValueKind::Text)], "Hybrid"),
            (
                FunctionKind::UniqHll12,
                vec![ArgumentType::Tuple(vec![scalar(ValueKind::UInt8)])],
                "HybridVariadic",
            ),
            (FunctionKind::UniqExact, vec![scalar(ValueKind::Float64)], "ExactNarrow"),
            (FunctionKind::UniqExact, vec![scalar(ValueKind::Int128)], "ExactWide"),
            (FunctionKind::UniqExact, vec![scalar(ValueKind::Text)], "ExactWide"),
            (
                FunctionKind::UniqExact,
                vec![scalar(ValueKind::Text), scalar(ValueKind::Text)],
                "ExactVariadic",
            ),
        ];

        for (kind, args, expected) in cases {
            let aggregate = bound(kind, &args);
            let variant = match aggregate {
                UniqAggregate::Sampling(_) => "Sampling",
                UniqAggregate::SamplingVariadic(_) => "SamplingVariadic",
                UniqAggregate::Hybrid(_) => "Hybrid",
                UniqAggregate::HybridVariadic(_) => "HybridVariadic",
                UniqAggregate::ExactNarrow(_) => "ExactNarrow",
                UniqAggregate::ExactWide(_) => "ExactWide",
                UniqAggregate::ExactVariadic(_) => "ExactVariadic",
            };
            assert_eq!(variant, expected, "{kind:?} over {args:?}");
            assert_eq!(aggregate.kind(), kind);
            assert_eq!(UniqAggregate::RETURN_KIND, ValueKind::UInt64);
        }
    }

    #[test]
    fn foreign_state_is_an_invariant_violation() {
        let exact = bound(FunctionKind::UniqExact, &[scalar(ValueKind::UInt64)]);
        let hybrid = bound(FunctionKind::UniqHll12, &[scalar(ValueKind::UInt64)]);

        let mut foreign = hybrid.initialize();
        let columns = [Column::UInt64(vec![1, 2, 3])];

        let err = exact
            .add_batch(&mut foreign, &columns, 0..3)
            .expect_err("hybrid state is not owned by uniqExact");
        assert_eq!(err.class, ErrorClass::InvariantViolation);
        assert!(err.message.contains("Hybrid"), "{}", err.message);

        let own = exact.initialize();
        let err = exact
            .merge(&mut foreign, &own)
            .expect_err("merge target must be owned");
        assert_eq!(err.class, ErrorClass::InvariantViolation);

        let err = exact.finalize(&foreign).expect_err("finalize on foreign state");
        assert_eq!(err.class, ErrorClass::InvariantViolation);
    }

    #[test]
    fn narrow_and_wide_exact_states_do_not_mix() {
        let narrow = bound(FunctionKind::UniqExact, &[scalar(ValueKind::Int64)]);
        let wide = bound(FunctionKind::UniqExact, &[scalar(ValueKind::Text)]);

        let mut state = narrow.initialize();
        let other = wide.initialize();
        let err = narrow
            .merge(&mut state, &other)
            .expect_err("wide state cannot merge into narrow");
        assert_eq!(err.class, ErrorClass::InvariantViolation);
    }

    #[test]
    fn scalar_and_variadic_states_do_not_mix() {
        let single = bound(FunctionKind::UniqExact, &[scalar(ValueKind::Text)]);
        let pair = bound(
            FunctionKind::UniqExact,
            &[scalar(ValueKind::Text), scalar(ValueKind::Text)],
        );

        let mut state = pair.initialize();
        let columns = [Column::Text(["a", "b"].iter().collect())];
        let mut other = single.initialize();
        single
            .add_batch(&mut other, &columns, 0..2)
            .expect("single-column add succeeds");

        let err = pair
            .merge(&mut state, &other)
            .expect_err("single-column state cannot merge into a variadic one");
        assert_eq!(err.class, ErrorClass::InvariantViolation);
        assert!(err.message.contains("ExactWide"), "{}", err.message);
        assert_eq!(pair.finalize(&state).expect("finalize"), 0);

        for kind in [FunctionKind::Uniq, FunctionKind::UniqHll12] {
            let single = bound(kind, &[scalar(ValueKind::Int32)]);
            let pair = bound(kind, &[scalar(ValueKind::Int32), scalar(ValueKind::Int32)]);

            let mut state = single.initialize();
            let err = single
                .merge(&mut state, &pair.initialize())
                .expect_err("variadic state cannot merge into a single-column one");
            assert_eq!(err.class, ErrorClass::InvariantViolation, "{kind}");
        }
    }

    #[test]
    fn enum_layer_round_trips_state() {
        let aggregate = bound(FunctionKind::Uniq, &[scalar(ValueKind::UInt32)]);
        let mut state = aggregate.initialize();
        let columns = [Column::UInt32((0..1_000).collect())];
        aggregate
            .add_batch(&mut state, &columns, 0..1_000)
            .expect("batch add succeeds");

        let bytes = aggregate.serialize_to_vec(&state).expect("state serializes");
        let mut decoded = aggregate.initialize();
        aggregate
            .deserialize_slice(&mut decoded, &bytes)
            .expect("payload decodes");

        assert_eq!(
            aggregate.finalize(&decoded).expect("finalize"),
            aggregate.finalize(&state).expect("finalize")
        );
    }
}
