//! Module: aggregate
//! Responsibility: drive one (key encoder, estimator) pairing through the
//! aggregate-function lifecycle.
//! Does not own: group-by bookkeeping or the host's state storage.
//! Boundary: the host owns one state per group and calls back into this
//! module for every lifecycle step.

mod dispatch;
mod registry;
mod state;

pub use dispatch::UniqAggregate;
pub use registry::{COUNT_DISTINCT_ALIASES, FunctionKind, resolve_function};
pub use state::{StateVariant, UniqState};

use crate::{
    codec::{StateRead, StateWrite},
    column::Column,
    error::InternalError,
    estimator::Estimator,
    key::KeyEncoder,
    obs::sink::{MetricsEvent, record},
};
use std::ops::Range;

///
/// AggregateFunction
///
/// Lifecycle of one aggregate function over its group states.
/// `merge` is associative and commutative; partial states may be combined
/// in any tree shape.
///

pub trait AggregateFunction {
    type State;

    fn kind(&self) -> FunctionKind;

    fn initialize(&self) -> Self::State;

    /// Encode one row and fold it into `state`.
    fn add(&self, state: &mut Self::State, columns: &[Column], row: usize)
    -> Result<(), InternalError>;

    /// Fold a contiguous row range into `state`, checking the columns once.
    fn add_batch(
        &self,
        state: &mut Self::State,
        columns: &[Column],
        rows: Range<usize>,
    ) -> Result<(), InternalError>;

    fn merge(&self, state: &mut Self::State, other: &Self::State);

    fn serialize<W: StateWrite + ?Sized>(&self, state: &Self::State, out: &mut W);

    /// Replace `state` with a decoded payload. On error `state` is untouched.
    fn deserialize<R: StateRead + ?Sized>(
        &self,
        state: &mut Self::State,
        reader: &mut R,
    ) -> Result<(), InternalError>;

    fn finalize(&self, state: &Self::State) -> u64;
}

///
/// UniqFunction
///
/// Monomorphized pairing of one key encoder with one estimator.
/// All per-row work happens here, with no dynamic dispatch.
///

#[derive(Clone, Debug)]
pub struct UniqFunction<E, K>
where
    E: Estimator,
    K: KeyEncoder<Key = E::Key>,
{
    kind: FunctionKind,
    encoder: K,
    params: E::Params,
}

impl<E, K> UniqFunction<E, K>
where
    E: Estimator,
    K: KeyEncoder<Key = E::Key>,
{
    #[must_use]
    pub const fn new(kind: FunctionKind, encoder: K, params: E::Params) -> Self {
        Self {
            kind,
            encoder,
            params,
        }
    }

    #[must_use]
    pub const fn encoder(&self) -> &K {
        &self.encoder
    }
}

impl<E, K> AggregateFunction for UniqFunction<E, K>
where
    E: Estimator,
    K: KeyEncoder<Key = E::Key>,
{
    type State = E;

    fn kind(&self) -> FunctionKind {
        self.kind
    }

    fn initialize(&self) -> E {
        record(MetricsEvent::StateInit {
            function: self.kind.name(),
        });

        E::new(self.params)
    }

    fn add(&self, state: &mut E, columns: &[Column], row: usize) -> Result<(), InternalError> {
        let key = self.encoder.encode(columns, row)?;
        state.insert(key);

        Ok(())
    }

    fn add_batch(
        &self,
        state: &mut E,
        columns: &[Column],
        rows: Range<usize>,
    ) -> Result<(), InternalError> {
        let count = rows.len() as u64;
        self.encoder
            .encode_batch(columns, rows, |key| state.insert(key))?;

        record(MetricsEvent::RowsAdded {
            function: self.kind.name(),
            rows: count,
        });

        Ok(())
    }

    fn merge(&self, state: &mut E, other: &E) {
        state.merge(other);

        record(MetricsEvent::StateMerge {
            function: self.kind.name(),
        });
    }

    fn serialize<W: StateWrite + ?Sized>(&self, state: &E, out: &mut W) {
        state.write(out);
    }

    fn deserialize<R: StateRead + ?Sized>(
        &self,
        state: &mut E,
        reader: &mut R,
    ) -> Result<(), InternalError> {
        match E::read(self.params, reader) {
            Ok(decoded) => {
                *state = decoded;
                Ok(())
            }
            Err(source) => {
                record(MetricsEvent::StateDecodeRejected {
                    function: self.kind.name(),
                });
                Err(InternalError::corrupted_state(self.kind.name(), source))
            }
        }
    }

    fn finalize(&self, state: &E) -> u64 {
        state.size()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::SliceReader,
        column::StringColumn,
        estimator::ExactKey128,
        key::{ArgumentShape, ArgumentType, ExactWideEncoder},
        obs::{metrics_report, metrics_reset_all},
    };
    use uniqdb_primitives::ValueKind;

    fn exact_text() -> UniqFunction<ExactKey128, ExactWideEncoder> {
        let shape =
            ArgumentShape::resolve("uniqExact", &[ArgumentType::Scalar(ValueKind::Text)])
                .expect("text shape resolves");
        let encoder = ExactWideEncoder::bind(shape).expect("text shape binds");

        UniqFunction::new(FunctionKind::UniqExact, encoder, ())
    }

    fn text(values: &[&str]) -> [Column; 1] {
        [Column::Text(values.iter().collect::<StringColumn>())]
    }

    #[test]
    fn row_and_batch_paths_agree() {
        let function = exact_text();
        let columns = text(&["a", "a", "b", "c", "bb", "b"]);

        let mut by_row = function.initialize();
        for row in 0..6 {
            function
                .add(&mut by_row, &columns, row)
                .expect("row add should succeed");
        }
        let mut by_batch = function.initialize();
        function
            .add_batch(&mut by_batch, &columns, 0..6)
            .expect("batch add should succeed");

        assert_eq!(function.finalize(&by_row), 4);
        assert_eq!(function.finalize(&by_batch), 4);
    }

    #[test]
    fn batch_records_rows_added() {
        metrics_reset_all();
        let function = exact_text();
        let mut state = function.initialize();
        function
            .add_batch(&mut state, &text(&["x", "y", "z"]), 0..3)
            .expect("batch add should succeed");

        let counters = metrics_report(None)
            .counters
            .expect("metrics report should include counters");
        let exact = counters
            .functions
            .get("uniqExact")
            .expect("uniqExact counters should be present");
        assert_eq!(exact.states_initialized, 1);
        assert_eq!(exact.rows_added, 3);
    }

    #[test]
    fn rejected_payload_leaves_state_untouched() {
        let function = exact_text();
        let mut state = function.initialize();
        function
            .add_batch(&mut state, &text(&["keep", "me"]), 0..2)
            .expect("batch add should succeed");

        let truncated = [5u8, 1, 2, 3];
        let err = function
            .deserialize(&mut state, &mut SliceReader::new(&truncated))
            .expect_err("truncated payload must be rejected");

        assert!(err.is_corrupted_state());
        assert_eq!(function.finalize(&state), 2);
    }
}
