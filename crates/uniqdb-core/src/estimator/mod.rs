//! Module: estimator
//! Responsibility: mergeable, serializable distinct-count states over surrogate keys.
//! Does not own: key encoding or argument validation.
//! Boundary: estimators receive keys and never see row values.

pub mod exact;
pub mod hybrid;
mod registers;
pub mod sampling;

use crate::codec::{CodecError, StateRead, StateWrite};
use std::fmt::Debug;

pub use exact::{ExactEstimator, ExactKey128, ExactU64, TableKey};
pub use hybrid::HybridEstimator;
pub use sampling::SamplingEstimator;

///
/// Estimator
///
/// Shared capability set of every group state.
///
/// `merge` is associative and commutative in the observable result.
/// `read` decodes into a fresh state; callers swap it in only on success,
/// so a rejected payload never touches existing state.
///

pub trait Estimator: Clone + Debug + Send + Sync + Sized {
    type Key: Copy;
    type Params: Copy + Debug + Send + Sync;

    fn new(params: Self::Params) -> Self;

    fn insert(&mut self, key: Self::Key);

    fn merge(&mut self, other: &Self);

    fn write<W: StateWrite + ?Sized>(&self, out: &mut W);

    fn read<R: StateRead + ?Sized>(params: Self::Params, reader: &mut R)
    -> Result<Self, CodecError>;

    fn size(&self) -> u64;
}
