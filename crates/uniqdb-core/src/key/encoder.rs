//! Module: key::encoder
//! Responsibility: bind an argument shape once, then turn rows into surrogate keys.
//! Does not own: hash primitives or string key layout.
//! Boundary: shape errors surface at bind time; column mismatches surface per call.

use crate::{
    column::{Column, ValueRef},
    error::InternalError,
    key::{
        Key128,
        hash::{digest_halves, digest64, fast_hash64, hash128_to_64},
        short_string::{exact_string_key, exact_window_key},
    },
};
use sha2::{Digest, Sha256};
use std::{fmt::Debug, ops::Range};
use uniqdb_primitives::{KeyWidth, ValueKind};

///
/// ArgumentType
///
/// Declared type of one aggregate argument.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ArgumentType {
    Scalar(ValueKind),
    Tuple(Vec<Self>),
}

///
/// ArgumentShape
///
/// Validated argument list. N explicit scalar arguments and one tuple
/// argument of N elements hash identically; only the column layout differs.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArgumentShape {
    kinds: Vec<ValueKind>,
    tuple: bool,
}

impl ArgumentShape {
    /// Validate a declared argument list for one function.
    pub fn resolve(function: &str, args: &[ArgumentType]) -> Result<Self, InternalError> {
        match args {
            [] => Err(InternalError::function_invalid_argument(format!(
                "{function} requires at least one argument"
            ))),
            [ArgumentType::Tuple(elements)] => {
                if elements.is_empty() {
                    return Err(InternalError::function_invalid_argument(format!(
                        "{function} does not accept an empty tuple"
                    )));
                }

                let kinds = elements
                    .iter()
                    .map(|element| match element {
                        ArgumentType::Scalar(kind) => Ok(*kind),
                        ArgumentType::Tuple(_) => Err(InternalError::function_invalid_argument(
                            format!("{function} does not accept nested tuples"),
                        )),
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Self { kinds, tuple: true })
            }
            _ => {
                let kinds = args
                    .iter()
                    .map(|arg| match arg {
                        ArgumentType::Scalar(kind) => Ok(*kind),
                        ArgumentType::Tuple(_) => Err(InternalError::function_invalid_argument(
                            format!("{function} cannot mix a tuple argument with other arguments"),
                        )),
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Self {
                    kinds,
                    tuple: false,
                })
            }
        }
    }

    /// Return the value kind when the shape is exactly one scalar argument.
    #[must_use]
    pub fn single(&self) -> Option<ValueKind> {
        match self.kinds.as_slice() {
            [kind] if !self.tuple => Some(*kind),
            _ => None,
        }
    }

    #[must_use]
    pub fn kinds(&self) -> &[ValueKind] {
        &self.kinds
    }

    #[must_use]
    pub const fn is_tuple(&self) -> bool {
        self.tuple
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.kinds.len()
    }

    // Select the element columns for this shape and check their kinds and
    // row counts against the bound arguments.
    fn bind_columns<'a>(
        &self,
        columns: &'a [Column],
        rows_end: usize,
    ) -> Result<&'a [Column], InternalError> {
        let elements = if self.tuple {
            match columns {
                [Column::Tuple(elements)] => elements.as_slice(),
                _ => {
                    return Err(InternalError::column_invalid_argument(format!(
                        "expected one tuple column of {} elements",
                        self.kinds.len()
                    )));
                }
            }
        } else {
            columns
        };

        if elements.len() != self.kinds.len() {
            return Err(InternalError::column_invalid_argument(format!(
                "expected {} argument columns, got {}",
                self.kinds.len(),
                elements.len()
            )));
        }

        for (idx, (column, kind)) in elements.iter().zip(&self.kinds).enumerate() {
            if column.kind() != Some(*kind) {
                let found = column.kind().map_or("Tuple", ValueKind::name);
                return Err(InternalError::column_invalid_argument(format!(
                    "argument {idx} holds {found} values, expected {kind}"
                )));
            }
            if column.len() < rows_end {
                return Err(InternalError::column_invalid_argument(format!(
                    "argument {idx} has {} rows, {rows_end} required",
                    column.len()
                )));
            }
        }

        Ok(elements)
    }

    fn bind_single<'a>(
        &self,
        columns: &'a [Column],
        rows_end: usize,
    ) -> Result<&'a Column, InternalError> {
        match self.bind_columns(columns, rows_end)? {
            [column] => Ok(column),
            _ => Err(InternalError::function_invariant(
                "single-argument encoder bound to a multi-argument shape",
            )),
        }
    }
}

///
/// KeyEncoder
///
/// Turns one row of argument columns into a surrogate key.
/// `encode_batch` checks the columns once and then loops without
/// per-row dispatch.
///

pub trait KeyEncoder: Clone + Debug + Send + Sync {
    type Key: Copy;

    fn shape(&self) -> &ArgumentShape;

    fn encode(&self, columns: &[Column], row: usize) -> Result<Self::Key, InternalError>;

    fn encode_batch<F>(
        &self,
        columns: &[Column],
        rows: Range<usize>,
        sink: F,
    ) -> Result<(), InternalError>
    where
        F: FnMut(Self::Key);
}

fn column_mismatch(kind: ValueKind, column: &Column) -> InternalError {
    let found = column.kind().map_or("Tuple", ValueKind::name);
    InternalError::column_invalid_argument(format!("expected {kind} column, got {found}"))
}

fn shape_mismatch(encoder: &str, shape: &ArgumentShape) -> InternalError {
    InternalError::function_invalid_argument(format!(
        "{encoder} cannot bind arguments {:?}",
        shape.kinds()
    ))
}

// Loop over one typed slice and emit a key per value.
macro_rules! emit_keys {
    ($values:expr, $rows:expr, $sink:ident, |$value:ident| $key:expr) => {
        for &$value in &$values[$rows] {
            $sink($key);
        }
    };
}

///
/// HashedScalarEncoder
///
/// Approximate-path key for one scalar argument: integers widen by value,
/// floats keep their bit pattern, wide integers take a SHA-256 prefix and
/// strings take XXH3-64.
///

#[derive(Clone, Debug)]
pub struct HashedScalarEncoder {
    shape: ArgumentShape,
    kind: ValueKind,
}

impl HashedScalarEncoder {
    pub fn bind(shape: ArgumentShape) -> Result<Self, InternalError> {
        let kind = shape
            .single()
            .ok_or_else(|| shape_mismatch("HashedScalarEncoder", &shape))?;

        Ok(Self { shape, kind })
    }

    fn value_key(value: ValueRef<'_>) -> u64 {
        match value {
            ValueRef::Int(v, _) => v.cast_unsigned(),
            ValueRef::UInt(v, _) => v,
            ValueRef::Wide(v) => digest64(&v.to_le_bytes()),
            ValueRef::Float32(v) => u64::from(v.to_bits()),
            ValueRef::Float64(v) => v.to_bits(),
            ValueRef::Text(bytes) => fast_hash64(bytes),
        }
    }
}

impl KeyEncoder for HashedScalarEncoder {
    type Key = u64;

    fn shape(&self) -> &ArgumentShape {
        &self.shape
    }

    fn encode(&self, columns: &[Column], row: usize) -> Result<u64, InternalError> {
        let column = self.shape.bind_single(columns, row.saturating_add(1))?;
        let value = column
            .value_at(row)
            .ok_or_else(|| column_mismatch(self.kind, column))?;

        Ok(Self::value_key(value))
    }

    fn encode_batch<F>(
        &self,
        columns: &[Column],
        rows: Range<usize>,
        mut sink: F,
    ) -> Result<(), InternalError>
    where
        F: FnMut(u64),
    {
        let column = self.shape.bind_single(columns, rows.end)?;
        if rows.is_empty() {
            return Ok(());
        }

        match column {
            Column::Int8(v) => emit_keys!(v, rows, sink, |x| i64::from(x).cast_unsigned()),
            Column::Int16(v) => emit_keys!(v, rows, sink, |x| i64::from(x).cast_unsigned()),
            Column::Int32(v) => emit_keys!(v, rows, sink, |x| i64::from(x).cast_unsigned()),
            Column::Int64(v) => emit_keys!(v, rows, sink, |x| x.cast_unsigned()),
            Column::Int128(v) => emit_keys!(v, rows, sink, |x| digest64(&x.to_le_bytes())),
            Column::UInt8(v) => emit_keys!(v, rows, sink, |x| u64::from(x)),
            Column::UInt16(v) => emit_keys!(v, rows, sink, |x| u64::from(x)),
            Column::UInt32(v) => emit_keys!(v, rows, sink, |x| u64::from(x)),
            Column::UInt64(v) => emit_keys!(v, rows, sink, |x| x),
            Column::UInt128(v) => emit_keys!(v, rows, sink, |x| digest64(&x.to_le_bytes())),
            Column::Float32(v) => emit_keys!(v, rows, sink, |x| u64::from(x.to_bits())),
            Column::Float64(v) => emit_keys!(v, rows, sink, |x| x.to_bits()),
            Column::Text(strings) => {
                for row in rows {
                    sink(fast_hash64(strings.bytes_at(row)));
                }
            }
            Column::Tuple(_) => return Err(column_mismatch(self.kind, column)),
        }

        Ok(())
    }
}

///
/// ExactNarrowEncoder
///
/// Exact-path key for one numeric argument of at most 64 bits: the value
/// itself, widened. Lossless, so distinct values never share a key.
///

#[derive(Clone, Debug)]
pub struct ExactNarrowEncoder {
    shape: ArgumentShape,
    kind: ValueKind,
}

impl ExactNarrowEncoder {
    pub fn bind(shape: ArgumentShape) -> Result<Self, InternalError> {
        match shape.single() {
            Some(kind) if kind.key_width() == KeyWidth::Narrow => Ok(Self { shape, kind }),
            _ => Err(shape_mismatch("ExactNarrowEncoder", &shape)),
        }
    }

    fn value_key(value: ValueRef<'_>) -> Option<u64> {
        match value {
            ValueRef::Int(v, _) => Some(v.cast_unsigned()),
            ValueRef::UInt(v, _) => Some(v),
            ValueRef::Float32(v) => Some(u64::from(v.to_bits())),
            ValueRef::Float64(v) => Some(v.to_bits()),
            ValueRef::Wide(_) | ValueRef::Text(_) => None,
        }
    }
}

impl KeyEncoder for ExactNarrowEncoder {
    type Key = u64;

    fn shape(&self) -> &ArgumentShape {
        &self.shape
    }

    fn encode(&self, columns: &[Column], row: usize) -> Result<u64, InternalError> {
        let column = self.shape.bind_single(columns, row.saturating_add(1))?;

        column
            .value_at(row)
            .and_then(Self::value_key)
            .ok_or_else(|| column_mismatch(self.kind, column))
    }

    fn encode_batch<F>(
        &self,
        columns: &[Column],
        rows: Range<usize>,
        mut sink: F,
    ) -> Result<(), InternalError>
    where
        F: FnMut(u64),
    {
        let column = self.shape.bind_single(columns, rows.end)?;
        if rows.is_empty() {
            return Ok(());
        }

        match column {
            Column::Int8(v) => emit_keys!(v, rows, sink, |x| i64::from(x).cast_unsigned()),
            Column::Int16(v) => emit_keys!(v, rows, sink, |x| i64::from(x).cast_unsigned()),
            Column::Int32(v) => emit_keys!(v, rows, sink, |x| i64::from(x).cast_unsigned()),
            Column::Int64(v) => emit_keys!(v, rows, sink, |x| x.cast_unsigned()),
            Column::UInt8(v) => emit_keys!(v, rows, sink, |x| u64::from(x)),
            Column::UInt16(v) => emit_keys!(v, rows, sink, |x| u64::from(x)),
            Column::UInt32(v) => emit_keys!(v, rows, sink, |x| u64::from(x)),
            Column::UInt64(v) => emit_keys!(v, rows, sink, |x| x),
            Column::Float32(v) => emit_keys!(v, rows, sink, |x| u64::from(x.to_bits())),
            Column::Float64(v) => emit_keys!(v, rows, sink, |x| x.to_bits()),
            Column::Int128(_) | Column::UInt128(_) | Column::Text(_) | Column::Tuple(_) => {
                return Err(column_mismatch(self.kind, column));
            }
        }

        Ok(())
    }
}

///
/// ExactWideEncoder
///
/// Exact-path 128-bit key for one wide-integer or string argument.
/// Wide integers are their own key; strings use the embedded/hashed layout.
///

#[derive(Clone, Debug)]
pub struct ExactWideEncoder {
    shape: ArgumentShape,
    kind: ValueKind,
}

impl ExactWideEncoder {
    pub fn bind(shape: ArgumentShape) -> Result<Self, InternalError> {
        match shape.single() {
            Some(kind) if kind.key_width() == KeyWidth::Wide => Ok(Self { shape, kind }),
            _ => Err(shape_mismatch("ExactWideEncoder", &shape)),
        }
    }

    fn value_key(value: ValueRef<'_>) -> Option<Key128> {
        match value {
            ValueRef::Wide(v) => Some(Key128::from_u128(v)),
            ValueRef::Text(bytes) => Some(exact_string_key(bytes)),
            ValueRef::Int(..) | ValueRef::UInt(..) | ValueRef::Float32(_) | ValueRef::Float64(_) => {
                None
            }
        }
    }
}

impl KeyEncoder for ExactWideEncoder {
    type Key = Key128;

    fn shape(&self) -> &ArgumentShape {
        &self.shape
    }

    fn encode(&self, columns: &[Column], row: usize) -> Result<Key128, InternalError> {
        let column = self.shape.bind_single(columns, row.saturating_add(1))?;

        column
            .value_at(row)
            .and_then(Self::value_key)
            .ok_or_else(|| column_mismatch(self.kind, column))
    }

    fn encode_batch<F>(
        &self,
        columns: &[Column],
        rows: Range<usize>,
        mut sink: F,
    ) -> Result<(), InternalError>
    where
        F: FnMut(Key128),
    {
        let column = self.shape.bind_single(columns, rows.end)?;
        if rows.is_empty() {
            return Ok(());
        }

        match column {
            Column::Int128(v) => emit_keys!(v, rows, sink, |x| Key128::from_u128(x.cast_unsigned())),
            Column::UInt128(v) => emit_keys!(v, rows, sink, |x| Key128::from_u128(x)),
            Column::Text(strings) => {
                for row in rows {
                    let key = match strings.short_window_at(row) {
                        Some((window, len)) => exact_window_key(window, len),
                        None => exact_string_key(strings.bytes_at(row)),
                    };
                    sink(key);
                }
            }
            _ => return Err(column_mismatch(self.kind, column)),
        }

        Ok(())
    }
}

// Hand one value's native little-endian bytes (or raw string bytes) to `f`.
// Integers keep their declared width so `1u8` and `1u16` differ.
fn with_native_bytes<R>(value: ValueRef<'_>, f: impl FnOnce(&[u8]) -> R) -> R {
    match value {
        ValueRef::Int(v, width) => f(&v.to_le_bytes()[..usize::from(width)]),
        ValueRef::UInt(v, width) => f(&v.to_le_bytes()[..usize::from(width)]),
        ValueRef::Wide(v) => f(&v.to_le_bytes()),
        ValueRef::Float32(v) => f(&v.to_bits().to_le_bytes()),
        ValueRef::Float64(v) => f(&v.to_bits().to_le_bytes()),
        ValueRef::Text(bytes) => f(bytes),
    }
}

fn element_value<'a>(column: &'a Column, row: usize) -> Result<ValueRef<'a>, InternalError> {
    column
        .value_at(row)
        .ok_or_else(|| InternalError::column_invalid_argument("nested tuple column"))
}

///
/// HashedTupleEncoder
///
/// Approximate-path key for several arguments: per-value XXH3-64 folded
/// left to right with `hash128_to_64`.
///

#[derive(Clone, Debug)]
pub struct HashedTupleEncoder {
    shape: ArgumentShape,
}

impl HashedTupleEncoder {
    #[must_use]
    pub const fn bind(shape: ArgumentShape) -> Self {
        Self { shape }
    }

    fn row_key(elements: &[Column], row: usize) -> Result<u64, InternalError> {
        let mut folded = None;
        for column in elements {
            let hash = with_native_bytes(element_value(column, row)?, fast_hash64);
            folded = Some(match folded {
                None => hash,
                Some(acc) => hash128_to_64(acc, hash),
            });
        }

        folded.ok_or_else(|| InternalError::function_invariant("variadic row has no values"))
    }
}

impl KeyEncoder for HashedTupleEncoder {
    type Key = u64;

    fn shape(&self) -> &ArgumentShape {
        &self.shape
    }

    fn encode(&self, columns: &[Column], row: usize) -> Result<u64, InternalError> {
        let elements = self.shape.bind_columns(columns, row.saturating_add(1))?;

        Self::row_key(elements, row)
    }

    fn encode_batch<F>(
        &self,
        columns: &[Column],
        rows: Range<usize>,
        mut sink: F,
    ) -> Result<(), InternalError>
    where
        F: FnMut(u64),
    {
        let elements = self.shape.bind_columns(columns, rows.end)?;
        for row in rows {
            sink(Self::row_key(elements, row)?);
        }

        Ok(())
    }
}

///
/// DigestTupleEncoder
///
/// Exact-path key for several arguments: one streaming SHA-256 over every
/// value in argument order, strings length-prefixed, first 16 digest bytes.
///

#[derive(Clone, Debug)]
pub struct DigestTupleEncoder {
    shape: ArgumentShape,
}

impl DigestTupleEncoder {
    #[must_use]
    pub const fn bind(shape: ArgumentShape) -> Self {
        Self { shape }
    }

    fn row_key(elements: &[Column], row: usize) -> Result<Key128, InternalError> {
        let mut hasher = Sha256::new();
        for column in elements {
            let value = element_value(column, row)?;
            if let ValueRef::Text(bytes) = value {
                hasher.update((bytes.len() as u64).to_le_bytes());
            }
            with_native_bytes(value, |bytes| hasher.update(bytes));
        }

        let (low, high) = digest_halves(&hasher.finalize());
        Ok(Key128::new(low, high))
    }
}

impl KeyEncoder for DigestTupleEncoder {
    type Key = Key128;

    fn shape(&self) -> &ArgumentShape {
        &self.shape
    }

    fn encode(&self, columns: &[Column], row: usize) -> Result<Key128, InternalError> {
        let elements = self.shape.bind_columns(columns, row.saturating_add(1))?;

        Self::row_key(elements, row)
    }

    fn encode_batch<F>(
        &self,
        columns: &[Column],
        rows: Range<usize>,
        mut sink: F,
    ) -> Result<(), InternalError>
    where
        F: FnMut(Key128),
    {
        let elements = self.shape.bind_columns(columns, rows.end)?;
        for row in rows {
            sink(Self::row_key(elements, row)?);
        }

        Ok(())
    }
}

///
/// TESTS
///
