//! Module: column
//! Responsibility: typed column accessors consumed by the key encoders.
//! Does not own: host storage formats or type casting.
//! Boundary: the host materializes argument columns into these shapes.

use uniqdb_primitives::ValueKind;

/// Trailing zero bytes kept after the last string so a 16-byte window
/// starting at any row (including an empty last row) stays in bounds.
pub const STRING_PADDING: usize = 16;

///
/// StringColumn
///
/// Variable-width byte strings stored back to back with an offsets table.
///

#[derive(Clone, Debug)]
pub struct StringColumn {
    offsets: Vec<usize>,
    bytes: Vec<u8>,
}

impl StringColumn {
    #[must_use]
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            bytes: vec![0; STRING_PADDING],
        }
    }

    pub fn push(&mut self, value: impl AsRef<[u8]>) {
        let value = value.as_ref();
        self.bytes.truncate(self.bytes.len() - STRING_PADDING);
        self.bytes.extend_from_slice(value);
        self.offsets.push(self.bytes.len());
        self.bytes.resize(self.bytes.len() + STRING_PADDING, 0);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the raw bytes of one row.
    #[must_use]
    pub fn bytes_at(&self, row: usize) -> &[u8] {
        &self.bytes[self.offsets[row]..self.offsets[row + 1]]
    }

    /// Return the 16-byte window starting at one row's first byte, when the
    /// row is short enough for the embedded-key path.
    #[must_use]
    pub fn short_window_at(&self, row: usize) -> Option<(&[u8; 16], usize)> {
        let start = self.offsets[row];
        let len = self.offsets[row + 1] - start;
        if len >= 16 {
            return None;
        }

        let window = self.bytes[start..start + 16].try_into().ok()?;
        Some((window, len))
    }
}

impl Default for StringColumn {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AsRef<[u8]>> FromIterator<S> for StringColumn {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut column = Self::new();
        for value in iter {
            column.push(value);
        }
        column
    }
}

///
/// Column
///
/// One argument column. Tuple columns carry their element columns and are
/// expanded by the variadic encoders.
///

#[derive(Clone, Debug)]
pub enum Column {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Int128(Vec<i128>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    UInt128(Vec<u128>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Text(StringColumn),
    Tuple(Vec<Self>),
}

impl Column {
    /// Return the value kind of a scalar column, or `None` for tuples.
    #[must_use]
    pub const fn kind(&self) -> Option<ValueKind> {
        let kind = match self {
            Self::Int8(_) => ValueKind::Int8,
            Self::Int16(_) => ValueKind::Int16,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::Int128(_) => ValueKind::Int128,
            Self::UInt8(_) => ValueKind::UInt8,
            Self::UInt16(_) => ValueKind::UInt16,
            Self::UInt32(_) => ValueKind::UInt32,
            Self::UInt64(_) => ValueKind::UInt64,
            Self::UInt128(_) => ValueKind::UInt128,
            Self::Float32(_) => ValueKind::Float32,
            Self::Float64(_) => ValueKind::Float64,
            Self::Text(_) => ValueKind::Text,
            Self::Tuple(_) => return None,
        };

        Some(kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Int128(v) => v.len(),
            Self::UInt8(v) => v.len(),
            Self::UInt16(v) => v.len(),
            Self::UInt32(v) => v.len(),
            Self::UInt64(v) => v.len(),
            Self::UInt128(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Text(v) => v.len(),
            Self::Tuple(elements) => elements.first().map_or(0, Self::len),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return one scalar row value, or `None` for tuple columns.
    #[must_use]
    pub fn value_at(&self, row: usize) -> Option<ValueRef<'_>> {
        let value = match self {
            Self::Int8(v) => ValueRef::Int(i64::from(v[row]), 1),
            Self::Int16(v) => ValueRef::Int(i64::from(v[row]), 2),
            Self::Int32(v) => ValueRef::Int(i64::from(v[row]), 4),
            Self::Int64(v) => ValueRef::Int(v[row], 8),
            Self::UInt8(v) => ValueRef::UInt(u64::from(v[row]), 1),
            Self::UInt16(v) => ValueRef::UInt(u64::from(v[row]), 2),
            Self::UInt32(v) => ValueRef::UInt(u64::from(v[row]), 4),
            Self::UInt64(v) => ValueRef::UInt(v[row], 8),
            Self::Int128(v) => ValueRef::Wide(v[row].cast_unsigned()),
            Self::UInt128(v) => ValueRef::Wide(v[row]),
            Self::Float32(v) => ValueRef::Float32(v[row]),
            Self::Float64(v) => ValueRef::Float64(v[row]),
            Self::Text(v) => ValueRef::Text(v.bytes_at(row)),
            Self::Tuple(_) => return None,
        };

        Some(value)
    }
}

///
/// ValueRef
///
/// Borrowed view of one scalar row value.
/// Integers keep their native byte width so variadic hashing stays
/// width-sensitive.
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueRef<'a> {
    Int(i64, u8),
    UInt(u64, u8),
    Wide(u128),
    Float32(f32),
    Float64(f64),
    Text(&'a [u8]),
}

///
/// TESTS
///
