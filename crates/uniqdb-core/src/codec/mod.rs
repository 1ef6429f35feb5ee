//! Module: codec
//! Responsibility: sequential little-endian stream used by state serialization.
//! Does not own: per-estimator wire layouts.
//! Boundary: the host supplies the stream; estimators write and read through it.

mod error;

pub use error::CodecError;
pub(crate) use error::{
    ERR_DUPLICATE_KEY, ERR_HASH_FAILS_SKIP_MASK, ERR_REGISTER_RANK_RANGE, ERR_SKIP_DEGREE_RANGE,
};

///
/// StateWrite
///
/// Sequential byte sink for partial-aggregate states.
/// Writes are infallible; a host stream that can fail aborts the whole
/// operation on its side.
///

pub trait StateWrite {
    fn write_all(&mut self, bytes: &[u8]);

    fn put_u8(&mut self, value: u8) {
        self.write_all(&[value]);
    }

    fn put_u64_le(&mut self, value: u64) {
        self.write_all(&value.to_le_bytes());
    }

    /// Write one unsigned LEB128 varint.
    fn put_var_uint(&mut self, mut value: u64) {
        let mut buf = [0u8; MAX_VAR_UINT_LEN];
        let mut len = 0;
        loop {
            #[expect(clippy::cast_possible_truncation)]
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                buf[len] = byte;
                len += 1;
                break;
            }
            buf[len] = byte | 0x80;
            len += 1;
        }
        self.write_all(&buf[..len]);
    }
}

impl StateWrite for Vec<u8> {
    fn write_all(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

///
/// StateRead
///
/// Sequential byte source for partial-aggregate states.
///

pub trait StateRead {
    fn read_exact(&mut self, out: &mut [u8]) -> Result<(), CodecError>;

    fn get_u8(&mut self) -> Result<u8, CodecError> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn get_u64_le(&mut self) -> Result<u64, CodecError> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read one unsigned LEB128 varint.
    fn get_var_uint(&mut self) -> Result<u64, CodecError> {
        let mut value = 0u64;
        for idx in 0..MAX_VAR_UINT_LEN {
            let byte = self.get_u8()?;
            let shift = idx * 7;
            let bits = u64::from(byte & 0x7F);
            if shift == 63 && bits > 1 {
                return Err(CodecError::VarintOverflow);
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }

        Err(CodecError::VarintOverflow)
    }

    /// Read an element count and enforce an upper bound before any allocation.
    fn get_len(&mut self, max: u64) -> Result<usize, CodecError> {
        let len = self.get_var_uint()?;
        if len > max {
            return Err(CodecError::LengthLimitExceeded { len, max });
        }

        usize::try_from(len).map_err(|_| CodecError::LengthLimitExceeded { len, max })
    }
}

const MAX_VAR_UINT_LEN: usize = 10;

///
/// SliceReader
///
/// In-memory [`StateRead`] over a borrowed byte slice.
///

#[derive(Clone, Debug)]
pub struct SliceReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> SliceReader<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

impl StateRead for SliceReader<'_> {
    fn read_exact(&mut self, out: &mut [u8]) -> Result<(), CodecError> {
        let end = self
            .offset
            .checked_add(out.len())
            .ok_or(CodecError::Truncated)?;
        if end > self.bytes.len() {
            return Err(CodecError::Truncated);
        }

        out.copy_from_slice(&self.bytes[self.offset..end]);
        self.offset = end;

        Ok(())
    }
}

///
/// TESTS
///
