//! Variable-length integer codec
//!
//! Non-negative integers are stored as little-endian groups of 7 bits, with
//! the high bit of every byte except the last set as a continuation flag.
//! An `i32` takes 1-5 bytes, an `i64` 1-10 bytes.
//!
//! The same encoding is available over three targets:
//!
//! - sequential streams ([`pack_long`], [`unpack_long`] and the `int` variants),
//!   which also covers growable `Vec<u8>` buffers;
//! - fixed-position buffers ([`pack_long_at`], [`unpack_long_at`]), used to
//!   write offsets in place inside a slot table.
//!
//! Stream packing is implemented on top of the fixed-position encoder, so both
//! produce byte-identical output.

use std::io::{self, Read, Write};
use thiserror::Error;

/// Maximum encoded size of an `i32`
pub const MAX_INT_BYTES: usize = 5;

/// Maximum encoded size of an `i64`
pub const MAX_LONG_BYTES: usize = 10;

/// Errors raised by the varint codec
#[derive(Debug, Error)]
pub enum VarIntError {
    /// Only non-negative values can be packed
    #[error("negative value cannot be packed: {0}")]
    InvalidArgument(i64),

    /// Continuation chain longer than the type allows
    #[error("malformed varint: more than {max_bytes} bytes")]
    Malformed {
        /// Maximum number of bytes for the decoded type
        max_bytes: usize,
    },

    /// Input ended in the middle of a value
    #[error("varint truncated after {0} bytes")]
    Truncated(usize),

    /// Fixed buffer has no room for the encoded value
    #[error(
        "buffer too small: need {needed} bytes at position {position}, buffer holds {available}"
    )]
    BufferTooSmall {
        /// Bytes required by the encoding
        needed: usize,
        /// Write position
        position: usize,
        /// Buffer length
        available: usize,
    },

    /// Stream error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for varint operations
pub type VarIntResult<T> = Result<T, VarIntError>;

/// Number of bytes needed to pack `value`
pub const fn packed_len(value: u64) -> usize {
    if value == 0 {
        1
    } else {
        (64 - value.leading_zeros()).div_ceil(7) as usize
    }
}

/// Encoded size of a non-negative `i64`
pub fn packed_len_long(value: i64) -> VarIntResult<usize> {
    u64::try_from(value)
        .map(packed_len)
        .map_err(|_| VarIntError::InvalidArgument(value))
}

/// Encoded size of a non-negative `i32`
pub fn packed_len_int(value: i32) -> VarIntResult<usize> {
    packed_len_long(i64::from(value))
}

/// Pack a non-negative `i64` into `buf` starting at `pos`
///
/// Returns the number of bytes written. Bytes after the encoding are left
/// untouched.
pub fn pack_long_at(buf: &mut [u8], pos: usize, value: i64) -> VarIntResult<usize> {
    let mut value = u64::try_from(value).map_err(|_| VarIntError::InvalidArgument(value))?;

    let needed = packed_len(value);
    if pos.checked_add(needed).is_none_or(|end| end > buf.len()) {
        return Err(VarIntError::BufferTooSmall {
            needed,
            position: pos,
            available: buf.len(),
        });
    }

    let mut index = pos;
    while value & !0x7F != 0 {
        buf[index] = ((value & 0x7F) as u8) | 0x80;
        value >>= 7;
        index += 1;
    }
    buf[index] = value as u8;

    Ok(needed)
}

/// Pack a non-negative `i32` into `buf` starting at `pos`
pub fn pack_int_at(buf: &mut [u8], pos: usize, value: i32) -> VarIntResult<usize> {
    pack_long_at(buf, pos, i64::from(value))
}

/// Pack a non-negative `i64` into a stream, returning the bytes written
pub fn pack_long<W: Write + ?Sized>(writer: &mut W, value: i64) -> VarIntResult<usize> {
    let mut scratch = [0u8; MAX_LONG_BYTES];
    let len = pack_long_at(&mut scratch, 0, value)?;
    writer.write_all(&scratch[..len])?;
    Ok(len)
}

/// Pack a non-negative `i32` into a stream, returning the bytes written
pub fn pack_int<W: Write + ?Sized>(writer: &mut W, value: i32) -> VarIntResult<usize> {
    pack_long(writer, i64::from(value))
}

/// Unpack an `i64` from a stream
pub fn unpack_long<R: Read + ?Sized>(reader: &mut R) -> VarIntResult<i64> {
    let (value, _) = decode(MAX_LONG_BYTES, |consumed| read_byte(reader, consumed))?;
    i64::try_from(value).map_err(|_| VarIntError::Malformed {
        max_bytes: MAX_LONG_BYTES,
    })
}

/// Unpack an `i32` from a stream
pub fn unpack_int<R: Read + ?Sized>(reader: &mut R) -> VarIntResult<i32> {
    let (value, _) = decode(MAX_INT_BYTES, |consumed| read_byte(reader, consumed))?;
    i32::try_from(value).map_err(|_| VarIntError::Malformed {
        max_bytes: MAX_INT_BYTES,
    })
}

/// Unpack an `i64` from `buf` starting at `pos`
///
/// Returns the value and the number of bytes consumed.
pub fn unpack_long_at(buf: &[u8], pos: usize) -> VarIntResult<(i64, usize)> {
    let (value, len) = decode(MAX_LONG_BYTES, |consumed| {
        buf.get(pos + consumed)
            .copied()
            .ok_or(VarIntError::Truncated(consumed))
    })?;
    let value = i64::try_from(value).map_err(|_| VarIntError::Malformed {
        max_bytes: MAX_LONG_BYTES,
    })?;
    Ok((value, len))
}

/// Unpack an `i32` from `buf` starting at `pos`
pub fn unpack_int_at(buf: &[u8], pos: usize) -> VarIntResult<(i32, usize)> {
    let (value, len) = decode(MAX_INT_BYTES, |consumed| {
        buf.get(pos + consumed)
            .copied()
            .ok_or(VarIntError::Truncated(consumed))
    })?;
    let value = i32::try_from(value).map_err(|_| VarIntError::Malformed {
        max_bytes: MAX_INT_BYTES,
    })?;
    Ok((value, len))
}

fn read_byte<R: Read + ?Sized>(reader: &mut R, consumed: usize) -> VarIntResult<u8> {
    let mut byte = [0u8; 1];
    match reader.read_exact(&mut byte) {
        Ok(()) => Ok(byte[0]),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(VarIntError::Truncated(consumed)),
        Err(e) => Err(e.into()),
    }
}

fn decode<F>(max_bytes: usize, mut next: F) -> VarIntResult<(u64, usize)>
where
    F: FnMut(usize) -> VarIntResult<u8>,
{
    let mut result = 0u64;
    for consumed in 0..max_bytes {
        let byte = next(consumed)?;
        result |= u64::from(byte & 0x7F) << (7 * consumed);
        if byte & 0x80 == 0 {
            return Ok((result, consumed + 1));
        }
    }
    Err(VarIntError::Malformed { max_bytes })
}
