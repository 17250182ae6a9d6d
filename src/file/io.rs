//! Little-endian primitive readers for PE structure decoding.
//!
//! This module is the leaf of the decoding stack. Every structure in [`crate::pe`] is
//! ultimately reduced to calls into the functions defined here, which read a fixed, statically
//! known number of bytes at an absolute offset of the supplied buffer.
//!
//! # Key Components
//!
//! ## Core Trait
//! - [`crate::file::io::PeIO`] - Conversion from little-endian byte arrays for primitive integers
//!
//! ## Cursor Readers
//! - [`crate::file::io::read_le`] - Read a value from the start of a buffer
//! - [`crate::file::io::read_le_at`] - Read a value at an offset and advance the offset
//!
//! ## Fixed-Offset Readers
//! - [`crate::file::io::read_uint`] - Read a 1, 2, 4 or 8 byte unsigned integer at an offset
//! - [`crate::file::io::read_byte`], [`crate::file::io::read_word`],
//!   [`crate::file::io::read_dword`], [`crate::file::io::read_qword`] - Typed specializations
//! - [`crate::file::io::read_fixed_string8`] - 8 byte NUL padded section names
//!
//! None of the fixed-offset readers depend on previously decoded values. Width ambiguity
//! (PE32 versus PE32+) is resolved one layer up, by choosing a different schema.
//!
//! # Error Handling
//!
//! All functions return [`crate::Error::OutOfBounds`] if `offset + width` exceeds the buffer
//! length, including the case where the addition itself overflows.
//!
//! # Examples
//!
//! ```rust
//! use pescope::file::io::{read_dword, read_fixed_string8, read_uint};
//!
//! let data = [0x2E, 0x74, 0x65, 0x78, 0x74, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00];
//! assert_eq!(read_fixed_string8(&data, 0)?, ".text");
//! assert_eq!(read_dword(&data, 8)?, 0x1000);
//! assert_eq!(read_uint(&data, 8, 2)?, 0x1000);
//! # Ok::<(), pescope::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Trait for primitive integers that can be decoded from little-endian bytes.
///
/// Each implementation defines a `Bytes` associated type that represents the fixed-size byte
/// array required for that particular type (e.g., `[u8; 4]` for `u32`).
pub trait PeIO: Sized {
    /// Byte array type holding the encoded form of `Self`
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_pe_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PeIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_pe_io!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le<T: PeIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at `offset`, advancing the
/// offset by the number of bytes read.
///
/// The offset is left unchanged when the read fails.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
///
/// # Examples
///
/// ```rust
/// use pescope::file::io::read_le_at;
///
/// let data = [0x01, 0x00, 0x02, 0x00]; // Two u16 values: 1, 2
/// let mut offset = 0;
///
/// let first: u16 = read_le_at(&data, &mut offset)?;
/// let second: u16 = read_le_at(&data, &mut offset)?;
/// assert_eq!((first, second, offset), (1, 2, 4));
/// # Ok::<(), pescope::Error>(())
/// ```
pub fn read_le_at<T: PeIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };

    let Some(bytes) = data.get(*offset..end) else {
        return Err(OutOfBounds);
    };

    let Ok(read) = bytes.try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Reads an unsigned little-endian integer of `width` bytes at `offset`.
///
/// `width` must be one of 1, 2, 4 or 8. The value is widened to `u64`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `offset + width` exceeds the buffer and
/// [`crate::Error::Malformed`] for an unsupported width.
pub fn read_uint(data: &[u8], offset: usize, width: usize) -> Result<u64> {
    let mut cursor = offset;
    match width {
        1 => read_le_at::<u8>(data, &mut cursor).map(u64::from),
        2 => read_le_at::<u16>(data, &mut cursor).map(u64::from),
        4 => read_le_at::<u32>(data, &mut cursor).map(u64::from),
        8 => read_le_at::<u64>(data, &mut cursor),
        _ => Err(malformed_error!("Unsupported integer width - {}", width)),
    }
}

/// Reads a single byte at `offset`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `offset` is past the end of the buffer.
pub fn read_byte(data: &[u8], offset: usize) -> Result<u8> {
    let mut cursor = offset;
    read_le_at(data, &mut cursor)
}

/// Reads a little-endian `u16` at `offset`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than 2 bytes remain at `offset`.
pub fn read_word(data: &[u8], offset: usize) -> Result<u16> {
    let mut cursor = offset;
    read_le_at(data, &mut cursor)
}

/// Reads a little-endian `u32` at `offset`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than 4 bytes remain at `offset`.
pub fn read_dword(data: &[u8], offset: usize) -> Result<u32> {
    let mut cursor = offset;
    read_le_at(data, &mut cursor)
}

/// Reads a little-endian `u64` at `offset`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than 8 bytes remain at `offset`.
pub fn read_qword(data: &[u8], offset: usize) -> Result<u64> {
    let mut cursor = offset;
    read_le_at(data, &mut cursor)
}

/// Reads an 8 byte, NUL padded name at `offset`.
///
/// All NUL bytes are dropped, wherever they occur, and every remaining byte is mapped to the
/// character with the same code point. Section names are not required to be valid UTF-8, so
/// this never fails on content, only on bounds.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than 8 bytes remain at `offset`.
pub fn read_fixed_string8(data: &[u8], offset: usize) -> Result<String> {
    let Some(end) = offset.checked_add(8) else {
        return Err(OutOfBounds);
    };

    let Some(bytes) = data.get(offset..end) else {
        return Err(OutOfBounds);
    };

    Ok(bytes
        .iter()
        .filter(|&&byte| byte != 0)
        .map(|&byte| char::from(byte))
        .collect())
}
