//! The legacy MS-DOS header.

use crate::{
    pe::{
        decoder::{Fields, Structure},
        schema::{Layout, DOS_HEADER},
    },
    Result,
};

/// `MZ`, read as a little-endian `u16`
pub const DOS_SIGNATURE: u16 = 0x5A4D;

/// The two fields of `IMAGE_DOS_HEADER` a PE loader actually uses.
///
/// Everything between the magic and `e_lfanew`, and the DOS stub program following the header,
/// is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosHeader {
    /// Magic number, [`DOS_SIGNATURE`] for a valid image
    pub e_magic: u16,
    /// File offset of the NT headers
    pub e_lfanew: u32,
}

impl DosHeader {
    /// Returns `true` if the magic equals [`DOS_SIGNATURE`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.e_magic == DOS_SIGNATURE
    }

    /// File offset of the NT headers, as a `usize`.
    #[must_use]
    pub fn nt_headers_offset(&self) -> usize {
        self.e_lfanew as usize
    }
}

impl Structure for DosHeader {
    fn layout() -> &'static Layout {
        &DOS_HEADER
    }

    fn from_fields(fields: &mut Fields) -> Result<Self> {
        Ok(DosHeader {
            e_magic: fields.uint()?,
            e_lfanew: fields.uint()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        let mut data = vec![0xCCu8; 0x40];
        data[0x00..0x02].copy_from_slice(b"MZ");
        data[0x3C..0x40].copy_from_slice(&0x0000_00E8u32.to_le_bytes());

        let header = DosHeader::decode(&data, 0).unwrap();
        assert_eq!(header.e_magic, DOS_SIGNATURE);
        assert_eq!(header.e_lfanew, 0xE8);
        assert_eq!(header.nt_headers_offset(), 0xE8);
        assert!(header.is_valid());
    }

    #[test]
    fn wrong_magic_still_decodes() {
        let data = [0u8; 0x40];
        let header = DosHeader::decode(&data, 0).unwrap();
        assert!(!header.is_valid());
    }

    #[test]
    fn truncated() {
        let data = [0x4D, 0x5A];
        assert!(matches!(
            DosHeader::decode(&data, 0),
            Err(crate::Error::OutOfBounds)
        ));
    }
}
