//! The NT headers: PE signature, COFF file header and optional header.
//!
//! The optional header shape is not known up front. [`NtHeaders::decode`] peeks the magic at
//! [`OPTIONAL_HEADER_OFFSET`] once and then decodes the whole structure with the matching
//! layout, [`NtHeaders::decode_as`] skips the peek for callers that already know the format.

use crate::{
    pe::{
        coff::FileHeader,
        decoder::decode_record,
        optional::{OptionalHeader, OptionalHeaderFormat},
        schema::PE_SIGNATURE_SIZE,
    },
    Error::OutOfBounds,
    Result,
};

/// `PE\0\0`, read as a little-endian `u32`
pub const PE_SIGNATURE: u32 = 0x0000_4550;

/// Offset of the optional header relative to the start of the NT headers
pub const OPTIONAL_HEADER_OFFSET: usize = 0x18;

/// `IMAGE_NT_HEADERS32` or `IMAGE_NT_HEADERS64`, depending on [`NtHeaders::format`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtHeaders {
    /// Should be [`PE_SIGNATURE`]
    pub signature: u32,
    /// The COFF file header
    pub file_header: FileHeader,
    /// The optional header, in whichever shape the magic selected
    pub optional_header: OptionalHeader,
}

impl NtHeaders {
    /// Decodes the NT headers at `offset`, detecting the optional header format from its magic.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the headers do not fit into `data`, or
    /// [`crate::Error::UnknownOptionalHeaderFormat`] if the magic is not recognized.
    pub fn decode(data: &[u8], offset: usize) -> Result<NtHeaders> {
        let Some(magic_offset) = offset.checked_add(OPTIONAL_HEADER_OFFSET) else {
            return Err(OutOfBounds);
        };

        let format = OptionalHeaderFormat::detect(data, magic_offset)?;
        Self::decode_as(data, offset, format)
    }

    /// Decodes the NT headers at `offset` with an already known `format`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the headers do not fit into `data`.
    pub fn decode_as(data: &[u8], offset: usize, format: OptionalHeaderFormat) -> Result<NtHeaders> {
        let mut fields = decode_record(data, offset, format.nt_headers_layout())?.into_fields();

        let signature = fields.uint()?;
        let file_header = fields.structure()?;
        let optional_header = match format {
            OptionalHeaderFormat::Pe32 => OptionalHeader::Pe32(fields.structure()?),
            OptionalHeaderFormat::Pe32Plus => OptionalHeader::Pe32Plus(fields.structure()?),
        };
        fields.finish()?;

        Ok(NtHeaders {
            signature,
            file_header,
            optional_header,
        })
    }

    /// Returns `true` if the signature equals [`PE_SIGNATURE`]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.signature == PE_SIGNATURE
    }

    /// Which optional header shape was decoded
    #[must_use]
    pub fn format(&self) -> OptionalHeaderFormat {
        self.optional_header.format()
    }

    /// File offset of the first section header, given the offset these headers were decoded at.
    ///
    /// The section table follows the optional header, whose size is taken from
    /// `size_of_optional_header` rather than from the decoded shape. Returns `None` on overflow.
    #[must_use]
    pub fn section_table_offset(&self, offset: usize) -> Option<usize> {
        offset
            .checked_add(PE_SIGNATURE_SIZE + crate::pe::schema::FILE_HEADER.size)?
            .checked_add(usize::from(self.file_header.size_of_optional_header))
    }
}
