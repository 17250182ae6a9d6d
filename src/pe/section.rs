//! Section table entries.

use std::ops::Range;

use bitflags::bitflags;

use crate::{
    pe::{
        decoder::{Fields, Structure},
        resolve::align_up,
        schema::{Layout, SECTION_HEADER},
    },
    Result,
};

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy)]
    /// `IMAGE_SCN_*` flags of [`SectionHeader::characteristics`]
    pub struct SectionCharacteristics : u32 {
        /// The section contains executable code
        const CNT_CODE = 0x0000_0020;
        /// The section contains initialized data
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        /// The section contains uninitialized data
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        /// The section contains comments or other information
        const LNK_INFO = 0x0000_0200;
        /// The section will not become part of the image
        const LNK_REMOVE = 0x0000_0800;
        /// The section contains COMDAT data
        const LNK_COMDAT = 0x0000_1000;
        /// Data referenced through the global pointer
        const GPREL = 0x0000_8000;
        /// The section contains extended relocations
        const LNK_NRELOC_OVFL = 0x0100_0000;
        /// The section can be discarded as needed
        const MEM_DISCARDABLE = 0x0200_0000;
        /// The section cannot be cached
        const MEM_NOT_CACHED = 0x0400_0000;
        /// The section is not pageable
        const MEM_NOT_PAGED = 0x0800_0000;
        /// The section can be shared in memory
        const MEM_SHARED = 0x1000_0000;
        /// The section can be executed as code
        const MEM_EXECUTE = 0x2000_0000;
        /// The section can be read
        const MEM_READ = 0x4000_0000;
        /// The section can be written to
        const MEM_WRITE = 0x8000_0000;
    }
}

/// `IMAGE_SECTION_HEADER`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    /// Section name, with all NUL bytes removed
    pub name: String,
    /// Size of the section once loaded, before alignment
    pub virtual_size: u32,
    /// RVA of the first byte of the section
    pub virtual_address: u32,
    /// Size of the initialized data on disk
    pub size_of_raw_data: u32,
    /// File offset of the section data
    pub pointer_to_raw_data: u32,
    /// File offset of the relocation entries, 0 for images
    pub pointer_to_relocations: u32,
    /// File offset of the line number entries (deprecated)
    pub pointer_to_linenumbers: u32,
    /// Number of relocation entries
    pub number_of_relocations: u16,
    /// Number of line number entries
    pub number_of_linenumbers: u16,
    /// Raw [`SectionCharacteristics`] bits
    pub characteristics: u32,
}

impl SectionHeader {
    /// The characteristics as flags, undefined bits are preserved
    #[must_use]
    pub fn characteristics_flags(&self) -> SectionCharacteristics {
        SectionCharacteristics::from_bits_retain(self.characteristics)
    }

    /// Alignment encoded in the `IMAGE_SCN_ALIGN_*` bits, only meaningful for object files
    #[must_use]
    pub fn alignment(&self) -> Option<u32> {
        match (self.characteristics >> 20) & 0xF {
            0 | 15 => None,
            bits => Some(1 << (bits - 1)),
        }
    }

    /// The RVA range this section occupies in memory, with `virtual_size` rounded up to
    /// `section_alignment`.
    #[must_use]
    pub fn virtual_range(&self, section_alignment: u32) -> Range<u64> {
        let start = u64::from(self.virtual_address);
        let size = align_up(u64::from(self.virtual_size), u64::from(section_alignment));

        start..start.saturating_add(size)
    }

    /// Returns `true` if `rva` falls into [`SectionHeader::virtual_range`]
    #[must_use]
    pub fn contains_rva(&self, rva: u64, section_alignment: u32) -> bool {
        self.virtual_range(section_alignment).contains(&rva)
    }

    /// The file range holding the section data
    #[must_use]
    pub fn raw_range(&self) -> Range<u64> {
        let start = u64::from(self.pointer_to_raw_data);
        start..start + u64::from(self.size_of_raw_data)
    }
}

impl Structure for SectionHeader {
    fn layout() -> &'static Layout {
        &SECTION_HEADER
    }

    fn from_fields(fields: &mut Fields) -> Result<Self> {
        Ok(SectionHeader {
            name: fields.name()?,
            virtual_size: fields.uint()?,
            virtual_address: fields.uint()?,
            size_of_raw_data: fields.uint()?,
            pointer_to_raw_data: fields.uint()?,
            pointer_to_relocations: fields.uint()?,
            pointer_to_linenumbers: fields.uint()?,
            number_of_relocations: fields.uint()?,
            number_of_linenumbers: fields.uint()?,
            characteristics: fields.uint()?,
        })
    }
}
