//! The COFF file header.
//!
//! [`FileHeader`] keeps every field in its raw on-disk representation. The typed views
//! [`FileHeader::machine_type`] and [`FileHeader::characteristics_flags`] are computed on
//! demand, unknown machine values and undefined flag bits are never an error.

use bitflags::bitflags;
use strum::{Display, FromRepr};

use crate::{
    pe::{
        decoder::{Fields, Structure},
        schema::{Layout, FILE_HEADER},
    },
    Result,
};

/// Target architecture of an image, `IMAGE_FILE_MACHINE_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u16)]
pub enum Machine {
    /// Applicable to any machine type
    #[strum(serialize = "unknown")]
    Unknown = 0x0000,
    /// Intel 386 and compatible
    #[strum(serialize = "i386")]
    I386 = 0x014C,
    /// MIPS little endian
    #[strum(serialize = "r4000")]
    R4000 = 0x0166,
    /// MIPS little-endian WCE v2
    #[strum(serialize = "wcemipsv2")]
    WceMipsV2 = 0x0169,
    /// Hitachi SH3
    #[strum(serialize = "sh3")]
    Sh3 = 0x01A2,
    /// Hitachi SH4
    #[strum(serialize = "sh4")]
    Sh4 = 0x01A6,
    /// ARM little endian
    #[strum(serialize = "arm")]
    Arm = 0x01C0,
    /// ARM Thumb
    #[strum(serialize = "thumb")]
    Thumb = 0x01C2,
    /// ARM Thumb-2 little endian
    #[strum(serialize = "armnt")]
    ArmNt = 0x01C4,
    /// Power PC little endian
    #[strum(serialize = "powerpc")]
    PowerPc = 0x01F0,
    /// Intel Itanium
    #[strum(serialize = "ia64")]
    Ia64 = 0x0200,
    /// MIPS16
    #[strum(serialize = "mips16")]
    Mips16 = 0x0266,
    /// EFI byte code
    #[strum(serialize = "ebc")]
    Ebc = 0x0EBC,
    /// RISC-V 32-bit address space
    #[strum(serialize = "riscv32")]
    RiscV32 = 0x5032,
    /// RISC-V 64-bit address space
    #[strum(serialize = "riscv64")]
    RiscV64 = 0x5064,
    /// LoongArch 64-bit
    #[strum(serialize = "loongarch64")]
    LoongArch64 = 0x6264,
    /// x64
    #[strum(serialize = "amd64")]
    Amd64 = 0x8664,
    /// ARM64 little endian
    #[strum(serialize = "arm64")]
    Arm64 = 0xAA64,
}

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy)]
    /// `IMAGE_FILE_*` flags of [`FileHeader::characteristics`]
    pub struct FileCharacteristics : u16 {
        /// The image does not contain base relocations
        const RELOCS_STRIPPED = 0x0001;
        /// The image is valid and can be run
        const EXECUTABLE_IMAGE = 0x0002;
        /// COFF line numbers have been removed (deprecated)
        const LINE_NUMS_STRIPPED = 0x0004;
        /// COFF local symbols have been removed (deprecated)
        const LOCAL_SYMS_STRIPPED = 0x0008;
        /// Aggressively trim working set (obsolete)
        const AGGRESSIVE_WS_TRIM = 0x0010;
        /// The application can handle addresses above 2 GB
        const LARGE_ADDRESS_AWARE = 0x0020;
        /// Little endian (deprecated)
        const BYTES_REVERSED_LO = 0x0080;
        /// Machine is based on a 32-bit-word architecture
        const MACHINE_32BIT = 0x0100;
        /// Debugging information is removed from the image
        const DEBUG_STRIPPED = 0x0200;
        /// Fully load and copy to swap if the image is on removable media
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;
        /// Fully load and copy to swap if the image is on network media
        const NET_RUN_FROM_SWAP = 0x0800;
        /// The image is a system file
        const SYSTEM = 0x1000;
        /// The image is a dynamic-link library
        const DLL = 0x2000;
        /// Run only on a uniprocessor machine
        const UP_SYSTEM_ONLY = 0x4000;
        /// Big endian (deprecated)
        const BYTES_REVERSED_HI = 0x8000;
    }
}

/// `IMAGE_FILE_HEADER`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Target machine, see [`Machine`]
    pub machine: u16,
    /// Number of entries in the section table
    pub number_of_sections: u16,
    /// Seconds since the Unix epoch at link time
    pub time_date_stamp: u32,
    /// File offset of the COFF symbol table, 0 if absent
    pub pointer_to_symbol_table: u32,
    /// Number of entries in the COFF symbol table
    pub number_of_symbols: u32,
    /// Size of the optional header, the section table starts right after it
    pub size_of_optional_header: u16,
    /// Raw [`FileCharacteristics`] bits
    pub characteristics: u16,
}

impl FileHeader {
    /// The machine as a known [`Machine`], `None` for unlisted values.
    #[must_use]
    pub fn machine_type(&self) -> Option<Machine> {
        Machine::from_repr(self.machine)
    }

    /// The characteristics as flags, undefined bits are preserved.
    #[must_use]
    pub fn characteristics_flags(&self) -> FileCharacteristics {
        FileCharacteristics::from_bits_retain(self.characteristics)
    }

    /// Returns `true` if the image is a DLL
    #[must_use]
    pub fn is_dll(&self) -> bool {
        self.characteristics_flags()
            .contains(FileCharacteristics::DLL)
    }
}

impl Structure for FileHeader {
    fn layout() -> &'static Layout {
        &FILE_HEADER
    }

    fn from_fields(fields: &mut Fields) -> Result<Self> {
        Ok(FileHeader {
            machine: fields.uint()?,
            number_of_sections: fields.uint()?,
            time_date_stamp: fields.uint()?,
            pointer_to_symbol_table: fields.uint()?,
            number_of_symbols: fields.uint()?,
            size_of_optional_header: fields.uint()?,
            characteristics: fields.uint()?,
        })
    }
}
