//! The optional header and its data directories.
//!
//! Despite its name the optional header is mandatory for images. It comes in two shapes:
//!
//! - [`OptionalHeader32`] (`PE32`, magic [`PE32_MAGIC`]), with a 32-bit image base and an extra
//!   `base_of_data` field
//! - [`OptionalHeader64`] (`PE32+`, magic [`PE32PLUS_MAGIC`]), with a 64-bit image base and 64-bit
//!   stack and heap sizes
//!
//! [`OptionalHeader`] wraps either one and exposes the fields both share. The shape is chosen
//! once per image by [`OptionalHeaderFormat::detect`], from the magic alone.

use bitflags::bitflags;
use strum::{Display, EnumCount, EnumIter, FromRepr};

use crate::{
    file::io::read_word,
    pe::{
        decoder::{Fields, Structure},
        schema::{
            Layout, DATA_DIRECTORY, NT_HEADERS_32, NT_HEADERS_64, NUMBER_OF_DATA_DIRECTORIES,
            OPTIONAL_HEADER_32, OPTIONAL_HEADER_64,
        },
    },
    Error::UnknownOptionalHeaderFormat,
    Result,
};

/// Magic of a `PE32` optional header
pub const PE32_MAGIC: u16 = 0x010B;
/// Magic of a `PE32+` optional header
pub const PE32PLUS_MAGIC: u16 = 0x020B;

/// `IMAGE_DATA_DIRECTORY`, the location and size of an auxiliary table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDirectory {
    /// RVA of the table
    pub virtual_address: u32,
    /// Size of the table in bytes
    pub size: u32,
}

impl DataDirectory {
    /// Returns `true` if the directory does not describe a table
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl Structure for DataDirectory {
    fn layout() -> &'static Layout {
        &DATA_DIRECTORY
    }

    fn from_fields(fields: &mut Fields) -> Result<Self> {
        Ok(DataDirectory {
            virtual_address: fields.uint()?,
            size: fields.uint()?,
        })
    }
}

/// Meaning of each of the 16 data directory slots, in slot order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount, FromRepr)]
#[repr(usize)]
pub enum DataDirectoryType {
    /// `.edata`
    ExportTable = 0,
    /// `.idata`
    ImportTable = 1,
    /// `.rsrc`
    ResourceTable = 2,
    /// `.pdata`
    ExceptionTable = 3,
    /// Attribute certificates, the address is a file offset
    CertificateTable = 4,
    /// `.reloc`
    BaseRelocationTable = 5,
    /// `.debug`
    Debug = 6,
    /// Reserved, must be 0
    Architecture = 7,
    /// Value stored in the global pointer register
    GlobalPtr = 8,
    /// `.tls`
    TlsTable = 9,
    /// Load configuration structure
    LoadConfigTable = 10,
    /// Bound import table
    BoundImport = 11,
    /// Import address table
    ImportAddressTable = 12,
    /// Delay-load import descriptors
    DelayImportDescriptor = 13,
    /// CLR runtime header of managed images
    ClrRuntimeHeader = 14,
    /// Reserved, must be 0
    Reserved = 15,
}

/// Windows subsystem required to run an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u16)]
pub enum Subsystem {
    /// An unknown subsystem
    Unknown = 0,
    /// Device drivers and native Windows processes
    Native = 1,
    /// The Windows graphical user interface subsystem
    WindowsGui = 2,
    /// The Windows character subsystem
    WindowsCui = 3,
    /// The OS/2 character subsystem
    Os2Cui = 5,
    /// The Posix character subsystem
    PosixCui = 7,
    /// Native Win9x driver
    NativeWindows = 8,
    /// Windows CE
    WindowsCeGui = 9,
    /// An EFI application
    EfiApplication = 10,
    /// An EFI driver with boot services
    EfiBootServiceDriver = 11,
    /// An EFI driver with run-time services
    EfiRuntimeDriver = 12,
    /// An EFI ROM image
    EfiRom = 13,
    /// XBOX
    Xbox = 14,
    /// Windows boot application
    WindowsBootApplication = 16,
}

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy)]
    /// `IMAGE_DLLCHARACTERISTICS_*` flags
    pub struct DllCharacteristics : u16 {
        /// Image can handle a high entropy 64-bit virtual address space
        const HIGH_ENTROPY_VA = 0x0020;
        /// DLL can be relocated at load time
        const DYNAMIC_BASE = 0x0040;
        /// Code integrity checks are enforced
        const FORCE_INTEGRITY = 0x0080;
        /// Image is NX compatible
        const NX_COMPAT = 0x0100;
        /// Isolation aware, but do not isolate the image
        const NO_ISOLATION = 0x0200;
        /// Does not use structured exception handling
        const NO_SEH = 0x0400;
        /// Do not bind the image
        const NO_BIND = 0x0800;
        /// Image must execute in an AppContainer
        const APPCONTAINER = 0x1000;
        /// A WDM driver
        const WDM_DRIVER = 0x2000;
        /// Image supports Control Flow Guard
        const GUARD_CF = 0x4000;
        /// Terminal Server aware
        const TERMINAL_SERVER_AWARE = 0x8000;
    }
}

/// `IMAGE_OPTIONAL_HEADER32`
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct OptionalHeader32 {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub base_of_data: u32,
    pub image_base: u32,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: u16,
    pub dll_characteristics: u16,
    pub size_of_stack_reserve: u32,
    pub size_of_stack_commit: u32,
    pub size_of_heap_reserve: u32,
    pub size_of_heap_commit: u32,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
    pub data_directories: [DataDirectory; NUMBER_OF_DATA_DIRECTORIES],
}

/// `IMAGE_OPTIONAL_HEADER64`
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct OptionalHeader64 {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: u16,
    pub dll_characteristics: u16,
    pub size_of_stack_reserve: u64,
    pub size_of_stack_commit: u64,
    pub size_of_heap_reserve: u64,
    pub size_of_heap_commit: u64,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
    pub data_directories: [DataDirectory; NUMBER_OF_DATA_DIRECTORIES],
}

fn data_directories(fields: &mut Fields) -> Result<[DataDirectory; NUMBER_OF_DATA_DIRECTORIES]> {
    let directories = fields.list::<DataDirectory>()?;
    let count = directories.len();

    directories.try_into().map_err(|_| {
        malformed_error!(
            "Expected {} data directories, got {}",
            NUMBER_OF_DATA_DIRECTORIES,
            count
        )
    })
}

impl Structure for OptionalHeader32 {
    fn layout() -> &'static Layout {
        &OPTIONAL_HEADER_32
    }

    fn from_fields(fields: &mut Fields) -> Result<Self> {
        Ok(OptionalHeader32 {
            magic: fields.uint()?,
            major_linker_version: fields.uint()?,
            minor_linker_version: fields.uint()?,
            size_of_code: fields.uint()?,
            size_of_initialized_data: fields.uint()?,
            size_of_uninitialized_data: fields.uint()?,
            address_of_entry_point: fields.uint()?,
            base_of_code: fields.uint()?,
            base_of_data: fields.uint()?,
            image_base: fields.uint()?,
            section_alignment: fields.uint()?,
            file_alignment: fields.uint()?,
            major_operating_system_version: fields.uint()?,
            minor_operating_system_version: fields.uint()?,
            major_image_version: fields.uint()?,
            minor_image_version: fields.uint()?,
            major_subsystem_version: fields.uint()?,
            minor_subsystem_version: fields.uint()?,
            win32_version_value: fields.uint()?,
            size_of_image: fields.uint()?,
            size_of_headers: fields.uint()?,
            check_sum: fields.uint()?,
            subsystem: fields.uint()?,
            dll_characteristics: fields.uint()?,
            size_of_stack_reserve: fields.uint()?,
            size_of_stack_commit: fields.uint()?,
            size_of_heap_reserve: fields.uint()?,
            size_of_heap_commit: fields.uint()?,
            loader_flags: fields.uint()?,
            number_of_rva_and_sizes: fields.uint()?,
            data_directories: data_directories(fields)?,
        })
    }
}

impl Structure for OptionalHeader64 {
    fn layout() -> &'static Layout {
        &OPTIONAL_HEADER_64
    }

    fn from_fields(fields: &mut Fields) -> Result<Self> {
        Ok(OptionalHeader64 {
            magic: fields.uint()?,
            major_linker_version: fields.uint()?,
            minor_linker_version: fields.uint()?,
            size_of_code: fields.uint()?,
            size_of_initialized_data: fields.uint()?,
            size_of_uninitialized_data: fields.uint()?,
            address_of_entry_point: fields.uint()?,
            base_of_code: fields.uint()?,
            image_base: fields.uint()?,
            section_alignment: fields.uint()?,
            file_alignment: fields.uint()?,
            major_operating_system_version: fields.uint()?,
            minor_operating_system_version: fields.uint()?,
            major_image_version: fields.uint()?,
            minor_image_version: fields.uint()?,
            major_subsystem_version: fields.uint()?,
            minor_subsystem_version: fields.uint()?,
            win32_version_value: fields.uint()?,
            size_of_image: fields.uint()?,
            size_of_headers: fields.uint()?,
            check_sum: fields.uint()?,
            subsystem: fields.uint()?,
            dll_characteristics: fields.uint()?,
            size_of_stack_reserve: fields.uint()?,
            size_of_stack_commit: fields.uint()?,
            size_of_heap_reserve: fields.uint()?,
            size_of_heap_commit: fields.uint()?,
            loader_flags: fields.uint()?,
            number_of_rva_and_sizes: fields.uint()?,
            data_directories: data_directories(fields)?,
        })
    }
}

/// The two optional header shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum OptionalHeaderFormat {
    /// 32-bit images
    #[strum(serialize = "PE32")]
    Pe32,
    /// 64-bit images
    #[strum(serialize = "PE32+")]
    Pe32Plus,
}

impl OptionalHeaderFormat {
    /// Maps an optional header magic to its format.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownOptionalHeaderFormat`] for anything but [`PE32_MAGIC`]
    /// and [`PE32PLUS_MAGIC`]. ROM images (`0x107`) are not supported.
    pub fn from_magic(magic: u16) -> Result<Self> {
        match magic {
            PE32_MAGIC => Ok(OptionalHeaderFormat::Pe32),
            PE32PLUS_MAGIC => Ok(OptionalHeaderFormat::Pe32Plus),
            unknown => Err(UnknownOptionalHeaderFormat(unknown)),
        }
    }

    /// Reads the magic at `offset`, the start of the optional header, and maps it to a format.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the magic can not be read, or
    /// [`crate::Error::UnknownOptionalHeaderFormat`] if it is not recognized.
    pub fn detect(data: &[u8], offset: usize) -> Result<Self> {
        Self::from_magic(read_word(data, offset)?)
    }

    /// The magic identifying this format
    #[must_use]
    pub fn magic(&self) -> u16 {
        match self {
            OptionalHeaderFormat::Pe32 => PE32_MAGIC,
            OptionalHeaderFormat::Pe32Plus => PE32PLUS_MAGIC,
        }
    }

    /// Layout of the optional header in this format
    #[must_use]
    pub fn optional_header_layout(&self) -> &'static Layout {
        match self {
            OptionalHeaderFormat::Pe32 => &OPTIONAL_HEADER_32,
            OptionalHeaderFormat::Pe32Plus => &OPTIONAL_HEADER_64,
        }
    }

    /// Layout of the complete NT headers in this format
    #[must_use]
    pub fn nt_headers_layout(&self) -> &'static Layout {
        match self {
            OptionalHeaderFormat::Pe32 => &NT_HEADERS_32,
            OptionalHeaderFormat::Pe32Plus => &NT_HEADERS_64,
        }
    }
}

/// Either optional header shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionalHeader {
    /// A `PE32` header
    Pe32(OptionalHeader32),
    /// A `PE32+` header
    Pe32Plus(OptionalHeader64),
}

macro_rules! common_field {
    ($self:ident.$field:ident) => {
        match $self {
            OptionalHeader::Pe32(header) => header.$field,
            OptionalHeader::Pe32Plus(header) => header.$field,
        }
    };
    ($self:ident.$field:ident as $target:ty) => {
        match $self {
            OptionalHeader::Pe32(header) => <$target>::from(header.$field),
            OptionalHeader::Pe32Plus(header) => header.$field,
        }
    };
}

impl OptionalHeader {
    /// Which of the two shapes this header has
    #[must_use]
    pub fn format(&self) -> OptionalHeaderFormat {
        match self {
            OptionalHeader::Pe32(_) => OptionalHeaderFormat::Pe32,
            OptionalHeader::Pe32Plus(_) => OptionalHeaderFormat::Pe32Plus,
        }
    }

    /// The raw magic value
    #[must_use]
    pub fn magic(&self) -> u16 {
        common_field!(self.magic)
    }

    /// RVA of the entry point, 0 if there is none
    #[must_use]
    pub fn address_of_entry_point(&self) -> u32 {
        common_field!(self.address_of_entry_point)
    }

    /// RVA of the start of the code section
    #[must_use]
    pub fn base_of_code(&self) -> u32 {
        common_field!(self.base_of_code)
    }

    /// Preferred load address, widened to 64 bits for `PE32`
    #[must_use]
    pub fn image_base(&self) -> u64 {
        common_field!(self.image_base as u64)
    }

    /// Alignment of sections once loaded into memory
    #[must_use]
    pub fn section_alignment(&self) -> u32 {
        common_field!(self.section_alignment)
    }

    /// Alignment of raw section data in the file
    #[must_use]
    pub fn file_alignment(&self) -> u32 {
        common_field!(self.file_alignment)
    }

    /// Size of the image once loaded into memory
    #[must_use]
    pub fn size_of_image(&self) -> u32 {
        common_field!(self.size_of_image)
    }

    /// Combined size of all headers, rounded up to the file alignment
    #[must_use]
    pub fn size_of_headers(&self) -> u32 {
        common_field!(self.size_of_headers)
    }

    /// Image file checksum
    #[must_use]
    pub fn check_sum(&self) -> u32 {
        common_field!(self.check_sum)
    }

    /// Raw subsystem value
    #[must_use]
    pub fn subsystem(&self) -> u16 {
        common_field!(self.subsystem)
    }

    /// The subsystem as a known [`Subsystem`], `None` for unlisted values
    #[must_use]
    pub fn subsystem_type(&self) -> Option<Subsystem> {
        Subsystem::from_repr(self.subsystem())
    }

    /// DLL characteristics, undefined bits are preserved
    #[must_use]
    pub fn dll_characteristics(&self) -> DllCharacteristics {
        DllCharacteristics::from_bits_retain(common_field!(self.dll_characteristics))
    }

    /// Stack reserve size, widened to 64 bits for `PE32`
    #[must_use]
    pub fn size_of_stack_reserve(&self) -> u64 {
        common_field!(self.size_of_stack_reserve as u64)
    }

    /// Heap reserve size, widened to 64 bits for `PE32`
    #[must_use]
    pub fn size_of_heap_reserve(&self) -> u64 {
        common_field!(self.size_of_heap_reserve as u64)
    }

    /// Declared number of data directories.
    ///
    /// This is informational only, all 16 slots are always decoded.
    #[must_use]
    pub fn number_of_rva_and_sizes(&self) -> u32 {
        common_field!(self.number_of_rva_and_sizes)
    }

    /// All 16 data directory slots, indexed by [`DataDirectoryType`]
    #[must_use]
    pub fn data_directories(&self) -> &[DataDirectory; NUMBER_OF_DATA_DIRECTORIES] {
        match self {
            OptionalHeader::Pe32(header) => &header.data_directories,
            OptionalHeader::Pe32Plus(header) => &header.data_directories,
        }
    }

    /// Returns the directory in slot `kind`, or `None` if it is empty.
    #[must_use]
    pub fn data_directory(&self, kind: DataDirectoryType) -> Option<DataDirectory> {
        self.data_directories()
            .get(kind as usize)
            .copied()
            .filter(|directory| !directory.is_empty())
    }
}
