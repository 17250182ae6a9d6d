//! Declarative field layouts of the PE header structures.
//!
//! Every structure is described once, as a [`Layout`]: an ordered table of
//! `(name, relative offset, kind)` entries. The tables are interpreted by the single generic
//! routine in [`crate::pe::decoder`], there is no per-structure decoding code. A field kind may
//! itself reference another layout, which is how the file header is embedded into the NT
//! headers and how the 16 data directories are embedded into the optional headers.
//!
//! Offsets and sizes follow the Microsoft PE/COFF specification.
//!
//! The NT headers exist in two shapes, [`NT_HEADERS_32`] and [`NT_HEADERS_64`], which differ
//! only in the layout referenced by the field at `0x18`. Which one applies is decided by
//! [`crate::pe::OptionalHeaderFormat::detect`] before decoding starts.

/// Size of the `PE\0\0` signature preceding the COFF file header
pub const PE_SIGNATURE_SIZE: usize = 4;

/// Number of data directory slots decoded from every optional header
pub const NUMBER_OF_DATA_DIRECTORIES: usize = 16;

/// Distance between two consecutive data directory entries
pub const DATA_DIRECTORY_STRIDE: usize = 8;

/// Distance between two consecutive section headers
pub const SECTION_HEADER_STRIDE: usize = 0x28;

/// How a single field is decoded.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Unsigned 8-bit integer
    Byte,
    /// Unsigned little-endian 16-bit integer
    Word,
    /// Unsigned little-endian 32-bit integer
    Dword,
    /// Unsigned little-endian 64-bit integer
    Qword,
    /// 8 byte NUL padded name
    Name8,
    /// A nested structure, decoded at the field offset
    Struct(&'static Layout),
    /// A fixed number of nested structures, `stride` bytes apart
    Array {
        /// Layout of each element
        layout: &'static Layout,
        /// Number of elements
        count: usize,
        /// Distance between the start of two consecutive elements
        stride: usize,
    },
}

impl FieldKind {
    /// Returns the number of bytes covered by a field of this kind.
    #[must_use]
    pub const fn width(&self) -> usize {
        match self {
            FieldKind::Byte => 1,
            FieldKind::Word => 2,
            FieldKind::Dword => 4,
            FieldKind::Qword | FieldKind::Name8 => 8,
            FieldKind::Struct(layout) => layout.size,
            FieldKind::Array {
                layout,
                count,
                stride,
            } => {
                if *count == 0 {
                    0
                } else {
                    (*count - 1) * *stride + layout.size
                }
            }
        }
    }
}

/// A single entry of a [`Layout`].
#[derive(Debug)]
pub struct Field {
    /// Field name, used in diagnostics
    pub name: &'static str,
    /// Offset relative to the start of the enclosing structure
    pub offset: usize,
    /// Decoder applied at `offset`
    pub kind: FieldKind,
}

/// The ordered field table of one structure.
///
/// Declaration order is the order in which decoded values appear in a
/// [`crate::pe::decoder::Record`].
#[derive(Debug)]
pub struct Layout {
    /// Structure name, used in diagnostics
    pub name: &'static str,
    /// Total size of the structure on disk
    pub size: usize,
    /// Fields in declaration order
    pub fields: &'static [Field],
}

// Layouts are only ever used as statics, identity is the address
impl PartialEq for Layout {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for Layout {}

macro_rules! field {
    ($name:literal, $offset:expr, $kind:expr) => {
        Field {
            name: $name,
            offset: $offset,
            kind: $kind,
        }
    };
}

/// `IMAGE_DOS_HEADER`, only the magic and the NT headers offset are of interest.
#[rustfmt::skip]
pub static DOS_HEADER: Layout = Layout {
    name: "DosHeader",
    size: 0x40,
    fields: &[
        field!("e_magic",  0x00, FieldKind::Word),
        field!("e_lfanew", 0x3C, FieldKind::Dword),
    ],
};

/// `IMAGE_FILE_HEADER`
#[rustfmt::skip]
pub static FILE_HEADER: Layout = Layout {
    name: "FileHeader",
    size: 0x14,
    fields: &[
        field!("machine",                 0x00, FieldKind::Word),
        field!("number_of_sections",      0x02, FieldKind::Word),
        field!("time_date_stamp",         0x04, FieldKind::Dword),
        field!("pointer_to_symbol_table", 0x08, FieldKind::Dword),
        field!("number_of_symbols",       0x0C, FieldKind::Dword),
        field!("size_of_optional_header", 0x10, FieldKind::Word),
        field!("characteristics",         0x12, FieldKind::Word),
    ],
};

/// `IMAGE_DATA_DIRECTORY`
#[rustfmt::skip]
pub static DATA_DIRECTORY: Layout = Layout {
    name: "DataDirectory",
    size: DATA_DIRECTORY_STRIDE,
    fields: &[
        field!("virtual_address", 0x00, FieldKind::Dword),
        field!("size",            0x04, FieldKind::Dword),
    ],
};

macro_rules! data_directories {
    () => {
        FieldKind::Array {
            layout: &DATA_DIRECTORY,
            count: NUMBER_OF_DATA_DIRECTORIES,
            stride: DATA_DIRECTORY_STRIDE,
        }
    };
}

/// `IMAGE_OPTIONAL_HEADER32`
#[rustfmt::skip]
pub static OPTIONAL_HEADER_32: Layout = Layout {
    name: "OptionalHeader32",
    size: 0xE0,
    fields: &[
        field!("magic",                          0x00, FieldKind::Word),
        field!("major_linker_version",           0x02, FieldKind::Byte),
        field!("minor_linker_version",           0x03, FieldKind::Byte),
        field!("size_of_code",                   0x04, FieldKind::Dword),
        field!("size_of_initialized_data",       0x08, FieldKind::Dword),
        field!("size_of_uninitialized_data",     0x0C, FieldKind::Dword),
        field!("address_of_entry_point",         0x10, FieldKind::Dword),
        field!("base_of_code",                   0x14, FieldKind::Dword),
        field!("base_of_data",                   0x18, FieldKind::Dword),
        field!("image_base",                     0x1C, FieldKind::Dword),
        field!("section_alignment",              0x20, FieldKind::Dword),
        field!("file_alignment",                 0x24, FieldKind::Dword),
        field!("major_operating_system_version", 0x28, FieldKind::Word),
        field!("minor_operating_system_version", 0x2A, FieldKind::Word),
        field!("major_image_version",            0x2C, FieldKind::Word),
        field!("minor_image_version",            0x2E, FieldKind::Word),
        field!("major_subsystem_version",        0x30, FieldKind::Word),
        field!("minor_subsystem_version",        0x32, FieldKind::Word),
        field!("win32_version_value",            0x34, FieldKind::Dword),
        field!("size_of_image",                  0x38, FieldKind::Dword),
        field!("size_of_headers",                0x3C, FieldKind::Dword),
        field!("check_sum",                      0x40, FieldKind::Dword),
        field!("subsystem",                      0x44, FieldKind::Word),
        field!("dll_characteristics",            0x46, FieldKind::Word),
        field!("size_of_stack_reserve",          0x48, FieldKind::Dword),
        field!("size_of_stack_commit",           0x4C, FieldKind::Dword),
        field!("size_of_heap_reserve",           0x50, FieldKind::Dword),
        field!("size_of_heap_commit",            0x54, FieldKind::Dword),
        field!("loader_flags",                   0x58, FieldKind::Dword),
        field!("number_of_rva_and_sizes",        0x5C, FieldKind::Dword),
        field!("data_directories",               0x60, data_directories!()),
    ],
};

/// `IMAGE_OPTIONAL_HEADER64`
#[rustfmt::skip]
pub static OPTIONAL_HEADER_64: Layout = Layout {
    name: "OptionalHeader64",
    size: 0xF0,
    fields: &[
        field!("magic",                          0x00, FieldKind::Word),
        field!("major_linker_version",           0x02, FieldKind::Byte),
        field!("minor_linker_version",           0x03, FieldKind::Byte),
        field!("size_of_code",                   0x04, FieldKind::Dword),
        field!("size_of_initialized_data",       0x08, FieldKind::Dword),
        field!("size_of_uninitialized_data",     0x0C, FieldKind::Dword),
        field!("address_of_entry_point",         0x10, FieldKind::Dword),
        field!("base_of_code",                   0x14, FieldKind::Dword),
        field!("image_base",                     0x18, FieldKind::Qword),
        field!("section_alignment",              0x20, FieldKind::Dword),
        field!("file_alignment",                 0x24, FieldKind::Dword),
        field!("major_operating_system_version", 0x28, FieldKind::Word),
        field!("minor_operating_system_version", 0x2A, FieldKind::Word),
        field!("major_image_version",            0x2C, FieldKind::Word),
        field!("minor_image_version",            0x2E, FieldKind::Word),
        field!("major_subsystem_version",        0x30, FieldKind::Word),
        field!("minor_subsystem_version",        0x32, FieldKind::Word),
        field!("win32_version_value",            0x34, FieldKind::Dword),
        field!("size_of_image",                  0x38, FieldKind::Dword),
        field!("size_of_headers",                0x3C, FieldKind::Dword),
        field!("check_sum",                      0x40, FieldKind::Dword),
        field!("subsystem",                      0x44, FieldKind::Word),
        field!("dll_characteristics",            0x46, FieldKind::Word),
        field!("size_of_stack_reserve",          0x48, FieldKind::Qword),
        field!("size_of_stack_commit",           0x50, FieldKind::Qword),
        field!("size_of_heap_reserve",           0x58, FieldKind::Qword),
        field!("size_of_heap_commit",            0x60, FieldKind::Qword),
        field!("loader_flags",                   0x68, FieldKind::Dword),
        field!("number_of_rva_and_sizes",        0x6C, FieldKind::Dword),
        field!("data_directories",               0x70, data_directories!()),
    ],
};

/// `IMAGE_NT_HEADERS32`
#[rustfmt::skip]
pub static NT_HEADERS_32: Layout = Layout {
    name: "NtHeaders32",
    size: 0x18 + 0xE0,
    fields: &[
        field!("signature",       0x00, FieldKind::Dword),
        field!("file_header",     0x04, FieldKind::Struct(&FILE_HEADER)),
        field!("optional_header", 0x18, FieldKind::Struct(&OPTIONAL_HEADER_32)),
    ],
};

/// `IMAGE_NT_HEADERS64`
#[rustfmt::skip]
pub static NT_HEADERS_64: Layout = Layout {
    name: "NtHeaders64",
    size: 0x18 + 0xF0,
    fields: &[
        field!("signature",       0x00, FieldKind::Dword),
        field!("file_header",     0x04, FieldKind::Struct(&FILE_HEADER)),
        field!("optional_header", 0x18, FieldKind::Struct(&OPTIONAL_HEADER_64)),
    ],
};

/// `IMAGE_SECTION_HEADER`
#[rustfmt::skip]
pub static SECTION_HEADER: Layout = Layout {
    name: "SectionHeader",
    size: SECTION_HEADER_STRIDE,
    fields: &[
        field!("name",                   0x00, FieldKind::Name8),
        field!("virtual_size",           0x08, FieldKind::Dword),
        field!("virtual_address",        0x0C, FieldKind::Dword),
        field!("size_of_raw_data",       0x10, FieldKind::Dword),
        field!("pointer_to_raw_data",    0x14, FieldKind::Dword),
        field!("pointer_to_relocations", 0x18, FieldKind::Dword),
        field!("pointer_to_linenumbers", 0x1C, FieldKind::Dword),
        field!("number_of_relocations",  0x20, FieldKind::Word),
        field!("number_of_linenumbers",  0x22, FieldKind::Word),
        field!("characteristics",        0x24, FieldKind::Dword),
    ],
};
