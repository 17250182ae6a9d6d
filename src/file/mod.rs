//! PE file abstraction.
//!
//! [`crate::pe::Image`] decodes from any borrowed byte slice. This module adds ownership on top:
//! a [`File`] holds the bytes of an image, from disk or from memory, together with the headers
//! decoded from them, and offers address translation and bounds checked access to the raw data.
//!
//! # Key Components
//!
//! - [`crate::file::File`] - Owns an image and its decoded headers
//! - [`crate::file::Backend`] - Trait for different data sources (disk files, memory buffers)
//! - [`crate::file::io`] - Low-level, bounds checked little-endian readers
//!
//! ## Backend Implementations
//! - `Physical` - Memory-mapped file backend for disk access
//! - `Memory` - In-memory buffer backend
//!
//! # Examples
//!
//! ## Loading from File
//!
//! ```rust,no_run
//! use pescope::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("tests/samples/crafted.exe"))?;
//! println!("Loaded PE file with {} bytes", file.len());
//!
//! println!("Image base: 0x{:x}", file.imagebase());
//! println!("Number of sections: {}", file.sections().count());
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! ## Address Translation
//!
//! ```rust,no_run
//! use pescope::{pe::DataDirectoryType, File};
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("tests/samples/crafted.exe"))?;
//!
//! if let Some((rva, size)) = file.get_data_directory(DataDirectoryType::ImportTable) {
//!     let offset = file.rva_to_offset(rva as usize)?;
//!     let imports = file.data_slice(offset, size as usize)?;
//!     println!("Import descriptors start with: {:02x?}", &imports[0..8]);
//! }
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! [`File`] is `Send + Sync` and can be shared across threads for concurrent analysis of the
//! same image.

pub mod io;

mod memory;
mod physical;

use std::path::Path;

pub use memory::Memory;
pub use physical::Physical;

use crate::{
    config::ParseOptions,
    pe::{DataDirectory, DataDirectoryType, Image, SectionHeader},
    Error::{Empty, UnresolvableAddress},
    Result,
};

/// Backend trait for file data sources.
///
/// This trait abstracts over the source of PE data, allowing for both in-memory and on-disk
/// representations. All implementations must be thread-safe.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Arguments
    ///
    /// * `offset` - The starting offset within the data.
    /// * `len` - The length of the slice in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// A loaded PE image.
///
/// Owns the raw bytes through a [`Backend`] and the [`Image`] decoded from them. The image
/// holds no references into the data, so no self-referential borrowing is involved.
///
/// # Examples
///
/// ```rust,no_run
/// use pescope::File;
/// use std::path::Path;
///
/// let file = File::from_file(Path::new("tests/samples/crafted.exe"))?;
///
/// let entry_rva = file.image().nt_headers.optional_header.address_of_entry_point() as usize;
/// let entry_offset = file.rva_to_offset(entry_rva)?;
///
/// let entry_code = file.data_slice(entry_offset, 16)?;
/// println!("Entry point bytes: {:02x?}", entry_code);
/// # Ok::<(), pescope::Error>(())
/// ```
pub struct File {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
    /// The headers decoded from `data`.
    image: Image,
}

impl File {
    /// Loads a PE file from the given path, memory-mapping it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened or mapped
    /// - The file is empty
    /// - The headers can not be decoded, see [`Image::parse_with`]
    pub fn from_file(file: &Path) -> Result<File> {
        Self::from_file_with_options(file, &ParseOptions::default())
    }

    /// Loads a PE file from the given path with explicit [`ParseOptions`].
    ///
    /// # Errors
    ///
    /// See [`File::from_file`].
    pub fn from_file_with_options(file: &Path, options: &ParseOptions) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input, options)
    }

    /// Loads a PE file from a memory buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The buffer is empty
    /// - The headers can not be decoded, see [`Image::parse_with`]
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use pescope::File;
    ///
    /// let data = std::fs::read("tests/samples/crafted64.dll")?;
    /// let file = File::from_mem(data)?;
    /// assert!(file.is_pe32_plus_format());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        Self::from_mem_with_options(data, &ParseOptions::default())
    }

    /// Loads a PE file from a memory buffer with explicit [`ParseOptions`].
    ///
    /// # Errors
    ///
    /// See [`File::from_mem`].
    pub fn from_mem_with_options(data: Vec<u8>, options: &ParseOptions) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input, options)
    }

    fn load<T: Backend + 'static>(data: T, options: &ParseOptions) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let image = Image::parse_with(data.data(), options)?;

        Ok(File {
            data: Box::new(data),
            image,
        })
    }

    /// Returns the total size of the loaded file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the file has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The decoded headers
    #[must_use]
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Returns the preferred load address of the image.
    #[must_use]
    pub fn imagebase(&self) -> u64 {
        self.image.image_base()
    }

    /// Iterates the section table in on-disk order.
    pub fn sections(&self) -> impl Iterator<Item = &SectionHeader> {
        self.image.section_headers.iter()
    }

    /// Returns every non-empty data directory together with its slot.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use pescope::File;
    /// use std::path::Path;
    ///
    /// let file = File::from_file(Path::new("tests/samples/crafted64.dll"))?;
    /// for (kind, directory) in file.directories() {
    ///     println!("{kind}: rva 0x{:x}, {} bytes", directory.virtual_address, directory.size);
    /// }
    /// # Ok::<(), pescope::Error>(())
    /// ```
    #[must_use]
    pub fn directories(&self) -> Vec<(DataDirectoryType, DataDirectory)> {
        self.image
            .nt_headers
            .optional_header
            .data_directories()
            .iter()
            .enumerate()
            .filter(|(_, directory)| !directory.is_empty())
            .filter_map(|(index, directory)| {
                DataDirectoryType::from_repr(index).map(|kind| (kind, *directory))
            })
            .collect()
    }

    /// Returns `(rva, size)` of the directory in slot `dir_type`, or `None` if it is empty.
    #[must_use]
    pub fn get_data_directory(&self, dir_type: DataDirectoryType) -> Option<(u32, u32)> {
        self.image
            .nt_headers
            .optional_header
            .data_directory(dir_type)
            .map(|directory| (directory.virtual_address, directory.size))
    }

    /// Returns the entire file content.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns a slice of the file data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the requested range is out of bounds.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }

    /// Converts a virtual address (VA) to a file offset.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnresolvableAddress`] if the VA is below the image base or can
    /// not be mapped.
    pub fn va_to_offset(&self, va: usize) -> Result<usize> {
        let offset = self.image.va_to_offset(va as u64)?;
        Ok(offset as usize)
    }

    /// Converts a relative virtual address (RVA) to a file offset.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnresolvableAddress`] if the RVA can not be mapped.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        let rva = u32::try_from(rva).map_err(|_| UnresolvableAddress(rva as u64))?;
        let offset = self.image.rva_to_offset(rva)?;
        Ok(offset as usize)
    }

    /// Converts a file offset to a relative virtual address (RVA).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnresolvableAddress`] if the offset is not part of the headers
    /// or of any section's raw data.
    pub fn offset_to_rva(&self, offset: usize) -> Result<usize> {
        let offset = u32::try_from(offset).map_err(|_| UnresolvableAddress(offset as u64))?;
        let rva = self.image.offset_to_rva(offset)?;
        Ok(rva as usize)
    }

    /// Returns the file alignment from the optional header
    #[must_use]
    pub fn file_alignment(&self) -> u32 {
        self.image.nt_headers.optional_header.file_alignment()
    }

    /// Returns the section alignment from the optional header
    #[must_use]
    pub fn section_alignment(&self) -> u32 {
        self.image.nt_headers.optional_header.section_alignment()
    }

    /// Returns `true` for `PE32+` images
    #[must_use]
    pub fn is_pe32_plus_format(&self) -> bool {
        self.image.is_pe32_plus()
    }
}
