//! Physical file backend for memory-mapped I/O.
//!
//! [`Physical`] maps an image read-only into the address space of the process instead of
//! reading it. Header decoding touches only the first few pages of a file, so for large images
//! most of the file is never paged in.
//!
//! # Examples
//!
//! ```rust,ignore
//! use pescope::file::{Backend, Physical};
//! use std::path::Path;
//!
//! let physical = Physical::new(Path::new("tests/samples/crafted.exe"))?;
//!
//! // DOS signature and NT headers offset
//! assert_eq!(physical.data_slice(0, 2)?, b"MZ");
//! let e_lfanew = physical.data_slice(0x3C, 4)?;
//! # Ok::<(), pescope::Error>(())
//! ```

use super::Backend;
use crate::{
    Error::{FileError, OutOfBounds},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A file backend that uses memory-mapped I/O for efficient access to files on disk.
///
/// The mapping is read-only. Modifying the underlying file while it is mapped is undefined
/// behaviour, as with every memory-mapped file.
#[derive(Debug)]
pub struct Physical {
    /// Memory-mapped file data
    data: Mmap,
}

impl Physical {
    /// Create a new physical file backend by memory-mapping the specified file.
    ///
    /// # Arguments
    /// * `path` - Path to the PE file on disk. Accepts `&Path`, `&str`, `String`, or `PathBuf`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(error) => return Err(FileError(error)),
        };

        Self::from_std_file(file)
    }

    /// Creates a new physical file backend from an opened [`std::fs::File`].
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if memory mapping fails.
    #[allow(clippy::needless_pass_by_value)]
    pub fn from_std_file(file: fs::File) -> Result<Physical> {
        let mmap = unsafe { Mmap::map(&file) }.map_err(FileError)?;

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(OutOfBounds);
        };

        self.data.get(offset..offset_end).ok_or(OutOfBounds)
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn crafted() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/samples/crafted.exe")
    }

    #[test]
    fn physical() {
        let physical = Physical::new(crafted()).unwrap();

        assert_eq!(physical.len(), 0x800);
        assert_eq!(physical.data()[0], 0x4D);
        assert_eq!(physical.data()[1], 0x5A);
        assert_eq!(
            physical.data_slice(0x80, 6).unwrap(),
            &[0x50, 0x45, 0x00, 0x00, 0x4C, 0x01]
        );

        assert!(physical
            .data_slice(u32::MAX as usize, u32::MAX as usize)
            .is_err());
        assert!(physical.data_slice(0, 4 * 1024 * 1024).is_err());
    }

    #[test]
    fn invalid_file_path() {
        let result = Physical::new(PathBuf::from("/nonexistent/path/to/file.dll"));
        match result {
            Err(FileError(io_error)) => {
                assert_eq!(io_error.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected FileError"),
        }
    }

    #[test]
    fn from_std_file() {
        let file = fs::File::open(crafted()).unwrap();
        let physical = Physical::from_std_file(file).unwrap();

        assert_eq!(physical.data_slice(0, 2).unwrap(), b"MZ");
    }

    #[test]
    fn boundary_conditions() {
        let physical = Physical::new(crafted()).unwrap();
        let len = physical.len();

        assert_eq!(physical.data_slice(len - 1, 1).unwrap().len(), 1);
        assert_eq!(physical.data_slice(0, len).unwrap().len(), len);
        assert_eq!(physical.data_slice(len, 0).unwrap().len(), 0);

        assert!(matches!(physical.data_slice(usize::MAX, 1), Err(OutOfBounds)));
        assert!(matches!(physical.data_slice(len, 1), Err(OutOfBounds)));
        assert!(matches!(physical.data_slice(len - 1, 2), Err(OutOfBounds)));
    }

    #[test]
    fn empty_file() {
        let temp_path = std::env::temp_dir().join("pescope_physical_empty.bin");
        std::fs::write(&temp_path, b"").unwrap();

        let physical = Physical::new(&temp_path).unwrap();
        assert_eq!(physical.len(), 0);
        assert!(physical.data_slice(0, 1).is_err());

        std::fs::remove_file(&temp_path).unwrap();
    }
}
