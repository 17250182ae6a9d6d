//! # pescope Prelude
//!
//! This module provides convenient access to the most commonly used types and traits from the
//! pescope library. Import this module to get started quickly.
//!
//! ```rust,no_run
//! use pescope::prelude::*;
//!
//! let data = std::fs::read("tests/samples/crafted.exe")?;
//! let image = Image::parse(&data)?;
//! if let Some(import) = image
//!     .nt_headers
//!     .optional_header
//!     .data_directory(DataDirectoryType::ImportTable)
//! {
//!     println!("imports at file offset 0x{:X}", image.rva_to_offset(import.virtual_address)?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all pescope operations
pub use crate::Error;

/// The result type used throughout pescope
pub use crate::Result;

/// Parse configuration
pub use crate::{ParseOptions, ValidationConfig};

// ================================================================================================
// Entry Points
// ================================================================================================

/// Decoded headers and the file that holds them
pub use crate::{File, Image};

/// Address translation
pub use crate::pe::{align_down, align_up, resolve_address};

// ================================================================================================
// Headers
// ================================================================================================

/// Typed header structures
pub use crate::pe::{
    DataDirectory, DataDirectoryType, DosHeader, FileHeader, NtHeaders, OptionalHeader,
    OptionalHeaderFormat, SectionHeader,
};

/// Typed views of raw header fields
pub use crate::pe::{
    DllCharacteristics, FileCharacteristics, Machine, SectionCharacteristics, Subsystem,
};

/// Decoding extension points
pub use crate::pe::{DecodeObserver, Structure};
