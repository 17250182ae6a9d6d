//! PE header decoding and address resolution.
//!
//! # Architecture
//!
//! - [`schema`] - static field tables for every header structure
//! - [`decoder`] - the one routine that applies a table to a buffer, and the [`Structure`]
//!   trait typed headers implement on top of it
//! - the typed headers: [`DosHeader`], [`FileHeader`], [`OptionalHeader`], [`NtHeaders`] and
//!   [`SectionHeader`]
//! - [`Image`] - the top level decode, driving the steps above in order
//! - [`resolve_address`] - RVA to file offset translation over a decoded [`Image`]
//!
//! Decoding is purely functional over `&[u8]`: nothing is cached and the input is never
//! modified, so the same buffer can be decoded from several threads at once.

pub mod decoder;
pub mod schema;

mod coff;
mod dos;
mod image;
mod nt;
mod observer;
mod optional;
mod resolve;
mod section;

pub use coff::{FileCharacteristics, FileHeader, Machine};
pub use decoder::Structure;
pub use dos::{DosHeader, DOS_SIGNATURE};
pub use image::Image;
pub use nt::{NtHeaders, OPTIONAL_HEADER_OFFSET, PE_SIGNATURE};
pub use observer::DecodeObserver;
pub use optional::{
    DataDirectory, DataDirectoryType, DllCharacteristics, OptionalHeader, OptionalHeader32,
    OptionalHeader64, OptionalHeaderFormat, Subsystem, PE32PLUS_MAGIC, PE32_MAGIC,
};
pub use resolve::{align_down, align_up, resolve_address};
pub use section::{SectionCharacteristics, SectionHeader};
