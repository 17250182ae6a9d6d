// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # pescope
//!
//! [![Crates.io](https://img.shields.io/crates/v/pescope.svg)](https://crates.io/crates/pescope)
//! [![Documentation](https://docs.rs/pescope/badge.svg)](https://docs.rs/pescope)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/pescope/blob/main/LICENSE-APACHE)
//!
//! A small, strict decoder for the headers of Portable Executable (PE) images, and the
//! translation of relative virtual addresses (RVAs) into file offsets.
//!
//! ## Features
//!
//! - **📐 Table driven** - Every header is a static field table, decoded by one generic routine
//! - **🔀 PE32 and PE32+** - The optional header shape is picked from its magic, once
//! - **🧭 Address resolution** - RVA, VA and file offset translation over the section table
//! - **🛡️ Bounds checked** - Truncated or hostile input fails with an error, never a panic
//! - **📦 Memory-mapped access** - Files are mapped instead of read, where possible
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pescope::prelude::*;
//!
//! let file = File::from_file("tests/samples/crafted.exe".as_ref())?;
//! let image = file.image();
//!
//! println!("{} image based at 0x{:X}", image.format(), image.image_base());
//! for section in &image.section_headers {
//!     println!("{:8} rva 0x{:08X}", section.name, section.virtual_address);
//! }
//!
//! let entry = image.nt_headers.optional_header.address_of_entry_point();
//! println!("entry point at file offset 0x{:X}", resolve_address(image, entry)?);
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! ### Decoding a buffer
//!
//! [`Image`] decodes from any byte slice and does not keep a reference to it:
//!
//! ```rust,no_run
//! use pescope::{Image, ParseOptions, ValidationConfig};
//!
//! let data = std::fs::read("tests/samples/crafted64.dll")?;
//! let image = Image::parse_with(&data, &ParseOptions::new(ValidationConfig::strict()))?;
//! assert!(image.is_pe32_plus());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - [`pe`] - header layouts, the decoder, typed headers and address resolution
//! - [`file`] - file and memory backends, and the [`File`] convenience wrapper
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Logging
//!
//! Decoding milestones are reported through the [`log`](https://docs.rs/log) facade at `trace`
//! and `debug` level, accepted signature mismatches at `warn` level. For programmatic access
//! implement [`pe::DecodeObserver`] and pass it in [`ParseOptions`].
//!
//! ## Development and Testing
//!
//! ### Fuzzing
//!
//! ```bash
//! cargo +nightly fuzz run image --release
//! ```
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```
#[macro_use]
pub(crate) mod error;
pub(crate) mod config;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use pescope::prelude::*;
///
/// let file = File::from_file("tests/samples/crafted.exe".as_ref())?;
/// let offset = file.image().rva_to_offset(0x1008)?;
/// # Ok::<(), pescope::Error>(())
/// ```
pub mod prelude;

/// Loading PE images from disk or memory.
///
/// # Key Types
///
/// - [`file::File`] - Owns the bytes of an image together with its decoded headers
/// - [`file::Backend`] - Source of those bytes, memory-mapped or in memory
/// - [`file::io`] - Bounds checked little-endian primitive readers
pub mod file;

/// PE/COFF header structures, decoding and address resolution.
///
/// # Key Types
///
/// - [`pe::Image`] - The decoded headers of one image
/// - [`pe::schema`] and [`pe::decoder`] - The field tables and the routine interpreting them
/// - [`pe::resolve_address`] - RVA to file offset translation
///
/// # Examples
///
/// ```rust
/// use pescope::pe::{align_down, align_up};
///
/// assert_eq!(align_up(0x1234, 0x1000), 0x2000);
/// assert_eq!(align_down(0x1234, 0x1000), 0x1000);
/// ```
pub mod pe;

/// `pescope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `pescope` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use pescope::{Error, Image};
///
/// let data = std::fs::read("tests/samples/crafted.exe")?;
/// match Image::parse(&data) {
///     Ok(image) => println!("{} sections", image.section_headers.len()),
///     Err(Error::OutOfBounds) => println!("Truncated image"),
///     Err(Error::UnknownOptionalHeaderFormat(magic)) => println!("Unknown magic 0x{magic:X}"),
///     Err(e) => println!("Error: {}", e),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub use error::Error;

/// Configuration of [`Image::parse_with`] and [`File::from_mem_with_options`].
pub use config::{ParseOptions, ValidationConfig};

/// Main entry points: decoded headers, a file holding them, and address resolution.
pub use file::File;
pub use pe::{resolve_address, Image};
