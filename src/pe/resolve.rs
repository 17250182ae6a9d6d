//! RVA to file offset resolution.
//!
//! A loaded image is a sparse projection of the file: the headers are mapped at their file
//! offsets, and each section is mapped at its `virtual_address`, occupying `virtual_size`
//! rounded up to the section alignment. Resolving an RVA walks that mapping backwards.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pescope::{resolve_address, Image};
//!
//! let data = std::fs::read("tests/samples/crafted.exe")?;
//! let image = Image::parse(&data)?;
//!
//! let entry = image.nt_headers.optional_header.address_of_entry_point();
//! let offset = resolve_address(&image, entry)?;
//! println!("entry point at file offset 0x{offset:X}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::{pe::Image, Error::UnresolvableAddress, Result};

/// Rounds `value` down to a multiple of `align`.
///
/// `align` must be a power of two, 0 is treated as 1.
#[must_use]
pub const fn align_down(value: u64, align: u64) -> u64 {
    let align = if align == 0 { 1 } else { align };
    value & !(align - 1)
}

/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two, 0 is treated as 1. A `value` of 0 stays 0. Results that
/// would exceed `u64::MAX` saturate.
///
/// ```rust
/// use pescope::pe::align_up;
///
/// assert_eq!(align_up(0x10, 0x1000), 0x1000);
/// assert_eq!(align_up(0x1000, 0x1000), 0x1000);
/// assert_eq!(align_up(0x1001, 0x1000), 0x2000);
/// assert_eq!(align_up(0, 0x1000), 0);
/// ```
#[must_use]
pub const fn align_up(value: u64, align: u64) -> u64 {
    if value == 0 {
        return 0;
    }

    let align = if align == 0 { 1 } else { align };
    align_down(value - 1, align).saturating_add(align)
}

/// Translates `rva` into a file offset within `image`.
///
/// Addresses below `size_of_headers` are identity mapped. Everything else must fall into the
/// aligned virtual range of a section; sections are tried in table order and the first one
/// containing `rva` wins, overlaps are not diagnosed here.
///
/// # Errors
///
/// Returns [`crate::Error::UnresolvableAddress`] if no section contains `rva`, or if the
/// resulting offset does not fit into 32 bits.
pub fn resolve_address(image: &Image, rva: u32) -> Result<u32> {
    let optional_header = &image.nt_headers.optional_header;
    if rva < optional_header.size_of_headers() {
        return Ok(rva);
    }

    let rva = u64::from(rva);
    let Some(section) = image.section_for_rva(rva) else {
        return Err(UnresolvableAddress(rva));
    };

    let offset = rva - u64::from(section.virtual_address) + u64::from(section.pointer_to_raw_data);
    u32::try_from(offset).map_err(|_| UnresolvableAddress(rva))
}
