//! The decoded header set of a PE image.
//!
//! [`Image::parse`] runs the complete decode in one pass over a borrowed buffer:
//!
//! 1. the DOS header at offset 0, which yields `e_lfanew`
//! 2. a single peek at the optional header magic, which selects the NT headers layout
//! 3. the NT headers at `e_lfanew`, with the file header and the selected optional header
//! 4. `number_of_sections` section headers following the optional header
//!
//! Every read is bounds checked, the first failing one aborts the decode and no partially
//! populated [`Image`] is ever returned. The result owns all of its data and does not borrow
//! from the input.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pescope::{Image, ParseOptions, ValidationConfig};
//!
//! let data = std::fs::read("tests/samples/crafted.exe")?;
//!
//! let image = Image::parse(&data)?;
//! println!("{} with {} sections", image.format(), image.section_headers.len());
//!
//! // Accept images with broken signatures, reject overlapping sections
//! let options = ParseOptions::new(ValidationConfig {
//!     enable_signature_validation: false,
//!     enable_section_overlap_validation: true,
//!     ..ValidationConfig::default()
//! });
//! let image = Image::parse_with(&data, &options)?;
//! for section in &image.section_headers {
//!     println!("{:8} 0x{:08X}", section.name, section.virtual_address);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use log::{debug, trace, warn};

use crate::{
    config::{ParseOptions, ValidationConfig},
    file::io::read_dword,
    pe::{
        decoder::{decode_array, Structure},
        nt::{NtHeaders, OPTIONAL_HEADER_OFFSET, PE_SIGNATURE},
        optional::OptionalHeaderFormat,
        resolve::resolve_address,
        schema::{SECTION_HEADER, SECTION_HEADER_STRIDE},
        section::SectionHeader,
        DosHeader,
    },
    Error::{InvalidDosSignature, InvalidPeSignature, OutOfBounds, UnresolvableAddress},
    Result,
};

/// DOS header, NT headers and section table of a PE image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// The DOS header at offset 0
    pub dos_header: DosHeader,
    /// The NT headers at `dos_header.e_lfanew`
    pub nt_headers: NtHeaders,
    /// The section table, in on-disk order
    pub section_headers: Vec<SectionHeader>,
}

impl Image {
    /// Decodes `data` with the default [`ParseOptions`].
    ///
    /// # Errors
    ///
    /// See [`Image::parse_with`].
    pub fn parse(data: &[u8]) -> Result<Image> {
        Self::parse_with(data, &ParseOptions::default())
    }

    /// Decodes `data` with the given options.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::OutOfBounds`] if any header does not fit into `data`
    /// - [`crate::Error::UnknownOptionalHeaderFormat`] if the optional header magic is neither
    ///   `PE32` nor `PE32+`
    /// - [`crate::Error::InvalidDosSignature`] or [`crate::Error::InvalidPeSignature`] if
    ///   signature validation is enabled and a signature does not match
    /// - [`crate::Error::Malformed`] if an enabled section check fails
    pub fn parse_with(data: &[u8], options: &ParseOptions) -> Result<Image> {
        let validation = &options.validation;
        let observer = options.observer.as_deref();

        let dos_header = DosHeader::decode(data, 0)?;
        if !dos_header.is_valid() {
            if validation.enable_signature_validation {
                return Err(InvalidDosSignature(dos_header.e_magic));
            }
            warn!(
                "Accepting invalid DOS signature - 0x{:04X}",
                dos_header.e_magic
            );
        }
        trace!("DOS header decoded, e_lfanew = 0x{:X}", dos_header.e_lfanew);
        if let Some(observer) = observer {
            observer.dos_header_parsed(&dos_header);
        }

        let nt_offset = dos_header.nt_headers_offset();
        if validation.enable_signature_validation {
            let signature = read_dword(data, nt_offset)?;
            if signature != PE_SIGNATURE {
                return Err(InvalidPeSignature(signature));
            }
        }

        let Some(magic_offset) = nt_offset.checked_add(OPTIONAL_HEADER_OFFSET) else {
            return Err(OutOfBounds);
        };
        let format = OptionalHeaderFormat::detect(data, magic_offset)?;
        trace!("Optional header format {format}");
        if let Some(observer) = observer {
            observer.format_selected(format);
        }

        let nt_headers = NtHeaders::decode_as(data, nt_offset, format)?;
        if !nt_headers.is_valid() {
            warn!(
                "Accepting invalid PE signature - 0x{:08X}",
                nt_headers.signature
            );
        }
        if let Some(observer) = observer {
            observer.nt_headers_parsed(&nt_headers, nt_offset);
        }

        let Some(table_offset) = nt_headers.section_table_offset(nt_offset) else {
            return Err(OutOfBounds);
        };
        let section_headers = decode_array(
            data,
            table_offset,
            &SECTION_HEADER,
            usize::from(nt_headers.file_header.number_of_sections),
            SECTION_HEADER_STRIDE,
        )?
        .into_iter()
        .map(SectionHeader::from_record)
        .collect::<Result<Vec<_>>>()?;
        if let Some(observer) = observer {
            observer.section_headers_parsed(&section_headers, table_offset);
        }

        let image = Image {
            dos_header,
            nt_headers,
            section_headers,
        };
        image.validate(data.len(), validation)?;

        debug!(
            "Decoded {} image, machine 0x{:04X}, {} sections",
            format,
            image.nt_headers.file_header.machine,
            image.section_headers.len()
        );

        Ok(image)
    }

    fn validate(&self, len: usize, config: &ValidationConfig) -> Result<()> {
        if config.enable_section_bounds_validation {
            for section in &self.section_headers {
                if section.size_of_raw_data == 0 {
                    continue;
                }

                let raw = section.raw_range();
                if raw.end > len as u64 {
                    return Err(malformed_error!(
                        "Section {} raw data 0x{:X}..0x{:X} exceeds the file size 0x{:X}",
                        section.name,
                        raw.start,
                        raw.end,
                        len
                    ));
                }
            }
        }

        if config.enable_section_overlap_validation {
            let alignment = self.nt_headers.optional_header.section_alignment();
            let mut ranges = self
                .section_headers
                .iter()
                .map(|section| (section.virtual_range(alignment), &section.name))
                .filter(|(range, _)| !range.is_empty())
                .collect::<Vec<_>>();
            ranges.sort_by_key(|(range, _)| range.start);

            for pair in ranges.windows(2) {
                let (previous, previous_name) = &pair[0];
                let (current, current_name) = &pair[1];
                if current.start < previous.end {
                    return Err(malformed_error!(
                        "Section {} at 0x{:X} overlaps section {} ending at 0x{:X}",
                        current_name,
                        current.start,
                        previous_name,
                        previous.end
                    ));
                }
            }
        }

        Ok(())
    }

    /// Which optional header shape the image uses
    #[must_use]
    pub fn format(&self) -> OptionalHeaderFormat {
        self.nt_headers.format()
    }

    /// Returns `true` for `PE32+` images
    #[must_use]
    pub fn is_pe32_plus(&self) -> bool {
        self.format() == OptionalHeaderFormat::Pe32Plus
    }

    /// Preferred load address
    #[must_use]
    pub fn image_base(&self) -> u64 {
        self.nt_headers.optional_header.image_base()
    }

    /// First section in table order whose aligned virtual range contains `rva`
    #[must_use]
    pub fn section_for_rva(&self, rva: u64) -> Option<&SectionHeader> {
        let alignment = self.nt_headers.optional_header.section_alignment();
        self.section_headers
            .iter()
            .find(|section| section.contains_rva(rva, alignment))
    }

    /// First section called `name`
    #[must_use]
    pub fn section_by_name(&self, name: &str) -> Option<&SectionHeader> {
        self.section_headers
            .iter()
            .find(|section| section.name == name)
    }

    /// Converts an RVA to a file offset, see [`resolve_address`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnresolvableAddress`] if `rva` is not backed by the file.
    pub fn rva_to_offset(&self, rva: u32) -> Result<u32> {
        resolve_address(self, rva)
    }

    /// Converts an absolute virtual address to a file offset.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnresolvableAddress`] if `va` is below the image base, further
    /// than 4 GiB above it, or not backed by the file.
    pub fn va_to_offset(&self, va: u64) -> Result<u32> {
        let Some(rva) = va.checked_sub(self.image_base()) else {
            return Err(UnresolvableAddress(va));
        };

        let rva = u32::try_from(rva).map_err(|_| UnresolvableAddress(va))?;
        self.rva_to_offset(rva).map_err(|_| UnresolvableAddress(va))
    }

    /// Converts a file offset back to an RVA.
    ///
    /// Offsets inside the headers map to themselves, everything else must fall into the raw
    /// data of a section.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnresolvableAddress`] if no section holds `offset`.
    pub fn offset_to_rva(&self, offset: u32) -> Result<u32> {
        if offset < self.nt_headers.optional_header.size_of_headers() {
            return Ok(offset);
        }

        let offset = u64::from(offset);
        let Some(section) = self
            .section_headers
            .iter()
            .find(|section| section.raw_range().contains(&offset))
        else {
            return Err(UnresolvableAddress(offset));
        };

        let rva = offset - u64::from(section.pointer_to_raw_data) + u64::from(section.virtual_address);
        u32::try_from(rva).map_err(|_| UnresolvableAddress(offset))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        pe::{DecodeObserver, OptionalHeader},
        test::{two_section_pe32, ImageBuilder, TestSection},
        Error,
    };

    #[test]
    fn crafted_pe32() {
        let data = two_section_pe32().build();
        let image = Image::parse(&data).unwrap();

        assert_eq!(image.dos_header.e_lfanew, 0x80);
        assert_eq!(image.format(), OptionalHeaderFormat::Pe32);
        assert!(!image.is_pe32_plus());
        assert!(matches!(
            image.nt_headers.optional_header,
            OptionalHeader::Pe32(_)
        ));
        assert_eq!(image.image_base(), 0x0040_0000);
        assert_eq!(image.section_headers.len(), 2);
        assert_eq!(image.section_headers[0].name, ".text");
        assert_eq!(image.section_headers[1].name, ".data");
        assert_eq!(image.section_headers[1].pointer_to_raw_data, 0x600);
    }

    #[test]
    fn crafted_pe32plus() {
        let data = ImageBuilder::pe32plus()
            .with_section(TestSection::new(b".text", 0x1000, 0x80).with_raw(0x200, 0x200))
            .build();
        let image = Image::parse(&data).unwrap();

        assert!(image.is_pe32_plus());
        assert_eq!(image.image_base(), 0x1_4000_0000);
        assert_eq!(image.section_headers.len(), 1);
        assert_eq!(image.rva_to_offset(0x1010).unwrap(), 0x210);
    }

    #[test]
    fn no_sections() {
        let data = ImageBuilder::pe32().build();
        let image = Image::parse(&data).unwrap();

        assert!(image.section_headers.is_empty());
        assert_eq!(image.rva_to_offset(0x10).unwrap(), 0x10);
        assert!(matches!(
            image.rva_to_offset(0x1000),
            Err(UnresolvableAddress(0x1000))
        ));
    }

    #[test]
    fn truncated_everywhere() {
        let data = two_section_pe32().build();
        let table_end = two_section_pe32().section_table_offset() + 2 * 0x28;

        for len in [0, 1, 0x3F, 0x80, 0x83, 0x97, 0x99, 0x100, 0x177, table_end - 1] {
            assert!(
                matches!(Image::parse(&data[..len]), Err(OutOfBounds)),
                "{len} bytes should not decode"
            );
        }
        assert!(Image::parse(&data[..table_end]).is_ok());
    }

    #[test]
    fn e_lfanew_past_the_end() {
        let data = ImageBuilder::pe32().build();
        let mut patched = data.clone();
        patched[0x3C..0x40].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());

        assert!(matches!(Image::parse(&patched), Err(OutOfBounds)));
        assert!(matches!(
            Image::parse_with(&patched, &ParseOptions::new(ValidationConfig::disabled())),
            Err(OutOfBounds)
        ));
    }

    #[test]
    fn unknown_format() {
        let data = ImageBuilder::pe32()
            .with_optional(|optional| optional.with_magic(0x0107))
            .build();

        assert!(matches!(
            Image::parse(&data),
            Err(Error::UnknownOptionalHeaderFormat(0x0107))
        ));
    }

    #[test]
    fn signatures() {
        let bad_dos = ImageBuilder::pe32().with_dos_magic(0x4D5A).build();
        let bad_pe = ImageBuilder::pe32().with_pe_signature(0x0000_454E).build();
        let permissive = ParseOptions::new(ValidationConfig::disabled());

        assert!(matches!(
            Image::parse(&bad_dos),
            Err(InvalidDosSignature(0x4D5A))
        ));
        assert!(matches!(
            Image::parse(&bad_pe),
            Err(InvalidPeSignature(0x0000_454E))
        ));

        let image = Image::parse_with(&bad_dos, &permissive).unwrap();
        assert!(!image.dos_header.is_valid());
        let image = Image::parse_with(&bad_pe, &permissive).unwrap();
        assert!(!image.nt_headers.is_valid());
    }

    #[test]
    fn section_bounds_validation() {
        let data = ImageBuilder::pe32()
            .with_section(TestSection::new(b".text", 0x1000, 0x100).with_raw(0x200, 0x200))
            .with_section(TestSection::new(b".bss", 0x2000, 0x100).with_raw(0x8000, 0))
            .build();
        assert!(Image::parse_with(&data, &ParseOptions::new(ValidationConfig::strict())).is_ok());

        let truncated = &data[..0x300];
        assert!(Image::parse(truncated).is_ok());
        assert!(matches!(
            Image::parse_with(truncated, &ParseOptions::new(ValidationConfig::strict())),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn section_overlap_validation() {
        let data = ImageBuilder::pe32()
            .with_section(TestSection::new(b".b", 0x2000, 0x1000).with_raw(0x400, 0x200))
            .with_section(TestSection::new(b".a", 0x1000, 0x1001).with_raw(0x200, 0x200))
            .build();

        assert!(Image::parse(&data).is_ok());
        assert!(matches!(
            Image::parse_with(&data, &ParseOptions::new(ValidationConfig::strict())),
            Err(Error::Malformed { .. })
        ));

        let data = two_section_pe32().build();
        assert!(Image::parse_with(&data, &ParseOptions::new(ValidationConfig::strict())).is_ok());
    }

    #[test]
    fn lookups() {
        let data = two_section_pe32().build();
        let image = Image::parse(&data).unwrap();

        assert_eq!(image.section_for_rva(0x1800).unwrap().name, ".text");
        assert_eq!(image.section_for_rva(0x2000).unwrap().name, ".data");
        assert!(image.section_for_rva(0x3000).is_none());
        assert_eq!(image.section_by_name(".data").unwrap().virtual_address, 0x2000);
        assert!(image.section_by_name(".rsrc").is_none());
    }

    #[test]
    fn va_and_offset_translation() {
        let data = two_section_pe32().build();
        let image = Image::parse(&data).unwrap();

        assert_eq!(image.va_to_offset(0x0040_1008).unwrap(), 0x408);
        assert!(matches!(
            image.va_to_offset(0x1008),
            Err(UnresolvableAddress(0x1008))
        ));
        assert!(matches!(
            image.va_to_offset(0x0040_0000 + 0x1_0000_0000),
            Err(UnresolvableAddress(0x1_0040_0000))
        ));
        // inside the image range but outside every section
        assert!(matches!(
            image.va_to_offset(0x0040_5000),
            Err(UnresolvableAddress(0x0040_5000))
        ));

        assert_eq!(image.offset_to_rva(0x80).unwrap(), 0x80);
        assert_eq!(image.offset_to_rva(0x408).unwrap(), 0x1008);
        assert_eq!(image.offset_to_rva(0x610).unwrap(), 0x2010);
        assert!(image.offset_to_rva(0x800).is_err());

        let rva = image.offset_to_rva(0x408).unwrap();
        assert_eq!(image.rva_to_offset(rva).unwrap(), 0x408);
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl DecodeObserver for Recorder {
        fn dos_header_parsed(&self, header: &DosHeader) {
            self.events
                .lock()
                .unwrap()
                .push(format!("dos 0x{:X}", header.e_lfanew));
        }

        fn format_selected(&self, format: OptionalHeaderFormat) {
            self.events.lock().unwrap().push(format!("format {format}"));
        }

        fn nt_headers_parsed(&self, _headers: &NtHeaders, offset: usize) {
            self.events.lock().unwrap().push(format!("nt 0x{offset:X}"));
        }

        fn section_headers_parsed(&self, sections: &[SectionHeader], offset: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("sections {} 0x{offset:X}", sections.len()));
        }
    }

    #[test]
    fn observer_order() {
        let data = two_section_pe32().build();
        let recorder = Arc::new(Recorder::default());
        let options = ParseOptions::default().with_observer(recorder.clone());

        Image::parse_with(&data, &options).unwrap();
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![
                "dos 0x80".to_string(),
                "format PE32".to_string(),
                "nt 0x80".to_string(),
                "sections 2 0x178".to_string(),
            ]
        );
    }

    #[test]
    fn observer_stops_at_failure() {
        let data = ImageBuilder::pe32()
            .with_optional(|optional| optional.with_magic(0x0107))
            .build();
        let recorder = Arc::new(Recorder::default());
        let options = ParseOptions::default().with_observer(recorder.clone());

        assert!(Image::parse_with(&data, &options).is_err());
        assert_eq!(*recorder.events.lock().unwrap(), vec!["dos 0x80".to_string()]);
    }
}
