#![no_main]

use libfuzzer_sys::fuzz_target;
use pescope::{Image, ParseOptions, ValidationConfig};

fuzz_target!(|data: &[u8]| {
    if let Ok(image) = Image::parse_with(data, &ParseOptions::new(ValidationConfig::strict())) {
        for section in &image.section_headers {
            let _ = image.rva_to_offset(section.virtual_address);
        }
    }

    if let Ok(image) = Image::parse_with(data, &ParseOptions::new(ValidationConfig::disabled())) {
        let entry = image.nt_headers.optional_header.address_of_entry_point();
        let _ = image.rva_to_offset(entry);
        let _ = image.offset_to_rva(entry);
    }
});
