//! End to end decoding and address resolution over hand assembled and sample images.

mod common;

use std::{
    sync::{Arc, Mutex},
    thread,
};

use common::{image, sample, set_magic, set_pe_signature, E_LFANEW};
use pescope::prelude::*;

fn two_sections() -> Vec<u8> {
    image(
        false,
        0x400,
        &[
            (".text", 0x1000, 0x10, 0x400, 0x200),
            (".data", 0x2000, 0x100, 0x600, 0x200),
        ],
    )
}

#[test]
fn decode_and_resolve() -> Result<()> {
    let data = two_sections();
    let image = Image::parse(&data)?;

    assert_eq!(image.dos_header.e_lfanew as usize, E_LFANEW);
    assert_eq!(image.format(), OptionalHeaderFormat::Pe32);
    assert_eq!(image.image_base(), 0x0040_0000);
    assert_eq!(image.section_headers.len(), 2);
    assert_eq!(image.section_headers[0].name, ".text");
    assert_eq!(image.section_headers[1].name, ".data");

    assert_eq!(resolve_address(&image, 0x1008)?, 0x408);
    assert_eq!(resolve_address(&image, 0x2000)?, 0x600);
    assert_eq!(resolve_address(&image, 0x10)?, 0x10);
    assert!(matches!(
        resolve_address(&image, 0x5000),
        Err(Error::UnresolvableAddress(0x5000))
    ));

    Ok(())
}

#[test]
fn single_text_section() -> Result<()> {
    let data = image(false, 0x400, &[(".text", 0x1000, 0x10, 0x400, 0x200)]);
    let image = Image::parse(&data)?;

    assert_eq!(image.dos_header.e_lfanew, 0x80);
    assert_eq!(image.nt_headers.file_header.size_of_optional_header, 0xE0);
    assert_eq!(image.nt_headers.optional_header.section_alignment(), 0x1000);
    assert_eq!(image.section_headers.len(), 1);
    assert_eq!(resolve_address(&image, 0x1008)?, 0x408);

    Ok(())
}

#[test]
fn decode_pe32plus() -> Result<()> {
    let data = image(true, 0x400, &[(".text", 0x1000, 0x800, 0x400, 0x800)]);
    let image = Image::parse(&data)?;

    assert!(image.is_pe32_plus());
    assert_eq!(image.image_base(), 0x1_4000_0000);
    assert_eq!(
        image.nt_headers.file_header.machine_type(),
        Some(Machine::Amd64)
    );
    assert_eq!(image.rva_to_offset(0x1234)?, 0x634);
    assert_eq!(image.va_to_offset(0x1_4000_1234)?, 0x634);

    Ok(())
}

#[test]
fn every_truncation_fails() {
    let data = two_sections();
    let table_end = E_LFANEW + 0x18 + 0xE0 + 2 * 0x28;

    for len in 0..table_end {
        assert!(
            matches!(Image::parse(&data[..len]), Err(Error::OutOfBounds)),
            "prefix of {len} bytes decoded"
        );
    }

    assert!(Image::parse(&data[..table_end]).is_ok());
}

#[test]
fn unknown_optional_header_magic() {
    for magic in [0x0000, 0x0107, 0x010C, 0x020A, 0xFFFF] {
        let mut data = two_sections();
        set_magic(&mut data, magic);

        assert!(matches!(
            Image::parse(&data),
            Err(Error::UnknownOptionalHeaderFormat(found)) if found == magic
        ));
    }
}

#[test]
fn signature_validation() {
    let mut data = two_sections();
    data[0] = b'Z';

    assert!(matches!(
        Image::parse(&data),
        Err(Error::InvalidDosSignature(0x5A5A))
    ));

    let permissive = ParseOptions::new(ValidationConfig::disabled());
    assert!(Image::parse_with(&data, &permissive).is_ok());

    let mut data = two_sections();
    set_pe_signature(&mut data, 0x0000_454E);

    assert!(matches!(
        Image::parse(&data),
        Err(Error::InvalidPeSignature(0x0000_454E))
    ));
    let image = Image::parse_with(&data, &permissive).unwrap();
    assert!(!image.nt_headers.is_valid());
    assert_eq!(image.rva_to_offset(0x1008).unwrap(), 0x408);
}

#[test]
fn strict_section_checks() {
    let overlapping = image(
        false,
        0x400,
        &[
            (".text", 0x1000, 0x1800, 0x400, 0x200),
            (".data", 0x2000, 0x100, 0x600, 0x200),
        ],
    );
    let strict = ParseOptions::new(ValidationConfig::strict());

    assert!(Image::parse(&overlapping).is_ok());
    assert!(matches!(
        Image::parse_with(&overlapping, &strict),
        Err(Error::Malformed { .. })
    ));

    let mut truncated = two_sections();
    truncated.truncate(0x700);

    assert!(Image::parse(&truncated).is_ok());
    assert!(matches!(
        Image::parse_with(&truncated, &strict),
        Err(Error::Malformed { .. })
    ));

    assert!(Image::parse_with(&two_sections(), &strict).is_ok());
}

#[test]
fn overlapping_sections_resolve_to_the_first() -> Result<()> {
    let data = image(
        false,
        0x400,
        &[
            (".one", 0x1000, 0x2000, 0x400, 0x200),
            (".two", 0x2000, 0x100, 0x600, 0x200),
        ],
    );
    let image = Image::parse(&data)?;

    assert_eq!(image.rva_to_offset(0x2010)?, 0x1410);
    assert_eq!(image.section_for_rva(0x2010).map(|s| s.name.as_str()), Some(".one"));

    Ok(())
}

#[test]
fn samples() -> Result<()> {
    let exe = File::from_file(&sample("crafted.exe"))?;
    assert_eq!(exe.image().format(), OptionalHeaderFormat::Pe32);
    assert_eq!(exe.rva_to_offset(0x1008)?, 0x408);
    assert_eq!(
        exe.image().nt_headers.optional_header.subsystem_type(),
        Some(Subsystem::WindowsCui)
    );

    let dll = File::from_file(&sample("crafted64.dll"))?;
    let image = dll.image();
    assert!(image.is_pe32_plus());
    assert!(image.nt_headers.file_header.is_dll());
    assert_eq!(
        image.section_by_name(".rdata").map(|s| s.pointer_to_raw_data),
        Some(0x1800)
    );

    let (rva, size) = dll
        .get_data_directory(DataDirectoryType::ExportTable)
        .unwrap();
    assert_eq!((rva, size), (0x3000, 0x80));
    let offset = dll.rva_to_offset(rva as usize)?;
    assert_eq!(offset, 0x1800);
    assert_eq!(dll.data_slice(offset, size as usize)?.len(), 0x80);

    // .text has a virtual size of 0x1234, the tail up to the section alignment still resolves
    assert_eq!(image.rva_to_offset(0x1FFF)?, 0x13FF);

    Ok(())
}

#[test]
fn concurrent_resolution() {
    let image = Arc::new(Image::parse(&two_sections()).unwrap());

    let handles = (0..8u32)
        .map(|worker| {
            let image = Arc::clone(&image);
            thread::spawn(move || {
                (0..0x100u32)
                    .map(|delta| image.rva_to_offset(0x2000 + delta).unwrap())
                    .zip(0..)
                    .all(|(offset, delta)| offset == 0x600 + delta)
                    && image.rva_to_offset(worker).unwrap() == worker
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

#[test]
fn concurrent_decoding() {
    let data = Arc::new(std::fs::read(sample("crafted64.dll")).unwrap());

    let handles = (0..4)
        .map(|_| {
            let data = Arc::clone(&data);
            thread::spawn(move || Image::parse(&data).map(|image| image.section_headers.len()))
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 3);
    }
}

#[derive(Default)]
struct Milestones(Mutex<Vec<String>>);

impl DecodeObserver for Milestones {
    fn format_selected(&self, format: OptionalHeaderFormat) {
        self.0.lock().unwrap().push(format.to_string());
    }

    fn section_headers_parsed(&self, sections: &[SectionHeader], _offset: usize) {
        self.0
            .lock()
            .unwrap()
            .extend(sections.iter().map(|section| section.name.clone()));
    }
}

#[test]
fn observer() {
    let milestones = Arc::new(Milestones::default());
    let options = ParseOptions::default().with_observer(milestones.clone());

    File::from_file_with_options(&sample("crafted64.dll"), &options).unwrap();

    assert_eq!(
        *milestones.0.lock().unwrap(),
        ["PE32+", ".text", ".rdata", ".reloc"]
    );
}
