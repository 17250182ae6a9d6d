//! Hand assembled images shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

pub const E_LFANEW: usize = 0x80;

pub fn sample(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/samples")
        .join(name)
}

fn put_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(data: &mut [u8], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// `(name, virtual_address, virtual_size, pointer_to_raw_data, size_of_raw_data)`
pub type Section = (&'static str, u32, u32, u32, u32);

/// Assembles a minimal image with the NT headers at [`E_LFANEW`].
///
/// The file is exactly as long as its last raw section, or `size_of_headers` if that is larger.
pub fn image(plus: bool, size_of_headers: u32, sections: &[Section]) -> Vec<u8> {
    let optional_size: usize = if plus { 0xF0 } else { 0xE0 };
    let optional = E_LFANEW + 0x18;
    let table = optional + optional_size;

    let raw_end = sections
        .iter()
        .map(|&(_, _, _, raw, size)| (raw + size) as usize)
        .max()
        .unwrap_or(0);
    let len = (table + sections.len() * 0x28)
        .max(size_of_headers as usize)
        .max(raw_end);

    let mut data = vec![0u8; len];
    data[0..2].copy_from_slice(b"MZ");
    put_u32(&mut data, 0x3C, E_LFANEW as u32);

    data[E_LFANEW..E_LFANEW + 4].copy_from_slice(b"PE\0\0");
    put_u16(&mut data, E_LFANEW + 0x04, if plus { 0x8664 } else { 0x014C });
    put_u16(&mut data, E_LFANEW + 0x06, sections.len() as u16);
    put_u16(&mut data, E_LFANEW + 0x14, optional_size as u16);
    put_u16(&mut data, E_LFANEW + 0x16, 0x0102);

    put_u16(&mut data, optional, if plus { 0x20B } else { 0x10B });
    put_u32(&mut data, optional + 0x10, 0x1000);
    if plus {
        put_u64(&mut data, optional + 0x18, 0x1_4000_0000);
        put_u32(&mut data, optional + 0x6C, 16);
    } else {
        put_u32(&mut data, optional + 0x1C, 0x0040_0000);
        put_u32(&mut data, optional + 0x5C, 16);
    }
    put_u32(&mut data, optional + 0x20, 0x1000);
    put_u32(&mut data, optional + 0x24, 0x200);
    put_u32(&mut data, optional + 0x3C, size_of_headers);

    for (index, &(name, virtual_address, virtual_size, raw, size)) in sections.iter().enumerate() {
        let entry = table + index * 0x28;
        data[entry..entry + name.len()].copy_from_slice(name.as_bytes());
        put_u32(&mut data, entry + 0x08, virtual_size);
        put_u32(&mut data, entry + 0x0C, virtual_address);
        put_u32(&mut data, entry + 0x10, size);
        put_u32(&mut data, entry + 0x14, raw);
    }

    data
}

/// Overwrites the optional header magic of an image assembled by [`image`].
pub fn set_magic(data: &mut [u8], magic: u16) {
    put_u16(data, E_LFANEW + 0x18, magic);
}

/// Overwrites the PE signature of an image assembled by [`image`].
pub fn set_pe_signature(data: &mut [u8], signature: u32) {
    put_u32(data, E_LFANEW, signature);
}
