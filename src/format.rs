//! Firmware file formats
use std::borrow::Cow;
use std::path::Path;
use std::str;

use anyhow::Result;
use object::{
    Endianness,
    elf::{FileHeader32, PT_LOAD},
    read::elf::{FileHeader, ProgramHeader},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirmwareFormat {
    IntelHex,
    ELF,
    Binary,
}

/// Image bytes, plus the RAM address they were linked for when the format
/// carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareFile {
    pub load_address: Option<u32>,
    pub data: Vec<u8>,
}

pub fn read_firmware_from_file<P: AsRef<Path>>(path: P) -> Result<FirmwareFile> {
    let p = path.as_ref();
    let raw = std::fs::read(p)?;
    anyhow::ensure!(!raw.is_empty(), "{} is empty", p.display());

    let format = guess_format(p, &raw);
    log::info!("Read {} as {:?} format", p.display(), format);
    match format {
        FirmwareFormat::IntelHex => read_ihex(str::from_utf8(&raw)?),
        FirmwareFormat::ELF => objcopy_binary(&raw),
        FirmwareFormat::Binary => Ok(FirmwareFile {
            load_address: None,
            data: raw,
        }),
    }
}

pub fn guess_format(path: &Path, raw: &[u8]) -> FirmwareFormat {
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default()
        .to_lowercase();
    if ["ihex", "ihx", "hex"].contains(&&*ext) {
        return FirmwareFormat::IntelHex;
    }

    if raw.starts_with(&[0x7f, b'E', b'L', b'F']) {
        FirmwareFormat::ELF
    } else if raw.first() == Some(&b':')
        && raw
            .iter()
            .all(|&c| c.is_ascii_hexdigit() || c == b':' || c == b'\n' || c == b'\r')
    {
        FirmwareFormat::IntelHex
    } else {
        FirmwareFormat::Binary
    }
}

pub fn read_ihex(data: &str) -> Result<FirmwareFile> {
    use ihex::Record;

    let mut base_address = 0u32;
    let mut sections = vec![];
    for record in ihex::Reader::new(data) {
        match record? {
            Record::Data { offset, value } => {
                sections.push((base_address + u32::from(offset), Cow::Owned(value)));
            }
            Record::ExtendedSegmentAddress(segment) => base_address = u32::from(segment) * 16,
            Record::ExtendedLinearAddress(upper) => base_address = u32::from(upper) << 16,
            Record::EndOfFile
            | Record::StartSegmentAddress { .. }
            | Record::StartLinearAddress(_) => (),
        }
    }
    merge_sections(sections)
}

/// Flatten the loadable segments of an ELF32 file, like `objcopy -O binary`.
pub fn objcopy_binary(elf_data: &[u8]) -> Result<FirmwareFile> {
    match object::FileKind::parse(elf_data)? {
        object::FileKind::Elf32 => (),
        _ => anyhow::bail!("cannot read file as ELF32 format"),
    }
    let elf_header = FileHeader32::<Endianness>::parse(elf_data)?;
    let endian = elf_header.endian()?;

    let mut sections = vec![];
    for segment in elf_header.program_headers(endian, elf_data)? {
        if segment.p_type(endian) != PT_LOAD {
            continue;
        }
        let segment_data = segment
            .data(endian, elf_data)
            .map_err(|_| anyhow::format_err!("Failed to access data for an ELF segment."))?;
        if segment_data.is_empty() {
            continue;
        }
        let p_paddr = segment.p_paddr(endian);
        log::debug!(
            "Loadable segment at physical address {:#010x}, {} bytes",
            p_paddr,
            segment_data.len()
        );
        sections.push((p_paddr, Cow::Borrowed(segment_data)));
    }

    anyhow::ensure!(!sections.is_empty(), "empty ELF file");
    merge_sections(sections)
}

fn merge_sections(mut sections: Vec<(u32, Cow<[u8]>)>) -> Result<FirmwareFile> {
    sections.sort_by_key(|(addr, _)| *addr);

    let (Some(first), Some(last)) = (sections.first(), sections.last()) else {
        anyhow::bail!("no data records found");
    };
    let start_address = first.0;
    let end_address = sections
        .iter()
        .map(|(addr, data)| u64::from(*addr) + data.len() as u64)
        .max()
        .unwrap_or(u64::from(last.0));
    let total_size = usize::try_from(end_address - u64::from(start_address))?;

    let mut binary = vec![0u8; total_size];
    for (addr, sect) in &sections {
        let start = (addr - start_address) as usize;
        binary[start..start + sect.len()].copy_from_slice(sect);
    }
    log::debug!(
        "Merged {} sections, {:#010x}..{:#010x}",
        sections.len(),
        start_address,
        end_address
    );
    Ok(FirmwareFile {
        load_address: Some(start_address),
        data: binary,
    })
}
