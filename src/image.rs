//! Firmware images and where they go.

/// Memory section an image is loaded into or marked as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum MemSection {
    /// Application, a boot header is synthesized for it
    App,
    /// Device configuration data
    Dcd,
    /// Command sequence file, moved as opaque bytes
    Csf,
    Other,
}

/// Placement of a firmware blob in device RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageParameter {
    pub target_ram_address: u32,
    /// Offset of the executable code inside the image
    pub code_offset: u32,
    pub load_section: MemSection,
    pub set_section: MemSection,
}

impl ImageParameter {
    pub fn app(target_ram_address: u32, code_offset: u32) -> Self {
        ImageParameter {
            target_ram_address,
            code_offset,
            load_section: MemSection::App,
            set_section: MemSection::App,
        }
    }

    /// DCD and CSF payloads are only placed, never booted.
    pub fn is_payload_only(&self) -> bool {
        matches!(self.load_section, MemSection::Dcd | MemSection::Csf)
    }
}

/// Borrowed view of caller-owned image bytes.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareComponent<'a> {
    data: &'a [u8],
}

impl<'a> FirmwareComponent<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        FirmwareComponent { data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate `(offset, slice)` pieces of at most `max` bytes.
    pub fn slices(&self, max: usize) -> impl Iterator<Item = (usize, &'a [u8])> {
        let max = max.max(1);
        self.data
            .chunks(max)
            .enumerate()
            .map(move |(i, chunk)| (i * max, chunk))
    }
}
