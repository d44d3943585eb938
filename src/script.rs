//! Memory initialization scripts.
//!
//! A script is a YAML list of register writes replayed in order before an
//! image is downloaded, usually to bring up the DRAM controller:
//!
//! ```yaml
//! - { format: 32, address: "0x53fd4068", data: "0xffffffff" }
//! - { format: 32, address: "0x63fd9088", data: 0x32383535 }
//! ```
use std::path::Path;

use anyhow::Result;
use serde::Deserialize;

use crate::config::parse_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RegisterWrite {
    /// Access width in bits
    pub format: u8,
    #[serde(deserialize_with = "parse_number")]
    pub address: u32,
    #[serde(deserialize_with = "parse_number")]
    pub data: u32,
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<RegisterWrite>> {
    let p = path.as_ref();
    let raw = std::fs::read_to_string(p)?;
    let writes = parse(&raw)?;
    log::info!("Read {} register writes from {}", writes.len(), p.display());
    Ok(writes)
}

pub fn parse(raw: &str) -> Result<Vec<RegisterWrite>> {
    let writes: Vec<RegisterWrite> = serde_yaml::from_str(raw)?;
    for (i, w) in writes.iter().enumerate() {
        anyhow::ensure!(
            matches!(w.format, 8 | 16 | 32),
            "write #{} to {:#010x}: invalid format {}, expected 8, 16 or 32",
            i,
            w.address,
            w.format
        );
    }
    Ok(writes)
}
