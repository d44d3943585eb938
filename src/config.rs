//! Tunables of a flashing session, optionally loaded from a YAML file.
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_SIZE_PER_DOWNLOAD_COMMAND, ROM_TRANSFER_SIZE};

/// Device timing workarounds.
///
/// Reads time out much sooner than writes. Nothing documents why the ROM
/// needs this, both values are kept adjustable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Sleep before every inbound report.
    pub read_delay_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            read_delay_ms: 35,
            read_timeout_ms: 1000,
            write_timeout_ms: 5000,
        }
    }
}

impl Timing {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Upper bound of image bytes carried by a single WRITE_FILE command.
    #[serde(deserialize_with = "parse_number")]
    pub max_size_per_command: u32,
    /// Length of the boot header plus image slice sent to the ROM.
    #[serde(deserialize_with = "parse_number")]
    pub rom_transfer_size: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        DownloadConfig {
            max_size_per_command: MAX_SIZE_PER_DOWNLOAD_COMMAND,
            rom_transfer_size: ROM_TRANSFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing: Timing,
    pub download: DownloadConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let raw = std::fs::read_to_string(p)?;
        let config = Self::parse(&raw)?;
        log::debug!("Loaded config from {}: {:?}", p.display(), config);
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(raw)?;
        anyhow::ensure!(
            config.download.max_size_per_command > 0,
            "max_size_per_command must not be zero"
        );
        // libusb waits forever on a zero timeout
        anyhow::ensure!(
            config.timing.read_timeout_ms > 0 && config.timing.write_timeout_ms > 0,
            "read_timeout_ms and write_timeout_ms must not be zero"
        );
        Ok(config)
    }
}

/// Parse `0x` prefixed hex or plain decimal.
pub fn parse_u32(s: &str) -> Result<u32> {
    let s = s.trim().replace('_', "");
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16)?,
        None => s.parse()?,
    };
    Ok(value)
}

/// Accept both YAML integers and hex strings.
pub(crate) fn parse_number<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(u32),
        Str(String),
    }

    match Number::deserialize(deserializer)? {
        Number::Int(v) => Ok(v),
        Number::Str(s) => parse_u32(&s).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timing.read_delay_ms, 35);
        assert!(config.timing.read_timeout() < config.timing.write_timeout());
        assert_eq!(config.download.max_size_per_command, 0x20_0000);
        assert_eq!(config.download.rom_transfer_size, 0x400);
    }

    #[test]
    fn test_parse_partial() {
        let config = Config::parse(
            "timing:\n  read_timeout_ms: 10\ndownload:\n  max_size_per_command: \"0x1000\"\n",
        )
        .unwrap();
        assert_eq!(config.timing.read_timeout_ms, 10);
        assert_eq!(config.timing.read_delay_ms, 35);
        assert_eq!(config.timing.write_timeout_ms, 5000);
        assert_eq!(config.download.max_size_per_command, 0x1000);
        assert_eq!(config.download.rom_transfer_size, 0x400);
    }

    #[test]
    fn test_parse_rejects_zero_command_size() {
        assert!(Config::parse("download:\n  max_size_per_command: 0\n").is_err());
    }

    #[test]
    fn test_parse_rejects_zero_timeouts() {
        assert!(Config::parse("timing:\n  read_timeout_ms: 0\n").is_err());
        assert!(Config::parse("timing:\n  write_timeout_ms: 0\n").is_err());
        // no delay before reads is fine
        let config = Config::parse("timing:\n  read_delay_ms: 0\n").unwrap();
        assert_eq!(config.timing.read_delay_ms, 0);
    }

    #[test]
    fn test_parse_u32() {
        assert_eq!(parse_u32("0x10000000").unwrap(), 0x1000_0000);
        assert_eq!(parse_u32("0XFF").unwrap(), 0xff);
        assert_eq!(parse_u32("1024").unwrap(), 1024);
        assert_eq!(parse_u32("0x1000_0400").unwrap(), 0x1000_0400);
        assert!(parse_u32("0xzz").is_err());
        assert!(parse_u32("0x100000000").is_err());
    }
}
