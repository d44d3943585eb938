//! Boot ROM chip definitions, with chip-family-specific flags
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::parse_u32;
use crate::header::ChipFamily;
use crate::transport::DeviceCapabilities;

/// Represents an SoC whose boot ROM speaks SDP over USB HID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chip {
    pub name: String,
    #[serde(default)]
    pub description: String,

    #[serde(deserialize_with = "parse_usb_id")]
    pub vendor_id: u16,
    #[serde(deserialize_with = "parse_usb_id")]
    pub product_id: u16,

    pub family: ChipFamily,

    /// Report lengths including the report id byte
    pub input_report_length: u32,
    pub output_report_length: u32,

    /// Whether WRITE_FILE is answered with a HAB + status report pair
    #[serde(default = "default_status_ack")]
    pub status_ack: bool,
}

fn default_status_ack() -> bool {
    true
}

impl ::std::fmt::Display for Chip {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        write!(
            f,
            "{}({:04x}:{:04x})",
            self.name, self.vendor_id, self.product_id,
        )
    }
}

impl Chip {
    pub fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities {
            input_report_length: self.input_report_length,
            output_report_length: self.output_report_length,
        }
    }
}

pub struct ChipDB {
    chips: Vec<Chip>,
}

impl ChipDB {
    pub fn load() -> Result<Self> {
        Ok(ChipDB {
            chips: vec![
                serde_yaml::from_str(include_str!("../devices/imx50.yaml"))?,
                serde_yaml::from_str(include_str!("../devices/imx51.yaml"))?,
                serde_yaml::from_str(include_str!("../devices/imx53.yaml"))?,
            ],
        })
    }

    pub fn chips(&self) -> &[Chip] {
        &self.chips
    }

    pub fn find_chip(&self, name: &str) -> Result<Chip> {
        self.chips
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| {
                let known: Vec<_> = self.chips.iter().map(|c| c.name.as_str()).collect();
                anyhow::format_err!("Unknown chip {:?}, known chips: {}", name, known.join(", "))
            })
    }

    pub fn find_by_usb_id(&self, vendor_id: u16, product_id: u16) -> Option<&Chip> {
        self.chips
            .iter()
            .find(|c| c.vendor_id == vendor_id && c.product_id == product_id)
    }
}

fn parse_usb_id<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    let id = parse_u32(&s).map_err(serde::de::Error::custom)?;
    u16::try_from(id).map_err(|_| serde::de::Error::custom(format!("USB id {} out of range", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_chip_db() {
        let db = ChipDB::load().unwrap();
        assert_eq!(db.chips().len(), 3);

        let mx50 = db.find_chip("imx50").unwrap();
        assert_eq!(mx50.family, ChipFamily::Mx508);
        assert_eq!(mx50.vendor_id, 0x15a2);
        assert_eq!(mx50.product_id, 0x0052);
        assert!(mx50.status_ack);

        let mx53 = db.find_chip("IMX53").unwrap();
        assert_eq!(mx53.family, ChipFamily::Other);
        assert_eq!(mx53.capabilities().output_payload(), 1024);
        assert_eq!(mx53.capabilities().input_payload(), 64);
    }

    #[test]
    fn test_find_by_usb_id() {
        let db = ChipDB::load().unwrap();
        assert_eq!(db.find_by_usb_id(0x15a2, 0x0041).unwrap().name, "imx51");
        assert!(db.find_by_usb_id(0x1234, 0x5678).is_none());
        assert!(db.find_chip("imx6q").is_err());
    }

    #[test]
    fn test_status_ack_default() {
        let chip: Chip = serde_yaml::from_str(
            "name: test\nvendor_id: \"0x15a2\"\nproduct_id: \"0x0001\"\nfamily: other\n\
             input_report_length: 65\noutput_report_length: 1025\n",
        )
        .unwrap();
        assert!(chip.status_ack);
        assert!(chip.description.is_empty());
    }
}
