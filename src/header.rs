//! Boot header synthesis for application images.
//!
//! The ROM only boots from RAM through a header describing the image entry.
//! Its layout depends on the chip family; the header is sent together with
//! the first bytes of the image as one fixed length ROM transfer.

use scroll::{LE, Pwrite};
use serde::{Deserialize, Serialize};

use crate::constants::IVT_BARKER;
use crate::error::{Error, Result};
use crate::image::{FirmwareComponent, ImageParameter};

/// Selects the boot header layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipFamily {
    /// i.MX508 style, Image Vector Table placed right before the code
    Mx508,
    /// Flash header placed right before the image
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootHeader {
    Ivt {
        barker: u32,
        image_start_addr: u32,
        dcd_addr: u32,
        boot_data: u32,
        self_addr: u32,
    },
    Flash {
        image_start_addr: u32,
    },
}

impl BootHeader {
    pub const IVT_SIZE: usize = 32;
    pub const FLASH_SIZE: usize = 20;

    pub fn size(&self) -> usize {
        match self {
            BootHeader::Ivt { .. } => Self::IVT_SIZE,
            BootHeader::Flash { .. } => Self::FLASH_SIZE,
        }
    }

    pub fn image_start_addr(&self) -> u32 {
        match *self {
            BootHeader::Ivt {
                image_start_addr, ..
            }
            | BootHeader::Flash { image_start_addr } => image_start_addr,
        }
    }

    /// Serialize into `buf`, little endian, reserved words zeroed.
    pub fn write_into(&self, buf: &mut [u8]) -> Result<()> {
        buf[..self.size()].fill(0);
        match *self {
            BootHeader::Ivt {
                barker,
                image_start_addr,
                dcd_addr,
                boot_data,
                self_addr,
            } => {
                buf.pwrite_with(barker, 0, LE)?;
                buf.pwrite_with(image_start_addr, 4, LE)?;
                // 8: reserved
                buf.pwrite_with(dcd_addr, 12, LE)?;
                buf.pwrite_with(boot_data, 16, LE)?;
                buf.pwrite_with(self_addr, 20, LE)?;
            }
            BootHeader::Flash { image_start_addr } => {
                buf.pwrite_with(image_start_addr, 0, LE)?;
            }
        }
        Ok(())
    }
}

/// A boot header plus image slice, ready to be written at `address`.
#[derive(Debug, Clone)]
pub struct HeaderTransfer {
    pub address: u32,
    pub header: BootHeader,
    pub buffer: Vec<u8>,
}

impl ChipFamily {
    /// Build the header transfer of `rom_transfer_size` bytes for an image
    /// already loaded at `param.target_ram_address`.
    pub fn header_transfer(
        self,
        param: &ImageParameter,
        image: &FirmwareComponent<'_>,
        rom_transfer_size: u32,
    ) -> Result<HeaderTransfer> {
        let (address, header, slice_start) = match self {
            ChipFamily::Mx508 => {
                let code_addr = param
                    .target_ram_address
                    .checked_add(param.code_offset)
                    .ok_or_else(|| Error::InvalidImage("code offset overflows RAM".into()))?;
                let address = code_addr
                    .checked_sub(BootHeader::IVT_SIZE as u32)
                    .ok_or_else(|| Error::InvalidImage("no room for IVT below code".into()))?;
                let header = BootHeader::Ivt {
                    barker: IVT_BARKER,
                    image_start_addr: code_addr,
                    dcd_addr: 0,
                    boot_data: 0,
                    self_addr: address,
                };
                (address, header, param.code_offset as usize)
            }
            ChipFamily::Other => {
                let address = param
                    .target_ram_address
                    .checked_sub(BootHeader::FLASH_SIZE as u32)
                    .ok_or_else(|| {
                        Error::InvalidImage("no room for flash header below image".into())
                    })?;
                let header = BootHeader::Flash {
                    image_start_addr: param.target_ram_address,
                };
                (address, header, 0)
            }
        };

        let total = rom_transfer_size as usize;
        if total < header.size() {
            return Err(Error::InvalidImage(format!(
                "ROM transfer size {:#x} smaller than {:?} header",
                total, self
            )));
        }
        let mut buffer = vec![0u8; total];
        header.write_into(&mut buffer)?;

        let want = total - header.size();
        let source = image.data().get(slice_start..).unwrap_or(&[]);
        let n = want.min(source.len());
        if n < want {
            log::warn!(
                "Image provides {} of {} header slice bytes after offset {:#x}, zero filled",
                n,
                want,
                slice_start
            );
        }
        buffer[header.size()..header.size() + n].copy_from_slice(&source[..n]);

        log::debug!(
            "{:?} header at {:#010x}, image start {:#010x}",
            self,
            address,
            header.image_start_addr()
        );
        Ok(HeaderTransfer {
            address,
            header,
            buffer,
        })
    }
}
