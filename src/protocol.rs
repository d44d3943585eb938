//! The underlying binary protocol of the i.MX Serial Download Protocol

use std::fmt;

use scroll::{LE, Pread};

use crate::constants::{COMMAND_FRAME_SIZE, commands, hab};
use crate::error::{Error, Result};

/// SDP Command, host to device only.
///
/// Every command is sent as a fixed 16 byte frame, whether or not all fields
/// are meaningful for the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    pub opcode: u16,
    pub address: u32,
    /// Access width in bits for register commands.
    pub format: u8,
    pub count: u32,
    pub data: u32,
}

impl Command {
    pub fn read_memory(address: u32, count: u32) -> Self {
        Command {
            opcode: commands::READ_MEMORY,
            address,
            format: 32,
            count,
            data: 0,
        }
    }

    pub fn write_register(format: u8, address: u32, data: u32) -> Self {
        Command {
            opcode: commands::WRITE_MEMORY,
            address,
            format,
            count: 4,
            data,
        }
    }

    pub fn write_file(address: u32, count: u32) -> Self {
        Command {
            opcode: commands::WRITE_FILE,
            address,
            format: 0,
            count,
            data: 0,
        }
    }

    pub fn error_status() -> Self {
        Command {
            opcode: commands::ERROR_STATUS,
            address: 0,
            format: 0,
            count: 0,
            data: 0,
        }
    }

    pub fn jump(address: u32) -> Self {
        Command {
            opcode: commands::JUMP_ADDRESS,
            address,
            format: 0,
            count: 0,
            data: 0,
        }
    }

    /// Encode into the wire frame.
    ///
    /// The opcode is little endian, every 32-bit field is big endian, the last
    /// byte is reserved.
    pub fn into_raw(self) -> [u8; COMMAND_FRAME_SIZE] {
        let mut buf = [0u8; COMMAND_FRAME_SIZE];
        buf[0..2].copy_from_slice(&self.opcode.to_le_bytes());
        buf[2..6].copy_from_slice(&self.address.to_be_bytes());
        buf[6] = self.format;
        buf[7..11].copy_from_slice(&self.count.to_be_bytes());
        buf[11..15].copy_from_slice(&self.data.to_be_bytes());
        buf
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.opcode {
            commands::READ_MEMORY => "READ_MEMORY",
            commands::WRITE_MEMORY => "WRITE_MEMORY",
            commands::WRITE_FILE => "WRITE_FILE",
            commands::ERROR_STATUS => "ERROR_STATUS",
            commands::JUMP_ADDRESS => "JUMP_ADDRESS",
            _ => "UNKNOWN",
        };
        write!(
            f,
            "{}(addr={:#010x}, fmt={}, count={:#x}, data={:#010x})",
            name, self.address, self.format, self.count, self.data
        )
    }
}

/// Security state reported as the first reply to every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HabMode {
    /// Production part
    Enabled,
    /// Development part
    Disabled,
}

impl HabMode {
    pub fn from_word(word: u32) -> Result<Self> {
        match word {
            hab::ENABLED => Ok(HabMode::Enabled),
            hab::DISABLED => Ok(HabMode::Disabled),
            other => Err(Error::UnexpectedHabValue(other)),
        }
    }
}

impl fmt::Display for HabMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HabMode::Enabled => write!(f, "HAB enabled (production)"),
            HabMode::Disabled => write!(f, "HAB disabled (development)"),
        }
    }
}

/// Extract the 4-byte reply word following the report id.
pub fn ack_word(report: &[u8]) -> Result<u32> {
    Ok(report.pread_with::<u32>(1, LE)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::decode_frame;

    #[test]
    fn test_frame_layout() {
        let cmd = Command {
            opcode: 0x0a0b,
            address: 0x1122_3344,
            format: 0x20,
            count: 0x5566_7788,
            data: 0x99aa_bbcc,
        };
        let raw = cmd.into_raw();
        assert_eq!(
            raw,
            [
                0x0b, 0x0a, 0x11, 0x22, 0x33, 0x44, 0x20, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa,
                0xbb, 0xcc, 0x00
            ]
        );
    }

    #[test]
    fn test_fields_recoverable_from_frame() {
        let values = [0u32, 1, 0xff, 0x100, 0x8000_0000, 0xdead_beef, u32::MAX];
        for &address in &values {
            for &count in &values {
                let cmd = Command {
                    opcode: commands::WRITE_FILE,
                    address,
                    format: 0,
                    count,
                    data: address ^ count,
                };
                let raw = cmd.into_raw();
                assert_eq!(raw.len(), 16);
                assert_eq!(raw[15], 0);
                assert_eq!(decode_frame(&raw), cmd);
            }
        }
    }

    #[test]
    fn test_constructors() {
        let cmd = Command::write_register(32, 0x53fd_4068, 0xffff_ffff);
        assert_eq!(cmd.opcode, commands::WRITE_MEMORY);
        assert_eq!(cmd.count, 4);

        let raw = Command::jump(0x1000_03e0).into_raw();
        assert_eq!(&raw[0..2], &[0x0b, 0x0b]);
        assert_eq!(&raw[2..6], &[0x10, 0x00, 0x03, 0xe0]);
        assert!(raw[6..].iter().all(|&b| b == 0));

        let raw = Command::read_memory(0x20, 0x400).into_raw();
        assert_eq!(raw[6], 32);
        assert_eq!(&raw[7..11], &[0x00, 0x00, 0x04, 0x00]);
    }

    #[test]
    fn test_hab_mode() {
        assert_eq!(HabMode::from_word(hab::ENABLED).unwrap(), HabMode::Enabled);
        assert_eq!(HabMode::from_word(hab::DISABLED).unwrap(), HabMode::Disabled);
        assert!(matches!(
            HabMode::from_word(0xdead_beef),
            Err(Error::UnexpectedHabValue(0xdead_beef))
        ));
    }

    #[test]
    fn test_ack_word() {
        let report = [0x04, 0x12, 0x8a, 0x8a, 0x12, 0x00];
        assert_eq!(ack_word(&report).unwrap(), 0x128a_8a12);
        assert!(ack_word(&[0x04, 0x00]).is_err());
    }
}
