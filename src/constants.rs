/// Report id of an outbound report carrying a 16-byte SDP command frame.
pub const REPORT_ID_SDP_CMD: u8 = 0x01;
/// Report id of an outbound report carrying raw payload bytes.
pub const REPORT_ID_DATA: u8 = 0x02;
/// Report id the ROM uses for the HAB mode report.
pub const REPORT_ID_HAB_MODE: u8 = 0x03;
/// Report id the ROM uses for status and data replies.
pub const REPORT_ID_STATUS: u8 = 0x04;

/// Size of an encoded SDP command frame.
pub const COMMAND_FRAME_SIZE: usize = 16;

pub mod commands {
    pub const READ_MEMORY: u16 = 0x0101;
    pub const WRITE_MEMORY: u16 = 0x0202;
    pub const WRITE_FILE: u16 = 0x0404;
    pub const ERROR_STATUS: u16 = 0x0505;
    pub const JUMP_ADDRESS: u16 = 0x0b0b;
}

pub mod hab {
    /// Production part, secure boot enforced.
    pub const ENABLED: u32 = 0x1234_3412;
    /// Development part.
    pub const DISABLED: u32 = 0x5678_7856;
}

pub mod ack {
    /// Register write completed.
    pub const WRITE: u32 = 0x128a_8a12;
    /// File data received.
    pub const STATUS: u32 = 0x8888_8888;
}

/// Image bytes requested per WRITE_FILE command.
pub const MAX_SIZE_PER_DOWNLOAD_COMMAND: u32 = 0x20_0000;
/// Length of the header + image slice the ROM expects in one piece.
pub const ROM_TRANSFER_SIZE: u32 = 0x400;

pub const IVT_BARKER: u32 = 0x4020_00d1;
