//! Error types of the SDP protocol engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Opening the device or querying its capabilities failed.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("report lengths (in {input}, out {output}) are too small for SDP")]
    InvalidCapabilities { input: u32, output: u32 },

    #[error("USB I/O error: {0}")]
    Usb(rusb::Error),

    #[error("timed out waiting for the device")]
    Timeout,

    /// An inbound report ended before the bytes the reply needs.
    #[error("short report: expected {expected} bytes, got {actual}")]
    ShortReport { expected: usize, actual: usize },

    /// The first reply of a command was not one of the two HAB sentinels.
    #[error("unexpected HAB mode value: {0:#010x}")]
    UnexpectedHabValue(u32),

    #[error("ack mismatch: expected {expected:#010x}, got {actual:#010x}")]
    AckMismatch { expected: u32, actual: u32 },

    #[error("boot header verification failed at {address:#010x} (first difference at offset {offset:#x})")]
    HeaderVerificationFailed { address: u32, offset: usize },

    /// Memory initialization stopped at `index`, all writes before it were acknowledged.
    #[error("register write #{index} failed: {source}")]
    RegisterWrite {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("no jump address recorded, download an application image first")]
    NoJumpAddress,

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("malformed report: {0}")]
    Report(#[from] scroll::Error),
}

impl From<rusb::Error> for Error {
    fn from(e: rusb::Error) -> Self {
        match e {
            rusb::Error::Timeout => Error::Timeout,
            e => Error::Usb(e),
        }
    }
}
