//! i.MX Serial Download Protocol implementation.

pub mod ack;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod flashing;
pub mod format;
pub mod header;
pub mod image;
pub mod protocol;
pub mod script;
pub mod session;
pub mod transfer;
pub mod transport;

pub use self::config::Config;
pub use self::device::{Chip, ChipDB};
pub use self::error::{Error, Result};
pub use self::flashing::{DownloadOutcome, Flashing, Progress};
pub use self::header::ChipFamily;
pub use self::image::{FirmwareComponent, ImageParameter, MemSection};
pub use self::protocol::Command;
pub use self::session::Session;
pub use self::transport::{Device, DeviceCapabilities, Transport};
