//! Abstract Device transport interface.
use std::time::Duration;

use crate::error::Result;

pub use self::usb::{UsbHidDevice, UsbHidTransport};

#[cfg(test)]
pub(crate) mod mock;
mod usb;

/// Report lengths of the HID interface, including the leading report id byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub input_report_length: u32,
    pub output_report_length: u32,
}

impl DeviceCapabilities {
    /// Payload bytes carried by one inbound report.
    pub fn input_payload(&self) -> usize {
        self.input_report_length.saturating_sub(1) as usize
    }

    /// Payload bytes carried by one outbound report.
    pub fn output_payload(&self) -> usize {
        self.output_report_length.saturating_sub(1) as usize
    }
}

/// An open request/response channel to the device, closed on drop.
///
/// Strictly half duplex: one report in flight at a time.
pub trait Transport {
    /// Blocks until the driver accepted the whole report.
    fn send_report(&mut self, report: &[u8], timeout: Duration) -> Result<()>;
    /// Fills `report` with the next inbound report, returns the number of bytes read.
    fn recv_report(&mut self, report: &mut [u8], timeout: Duration) -> Result<usize>;
}

/// A located device: knows its report lengths and how to open a channel to it.
pub trait Device {
    type Channel: Transport;

    fn capabilities(&self) -> Result<DeviceCapabilities>;
    fn open(&self) -> Result<Self::Channel>;
}
