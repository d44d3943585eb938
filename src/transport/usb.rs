//! USB HID Transportation.
use std::thread::sleep;
use std::time::Duration;

use rusb::{Context, DeviceHandle, Direction, Recipient, RequestType, TransferType, UsbContext};

use super::{Device, DeviceCapabilities, Transport};
use crate::config::Timing;
use crate::device::Chip;
use crate::error::{Error, Result};

const USB_CLASS_HID: u8 = 0x03;

const HID_SET_REPORT: u8 = 0x09;
const HID_REPORT_TYPE_OUTPUT: u16 = 0x02;

/// A boot ROM in serial download mode, located but not yet opened.
pub struct UsbHidDevice {
    device: rusb::Device<Context>,
    capabilities: DeviceCapabilities,
    read_delay: Duration,
}

impl UsbHidDevice {
    fn matching(chip: &Chip) -> Result<Vec<rusb::Device<Context>>> {
        let context = Context::new()?;
        let devices = context
            .devices()?
            .iter()
            .filter(|device| {
                device
                    .device_descriptor()
                    .map(|desc| {
                        desc.vendor_id() == chip.vendor_id && desc.product_id() == chip.product_id
                    })
                    .unwrap_or(false)
            })
            .collect();
        Ok(devices)
    }

    pub fn scan_devices(chip: &Chip) -> Result<usize> {
        let devices = Self::matching(chip)?;
        for (i, device) in devices.iter().enumerate() {
            log::debug!("Found {} SDP device #{}: [{:?}]", chip.name, i, device);
        }
        Ok(devices.len())
    }

    pub fn open_nth(chip: &Chip, nth: usize, timing: &Timing) -> Result<UsbHidDevice> {
        let device = Self::matching(chip)?.into_iter().nth(nth).ok_or_else(|| {
            Error::DeviceUnavailable(format!(
                "no {} device ({:04x}:{:04x}) found at index #{}",
                chip.name, chip.vendor_id, chip.product_id, nth
            ))
        })?;
        log::debug!("Found USB Device {:?}", device);

        Ok(UsbHidDevice {
            device,
            capabilities: chip.capabilities(),
            read_delay: Duration::from_millis(timing.read_delay_ms),
        })
    }

    pub fn open_any(chip: &Chip, timing: &Timing) -> Result<UsbHidDevice> {
        Self::open_nth(chip, 0, timing)
    }

    /// Interface number and interrupt IN endpoint of the HID interface.
    fn hid_endpoint(&self) -> Result<(u8, u8)> {
        let config = self
            .device
            .active_config_descriptor()
            .or_else(|_| self.device.config_descriptor(0))?;

        for intf in config.interfaces() {
            for desc in intf.descriptors() {
                if desc.class_code() != USB_CLASS_HID {
                    continue;
                }
                for endpoint in desc.endpoint_descriptors() {
                    if endpoint.direction() == Direction::In
                        && endpoint.transfer_type() == TransferType::Interrupt
                    {
                        return Ok((desc.interface_number(), endpoint.address()));
                    }
                }
            }
        }
        Err(Error::DeviceUnavailable(
            "HID interrupt IN endpoint not found".to_string(),
        ))
    }
}

impl Device for UsbHidDevice {
    type Channel = UsbHidTransport;

    fn capabilities(&self) -> Result<DeviceCapabilities> {
        Ok(self.capabilities)
    }

    fn open(&self) -> Result<UsbHidTransport> {
        let unavailable = |e: rusb::Error| Error::DeviceUnavailable(e.to_string());

        let (interface, endpoint_in) = self.hid_endpoint()?;
        let handle = self.device.open().map_err(unavailable)?;

        let has_kernel_driver = match handle.kernel_driver_active(interface) {
            Ok(true) => {
                handle.detach_kernel_driver(interface).map_err(unavailable)?;
                true
            }
            _ => false,
        };
        handle.claim_interface(interface).map_err(unavailable)?;
        log::debug!(
            "Claimed HID interface {}, IN endpoint {:#04x}",
            interface,
            endpoint_in
        );

        Ok(UsbHidTransport {
            handle,
            interface,
            endpoint_in,
            has_kernel_driver,
            read_delay: self.read_delay,
        })
    }
}

/// An open HID channel. Output reports go through SET_REPORT on the control
/// pipe, input reports come from the interrupt IN endpoint.
pub struct UsbHidTransport {
    handle: DeviceHandle<Context>,
    interface: u8,
    endpoint_in: u8,
    has_kernel_driver: bool,
    read_delay: Duration,
}

impl Transport for UsbHidTransport {
    fn send_report(&mut self, report: &[u8], timeout: Duration) -> Result<()> {
        let request_type =
            rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface);
        let value = (HID_REPORT_TYPE_OUTPUT << 8) | u16::from(report[0]);
        let n = self.handle.write_control(
            request_type,
            HID_SET_REPORT,
            value,
            u16::from(self.interface),
            report,
            timeout,
        )?;
        if n != report.len() {
            log::debug!("short report write: {} of {} bytes", n, report.len());
            return Err(Error::Usb(rusb::Error::Io));
        }
        Ok(())
    }

    fn recv_report(&mut self, report: &mut [u8], timeout: Duration) -> Result<usize> {
        // The ROM needs some time before the reply report is available.
        sleep(self.read_delay);
        Ok(self
            .handle
            .read_interrupt(self.endpoint_in, report, timeout)?)
    }
}

impl Drop for UsbHidTransport {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(self.interface) {
            log::warn!("could not release interface {}: {}", self.interface, e);
        }
        if self.has_kernel_driver {
            if let Err(e) = self.handle.attach_kernel_driver(self.interface) {
                log::warn!("could not reattach kernel driver: {}", e);
            }
        }
    }
}
