//! One open channel to the boot ROM, with its report scratch buffers.
//!
//! Buffers are sized from the device capabilities when the session opens and
//! never resized. Dropping the session closes the channel.

use crate::config::Timing;
use crate::constants::{COMMAND_FRAME_SIZE, REPORT_ID_DATA, REPORT_ID_SDP_CMD};
use crate::error::{Error, Result};
use crate::protocol::{self, Command};
use crate::transport::{Device, DeviceCapabilities, Transport};

pub struct Session<T: Transport> {
    channel: T,
    capabilities: DeviceCapabilities,
    timing: Timing,
    /// Whether WRITE_FILE is completed by a HAB + status handshake
    status_ack: bool,
    read_report: Vec<u8>,
    write_report: Vec<u8>,
}

impl<T: Transport> Session<T> {
    pub fn open<D>(device: &D, timing: &Timing, status_ack: bool) -> Result<Self>
    where
        D: Device<Channel = T>,
    {
        let capabilities = device.capabilities()?;
        // an inbound report must hold a reply word, an outbound one a command frame
        if capabilities.input_report_length < 5
            || (capabilities.output_report_length as usize) < COMMAND_FRAME_SIZE + 1
        {
            return Err(Error::InvalidCapabilities {
                input: capabilities.input_report_length,
                output: capabilities.output_report_length,
            });
        }
        let channel = device.open()?;
        log::debug!(
            "Session opened, report lengths in={} out={}",
            capabilities.input_report_length,
            capabilities.output_report_length
        );

        Ok(Session {
            channel,
            capabilities,
            timing: timing.clone(),
            status_ack,
            read_report: vec![0; capabilities.input_report_length as usize],
            write_report: vec![0; capabilities.output_report_length as usize],
        })
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    pub(crate) fn status_ack(&self) -> bool {
        self.status_ack
    }

    /// Send `cmd` as a zero padded command report.
    pub(crate) fn send_command(&mut self, cmd: Command) -> Result<()> {
        log::debug!("=> {}", cmd);
        self.write_report.fill(0);
        self.write_report[0] = REPORT_ID_SDP_CMD;
        self.write_report[1..=COMMAND_FRAME_SIZE].copy_from_slice(&cmd.into_raw());
        self.flush_report()
    }

    /// Send one data report, `chunk` must fit in the report payload.
    pub(crate) fn send_data(&mut self, chunk: &[u8]) -> Result<()> {
        debug_assert!(chunk.len() <= self.capabilities.output_payload());
        self.write_report.fill(0);
        self.write_report[0] = REPORT_ID_DATA;
        self.write_report[1..=chunk.len()].copy_from_slice(chunk);
        self.flush_report()
    }

    fn flush_report(&mut self) -> Result<()> {
        log::trace!("=> {}", hex::encode(&self.write_report));
        self.channel
            .send_report(&self.write_report, self.timing.write_timeout())
    }

    /// Receive one inbound report into the cleared read buffer.
    ///
    /// The report must carry at least `payload` bytes after the report id.
    pub(crate) fn recv_report(&mut self, payload: usize) -> Result<()> {
        self.read_report.fill(0);
        let n = self
            .channel
            .recv_report(&mut self.read_report, self.timing.read_timeout())?;
        log::trace!("<= {}", hex::encode(&self.read_report[..n]));
        if n < 1 + payload {
            return Err(Error::ShortReport {
                expected: 1 + payload,
                actual: n,
            });
        }
        Ok(())
    }

    /// Receive a report carrying a single reply word.
    pub(crate) fn recv_word(&mut self) -> Result<u32> {
        self.recv_report(4)?;
        protocol::ack_word(&self.read_report)
    }

    /// Payload bytes of the last received report.
    pub(crate) fn reply_payload(&self) -> &[u8] {
        &self.read_report[1..]
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        log::debug!("Session closed");
    }
}
