//! Firmware download logic.

use std::fmt;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::header::{ChipFamily, HeaderTransfer};
use crate::image::{FirmwareComponent, ImageParameter, MemSection};
use crate::protocol::HabMode;
use crate::script::RegisterWrite;
use crate::session::Session;
use crate::transport::{Device, Transport};

/// Receives coarse progress of long transfers.
pub trait Progress {
    fn set_length(&mut self, _total: u64) {}
    fn advance(&mut self, _bytes: u64) {}
    fn message(&mut self, _msg: &str) {}
}

impl Progress for () {}

impl Progress for indicatif::ProgressBar {
    fn set_length(&mut self, total: u64) {
        indicatif::ProgressBar::set_length(self, total);
    }

    fn advance(&mut self, bytes: u64) {
        self.inc(bytes);
    }

    fn message(&mut self, msg: &str) {
        self.set_message(msg.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Idle,
    TransferringImage,
    BuildingHeader,
    TransferringHeader,
    VerifyingHeader,
    /// Image placed, nothing to boot
    Done,
    ReadyToJump,
    Error,
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// DCD or CSF payload placed, no jump target
    Done,
    /// Application image booted from the header at this address
    ReadyToJump(u32),
}

/// Drives a boot ROM. Every operation opens its own session and tears it
/// down on return, only the pending jump address survives between them.
pub struct Flashing<D: Device> {
    device: D,
    family: ChipFamily,
    config: Config,
    status_ack: bool,
    state: DownloadState,
    jump_address: Option<u32>,
}

impl<D: Device> Flashing<D> {
    pub fn new(device: D, family: ChipFamily, config: Config) -> Self {
        Flashing {
            device,
            family,
            config,
            status_ack: true,
            state: DownloadState::Idle,
            jump_address: None,
        }
    }

    /// Whether WRITE_FILE is followed by a status handshake on this chip.
    pub fn with_status_ack(mut self, status_ack: bool) -> Self {
        self.status_ack = status_ack;
        self
    }

    pub fn state(&self) -> DownloadState {
        self.state
    }

    pub fn jump_address(&self) -> Option<u32> {
        self.jump_address
    }

    fn open_session(&self) -> Result<Session<D::Channel>> {
        Session::open(&self.device, &self.config.timing, self.status_ack)
    }

    fn transition(&mut self, state: DownloadState) {
        log::debug!("download state: {} -> {}", self.state, state);
        self.state = state;
    }

    /// Load `image` into RAM and, for application images, place and verify
    /// the boot header that makes it bootable.
    pub fn download(
        &mut self,
        image: &FirmwareComponent<'_>,
        param: &ImageParameter,
        progress: &mut dyn Progress,
    ) -> Result<DownloadOutcome> {
        self.transition(DownloadState::Idle);
        self.jump_address = None;
        let result = self
            .open_session()
            .and_then(|mut session| self.run_download(&mut session, image, param, progress));
        if let Err(ref e) = result {
            log::debug!("download failed in state {}: {}", self.state, e);
            self.transition(DownloadState::Error);
        }
        result
    }

    fn run_download(
        &mut self,
        session: &mut Session<D::Channel>,
        image: &FirmwareComponent<'_>,
        param: &ImageParameter,
        progress: &mut dyn Progress,
    ) -> Result<DownloadOutcome> {
        self.transition(DownloadState::TransferringImage);
        log::info!(
            "Downloading {} bytes to {:#010x}",
            image.len(),
            param.target_ram_address
        );
        progress.set_length(image.len());
        progress.message("downloading image");

        let max = self.config.download.max_size_per_command as usize;
        for (offset, slice) in image.slices(max) {
            let address = u32::try_from(offset)
                .ok()
                .and_then(|offset| param.target_ram_address.checked_add(offset))
                .ok_or_else(|| Error::InvalidImage("image exceeds the address space".into()))?;
            session.write_bulk(address, slice)?;
            progress.advance(slice.len() as u64);
        }

        if param.is_payload_only() {
            log::info!("{:?} section loaded, no boot header needed", param.load_section);
            self.transition(DownloadState::Done);
            return Ok(DownloadOutcome::Done);
        }
        if param.set_section != MemSection::App {
            self.transition(DownloadState::Done);
            return Ok(DownloadOutcome::Done);
        }

        self.transition(DownloadState::BuildingHeader);
        let xfer =
            self.family
                .header_transfer(param, image, self.config.download.rom_transfer_size)?;

        self.transition(DownloadState::TransferringHeader);
        progress.message("writing boot header");
        session.write_bulk(xfer.address, &xfer.buffer)?;

        self.transition(DownloadState::VerifyingHeader);
        progress.message("verifying boot header");
        verify_header(session, &xfer)?;

        self.jump_address = Some(xfer.address);
        self.transition(DownloadState::ReadyToJump);
        log::info!("Boot header verified, jump address {:#010x}", xfer.address);
        Ok(DownloadOutcome::ReadyToJump(xfer.address))
    }

    /// Replay register writes in order, stopping at the first failure.
    ///
    /// Returns the number of writes performed. Writes already done are not
    /// undone on failure.
    pub fn init_memory(&mut self, writes: &[RegisterWrite]) -> Result<usize> {
        let mut session = self.open_session()?;
        for (index, w) in writes.iter().enumerate() {
            log::debug!(
                "init #{}: [{:#010x}] <- {:#010x} ({} bit)",
                index,
                w.address,
                w.data,
                w.format
            );
            session
                .write_register(w.format, w.address, w.data)
                .map_err(|e| Error::RegisterWrite {
                    index,
                    source: Box::new(e),
                })?;
        }
        log::info!("Memory initialized with {} register writes", writes.len());
        Ok(writes.len())
    }

    /// Jump to the address recorded by the last application download.
    pub fn jump(&mut self) -> Result<HabMode> {
        let address = self.jump_address.ok_or(Error::NoJumpAddress)?;
        self.jump_to(address)
    }

    pub fn jump_to(&mut self, address: u32) -> Result<HabMode> {
        let mut session = self.open_session()?;
        session.jump(address)
    }

    pub fn read_memory(&mut self, address: u32, len: usize) -> Result<Vec<u8>> {
        let mut session = self.open_session()?;
        let mut buf = vec![0u8; len];
        session.read_bulk(address, &mut buf)?;
        Ok(buf)
    }

    pub fn write_register(&mut self, format: u8, address: u32, data: u32) -> Result<()> {
        let mut session = self.open_session()?;
        session.write_register(format, address, data)
    }

    pub fn error_status(&mut self) -> Result<u32> {
        let mut session = self.open_session()?;
        session.error_status()
    }
}

fn verify_header<T: Transport>(
    session: &mut Session<T>,
    xfer: &HeaderTransfer,
) -> Result<()> {
    let mut readback = vec![0u8; xfer.buffer.len()];
    session.read_bulk(xfer.address, &mut readback)?;

    if let Some(offset) = xfer
        .buffer
        .iter()
        .zip(&readback)
        .position(|(sent, read)| sent != read)
    {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("sent:\n{}", hexdump(&xfer.buffer));
            log::debug!("read back:\n{}", hexdump(&readback));
        }
        return Err(Error::HeaderVerificationFailed {
            address: xfer.address,
            offset,
        });
    }
    Ok(())
}

fn hexdump(data: &[u8]) -> String {
    let mut out = Vec::new();
    match hxdmp::hexdump(data, &mut out) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => hex::encode(data),
    }
}
