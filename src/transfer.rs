//! SDP operations on an open session: register writes, chunked file
//! transfers, memory reads and jumps.

use crate::ack::AckCode;
use crate::error::{Error, Result};
use crate::protocol::{Command, HabMode};
use crate::session::Session;
use crate::transport::Transport;

impl<T: Transport> Session<T> {
    pub fn write_register(&mut self, format: u8, address: u32, data: u32) -> Result<()> {
        self.send_command(Command::write_register(format, address, data))?;
        self.command_ack(AckCode::Write)?;
        Ok(())
    }

    /// Write `data` to RAM at `address` with a single WRITE_FILE command.
    ///
    /// The payload is split in data reports of at most one report payload.
    pub fn write_bulk(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let count = u32::try_from(data.len()).map_err(|_| {
            Error::InvalidImage(format!("{:#x} bytes exceed one transfer", data.len()))
        })?;
        self.send_command(Command::write_file(address, count))?;

        let chunk_size = self.capabilities().output_payload();
        for chunk in data.chunks(chunk_size) {
            self.send_data(chunk)?;
        }

        if self.status_ack() {
            self.command_ack(AckCode::Status)?;
        }
        Ok(())
    }

    /// Fill `buf` from device memory at `address`.
    pub fn read_bulk(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        let count = u32::try_from(buf.len())
            .map_err(|_| Error::InvalidImage(format!("{:#x} bytes exceed one read", buf.len())))?;
        self.send_command(Command::read_memory(address, count))?;
        self.check_hab_mode()?;

        let chunk_size = self.capabilities().input_payload();
        for chunk in buf.chunks_mut(chunk_size) {
            let n = chunk.len();
            self.recv_report(n)?;
            chunk.copy_from_slice(&self.reply_payload()[..n]);
        }
        Ok(())
    }

    /// Hand over execution. Only the HAB report comes back.
    pub fn jump(&mut self, address: u32) -> Result<HabMode> {
        self.send_command(Command::jump(address))?;
        let mode = self.check_hab_mode()?;
        log::info!("Jumped to {:#010x}", address);
        Ok(mode)
    }

    /// Query the ROM status word of the last failed operation.
    pub fn error_status(&mut self) -> Result<u32> {
        self.send_command(Command::error_status())?;
        self.check_hab_mode()?;
        self.recv_word()
    }
}
