//! Two report handshake answering every SDP command.
//!
//! The ROM first reports its HAB mode, then a command specific ack word.
//! Any deviation fails the command, nothing is retried.

use crate::error::{Error, Result};
use crate::protocol::HabMode;
use crate::session::Session;
use crate::transport::Transport;

/// Ack word the second report must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckCode {
    /// WRITE_MEMORY completed
    Write,
    /// WRITE_FILE data received
    Status,
}

impl AckCode {
    pub fn word(self) -> u32 {
        match self {
            AckCode::Write => crate::constants::ack::WRITE,
            AckCode::Status => crate::constants::ack::STATUS,
        }
    }
}

impl<T: Transport> Session<T> {
    /// Read the HAB mode report.
    pub fn check_hab_mode(&mut self) -> Result<HabMode> {
        let mode = HabMode::from_word(self.recv_word()?)?;
        log::trace!("{}", mode);
        Ok(mode)
    }

    /// Read the second report and compare it against `expected`.
    pub fn expect_ack(&mut self, expected: AckCode) -> Result<()> {
        let actual = self.recv_word()?;
        if actual != expected.word() {
            log::debug!("invalid {:?} ack: {:#010x}", expected, actual);
            return Err(Error::AckMismatch {
                expected: expected.word(),
                actual,
            });
        }
        Ok(())
    }

    /// Full handshake: HAB mode then `expected` ack.
    pub fn command_ack(&mut self, expected: AckCode) -> Result<HabMode> {
        let mode = self.check_hab_mode()?;
        self.expect_ack(expected)?;
        Ok(mode)
    }
}
