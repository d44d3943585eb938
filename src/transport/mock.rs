//! In-memory boot ROM used by the unit tests.
use std::cell::{RefCell, RefMut};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use super::{Device, DeviceCapabilities, Transport};
use crate::constants::{
    COMMAND_FRAME_SIZE, REPORT_ID_DATA, REPORT_ID_HAB_MODE, REPORT_ID_SDP_CMD, REPORT_ID_STATUS,
    ack, commands, hab,
};
use crate::error::{Error, Result};
use crate::protocol::Command;

pub(crate) const ERROR_STATUS_OK: u32 = 0xf0f0_f0f0;

/// Rebuild a command from its wire frame.
pub(crate) fn decode_frame(raw: &[u8]) -> Command {
    Command {
        opcode: u16::from_le_bytes([raw[0], raw[1]]),
        address: u32::from_be_bytes([raw[2], raw[3], raw[4], raw[5]]),
        format: raw[6],
        count: u32::from_be_bytes([raw[7], raw[8], raw[9], raw[10]]),
        data: u32::from_be_bytes([raw[11], raw[12], raw[13], raw[14]]),
    }
}

pub(crate) struct Rom {
    pub caps: DeviceCapabilities,
    pub hab: u32,
    pub status_ack: bool,
    /// Nack the register write with this 0-based index
    pub fail_register_write: Option<usize>,
    /// Flip the byte at this address when it is read back
    pub corrupt_readback: Option<u32>,
    /// Cut READ_MEMORY data reports down to this many bytes
    pub truncate_readback: Option<usize>,
    /// Answer WRITE_FILE with a wrong status word
    pub bad_status_ack: bool,
    /// Never answer
    pub mute: bool,

    pub memory: BTreeMap<u32, u8>,
    pub commands: Vec<Command>,
    pub register_writes: Vec<(u8, u32, u32)>,
    pub data_chunks: Vec<usize>,
    pub opens: usize,
    pub closes: usize,

    register_attempts: usize,
    pending_file: Option<(u32, u32)>,
    replies: VecDeque<Vec<u8>>,
}

impl Rom {
    pub fn write_file_commands(&self) -> Vec<Command> {
        self.commands
            .iter()
            .filter(|c| c.opcode == commands::WRITE_FILE)
            .copied()
            .collect()
    }

    pub fn read(&self, address: u32, len: usize) -> Vec<u8> {
        (0..len as u32)
            .map(|i| {
                self.memory
                    .get(&address.wrapping_add(i))
                    .copied()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn reply(&mut self, id: u8, word: u32) {
        let mut report = vec![0u8; self.caps.input_report_length as usize];
        report[0] = id;
        report[1..5].copy_from_slice(&word.to_le_bytes());
        self.replies.push_back(report);
    }

    fn reply_hab(&mut self) {
        let word = self.hab;
        self.reply(REPORT_ID_HAB_MODE, word);
    }

    fn store(&mut self, address: u32, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.memory.insert(address.wrapping_add(i as u32), b);
        }
    }

    fn finish_file(&mut self) {
        self.pending_file = None;
        if self.status_ack {
            self.reply_hab();
            let word = if self.bad_status_ack { 0x1234_5678 } else { ack::STATUS };
            self.reply(REPORT_ID_STATUS, word);
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        self.commands.push(cmd);
        match cmd.opcode {
            commands::WRITE_MEMORY => {
                let index = self.register_attempts;
                self.register_attempts += 1;
                self.reply_hab();
                if self.fail_register_write == Some(index) {
                    self.reply(REPORT_ID_STATUS, 0xdead_beef);
                    return;
                }
                self.register_writes.push((cmd.format, cmd.address, cmd.data));
                let width = (usize::from(cmd.format) / 8).clamp(1, 4);
                self.store(cmd.address, &cmd.data.to_le_bytes()[..width]);
                self.reply(REPORT_ID_STATUS, ack::WRITE);
            }
            commands::WRITE_FILE => {
                self.pending_file = Some((cmd.address, cmd.count));
                if cmd.count == 0 {
                    self.finish_file();
                }
            }
            commands::READ_MEMORY => {
                self.reply_hab();
                let mut data = self.read(cmd.address, cmd.count as usize);
                if let Some(addr) = self.corrupt_readback {
                    let offset = addr.wrapping_sub(cmd.address) as usize;
                    if let Some(b) = data.get_mut(offset) {
                        *b ^= 0xff;
                    }
                }
                let payload = self.caps.input_payload();
                for chunk in data.chunks(payload) {
                    let mut report = vec![0u8; self.caps.input_report_length as usize];
                    report[0] = REPORT_ID_STATUS;
                    report[1..=chunk.len()].copy_from_slice(chunk);
                    if let Some(len) = self.truncate_readback {
                        report.truncate(len);
                    }
                    self.replies.push_back(report);
                }
            }
            commands::ERROR_STATUS => {
                self.reply_hab();
                self.reply(REPORT_ID_STATUS, ERROR_STATUS_OK);
            }
            commands::JUMP_ADDRESS => self.reply_hab(),
            other => panic!("unexpected opcode {:#06x}", other),
        }
    }

    fn handle_data(&mut self, payload: &[u8]) {
        let Some((address, remaining)) = self.pending_file else {
            panic!("data report without WRITE_FILE");
        };
        let n = (remaining as usize).min(payload.len());
        self.store(address, &payload[..n]);
        self.data_chunks.push(n);
        let remaining = remaining - n as u32;
        self.pending_file = Some((address + n as u32, remaining));
        if remaining == 0 {
            self.finish_file();
        }
    }
}

#[derive(Clone)]
pub(crate) struct MockDevice {
    rom: Rc<RefCell<Rom>>,
}

impl MockDevice {
    pub fn new(input_report_length: u32, output_report_length: u32) -> Self {
        MockDevice {
            rom: Rc::new(RefCell::new(Rom {
                caps: DeviceCapabilities {
                    input_report_length,
                    output_report_length,
                },
                hab: hab::DISABLED,
                status_ack: true,
                fail_register_write: None,
                corrupt_readback: None,
                truncate_readback: None,
                bad_status_ack: false,
                mute: false,
                memory: BTreeMap::new(),
                commands: Vec::new(),
                register_writes: Vec::new(),
                data_chunks: Vec::new(),
                opens: 0,
                closes: 0,
                register_attempts: 0,
                pending_file: None,
                replies: VecDeque::new(),
            })),
        }
    }

    pub fn rom(&self) -> RefMut<'_, Rom> {
        self.rom.borrow_mut()
    }
}

impl Device for MockDevice {
    type Channel = MockChannel;

    fn capabilities(&self) -> Result<DeviceCapabilities> {
        Ok(self.rom.borrow().caps)
    }

    fn open(&self) -> Result<MockChannel> {
        self.rom.borrow_mut().opens += 1;
        Ok(MockChannel {
            rom: Rc::clone(&self.rom),
        })
    }
}

pub(crate) struct MockChannel {
    rom: Rc<RefCell<Rom>>,
}

impl Transport for MockChannel {
    fn send_report(&mut self, report: &[u8], _timeout: Duration) -> Result<()> {
        let mut rom = self.rom.borrow_mut();
        assert_eq!(report.len(), rom.caps.output_report_length as usize);
        if rom.mute {
            return Ok(());
        }
        match report[0] {
            REPORT_ID_SDP_CMD => {
                let cmd = decode_frame(&report[1..=COMMAND_FRAME_SIZE]);
                assert!(report[1 + COMMAND_FRAME_SIZE..].iter().all(|&b| b == 0));
                rom.handle_command(cmd);
            }
            REPORT_ID_DATA => rom.handle_data(&report[1..]),
            other => panic!("unexpected report id {}", other),
        }
        Ok(())
    }

    fn recv_report(&mut self, report: &mut [u8], _timeout: Duration) -> Result<usize> {
        let reply = self
            .rom
            .borrow_mut()
            .replies
            .pop_front()
            .ok_or(Error::Timeout)?;
        let n = reply.len().min(report.len());
        report[..n].copy_from_slice(&reply[..n]);
        Ok(n)
    }
}

impl Drop for MockChannel {
    fn drop(&mut self) {
        self.rom.borrow_mut().closes += 1;
    }
}
