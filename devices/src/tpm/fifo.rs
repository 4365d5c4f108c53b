//! FIFO transport (spec.md §4.4): the shared command/response buffer and
//! its `rw_offset` cursor, grounded on `tpm_tis_data_read` and the
//! `TPM_TIS_REG_DATA_FIFO`/`TPM_TIS_REG_DATA_XFIFO` arms of `handle_write`
//! and `read` in the teacher crate.

use std::convert::TryInto;

use super::locality::{CommandState, Sts};
use super::TpmTis;

const CMD_SIZE_OFFSET: usize = 2;

impl TpmTis {
    /// Big-endian 16-bit command size embedded at buffer bytes 2..4.
    pub(super) fn cmd_size(&self) -> usize {
        u16::from_be_bytes(
            self.buffer[CMD_SIZE_OFFSET..CMD_SIZE_OFFSET + 2]
                .try_into()
                .expect("buffer is at least BUFFER_MAX bytes"),
        ) as usize
    }

    /// `tpm_tis_data_read`: pull one byte of response data out of the
    /// buffer, raising STS_VALID once the last byte has been consumed.
    fn data_read(&mut self, locty: u8) -> u8 {
        if !self.locs[locty as usize].sts.contains(Sts::DATA_AVAILABLE) {
            return super::constants::NO_DATA_BYTE;
        }
        let len = self.cmd_size().min(self.be_buffer_size);
        let byte = self.buffer[self.rw_offset];
        self.rw_offset += 1;
        if self.rw_offset >= len {
            self.locs[locty as usize].sts_set(Sts::VALID);
            self.raise_irq(locty, super::locality::IntFlags::STS_VALID);
        }
        byte
    }

    /// Word-aligned read entry point used by the MMIO read path; only
    /// `Completion` state has response bytes to give back.
    pub(super) fn read_data_fifo_word(&mut self, locty: u8, addr: u64, width: usize) -> u32 {
        if self.active_locty != Some(locty) {
            return 0;
        }
        let width = super::decoder::fifo_width(addr, width);
        let mut val: u32 = 0;
        let mut shift = 0u32;
        for _ in 0..width {
            let byte = if self.locs[locty as usize].state == CommandState::Completion {
                self.data_read(locty)
            } else {
                super::constants::NO_DATA_BYTE
            };
            val |= (byte as u32) << shift;
            shift += 8;
        }
        val
    }

    /// `TPM_TIS_REG_DATA_XFIFO` arm of `handle_write`: append up to
    /// `width` bytes of `val` (already positioned at `shift`) to the
    /// in-flight command while in `Ready`/`Reception`, then check whether
    /// the command header announces a now-complete packet.
    pub(super) fn write_data_fifo(&mut self, locty: u8, shift: u32, width: usize, val: u32) {
        if self.active_locty != Some(locty) {
            return;
        }
        let state = self.locs[locty as usize].state;
        if matches!(state, CommandState::Idle | CommandState::Execution | CommandState::Completion) {
            return;
        }
        if state == CommandState::Ready {
            self.locs[locty as usize].state = CommandState::Reception;
            self.locs[locty as usize].sts_set(Sts::EXPECT | Sts::VALID);
        }

        let mut val = val >> shift;
        let mut remaining = width.min(4 - (shift as usize / 8));
        while self.locs[locty as usize].sts.contains(Sts::EXPECT) && remaining > 0 {
            if self.rw_offset < self.be_buffer_size {
                self.buffer[self.rw_offset] = val as u8;
                self.rw_offset += 1;
                val >>= 8;
                remaining -= 1;
            } else {
                self.locs[locty as usize].sts_set(Sts::VALID);
                break;
            }
        }

        if self.rw_offset > 5 && self.locs[locty as usize].sts.contains(Sts::EXPECT) {
            let need_irq = !self.locs[locty as usize].sts.contains(Sts::VALID);
            let len = self.cmd_size();
            if len > self.rw_offset {
                self.locs[locty as usize].sts_set(Sts::EXPECT | Sts::VALID);
            } else {
                self.locs[locty as usize].sts_set(Sts::VALID);
            }
            if need_irq {
                self.raise_irq(locty, super::locality::IntFlags::STS_VALID);
            }
        }
    }
}
