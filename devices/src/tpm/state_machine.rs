//! Command state machine driven by STS register reads/writes
//! (spec.md §4.3), grounded on the `TPM_TIS_REG_STS` arms of `handle_write`
//! and `read` in the teacher crate.

use super::locality::{CommandState, IntFlags, Sts};
use super::TpmTis;

impl TpmTis {
    /// STS is only meaningful for the locality that currently owns the
    /// register file; everything else reads back as all-ones.
    pub(super) fn read_sts(&mut self, locty: u8, width: usize) -> u32 {
        if self.active_locty != Some(locty) {
            return 0xffff_ffff;
        }

        let sts = self.locs[locty as usize].sts;
        if sts.contains(Sts::DATA_AVAILABLE) {
            let avail = self.cmd_size().min(self.be_buffer_size) - self.rw_offset;
            ((avail as u32) << 8) | sts.bits()
        } else {
            let mut avail = (self.be_buffer_size - self.rw_offset) as u32;
            // Byte-sized reads must not alias 0x100 available bytes to 0x00.
            if width == 1 && avail > 0xff {
                avail = 0xff;
            }
            (avail << 8) | sts.bits()
        }
    }

    pub(super) fn write_sts(&mut self, locty: u8, val: u32) {
        if self.active_locty != Some(locty) {
            return;
        }

        if val & Sts::COMMAND_CANCEL.bits() != 0 && self.locs[locty as usize].state == CommandState::Execution {
            self.cancel_cmd();
        }

        if val & Sts::RESET_ESTABLISHMENT_BIT.bits() != 0 && (locty == 3 || locty == 4) {
            self.reset_established_flag(locty);
        }

        let val = Sts::from_bits_truncate(val) & Sts::WRITABLE;

        if val == Sts::COMMAND_READY {
            match self.locs[locty as usize].state {
                CommandState::Ready => self.rw_offset = 0,
                CommandState::Idle => {
                    self.locs[locty as usize].sts_set(Sts::COMMAND_READY);
                    self.locs[locty as usize].state = CommandState::Ready;
                    self.raise_irq(locty, IntFlags::COMMAND_READY);
                }
                CommandState::Execution => self.prep_abort(Some(locty), locty),
                CommandState::Reception => self.prep_abort(Some(locty), locty),
                CommandState::Completion => {
                    self.rw_offset = 0;
                    self.locs[locty as usize].state = CommandState::Ready;
                    if !self.locs[locty as usize].sts.contains(Sts::COMMAND_READY) {
                        self.locs[locty as usize].sts_set(Sts::COMMAND_READY);
                        self.raise_irq(locty, IntFlags::COMMAND_READY);
                    }
                    self.locs[locty as usize].sts.remove(Sts::DATA_AVAILABLE);
                }
            }
        } else if val == Sts::TPM_GO {
            if self.locs[locty as usize].state == CommandState::Reception
                && !self.locs[locty as usize].sts.contains(Sts::EXPECT)
            {
                self.tpm_send(locty);
            }
        } else if val == Sts::RESPONSE_RETRY {
            if self.locs[locty as usize].state == CommandState::Completion {
                self.rw_offset = 0;
                self.locs[locty as usize].sts_set(Sts::VALID | Sts::DATA_AVAILABLE);
            }
        }
    }
}
