//! Back-end glue and command abort (spec.md §4.5, §4.7), grounded on
//! `tpm_backend_deliver_request`/`tpm_tis_tpm_send`/`tpm_tis_abort`/
//! `tpm_tis_prep_abort` in the teacher crate.
//!
//! `deliver_request` on [`vtpm::TpmBackend`] is synchronous (see that
//! trait's doc comment), so what was an asynchronous callback in the
//! teacher becomes a direct call whose result is applied in the same
//! stack frame as the triggering STS write.

use log::warn;

use super::locality::{CommandState, IntFlags, Sts};
use super::TpmTis;

impl TpmTis {
    /// `tpm_tis_tpm_send`: hand the buffered command to the back-end and
    /// apply its completion in place of a callback.
    pub(super) fn tpm_send(&mut self, locty: u8) {
        self.locs[locty as usize].state = CommandState::Execution;
        let in_len = self.rw_offset;

        match self.backend.deliver_request(locty, &mut self.buffer, in_len) {
            Ok(completion) => {
                if completion.selftest_done {
                    for loc in self.locs.iter_mut() {
                        loc.sts |= Sts::SELFTEST_DONE;
                    }
                }

                self.locs[locty as usize].sts_set(Sts::VALID | Sts::DATA_AVAILABLE);
                self.locs[locty as usize].state = CommandState::Completion;
                self.rw_offset = 0;

                if self.next_locty.is_some() {
                    self.abort();
                }

                self.raise_irq(locty, IntFlags::DATA_AVAILABLE | IntFlags::STS_VALID);
            }
            Err(e) => warn!("tpm tis: back-end request failed: {}", e),
        }
    }

    /// `tpm_tis_prep_abort`: start aborting whatever `locty` is doing so
    /// `newlocty` can take over; cancels in-flight execution first if any
    /// locality is mid-command. `locty` is `None` for a seize with no
    /// locality currently active, mirroring `TPM_TIS_NO_LOCALITY` in the
    /// original — this keeps `aborting_locty != next_locty` so `abort()`
    /// doesn't spuriously treat the seizer as its own old owner.
    pub(super) fn prep_abort(&mut self, locty: Option<u8>, newlocty: u8) {
        debug_assert!(Self::locality_in_range(newlocty));

        self.aborting_locty = locty;
        self.next_locty = Some(newlocty);

        if self.locs.iter().any(|l| l.state == CommandState::Execution) {
            self.cancel_cmd();
            return;
        }

        self.abort();
    }

    /// `tpm_tis_abort`: finish an abort in progress, moving ownership to
    /// whichever locality `prep_abort` queued up.
    pub(super) fn abort(&mut self) {
        self.rw_offset = 0;

        if let Some(aborting) = self.aborting_locty {
            if self.aborting_locty == self.next_locty {
                self.locs[aborting as usize].state = CommandState::Ready;
                self.locs[aborting as usize].sts_set(Sts::COMMAND_READY);
                self.raise_irq(aborting, IntFlags::COMMAND_READY);
            }
        }

        self.new_active_locality(self.next_locty);
        self.next_locty = None;
        self.aborting_locty = None;
    }

    pub(super) fn cancel_cmd(&mut self) {
        self.backend.cancel_cmd();
    }

    pub(super) fn reset_established_flag(&mut self, locty: u8) {
        if let Err(e) = self.backend.reset_established_flag(locty) {
            warn!("tpm tis: reset established flag failed: {}", e);
        }
    }
}
