//! ACCESS register and locality arbitration (spec.md §4.2), grounded on
//! `tpm_tis_check_request_use_except`/`tpm_tis_new_active_locality`/the
//! `TPM_TIS_REG_ACCESS` arm of `handle_write` in the teacher crate.

use super::constants::NUM_LOCALITIES;
use super::locality::{Access, IntFlags};
use super::TpmTis;

impl TpmTis {
    /// Is some locality other than `locty` currently requesting use?
    /// Drives the computed `PENDING_REQUEST` bit on read.
    fn check_request_use_except(&self, locty: u8) -> bool {
        self.locs
            .iter()
            .enumerate()
            .any(|(l, loc)| l as u8 != locty && loc.access.contains(Access::REQUEST_USE))
    }

    pub(super) fn read_access(&mut self, locty: u8) -> u8 {
        if !Self::locality_in_range(locty) {
            return 0xff;
        }
        let mut access = self.locs[locty as usize].access - Access::SEIZE;
        if self.check_request_use_except(locty) {
            access |= Access::PENDING_REQUEST;
        }
        if !self.backend.established_flag() {
            access |= Access::TPM_ESTABLISHMENT;
        }
        access.bits()
    }

    /// `tpm_tis_new_active_locality`: move ownership of the register file
    /// to `new_active`, clearing stale flags on whoever held it before.
    pub(super) fn new_active_locality(&mut self, new_active: Option<u8>) {
        let changed = self.active_locty != new_active;

        if changed {
            if let Some(old) = self.active_locty {
                let is_seize = new_active
                    .map(|n| self.locs[n as usize].access.contains(Access::SEIZE))
                    .unwrap_or(false);

                if is_seize {
                    self.locs[old as usize].access.remove(Access::ACTIVE_LOCALITY);
                    self.locs[old as usize].access |= Access::BEEN_SEIZED;
                } else {
                    self.locs[old as usize]
                        .access
                        .remove(Access::ACTIVE_LOCALITY | Access::REQUEST_USE);
                }
            }
        }

        self.active_locty = new_active;

        if let Some(new) = new_active {
            self.locs[new as usize].access |= Access::ACTIVE_LOCALITY;
            self.locs[new as usize]
                .access
                .remove(Access::REQUEST_USE | Access::SEIZE);
        }

        if changed {
            if let Some(new) = new_active {
                self.raise_irq(new, IntFlags::LOCALITY_CHANGED);
            }
        }
    }

    /// `handle_write`'s `TPM_TIS_REG_ACCESS` arm.
    pub(super) fn write_access(&mut self, locty: u8, val: u8) {
        if !Self::locality_in_range(locty) {
            return;
        }
        let mut val = Access::from_bits_truncate(val);
        let mut new_active = self.active_locty;
        let mut set_new_locty = true;

        if val.contains(Access::SEIZE) {
            val.remove(Access::REQUEST_USE | Access::ACTIVE_LOCALITY);
        }

        if val.contains(Access::ACTIVE_LOCALITY) {
            if self.active_locty == Some(locty) {
                // Giving up the locality we hold: hand it to the highest
                // other locality still requesting it, if any.
                let mut handoff = None;
                for l in (0..NUM_LOCALITIES).rev() {
                    if self.locs[l as usize].access.contains(Access::REQUEST_USE) {
                        handoff = Some(l);
                        break;
                    }
                }
                match handoff {
                    Some(l) => {
                        set_new_locty = false;
                        self.prep_abort(Some(locty), l);
                    }
                    None => new_active = None,
                }
            } else {
                // Not currently the owner; a write of ACTIVE_LOCALITY here
                // withdraws whatever pending request this locality made.
                self.locs[locty as usize].access.remove(Access::REQUEST_USE);
            }
        }

        if val.contains(Access::BEEN_SEIZED) {
            self.locs[locty as usize].access.remove(Access::BEEN_SEIZED);
        }

        if val.contains(Access::SEIZE) {
            // Allow a seize if a locality is active and `locty` outranks it,
            // or if no locality is active at all.
            let may_seize = match self.active_locty {
                Some(active) => locty > active,
                None => true,
            };
            if may_seize && !self.locs[locty as usize].access.contains(Access::SEIZE) {
                let higher_seize = ((locty + 1)..NUM_LOCALITIES)
                    .any(|l| self.locs[l as usize].access.contains(Access::SEIZE));
                if !higher_seize {
                    // Cancel any seize already pending from a lower locality.
                    // `0..locty-1` here (not `0..locty`) reproduces an
                    // off-by-one present in the original implementation;
                    // see DESIGN.md.
                    for l in 0..locty.saturating_sub(1) {
                        self.locs[l as usize].access.remove(Access::SEIZE);
                    }
                    self.locs[locty as usize].access |= Access::SEIZE;
                    set_new_locty = false;
                    self.prep_abort(self.active_locty, locty);
                }
            }
        }

        if val.contains(Access::REQUEST_USE) && self.active_locty != Some(locty) {
            match self.active_locty {
                Some(_) => self.locs[locty as usize].access |= Access::REQUEST_USE,
                None => new_active = Some(locty),
            }
        }

        if set_new_locty {
            self.new_active_locality(new_active);
        }
    }
}
