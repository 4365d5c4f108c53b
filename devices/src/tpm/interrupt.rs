//! Interrupt controller: INT_ENABLE/INT_STATUS per locality
//! (spec.md §4.6), grounded on `tpm_tis_raise_irq` and the
//! `TPM_TIS_REG_INT_ENABLE`/`TPM_TIS_REG_INT_STATUS` arms of
//! `handle_write` in the teacher crate.

use log::warn;

use super::locality::IntFlags;
use super::TpmTis;

impl TpmTis {
    /// `tpm_tis_raise_irq`: latch `mask` into the locality's INT_STATUS if
    /// that locality has interrupts enabled for it, then assert the line.
    pub(super) fn raise_irq(&mut self, locty: u8, mask: IntFlags) {
        if !Self::locality_in_range(locty) {
            return;
        }
        let loc = &mut self.locs[locty as usize];
        if loc.inte.contains(IntFlags::ENABLED) && loc.inte.intersects(mask) {
            loc.ints |= mask;
            if let Err(e) = self.irq.trigger() {
                warn!("tpm tis: failed to assert irq line: {}", e);
            }
        }
    }

    pub(super) fn read_int_enable(&self, locty: u8) -> u32 {
        if Self::locality_in_range(locty) {
            self.locs[locty as usize].inte.bits()
        } else {
            0
        }
    }

    /// Only the active locality may change its own INT_ENABLE.
    pub(super) fn write_int_enable(&mut self, locty: u8, val: u32) {
        if !Self::locality_in_range(locty) || self.active_locty != Some(locty) {
            return;
        }
        let writable = IntFlags::ENABLED | IntFlags::POLARITY_MASK | IntFlags::SUPPORTED;
        let val = IntFlags::from_bits_truncate(val) & writable;
        self.locs[locty as usize].inte = val;
    }

    pub(super) fn read_int_status(&self, locty: u8) -> u32 {
        if Self::locality_in_range(locty) {
            self.locs[locty as usize].ints.bits()
        } else {
            0
        }
    }

    /// Write-1-to-clear: only the active locality may clear its own bits.
    /// Once the locality's latched flags reach empty, the platform IRQ
    /// line is lowered.
    pub(super) fn write_int_status(&mut self, locty: u8, val: u32) {
        if !Self::locality_in_range(locty) || self.active_locty != Some(locty) {
            return;
        }
        let clear = IntFlags::from_bits_truncate(val) & IntFlags::SUPPORTED;
        self.locs[locty as usize].ints.remove(clear);
        if self.locs[locty as usize].ints.is_empty() {
            if let Err(e) = self.irq.lower() {
                warn!("tpm tis: failed to lower irq line: {}", e);
            }
        }
    }
}
