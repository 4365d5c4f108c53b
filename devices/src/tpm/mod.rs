//! TPM Interface Specification (TIS) register file: a `devices::BusDevice`
//! that speaks the TIS 1.3 FIFO protocol on top of an injected
//! [`vtpm::TpmBackend`], grounded on `tpm_tis.rs` in the teacher crate and
//! on `hw/tpm/tpm_tis.c` where the teacher's port left gaps.

mod arbiter;
mod backend_glue;
pub mod bus;
mod constants;
mod decoder;
mod error;
mod fifo;
mod interrupt;
mod locality;
mod state_machine;

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use bus::{BusDevice, InterruptLine, NullInterruptLine};
use constants::{iface_id, intf_capability, BUFFER_MAX, NUM_LOCALITIES, TPM_DID, TPM_RID, TPM_VID};
use decoder::{decode, Register};
pub use error::TisError;
use locality::{Access, CommandState, IntFlags, LocalityState, Sts};
use vtpm::{TpmBackend, TpmVersion};

/// Construction-time configuration (SPEC_FULL.md §A.3).
#[derive(Debug, Clone, Copy)]
pub struct TisConfig {
    pub irq_num: u32,
}

impl TisConfig {
    pub fn new(irq_num: u32) -> Result<Self, TisError> {
        if irq_num > 15 {
            return Err(TisError::InvalidIrq(irq_num));
        }
        Ok(Self { irq_num })
    }
}

/// The TIS device. Owns one back-end and one IRQ line; no global state.
pub struct TpmTis {
    locs: Vec<LocalityState>,
    active_locty: Option<u8>,
    aborting_locty: Option<u8>,
    next_locty: Option<u8>,
    rw_offset: usize,
    buffer: Vec<u8>,
    be_buffer_size: usize,
    irq_num: u32,
    irq: Box<dyn InterruptLine>,
    backend: Box<dyn TpmBackend>,
}

fn reset_iface_id(version: TpmVersion) -> u32 {
    match version {
        TpmVersion::V1_2 => iface_id::V1_2,
        _ => iface_id::V2_0,
    }
}

fn reset_family_mask(version: TpmVersion) -> Sts {
    match version {
        TpmVersion::V1_2 => Sts::FAMILY_1_2,
        _ => Sts::FAMILY_2_0,
    }
}

fn reset_locality(version: TpmVersion) -> LocalityState {
    LocalityState {
        state: CommandState::Idle,
        access: Access::TPM_REG_VALID_STS,
        sts: reset_family_mask(version),
        iface_id: reset_iface_id(version),
        inte: IntFlags::POLARITY_LOW,
        ints: IntFlags::empty(),
    }
}

impl TpmTis {
    pub fn new(config: TisConfig, backend: Box<dyn TpmBackend>) -> Self {
        Self::with_irq(config, backend, Box::new(NullInterruptLine))
    }

    pub fn with_irq(
        config: TisConfig,
        mut backend: Box<dyn TpmBackend>,
        irq: Box<dyn InterruptLine>,
    ) -> Self {
        let version = backend.version();
        let be_buffer_size = backend.buffer_size().min(BUFFER_MAX);
        let locs = (0..NUM_LOCALITIES).map(|_| reset_locality(version)).collect();

        TpmTis {
            locs,
            active_locty: None,
            aborting_locty: None,
            next_locty: None,
            rw_offset: 0,
            buffer: vec![0u8; BUFFER_MAX],
            be_buffer_size,
            irq_num: config.irq_num,
            irq,
            backend,
        }
    }

    /// Device reset (spec.md §6): every locality's registers return to
    /// their power-on values; nothing in flight survives.
    pub fn reset(&mut self) {
        let version = self.backend.version();
        self.locs = (0..NUM_LOCALITIES).map(|_| reset_locality(version)).collect();
        self.active_locty = None;
        self.aborting_locty = None;
        self.next_locty = None;
        self.rw_offset = 0;
        self.buffer.iter_mut().for_each(|b| *b = 0);
        if let Err(e) = self.backend.reset(0) {
            warn!("tpm tis: backend reset failed: {}", e);
        }
        self.be_buffer_size = self.backend.buffer_size().min(BUFFER_MAX);
    }

    fn intf_capability(&self) -> u32 {
        match self.backend.version() {
            TpmVersion::V1_2 => intf_capability::V1_2,
            _ => intf_capability::V2_0,
        }
    }

    fn locality_in_range(locty: u8) -> bool {
        locty < NUM_LOCALITIES
    }
}

impl BusDevice for TpmTis {
    fn read(&mut self, base: u64, offset: u64, data: &mut [u8]) {
        if self.backend.had_startup_error() {
            data.iter_mut().for_each(|b| *b = 0);
            return;
        }

        let addr = base + offset;
        let decoded = decode(addr);
        let locty = decoded.locality;
        let width = data.len();

        let val: u32 = match decoded.register {
            Register::Access => self.read_access(locty) as u32,
            Register::IntEnable => self.read_int_enable(locty),
            Register::IntVector => self.irq_num,
            Register::IntStatus => self.read_int_status(locty),
            Register::IntfCapability => self.intf_capability(),
            Register::Sts => self.read_sts(locty, width),
            Register::DataFifo => self.read_data_fifo_word(locty, addr, width),
            Register::InterfaceId => {
                if Self::locality_in_range(locty) {
                    self.locs[locty as usize].iface_id
                } else {
                    !0
                }
            }
            Register::DidVid => (TPM_DID << 16) | TPM_VID,
            Register::Rid => TPM_RID,
            Register::Unknown => {
                warn!("tpm tis: read from unmapped offset {:#x}", addr);
                !0
            }
        };

        let shifted = if decoded.shift != 0 { val >> decoded.shift } else { val };
        let bytes = shifted.to_le_bytes();
        let n = data.len().min(4);
        data[..n].copy_from_slice(&bytes[..n]);
    }

    fn write(&mut self, base: u64, offset: u64, data: &[u8]) {
        if self.backend.had_startup_error() {
            return;
        }

        if data.len() > 4 {
            warn!("tpm tis: write of {} bytes at offset {:#x} ignored", data.len(), offset);
            return;
        }

        let addr = base + offset;
        let decoded = decode(addr);
        let locty = decoded.locality;

        // Locality 4 is reserved to hardware: the guest's writes into its
        // address window never touch device state.
        if locty == 4 {
            return;
        }

        let mut padded = [0u8; 4];
        padded[..data.len()].copy_from_slice(data);
        let mut val = LittleEndian::read_u32(&padded);
        if decoded.shift != 0 {
            val <<= decoded.shift;
        }

        match decoded.register {
            Register::Access => self.write_access(locty, val as u8),
            Register::IntEnable => self.write_int_enable(locty, val),
            Register::IntVector => {}
            Register::IntStatus => self.write_int_status(locty, val),
            Register::IntfCapability => {}
            Register::Sts => self.write_sts(locty, val),
            Register::DataFifo => self.write_data_fifo(locty, decoded.shift, data.len(), val),
            Register::InterfaceId => {
                if val & locality::IFACE_ID_INT_SEL_LOCK != 0 {
                    for loc in self.locs.iter_mut() {
                        loc.iface_id |= locality::IFACE_ID_INT_SEL_LOCK;
                    }
                }
            }
            Register::DidVid | Register::Rid => {}
            Register::Unknown => {
                warn!("tpm tis: write to unmapped offset {:#x}", addr);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtpm::stub::StubBackend;

    fn make(version: TpmVersion) -> TpmTis {
        let backend = Box::new(StubBackend::new(version, 4096));
        TpmTis::new(TisConfig::new(0).unwrap(), backend)
    }

    /// A seize against a locality mid-`Execution` must only request
    /// back-end cancellation; the active locality does not change until
    /// the (here never-arriving) completion callback runs the abort
    /// finisher. This is the synchronous-backend counterpart of spec.md
    /// §8 scenario 3's "back-end cancel is requested" step.
    #[test]
    fn seize_while_executing_requests_cancel_without_switching_active() {
        let mut dev = make(TpmVersion::V2_0);
        dev.new_active_locality(Some(0));
        dev.locs[0].state = CommandState::Execution;

        dev.write_access(1, Access::SEIZE.bits());

        assert_eq!(dev.active_locty, Some(0));
        assert!(dev.locs[1].access.contains(Access::SEIZE));
    }

    /// The other half of scenario 3: once the abort finisher actually
    /// runs, ownership transfers and the old owner is marked seized.
    #[test]
    fn abort_finisher_switches_active_locality_and_marks_seized() {
        let mut dev = make(TpmVersion::V2_0);
        dev.new_active_locality(Some(0));
        dev.locs[1].access |= Access::SEIZE;
        dev.aborting_locty = Some(0);
        dev.next_locty = Some(1);

        dev.abort();

        assert_eq!(dev.active_locty, Some(1));
        assert!(dev.locs[0].access.contains(Access::BEEN_SEIZED));
        assert!(dev.locs[1].access.contains(Access::ACTIVE_LOCALITY));
    }

    /// Writing COMMAND_READY while a locality is mid-`Execution` must
    /// abort identically to writing it mid-`Reception`: back-end cancel
    /// is requested and the locality is queued to return to itself.
    #[test]
    fn command_ready_during_execution_initiates_abort() {
        let mut dev = make(TpmVersion::V2_0);
        dev.new_active_locality(Some(0));
        dev.locs[0].state = CommandState::Execution;

        dev.write_sts(0, Sts::COMMAND_READY.bits());

        assert_eq!(dev.locs[0].state, CommandState::Execution, "cancel is requested, not yet completed");
        assert_eq!(dev.aborting_locty, Some(0));
        assert_eq!(dev.next_locty, Some(0));
    }

    #[test]
    fn reset_clears_sticky_selftest_done() {
        let mut dev = make(TpmVersion::V2_0);
        dev.locs[0].sts |= Sts::SELFTEST_DONE;
        dev.reset();
        assert!(dev.locs[0].sts.is_empty());
    }
}
