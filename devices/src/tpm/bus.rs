//! Local stand-ins for `vm_device::BusDevice` and
//! `vm_device::interrupt::InterruptSourceGroup`, which the teacher crate
//! pulls from the surrounding hypervisor workspace. Neither is part of
//! this crate's dependency graph, so the MMIO and IRQ seams are
//! expressed as small local traits instead; [`super::TpmTis`] is
//! generic only over the latter, and implements the former directly.

/// A device addressable on an MMIO bus.
pub trait BusDevice: Send {
    fn read(&mut self, base: u64, offset: u64, data: &mut [u8]);
    fn write(&mut self, base: u64, offset: u64, data: &[u8]);
}

/// One IRQ line a device can assert or deassert. Mirrors the two methods
/// of `InterruptSourceGroup` this device actually calls (`trigger` to
/// raise, `lower` to deassert once every pending flag is cleared);
/// level-triggered semantics are the caller's concern.
pub trait InterruptLine: Send {
    fn trigger(&mut self) -> std::io::Result<()>;
    fn lower(&mut self) -> std::io::Result<()>;
}

/// An [`InterruptLine`] that does nothing, for configurations or tests
/// that don't care about IRQ delivery.
#[derive(Default)]
pub struct NullInterruptLine;

impl InterruptLine for NullInterruptLine {
    fn trigger(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    fn lower(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
