use crate::error::BackendError;

/// TPM family the back-end implements.
///
/// Mirrors `be_tpm_version` in the TIS core's device state (spec.md §3):
/// register reset values and which TPM2-only STS bits are honored depend
/// on this.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TpmVersion {
    Unspec,
    V1_2,
    V2_0,
}

/// What the back-end reports after executing a command, beyond the bytes
/// it wrote into the shared buffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackendCompletion {
    /// The command just executed was (or completed) a TPM self-test.
    /// Propagated to every locality's `SELFTEST_DONE` flag, which is
    /// sticky until the next device reset (spec.md §3 invariants).
    pub selftest_done: bool,
}

/// The back-end contract consumed by the TIS core (spec.md §6).
///
/// A single [`TpmTis`](../devices/struct.TpmTis.html) owns one
/// `Box<dyn TpmBackend>`; it is injected at construction time rather than
/// looked up globally (spec.md §9 re-architecture guidance: "no global
/// state").
///
/// `deliver_request` is written as a blocking call rather than a
/// registered completion callback. Every concrete back-end here talks to
/// the TPM over a synchronous control-socket round trip, so by the time
/// the call returns, the completion has already happened — there is no
/// separate event loop in this crate to marshal a callback onto. The core
/// applies the completion transition (spec.md §4.3 Execution → Completion)
/// immediately after `deliver_request` returns, which satisfies spec.md
/// §5's ordering guarantee ("a completion callback's side effects become
/// visible before any MMIO access observes them") trivially, since nothing
/// else can run in between.
pub trait TpmBackend: Send {
    /// TPM family in use. Queried once at reset (spec.md §3 lifecycle).
    fn version(&self) -> TpmVersion;

    /// Negotiate/query the FIFO buffer size the back-end wants to use.
    /// The caller clamps this to `BUFFER_MAX`.
    fn buffer_size(&mut self) -> usize;

    /// True once the back-end has failed to start; sticky until the
    /// device is fully recreated. While true, all MMIO is a no-op
    /// (spec.md §7).
    fn had_startup_error(&self) -> bool;

    /// The platform "established" bit; TIS ACCESS register bit 0 is its
    /// logical inverse.
    fn established_flag(&mut self) -> bool;

    /// TPM 2.0 only: clear the established bit for `locality` (STS bit 25,
    /// localities 3 or 4 only — the core enforces that restriction before
    /// calling this).
    fn reset_established_flag(&mut self, locality: u8) -> Result<(), BackendError>;

    /// Re-initialize the back-end. Called on every device reset
    /// (spec.md §6 "Reset behavior").
    fn reset(&mut self, buffer_size: usize) -> Result<(), BackendError>;

    /// Hand a command to the back-end and block until it answers.
    ///
    /// `buffer` is the TIS device's shared command/response buffer
    /// (spec.md §4.7 buffer aliasing: the same region is read as input and
    /// then overwritten with the response, which is safe because the
    /// back-end fully consumes the input before producing output).
    /// `in_len` is the number of valid command bytes at the front of
    /// `buffer`. On success the back-end has overwritten `buffer` with the
    /// response; its length is discovered by the caller from the
    /// embedded size field, per spec.md §3's FIFO invariant.
    fn deliver_request(
        &mut self,
        locality: u8,
        buffer: &mut [u8],
        in_len: usize,
    ) -> Result<BackendCompletion, BackendError>;

    /// Best-effort cancellation of whatever command is currently
    /// outstanding. Some back-ends cannot honor this; the device must
    /// stay correct if the command completes normally anyway
    /// (spec.md §4.7).
    fn cancel_cmd(&mut self);
}
