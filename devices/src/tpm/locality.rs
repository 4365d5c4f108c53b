use bitflags::bitflags;

bitflags! {
    /// ACCESS register flags (spec.md §3). `PENDING_REQUEST` and
    /// `TPM_ESTABLISHMENT` are computed on read, never stored, so they are
    /// intentionally absent here — see `super::arbiter::read_access`.
    #[derive(Default)]
    pub struct Access: u8 {
        const TPM_REG_VALID_STS = 1 << 7;
        const ACTIVE_LOCALITY   = 1 << 5;
        const BEEN_SEIZED       = 1 << 4;
        const SEIZE             = 1 << 3;
        const PENDING_REQUEST   = 1 << 2;
        const REQUEST_USE       = 1 << 1;
        const TPM_ESTABLISHMENT = 1 << 0;
    }
}

bitflags! {
    /// STS register flags (spec.md §3). The burst-count field (bits 8..23)
    /// is computed on read and lives outside this type, in
    /// `super::fifo::burst_count`.
    #[derive(Default)]
    pub struct Sts: u32 {
        const VALID                   = 1 << 7;
        const COMMAND_READY           = 1 << 6;
        const TPM_GO                  = 1 << 5;
        const DATA_AVAILABLE          = 1 << 4;
        const EXPECT                  = 1 << 3;
        const SELFTEST_DONE           = 1 << 2;
        const RESPONSE_RETRY          = 1 << 1;
        /// TPM 2.0 only.
        const COMMAND_CANCEL          = 1 << 24;
        /// TPM 2.0 only.
        const RESET_ESTABLISHMENT_BIT = 1 << 25;
        const FAMILY_1_2              = 0 << 26;
        const FAMILY_2_0              = 1 << 26;
        const FAMILY_MASK             = 0x3 << 26;

        /// Bits a guest write to STS may actually change; everything else
        /// is ignored (spec.md §4.3).
        const WRITABLE = Self::COMMAND_READY.bits | Self::TPM_GO.bits | Self::RESPONSE_RETRY.bits;
    }
}

bitflags! {
    /// Interrupt event bits, shared between INT_ENABLE and INT_STATUS
    /// (spec.md §4.6). `ENABLED` and the polarity bits only apply to
    /// INT_ENABLE.
    #[derive(Default)]
    pub struct IntFlags: u32 {
        const DATA_AVAILABLE    = 1 << 0;
        const STS_VALID         = 1 << 1;
        const LOCALITY_CHANGED  = 1 << 2;
        const COMMAND_READY     = 1 << 7;
        const POLARITY_MASK     = 3 << 3;
        const POLARITY_LOW      = 1 << 3;
        const ENABLED           = 1 << 31;

        const SUPPORTED = Self::DATA_AVAILABLE.bits
            | Self::STS_VALID.bits
            | Self::LOCALITY_CHANGED.bits
            | Self::COMMAND_READY.bits;
    }
}

/// `INTERFACE_ID` lock bit: sticky once set, across every locality
/// (spec.md §6, §8 testable properties).
pub const IFACE_ID_INT_SEL_LOCK: u32 = 1 << 19;

/// Per-locality command progression (spec.md §4.3). A plain tagged enum,
/// not nested conditionals, per spec.md §9's re-architecture guidance —
/// the exhaustive (state × STS-write) matrix lives in
/// `super::state_machine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Idle,
    Ready,
    Reception,
    Execution,
    Completion,
}

/// One locality's persisted register state (spec.md §3).
#[derive(Clone)]
pub struct LocalityState {
    pub state: CommandState,
    pub access: Access,
    pub sts: Sts,
    pub iface_id: u32,
    pub inte: IntFlags,
    pub ints: IntFlags,
}

impl LocalityState {
    /// `sts_set`: clear STS but retain `SELFTEST_DONE` and `FAMILY_MASK`,
    /// then OR in `flags` (spec.md §4.3).
    pub fn sts_set(&mut self, flags: Sts) {
        self.sts &= Sts::SELFTEST_DONE | Sts::FAMILY_MASK;
        self.sts |= flags;
    }
}
