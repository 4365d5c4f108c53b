//! Fixed values from spec.md §3 and §6. Bit-level flag meanings live in
//! [`super::locality`] as `bitflags!` types; this module holds the plain
//! scalar constants those flags are built from plus register addresses.

/// Number of localities the register file exposes (0..4). Locality 4 is
/// reserved to hardware (spec.md §3, GLOSSARY).
pub const NUM_LOCALITIES: u8 = 5;

/// Upper bound on FIFO capacity; the device's shared buffer is exactly
/// this size regardless of what the back-end actually negotiates.
pub const BUFFER_MAX: usize = 4096;

/// Address bits 12..14 select the locality.
pub const LOCALITY_SHIFT: u32 = 12;

/// Sentinel returned by FIFO reads when there is nothing to give the guest.
pub const NO_DATA_BYTE: u8 = 0xff;

pub const TPM_DID: u32 = 0x0001;
pub const TPM_VID: u32 = 0x1014;
pub const TPM_RID: u32 = 0x01;

/// Register byte offsets within a locality's 4 KiB window (spec.md §4.1).
pub mod reg {
    pub const ACCESS: u64 = 0x00;
    pub const INT_ENABLE: u64 = 0x08;
    pub const INT_VECTOR: u64 = 0x0c;
    pub const INT_STATUS: u64 = 0x10;
    pub const INTF_CAPABILITY: u64 = 0x14;
    pub const STS: u64 = 0x18;
    pub const DATA_FIFO: u64 = 0x24;
    pub const INTERFACE_ID: u64 = 0x30;
    pub const DATA_XFIFO: u64 = 0x80;
    pub const DATA_XFIFO_END: u64 = 0xbc;
    pub const DID_VID: u64 = 0xf00;
    pub const RID: u64 = 0xf04;
}

/// `INTF_CAPABILITY` bit patterns, one set per back-end TPM family
/// (spec.md §6, and the TPM 1.2 variant supplemented from
/// `original_source/hw/tpm/tpm_tis.c` per SPEC_FULL.md §B).
pub mod intf_capability {
    const INTERRUPT_LOW_LEVEL: u32 = 1 << 4;
    const BURST_COUNT_DYNAMIC: u32 = 0 << 8;
    const DATA_TRANSFER_64B: u32 = 3 << 9;
    const INTERFACE_VERSION_1_3: u32 = 2 << 28;
    const INTERFACE_VERSION_1_3_FOR_TPM2_0: u32 = 3 << 28;
    // Mirrors super::locality::IntFlags::SUPPORTED.bits(), kept as a raw
    // constant here to avoid a dependency cycle between the two modules.
    const INTERRUPTS_SUPPORTED: u32 = (1 << 2) | (1 << 0) | (1 << 1) | (1 << 7);

    pub const V1_2: u32 =
        INTERRUPT_LOW_LEVEL | BURST_COUNT_DYNAMIC | DATA_TRANSFER_64B | INTERFACE_VERSION_1_3 | INTERRUPTS_SUPPORTED;
    pub const V2_0: u32 = INTERRUPT_LOW_LEVEL
        | BURST_COUNT_DYNAMIC
        | DATA_TRANSFER_64B
        | INTERFACE_VERSION_1_3_FOR_TPM2_0
        | INTERRUPTS_SUPPORTED;
}

/// `INTERFACE_ID` reset values (spec.md §6).
pub mod iface_id {
    const TIS1_3: u32 = 0xf;
    const FIFO: u32 = 0x0;
    const VER_FIFO: u32 = 0 << 4;
    const CAP_5_LOCALITIES: u32 = 1 << 8;
    const CAP_TIS_SUPPORTED: u32 = 1 << 13;

    /// TPM 1.2: "all of it is don't care" beyond the TIS1.3 interface tag,
    /// per the original implementation.
    pub const V1_2: u32 = TIS1_3 | (!0u32 << 4);
    pub const V2_0: u32 = FIFO | VER_FIFO | CAP_5_LOCALITIES | CAP_TIS_SUPPORTED;
}
