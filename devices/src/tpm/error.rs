use thiserror::Error;

/// Construction-time failures. Nothing reachable from a guest MMIO access
/// ever produces one of these; by the time `TpmTis` exists it cannot fail.
#[derive(Debug, Error)]
pub enum TisError {
    #[error("irq line {0} is out of range (must be 0..=15)")]
    InvalidIrq(u32),
}
