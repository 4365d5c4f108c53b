//! Back-end glue for a TPM Interface Specification (TIS) emulator.
//!
//! This crate owns everything needed to talk to a TPM implementation that
//! lives outside the `devices` crate's TIS register file: the [`TpmBackend`]
//! trait that the TIS core drives, and two implementations of it — a
//! control-socket client for an out-of-process TPM emulator (`swtpm`-style)
//! and a canned stub used in tests.
//!
//! The cryptographic TPM itself is out of scope here too: `socket::Emulator`
//! is a transport, not an implementation of TPM commands.

pub mod backend;
pub mod error;
pub mod ioctl;
pub mod socket;
pub mod stub;

pub use backend::{BackendCompletion, TpmBackend, TpmVersion};
pub use error::BackendError;
