use std::io;

use thiserror::Error;

/// Failures coming out of a [`crate::TpmBackend`] implementation.
///
/// These are transport/control-channel failures, never TPM command errors —
/// a TPM command that the back-end itself rejects still completes normally
/// from the TIS core's point of view (see `TpmBackend::deliver_request`).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to connect to TPM emulator control socket at {path}: {source}")]
    Connect { path: String, source: io::Error },

    #[error("failed to create data socketpair: {0}")]
    SocketPair(#[source] io::Error),

    #[error("failed to pass data fd to TPM emulator: {0}")]
    PassDataFd(#[source] io::Error),

    #[error("control channel write failed: {0}")]
    CtrlWrite(#[source] io::Error),

    #[error("control channel read failed: {0}")]
    CtrlRead(#[source] io::Error),

    #[error("control channel closed before a full reply was read")]
    CtrlShortRead,

    #[error("data channel I/O failed: {0}")]
    DataChannel(#[source] io::Error),

    #[error("TPM emulator does not implement the minimum required capability set (have {have:#x}, need {need:#x})")]
    MissingCapabilities { have: u64, need: u64 },

    #[error("TPM emulator returned non-zero result 0x{0:x} for {1}")]
    TpmResult(u32, &'static str),
}
