//! Control-socket client for an out-of-process TPM emulator (swtpm-style).
//!
//! The protocol has two channels: a control channel (a connected Unix
//! stream socket carrying the `ptm_*` command/response messages from
//! [`crate::ioctl`]) and a data channel (a socketpair whose other end is
//! handed to the emulator over the control channel via `SCM_RIGHTS`, then
//! used for raw TPM command/response bytes). This mirrors
//! `tpm_emulator_prepare_data_fd`/`tpm_emulator_ctrlcmd`/`unix_tx_bufs` in
//! the original QEMU `tpm_emulator` back-end.

use std::convert::TryInto;
use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;

use log::{debug, warn};
use nix::sys::socket::{
    recvmsg, sendmsg, socketpair, AddressFamily, ControlMessage, MsgFlags, SockFlag, SockType,
};
use nix::sys::uio::IoVec;

use crate::backend::{BackendCompletion, TpmBackend, TpmVersion};
use crate::error::BackendError;
use crate::ioctl::{self, caps, Command};

const TPM_REQ_HDR_SIZE: usize = 10;
const SELFTEST_ORDINAL: u32 = 0x53;

fn is_selftest(buf: &[u8], in_len: usize) -> bool {
    in_len >= TPM_REQ_HDR_SIZE && buf.len() >= 10 && u32::from_be_bytes(buf[6..10].try_into().unwrap()) == SELFTEST_ORDINAL
}

/// Client for an emulator reachable over a control-socket path.
pub struct Emulator {
    ctrl: UnixStream,
    data_fd: RawFd,
    version: TpmVersion,
    caps: u64,
    had_startup_error: bool,
    cur_locality: Option<u8>,
    established_cached: Option<bool>,
}

impl Emulator {
    /// Connect to a running emulator's control socket and perform the
    /// handshake (data-fd handoff, capability probe/check, establishment
    /// flag read) that QEMU's `tpm_emulator_create` does at construction.
    pub fn connect(ctrl_path: impl AsRef<Path>, version: TpmVersion) -> Result<Self, BackendError> {
        let path = ctrl_path.as_ref();
        let ctrl = UnixStream::connect(path).map_err(|source| BackendError::Connect {
            path: path.display().to_string(),
            source,
        })?;

        let mut emulator = Self {
            ctrl,
            data_fd: -1,
            version,
            caps: 0,
            had_startup_error: false,
            cur_locality: None,
            established_cached: None,
        };

        if let Err(e) = emulator.prepare_data_fd() {
            warn!("tpm emulator: failed to set up data fd: {}", e);
            emulator.had_startup_error = true;
            return Err(e);
        }

        if let Err(e) = emulator.probe_and_check_caps() {
            warn!("tpm emulator: capability negotiation failed: {}", e);
            emulator.had_startup_error = true;
            return Err(e);
        }

        // Warm the established-flag cache the same way the constructor
        // does in the original; failing this is a startup error there.
        if emulator.established_flag_inner().is_err() {
            emulator.had_startup_error = true;
        }

        Ok(emulator)
    }

    fn ctrlcmd(&mut self, cmd: Command, req: &[u8], resp_len: usize) -> Result<Vec<u8>, BackendError> {
        debug!("tpm emulator: ctrlcmd {:?}", cmd as u32);
        let mut buf = Vec::with_capacity(4 + req.len());
        buf.extend_from_slice(&(cmd as u32).to_be_bytes());
        buf.extend_from_slice(req);

        self.ctrl.write_all(&buf).map_err(BackendError::CtrlWrite)?;

        if resp_len == 0 {
            return Ok(Vec::new());
        }

        let mut resp = vec![0u8; resp_len];
        let mut read = 0;
        while read < resp_len {
            let n = self
                .ctrl
                .read(&mut resp[read..])
                .map_err(BackendError::CtrlRead)?;
            if n == 0 {
                return Err(BackendError::CtrlShortRead);
            }
            read += n;
        }
        Ok(resp)
    }

    fn prepare_data_fd(&mut self) -> Result<(), BackendError> {
        let (ours, theirs) = socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )
        .map_err(|e| BackendError::SocketPair(std::io::Error::from(e)))?;

        let fds = [theirs];
        let cmsg = [ControlMessage::ScmRights(&fds)];
        let hdr = (Command::SetDatafd as u32).to_be_bytes();
        let iov = [IoVec::from_slice(&hdr)];
        sendmsg(self.ctrl.as_raw_fd(), &iov, &cmsg, MsgFlags::empty(), None)
            .map_err(|e| BackendError::PassDataFd(std::io::Error::from(e)))?;

        // The handshake reply is a plain 4-byte result code.
        let mut resp = [0u8; 4];
        self.ctrl
            .read_exact(&mut resp)
            .map_err(BackendError::CtrlRead)?;

        let _ = nix::unistd::close(theirs);
        self.data_fd = ours;
        Ok(())
    }

    fn probe_and_check_caps(&mut self) -> Result<(), BackendError> {
        let resp = self.ctrlcmd(Command::GetCapability, &[], 8)?;
        self.caps = ioctl::decode_caps(&resp).unwrap_or(0);

        let required = match self.version {
            TpmVersion::V1_2 => caps::REQUIRED_V1_2,
            TpmVersion::V2_0 => caps::REQUIRED_V2_0,
            TpmVersion::Unspec => return Ok(()),
        };
        if self.caps & required != required {
            return Err(BackendError::MissingCapabilities {
                have: self.caps,
                need: required,
            });
        }
        Ok(())
    }

    fn established_flag_inner(&mut self) -> Result<bool, BackendError> {
        if let Some(cached) = self.established_cached {
            return Ok(cached);
        }
        let resp = self.ctrlcmd(Command::GetTpmEstablished, &[], 8)?;
        let est = ioctl::decode_established(&resp).ok_or(BackendError::CtrlShortRead)?;
        if est.tpm_result != 0 {
            return Err(BackendError::TpmResult(est.tpm_result, "get established flag"));
        }
        self.established_cached = Some(est.bit);
        Ok(est.bit)
    }

    fn set_buffer_size(&mut self, wanted: u32) -> Result<u32, BackendError> {
        self.stop()?;
        let req = ioctl::encode_set_buffer_size(wanted);
        let resp = self.ctrlcmd(Command::SetBufferSize, &req, 16)?;
        let decoded = ioctl::decode_set_buffer_size(&resp).ok_or(BackendError::CtrlShortRead)?;
        if decoded.tpm_result != 0 {
            return Err(BackendError::TpmResult(decoded.tpm_result, "set buffer size"));
        }
        Ok(decoded.bufsize)
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        let resp = self.ctrlcmd(Command::Stop, &[], 4)?;
        let result = ioctl::decode_tpm_result(&resp).ok_or(BackendError::CtrlShortRead)?;
        if result != 0 {
            return Err(BackendError::TpmResult(result, "stop"));
        }
        Ok(())
    }

    fn select_locality(&mut self, locality: u8) -> Result<(), BackendError> {
        if self.cur_locality == Some(locality) {
            return Ok(());
        }
        let req = ioctl::encode_set_locality(locality);
        let resp = self.ctrlcmd(Command::SetLocality, &req, 4)?;
        let result = ioctl::decode_tpm_result(&resp).ok_or(BackendError::CtrlShortRead)?;
        if result != 0 {
            return Err(BackendError::TpmResult(result, "set locality"));
        }
        self.cur_locality = Some(locality);
        Ok(())
    }

    fn transact(&mut self, buffer: &mut [u8], in_len: usize) -> Result<(), BackendError> {
        let iov = [IoVec::from_slice(&buffer[..in_len])];
        sendmsg(self.data_fd, &iov, &[], MsgFlags::empty(), None)
            .map_err(|e| BackendError::DataChannel(std::io::Error::from(e)))?;

        let mut iov_recv = [IoVec::from_mut_slice(buffer)];
        let _ = recvmsg(self.data_fd, &mut iov_recv, None, MsgFlags::empty())
            .map_err(|e| BackendError::DataChannel(std::io::Error::from(e)))?;
        Ok(())
    }
}

impl TpmBackend for Emulator {
    fn version(&self) -> TpmVersion {
        self.version
    }

    fn buffer_size(&mut self) -> usize {
        match self.set_buffer_size(0) {
            Ok(size) => size as usize,
            Err(e) => {
                warn!("tpm emulator: could not query buffer size: {}", e);
                4096
            }
        }
    }

    fn had_startup_error(&self) -> bool {
        self.had_startup_error
    }

    fn established_flag(&mut self) -> bool {
        self.established_flag_inner().unwrap_or(false)
    }

    fn reset_established_flag(&mut self, locality: u8) -> Result<(), BackendError> {
        if self.version != TpmVersion::V2_0 {
            return Ok(());
        }
        let req = ioctl::encode_reset_established(locality);
        let resp = self.ctrlcmd(Command::ResetTpmEstablished, &req, 4)?;
        let result = ioctl::decode_tpm_result(&resp).ok_or(BackendError::CtrlShortRead)?;
        if result != 0 {
            return Err(BackendError::TpmResult(result, "reset established flag"));
        }
        self.established_cached = None;
        Ok(())
    }

    fn reset(&mut self, buffer_size: usize) -> Result<(), BackendError> {
        if buffer_size != 0 {
            self.set_buffer_size(buffer_size as u32)?;
        }
        let req = ioctl::encode_init(0);
        let resp = self.ctrlcmd(Command::Init, &req, 4)?;
        let result = ioctl::decode_tpm_result(&resp).ok_or(BackendError::CtrlShortRead)?;
        if result != 0 {
            return Err(BackendError::TpmResult(result, "init"));
        }
        Ok(())
    }

    fn deliver_request(
        &mut self,
        locality: u8,
        buffer: &mut [u8],
        in_len: usize,
    ) -> Result<BackendCompletion, BackendError> {
        self.select_locality(locality)?;
        let selftest_probe = is_selftest(buffer, in_len);
        self.transact(buffer, in_len)?;

        let selftest_done = if selftest_probe {
            buffer.len() >= 10 && u32::from_be_bytes(buffer[6..10].try_into().unwrap()) == 0
        } else {
            false
        };

        Ok(BackendCompletion { selftest_done })
    }

    fn cancel_cmd(&mut self) {
        if self.caps & caps::CANCEL_TPM_CMD == 0 {
            debug!("tpm emulator: back-end cannot cancel, ignoring");
            return;
        }
        match self.ctrlcmd(Command::CancelTpmCmd, &[], 4) {
            Ok(resp) => match ioctl::decode_tpm_result(&resp) {
                Some(0) => {}
                Some(code) => warn!("tpm emulator: cancel failed: 0x{:x}", code),
                None => warn!("tpm emulator: truncated cancel response"),
            },
            Err(e) => warn!("tpm emulator: could not send cancel: {}", e),
        }
    }
}
