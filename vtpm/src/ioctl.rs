//! Wire structures for the swtpm-style TPM emulator control protocol
//! (the `ptm_*` messages in swtpm's `tpm_ioctl.h`). All messages are
//! big-endian, as in the original.

use byteorder::{BigEndian, ByteOrder};

/// Command codes sent over the control channel, matching swtpm's
/// `ptm_cmd` values for the non-CUSE (socket) TPM control protocol.
#[derive(Debug, Clone, Copy)]
pub enum Command {
    GetCapability = 1,
    Init = 2,
    Shutdown = 3,
    GetTpmEstablished = 4,
    SetLocality = 5,
    CancelTpmCmd = 9,
    ResetTpmEstablished = 11,
    Stop = 14,
    SetDatafd = 16,
    SetBufferSize = 17,
}

/// Capability flags returned by `GetCapability`.
pub mod caps {
    pub const INIT: u64 = 1;
    pub const SHUTDOWN: u64 = 1 << 1;
    pub const GET_TPMESTABLISHED: u64 = 1 << 2;
    pub const SET_LOCALITY: u64 = 1 << 3;
    pub const CANCEL_TPM_CMD: u64 = 1 << 5;
    pub const RESET_TPMESTABLISHED: u64 = 1 << 7;
    pub const STOP: u64 = 1 << 10;
    pub const SET_DATAFD: u64 = 1 << 12;
    pub const SET_BUFFERSIZE: u64 = 1 << 13;

    pub const REQUIRED_V1_2: u64 = INIT | SHUTDOWN | GET_TPMESTABLISHED | SET_LOCALITY | SET_DATAFD | STOP | SET_BUFFERSIZE;
    pub const REQUIRED_V2_0: u64 = REQUIRED_V1_2 | RESET_TPMESTABLISHED;
}

pub const INIT_FLAG_DELETE_VOLATILE: u32 = 1 << 0;

/// `PTM_INIT` request body: a single `u32` of flags.
pub fn encode_init(flags: u32) -> [u8; 4] {
    flags.to_be_bytes()
}

/// `PTM_INIT` response body: a single `u32` TPM result code.
pub fn decode_tpm_result(buf: &[u8]) -> Option<u32> {
    if buf.len() < 4 {
        return None;
    }
    Some(BigEndian::read_u32(&buf[0..4]))
}

/// `PTM_GET_CAPABILITY` response body: a `u64` capability bitmask.
pub fn decode_caps(buf: &[u8]) -> Option<u64> {
    if buf.len() < 8 {
        return None;
    }
    Some(BigEndian::read_u64(&buf[0..8]))
}

/// `PTM_GET_TPMESTABLISHED` response body: result code then a one-byte flag.
pub struct EstablishedResp {
    pub tpm_result: u32,
    pub bit: bool,
}

pub fn decode_established(buf: &[u8]) -> Option<EstablishedResp> {
    if buf.len() < 5 {
        return None;
    }
    Some(EstablishedResp {
        tpm_result: BigEndian::read_u32(&buf[0..4]),
        bit: buf[4] != 0,
    })
}

/// `PTM_RESET_TPMESTABLISHED` request body: the locality to act on.
pub fn encode_reset_established(locality: u8) -> [u8; 4] {
    // swtpm pads the single-byte locality to a 4-byte request.
    [locality, 0, 0, 0]
}

/// `PTM_SET_LOCALITY` request body: the locality to select.
pub fn encode_set_locality(locality: u8) -> [u8; 4] {
    [locality, 0, 0, 0]
}

/// `PTM_SET_BUFFERSIZE` request body: requested size, 0 to query only.
pub fn encode_set_buffer_size(wanted: u32) -> [u8; 4] {
    wanted.to_be_bytes()
}

/// `PTM_SET_BUFFERSIZE` response body: result, then bufsize/minsize/maxsize.
pub struct SetBufferSizeResp {
    pub tpm_result: u32,
    pub bufsize: u32,
}

pub fn decode_set_buffer_size(buf: &[u8]) -> Option<SetBufferSizeResp> {
    if buf.len() < 16 {
        return None;
    }
    Some(SetBufferSizeResp {
        tpm_result: BigEndian::read_u32(&buf[0..4]),
        bufsize: BigEndian::read_u32(&buf[4..8]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_tpm_result() {
        let buf = 0x1234_5678u32.to_be_bytes();
        assert_eq!(decode_tpm_result(&buf), Some(0x1234_5678));
        assert_eq!(decode_tpm_result(&buf[..2]), None);
    }

    #[test]
    fn round_trips_caps() {
        let buf = caps::REQUIRED_V2_0.to_be_bytes();
        assert_eq!(decode_caps(&buf), Some(caps::REQUIRED_V2_0));
    }

    #[test]
    fn decodes_established() {
        let mut buf = [0u8; 5];
        BigEndian::write_u32(&mut buf[0..4], 0);
        buf[4] = 1;
        let resp = decode_established(&buf).unwrap();
        assert_eq!(resp.tpm_result, 0);
        assert!(resp.bit);
    }

    #[test]
    fn decodes_set_buffer_size() {
        let mut buf = [0u8; 16];
        BigEndian::write_u32(&mut buf[0..4], 0);
        BigEndian::write_u32(&mut buf[4..8], 4096);
        let resp = decode_set_buffer_size(&buf).unwrap();
        assert_eq!(resp.tpm_result, 0);
        assert_eq!(resp.bufsize, 4096);
    }
}
