//! A canned [`TpmBackend`] for tests, standing in for a real TPM the way
//! the cryptographic engine is explicitly out of scope for this crate.

use std::collections::VecDeque;

use crate::backend::{BackendCompletion, TpmBackend, TpmVersion};
use crate::error::BackendError;

/// Replays a fixed queue of responses, one per `deliver_request` call.
/// Each response is copied verbatim into the shared buffer (including its
/// own size-field header), matching what a real back-end would leave
/// behind.
pub struct StubBackend {
    version: TpmVersion,
    buffer_size: usize,
    established: bool,
    startup_error: bool,
    responses: VecDeque<Vec<u8>>,
    pub cancel_requests: usize,
}

impl StubBackend {
    pub fn new(version: TpmVersion, buffer_size: usize) -> Self {
        Self {
            version,
            buffer_size,
            established: false,
            startup_error: false,
            responses: VecDeque::new(),
            cancel_requests: 0,
        }
    }

    pub fn with_startup_error(mut self) -> Self {
        self.startup_error = true;
        self
    }

    pub fn push_response(&mut self, response: Vec<u8>) {
        self.responses.push_back(response);
    }
}

impl TpmBackend for StubBackend {
    fn version(&self) -> TpmVersion {
        self.version
    }

    fn buffer_size(&mut self) -> usize {
        self.buffer_size
    }

    fn had_startup_error(&self) -> bool {
        self.startup_error
    }

    fn established_flag(&mut self) -> bool {
        self.established
    }

    fn reset_established_flag(&mut self, _locality: u8) -> Result<(), BackendError> {
        self.established = false;
        Ok(())
    }

    fn reset(&mut self, buffer_size: usize) -> Result<(), BackendError> {
        if buffer_size != 0 {
            self.buffer_size = buffer_size;
        }
        Ok(())
    }

    fn deliver_request(
        &mut self,
        _locality: u8,
        buffer: &mut [u8],
        _in_len: usize,
    ) -> Result<BackendCompletion, BackendError> {
        if let Some(resp) = self.responses.pop_front() {
            let n = resp.len().min(buffer.len());
            buffer[..n].copy_from_slice(&resp[..n]);
        }
        Ok(BackendCompletion::default())
    }

    fn cancel_cmd(&mut self) {
        self.cancel_requests += 1;
    }
}
