//! The two-phase response protocol state machine.
//!
//! An application must start its response (status line plus headers)
//! before any body chunk is committed. Starting a second time is a
//! protocol violation unless the call carries an [`ErrorToken`]; even
//! then, headers can only be replaced while no body bytes have been
//! committed. Afterwards the token is re-signalled to the caller.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ErrorToken, ProtocolViolation, Result, SgiError};
use crate::types::GatewayResponse;

/// Per-invocation response state, shared between the starter handle, the
/// body writer, and the orchestrator.
#[derive(Debug, Default)]
struct ResponseState {
    headers_set: bool,
    body_started: bool,
    status_code: u16,
    headers: Vec<(String, String)>,
    error_token: Option<ErrorToken>,
    chunks: Vec<String>,
}

/// Response-starting handle given to the wrapped application.
///
/// Cloning shares the same invocation state, so the handle may be moved
/// into the body sequence the application returns; late error signalling
/// from inside body production goes through the same state machine. Each
/// invocation is single-threaded, the mutex only exists to make the
/// shared handle possible.
#[derive(Debug, Clone)]
pub struct ResponseStarter {
    state: Arc<Mutex<ResponseState>>,
}

impl ResponseStarter {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ResponseState::default())),
        }
    }

    /// Begin the response, or replace it on the error path.
    ///
    /// `status_line` must be of the form `"<code> <reason>"`, e.g.
    /// `"200 OK"`. The returned [`BodyWriter`] appends chunks to the
    /// body accumulator for applications with imperative output.
    pub fn start(
        &self,
        status_line: &str,
        headers: Vec<(String, String)>,
        error: Option<ErrorToken>,
    ) -> Result<BodyWriter> {
        let mut state = self.state.lock();

        if state.headers_set && error.is_none() {
            return Err(ProtocolViolation::SecondStartWithoutErrorToken.into());
        }

        state.headers_set = true;

        // Headers cannot change once body bytes are committed; the
        // captured error is re-signalled to the caller instead.
        let error = match (error, state.body_started) {
            (Some(token), true) => return Err(SgiError::Application(token)),
            (error, _) => error,
        };

        state.status_code = parse_status_line(status_line)?;
        // A legitimate second start supersedes the pending response.
        state.headers = headers;
        state.error_token = error;

        Ok(BodyWriter {
            state: Arc::clone(&self.state),
        })
    }

    pub(crate) fn headers_set(&self) -> bool {
        self.state.lock().headers_set
    }

    /// Commit one orchestrated body chunk. After this, header
    /// replacement is off the table.
    pub(crate) fn append_body_chunk(&self, chunk: String) {
        let mut state = self.state.lock();
        state.chunks.push(chunk);
        state.body_started = true;
    }

    /// Assemble the final gateway response. Fails when the application
    /// never started a response at all.
    pub(crate) fn finish(&self) -> Result<GatewayResponse> {
        let state = self.state.lock();
        if !state.headers_set {
            return Err(ProtocolViolation::HeadersNeverSent.into());
        }
        if let Some(token) = &state.error_token {
            debug!(error = %token, "assembling response for a trapped application error");
        }
        Ok(GatewayResponse {
            status_code: state.status_code,
            headers: state.headers.iter().cloned().collect(),
            body: state.chunks.concat(),
        })
    }
}

/// Writer handle returned by [`ResponseStarter::start`].
///
/// Chunks written here interleave with chunks from the returned body
/// sequence in arrival order. Writing does not count as starting the
/// body: only orchestrated consumption commits body bytes.
#[derive(Debug, Clone)]
pub struct BodyWriter {
    state: Arc<Mutex<ResponseState>>,
}

impl BodyWriter {
    /// Append one chunk to the response body.
    pub fn write(&self, chunk: impl Into<String>) {
        self.state.lock().chunks.push(chunk.into());
    }
}

/// Extract the numeric code from a `"<code> <reason>"` status line.
fn parse_status_line(status_line: &str) -> Result<u16> {
    let (code, reason) = match status_line.split_once(' ') {
        Some(parts) => parts,
        None => return Err(malformed(status_line)),
    };
    if code.is_empty() || reason.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(status_line));
    }
    code.parse().map_err(|_| malformed(status_line))
}

fn malformed(status_line: &str) -> SgiError {
    ProtocolViolation::MalformedStatusLine(status_line.to_string()).into()
}
