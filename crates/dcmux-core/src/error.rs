//! Error taxonomy for the RPC session layer.
//!
//! The session never logs or presents errors to a user; it classifies them
//! and hands them to the caller.

use thiserror::Error;

/// Reserved code for locally-synthesized verification failures, so callers
/// can tell "server said no" apart from "response was garbage".
pub const VERIFICATION_ERROR_CODE: i32 = 500;

/// Code used when a session is torn down with requests still outstanding.
/// Never produced by a remote endpoint.
pub const SESSION_CLOSED_CODE: i32 = 0;

/// Transport-level RPC error — an opaque (code, description) pair from the
/// underlying channel, surfaced verbatim by generic calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rpc error {code}: {description}")]
pub struct RpcError {
    pub code: i32,
    pub description: String,
}

impl RpcError {
    pub fn new(code: i32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    /// Synthesized when a response arrived but could not be decoded into the
    /// expected shape. Travels the same error channel as remote errors.
    pub fn verification(method: &str) -> Self {
        Self {
            code: VERIFICATION_ERROR_CODE,
            description: format!("{method}: response verification failed"),
        }
    }

    /// Resolved into still-pending request handles when their session is
    /// torn down before the transport answers.
    pub fn session_closed() -> Self {
        Self {
            code: SESSION_CLOSED_CODE,
            description: "SESSION_CLOSED".to_string(),
        }
    }

    pub fn is_session_closed(&self) -> bool {
        self.code == SESSION_CLOSED_CODE && self.description == "SESSION_CLOSED"
    }
}

/// Outcome taxonomy for file-part uploads — deliberately coarser than
/// [`RpcError`], so upload callers get a retry/don't-retry decision for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UploadPartError {
    /// The server rejected the part as structurally invalid (code 400).
    /// Retrying the same bytes will not help.
    #[error("upload part rejected as invalid media")]
    InvalidMedia,
    /// Transient transport or server failure. Safe for the caller to retry.
    #[error("upload part failed")]
    Generic,
}

impl UploadPartError {
    pub fn classify(err: &RpcError) -> Self {
        if err.code == 400 {
            UploadPartError::InvalidMedia
        } else {
            UploadPartError::Generic
        }
    }
}

impl From<RpcError> for UploadPartError {
    fn from(err: RpcError) -> Self {
        UploadPartError::classify(&err)
    }
}
