//! Transport seam — the opaque, authenticated duplex channel to one
//! datacenter.
//!
//! The encrypted transport itself lives outside this crate. The session only
//! needs submit/remove plus activity control, and completions carry opaque
//! response bytes: decoding happens on the session side of the seam, where
//! the expected type is known.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use dcmux_core::RpcError;

/// Identity of one in-flight request, assigned by the transport at
/// submission. Invalid after completion or removal; never reused for the
/// lifetime of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// Diagnostic metadata accompanying a submission.
#[derive(Debug, Clone, Copy)]
pub struct RequestMetadata {
    /// Remote method name, for diagnostics and log correlation.
    pub method: &'static str,
}

/// Completion slot for one submission. Invoked at most once, possibly from
/// another task.
pub type Completion = Box<dyn FnOnce(Result<Bytes, RpcError>) + Send>;

/// Out-of-band events a transport reports to its owning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// The datacenter refused service pending a fresh per-datacenter
    /// authorization token. The session reacts by invalidating its cached
    /// token and requesting a new one; queued requests are kept.
    AuthorizationRequired,
}

/// Construction-time parameters for one transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub datacenter_id: i32,
    /// CDN datacenters serve cacheable file content only and are exempt
    /// from the master-datacenter token requirement.
    pub is_cdn: bool,
    /// Media-only traffic hint for the underlying channel.
    pub is_media: bool,
    /// Set when this transport serves a non-master datacenter: the token
    /// that must be negotiated before requests are serviced.
    pub required_auth_token: Option<i64>,
    pub master_datacenter_id: Option<i32>,
}

/// The session-facing surface of a transport. One instance per session,
/// exclusively owned and driven from that session's execution context.
pub trait Transport: Send + Sync {
    /// Submit a payload. The completion fires at most once, later.
    fn submit(&self, payload: Bytes, metadata: RequestMetadata, completion: Completion)
        -> RequestId;

    /// Best-effort removal by identity. Returns false if the request was
    /// already dispatched or completed.
    fn remove(&self, id: RequestId) -> bool;

    /// Stop initiating new network I/O. Queued requests are kept.
    fn pause(&self);

    /// Allow network activity again.
    fn resume(&self);

    /// Halt all activity. Terminal.
    fn halt(&self);

    /// Release session material. A finalized transport is never reused.
    fn finalize_session(&self);
}

/// Creates the one transport a session owns, together with its event stream.
pub trait TransportFactory: Send + Sync {
    fn open(
        &self,
        config: &TransportConfig,
    ) -> (Arc<dyn Transport>, mpsc::UnboundedReceiver<TransportEvent>);
}
