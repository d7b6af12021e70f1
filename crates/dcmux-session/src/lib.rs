//! dcmux-session — per-datacenter RPC session and file-transfer multiplexer.
//!
//! A [`Session`] owns exactly one transport to one datacenter and exposes
//! typed asynchronous operations on it: generic calls, file-part download,
//! web-file download, and file-part upload. All submission, completion, and
//! connectivity handling for one session runs on a single driver task, so no
//! two callbacks for the same session ever race. Sessions for different
//! datacenters run independently.

pub mod auth;
pub mod pool;
pub mod session;
pub mod testkit;
pub mod transport;

mod connectivity;
mod driver;
mod pending;

pub use auth::{AuthContext, AuthToken};
pub use pending::{PendingRequest, RawPendingRequest};
pub use pool::SessionPool;
pub use session::{DownloadedPart, Session, SessionConfig, UploadPartKind};
pub use transport::{
    Completion, RequestId, RequestMetadata, Transport, TransportConfig, TransportEvent,
    TransportFactory,
};
