//! The session handle — typed operations against one datacenter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};

use dcmux_core::files::{
    self, BigTotalParts, CdnRedirect, FileResult, InputFileLocation, InputWebFileLocation,
};
use dcmux_core::{align_part_length, FunctionDescription, RemoteCall, RetryPolicy, UploadPartError};

use crate::auth::{AuthContext, AuthToken};
use crate::connectivity;
use crate::driver::{Command, Driver};
use crate::pending::{CancelGuard, PendingRequest, RawPendingRequest};
use crate::transport::{RequestMetadata, TransportConfig, TransportFactory};

/// Construction parameters for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub datacenter_id: i32,
    pub master_datacenter_id: i32,
    pub is_cdn: bool,
    pub is_media: bool,
    pub retry: RetryPolicy,
    /// High-water mark for the authorization-gate queue.
    pub max_queued_requests: usize,
}

impl SessionConfig {
    pub fn new(datacenter_id: i32, master_datacenter_id: i32) -> Self {
        Self {
            datacenter_id,
            master_datacenter_id,
            is_cdn: false,
            is_media: false,
            retry: RetryPolicy::default(),
            max_queued_requests: 1024,
        }
    }

    /// Apply loaded configuration (retry shaping, queue bounds).
    pub fn tuned(mut self, config: &dcmux_core::MuxConfig) -> Self {
        self.retry = RetryPolicy::from(&config.retry);
        self.max_queued_requests = config.limits.max_queued_requests;
        self
    }

    /// A session serving a non-master, non-CDN datacenter must hold a
    /// per-datacenter authorization token before servicing requests.
    pub fn needs_auth_token(&self) -> bool {
        !self.is_cdn && self.datacenter_id != self.master_datacenter_id
    }

    pub fn required_auth_token(&self) -> Option<AuthToken> {
        self.needs_auth_token().then_some(self.datacenter_id as AuthToken)
    }
}

/// Outcome of a file-part download: the bytes themselves, or a redirect to
/// a CDN datacenter for a higher layer to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadedPart {
    Data(Bytes),
    CdnRedirect(CdnRedirect),
}

/// Which remote-call shape an upload uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPartKind {
    /// `upload.saveFilePart` — files small enough for single-shot metadata.
    Small,
    /// `upload.saveBigFilePart` — chunked large-file upload.
    Big { total_parts: BigTotalParts },
}

/// One datacenter session: exactly one transport, one driver task, one
/// pending-request registry. Dropping the handle tears the session down;
/// the transport is halted, its session material finalized, and no request
/// completes afterwards.
pub struct Session {
    cmd_tx: mpsc::UnboundedSender<Command>,
    next_id: AtomicU64,
    datacenter_id: i32,
    retry: RetryPolicy,
}

impl Session {
    /// Create the session and spawn its driver. Must run inside a tokio
    /// runtime.
    ///
    /// `should_keep_connection` is the external connectivity signal; its
    /// current value is applied immediately and every distinct transition
    /// afterwards pauses or resumes the transport.
    pub fn new(
        config: SessionConfig,
        factory: &dyn TransportFactory,
        auth: Arc<dyn AuthContext>,
        should_keep_connection: watch::Receiver<bool>,
    ) -> Self {
        let transport_config = TransportConfig {
            datacenter_id: config.datacenter_id,
            is_cdn: config.is_cdn,
            is_media: config.is_media,
            required_auth_token: config.required_auth_token(),
            master_datacenter_id: config
                .needs_auth_token()
                .then_some(config.master_datacenter_id),
        };
        let (transport, events) = factory.open(&transport_config);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(connectivity::gate(should_keep_connection, cmd_tx.clone()));

        let datacenter_id = config.datacenter_id;
        let retry = config.retry.clone();
        let driver = Driver::new(config, transport, auth, cmd_tx.clone(), cmd_rx, events);
        tokio::spawn(driver.run());

        Self {
            cmd_tx,
            next_id: AtomicU64::new(1),
            datacenter_id,
            retry,
        }
    }

    pub fn datacenter_id(&self) -> i32 {
        self.datacenter_id
    }

    /// Deliver a freshly negotiated per-datacenter authorization token.
    /// Opens the gate and flushes queued requests in submission order.
    pub fn supply_auth_token(&self, token: AuthToken) {
        let _ = self.cmd_tx.send(Command::AuthSupplied { token });
    }

    /// Issue a typed generic call. No retries: transport errors surface
    /// verbatim, undecodable responses surface as a verification error.
    /// Dropping the returned handle cancels the request.
    pub fn request<T>(&self, call: RemoteCall<T>) -> PendingRequest<T> {
        let RemoteCall {
            description,
            payload,
            decode,
        } = call;
        let (rx, guard) = self.submit(payload, description.method);
        PendingRequest::new(rx, decode, description.method, guard)
    }

    /// Issue a call whose response shape is not known to a typed
    /// descriptor. The parser's `None` is reported as `Ok(None)` and is not
    /// distinguishable from an absent response.
    pub fn raw_request<T>(
        &self,
        description: FunctionDescription,
        payload: Bytes,
        parser: impl Fn(&[u8]) -> Option<T> + Send + 'static,
    ) -> RawPendingRequest<T> {
        let (rx, guard) = self.submit(payload, description.method);
        RawPendingRequest::new(rx, Box::new(parser), guard)
    }

    /// Fetch one file part. The requested length is aligned to a
    /// protocol-valid part size, and transport failures are retried
    /// indefinitely with backoff — this operation never fails. A CDN
    /// redirect is returned as-is, never followed. Callers needing bounded
    /// waiting must impose a timeout and drop the future.
    pub async fn part(
        &self,
        location: &InputFileLocation,
        offset: u64,
        length: u32,
    ) -> DownloadedPart {
        let limit = align_part_length(length);
        let mut attempt: u32 = 0;
        loop {
            match self.request(files::get_file(location, offset, limit)).await {
                Ok(FileResult::Part { bytes }) => return DownloadedPart::Data(Bytes::from(bytes)),
                Ok(FileResult::CdnRedirect(redirect)) => {
                    return DownloadedPart::CdnRedirect(redirect)
                }
                Err(err) => self.retry_delay(&err, &mut attempt, files::GET_FILE.method).await,
            }
        }
    }

    /// Fetch one part of an externally-hosted file. Same contract as
    /// [`part`](Session::part), without the redirect case.
    pub async fn web_file_part(
        &self,
        location: &InputWebFileLocation,
        offset: u64,
        length: u32,
    ) -> Bytes {
        let limit = align_part_length(length);
        let mut attempt: u32 = 0;
        loop {
            match self
                .request(files::get_web_file(location, offset, limit))
                .await
            {
                Ok(web_file) => return Bytes::from(web_file.bytes),
                Err(err) => {
                    self.retry_delay(&err, &mut attempt, files::GET_WEB_FILE.method)
                        .await
                }
            }
        }
    }

    /// Store one file part. Not retried here: duplicate or reordered parts
    /// could corrupt the assembled file, so retry policy belongs to the
    /// caller, which knows part ordering and totals. A code-400 rejection
    /// is non-retryable [`UploadPartError::InvalidMedia`]; anything else is
    /// the retryable [`UploadPartError::Generic`].
    pub async fn upload_part(
        &self,
        file_id: i64,
        index: i32,
        data: Bytes,
        kind: UploadPartKind,
    ) -> Result<(), UploadPartError> {
        let call = match kind {
            UploadPartKind::Small => files::save_file_part(file_id, index, &data),
            UploadPartKind::Big { total_parts } => {
                files::save_big_file_part(file_id, index, total_parts, &data)
            }
        };
        match self.request(call).await {
            Ok(_) => Ok(()),
            Err(err) => Err(UploadPartError::classify(&err)),
        }
    }

    fn submit(
        &self,
        payload: Bytes,
        method: &'static str,
    ) -> (
        oneshot::Receiver<Result<Bytes, dcmux_core::RpcError>>,
        CancelGuard,
    ) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        // A failed send means the driver is gone; the dropped reply sender
        // resolves the handle with a session-closed error.
        let _ = self.cmd_tx.send(Command::Submit {
            id,
            payload,
            metadata: RequestMetadata { method },
            reply,
        });
        (rx, CancelGuard::new(id, self.cmd_tx.clone()))
    }

    /// Sleep out one retry step, or park forever if the session is gone —
    /// the download contract has no error to surface, only an indefinite
    /// pending state the caller can cancel.
    async fn retry_delay(&self, err: &dcmux_core::RpcError, attempt: &mut u32, method: &str) {
        if err.is_session_closed() {
            tracing::debug!(method, "session closed, parking file part request");
            std::future::pending::<()>().await;
        }
        tracing::debug!(
            method,
            code = err.code,
            attempt = *attempt,
            "file part fetch failed, retrying"
        );
        let delay = self.retry.delay_for(*attempt);
        *attempt = attempt.saturating_add(1);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }
}
