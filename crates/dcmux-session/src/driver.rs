//! Session driver — the single task that owns one transport, its
//! pending-request registry, and the authorization gate.
//!
//! Every submission, completion, cancellation, and connectivity transition
//! for one session passes through this task's command channel, so none of
//! them ever run concurrently with each other.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use dcmux_core::RpcError;

use crate::auth::{AuthContext, AuthToken};
use crate::session::SessionConfig;
use crate::transport::{RequestId, RequestMetadata, Transport, TransportEvent};

/// Commands accepted by the driver. Everything that touches session state
/// is funneled through these.
pub(crate) enum Command {
    Submit {
        id: u64,
        payload: Bytes,
        metadata: RequestMetadata,
        reply: oneshot::Sender<Result<Bytes, RpcError>>,
    },
    Cancel {
        id: u64,
    },
    Complete {
        id: u64,
        result: Result<Bytes, RpcError>,
    },
    Connectivity {
        keep_alive: bool,
    },
    AuthSupplied {
        token: AuthToken,
    },
    Shutdown,
}

struct Pending {
    reply: oneshot::Sender<Result<Bytes, RpcError>>,
    metadata: RequestMetadata,
    state: PendingState,
}

enum PendingState {
    /// Held back behind the authorization gate, payload not yet submitted.
    Queued { payload: Bytes },
    /// Handed to the transport under the given transport identity.
    Submitted { transport_id: RequestId },
}

pub(crate) struct Driver {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    auth: Arc<dyn AuthContext>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    pending: HashMap<u64, Pending>,
    /// FIFO order of gate-queued request ids.
    deferred: VecDeque<u64>,
    awaiting_auth: bool,
}

impl Driver {
    pub(crate) fn new(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        auth: Arc<dyn AuthContext>,
        cmd_tx: mpsc::UnboundedSender<Command>,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        let awaiting_auth = config.needs_auth_token();
        Self {
            config,
            transport,
            auth,
            cmd_tx,
            cmd_rx,
            events: Some(events),
            pending: HashMap::new(),
            deferred: VecDeque::new(),
            awaiting_auth,
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::info!(
            datacenter_id = self.config.datacenter_id,
            is_cdn = self.config.is_cdn,
            is_media = self.config.is_media,
            gated = self.awaiting_auth,
            "session active"
        );

        if self.awaiting_auth {
            self.auth.request_token(
                self.config.datacenter_id,
                self.config.required_auth_token(),
                self.config.master_datacenter_id,
            );
        }

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                event = recv_event(&mut self.events) => match event {
                    Some(event) => self.on_event(event),
                    None => self.events = None,
                },
            }
        }

        self.teardown();
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Submit {
                id,
                payload,
                metadata,
                reply,
            } => self.submit(id, payload, metadata, reply),
            Command::Cancel { id } => self.cancel(id),
            Command::Complete { id, result } => self.complete(id, result),
            Command::Connectivity { keep_alive } => self.apply_connectivity(keep_alive),
            Command::AuthSupplied { token } => self.auth_supplied(token),
            Command::Shutdown => unreachable!("handled in run"),
        }
    }

    fn submit(
        &mut self,
        id: u64,
        payload: Bytes,
        metadata: RequestMetadata,
        reply: oneshot::Sender<Result<Bytes, RpcError>>,
    ) {
        if self.awaiting_auth {
            if self.deferred.len() >= self.config.max_queued_requests {
                tracing::warn!(
                    datacenter_id = self.config.datacenter_id,
                    method = metadata.method,
                    queued = self.deferred.len(),
                    "auth queue full, failing request fast"
                );
                let _ = reply.send(Err(RpcError::new(0, "REQUEST_QUEUE_FULL")));
                return;
            }
            tracing::debug!(
                datacenter_id = self.config.datacenter_id,
                method = metadata.method,
                id,
                "queued behind authorization gate"
            );
            self.pending.insert(
                id,
                Pending {
                    reply,
                    metadata,
                    state: PendingState::Queued { payload },
                },
            );
            self.deferred.push_back(id);
            return;
        }
        self.submit_now(id, payload, metadata, reply);
    }

    fn submit_now(
        &mut self,
        id: u64,
        payload: Bytes,
        metadata: RequestMetadata,
        reply: oneshot::Sender<Result<Bytes, RpcError>>,
    ) {
        let cmd_tx = self.cmd_tx.clone();
        let completion: crate::transport::Completion = Box::new(move |result| {
            // After teardown the channel is closed and the completion is
            // dropped on the floor, which is exactly what finality requires.
            let _ = cmd_tx.send(Command::Complete { id, result });
        });
        let transport_id = self.transport.submit(payload, metadata, completion);
        self.pending.insert(
            id,
            Pending {
                reply,
                metadata,
                state: PendingState::Submitted { transport_id },
            },
        );
    }

    fn cancel(&mut self, id: u64) {
        let Some(entry) = self.pending.remove(&id) else {
            return;
        };
        match entry.state {
            PendingState::Queued { .. } => {
                self.deferred.retain(|queued| *queued != id);
                tracing::debug!(method = entry.metadata.method, id, "queued request cancelled");
            }
            PendingState::Submitted { transport_id } => {
                let honored = self.transport.remove(transport_id);
                tracing::debug!(
                    method = entry.metadata.method,
                    id,
                    honored,
                    "in-flight request cancelled"
                );
            }
        }
    }

    fn complete(&mut self, id: u64, result: Result<Bytes, RpcError>) {
        match self.pending.remove(&id) {
            Some(entry) => {
                // The receiver may already be gone; delivery is best-effort
                // from here on.
                let _ = entry.reply.send(result);
            }
            None => {
                // Expected after cancellation: the transport could not
                // un-send the request and completed it anyway.
                tracing::debug!(id, "completion for unknown request id, dropping");
            }
        }
    }

    fn apply_connectivity(&mut self, keep_alive: bool) {
        if keep_alive {
            tracing::info!(
                datacenter_id = self.config.datacenter_id,
                "resume worker network connection"
            );
            self.transport.resume();
        } else {
            tracing::info!(
                datacenter_id = self.config.datacenter_id,
                "pause worker network connection"
            );
            self.transport.pause();
        }
    }

    fn auth_supplied(&mut self, _token: AuthToken) {
        if !self.awaiting_auth {
            tracing::debug!(
                datacenter_id = self.config.datacenter_id,
                "auth token supplied while not awaiting one, ignoring"
            );
            return;
        }
        self.awaiting_auth = false;
        let queued: Vec<u64> = self.deferred.drain(..).collect();
        tracing::info!(
            datacenter_id = self.config.datacenter_id,
            flushed = queued.len(),
            "authorization token supplied, flushing queue"
        );
        for id in queued {
            if let Some(entry) = self.pending.remove(&id) {
                if let PendingState::Queued { payload } = entry.state {
                    self.submit_now(id, payload, entry.metadata, entry.reply);
                }
            }
        }
    }

    fn on_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::AuthorizationRequired => {
                tracing::info!(
                    datacenter_id = self.config.datacenter_id,
                    "authorization required, refreshing datacenter token"
                );
                self.auth.invalidate_token(self.config.datacenter_id);
                // Re-raise the gate so nothing new reaches the transport,
                // but keep everything already queued.
                if self.config.needs_auth_token() {
                    self.awaiting_auth = true;
                }
                self.auth.request_token(
                    self.config.datacenter_id,
                    self.config.required_auth_token(),
                    self.config.master_datacenter_id,
                );
            }
        }
    }

    fn teardown(&mut self) {
        tracing::info!(
            datacenter_id = self.config.datacenter_id,
            outstanding = self.pending.len(),
            "session torn down"
        );
        self.deferred.clear();
        for (_, entry) in self.pending.drain() {
            let _ = entry.reply.send(Err(RpcError::session_closed()));
        }
        self.transport.halt();
        self.transport.finalize_session();
    }
}

async fn recv_event(
    events: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
