//! Test doubles for exercising sessions without a real network: a scripted
//! transport, its factory, and a recording authorization context.
//!
//! The transport replays a script of steps, one per submission: reply with
//! bytes, fail with an error, or hold the completion for manual firing.
//! Everything observable — submissions, removals, pause/resume/halt — is
//! recorded for assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;

use dcmux_core::RpcError;

use crate::auth::{AuthContext, AuthToken};
use crate::transport::{
    Completion, RequestId, RequestMetadata, Transport, TransportConfig, TransportEvent,
    TransportFactory,
};

/// What the transport does with one submission.
pub enum ScriptStep {
    /// Complete immediately with these response bytes.
    Reply(Bytes),
    /// Complete immediately with this error.
    Fail(RpcError),
    /// Keep the completion; the test fires it later with
    /// [`ScriptedTransport::complete_held`].
    Hold,
}

impl ScriptStep {
    /// A `Reply` carrying the serde_json encoding of `value`.
    pub fn reply_json<T: serde::Serialize>(value: &T) -> Self {
        ScriptStep::Reply(Bytes::from(
            serde_json::to_vec(value).expect("test reply serializes"),
        ))
    }
}

/// One recorded submission.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub id: RequestId,
    pub method: &'static str,
    pub payload: Bytes,
}

pub struct ScriptedTransport {
    script: Mutex<VecDeque<ScriptStep>>,
    held: Mutex<HashMap<u64, Completion>>,
    submissions: Mutex<Vec<SubmissionRecord>>,
    removed: Mutex<Vec<RequestId>>,
    next_id: AtomicU64,
    honor_removal: AtomicBool,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    halted: AtomicBool,
    finalized: AtomicBool,
}

impl ScriptedTransport {
    pub fn new(script: Vec<ScriptStep>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            held: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            honor_removal: AtomicBool::new(true),
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
            halted: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
        })
    }

    /// Append further steps to the script.
    pub fn push_steps(&self, steps: Vec<ScriptStep>) {
        self.script.lock().unwrap().extend(steps);
    }

    /// Make `remove` report failure while still keeping the held
    /// completion, modeling a request already on the wire.
    pub fn set_honor_removal(&self, honor: bool) {
        self.honor_removal.store(honor, Ordering::SeqCst);
    }

    /// Fire a held completion. Returns false if nothing was held under the
    /// id (already completed or removed).
    pub fn complete_held(&self, id: RequestId, result: Result<Bytes, RpcError>) -> bool {
        match self.held.lock().unwrap().remove(&id.0) {
            Some(completion) => {
                completion(result);
                true
            }
            None => false,
        }
    }

    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn removed(&self) -> Vec<RequestId> {
        self.removed.lock().unwrap().clone()
    }

    pub fn pause_count(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn submit(
        &self,
        payload: Bytes,
        metadata: RequestMetadata,
        completion: Completion,
    ) -> RequestId {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.submissions.lock().unwrap().push(SubmissionRecord {
            id,
            method: metadata.method,
            payload,
        });
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ScriptStep::Hold);
        match step {
            ScriptStep::Reply(bytes) => completion(Ok(bytes)),
            ScriptStep::Fail(err) => completion(Err(err)),
            ScriptStep::Hold => {
                self.held.lock().unwrap().insert(id.0, completion);
            }
        }
        id
    }

    fn remove(&self, id: RequestId) -> bool {
        self.removed.lock().unwrap().push(id);
        if self.honor_removal.load(Ordering::SeqCst) {
            self.held.lock().unwrap().remove(&id.0).is_some()
        } else {
            false
        }
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }

    fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    fn finalize_session(&self) {
        self.finalized.store(true, Ordering::SeqCst);
    }
}

/// Factory handing out pre-built [`ScriptedTransport`]s in order, keeping
/// the event-injection side of each for the test.
pub struct ScriptedFactory {
    prepared: Mutex<VecDeque<(Arc<ScriptedTransport>, mpsc::UnboundedReceiver<TransportEvent>)>>,
    event_txs: Vec<mpsc::UnboundedSender<TransportEvent>>,
    opened: Mutex<Vec<TransportConfig>>,
}

impl ScriptedFactory {
    pub fn new(transport: Arc<ScriptedTransport>) -> Self {
        Self::with_transports(vec![transport])
    }

    /// One transport per expected `open` call, handed out front to back.
    pub fn with_transports(transports: Vec<Arc<ScriptedTransport>>) -> Self {
        let mut prepared = VecDeque::new();
        let mut event_txs = Vec::new();
        for transport in transports {
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            prepared.push_back((transport, event_rx));
            event_txs.push(event_tx);
        }
        Self {
            prepared: Mutex::new(prepared),
            event_txs,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Sender for injecting transport events (e.g. authorization-required)
    /// into the first transport.
    pub fn events(&self) -> mpsc::UnboundedSender<TransportEvent> {
        self.events_for(0)
    }

    /// Event sender for the n-th prepared transport.
    pub fn events_for(&self, index: usize) -> mpsc::UnboundedSender<TransportEvent> {
        self.event_txs[index].clone()
    }

    /// The config the first session opened its transport with.
    pub fn opened_with(&self) -> Option<TransportConfig> {
        self.opened.lock().unwrap().first().cloned()
    }

    /// Every transport config opened so far, in order.
    pub fn opened(&self) -> Vec<TransportConfig> {
        self.opened.lock().unwrap().clone()
    }
}

impl TransportFactory for ScriptedFactory {
    fn open(
        &self,
        config: &TransportConfig,
    ) -> (Arc<dyn Transport>, mpsc::UnboundedReceiver<TransportEvent>) {
        self.opened.lock().unwrap().push(config.clone());
        let (transport, rx) = self
            .prepared
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted transport prepared for this open");
        (transport, rx)
    }
}

/// Records every invalidate/request call; tests supply tokens back through
/// `Session::supply_auth_token`.
#[derive(Default)]
pub struct RecordingAuthContext {
    invalidated: Mutex<Vec<i32>>,
    requested: Mutex<Vec<(i32, Option<AuthToken>, i32)>>,
}

impl RecordingAuthContext {
    pub fn invalidated(&self) -> Vec<i32> {
        self.invalidated.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<(i32, Option<AuthToken>, i32)> {
        self.requested.lock().unwrap().clone()
    }
}

impl AuthContext for RecordingAuthContext {
    fn invalidate_token(&self, datacenter_id: i32) {
        self.invalidated.lock().unwrap().push(datacenter_id);
    }

    fn request_token(
        &self,
        datacenter_id: i32,
        required: Option<AuthToken>,
        master_datacenter_id: i32,
    ) {
        self.requested
            .lock()
            .unwrap()
            .push((datacenter_id, required, master_datacenter_id));
    }
}
