//! dcmux integration scenarios.
//!
//! Every test drives a real `Session` (driver task, gate, registry) against
//! the scripted transport from `dcmux_session::testkit` — no network, fully
//! deterministic on the current-thread test runtime.

use std::sync::Arc;

use tokio::sync::watch;

use dcmux_core::RetryPolicy;
use dcmux_session::testkit::{
    RecordingAuthContext, ScriptStep, ScriptedFactory, ScriptedTransport,
};
use dcmux_session::{Session, SessionConfig};

mod downloads;
mod sessions;
mod uploads;

// ── Harness ───────────────────────────────────────────────────────────────────

pub struct Harness {
    pub session: Session,
    pub transport: Arc<ScriptedTransport>,
    pub factory: ScriptedFactory,
    pub auth: Arc<RecordingAuthContext>,
    pub keep_tx: watch::Sender<bool>,
}

/// Session bound to the master datacenter — no authorization gate.
pub fn master_config() -> SessionConfig {
    let mut config = SessionConfig::new(1, 1);
    config.retry = RetryPolicy::immediate();
    config
}

/// Session bound to a non-master datacenter — gated until a token arrives.
pub fn worker_config() -> SessionConfig {
    let mut config = SessionConfig::new(2, 1);
    config.retry = RetryPolicy::immediate();
    config
}

/// Spin up a session against a scripted transport. Must run on a tokio
/// runtime; the connectivity signal starts at `true`.
pub fn start(config: SessionConfig, script: Vec<ScriptStep>) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let transport = ScriptedTransport::new(script);
    let factory = ScriptedFactory::new(transport.clone());
    let auth = Arc::new(RecordingAuthContext::default());
    let (keep_tx, keep_rx) = watch::channel(true);
    let session = Session::new(config, &factory, auth.clone(), keep_rx);
    Harness {
        session,
        transport,
        factory,
        auth,
        keep_tx,
    }
}

/// Let the driver task drain everything queued on its command channel.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
