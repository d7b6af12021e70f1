//! Lazily-created sessions, one per datacenter flavor, shared by callers.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use dcmux_core::{MuxConfig, RetryPolicy};

use crate::auth::AuthContext;
use crate::session::{Session, SessionConfig};
use crate::transport::TransportFactory;

/// Datacenter id plus the CDN and media flags; each combination gets its
/// own transport and driver.
type PoolKey = (i32, bool, bool);

/// Hands out [`Session`]s on demand and keeps them alive for reuse. All
/// sessions share the transport factory, the authorization context, and
/// the connectivity signal; retry shaping and queue bounds are applied
/// uniformly from loaded configuration.
pub struct SessionPool {
    sessions: DashMap<PoolKey, Arc<Session>>,
    factory: Arc<dyn TransportFactory>,
    auth: Arc<dyn AuthContext>,
    should_keep_connection: watch::Receiver<bool>,
    master_datacenter_id: i32,
    retry: RetryPolicy,
    max_queued_requests: usize,
}

impl SessionPool {
    pub fn new(
        master_datacenter_id: i32,
        factory: Arc<dyn TransportFactory>,
        auth: Arc<dyn AuthContext>,
        should_keep_connection: watch::Receiver<bool>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            factory,
            auth,
            should_keep_connection,
            master_datacenter_id,
            retry: RetryPolicy::default(),
            max_queued_requests: 1024,
        }
    }

    /// Apply loaded configuration to every session created from here on.
    pub fn tuned(mut self, config: &MuxConfig) -> Self {
        self.retry = RetryPolicy::from(&config.retry);
        self.max_queued_requests = config.limits.max_queued_requests;
        self
    }

    /// The session for a datacenter, creating it on first use. Later calls
    /// with the same id and flags return the same session.
    pub fn session(&self, datacenter_id: i32, is_cdn: bool, is_media: bool) -> Arc<Session> {
        self.sessions
            .entry((datacenter_id, is_cdn, is_media))
            .or_insert_with(|| {
                tracing::debug!(datacenter_id, is_cdn, is_media, "opening datacenter session");
                let mut config = SessionConfig::new(datacenter_id, self.master_datacenter_id);
                config.is_cdn = is_cdn;
                config.is_media = is_media;
                config.retry = self.retry.clone();
                config.max_queued_requests = self.max_queued_requests;
                Arc::new(Session::new(
                    config,
                    self.factory.as_ref(),
                    self.auth.clone(),
                    self.should_keep_connection.clone(),
                ))
            })
            .clone()
    }

    /// Discard a pooled session. Teardown happens once the last caller
    /// handle is dropped; a later `session` call opens a fresh transport.
    pub fn drop_session(&self, datacenter_id: i32, is_cdn: bool, is_media: bool) -> bool {
        self.sessions
            .remove(&(datacenter_id, is_cdn, is_media))
            .is_some()
    }
}
