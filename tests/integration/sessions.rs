//! Session lifecycle: the authorization gate, transport-driven token
//! refresh, connectivity pause/resume, and teardown finality.

use bytes::Bytes;
use dcmux_core::{FunctionDescription, RemoteCall, RpcError};
use dcmux_session::testkit::ScriptStep;
use dcmux_session::TransportEvent;

use crate::{master_config, settle, start, worker_config};

fn tagged_call(tag: &'static str) -> RemoteCall<String> {
    RemoteCall::new(
        FunctionDescription::new(tag),
        Bytes::from(format!("{{\"tag\":\"{tag}\"}}")),
        |bytes| serde_json::from_slice::<String>(bytes).ok(),
    )
}

#[tokio::test]
async fn worker_session_requests_token_at_activation() {
    let h = start(worker_config(), vec![]);
    settle().await;

    assert_eq!(h.auth.requests(), vec![(2, Some(2), 1)]);

    let opened = h.factory.opened_with().unwrap();
    assert_eq!(opened.datacenter_id, 2);
    assert_eq!(opened.required_auth_token, Some(2));
    assert_eq!(opened.master_datacenter_id, Some(1));
}

#[tokio::test]
async fn auth_gate_holds_requests_and_flushes_in_order() {
    let h = start(worker_config(), vec![]);

    let first = h.session.request(tagged_call("w.first"));
    let second = h.session.request(tagged_call("w.second"));
    let third = h.session.request(tagged_call("w.third"));
    settle().await;

    assert_eq!(
        h.transport.submission_count(),
        0,
        "nothing may reach the transport before the token arrives"
    );

    h.session.supply_auth_token(2);
    settle().await;

    let methods: Vec<_> = h
        .transport
        .submissions()
        .iter()
        .map(|s| s.method)
        .collect();
    assert_eq!(methods, vec!["w.first", "w.second", "w.third"]);

    // Keep the handles alive through the flush; dropping earlier would have
    // cancelled the queued requests.
    drop((first, second, third));
}

#[tokio::test]
async fn master_session_is_not_gated() {
    let h = start(master_config(), vec![]);
    let _handle = h.session.request(tagged_call("m.call"));
    settle().await;
    assert_eq!(h.transport.submission_count(), 1);
    assert!(h.auth.requests().is_empty());
}

#[tokio::test]
async fn cdn_session_is_exempt_from_token_requirement() {
    let mut config = worker_config();
    config.is_cdn = true;
    let h = start(config, vec![]);

    let _handle = h.session.request(tagged_call("cdn.call"));
    settle().await;

    assert_eq!(h.transport.submission_count(), 1);
    assert!(h.auth.requests().is_empty());
    assert_eq!(h.factory.opened_with().unwrap().required_auth_token, None);
}

#[tokio::test]
async fn authorization_required_refreshes_token_without_dropping_queue() {
    let h = start(worker_config(), vec![]);
    h.session.supply_auth_token(2);
    settle().await;

    // Gate is open; a request flows straight through.
    let _inflight = h.session.request(tagged_call("w.before"));
    settle().await;
    assert_eq!(h.transport.submission_count(), 1);

    // The transport reports a stale token.
    h.factory
        .events()
        .send(TransportEvent::AuthorizationRequired)
        .unwrap();
    settle().await;

    assert_eq!(h.auth.invalidated(), vec![2]);
    assert_eq!(h.auth.requests().len(), 2, "fresh token requested");

    // New submissions queue behind the re-raised gate...
    let queued = h.session.request(tagged_call("w.queued"));
    settle().await;
    assert_eq!(h.transport.submission_count(), 1);

    // ...and survive the refresh round-trip.
    h.session.supply_auth_token(2);
    settle().await;
    assert_eq!(h.transport.submission_count(), 2);
    assert_eq!(h.transport.submissions()[1].method, "w.queued");

    drop(queued);
}

#[tokio::test]
async fn auth_queue_overflow_fails_fast() {
    let mut config = worker_config();
    config.max_queued_requests = 2;
    let h = start(config, vec![]);

    let first = h.session.request(tagged_call("w.1"));
    let second = h.session.request(tagged_call("w.2"));
    let overflow = h.session.request(tagged_call("w.3"));

    let err = overflow.await.unwrap_err();
    assert_eq!(err, RpcError::new(0, "REQUEST_QUEUE_FULL"));
    assert_eq!(h.transport.submission_count(), 0);

    drop((first, second));
}

#[tokio::test]
async fn teardown_halts_transport_and_resolves_outstanding_requests() {
    let h = start(master_config(), vec![]);
    let handle = h.session.request(tagged_call("m.inflight"));
    settle().await;
    let id = h.transport.submissions()[0].id;

    drop(h.session);

    let err = handle.await.unwrap_err();
    assert!(err.is_session_closed());
    settle().await;

    assert!(h.transport.is_halted());
    assert!(h.transport.is_finalized());

    // A late completion from the transport lands in a closed channel.
    assert!(h.transport.complete_held(id, Ok(Bytes::from_static(b"\"late\""))));
    settle().await;
}

#[tokio::test]
async fn connectivity_transitions_are_deduplicated() {
    let h = start(master_config(), vec![]);
    settle().await;
    // The initial `true` is applied once.
    assert_eq!(h.transport.resume_count(), 1);
    assert_eq!(h.transport.pause_count(), 0);

    h.keep_tx.send(true).unwrap();
    settle().await;
    assert_eq!(h.transport.resume_count(), 1, "repeat value is a no-op");

    h.keep_tx.send(false).unwrap();
    settle().await;
    assert_eq!(h.transport.pause_count(), 1);

    h.keep_tx.send(false).unwrap();
    settle().await;
    assert_eq!(h.transport.pause_count(), 1);

    h.keep_tx.send(true).unwrap();
    settle().await;
    assert_eq!(h.transport.resume_count(), 2);
}
