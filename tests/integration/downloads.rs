//! File-part and web-file download behavior: alignment, retry-until-success,
//! CDN redirects.

use std::time::Duration;

use bytes::Bytes;
use dcmux_core::files::{CdnRedirect, FileResult, InputFileLocation, InputWebFileLocation, WebFile};
use dcmux_session::testkit::ScriptStep;
use dcmux_session::DownloadedPart;

use crate::{master_config, start};

fn location() -> InputFileLocation {
    InputFileLocation {
        volume_id: 100,
        local_id: 7,
        secret: 0x5eccec,
    }
}

fn web_location() -> InputWebFileLocation {
    InputWebFileLocation {
        url: "https://example.org/photo.jpg".into(),
        access_hash: 4242,
    }
}

fn part_reply(bytes: &[u8]) -> ScriptStep {
    ScriptStep::reply_json(&FileResult::Part {
        bytes: bytes.to_vec(),
    })
}

#[tokio::test]
async fn part_retries_until_success_with_identical_payload() {
    let h = start(
        master_config(),
        vec![
            ScriptStep::Fail(dcmux_core::RpcError::new(-503, "Timeout")),
            ScriptStep::Fail(dcmux_core::RpcError::new(500, "INTERNAL")),
            part_reply(b"part-data"),
        ],
    );

    let outcome = h.session.part(&location(), 0, 1024).await;
    assert_eq!(outcome, DownloadedPart::Data(Bytes::from_static(b"part-data")));

    let submissions = h.transport.submissions();
    assert_eq!(submissions.len(), 3, "exactly one submission per attempt");
    assert_eq!(submissions[0].payload, submissions[1].payload);
    assert_eq!(submissions[1].payload, submissions[2].payload);
}

#[tokio::test]
async fn part_aligns_requested_length() {
    let h = start(master_config(), vec![part_reply(b"x")]);
    let _ = h.session.part(&location(), 8192, 5000).await;

    let payload: serde_json::Value =
        serde_json::from_slice(&h.transport.submissions()[0].payload).unwrap();
    assert_eq!(payload["method"], "upload.getFile");
    assert_eq!(payload["offset"], 8192);
    // 5000 rounds up to 8192, the next valid divisor of the maximum block.
    assert_eq!(payload["limit"], 8192);
}

#[tokio::test]
async fn cdn_redirect_is_surfaced_not_followed() {
    let redirect = CdnRedirect {
        dc_id: 4,
        file_token: vec![0x11; 16],
        encryption_key: vec![0x22; 32],
        encryption_iv: vec![0x33; 16],
    };
    let h = start(
        master_config(),
        vec![ScriptStep::reply_json(&FileResult::CdnRedirect(
            redirect.clone(),
        ))],
    );

    let outcome = h.session.part(&location(), 0, 4096).await;
    assert_eq!(outcome, DownloadedPart::CdnRedirect(redirect));
    assert_eq!(h.transport.submission_count(), 1, "redirect must not be auto-followed");
}

#[tokio::test]
async fn undecodable_part_response_is_retried() {
    let h = start(
        master_config(),
        vec![
            ScriptStep::Reply(Bytes::from_static(b"not a file result")),
            part_reply(b"good"),
        ],
    );
    let outcome = h.session.part(&location(), 0, 4096).await;
    assert_eq!(outcome, DownloadedPart::Data(Bytes::from_static(b"good")));
    assert_eq!(h.transport.submission_count(), 2);
}

#[tokio::test]
async fn part_with_no_answer_stays_pending() {
    // Empty script: the request is held forever. The download contract has
    // no failure path; bounded waiting is the caller's timeout.
    let h = start(master_config(), vec![]);
    let waited =
        tokio::time::timeout(Duration::from_millis(50), h.session.part(&location(), 0, 4096))
            .await;
    assert!(waited.is_err(), "part must stay pending, not fail");
}

#[tokio::test]
async fn web_file_part_returns_bytes() {
    let h = start(
        master_config(),
        vec![ScriptStep::reply_json(&WebFile {
            size: 4,
            mime_type: "image/jpeg".into(),
            bytes: b"jpeg".to_vec(),
        })],
    );
    let bytes = h.session.web_file_part(&web_location(), 0, 100).await;
    assert_eq!(bytes, Bytes::from_static(b"jpeg"));

    let payload: serde_json::Value =
        serde_json::from_slice(&h.transport.submissions()[0].payload).unwrap();
    assert_eq!(payload["method"], "upload.getWebFile");
    assert_eq!(payload["limit"], 4096);
}

#[tokio::test]
async fn web_file_part_retries_on_error() {
    let h = start(
        master_config(),
        vec![
            ScriptStep::Fail(dcmux_core::RpcError::new(500, "INTERNAL")),
            ScriptStep::reply_json(&WebFile {
                size: 2,
                mime_type: "text/plain".into(),
                bytes: b"ok".to_vec(),
            }),
        ],
    );
    let bytes = h.session.web_file_part(&web_location(), 0, 4096).await;
    assert_eq!(bytes, Bytes::from_static(b"ok"));
    assert_eq!(h.transport.submission_count(), 2);
}
