//! File-part upload behavior: call-shape selection, error classification,
//! no automatic retry.

use bytes::Bytes;
use dcmux_core::files::BigTotalParts;
use dcmux_core::{RpcError, UploadPartError};
use dcmux_session::testkit::ScriptStep;
use dcmux_session::UploadPartKind;

use crate::{master_config, start};

#[tokio::test]
async fn small_part_upload_succeeds() {
    let h = start(master_config(), vec![ScriptStep::reply_json(&true)]);
    h.session
        .upload_part(77, 0, Bytes::from_static(b"chunk"), UploadPartKind::Small)
        .await
        .unwrap();

    let payload: serde_json::Value =
        serde_json::from_slice(&h.transport.submissions()[0].payload).unwrap();
    assert_eq!(payload["method"], "upload.saveFilePart");
    assert_eq!(payload["file_id"], 77);
    assert_eq!(payload["file_part"], 0);
    assert_eq!(payload["bytes"], "6368756e6b");
}

#[tokio::test]
async fn big_part_upload_encodes_known_total() {
    let h = start(master_config(), vec![ScriptStep::reply_json(&true)]);
    h.session
        .upload_part(
            77,
            3,
            Bytes::from_static(b"c"),
            UploadPartKind::Big {
                total_parts: BigTotalParts::Known(8),
            },
        )
        .await
        .unwrap();

    let payload: serde_json::Value =
        serde_json::from_slice(&h.transport.submissions()[0].payload).unwrap();
    assert_eq!(payload["method"], "upload.saveBigFilePart");
    assert_eq!(payload["file_total_parts"], 8);
}

#[tokio::test]
async fn big_part_upload_unknown_total_is_minus_one() {
    let h = start(master_config(), vec![ScriptStep::reply_json(&true)]);
    h.session
        .upload_part(
            77,
            0,
            Bytes::from_static(b"c"),
            UploadPartKind::Big {
                total_parts: BigTotalParts::Unknown,
            },
        )
        .await
        .unwrap();

    let payload: serde_json::Value =
        serde_json::from_slice(&h.transport.submissions()[0].payload).unwrap();
    assert_eq!(payload["file_total_parts"], -1);
}

#[tokio::test]
async fn code_400_is_invalid_media() {
    let h = start(
        master_config(),
        vec![ScriptStep::Fail(RpcError::new(400, "FILE_PART_INVALID"))],
    );
    let err = h
        .session
        .upload_part(77, 0, Bytes::from_static(b"c"), UploadPartKind::Small)
        .await
        .unwrap_err();
    assert_eq!(err, UploadPartError::InvalidMedia);
}

#[tokio::test]
async fn any_other_code_is_generic() {
    let h = start(
        master_config(),
        vec![ScriptStep::Fail(RpcError::new(-503, "Timeout"))],
    );
    let err = h
        .session
        .upload_part(77, 0, Bytes::from_static(b"c"), UploadPartKind::Small)
        .await
        .unwrap_err();
    assert_eq!(err, UploadPartError::Generic);
}

#[tokio::test]
async fn uploads_are_never_retried_automatically() {
    let h = start(
        master_config(),
        vec![ScriptStep::Fail(RpcError::new(500, "INTERNAL"))],
    );
    let _ = h
        .session
        .upload_part(77, 0, Bytes::from_static(b"c"), UploadPartKind::Small)
        .await;
    assert_eq!(h.transport.submission_count(), 1);
}
