//! Call shapes for the file-part operations the session issues itself.
//!
//! Payloads are serde_json-encoded with binary fields hex-encoded. Once
//! built, a payload is opaque to the session — only the remote end and the
//! decode capability ever look inside.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::descriptor::{FunctionDescription, RemoteCall};

pub const GET_FILE: FunctionDescription = FunctionDescription::new("upload.getFile");
pub const GET_WEB_FILE: FunctionDescription = FunctionDescription::new("upload.getWebFile");
pub const SAVE_FILE_PART: FunctionDescription = FunctionDescription::new("upload.saveFilePart");
pub const SAVE_BIG_FILE_PART: FunctionDescription =
    FunctionDescription::new("upload.saveBigFilePart");

/// Storage location of a file part on the remote end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFileLocation {
    pub volume_id: i64,
    pub local_id: i32,
    pub secret: i64,
}

/// Location of externally-hosted (non-datacenter) file content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputWebFileLocation {
    pub url: String,
    pub access_hash: i64,
}

/// Response to `upload.getFile`: either the bytes themselves, or a redirect
/// to a CDN datacenter. The redirect is handed back to the caller, never
/// followed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileResult {
    Part {
        #[serde(with = "hex")]
        bytes: Vec<u8>,
    },
    CdnRedirect(CdnRedirect),
}

/// Everything a higher layer needs to re-issue a part fetch against the
/// indicated CDN datacenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnRedirect {
    pub dc_id: i32,
    #[serde(with = "hex")]
    pub file_token: Vec<u8>,
    #[serde(with = "hex")]
    pub encryption_key: Vec<u8>,
    #[serde(with = "hex")]
    pub encryption_iv: Vec<u8>,
}

/// Response to `upload.getWebFile`. No redirect case exists for web files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebFile {
    pub size: u32,
    pub mime_type: String,
    #[serde(with = "hex")]
    pub bytes: Vec<u8>,
}

/// Total part count for a big-file upload. Encoded as -1 on the wire when
/// unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigTotalParts {
    Known(i32),
    Unknown,
}

impl BigTotalParts {
    pub fn encoded(self) -> i32 {
        match self {
            BigTotalParts::Known(n) => n,
            BigTotalParts::Unknown => -1,
        }
    }
}

#[derive(Serialize)]
struct GetFileArgs<'a> {
    method: &'static str,
    location: &'a InputFileLocation,
    offset: u64,
    limit: u32,
}

#[derive(Serialize)]
struct GetWebFileArgs<'a> {
    method: &'static str,
    location: &'a InputWebFileLocation,
    offset: u64,
    limit: u32,
}

#[derive(Serialize)]
struct SaveFilePartArgs<'a> {
    method: &'static str,
    file_id: i64,
    file_part: i32,
    #[serde(with = "hex")]
    bytes: &'a [u8],
}

#[derive(Serialize)]
struct SaveBigFilePartArgs<'a> {
    method: &'static str,
    file_id: i64,
    file_part: i32,
    file_total_parts: i32,
    #[serde(with = "hex")]
    bytes: &'a [u8],
}

pub fn get_file(location: &InputFileLocation, offset: u64, limit: u32) -> RemoteCall<FileResult> {
    RemoteCall::new(
        GET_FILE,
        encode(&GetFileArgs {
            method: GET_FILE.method,
            location,
            offset,
            limit,
        }),
        decode_json::<FileResult>,
    )
}

pub fn get_web_file(
    location: &InputWebFileLocation,
    offset: u64,
    limit: u32,
) -> RemoteCall<WebFile> {
    RemoteCall::new(
        GET_WEB_FILE,
        encode(&GetWebFileArgs {
            method: GET_WEB_FILE.method,
            location,
            offset,
            limit,
        }),
        decode_json::<WebFile>,
    )
}

pub fn save_file_part(file_id: i64, file_part: i32, bytes: &[u8]) -> RemoteCall<bool> {
    RemoteCall::new(
        SAVE_FILE_PART,
        encode(&SaveFilePartArgs {
            method: SAVE_FILE_PART.method,
            file_id,
            file_part,
            bytes,
        }),
        decode_json::<bool>,
    )
}

pub fn save_big_file_part(
    file_id: i64,
    file_part: i32,
    total_parts: BigTotalParts,
    bytes: &[u8],
) -> RemoteCall<bool> {
    RemoteCall::new(
        SAVE_BIG_FILE_PART,
        encode(&SaveBigFilePartArgs {
            method: SAVE_BIG_FILE_PART.method,
            file_id,
            file_part,
            file_total_parts: total_parts.encoded(),
            bytes,
        }),
        decode_json::<bool>,
    )
}

// Call shapes are plain data — integers, strings, hex blobs. A serialization
// failure here is a programmer error caught by the tests below, not a
// runtime condition.
fn encode<A: Serialize>(args: &A) -> Bytes {
    Bytes::from(serde_json::to_vec(args).expect("call shape serializes infallibly"))
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    serde_json::from_slice(bytes).ok()
}
