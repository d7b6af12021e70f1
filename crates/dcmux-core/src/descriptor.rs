//! Remote-call descriptors — the typed encode/decode pair bound to one
//! remote-call shape. The session treats payloads as opaque bytes; the
//! decode capability turns response bytes back into a typed value.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

/// Diagnostic identity of one remote-call shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionDescription {
    pub method: &'static str,
}

impl FunctionDescription {
    pub const fn new(method: &'static str) -> Self {
        Self { method }
    }
}

impl fmt::Display for FunctionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method)
    }
}

/// Decode capability supplied per call. Returning `None` means the response
/// bytes do not match the expected shape — a typed outcome, never a panic.
pub type DecodeFn<T> = Arc<dyn Fn(&[u8]) -> Option<T> + Send + Sync>;

/// A fully-serialized remote call: what to send, and how to read the answer.
pub struct RemoteCall<T> {
    pub description: FunctionDescription,
    pub payload: Bytes,
    pub decode: DecodeFn<T>,
}

impl<T> RemoteCall<T> {
    pub fn new(
        description: FunctionDescription,
        payload: Bytes,
        decode: impl Fn(&[u8]) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            description,
            payload,
            decode: Arc::new(decode),
        }
    }
}

impl<T> Clone for RemoteCall<T> {
    fn clone(&self) -> Self {
        Self {
            description: self.description,
            payload: self.payload.clone(),
            decode: self.decode.clone(),
        }
    }
}

impl<T> fmt::Debug for RemoteCall<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCall")
            .field("description", &self.description)
            .field("payload_len", &self.payload.len())
            .finish_non_exhaustive()
    }
}
