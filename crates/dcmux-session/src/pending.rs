//! Caller-side handles for in-flight requests.
//!
//! Dropping a handle before completion is the cancellation path: the guard
//! asks the driver to best-effort remove the request, and any late
//! completion lands in a closed oneshot, so the caller never observes it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use dcmux_core::{DecodeFn, RpcError};

use crate::driver::Command;

pub(crate) struct CancelGuard {
    id: u64,
    cmd_tx: mpsc::UnboundedSender<Command>,
    armed: bool,
}

impl CancelGuard {
    pub(crate) fn new(id: u64, cmd_tx: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            id,
            cmd_tx,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.cmd_tx.send(Command::Cancel { id: self.id });
        }
    }
}

/// One in-flight typed call. Resolves to the decoded response, the verbatim
/// transport error, or a verification error if the response bytes do not
/// match the expected shape. Dropping it cancels the request.
pub struct PendingRequest<T> {
    rx: oneshot::Receiver<Result<Bytes, RpcError>>,
    decode: DecodeFn<T>,
    method: &'static str,
    guard: CancelGuard,
}

impl<T> PendingRequest<T> {
    pub(crate) fn new(
        rx: oneshot::Receiver<Result<Bytes, RpcError>>,
        decode: DecodeFn<T>,
        method: &'static str,
        guard: CancelGuard,
    ) -> Self {
        Self {
            rx,
            decode,
            method,
            guard,
        }
    }
}

impl<T> Future for PendingRequest<T> {
    type Output = Result<T, RpcError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(outcome) => {
                this.guard.disarm();
                Poll::Ready(match outcome {
                    Ok(Ok(bytes)) => {
                        (this.decode)(&bytes).ok_or_else(|| RpcError::verification(this.method))
                    }
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(RpcError::session_closed()),
                })
            }
        }
    }
}

/// One in-flight raw call with a caller-supplied parser.
///
/// Resolves to `Ok(None)` when the parser yields nothing — which is not
/// distinguishable from an empty response. Callers that need to tell
/// malformed data apart from missing data should use a typed
/// [`PendingRequest`] instead.
pub struct RawPendingRequest<T> {
    rx: oneshot::Receiver<Result<Bytes, RpcError>>,
    parser: Box<dyn Fn(&[u8]) -> Option<T> + Send>,
    guard: CancelGuard,
}

impl<T> RawPendingRequest<T> {
    pub(crate) fn new(
        rx: oneshot::Receiver<Result<Bytes, RpcError>>,
        parser: Box<dyn Fn(&[u8]) -> Option<T> + Send>,
        guard: CancelGuard,
    ) -> Self {
        Self { rx, parser, guard }
    }
}

impl<T> Future for RawPendingRequest<T> {
    type Output = Result<Option<T>, RpcError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(outcome) => {
                this.guard.disarm();
                Poll::Ready(match outcome {
                    Ok(Ok(bytes)) => Ok((this.parser)(&bytes)),
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(RpcError::session_closed()),
                })
            }
        }
    }
}
