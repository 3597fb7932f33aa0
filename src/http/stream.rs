//! Response body streaming.
//!
//! # Responsibilities
//! - Relay known-length bodies untouched
//! - Relay streamed bodies in bounded blocks, flushing promptly
//! - Release the backend connection when the body ends or is dropped
//!
//! # Design Decisions
//! - The server flushes whenever the body is not ready. When the upstream
//!   has nothing buffered, that happens on its own. When the proxy is
//!   decompressing, the body yields once after every block so each block
//!   is flushed.
//! - Dropping the body closes the backend response; a client that goes
//!   away mid-stream therefore terminates the backend read.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;

use crate::net::ConnectionLease;

/// Boxed error type for streamed bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Type-erased backend body.
pub type BackendBody = UnsyncBoxBody<Bytes, BoxError>;

/// Largest block handed to the server in one frame when streaming.
pub const BLOCK_SIZE: usize = 10 * 1024;

/// How a backend body is copied to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Known length: relay frames as they come.
    Bulk,
    /// Streamed: relay in blocks of at most [`BLOCK_SIZE`].
    Blocks {
        /// Yield after every block so it is flushed immediately.
        flush_each_block: bool,
    },
}

impl CopyMode {
    /// Pick the mode for a backend body.
    pub fn select(chunked: bool, exact_len: Option<u64>, handle_compression: bool) -> Self {
        if !chunked && exact_len.is_some() {
            Self::Bulk
        } else {
            Self::Blocks {
                flush_each_block: handle_compression,
            }
        }
    }
}

/// Client-facing body that streams a backend response.
pub struct ProxyBody {
    inner: BackendBody,
    mode: CopyMode,
    pending: Option<Bytes>,
    yield_before_next: bool,
    finished: bool,
    bytes_sent: u64,
    // Held until the body is finished or dropped.
    _lease: Option<ConnectionLease>,
}

impl ProxyBody {
    pub fn new(inner: BackendBody, mode: CopyMode, lease: Option<ConnectionLease>) -> Self {
        Self {
            inner,
            mode,
            pending: None,
            yield_before_next: false,
            finished: false,
            bytes_sent: 0,
            _lease: lease,
        }
    }

    fn next_block(&mut self) -> Option<Bytes> {
        let mut rest = self.pending.take()?;
        let block = if rest.len() > BLOCK_SIZE {
            let block = rest.split_to(BLOCK_SIZE);
            self.pending = Some(rest);
            block
        } else {
            rest
        };
        if let CopyMode::Blocks {
            flush_each_block: true,
        } = self.mode
        {
            self.yield_before_next = true;
        }
        self.bytes_sent += block.len() as u64;
        Some(block)
    }
}

impl HttpBody for ProxyBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        loop {
            if this.yield_before_next {
                this.yield_before_next = false;
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }

            if let Some(block) = this.next_block() {
                return Poll::Ready(Some(Ok(Frame::data(block))));
            }

            match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) if data.is_empty() => continue,
                    Ok(data) => {
                        if this.mode == CopyMode::Bulk {
                            this.bytes_sent += data.len() as u64;
                            return Poll::Ready(Some(Ok(Frame::data(data))));
                        }
                        this.pending = Some(data);
                    }
                    Err(frame) => return Poll::Ready(Some(Ok(frame))),
                },
                Some(Err(e)) => {
                    tracing::warn!(error = %e, bytes_sent = this.bytes_sent, "Backend body failed mid-stream");
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.pending.is_none() && self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        let mut hint = self.inner.size_hint();
        if let Some(pending) = &self.pending {
            let extra = pending.len() as u64;
            hint.set_lower(hint.lower() + extra);
            if let Some(upper) = hint.upper() {
                hint.set_upper(upper + extra);
            }
        }
        hint
    }
}

impl Drop for ProxyBody {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                bytes_sent = self.bytes_sent,
                "Client went away before the response completed; closing backend response"
            );
        }
    }
}
