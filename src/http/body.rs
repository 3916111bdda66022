//! Response body that reports when it has been fully produced.
//!
//! The instrumentation middleware finishes its bookkeeping only once the
//! response body reaches end-of-stream. A body that is dropped early
//! (client went away) or fails mid-stream never reports completion.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use http_body::{Body as HttpBody, Frame, SizeHint};

type OnComplete = Box<dyn FnOnce() + Send + 'static>;

/// Wraps a body and runs a callback exactly once at end-of-stream.
pub struct CompletionBody {
    inner: Body,
    on_complete: Option<OnComplete>,
}

impl CompletionBody {
    pub fn new<F>(inner: Body, on_complete: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let mut body = Self {
            inner,
            on_complete: Some(Box::new(on_complete)),
        };
        // Empty bodies may never be polled
        if body.inner.is_end_stream() {
            body.complete();
        }
        body
    }

    fn complete(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete();
        }
    }
}

impl HttpBody for CompletionBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(None) => this.complete(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.complete(),
            Poll::Ready(Some(Err(_))) => {
                this.on_complete = None;
            }
            _ => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl fmt::Debug for CompletionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionBody")
            .field("pending", &self.on_complete.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let hook = count.clone();
        (count, move || {
            hook.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_completes_once_after_body_is_read() {
        let (count, hook) = counter();
        let body = CompletionBody::new(Body::from("hello"), hook);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let bytes = axum::body::to_bytes(Body::new(body), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_body_completes_immediately() {
        let (count, hook) = counter();
        let body = CompletionBody::new(Body::empty(), hook);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let _ = axum::body::to_bytes(Body::new(body), usize::MAX).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_body_never_completes() {
        let (count, hook) = counter();
        let body = CompletionBody::new(Body::from("never read"), hook);
        drop(body);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
