//! Worker ceiling for the native transport
//!
//! Caps the calls in flight across all connections. A call holds its permit
//! until its response body is dropped, so a streaming call counts against
//! the ceiling for as long as it is producing answers, not only until the
//! response head is sent.

use futures::future::BoxFuture;
use http::{Request, Response};
use http_body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tower::{Layer, Service, ServiceExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Layer sharing one pool of `worker_count` permits across every call
#[derive(Debug, Clone)]
pub struct WorkerCeilingLayer {
    permits: Arc<Semaphore>,
}

impl WorkerCeilingLayer {
    /// Allow at most `worker_count` calls in flight
    pub fn new(worker_count: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(worker_count.min(Semaphore::MAX_PERMITS))),
        }
    }

    /// Permits not currently held by a call
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl<S> Layer<S> for WorkerCeilingLayer {
    type Service = WorkerCeiling<S>;

    fn layer(&self, inner: S) -> Self::Service {
        WorkerCeiling {
            inner,
            permits: Arc::clone(&self.permits),
        }
    }
}

/// Service produced by [`WorkerCeilingLayer`]
#[derive(Debug, Clone)]
pub struct WorkerCeiling<S> {
    inner: S,
    permits: Arc<Semaphore>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for WorkerCeiling<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    ReqBody: Send + 'static,
{
    type Response = Response<PermitBody<ResBody>>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness is awaited per call, after the permit is taken
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let permits = Arc::clone(&self.permits);
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let permit = permits.acquire_owned().await?;
            let response = inner.oneshot(request).await.map_err(Into::into)?;
            Ok(response.map(|body| PermitBody {
                inner: body,
                _permit: permit,
            }))
        })
    }
}

/// Response body that releases its call's permit when dropped
#[derive(Debug)]
pub struct PermitBody<B> {
    inner: B,
    _permit: OwnedSemaphorePermit,
}

impl<B> Body for PermitBody<B>
where
    B: Body + Unpin,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
