//! Header compatibility fixes for gRPC-Web clients and proxies
//!
//! Each fix is a [`HeaderTransform`] stage. Stages are composed into a
//! [`TransformChain`] at startup: request headers pass through the stages in
//! the order they were added, response headers in the reverse order. Stages
//! only rewrite headers and never reject a request.

use futures::future::BoxFuture;
use http::header::{HeaderMap, HeaderValue, ACCEPT, ACCESS_CONTROL_ALLOW_ORIGIN};
use http::{Request, Response};
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::trace;

use crate::frame::Encoding;

/// A header rewriting stage
pub trait HeaderTransform: Send + Sync {
    /// Stage name, used in logs
    fn name(&self) -> &'static str;

    /// Rewrite inbound headers
    fn on_request(&self, _headers: &mut HeaderMap) {}

    /// Rewrite outbound headers
    fn on_response(&self, _headers: &mut HeaderMap) {}
}

/// Replaces a missing or wildcard `accept` with the canonical gRPC-Web type
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptNegotiation;

impl HeaderTransform for AcceptNegotiation {
    fn name(&self) -> &'static str {
        "accept-negotiation"
    }

    fn on_request(&self, headers: &mut HeaderMap) {
        let needs_fix = match headers.get(ACCEPT) {
            None => true,
            Some(value) => value.as_bytes().trim_ascii() == b"*/*",
        };
        if needs_fix {
            headers.insert(
                ACCEPT,
                HeaderValue::from_static(Encoding::BINARY_CONTENT_TYPE),
            );
        }
    }
}

/// Drops the allow-origin header set by the bridge
///
/// The cross-origin layer outside this chain sets the final value.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripAllowOrigin;

impl HeaderTransform for StripAllowOrigin {
    fn name(&self) -> &'static str {
        "strip-allow-origin"
    }

    fn on_response(&self, headers: &mut HeaderMap) {
        headers.remove(ACCESS_CONTROL_ALLOW_ORIGIN);
    }
}

/// Ordered list of header transforms
#[derive(Clone, Default)]
pub struct TransformChain {
    stages: Vec<Arc<dyn HeaderTransform>>,
}

impl TransformChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixes applied in front of the bridge
    pub fn compatibility() -> Self {
        Self::new().with(AcceptNegotiation).with(StripAllowOrigin)
    }

    /// Append a stage
    pub fn with(mut self, stage: impl HeaderTransform + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Stage names in request order
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the request side, first stage first
    pub fn apply_request(&self, headers: &mut HeaderMap) {
        for stage in &self.stages {
            stage.on_request(headers);
            trace!(stage = stage.name(), "Request headers transformed");
        }
    }

    /// Run the response side, last stage first
    pub fn apply_response(&self, headers: &mut HeaderMap) {
        for stage in self.stages.iter().rev() {
            stage.on_response(headers);
            trace!(stage = stage.name(), "Response headers transformed");
        }
    }
}

impl fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformChain")
            .field("stages", &self.names())
            .finish()
    }
}

/// Layer wrapping a service with a [`TransformChain`]
#[derive(Debug, Clone)]
pub struct CompatLayer {
    chain: Arc<TransformChain>,
}

impl CompatLayer {
    /// Wrap services with the given chain
    pub fn new(chain: TransformChain) -> Self {
        Self {
            chain: Arc::new(chain),
        }
    }
}

impl Default for CompatLayer {
    fn default() -> Self {
        Self::new(TransformChain::compatibility())
    }
}

impl<S> Layer<S> for CompatLayer {
    type Service = CompatService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CompatService {
            inner,
            chain: Arc::clone(&self.chain),
        }
    }
}

/// Service produced by [`CompatLayer`]
#[derive(Debug, Clone)]
pub struct CompatService<S> {
    inner: S,
    chain: Arc<TransformChain>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CompatService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        self.chain.apply_request(request.headers_mut());
        let future = self.inner.call(request);
        let chain = Arc::clone(&self.chain);

        Box::pin(async move {
            let mut response = future.await?;
            chain.apply_response(response.headers_mut());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Mutex;
    use tower::{service_fn, ServiceExt};

    /// Stage that records the order it runs in
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl HeaderTransform for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn on_request(&self, _headers: &mut HeaderMap) {
            self.log.lock().unwrap().push(format!("req:{}", self.name));
        }

        fn on_response(&self, _headers: &mut HeaderMap) {
            self.log.lock().unwrap().push(format!("res:{}", self.name));
        }
    }

    fn accept_after_fix(accept: Option<&'static str>) -> HeaderValue {
        let mut headers = HeaderMap::new();
        if let Some(value) = accept {
            headers.insert(ACCEPT, HeaderValue::from_static(value));
        }
        AcceptNegotiation.on_request(&mut headers);
        headers.get(ACCEPT).unwrap().clone()
    }

    #[test]
    fn test_accept_missing_or_wildcard_is_rewritten() {
        assert_eq!(accept_after_fix(None), "application/grpc-web+proto");
        assert_eq!(accept_after_fix(Some("*/*")), "application/grpc-web+proto");
    }

    #[test]
    fn test_explicit_accept_is_kept() {
        assert_eq!(
            accept_after_fix(Some("application/grpc-web-text")),
            "application/grpc-web-text"
        );
    }

    #[test]
    fn test_strip_allow_origin() {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("http://app.example"),
        );
        StripAllowOrigin.on_response(&mut headers);
        assert!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

        // Absent header is a no-op
        StripAllowOrigin.on_response(&mut headers);
        assert!(headers.is_empty());
    }

    #[test]
    fn test_chain_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = TransformChain::new()
            .with(Recorder {
                name: "a",
                log: Arc::clone(&log),
            })
            .with(Recorder {
                name: "b",
                log: Arc::clone(&log),
            });

        let mut headers = HeaderMap::new();
        chain.apply_request(&mut headers);
        chain.apply_response(&mut headers);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["req:a", "req:b", "res:b", "res:a"]
        );
    }

    #[test]
    fn test_compatibility_chain_stages() {
        assert_eq!(
            TransformChain::compatibility().names(),
            vec!["accept-negotiation", "strip-allow-origin"]
        );
    }

    #[tokio::test]
    async fn test_layer_rewrites_both_directions() {
        let inner = service_fn(|request: Request<()>| async move {
            let seen = request.headers().get(ACCEPT).cloned();
            let mut response = Response::new(());
            response
                .headers_mut()
                .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
            if let Some(seen) = seen {
                response.headers_mut().insert("x-seen-accept", seen);
            }
            Ok::<_, Infallible>(response)
        });

        let service = CompatLayer::default().layer(inner);
        let response = service.oneshot(Request::new(())).await.unwrap();

        assert_eq!(
            response.headers().get("x-seen-accept").unwrap(),
            "application/grpc-web+proto"
        );
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
