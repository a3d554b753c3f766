//! gRPC-Web to gRPC bridge
//!
//! Turns an HTTP/1.1 gRPC-Web request into a gRPC request for the shared
//! route table, and streams the gRPC response back in gRPC-Web framing with
//! the trailers folded into a final `0x80` frame.

use axum::body::Body;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::StreamExt;
use http::header::{
    HeaderValue, ACCEPT, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ALLOW,
    CONTENT_LENGTH, CONTENT_TYPE, ORIGIN, TE,
};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, BodyStream, LengthLimitError, Limited};
use sdgrpc_grpc::guard::{panic_guard, PanicHandler};
use sdgrpc_grpc::ServiceSet;
use std::convert::Infallible;
use std::task::{Context, Poll};
use tonic::service::Routes;
use tonic::Status;
use tower::{Layer, Service, ServiceExt};
use tower_http::catch_panic::CatchPanic;
use tracing::{debug, warn};

use crate::frame::{self, Encoding, FrameError, FRAME_HEADER_LEN};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Route table behind the panic guard
type GuardedRoutes = CatchPanic<Routes, PanicHandler>;

const EXPOSED: HeaderValue =
    HeaderValue::from_static("grpc-status,grpc-message,grpc-status-details-bin");

/// Service bridging gRPC-Web requests onto the shared implementations
#[derive(Clone)]
pub struct GrpcWebService {
    inner: GuardedRoutes,
    max_message_bytes: usize,
}

impl GrpcWebService {
    /// Build a bridge over the route table of `services`
    pub fn new(services: &ServiceSet) -> Self {
        Self {
            inner: panic_guard().layer(services.routes()),
            max_message_bytes: services.max_message_bytes(),
        }
    }
}

impl Service<Request<Body>> for GrpcWebService {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let inner = self.inner.clone();
        let limit = self.max_message_bytes;
        Box::pin(async move { Ok(bridge(inner, limit, request).await) })
    }
}

/// Largest body that can carry one message of `max_message` bytes
fn body_limit(encoding: Encoding, max_message: usize) -> usize {
    let framed = max_message.saturating_add(FRAME_HEADER_LEN);
    match encoding {
        Encoding::Binary => framed,
        Encoding::Text => (framed / 3).saturating_add(1).saturating_mul(4),
    }
}

fn frame_error_status(error: &FrameError) -> Status {
    match error {
        FrameError::Compressed => Status::unimplemented(error.to_string()),
        _ => Status::internal(format!("Malformed gRPC-Web request: {error}")),
    }
}

fn plain_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

async fn bridge(inner: GuardedRoutes, limit: usize, request: Request<Body>) -> Response<Body> {
    if request.method() != Method::POST {
        let mut response = plain_response(StatusCode::METHOD_NOT_ALLOWED);
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("POST"));
        return response;
    }

    let Some(request_encoding) = Encoding::from_header(request.headers().get(CONTENT_TYPE)) else {
        debug!(path = %request.uri().path(), "Rejecting non gRPC-Web content type");
        return plain_response(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    };
    let response_encoding =
        Encoding::from_header(request.headers().get(ACCEPT)).unwrap_or(request_encoding);
    let origin = request
        .headers()
        .get(ORIGIN)
        .cloned()
        .unwrap_or(HeaderValue::from_static("*"));

    let (mut parts, body) = request.into_parts();

    let collected = Limited::new(body, body_limit(request_encoding, limit))
        .collect()
        .await;
    let raw = match collected {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            let status = Status::resource_exhausted(format!(
                "Request body exceeds the {limit} byte message limit"
            ));
            return grpc_web_response(status.into_http(), response_encoding, origin);
        }
        Err(e) => {
            warn!(error = %e, "Failed to read gRPC-Web request body");
            let status = Status::internal("Failed to read request body");
            return grpc_web_response(status.into_http(), response_encoding, origin);
        }
    };

    let frames = match request_encoding
        .decode(raw)
        .and_then(|frames| frame::validate_request(&frames).map(|_| frames))
    {
        Ok(frames) => frames,
        Err(e) => {
            debug!(error = %e, path = %parts.uri.path(), "Malformed gRPC-Web request");
            let status = frame_error_status(&e);
            return grpc_web_response(status.into_http(), response_encoding, origin);
        }
    };

    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/grpc"));
    parts.headers.insert(TE, HeaderValue::from_static("trailers"));
    parts.headers.remove(ACCEPT);
    parts.headers.remove(CONTENT_LENGTH);

    let forwarded = Request::from_parts(parts, tonic::body::boxed(Body::from(frames)));
    type Dispatch = <GuardedRoutes as Service<Request<tonic::body::BoxBody>>>::Future;
    let dispatch: BoxFuture<'static, <Dispatch as std::future::Future>::Output> =
        Box::pin(inner.oneshot(forwarded));
    match dispatch.await {
        Ok(response) => grpc_web_response(response, response_encoding, origin),
        Err(e) => {
            warn!(error = %e, "gRPC dispatch failed");
            let status = Status::internal(e.to_string());
            grpc_web_response(status.into_http(), response_encoding, origin)
        }
    }
}

/// Re-frame a gRPC response for a gRPC-Web client
fn grpc_web_response<B>(
    response: Response<B>,
    encoding: Encoding,
    origin: HeaderValue,
) -> Response<Body>
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let (mut parts, body) = response.into_parts();

    parts.headers.insert(CONTENT_TYPE, encoding.content_type());
    parts.headers.remove(CONTENT_LENGTH);
    parts.headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, EXPOSED);
    parts.headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);

    // A frame that cannot be encoded aborts the body instead of corrupting it
    let body = BodyStream::new(body).map(move |chunk| -> Result<Bytes, BoxError> {
        let chunk = chunk.map_err(Into::<BoxError>::into)?;
        encode_frame(chunk, encoding).map_err(BoxError::from)
    });
    Response::from_parts(parts, Body::from_stream(body))
}

fn encode_frame(
    chunk: http_body::Frame<Bytes>,
    encoding: Encoding,
) -> Result<Bytes, FrameError> {
    match chunk.into_data() {
        Ok(data) => Ok(encoding.encode(data)),
        Err(chunk) => match chunk.into_trailers() {
            Ok(trailers) => Ok(encoding.encode(frame::encode_trailers(&trailers)?)),
            Err(_) => Ok(Bytes::new()),
        },
    }
}
