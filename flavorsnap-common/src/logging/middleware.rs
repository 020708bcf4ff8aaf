//! Request/response observability layer
//!
//! Wraps any `tower::Service<Request<Body>, Response = Response<Body>>` (an
//! axum `Router` included) and logs around every call:
//! - `api_request` before the inner service runs
//! - `api_response` with status, duration and JSON body on success
//! - `error_with_traceback` with duration so far on failure or panic
//!
//! The layer only observes. Errors are returned unchanged, panics are
//! resumed, and a buffered response body is handed back byte for byte.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{header, HeaderMap, Request, Response};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};
use tower::{Layer, Service};
use uuid::Uuid;

use super::entry::Fields;
use super::logger::{duration_ms, FailureReport, Logger};

/// Largest response body buffered for logging
pub const MAX_LOGGED_BODY_BYTES: usize = 64 * 1024;

const UNHANDLED_MESSAGE: &str = "Unhandled error in API route";

/// Layer producing [`ObservabilityService`]
#[derive(Clone, Debug)]
pub struct ObservabilityLayer {
    logger: Logger,
}

impl ObservabilityLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for ObservabilityLayer {
    type Service = ObservabilityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ObservabilityService {
            inner,
            logger: self.logger.clone(),
        }
    }
}

/// Service wrapper logging request, response and failure telemetry
#[derive(Clone, Debug)]
pub struct ObservabilityService<S> {
    inner: S,
    logger: Logger,
}

impl<S> Service<Request<Body>> for ObservabilityService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // The service that was polled ready handles this call
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let logger = self.logger.clone();

        Box::pin(async move {
            let method = request.method().to_string();
            let url = request.uri().to_string();

            let mut context = Fields::new();
            context.insert("request_id".into(), json!(Uuid::new_v4().to_string()));

            logger.log_api_request(&method, &url, &flatten_headers(request.headers()), context.clone());

            let started = Instant::now();
            let outcome = AssertUnwindSafe(async { inner.call(request).await })
                .catch_unwind()
                .await;
            let elapsed = started.elapsed();

            match outcome {
                Ok(Ok(response)) => {
                    let (response, body) = capture_json_body(response).await;
                    logger.log_api_response(
                        &method,
                        &url,
                        response.status().as_u16(),
                        body,
                        Some(elapsed),
                        context,
                    );
                    Ok(response)
                }
                Ok(Err(err)) => {
                    failure_context(&mut context, &method, &url, elapsed);
                    logger.log_error_with_traceback(UNHANDLED_MESSAGE, &err, context);
                    Err(err)
                }
                Err(panic) => {
                    failure_context(&mut context, &method, &url, elapsed);
                    logger.log_failure(UNHANDLED_MESSAGE, &FailureReport::from_panic(panic.as_ref()), context);
                    std::panic::resume_unwind(panic)
                }
            }
        })
    }
}

fn failure_context(context: &mut Fields, method: &str, url: &str, elapsed: std::time::Duration) {
    context.insert("request_method".into(), json!(method));
    context.insert("request_url".into(), json!(url));
    context.insert("response_duration_ms".into(), json!(duration_ms(elapsed)));
}

/// Header map as `name -> value`, repeated headers joined with ", "
pub fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    flat
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            essence == "application/json" || essence.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Buffer a JSON body of known, bounded size and rebuild the response.
///
/// Anything else passes through untouched with no logged body.
async fn capture_json_body(response: Response<Body>) -> (Response<Body>, Option<Value>) {
    if !is_json(response.headers()) {
        return (response, None);
    }

    let (parts, body) = response.into_parts();
    match body.size_hint().upper() {
        Some(len) if len <= MAX_LOGGED_BODY_BYTES as u64 => {}
        _ => return (Response::from_parts(parts, body), None),
    }

    match axum::body::to_bytes(body, MAX_LOGGED_BODY_BYTES).await {
        Ok(bytes) => {
            let logged = serde_json::from_slice::<Value>(&bytes).ok();
            (Response::from_parts(parts, Body::from(bytes)), logged)
        }
        Err(err) => {
            // The consumer sees the same body failure it would have seen
            let failing = futures::stream::once(async move { Err::<Bytes, _>(err) });
            (Response::from_parts(parts, Body::from_stream(failing)), None)
        }
    }
}
