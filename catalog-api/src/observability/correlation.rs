//! Correlation id resolution at the edge of the router.
//!
//! The middleware builds a [`RequestContext`] from the inbound headers, stores
//! it in the request extensions and runs the rest of the stack inside the
//! context's span. Both ids are echoed on the response.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use catalog_telemetry::correlation::{
    RequestContext, CORRELATION_ID_HEADER, CORRELATION_SOURCE_HEADERS, REQUEST_ID_HEADER,
};
use std::convert::Infallible;
use tracing::Instrument;

/// Handler-side access to the request's [`RequestContext`].
///
/// Routes mounted without [`correlation_middleware`] get a detached context
/// rather than a rejection.
#[derive(Debug, Clone)]
pub struct Correlated(pub RequestContext);

#[async_trait]
impl<S> FromRequestParts<S> for Correlated
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(RequestContext::detached);
        Ok(Correlated(ctx))
    }
}

fn context_from_headers(headers: &HeaderMap) -> RequestContext {
    RequestContext::resolve(
        CORRELATION_SOURCE_HEADERS
            .iter()
            .map(|name| headers.get(*name).and_then(|value| value.to_str().ok())),
    )
}

pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let ctx = context_from_headers(request.headers());
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).instrument(ctx.span().clone()).await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(ctx.correlation_id().as_str()) {
        headers.insert(CORRELATION_ID_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(ctx.request_id().as_str()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }

    response
}
