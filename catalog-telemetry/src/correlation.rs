//! Per-request identifiers and the logging span that carries them.

use catalog_core::{CorrelationId, RequestId};
use tracing::Span;

/// Inbound/outbound header carrying the correlation id.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Inbound/outbound header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Inbound-only fallback header.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Headers consulted for an inherited correlation id, highest priority first.
pub const CORRELATION_SOURCE_HEADERS: [&str; 3] =
    [CORRELATION_ID_HEADER, REQUEST_ID_HEADER, TRACE_ID_HEADER];

/// Pick the first usable candidate or mint a fresh id.
///
/// `None`, empty and whitespace-only candidates are skipped.
pub fn resolve_correlation_id<'a, I>(candidates: I) -> CorrelationId
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .find_map(CorrelationId::parse)
        .unwrap_or_else(CorrelationId::generate)
}

/// Identifiers for one request, fixed at ingress.
///
/// Cloning is cheap and every clone refers to the same span.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    correlation_id: CorrelationId,
    span: Span,
}

impl RequestContext {
    pub fn new(correlation_id: CorrelationId) -> Self {
        let request_id = RequestId::generate();
        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            correlation_id = %correlation_id,
        );

        Self {
            request_id,
            correlation_id,
            span,
        }
    }

    /// Build a context from header values in [`CORRELATION_SOURCE_HEADERS`]
    /// order.
    pub fn resolve<'a, I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        Self::new(resolve_correlation_id(candidates))
    }

    /// Context for work that did not arrive over HTTP.
    pub fn detached() -> Self {
        Self::new(CorrelationId::generate())
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_header_wins() {
        let ctx = RequestContext::resolve([Some("abc"), Some("xyz"), None]);
        assert_eq!(ctx.correlation_id().as_str(), "abc");
        assert_ne!(ctx.request_id().as_str(), "xyz");
    }

    #[test]
    fn test_blank_headers_fall_through() {
        let ctx = RequestContext::resolve([Some("  "), Some(""), Some("trace-1")]);
        assert_eq!(ctx.correlation_id().as_str(), "trace-1");
    }

    #[test]
    fn test_fresh_ids_when_absent() {
        let a = RequestContext::resolve([None, None, None]);
        let b = RequestContext::resolve([None, None, None]);

        assert_eq!(a.correlation_id().as_str().len(), 32);
        assert_ne!(a.correlation_id(), b.correlation_id());
        assert_ne!(a.correlation_id().as_str(), a.request_id().as_str());
    }
}
