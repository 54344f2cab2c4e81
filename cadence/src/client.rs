// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

// HTTP integration contract — defined in M1.9
//
// The transport is owned by the caller. The engine installs itself as a
// request/response/error interceptor on it and must be removable without
// residue. SSE requests are identified by the Accept header; a request
// carrying an offline provider is short-circuited with a synthetic 200
// whose body the provider supplies during response handling.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::Stream;
use uuid::Uuid;

/// Accept-header value that marks a request as an SSE stream.
pub const SSE_ACCEPT: &str = "text/event-stream";

pub const ACCEPT_HEADER: &str = "accept";

/// Boxed transport body: a lazy chunk sequence.
pub type BodyStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

// ---------------------------------------------------------------------------
// Request / response values
// ---------------------------------------------------------------------------

/// Supplies the body of an offline (short-circuited) request.
#[async_trait::async_trait]
pub trait OfflineProvider: Send + Sync {
    async fn body(&self) -> BodyStream;
}

/// Outbound request data as seen by interceptors.
#[derive(Clone)]
pub struct StreamRequest {
    /// Stable id; doubles as the bridge stream id for real transports.
    pub id: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub offline_provider: Option<Arc<dyn OfflineProvider>>,
}

impl StreamRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            path: path.into(),
            headers: HashMap::new(),
            offline_provider: None,
        }
    }

    /// A request pre-marked as an SSE stream.
    pub fn sse(path: impl Into<String>) -> Self {
        let mut request = Self::new(path);
        request
            .headers
            .insert(ACCEPT_HEADER.to_string(), SSE_ACCEPT.to_string());
        request
    }

    pub fn offline(mut self, provider: Arc<dyn OfflineProvider>) -> Self {
        self.offline_provider = Some(provider);
        self
    }

    pub fn is_sse(&self) -> bool {
        self.headers
            .iter()
            .any(|(k, v)| k.eq_ignore_ascii_case(ACCEPT_HEADER) && v.contains(SSE_ACCEPT))
    }

    pub fn is_offline(&self) -> bool {
        self.offline_provider.is_some()
    }
}

impl std::fmt::Debug for StreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRequest")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("offline", &self.is_offline())
            .finish()
    }
}

/// Inbound response as seen by interceptors.
pub struct StreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<BodyStream>,
}

impl StreamResponse {
    /// The synthetic 200 used to short-circuit offline requests. Its
    /// body is supplied by the offline provider during response
    /// handling.
    pub fn synthetic_ok() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_body(status: u16, body: BodyStream) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Some(body),
        }
    }
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Transport-level failures surfaced to interceptors and callers.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Stable marker: an SSE request was issued while another stream is
    /// still transforming. Distinguished from real transport errors.
    #[error("an SSE stream is already transforming")]
    TransformingInProgress,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl RequestError {
    pub fn is_transforming_marker(&self) -> bool {
        matches!(self, RequestError::TransformingInProgress)
    }
}

// ---------------------------------------------------------------------------
// Interceptor hooks
// ---------------------------------------------------------------------------

/// What the request hook decided.
pub enum RequestDirective {
    /// Forward the (possibly rewritten) request to the transport.
    Proceed(StreamRequest),
    /// Skip the transport and hand this response straight to the
    /// response hook.
    Respond(StreamResponse),
}

/// The hook surface an engine installs on the transport.
#[async_trait::async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// Identity used for installation and complete removal.
    fn name(&self) -> &str;

    async fn on_request(&self, request: StreamRequest)
        -> Result<RequestDirective, RequestError>;

    async fn on_response(
        &self,
        request: &StreamRequest,
        response: StreamResponse,
    ) -> StreamResponse;

    async fn on_error(&self, request: &StreamRequest, error: &RequestError);
}

/// The transport seam. Implementations route every request through the
/// installed interceptors in installation order.
pub trait SseHttpClient: Send + Sync {
    fn install(&self, interceptor: Arc<dyn RequestInterceptor>);
    /// Must remove every trace of the named interceptor.
    fn uninstall(&self, name: &str);
}
