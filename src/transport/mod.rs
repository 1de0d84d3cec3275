//! Transport abstraction layer for the dispatch protocol

pub mod http;
pub mod local;

use std::{
    collections::HashMap,
    task::{Context, Poll},
};

pub use http::HttpTransport;
pub use local::LocalTransport;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

/// Protocol-agnostic transport request
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The endpoint path (e.g., "/tasks", "/tasks/123")
    pub endpoint: String,

    /// HTTP method or equivalent operation (e.g., "POST", "GET", "PATCH")
    pub method: String,

    /// Headers or metadata for the request
    pub headers: HashMap<String, String>,

    /// Request body as bytes
    pub body: Bytes,
}

impl TransportRequest {
    /// Create a new transport request
    pub fn new(endpoint: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header to the request
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the request body
    pub fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }
}

/// Protocol-agnostic transport response
#[derive(Debug)]
pub struct TransportResponse {
    /// Status code (e.g., HTTP status code)
    pub status: u16,

    /// Response headers or metadata
    pub headers: HashMap<String, String>,

    /// Response body as bytes
    pub body: Bytes,
}

impl TransportResponse {
    /// Create a new transport response
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header to the response
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the response body
    pub fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Check if the response indicates success (2xx status code)
    pub fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Check if the response indicates a client error (4xx status code)
    pub fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Check if the response indicates a server error (5xx status code)
    pub fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }
}

/// Core transport trait for executing protocol-agnostic requests
///
/// This trait abstracts over the delivery mechanism (HTTP, in-process, ...)
/// so the dispatch layer can address any agent the same way.
#[async_trait]
pub trait Transport: Clone + Send + Sync + 'static {
    /// Check if the transport is ready to accept requests
    ///
    /// This is used by Tower's Service trait to implement backpressure
    fn poll_ready(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), crate::protocol::error::DispatchError>>;

    /// Execute a transport request asynchronously
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, crate::protocol::error::DispatchError>;

    /// Get the base URL or identifier for this transport
    ///
    /// For HTTP transports, this is the agent's base URL; for in-process
    /// transports it is a `local://` identifier.
    fn base_url(&self) -> &Url;
}
