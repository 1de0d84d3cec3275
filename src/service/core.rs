//! Core dispatch protocol service implementation

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tower_service::Service;

use crate::{
    codec::Codec,
    protocol::{error::DispatchError, operation::DispatchOperation},
    service::{DispatchRequest, DispatchResponse},
    transport::{Transport, TransportRequest},
};

/// Core protocol service that wraps a transport
///
/// This service implements the Tower `Service` trait and provides the core
/// logic for executing dispatch operations over any transport (HTTP,
/// in-process, etc.)
pub struct DispatchService<T> {
    transport: T,
    codec: Arc<dyn Codec>,
}

impl<T> DispatchService<T>
where
    T: Transport,
{
    /// Create a new dispatch service
    pub fn new(transport: T, codec: Arc<dyn Codec>) -> Self {
        Self { transport, codec }
    }

    /// Build a transport request from a dispatch operation
    fn build_transport_request(
        req: &DispatchRequest,
        codec: &dyn Codec,
    ) -> Result<TransportRequest, DispatchError> {
        let endpoint = req.operation.endpoint();
        let method = req.operation.method();

        let mut transport_req = TransportRequest::new(endpoint, method);

        transport_req = transport_req.header("Content-Type", codec.content_type());
        transport_req = transport_req.header("Accept", codec.content_type());
        transport_req = transport_req.header("Dispatch-Version", "1.0");

        // Add custom metadata headers
        for (key, value) in &req.context.metadata {
            transport_req = transport_req.header(key.clone(), value.clone());
        }

        // Encode request body (if needed)
        let body = codec.encode_request(&req.operation)?;
        if !body.is_empty() && method != "GET" {
            transport_req = transport_req.body(body);
        }

        Ok(transport_req)
    }

    /// Parse a transport response into a dispatch response
    fn parse_transport_response(
        transport_resp: crate::transport::TransportResponse,
        codec: &dyn Codec,
        operation: &DispatchOperation,
    ) -> Result<DispatchResponse, DispatchError> {
        if !transport_resp.is_success() {
            return Err(Self::handle_error_response(&transport_resp));
        }

        codec.decode_response(&transport_resp.body, operation)
    }

    /// Map error responses onto the dispatch error taxonomy
    fn handle_error_response(
        transport_resp: &crate::transport::TransportResponse,
    ) -> DispatchError {
        if let Ok(json) = serde_json::from_slice::<serde_json::Value>(&transport_resp.body) {
            if let Some(message) = json.get("message").and_then(|v| v.as_str()) {
                return match transport_resp.status {
                    // target mismatch, unknown type, malformed task: the
                    // task was rejected before persistence
                    400 => DispatchError::Validation(message.to_string()),
                    404 => {
                        if let Some(task_id) = json.get("taskId").and_then(|v| v.as_str()) {
                            DispatchError::TaskNotFound {
                                task_id: task_id.to_string(),
                            }
                        } else {
                            DispatchError::Protocol(message.to_string())
                        }
                    }
                    409 => DispatchError::Protocol(message.to_string()),
                    _ => DispatchError::Transport(format!(
                        "HTTP {}: {}",
                        transport_resp.status, message
                    )),
                };
            }
        }

        // Fallback error
        DispatchError::Transport(format!("HTTP error: {}", transport_resp.status))
    }
}

impl<T> Service<DispatchRequest> for DispatchService<T>
where
    T: Transport + Clone,
{
    type Response = DispatchResponse;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.transport.poll_ready(cx)
    }

    fn call(&mut self, req: DispatchRequest) -> Self::Future {
        let transport = self.transport.clone();
        let codec = self.codec.clone();

        Box::pin(async move {
            let transport_req = Self::build_transport_request(&req, codec.as_ref())?;

            // No timeout unless the caller set one
            let transport_resp = match req.context.timeout {
                Some(limit) => tokio::time::timeout(limit, transport.execute(transport_req))
                    .await
                    .map_err(|_| DispatchError::Timeout)??,
                None => transport.execute(transport_req).await?,
            };

            let response =
                Self::parse_transport_response(transport_resp, codec.as_ref(), &req.operation)?;

            Ok(response)
        })
    }
}

impl<T> Clone for DispatchService<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            codec: self.codec.clone(),
        }
    }
}
