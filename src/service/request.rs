//! Dispatch service request types

use std::{collections::HashMap, time::Duration};

use crate::protocol::operation::DispatchOperation;

/// A request to the dispatch service
///
/// This wraps a dispatch operation with additional context needed for
/// execution.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// The operation to execute
    pub operation: DispatchOperation,

    /// Request context (timeout, metadata)
    pub context: RequestContext,
}

impl DispatchRequest {
    /// Create a new dispatch request
    pub fn new(operation: DispatchOperation, context: RequestContext) -> Self {
        Self { operation, context }
    }
}

/// Request context containing metadata and configuration
///
/// There is no default timeout: a slow or unreachable target blocks only
/// the caller that issued the request, and nothing is retried. Callers that
/// want a deadline opt in per request or per client.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Base URL of the target agent
    pub agent_url: String,

    /// Request timeout, if any
    pub timeout: Option<Duration>,

    /// Additional metadata headers
    pub metadata: HashMap<String, String>,
}

impl RequestContext {
    /// Create a new request context
    pub fn new(agent_url: impl Into<String>) -> Self {
        Self {
            agent_url: agent_url.into(),
            timeout: None,
            metadata: HashMap::new(),
        }
    }

    /// Set a request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a metadata header
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::task::Task;

    #[test]
    fn test_request_context_creation() {
        let context = RequestContext::new("local://poster")
            .with_timeout(Duration::from_secs(60))
            .with_metadata("key", "value");

        assert_eq!(context.agent_url, "local://poster");
        assert_eq!(context.timeout, Some(Duration::from_secs(60)));
        assert_eq!(context.metadata.get("key"), Some(&"value".to_string()));
    }

    #[test]
    fn test_no_default_timeout() {
        let context = RequestContext::new("local://poster");
        assert_eq!(context.timeout, None);
    }

    #[test]
    fn test_request_creation() {
        let operation = DispatchOperation::SendTask {
            task: Task::new("publish_post", "scheduler", "poster"),
        };

        let context = RequestContext::new("local://poster");
        let request = DispatchRequest::new(operation, context);

        assert_eq!(request.context.agent_url, "local://poster");
    }
}
