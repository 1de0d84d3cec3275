//! Client configuration

use std::time::Duration;

/// Configuration for a dispatch client
///
/// By default there is no request timeout and no retry: a slow or
/// unreachable target agent blocks only the handler that issued the call,
/// and failures surface to the caller once.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Request timeout applied to every outbound call, if set
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
