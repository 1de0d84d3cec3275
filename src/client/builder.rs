//! Client builder for constructing dispatch clients

use std::{collections::HashMap, sync::Arc, time::Duration};

use url::Url;

use crate::{
    client::{ClientConfig, DispatchClient},
    codec::{Codec, JsonCodec},
    runtime::AgentRuntime,
    service::DispatchService,
    transport::{HttpTransport, LocalTransport, Transport},
};

/// Builder for constructing dispatch clients
///
/// A client is built for one owning agent and a set of named routes to
/// target agents. Use [`DispatchClientBuilder::http`] for networked agents
/// and [`DispatchClientBuilder::local`] for runtimes sharing this process.
///
/// # Example
///
/// ```rust,no_run
/// use tower_dispatch::prelude::*;
///
/// let url: url::Url = "http://localhost:8002".parse().unwrap();
/// let client = DispatchClientBuilder::http("content-scheduler")
///     .with_agent("facebook-poster", url)
///     .build();
/// ```
pub struct DispatchClientBuilder<T: Transport> {
    agent_id: String,
    codec: Arc<dyn Codec>,
    timeout: Option<Duration>,
    routes: Vec<(String, T)>,
}

impl<T: Transport> DispatchClientBuilder<T> {
    /// Create a builder for the given owning agent
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            codec: Arc::new(JsonCodec),
            timeout: None,
            routes: Vec::new(),
        }
    }

    /// Route a target agent id over a custom transport
    pub fn with_transport(mut self, agent_id: impl Into<String>, transport: T) -> Self {
        self.routes.push((agent_id.into(), transport));
        self
    }

    /// Use a custom codec
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Set a request timeout (there is none by default)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the dispatch client
    pub fn build(self) -> DispatchClient<T> {
        let mut routes = HashMap::new();
        for (agent_id, transport) in self.routes {
            routes.insert(
                agent_id,
                DispatchService::new(transport, self.codec.clone()),
            );
        }

        let mut config = ClientConfig::new();
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        DispatchClient::new(self.agent_id, routes, config)
    }
}

impl DispatchClientBuilder<HttpTransport> {
    /// Create a builder whose routes use the HTTP+JSON binding
    pub fn http(agent_id: impl Into<String>) -> Self {
        Self::new(agent_id)
    }

    /// Route a target agent id to its base URL
    pub fn with_agent(self, agent_id: impl Into<String>, base_url: Url) -> Self {
        self.with_transport(agent_id, HttpTransport::new(base_url))
    }
}

impl DispatchClientBuilder<LocalTransport> {
    /// Create a builder whose routes deliver in-process
    pub fn local(agent_id: impl Into<String>) -> Self {
        Self::new(agent_id)
    }

    /// Route to an agent runtime living in this process
    ///
    /// The route is registered under the runtime's own agent id.
    pub fn with_runtime(self, runtime: &Arc<AgentRuntime>) -> Self {
        let agent_id = runtime.agent_id().to_string();
        self.with_transport(agent_id, LocalTransport::new(Arc::clone(runtime)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTaskStore;

    #[test]
    fn test_builder_http() {
        let url: Url = "http://localhost:8002".parse().unwrap();
        let client = DispatchClientBuilder::http("scheduler")
            .with_agent("poster", url)
            .with_timeout(Duration::from_secs(30))
            .build();

        assert_eq!(client.agent_id(), "scheduler");
        assert_eq!(client.config().timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_builder_local() {
        let runtime = Arc::new(AgentRuntime::new(
            "poster",
            "Poster",
            "Publishes posts",
            Arc::new(MemoryTaskStore::new()),
        ));

        let client = DispatchClientBuilder::local("scheduler")
            .with_runtime(&runtime)
            .build();

        assert_eq!(client.agent_id(), "scheduler");
        assert_eq!(client.config().timeout, None);
    }
}
