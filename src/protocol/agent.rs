//! Agent discovery and capability types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A capability an agent can perform
///
/// Capabilities are static descriptive metadata used for discovery; dispatch
/// correctness never depends on them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Capability {
    /// Unique identifier for this capability
    pub id: String,

    /// Human-readable name of the capability
    pub name: String,

    /// Detailed description of what this capability does
    pub description: String,

    /// Parameter schema this capability accepts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl Capability {
    /// Create a new capability
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            parameters: None,
        }
    }

    /// Attach a parameter schema
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// Agent Card for agent discovery
///
/// Served at `/card` and describes the agent's identity, capabilities, and
/// endpoints. Not mutated after the agent starts serving.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCard {
    /// Unique identifier for this agent
    pub id: String,

    /// Human-readable name of the agent
    pub name: String,

    /// Detailed description of what this agent does
    pub description: String,

    /// Agent version
    pub version: String,

    /// Capabilities this agent supports
    #[serde(default)]
    pub capabilities: Vec<Capability>,

    /// API endpoints this agent exposes
    #[serde(default)]
    pub endpoints: HashMap<String, String>,

    /// Additional metadata about this agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl AgentCard {
    /// Create a new agent card
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            version: "0.1.0".to_string(),
            capabilities: Vec::new(),
            endpoints: HashMap::new(),
            metadata: None,
        }
    }

    /// Set the agent version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add a capability to the agent card
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Add an endpoint to the agent card
    pub fn with_endpoint(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.endpoints.insert(name.into(), url.into());
        self
    }
}
