//! Error types for dispatch operations

use thiserror::Error;

use super::task::TaskStatus;

/// Main error type for dispatch operations
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Transport-level error (network, connection, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol-level error (invalid payload, unexpected response shape, etc.)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Validation error (missing or malformed required task fields)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Task was addressed to a different agent
    #[error("Task target {target} does not match agent {agent_id}")]
    TargetMismatch { agent_id: String, target: String },

    /// No handler registered for the task type
    #[error("No handler for task type: {task_type}")]
    UnknownTaskType { task_type: String },

    /// Illegal task status transition
    #[error("Transition error: {source}")]
    Transition {
        #[from]
        source: TransitionError,
    },

    /// Store unavailable or rejected the operation
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Request timeout error
    #[error("Request timeout")]
    Timeout,

    /// Task not found error
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    /// No route registered for the target agent
    #[error("Agent not found or unreachable: {agent_id}")]
    AgentNotFound { agent_id: String },

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// Rejected task status transition
///
/// Tasks move only along `pending -> in_progress -> {completed, failed}`,
/// with `pending -> canceled` as the single cancellation edge. Any other
/// pair is rejected with this error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid status transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    /// Status the task held when the transition was attempted
    pub from: TaskStatus,

    /// Status the transition tried to reach
    pub to: TaskStatus,
}

impl DispatchError {
    /// Build a persistence error from any displayable cause
    pub fn persistence(cause: impl std::fmt::Display) -> Self {
        DispatchError::Persistence(cause.to_string())
    }
}

/// Result type alias for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DispatchError::Timeout
        } else if err.is_connect() {
            DispatchError::Transport(format!("Connection error: {}", err))
        } else {
            DispatchError::Transport(err.to_string())
        }
    }
}

impl From<&str> for DispatchError {
    fn from(s: &str) -> Self {
        DispatchError::Other(s.to_string())
    }
}

impl From<String> for DispatchError {
    fn from(s: String) -> Self {
        DispatchError::Other(s)
    }
}
