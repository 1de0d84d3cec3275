//! Task types and lifecycle management

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::TransitionError;

/// A unit of cross-agent work
///
/// Tasks are the primary mechanism for agents to request actions from each
/// other. A task is created `pending` by the submitting agent, moved to
/// `in_progress` by the receiving runtime before its handler runs, and ends
/// in exactly one terminal state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier for the task
    pub id: String,

    /// Type tag selecting the handler on the target agent
    #[serde(rename = "type")]
    pub task_type: String,

    /// Current status of the task
    pub status: TaskStatus,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last mutated (transition or data part addition)
    pub updated_at: DateTime<Utc>,

    /// ID of the agent that created the task
    pub source_agent_id: String,

    /// ID of the agent that should perform the task
    pub target_agent_id: String,

    /// Parent task, if this is a sub-task
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,

    /// Open key/value map; carries error text and result references
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,

    /// Ordered typed payloads
    #[serde(default)]
    pub data_parts: Vec<DataPart>,
}

impl Task {
    /// Create a new pending task
    pub fn new(
        task_type: impl Into<String>,
        source_agent_id: impl Into<String>,
        target_agent_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            task_type: task_type.into(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            source_agent_id: source_agent_id.into(),
            target_agent_id: target_agent_id.into(),
            parent_task_id: None,
            metadata: HashMap::new(),
            data_parts: Vec::new(),
        }
    }

    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status transition
    ///
    /// This is the only mutation path for `status`. Illegal edges, including
    /// any move out of a terminal state, are rejected without touching the
    /// task. `updated_at` is bumped on success.
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Append a data part
    pub fn add_data_part(&mut self, part: DataPart) {
        self.data_parts.push(part);
        self.updated_at = Utc::now();
    }

    /// Insert a metadata entry
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    /// Find the first data part with the given content type
    pub fn part_with_content_type(&self, content_type: &str) -> Option<&DataPart> {
        self.data_parts
            .iter()
            .find(|part| part.content_type == content_type)
    }

    /// Set the parent task ID
    pub fn with_parent(mut self, parent_task_id: impl Into<String>) -> Self {
        self.parent_task_id = Some(parent_task_id.into());
        self
    }

    /// Add a data part
    pub fn with_data_part(mut self, part: DataPart) -> Self {
        self.data_parts.push(part);
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Apply a partial update
    ///
    /// Status changes are routed through [`Task::transition`]; metadata is
    /// merged and data parts are appended.
    pub fn apply_patch(&mut self, patch: TaskPatch) -> Result<(), TransitionError> {
        if let Some(status) = patch.status {
            self.transition(status)?;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata.extend(metadata);
            self.updated_at = Utc::now();
        }
        if let Some(parts) = patch.data_parts {
            for part in parts {
                self.add_data_part(part);
            }
        }
        Ok(())
    }
}

/// Task status in the dispatch lifecycle
///
/// Lifecycle: `pending -> in_progress -> completed/failed`, with
/// `pending -> canceled` permitted. Terminal states are never left.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task has been created and not yet accepted by its target
    Pending,

    /// Task has been accepted and its handler is running
    InProgress,

    /// Task completed successfully
    Completed,

    /// Task failed with an error
    Failed,

    /// Task was canceled by its owner before it started
    Canceled,
}

impl TaskStatus {
    /// Canonical snake_case name, matching the wire format
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Canceled => "canceled",
        }
    }

    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Canceled
        )
    }

    /// Check if `next` is a legal transition from this status
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::Pending, TaskStatus::Canceled)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        )
    }
}

/// A typed payload fragment attached to a task
///
/// Data parts are owned exclusively by their containing task and are never
/// shared across tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataPart {
    /// Unique identifier for this data part
    pub id: String,

    /// MIME-like tag describing the payload
    pub content_type: String,

    /// The structured payload
    pub data: Value,

    /// Additional metadata about this data part
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl DataPart {
    /// Create a new data part
    pub fn new(content_type: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            content_type: content_type.into(),
            data,
            metadata: None,
        }
    }

    /// Create an `application/json` data part
    pub fn json(data: Value) -> Self {
        Self::new("application/json", data)
    }

    /// Add metadata to the data part
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Partial task update applied through `PATCH /tasks/{id}`
///
/// `status` is a special field: it is routed through the state machine
/// rather than overwritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New status, applied as a transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    /// Metadata entries to merge in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,

    /// Data parts to append
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_parts: Option<Vec<DataPart>>,
}

impl TaskPatch {
    /// Create a patch that only changes status
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Add metadata entries to the patch
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check whether the patch carries no changes
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.metadata.is_none() && self.data_parts.is_none()
    }
}

/// Response from listing tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskListResponse {
    /// List of tasks
    pub tasks: Vec<Task>,

    /// Total number of tasks matching the query
    pub total: usize,
}
