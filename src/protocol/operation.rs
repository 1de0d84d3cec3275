//! Dispatch protocol operations

use super::task::{Task, TaskPatch, TaskStatus};

/// Abstract dispatch operations
///
/// Each operation is binding-independent; `endpoint`/`method` give the
/// HTTP+JSON mapping used by the transports.
#[derive(Debug, Clone)]
pub enum DispatchOperation {
    /// Send a new task to the target agent
    SendTask {
        /// The task to send
        task: Task,
    },

    /// Get a task by ID
    GetTask {
        /// The task ID to retrieve
        task_id: String,
    },

    /// List tasks with optional filtering
    ListTasks {
        /// Filter by task status
        status: Option<TaskStatus>,

        /// Maximum number of tasks to return
        limit: Option<u32>,
    },

    /// Apply a partial update to a task
    ///
    /// A patch carrying `status` is routed through the state machine on the
    /// receiving side; cancellation is an update to `canceled`.
    UpdateTask {
        /// The task ID to update
        task_id: String,

        /// The partial update to apply
        patch: TaskPatch,
    },

    /// Discover agent capabilities (fetch the Agent Card)
    DiscoverAgent,
}

impl DispatchOperation {
    /// Get the HTTP endpoint path for this operation
    pub fn endpoint(&self) -> String {
        match self {
            DispatchOperation::SendTask { .. } => "/tasks".to_string(),
            DispatchOperation::GetTask { task_id } => format!("/tasks/{}", task_id),
            DispatchOperation::ListTasks { status, limit } => {
                let mut query = Vec::new();
                if let Some(status) = status {
                    query.push(format!("status={}", status.as_str()));
                }
                if let Some(limit) = limit {
                    query.push(format!("limit={}", limit));
                }
                if query.is_empty() {
                    "/tasks".to_string()
                } else {
                    format!("/tasks?{}", query.join("&"))
                }
            }
            DispatchOperation::UpdateTask { task_id, .. } => format!("/tasks/{}", task_id),
            DispatchOperation::DiscoverAgent => "/card".to_string(),
        }
    }

    /// Get the HTTP method for this operation
    pub fn method(&self) -> &'static str {
        match self {
            DispatchOperation::SendTask { .. } => "POST",
            DispatchOperation::GetTask { .. } => "GET",
            DispatchOperation::ListTasks { .. } => "GET",
            DispatchOperation::UpdateTask { .. } => "PATCH",
            DispatchOperation::DiscoverAgent => "GET",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::task::Task;

    use super::*;

    #[test]
    fn test_operation_endpoints() {
        let op = DispatchOperation::SendTask {
            task: Task::new("publish_post", "scheduler", "poster"),
        };
        assert_eq!(op.endpoint(), "/tasks");
        assert_eq!(op.method(), "POST");

        let op = DispatchOperation::GetTask {
            task_id: "task-123".to_string(),
        };
        assert_eq!(op.endpoint(), "/tasks/task-123");
        assert_eq!(op.method(), "GET");

        let op = DispatchOperation::UpdateTask {
            task_id: "task-123".to_string(),
            patch: TaskPatch::status(TaskStatus::Canceled),
        };
        assert_eq!(op.endpoint(), "/tasks/task-123");
        assert_eq!(op.method(), "PATCH");

        let op = DispatchOperation::DiscoverAgent;
        assert_eq!(op.endpoint(), "/card");
        assert_eq!(op.method(), "GET");
    }

    #[test]
    fn test_list_tasks_query() {
        let op = DispatchOperation::ListTasks {
            status: Some(TaskStatus::InProgress),
            limit: Some(50),
        };
        assert_eq!(op.endpoint(), "/tasks?status=in_progress&limit=50");

        let op = DispatchOperation::ListTasks {
            status: None,
            limit: None,
        };
        assert_eq!(op.endpoint(), "/tasks");
    }
}
