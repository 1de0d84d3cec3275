//! JSON codec for the HTTP+JSON binding

use bytes::Bytes;

use crate::{
    codec::Codec,
    protocol::{
        agent::AgentCard,
        error::DispatchError,
        operation::DispatchOperation,
        task::{Task, TaskListResponse},
    },
    service::response::DispatchResponse,
};

/// JSON codec for the HTTP+JSON protocol binding
#[derive(Debug, Clone, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn encode_request(&self, operation: &DispatchOperation) -> Result<Bytes, DispatchError> {
        let bytes = match operation {
            DispatchOperation::SendTask { task } => serde_json::to_vec(task)?,
            DispatchOperation::UpdateTask { patch, .. } => serde_json::to_vec(patch)?,
            // GET requests don't carry bodies
            _ => Vec::new(),
        };

        Ok(Bytes::from(bytes))
    }

    fn decode_response(
        &self,
        body: &[u8],
        operation: &DispatchOperation,
    ) -> Result<DispatchResponse, DispatchError> {
        if body.is_empty() {
            return Ok(DispatchResponse::Empty);
        }

        match operation {
            DispatchOperation::SendTask { .. }
            | DispatchOperation::GetTask { .. }
            | DispatchOperation::UpdateTask { .. } => {
                let task: Task = serde_json::from_slice(body)?;
                Ok(DispatchResponse::Task(Box::new(task)))
            }
            DispatchOperation::ListTasks { .. } => {
                let list: TaskListResponse = serde_json::from_slice(body)?;
                Ok(DispatchResponse::TaskList {
                    tasks: list.tasks,
                    total: list.total,
                })
            }
            DispatchOperation::DiscoverAgent => {
                let card: AgentCard = serde_json::from_slice(body)?;
                Ok(DispatchResponse::AgentCard(Box::new(card)))
            }
        }
    }

    fn content_type(&self) -> &str {
        "application/json"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::protocol::task::{TaskPatch, TaskStatus};

    #[test]
    fn test_encode_send_task() {
        let codec = JsonCodec;
        let task = Task::new("publish_post", "scheduler", "poster");

        let operation = DispatchOperation::SendTask { task };
        let bytes = codec.encode_request(&operation).unwrap();
        assert!(!bytes.is_empty());

        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["type"], "publish_post");
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn test_encode_update_task() {
        let codec = JsonCodec;
        let operation = DispatchOperation::UpdateTask {
            task_id: "task-1".to_string(),
            patch: TaskPatch::status(TaskStatus::Canceled),
        };

        let bytes = codec.encode_request(&operation).unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "canceled");
    }

    #[test]
    fn test_decode_task_response() {
        let codec = JsonCodec;
        let task = Task::new("publish_post", "scheduler", "poster");
        let body = serde_json::to_vec(&task).unwrap();

        let operation = DispatchOperation::GetTask {
            task_id: task.id.clone(),
        };

        let response = codec.decode_response(&body, &operation).unwrap();
        match response {
            DispatchResponse::Task(decoded) => assert_eq!(decoded.id, task.id),
            _ => panic!("Expected Task response"),
        }
    }

    #[test]
    fn test_decode_task_list_response() {
        let codec = JsonCodec;
        let list = TaskListResponse {
            tasks: vec![Task::new("publish_post", "scheduler", "poster")],
            total: 1,
        };
        let body = serde_json::to_vec(&list).unwrap();

        let operation = DispatchOperation::ListTasks {
            status: None,
            limit: None,
        };

        let response = codec.decode_response(&body, &operation).unwrap();
        match response {
            DispatchResponse::TaskList { tasks, total } => {
                assert_eq!(tasks.len(), 1);
                assert_eq!(total, 1);
            }
            _ => panic!("Expected TaskList response"),
        }
    }

    #[test]
    fn test_content_type() {
        let codec = JsonCodec;
        assert_eq!(codec.content_type(), "application/json");
    }
}
