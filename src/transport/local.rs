//! In-process transport routing requests to an [`AgentRuntime`]
//!
//! Implements the task transport contract (201/400/404/409 with JSON
//! bodies) directly against a runtime living in the same process. This is
//! how several agents coexist in one process for tests and single-binary
//! deployments; over the network the same contract is served over
//! [`HttpTransport`](super::HttpTransport).

use std::{
    sync::Arc,
    task::{Context, Poll},
};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use url::Url;

use crate::{
    protocol::{
        error::DispatchError,
        task::{Task, TaskPatch, TaskStatus},
    },
    runtime::AgentRuntime,
    store::TimeField,
};

use super::{Transport, TransportRequest, TransportResponse};

/// Transport that delivers requests to an in-process agent runtime
#[derive(Clone)]
pub struct LocalTransport {
    runtime: Arc<AgentRuntime>,
    base_url: Url,
}

impl LocalTransport {
    /// Create a transport addressing the given runtime
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        let base_url = Url::parse(&format!("local://{}", runtime.agent_id()))
            .unwrap_or_else(|_| Url::parse("local://agent").expect("static url parses"));
        Self { runtime, base_url }
    }

    fn json_response(status: u16, body: &impl serde::Serialize) -> TransportResponse {
        let bytes = serde_json::to_vec(body).unwrap_or_default();
        TransportResponse::new(status)
            .header("Content-Type", "application/json")
            .body(Bytes::from(bytes))
    }

    fn error_response(err: &DispatchError) -> TransportResponse {
        let status = match err {
            DispatchError::TargetMismatch { .. }
            | DispatchError::UnknownTaskType { .. }
            | DispatchError::Validation(_)
            | DispatchError::Serialization(_) => 400,
            DispatchError::TaskNotFound { .. } => 404,
            DispatchError::Transition { .. } => 409,
            _ => 500,
        };

        let body = match err {
            DispatchError::TaskNotFound { task_id } => {
                json!({ "message": err.to_string(), "taskId": task_id })
            }
            _ => json!({ "message": err.to_string() }),
        };

        Self::json_response(status, &body)
    }

    async fn handle_create(&self, body: &[u8]) -> TransportResponse {
        let task: Task = match serde_json::from_slice(body) {
            Ok(task) => task,
            Err(e) => return Self::error_response(&DispatchError::Serialization(e)),
        };

        match self.runtime.receive(task).await {
            Ok(accepted) => Self::json_response(201, &accepted),
            Err(e) => Self::error_response(&e),
        }
    }

    async fn handle_get(&self, task_id: &str) -> TransportResponse {
        match self.runtime.get_task(task_id).await {
            Ok(Some(task)) => Self::json_response(200, &task),
            Ok(None) => Self::error_response(&DispatchError::TaskNotFound {
                task_id: task_id.to_string(),
            }),
            Err(e) => Self::error_response(&e),
        }
    }

    async fn handle_update(&self, task_id: &str, body: &[u8]) -> TransportResponse {
        let patch: TaskPatch = match serde_json::from_slice(body) {
            Ok(patch) => patch,
            Err(e) => return Self::error_response(&DispatchError::Serialization(e)),
        };

        match self.runtime.update_task(task_id, patch).await {
            Ok(task) => Self::json_response(200, &task),
            Err(e) => Self::error_response(&e),
        }
    }

    async fn handle_list(&self, query: Option<&str>) -> TransportResponse {
        let mut status = None;
        let mut limit = 100usize;

        for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "status" => match serde_json::from_value::<TaskStatus>(json!(value)) {
                    Ok(parsed) => status = Some(parsed),
                    Err(_) => {
                        return Self::error_response(&DispatchError::Validation(format!(
                            "unknown status filter: {}",
                            value
                        )))
                    }
                },
                "limit" => {
                    if let Ok(parsed) = value.parse() {
                        limit = parsed;
                    }
                }
                _ => {}
            }
        }

        match self
            .runtime
            .list_tasks(status, TimeField::CreatedAt, limit)
            .await
        {
            Ok(tasks) => {
                let total = tasks.len();
                Self::json_response(200, &json!({ "tasks": tasks, "total": total }))
            }
            Err(e) => Self::error_response(&e),
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), DispatchError>> {
        Poll::Ready(Ok(()))
    }

    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, DispatchError> {
        let (path, query) = match request.endpoint.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (request.endpoint.as_str(), None),
        };

        let response = match (request.method.as_str(), path) {
            ("POST", "/tasks") => self.handle_create(&request.body).await,
            ("GET", "/tasks") => self.handle_list(query).await,
            ("GET", "/card") => Self::json_response(200, &self.runtime.card()),
            ("GET", path) if path.starts_with("/tasks/") => {
                self.handle_get(&path["/tasks/".len()..]).await
            }
            ("PATCH", path) if path.starts_with("/tasks/") => {
                self.handle_update(&path["/tasks/".len()..], &request.body).await
            }
            _ => Self::json_response(
                404,
                &json!({ "message": format!("no such endpoint: {} {}", request.method, path) }),
            ),
        };

        Ok(response)
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("agent_id", &self.runtime.agent_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        runtime::handler_fn,
        store::{MemoryTaskStore, TaskStore},
    };

    fn poster_runtime() -> Arc<AgentRuntime> {
        let mut rt = AgentRuntime::new(
            "poster",
            "Poster",
            "Publishes posts",
            Arc::new(MemoryTaskStore::new()),
        );
        rt.register_handler("noop", handler_fn(|task| async move { Ok(task) }));
        Arc::new(rt)
    }

    #[tokio::test]
    async fn test_post_task_returns_201_in_progress() {
        let transport = LocalTransport::new(poster_runtime());
        let task = Task::new("noop", "scheduler", "poster");
        let body = serde_json::to_vec(&task).unwrap();

        let request = TransportRequest::new("/tasks", "POST").body(Bytes::from(body));
        let response = transport.execute(request).await.unwrap();

        assert_eq!(response.status, 201);
        let stored: Task = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(stored.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_post_task_target_mismatch_is_400() {
        let transport = LocalTransport::new(poster_runtime());
        let task = Task::new("noop", "scheduler", "other-agent");
        let body = serde_json::to_vec(&task).unwrap();

        let request = TransportRequest::new("/tasks", "POST").body(Bytes::from(body));
        let response = transport.execute(request).await.unwrap();

        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_get_missing_task_is_404() {
        let transport = LocalTransport::new(poster_runtime());

        let request = TransportRequest::new("/tasks/nope", "GET");
        let response = transport.execute(request).await.unwrap();

        assert_eq!(response.status, 404);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["taskId"], "nope");
    }

    #[tokio::test]
    async fn test_patch_routes_status_through_state_machine() {
        let runtime = poster_runtime();
        let transport = LocalTransport::new(Arc::clone(&runtime));

        let task = Task::new("later", "scheduler", "poster");
        let id = task.id.clone();
        runtime.store().upsert(task).await.unwrap();

        // pending -> canceled is legal
        let patch = serde_json::to_vec(&TaskPatch::status(TaskStatus::Canceled)).unwrap();
        let request =
            TransportRequest::new(format!("/tasks/{}", id), "PATCH").body(Bytes::from(patch));
        let response = transport.execute(request).await.unwrap();
        assert_eq!(response.status, 200);

        // canceled -> completed is not
        let patch = serde_json::to_vec(&TaskPatch::status(TaskStatus::Completed)).unwrap();
        let request =
            TransportRequest::new(format!("/tasks/{}", id), "PATCH").body(Bytes::from(patch));
        let response = transport.execute(request).await.unwrap();
        assert_eq!(response.status, 409);
    }

    #[tokio::test]
    async fn test_card_endpoint() {
        let transport = LocalTransport::new(poster_runtime());

        let request = TransportRequest::new("/card", "GET");
        let response = transport.execute(request).await.unwrap();

        assert_eq!(response.status, 200);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["id"], "poster");
    }

    #[tokio::test]
    async fn test_list_with_status_filter() {
        let runtime = poster_runtime();
        let transport = LocalTransport::new(Arc::clone(&runtime));

        runtime
            .store()
            .upsert(Task::new("later", "scheduler", "poster"))
            .await
            .unwrap();

        let request = TransportRequest::new("/tasks?status=pending&limit=10", "GET");
        let response = transport.execute(request).await.unwrap();

        assert_eq!(response.status, 200);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["total"], 1);
    }
}
