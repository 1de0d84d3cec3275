//! High-level dispatch client

use std::collections::HashMap;

use serde_json::Value;
use tower::ServiceExt;

use crate::{
    client::config::ClientConfig,
    protocol::{
        agent::AgentCard,
        error::{DispatchError, DispatchResult},
        operation::DispatchOperation,
        task::{DataPart, Task, TaskPatch, TaskStatus},
    },
    service::{DispatchRequest, DispatchResponse, DispatchService, RequestContext},
    transport::Transport,
};

/// Client for sending tasks to named agents
///
/// Each client belongs to one agent (whose id it stamps as
/// `source_agent_id` on outgoing tasks) and holds an explicit route table
/// from target agent ids to their transports. The table is populated at
/// construction; there is no process-wide agent registry.
pub struct DispatchClient<T: Transport> {
    agent_id: String,
    routes: HashMap<String, DispatchService<T>>,
    config: ClientConfig,
}

impl<T: Transport> DispatchClient<T> {
    /// Create a client for the given agent with a prepared route table
    pub(crate) fn new(
        agent_id: String,
        routes: HashMap<String, DispatchService<T>>,
        config: ClientConfig,
    ) -> Self {
        Self {
            agent_id,
            routes,
            config,
        }
    }

    /// The id of the agent this client belongs to
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn route(&self, target_agent_id: &str) -> DispatchResult<DispatchService<T>> {
        self.routes
            .get(target_agent_id)
            .cloned()
            .ok_or_else(|| DispatchError::AgentNotFound {
                agent_id: target_agent_id.to_string(),
            })
    }

    fn context(&self) -> RequestContext {
        RequestContext {
            agent_url: String::new(),
            timeout: self.config.timeout,
            metadata: Default::default(),
        }
    }

    async fn call(
        &self,
        target_agent_id: &str,
        operation: DispatchOperation,
    ) -> DispatchResult<DispatchResponse> {
        let service = self.route(target_agent_id)?;
        let request = DispatchRequest::new(operation, self.context());
        service.oneshot(request).await
    }

    /// Send an already-built task to its target agent
    ///
    /// Returns the stored task as the target accepted it (now
    /// `in_progress`). There is no retry: a failed send surfaces once to
    /// the caller.
    pub async fn send(&self, task: Task) -> DispatchResult<Task> {
        let target = task.target_agent_id.clone();
        let response = self
            .call(&target, DispatchOperation::SendTask { task })
            .await?;

        response.into_task().ok_or_else(|| {
            DispatchError::Protocol("Expected task response from send".into())
        })
    }

    /// Create and send a new task to a named target agent
    pub async fn send_task(
        &self,
        target_agent_id: &str,
        task_type: &str,
        data_parts: Vec<DataPart>,
        parent_task_id: Option<String>,
        metadata: Option<HashMap<String, Value>>,
    ) -> DispatchResult<Task> {
        let mut task = Task::new(task_type, &self.agent_id, target_agent_id);
        task.data_parts = data_parts;
        task.parent_task_id = parent_task_id;
        if let Some(metadata) = metadata {
            task.metadata = metadata;
        }

        self.send(task).await
    }

    /// Get a task from a target agent by ID
    pub async fn get_task(&self, target_agent_id: &str, task_id: &str) -> DispatchResult<Task> {
        let response = self
            .call(
                target_agent_id,
                DispatchOperation::GetTask {
                    task_id: task_id.to_string(),
                },
            )
            .await?;

        response.into_task().ok_or_else(|| {
            DispatchError::Protocol("Expected task response from get_task".into())
        })
    }

    /// List tasks held by a target agent
    pub async fn list_tasks(
        &self,
        target_agent_id: &str,
        status: Option<TaskStatus>,
        limit: Option<u32>,
    ) -> DispatchResult<Vec<Task>> {
        let response = self
            .call(target_agent_id, DispatchOperation::ListTasks { status, limit })
            .await?;

        response.into_task_list().ok_or_else(|| {
            DispatchError::Protocol("Expected task list response from list_tasks".into())
        })
    }

    /// Apply a partial update to a task held by a target agent
    pub async fn update_task(
        &self,
        target_agent_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> DispatchResult<Task> {
        let response = self
            .call(
                target_agent_id,
                DispatchOperation::UpdateTask {
                    task_id: task_id.to_string(),
                    patch,
                },
            )
            .await?;

        response.into_task().ok_or_else(|| {
            DispatchError::Protocol("Expected task response from update_task".into())
        })
    }

    /// Update the status of a task, optionally merging metadata
    ///
    /// The status change is routed through the state machine on the target
    /// side.
    pub async fn update_task_status(
        &self,
        target_agent_id: &str,
        task_id: &str,
        status: TaskStatus,
        metadata: Option<HashMap<String, Value>>,
    ) -> DispatchResult<Task> {
        let mut patch = TaskPatch::status(status);
        patch.metadata = metadata;
        self.update_task(target_agent_id, task_id, patch).await
    }

    /// Cancel a pending task
    pub async fn cancel_task(&self, target_agent_id: &str, task_id: &str) -> DispatchResult<Task> {
        self.update_task(target_agent_id, task_id, TaskPatch::status(TaskStatus::Canceled))
            .await
    }

    /// Discover a target agent's capabilities by fetching its card
    pub async fn discover(&self, target_agent_id: &str) -> DispatchResult<AgentCard> {
        let response = self
            .call(target_agent_id, DispatchOperation::DiscoverAgent)
            .await?;

        response.into_agent_card().ok_or_else(|| {
            DispatchError::Protocol("Expected agent card response from discover".into())
        })
    }

    /// Poll a task until it reaches a terminal state
    ///
    /// # Arguments
    ///
    /// * `poll_interval_ms` - How often to poll (in milliseconds)
    /// * `max_attempts` - Maximum number of polling attempts (0 = unlimited)
    pub async fn poll_until_terminal(
        &self,
        target_agent_id: &str,
        task_id: &str,
        poll_interval_ms: u64,
        max_attempts: usize,
    ) -> DispatchResult<Task> {
        let mut attempts = 0;

        loop {
            let task = self.get_task(target_agent_id, task_id).await?;

            if task.is_terminal() {
                return Ok(task);
            }

            attempts += 1;
            if max_attempts > 0 && attempts >= max_attempts {
                return Err(DispatchError::Timeout);
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(poll_interval_ms)).await;
        }
    }
}
