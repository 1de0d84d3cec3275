//! Agent runtime: capability registration, task receipt and execution
//!
//! Each [`AgentRuntime`] owns its handler registry and task store — there is
//! no process-wide registry, so multiple agents can coexist in one process.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::json;
use tracing::{error, info};

use crate::{
    protocol::{
        agent::{AgentCard, Capability},
        error::{DispatchError, DispatchResult},
        task::{Task, TaskPatch, TaskStatus},
    },
    store::{TaskStore, TimeField},
};

/// Handler invoked for a received task
///
/// The handler receives the in-progress task and returns it (possibly with
/// added metadata or data parts). A returned error moves the task to
/// `failed` with the error text recorded in metadata; the handler never
/// applies terminal transitions itself.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Process a task
    async fn handle(&self, task: Task) -> DispatchResult<Task>;
}

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F> TaskHandler for FnHandler<F>
where
    F: Fn(Task) -> BoxFuture<'static, DispatchResult<Task>> + Send + Sync,
{
    async fn handle(&self, task: Task) -> DispatchResult<Task> {
        (self.f)(task).await
    }
}

/// Wrap an async closure as a [`TaskHandler`]
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn TaskHandler>
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = DispatchResult<Task>> + Send + 'static,
{
    Arc::new(FnHandler {
        f: move |task| f(task).boxed(),
    })
}

/// Runtime for a single agent
///
/// Receives incoming tasks, validates them, persists them, and runs the
/// registered handler on the async executor. Acceptance is decoupled from
/// completion: [`AgentRuntime::receive`] returns as soon as the task is
/// stored `in_progress`.
pub struct AgentRuntime {
    agent_id: String,
    name: String,
    description: String,
    version: String,
    base_url: String,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    capabilities: Vec<Capability>,
    store: Arc<dyn TaskStore>,
}

impl AgentRuntime {
    /// Create a new runtime
    pub fn new(
        agent_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        store: Arc<dyn TaskStore>,
    ) -> Self {
        let agent_id = agent_id.into();
        Self {
            base_url: format!("local://{}", agent_id),
            agent_id,
            name: name.into(),
            description: description.into(),
            version: "0.1.0".to_string(),
            handlers: HashMap::new(),
            capabilities: Vec::new(),
            store,
        }
    }

    /// Set the agent version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the base URL advertised on the agent card
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// This runtime's agent id
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// The task store backing this runtime
    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Register a handler for a task type
    ///
    /// Exactly one handler per type; the last registration wins. Must be
    /// called before the runtime starts serving requests — registration is
    /// single-threaded at startup, so no locking is involved.
    pub fn register_handler(&mut self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        let task_type = task_type.into();
        info!(agent_id = %self.agent_id, task_type = %task_type, "Registered task handler");
        self.handlers.insert(task_type, handler);
    }

    /// Register a capability for discovery
    pub fn register_capability(&mut self, capability: Capability) {
        self.capabilities.push(capability);
    }

    /// Build this agent's card
    pub fn card(&self) -> AgentCard {
        let mut card = AgentCard::new(&self.agent_id, &self.name, &self.description)
            .with_version(&self.version)
            .with_endpoint("card", format!("{}/card", self.base_url))
            .with_endpoint("tasks", format!("{}/tasks", self.base_url));
        card.capabilities = self.capabilities.clone();
        card
    }

    /// Receive an incoming task
    ///
    /// Rejects the task before anything is persisted when it is addressed to
    /// another agent or carries an unknown type — the caller must not assume
    /// a rejected task exists. Otherwise the task is transitioned to
    /// `in_progress`, persisted, and its handler is scheduled on the async
    /// executor; the call returns immediately with the stored task, so a
    /// concurrent status read can never observe `pending` once the handler
    /// has begun. Re-delivery of the same task id replaces the stored record
    /// rather than duplicating it.
    pub async fn receive(&self, mut task: Task) -> DispatchResult<Task> {
        if task.target_agent_id != self.agent_id {
            return Err(DispatchError::TargetMismatch {
                agent_id: self.agent_id.clone(),
                target: task.target_agent_id,
            });
        }

        let handler = self
            .handlers
            .get(&task.task_type)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownTaskType {
                task_type: task.task_type.clone(),
            })?;

        task.transition(TaskStatus::InProgress)?;
        self.store.upsert(task.clone()).await?;

        let agent_id = self.agent_id.clone();
        let store = Arc::clone(&self.store);
        let running = task.clone();
        tokio::spawn(async move {
            Self::process(agent_id, store, handler, running).await;
        });

        Ok(task)
    }

    /// Run the handler and apply the terminal transition
    async fn process(
        agent_id: String,
        store: Arc<dyn TaskStore>,
        handler: Arc<dyn TaskHandler>,
        task: Task,
    ) {
        info!(agent_id = %agent_id, task_id = %task.id, task_type = %task.task_type, "Processing task");

        let task_id = task.id.clone();
        let outcome = handler.handle(task.clone()).await;
        Self::complete(&agent_id, store.as_ref(), task, outcome).await;

        info!(agent_id = %agent_id, task_id = %task_id, "Task settled");
    }

    /// Apply a terminal transition and persist
    ///
    /// On handler error the task is moved to `failed` with the error text in
    /// metadata; a task is never left `in_progress` past its handler's
    /// return. A store failure here is an accepted at-most-once durability
    /// gap: the transition happened in memory but may not survive a crash.
    async fn complete(
        agent_id: &str,
        store: &dyn TaskStore,
        fallback: Task,
        outcome: DispatchResult<Task>,
    ) {
        let settled = match outcome {
            Ok(mut task) => {
                if let Err(e) = task.transition(TaskStatus::Completed) {
                    error!(agent_id = %agent_id, task_id = %task.id, "Completion rejected: {}", e);
                }
                task
            }
            Err(e) => {
                let mut task = fallback;
                error!(agent_id = %agent_id, task_id = %task.id, "Error processing task: {}", e);
                if let Err(te) = task.transition(TaskStatus::Failed) {
                    error!(agent_id = %agent_id, task_id = %task.id, "Failure transition rejected: {}", te);
                }
                task.insert_metadata("error", json!(e.to_string()));
                task
            }
        };

        if let Err(e) = store.upsert(settled).await {
            error!(agent_id = %agent_id, "Failed to persist task outcome: {}", e);
        }
    }

    /// Get a task owned by this runtime
    pub async fn get_task(&self, task_id: &str) -> DispatchResult<Option<Task>> {
        self.store.get(task_id).await
    }

    /// List tasks owned by this runtime
    pub async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        order_by: TimeField,
        limit: usize,
    ) -> DispatchResult<Vec<Task>> {
        self.store.list_by_status(status, order_by, limit).await
    }

    /// Apply a partial update to a stored task
    ///
    /// `status` in the patch is routed through the state machine, so a
    /// terminal task cannot be revived and an `in_progress` task cannot be
    /// canceled.
    pub async fn update_task(&self, task_id: &str, patch: TaskPatch) -> DispatchResult<Task> {
        let mut task = self
            .store
            .get(task_id)
            .await?
            .ok_or_else(|| DispatchError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;

        task.apply_patch(patch)?;
        self.store.upsert(task.clone()).await?;

        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::store::MemoryTaskStore;

    fn runtime() -> AgentRuntime {
        AgentRuntime::new(
            "poster",
            "Poster",
            "Publishes posts",
            Arc::new(MemoryTaskStore::new()),
        )
    }

    async fn wait_for_terminal(runtime: &AgentRuntime, task_id: &str) -> Task {
        for _ in 0..100 {
            if let Some(task) = runtime.get_task(task_id).await.unwrap() {
                if task.is_terminal() {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} never settled", task_id);
    }

    #[tokio::test]
    async fn test_receive_rejects_target_mismatch() {
        let mut rt = runtime();
        rt.register_handler("noop", handler_fn(|task| async move { Ok(task) }));

        let task = Task::new("noop", "scheduler", "someone-else");
        let id = task.id.clone();
        let err = rt.receive(task).await.unwrap_err();
        assert!(matches!(err, DispatchError::TargetMismatch { .. }));

        // rejected before persistence
        assert!(rt.get_task(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_receive_rejects_unknown_type() {
        let rt = runtime();
        let task = Task::new("mystery", "scheduler", "poster");
        let id = task.id.clone();

        let err = rt.receive(task).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownTaskType { .. }));
        assert!(rt.get_task(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_receive_returns_in_progress_then_completes() {
        let mut rt = runtime();
        rt.register_handler(
            "noop",
            handler_fn(|mut task| async move {
                task.insert_metadata("seen", json!(true));
                Ok(task)
            }),
        );

        let task = Task::new("noop", "scheduler", "poster");
        let id = task.id.clone();

        let accepted = rt.receive(task).await.unwrap();
        assert_eq!(accepted.status, TaskStatus::InProgress);

        // the stored record is already in_progress, never pending
        let stored = rt.get_task(&id).await.unwrap().unwrap();
        assert_ne!(stored.status, TaskStatus::Pending);

        let settled = wait_for_terminal(&rt, &id).await;
        assert_eq!(settled.status, TaskStatus::Completed);
        assert_eq!(settled.metadata.get("seen"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_failing_handler_leaves_failed_with_error() {
        let mut rt = runtime();
        rt.register_handler(
            "explode",
            handler_fn(|_task| async move {
                Err(DispatchError::Validation("raw_text is required".into()))
            }),
        );

        let task = Task::new("explode", "scheduler", "poster");
        let id = task.id.clone();
        rt.receive(task).await.unwrap();

        let settled = wait_for_terminal(&rt, &id).await;
        assert_eq!(settled.status, TaskStatus::Failed);
        let error = settled.metadata.get("error").and_then(|v| v.as_str()).unwrap();
        assert!(!error.is_empty());
    }

    #[tokio::test]
    async fn test_receive_is_idempotent_per_task_id() {
        let mut rt = runtime();
        rt.register_handler("noop", handler_fn(|task| async move { Ok(task) }));

        let task = Task::new("noop", "scheduler", "poster");
        let id = task.id.clone();

        rt.receive(task.clone()).await.unwrap();
        wait_for_terminal(&rt, &id).await;

        // re-delivery after a (simulated) restart reproduces one stored task
        rt.receive(task).await.unwrap();
        let settled = wait_for_terminal(&rt, &id).await;
        assert_eq!(settled.id, id);

        let all = rt
            .list_tasks(None, TimeField::CreatedAt, 100)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_last_handler_registration_wins() {
        let mut rt = runtime();
        rt.register_handler(
            "noop",
            handler_fn(|mut task| async move {
                task.insert_metadata("version", json!(1));
                Ok(task)
            }),
        );
        rt.register_handler(
            "noop",
            handler_fn(|mut task| async move {
                task.insert_metadata("version", json!(2));
                Ok(task)
            }),
        );

        let task = Task::new("noop", "scheduler", "poster");
        let id = task.id.clone();
        rt.receive(task).await.unwrap();

        let settled = wait_for_terminal(&rt, &id).await;
        assert_eq!(settled.metadata.get("version"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_update_task_cancels_pending_only() {
        let rt = runtime();

        // seed a pending task directly; it was never accepted
        let task = Task::new("later", "scheduler", "poster");
        let id = task.id.clone();
        rt.store.upsert(task).await.unwrap();

        let updated = rt
            .update_task(&id, TaskPatch::status(TaskStatus::Canceled))
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Canceled);

        // terminal now; no further transitions
        let err = rt
            .update_task(&id, TaskPatch::status(TaskStatus::InProgress))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transition { .. }));
    }

    #[tokio::test]
    async fn test_card_reflects_capabilities() {
        let mut rt = runtime();
        rt.register_capability(Capability::new("publish_post", "Publish", "Publishes a post"));

        let card = rt.card();
        assert_eq!(card.id, "poster");
        assert_eq!(card.capabilities.len(), 1);
        assert!(card.endpoints.contains_key("tasks"));
    }
}
