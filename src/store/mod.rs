//! Durable keyed storage boundaries
//!
//! The document store proper is an external collaborator; the core only
//! depends on these traits. Keys are externally-generated identifiers,
//! writes are idempotent upserts, and concurrent writers to the same id are
//! serialized by the store (last writer wins).

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    content::post::{PostStatus, ScheduledPost},
    protocol::{
        error::DispatchResult,
        task::{Task, TaskStatus},
    },
};

/// Time field used to order listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    /// Order by creation time
    CreatedAt,

    /// Order by last update time
    UpdatedAt,
}

/// Durable keyed storage for task records
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert or replace a task, keyed by its id
    async fn upsert(&self, task: Task) -> DispatchResult<()>;

    /// Get a task by id
    async fn get(&self, task_id: &str) -> DispatchResult<Option<Task>>;

    /// List tasks, optionally filtered by status, ordered ascending by the
    /// given time field
    async fn list_by_status(
        &self,
        status: Option<TaskStatus>,
        order_by: TimeField,
        limit: usize,
    ) -> DispatchResult<Vec<Task>>;

    /// Delete a task by id, returning whether it existed
    async fn delete(&self, task_id: &str) -> DispatchResult<bool>;
}

/// In-memory task store
///
/// Suitable for tests and single-process deployments; a document-store
/// backed implementation satisfies the same contract.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl MemoryTaskStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn upsert(&self, task: Task) -> DispatchResult<()> {
        self.tasks.write().await.insert(task.id.clone(), task);
        Ok(())
    }

    async fn get(&self, task_id: &str) -> DispatchResult<Option<Task>> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }

    async fn list_by_status(
        &self,
        status: Option<TaskStatus>,
        order_by: TimeField,
        limit: usize,
    ) -> DispatchResult<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let mut matched: Vec<Task> = tasks
            .values()
            .filter(|task| status.map_or(true, |status| task.status == status))
            .cloned()
            .collect();

        match order_by {
            TimeField::CreatedAt => matched.sort_by_key(|task| task.created_at),
            TimeField::UpdatedAt => matched.sort_by_key(|task| task.updated_at),
        }
        matched.truncate(limit);

        Ok(matched)
    }

    async fn delete(&self, task_id: &str) -> DispatchResult<bool> {
        Ok(self.tasks.write().await.remove(task_id).is_some())
    }
}

/// Durable keyed storage for scheduled posts
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Insert or replace a post, keyed by its id
    async fn upsert(&self, post: ScheduledPost) -> DispatchResult<()>;

    /// Get a post by id
    async fn get(&self, post_id: &str) -> DispatchResult<Option<ScheduledPost>>;

    /// List posts with the given status, schedule time ascending
    async fn list_by_status(
        &self,
        status: PostStatus,
        limit: usize,
    ) -> DispatchResult<Vec<ScheduledPost>>;

    /// List posts owned by a user, creation time descending
    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> DispatchResult<Vec<ScheduledPost>>;

    /// Delete a post by id, returning whether it existed
    async fn delete(&self, post_id: &str) -> DispatchResult<bool>;
}

/// In-memory post store
#[derive(Debug, Default)]
pub struct MemoryPostStore {
    posts: RwLock<HashMap<String, ScheduledPost>>,
}

impl MemoryPostStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn upsert(&self, post: ScheduledPost) -> DispatchResult<()> {
        self.posts.write().await.insert(post.id.clone(), post);
        Ok(())
    }

    async fn get(&self, post_id: &str) -> DispatchResult<Option<ScheduledPost>> {
        Ok(self.posts.read().await.get(post_id).cloned())
    }

    async fn list_by_status(
        &self,
        status: PostStatus,
        limit: usize,
    ) -> DispatchResult<Vec<ScheduledPost>> {
        let posts = self.posts.read().await;
        let mut matched: Vec<ScheduledPost> = posts
            .values()
            .filter(|post| post.status == status)
            .cloned()
            .collect();
        matched.sort_by_key(|post| post.schedule_time);
        matched.truncate(limit);
        Ok(matched)
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> DispatchResult<Vec<ScheduledPost>> {
        let posts = self.posts.read().await;
        let mut matched: Vec<ScheduledPost> = posts
            .values()
            .filter(|post| post.user_id == user_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(limit);
        Ok(matched)
    }

    async fn delete(&self, post_id: &str) -> DispatchResult<bool> {
        Ok(self.posts.write().await.remove(post_id).is_some())
    }
}
