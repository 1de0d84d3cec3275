//! Content scheduling agent
//!
//! Binds the `schedule_content`, `post_status_update`, and
//! `fetch_platform_analytics` handlers to an [`AgentRuntime`], owns the
//! deferred-job scheduler, and provides the [`PostPublisher`] the drain
//! loop invokes when a post comes due.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::{
    client::DispatchClient,
    platform::{Credentials, PlatformApi},
    protocol::{
        agent::Capability,
        error::{DispatchError, DispatchResult},
        task::{DataPart, Task},
    },
    runtime::{handler_fn, AgentRuntime},
    scheduler::{DeferredJob, DrainLoop, JobStore, PublishHandler, PublishQueue, Scheduler},
    store::PostStore,
    transport::Transport,
};

use super::{
    adapt::adapt,
    post::{AdaptationRules, ContentKind, Platform, PostStatus, ScheduledPost},
};

fn required_str<'a>(data: &'a Value, field: &str) -> DispatchResult<&'a str> {
    data.get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| DispatchError::Validation(format!("{} is required", field)))
}

fn json_part(task: &Task) -> DispatchResult<DataPart> {
    task.part_with_content_type("application/json")
        .cloned()
        .ok_or_else(|| DispatchError::Validation("No content data found in task".into()))
}

struct Inner {
    posts: Arc<dyn PostStore>,
    scheduler: Scheduler,
    rules: HashMap<Platform, AdaptationRules>,
    api: Arc<dyn PlatformApi>,
    media_dir: PathBuf,
}

/// Content scheduling agent
///
/// Validates inbound scheduling tasks, adapts the content per platform,
/// persists the post, and registers a deferred job for its schedule time.
/// Publication itself happens later, on the drain side, through the
/// [`PostPublisher`] this constructor wires up.
#[derive(Clone)]
pub struct ContentScheduler {
    inner: Arc<Inner>,
}

impl ContentScheduler {
    /// Wire up a scheduler and its publish pipeline
    ///
    /// Starts the timer thread over `jobs` with a fire callback that only
    /// appends to the publish queue, and returns the drain loop for the
    /// caller to spawn on its runtime. Dropping the returned scheduler
    /// stops the timer thread, which in turn closes the queue and ends the
    /// drain loop.
    pub fn new<T: Transport>(
        posts: Arc<dyn PostStore>,
        jobs: Arc<dyn JobStore>,
        client: Arc<DispatchClient<T>>,
        api: Arc<dyn PlatformApi>,
        media_dir: impl Into<PathBuf>,
    ) -> DispatchResult<(Self, DrainLoop)> {
        let media_dir = media_dir.into();
        std::fs::create_dir_all(&media_dir).map_err(DispatchError::persistence)?;

        let (queue, receiver) = PublishQueue::channel();
        let scheduler = Scheduler::start(jobs, move |job| queue.enqueue(job.arg))?;

        let publisher = PostPublisher::new(Arc::clone(&posts), client, Arc::clone(&api));
        let drain = DrainLoop::new(receiver, Arc::new(publisher));

        let inner = Arc::new(Inner {
            posts,
            scheduler,
            rules: AdaptationRules::defaults(),
            api,
            media_dir,
        });

        Ok((Self { inner }, drain))
    }

    /// Register this agent's capabilities and handlers on a runtime
    pub fn bind(&self, runtime: &mut AgentRuntime) {
        runtime.register_capability(
            Capability::new(
                "schedule_content",
                "Schedule Content",
                "Adapts social media content per platform and schedules it for publication",
            )
            .with_parameters(json!({
                "user_id": {"type": "string"},
                "raw_text": {"type": "string"},
                "image_data": {"type": "string", "description": "Optional base64-encoded image"},
                "target_platforms": {"type": "array", "items": {"type": "string"}},
                "schedule_time": {"type": "string", "format": "date-time"},
                "credentials": {"type": "object"}
            })),
        );
        runtime.register_capability(
            Capability::new(
                "post_status_update",
                "Post Status Update",
                "Records the per-platform outcome of a published post",
            )
            .with_parameters(json!({
                "post_id": {"type": "string"},
                "platform": {"type": "string"},
                "status": {"type": "string", "enum": ["success", "failure"]},
                "platform_post_id": {"type": "string"},
                "error_message": {"type": "string"}
            })),
        );
        runtime.register_capability(
            Capability::new(
                "fetch_platform_analytics",
                "Fetch Platform Analytics",
                "Retrieves engagement metrics for a published post",
            )
            .with_parameters(json!({
                "platform_post_id": {"type": "string"},
                "credentials": {"type": "object"}
            })),
        );

        let this = self.clone();
        runtime.register_handler(
            "schedule_content",
            handler_fn(move |task| {
                let this = this.clone();
                async move { this.handle_schedule(task).await }
            }),
        );

        let this = self.clone();
        runtime.register_handler(
            "post_status_update",
            handler_fn(move |task| {
                let this = this.clone();
                async move { this.handle_status_update(task).await }
            }),
        );

        let this = self.clone();
        runtime.register_handler(
            "fetch_platform_analytics",
            handler_fn(move |task| {
                let this = this.clone();
                async move { this.handle_fetch_analytics(task).await }
            }),
        );
    }

    async fn handle_schedule(&self, mut task: Task) -> DispatchResult<Task> {
        let part = json_part(&task)?;
        let data = &part.data;

        let user_id = required_str(data, "user_id")?;
        let raw_text = required_str(data, "raw_text")?;
        let schedule_time_raw = required_str(data, "schedule_time")?;

        let requested = data
            .get("target_platforms")
            .and_then(Value::as_array)
            .filter(|list| !list.is_empty())
            .ok_or_else(|| DispatchError::Validation("target_platforms is required".into()))?;

        let mut platforms = Vec::new();
        for name in requested.iter().filter_map(Value::as_str) {
            match name.parse::<Platform>() {
                Ok(platform) => platforms.push(platform),
                Err(e) => warn!("{}", e),
            }
        }
        if platforms.is_empty() {
            return Err(DispatchError::Validation(
                "No valid target platforms specified".into(),
            ));
        }

        let schedule_time = chrono::DateTime::parse_from_rfc3339(schedule_time_raw)
            .map_err(|_| {
                DispatchError::Validation(format!(
                    "Invalid schedule time format: {}",
                    schedule_time_raw
                ))
            })?
            .with_timezone(&chrono::Utc);

        let credentials = match data.get("credentials") {
            Some(value) => serde_json::from_value::<HashMap<Platform, Credentials>>(value.clone())
                .map_err(|e| DispatchError::Validation(format!("Malformed credentials: {}", e)))?,
            None => HashMap::new(),
        };

        let mut post = ScheduledPost::new(user_id, &task.source_agent_id, raw_text, schedule_time)
            .with_platforms(platforms.clone())
            .with_credentials(credentials)
            .with_status(PostStatus::Scheduled);

        if let Some(image_data) = data.get("image_data").and_then(Value::as_str) {
            post.content_kind = ContentKind::Image;
            post.image_reference = self.save_image(&post.id, image_data).await;
        }

        for platform in &platforms {
            match self.inner.rules.get(platform) {
                Some(rules) => {
                    let adapted =
                        adapt(raw_text, post.image_reference.as_deref(), *platform, rules);
                    post.content.insert(*platform, adapted);
                }
                None => warn!(platform = %platform, "No adaptation rules for platform"),
            }
        }

        self.inner.posts.upsert(post.clone()).await?;
        self.inner
            .scheduler
            .schedule(DeferredJob::for_post(&post.id, schedule_time))?;

        info!(post_id = %post.id, schedule_time = %schedule_time, "Scheduled post for publication");

        task.insert_metadata("post_id", json!(post.id));
        task.insert_metadata("schedule_time", json!(schedule_time.to_rfc3339()));
        Ok(task)
    }

    /// Decode and store an inline image, returning its reference
    ///
    /// A bad payload is logged and the post goes out without the image,
    /// matching the non-fatal handling of other image problems.
    async fn save_image(&self, post_id: &str, image_data: &str) -> Option<String> {
        let bytes = match base64::engine::general_purpose::STANDARD.decode(image_data) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(post_id = %post_id, "Failed to decode image data: {}", e);
                return None;
            }
        };

        let path = self.inner.media_dir.join(format!("{}.jpg", post_id));
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => Some(path.to_string_lossy().into_owned()),
            Err(e) => {
                error!(post_id = %post_id, "Failed to save image: {}", e);
                None
            }
        }
    }

    async fn handle_status_update(&self, task: Task) -> DispatchResult<Task> {
        let part = json_part(&task)?;
        let data = &part.data;

        let post_id = required_str(data, "post_id")?;
        let platform: Platform = required_str(data, "platform")?
            .parse()
            .map_err(|e| DispatchError::Validation(format!("{}", e)))?;
        let status = required_str(data, "status")?;
        let platform_post_id = data.get("platform_post_id").and_then(Value::as_str);
        let error_message = data.get("error_message").and_then(Value::as_str);

        let Some(mut post) = self.inner.posts.get(post_id).await? else {
            warn!(post_id = %post_id, "Post not found for status update");
            return Ok(task);
        };

        match (status, platform_post_id) {
            ("success", Some(external_id)) => {
                post.platform_post_ids
                    .insert(platform, external_id.to_string());
                info!(
                    post_id = %post_id, platform = %platform, external_id = %external_id,
                    "Post published"
                );
            }
            ("failure", _) => {
                error!(
                    post_id = %post_id, platform = %platform,
                    "Failed to publish post: {}",
                    error_message.unwrap_or("unknown error")
                );
            }
            _ => {
                warn!(post_id = %post_id, status = %status, "Status update without outcome detail");
            }
        }

        post.touch();
        self.inner.posts.upsert(post).await?;
        Ok(task)
    }

    async fn handle_fetch_analytics(&self, mut task: Task) -> DispatchResult<Task> {
        let part = json_part(&task)?;
        let data = &part.data;

        let platform_post_id = required_str(data, "platform_post_id")?;
        let credentials = data
            .get("credentials")
            .cloned()
            .ok_or_else(|| DispatchError::Validation("credentials is required".into()))?;
        let credentials: Credentials = serde_json::from_value(credentials)
            .map_err(|e| DispatchError::Validation(format!("Malformed credentials: {}", e)))?;

        let metrics = self
            .inner
            .api
            .fetch_analytics(&credentials, platform_post_id)
            .await?;

        task.insert_metadata("analytics", json!(metrics));
        task.add_data_part(DataPart::json(json!({
            "platform_post_id": platform_post_id,
            "analytics": metrics,
        })));

        info!(platform_post_id = %platform_post_id, "Fetched analytics");
        Ok(task)
    }
}

/// Publish handler invoked by the drain loop for due posts
///
/// Attempts every target platform through the remote publish boundary,
/// marks the post `published` or `failed`, and reports each platform's
/// outcome as a new `post_status_update` task to the post's originating
/// agent — never as a direct mutation of another agent's state.
pub struct PostPublisher<T: Transport> {
    posts: Arc<dyn PostStore>,
    client: Arc<DispatchClient<T>>,
    api: Arc<dyn PlatformApi>,
}

impl<T: Transport> PostPublisher<T> {
    /// Create a publisher
    pub fn new(
        posts: Arc<dyn PostStore>,
        client: Arc<DispatchClient<T>>,
        api: Arc<dyn PlatformApi>,
    ) -> Self {
        Self { posts, client, api }
    }

    async fn send_status_update(&self, post: &ScheduledPost, data: Value) {
        let result = self
            .client
            .send_task(
                &post.origin_agent_id,
                "post_status_update",
                vec![DataPart::json(data)],
                None,
                None,
            )
            .await;

        // dispatch failures are logged, not retried
        if let Err(e) = result {
            error!(
                post_id = %post.id, target = %post.origin_agent_id,
                "Error sending status update: {}", e
            );
        }
    }
}

#[async_trait]
impl<T: Transport> PublishHandler for PostPublisher<T> {
    async fn publish(&self, post_id: &str) -> DispatchResult<()> {
        let Some(mut post) = self.posts.get(post_id).await? else {
            return Err(DispatchError::Protocol(format!(
                "Post {} not found for publication",
                post_id
            )));
        };

        match post.status {
            PostStatus::Published => {
                warn!(post_id = %post_id, "Post already published; skipping stale firing");
                return Ok(());
            }
            PostStatus::Canceled => {
                info!(post_id = %post_id, "Post canceled; skipping publication");
                return Ok(());
            }
            _ => {}
        }

        let mut outcomes = Vec::new();
        for platform in post.target_platforms.clone() {
            let Some(content) = post.content.get(&platform).cloned() else {
                warn!(post_id = %post_id, platform = %platform, "No content for platform");
                continue;
            };

            let credentials = post.credentials.get(&platform).cloned().unwrap_or_default();
            let outcome = self
                .api
                .publish(
                    &credentials,
                    &content.text,
                    content.image_reference.as_deref(),
                    platform,
                )
                .await;
            outcomes.push((platform, outcome));
        }

        let any_published = outcomes.iter().any(|(_, outcome)| outcome.is_ok());
        post.status = if any_published {
            PostStatus::Published
        } else {
            PostStatus::Failed
        };
        post.touch();
        self.posts.upsert(post.clone()).await?;

        for (platform, outcome) in outcomes {
            let data = match outcome {
                Ok(receipt) => json!({
                    "post_id": post.id,
                    "platform": platform,
                    "status": "success",
                    "platform_post_id": receipt.external_id,
                }),
                Err(e) => json!({
                    "post_id": post.id,
                    "platform": platform,
                    "status": "failure",
                    "error_message": e.to_string(),
                }),
            };
            self.send_status_update(&post, data).await;
        }

        Ok(())
    }
}
