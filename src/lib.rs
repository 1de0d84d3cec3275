//! # Tower Dispatch
//!
//! Task dispatch and deferred scheduling for cooperating agents, built on
//! Tower's Service and Layer abstractions.
//!
//! Agents exchange units of work (tasks) over a fire-and-forget
//! request/response boundary: a [`DispatchClient`](client::DispatchClient)
//! posts a task to a named target agent, whose
//! [`AgentRuntime`](runtime::AgentRuntime) validates it, persists it, and
//! runs the registered handler without blocking acceptance. Outcomes flow
//! back as *new* status-update tasks, never as cross-process mutation.
//!
//! Deferred work rides on a separate timer thread: the
//! [`Scheduler`](scheduler::Scheduler) fires due jobs into a concurrent
//! [`PublishQueue`](scheduler::PublishQueue), and the
//! [`DrainLoop`](scheduler::DrainLoop) consumes them inside the async
//! context, where the real network-calling publish handler runs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tower_dispatch::prelude::*;
//! use tower_dispatch::{protocol::DataPart, store::MemoryTaskStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), DispatchError> {
//!     let mut runtime = AgentRuntime::new(
//!         "echo-agent",
//!         "Echo Agent",
//!         "Echoes tasks back",
//!         Arc::new(MemoryTaskStore::new()),
//!     );
//!     runtime.register_handler("echo", handler_fn(|task| async move { Ok(task) }));
//!     let runtime = Arc::new(runtime);
//!
//!     let client = DispatchClientBuilder::local("cli")
//!         .with_runtime(&runtime)
//!         .build();
//!
//!     let part = DataPart::json(serde_json::json!({"hello": "world"}));
//!     let task = client
//!         .send_task("echo-agent", "echo", vec![part], None, None)
//!         .await?;
//!     println!("Task accepted: {} ({:?})", task.id, task.status);
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod content;
pub mod layer;
pub mod platform;
pub mod protocol;
pub mod runtime;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        client::{DispatchClient, DispatchClientBuilder},
        content::{ContentScheduler, Platform, PostStatus, ScheduledPost},
        platform::{Credentials, PlatformApi},
        protocol::error::DispatchError,
        protocol::{AgentCard, Capability, DataPart, DispatchOperation, Task, TaskStatus},
        runtime::{handler_fn, AgentRuntime, TaskHandler},
        scheduler::{DeferredJob, DrainLoop, PublishQueue, Scheduler},
    };
}
