//! Core dispatch protocol types and definitions

pub mod agent;
pub mod error;
pub mod operation;
pub mod task;

pub use agent::{AgentCard, Capability};
pub use error::{DispatchError, DispatchResult, TransitionError};
pub use operation::DispatchOperation;
pub use task::{DataPart, Task, TaskListResponse, TaskPatch, TaskStatus};
