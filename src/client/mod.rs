//! High-level client API for dispatching tasks to agents

pub mod builder;
pub mod config;
pub mod dispatch;

pub use builder::DispatchClientBuilder;
pub use config::ClientConfig;
pub use dispatch::DispatchClient;
