//! Validation layer for dispatch requests

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower_layer::Layer;
use tower_service::Service;

use crate::{
    protocol::{error::DispatchError, operation::DispatchOperation, task::Task},
    service::{DispatchRequest, DispatchResponse},
};

/// Layer that validates dispatch requests before they reach the wire
#[derive(Clone, Debug, Default)]
pub struct TaskValidationLayer;

impl TaskValidationLayer {
    /// Create a new validation layer
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TaskValidationLayer {
    type Service = TaskValidationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TaskValidationService { inner }
    }
}

/// Validation service that wraps an inner service
#[derive(Clone)]
pub struct TaskValidationService<S> {
    inner: S,
}

impl<S> TaskValidationService<S> {
    fn validate_task(task: &Task) -> Result<(), DispatchError> {
        if task.id.is_empty() {
            return Err(DispatchError::Validation("Task id cannot be empty".into()));
        }
        if task.task_type.is_empty() {
            return Err(DispatchError::Validation(
                "Task type cannot be empty".into(),
            ));
        }
        if task.source_agent_id.is_empty() {
            return Err(DispatchError::Validation(
                "Task source agent id cannot be empty".into(),
            ));
        }
        if task.target_agent_id.is_empty() {
            return Err(DispatchError::Validation(
                "Task target agent id cannot be empty".into(),
            ));
        }
        for part in &task.data_parts {
            if part.content_type.is_empty() {
                return Err(DispatchError::Validation(
                    "Data part content type cannot be empty".into(),
                ));
            }
        }
        Ok(())
    }

    /// Validate a dispatch request
    fn validate_request(req: &DispatchRequest) -> Result<(), DispatchError> {
        match &req.operation {
            DispatchOperation::SendTask { task } => Self::validate_task(task)?,
            DispatchOperation::GetTask { task_id } => {
                if task_id.is_empty() {
                    return Err(DispatchError::Validation("Task ID cannot be empty".into()));
                }
            }
            DispatchOperation::UpdateTask { task_id, patch } => {
                if task_id.is_empty() {
                    return Err(DispatchError::Validation("Task ID cannot be empty".into()));
                }
                if patch.is_empty() {
                    return Err(DispatchError::Validation(
                        "Patch must carry at least one change".into(),
                    ));
                }
            }
            DispatchOperation::ListTasks { limit, .. } => {
                if let Some(limit_val) = limit {
                    if *limit_val == 0 {
                        return Err(DispatchError::Validation(
                            "Limit must be greater than 0".into(),
                        ));
                    }
                    if *limit_val > 1000 {
                        return Err(DispatchError::Validation(
                            "Limit cannot exceed 1000".into(),
                        ));
                    }
                }
            }
            DispatchOperation::DiscoverAgent => {}
        }
        Ok(())
    }
}

impl<S> Service<DispatchRequest> for TaskValidationService<S>
where
    S: Service<DispatchRequest, Response = DispatchResponse, Error = DispatchError>,
    S::Future: Send + 'static,
{
    type Response = DispatchResponse;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: DispatchRequest) -> Self::Future {
        if let Err(e) = Self::validate_request(&req) {
            return Box::pin(async move { Err(e) });
        }

        let future = self.inner.call(req);
        Box::pin(future)
    }
}
