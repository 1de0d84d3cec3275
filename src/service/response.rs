//! Dispatch service response types

use crate::protocol::{agent::AgentCard, task::Task};

/// Response from a dispatch service operation
#[derive(Debug, Clone)]
pub enum DispatchResponse {
    /// Task response (from SendTask, GetTask, UpdateTask)
    Task(Box<Task>),

    /// Task list response (from ListTasks)
    TaskList {
        /// The tasks matching the query
        tasks: Vec<Task>,

        /// Total number of tasks
        total: usize,
    },

    /// Agent card response (from DiscoverAgent)
    AgentCard(Box<AgentCard>),

    /// Empty response (for operations with no return value)
    Empty,
}

impl DispatchResponse {
    /// Extract a task from the response, if present
    pub fn into_task(self) -> Option<Task> {
        match self {
            DispatchResponse::Task(task) => Some(*task),
            _ => None,
        }
    }

    /// Extract a task list from the response, if present
    pub fn into_task_list(self) -> Option<Vec<Task>> {
        match self {
            DispatchResponse::TaskList { tasks, .. } => Some(tasks),
            _ => None,
        }
    }

    /// Extract an agent card from the response, if present
    pub fn into_agent_card(self) -> Option<AgentCard> {
        match self {
            DispatchResponse::AgentCard(card) => Some(*card),
            _ => None,
        }
    }

    /// Check if the response is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, DispatchResponse::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_task() {
        let task = Task::new("publish_post", "scheduler", "poster");
        let id = task.id.clone();
        let response = DispatchResponse::Task(Box::new(task));

        let extracted = response.into_task();
        assert!(extracted.is_some());
        assert_eq!(extracted.unwrap().id, id);
    }

    #[test]
    fn test_response_task_list() {
        let response = DispatchResponse::TaskList {
            tasks: vec![
                Task::new("a", "s", "t"),
                Task::new("b", "s", "t"),
            ],
            total: 2,
        };

        let extracted = response.into_task_list();
        assert!(extracted.is_some());
        assert_eq!(extracted.unwrap().len(), 2);
    }

    #[test]
    fn test_response_empty() {
        let response = DispatchResponse::Empty;
        assert!(response.is_empty());
        assert!(response.into_task().is_none());
    }
}
