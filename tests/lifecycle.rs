//! Task lifecycle tests across the full client → transport → runtime path

use std::sync::Arc;

use serde_json::json;
use tower_dispatch::{
    client::DispatchClientBuilder,
    protocol::{DataPart, DispatchError, Task, TaskStatus},
    runtime::{handler_fn, AgentRuntime},
    store::{MemoryTaskStore, TaskStore, TimeField},
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn poster_runtime() -> Arc<AgentRuntime> {
    let mut rt = AgentRuntime::new(
        "poster",
        "Poster",
        "Publishes posts",
        Arc::new(MemoryTaskStore::new()),
    );
    rt.register_handler(
        "echo",
        handler_fn(|mut task| async move {
            task.insert_metadata("echoed", json!(true));
            Ok(task)
        }),
    );
    rt.register_handler(
        "explode",
        handler_fn(|_task| async move {
            Err(DispatchError::Validation("raw_text is required".into()))
        }),
    );
    Arc::new(rt)
}

#[tokio::test]
async fn task_round_trip_completes() {
    init_tracing();
    let runtime = poster_runtime();
    let client = DispatchClientBuilder::local("origin-agent")
        .with_runtime(&runtime)
        .build();

    let accepted = client
        .send_task(
            "poster",
            "echo",
            vec![DataPart::json(json!({"k": "v"}))],
            None,
            None,
        )
        .await
        .unwrap();

    // acceptance is decoupled from completion
    assert_eq!(accepted.status, TaskStatus::InProgress);
    assert_eq!(accepted.source_agent_id, "origin-agent");

    let settled = client
        .poll_until_terminal("poster", &accepted.id, 10, 500)
        .await
        .unwrap();
    assert_eq!(settled.status, TaskStatus::Completed);
    assert_eq!(settled.metadata.get("echoed"), Some(&json!(true)));
}

#[tokio::test]
async fn failed_handler_reports_error_metadata() {
    init_tracing();
    let runtime = poster_runtime();
    let client = DispatchClientBuilder::local("origin-agent")
        .with_runtime(&runtime)
        .build();

    let accepted = client
        .send_task("poster", "explode", Vec::new(), None, None)
        .await
        .unwrap();

    let settled = client
        .poll_until_terminal("poster", &accepted.id, 10, 500)
        .await
        .unwrap();

    assert_eq!(settled.status, TaskStatus::Failed);
    let error = settled
        .metadata
        .get("error")
        .and_then(|value| value.as_str())
        .unwrap();
    assert!(!error.is_empty());
}

#[tokio::test]
async fn terminal_tasks_reject_further_transitions() {
    init_tracing();
    let runtime = poster_runtime();
    let client = DispatchClientBuilder::local("origin-agent")
        .with_runtime(&runtime)
        .build();

    let accepted = client
        .send_task("poster", "echo", Vec::new(), None, None)
        .await
        .unwrap();
    let settled = client
        .poll_until_terminal("poster", &accepted.id, 10, 500)
        .await
        .unwrap();
    assert!(settled.is_terminal());

    // the PATCH path routes status through the state machine: a terminal
    // task cannot move anywhere
    for next in [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Failed,
        TaskStatus::Canceled,
    ] {
        let result = client
            .update_task_status("poster", &accepted.id, next, None)
            .await;
        assert!(result.is_err(), "terminal task accepted move to {:?}", next);
    }

    let unchanged = client.get_task("poster", &accepted.id).await.unwrap();
    assert_eq!(unchanged.status, TaskStatus::Completed);
}

#[tokio::test]
async fn redelivered_task_is_not_duplicated() {
    init_tracing();
    let runtime = poster_runtime();
    let client = DispatchClientBuilder::local("origin-agent")
        .with_runtime(&runtime)
        .build();

    let mut task = Task::new("echo", "origin-agent", "poster");
    task.data_parts = vec![DataPart::json(json!({"n": 1}))];

    let first = client.send(task.clone()).await.unwrap();
    client
        .poll_until_terminal("poster", &first.id, 10, 500)
        .await
        .unwrap();

    // the submitting side re-sends after a simulated restart
    let second = client.send(task).await.unwrap();
    assert_eq!(second.id, first.id);

    client
        .poll_until_terminal("poster", &second.id, 10, 500)
        .await
        .unwrap();

    let stored = runtime
        .list_tasks(None, TimeField::CreatedAt, 100)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn pending_task_can_be_canceled_once() {
    init_tracing();
    let runtime = poster_runtime();
    let client = DispatchClientBuilder::local("origin-agent")
        .with_runtime(&runtime)
        .build();

    // a task parked in the store that was never accepted
    let task = Task::new("later", "origin-agent", "poster");
    let id = task.id.clone();
    runtime.store().upsert(task).await.unwrap();

    let canceled = client.cancel_task("poster", &id).await.unwrap();
    assert_eq!(canceled.status, TaskStatus::Canceled);

    // cancellation is terminal; a second cancel is rejected
    assert!(client.cancel_task("poster", &id).await.is_err());
}

#[tokio::test]
async fn unknown_task_type_is_rejected_without_persisting() {
    init_tracing();
    let runtime = poster_runtime();
    let client = DispatchClientBuilder::local("origin-agent")
        .with_runtime(&runtime)
        .build();

    let task = Task::new("mystery", "origin-agent", "poster");
    let id = task.id.clone();

    let err = client.send(task).await.unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));

    // the caller must not assume the task exists
    let err = client.get_task("poster", &id).await.unwrap_err();
    assert!(matches!(err, DispatchError::TaskNotFound { .. }));
}

#[tokio::test]
async fn discovery_returns_agent_card() {
    init_tracing();
    let runtime = poster_runtime();
    let client = DispatchClientBuilder::local("origin-agent")
        .with_runtime(&runtime)
        .build();

    let card = client.discover("poster").await.unwrap();
    assert_eq!(card.id, "poster");
    assert!(card.endpoints.contains_key("tasks"));
}
