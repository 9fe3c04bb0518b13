//! Integration tests for the command center.
//!
//! Tests cover the end-to-end orchestration contract:
//! 1. Every submitted task reaches exactly one terminal status
//! 2. FIFO: a task submitted first is never still pending once a
//!    later task has finished
//! 3. Cancellation of a queued task prevents processing
//! 4. Metrics reflect processed work
//! 5. stop/start round-trips cleanly

use autoforge::center::CommandCenter;
use autoforge::config::OrchestratorConfig;
use autoforge::store::TaskOutcome;
use autoforge::task::{Task, TaskStatus};
use autoforge::Language;
use std::time::Duration;

/// Helper: a hermetic config — no interpreter processes, fast loops.
fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        sandbox_enabled: false,
        improvement_enabled: false,
        dispatch_idle_ms: 10,
        improvement_poll_secs: 1,
        ..OrchestratorConfig::default()
    }
}

/// Helper: poll a task until it reaches a terminal status or the budget
/// runs out.
async fn wait_terminal(center: &CommandCenter, id: &str) -> TaskStatus {
    for _ in 0..200 {
        let status = center.status(id).await;
        if status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    center.status(id).await
}

// ─── TEST 1: exactly one terminal status ─────────────────────────────────

#[tokio::test]
async fn test_every_submitted_task_reaches_one_terminal_status() {
    let center = CommandCenter::new(test_config()).unwrap();
    center.start();

    let mut ids = Vec::new();
    for i in 0..10 {
        let task = Task::new(format!("task {i}"), format!("do task {i}"), Language::Python);
        ids.push(center.submit(task).await);
    }

    for id in &ids {
        let status = wait_terminal(&center, id).await;
        assert!(status.is_terminal(), "task {id} never finished: {status}");
        // Exactly one outcome: artifact xor error.
        match center.result(id).await {
            TaskOutcome::Artifact(_) => assert_eq!(status, TaskStatus::Completed),
            TaskOutcome::Error(_) => assert_ne!(status, TaskStatus::Completed),
            TaskOutcome::Unresolved => panic!("terminal task {id} has no outcome"),
        }
    }

    center.stop().await;

    // Terminal statuses are stable after shutdown.
    for id in &ids {
        assert!(center.status(id).await.is_terminal());
    }
}

// ─── TEST 2: FIFO under the single dispatch consumer ─────────────────────

#[tokio::test]
async fn test_earlier_submission_never_outlived_by_later_one() {
    let center = CommandCenter::new(test_config()).unwrap();

    let first = center
        .submit(Task::new("first", "first task", Language::Shell))
        .await;
    let second = center
        .submit(Task::new("second", "second task", Language::Shell))
        .await;

    center.start();

    // While polling, the second task must never be terminal while the
    // first is still pending — the single consumer dequeues in order.
    for _ in 0..200 {
        let first_status = center.status(&first).await;
        let second_status = center.status(&second).await;
        if second_status.is_terminal() {
            assert_ne!(
                first_status,
                TaskStatus::Pending,
                "second task finished while first was still pending"
            );
        }
        if first_status.is_terminal() && second_status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    center.stop().await;
}

// ─── TEST 3: cancelled queued tasks are never processed ──────────────────

#[tokio::test]
async fn test_cancel_while_pending_prevents_processing() {
    let center = CommandCenter::new(test_config()).unwrap();

    let keep = center
        .submit(Task::new("keep", "process me", Language::Python))
        .await;
    let doomed = center
        .submit(Task::new("doomed", "cancel me", Language::Python))
        .await;
    center.cancel(&doomed).await.unwrap();

    center.start();
    let keep_status = wait_terminal(&center, &keep).await;
    center.stop().await;

    assert!(keep_status.is_terminal());
    assert_eq!(center.status(&doomed).await, TaskStatus::Cancelled);
    match center.result(&doomed).await {
        TaskOutcome::Error(msg) => assert!(msg.contains("cancelled")),
        other => panic!("expected cancelled error outcome, got {other:?}"),
    }
}

// ─── TEST 4: metrics reflect processed work ──────────────────────────────

#[tokio::test]
async fn test_metrics_after_processing() {
    let center = CommandCenter::new(test_config()).unwrap();
    center.start();

    let a = center
        .submit(Task::new("metric a", "task a", Language::JavaScript))
        .await;
    let b = center
        .submit(Task::new("metric b", "task b", Language::JavaScript))
        .await;
    wait_terminal(&center, &a).await;
    wait_terminal(&center, &b).await;
    center.stop().await;

    let metrics = center.metrics().await;
    assert_eq!(metrics.processed, 2);
    assert_eq!(metrics.queued, 0);
    assert_eq!(metrics.active_agents, 3);
    assert!(metrics.uptime > Duration::ZERO);
}

// ─── TEST 5: stop/start round-trip ───────────────────────────────────────

#[tokio::test]
async fn test_restart_processes_tasks_queued_while_stopped() {
    let center = CommandCenter::new(test_config()).unwrap();
    center.start();
    center.stop().await;
    assert!(!center.is_running());

    // Queued while stopped; picked up after restart.
    let id = center
        .submit(Task::new("late", "queued while stopped", Language::Rust))
        .await;
    assert_eq!(center.status(&id).await, TaskStatus::Pending);

    center.start();
    let status = wait_terminal(&center, &id).await;
    center.stop().await;

    assert!(status.is_terminal(), "task queued while stopped never ran");
}

// ─── TEST 6: completed tasks carry their artifact ────────────────────────

#[tokio::test]
async fn test_completed_task_result_is_versioned_artifact() {
    let center = CommandCenter::new(test_config()).unwrap();
    center.start();

    let id = center
        .submit(
            Task::new("fizzbuzz", "classic fizzbuzz", Language::Python)
                .with_requirements(vec!["fizz for multiples of three".to_string()]),
        )
        .await;
    let status = wait_terminal(&center, &id).await;
    center.stop().await;

    assert_eq!(status, TaskStatus::Completed);
    match center.result(&id).await {
        TaskOutcome::Artifact(artifact) => {
            assert_eq!(artifact.language, Language::Python);
            assert!(artifact.content.contains("fizz"));
            assert!(artifact.created_at > 0);
        }
        other => panic!("expected artifact, got {other:?}"),
    }
}
