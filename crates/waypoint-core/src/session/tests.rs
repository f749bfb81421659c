//! Tests for the session module.

use super::*;
use crate::{
    error::EngineError,
    models::{CompletionStatus, StepStatus, VerificationStatus},
    params::{CompletePlan, CreatePlan, NewStep, StepSpec, UpdatePlan},
};

/// Helper function to create a store with default configuration
fn create_test_store() -> SessionStore {
    SessionBuilder::new()
        .with_config(EngineConfig::default())
        .build()
        .expect("Failed to create store")
}

fn three_levels() -> CreatePlan {
    CreatePlan {
        goal: "Create 3 levels".to_string(),
        steps: vec![
            StepSpec::new(1, "create level A"),
            StepSpec::new(2, "create level B"),
            StepSpec::new(3, "verify").verification(),
        ],
        ..Default::default()
    }
}

async fn store_with_plan() -> SessionStore {
    let store = create_test_store();
    store
        .create_plan(&three_levels())
        .await
        .expect("Failed to create plan");
    store
}

#[tokio::test]
async fn test_create_plan_starts_all_steps_pending() {
    let store = create_test_store();
    let plan = store
        .create_plan(&three_levels())
        .await
        .expect("Failed to create plan");

    assert_eq!(plan.goal, "Create 3 levels");
    assert_eq!(plan.steps.len(), 3);
    assert!(plan.steps.iter().all(|s| s.status == StepStatus::Pending));
    assert!(plan.steps[2].is_verification);
    assert!(plan.is_active());
}

#[tokio::test]
async fn test_create_plan_duplicate_numbers_leaves_session_untouched() {
    let store = store_with_plan().await;
    store.start_step(1).await.expect("Failed to start step");

    let mut params = three_levels();
    params.goal = "Another goal".to_string();
    params.steps[1].step_number = 1;

    let err = store.create_plan(&params).await.unwrap_err();
    assert!(err.is_validation());

    let plan = store.plan().await.expect("Plan should still exist");
    assert_eq!(plan.goal, "Create 3 levels");
    assert_eq!(plan.step(1).unwrap().status, StepStatus::InProgress);
}

#[tokio::test]
async fn test_create_plan_replaces_plan_and_ledger() {
    let store = store_with_plan().await;
    store
        .record_retry(2, "Element not found", None)
        .await
        .expect("Failed to record retry");
    store.add_context("some guidance").await;

    store
        .create_plan(&CreatePlan {
            goal: "Second plan".to_string(),
            steps: vec![StepSpec::new(2, "only step")],
            ..Default::default()
        })
        .await
        .expect("Failed to create plan");

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.plan.unwrap().goal, "Second plan");
    assert!(snapshot.retries.is_empty());
    assert!(snapshot.context.is_empty());
    assert_eq!(store.retry_count(2).await, 0);
}

#[tokio::test]
async fn test_step_lifecycle() {
    let store = store_with_plan().await;

    let started = store.start_step(1).await.expect("Failed to start step");
    assert_eq!(started.status, StepStatus::InProgress);
    assert!(started.started_at.is_some());

    let completed = store
        .complete_step(1, Some("ok".to_string()))
        .await
        .expect("Failed to complete step");
    assert_eq!(completed.status, StepStatus::Completed);
    assert_eq!(completed.result.as_deref(), Some("ok"));
    assert!(completed.completed_at.is_some());

    store.start_step(2).await.expect("Failed to start step");
    let failed = store
        .fail_step(2, Some("gave up".to_string()))
        .await
        .expect("Failed to fail step");
    assert_eq!(failed.status, StepStatus::Failed);
    assert_eq!(failed.failure_reason.as_deref(), Some("gave up"));

    let progress = store.progress().await.expect("Failed to get progress");
    assert_eq!(progress.completed_steps, 1);
    assert_eq!(progress.failed_steps, 1);
    assert_eq!(progress.pending_steps, 1);
}

#[tokio::test]
async fn test_invalid_transitions_mutate_nothing() {
    let store = store_with_plan().await;

    // Pending -> Completed is not allowed
    match store.complete_step(1, None).await.unwrap_err() {
        EngineError::InvalidTransition { step_number, from, to } => {
            assert_eq!(step_number, 1);
            assert_eq!(from, StepStatus::Pending);
            assert_eq!(to, StepStatus::Completed);
        }
        other => panic!("Expected InvalidTransition error, got {other:?}"),
    }

    store.start_step(1).await.expect("Failed to start step");
    // InProgress -> InProgress is not allowed
    assert!(store.start_step(1).await.is_err());

    let before = store.snapshot().await;
    assert!(store.fail_step(3, None).await.is_err());
    assert_eq!(store.snapshot().await, before);
}

#[tokio::test]
async fn test_skip_from_any_status() {
    let store = store_with_plan().await;

    store
        .skip_step(3, Some("not needed".to_string()))
        .await
        .expect("Failed to skip pending step");

    store.start_step(1).await.expect("Failed to start step");
    store.complete_step(1, None).await.expect("Failed to complete step");
    let skipped = store
        .skip_step(1, Some("rolled back".to_string()))
        .await
        .expect("Failed to skip completed step");

    assert_eq!(skipped.status, StepStatus::Skipped);
    assert_eq!(skipped.failure_reason.as_deref(), Some("rolled back"));
}

#[tokio::test]
async fn test_unknown_step_is_rejected() {
    let store = store_with_plan().await;
    let before = store.snapshot().await;

    for params in [
        UpdatePlan::for_step("start_step", 9),
        UpdatePlan::for_step("complete_step", 9),
        UpdatePlan::for_step("fail_step", 9),
        UpdatePlan::for_step("skip_step", 9),
    ] {
        match store.update_plan(&params).await.unwrap_err() {
            EngineError::StepNotFound { step_number } => assert_eq!(step_number, 9),
            other => panic!("Expected StepNotFound error, got {other:?}"),
        }
    }

    assert_eq!(store.snapshot().await, before);
}

#[tokio::test]
async fn test_unknown_action_is_rejected() {
    let store = store_with_plan().await;
    let before = store.snapshot().await;

    let err = store
        .update_plan(&UpdatePlan::for_step("restart_step", 1))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(store.snapshot().await, before);
}

#[tokio::test]
async fn test_update_without_plan() {
    let store = create_test_store();
    assert!(matches!(
        store.update_plan(&UpdatePlan::for_step("start_step", 1)).await,
        Err(EngineError::NoActivePlan)
    ));
}

#[tokio::test]
async fn test_prerequisites_are_enforced() {
    let store = create_test_store();
    store
        .create_plan(&CreatePlan {
            goal: "Dependent steps".to_string(),
            steps: vec![
                StepSpec::new(1, "create walls"),
                StepSpec::new(2, "add doors").depends_on([1]),
            ],
            ..Default::default()
        })
        .await
        .expect("Failed to create plan");

    match store.start_step(2).await.unwrap_err() {
        EngineError::PrerequisiteIncomplete {
            step_number,
            prerequisite,
        } => {
            assert_eq!(step_number, 2);
            assert_eq!(prerequisite, 1);
        }
        other => panic!("Expected PrerequisiteIncomplete error, got {other:?}"),
    }

    store.start_step(1).await.expect("Failed to start step");
    store.complete_step(1, None).await.expect("Failed to complete step");
    store.start_step(2).await.expect("Prerequisite is now complete");
}

#[tokio::test]
async fn test_add_step_does_not_renumber() {
    let store = store_with_plan().await;

    let update = store
        .update_plan(&UpdatePlan {
            action: "add_step".to_string(),
            new_step: Some(NewStep {
                description: "create level C".to_string(),
                after_step: Some(2),
            }),
            ..Default::default()
        })
        .await
        .expect("Failed to add step");

    let added = update.step.expect("Added step should be returned");
    assert_eq!(added.step_number, 4);
    assert_eq!(added.status, StepStatus::Pending);

    let numbers: Vec<u32> = store
        .plan()
        .await
        .unwrap()
        .steps
        .iter()
        .map(|s| s.step_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 4, 3]);

    let appended = store.add_step("final check", None).await.unwrap();
    assert_eq!(appended.step_number, 5);
    assert!(store.add_step("orphan", Some(42)).await.is_err());
}

#[tokio::test]
async fn test_add_step_rejects_exhausted_numbering() {
    let store = create_test_store();
    store
        .create_plan(&CreatePlan {
            goal: "Edge numbering".to_string(),
            steps: vec![StepSpec::new(0, "first"), StepSpec::new(u32::MAX, "last")],
            ..Default::default()
        })
        .await
        .expect("Failed to create plan");

    let err = store.add_step("new", None).await.unwrap_err();
    assert!(err.is_validation());
    assert!(matches!(err, EngineError::InvalidInput { ref field, .. } if field == "new_step"));

    let numbers: Vec<u32> = store
        .plan()
        .await
        .unwrap()
        .steps
        .iter()
        .map(|s| s.step_number)
        .collect();
    assert_eq!(numbers, vec![0, u32::MAX]);
}

#[tokio::test]
async fn test_note_does_not_mutate_steps() {
    let store = store_with_plan().await;
    let plan_before = store.plan().await;

    let update = store
        .update_plan(&UpdatePlan {
            action: "note".to_string(),
            step_number: Some(2),
            note: Some("Level B uses the 3m template".to_string()),
            ..Default::default()
        })
        .await
        .expect("Failed to add note");

    assert_eq!(update.changes, vec!["Recorded note".to_string()]);
    assert_eq!(store.plan().await, plan_before);

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.notes.len(), 1);
    assert_eq!(snapshot.notes[0].step_number, Some(2));
}

#[tokio::test]
async fn test_retry_ledger_counts() {
    let store = store_with_plan().await;

    let first = store
        .record_retry(2, "Element not found", Some("refresh".to_string()))
        .await
        .unwrap();
    let second = store.record_retry(2, "Element not found", None).await.unwrap();
    store.record_retry(1, "timeout", None).await.unwrap();

    assert_eq!(first.attempt, 1);
    assert_eq!(second.attempt, 2);
    assert_eq!(store.retry_count(2).await, 2);
    assert_eq!(store.retry_count(1).await, 1);
    assert_eq!(store.retry_count(3).await, 0);
    assert_eq!(store.progress().await.unwrap().retries, 3);

    assert!(store.record_retry(9, "nope", None).await.is_err());
}

#[tokio::test]
async fn test_guided_attempt_is_not_counted() {
    let store = store_with_plan().await;
    store.record_retry(2, "invalid parameter", None).await.unwrap();
    store.record_retry(2, "invalid parameter", None).await.unwrap();

    store
        .set_escalation(Escalation::new(2, 2, "invalid parameter"))
        .await;
    store
        .accept_guidance("use the type named 'W10x12'")
        .await
        .expect("Escalation should be pending");
    let guided = store.record_retry(2, "invalid parameter", None).await.unwrap();
    let after = store.record_retry(2, "invalid parameter", None).await.unwrap();

    assert!(guided.guided);
    assert_eq!(guided.attempt, 3);
    assert!(!after.guided);
    assert_eq!(store.retry_count(2).await, 3);
    assert_eq!(store.retry_records(2).await.len(), 4);
    assert_eq!(
        store.context().await,
        vec!["use the type named 'W10x12'".to_string()]
    );
}

#[tokio::test]
async fn test_record_verification_keeps_status() {
    let store = store_with_plan().await;
    store.start_step(1).await.unwrap();

    let step = store
        .record_verification(
            1,
            VerificationStatus::Issues,
            Some("Level A is 10mm too low".to_string()),
            vec!["elevation mismatch".to_string()],
        )
        .await
        .expect("Failed to record verification");

    assert_eq!(step.status, StepStatus::InProgress);
    assert_eq!(step.verification_status, Some(VerificationStatus::Issues));
    assert_eq!(step.verification_issues, vec!["elevation mismatch".to_string()]);
    assert!(step.verified_at.is_some());
}

fn completion(status: &str) -> CompletePlan {
    CompletePlan {
        status: status.to_string(),
        summary: "Created levels A and B".to_string(),
        elements_created: vec![11, 12, 11],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_complete_plan_is_idempotent() {
    let store = store_with_plan().await;
    let mut events = store.subscribe();

    let first = store
        .complete_plan(&completion("partial_success"))
        .await
        .expect("Failed to complete plan");
    let second = store
        .complete_plan(&completion("partial_success"))
        .await
        .expect("Repeat with identical arguments should succeed");

    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first.elements_created, vec![11, 12]);
    assert_eq!(second.elements_created, vec![11, 12]);

    assert_eq!(
        events.try_recv().unwrap(),
        ProgressEvent::PlanCompleted {
            status: CompletionStatus::PartialSuccess
        }
    );
    assert!(events.try_recv().is_err());

    let plan = store.plan().await.unwrap();
    assert_eq!(plan.completion_status, Some(CompletionStatus::PartialSuccess));
    assert!(plan.completed_at.is_some());
}

#[tokio::test]
async fn test_complete_plan_with_different_arguments() {
    let store = store_with_plan().await;
    store.complete_plan(&completion("success")).await.unwrap();

    match store.complete_plan(&completion("failed")).await.unwrap_err() {
        EngineError::PlanAlreadyCompleted { status } => {
            assert_eq!(status, CompletionStatus::Success)
        }
        other => panic!("Expected PlanAlreadyCompleted error, got {other:?}"),
    }

    // Completed plans reject step work
    assert!(store.start_step(1).await.is_err());
}

#[tokio::test]
async fn test_cancel_plan_leaves_steps_untouched() {
    let store = store_with_plan().await;
    store.start_step(1).await.unwrap();

    let progress = store
        .cancel_plan(Some("user aborted"))
        .await
        .expect("Failed to cancel plan");
    assert_eq!(progress.in_progress_steps, 1);

    let plan = store.plan().await.unwrap();
    assert_eq!(plan.completion_status, Some(CompletionStatus::Cancelled));
    assert_eq!(plan.step(1).unwrap().status, StepStatus::InProgress);

    // Cancelling twice is harmless; completing afterwards is not
    store.cancel_plan(None).await.expect("Second cancel is a no-op");
    assert!(matches!(
        store.complete_plan(&completion("success")).await,
        Err(EngineError::PlanAlreadyCompleted {
            status: CompletionStatus::Cancelled
        })
    ));

    // Progress stays queryable after cancellation
    assert_eq!(store.progress().await.unwrap().in_progress_steps, 1);
}

#[tokio::test]
async fn test_events_are_published() {
    let store = create_test_store();
    let mut events = store.subscribe();

    store.create_plan(&three_levels()).await.unwrap();
    store.start_step(1).await.unwrap();
    store.add_step("create level C", Some(1)).await.unwrap();

    assert_eq!(
        events.try_recv().unwrap(),
        ProgressEvent::PlanCreated {
            goal: "Create 3 levels".to_string(),
            total_steps: 3
        }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        ProgressEvent::StepUpdated {
            step_number: 1,
            status: StepStatus::InProgress
        }
    );
    assert!(matches!(
        events.try_recv().unwrap(),
        ProgressEvent::PlanModified {
            step_number: Some(4),
            ..
        }
    ));
}

#[tokio::test]
async fn test_escalation_cleared_when_step_settles() {
    let store = store_with_plan().await;
    store.start_step(1).await.unwrap();
    store
        .set_escalation(Escalation::new(1, 2, "boom"))
        .await;
    assert!(store.pending_escalation().await.is_some());

    store.skip_step(1, None).await.unwrap();
    assert!(store.pending_escalation().await.is_none());
}

#[tokio::test]
async fn test_guidance_answers_escalation_once() {
    let store = store_with_plan().await;
    store.start_step(2).await.unwrap();
    assert!(store.accept_guidance("too early").await.is_none());
    assert!(store.context().await.is_empty());

    store
        .set_escalation(Escalation::new(2, 2, "boom"))
        .await;
    let answered = store
        .accept_guidance("use Level 2 instead")
        .await
        .expect("Escalation should be pending");
    assert_eq!(answered.step_number, 2);

    let snapshot = store.snapshot().await;
    assert!(snapshot.escalation.is_none());
    assert_eq!(snapshot.context, vec!["use Level 2 instead".to_string()]);

    assert!(store.accept_guidance("second reply").await.is_none());
    assert_eq!(store.context().await, vec!["use Level 2 instead".to_string()]);

    let guided = store.record_retry(2, "boom", None).await.unwrap();
    assert!(guided.guided);
}

#[tokio::test]
async fn test_reset_clears_everything() {
    let store = store_with_plan().await;
    store.record_retry(1, "timeout", None).await.unwrap();
    store.reset().await;

    assert_eq!(store.snapshot().await, SessionSnapshot::default());
    assert!(matches!(
        store.progress().await,
        Err(EngineError::NoActivePlan)
    ));
}
