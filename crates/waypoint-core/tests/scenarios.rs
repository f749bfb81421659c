mod common;

use common::{harness, instant_config, three_levels, ScriptedProvider};
use serde_json::json;
use std::{sync::atomic::Ordering, time::Duration};
use tokio_util::sync::CancellationToken;
use waypoint_core::{
    params::{CompletePlan, UpdatePlan},
    verification::{BatchEntry, VerificationTrigger},
    ActionRequest, CompletionStatus, DispatchOutcome, Dispatcher, EngineConfig, FailureContext,
    LoopOutcome, RecoveryAction, RecoveryEngine, StepStatus, VerificationStatus,
};

async fn complete_step_one(store: &waypoint_core::SessionStore) {
    store
        .update_plan(&UpdatePlan::for_step("start_step", 1))
        .await
        .expect("Failed to start step 1");
    store
        .update_plan(&UpdatePlan::for_step("complete_step", 1).with_result("ok"))
        .await
        .expect("Failed to complete step 1");
}

#[tokio::test]
async fn test_scenario_a_element_not_found_refreshes_and_retries() {
    let store = common::create_test_store(EngineConfig::default());
    store.create_plan(&three_levels()).await.unwrap();
    complete_step_one(&store).await;
    store
        .update_plan(&UpdatePlan::for_step("start_step", 2))
        .await
        .unwrap();

    let engine = RecoveryEngine::new(store.config());
    let strategy = engine.decide(&FailureContext::new(
        2,
        "Element not found: Level B",
        store.retry_count(2).await,
    ));
    assert_eq!(strategy.action, RecoveryAction::RefreshContextAndRetry);
    assert_eq!(strategy.retry_delay, Duration::from_millis(500));

    let provider = ScriptedProvider::new();
    provider.fail("create_level", "Element not found: Level B");
    let dispatcher = Dispatcher::new(store.clone(), provider.clone());

    let outcome = dispatcher
        .dispatch(
            ActionRequest::new(2, "create_level", json!({ "name": "Level B" })).mutating(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, DispatchOutcome::Completed { attempts: 2, .. }));
    let records = store.retry_records(2).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].error, "Element not found: Level B");
}

#[tokio::test]
async fn test_scenario_b_geometry_conflict_skips_step() {
    let h = harness(instant_config()).await;
    complete_step_one(&h.store).await;
    h.provider
        .fail("create_level", "geometry conflict with existing beam");

    let outcome = h.executor.run().await.unwrap();
    let LoopOutcome::Finished(progress) = outcome else {
        panic!("Expected the loop to finish, got {outcome:?}");
    };
    assert_eq!(progress.completed_steps, 2);
    assert_eq!(progress.skipped_steps, 1);

    let plan = h.store.plan().await.unwrap();
    let step = plan.step(2).unwrap();
    assert_eq!(step.status, StepStatus::Skipped);
    assert_eq!(
        step.failure_reason.as_deref(),
        Some("geometry conflict with existing beam")
    );
    assert_eq!(h.store.retry_records(2).await.len(), 1);
    assert_eq!(h.provider.calls_for_step(2).len(), 1);
}

#[tokio::test]
async fn test_scenario_c_exhausted_budget_escalates() {
    let h = harness(instant_config()).await;
    complete_step_one(&h.store).await;
    for _ in 0..3 {
        h.provider
            .fail("create_level", "invalid parameter: type not found");
    }

    let outcome = h.executor.run().await.unwrap();
    let LoopOutcome::Escalated(escalation) = outcome else {
        panic!("Expected an escalation, got {outcome:?}");
    };

    assert_eq!(escalation.step_number, 2);
    assert_eq!(escalation.retry_count, 2);
    assert!(escalation.message().contains("- Retries: 2"));
    assert_eq!(h.store.retry_records(2).await.len(), 3);

    // Progress stays queryable while paused
    let progress = h.store.progress().await.unwrap();
    assert_eq!(progress.completed_steps, 1);
    assert_eq!(progress.in_progress_steps, 1);

    // Running again reports the same pause without dispatching
    let calls = h.provider.calls().len();
    assert_eq!(
        h.executor.run().await.unwrap(),
        LoopOutcome::Escalated(escalation)
    );
    assert_eq!(h.provider.calls().len(), calls);
}

#[tokio::test]
async fn test_scenario_d_verification_step_does_not_trigger_verification() {
    let h = harness(instant_config()).await;
    complete_step_one(&h.store).await;
    h.store.skip_step(2, None).await.unwrap();
    h.store.start_step(3).await.unwrap();

    let step = h.store.plan().await.unwrap().step(3).cloned().unwrap();
    assert_eq!(step.status, StepStatus::InProgress);

    let batch = [BatchEntry::succeeded(
        "create_level",
        true,
        &json!({ "element_id": 1 }),
    )];
    let trigger = VerificationTrigger::new(h.store.config());
    assert!(!trigger.should_verify(&batch, &step));
}

#[tokio::test]
async fn test_scenario_e_skip_reply_moves_to_next_step() {
    let h = harness(instant_config()).await;
    complete_step_one(&h.store).await;
    h.provider.fail("create_level", "disk on fire");

    let outcome = h.executor.run().await.unwrap();
    assert!(matches!(outcome, LoopOutcome::Escalated(ref e) if e.step_number == 2));

    let outcome = h.executor.resume("please just skip it").await.unwrap();
    assert!(matches!(outcome, LoopOutcome::Finished(_)));

    let plan = h.store.plan().await.unwrap();
    assert_eq!(plan.step(2).unwrap().status, StepStatus::Skipped);
    let step3 = plan.step(3).unwrap();
    assert!(step3.started_at.is_some());
    assert_eq!(step3.status, StepStatus::Completed);

    let calls = h.provider.calls();
    assert_eq!(calls.last().unwrap().step_number, 3);
    assert!(h.store.pending_escalation().await.is_none());
}

#[tokio::test]
async fn test_full_run_with_verification() {
    let h = harness(instant_config()).await;
    h.provider
        .respond("check_outcome", json!({ "approved": true, "observations": "Level A present" }));
    h.provider.respond("check_outcome", json!({ "approved": true }));

    let outcome = h.executor.run().await.unwrap();
    let LoopOutcome::Finished(progress) = outcome else {
        panic!("Expected the loop to finish, got {outcome:?}");
    };
    assert_eq!(progress.completed_steps, 3);
    assert_eq!(progress.suggested_status(), CompletionStatus::Success);

    let plan = h.store.plan().await.unwrap();
    let step1 = plan.step(1).unwrap();
    assert_eq!(step1.verification_status, Some(VerificationStatus::Passed));
    assert_eq!(
        step1.verification_observations.as_deref(),
        Some("Level A present")
    );
    assert!(step1.result.as_deref().unwrap().starts_with("Ran create_level"));
    // Verification steps are not checked themselves
    assert!(plan.step(3).unwrap().verification_status.is_none());

    let checks: Vec<u32> = h
        .provider
        .calls()
        .iter()
        .filter(|c| c.action == "check_outcome")
        .map(|c| c.step_number)
        .collect();
    assert_eq!(checks, vec![1, 2]);

    let report = h
        .store
        .complete_plan(&CompletePlan {
            status: progress.suggested_status().as_str().to_string(),
            summary: "All levels created".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(report.to_string().contains("- Completed: 3/3"));
}

#[tokio::test]
async fn test_verification_issues_retry_the_step() {
    let h = harness(instant_config()).await;
    h.provider.respond(
        "check_outcome",
        json!({ "approved": false, "issues": "Level A elevation is wrong" }),
    );
    h.provider.respond("check_outcome", json!({ "approved": true }));
    h.provider.respond("check_outcome", json!({ "approved": true }));

    let outcome = h.executor.run().await.unwrap();
    assert!(matches!(outcome, LoopOutcome::Finished(_)));

    assert_eq!(
        h.provider
            .calls_for_step(1)
            .iter()
            .filter(|c| c.action == "create_level")
            .count(),
        2
    );
    assert_eq!(h.store.retry_count(1).await, 1);

    let contexts = h.planner.contexts();
    assert!(contexts[1]
        .iter()
        .any(|c| c.contains("Level A elevation is wrong")));

    let plan = h.store.plan().await.unwrap();
    assert_eq!(
        plan.step(1).unwrap().verification_status,
        Some(VerificationStatus::Passed)
    );
}

#[tokio::test]
async fn test_repeated_verification_issues_escalate() {
    let config = EngineConfig {
        max_retries: 1,
        ..instant_config()
    };
    let h = harness(config).await;
    for _ in 0..2 {
        h.provider.respond(
            "check_outcome",
            json!({ "approved": false, "issues": "Level A missing" }),
        );
    }

    let outcome = h.executor.run().await.unwrap();
    let LoopOutcome::Escalated(escalation) = outcome else {
        panic!("Expected an escalation, got {outcome:?}");
    };
    assert_eq!(escalation.step_number, 1);
    assert_eq!(escalation.retry_count, 1);
    assert_eq!(escalation.error, "Verification failed: Level A missing");

    let step = h.store.plan().await.unwrap().step(1).cloned().unwrap();
    assert_eq!(step.status, StepStatus::InProgress);
    assert_eq!(step.verification_status, Some(VerificationStatus::Failed));
}

#[tokio::test]
async fn test_guidance_retries_without_consuming_budget() {
    let h = harness(instant_config()).await;
    complete_step_one(&h.store).await;
    for _ in 0..4 {
        h.provider
            .fail("create_level", "invalid parameter: type not found");
    }

    let outcome = h.executor.run().await.unwrap();
    let LoopOutcome::Escalated(first) = outcome else {
        panic!("Expected an escalation, got {outcome:?}");
    };
    assert_eq!(first.retry_count, 2);

    // Every failure is in the ledger, the escalating one included
    assert_eq!(h.store.retry_count(2).await, 3);

    // The guided attempt fails too, but the budget is unchanged
    let outcome = h
        .executor
        .resume("use the type named W10x12")
        .await
        .unwrap();
    let LoopOutcome::Escalated(escalation) = outcome else {
        panic!("Expected a second escalation, got {outcome:?}");
    };
    // Both escalations report the same budgeted count
    assert_eq!(escalation.retry_count, 2);
    assert_eq!(escalation.message(), first.message());
    assert_eq!(h.store.retry_count(2).await, 3);

    let records = h.store.retry_records(2).await;
    assert_eq!(records.len(), 4);
    assert!(records[3].guided);

    let contexts = h.planner.contexts();
    assert_eq!(
        contexts.last().unwrap(),
        &vec!["use the type named W10x12".to_string()]
    );

    // With the script exhausted the next guided attempt succeeds
    let outcome = h.executor.resume("try W10x12 again").await.unwrap();
    assert!(matches!(outcome, LoopOutcome::Finished(_)));
    assert_eq!(
        h.store.plan().await.unwrap().step(2).unwrap().status,
        StepStatus::Completed
    );
}

#[tokio::test]
async fn test_abort_reply_cancels_plan() {
    let h = harness(instant_config()).await;
    complete_step_one(&h.store).await;
    h.provider.fail("create_level", "disk on fire");
    h.executor.run().await.unwrap();

    let outcome = h.executor.resume("Abort, this is wrong").await.unwrap();
    let LoopOutcome::Cancelled(progress) = outcome else {
        panic!("Expected cancellation, got {outcome:?}");
    };
    assert_eq!(progress.completed_steps, 1);
    assert_eq!(progress.in_progress_steps, 1);

    let plan = h.store.plan().await.unwrap();
    assert_eq!(plan.completion_status, Some(CompletionStatus::Cancelled));
    assert_eq!(plan.step(2).unwrap().status, StepStatus::InProgress);

    // The loop stays halted
    assert!(matches!(
        h.executor.run().await.unwrap(),
        LoopOutcome::Cancelled(_)
    ));
}

#[tokio::test]
async fn test_resume_without_escalation_is_rejected() {
    let h = harness(instant_config()).await;
    let err = h.executor.resume("skip").await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_transaction_failure_rolls_back_before_retry() {
    let h = harness(instant_config()).await;
    h.provider
        .fail("create_level", "Transaction could not commit");

    let outcome = h.executor.run().await.unwrap();
    assert!(matches!(outcome, LoopOutcome::Finished(_)));
    assert_eq!(h.transactions.rollbacks.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.retry_records(1).await.len(), 1);
}

#[tokio::test]
async fn test_cancelled_token_halts_loop() {
    let h = harness(instant_config()).await;
    h.executor.cancellation_token().cancel();

    let outcome = h.executor.run().await.unwrap();
    assert!(matches!(outcome, LoopOutcome::Cancelled(_)));
    assert!(h.provider.calls().is_empty());
    assert_eq!(
        h.store.plan().await.unwrap().completion_status,
        Some(CompletionStatus::Cancelled)
    );
}

#[tokio::test]
async fn test_dependency_on_skipped_step_is_skipped() {
    let store = common::create_test_store(instant_config());
    store
        .create_plan(&waypoint_core::CreatePlan {
            goal: "Walls and doors".to_string(),
            steps: vec![
                waypoint_core::StepSpec::new(1, "create walls"),
                waypoint_core::StepSpec::new(2, "add doors").depends_on([1]),
                waypoint_core::StepSpec::new(3, "add roof"),
            ],
            ..Default::default()
        })
        .await
        .unwrap();

    let provider = ScriptedProvider::new();
    provider.fail("create_level", "walls overlap");
    let dispatcher = Dispatcher::new(store.clone(), provider.clone());
    let executor = waypoint_core::Executor::new(dispatcher, common::ScriptedPlanner::new());

    let outcome = executor.run().await.unwrap();
    assert!(matches!(outcome, LoopOutcome::Finished(_)));

    let plan = store.plan().await.unwrap();
    assert_eq!(plan.step(1).unwrap().status, StepStatus::Skipped);
    let doors = plan.step(2).unwrap();
    assert_eq!(doors.status, StepStatus::Skipped);
    assert!(doors
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("Prerequisite step 1"));
    assert_eq!(plan.step(3).unwrap().status, StepStatus::Completed);
    assert!(provider.calls_for_step(2).is_empty());
}
