//! End-to-end orchestration scenarios.
//!
//! These drive a [`RecoveryOrchestrator`] the way the console does: one
//! request in, one settled run out, with the store, run table, artifact
//! table and ledger all checked afterwards.

use pretty_assertions::assert_eq;
use recon_core::{OrchestratorError, RunRequest};
use recon_kernel::prelude::*;
use recon_test_utils::*;
use std::sync::Arc;

#[tokio::test]
async fn test_highest_resilience_route_runs() {
    let orchestrator = setup_test_orchestrator();
    let outcome = orchestrator.execute(create_run_request("ladder")).await.unwrap();

    assert_eq!(outcome.candidate.route_id.as_str(), "route-80");
    assert_eq!(outcome.artifact.steps, vec!["step-0", "step-1", "step-2"]);

    let run = orchestrator.run(&run_key("ladder")).unwrap();
    let order: Vec<&str> = run.candidates.iter().map(|c| c.route_id.as_str()).collect();
    assert_eq!(order, vec!["route-80", "route-60", "route-40"]);
    assert!(run.candidates.iter().all(|c| (0.0..=100.0).contains(&c.confidence)));
}

#[tokio::test]
async fn test_failed_step_stops_execution() {
    let executor = Arc::new(ScriptedExecutor::failing_on("step-1"));
    let orchestrator = setup_orchestrator_with(executor.clone());

    let err = orchestrator.execute(create_run_request("fail")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::StepFailed { .. }));
    assert!(err.is_terminal());
    assert_eq!(executor.calls(), 2);

    let run = orchestrator.run(&run_key("fail")).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.failure.as_deref(), Some("step-1 refused"));
}

#[tokio::test]
async fn test_cancel_between_steps() {
    let executor = Arc::new(GatedExecutor::default());
    let orchestrator = Arc::new(setup_orchestrator_with(executor.clone()));
    let key = run_key("cancel");

    let task = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.execute(create_run_request("cancel")).await })
    };

    executor.started.notified().await;
    assert_eq!(orchestrator.run(&key).unwrap().status, RunStatus::Running);
    assert!(orchestrator.cancel(&key).unwrap());
    executor.release.notify_one();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, OrchestratorError::Cancelled { .. }));

    let run = orchestrator.run(&key).unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.completed_steps, vec!["step-0"]);
    assert_eq!(executor.calls(), 1);
    assert!(run.artifact.is_none());
}

#[tokio::test]
async fn test_store_lost_mid_run_leaves_no_artifact() {
    let executor = Arc::new(GatedExecutor::default());
    let orchestrator = Arc::new(setup_orchestrator_with(executor.clone()));
    let key = run_key("disposed");

    let task = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.execute(create_run_request("disposed")).await })
    };

    executor.started.notified().await;
    orchestrator.store().dispose();
    executor.release.notify_one();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, OrchestratorError::Store(_)));

    let run = orchestrator.run(&key).unwrap();
    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(run.completed_steps, vec!["step-0", "step-1", "step-2"]);
    assert!(run.artifact.is_none());
    assert!(orchestrator.artifacts(&key).is_empty());
}

#[tokio::test]
async fn test_rerun_artifacts_accumulate() {
    let orchestrator = setup_test_orchestrator();
    let key = run_key("twice");

    let first = orchestrator.execute(create_run_request("twice")).await.unwrap();
    let second = orchestrator.execute(create_run_request("twice")).await.unwrap();

    let ids: Vec<ArtifactId> = orchestrator.artifacts(&key).iter().map(|a| a.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.artifact.id));
    assert!(ids.contains(&second.artifact.id));
    assert_eq!(orchestrator.run(&key).unwrap().artifact, Some(second.artifact.id));
}

#[tokio::test]
async fn test_duplicate_in_flight_run_rejected() {
    let executor = Arc::new(GatedExecutor::default());
    let orchestrator = Arc::new(setup_orchestrator_with(executor.clone()));

    let task = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.execute(create_run_request("dup")).await })
    };
    executor.started.notified().await;

    let err = orchestrator.execute(create_run_request("dup")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::DuplicateRun(_)));

    executor.release.notify_one();
    let outcome = task.await.unwrap().unwrap();
    assert_eq!(outcome.status, RunStatus::Succeeded);
}

#[tokio::test]
async fn test_policy_uses_accumulated_signals() {
    let orchestrator = setup_test_orchestrator();
    let key = run_key("noisy");
    for _ in 0..5 {
        orchestrator.ingest(draft(&key, "verify", 95.0)).unwrap();
    }

    let err = orchestrator.execute(create_run_request("noisy")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::PolicyRejected { .. }));

    let run = orchestrator.run(&key).unwrap();
    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(run.risk.unwrap().band, RiskBand::Critical);
}

#[tokio::test]
async fn test_ledger_covers_every_run() {
    let orchestrator = setup_test_orchestrator();
    for run in ["a", "b", "c"] {
        orchestrator.execute(create_run_request(run)).await.unwrap();
    }

    assert_eq!(orchestrator.runs().len(), 3);
    for run in ["a", "b", "c"] {
        let events = orchestrator.events(&run_key(run));
        assert_eq!(events.first().unwrap().action, "register");
        assert_eq!(events.last().unwrap().action, "complete");
    }
    orchestrator.verify_ledger().unwrap();
}

#[tokio::test]
async fn test_concurrent_runs_settle_independently() {
    let orchestrator = Arc::new(setup_test_orchestrator());
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .execute(create_run_request(&format!("run-{i}")))
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().status, RunStatus::Succeeded);
    }
    assert_eq!(orchestrator.runs().len(), 16);
    orchestrator.verify_ledger().unwrap();
}

#[tokio::test]
async fn test_request_from_json_payload() {
    let request: RunRequest = parse_payload(
        r#"{
            "tenant": "tenant-test",
            "run": "json",
            "routes": [
                {"id": "a", "resilience_score": 40.0, "steps": [{"name": "x", "estimated_minutes": 1}]},
                {"id": "b", "resilience_score": 60.0, "steps": [{"name": "y", "estimated_minutes": 1}]}
            ]
        }"#,
    )
    .unwrap();

    let orchestrator = setup_test_orchestrator();
    let outcome = orchestrator.execute(request).await.unwrap();
    assert_eq!(outcome.candidate.route_id.as_str(), "b");
    // no signals: nothing to weigh
    assert_eq!(outcome.risk.band, RiskBand::Low);
}
