//! Testing utilities for the recovery console workspace
//!
//! Shared fixtures (ids, routes, requests) and scripted step executors.

#![allow(missing_docs)]

use recon_core::{
    ConsoleConfig, RecoveryOrchestrator, RunRequest, SignalInput, StepError, StepExecutor,
    StepReport,
};
use recon_kernel::ranking::{Objective, Route, RouteStep};
use recon_kernel::store::RecordDraft;
use recon_kernel::{RouteId, RunKey, StageId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub fn run_key(run: &str) -> RunKey {
    RunKey::parse("tenant-test", run).unwrap()
}

pub fn stage(name: &str) -> StageId {
    StageId::new(name).unwrap()
}

pub fn draft(key: &RunKey, stage_name: &str, severity: f64) -> RecordDraft {
    RecordDraft::new(key, stage(stage_name), severity)
}

/// Route with `steps` one-minute steps named `step-0`, `step-1`, ...
pub fn create_route(id: &str, resilience: f64, steps: usize) -> Route {
    (0..steps).fold(Route::new(RouteId::new(id).unwrap(), resilience), |route, i| {
        route.with_step(RouteStep::new(format!("step-{i}"), 1))
    })
}

pub fn create_route_with_objectives(id: &str, resilience: f64, weights: &[f64]) -> Route {
    weights.iter().enumerate().fold(create_route(id, resilience, 2), |route, (i, w)| {
        route.with_objective(Objective::new(format!("objective-{i}"), *w))
    })
}

/// Three routes whose only difference is resilience: 40, 60, 80
pub fn create_resilience_ladder() -> Vec<Route> {
    vec![
        create_route("route-40", 40.0, 3),
        create_route("route-60", 60.0, 3),
        create_route("route-80", 80.0, 3),
    ]
}

/// Request over the resilience ladder with one low-severity signal
pub fn create_run_request(run: &str) -> RunRequest {
    let key = run_key(run);
    create_resilience_ladder()
        .into_iter()
        .fold(RunRequest::new(&key), RunRequest::with_route)
        .with_signal(SignalInput::new(stage("intake"), 20.0))
}

pub fn setup_test_orchestrator() -> RecoveryOrchestrator {
    RecoveryOrchestrator::new(ConsoleConfig::new()).unwrap()
}

pub fn setup_orchestrator_with(executor: Arc<dyn StepExecutor>) -> RecoveryOrchestrator {
    RecoveryOrchestrator::with_executor(ConsoleConfig::new(), executor).unwrap()
}

/// Counts calls; fails the step with the given name
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    fail_on: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn failing_on(step: impl Into<String>) -> Self {
        Self {
            fail_on: Some(step.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute_step(&self, _run_key: &RunKey, step: &RouteStep) -> Result<StepReport, StepError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.as_deref() == Some(step.name.as_str()) {
            return Err(StepError::new(format!("{} refused", step.name)));
        }
        Ok(StepReport {
            step: step.name.clone(),
            execution_time_ms: 0,
        })
    }
}

/// Parks inside its first step until released
///
/// `started` is notified when the first step begins; the step then waits
/// on `release`. Later steps run straight through.
#[derive(Debug, Default)]
pub struct GatedExecutor {
    pub started: Notify,
    pub release: Notify,
    calls: AtomicUsize,
}

impl GatedExecutor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StepExecutor for GatedExecutor {
    async fn execute_step(&self, _run_key: &RunKey, step: &RouteStep) -> Result<StepReport, StepError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.started.notify_one();
            self.release.notified().await;
        }
        Ok(StepReport {
            step: step.name.clone(),
            execution_time_ms: 0,
        })
    }
}
