//! Step execution seam
//!
//! The orchestrator never performs recovery work itself. Each step of the
//! selected candidate is handed to a [`StepExecutor`]; the default one
//! reports success immediately.

use recon_kernel::ranking::RouteStep;
use recon_kernel::RunKey;
use std::time::Instant;

/// Executes one route step for a run
#[async_trait::async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute_step(&self, run_key: &RunKey, step: &RouteStep)
        -> Result<StepReport, StepError>;
}

/// Result of a successful step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: String,
    pub execution_time_ms: u64,
}

/// A step reported failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct StepError {
    pub reason: String,
}

impl StepError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Always succeeds
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStepExecutor;

#[async_trait::async_trait]
impl StepExecutor for DefaultStepExecutor {
    async fn execute_step(
        &self,
        run_key: &RunKey,
        step: &RouteStep,
    ) -> Result<StepReport, StepError> {
        let start = Instant::now();
        tracing::debug!(run = %run_key, step = %step.name, "executing step");
        Ok(StepReport {
            step: step.name.clone(),
            execution_time_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}
