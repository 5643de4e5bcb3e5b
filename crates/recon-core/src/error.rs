//! Error types for the recovery console core
//!
//! [`OrchestratorError`] is what every orchestrator operation returns.
//! Kernel failures convert into it with `?`; the run-level outcomes
//! (policy rejection, step failure, cancellation) carry the run they
//! belong to so callers can look the run up afterwards.

use recon_kernel::{
    KernelError, LogError, RunKey, SchedulerError, StateMachineError, StoreError,
    ValidationError,
};

/// Main orchestrator error type
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Request failed validation before anything was recorded
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// A policy gate rejected the plan; the run is `aborted`
    #[error("run {run_key} rejected by policy: {}", .reasons.join("; "))]
    PolicyRejected {
        run_key: RunKey,
        reasons: Vec<String>,
    },

    /// A step reported failure; the run is `failed`
    #[error("run {run_key} failed at step '{step}': {reason}")]
    StepFailed {
        run_key: RunKey,
        step: String,
        reason: String,
    },

    /// The run was cancelled between steps
    #[error("run {run_key} cancelled")]
    Cancelled { run_key: RunKey },

    /// No ranked candidate survived planning
    #[error("no viable candidate for run {0}")]
    NoCandidate(RunKey),

    /// A run with this key already exists
    #[error("run {0} already exists")]
    DuplicateRun(RunKey),

    #[error("run {0} not found")]
    RunNotFound(RunKey),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("state machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    #[error("audit log error: {0}")]
    Ledger(#[from] LogError),
}

impl OrchestratorError {
    /// Nothing in the orchestrator retries
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Whether the error settled a run into a terminal status
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::PolicyRejected { .. } | Self::StepFailed { .. } | Self::Cancelled { .. }
        )
    }

    /// The run this error is about, when there is one
    #[must_use]
    pub fn run_key(&self) -> Option<&RunKey> {
        match self {
            Self::PolicyRejected { run_key, .. }
            | Self::StepFailed { run_key, .. }
            | Self::Cancelled { run_key } => Some(run_key),
            Self::NoCandidate(key) | Self::DuplicateRun(key) | Self::RunNotFound(key) => Some(key),
            _ => None,
        }
    }
}

impl From<KernelError> for OrchestratorError {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::Store(e) => Self::Store(e),
            KernelError::Validation(e) => Self::InvalidRequest(e),
            KernelError::StateMachine(e) => Self::StateMachine(e),
            KernelError::Log(e) => Self::Ledger(e),
            KernelError::Scheduler(e) => Self::Scheduler(e),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration
    #[error("config io error: {0}")]
    Io(String),

    /// TOML parsing error
    #[error("config parse error: {0}")]
    Parse(String),

    /// Parsed, but inconsistent
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RunKey {
        RunKey::parse("acme", "r1").unwrap()
    }

    #[test]
    fn policy_rejection_lists_reasons() {
        let err = OrchestratorError::PolicyRejected {
            run_key: key(),
            reasons: vec!["risk too high".into(), "confidence too low".into()],
        };
        assert_eq!(
            err.to_string(),
            "run acme/r1 rejected by policy: risk too high; confidence too low"
        );
        assert!(err.is_terminal());
        assert_eq!(err.run_key(), Some(&key()));
    }

    #[test]
    fn nothing_is_retryable() {
        let errors = [
            OrchestratorError::Cancelled { run_key: key() },
            OrchestratorError::Store(StoreError::Disposed),
            OrchestratorError::RunNotFound(key()),
        ];
        assert!(errors.iter().all(|e| !e.is_retryable()));
    }

    #[test]
    fn validation_errors_become_invalid_requests() {
        let err: OrchestratorError = ValidationError::invalid("routes", "must not be empty").into();
        assert!(matches!(err, OrchestratorError::InvalidRequest(_)));
        assert!(!err.is_terminal());
        assert_eq!(err.run_key(), None);
    }

    #[test]
    fn kernel_errors_map_onto_layers() {
        let err: OrchestratorError = KernelError::Store(StoreError::Disposed).into();
        assert!(matches!(err, OrchestratorError::Store(StoreError::Disposed)));
    }
}
