//! Recovery orchestrator
//!
//! Sequences one run end to end:
//! 1. validate the request
//! 2. ingest its signals and build the plan (`planned`)
//! 3. assess risk from the run's stored records and apply the policy gates
//!    (`aborted` on rejection)
//! 4. execute the selected candidate step by step (`running`, then
//!    `failed` or `cancelled` on the way out)
//! 5. persist an artifact and an outcome record (`succeeded`)
//!
//! Nothing is retried. Every action lands in the hash-chained ledger.

use crate::config::ConsoleConfig;
use crate::error::{ConfigError, OrchestratorError};
use crate::executor::{DefaultStepExecutor, StepExecutor};
use crate::plan::RecoveryPlan;
use crate::policy;
use crate::types::{Artifact, RunOutcome, RunRecord, RunRequest};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use recon_kernel::logging::{Event, EventLog};
use recon_kernel::ranking::Candidate;
use recon_kernel::scoring::RiskAssessment;
use recon_kernel::snapshot::Snapshot;
use recon_kernel::state_machine::{transition, Lifecycle};
use recon_kernel::store::{
    CompactionReport, RecordDraft, RecordPage, RecordQuery, RecordStore, StoredRecord,
};
use recon_kernel::validation::Validate;
use recon_kernel::{ArtifactId, RunKey, RunStatus, StageId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Stage that outcome records are written under
pub const OUTCOME_STAGE: &str = "outcome";

/// Coordinates the record store, ranking, policy gates and step execution
pub struct RecoveryOrchestrator {
    config: ConsoleConfig,
    store: Arc<RecordStore>,
    runs: DashMap<RunKey, RunRecord>,
    artifacts: DashMap<ArtifactId, Artifact>,
    cancellations: DashMap<RunKey, Arc<AtomicBool>>,
    ledger: EventLog,
    executor: Arc<dyn StepExecutor>,
}

impl std::fmt::Debug for RecoveryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryOrchestrator")
            .field("config", &self.config)
            .field("runs", &self.runs.len())
            .field("artifacts", &self.artifacts.len())
            .field("ledger", &self.ledger.len())
            .finish_non_exhaustive()
    }
}

impl RecoveryOrchestrator {
    /// Orchestrator with a fresh store and the always-succeeding executor
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] when `config` fails validation.
    pub fn new(config: ConsoleConfig) -> Result<Self, ConfigError> {
        Self::with_executor(config, Arc::new(DefaultStepExecutor))
    }

    pub fn with_executor(
        config: ConsoleConfig,
        executor: Arc<dyn StepExecutor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = Arc::new(RecordStore::new(config.store));
        Ok(Self::assemble(config, store, executor))
    }

    /// Share an existing store
    pub fn with_store(
        config: ConsoleConfig,
        store: Arc<RecordStore>,
        executor: Arc<dyn StepExecutor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(config, store, executor))
    }

    fn assemble(
        config: ConsoleConfig,
        store: Arc<RecordStore>,
        executor: Arc<dyn StepExecutor>,
    ) -> Self {
        Self {
            config,
            store,
            runs: DashMap::new(),
            artifacts: DashMap::new(),
            cancellations: DashMap::new(),
            ledger: EventLog::new(),
            executor,
        }
    }

    /// Carry out one recovery run
    ///
    /// # Errors
    /// - [`OrchestratorError::InvalidRequest`]: nothing was recorded
    /// - [`OrchestratorError::DuplicateRun`]: a run with this key is in flight
    /// - [`OrchestratorError::PolicyRejected`]: the run is `aborted`
    /// - [`OrchestratorError::StepFailed`]: the run is `failed`
    /// - [`OrchestratorError::Cancelled`]: the run is `cancelled`
    #[tracing::instrument(skip(self, request), fields(run = %request.run_key()))]
    pub async fn execute(&self, request: RunRequest) -> Result<RunOutcome, OrchestratorError> {
        request.validate()?;
        let key = request.run_key();
        let flag = self.register(&key)?;

        let start = Instant::now();
        let result = self.drive(&key, &request, &flag, start).await;
        self.release_flag(&key, &flag);

        if let Err(err) = &result {
            if !err.is_terminal() {
                self.settle_aborted(&key, &err.to_string());
            }
            tracing::warn!(error = %err, "run did not succeed");
        }
        result
    }

    async fn drive(
        &self,
        key: &RunKey,
        request: &RunRequest,
        flag: &AtomicBool,
        start: Instant,
    ) -> Result<RunOutcome, OrchestratorError> {
        for signal in &request.signals {
            self.store.write(signal.to_draft(key))?;
        }

        let plan = RecoveryPlan::build(
            key.clone(),
            &request.routes,
            &self.config.ranking,
            self.config.top_candidates,
        );
        let candidate = plan
            .selected()
            .cloned()
            .ok_or_else(|| OrchestratorError::NoCandidate(key.clone()))?;
        self.advance(key, RunStatus::Planned, |run| {
            run.candidates = plan.candidates.clone();
            run.selected = Some(candidate.clone());
        })?;
        self.audit(key, "plan", candidate.id.as_str());

        let risk = self.store.snapshot(key)?.risk;
        self.edit(key, |run| run.risk = Some(risk))?;

        let decision = policy::evaluate(&self.config.policy, &candidate, &risk);
        if !decision.is_allowed() {
            let reasons = decision.reasons();
            self.advance(key, RunStatus::Aborted, |run| {
                run.failure = Some(reasons.join("; "));
            })?;
            self.audit(key, "policy", "rejected");
            tracing::info!(band = %risk.band, "policy rejected run");
            return Err(OrchestratorError::PolicyRejected {
                run_key: key.clone(),
                reasons,
            });
        }
        self.audit(key, "policy", "allowed");

        self.advance(key, RunStatus::Running, |_| {})?;
        self.run_steps(key, &candidate, flag).await?;

        self.complete(key, candidate, risk, start)
    }

    async fn run_steps(
        &self,
        key: &RunKey,
        candidate: &Candidate,
        flag: &AtomicBool,
    ) -> Result<(), OrchestratorError> {
        for step in &candidate.steps {
            if flag.load(Ordering::SeqCst) {
                self.advance(key, RunStatus::Cancelled, |run| {
                    run.failure = Some(format!("cancelled before step '{}'", step.name));
                })?;
                self.audit(key, "cancel", &step.name);
                return Err(OrchestratorError::Cancelled {
                    run_key: key.clone(),
                });
            }

            match self.executor.execute_step(key, step).await {
                Ok(report) => {
                    self.edit(key, |run| run.completed_steps.push(report.step.clone()))?;
                    self.audit(key, &format!("step:{}", step.name), "ok");
                }
                Err(err) => {
                    self.advance(key, RunStatus::Failed, |run| {
                        run.failure = Some(err.reason.clone());
                    })?;
                    self.audit(key, &format!("step:{}", step.name), "failed");
                    return Err(OrchestratorError::StepFailed {
                        run_key: key.clone(),
                        step: step.name.clone(),
                        reason: err.reason,
                    });
                }
            }
        }
        Ok(())
    }

    fn complete(
        &self,
        key: &RunKey,
        candidate: Candidate,
        risk: RiskAssessment,
        start: Instant,
    ) -> Result<RunOutcome, OrchestratorError> {
        let steps = self
            .runs
            .get(key)
            .map(|run| run.completed_steps.clone())
            .unwrap_or_default();
        let artifact = Artifact::new(key.clone(), candidate.id.clone(), steps);

        // weight 0 keeps the outcome out of the run's risk score
        let stage = StageId::new(OUTCOME_STAGE)?;
        self.store.write(
            RecordDraft::new(key, stage, risk.score)
                .with_weight(0.0)
                .with_detail("status", RunStatus::Succeeded.label())
                .with_detail("candidate", candidate.id.as_str())
                .with_detail("artifact", artifact.id.to_string()),
        )?;
        self.artifacts.insert(artifact.id, artifact.clone());

        self.advance(key, RunStatus::Succeeded, |run| run.artifact = Some(artifact.id))?;
        self.audit(key, "complete", &artifact.checksum);

        let execution_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            candidate = %candidate.id,
            steps = artifact.steps.len(),
            execution_time_ms,
            "run succeeded"
        );

        Ok(RunOutcome {
            run_key: key.clone(),
            status: RunStatus::Succeeded,
            candidate,
            risk,
            artifact,
            execution_time_ms,
        })
    }

    /// Insert a fresh `pending` run; a settled run with the same key is replaced
    fn register(&self, key: &RunKey) -> Result<Arc<AtomicBool>, OrchestratorError> {
        match self.runs.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().status.is_terminal() {
                    return Err(OrchestratorError::DuplicateRun(key.clone()));
                }
                entry.insert(RunRecord::new(key.clone()));
            }
            Entry::Vacant(entry) => {
                entry.insert(RunRecord::new(key.clone()));
            }
        }
        let flag = Arc::new(AtomicBool::new(false));
        self.cancellations.insert(key.clone(), Arc::clone(&flag));
        self.audit(key, "register", RunStatus::Pending.label());
        Ok(flag)
    }

    /// Drop `flag` unless a rerun with the same key has already replaced it
    fn release_flag(&self, key: &RunKey, flag: &Arc<AtomicBool>) {
        self.cancellations
            .remove_if(key, |_, current| Arc::ptr_eq(current, flag));
    }

    fn advance(
        &self,
        key: &RunKey,
        to: RunStatus,
        edit: impl FnOnce(&mut RunRecord),
    ) -> Result<(), OrchestratorError> {
        let mut run = self
            .runs
            .get_mut(key)
            .ok_or_else(|| OrchestratorError::RunNotFound(key.clone()))?;
        transition(&mut run.status, to)?;
        edit(&mut run);
        run.updated_at = Utc::now();
        tracing::debug!(run = %key, status = %to, "run status changed");
        Ok(())
    }

    fn edit(&self, key: &RunKey, edit: impl FnOnce(&mut RunRecord)) -> Result<(), OrchestratorError> {
        let mut run = self
            .runs
            .get_mut(key)
            .ok_or_else(|| OrchestratorError::RunNotFound(key.clone()))?;
        edit(&mut run);
        run.updated_at = Utc::now();
        Ok(())
    }

    /// Abort a run that stopped for a reason other than a gate, step or cancel
    fn settle_aborted(&self, key: &RunKey, reason: &str) {
        let aborted = self.advance(key, RunStatus::Aborted, |run| {
            run.failure = Some(reason.to_string());
        });
        if aborted.is_ok() {
            self.audit(key, "abort", reason);
        }
    }

    fn audit(&self, key: &RunKey, action: &str, result: &str) {
        self.ledger.append(Event::new(key.clone(), action, result));
    }

    /// Validate and store one record
    pub fn ingest(&self, draft: RecordDraft) -> Result<StoredRecord, OrchestratorError> {
        draft.validate()?;
        Ok(self.store.write(draft)?)
    }

    pub fn query(&self, query: &RecordQuery) -> Result<RecordPage, OrchestratorError> {
        Ok(self.store.query(query)?)
    }

    pub fn snapshot(&self, key: &RunKey) -> Result<Snapshot, OrchestratorError> {
        Ok(self.store.snapshot(key)?)
    }

    pub fn compact(&self, key: &RunKey) -> Result<CompactionReport, OrchestratorError> {
        let report = self.store.compact(key)?;
        self.audit(key, "compact", &format!("dropped {}", report.dropped));
        Ok(report)
    }

    #[must_use]
    pub fn run(&self, key: &RunKey) -> Option<RunRecord> {
        self.runs.get(key).map(|run| run.clone())
    }

    /// All runs, oldest first
    #[must_use]
    pub fn runs(&self) -> Vec<RunRecord> {
        let mut runs: Vec<RunRecord> = self.runs.iter().map(|run| run.clone()).collect();
        runs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.run_key.to_string().cmp(&b.run_key.to_string()))
        });
        runs
    }

    #[must_use]
    pub fn artifact(&self, id: &ArtifactId) -> Option<Artifact> {
        self.artifacts.get(id).map(|artifact| artifact.clone())
    }

    /// Artifacts produced under `key`, oldest first
    #[must_use]
    pub fn artifacts(&self, key: &RunKey) -> Vec<Artifact> {
        let mut artifacts: Vec<Artifact> = self
            .artifacts
            .iter()
            .filter(|artifact| &artifact.run_key == key)
            .map(|artifact| artifact.clone())
            .collect();
        artifacts.sort_by_key(|artifact| artifact.completed_at);
        artifacts
    }

    /// Ledger entries for one run, in append order
    #[must_use]
    pub fn events(&self, key: &RunKey) -> Vec<Event> {
        self.ledger.events_for(key)
    }

    pub fn verify_ledger(&self) -> Result<(), OrchestratorError> {
        Ok(self.ledger.verify_integrity()?)
    }

    /// Ask an in-flight run to stop before its next step
    ///
    /// Returns `false` when the run has already settled.
    pub fn cancel(&self, key: &RunKey) -> Result<bool, OrchestratorError> {
        let status = self
            .runs
            .get(key)
            .map(|run| run.status)
            .ok_or_else(|| OrchestratorError::RunNotFound(key.clone()))?;
        if status.is_terminal() {
            return Ok(false);
        }
        match self.cancellations.get(key) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                self.audit(key, "cancel-requested", status.label());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }
}

impl Default for RecoveryOrchestrator {
    fn default() -> Self {
        let config = ConsoleConfig::default();
        let store = Arc::new(RecordStore::new(config.store));
        Self::assemble(config, store, Arc::new(DefaultStepExecutor))
    }
}
