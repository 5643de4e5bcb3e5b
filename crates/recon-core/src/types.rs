//! Core types for run orchestration

use chrono::{DateTime, Utc};
use recon_kernel::ranking::{Candidate, CandidateId, Route};
use recon_kernel::scoring::RiskAssessment;
use recon_kernel::store::RecordDraft;
use recon_kernel::validation::{ensure, ensure_finite, Validate};
use recon_kernel::{ArtifactId, RunId, RunKey, RunStatus, StageId, TenantId, ValidationError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A signal submitted alongside a run request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalInput {
    pub stage: StageId,
    pub severity: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

fn default_weight() -> f64 {
    1.0
}

impl SignalInput {
    #[inline]
    #[must_use]
    pub fn new(stage: StageId, severity: f64) -> Self {
        Self {
            stage,
            severity,
            weight: default_weight(),
            details: serde_json::Map::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Draft for the store, scoped to `key`
    pub fn to_draft(&self, key: &RunKey) -> RecordDraft {
        let mut draft = RecordDraft::new(key, self.stage.clone(), self.severity)
            .with_weight(self.weight);
        draft.details = self.details.clone();
        draft
    }
}

impl Validate for SignalInput {
    fn validate(&self) -> Result<(), ValidationError> {
        ensure_finite(self.severity, "severity")?;
        ensure_finite(self.weight, "weight")?;
        ensure(self.weight >= 0.0, "weight", "must not be negative")
    }
}

/// Everything the orchestrator needs to carry out one recovery run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub tenant: TenantId,
    pub run: RunId,
    pub routes: Vec<Route>,
    #[serde(default)]
    pub signals: Vec<SignalInput>,
}

impl RunRequest {
    #[inline]
    #[must_use]
    pub fn new(key: &RunKey) -> Self {
        Self {
            tenant: key.tenant.clone(),
            run: key.run.clone(),
            routes: Vec::new(),
            signals: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_signal(mut self, signal: SignalInput) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn run_key(&self) -> RunKey {
        RunKey::new(self.tenant.clone(), self.run.clone())
    }
}

impl Validate for RunRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        ensure(!self.routes.is_empty(), "routes", "must not be empty")?;
        for (i, route) in self.routes.iter().enumerate() {
            route.validate().map_err(|e| e.nested(&format!("routes[{i}]")))?;
        }
        for (i, signal) in self.signals.iter().enumerate() {
            signal.validate().map_err(|e| e.nested(&format!("signals[{i}]")))?;
        }
        Ok(())
    }
}

/// The orchestrator's view of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_key: RunKey,
    pub status: RunStatus,
    /// Ranked plan, best first
    pub candidates: Vec<Candidate>,
    pub selected: Option<Candidate>,
    pub risk: Option<RiskAssessment>,
    pub completed_steps: Vec<String>,
    pub failure: Option<String>,
    pub artifact: Option<ArtifactId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(run_key: RunKey) -> Self {
        let now = Utc::now();
        Self {
            run_key,
            status: RunStatus::Pending,
            candidates: Vec::new(),
            selected: None,
            risk: None,
            completed_steps: Vec::new(),
            failure: None,
            artifact: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Synthetic output of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub run_key: RunKey,
    pub candidate_id: CandidateId,
    pub steps: Vec<String>,
    pub completed_at: DateTime<Utc>,
    /// Hex SHA-256 over the fields above
    pub checksum: String,
}

impl Artifact {
    pub fn new(run_key: RunKey, candidate_id: CandidateId, steps: Vec<String>) -> Self {
        let mut artifact = Self {
            id: ArtifactId::new(),
            run_key,
            candidate_id,
            steps,
            completed_at: Utc::now(),
            checksum: String::new(),
        };
        artifact.checksum = artifact.compute_checksum();
        artifact
    }

    /// Whether the stored checksum still matches the content
    #[must_use]
    pub fn verify_checksum(&self) -> bool {
        self.checksum == self.compute_checksum()
    }

    fn compute_checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.id.to_string().as_bytes());
        hasher.update([0]);
        hasher.update(self.run_key.to_string().as_bytes());
        hasher.update([0]);
        hasher.update(self.candidate_id.as_str().as_bytes());
        for step in &self.steps {
            hasher.update([0]);
            hasher.update(step.as_bytes());
        }
        hasher.update(self.completed_at.timestamp_micros().to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// What a successful `execute` hands back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_key: RunKey,
    pub status: RunStatus,
    pub candidate: Candidate,
    pub risk: RiskAssessment,
    pub artifact: Artifact,
    pub execution_time_ms: u64,
}
