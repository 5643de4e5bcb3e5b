//! Recovery Console Kernel (recon-kernel)
//!
//! The leaf layer of the recovery console: everything here is synchronous
//! and holds its state in process memory.
//!
//! - [`store`]: bounded, per-run record store with paginated queries
//! - [`scoring`]: severity folds and risk banding
//! - [`ranking`]: deterministic candidate route ranking
//! - [`scheduler`]: array-backed campaign queue drained by a tick
//! - [`state_machine`]: one-directional lifecycle tables
//! - [`logging`]: hash-chained audit log
//! - [`validation`]: decode-then-validate gate for inbound payloads
//!
//! # Quick Start
//!
//! ```rust
//! use recon_kernel::prelude::*;
//!
//! let store = RecordStore::default();
//! let key = RunKey::parse("acme", "run-1").unwrap();
//! let stage = StageId::new("intake").unwrap();
//! store.write(RecordDraft::new(&key, stage, 42.0)).unwrap();
//!
//! let snapshot = store.snapshot(&key).unwrap();
//! assert_eq!(snapshot.band(), RiskBand::Medium);
//! ```

pub mod error;
pub mod logging;
pub mod ranking;
pub mod scheduler;
pub mod scoring;
pub mod snapshot;
pub mod state_machine;
pub mod store;
pub mod types;
pub mod validation;

pub mod test_harness;

pub use error::*;
pub use types::*;

/// Common imports
pub mod prelude {
    pub use crate::error::{
        KernelError, LogError, SchedulerError, StateMachineError, StoreError, ValidationError,
    };
    pub use crate::logging::{Event, EventLog};
    pub use crate::ranking::{
        rank_routes, score_route, Candidate, CandidateId, Objective, RankingPolicy, Route,
        RouteStep,
    };
    pub use crate::scheduler::{
        Campaign, CampaignScheduler, PulseOutcome, PulseSimulator, StepSimulator, TickReport,
    };
    pub use crate::scoring::{RiskAssessment, RiskBand, WeightedSignal};
    pub use crate::snapshot::Snapshot;
    pub use crate::state_machine::{transition, validate_transition, Lifecycle};
    pub use crate::store::{
        CompactionReport, RecordDraft, RecordPage, RecordQuery, RecordStore, StoreConfig,
        StoredRecord,
    };
    pub use crate::types::{
        ArtifactId, CampaignId, CampaignState, EventId, RecordId, RouteId, RunId, RunKey,
        RunStatus, StageId, TenantId,
    };
    pub use crate::validation::{parse_payload, Validate};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Check if running with strict debugging enabled
pub const fn strict_debug() -> bool {
    cfg!(feature = "strict-debug")
}
