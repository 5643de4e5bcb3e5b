//! Recovery plans
//!
//! A plan is the ranked candidate list for one run. It is built once from
//! the request's routes and never edited; the orchestrator executes the
//! first candidate.

use chrono::{DateTime, Utc};
use recon_kernel::ranking::{rank_routes, Candidate, RankingPolicy, Route};
use recon_kernel::RunKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub run_key: RunKey,
    /// Best first
    pub candidates: Vec<Candidate>,
    pub created_at: DateTime<Utc>,
}

impl RecoveryPlan {
    /// Rank `routes` and keep the best `top_n`
    pub fn build(run_key: RunKey, routes: &[Route], policy: &RankingPolicy, top_n: usize) -> Self {
        let candidates = rank_routes(routes, policy, top_n);
        tracing::debug!(
            run = %run_key,
            routes = routes.len(),
            kept = candidates.len(),
            "built recovery plan"
        );
        Self {
            run_key,
            candidates,
            created_at: Utc::now(),
        }
    }

    /// The candidate that will run
    #[must_use]
    pub fn selected(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
