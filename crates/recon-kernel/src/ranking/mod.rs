//! Candidate route ranking
//!
//! Each route is scored as
//!
//! ```text
//! score = mean(objective weights) * 10 + resilience - age_penalty - duration_penalty
//! ```
//!
//! and routes are ordered by score (descending), then estimated duration
//! (ascending), then route id. The result is a pure function of its input.

use crate::error::ValidationError;
use crate::scoring::clamp_score;
use crate::types::RouteId;
use crate::validation::{ensure, ensure_finite, Validate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

const OBJECTIVE_SCALE: f64 = 10.0;

/// One ordered step of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStep {
    pub name: String,
    #[serde(default)]
    pub estimated_minutes: u32,
}

impl RouteStep {
    pub fn new(name: impl Into<String>, estimated_minutes: u32) -> Self {
        Self {
            name: name.into(),
            estimated_minutes,
        }
    }
}

/// Weighted objective a route serves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
    pub weight: f64,
}

impl Objective {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// A possible ordered sequence of recovery steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub steps: Vec<RouteStep>,
    #[serde(default)]
    pub objectives: Vec<Objective>,
    pub resilience_score: f64,
    /// Hours since the route was last exercised
    #[serde(default)]
    pub age_hours: f64,
    /// Declared duration; zero means "sum of step estimates"
    #[serde(default)]
    pub expected_duration_minutes: u32,
}

impl Route {
    pub fn new(id: RouteId, resilience_score: f64) -> Self {
        Self {
            id,
            steps: Vec::new(),
            objectives: Vec::new(),
            resilience_score,
            age_hours: 0.0,
            expected_duration_minutes: 0,
        }
    }

    #[must_use]
    pub fn with_step(mut self, step: RouteStep) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objectives.push(objective);
        self
    }

    #[must_use]
    pub fn with_age_hours(mut self, age_hours: f64) -> Self {
        self.age_hours = age_hours;
        self
    }

    #[must_use]
    pub fn with_expected_duration(mut self, minutes: u32) -> Self {
        self.expected_duration_minutes = minutes;
        self
    }

    /// Declared duration, or the sum of step estimates when undeclared
    pub fn estimated_duration_minutes(&self) -> u32 {
        if self.expected_duration_minutes > 0 {
            self.expected_duration_minutes
        } else {
            self.steps
                .iter()
                .fold(0u32, |acc, s| acc.saturating_add(s.estimated_minutes))
        }
    }
}

impl Validate for Route {
    fn validate(&self) -> Result<(), ValidationError> {
        ensure(!self.steps.is_empty(), "steps", "route must have at least one step")?;
        for (i, step) in self.steps.iter().enumerate() {
            ensure(
                !step.name.trim().is_empty(),
                &format!("steps[{i}].name"),
                "must not be blank",
            )?;
        }
        for (i, objective) in self.objectives.iter().enumerate() {
            ensure_finite(objective.weight, &format!("objectives[{i}].weight"))?;
        }
        ensure_finite(self.resilience_score, "resilience_score")?;
        ensure_finite(self.age_hours, "age_hours")?;
        ensure(self.age_hours >= 0.0, "age_hours", "must not be negative")
    }
}

/// Penalty coefficients applied during ranking
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingPolicy {
    pub age_penalty_per_hour: f64,
    pub max_age_penalty: f64,
    pub duration_penalty_per_minute: f64,
    pub max_duration_penalty: f64,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            age_penalty_per_hour: 0.5,
            max_age_penalty: 20.0,
            duration_penalty_per_minute: 0.1,
            max_duration_penalty: 25.0,
        }
    }
}

impl RankingPolicy {
    fn age_penalty(&self, route: &Route) -> f64 {
        finite_or_zero(route.age_hours.max(0.0) * self.age_penalty_per_hour)
            .min(self.max_age_penalty)
    }

    fn duration_penalty(&self, route: &Route) -> f64 {
        finite_or_zero(f64::from(route.estimated_duration_minutes()) * self.duration_penalty_per_minute)
            .min(self.max_duration_penalty)
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Candidate identifier derived from its source route
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn from_route(route: &RouteId) -> Self {
        Self(format!("candidate:{route}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A ranked route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub route_id: RouteId,
    pub steps: Vec<RouteStep>,
    /// Raw, unclamped ranking score
    pub score: f64,
    /// Score clamped to `[0, 100]`
    pub confidence: f64,
    pub estimated_duration_minutes: u32,
    /// 1-based position in the ranking
    pub rank: usize,
}

/// Raw ranking score of a single route
#[must_use]
pub fn score_route(route: &Route, policy: &RankingPolicy) -> f64 {
    let objective_term = if route.objectives.is_empty() {
        0.0
    } else {
        let total: f64 = route.objectives.iter().map(|o| finite_or_zero(o.weight)).sum();
        total / route.objectives.len() as f64 * OBJECTIVE_SCALE
    };
    objective_term + finite_or_zero(route.resilience_score)
        - policy.age_penalty(route)
        - policy.duration_penalty(route)
}

fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.estimated_duration_minutes.cmp(&b.estimated_duration_minutes))
        .then_with(|| a.route_id.cmp(&b.route_id))
}

/// Rank `routes` and keep the best `top_n`
#[must_use]
pub fn rank_routes(routes: &[Route], policy: &RankingPolicy, top_n: usize) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = routes
        .iter()
        .map(|route| {
            let score = score_route(route, policy);
            Candidate {
                id: CandidateId::from_route(&route.id),
                route_id: route.id.clone(),
                steps: route.steps.clone(),
                score,
                confidence: clamp_score(score),
                estimated_duration_minutes: route.estimated_duration_minutes(),
                rank: 0,
            }
        })
        .collect();

    candidates.sort_by(compare_candidates);
    candidates.truncate(top_n);
    for (i, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = i + 1;
    }

    tracing::trace!(routes = routes.len(), kept = candidates.len(), "ranked routes");
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn route(id: &str, resilience: f64) -> Route {
        Route::new(RouteId::new(id).unwrap(), resilience)
            .with_step(RouteStep::new("drain", 5))
            .with_objective(Objective::new("availability", 5.0))
            .with_objective(Objective::new("latency", 5.0))
    }

    #[test]
    fn resilience_dominates_with_equal_objectives() {
        let routes = vec![route("r-40", 40.0), route("r-60", 60.0), route("r-80", 80.0)];
        let ranked = rank_routes(&routes, &RankingPolicy::default(), 3);
        let order: Vec<&str> = ranked.iter().map(|c| c.route_id.as_str()).collect();
        assert_eq!(order, vec!["r-80", "r-60", "r-40"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].id.as_str(), "candidate:r-80");
    }

    #[test]
    fn score_formula() {
        let r = route("r", 30.0).with_age_hours(4.0).with_expected_duration(50);
        // 5 * 10 + 30 - 2 - 5
        assert!((score_route(&r, &RankingPolicy::default()) - 73.0).abs() < 1e-9);
    }

    #[test]
    fn penalties_are_capped() {
        let r = route("r", 0.0).with_age_hours(10_000.0).with_expected_duration(100_000);
        assert!((score_route(&r, &RankingPolicy::default()) - (50.0 - 20.0 - 25.0)).abs() < 1e-9);
    }

    #[test]
    fn ties_break_on_duration_then_id() {
        let routes = vec![
            route("b", 50.0).with_expected_duration(10),
            route("a", 50.0).with_expected_duration(10),
            route("fast", 50.5).with_expected_duration(5),
        ];
        let policy = RankingPolicy {
            duration_penalty_per_minute: 0.0,
            ..RankingPolicy::default()
        };
        let ranked = rank_routes(&routes, &policy, 10);
        let order: Vec<&str> = ranked.iter().map(|c| c.route_id.as_str()).collect();
        assert_eq!(order, vec!["fast", "a", "b"]);
    }

    #[test]
    fn confidence_is_clamped() {
        let high = route("high", 500.0);
        let low = route("low", -500.0);
        let ranked = rank_routes(&[high, low], &RankingPolicy::default(), 2);
        assert_eq!(ranked[0].confidence, 100.0);
        assert_eq!(ranked[1].confidence, 0.0);
    }

    #[test]
    fn route_validation() {
        let empty = Route::new(RouteId::new("empty").unwrap(), 10.0);
        assert!(empty.validate().is_err());
        let bad_weight = route("w", 10.0).with_objective(Objective::new("x", f64::NAN));
        let err = bad_weight.validate().unwrap_err();
        assert_eq!(err.field(), Some("objectives[2].weight"));
    }

    proptest! {
        #[test]
        fn prop_ranking_is_deterministic(
            specs in proptest::collection::vec((0.0f64..100.0, 0.0f64..48.0, 0u32..240), 1..12),
            top_n in 1usize..12,
        ) {
            let routes: Vec<Route> = specs
                .iter()
                .enumerate()
                .map(|(i, (res, age, dur))| {
                    route(&format!("r{i}"), *res).with_age_hours(*age).with_expected_duration(*dur)
                })
                .collect();
            let first = rank_routes(&routes, &RankingPolicy::default(), top_n);
            let second = rank_routes(&routes, &RankingPolicy::default(), top_n);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.len() <= top_n);
            for c in &first {
                prop_assert!((0.0..=100.0).contains(&c.confidence));
            }
            for pair in first.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
