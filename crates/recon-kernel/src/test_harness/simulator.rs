//! Seeded campaign simulation
//!
//! Generates synthetic campaigns from a seed, drives them through the
//! [`CampaignScheduler`] tick by tick, and checks the scheduler invariants
//! after every tick:
//! - no campaign is left `queued` once a tick returns
//! - every generated campaign is accounted for exactly once

use crate::scheduler::{Campaign, CampaignScheduler, PulseOutcome, PulseSimulator, StepSimulator};
use crate::types::{CampaignId, CampaignState, TenantId};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    pub campaigns: usize,
    /// Safety stop for campaigns that never settle
    pub max_ticks: u64,
    /// Chance that a pulse is cancelled outright
    pub cancel_probability: f64,
    /// Minutes added to an active campaign's pulse between ticks
    pub requeue_delay_minutes: u32,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            campaigns: 64,
            max_ticks: 32,
            cancel_probability: 0.05,
            requeue_delay_minutes: 15,
        }
    }
}

/// Pulse simulator driven by a seeded RNG on top of [`StepSimulator`]
#[derive(Debug)]
pub struct SeededSimulator {
    rng: StdRng,
    cancel_probability: f64,
    inner: StepSimulator,
}

impl SeededSimulator {
    pub fn new(seed: u64, cancel_probability: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            cancel_probability: cancel_probability.clamp(0.0, 1.0),
            inner: StepSimulator::default(),
        }
    }
}

impl PulseSimulator for SeededSimulator {
    fn simulate(&mut self, campaign: &Campaign) -> PulseOutcome {
        if self.rng.gen_bool(self.cancel_probability) {
            PulseOutcome::Cancelled
        } else {
            self.inner.simulate(campaign)
        }
    }
}

/// An invariant broken during simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    LeftQueued { tick: u64, remaining: usize },
    Unaccounted { expected: usize, seen: usize },
    SchedulerRejected(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    pub ticks: u64,
    pub pulses: usize,
    pub completed: usize,
    pub throttled: usize,
    pub cancelled: usize,
    pub still_active: usize,
}

/// Final report from simulator
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    pub config: SimulatorConfig,
    pub stats: SimulatorStats,
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate text report
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Campaign Simulation Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Campaigns: {}\n", self.config.campaigns));
        report.push_str(&format!("Ticks: {}\n", self.stats.ticks));
        report.push_str(&format!("Pulses: {}\n", self.stats.pulses));
        report.push_str(&format!("Completed: {}\n", self.stats.completed));
        report.push_str(&format!("Throttled: {}\n", self.stats.throttled));
        report.push_str(&format!("Cancelled: {}\n", self.stats.cancelled));
        report.push_str(&format!("Still Active: {}\n", self.stats.still_active));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

/// Generate a random campaign
fn generate_campaign(rng: &mut StdRng, index: usize, tenant: &TenantId) -> Option<Campaign> {
    let id = CampaignId::new(format!("campaign-{index:04}")).ok()?;
    Some(
        Campaign::new(id, tenant.clone(), format!("synthetic recovery {index}"))
            .with_pulse(rng.gen_range(0..240))
            .with_planned_pulses(rng.gen_range(1..=4))
            .with_risk(rng.gen_range(0.0..100.0)),
    )
}

/// A tick must leave the queue empty; checked before active campaigns are requeued
fn check_drained(tick: u64, scheduler: &CampaignScheduler) -> Option<Violation> {
    let remaining = scheduler.queued_len();
    (remaining > 0).then_some(Violation::LeftQueued { tick, remaining })
}

/// Run the campaign simulator
pub fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut simulator = SeededSimulator::new(config.seed.wrapping_add(1), config.cancel_probability);
    let mut scheduler = CampaignScheduler::new();
    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();

    let tenant = TenantId::new("simulated").ok();
    for index in 0..config.campaigns {
        let Some(campaign) = tenant
            .as_ref()
            .and_then(|t| generate_campaign(&mut rng, index, t))
        else {
            continue;
        };
        if let Err(e) = scheduler.enqueue(campaign) {
            violations.push(Violation::SchedulerRejected(e.to_string()));
        }
    }

    while !scheduler.is_idle() && stats.ticks < config.max_ticks {
        match scheduler.run_tick(&mut simulator) {
            Ok(report) => {
                stats.ticks = report.tick;
                stats.pulses += report.processed.len();
                violations.extend(check_drained(report.tick, &scheduler));
            }
            Err(e) => {
                violations.push(Violation::SchedulerRejected(e.to_string()));
                break;
            }
        }
        scheduler.requeue_active(config.requeue_delay_minutes);
    }

    for campaign in scheduler.finished() {
        match campaign.state {
            CampaignState::Completed => stats.completed += 1,
            CampaignState::Throttled => stats.throttled += 1,
            CampaignState::Cancelled => stats.cancelled += 1,
            CampaignState::Queued | CampaignState::Active => {}
        }
    }
    stats.still_active = scheduler.active().count() + scheduler.queued_len();

    let seen = stats.completed + stats.throttled + stats.cancelled + stats.still_active;
    if seen != config.campaigns {
        violations.push(Violation::Unaccounted {
            expected: config.campaigns,
            seen,
        });
    }

    SimulatorReport {
        config,
        stats,
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_passes_and_settles() {
        let report = run_simulator(SimulatorConfig::default());
        assert!(report.passed(), "{}", report.generate_text());
        assert_eq!(report.stats.still_active, 0);
        assert!(report.stats.completed > 0);
    }

    #[test]
    fn simulation_is_reproducible() {
        let a = run_simulator(SimulatorConfig::default());
        let b = run_simulator(SimulatorConfig::default());
        assert_eq!(a.stats, b.stats);
    }

    #[test]
    fn undrained_queue_is_flagged() {
        let mut rng = StdRng::seed_from_u64(7);
        let tenant = TenantId::new("simulated").unwrap();
        let mut scheduler = CampaignScheduler::new();
        scheduler
            .enqueue(generate_campaign(&mut rng, 0, &tenant).unwrap())
            .unwrap();

        assert_eq!(
            check_drained(0, &scheduler),
            Some(Violation::LeftQueued { tick: 0, remaining: 1 })
        );

        let report = scheduler.run_tick(&mut StepSimulator::default()).unwrap();
        assert_eq!(check_drained(report.tick, &scheduler), None);
    }

    #[test]
    fn zero_cancel_probability_never_cancels() {
        let report = run_simulator(SimulatorConfig {
            cancel_probability: 0.0,
            ..SimulatorConfig::default()
        });
        assert_eq!(report.stats.cancelled, 0);
    }
}
