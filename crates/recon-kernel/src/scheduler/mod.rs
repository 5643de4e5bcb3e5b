//! Campaign Scheduler
//!
//! An array-backed queue. "Next" is the queued campaign with the smallest
//! `next_pulse_minutes`, found by linear scan (ties go to the earliest
//! enqueued). `next_pulse_minutes` is only a priority: nothing here reads
//! the wall clock, and a tick runs synchronously until the queue is empty.
//!
//! Every campaign popped during a tick leaves it either settled
//! (`completed`, `throttled`, `cancelled`) or `active`. Active campaigns
//! wait outside the queue until [`CampaignScheduler::requeue_active`]
//! gives them another pulse.

use crate::error::{SchedulerError, ValidationError};
use crate::scoring::{clamp_score, RiskBand};
use crate::state_machine::{transition, Lifecycle};
use crate::types::{CampaignId, CampaignState, TenantId};
use crate::validation::{ensure, ensure_finite, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A scheduled recovery campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub tenant: TenantId,
    pub name: String,
    /// Priority; lower pulses first
    pub next_pulse_minutes: u32,
    pub planned_pulses: u32,
    #[serde(default)]
    pub completed_pulses: u32,
    #[serde(default)]
    pub risk_score: f64,
    #[serde(default = "queued")]
    pub state: CampaignState,
}

fn queued() -> CampaignState {
    CampaignState::Queued
}

impl Campaign {
    pub fn new(id: CampaignId, tenant: TenantId, name: impl Into<String>) -> Self {
        Self {
            id,
            tenant,
            name: name.into(),
            next_pulse_minutes: 0,
            planned_pulses: 1,
            completed_pulses: 0,
            risk_score: 0.0,
            state: CampaignState::Queued,
        }
    }

    #[must_use]
    pub fn with_pulse(mut self, minutes: u32) -> Self {
        self.next_pulse_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_planned_pulses(mut self, pulses: u32) -> Self {
        self.planned_pulses = pulses;
        self
    }

    #[must_use]
    pub fn with_risk(mut self, score: f64) -> Self {
        self.risk_score = clamp_score(score);
        self
    }

    pub fn risk_band(&self) -> RiskBand {
        RiskBand::from_score(self.risk_score)
    }

    pub fn remaining_pulses(&self) -> u32 {
        self.planned_pulses.saturating_sub(self.completed_pulses)
    }
}

impl Validate for Campaign {
    fn validate(&self) -> Result<(), ValidationError> {
        ensure(!self.name.trim().is_empty(), "name", "must not be blank")?;
        ensure(self.planned_pulses > 0, "planned_pulses", "must be positive")?;
        ensure_finite(self.risk_score, "risk_score")?;
        ensure(
            self.state == CampaignState::Queued,
            "state",
            "new campaigns must be queued",
        )
    }
}

/// What a simulated pulse did to a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseOutcome {
    /// Final pulse done
    Completed,
    /// Pulse done, more planned; campaign stays active
    Continue,
    /// Held back by risk
    Throttled,
    Cancelled,
}

/// Executes one pulse of a campaign
pub trait PulseSimulator {
    fn simulate(&mut self, campaign: &Campaign) -> PulseOutcome;
}

impl<F> PulseSimulator for F
where
    F: FnMut(&Campaign) -> PulseOutcome,
{
    fn simulate(&mut self, campaign: &Campaign) -> PulseOutcome {
        self(campaign)
    }
}

/// Deterministic simulator: throttles risky campaigns, otherwise advances
/// one pulse per call
#[derive(Debug, Clone, Copy)]
pub struct StepSimulator {
    pub throttle_band: RiskBand,
}

impl Default for StepSimulator {
    fn default() -> Self {
        Self {
            throttle_band: RiskBand::Critical,
        }
    }
}

impl PulseSimulator for StepSimulator {
    fn simulate(&mut self, campaign: &Campaign) -> PulseOutcome {
        if campaign.risk_band() >= self.throttle_band {
            PulseOutcome::Throttled
        } else if campaign.remaining_pulses() <= 1 {
            PulseOutcome::Completed
        } else {
            PulseOutcome::Continue
        }
    }
}

/// Summary of one [`CampaignScheduler::run_tick`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    /// Campaigns in pulse order with the state each was left in
    pub processed: Vec<(CampaignId, CampaignState)>,
    pub completed: usize,
    pub active: usize,
    pub throttled: usize,
    pub cancelled: usize,
}

impl TickReport {
    fn record(&mut self, id: CampaignId, state: CampaignState) {
        match state {
            CampaignState::Completed => self.completed += 1,
            CampaignState::Active => self.active += 1,
            CampaignState::Throttled => self.throttled += 1,
            CampaignState::Cancelled => self.cancelled += 1,
            CampaignState::Queued => {}
        }
        self.processed.push((id, state));
    }
}

#[derive(Debug, Clone)]
struct QueuedCampaign {
    ordinal: u64,
    campaign: Campaign,
}

#[derive(Debug, Default)]
pub struct CampaignScheduler {
    queue: Vec<QueuedCampaign>,
    settled: HashMap<CampaignId, Campaign>,
    next_ordinal: u64,
    ticks: u64,
}

impl CampaignScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fresh campaign to the queue
    ///
    /// # Errors
    /// - `DuplicateCampaign` if the id is queued or settled already
    /// - `NotEnqueueable` if the campaign is not in the `queued` state
    pub fn enqueue(&mut self, campaign: Campaign) -> Result<(), SchedulerError> {
        if campaign.state != CampaignState::Queued {
            return Err(SchedulerError::NotEnqueueable {
                id: campaign.id,
                state: campaign.state.to_string(),
            });
        }
        if self.contains(&campaign.id) {
            return Err(SchedulerError::DuplicateCampaign(campaign.id));
        }
        tracing::debug!(campaign = %campaign.id, pulse = campaign.next_pulse_minutes, "enqueued");
        self.push(campaign);
        Ok(())
    }

    fn push(&mut self, campaign: Campaign) {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        self.queue.push(QueuedCampaign { ordinal, campaign });
    }

    /// Remove a campaign from the queue, cancelling it
    pub fn remove(&mut self, id: &CampaignId) -> Result<Campaign, SchedulerError> {
        let idx = self
            .queue
            .iter()
            .position(|q| &q.campaign.id == id)
            .ok_or_else(|| SchedulerError::CampaignNotFound(id.clone()))?;
        let mut campaign = self.queue.remove(idx).campaign;
        // queued or requeued-active; both may cancel
        transition(&mut campaign.state, CampaignState::Cancelled)?;
        self.settled.insert(campaign.id.clone(), campaign.clone());
        Ok(campaign)
    }

    /// Pop the queued campaign with the smallest pulse, earliest first on ties
    fn pop_next(&mut self) -> Option<Campaign> {
        let idx = self
            .queue
            .iter()
            .enumerate()
            .min_by_key(|(_, q)| (q.campaign.next_pulse_minutes, q.ordinal))
            .map(|(i, _)| i)?;
        Some(self.queue.remove(idx).campaign)
    }

    /// Drain the queue, pulsing every campaign once
    #[tracing::instrument(skip_all, fields(tick = self.ticks + 1, queued = self.queue.len()))]
    pub fn run_tick<S: PulseSimulator + ?Sized>(
        &mut self,
        simulator: &mut S,
    ) -> Result<TickReport, SchedulerError> {
        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };

        while let Some(mut campaign) = self.pop_next() {
            if campaign.state == CampaignState::Queued {
                transition(&mut campaign.state, CampaignState::Active)?;
            }

            match simulator.simulate(&campaign) {
                PulseOutcome::Completed => {
                    campaign.completed_pulses = campaign.completed_pulses.saturating_add(1);
                    transition(&mut campaign.state, CampaignState::Completed)?;
                }
                PulseOutcome::Continue => {
                    campaign.completed_pulses = campaign.completed_pulses.saturating_add(1);
                }
                PulseOutcome::Throttled => {
                    transition(&mut campaign.state, CampaignState::Throttled)?;
                }
                PulseOutcome::Cancelled => {
                    transition(&mut campaign.state, CampaignState::Cancelled)?;
                }
            }

            report.record(campaign.id.clone(), campaign.state);
            self.settled.insert(campaign.id.clone(), campaign);
        }

        tracing::info!(
            completed = report.completed,
            active = report.active,
            throttled = report.throttled,
            cancelled = report.cancelled,
            "tick drained queue"
        );
        Ok(report)
    }

    /// Put every active campaign back in the queue, `delay_minutes` later
    pub fn requeue_active(&mut self, delay_minutes: u32) -> usize {
        let mut ids: Vec<CampaignId> = self
            .settled
            .values()
            .filter(|c| c.state == CampaignState::Active)
            .map(|c| c.id.clone())
            .collect();
        ids.sort();
        for id in &ids {
            if let Some(mut campaign) = self.settled.remove(id) {
                campaign.next_pulse_minutes = campaign.next_pulse_minutes.saturating_add(delay_minutes);
                self.push(campaign);
            }
        }
        ids.len()
    }

    pub fn get(&self, id: &CampaignId) -> Option<&Campaign> {
        self.queue
            .iter()
            .map(|q| &q.campaign)
            .find(|c| &c.id == id)
            .or_else(|| self.settled.get(id))
    }

    pub fn contains(&self, id: &CampaignId) -> bool {
        self.get(id).is_some()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Campaigns that reached a terminal state
    pub fn finished(&self) -> impl Iterator<Item = &Campaign> {
        self.settled.values().filter(|c| c.state.is_terminal())
    }

    /// Campaigns left active by the last tick
    pub fn active(&self) -> impl Iterator<Item = &Campaign> {
        self.settled
            .values()
            .filter(|c| c.state == CampaignState::Active)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
