//! Policy gates
//!
//! Pure threshold checks run between planning and execution. Every gate is
//! evaluated, so a rejection lists all the reasons at once.

use crate::config::PolicyConfig;
use recon_kernel::ranking::Candidate;
use recon_kernel::scoring::{RiskAssessment, RiskBand};

/// One failed gate
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("risk band {band} exceeds {max}")]
    RiskTooHigh { band: RiskBand, max: RiskBand },

    #[error("confidence {confidence:.1} below minimum {min:.1}")]
    ConfidenceTooLow { confidence: f64, min: f64 },

    #[error("estimated duration {minutes}m exceeds {max}m")]
    DurationTooLong { minutes: u32, max: u32 },
}

/// Result of running every gate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyDecision {
    pub violations: Vec<PolicyViolation>,
}

impl PolicyDecision {
    #[inline]
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

/// Check a selected candidate and the run's risk against the configured gates
#[must_use]
pub fn evaluate(policy: &PolicyConfig, candidate: &Candidate, risk: &RiskAssessment) -> PolicyDecision {
    let mut violations = Vec::new();

    if risk.band > policy.max_risk_band {
        violations.push(PolicyViolation::RiskTooHigh {
            band: risk.band,
            max: policy.max_risk_band,
        });
    }
    if candidate.confidence < policy.min_confidence {
        violations.push(PolicyViolation::ConfidenceTooLow {
            confidence: candidate.confidence,
            min: policy.min_confidence,
        });
    }
    if let Some(max) = policy.max_duration_minutes {
        if candidate.estimated_duration_minutes > max {
            violations.push(PolicyViolation::DurationTooLong {
                minutes: candidate.estimated_duration_minutes,
                max,
            });
        }
    }

    PolicyDecision { violations }
}
