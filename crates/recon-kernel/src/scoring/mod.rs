//! Scoring and risk banding
//!
//! Pure folds from severities to a score in `[0, 100]`, and from a score
//! to a [`RiskBand`]. Thresholds are fixed and illustrative:
//!
//! | score      | band     |
//! |------------|----------|
//! | `< 25`     | low      |
//! | `< 50`     | medium   |
//! | `< 75`     | high     |
//! | otherwise  | critical |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest score any fold produces
pub const SCORE_MIN: f64 = 0.0;
/// Highest score any fold produces
pub const SCORE_MAX: f64 = 100.0;

const MEDIUM_FLOOR: f64 = 25.0;
const HIGH_FLOOR: f64 = 50.0;
const CRITICAL_FLOOR: f64 = 75.0;

/// Clamp into `[0, 100]`; NaN maps to zero
#[inline]
#[must_use]
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        SCORE_MIN
    } else {
        value.clamp(SCORE_MIN, SCORE_MAX)
    }
}

/// Sum of finite severities, clamped
#[must_use]
pub fn sum_severity(severities: &[f64]) -> f64 {
    clamp_score(severities.iter().copied().filter(|s| s.is_finite()).sum())
}

/// Mean of finite severities, clamped; empty input scores zero
#[must_use]
pub fn mean_severity(severities: &[f64]) -> f64 {
    let finite: Vec<f64> = severities.iter().copied().filter(|s| s.is_finite()).collect();
    if finite.is_empty() {
        return SCORE_MIN;
    }
    clamp_score(finite.iter().sum::<f64>() / finite.len() as f64)
}

/// A severity with the weight it carries in an aggregate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedSignal {
    pub severity: f64,
    pub weight: f64,
}

impl WeightedSignal {
    #[inline]
    #[must_use]
    pub fn new(severity: f64, weight: f64) -> Self {
        Self { severity, weight }
    }

    fn is_usable(&self) -> bool {
        self.severity.is_finite() && self.weight.is_finite() && self.weight > 0.0
    }
}

/// Weighted average of usable signals, clamped.
///
/// Signals with non-finite values or non-positive weight are skipped; if
/// none remain the score is zero.
#[must_use]
pub fn weighted_score(signals: &[WeightedSignal]) -> f64 {
    let (total, weight) = signals
        .iter()
        .filter(|s| s.is_usable())
        .fold((0.0, 0.0), |(total, weight), s| {
            (total + clamp_score(s.severity) * s.weight, weight + s.weight)
        });
    if weight <= 0.0 {
        SCORE_MIN
    } else {
        clamp_score(total / weight)
    }
}

/// Qualitative risk bucket, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskBand {
    /// Band for a score. Monotonic: a higher score never yields a lower band.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        let score = clamp_score(score);
        if score < MEDIUM_FLOOR {
            RiskBand::Low
        } else if score < HIGH_FLOOR {
            RiskBand::Medium
        } else if score < CRITICAL_FLOOR {
            RiskBand::High
        } else {
            RiskBand::Critical
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Medium => "medium",
            RiskBand::High => "high",
            RiskBand::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Score and band of a signal set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub band: RiskBand,
    pub signal_count: usize,
}

impl RiskAssessment {
    #[must_use]
    pub fn from_signals(signals: &[WeightedSignal]) -> Self {
        let score = weighted_score(signals);
        Self {
            score,
            band: RiskBand::from_score(score),
            signal_count: signals.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn band_thresholds() {
        assert_eq!(RiskBand::from_score(0.0), RiskBand::Low);
        assert_eq!(RiskBand::from_score(24.99), RiskBand::Low);
        assert_eq!(RiskBand::from_score(25.0), RiskBand::Medium);
        assert_eq!(RiskBand::from_score(49.9), RiskBand::Medium);
        assert_eq!(RiskBand::from_score(50.0), RiskBand::High);
        assert_eq!(RiskBand::from_score(75.0), RiskBand::Critical);
        assert_eq!(RiskBand::from_score(f64::INFINITY), RiskBand::Critical);
        assert_eq!(RiskBand::from_score(f64::NAN), RiskBand::Low);
    }

    #[test]
    fn weighted_score_skips_unusable_signals() {
        let signals = [
            WeightedSignal::new(80.0, 3.0),
            WeightedSignal::new(20.0, 1.0),
            WeightedSignal::new(f64::NAN, 5.0),
            WeightedSignal::new(100.0, 0.0),
        ];
        assert!((weighted_score(&signals) - 65.0).abs() < 1e-9);
        assert_eq!(weighted_score(&[]), 0.0);
    }

    #[test]
    fn sum_and_mean_clamp() {
        assert_eq!(sum_severity(&[60.0, 70.0]), 100.0);
        assert_eq!(mean_severity(&[10.0, 30.0, f64::NAN]), 20.0);
        assert_eq!(mean_severity(&[]), 0.0);
    }

    proptest! {
        #[test]
        fn prop_band_is_monotonic(a in -50.0f64..150.0, b in -50.0f64..150.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(RiskBand::from_score(lo) <= RiskBand::from_score(hi));
        }

        #[test]
        fn prop_weighted_score_in_range(
            raw in proptest::collection::vec((-1000.0f64..1000.0, 0.0f64..10.0), 0..32)
        ) {
            let signals: Vec<_> = raw.into_iter().map(|(s, w)| WeightedSignal::new(s, w)).collect();
            let score = weighted_score(&signals);
            prop_assert!((SCORE_MIN..=SCORE_MAX).contains(&score));
        }
    }
}
