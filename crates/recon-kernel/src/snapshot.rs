//! Read-only run aggregates, recomputed on every request

use crate::scoring::{mean_severity, RiskAssessment, RiskBand, WeightedSignal};
use crate::store::StoredRecord;
use crate::types::{RunKey, StageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub run_key: RunKey,
    pub total: usize,
    pub per_stage: BTreeMap<StageId, usize>,
    pub mean_severity: f64,
    pub max_severity: f64,
    /// Weighted score the risk band is derived from
    pub risk: RiskAssessment,
    pub first_created_at: Option<DateTime<Utc>>,
    pub last_created_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn from_records(run_key: RunKey, records: &[StoredRecord]) -> Self {
        let mut per_stage = BTreeMap::new();
        for record in records {
            *per_stage.entry(record.stage.clone()).or_insert(0) += 1;
        }
        let severities: Vec<f64> = records.iter().map(|r| r.severity).collect();
        let signals: Vec<WeightedSignal> = records
            .iter()
            .map(|r| WeightedSignal::new(r.severity, r.weight))
            .collect();

        Self {
            run_key,
            total: records.len(),
            per_stage,
            mean_severity: mean_severity(&severities),
            max_severity: severities.iter().copied().fold(0.0, f64::max),
            risk: RiskAssessment::from_signals(&signals),
            first_created_at: records.iter().map(|r| r.created_at).min(),
            last_created_at: records.iter().map(|r| r.created_at).max(),
        }
    }

    pub fn band(&self) -> RiskBand {
        self.risk.band
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RecordDraft, RecordStore};

    #[test]
    fn snapshot_aggregates_run() {
        let store = RecordStore::default();
        let key = RunKey::parse("acme", "r1").unwrap();
        let intake = StageId::new("intake").unwrap();
        let verify = StageId::new("verify").unwrap();
        store.write(RecordDraft::new(&key, intake.clone(), 20.0)).unwrap();
        store.write(RecordDraft::new(&key, intake.clone(), 40.0)).unwrap();
        store.write(RecordDraft::new(&key, verify.clone(), 90.0).with_weight(2.0)).unwrap();

        let snapshot = store.snapshot(&key).unwrap();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.per_stage[&intake], 2);
        assert_eq!(snapshot.per_stage[&verify], 1);
        assert!((snapshot.mean_severity - 50.0).abs() < 1e-9);
        assert_eq!(snapshot.max_severity, 90.0);
        // (20 + 40 + 180) / 4
        assert!((snapshot.risk.score - 60.0).abs() < 1e-9);
        assert_eq!(snapshot.band(), RiskBand::High);
        assert!(snapshot.first_created_at < snapshot.last_created_at);
    }

    #[test]
    fn empty_run_snapshot() {
        let store = RecordStore::default();
        let key = RunKey::parse("acme", "none").unwrap();
        let snapshot = store.snapshot(&key).unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.band(), RiskBand::Low);
        assert_eq!(snapshot.first_created_at, None);
    }
}
