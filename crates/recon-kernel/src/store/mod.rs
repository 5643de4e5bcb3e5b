//! In-memory record store
//!
//! Records are bucketed by run key, then by stage. Each stage bucket is a
//! queue in append order, which is also creation order: the store hands out
//! strictly increasing `(created_at, sequence)` pairs under its write lock.
//!
//! Retention is per run. When a write pushes a run past
//! `max_records_per_run`, the oldest records of that run are dropped,
//! whichever stage they live in. There is no index beyond the two hash
//! maps; queries scan the matching buckets.

use crate::error::{StoreError, ValidationError};
use crate::snapshot::Snapshot;
use crate::types::{RecordId, RunId, RunKey, StageId, TenantId};
use crate::validation::{ensure, ensure_finite, Validate};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Store limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Retention cap per run, across all stages
    pub max_records_per_run: usize,
    /// Page size when a query sets no limit
    pub default_page_limit: usize,
    /// Upper bound for any requested page size
    pub max_page_limit: usize,
    /// Per-stage size left behind by [`RecordStore::compact`]
    pub compact_batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_records_per_run: 1024,
            default_page_limit: 128,
            max_page_limit: 1024,
            compact_batch_size: 256,
        }
    }
}

impl Validate for StoreConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        ensure(self.max_records_per_run > 0, "max_records_per_run", "must be positive")?;
        ensure(self.default_page_limit > 0, "default_page_limit", "must be positive")?;
        ensure(
            self.max_page_limit >= self.default_page_limit,
            "max_page_limit",
            "must be at least default_page_limit",
        )?;
        ensure(self.compact_batch_size > 0, "compact_batch_size", "must be positive")
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A signal as submitted for ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub tenant: TenantId,
    pub run: RunId,
    pub stage: StageId,
    #[serde(default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
    pub severity: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl RecordDraft {
    pub fn new(key: &RunKey, stage: StageId, severity: f64) -> Self {
        Self {
            tenant: key.tenant.clone(),
            run: key.run.clone(),
            stage,
            observed_at: Utc::now(),
            severity,
            weight: default_weight(),
            details: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }

    pub fn run_key(&self) -> RunKey {
        RunKey::new(self.tenant.clone(), self.run.clone())
    }
}

impl Validate for RecordDraft {
    fn validate(&self) -> Result<(), ValidationError> {
        ensure_finite(self.severity, "severity")?;
        ensure_finite(self.weight, "weight")?;
        ensure(self.weight >= 0.0, "weight", "must not be negative")
    }
}

/// A record as held by the store. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    /// Store-wide write order
    pub sequence: u64,
    pub tenant: TenantId,
    pub run: RunId,
    pub stage: StageId,
    pub observed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Severity clamped to `[0, 100]`
    pub severity: f64,
    pub weight: f64,
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl StoredRecord {
    pub fn run_key(&self) -> RunKey {
        RunKey::new(self.tenant.clone(), self.run.clone())
    }
}

/// Filter and paging options for [`RecordStore::query`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordQuery {
    pub tenant: Option<TenantId>,
    pub run: Option<RunId>,
    pub stage: Option<StageId>,
    /// Inclusive lower bound on `created_at`
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub until: Option<DateTime<Utc>>,
    pub min_severity: Option<f64>,
    /// Only records written before this sequence (paging cursor)
    pub before: Option<u64>,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_run(key: &RunKey) -> Self {
        Self {
            tenant: Some(key.tenant.clone()),
            run: Some(key.run.clone()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn stage(mut self, stage: StageId) -> Self {
        self.stage = Some(stage);
        self
    }

    #[must_use]
    pub fn since(mut self, at: DateTime<Utc>) -> Self {
        self.since = Some(at);
        self
    }

    #[must_use]
    pub fn until(mut self, at: DateTime<Utc>) -> Self {
        self.until = Some(at);
        self
    }

    #[must_use]
    pub fn min_severity(mut self, severity: f64) -> Self {
        self.min_severity = Some(severity);
        self
    }

    #[must_use]
    pub fn before(mut self, cursor: u64) -> Self {
        self.before = Some(cursor);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches_key(&self, key: &RunKey) -> bool {
        self.tenant.as_ref().map_or(true, |t| *t == key.tenant)
            && self.run.as_ref().map_or(true, |r| *r == key.run)
    }

    fn matches_stage(&self, stage: &StageId) -> bool {
        self.stage.as_ref().map_or(true, |s| s == stage)
    }

    fn matches(&self, record: &StoredRecord) -> bool {
        self.since.map_or(true, |at| record.created_at >= at)
            && self.until.map_or(true, |at| record.created_at < at)
            && self.min_severity.map_or(true, |min| record.severity >= min)
            && self.before.map_or(true, |seq| record.sequence < seq)
    }
}

/// One page of query results, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    pub items: Vec<StoredRecord>,
    pub has_more: bool,
    /// Pass as [`RecordQuery::before`] to fetch the next page
    pub next_cursor: Option<u64>,
}

/// Outcome of [`RecordStore::compact`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionReport {
    pub run_key: RunKey,
    pub dropped: usize,
    pub retained: usize,
}

#[derive(Debug, Default)]
struct RunBucket {
    stages: HashMap<StageId, VecDeque<StoredRecord>>,
    len: usize,
}

impl RunBucket {
    fn push(&mut self, record: StoredRecord) {
        self.stages
            .entry(record.stage.clone())
            .or_default()
            .push_back(record);
        self.len += 1;
    }

    /// Drop the run's oldest record, whichever stage holds it
    fn evict_oldest(&mut self) -> bool {
        let oldest = self
            .stages
            .iter()
            .filter_map(|(stage, queue)| queue.front().map(|r| (r.sequence, stage)))
            .min_by_key(|(sequence, _)| *sequence)
            .map(|(_, stage)| stage.clone());
        let Some(stage) = oldest else {
            return false;
        };
        if let Some(queue) = self.stages.get_mut(&stage) {
            queue.pop_front();
            if queue.is_empty() {
                self.stages.remove(&stage);
            }
        }
        self.len -= 1;
        true
    }

    fn trim_to(&mut self, cap: usize) -> usize {
        let mut dropped = 0;
        while self.len > cap && self.evict_oldest() {
            dropped += 1;
        }
        dropped
    }

    fn records(&self) -> impl Iterator<Item = &StoredRecord> {
        self.stages.values().flat_map(VecDeque::iter)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    runs: HashMap<RunKey, RunBucket>,
    next_sequence: u64,
    last_created: Option<DateTime<Utc>>,
    disposed: bool,
}

impl StoreState {
    /// Wall clock, nudged forward so creation times never repeat
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let at = match self.last_created {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created = Some(at);
        at
    }

    fn ensure_live(&self) -> Result<(), StoreError> {
        if self.disposed {
            Err(StoreError::Disposed)
        } else {
            Ok(())
        }
    }
}

/// Bounded, in-memory signal store
#[derive(Debug)]
pub struct RecordStore {
    config: StoreConfig,
    state: RwLock<StoreState>,
}

impl RecordStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Append a record and enforce the run's retention cap
    ///
    /// # Errors
    /// Returns [`StoreError::Disposed`] once the store has been disposed.
    pub fn write(&self, draft: RecordDraft) -> Result<StoredRecord, StoreError> {
        let mut state = self.state.write();
        state.ensure_live()?;

        let created_at = state.next_timestamp();
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let record = StoredRecord {
            id: RecordId::new(),
            sequence,
            tenant: draft.tenant,
            run: draft.run,
            stage: draft.stage,
            observed_at: draft.observed_at,
            created_at,
            severity: crate::scoring::clamp_score(draft.severity),
            weight: draft.weight,
            details: draft.details,
        };

        let cap = self.config.max_records_per_run.max(1);
        let bucket = state.runs.entry(record.run_key()).or_default();
        bucket.push(record.clone());
        let dropped = bucket.trim_to(cap);
        if dropped > 0 {
            tracing::debug!(run = %record.run_key(), dropped, "retention cap reached");
        }

        Ok(record)
    }

    /// Write drafts in order, stopping at the first failure
    pub fn write_batch(
        &self,
        drafts: impl IntoIterator<Item = RecordDraft>,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        drafts.into_iter().map(|d| self.write(d)).collect()
    }

    /// Filtered, de-duplicated page of records, newest first
    pub fn query(&self, query: &RecordQuery) -> Result<RecordPage, StoreError> {
        let state = self.state.read();
        state.ensure_live()?;

        let limit = query
            .limit
            .unwrap_or(self.config.default_page_limit)
            .clamp(1, self.config.max_page_limit.max(1));

        let mut seen = HashSet::new();
        let mut matched: Vec<&StoredRecord> = state
            .runs
            .iter()
            .filter(|(key, _)| query.matches_key(key))
            .flat_map(|(_, bucket)| bucket.stages.iter())
            .filter(|(stage, _)| query.matches_stage(stage))
            .flat_map(|(_, queue)| queue.iter())
            .filter(|record| query.matches(record))
            .filter(|record| seen.insert(record.id))
            .collect();

        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.sequence.cmp(&a.sequence))
        });

        let has_more = matched.len() > limit;
        let items: Vec<StoredRecord> = matched.into_iter().take(limit).cloned().collect();
        let next_cursor = if has_more {
            items.last().map(|r| r.sequence)
        } else {
            None
        };

        Ok(RecordPage {
            items,
            has_more,
            next_cursor,
        })
    }

    /// Trim every stage of a run to the compact batch size, newest kept
    pub fn compact(&self, key: &RunKey) -> Result<CompactionReport, StoreError> {
        let mut state = self.state.write();
        state.ensure_live()?;

        let batch = self.config.compact_batch_size.max(1);
        let mut dropped = 0;
        let mut retained = 0;
        if let Some(bucket) = state.runs.get_mut(key) {
            for queue in bucket.stages.values_mut() {
                while queue.len() > batch {
                    queue.pop_front();
                    dropped += 1;
                }
                retained += queue.len();
            }
            bucket.len = retained;
        }

        tracing::debug!(run = %key, dropped, retained, "compacted run");
        Ok(CompactionReport {
            run_key: key.clone(),
            dropped,
            retained,
        })
    }

    /// All records of a run in creation order
    pub fn records_for_run(&self, key: &RunKey) -> Result<Vec<StoredRecord>, StoreError> {
        let state = self.state.read();
        state.ensure_live()?;
        let mut records: Vec<StoredRecord> = state
            .runs
            .get(key)
            .map(|bucket| bucket.records().cloned().collect())
            .unwrap_or_default();
        records.sort_by_key(|r| r.sequence);
        Ok(records)
    }

    /// Aggregate view of one run
    pub fn snapshot(&self, key: &RunKey) -> Result<Snapshot, StoreError> {
        let records = self.records_for_run(key)?;
        Ok(Snapshot::from_records(key.clone(), &records))
    }

    pub fn run_keys(&self) -> Result<Vec<RunKey>, StoreError> {
        let state = self.state.read();
        state.ensure_live()?;
        let mut keys: Vec<RunKey> = state.runs.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Number of records held for a run
    pub fn run_len(&self, key: &RunKey) -> Result<usize, StoreError> {
        let state = self.state.read();
        state.ensure_live()?;
        Ok(state.runs.get(key).map_or(0, |b| b.len))
    }

    /// Total records across all runs
    pub fn len(&self) -> usize {
        self.state.read().runs.values().map(|b| b.len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop a run entirely, returning how many records it held
    pub fn clear_run(&self, key: &RunKey) -> Result<usize, StoreError> {
        let mut state = self.state.write();
        state.ensure_live()?;
        Ok(state.runs.remove(key).map_or(0, |b| b.len))
    }

    /// Release all data; every later call fails with [`StoreError::Disposed`]
    pub fn dispose(&self) {
        let mut state = self.state.write();
        if !state.disposed {
            state.runs.clear();
            state.disposed = true;
            tracing::debug!("record store disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state.read().disposed
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(run: &str) -> RunKey {
        RunKey::parse("tenant-a", run).unwrap()
    }

    fn stage(name: &str) -> StageId {
        StageId::new(name).unwrap()
    }

    #[test]
    fn write_assigns_increasing_sequence_and_time() {
        let store = RecordStore::default();
        let a = store.write(RecordDraft::new(&key("r1"), stage("intake"), 10.0)).unwrap();
        let b = store.write(RecordDraft::new(&key("r1"), stage("intake"), 20.0)).unwrap();
        assert!(b.sequence > a.sequence);
        assert!(b.created_at > a.created_at);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn write_batch_stops_at_first_failure() {
        let store = RecordStore::default();
        let k = key("r1");
        let pulled = std::cell::Cell::new(0);
        let drafts = (0..5).map(|i| {
            pulled.set(pulled.get() + 1);
            if i == 2 {
                store.dispose();
            }
            RecordDraft::new(&k, stage("intake"), f64::from(i))
        });

        let err = store.write_batch(drafts).unwrap_err();
        assert_eq!(err, StoreError::Disposed);
        assert_eq!(pulled.get(), 3);
    }

    #[test]
    fn write_batch_keeps_order() {
        let store = RecordStore::default();
        let k = key("r1");
        let written = store
            .write_batch((0..3).map(|i| RecordDraft::new(&k, stage("intake"), f64::from(i))))
            .unwrap();
        let severities: Vec<f64> = written.iter().map(|r| r.severity).collect();
        assert_eq!(severities, vec![0.0, 1.0, 2.0]);
        assert!(written.windows(2).all(|w| w[0].sequence < w[1].sequence));
        assert_eq!(store.run_len(&k).unwrap(), 3);
    }

    #[test]
    fn severity_is_clamped_on_write() {
        let store = RecordStore::default();
        let r = store.write(RecordDraft::new(&key("r1"), stage("s"), 250.0)).unwrap();
        assert_eq!(r.severity, 100.0);
    }

    #[test]
    fn retention_evicts_oldest_across_stages() {
        let store = RecordStore::new(StoreConfig {
            max_records_per_run: 3,
            ..StoreConfig::default()
        });
        let k = key("r1");
        let first = store.write(RecordDraft::new(&k, stage("a"), 1.0)).unwrap();
        store.write(RecordDraft::new(&k, stage("b"), 2.0)).unwrap();
        store.write(RecordDraft::new(&k, stage("a"), 3.0)).unwrap();
        store.write(RecordDraft::new(&k, stage("b"), 4.0)).unwrap();

        let records = store.records_for_run(&k).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.id != first.id));
        let severities: Vec<f64> = records.iter().map(|r| r.severity).collect();
        assert_eq!(severities, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn retention_is_per_run() {
        let store = RecordStore::new(StoreConfig {
            max_records_per_run: 2,
            ..StoreConfig::default()
        });
        for _ in 0..5 {
            store.write(RecordDraft::new(&key("r1"), stage("s"), 1.0)).unwrap();
        }
        store.write(RecordDraft::new(&key("r2"), stage("s"), 1.0)).unwrap();
        assert_eq!(store.run_len(&key("r1")).unwrap(), 2);
        assert_eq!(store.run_len(&key("r2")).unwrap(), 1);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn query_filters_and_pages() {
        let store = RecordStore::default();
        let k = key("r1");
        for i in 0..10 {
            let s = if i % 2 == 0 { "even" } else { "odd" };
            store
                .write(RecordDraft::new(&k, stage(s), f64::from(i) * 10.0))
                .unwrap();
        }
        store.write(RecordDraft::new(&key("other"), stage("even"), 99.0)).unwrap();

        let page = store
            .query(&RecordQuery::for_run(&k).stage(stage("even")).limit(3))
            .unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(page.has_more);
        let severities: Vec<f64> = page.items.iter().map(|r| r.severity).collect();
        assert_eq!(severities, vec![80.0, 60.0, 40.0]);

        let cursor = page.next_cursor.unwrap();
        let next = store
            .query(&RecordQuery::for_run(&k).stage(stage("even")).before(cursor).limit(3))
            .unwrap();
        let severities: Vec<f64> = next.items.iter().map(|r| r.severity).collect();
        assert_eq!(severities, vec![20.0, 0.0]);
        assert!(!next.has_more);
        assert_eq!(next.next_cursor, None);
    }

    #[test]
    fn query_time_range_and_severity() {
        let store = RecordStore::default();
        let k = key("r1");
        let early = store.write(RecordDraft::new(&k, stage("s"), 10.0)).unwrap();
        let mid = store.write(RecordDraft::new(&k, stage("s"), 50.0)).unwrap();
        let late = store.write(RecordDraft::new(&k, stage("s"), 90.0)).unwrap();

        let page = store
            .query(&RecordQuery::for_run(&k).since(mid.created_at).until(late.created_at))
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, mid.id);

        let page = store.query(&RecordQuery::all().min_severity(40.0)).unwrap();
        assert!(page.items.iter().all(|r| r.id != early.id));
        assert_eq!(page.items.len(), 2);
    }

    #[test]
    fn query_limit_is_capped() {
        let store = RecordStore::new(StoreConfig {
            default_page_limit: 2,
            max_page_limit: 4,
            ..StoreConfig::default()
        });
        for _ in 0..10 {
            store.write(RecordDraft::new(&key("r1"), stage("s"), 1.0)).unwrap();
        }
        assert_eq!(store.query(&RecordQuery::all()).unwrap().items.len(), 2);
        assert_eq!(store.query(&RecordQuery::all().limit(100)).unwrap().items.len(), 4);
        assert_eq!(store.query(&RecordQuery::all().limit(0)).unwrap().items.len(), 1);
    }

    #[test]
    fn compact_trims_each_stage() {
        let store = RecordStore::new(StoreConfig {
            compact_batch_size: 2,
            ..StoreConfig::default()
        });
        let k = key("r1");
        for i in 0..5 {
            store.write(RecordDraft::new(&k, stage("a"), f64::from(i))).unwrap();
        }
        store.write(RecordDraft::new(&k, stage("b"), 1.0)).unwrap();

        let report = store.compact(&k).unwrap();
        assert_eq!(report.dropped, 3);
        assert_eq!(report.retained, 3);
        assert_eq!(store.run_len(&k).unwrap(), 3);

        let kept: Vec<f64> = store
            .query(&RecordQuery::for_run(&k).stage(stage("a")))
            .unwrap()
            .items
            .iter()
            .map(|r| r.severity)
            .collect();
        assert_eq!(kept, vec![4.0, 3.0]);
    }

    #[test]
    fn compact_unknown_run_reports_nothing() {
        let store = RecordStore::default();
        let report = store.compact(&key("missing")).unwrap();
        assert_eq!((report.dropped, report.retained), (0, 0));
    }

    #[test]
    fn disposed_store_rejects_calls() {
        let store = RecordStore::default();
        store.write(RecordDraft::new(&key("r1"), stage("s"), 1.0)).unwrap();
        store.dispose();
        assert!(store.is_disposed());
        assert_eq!(store.len(), 0);
        assert_eq!(
            store.write(RecordDraft::new(&key("r1"), stage("s"), 1.0)),
            Err(StoreError::Disposed)
        );
        assert_eq!(store.query(&RecordQuery::all()), Err(StoreError::Disposed));
        assert_eq!(store.compact(&key("r1")), Err(StoreError::Disposed));
    }

    #[test]
    fn clear_run_removes_bucket() {
        let store = RecordStore::default();
        store.write(RecordDraft::new(&key("r1"), stage("s"), 1.0)).unwrap();
        store.write(RecordDraft::new(&key("r1"), stage("t"), 1.0)).unwrap();
        assert_eq!(store.clear_run(&key("r1")).unwrap(), 2);
        assert!(store.run_keys().unwrap().is_empty());
    }

    #[test]
    fn draft_validation() {
        let k = key("r1");
        assert!(RecordDraft::new(&k, stage("s"), 10.0).validate().is_ok());
        assert!(RecordDraft::new(&k, stage("s"), f64::NAN).validate().is_err());
        assert!(RecordDraft::new(&k, stage("s"), 1.0).with_weight(-1.0).validate().is_err());
    }
}
