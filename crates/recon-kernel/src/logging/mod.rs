use crate::error::LogError;
use crate::types::{EventId, RunKey};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One audited orchestrator action, chained to its predecessor by hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    pub run_key: RunKey,
    pub action: String,
    pub result: String,
    pub prev_hash: [u8; 32],
    pub hash: [u8; 32],
}

impl Event {
    pub fn new(run_key: RunKey, action: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            event_id: EventId::new(),
            timestamp: Utc::now(),
            run_key,
            action: action.into(),
            result: result.into(),
            prev_hash: [0u8; 32],
            hash: [0u8; 32],
        }
    }
}

/// Append-only, hash-chained audit log
#[derive(Debug, Default)]
pub struct EventLog {
    inner: Mutex<Vec<Event>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, mut event: Event) -> EventId {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map_or([0u8; 32], |e| e.hash);
        event.prev_hash = prev_hash;
        event.hash = compute_hash(&event);
        let id = event.event_id;
        guard.push(event);
        id
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.lock().clone()
    }

    pub fn events_for(&self, run_key: &RunKey) -> Vec<Event> {
        self.inner
            .lock()
            .iter()
            .filter(|e| &e.run_key == run_key)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hex digest of the newest event, or `None` for an empty log
    pub fn head_hash(&self) -> Option<String> {
        self.inner.lock().last().map(|e| hex::encode(e.hash))
    }

    pub fn verify_integrity(&self) -> Result<(), LogError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for (index, e) in guard.iter().enumerate() {
            if e.prev_hash != prev || e.hash != compute_hash(e) {
                return Err(LogError::IntegrityViolation { index });
            }
            prev = e.hash;
        }
        Ok(())
    }

    #[cfg(test)]
    fn tamper(&self, index: usize, result: &str) {
        if let Some(e) = self.inner.lock().get_mut(index) {
            e.result = result.to_string();
        }
    }
}

fn compute_hash(event: &Event) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(event.event_id.0.to_bytes());
    hasher.update(event.timestamp.timestamp_micros().to_le_bytes());
    hasher.update(event.run_key.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(event.action.as_bytes());
    hasher.update([0]);
    hasher.update(event.result.as_bytes());
    hasher.update([0]);
    hasher.update(event.prev_hash);
    hasher.finalize().into()
}
