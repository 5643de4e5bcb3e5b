//! Error types for the recovery kernel
//!
//! Every fallible kernel operation returns one of the layer errors below.
//! [`KernelError`] aggregates them for callers that do not care which
//! component failed.

use crate::types::CampaignId;

/// Top-level kernel error
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// Record store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Inbound payload rejected
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Scheduler failure
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Illegal lifecycle transition
    #[error("state machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    /// Event log failure
    #[error("log error: {0}")]
    Log(#[from] LogError),
}

impl KernelError {
    /// Whether the caller can keep using the component that failed
    pub fn is_recoverable(&self) -> bool {
        match self {
            KernelError::Store(StoreError::Disposed) => false,
            KernelError::Log(LogError::IntegrityViolation { .. }) => false,
            KernelError::Validation(_) => true,
            KernelError::Scheduler(_) => true,
            KernelError::StateMachine(_) => true,
        }
    }
}

/// Record store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store was disposed; it holds no data and accepts no calls
    #[error("record store has been disposed")]
    Disposed,
}

/// Boundary validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A field failed its constraint
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Dotted path of the offending field
        field: String,
        /// Human-readable constraint that failed
        reason: String,
    },

    /// The payload could not be decoded at all
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl ValidationError {
    /// Create a field error
    #[inline]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Field path, if the error is tied to one
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidField { field, .. } => Some(field),
            Self::Malformed(_) => None,
        }
    }

    /// Prefix the field path with a parent segment
    #[must_use]
    pub fn nested(self, parent: &str) -> Self {
        match self {
            Self::InvalidField { field, reason } => Self::InvalidField {
                field: format!("{parent}.{field}"),
                reason,
            },
            other => other,
        }
    }
}

/// Campaign scheduler errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// A campaign with this id is already queued or settled
    #[error("campaign {0} is already scheduled")]
    DuplicateCampaign(CampaignId),

    /// No queued campaign with this id
    #[error("campaign {0} not found in queue")]
    CampaignNotFound(CampaignId),

    /// Only freshly queued campaigns can be enqueued
    #[error("campaign {id} cannot be enqueued from state {state}")]
    NotEnqueueable {
        /// Campaign id
        id: CampaignId,
        /// Current state label
        state: String,
    },

    /// Lifecycle rule violated
    #[error(transparent)]
    Transition(#[from] StateMachineError),
}

/// Lifecycle state machine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// Transition not in the allowed table
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Source state
        from: String,
        /// Requested state
        to: String,
    },
}

/// Event log errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    /// The hash chain is broken at `index`
    #[error("event log integrity violation at index {index}")]
    IntegrityViolation {
        /// Position of the first bad event
        index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_prefixes_field_path() {
        let err = ValidationError::invalid("weight", "must be finite").nested("objectives[0]");
        assert_eq!(err.field(), Some("objectives[0].weight"));
        assert!(err.to_string().contains("objectives[0].weight"));
    }

    #[test]
    fn disposed_store_is_not_recoverable() {
        assert!(!KernelError::from(StoreError::Disposed).is_recoverable());
        let validation = KernelError::from(ValidationError::Malformed("eof".into()));
        assert!(validation.is_recoverable());
    }
}
