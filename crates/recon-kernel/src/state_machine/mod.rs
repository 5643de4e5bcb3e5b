use crate::error::StateMachineError;
use crate::types::{CampaignState, RunStatus};
use std::fmt::Display;

/// A lifecycle whose transitions are fixed by a table.
///
/// Tables only ever move forward: no state appears in its own
/// successors' tables, so a settled value cannot be resurrected.
pub trait Lifecycle: Copy + Eq + Display + 'static {
    /// States reachable from `self` in one step
    fn allowed_transitions(self) -> &'static [Self];

    /// No further transitions possible
    fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl Lifecycle for CampaignState {
    fn allowed_transitions(self) -> &'static [Self] {
        use CampaignState::*;
        match self {
            Queued => &[Active, Cancelled],
            Active => &[Completed, Cancelled, Throttled],
            Completed | Cancelled | Throttled => &[],
        }
    }
}

impl Lifecycle for RunStatus {
    fn allowed_transitions(self) -> &'static [Self] {
        use RunStatus::*;
        match self {
            Pending => &[Planned, Aborted],
            Planned => &[Running, Aborted],
            Running => &[Succeeded, Aborted, Failed, Cancelled],
            Succeeded | Aborted | Failed | Cancelled => &[],
        }
    }
}

/// Validates a state transition.
///
/// Illegal transitions return an error; with the `strict-debug` feature
/// they panic instead so the offending call site shows up in a backtrace.
pub fn validate_transition<S: Lifecycle>(from: S, to: S) -> Result<(), StateMachineError> {
    if from.allowed_transitions().contains(&to) {
        Ok(())
    } else {
        #[cfg(feature = "strict-debug")]
        panic!("Illegal state transition attempted: {from} -> {to}");

        Err(StateMachineError::IllegalTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Apply `to` in place if the table allows it
pub fn transition<S: Lifecycle>(state: &mut S, to: S) -> Result<(), StateMachineError> {
    validate_transition(*state, to)?;
    *state = to;
    Ok(())
}
