//! Pooled-session lifecycle state machine: `Starting -> Ready -> Draining ->
//! Closed`, plus a `Failed` state reachable from anywhere.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Instant;

/// A pooled session's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// The underlying transport is being established.
    Starting,
    /// The session is idle in the pool, available for acquisition.
    Ready,
    /// The session is finishing its current run but will not accept new work.
    Draining,
    /// The session has been torn down. Terminal.
    Closed,
    /// The session's transport failed. Terminal.
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Ready => "ready",
            LifecycleState::Draining => "draining",
            LifecycleState::Closed => "closed",
            LifecycleState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A single recorded state transition.
#[derive(Debug, Clone)]
pub struct LifecycleTransition {
    /// State transitioned from.
    pub from: LifecycleState,
    /// State transitioned to.
    pub to: LifecycleState,
    /// When the transition happened.
    pub timestamp: DateTime<Utc>,
    /// Optional human-readable reason (e.g. a transport error message).
    pub reason: Option<String>,
}

/// An attempted transition that the state machine rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// `from -> to` is not a permitted transition.
    InvalidTransition {
        /// Starting state.
        from: LifecycleState,
        /// Rejected target state.
        to: LifecycleState,
    },
    /// The session is already in the requested state.
    AlreadyInState(LifecycleState),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::InvalidTransition { from, to } => write!(f, "cannot transition from {from} to {to}"),
            LifecycleError::AlreadyInState(state) => write!(f, "already in state {state}"),
        }
    }
}

impl std::error::Error for LifecycleError {}

/// Tracks a pooled session's state, transition history, and ready-since
/// instant (used to compute idle duration for eviction).
#[derive(Debug)]
pub struct LifecycleManager {
    state: LifecycleState,
    history: Vec<LifecycleTransition>,
    ready_since: Option<Instant>,
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleManager {
    /// Construct a manager starting in [`LifecycleState::Starting`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Starting,
            history: Vec::new(),
            ready_since: None,
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Attempt to transition to `to`, recording a reason if given.
    pub fn transition(&mut self, to: LifecycleState, reason: Option<String>) -> Result<(), LifecycleError> {
        if self.state == to {
            return Err(LifecycleError::AlreadyInState(to));
        }
        if !self.can_transition(&to) {
            return Err(LifecycleError::InvalidTransition { from: self.state, to });
        }

        self.history.push(LifecycleTransition {
            from: self.state,
            to,
            timestamp: Utc::now(),
            reason,
        });
        self.state = to;
        if to == LifecycleState::Ready {
            self.ready_since = Some(Instant::now());
        } else {
            self.ready_since = None;
        }
        Ok(())
    }

    /// Whether `to` is a permitted transition from the current state.
    #[must_use]
    pub fn can_transition(&self, to: &LifecycleState) -> bool {
        if *to == LifecycleState::Failed {
            return !matches!(self.state, LifecycleState::Closed | LifecycleState::Failed);
        }
        matches!(
            (self.state, to),
            (LifecycleState::Starting, LifecycleState::Ready)
                | (LifecycleState::Ready, LifecycleState::Draining)
                | (LifecycleState::Draining, LifecycleState::Ready)
                | (LifecycleState::Draining, LifecycleState::Closed)
        )
    }

    /// The full transition history, oldest first.
    #[must_use]
    pub fn history(&self) -> &[LifecycleTransition] {
        &self.history
    }

    /// How long the session has been continuously `Ready`, if it is.
    #[must_use]
    pub fn idle_for(&self) -> Option<std::time::Duration> {
        self.ready_since.map(|since| since.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_to_ready_succeeds() {
        let mut mgr = LifecycleManager::new();
        assert!(mgr.transition(LifecycleState::Ready, None).is_ok());
        assert_eq!(mgr.state(), LifecycleState::Ready);
    }

    #[test]
    fn ready_to_closed_directly_is_rejected() {
        let mut mgr = LifecycleManager::new();
        mgr.transition(LifecycleState::Ready, None).unwrap();
        assert!(mgr.transition(LifecycleState::Closed, None).is_err());
    }

    #[test]
    fn draining_to_closed_succeeds() {
        let mut mgr = LifecycleManager::new();
        mgr.transition(LifecycleState::Ready, None).unwrap();
        mgr.transition(LifecycleState::Draining, None).unwrap();
        assert!(mgr.transition(LifecycleState::Closed, None).is_ok());
    }

    #[test]
    fn failed_is_reachable_from_any_non_terminal_state() {
        let mut mgr = LifecycleManager::new();
        assert!(mgr.transition(LifecycleState::Failed, Some("transport reset".to_string())).is_ok());
        assert_eq!(mgr.state(), LifecycleState::Failed);
    }

    #[test]
    fn failed_is_terminal() {
        let mut mgr = LifecycleManager::new();
        mgr.transition(LifecycleState::Failed, None).unwrap();
        assert!(mgr.transition(LifecycleState::Ready, None).is_err());
    }

    #[test]
    fn same_state_transition_is_already_in_state() {
        let mut mgr = LifecycleManager::new();
        let err = mgr.transition(LifecycleState::Starting, None).unwrap_err();
        assert_eq!(err, LifecycleError::AlreadyInState(LifecycleState::Starting));
    }

    #[test]
    fn history_records_every_successful_transition() {
        let mut mgr = LifecycleManager::new();
        mgr.transition(LifecycleState::Ready, None).unwrap();
        mgr.transition(LifecycleState::Draining, None).unwrap();
        assert_eq!(mgr.history().len(), 2);
    }
}
