//! Lifecycle state machine for the tick driver.
//!
//! The driver has two states:
//! STOPPED → RUNNING → STOPPED
//!
//! Self-transitions are rejected here; the driver treats repeated
//! `start()`/`stop()` calls as no-ops before ever reaching the machine.

use crate::error::{TickError, TickResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a tick driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// No periodic trigger is armed.
    #[default]
    Stopped,
    /// The periodic trigger fires every tick interval.
    Running,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "STOPPED"),
            Self::Running => write!(f, "RUNNING"),
        }
    }
}

impl RunState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: RunState) -> bool {
        matches!(
            (self, target),
            (Self::Stopped, Self::Running) | (Self::Running, Self::Stopped)
        )
    }

    /// Returns true if the periodic trigger is armed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// State machine wrapper with transition history tracking.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    current: RunState,
    previous: Option<RunState>,
    transition_count: u64,
}

impl StateMachine {
    /// Create a new state machine starting in STOPPED.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.current
    }

    /// Get the previous state (if any transition occurred).
    #[must_use]
    pub fn previous_state(&self) -> Option<RunState> {
        self.previous
    }

    /// Get total number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt a state transition.
    pub fn transition(&mut self, target: RunState) -> TickResult<()> {
        if self.current.can_transition_to(target) {
            self.previous = Some(self.current);
            self.current = target;
            self.transition_count += 1;
            Ok(())
        } else {
            Err(TickError::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            })
        }
    }
}
