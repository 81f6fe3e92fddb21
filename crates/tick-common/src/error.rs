use thiserror::Error;

/// Identifier of a registered tick callback.
///
/// Handles compare by this identity, so a cloned handle refers to the
/// same registry entry as the handle it was cloned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct CallbackId(pub u64);

impl std::fmt::Display for CallbackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cb#{}", self.0)
    }
}

/// Tick system errors covering construction, callback isolation, and timer failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TickError {
    /// Tick rate must be at least one tick per second.
    #[error("invalid tick rate {0}: must be greater than zero")]
    InvalidTickRate(u32),

    /// Deferred execution delay is negative or not a finite number.
    #[error("invalid delay: {0}")]
    InvalidDelay(String),

    /// A callback returned an error during a tick.
    #[error("callback {id} failed: {reason}")]
    CallbackFailed {
        /// Callback that failed.
        id: CallbackId,
        /// Rendered error chain.
        reason: String,
    },

    /// A callback panicked during a tick.
    #[error("callback {id} panicked: {message}")]
    CallbackPanicked {
        /// Callback that panicked.
        id: CallbackId,
        /// Panic payload, if it was a string.
        message: String,
    },

    /// The periodic trigger could not be armed.
    #[error("timer error: {0}")]
    Timer(String),

    /// Configuration or builder error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl TickError {
    /// Callback this error originated from, if any.
    #[must_use]
    pub fn callback_id(&self) -> Option<CallbackId> {
        match self {
            Self::CallbackFailed { id, .. } | Self::CallbackPanicked { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Convenience type alias for tick system operations.
pub type TickResult<T> = Result<T, TickError>;
