/// Import batch state definitions
///
/// This module defines the lifecycle of one batch submitted to the remote corpus.
use std::fmt;

/// Represents the current state of an import batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchState {
    // ===== Active States =====
    /// Batch is built and being submitted (including backoff retries)
    Submitted,

    /// Remote accepted the batch; its long-running operation is being polled
    Polling,

    // ===== Terminal States =====
    /// Operation finished without an error
    Done,

    /// Submission was rejected or the operation reported an error
    Failed,

    /// Operation did not finish within the maximum wait; needs manual follow-up
    TimedOut,
}

impl BatchState {
    /// Returns true if this is a terminal state (the batch is finished with)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::TimedOut)
    }

    /// Returns true if this represents a successful import
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Checks whether moving to `next` is a legal transition
    ///
    /// Terminal states are final. A batch whose submission never gets
    /// accepted goes straight from `Submitted` to `Failed`.
    pub fn can_transition_to(&self, next: BatchState) -> bool {
        matches!(
            (self, next),
            (Self::Submitted, Self::Polling)
                | (Self::Submitted, Self::Failed)
                | (Self::Polling, Self::Done)
                | (Self::Polling, Self::Failed)
                | (Self::Polling, Self::TimedOut)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }

    /// Returns all possible batch states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Submitted,
            Self::Polling,
            Self::Done,
            Self::Failed,
            Self::TimedOut,
        ]
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
