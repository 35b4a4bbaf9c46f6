//! Error types surfaced by check executions

use std::fmt;
use std::time::Duration;

use super::buffer::Queue;
use super::retry::RetryError;
use super::types::CheckType;
use crate::storage::StorageError;

/// Step of a check execution an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Collect,
    Get,
    Save,
    Delete,
    Deliver,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Collect => "collect",
            Phase::Get => "get",
            Phase::Save => "save",
            Phase::Delete => "delete",
            Phase::Deliver => "deliver",
        };
        f.write_str(name)
    }
}

/// Why a check execution did not complete
///
/// Transient storage errors never show up here directly. They are absorbed
/// by the retry executor and only surface wrapped in `RetriesExhausted` or
/// `DeadlineReached`.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("{phase} phase cancelled")]
    Cancelled { phase: Phase },

    #[error("{phase} phase gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        phase: Phase,
        attempts: u32,
        #[source]
        source: StorageError,
    },

    #[error("{phase} phase hit its deadline after {attempts} attempts ({elapsed:?}): {source}")]
    DeadlineReached {
        phase: Phase,
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: StorageError,
    },

    #[error("cannot map row for {check_type}: {reason}")]
    MappingInvariantViolation {
        check_type: CheckType,
        reason: String,
    },

    #[error("failed to collect {check_type} sample: {reason}")]
    Collect {
        check_type: CheckType,
        reason: String,
    },

    #[error("{0} queue is closed")]
    BufferClosed(Queue),
}

impl CheckError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CheckError::Cancelled { .. })
    }

    /// Attach the phase to a retry failure
    pub fn from_retry(phase: Phase, err: RetryError<StorageError>) -> Self {
        match err {
            RetryError::Cancelled => CheckError::Cancelled { phase },
            RetryError::Exhausted {
                attempts,
                last_error,
            } => CheckError::RetriesExhausted {
                phase,
                attempts,
                source: last_error,
            },
            RetryError::DeadlineReached {
                attempts,
                elapsed,
                last_error,
            } => CheckError::DeadlineReached {
                phase,
                attempts,
                elapsed,
                source: last_error,
            },
        }
    }
}
