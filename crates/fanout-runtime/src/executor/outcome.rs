//! Per-item outcomes.

use fanout_core::errors::TaskError;
use serde::Serialize;

/// The result of one work item, positionally aligned with its submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum TaskOutcome<T> {
    /// The item completed and produced a value.
    Success(T),
    /// The item returned an error or panicked.
    Failure(TaskError),
}

impl<T> TaskOutcome<T> {
    /// Whether the item succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether the item failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Borrow the success value.
    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(v) => Some(v),
            Self::Failure(_) => None,
        }
    }

    /// Borrow the captured error.
    pub fn failure(&self) -> Option<&TaskError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(e) => Some(e),
        }
    }

    /// Convert into a standard `Result`.
    pub fn into_result(self) -> Result<T, TaskError> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failure(e) => Err(e),
        }
    }

    /// Map the success value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TaskOutcome<U> {
        match self {
            Self::Success(v) => TaskOutcome::Success(f(v)),
            Self::Failure(e) => TaskOutcome::Failure(e),
        }
    }
}

impl<T> From<Result<T, TaskError>> for TaskOutcome<T> {
    fn from(result: Result<T, TaskError>) -> Self {
        match result {
            Ok(v) => Self::Success(v),
            Err(e) => Self::Failure(e),
        }
    }
}

/// Success/failure counts over a batch of outcomes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSummary {
    /// Total outcomes.
    pub total: usize,
    /// Successful outcomes.
    pub succeeded: usize,
    /// Failed outcomes (errors and panics).
    pub failed: usize,
    /// Failed outcomes that were panics.
    pub panicked: usize,
}

impl OutcomeSummary {
    /// Tally a slice of outcomes.
    pub fn from_outcomes<T>(outcomes: &[TaskOutcome<T>]) -> Self {
        outcomes.iter().fold(Self::default(), |mut acc, outcome| {
            acc.total += 1;
            match outcome {
                TaskOutcome::Success(_) => acc.succeeded += 1,
                TaskOutcome::Failure(e) => {
                    acc.failed += 1;
                    if e.is_panic() {
                        acc.panicked += 1;
                    }
                }
            }
            acc
        })
    }

    /// Whether every outcome succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
