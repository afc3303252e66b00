//! Terminal outcome of a pipeline run

use crate::core::state::{PipelineState, StateLog, Transition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// The phase of a run an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "index", rename_all = "snake_case")]
pub enum Stage {
    /// The handle could not be obtained
    Acquisition,
    /// Step at this index failed
    Step(usize),
    /// Releasing the handle failed
    Release,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Acquisition => write!(f, "acquisition"),
            Stage::Step(index) => write!(f, "step {}", index),
            Stage::Release => write!(f, "release"),
        }
    }
}

/// A failure attributed to one stage of a run
#[derive(Debug, Error)]
#[error("{}{}: {:#}", .stage, .step.as_ref().map(|s| format!(" ({})", s)).unwrap_or_default(), .cause)]
pub struct StageFailure {
    pub stage: Stage,
    /// Name of the failing step, for `Stage::Step`
    pub step: Option<String>,
    #[source]
    pub cause: anyhow::Error,
}

impl StageFailure {
    pub fn acquisition(cause: anyhow::Error) -> Self {
        Self {
            stage: Stage::Acquisition,
            step: None,
            cause,
        }
    }

    pub fn step(index: usize, name: impl Into<String>, cause: anyhow::Error) -> Self {
        Self {
            stage: Stage::Step(index),
            step: Some(name.into()),
            cause,
        }
    }

    pub fn release(cause: anyhow::Error) -> Self {
        Self {
            stage: Stage::Release,
            step: None,
            cause,
        }
    }

    /// Look through the cause chain for a specific error type
    pub fn cause_as<E>(&self) -> Option<&E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause.chain().find_map(|e| e.downcast_ref::<E>())
    }
}

/// Raised in place of a step's result when the operation panicked
#[derive(Debug, Error)]
#[error("operation panicked: {message}")]
pub struct OperationPanicked {
    pub message: String,
}

/// Primary outcome of a run
#[derive(Debug)]
pub enum PipelineResult<T> {
    /// Every step succeeded; results are in step order
    Success { results: Vec<T> },
    /// The first failure, after which nothing else ran
    Failure(StageFailure),
}

impl<T> PipelineResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Success { .. })
    }

    pub fn results(&self) -> Option<&[T]> {
        match self {
            PipelineResult::Success { results } => Some(results),
            PipelineResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match self {
            PipelineResult::Success { .. } => None,
            PipelineResult::Failure(failure) => Some(failure),
        }
    }

    /// Collapse into a plain `Result`
    pub fn into_result(self) -> Result<Vec<T>, StageFailure> {
        match self {
            PipelineResult::Success { results } => Ok(results),
            PipelineResult::Failure(failure) => Err(failure),
        }
    }
}

/// Everything known about one finished run
#[derive(Debug)]
pub struct PipelineRun<T> {
    /// Unique run ID
    pub run_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// The primary outcome
    pub result: PipelineResult<T>,

    /// Cleanup problem, reported alongside the primary outcome, never instead of it
    pub release_fault: Option<StageFailure>,

    /// Whether release was attempted (always, once a handle existed)
    pub released: bool,

    /// Every state the run passed through
    pub state_log: StateLog,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl<T> PipelineRun<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    /// Terminal state of the run
    pub fn final_state(&self) -> PipelineState {
        self.state_log.current()
    }

    pub fn transitions(&self) -> &[Transition] {
        self.state_log.transitions()
    }

    pub fn results(&self) -> Option<&[T]> {
        self.result.results()
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        self.result.failure()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at.signed_duration_since(self.started_at)
    }
}
