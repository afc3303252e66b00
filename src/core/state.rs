//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

/// Where a pipeline run currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    /// Run has not started
    Idle,
    /// Waiting for the resource handle
    Acquiring,
    /// The handle could not be obtained (terminal, nothing to release)
    AcquisitionFailed,
    /// Step `index` is about to run; `index == len` once every step has run
    Running { index: usize },
    /// Releasing the handle
    Finalizing,
    /// Every step succeeded (terminal)
    Succeeded,
    /// A step failed (terminal)
    Failed,
}

impl PipelineState {
    /// Check if the run has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::AcquisitionFailed | PipelineState::Succeeded | PipelineState::Failed
        )
    }

    /// Whether moving from `self` to `next` is a legal edge of the machine
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;

        match (*self, next) {
            (Idle, Acquiring) => true,
            (Acquiring, AcquisitionFailed) => true,
            (Acquiring, Running { index: 0 }) => true,
            (Running { index: current }, Running { index: following }) => following == current + 1,
            (Running { .. }, Finalizing) => true,
            (Finalizing, Succeeded) | (Finalizing, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Acquiring => write!(f, "acquiring"),
            PipelineState::AcquisitionFailed => write!(f, "acquisition failed"),
            PipelineState::Running { index } => write!(f, "running step {}", index),
            PipelineState::Finalizing => write!(f, "finalizing"),
            PipelineState::Succeeded => write!(f, "succeeded"),
            PipelineState::Failed => write!(f, "failed"),
        }
    }
}

/// A state the run entered, and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub state: PipelineState,
    pub at: DateTime<Utc>,
}

/// Ordered record of every state a run passed through
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateLog {
    transitions: Vec<Transition>,
}

impl StateLog {
    /// Create a log positioned at `Idle`
    pub fn new() -> Self {
        Self {
            transitions: vec![Transition {
                state: PipelineState::Idle,
                at: Utc::now(),
            }],
        }
    }

    /// The state the run is in now
    pub fn current(&self) -> PipelineState {
        self.transitions
            .last()
            .map(|t| t.state)
            .unwrap_or(PipelineState::Idle)
    }

    /// Move to `next`, recording the time of the move
    pub fn advance(&mut self, next: PipelineState) {
        let current = self.current();
        if !current.can_transition_to(next) {
            error!("Illegal pipeline transition: {} -> {}", current, next);
        }
        self.transitions.push(Transition {
            state: next,
            at: Utc::now(),
        });
    }

    /// Just the states, in order
    pub fn states(&self) -> Vec<PipelineState> {
        self.transitions.iter().map(|t| t.state).collect()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// When the run left `Idle`
    pub fn started_at(&self) -> DateTime<Utc> {
        self.transitions
            .get(1)
            .or_else(|| self.transitions.first())
            .map(|t| t.at)
            .unwrap_or_else(Utc::now)
    }
}

impl Default for StateLog {
    fn default() -> Self {
        Self::new()
    }
}
