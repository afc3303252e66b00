//! CLI output formatting

use crate::core::{PipelineState, StageFailure};
use crate::execution::ExecutionEvent;
use console::Emoji;
use serde_json::Value;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a pipeline state for display
pub fn format_state(state: PipelineState) -> String {
    match state {
        PipelineState::Idle => style("IDLE").dim().to_string(),
        PipelineState::Acquiring => style("ACQUIRING").yellow().to_string(),
        PipelineState::AcquisitionFailed => style("ACQUISITION FAILED").red().to_string(),
        PipelineState::Running { index } => style(format!("RUNNING (step {})", index)).yellow().to_string(),
        PipelineState::Finalizing => style("FINALIZING").blue().to_string(),
        PipelineState::Succeeded => style("SUCCEEDED").green().to_string(),
        PipelineState::Failed => style("FAILED").red().to_string(),
    }
}

/// One line per completed step: "count is: 0", "insert result: {...}"
pub fn format_step_output(name: &str, output: &Value) -> String {
    match name {
        "count" => format!("count is: {}", output),
        other => format!("{} result: {}", other, output),
    }
}

/// Format a failure, naming the stage it happened in
pub fn format_failure(failure: &StageFailure) -> String {
    format!("{} {}", CROSS, style(failure).red())
}

/// Format an execution event for display
///
/// Returns `None` for events that are only interesting in logs.
pub fn format_execution_event(event: &ExecutionEvent<'_, Value>) -> Option<String> {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            pipeline_name,
        } => Some(format!(
            "{} Starting {} ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(&run_id.to_string()[..8]).dim()
        )),
        ExecutionEvent::AcquisitionFailed { error, .. } => Some(format_failure(error)),
        ExecutionEvent::StepStarted { name, .. } => {
            Some(format!("{} {}", SPINNER, style(name).cyan()))
        }
        ExecutionEvent::StepCompleted { name, output, .. } => {
            Some(format!("{} {}", CHECK, format_step_output(name, output)))
        }
        ExecutionEvent::StepFailed { error, .. } => Some(format_failure(error)),
        ExecutionEvent::ReleaseFaulted { error, .. } => Some(format!(
            "{} {} {}",
            WARN,
            style("connection not closed cleanly:").yellow(),
            style(&error.cause).dim()
        )),
        ExecutionEvent::RunFinished { run_id, state } => Some(format!(
            "{} Run ({}) {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            format_state(*state)
        )),
        ExecutionEvent::Acquired { .. } | ExecutionEvent::Finalizing { .. } => None,
    }
}
