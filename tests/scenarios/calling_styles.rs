//! Test: Calling styles - one state machine behind four syntaxes

use crate::helpers::*;
use std::sync::{Arc, Mutex};
use stepwise::execution::{CallingStyle, ExecutionEvent};
use stepwise::SequentialPipeline;

/// Collect a compact label for every event a run emits
fn labelled_pipeline() -> (SequentialPipeline<i64>, Arc<Mutex<Vec<String>>>) {
    let labels = Arc::new(Mutex::new(Vec::new()));
    let sink = labels.clone();
    let pipeline = SequentialPipeline::<i64>::new("styles").with_event_handler(move |event| {
        let label = match event {
            ExecutionEvent::RunStarted { .. } => "started".to_string(),
            ExecutionEvent::Acquired { .. } => "acquired".to_string(),
            ExecutionEvent::AcquisitionFailed { .. } => "acquisition failed".to_string(),
            ExecutionEvent::StepStarted { index, name, .. } => format!("start {} {}", index, name),
            ExecutionEvent::StepCompleted { index, output, .. } => format!("done {} = {}", index, output),
            ExecutionEvent::StepFailed { index, .. } => format!("failed {}", index),
            ExecutionEvent::Finalizing { .. } => "finalizing".to_string(),
            ExecutionEvent::ReleaseFaulted { .. } => "release faulted".to_string(),
            ExecutionEvent::RunFinished { state, .. } => format!("finished {}", state),
        };
        sink.lock().unwrap().push(label);
    });
    (pipeline, labels)
}

async fn trace(style: CallingStyle, plan: &[(&str, Behaviour)]) -> (Result<Vec<i64>, String>, Vec<String>) {
    let journal = Journal::new();
    let steps = recording_steps(&journal, plan);
    let release = CountingRelease::new(&journal);
    let (pipeline, labels) = labelled_pipeline();

    let outcome = run_in_style(style, &pipeline, TestAcquire::new(&journal), &steps, &release)
        .await
        .map_err(|failure| failure.to_string());
    let labels = labels.lock().unwrap().clone();
    (outcome, labels)
}

/// Successful chains look the same from every style
#[tokio::test]
async fn test_styles_agree_on_success() {
    let plan = [
        ("count", Behaviour::Return(0)),
        ("insert", Behaviour::AddToPrior(1)),
        ("count", Behaviour::AddToPrior(0)),
    ];
    let (expected_outcome, expected_events) = trace(CallingStyle::Sequence, &plan).await;
    assert_eq!(expected_outcome, Ok(vec![0, 1, 1]));
    assert_eq!(
        expected_events,
        vec![
            "started",
            "acquired",
            "start 0 count",
            "done 0 = 0",
            "start 1 insert",
            "done 1 = 1",
            "start 2 count",
            "done 2 = 1",
            "finalizing",
            "finished succeeded",
        ]
    );

    for style in CallingStyle::ALL {
        let (outcome, events) = trace(style, &plan).await;
        assert_eq!(outcome, expected_outcome, "{}", style);
        assert_eq!(events, expected_events, "{}", style);
    }
}

/// Failing chains look the same from every style
#[tokio::test]
async fn test_styles_agree_on_failure() {
    let plan = [
        ("count", Behaviour::Return(0)),
        ("insert", Behaviour::Fail("duplicate key".to_string())),
        ("count", Behaviour::AddToPrior(0)),
    ];
    let (expected_outcome, expected_events) = trace(CallingStyle::Sequence, &plan).await;
    assert_eq!(
        expected_outcome,
        Err("step 1 (insert): duplicate key".to_string())
    );

    for style in CallingStyle::ALL {
        let (outcome, events) = trace(style, &plan).await;
        assert_eq!(outcome, expected_outcome, "{}", style);
        assert_eq!(events, expected_events, "{}", style);
    }
}
