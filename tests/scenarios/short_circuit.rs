//! Test: Short-circuit - the first failure stops the chain

use crate::helpers::*;
use stepwise::core::{PipelineState, Stage};
use stepwise::execution::CallingStyle;
use stepwise::SequentialPipeline;

fn chain_failing_at_one(journal: &Journal) -> Vec<RecordingStep> {
    recording_steps(
        journal,
        &[
            ("first", Behaviour::Return(1)),
            ("second", Behaviour::Fail("write concern failed".to_string())),
            ("third", Behaviour::AddToPrior(1)),
            ("fourth", Behaviour::AddToPrior(1)),
        ],
    )
}

/// Steps after the failing one are never invoked
#[tokio::test]
async fn test_later_steps_never_run() {
    let journal = Journal::new();
    let steps = chain_failing_at_one(&journal);
    let release = CountingRelease::new(&journal);

    let run = SequentialPipeline::new("short-circuit")
        .run(&TestAcquire::new(&journal), &boxed(&steps), &release)
        .await;

    let failure = run.failure().unwrap();
    assert_eq!(failure.stage, Stage::Step(1));
    assert_eq!(failure.step.as_deref(), Some("second"));
    assert!(failure.to_string().contains("write concern failed"));

    assert_eq!(steps[0].calls(), 1);
    assert_eq!(steps[1].calls(), 1);
    assert_eq!(steps[2].calls(), 0);
    assert_eq!(steps[3].calls(), 0);
    assert_released_once(&release);

    assert_eq!(
        run.state_log.states(),
        vec![
            PipelineState::Idle,
            PipelineState::Acquiring,
            PipelineState::Running { index: 0 },
            PipelineState::Running { index: 1 },
            PipelineState::Finalizing,
            PipelineState::Failed,
        ]
    );
}

/// Every calling style stops at the same place
#[tokio::test]
async fn test_short_circuit_in_every_style() {
    for style in CallingStyle::ALL {
        let journal = Journal::new();
        let steps = chain_failing_at_one(&journal);
        let release = CountingRelease::new(&journal);

        let failure = run_in_style(
            style,
            &SequentialPipeline::new("short-circuit"),
            TestAcquire::new(&journal),
            &steps,
            &release,
        )
        .await
        .unwrap_err();

        assert_eq!(failure.stage, Stage::Step(1), "{}", style);
        assert!(!journal.contains("third(Some(1))"), "{}", style);
        assert_eq!(release.calls(), 1, "{}", style);
    }
}

/// A failing first step still sees no prior and stops everything
#[tokio::test]
async fn test_failure_at_first_step() {
    let journal = Journal::new();
    let steps = recording_steps(
        &journal,
        &[
            ("count", Behaviour::Fail("network timeout".to_string())),
            ("insert", Behaviour::Return(1)),
        ],
    );
    let release = CountingRelease::new(&journal);

    let run = SequentialPipeline::new("short-circuit")
        .run(&TestAcquire::new(&journal), &boxed(&steps), &release)
        .await;

    assert_eq!(run.failure().unwrap().stage, Stage::Step(0));
    assert_eq!(journal.entries(), vec!["acquire", "count(None)", "release(0)"]);
}
