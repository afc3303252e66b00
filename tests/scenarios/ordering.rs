//! Test: Ordering - each step sees exactly the previous step's result

use crate::helpers::*;
use std::time::Duration;
use stepwise::execution::CallingStyle;
use stepwise::SequentialPipeline;

/// Every step receives its predecessor's output, the first step receives none
#[tokio::test]
async fn test_results_are_threaded_in_order() {
    let journal = Journal::new();
    let steps = recording_steps(
        &journal,
        &[
            ("seed", Behaviour::Return(5)),
            ("double", Behaviour::AddToPrior(5)),
            ("bump", Behaviour::AddToPrior(1)),
        ],
    );
    let release = CountingRelease::new(&journal);

    let run = SequentialPipeline::new("ordering")
        .run(&TestAcquire::new(&journal), &boxed(&steps), &release)
        .await;

    assert_eq!(run.results(), Some(&[5, 10, 11][..]));
    assert_eq!(
        journal.entries(),
        vec![
            "acquire",
            "seed(None)",
            "seed done",
            "double(Some(5))",
            "double done",
            "bump(Some(10))",
            "bump done",
            "release(0)",
        ]
    );
}

/// A slow step is never overtaken by the one after it
#[tokio::test]
async fn test_slow_step_is_not_overtaken() {
    for style in CallingStyle::ALL {
        let journal = Journal::new();
        let steps = recording_steps(
            &journal,
            &[
                ("slow", Behaviour::SlowAdd(Duration::from_millis(30), 1)),
                ("fast", Behaviour::AddToPrior(1)),
            ],
        );
        let release = CountingRelease::new(&journal);

        let results = run_in_style(
            style,
            &SequentialPipeline::new("ordering"),
            TestAcquire::new(&journal),
            &steps,
            &release,
        )
        .await
        .unwrap();

        assert_eq!(results, vec![1, 2], "{}", style);
        let entries = journal.entries();
        let slow_done = entries.iter().position(|e| e == "slow done").unwrap();
        let fast_start = entries.iter().position(|e| e == "fast(Some(1))").unwrap();
        assert!(slow_done < fast_start, "{}: {:?}", style, entries);
    }
}

/// Release happens after the last step resolves
#[tokio::test]
async fn test_release_follows_last_step() {
    let journal = Journal::new();
    let steps = recording_steps(&journal, &[("only", Behaviour::SlowAdd(Duration::from_millis(10), 7))]);
    let release = CountingRelease::new(&journal);

    SequentialPipeline::new("ordering")
        .run(&TestAcquire::new(&journal), &boxed(&steps), &release)
        .await;

    let entries = journal.entries();
    assert_eq!(entries.last().map(String::as_str), Some("release(0)"));
    assert_eq!(entries[entries.len() - 2], "only done");
}

/// A run's duration covers the time its steps spent waiting
#[tokio::test]
async fn test_duration_covers_slow_steps() {
    let journal = Journal::new();
    let steps = recording_steps(
        &journal,
        &[
            ("slow", Behaviour::SlowAdd(Duration::from_millis(30), 1)),
            ("slower", Behaviour::SlowAdd(Duration::from_millis(30), 1)),
        ],
    );
    let release = CountingRelease::new(&journal);

    let run = SequentialPipeline::new("ordering")
        .run(&TestAcquire::new(&journal), &boxed(&steps), &release)
        .await;

    assert_eq!(run.results(), Some(&[1, 2][..]));
    assert!(run.duration() >= chrono::Duration::milliseconds(60));
    assert!(run.finished_at >= run.started_at);
}
