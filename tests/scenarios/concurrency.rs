//! Test: Concurrency - independent runs, and what a caller-side timeout does

use crate::helpers::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use stepwise::execution::CallingStyle;
use stepwise::notes::run_notes;
use stepwise::store::{MemoryStore, Note};
use stepwise::SequentialPipeline;

/// Concurrent runs each acquire and release their own connection
#[tokio::test]
async fn test_concurrent_runs_use_separate_connections() {
    let driver = Arc::new(
        MemoryStore::new("notes")
            .unwrap()
            .with_latency(Duration::from_millis(5)),
    );
    let pipeline = SequentialPipeline::new("notes");

    let (a, b, c) = tokio::join!(
        run_notes(&pipeline, driver.clone(), Note::default(), CallingStyle::Sequence),
        run_notes(&pipeline, driver.clone(), Note::default(), CallingStyle::Chain),
        run_notes(&pipeline, driver.clone(), Note::coroutine_default(), CallingStyle::Coroutine),
    );

    for results in [a, b, c] {
        let results = results.unwrap();
        assert_eq!(results[1]["insertedCount"], json!(1));
    }

    let stats = driver.stats();
    assert_eq!(stats.connects, 3);
    assert_eq!(stats.close_calls, 3);
    assert_eq!(stats.open_connections, 0);
    assert_eq!(driver.notes().await.len(), 3);
}

/// A step that never resolves leaves the run suspended; dropping it from the
/// outside (here via a timeout) skips release
#[tokio::test]
async fn test_hung_step_dropped_by_timeout_is_not_released() {
    let journal = Journal::new();
    let steps = recording_steps(
        &journal,
        &[("count", Behaviour::Return(0)), ("insert", Behaviour::Hang)],
    );
    let release = CountingRelease::new(&journal);
    let pipeline = SequentialPipeline::new("hung");

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        pipeline.run(&TestAcquire::new(&journal), &boxed(&steps), &release),
    )
    .await;

    assert!(outcome.is_err());
    assert!(journal.contains("insert(Some(0))"));
    assert_never_released(&release);
}
