//! Test: Notes chain against a store - happy path, step failure, refused
//! connection, and a close that faults after success

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use stepwise::core::Stage;
use stepwise::execution::CallingStyle;
use stepwise::notes::run_notes;
use stepwise::store::{MemoryStore, Note, StoreError};
use stepwise::SequentialPipeline;

fn store() -> MemoryStore {
    MemoryStore::new("notes").unwrap()
}

/// count -> 0, insert -> acknowledged, count -> 1, connection closed once
#[tokio::test]
async fn test_happy_path() {
    for style in CallingStyle::ALL {
        let driver = Arc::new(store());

        let results = run_notes(
            &SequentialPipeline::new("notes"),
            driver.clone(),
            Note::default(),
            style,
        )
        .await
        .unwrap();

        assert_eq!(results[0], json!(0), "{}", style);
        assert_eq!(results[1]["insertedCount"], json!(1), "{}", style);
        assert_eq!(results[2], json!(1), "{}", style);

        let stats = driver.stats();
        assert_eq!(stats.connects, 1);
        assert_eq!(stats.close_calls, 1);
        assert_eq!(stats.open_connections, 0);
        assert_eq!(driver.notes().await, vec![Note::new("hi", 345)]);
    }
}

/// A timed-out count stops the chain before anything is written
#[tokio::test]
async fn test_count_timeout() {
    for style in CallingStyle::ALL {
        let timeout = StoreError::NetworkTimeout(Duration::from_secs(30));
        let driver = Arc::new(store().fail_operation(0, timeout.clone()));

        let failure = run_notes(
            &SequentialPipeline::new("notes"),
            driver.clone(),
            Note::default(),
            style,
        )
        .await
        .unwrap_err();

        assert_eq!(failure.stage, Stage::Step(0), "{}", style);
        assert_eq!(failure.cause_as::<StoreError>(), Some(&timeout), "{}", style);

        let stats = driver.stats();
        assert_eq!(stats.operations, 1, "{}", style);
        assert_eq!(stats.close_calls, 1, "{}", style);
        assert!(driver.notes().await.is_empty());
    }
}

/// A refused connection fails acquisition and never closes anything
#[tokio::test]
async fn test_connection_refused() {
    for style in CallingStyle::ALL {
        let driver = Arc::new(store().refuse_connections("ECONNREFUSED 127.0.0.1:27017"));

        let failure = run_notes(
            &SequentialPipeline::new("notes"),
            driver.clone(),
            Note::default(),
            style,
        )
        .await
        .unwrap_err();

        assert_eq!(failure.stage, Stage::Acquisition, "{}", style);
        assert!(matches!(
            failure.cause_as::<StoreError>(),
            Some(StoreError::ConnectionRefused(_))
        ));
        assert_eq!(driver.stats().close_calls, 0, "{}", style);
        assert_eq!(driver.stats().operations, 0, "{}", style);
    }
}

/// A failing close after a successful chain keeps the success
#[tokio::test]
async fn test_close_fault_after_success() {
    for style in CallingStyle::ALL {
        let driver = Arc::new(store().fail_close(StoreError::Driver("socket reset".to_string())));

        let results = run_notes(
            &SequentialPipeline::new("notes"),
            driver.clone(),
            Note::default(),
            style,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 3, "{}", style);
        assert_eq!(driver.stats().close_calls, 1, "{}", style);
    }
}

/// The coroutine flavour writes its own note
#[tokio::test]
async fn test_coroutine_note() {
    let driver = Arc::new(store());

    let results = run_notes(
        &SequentialPipeline::new("notes"),
        driver.clone(),
        Note::coroutine_default(),
        CallingStyle::Coroutine,
    )
    .await
    .unwrap();

    assert_eq!(results[2], json!(1));
    assert_eq!(driver.notes().await, vec![Note::new("co is neat", 4)]);
}

/// Counts accumulate across runs against the same store
#[tokio::test]
async fn test_counts_accumulate_across_runs() {
    let driver = Arc::new(store());
    let pipeline = SequentialPipeline::new("notes");

    for (run, style) in CallingStyle::ALL.into_iter().enumerate() {
        let results = run_notes(&pipeline, driver.clone(), Note::default(), style)
            .await
            .unwrap();
        assert_eq!(results[0], json!(run));
        assert_eq!(results[2], json!(run + 1));
    }
    assert_eq!(driver.stats().open_connections, 0);
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use stepwise::store::SqliteStore;

    /// The happy path against a real database file, twice
    #[tokio::test]
    async fn test_happy_path_persists() {
        let dir = tempfile::tempdir().unwrap();
        let driver = Arc::new(SqliteStore::new(dir.path().join("notes.db"), "notes").unwrap());
        let pipeline = SequentialPipeline::new("notes");

        let first = run_notes(&pipeline, driver.clone(), Note::default(), CallingStyle::Chain)
            .await
            .unwrap();
        assert_eq!(first[0], json!(0));
        assert_eq!(first[1]["insertedCount"], json!(1));
        assert_eq!(first[2], json!(1));

        let second = run_notes(&pipeline, driver, Note::coroutine_default(), CallingStyle::Coroutine)
            .await
            .unwrap();
        assert_eq!(second[0], json!(1));
        assert_eq!(second[2], json!(2));
    }
}
