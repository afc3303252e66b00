//! Cooperative suspend/resume calling style
//!
//! The body is ordinary async code that awaits each step through a
//! [`Coroutine`]. Every `co.step(..).await` is a suspension point driven by
//! the same tracker as [`SequentialPipeline::run`], so ordering,
//! short-circuiting and release behave identically:
//!
//! ```no_run
//! # use stepwise::{SequentialPipeline, core::{acquire_fn, release_fn, step_fn}};
//! # async fn demo() {
//! let pipeline = SequentialPipeline::<u64>::new("co");
//! let run = pipeline
//!     .run_coroutine(
//!         &acquire_fn(|| async { anyhow::Ok(1_u64) }),
//!         &release_fn(|_conn: u64| async { anyhow::Ok(()) }),
//!         |co| async move {
//!             let count = co
//!                 .step(&step_fn("count", |c: u64, _prior: Option<u64>| async move { anyhow::Ok(c) }))
//!                 .await?;
//!             println!("count is: {}", count);
//!             Ok::<_, stepwise::CoroutineHalted>(())
//!         },
//!     )
//!     .await;
//! # }
//! ```

use crate::core::{
    Acquire, OperationPanicked, PipelineResult, PipelineRun, Release, StageFailure, Step,
};
use crate::execution::engine::{panic_message, RunTracker, SequentialPipeline};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Returned by [`Coroutine::step`] once the run has stopped
///
/// The actual failure is kept by the runner and reported in the
/// [`PipelineRun`]; propagate this with `?` to end the body.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("pipeline halted")]
pub struct CoroutineHalted(());

struct CoState<H, T> {
    tracker: RunTracker<T>,
    handle: Option<H>,
    results: Vec<T>,
    failure: Option<StageFailure>,
}

/// The body's view of a running pipeline
pub struct Coroutine<H, T> {
    state: Arc<Mutex<CoState<H, T>>>,
}

impl<H, T> Coroutine<H, T>
where
    H: Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Run `step` against the handle, suspending until it resolves
    ///
    /// Holds the run for the whole call, so two steps never overlap even if
    /// the body polls them together. After any failure every later call
    /// returns [`CoroutineHalted`] without running its step.
    pub async fn step<S>(&self, step: &S) -> Result<T, CoroutineHalted>
    where
        S: Step<H, T> + ?Sized,
    {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if state.failure.is_some() {
            debug!("Skipping step {}: run already failed", step.name());
            return Err(CoroutineHalted(()));
        }
        let Some(handle) = state.handle.as_ref() else {
            warn!("Step {} called after the handle was released", step.name());
            return Err(CoroutineHalted(()));
        };

        let index = state.results.len();
        let outcome = state
            .tracker
            .step(index, step, handle, state.results.last())
            .await;
        match outcome {
            Ok(output) => {
                state.results.push(output.clone());
                Ok(output)
            }
            Err(failure) => {
                state.failure = Some(failure);
                Err(CoroutineHalted(()))
            }
        }
    }

    /// Results produced so far, in step order
    pub async fn results(&self) -> Vec<T> {
        self.state.lock().await.results.clone()
    }
}

impl<T> SequentialPipeline<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Execute `body` as a coroutine over one acquired handle
    pub async fn run_coroutine<A, R, F, Fut>(
        &self,
        acquire: &A,
        release: &R,
        body: F,
    ) -> PipelineRun<T>
    where
        A: Acquire + ?Sized,
        A::Handle: 'static,
        R: Release<A::Handle> + ?Sized,
        F: FnOnce(Coroutine<A::Handle, T>) -> Fut,
        Fut: Future<Output = Result<(), CoroutineHalted>>,
    {
        let mut tracker = self.begin();

        let handle = match tracker.acquire(acquire).await {
            Ok(handle) => handle,
            Err(failure) => return tracker.finish(PipelineResult::Failure(failure), None),
        };

        let shared = Arc::new(Mutex::new(CoState {
            tracker,
            handle: Some(handle),
            results: Vec::new(),
            failure: None,
        }));

        let body_outcome = AssertUnwindSafe(body(Coroutine {
            state: shared.clone(),
        }))
        .catch_unwind()
        .await;

        let mut guard = shared.lock().await;
        let state = &mut *guard;
        let next_index = state.results.len();

        if state.failure.is_none() {
            match body_outcome {
                Ok(Ok(())) => state.tracker.exhausted(next_index),
                Ok(Err(CoroutineHalted(()))) => {
                    let cause = anyhow::anyhow!("coroutine halted without a recorded failure");
                    state.failure = Some(state.tracker.fault(next_index, "coroutine", cause));
                }
                Err(payload) => {
                    let cause = OperationPanicked {
                        message: panic_message(payload.as_ref()),
                    };
                    state.failure = Some(state.tracker.fault(next_index, "coroutine", cause.into()));
                }
            }
        } else if body_outcome.is_err() {
            warn!(
                "Coroutine body for run {} panicked after a step failure",
                state.tracker.run_id()
            );
        }

        let release_fault = match state.handle.take() {
            Some(handle) => state.tracker.finalize(release, handle).await,
            None => None,
        };

        let result = match state.failure.take() {
            None => PipelineResult::Success {
                results: std::mem::take(&mut state.results),
            },
            Some(failure) => PipelineResult::Failure(failure),
        };
        state.tracker.finish(result, release_fault)
    }
}
