//! Chained composition calling style
//!
//! Builds the step list fluently, promise style, and hands it to the same
//! runner as every other style:
//!
//! ```no_run
//! # use stepwise::{Chain, SequentialPipeline, core::{acquire_fn, release_fn}};
//! # async fn demo() {
//! let run = Chain::start(acquire_fn(|| async { anyhow::Ok(5_u64) }))
//!     .then("count", |conn: u64, _prior: Option<u64>| async move { anyhow::Ok(conn) })
//!     .then("next", |_conn: u64, prior: Option<u64>| async move {
//!         anyhow::Ok(prior.unwrap_or_default() + 1)
//!     })
//!     .finally(release_fn(|_conn: u64| async { anyhow::Ok(()) }))
//!     .run(&SequentialPipeline::new("chain"))
//!     .await;
//! # }
//! ```

use crate::core::{step_fn, Acquire, BoxedStep, PipelineRun, Release, Step};
use crate::execution::engine::SequentialPipeline;
use std::future::Future;

/// A chain under construction: acquisition plus the steps added so far
pub struct Chain<A: Acquire, T> {
    acquire: A,
    steps: Vec<BoxedStep<A::Handle, T>>,
}

impl<A, T> Chain<A, T>
where
    A: Acquire,
    A::Handle: 'static,
    T: Send + Sync + 'static,
{
    pub fn start(acquire: A) -> Self {
        Self {
            acquire,
            steps: Vec::new(),
        }
    }

    /// Append a step implemented by a type
    pub fn then_step<S>(mut self, step: S) -> Self
    where
        S: Step<A::Handle, T> + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    /// Append a closure step
    pub fn then<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        A::Handle: Clone,
        T: Clone,
        F: Fn(A::Handle, Option<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        self.then_step(step_fn(name, f))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Attach the release, closing the chain
    pub fn finally<R>(self, release: R) -> FinalizedChain<A, R, T>
    where
        R: Release<A::Handle>,
    {
        FinalizedChain {
            acquire: self.acquire,
            steps: self.steps,
            release,
        }
    }
}

/// A complete chain, ready to run any number of times
pub struct FinalizedChain<A: Acquire, R, T> {
    acquire: A,
    steps: Vec<BoxedStep<A::Handle, T>>,
    release: R,
}

impl<A, R, T> FinalizedChain<A, R, T>
where
    A: Acquire,
    A::Handle: 'static,
    R: Release<A::Handle>,
    T: Send + Sync + 'static,
{
    pub async fn run(&self, pipeline: &SequentialPipeline<T>) -> PipelineRun<T> {
        pipeline.run(&self.acquire, &self.steps, &self.release).await
    }

    /// Run, then pass a failure to `on_error` before returning the run
    pub async fn run_catching<E>(&self, pipeline: &SequentialPipeline<T>, on_error: E) -> PipelineRun<T>
    where
        E: FnOnce(&crate::core::StageFailure),
    {
        let run = self.run(pipeline).await;
        if let Some(failure) = run.failure() {
            on_error(failure);
        }
        run
    }
}
