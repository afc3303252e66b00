//! Continuation-passing calling style

use crate::core::{Acquire, BoxedStep, PipelineRun, Release, StageFailure};
use crate::execution::engine::SequentialPipeline;
use tracing::warn;

impl<T: Send + Sync + 'static> SequentialPipeline<T> {
    /// Run the chain, then hand the outcome to `done` exactly once
    ///
    /// `done` receives `Err` with the first failure or `Ok` with every
    /// result, after the handle has been released. A release fault is not
    /// passed to `done`; it has already been logged and emitted as an event.
    pub async fn run_with_callback<A, R, C, O>(
        &self,
        acquire: &A,
        steps: &[BoxedStep<A::Handle, T>],
        release: &R,
        done: C,
    ) -> O
    where
        A: Acquire + ?Sized,
        A::Handle: 'static,
        R: Release<A::Handle> + ?Sized,
        C: FnOnce(Result<Vec<T>, StageFailure>) -> O,
    {
        let PipelineRun {
            run_id,
            result,
            release_fault,
            ..
        } = self.run(acquire, steps, release).await;

        if let Some(fault) = release_fault {
            warn!("Run {} finished with a release fault: {}", run_id, fault);
        }
        done(result.into_result())
    }
}
