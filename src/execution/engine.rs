//! Sequential pipeline runner - acquire, run steps in order, release once

use crate::core::{
    Acquire, BoxedStep, OperationPanicked, PipelineResult, PipelineRun, PipelineState, Release,
    StageFailure, StateLog, Step,
};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during a pipeline run
#[derive(Debug)]
pub enum ExecutionEvent<'a, T> {
    RunStarted {
        run_id: Uuid,
        pipeline_name: &'a str,
    },
    Acquired {
        run_id: Uuid,
    },
    AcquisitionFailed {
        run_id: Uuid,
        error: &'a StageFailure,
    },
    StepStarted {
        run_id: Uuid,
        index: usize,
        name: &'a str,
    },
    StepCompleted {
        run_id: Uuid,
        index: usize,
        name: &'a str,
        output: &'a T,
    },
    StepFailed {
        run_id: Uuid,
        index: usize,
        name: &'a str,
        error: &'a StageFailure,
    },
    Finalizing {
        run_id: Uuid,
    },
    ReleaseFaulted {
        run_id: Uuid,
        error: &'a StageFailure,
    },
    RunFinished {
        run_id: Uuid,
        state: PipelineState,
    },
}

/// Type for event handlers
pub type EventHandler<T> = Arc<dyn Fn(&ExecutionEvent<'_, T>) + Send + Sync>;

/// Runs a fixed, ordered chain of steps against one acquired handle
///
/// Each step sees the handle and the previous step's result. The first
/// failure stops the chain. Whatever happens after a successful acquisition,
/// the handle is released exactly once before the outcome is returned.
pub struct SequentialPipeline<T> {
    name: String,
    event_handlers: Vec<EventHandler<T>>,
}

impl<T: Send + Sync + 'static> SequentialPipeline<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            event_handlers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExecutionEvent<'_, T>) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    /// Start tracking a new run
    pub(crate) fn begin(&self) -> RunTracker<T> {
        let tracker = RunTracker {
            run_id: Uuid::new_v4(),
            pipeline_name: self.name.clone(),
            handlers: self.event_handlers.clone(),
            log: StateLog::new(),
            released: false,
        };
        info!(
            "Starting pipeline run: {} ({})",
            tracker.pipeline_name, tracker.run_id
        );
        tracker.emit(&ExecutionEvent::RunStarted {
            run_id: tracker.run_id,
            pipeline_name: &tracker.pipeline_name,
        });
        tracker
    }

    /// Execute the whole chain
    pub async fn run<A, R>(
        &self,
        acquire: &A,
        steps: &[BoxedStep<A::Handle, T>],
        release: &R,
    ) -> PipelineRun<T>
    where
        A: Acquire + ?Sized,
        A::Handle: 'static,
        R: Release<A::Handle> + ?Sized,
    {
        let mut tracker = self.begin();

        let handle = match tracker.acquire(acquire).await {
            Ok(handle) => handle,
            Err(failure) => return tracker.finish(PipelineResult::Failure(failure), None),
        };

        let mut results: Vec<T> = Vec::with_capacity(steps.len());
        let mut failure = None;

        for (index, step) in steps.iter().enumerate() {
            let outcome = tracker
                .step(index, step.as_ref(), &handle, results.last())
                .await;
            match outcome {
                Ok(output) => results.push(output),
                Err(step_failure) => {
                    failure = Some(step_failure);
                    break;
                }
            }
        }

        if failure.is_none() {
            tracker.exhausted(steps.len());
        }

        let release_fault = tracker.finalize(release, handle).await;

        let result = match failure {
            None => PipelineResult::Success { results },
            Some(failure) => PipelineResult::Failure(failure),
        };
        tracker.finish(result, release_fault)
    }
}

/// Bookkeeping for one run: state log, logging and event emission
///
/// Every calling style drives a run through these methods, so the
/// transitions and their side effects live in one place.
pub(crate) struct RunTracker<T> {
    run_id: Uuid,
    pipeline_name: String,
    handlers: Vec<EventHandler<T>>,
    log: StateLog,
    released: bool,
}

impl<T: Send + Sync + 'static> RunTracker<T> {
    /// Call every handler; a panicking handler is logged and skipped
    fn emit(&self, event: &ExecutionEvent<'_, T>) {
        for handler in &self.handlers {
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                error!(
                    "Event handler panicked during run {}: {}",
                    self.run_id,
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub(crate) async fn acquire<A>(&mut self, acquire: &A) -> Result<A::Handle, StageFailure>
    where
        A: Acquire + ?Sized,
    {
        self.log.advance(PipelineState::Acquiring);
        debug!("Acquiring resource for run {}", self.run_id);

        match guarded(acquire.acquire()).await {
            Ok(handle) => {
                info!("Resource acquired for run {}", self.run_id);
                self.emit(&ExecutionEvent::Acquired {
                    run_id: self.run_id,
                });
                Ok(handle)
            }
            Err(cause) => {
                let failure = StageFailure::acquisition(cause);
                error!("Acquisition failed for run {}: {}", self.run_id, failure);
                self.log.advance(PipelineState::AcquisitionFailed);
                self.emit(&ExecutionEvent::AcquisitionFailed {
                    run_id: self.run_id,
                    error: &failure,
                });
                Err(failure)
            }
        }
    }

    pub(crate) async fn step<H, S>(
        &mut self,
        index: usize,
        step: &S,
        handle: &H,
        prior: Option<&T>,
    ) -> Result<T, StageFailure>
    where
        H: Send + Sync,
        S: Step<H, T> + ?Sized,
    {
        let name = step.name();
        self.log.advance(PipelineState::Running { index });
        info!("Executing step {}: {}", index, name);
        self.emit(&ExecutionEvent::StepStarted {
            run_id: self.run_id,
            index,
            name,
        });

        match guarded(step.run(handle, prior)).await {
            Ok(output) => {
                debug!("Step {} ({}) completed", index, name);
                self.emit(&ExecutionEvent::StepCompleted {
                    run_id: self.run_id,
                    index,
                    name,
                    output: &output,
                });
                Ok(output)
            }
            Err(cause) => {
                let failure = StageFailure::step(index, name, cause);
                error!("Step {} ({}) failed: {}", index, name, failure.cause);
                self.emit(&ExecutionEvent::StepFailed {
                    run_id: self.run_id,
                    index,
                    name,
                    error: &failure,
                });
                Err(failure)
            }
        }
    }

    /// A fault raised between steps, attributed to the step that would run next
    pub(crate) fn fault(&mut self, index: usize, name: &str, cause: anyhow::Error) -> StageFailure {
        if self.log.current() != (PipelineState::Running { index }) {
            self.log.advance(PipelineState::Running { index });
        }
        let failure = StageFailure::step(index, name, cause);
        error!("Run {} faulted before step {}: {}", self.run_id, index, failure.cause);
        self.emit(&ExecutionEvent::StepFailed {
            run_id: self.run_id,
            index,
            name,
            error: &failure,
        });
        failure
    }

    /// Every one of `len` steps has run
    pub(crate) fn exhausted(&mut self, len: usize) {
        self.log.advance(PipelineState::Running { index: len });
    }

    pub(crate) async fn finalize<H, R>(&mut self, release: &R, handle: H) -> Option<StageFailure>
    where
        H: Send + 'static,
        R: Release<H> + ?Sized,
    {
        self.log.advance(PipelineState::Finalizing);
        self.emit(&ExecutionEvent::Finalizing {
            run_id: self.run_id,
        });
        debug!("Releasing resource for run {}", self.run_id);

        let outcome = guarded(release.release(handle)).await;
        self.released = true;

        match outcome {
            Ok(()) => {
                info!("Resource released for run {}", self.run_id);
                None
            }
            Err(cause) => {
                let fault = StageFailure::release(cause);
                warn!("Release failed for run {}: {}", self.run_id, fault);
                self.emit(&ExecutionEvent::ReleaseFaulted {
                    run_id: self.run_id,
                    error: &fault,
                });
                Some(fault)
            }
        }
    }

    pub(crate) fn finish(
        &mut self,
        result: PipelineResult<T>,
        release_fault: Option<StageFailure>,
    ) -> PipelineRun<T> {
        if !self.log.current().is_terminal() {
            let terminal = if result.is_success() {
                PipelineState::Succeeded
            } else {
                PipelineState::Failed
            };
            self.log.advance(terminal);
        }

        let state = self.log.current();
        info!(
            "Pipeline run finished: {} ({}) - {}",
            self.pipeline_name, self.run_id, state
        );
        self.emit(&ExecutionEvent::RunFinished {
            run_id: self.run_id,
            state,
        });

        PipelineRun {
            run_id: self.run_id,
            pipeline_name: self.pipeline_name.clone(),
            result,
            release_fault,
            released: self.released,
            started_at: self.log.started_at(),
            finished_at: Utc::now(),
            state_log: std::mem::take(&mut self.log),
        }
    }
}

/// Await `operation`, turning a panic inside it into an error
pub(crate) async fn guarded<F, V>(operation: F) -> anyhow::Result<V>
where
    F: Future<Output = anyhow::Result<V>>,
{
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(OperationPanicked {
            message: panic_message(payload.as_ref()),
        }
        .into()),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
