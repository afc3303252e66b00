//! Acquire / step / release seams
//!
//! A pipeline run is built from three kinds of async operation: one that
//! produces the resource handle, an ordered list of steps that use it, and one
//! that gives it back. Implement the traits directly for reusable operations,
//! or wrap closures with [`acquire_fn`], [`step_fn`] and [`release_fn`].

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;

/// Produces the resource handle a run works against
#[async_trait]
pub trait Acquire: Send + Sync {
    /// The opaque handle (e.g. an open connection)
    type Handle: Send + Sync;

    async fn acquire(&self) -> Result<Self::Handle>;
}

/// A single step in a pipeline
///
/// `prior` is the result of the step immediately before this one, or `None`
/// for the first step.
#[async_trait]
pub trait Step<H: Send + Sync, T: Send + Sync>: Send + Sync {
    /// Human-readable step name, used in logs and failures
    fn name(&self) -> &str;

    async fn run(&self, handle: &H, prior: Option<&T>) -> Result<T>;
}

/// Gives the handle back. Takes it by value, so it can only happen once.
#[async_trait]
pub trait Release<H: Send + 'static>: Send + Sync {
    async fn release(&self, handle: H) -> Result<()>;
}

/// Boxed step, as stored in a step list
pub type BoxedStep<H, T> = Box<dyn Step<H, T>>;

/// Closure-backed [`Acquire`]
pub struct AcquireFn<F> {
    f: F,
}

/// Wrap `f` as an acquisition
pub fn acquire_fn<F, Fut, H>(f: F) -> AcquireFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<H>> + Send,
    H: Send + Sync,
{
    AcquireFn { f }
}

#[async_trait]
impl<F, Fut, H> Acquire for AcquireFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<H>> + Send,
    H: Send + Sync,
{
    type Handle = H;

    async fn acquire(&self) -> Result<H> {
        (self.f)().await
    }
}

/// Closure-backed [`Step`]
///
/// The closure receives owned copies of the handle and the prior result, so
/// the handle type must be cheap to clone (an `Arc`, a pool, an id).
pub struct StepFn<F> {
    name: String,
    f: F,
}

/// Wrap `f` as a named step
pub fn step_fn<F>(name: impl Into<String>, f: F) -> StepFn<F> {
    StepFn {
        name: name.into(),
        f,
    }
}

#[async_trait]
impl<H, T, F, Fut> Step<H, T> for StepFn<F>
where
    H: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(H, Option<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, handle: &H, prior: Option<&T>) -> Result<T> {
        (self.f)(handle.clone(), prior.cloned()).await
    }
}

/// Closure-backed [`Release`]
pub struct ReleaseFn<F> {
    f: F,
}

/// Wrap `f` as a release
pub fn release_fn<F>(f: F) -> ReleaseFn<F> {
    ReleaseFn { f }
}

#[async_trait]
impl<H, F, Fut> Release<H> for ReleaseFn<F>
where
    H: Send + 'static,
    F: Fn(H) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn release(&self, handle: H) -> Result<()> {
        (self.f)(handle).await
    }
}
