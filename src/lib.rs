//! stepwise - strictly ordered async step chains over one store connection

pub mod cli;
pub mod core;
pub mod execution;
pub mod notes;
pub mod store;

// Re-export commonly used types
pub use core::{Acquire, PipelineResult, PipelineRun, PipelineState, Release, Stage, StageFailure, Step};
pub use execution::{CallingStyle, Chain, Coroutine, CoroutineHalted, ExecutionEvent, SequentialPipeline};
pub use store::{InsertResult, MemoryStore, Note, StoreDriver, StoreError};
