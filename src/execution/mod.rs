//! Pipeline execution: the runner and its calling styles

pub mod callback;
pub mod chain;
pub mod coroutine;
pub mod engine;

pub use chain::{Chain, FinalizedChain};
pub use coroutine::{Coroutine, CoroutineHalted};
pub use engine::{EventHandler, ExecutionEvent, SequentialPipeline};

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the caller drives a run
///
/// All styles share one runner, so they differ only in syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallingStyle {
    /// A step list passed to [`SequentialPipeline::run`]
    #[default]
    Sequence,
    /// Outcome handed to a completion callback
    Callback,
    /// Fluent [`Chain`] builder
    Chain,
    /// Async body awaiting each step through a [`Coroutine`]
    Coroutine,
}

impl CallingStyle {
    pub const ALL: [CallingStyle; 4] = [
        CallingStyle::Sequence,
        CallingStyle::Callback,
        CallingStyle::Chain,
        CallingStyle::Coroutine,
    ];
}

impl fmt::Display for CallingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallingStyle::Sequence => "sequence",
            CallingStyle::Callback => "callback",
            CallingStyle::Chain => "chain",
            CallingStyle::Coroutine => "coroutine",
        };
        f.write_str(name)
    }
}
