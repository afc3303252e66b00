//! Core domain models for a pipeline run
//!
//! This module defines the seams a run is assembled from, the state machine a
//! run moves through, the shape of its outcome, and its configuration.

pub mod config;
pub mod outcome;
pub mod state;
pub mod step;

pub use outcome::*;
pub use state::*;
pub use step::*;
