//! Scenario-based tests for stepwise

mod calling_styles;
mod concurrency;
mod ordering;
mod short_circuit;
mod store_scenarios;
