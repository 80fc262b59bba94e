//! Scenario tests for the batching pipeline

mod support;
mod lifecycle;
mod transforms;
