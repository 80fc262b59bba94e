//! Core configuration types for the batching subsystem

pub mod config;

pub use config::{BatchingConfig, DemoConfig};
