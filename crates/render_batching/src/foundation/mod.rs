//! Foundation utilities shared by the batching subsystem
//!
//! Math aliases, logging setup and lightweight timing helpers.

pub mod math;
pub mod logging;
pub mod time;
