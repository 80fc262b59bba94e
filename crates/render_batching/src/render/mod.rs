//! GPU-side data plane: memory backends and instance batching

pub mod memory;
pub mod batching;
