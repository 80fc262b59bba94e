//! Instance batching
//!
//! Slot allocation, render grouping, growable GPU arrays, hierarchical
//! transform resolution and the per-frame pipeline that ties them together.

pub mod gpu_array;
pub mod slot_allocator;
pub mod render_groups;
pub mod hierarchy;
pub mod pipeline;

#[cfg(test)]
mod tests;

pub use gpu_array::{BufferBinding, GpuTransform, GrowableGpuArray};
pub use slot_allocator::{CapacityChange, Slot, SlotAllocator};
pub use render_groups::{RenderGroup, RenderGroupIndex};
pub use hierarchy::TransformResolver;
pub use pipeline::{BatchingContext, BatchingPipeline, DrawBatch, FrameStats};
