//! # Render Batching
//!
//! GPU instance batching for Vulkan renderers, driven by a small ECS.
//!
//! Every entity carrying a [`RenderComponent`](ecs::components::RenderComponent)
//! is given a slot in a host-visible transform array and a render group
//! keyed by its shader, material, mesh and static flag. Each frame the
//! [`BatchingPipeline`](render::batching::BatchingPipeline) writes a
//! group-sorted index array and the world matrices that changed, resolving
//! parent chains through [`ChildOf`](ecs::components::ChildOf) links. Draw
//! submission then issues one instanced draw per group.
//!
//! ## Features
//!
//! - **Stable slots**: free-list allocation with power-of-two growth
//! - **Stable groups**: a signature keeps its group id for the pipeline's lifetime
//! - **Dirty tracking**: only changed transforms (or their descendants) are rewritten
//! - **Parallel resolve**: transform resolution fans out over scoped workers
//! - **Pluggable memory**: Vulkan via `ash`, or host memory for headless runs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_batching::prelude::*;
//!
//! fn main() -> Result<(), BatchError> {
//!     let mut world = World::new();
//!     let context = BatchingContext::new(BatchingConfig::default())?;
//!     let mut pipeline = BatchingPipeline::new(HostMemory::new(), context, &mut world)?;
//!
//!     let entity = world.spawn();
//!     world.insert(entity, RenderComponent::new(ShaderId(0), MaterialId(0), MeshId(0)));
//!     world.insert(entity, TransformComponent::from_position(Vec3::new(0.0, 1.0, 0.0)));
//!
//!     let stats = pipeline.execute(&mut world)?;
//!     assert_eq!(stats.live, 1);
//!     for batch in pipeline.draw_batches() {
//!         println!("{:?} x{}", batch.signature, batch.instance_count);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod ecs;
pub mod error;
pub mod foundation;
pub mod render;

pub use error::{BatchError, BatchResult};

/// Common imports for batching users
pub mod prelude {
    pub use crate::{
        BatchError, BatchResult,
        config::{Config, ConfigError},
        core::config::{BatchingConfig, DemoConfig},
        ecs::{World, Entity, Component, Dirty, System},
        ecs::components::{
            BatchMembership, ChildOf, MaterialId, MeshId, RenderComponent, ShaderId, Signature,
            TransformComponent,
        },
        foundation::math::{Mat4, Quat, Vec3},
        render::batching::{
            BatchingContext, BatchingPipeline, DrawBatch, FrameStats, GpuTransform, RenderGroup, Slot,
            TransformResolver,
        },
        render::memory::{GpuMemory, HostMemory, VulkanMemory},
    };
}
