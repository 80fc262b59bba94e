//! ECS Components
//!
//! Components consumed and produced by instance batching.

pub mod transform;
pub mod renderable;
pub mod hierarchy;
pub mod batching;

pub use transform::TransformComponent;
pub use renderable::{RenderComponent, Signature, ShaderId, MaterialId, MeshId};
pub use hierarchy::ChildOf;
pub use batching::BatchMembership;
