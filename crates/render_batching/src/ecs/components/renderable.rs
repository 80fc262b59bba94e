//! Renderable component for entities that can be drawn instanced
//!
//! The component only names the shader, material and mesh; resolving those
//! ids into GPU objects belongs to the draw submission side.

use serde::{Serialize, Deserialize};

use crate::ecs::Component;

/// Shader program identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShaderId(pub u32);

/// Material identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

/// Mesh identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MeshId(pub u32);

/// Component for entities that are drawn through instance batching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderComponent {
    /// Shader used to draw
    pub shader: ShaderId,
    /// Material bound while drawing
    pub material: MaterialId,
    /// Mesh instanced
    pub mesh: MeshId,
    /// Whether the renderable never moves
    pub is_static: bool,
}

impl RenderComponent {
    /// Create a dynamic renderable
    pub fn new(shader: ShaderId, material: MaterialId, mesh: MeshId) -> Self {
        Self {
            shader,
            material,
            mesh,
            is_static: false,
        }
    }

    /// Builder: mark as static
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// Batching key for this renderable
    pub fn signature(&self) -> Signature {
        Signature {
            shader: self.shader,
            material: self.material,
            mesh: self.mesh,
            is_static: self.is_static,
        }
    }
}

impl Component for RenderComponent {
    const TRACK_CHANGES: bool = true;
}

/// Everything that must match for two renderables to share a draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// Shader used to draw
    pub shader: ShaderId,
    /// Material bound while drawing
    pub material: MaterialId,
    /// Mesh instanced
    pub mesh: MeshId,
    /// Whether the renderables never move
    pub is_static: bool,
}
