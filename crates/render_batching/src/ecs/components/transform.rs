//! Transform component for the ECS system
//!
//! Pure data component holding an entity's local transform. When the
//! entity has a [`ChildOf`](super::ChildOf) parent this is relative to the
//! parent's world matrix, otherwise it is the world transform.

use crate::foundation::math::{compose_trs, Mat4, Quat, Vec3};
use crate::ecs::Component;

/// ECS Transform component
#[derive(Debug, Clone, PartialEq)]
pub struct TransformComponent {
    /// Position relative to the parent (or world origin)
    pub position: Vec3,

    /// Rotation relative to the parent
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Component for TransformComponent {
    const TRACK_CHANGES: bool = true;
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl TransformComponent {
    /// Create identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create from position, rotation and scale
    pub fn from_transform(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Builder: set rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder: set uniform scale
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Local matrix, translation * rotation * scale
    pub fn to_matrix(&self) -> Mat4 {
        compose_trs(&self.position, &self.rotation, &self.scale)
    }
}
