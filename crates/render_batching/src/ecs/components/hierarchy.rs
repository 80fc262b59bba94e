//! Parent links between entities

use crate::ecs::{Component, Entity};

/// Places an entity under a parent in the transform hierarchy
///
/// The reference is weak: if the parent is despawned the handle's
/// generation no longer matches and the link reads as "no parent".
/// Cycles are not detected and must not be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChildOf {
    /// Parent entity
    pub parent: Entity,
}

impl ChildOf {
    /// Link to `parent`
    pub fn new(parent: Entity) -> Self {
        Self { parent }
    }
}

impl Component for ChildOf {
    const TRACK_CHANGES: bool = true;
}
