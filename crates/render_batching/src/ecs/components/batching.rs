//! Batch membership tag written by the batching pipeline

use crate::ecs::Component;
use crate::render::batching::{RenderGroup, Slot};

/// Slot and render group owned by a registered renderable
///
/// Only the batching pipeline inserts, updates and removes this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchMembership {
    /// Index into the transform array
    pub slot: Slot,
    /// Group the renderable is drawn with
    pub group: RenderGroup,
}

impl BatchMembership {
    /// Tag attached before a slot and group are assigned
    pub const PLACEHOLDER: Self = Self {
        slot: Slot::SENTINEL,
        group: RenderGroup::UNASSIGNED,
    };

    /// Whether a real slot and group have been assigned
    pub fn is_assigned(&self) -> bool {
        self.slot != Slot::SENTINEL && self.group != RenderGroup::UNASSIGNED
    }
}

impl Component for BatchMembership {}
