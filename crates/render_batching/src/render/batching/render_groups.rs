//! Render group index
//!
//! Maps each distinct [`Signature`] to a stable [`RenderGroup`] id and keeps
//! a live-member count per group. Groups are never destroyed: a signature
//! that disappears and later returns gets its old id back.
//!
//! Draw order is shader, then material, then static flag, then creation
//! sequence. Sorting by shader and material first keeps pipeline and
//! descriptor rebinds between consecutive draws to a minimum.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::ecs::components::{MaterialId, ShaderId, Signature};
use crate::error::{BatchError, BatchResult};

/// Canonical id for a renderable signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderGroup(pub u32);

impl RenderGroup {
    /// Placeholder for renderables that have not been grouped yet
    pub const UNASSIGNED: Self = Self(u32::MAX);

    /// Group as an array index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RenderGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::UNASSIGNED {
            write!(f, "unassigned")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Total order used for draw sequencing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct DrawOrderKey {
    shader: ShaderId,
    material: MaterialId,
    is_static: bool,
    sequence: u32,
}

#[derive(Debug, Clone)]
struct GroupEntry {
    signature: Signature,
    count: u32,
}

/// Signature to group mapping with per-group live counts
#[derive(Debug, Default)]
pub struct RenderGroupIndex {
    by_signature: HashMap<Signature, RenderGroup>,
    sorted: BTreeMap<DrawOrderKey, RenderGroup>,
    entries: Vec<GroupEntry>,
}

impl RenderGroupIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of groups ever created
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no group was ever created
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the group for a signature without creating it
    pub fn lookup(&self, signature: &Signature) -> Option<RenderGroup> {
        self.by_signature.get(signature).copied()
    }

    /// Find or create the group for `signature` and count one more member
    pub fn add(&mut self, signature: Signature) -> RenderGroup {
        let group = match self.by_signature.get(&signature) {
            Some(group) => *group,
            None => self.create(signature),
        };
        self.entries[group.index()].count += 1;
        group
    }

    /// Count one fewer member; the group entry is kept at zero
    pub fn remove(&mut self, group: RenderGroup) -> BatchResult<()> {
        let entry = self
            .entries
            .get_mut(group.index())
            .ok_or(BatchError::UnknownGroup { group })?;
        if entry.count == 0 {
            return Err(BatchError::GroupUnderflow { group });
        }
        entry.count -= 1;
        Ok(())
    }

    /// Move one member from `old` to the group for `signature`
    ///
    /// Returns the member's group afterwards, which is `old` when the
    /// signature still maps there.
    pub fn regroup(&mut self, old: RenderGroup, signature: Signature) -> BatchResult<RenderGroup> {
        if self.lookup(&signature) == Some(old) {
            return Ok(old);
        }
        self.remove(old)?;
        Ok(self.add(signature))
    }

    /// Live members of a group
    pub fn count(&self, group: RenderGroup) -> u32 {
        self.entries.get(group.index()).map_or(0, |entry| entry.count)
    }

    /// Signature a group was created for
    pub fn signature(&self, group: RenderGroup) -> Option<Signature> {
        self.entries.get(group.index()).map(|entry| entry.signature)
    }

    /// Groups in draw order
    pub fn iter_sorted(&self) -> impl Iterator<Item = RenderGroup> + '_ {
        self.sorted.values().copied()
    }

    /// `(signature, count)` for every group in draw order, empty groups included
    pub fn render_groups(&self) -> Vec<(Signature, u32)> {
        self.iter_sorted()
            .map(|group| {
                let entry = &self.entries[group.index()];
                (entry.signature, entry.count)
            })
            .collect()
    }

    fn create(&mut self, signature: Signature) -> RenderGroup {
        // Ids are dense indices into `entries`
        let sequence = self.entries.len() as u32;
        let group = RenderGroup(sequence);

        self.entries.push(GroupEntry { signature, count: 0 });
        self.by_signature.insert(signature, group);
        self.sorted.insert(
            DrawOrderKey {
                shader: signature.shader,
                material: signature.material,
                is_static: signature.is_static,
                sequence,
            },
            group,
        );
        log::trace!("Created render group {} for {:?}", group, signature);
        group
    }
}
