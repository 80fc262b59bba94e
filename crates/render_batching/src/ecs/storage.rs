//! Component Storage
//!
//! Each component type lives in its own sparse map keyed by entity. The
//! world holds them type-erased behind [`AnyStorage`] so structural
//! operations (despawn, contains checks for queries) work without knowing
//! the concrete type.

use std::any::Any;

use slotmap::SecondaryMap;

use super::{Component, Entity};

/// Typed storage for one component type
pub struct ComponentStorage<T: Component> {
    components: SecondaryMap<Entity, T>,
    removed: Option<RemovalLog<T>>,
}

/// Copies of removed components, kept until drained
struct RemovalLog<T> {
    clone: fn(&T) -> T,
    entries: Vec<(Entity, T)>,
}

impl<T: Component> Default for ComponentStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ComponentStorage<T> {
    /// Create empty storage
    pub fn new() -> Self {
        Self {
            components: SecondaryMap::new(),
            removed: None,
        }
    }

    /// Insert a component, returning the previous value
    pub fn insert(&mut self, entity: Entity, component: T) -> Option<T> {
        self.components.insert(entity, component)
    }

    /// Remove a component, recording a copy when removals are observed
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let component = self.components.remove(entity)?;
        if let Some(log) = &mut self.removed {
            log.entries.push((entity, (log.clone)(&component)));
        }
        Some(component)
    }

    /// Get a component
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.components.get(entity)
    }

    /// Get a mutable component
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.components.get_mut(entity)
    }

    /// Check for a component
    pub fn contains(&self, entity: Entity) -> bool {
        self.components.contains_key(entity)
    }

    /// Number of stored components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the storage is empty
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterate stored components
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.components.iter()
    }

    /// Drop every component without recording removals
    pub fn clear(&mut self) {
        self.components.clear();
    }

    /// Start recording removed components
    pub fn observe_removals(&mut self)
    where
        T: Clone,
    {
        self.removed.get_or_insert_with(|| RemovalLog {
            clone: T::clone,
            entries: Vec::new(),
        });
    }

    /// Number of removals recorded since the last drain
    pub fn pending_removals(&self) -> usize {
        self.removed.as_ref().map_or(0, |log| log.entries.len())
    }

    /// Take the recorded removals
    pub fn drain_removed(&mut self) -> Vec<(Entity, T)> {
        self.removed
            .as_mut()
            .map(|log| std::mem::take(&mut log.entries))
            .unwrap_or_default()
    }
}

/// Type-erased view of a [`ComponentStorage`]
pub trait AnyStorage: Send + Sync {
    /// Remove the entity's component if present
    fn remove_entity(&mut self, entity: Entity);

    /// Check for the entity's component
    fn contains(&self, entity: Entity) -> bool;

    /// Number of stored components
    fn len(&self) -> usize;

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyStorage for ComponentStorage<T> {
    fn remove_entity(&mut self, entity: Entity) {
        let _ = self.remove(entity);
    }

    fn contains(&self, entity: Entity) -> bool {
        ComponentStorage::contains(self, entity)
    }

    fn len(&self) -> usize {
        ComponentStorage::len(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
