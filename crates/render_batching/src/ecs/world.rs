//! ECS World implementation

use std::any::TypeId;
use std::collections::HashMap;

use slotmap::SlotMap;

use super::components::ChildOf;
use super::query::Query;
use super::storage::{AnyStorage, ComponentStorage};
use super::{Component, Dirty, Entity};

/// ECS World containing all entities and components
#[derive(Default)]
pub struct World {
    entities: SlotMap<Entity, ()>,
    storages: HashMap<TypeId, Box<dyn AnyStorage>>,
}

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new entity
    pub fn spawn(&mut self) -> Entity {
        self.entities.insert(())
    }

    /// Destroy an entity and every component attached to it
    ///
    /// Returns `false` if the entity was already gone. Removed components are
    /// recorded for types whose removals are observed. Children linked to the
    /// entity get their `ChildOf` marked changed, since their link now
    /// resolves to no parent.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if self.entities.remove(entity).is_none() {
            return false;
        }
        for storage in self.storages.values_mut() {
            storage.remove_entity(entity);
        }

        let orphans: Vec<Entity> = self
            .storage::<ChildOf>()
            .map(|links| {
                links
                    .iter()
                    .filter(|(_, link)| link.parent == entity)
                    .map(|(child, _)| child)
                    .collect()
            })
            .unwrap_or_default();
        for child in orphans {
            self.mark_dirty::<ChildOf>(child);
        }
        true
    }

    /// Check whether the handle still refers to a live entity
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterate live entities in storage order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys()
    }

    /// Add or replace a component on a live entity
    ///
    /// Returns the previous value. Inserting onto a dead entity is ignored
    /// and hands the component back.
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> Option<T> {
        if !self.is_alive(entity) {
            log::warn!("Ignoring {} insert on dead entity {:?}", std::any::type_name::<T>(), entity);
            return Some(component);
        }
        if T::TRACK_CHANGES {
            self.mark_dirty::<T>(entity);
        }
        self.storage_or_default::<T>().insert(entity, component)
    }

    /// Remove a component from an entity
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let removed = self.storage_mut::<T>()?.remove(entity)?;
        if T::TRACK_CHANGES && self.is_alive(entity) {
            self.mark_dirty::<T>(entity);
        }
        Some(removed)
    }

    /// Get a component from an entity
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    /// Get a mutable component from an entity, marking it changed if tracked
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        if T::TRACK_CHANGES && self.has::<T>(entity) {
            self.mark_dirty::<T>(entity);
        }
        self.storage_mut::<T>()?.get_mut(entity)
    }

    /// Check whether an entity has a component
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.has_type(TypeId::of::<T>(), entity)
    }

    /// Mark a component type as changed on an entity
    pub fn mark_dirty<T: Component>(&mut self, entity: Entity) {
        if self.is_alive(entity) {
            self.storage_or_default::<Dirty<T>>().insert(entity, Dirty::new());
        }
    }

    /// Check whether an entity carries a change marker for `T`
    pub fn is_dirty<T: Component>(&self, entity: Entity) -> bool {
        self.has::<Dirty<T>>(entity)
    }

    /// Drop every change marker for `T`
    pub fn clear_dirty<T: Component>(&mut self) {
        if let Some(storage) = self.storage_mut::<Dirty<T>>() {
            storage.clear();
        }
    }

    /// Start recording removals of `T`, including those caused by despawn
    pub fn observe_removals<T: Component + Clone>(&mut self) {
        self.storage_or_default::<T>().observe_removals();
    }

    /// Number of recorded removals of `T` not yet drained
    pub fn pending_removals<T: Component>(&self) -> usize {
        self.storage::<T>().map_or(0, ComponentStorage::pending_removals)
    }

    /// Take recorded removals of `T`
    pub fn drain_removed<T: Component>(&mut self) -> Vec<(Entity, T)> {
        self.storage_mut::<T>()
            .map(ComponentStorage::drain_removed)
            .unwrap_or_default()
    }

    /// Start a filter query
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    /// Typed storage, if any component of this type was ever inserted
    pub fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any().downcast_ref())
    }

    fn storage_mut<T: Component>(&mut self) -> Option<&mut ComponentStorage<T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any_mut().downcast_mut())
    }

    fn storage_or_default<T: Component>(&mut self) -> &mut ComponentStorage<T> {
        let storage = self
            .storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(ComponentStorage::<T>::new()));
        match storage.as_any_mut().downcast_mut() {
            Some(typed) => typed,
            None => unreachable!("storage registered under a foreign TypeId"),
        }
    }

    pub(super) fn has_type(&self, type_id: TypeId, entity: Entity) -> bool {
        self.storages
            .get(&type_id)
            .is_some_and(|storage| storage.contains(entity))
    }

    pub(super) fn type_len(&self, type_id: TypeId) -> usize {
        self.storages.get(&type_id).map_or(0, |storage| storage.len())
    }
}
