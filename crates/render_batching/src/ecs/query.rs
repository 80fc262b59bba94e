//! Query system for component access
//!
//! Queries filter entities by component presence. Matching is evaluated
//! against the world at iteration time; queries borrow the world immutably,
//! so callers collect entities before mutating.

use std::any::TypeId;

use super::parallel::WorkerPool;
use super::{Component, Entity, World};

/// Filter over entities by required and excluded component types
pub struct Query<'w> {
    world: &'w World,
    with: Vec<TypeId>,
    without: Vec<TypeId>,
}

impl<'w> Query<'w> {
    /// Create a query matching every live entity
    pub fn new(world: &'w World) -> Self {
        Self {
            world,
            with: Vec::new(),
            without: Vec::new(),
        }
    }

    /// Require component `T`
    pub fn with<T: Component>(mut self) -> Self {
        self.with.push(TypeId::of::<T>());
        self
    }

    /// Exclude entities that have component `T`
    pub fn without<T: Component>(mut self) -> Self {
        self.without.push(TypeId::of::<T>());
        self
    }

    /// Check a single entity against the filter
    pub fn matches(&self, entity: Entity) -> bool {
        self.world.is_alive(entity)
            && self.with.iter().all(|ty| self.world.has_type(*ty, entity))
            && !self.without.iter().any(|ty| self.world.has_type(*ty, entity))
    }

    /// Iterate matching entities in storage order
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        // A required type nobody stores can never match
        let impossible = self.with.iter().any(|ty| self.world.type_len(*ty) == 0);
        self.world
            .entities()
            .filter(move |entity| !impossible && self.matches(*entity))
    }

    /// Collect matching entities
    pub fn entities(&self) -> Vec<Entity> {
        self.iter().collect()
    }

    /// Count matching entities
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Whether at least one entity matches
    pub fn any(&self) -> bool {
        self.iter().next().is_some()
    }

    /// Run `f` for every matching entity on the calling thread
    pub fn for_each(&self, mut f: impl FnMut(&World, Entity)) {
        for entity in self.iter() {
            f(self.world, entity);
        }
    }

    /// Split matching entities across the worker pool
    ///
    /// Each worker receives a disjoint chunk and its own output buffer; the
    /// buffers are returned in chunk order for the caller to merge.
    pub fn par_map_chunks<R, F>(&self, pool: &WorkerPool, f: F) -> Vec<Vec<R>>
    where
        R: Send,
        F: Fn(&World, &[Entity], &mut Vec<R>) + Sync,
    {
        let entities = self.entities();
        let world = self.world;
        pool.map_chunks(&entities, |chunk, out| f(world, chunk, out))
    }
}
