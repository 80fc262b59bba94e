//! Hierarchical transform resolution
//!
//! An entity's world matrix is the product of every local transform found
//! while walking its `ChildOf` chain, root first. Links to entities without
//! a transform contribute nothing, so a child of a transform-less node
//! inherits the nearest transformed ancestor's world matrix wholesale.
//!
//! A link whose parent has been despawned reads as "no parent". Cyclic
//! chains are a caller error and are not detected.

use crate::ecs::components::{ChildOf, TransformComponent};
use crate::ecs::{Entity, World};
use crate::foundation::math::Mat4;

/// Read-only resolver over a world's transform hierarchy
#[derive(Clone, Copy)]
pub struct TransformResolver<'w> {
    world: &'w World,
}

impl<'w> TransformResolver<'w> {
    /// Create a resolver
    pub fn new(world: &'w World) -> Self {
        Self { world }
    }

    /// Live parent of `entity`, if any
    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        self.world
            .get::<ChildOf>(entity)
            .map(|link| link.parent)
            .filter(|parent| self.world.is_alive(*parent))
    }

    /// Local matrix of `entity`, if it owns a transform
    pub fn local_matrix(&self, entity: Entity) -> Option<Mat4> {
        self.world
            .get::<TransformComponent>(entity)
            .map(TransformComponent::to_matrix)
    }

    /// World matrix of `entity`
    pub fn world_matrix(&self, entity: Entity) -> Mat4 {
        let mut world = Mat4::identity();
        for node in self.ancestry(entity) {
            if let Some(local) = self.local_matrix(node) {
                world = local * world;
            }
        }
        world
    }

    /// Whether any transform or link on the chain changed since the last clear
    pub fn chain_dirty(&self, entity: Entity) -> bool {
        self.ancestry(entity).any(|node| {
            self.world.is_dirty::<TransformComponent>(node) || self.world.is_dirty::<ChildOf>(node)
        })
    }

    /// `entity` followed by its live ancestors, nearest first
    pub fn ancestry(&self, entity: Entity) -> impl Iterator<Item = Entity> + '_ {
        let start = self.world.is_alive(entity).then_some(entity);
        std::iter::successors(start, move |node| self.parent(*node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Dirty;
    use crate::foundation::math::{Quat, Vec3};
    use approx::assert_relative_eq;

    fn spawn_with(world: &mut World, transform: Option<TransformComponent>, parent: Option<Entity>) -> Entity {
        let entity = world.spawn();
        if let Some(transform) = transform {
            world.insert(entity, transform);
        }
        if let Some(parent) = parent {
            world.insert(entity, ChildOf::new(parent));
        }
        entity
    }

    #[test]
    fn test_root_uses_local() {
        let mut world = World::new();
        let transform = TransformComponent::from_position(Vec3::new(1.0, 2.0, 3.0));
        let root = spawn_with(&mut world, Some(transform.clone()), None);

        let resolver = TransformResolver::new(&world);
        assert_relative_eq!(resolver.world_matrix(root), transform.to_matrix());
    }

    #[test]
    fn test_no_transform_is_identity() {
        let mut world = World::new();
        let lone = spawn_with(&mut world, None, None);
        let parentless_chain = spawn_with(&mut world, None, Some(lone));

        let resolver = TransformResolver::new(&world);
        assert_relative_eq!(resolver.world_matrix(lone), Mat4::identity());
        assert_relative_eq!(resolver.world_matrix(parentless_chain), Mat4::identity());
    }

    #[test]
    fn test_skips_transformless_link() {
        let mut world = World::new();
        let a_transform = TransformComponent::from_transform(
            Vec3::new(5.0, 0.0, 0.0),
            Quat::from_axis_angle(&Vec3::z_axis(), 0.5),
            Vec3::new(2.0, 2.0, 2.0),
        );
        let c_transform = TransformComponent::from_position(Vec3::new(0.0, 1.0, 0.0));

        let a = spawn_with(&mut world, Some(a_transform.clone()), None);
        let b = spawn_with(&mut world, None, Some(a));
        let c = spawn_with(&mut world, Some(c_transform.clone()), Some(b));

        let resolver = TransformResolver::new(&world);
        assert_relative_eq!(resolver.world_matrix(b), a_transform.to_matrix(), epsilon = 1e-6);
        assert_relative_eq!(
            resolver.world_matrix(c),
            a_transform.to_matrix() * c_transform.to_matrix(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_stale_parent_is_no_parent() {
        let mut world = World::new();
        let parent = spawn_with(&mut world, Some(TransformComponent::from_position(Vec3::new(9.0, 0.0, 0.0))), None);
        let child_transform = TransformComponent::from_position(Vec3::new(1.0, 0.0, 0.0));
        let child = spawn_with(&mut world, Some(child_transform.clone()), Some(parent));

        world.despawn(parent);
        // Reuse the index so the stale handle would alias if generations were ignored
        let _reuse = spawn_with(&mut world, Some(TransformComponent::from_position(Vec3::new(100.0, 0.0, 0.0))), None);

        let resolver = TransformResolver::new(&world);
        assert_eq!(resolver.parent(child), None);
        assert_relative_eq!(resolver.world_matrix(child), child_transform.to_matrix());
    }

    #[test]
    fn test_chain_dirty_sees_ancestors() {
        let mut world = World::new();
        let root = spawn_with(&mut world, Some(TransformComponent::identity()), None);
        let middle = spawn_with(&mut world, None, Some(root));
        let leaf = spawn_with(&mut world, Some(TransformComponent::identity()), Some(middle));
        let other = spawn_with(&mut world, Some(TransformComponent::identity()), None);
        world.clear_dirty::<TransformComponent>();
        world.clear_dirty::<ChildOf>();

        assert!(!TransformResolver::new(&world).chain_dirty(leaf));

        if let Some(transform) = world.get_mut::<TransformComponent>(root) {
            transform.position.x = 1.0;
        }
        let resolver = TransformResolver::new(&world);
        assert!(resolver.chain_dirty(leaf));
        assert!(resolver.chain_dirty(middle));
        assert!(!resolver.chain_dirty(other));
        assert!(world.has::<Dirty<TransformComponent>>(root));
    }

    #[test]
    fn test_reparent_marks_chain_dirty() {
        let mut world = World::new();
        let first = spawn_with(&mut world, Some(TransformComponent::identity()), None);
        let second = spawn_with(&mut world, Some(TransformComponent::identity()), None);
        let child = spawn_with(&mut world, Some(TransformComponent::identity()), Some(first));
        world.clear_dirty::<TransformComponent>();
        world.clear_dirty::<ChildOf>();

        world.insert(child, ChildOf::new(second));
        assert!(TransformResolver::new(&world).chain_dirty(child));
    }
}
