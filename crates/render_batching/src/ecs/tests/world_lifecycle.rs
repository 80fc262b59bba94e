//! Entity lifecycle, queries and removal notifications

use crate::ecs::components::{BatchMembership, ChildOf, MaterialId, MeshId, RenderComponent, ShaderId, TransformComponent};
use crate::ecs::{World, WorkerPool};
use crate::render::batching::{RenderGroup, Slot};

fn render() -> RenderComponent {
    RenderComponent::new(ShaderId(0), MaterialId(0), MeshId(0))
}

#[test]
fn test_despawn_invalidates_handle() {
    let mut world = World::new();
    let entity = world.spawn();
    world.insert(entity, render());

    assert!(world.despawn(entity));
    assert!(!world.is_alive(entity));
    assert!(!world.despawn(entity));
    assert!(world.get::<RenderComponent>(entity).is_none());

    // The index is reused, the old handle stays dead
    let reused = world.spawn();
    assert_ne!(reused, entity);
    assert!(!world.is_alive(entity));
    assert!(!world.has::<RenderComponent>(reused));
}

#[test]
fn test_insert_on_dead_entity_is_returned() {
    let mut world = World::new();
    let entity = world.spawn();
    world.despawn(entity);

    assert_eq!(world.insert(entity, render()), Some(render()));
    assert_eq!(world.query().with::<RenderComponent>().count(), 0);
}

#[test]
fn test_query_with_without() {
    let mut world = World::new();
    let a = world.spawn();
    let b = world.spawn();
    let c = world.spawn();
    world.insert(a, render());
    world.insert(b, render());
    world.insert(b, BatchMembership::PLACEHOLDER);
    world.insert(c, BatchMembership::PLACEHOLDER);

    let unregistered = world.query().with::<RenderComponent>().without::<BatchMembership>().entities();
    assert_eq!(unregistered, vec![a]);

    let departed = world.query().with::<BatchMembership>().without::<RenderComponent>().entities();
    assert_eq!(departed, vec![c]);

    assert!(world.query().with::<RenderComponent>().with::<BatchMembership>().any());
    assert!(!world.query().with::<ChildOf>().any());
}

#[test]
fn test_observed_removals_include_despawn() {
    let mut world = World::new();
    world.observe_removals::<BatchMembership>();

    let membership = BatchMembership { slot: Slot(3), group: RenderGroup(1) };
    let kept = world.spawn();
    let despawned = world.spawn();
    let stripped = world.spawn();
    for entity in [kept, despawned, stripped] {
        world.insert(entity, membership);
    }

    world.despawn(despawned);
    assert_eq!(world.remove::<BatchMembership>(stripped), Some(membership));
    assert_eq!(world.pending_removals::<BatchMembership>(), 2);

    let removed = world.drain_removed::<BatchMembership>();
    assert_eq!(removed, vec![(despawned, membership), (stripped, membership)]);
    assert_eq!(world.pending_removals::<BatchMembership>(), 0);
}

#[test]
fn test_unobserved_removals_are_not_recorded() {
    let mut world = World::new();
    let entity = world.spawn();
    world.insert(entity, TransformComponent::identity());
    world.despawn(entity);

    assert!(world.drain_removed::<TransformComponent>().is_empty());
}

#[test]
fn test_par_map_chunks_matches_inline() {
    let mut world = World::new();
    for _ in 0..37 {
        let entity = world.spawn();
        world.insert(entity, render());
    }
    let pool = WorkerPool::new(4);

    let query = world.query().with::<RenderComponent>();
    let parallel: Vec<_> = query
        .par_map_chunks(&pool, |_, chunk, out| out.extend_from_slice(chunk))
        .into_iter()
        .flatten()
        .collect();

    let mut inline = Vec::new();
    query.for_each(|_, entity| inline.push(entity));

    assert_eq!(parallel, inline);
    assert_eq!(parallel.len(), 37);
}
