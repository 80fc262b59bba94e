//! Registration, removal and capacity growth

use super::support::*;
use crate::core::config::BatchingConfig;
use crate::ecs::components::{BatchMembership, RenderComponent};
use crate::ecs::World;
use crate::error::BatchError;
use crate::foundation::math::Vec3;
use crate::render::batching::{BatchingContext, BatchingPipeline, Slot};
use crate::render::memory::{GpuMemory, HostMemory, MemoryError};

#[test]
fn test_grow_remove_and_reuse_group() {
    let mut world = World::new();
    let mut pipeline = small_pipeline(&mut world);

    let a = spawn_renderable(&mut world, render(1, 1, 1), Vec3::zeros());
    let b = spawn_renderable(&mut world, render(1, 2, 1), Vec3::zeros());
    let c = spawn_renderable(&mut world, render(2, 1, 1), Vec3::zeros());

    let stats = pipeline.execute(&mut world).unwrap();
    assert_eq!(stats.added, 3);
    assert!(pipeline.slots().capacity() >= 4);
    assert_eq!(pipeline.slots().live_count(), 3);
    assert!(stats.capacity_change.is_some());
    assert_eq!(pipeline.render_groups().len(), 3);
    assert!(pipeline.render_groups().iter().all(|(_, count)| *count == 1));

    let removed_group = world.get::<BatchMembership>(b).unwrap().group;
    world.remove::<RenderComponent>(b);
    let stats = pipeline.execute(&mut world).unwrap();
    assert_eq!(stats.removed, 1);
    assert!(!world.has::<BatchMembership>(b));
    assert_eq!(pipeline.slots().free_count(), 1);
    assert_eq!(pipeline.context().groups().count(removed_group), 0);
    assert_eq!(pipeline.render_groups().len(), 3);

    let d = spawn_renderable(&mut world, render(1, 2, 1), Vec3::zeros());
    pipeline.execute(&mut world).unwrap();
    assert_eq!(world.get::<BatchMembership>(d).unwrap().group, removed_group);
    assert_eq!(pipeline.context().groups().count(removed_group), 1);

    for entity in [a, c, d] {
        assert!(pipeline.slots().is_live(slot_of(&world, entity)));
    }
}

#[test]
fn test_despawn_releases_slot() {
    let mut world = World::new();
    let mut pipeline = small_pipeline(&mut world);
    let entity = spawn_renderable(&mut world, render(0, 0, 0), Vec3::zeros());
    pipeline.execute(&mut world).unwrap();
    let slot = slot_of(&world, entity);

    world.despawn(entity);
    let stats = pipeline.execute(&mut world).unwrap();

    assert_eq!(stats.removed, 1);
    assert!(!pipeline.slots().is_live(slot));
    assert_eq!(pipeline.slots().live_count(), 0);
    assert!(pipeline.draw_batches().is_empty());
}

#[test]
fn test_slots_partition_capacity() {
    let mut world = World::new();
    let mut pipeline = small_pipeline(&mut world);
    let mut entities: Vec<_> = (0..20)
        .map(|i| spawn_renderable(&mut world, render(i % 3, 0, 0), Vec3::zeros()))
        .collect();
    pipeline.execute(&mut world).unwrap();

    for entity in entities.drain(..7) {
        world.despawn(entity);
    }
    for i in 0..4 {
        entities.push(spawn_renderable(&mut world, render(i, 1, 0), Vec3::zeros()));
    }
    pipeline.execute(&mut world).unwrap();

    let slots = pipeline.slots();
    assert_eq!(slots.free_count() + slots.live_count(), slots.capacity() - 1);
    assert_eq!(slots.live_count() as usize, entities.len());

    let mut owned: Vec<Slot> = entities.iter().map(|e| slot_of(&world, *e)).collect();
    owned.sort();
    owned.dedup();
    assert_eq!(owned.len(), entities.len());
    assert!(owned.iter().all(|slot| *slot != Slot::SENTINEL && slot.0 < slots.capacity()));
}

#[test]
fn test_same_frame_removals_cover_additions() {
    let mut world = World::new();
    let mut pipeline = small_pipeline(&mut world);
    let mut entities: Vec<_> = (0..7)
        .map(|i| spawn_renderable(&mut world, render(i % 2, 0, 0), Vec3::zeros()))
        .collect();
    pipeline.execute(&mut world).unwrap();
    let capacity = pipeline.slots().capacity();
    assert_eq!(pipeline.slots().free_count(), capacity - 1 - 7);

    for entity in entities.drain(..3) {
        world.despawn(entity);
    }
    for _ in 0..2 {
        entities.push(spawn_renderable(&mut world, render(0, 0, 0), Vec3::zeros()));
    }
    let stats = pipeline.execute(&mut world).unwrap();

    assert_eq!(stats.capacity_change, None);
    assert_eq!(pipeline.slots().capacity(), capacity);
    assert_eq!(stats.removed, 3);
    assert_eq!(stats.added, 2);
    assert_eq!(pipeline.slots().live_count(), 6);
}

#[test]
fn test_configured_fence_timeout_reaches_backend() {
    let mut world = World::new();
    let config = BatchingConfig {
        fence_timeout_ms: Some(250),
        ..BatchingConfig::new().with_initial_capacity(2)
    };
    let pipeline = pipeline_with(config, &mut world);
    assert_eq!(pipeline.memory().fence_timeout_ns(), 250_000_000);

    let mut world = World::new();
    let context = BatchingContext::new(BatchingConfig::new().with_initial_capacity(2)).unwrap();
    let memory = HostMemory::new().with_fence_timeout(42);
    let pipeline = BatchingPipeline::new(memory, context, &mut world).unwrap();
    assert_eq!(pipeline.memory().fence_timeout_ns(), 42);
}

#[test]
fn test_growth_preserves_live_transforms() {
    let mut world = World::new();
    let mut pipeline = small_pipeline(&mut world);
    let first = spawn_renderable(&mut world, render(0, 0, 0), Vec3::new(3.0, 0.0, 0.0));
    pipeline.execute(&mut world).unwrap();
    let slot = slot_of(&world, first);

    for _ in 0..9 {
        spawn_renderable(&mut world, render(0, 0, 0), Vec3::zeros());
    }
    let stats = pipeline.execute(&mut world).unwrap();

    assert_eq!(stats.capacity_change.map(|change| change.new), Some(16));
    assert_eq!(pipeline.transforms().capacity(), 16);
    assert_eq!(pipeline.indices().capacity(), 16);
    // Not rewritten this frame, so the value survived the copy
    assert!(!pipeline.changed_slots().contains(&slot));
    assert_eq!(pipeline.transforms()[slot.index()].model[3], [3.0, 0.0, 0.0, 1.0]);
}

#[test]
fn test_allocation_failure_aborts_frame() {
    let mut world = World::new();
    let config = BatchingConfig::new().with_initial_capacity(2).with_worker_threads(1);
    let context = BatchingContext::new(config).unwrap();
    // Room for the two initial arrays (8 + 128 bytes) and nothing more
    let mut pipeline = BatchingPipeline::new(HostMemory::with_limit(160), context, &mut world).unwrap();

    for _ in 0..3 {
        spawn_renderable(&mut world, render(0, 0, 0), Vec3::zeros());
    }
    let result = pipeline.execute(&mut world);
    assert!(matches!(
        result,
        Err(BatchError::Memory(MemoryError::OutOfMemory { .. }))
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let result = BatchingContext::new(BatchingConfig::new().with_initial_capacity(3));
    assert!(matches!(result, Err(BatchError::InvalidConfig { .. })));
}
