//! Transform writes, hierarchy and write policy

use approx::assert_relative_eq;

use super::support::*;
use crate::core::config::BatchingConfig;
use crate::ecs::components::{ChildOf, TransformComponent};
use crate::ecs::World;
use crate::foundation::math::{Quat, Vec3};
use crate::render::batching::{Slot, TransformResolver};

#[test]
fn test_parent_chain_written_to_child_slot() {
    let mut world = World::new();
    let mut pipeline = small_pipeline(&mut world);

    let root_transform = TransformComponent::from_transform(
        Vec3::new(10.0, 0.0, 0.0),
        Quat::from_axis_angle(&Vec3::y_axis(), 1.0),
        Vec3::new(2.0, 2.0, 2.0),
    );
    let root = world.spawn();
    world.insert(root, root_transform.clone());

    let pivot = world.spawn();
    world.insert(pivot, ChildOf::new(root));

    let leaf = spawn_renderable(&mut world, render(0, 0, 0), Vec3::new(0.0, 1.0, 0.0));
    world.insert(leaf, ChildOf::new(pivot));

    pipeline.execute(&mut world).unwrap();

    let written = pipeline.transforms()[slot_of(&world, leaf).index()].to_matrix();
    let local = TransformComponent::from_position(Vec3::new(0.0, 1.0, 0.0)).to_matrix();
    assert_relative_eq!(written, root_transform.to_matrix() * local, epsilon = 1e-5);
}

#[test]
fn test_only_dirty_chains_are_rewritten() {
    let mut world = World::new();
    let mut pipeline = small_pipeline(&mut world);

    let parent = world.spawn();
    world.insert(parent, TransformComponent::identity());
    let child = spawn_renderable(&mut world, render(0, 0, 0), Vec3::zeros());
    world.insert(child, ChildOf::new(parent));
    let bystander = spawn_renderable(&mut world, render(0, 0, 0), Vec3::zeros());

    let stats = pipeline.execute(&mut world).unwrap();
    assert_eq!(stats.transforms_written, 2);

    if let Some(transform) = world.get_mut::<TransformComponent>(parent) {
        transform.position = Vec3::new(0.0, 5.0, 0.0);
    }
    let stats = pipeline.execute(&mut world).unwrap();

    assert_eq!(stats.transforms_written, 1);
    assert_eq!(pipeline.changed_slots(), &[slot_of(&world, child)]);
    assert!(!pipeline.changed_slots().contains(&slot_of(&world, bystander)));
    assert_eq!(
        pipeline.transforms()[slot_of(&world, child).index()].model[3],
        [0.0, 5.0, 0.0, 1.0]
    );
}

#[test]
fn test_despawned_parent_falls_back_to_local() {
    let mut world = World::new();
    let mut pipeline = small_pipeline(&mut world);
    let parent = world.spawn();
    world.insert(parent, TransformComponent::from_position(Vec3::new(7.0, 0.0, 0.0)));
    let child = spawn_renderable(&mut world, render(0, 0, 0), Vec3::new(1.0, 0.0, 0.0));
    world.insert(child, ChildOf::new(parent));
    pipeline.execute(&mut world).unwrap();

    assert_eq!(
        pipeline.transforms()[slot_of(&world, child).index()].model[3],
        [8.0, 0.0, 0.0, 1.0]
    );

    world.despawn(parent);
    let stats = pipeline.execute(&mut world).unwrap();

    assert_eq!(stats.transforms_written, 1);
    let written = pipeline.transforms()[slot_of(&world, child).index()];
    assert_eq!(written.model[3], [1.0, 0.0, 0.0, 1.0]);
    assert_relative_eq!(written.to_matrix(), TransformResolver::new(&world).world_matrix(child));
}

#[test]
fn test_force_writes_rewrites_every_slot() {
    let mut world = World::new();
    let mut pipeline = pipeline_with(
        BatchingConfig::new()
            .with_initial_capacity(8)
            .with_worker_threads(1)
            .with_force_transform_writes(true),
        &mut world,
    );
    for _ in 0..5 {
        spawn_renderable(&mut world, render(0, 0, 0), Vec3::zeros());
    }
    pipeline.execute(&mut world).unwrap();

    let stats = pipeline.execute(&mut world).unwrap();
    assert_eq!(stats.transforms_written, 5);
    assert_eq!(pipeline.changed_slots().len(), 5);
}

#[test]
fn test_parallel_matches_inline() {
    let build = |threads: usize| {
        let mut world = World::new();
        let mut pipeline = pipeline_with(
            BatchingConfig::new()
                .with_initial_capacity(64)
                .with_worker_threads(threads)
                .with_parallel_threshold(1),
            &mut world,
        );

        let mut previous = None;
        for i in 0..200u32 {
            let entity = spawn_renderable(
                &mut world,
                render(i % 4, i % 5, i % 3),
                Vec3::new(i as f32, (i % 7) as f32, 0.0),
            );
            if i % 3 == 0 {
                if let Some(parent) = previous {
                    world.insert(entity, ChildOf::new(parent));
                }
            }
            previous = Some(entity);
        }
        pipeline.execute(&mut world).unwrap();

        let resolver = TransformResolver::new(&world);
        let sample = previous.unwrap();
        let expected = resolver.world_matrix(sample);
        let written = pipeline.transforms()[slot_of(&world, sample).index()].to_matrix();
        assert_relative_eq!(written, expected, epsilon = 1e-4);

        (
            pipeline.indices().as_slice().to_vec(),
            pipeline.transforms().as_slice().to_vec(),
            pipeline.changed_slots().to_vec(),
        )
    };

    let inline = build(1);
    let parallel = build(4);
    assert_eq!(inline, parallel);
    assert_eq!(inline.2.len(), 200);
    assert!(!inline.2.contains(&Slot::SENTINEL));
}
