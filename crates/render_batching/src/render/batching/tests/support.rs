//! Shared fixtures for pipeline scenarios

use crate::core::config::BatchingConfig;
use crate::ecs::components::{MaterialId, MeshId, RenderComponent, ShaderId, TransformComponent};
use crate::ecs::{Entity, World};
use crate::foundation::math::Vec3;
use crate::render::batching::{BatchingContext, BatchingPipeline, Slot};
use crate::render::memory::HostMemory;

pub fn render(shader: u32, material: u32, mesh: u32) -> RenderComponent {
    RenderComponent::new(ShaderId(shader), MaterialId(material), MeshId(mesh))
}

pub fn pipeline_with(config: BatchingConfig, world: &mut World) -> BatchingPipeline<HostMemory> {
    crate::foundation::logging::init_for_tests();
    let context = BatchingContext::new(config).unwrap();
    BatchingPipeline::new(HostMemory::new(), context, world).unwrap()
}

pub fn small_pipeline(world: &mut World) -> BatchingPipeline<HostMemory> {
    pipeline_with(
        BatchingConfig::new().with_initial_capacity(2).with_worker_threads(1),
        world,
    )
}

pub fn spawn_renderable(world: &mut World, render: RenderComponent, position: Vec3) -> Entity {
    let entity = world.spawn();
    world.insert(entity, render);
    world.insert(entity, TransformComponent::from_position(position));
    entity
}

pub fn slot_of(world: &World, entity: Entity) -> Slot {
    world
        .get::<crate::ecs::components::BatchMembership>(entity)
        .map(|membership| membership.slot)
        .unwrap()
}
