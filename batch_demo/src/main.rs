//! Headless batching demo
//!
//! Drives the batching pipeline over a synthetic scene with entity churn,
//! moving parents and material swaps, using host memory in place of a GPU.
//!
//! Usage: `batch_demo [config.toml|config.ron]`

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use render_batching::foundation::logging;
use render_batching::prelude::*;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("batching error: {0}")]
    Batch(#[from] BatchError),
}

struct Scene {
    config: DemoConfig,
    rng: StdRng,
    renderables: Vec<Entity>,
    anchors: Vec<Entity>,
}

impl Scene {
    fn new(config: DemoConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            renderables: Vec::new(),
            anchors: Vec::new(),
        }
    }

    fn random_render(&mut self) -> RenderComponent {
        RenderComponent::new(
            ShaderId(self.rng.gen_range(0..self.config.shader_variety)),
            MaterialId(self.rng.gen_range(0..self.config.material_variety)),
            MeshId(self.rng.gen_range(0..self.config.mesh_variety)),
        )
        .with_static(self.rng.gen_bool(0.2))
    }

    fn random_position(&mut self) -> Vec3 {
        Vec3::new(
            self.rng.gen_range(-100.0..100.0),
            self.rng.gen_range(-100.0..100.0),
            self.rng.gen_range(-100.0..100.0),
        )
    }

    /// Transform-only entities that renderables hang off
    fn spawn_anchors(&mut self, world: &mut World, count: usize) {
        for _ in 0..count {
            let anchor = world.spawn();
            let position = self.random_position();
            world.insert(anchor, TransformComponent::from_position(position));
            self.anchors.push(anchor);
        }
    }

    fn spawn_renderable(&mut self, world: &mut World) {
        let entity = world.spawn();
        let render = self.random_render();
        let position = self.random_position();
        world.insert(entity, render);
        world.insert(entity, TransformComponent::from_position(position).with_uniform_scale(0.5));

        if self.rng.gen::<f32>() < self.config.parented_fraction {
            if let Some(anchor) = self.anchors.choose(&mut self.rng) {
                world.insert(entity, ChildOf::new(*anchor));
            }
        }
        self.renderables.push(entity);
    }

    fn churn(&mut self, world: &mut World) {
        for _ in 0..self.config.churn_per_frame {
            if self.renderables.is_empty() {
                break;
            }
            let index = self.rng.gen_range(0..self.renderables.len());
            world.despawn(self.renderables.swap_remove(index));
        }
        for _ in 0..self.config.churn_per_frame {
            self.spawn_renderable(world);
        }
    }

    fn animate(&mut self, world: &mut World, frame: u32) {
        // Move one anchor per frame so its whole subtree is rewritten
        if !self.anchors.is_empty() {
            let anchor = self.anchors[frame as usize % self.anchors.len()];
            if let Some(transform) = world.get_mut::<TransformComponent>(anchor) {
                transform.rotation = Quat::from_axis_angle(&Vec3::y_axis(), frame as f32 * 0.05);
            }
        }

        // Occasional material swaps exercise regrouping
        if frame % 10 == 0 {
            if let Some(entity) = self.renderables.choose(&mut self.rng).copied() {
                let material = MaterialId(self.rng.gen_range(0..self.config.material_variety));
                if let Some(render) = world.get_mut::<RenderComponent>(entity) {
                    render.material = material;
                }
            }
        }
    }
}

fn load_config() -> Result<DemoConfig, DemoError> {
    let config = match std::env::args().nth(1) {
        Some(path) => DemoConfig::load_from_file(&path)?,
        None => DemoConfig::default(),
    };
    config
        .validate()
        .map_err(|reason| DemoError::Config(ConfigError::Invalid(reason)))?;
    Ok(config)
}

fn run() -> Result<(), DemoError> {
    let config = load_config()?;
    logging::init_with_level(&config.log_level);
    log::info!("Starting batch demo: {} frames, {} initial renderables", config.frames, config.initial_entities);

    let mut world = World::new();
    let context = BatchingContext::new(config.batching.clone())?;
    let memory = HostMemory::new();
    let mut pipeline = BatchingPipeline::new(memory.clone(), context, &mut world)?;

    let frames = config.frames;
    let initial = config.initial_entities;
    let mut scene = Scene::new(config);
    scene.spawn_anchors(&mut world, 16);
    for _ in 0..initial {
        scene.spawn_renderable(&mut world);
    }

    let mut busiest = Duration::ZERO;
    let mut total_written = 0u64;
    for frame in 0..frames {
        if frame > 0 {
            scene.churn(&mut world);
        }
        scene.animate(&mut world, frame);

        let stats = pipeline.execute(&mut world)?;
        busiest = busiest.max(stats.timings.total());
        total_written += u64::from(stats.transforms_written);

        if let Some(change) = stats.capacity_change {
            log::info!("Frame {}: capacity {} -> {}", stats.frame, change.old, change.new);
        }
        if stats.frame % 30 == 0 {
            log::info!(
                "Frame {}: {} live, {} draws, {} transforms written, {:?}",
                stats.frame,
                stats.live,
                pipeline.draw_batches().len(),
                stats.transforms_written,
                stats.timings
            );
        }
    }

    let non_empty = pipeline.render_groups().iter().filter(|(_, count)| *count > 0).count();
    log::info!(
        "Done: {} live renderables in {} draws ({} groups ever created), {} transform writes, slowest frame {:?}",
        pipeline.slots().live_count(),
        non_empty,
        pipeline.render_groups().len(),
        total_written,
        busiest
    );
    log::info!(
        "Host memory: {} bytes held, {} allocations, {} resize copies, {} flushes",
        memory.stats().allocated_bytes(),
        memory.stats().allocations(),
        memory.stats().copies(),
        memory.stats().flushes()
    );
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        // Logger may not be up if configuration failed
        eprintln!("batch_demo failed: {err}");
        std::process::exit(1);
    }
}
