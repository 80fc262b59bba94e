//! Instance batching pipeline
//!
//! Keeps two GPU arrays consistent with the world's live renderables:
//!
//! - the **index array**, slot numbers sorted so that every render group
//!   occupies one contiguous range, and
//! - the **transform array**, one world matrix per slot.
//!
//! Each call to [`BatchingPipeline::execute`] runs these passes in order,
//! each a full barrier before the next:
//!
//! 1. capacity check, growing both arrays before any slot is handed out
//! 2. remove: renderables that lost their `RenderComponent` or were despawned
//! 3. add: renderables seen for the first time get a slot and a group
//! 4. change: renderables whose `RenderComponent` changed move group
//! 5. sort-write: prefix sums over group counts place every slot
//! 6. transform-write: dirty (or newly added) slots get their world matrix
//!
//! Only transform resolution runs on worker threads. Workers fill private
//! `(slot, matrix)` buffers that this thread merges and writes.

use crate::core::config::BatchingConfig;
use crate::ecs::components::{BatchMembership, ChildOf, RenderComponent, Signature, TransformComponent};
use crate::ecs::{Dirty, Entity, System, WorkerPool, World};
use crate::error::{BatchError, BatchResult};
use crate::foundation::math::Mat4;
use crate::foundation::time::{PassTimings, Stopwatch};
use crate::render::memory::{BufferUsage, GpuMemory};

use super::gpu_array::{BufferBinding, GpuTransform, GrowableGpuArray};
use super::hierarchy::TransformResolver;
use super::render_groups::{RenderGroup, RenderGroupIndex};
use super::slot_allocator::{CapacityChange, Slot, SlotAllocator};

/// State shared by a pipeline that would otherwise be global
///
/// Owning the configuration and the group index here lets several
/// pipelines (one per world) coexist without touching each other.
#[derive(Debug)]
pub struct BatchingContext {
    config: BatchingConfig,
    groups: RenderGroupIndex,
}

impl BatchingContext {
    /// Validate `config` and create an empty context
    pub fn new(config: BatchingConfig) -> BatchResult<Self> {
        config
            .validate()
            .map_err(|reason| BatchError::InvalidConfig { reason })?;
        Ok(Self {
            config,
            groups: RenderGroupIndex::new(),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &BatchingConfig {
        &self.config
    }

    /// Render group index
    pub fn groups(&self) -> &RenderGroupIndex {
        &self.groups
    }
}

/// One contiguous run of the index array drawn with a single instanced call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawBatch {
    /// Group drawn
    pub group: RenderGroup,
    /// Shader, material and mesh of the group
    pub signature: Signature,
    /// First element of the index array
    pub first_instance: u32,
    /// Number of instances
    pub instance_count: u32,
}

/// Summary of one `execute` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Renderables registered this frame
    pub added: u32,
    /// Renderables unregistered this frame
    pub removed: u32,
    /// Renderables that moved to a different group
    pub regrouped: u32,
    /// Transform slots written
    pub transforms_written: u32,
    /// Live renderables after the frame
    pub live: u32,
    /// Growth applied before the passes ran
    pub capacity_change: Option<CapacityChange>,
    /// Wall-clock time per pass
    pub timings: PassTimings,
}

/// Per-frame batching of renderables into GPU index and transform arrays
pub struct BatchingPipeline<M: GpuMemory> {
    context: BatchingContext,
    slots: SlotAllocator,
    indices: GrowableGpuArray<u32, M>,
    transforms: GrowableGpuArray<GpuTransform, M>,
    pool: WorkerPool,
    forced: Vec<bool>,
    draw_batches: Vec<DrawBatch>,
    changed_slots: Vec<Slot>,
    frame: u64,
}

impl<M: GpuMemory> BatchingPipeline<M> {
    /// Allocate both arrays and start observing membership removals
    ///
    /// A configured fence timeout replaces the backend's own; otherwise the
    /// backend keeps whatever bound it was built with.
    pub fn new(memory: M, context: BatchingContext, world: &mut World) -> BatchResult<Self> {
        let memory = match context.config.fence_timeout_ms {
            Some(_) => memory.with_fence_timeout(context.config.fence_timeout_ns()),
            None => memory,
        };
        let capacity = context.config.initial_capacity;
        let slots = SlotAllocator::new(capacity);
        let indices = GrowableGpuArray::new(memory.clone(), capacity as usize, BufferUsage::STORAGE, "index")?;
        let mut transforms = GrowableGpuArray::new(
            memory,
            capacity as usize,
            BufferUsage::STORAGE | BufferUsage::VERTEX,
            "transform",
        )?;
        // The sentinel slot reads as identity for shaders that touch it
        transforms.write(Slot::SENTINEL.index(), GpuTransform::IDENTITY)?;
        transforms.flush_range(0, 1)?;

        let pool = WorkerPool::new(context.config.worker_threads);
        world.observe_removals::<BatchMembership>();

        log::info!(
            "Batching pipeline created: capacity {}, {} workers, force writes {}",
            capacity,
            pool.workers(),
            context.config.force_transform_writes
        );

        Ok(Self {
            context,
            slots,
            indices,
            transforms,
            pool,
            forced: vec![false; capacity as usize],
            draw_batches: Vec::new(),
            changed_slots: Vec::new(),
            frame: 0,
        })
    }

    /// Run every pass once
    ///
    /// An error leaves the frame incomplete; the arrays must not be drawn
    /// from until a later call succeeds.
    pub fn execute(&mut self, world: &mut World) -> BatchResult<FrameStats> {
        self.frame += 1;
        let mut stats = FrameStats {
            frame: self.frame,
            ..FrameStats::default()
        };
        let mut stopwatch = Stopwatch::start_new();

        stats.capacity_change = self.ensure_capacity(world)?;
        stats.timings.ensure_capacity = stopwatch.lap();

        stats.removed = self.remove_pass(world)?;
        stats.timings.remove = stopwatch.lap();

        stats.added = self.add_pass(world)?;
        stats.timings.add = stopwatch.lap();

        stats.regrouped = self.change_pass(world)?;
        stats.timings.change = stopwatch.lap();

        self.sort_write_pass(world)?;
        stats.timings.sort_write = stopwatch.lap();

        stats.transforms_written = self.transform_write_pass(world)?;
        stats.timings.transform_write = stopwatch.lap();

        world.clear_dirty::<RenderComponent>();
        world.clear_dirty::<TransformComponent>();
        world.clear_dirty::<ChildOf>();

        stats.live = self.slots.live_count();
        log::debug!(
            "Frame {}: +{} -{} ~{} renderables, {} transforms written, {} live, {} groups, {:?}",
            stats.frame,
            stats.added,
            stats.removed,
            stats.regrouped,
            stats.transforms_written,
            stats.live,
            self.context.groups.len(),
            stats.timings.total()
        );
        Ok(stats)
    }

    /// `(signature, count)` for every group in draw order, empty groups included
    pub fn render_groups(&self) -> Vec<(Signature, u32)> {
        self.context.groups.render_groups()
    }

    /// Non-empty groups with their index array ranges, from the last execute
    pub fn draw_batches(&self) -> &[DrawBatch] {
        &self.draw_batches
    }

    /// Slots whose transform was written by the last execute, ascending
    pub fn changed_slots(&self) -> &[Slot] {
        &self.changed_slots
    }

    /// Binding for the group-sorted index array
    pub fn index_binding(&self) -> BufferBinding {
        self.indices.binding()
    }

    /// Binding for the per-slot transform array
    pub fn transform_binding(&self) -> BufferBinding {
        self.transforms.binding()
    }

    /// Host view of the index array
    pub fn indices(&self) -> &GrowableGpuArray<u32, M> {
        &self.indices
    }

    /// Memory backend the arrays allocate from
    pub fn memory(&self) -> &M {
        self.transforms.memory()
    }

    /// Host view of the transform array
    pub fn transforms(&self) -> &GrowableGpuArray<GpuTransform, M> {
        &self.transforms
    }

    /// Slot allocator state
    pub fn slots(&self) -> &SlotAllocator {
        &self.slots
    }

    /// Shared context
    pub fn context(&self) -> &BatchingContext {
        &self.context
    }

    fn ensure_capacity(&mut self, world: &World) -> BatchResult<Option<CapacityChange>> {
        let additions = world
            .query()
            .with::<RenderComponent>()
            .without::<BatchMembership>()
            .count();
        let removals = world
            .query()
            .with::<BatchMembership>()
            .without::<RenderComponent>()
            .count()
            + world.pending_removals::<BatchMembership>();

        let change = self
            .slots
            .ensure_capacity(saturate(additions), saturate(removals));
        // Arrays follow the allocator, which also retries a resize that failed last frame
        let target = self.slots.capacity() as usize;
        if self.indices.capacity() < target {
            self.indices.resize(target)?;
        }
        if self.transforms.capacity() < target {
            self.transforms.resize(target)?;
        }
        if self.forced.len() < target {
            self.forced.resize(target, false);
        }
        Ok(change)
    }

    fn remove_pass(&mut self, world: &mut World) -> BatchResult<u32> {
        let departed = world
            .query()
            .with::<BatchMembership>()
            .without::<RenderComponent>()
            .entities();
        for entity in departed {
            // Recorded by the removal observer and released below
            world.remove::<BatchMembership>(entity);
        }

        let removed = world.drain_removed::<BatchMembership>();
        let mut count = 0;
        for (entity, membership) in removed {
            if !membership.is_assigned() {
                continue;
            }
            self.context.groups.remove(membership.group)?;
            self.slots.release(membership.slot)?;
            self.forced[membership.slot.index()] = false;
            log::trace!("Released slot {} from {:?}", membership.slot, entity);
            count += 1;
        }
        Ok(count)
    }

    fn add_pass(&mut self, world: &mut World) -> BatchResult<u32> {
        let arrivals = world
            .query()
            .with::<RenderComponent>()
            .without::<BatchMembership>()
            .entities();
        if arrivals.is_empty() {
            return Ok(0);
        }

        for entity in &arrivals {
            world.insert(*entity, BatchMembership::PLACEHOLDER);
        }

        for entity in &arrivals {
            let Some(signature) = world.get::<RenderComponent>(*entity).map(RenderComponent::signature) else {
                continue;
            };
            let slot = self.slots.acquire()?;
            let group = self.context.groups.add(signature);
            self.forced[slot.index()] = true;

            if let Some(membership) = world.get_mut::<BatchMembership>(*entity) {
                *membership = BatchMembership { slot, group };
            }
        }
        Ok(saturate(arrivals.len()))
    }

    fn change_pass(&mut self, world: &mut World) -> BatchResult<u32> {
        let changed = world
            .query()
            .with::<RenderComponent>()
            .with::<BatchMembership>()
            .with::<Dirty<RenderComponent>>()
            .entities();

        let mut regrouped = 0;
        for entity in changed {
            let (Some(render), Some(membership)) = (
                world.get::<RenderComponent>(entity),
                world.get::<BatchMembership>(entity),
            ) else {
                continue;
            };
            let old = membership.group;
            let new = self.context.groups.regroup(old, render.signature())?;
            if new != old {
                if let Some(membership) = world.get_mut::<BatchMembership>(entity) {
                    membership.group = new;
                }
                regrouped += 1;
            }
        }
        Ok(regrouped)
    }

    fn sort_write_pass(&mut self, world: &World) -> BatchResult<()> {
        let groups = &self.context.groups;
        let mut cursor = vec![0u32; groups.len()];
        let mut offset = 0u32;

        self.draw_batches.clear();
        for group in groups.iter_sorted() {
            let count = groups.count(group);
            cursor[group.index()] = offset;
            if count > 0 {
                if let Some(signature) = groups.signature(group) {
                    self.draw_batches.push(DrawBatch {
                        group,
                        signature,
                        first_instance: offset,
                        instance_count: count,
                    });
                }
            }
            offset += count;
        }

        let members = world.query().with::<BatchMembership>();
        for entity in members.iter() {
            let Some(membership) = world.get::<BatchMembership>(entity) else {
                continue;
            };
            let position = cursor
                .get_mut(membership.group.index())
                .ok_or(BatchError::UnknownGroup { group: membership.group })?;
            self.indices.write(*position as usize, membership.slot.0)?;
            *position += 1;
        }

        self.indices.flush_range(0, offset as usize)
    }

    fn transform_write_pass(&mut self, world: &World) -> BatchResult<u32> {
        let force_all = self.context.config.force_transform_writes;
        let forced = &self.forced;
        let resolve = |world: &World, chunk: &[Entity], out: &mut Vec<(Slot, Mat4)>| {
            let resolver = TransformResolver::new(world);
            for entity in chunk {
                let Some(membership) = world.get::<BatchMembership>(*entity) else {
                    continue;
                };
                let slot = membership.slot;
                if force_all || forced[slot.index()] || resolver.chain_dirty(*entity) {
                    out.push((slot, resolver.world_matrix(*entity)));
                }
            }
        };

        let query = world.query().with::<BatchMembership>();
        let live = self.slots.live_count() as usize;
        let buffers = if self.pool.workers() > 1 && live >= self.context.config.parallel_threshold {
            query.par_map_chunks(&self.pool, resolve)
        } else {
            let mut out = Vec::new();
            resolve(world, &query.entities(), &mut out);
            vec![out]
        };

        let mut writes: Vec<(Slot, Mat4)> = buffers.into_iter().flatten().collect();
        writes.sort_unstable_by_key(|(slot, _)| *slot);

        self.changed_slots.clear();
        for (slot, matrix) in &writes {
            self.transforms.write(slot.index(), GpuTransform::from_matrix(matrix))?;
            self.changed_slots.push(*slot);
        }
        self.flush_changed_transforms()?;

        self.forced.fill(false);
        Ok(saturate(writes.len()))
    }

    /// Flush runs of consecutive changed slots as single ranges
    fn flush_changed_transforms(&self) -> BatchResult<()> {
        let mut slots = self.changed_slots.iter().map(|slot| slot.index());
        let Some(first) = slots.next() else {
            return Ok(());
        };
        let (mut start, mut end) = (first, first + 1);
        for index in slots {
            if index == end {
                end += 1;
            } else {
                self.transforms.flush_range(start, end)?;
                start = index;
                end = index + 1;
            }
        }
        self.transforms.flush_range(start, end)
    }
}

impl<M: GpuMemory> System for BatchingPipeline<M> {
    type Output = FrameStats;
    type Error = BatchError;

    fn run(&mut self, world: &mut World) -> BatchResult<FrameStats> {
        self.execute(world)
    }
}

fn saturate(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}
