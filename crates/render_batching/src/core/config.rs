//! # Batching Configuration
//!
//! Tunables for the instance batching pipeline and the headless demo driver.
//! Both structures serialize through the [`Config`] trait, so they can be
//! loaded from either TOML or RON files.
//!
//! ## Transform write policy
//!
//! By default the pipeline only rewrites transforms whose entity (or an
//! ancestor) carries a dirty marker, plus slots that were handed out this
//! frame. Setting `force_transform_writes` rewrites every live slot every
//! frame, which is useful when an external system mutates transforms without
//! going through the world's change tracking.

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};

/// Smallest legal starting capacity: slot 0 is reserved, so one usable slot
pub const MIN_INITIAL_CAPACITY: u32 = 2;

/// # Batching Pipeline Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Starting element count for the index and transform arrays
    pub initial_capacity: u32,
    /// Worker threads for transform resolution (0 = available parallelism)
    pub worker_threads: usize,
    /// Below this many renderables transform resolution stays on the calling thread
    pub parallel_threshold: usize,
    /// Rewrite every live transform each frame instead of only dirty ones
    pub force_transform_writes: bool,
    /// Fence timeout for resize copies in milliseconds (unset = wait forever)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fence_timeout_ms: Option<u64>,
}

impl BatchingConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the starting capacity
    pub fn with_initial_capacity(mut self, capacity: u32) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Set the worker thread count
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Set the renderable count at which transform resolution goes parallel
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Toggle unconditional transform writes
    pub fn with_force_transform_writes(mut self, force: bool) -> Self {
        self.force_transform_writes = force;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_capacity < MIN_INITIAL_CAPACITY {
            return Err(format!(
                "initial_capacity must be at least {MIN_INITIAL_CAPACITY}, got {}",
                self.initial_capacity
            ));
        }
        if !self.initial_capacity.is_power_of_two() {
            return Err(format!(
                "initial_capacity must be a power of two, got {}",
                self.initial_capacity
            ));
        }
        if self.fence_timeout_ms == Some(0) {
            return Err("fence_timeout_ms must be non-zero".to_string());
        }
        Ok(())
    }

    /// Fence timeout in nanoseconds as expected by the device
    pub fn fence_timeout_ns(&self) -> u64 {
        self.fence_timeout_ms
            .map_or(u64::MAX, |ms| ms.saturating_mul(1_000_000))
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            worker_threads: 0,
            parallel_threshold: 512,
            force_transform_writes: false,
            fence_timeout_ms: None,
        }
    }
}

impl Config for BatchingConfig {}

/// # Demo Configuration
///
/// Scene shape for the headless demo binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Frames to simulate
    pub frames: u32,
    /// Renderables spawned before the first frame
    pub initial_entities: u32,
    /// Renderables spawned and despawned per frame
    pub churn_per_frame: u32,
    /// Distinct shaders in the scene
    pub shader_variety: u32,
    /// Distinct materials in the scene
    pub material_variety: u32,
    /// Distinct meshes in the scene
    pub mesh_variety: u32,
    /// Fraction of renderables parented to another entity
    pub parented_fraction: f32,
    /// Seed for the scene generator
    pub seed: u64,
    /// Pipeline settings
    pub batching: BatchingConfig,
}

impl DemoConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.shader_variety == 0 || self.material_variety == 0 || self.mesh_variety == 0 {
            return Err("signature variety counts must be non-zero".to_string());
        }
        if !(0.0..=1.0).contains(&self.parented_fraction) {
            return Err(format!(
                "parented_fraction must be within [0, 1], got {}",
                self.parented_fraction
            ));
        }
        self.batching.validate()
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            frames: 120,
            initial_entities: 4096,
            churn_per_frame: 64,
            shader_variety: 4,
            material_variety: 8,
            mesh_variety: 6,
            parented_fraction: 0.25,
            seed: 0x5eed,
            batching: BatchingConfig::default(),
        }
    }
}

impl Config for DemoConfig {}
