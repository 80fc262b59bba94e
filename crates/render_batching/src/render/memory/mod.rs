//! Host-visible GPU memory backends
//!
//! The batching arrays never talk to a graphics API directly. They allocate
//! persistently mapped buffers through [`GpuMemory`], write into the mapping
//! from the CPU, and ask the backend for a blocking buffer-to-buffer copy
//! when they grow.
//!
//! Two backends are provided:
//!
//! - [`VulkanMemory`]: `ash` device memory, one-shot transfer copies guarded
//!   by a fence, explicit flushes for non-coherent heaps.
//! - [`HostMemory`]: plain heap allocations with the same contract, used for
//!   headless runs and tests.

use ash::vk;
use bitflags::bitflags;

pub mod host;
pub mod vulkan;

pub use host::{HostMemory, HostAllocation, HostMemoryStats};
pub use vulkan::{VulkanMemory, VulkanAllocation};

bitflags! {
    /// How a batching buffer is consumed by the draw submission side
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Read by shaders as a storage buffer
        const STORAGE = 1 << 0;
        /// Bound as a per-instance vertex stream
        const VERTEX = 1 << 1;
        /// Source of a resize copy
        const TRANSFER_SRC = 1 << 2;
        /// Destination of a resize copy
        const TRANSFER_DST = 1 << 3;
    }
}

impl BufferUsage {
    /// Usage every growable array needs regardless of consumer
    pub const GROWABLE: Self = Self::TRANSFER_SRC.union(Self::TRANSFER_DST);

    /// Translate to Vulkan usage flags
    pub fn to_vk(self) -> vk::BufferUsageFlags {
        let mut flags = vk::BufferUsageFlags::empty();
        if self.contains(Self::STORAGE) {
            flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
        }
        if self.contains(Self::VERTEX) {
            flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
        }
        if self.contains(Self::TRANSFER_SRC) {
            flags |= vk::BufferUsageFlags::TRANSFER_SRC;
        }
        if self.contains(Self::TRANSFER_DST) {
            flags |= vk::BufferUsageFlags::TRANSFER_DST;
        }
        flags
    }
}

/// Opaque buffer handle handed to descriptor binding code
///
/// For the Vulkan backend this is the raw `VkBuffer`; host allocations use a
/// process-unique counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// A persistently mapped allocation, released on drop
pub trait MappedAllocation: Send + Sync {
    /// Mapped contents
    fn bytes(&self) -> &[u8];

    /// Mapped contents for direct CPU writes
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Handle for binding
    fn handle(&self) -> BufferHandle;

    /// Size in bytes as requested at allocation time
    fn size(&self) -> u64;
}

/// Allocator and transfer queue used by growable GPU arrays
pub trait GpuMemory: Clone + Send + Sync {
    /// Allocation type produced by this backend
    type Allocation: MappedAllocation;

    /// Allocate and map a host-visible buffer of `size` bytes
    fn allocate(&self, size: u64, usage: BufferUsage) -> MemoryResult<Self::Allocation>;

    /// Copy the first `size` bytes of `src` into `dst`, blocking until done
    fn copy(&self, src: &Self::Allocation, dst: &mut Self::Allocation, size: u64) -> MemoryResult<()>;

    /// Make CPU writes in `[offset, offset + size)` visible to the device
    fn flush(&self, allocation: &Self::Allocation, offset: u64, size: u64) -> MemoryResult<()>;

    /// Make device writes in `[offset, offset + size)` visible to the CPU
    fn invalidate(&self, allocation: &Self::Allocation, offset: u64, size: u64) -> MemoryResult<()>;

    /// Bound how long `copy` may wait for the device, in nanoseconds
    #[must_use]
    fn with_fence_timeout(self, timeout_ns: u64) -> Self;

    /// Current copy wait bound in nanoseconds, `u64::MAX` for no bound
    fn fence_timeout_ns(&self) -> u64;
}

/// Memory backend errors
#[derive(thiserror::Error, Debug)]
pub enum MemoryError {
    /// Vulkan API error
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// The heap cannot satisfy the request
    #[error("Out of memory: requested {requested} bytes")]
    OutOfMemory {
        /// Requested byte count
        requested: u64,
    },

    /// No memory type is host visible for this buffer
    #[error("No suitable host-visible memory type")]
    NoSuitableMemoryType,

    /// Zero-byte buffers are not allowed
    #[error("Cannot allocate a zero-sized buffer")]
    ZeroSized,

    /// Copy or flush range exceeds an allocation
    #[error("Range {offset}+{size} exceeds allocation of {len} bytes")]
    RangeOutOfBounds {
        /// Range start
        offset: u64,
        /// Range length
        size: u64,
        /// Allocation length
        len: u64,
    },
}

impl From<vk::Result> for MemoryError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                Self::OutOfMemory { requested: 0 }
            }
            other => Self::Api(other),
        }
    }
}

/// Result alias for memory backend operations
pub type MemoryResult<T> = Result<T, MemoryError>;

pub(crate) fn check_range(offset: u64, size: u64, len: u64) -> MemoryResult<()> {
    match offset.checked_add(size) {
        Some(end) if end <= len => Ok(()),
        _ => Err(MemoryError::RangeOutOfBounds { offset, size, len }),
    }
}
