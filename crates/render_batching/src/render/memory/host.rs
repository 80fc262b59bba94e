//! Heap-backed memory backend
//!
//! Mirrors the device backend's contract without a GPU. Allocations are
//! 8-byte aligned word vectors so any `Pod` element up to that alignment can
//! be viewed in place.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{check_range, BufferHandle, BufferUsage, GpuMemory, MappedAllocation, MemoryError, MemoryResult};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Shared counters for a [`HostMemory`] and every allocation it produced
#[derive(Debug, Default)]
pub struct HostMemoryStats {
    allocated_bytes: AtomicU64,
    allocations: AtomicU64,
    copies: AtomicU64,
    flushes: AtomicU64,
}

impl HostMemoryStats {
    /// Bytes currently held by live allocations
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Total allocations made, including released ones
    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Total resize copies issued
    pub fn copies(&self) -> u64 {
        self.copies.load(Ordering::Relaxed)
    }

    /// Total flush calls
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

/// Host heap standing in for device memory
#[derive(Debug, Clone, Default)]
pub struct HostMemory {
    limit: Option<u64>,
    // Copies finish inline; kept so the setting round-trips like on a device
    fence_timeout_ns: Option<u64>,
    stats: Arc<HostMemoryStats>,
}

impl HostMemory {
    /// Unlimited host memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Host memory that fails allocations once `limit` live bytes would be exceeded
    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Usage counters
    pub fn stats(&self) -> &HostMemoryStats {
        &self.stats
    }
}

impl GpuMemory for HostMemory {
    type Allocation = HostAllocation;

    fn allocate(&self, size: u64, _usage: BufferUsage) -> MemoryResult<HostAllocation> {
        if size == 0 {
            return Err(MemoryError::ZeroSized);
        }
        let in_use = self.stats.allocated_bytes();
        if self.limit.is_some_and(|limit| in_use.saturating_add(size) > limit) {
            return Err(MemoryError::OutOfMemory { requested: size });
        }
        let len = usize::try_from(size).map_err(|_| MemoryError::OutOfMemory { requested: size })?;

        self.stats.allocated_bytes.fetch_add(size, Ordering::Relaxed);
        self.stats.allocations.fetch_add(1, Ordering::Relaxed);

        Ok(HostAllocation {
            words: vec![0; len.div_ceil(8)],
            len,
            handle: BufferHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)),
            stats: Arc::clone(&self.stats),
        })
    }

    fn copy(&self, src: &HostAllocation, dst: &mut HostAllocation, size: u64) -> MemoryResult<()> {
        check_range(0, size, src.size())?;
        check_range(0, size, dst.size())?;
        // Both lengths were checked against usize-sized allocations above
        let count = src.len.min(dst.len).min(usize::try_from(size).unwrap_or(usize::MAX));
        dst.bytes_mut()[..count].copy_from_slice(&src.bytes()[..count]);
        self.stats.copies.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&self, allocation: &HostAllocation, offset: u64, size: u64) -> MemoryResult<()> {
        check_range(offset, size, allocation.size())?;
        self.stats.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn invalidate(&self, allocation: &HostAllocation, offset: u64, size: u64) -> MemoryResult<()> {
        check_range(offset, size, allocation.size())
    }

    fn with_fence_timeout(mut self, timeout_ns: u64) -> Self {
        self.fence_timeout_ns = Some(timeout_ns);
        self
    }

    fn fence_timeout_ns(&self) -> u64 {
        self.fence_timeout_ns.unwrap_or(u64::MAX)
    }
}

/// Heap allocation produced by [`HostMemory`]
#[derive(Debug)]
pub struct HostAllocation {
    words: Vec<u64>,
    len: usize,
    handle: BufferHandle,
    stats: Arc<HostMemoryStats>,
}

impl MappedAllocation for HostAllocation {
    fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.words)[..self.len]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut(&mut self.words)[..self.len]
    }

    fn handle(&self) -> BufferHandle {
        self.handle
    }

    fn size(&self) -> u64 {
        self.len as u64
    }
}

impl Drop for HostAllocation {
    fn drop(&mut self) {
        self.stats.allocated_bytes.fetch_sub(self.len as u64, Ordering::Relaxed);
    }
}
