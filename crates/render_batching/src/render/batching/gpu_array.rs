//! Growable GPU array
//!
//! A fixed-element-size array living in persistently mapped, host-visible
//! memory. Elements are written in place from the CPU; only growth needs
//! the device, which copies the old contents into the new buffer before
//! the old one is released.

use std::marker::PhantomData;
use std::mem::size_of;
use std::ops::{Index, IndexMut};

use bytemuck::{Pod, Zeroable};

use crate::error::{BatchError, BatchResult};
use crate::foundation::math::{from_cols_array, to_cols_array, Mat4};
use crate::render::memory::{BufferHandle, BufferUsage, GpuMemory, MappedAllocation};

/// What the descriptor binding side needs to bind an array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBinding {
    /// Backing buffer
    pub handle: BufferHandle,
    /// Capacity in elements
    pub element_count: usize,
    /// Stride in bytes
    pub element_size: usize,
}

/// Per-instance world matrix as laid out on the GPU (column-major)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuTransform {
    /// Model matrix columns
    pub model: [[f32; 4]; 4],
}

impl GpuTransform {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        model: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Pack a matrix
    pub fn from_matrix(matrix: &Mat4) -> Self {
        Self { model: to_cols_array(matrix) }
    }

    /// Unpack into a matrix
    pub fn to_matrix(&self) -> Mat4 {
        from_cols_array(&self.model)
    }
}

/// Resizable array of `T` in mapped GPU memory
pub struct GrowableGpuArray<T: Pod, M: GpuMemory> {
    memory: M,
    allocation: M::Allocation,
    capacity: usize,
    usage: BufferUsage,
    label: &'static str,
    _marker: PhantomData<T>,
}

impl<T: Pod, M: GpuMemory> GrowableGpuArray<T, M> {
    /// Allocate a zeroed array of `capacity` elements
    pub fn new(memory: M, capacity: usize, usage: BufferUsage, label: &'static str) -> BatchResult<Self> {
        let usage = usage | BufferUsage::GROWABLE;
        let allocation = memory.allocate(Self::byte_len(capacity), usage)?;
        Ok(Self {
            memory,
            allocation,
            capacity,
            usage,
            label,
            _marker: PhantomData,
        })
    }

    /// Capacity in elements
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reallocate to exactly `new_len` elements, keeping the overlapping prefix
    ///
    /// Blocks until the device copy has finished. Elements past the old
    /// length read as zero.
    pub fn resize(&mut self, new_len: usize) -> BatchResult<()> {
        if new_len == self.capacity {
            return Ok(());
        }

        let mut replacement = self.memory.allocate(Self::byte_len(new_len), self.usage)?;
        let copy_bytes = Self::byte_len(self.capacity.min(new_len));
        self.memory.copy(&self.allocation, &mut replacement, copy_bytes)?;
        self.memory.invalidate(&replacement, 0, copy_bytes)?;

        log::info!(
            "Resized {} array: {} -> {} elements ({} bytes)",
            self.label,
            self.capacity,
            new_len,
            Self::byte_len(new_len)
        );

        // Old allocation is released here, after the copy fence
        self.allocation = replacement;
        self.capacity = new_len;
        Ok(())
    }

    /// Bounds-checked direct write
    pub fn write(&mut self, index: usize, value: T) -> BatchResult<()> {
        let len = self.capacity;
        let slot = self
            .as_mut_slice()
            .get_mut(index)
            .ok_or(BatchError::OutOfBounds { index, len })?;
        *slot = value;
        Ok(())
    }

    /// Bounds-checked read of the mapped contents
    pub fn read(&self, index: usize) -> Option<T> {
        self.as_slice().get(index).copied()
    }

    /// Mapped contents
    pub fn as_slice(&self) -> &[T] {
        bytemuck::cast_slice(&self.allocation.bytes()[..Self::byte_len(self.capacity) as usize])
    }

    /// Mapped contents for direct writes
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = Self::byte_len(self.capacity) as usize;
        bytemuck::cast_slice_mut(&mut self.allocation.bytes_mut()[..len])
    }

    /// Flush elements `[start, end)` so the device sees CPU writes
    pub fn flush_range(&self, start: usize, end: usize) -> BatchResult<()> {
        let end = end.min(self.capacity);
        if start >= end {
            return Ok(());
        }
        let offset = Self::byte_len(start);
        let size = Self::byte_len(end - start);
        self.memory.flush(&self.allocation, offset, size)?;
        Ok(())
    }

    /// Binding info for the current backing buffer
    ///
    /// The handle changes after every resize.
    pub fn binding(&self) -> BufferBinding {
        BufferBinding {
            handle: self.allocation.handle(),
            element_count: self.capacity,
            element_size: size_of::<T>(),
        }
    }

    /// Backend the array allocates from
    pub fn memory(&self) -> &M {
        &self.memory
    }

    fn byte_len(elements: usize) -> u64 {
        (elements * size_of::<T>()) as u64
    }
}

impl<T: Pod, M: GpuMemory> Index<usize> for GrowableGpuArray<T, M> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<T: Pod, M: GpuMemory> IndexMut<usize> for GrowableGpuArray<T, M> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.as_mut_slice()[index]
    }
}
