//! Vulkan memory backend
//!
//! Buffers are created with host-visible memory and stay mapped for their
//! whole lifetime. Coherent memory is preferred; when only non-coherent
//! memory is available, flush and invalidate ranges are widened to the
//! device's `nonCoherentAtomSize`.
//!
//! Resize copies record a one-shot command buffer from a transient pool,
//! submit it to the transfer-capable queue, and block on a fence before
//! returning. The queue is shared between clones of [`VulkanMemory`], so
//! submissions are serialized through a mutex.

#![allow(unsafe_code)]

use std::sync::{Arc, Mutex, PoisonError};

use ash::vk::{self, Handle};
use ash::{Device, Instance};

use super::{check_range, BufferHandle, BufferUsage, GpuMemory, MappedAllocation, MemoryError, MemoryResult};

/// Device memory backend for growable GPU arrays
#[derive(Clone)]
pub struct VulkanMemory {
    device: Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    non_coherent_atom_size: u64,
    queue: vk::Queue,
    queue_family_index: u32,
    queue_lock: Arc<Mutex<()>>,
    fence_timeout_ns: u64,
}

impl VulkanMemory {
    /// Create a backend for `device`, copying through `queue`
    ///
    /// `queue` must belong to `queue_family_index` and support transfer
    /// operations. Graphics and compute queues always do.
    pub fn new(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        device: Device,
        queue: vk::Queue,
        queue_family_index: u32,
    ) -> Self {
        let (memory_properties, limits) = unsafe {
            (
                instance.get_physical_device_memory_properties(physical_device),
                instance.get_physical_device_properties(physical_device).limits,
            )
        };

        Self {
            device,
            memory_properties,
            non_coherent_atom_size: limits.non_coherent_atom_size.max(1),
            queue,
            queue_family_index,
            queue_lock: Arc::new(Mutex::new(())),
            fence_timeout_ns: u64::MAX,
        }
    }

    /// Find a memory type index matching the requirements
    fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> Option<u32> {
        let count = self.memory_properties.memory_type_count as usize;
        self.memory_properties.memory_types[..count]
            .iter()
            .enumerate()
            .find(|(i, memory_type)| {
                (type_filter & (1 << i)) != 0 && memory_type.property_flags.contains(properties)
            })
            .and_then(|(i, _)| u32::try_from(i).ok())
    }

    /// Widen `[offset, offset + size)` to whole atoms within the allocation
    fn atom_range(&self, allocation: &VulkanAllocation, offset: u64, size: u64) -> vk::MappedMemoryRange {
        let atom = self.non_coherent_atom_size;
        let start = offset / atom * atom;
        let end = (offset + size).div_ceil(atom) * atom;
        let size = if end >= allocation.memory_size {
            vk::WHOLE_SIZE
        } else {
            end - start
        };

        vk::MappedMemoryRange::builder()
            .memory(allocation.memory)
            .offset(start)
            .size(size)
            .build()
    }

    fn submit_copy(&self, src: vk::Buffer, dst: vk::Buffer, size: u64) -> MemoryResult<()> {
        let transfer = OneShotTransfer::new(&self.device, self.queue_family_index)?;

        let region = vk::BufferCopy::builder().src_offset(0).dst_offset(0).size(size).build();
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device.begin_command_buffer(transfer.command_buffer, &begin_info)?;
            self.device.cmd_copy_buffer(transfer.command_buffer, src, dst, &[region]);
            self.device.end_command_buffer(transfer.command_buffer)?;
        }

        let command_buffers = [transfer.command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers).build();

        {
            let _queue = self.queue_lock.lock().unwrap_or_else(PoisonError::into_inner);
            unsafe {
                self.device.queue_submit(self.queue, &[submit_info], transfer.fence)?;
            }
        }

        unsafe {
            self.device.wait_for_fences(&[transfer.fence], true, self.fence_timeout_ns)?;
        }
        Ok(())
    }
}

impl GpuMemory for VulkanMemory {
    type Allocation = VulkanAllocation;

    fn allocate(&self, size: u64, usage: BufferUsage) -> MemoryResult<VulkanAllocation> {
        if size == 0 {
            return Err(MemoryError::ZeroSized);
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage.to_vk())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None)? };
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let coherent = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let (memory_type_index, is_coherent) =
            match self.find_memory_type(requirements.memory_type_bits, coherent) {
                Some(index) => (index, true),
                None => match self
                    .find_memory_type(requirements.memory_type_bits, vk::MemoryPropertyFlags::HOST_VISIBLE)
                {
                    Some(index) => (index, false),
                    None => {
                        unsafe { self.device.destroy_buffer(buffer, None) };
                        return Err(MemoryError::NoSuitableMemoryType);
                    }
                },
            };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { self.device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(match err {
                    vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                        MemoryError::OutOfMemory { requested: requirements.size }
                    }
                    other => MemoryError::Api(other),
                });
            }
        };

        let mapped = unsafe {
            self.device
                .bind_buffer_memory(buffer, memory, 0)
                .and_then(|()| self.device.map_memory(memory, 0, size, vk::MemoryMapFlags::empty()))
        };
        let mapped = match mapped {
            Ok(ptr) => ptr.cast::<u8>(),
            Err(err) => {
                unsafe {
                    self.device.destroy_buffer(buffer, None);
                    self.device.free_memory(memory, None);
                }
                return Err(err.into());
            }
        };

        let len = usize::try_from(size).map_err(|_| MemoryError::OutOfMemory { requested: size })?;
        // Mapped memory starts uninitialized; the arrays rely on zeroed tails
        unsafe { std::ptr::write_bytes(mapped, 0, len) };

        let allocation = VulkanAllocation {
            device: self.device.clone(),
            buffer,
            memory,
            mapped,
            len,
            memory_size: requirements.size,
            is_coherent,
        };
        if !is_coherent {
            self.flush(&allocation, 0, size)?;
        }

        log::trace!(
            "Allocated {} byte buffer {:?} (coherent: {})",
            size,
            buffer,
            is_coherent
        );
        Ok(allocation)
    }

    fn copy(&self, src: &VulkanAllocation, dst: &mut VulkanAllocation, size: u64) -> MemoryResult<()> {
        check_range(0, size, src.size())?;
        check_range(0, size, dst.size())?;
        if size == 0 {
            return Ok(());
        }
        self.submit_copy(src.buffer, dst.buffer, size)
    }

    fn flush(&self, allocation: &VulkanAllocation, offset: u64, size: u64) -> MemoryResult<()> {
        check_range(offset, size, allocation.size())?;
        if allocation.is_coherent || size == 0 {
            return Ok(());
        }
        let range = self.atom_range(allocation, offset, size);
        unsafe { self.device.flush_mapped_memory_ranges(&[range])? };
        Ok(())
    }

    fn invalidate(&self, allocation: &VulkanAllocation, offset: u64, size: u64) -> MemoryResult<()> {
        check_range(offset, size, allocation.size())?;
        if allocation.is_coherent || size == 0 {
            return Ok(());
        }
        let range = self.atom_range(allocation, offset, size);
        unsafe { self.device.invalidate_mapped_memory_ranges(&[range])? };
        Ok(())
    }

    fn with_fence_timeout(mut self, timeout_ns: u64) -> Self {
        self.fence_timeout_ns = timeout_ns;
        self
    }

    fn fence_timeout_ns(&self) -> u64 {
        self.fence_timeout_ns
    }
}

/// Mapped buffer owned by a growable array
pub struct VulkanAllocation {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: *mut u8,
    len: usize,
    memory_size: u64,
    is_coherent: bool,
}

// The mapping is only reachable through `&self`/`&mut self`, so access
// follows the usual borrow rules across threads.
unsafe impl Send for VulkanAllocation {}
unsafe impl Sync for VulkanAllocation {}

impl VulkanAllocation {
    /// Raw buffer handle
    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    /// Whether writes need explicit flushes
    pub fn is_coherent(&self) -> bool {
        self.is_coherent
    }
}

impl MappedAllocation for VulkanAllocation {
    fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.mapped, self.len) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.mapped, self.len) }
    }

    fn handle(&self) -> BufferHandle {
        BufferHandle(self.buffer.as_raw())
    }

    fn size(&self) -> u64 {
        self.len as u64
    }
}

impl Drop for VulkanAllocation {
    fn drop(&mut self) {
        unsafe {
            self.device.unmap_memory(self.memory);
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Transient command pool, command buffer and fence for a single copy
struct OneShotTransfer<'a> {
    device: &'a Device,
    pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    fence: vk::Fence,
}

impl<'a> OneShotTransfer<'a> {
    fn new(device: &'a Device, queue_family_index: u32) -> MemoryResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(queue_family_index);
        let pool = unsafe { device.create_command_pool(&pool_info, None)? };

        // From here on Drop owns cleanup of whatever was created
        let mut transfer = Self {
            device,
            pool,
            command_buffer: vk::CommandBuffer::null(),
            fence: vk::Fence::null(),
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { device.allocate_command_buffers(&alloc_info)? };
        transfer.command_buffer = buffers.first().copied().ok_or(MemoryError::Api(vk::Result::ERROR_UNKNOWN))?;

        let fence_info = vk::FenceCreateInfo::builder();
        transfer.fence = unsafe { device.create_fence(&fence_info, None)? };

        Ok(transfer)
    }
}

impl Drop for OneShotTransfer<'_> {
    fn drop(&mut self) {
        unsafe {
            if self.fence != vk::Fence::null() {
                self.device.destroy_fence(self.fence, None);
            }
            // Destroying the pool frees its command buffers
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
