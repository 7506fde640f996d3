use ash::vk;
use vk_mem::Alloc;

use super::{creation_error, Context, VkBuffer};
use crate::gpu::error::{GfxError, Result};
use crate::gpu::structs::*;

impl Context {
    pub(super) fn make_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<VkBuffer> {
        let host_access = desc
            .usage
            .intersects(BufferUsages::MAP_READ | BufferUsages::MAP_WRITE);
        let mappable = host_access || desc.memory_properties.contains(MemoryProperties::HOST_VISIBLE);

        let mut required: vk::MemoryPropertyFlags = desc.memory_properties.into();
        if host_access {
            required |= vk::MemoryPropertyFlags::HOST_VISIBLE;
        }
        let create_info = vk_mem::AllocationCreateInfo {
            usage: if mappable {
                vk_mem::MemoryUsage::AutoPreferHost
            } else {
                vk_mem::MemoryUsage::Auto
            },
            flags: if mappable {
                vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            required_flags: required,
            ..Default::default()
        };

        let (raw, alloc) = unsafe {
            self.allocator.create_buffer(
                &vk::BufferCreateInfo::builder()
                    .size(desc.size)
                    .usage(desc.usage.into())
                    .sharing_mode(vk::SharingMode::EXCLUSIVE),
                &create_info,
            )
        }
        .map_err(creation_error)?;

        self.label(raw, desc.label, vk::ObjectType::BUFFER);
        Ok(VkBuffer {
            raw,
            alloc,
            size: desc.size,
            mapped: None,
        })
    }

    pub(super) fn free_buffer(&mut self, mut buffer: VkBuffer) {
        if buffer.mapped.take().is_some() {
            unsafe { self.allocator.unmap_memory(&mut buffer.alloc) };
        }
        unsafe { self.allocator.destroy_buffer(buffer.raw, &mut buffer.alloc) };
    }

    /// Map the whole allocation; `offset` and `size` only decide what gets
    /// invalidated for reads.
    pub(super) fn map(&mut self, buffer: &mut VkBuffer, offset: u64, size: u64, mode: MapMode) -> Result<()> {
        let base = unsafe { self.allocator.map_memory(&mut buffer.alloc) }?;
        if mode == MapMode::Read {
            if let Err(err) =
                self.allocator
                    .invalidate_allocation(&buffer.alloc, offset as usize, size as usize)
            {
                unsafe { self.allocator.unmap_memory(&mut buffer.alloc) };
                return Err(err.into());
            }
        }
        buffer.mapped = Some(base);
        Ok(())
    }

    fn mapped_base(buffer: &VkBuffer, offset: u64, len: usize) -> Result<*mut u8> {
        let base = buffer
            .mapped
            .ok_or_else(|| GfxError::invalid_state("buffer is not mapped"))?;
        if offset + len as u64 > buffer.size {
            return Err(GfxError::invalid_argument("access past the end of the buffer"));
        }
        Ok(base)
    }

    pub(super) fn read(&self, buffer: &VkBuffer, offset: u64, out: &mut [u8]) -> Result<()> {
        let base = Self::mapped_base(buffer, offset, out.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(base.add(offset as usize), out.as_mut_ptr(), out.len());
        }
        Ok(())
    }

    pub(super) fn write(&mut self, buffer: &VkBuffer, offset: u64, data: &[u8]) -> Result<()> {
        let base = Self::mapped_base(buffer, offset, data.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), base.add(offset as usize), data.len());
        }
        self.allocator
            .flush_allocation(&buffer.alloc, offset as usize, data.len())?;
        Ok(())
    }

    pub(super) fn unmap(&mut self, buffer: &mut VkBuffer) {
        if buffer.mapped.take().is_some() {
            unsafe { self.allocator.unmap_memory(&mut buffer.alloc) };
        }
    }
}
