use ash::{vk, Device};
use std::{cell::UnsafeCell, marker::PhantomData, thread::ThreadId};

use crate::gpu::error::Result;

/// Command buffers handed to the queue, returned to the pool once `fence`
/// signals.
struct InFlight {
    fence: vk::Fence,
    buffers: Vec<vk::CommandBuffer>,
}

/// Thin wrapper around a Vulkan command pool.
///
/// Handles allocation and recycling of primary command buffers and enforces
/// single-threaded ownership. The pool may be moved to another thread after
/// creation but must not be shared across threads.
pub struct CommandPool {
    device: Device,
    raw: vk::CommandPool,
    free: Vec<vk::CommandBuffer>,
    in_flight: Vec<InFlight>,
    spare_fences: Vec<vk::Fence>,
    owner: ThreadId,
    // make !Sync
    _not_sync: PhantomData<UnsafeCell<()>>,
}

unsafe impl Send for CommandPool {}

impl CommandPool {
    /// Create a new command pool for the given queue family.
    pub(super) fn new(device: Device, family: u32) -> Result<Self> {
        let ci = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .build();
        let raw = unsafe { device.create_command_pool(&ci, None)? };
        Ok(Self {
            device,
            raw,
            free: Vec::new(),
            in_flight: Vec::new(),
            spare_fences: Vec::new(),
            owner: std::thread::current().id(),
            _not_sync: PhantomData,
        })
    }

    fn assert_owner(&self) {
        debug_assert_eq!(
            self.owner,
            std::thread::current().id(),
            "CommandPool used from wrong thread"
        );
    }

    fn alloc(&mut self) -> Result<vk::CommandBuffer> {
        self.assert_owner();
        if let Some(buf) = self.free.pop() {
            unsafe {
                self.device
                    .reset_command_buffer(buf, vk::CommandBufferResetFlags::empty())?;
            }
            return Ok(buf);
        }
        let bufs = unsafe {
            self.device.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::builder()
                    .command_pool(self.raw)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1)
                    .build(),
            )?
        };
        bufs.first()
            .copied()
            .ok_or_else(|| crate::gpu::GfxError::Unknown("driver returned no command buffer".into()))
    }

    /// Allocate a primary command buffer and begin one-time recording.
    pub(super) fn begin(&mut self) -> Result<vk::CommandBuffer> {
        let cmd = self.alloc()?;
        unsafe {
            self.device.begin_command_buffer(
                cmd,
                &vk::CommandBufferBeginInfo::builder()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
                    .build(),
            )?;
        }
        Ok(cmd)
    }

    /// Return command buffers that never reached the queue.
    pub(super) fn discard(&mut self, buffers: Vec<vk::CommandBuffer>) {
        self.assert_owner();
        self.free.extend(buffers);
    }

    /// Fence used to track a submission's command buffers.
    pub(super) fn submission_fence(&mut self) -> Result<vk::Fence> {
        if let Some(fence) = self.spare_fences.pop() {
            return Ok(fence);
        }
        let fence = unsafe {
            self.device
                .create_fence(&vk::FenceCreateInfo::builder().build(), None)?
        };
        Ok(fence)
    }

    /// Hand `buffers` back once `fence` has signaled.
    pub(super) fn retire(&mut self, fence: vk::Fence, buffers: Vec<vk::CommandBuffer>) {
        self.assert_owner();
        self.in_flight.push(InFlight { fence, buffers });
    }

    /// Recycle every in-flight batch whose fence has signaled.
    pub(super) fn reclaim(&mut self) -> Result<()> {
        self.assert_owner();
        let mut i = 0;
        while i < self.in_flight.len() {
            let done = unsafe { self.device.get_fence_status(self.in_flight[i].fence)? };
            if done {
                let batch = self.in_flight.swap_remove(i);
                unsafe { self.device.reset_fences(&[batch.fence])? };
                self.spare_fences.push(batch.fence);
                self.free.extend(batch.buffers);
            } else {
                i += 1;
            }
        }
        Ok(())
    }

    /// Destroy the underlying Vulkan command pool. The device must be idle.
    pub(super) fn destroy(&mut self) {
        self.assert_owner();
        unsafe {
            for batch in self.in_flight.drain(..) {
                self.device.destroy_fence(batch.fence, None);
            }
            for fence in self.spare_fences.drain(..) {
                self.device.destroy_fence(fence, None);
            }
            self.device.destroy_command_pool(self.raw, None);
        }
        self.raw = vk::CommandPool::null();
        self.free.clear();
    }

    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }
}
