//! Native object types stored in the device arenas for the Vulkan backend.

use std::sync::Arc;

use ash::vk;

use crate::gpu::state::LayoutState;
use crate::gpu::structs::{BindGroupLayoutEntry, TextureFormat, TextureLayout};

pub struct VkBuffer {
    pub(super) raw: vk::Buffer,
    pub(super) alloc: vk_mem::Allocation,
    pub(super) size: u64,
    /// Base of the mapped allocation while the buffer is mapped.
    pub(super) mapped: Option<*mut u8>,
}

pub struct VkTexture {
    pub(super) raw: vk::Image,
    pub(super) alloc: vk_mem::Allocation,
    pub(super) format: vk::Format,
    pub(super) aspect: vk::ImageAspectFlags,
    pub(super) full_range: vk::ImageSubresourceRange,
    pub(super) layout: Arc<LayoutState>,
}

/// Image view plus enough of its image to transition it during replay.
pub struct VkTextureView {
    pub(super) raw: vk::ImageView,
    pub(super) image: vk::Image,
    pub(super) format: TextureFormat,
    pub(super) full_range: vk::ImageSubresourceRange,
    pub(super) layout: Arc<LayoutState>,
}

pub struct VkSampler {
    pub(super) raw: vk::Sampler,
}

pub struct VkShader {
    pub(super) module: vk::ShaderModule,
}

pub struct VkBindGroupLayout {
    pub(super) raw: vk::DescriptorSetLayout,
    pub(super) entries: Vec<BindGroupLayoutEntry>,
}

/// Image bound through a bind group, with the layout the binding needs.
#[derive(Clone)]
pub(super) struct BoundImage {
    pub(super) image: vk::Image,
    pub(super) full_range: vk::ImageSubresourceRange,
    pub(super) state: Arc<LayoutState>,
    pub(super) layout: TextureLayout,
}

pub struct VkBindGroup {
    pub(super) pool: vk::DescriptorPool,
    pub(super) set: vk::DescriptorSet,
    pub(super) images: Vec<BoundImage>,
}

#[derive(Clone, Copy)]
pub(super) struct AttachmentLayouts {
    /// Layout used while the pass runs.
    pub(super) attachment: TextureLayout,
    pub(super) final_layout: TextureLayout,
}

pub struct VkRenderPass {
    pub(super) raw: vk::RenderPass,
    /// Color attachments, color resolves, then depth, in attachment order.
    pub(super) attachments: Vec<AttachmentLayouts>,
    pub(super) has_depth: bool,
}

/// Attachment image tracked while a render pass is replayed.
#[derive(Clone)]
pub(super) struct FramebufferImage {
    pub(super) image: vk::Image,
    pub(super) full_range: vk::ImageSubresourceRange,
    pub(super) state: Arc<LayoutState>,
    pub(super) layouts: AttachmentLayouts,
}

pub struct VkFramebuffer {
    pub(super) raw: vk::Framebuffer,
    pub(super) extent: vk::Extent2D,
    pub(super) images: Vec<FramebufferImage>,
}

pub struct VkPipeline {
    pub(super) raw: vk::Pipeline,
    pub(super) layout: vk::PipelineLayout,
}

pub struct VkFence {
    pub(super) raw: vk::Fence,
}

pub struct VkSemaphore {
    pub(super) raw: vk::Semaphore,
    pub(super) timeline: bool,
}

pub struct VkQuerySet {
    pub(super) raw: vk::QueryPool,
}

pub struct Surface {
    pub(super) raw: vk::SurfaceKHR,
    pub(super) instance: Arc<super::InstanceShared>,
}

pub struct VkSwapchain {
    pub(super) raw: vk::SwapchainKHR,
    pub(super) images: Vec<vk::Image>,
    /// Signaled by the layout fix-up submitted ahead of a present.
    pub(super) present_ready: Vec<vk::Semaphore>,
    pub(super) layouts: Vec<Arc<LayoutState>>,
    pub(super) current: Option<u32>,
    /// Keeps the surface alive for as long as the swapchain exists.
    pub(super) _surface: Arc<Surface>,
}
