/// Interface every native backend implements.
///
/// A backend owns the native device objects and knows how to create, destroy
/// and drive them. It never sees API handles for its own bookkeeping: the
/// generic [`device::DeviceCore`] keeps every native object in typed arenas,
/// validates calls, and hands the backend already-resolved natives (or the
/// arenas, for operations that reference other objects).
///
/// # Prerequisites
/// Every method may assume its arguments passed front-end validation.
pub trait GpuBackend: Sized {
    type Buffer;
    type Texture;
    type TextureView;
    type Sampler;
    type Shader;
    type BindGroupLayout;
    type BindGroup;
    type RenderPass;
    type Framebuffer;
    type RenderPipeline;
    type ComputePipeline;
    type Fence;
    type Semaphore;
    type QuerySet;
    type Surface;
    type Swapchain;

    const KIND: Backend;

    fn limits(&self) -> DeviceLimits;
    fn supports_shader_format(&self, source: ShaderSourceType) -> bool;
    fn wait_idle(&self) -> Result<()>;

    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<Self::Buffer>;
    fn destroy_buffer(&mut self, buffer: Self::Buffer);
    /// Map `offset..offset + size` of `buffer`, blocking until host access is
    /// possible.
    fn map_buffer(
        &mut self,
        buffer: &mut Self::Buffer,
        offset: u64,
        size: u64,
        mode: MapMode,
    ) -> Result<()>;
    /// Offsets are relative to the start of the buffer.
    fn read_mapped(&self, buffer: &Self::Buffer, offset: u64, out: &mut [u8]) -> Result<()>;
    fn write_mapped(&mut self, buffer: &Self::Buffer, offset: u64, data: &[u8]) -> Result<()>;
    fn unmap_buffer(&mut self, buffer: &mut Self::Buffer);

    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<Self::Texture>;
    fn destroy_texture(&mut self, texture: Self::Texture);
    fn texture_layout(&self, texture: &Self::Texture) -> TextureLayout;
    fn create_texture_view(
        &mut self,
        texture: &Self::Texture,
        info: &TextureViewInfo,
        label: Option<&str>,
    ) -> Result<Self::TextureView>;
    fn destroy_texture_view(&mut self, view: Self::TextureView);

    fn create_sampler(&mut self, desc: &SamplerDescriptor<'_>) -> Result<Self::Sampler>;
    fn destroy_sampler(&mut self, sampler: Self::Sampler);

    fn create_shader(&mut self, desc: &ShaderDescriptor<'_>) -> Result<Self::Shader>;
    fn destroy_shader(&mut self, shader: Self::Shader);

    fn create_bind_group_layout(
        &mut self,
        desc: &BindGroupLayoutDescriptor<'_>,
    ) -> Result<Self::BindGroupLayout>;
    fn destroy_bind_group_layout(&mut self, layout: Self::BindGroupLayout);
    fn create_bind_group(
        &mut self,
        pools: &Pools<Self>,
        desc: &BindGroupDescriptor<'_>,
    ) -> Result<Self::BindGroup>;
    fn destroy_bind_group(&mut self, group: Self::BindGroup);

    fn create_render_pass(&mut self, desc: &RenderPassDescriptor<'_>) -> Result<Self::RenderPass>;
    fn destroy_render_pass(&mut self, pass: Self::RenderPass);
    fn create_framebuffer(
        &mut self,
        pools: &Pools<Self>,
        desc: &FramebufferDescriptor<'_>,
    ) -> Result<Self::Framebuffer>;
    fn destroy_framebuffer(&mut self, framebuffer: Self::Framebuffer);

    fn create_render_pipeline(
        &mut self,
        pools: &Pools<Self>,
        desc: &RenderPipelineDescriptor<'_>,
    ) -> Result<Self::RenderPipeline>;
    fn destroy_render_pipeline(&mut self, pipeline: Self::RenderPipeline);
    fn create_compute_pipeline(
        &mut self,
        pools: &Pools<Self>,
        desc: &ComputePipelineDescriptor<'_>,
    ) -> Result<Self::ComputePipeline>;
    fn destroy_compute_pipeline(&mut self, pipeline: Self::ComputePipeline);

    fn create_fence(&mut self, signaled: bool) -> Result<Self::Fence>;
    fn destroy_fence(&mut self, fence: Self::Fence);
    fn fence_status(&self, fence: &Self::Fence) -> Result<bool>;
    fn fence_signal(&mut self, fence: &Self::Fence) -> Result<()>;
    fn fence_reset(&mut self, fence: &Self::Fence) -> Result<()>;
    fn wait_fences(
        &self,
        fences: &[&Self::Fence],
        wait_all: bool,
        timeout_ns: u64,
    ) -> Result<WaitStatus>;

    fn create_semaphore(&mut self, desc: &SemaphoreDescriptor<'_>) -> Result<Self::Semaphore>;
    fn destroy_semaphore(&mut self, semaphore: Self::Semaphore);
    /// Host operations below are only ever called with timeline semaphores.
    fn semaphore_value(&self, semaphore: &Self::Semaphore) -> Result<u64>;
    fn semaphore_signal(&mut self, semaphore: &Self::Semaphore, value: u64) -> Result<()>;
    fn semaphore_wait(
        &self,
        semaphore: &Self::Semaphore,
        value: u64,
        timeout_ns: u64,
    ) -> Result<WaitStatus>;

    fn create_query_set(&mut self, desc: &QuerySetDescriptor<'_>) -> Result<Self::QuerySet>;
    fn destroy_query_set(&mut self, query_set: Self::QuerySet);

    /// Replay and submit the command lists in `info`.
    fn submit(&mut self, pools: &Pools<Self>, info: &SubmitInfo<'_>) -> Result<()>;

    fn surface_formats(&self, surface: &Self::Surface) -> Result<Vec<TextureFormat>>;
    fn surface_present_modes(&self, surface: &Self::Surface) -> Result<Vec<PresentMode>>;
    /// Create a swapchain and one view per image.
    fn create_swapchain(
        &mut self,
        surface: &Self::Surface,
        desc: &SwapchainDescriptor<'_>,
    ) -> Result<(Self::Swapchain, Vec<Self::TextureView>)>;
    fn destroy_swapchain(&mut self, swapchain: Self::Swapchain);
    /// Returns the acquisition status and, for backends whose image views
    /// only exist once acquired, the fresh view for the acquired index.
    fn acquire_next_image(
        &mut self,
        swapchain: &mut Self::Swapchain,
        timeout_ns: u64,
        semaphore: Option<&Self::Semaphore>,
        fence: Option<&Self::Fence>,
    ) -> Result<(AcquireStatus, Option<Self::TextureView>)>;
    fn present(&mut self, swapchain: &mut Self::Swapchain, wait: &[&Self::Semaphore]) -> Result<()>;
}

pub mod error;
pub use error::*;
pub mod structs;
pub use structs::*;
pub mod cmd;
pub use cmd::{
    Command, CommandBuffer, CommandEncoder, ComputePassEncoder, EncoderState, RenderPassEncoder,
};
pub mod state;
pub mod validation;
pub mod device;
pub use device::{Device, Pools, Queue, Record, SubmitInfo};
pub mod instance;
pub use instance::{Adapter, Instance, Surface};
pub mod executor;
pub use executor::CommandExecutor;

#[cfg(feature = "gfx-vulkan")]
pub mod vulkan;
#[cfg(feature = "gfx-webgpu")]
pub mod webgpu;
