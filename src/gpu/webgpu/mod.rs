//! WebGPU backend built on `wgpu`.
//!
//! wgpu reports most misuse through error scopes rather than return values,
//! so every object creation runs inside [`Context::checked`]. Command lists
//! are replayed into a fresh `wgpu::CommandEncoder` at submit; fences are
//! host flags flipped by the queue's work-done callback.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::gpu::device::{Pools, SubmitInfo};
use crate::gpu::error::{GfxError, Result};
use crate::gpu::instance::validation_requested;
use crate::gpu::structs::*;
use crate::gpu::GpuBackend;

mod commands;
mod conversions;
mod display;
mod mipmaps;
mod pipelines;
mod resources;
mod structs;

pub use structs::*;

/// Sleep between polls while waiting on a fence with a finite timeout.
const FENCE_POLL_INTERVAL: Duration = Duration::from_micros(200);

/// Failure reported by an error scope around a `create_*` call.
pub(super) fn creation_error(err: wgpu::Error) -> GfxError {
    match err {
        wgpu::Error::OutOfMemory { .. } => GfxError::OutOfMemory,
        other => GfxError::resource_creation(other),
    }
}

/// The `wgpu::Instance` every adapter and surface of one [`crate::Instance`]
/// comes from.
pub struct InstanceShared {
    pub(super) raw: wgpu::Instance,
    backends: wgpu::Backends,
    pub(super) surfaces: bool,
}

impl InstanceShared {
    pub fn new(desc: &InstanceDescriptor<'_>) -> Result<Arc<Self>> {
        let debug = validation_requested(desc) || desc.features.contains(InstanceFeatures::DEBUG);
        let backends = wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::PRIMARY);
        let flags = if debug {
            wgpu::InstanceFlags::VALIDATION | wgpu::InstanceFlags::DEBUG
        } else {
            wgpu::InstanceFlags::empty()
        };
        let raw = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            flags,
            ..Default::default()
        });
        log::info!(
            "WebGPU instance created (backends: {backends:?}, validation: {debug})"
        );
        Ok(Arc::new(Self {
            raw,
            backends,
            surfaces: desc.features.contains(InstanceFeatures::SURFACE),
        }))
    }

    pub fn enumerate_adapters(self: &Arc<Self>) -> Vec<Adapter> {
        self.raw
            .enumerate_adapters(self.backends)
            .into_iter()
            .map(|raw| Adapter {
                shared: self.clone(),
                raw: Arc::new(raw),
            })
            .collect()
    }
}

pub struct Adapter {
    shared: Arc<InstanceShared>,
    raw: Arc<wgpu::Adapter>,
}

impl Adapter {
    pub fn info(&self) -> AdapterInfo {
        let info = self.raw.get_info();
        AdapterInfo {
            name: info.name,
            driver_description: format!("{:?} {} {}", info.backend, info.driver, info.driver_info)
                .trim_end()
                .to_string(),
            vendor_id: info.vendor,
            device_id: info.device,
            adapter_type: conversions::adapter_type_from_wgpu(info.device_type),
            backend: Backend::WebGpu,
        }
    }

    pub fn limits(&self) -> DeviceLimits {
        conversions::limits_from_wgpu(&self.raw.limits())
    }

    pub fn create_device(&self, desc: &DeviceDescriptor<'_>) -> Result<Context> {
        if desc.features.contains(DeviceFeatures::TIMELINE_SEMAPHORE) {
            return Err(GfxError::FeatureNotSupported(
                "timeline semaphores are not available on WebGPU".into(),
            ));
        }
        if desc.features.contains(DeviceFeatures::SWAPCHAIN) && !self.shared.surfaces {
            return Err(GfxError::FeatureNotSupported(
                "swapchains need an instance created with InstanceFeatures::SURFACE".into(),
            ));
        }

        let optional = wgpu::Features::MAPPABLE_PRIMARY_BUFFERS
            | wgpu::Features::POLYGON_MODE_LINE
            | wgpu::Features::POLYGON_MODE_POINT
            | wgpu::Features::DEPTH32FLOAT_STENCIL8
            | wgpu::Features::TIMESTAMP_QUERY
            | wgpu::Features::TIMESTAMP_QUERY_INSIDE_ENCODERS;
        let required_features = self.raw.features() & optional;

        let (device, queue) = pollster::block_on(self.raw.request_device(
            &wgpu::DeviceDescriptor {
                label: desc.label,
                required_features,
                required_limits: self.raw.limits(),
            },
            None,
        ))
        .map_err(|err| GfxError::DeviceCreation(format!("requestDevice failed: {err}")))?;

        device.on_uncaptured_error(Box::new(|err| {
            log::error!(target: "gfx::webgpu", "uncaptured error: {err}");
        }));

        log::info!("created WebGPU device on {}", self.raw.get_info().name);
        Ok(Context {
            adapter: self.raw.clone(),
            device,
            queue,
            features: desc.features,
            limits: self.limits(),
            mipmaps: OnceLock::new(),
        })
    }
}

/// Device and queue of one WebGPU adapter.
pub struct Context {
    pub(super) adapter: Arc<wgpu::Adapter>,
    pub(super) device: wgpu::Device,
    queue: wgpu::Queue,
    pub(super) features: DeviceFeatures,
    pub(super) limits: DeviceLimits,
    mipmaps: OnceLock<mipmaps::MipmapBlitter>,
}

impl Context {
    /// Run `f` inside out-of-memory and validation error scopes and return
    /// the first error either of them caught.
    pub(super) fn checked<T>(
        &self,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> std::result::Result<T, wgpu::Error> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match oom.or(validation) {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    pub(super) fn mipmap_blitter(&self) -> &mipmaps::MipmapBlitter {
        self.mipmaps
            .get_or_init(|| mipmaps::MipmapBlitter::new(&self.device))
    }

    /// Signal `fence` once everything submitted so far has executed.
    fn signal_when_done(&self, fence: &WgpuFence) {
        let cell = fence.cell.clone();
        let epoch = cell.arm();
        self.queue.on_submitted_work_done(move || cell.complete(epoch));
    }
}

fn timeline_unsupported() -> GfxError {
    GfxError::FeatureNotSupported("timeline semaphores are not available on WebGPU".into())
}

fn fences_done(fences: &[&WgpuFence], wait_all: bool) -> bool {
    let signaled = |f: &&WgpuFence| f.cell.is_signaled();
    if wait_all {
        fences.iter().all(signaled)
    } else {
        fences.iter().any(signaled)
    }
}

impl GpuBackend for Context {
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;
    type TextureView = WgpuTextureView;
    type Sampler = WgpuSampler;
    type Shader = WgpuShader;
    type BindGroupLayout = WgpuBindGroupLayout;
    type BindGroup = WgpuBindGroup;
    type RenderPass = WgpuRenderPass;
    type Framebuffer = WgpuFramebuffer;
    type RenderPipeline = WgpuRenderPipeline;
    type ComputePipeline = WgpuComputePipeline;
    type Fence = WgpuFence;
    type Semaphore = WgpuSemaphore;
    type QuerySet = WgpuQuerySet;
    type Surface = Arc<Surface>;
    type Swapchain = WgpuSwapchain;

    const KIND: Backend = Backend::WebGpu;

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    /// WGSL natively, SPIR-V through naga.
    fn supports_shader_format(&self, _source: ShaderSourceType) -> bool {
        true
    }

    fn wait_idle(&self) -> Result<()> {
        self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<WgpuBuffer> {
        self.make_buffer(desc)
    }

    fn destroy_buffer(&mut self, buffer: WgpuBuffer) {
        self.free_buffer(buffer)
    }

    fn map_buffer(&mut self, buffer: &mut WgpuBuffer, offset: u64, size: u64, mode: MapMode) -> Result<()> {
        self.map(buffer, offset, size, mode)
    }

    fn read_mapped(&self, buffer: &WgpuBuffer, offset: u64, out: &mut [u8]) -> Result<()> {
        self.read(buffer, offset, out)
    }

    fn write_mapped(&mut self, buffer: &WgpuBuffer, offset: u64, data: &[u8]) -> Result<()> {
        self.write(buffer, offset, data)
    }

    fn unmap_buffer(&mut self, buffer: &mut WgpuBuffer) {
        self.unmap(buffer)
    }

    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<WgpuTexture> {
        self.make_texture(desc)
    }

    fn destroy_texture(&mut self, texture: WgpuTexture) {
        texture.raw.destroy();
    }

    fn texture_layout(&self, texture: &WgpuTexture) -> TextureLayout {
        texture.layout.get()
    }

    fn create_texture_view(
        &mut self,
        texture: &WgpuTexture,
        info: &TextureViewInfo,
        label: Option<&str>,
    ) -> Result<WgpuTextureView> {
        self.make_texture_view(texture, info, label)
    }

    fn destroy_texture_view(&mut self, view: WgpuTextureView) {
        drop(view);
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor<'_>) -> Result<WgpuSampler> {
        self.make_sampler(desc)
    }

    fn destroy_sampler(&mut self, sampler: WgpuSampler) {
        drop(sampler);
    }

    fn create_shader(&mut self, desc: &ShaderDescriptor<'_>) -> Result<WgpuShader> {
        self.make_shader(desc)
    }

    fn destroy_shader(&mut self, shader: WgpuShader) {
        drop(shader);
    }

    fn create_bind_group_layout(
        &mut self,
        desc: &BindGroupLayoutDescriptor<'_>,
    ) -> Result<WgpuBindGroupLayout> {
        self.make_bind_group_layout(desc)
    }

    fn destroy_bind_group_layout(&mut self, layout: WgpuBindGroupLayout) {
        drop(layout);
    }

    fn create_bind_group(
        &mut self,
        pools: &Pools<Self>,
        desc: &BindGroupDescriptor<'_>,
    ) -> Result<WgpuBindGroup> {
        self.make_bind_group(pools, desc)
    }

    fn destroy_bind_group(&mut self, group: WgpuBindGroup) {
        drop(group);
    }

    fn create_render_pass(&mut self, desc: &RenderPassDescriptor<'_>) -> Result<WgpuRenderPass> {
        self.make_render_pass(desc)
    }

    fn destroy_render_pass(&mut self, _pass: WgpuRenderPass) {}

    fn create_framebuffer(
        &mut self,
        pools: &Pools<Self>,
        desc: &FramebufferDescriptor<'_>,
    ) -> Result<WgpuFramebuffer> {
        self.make_framebuffer(pools, desc)
    }

    fn destroy_framebuffer(&mut self, _framebuffer: WgpuFramebuffer) {}

    fn create_render_pipeline(
        &mut self,
        pools: &Pools<Self>,
        desc: &RenderPipelineDescriptor<'_>,
    ) -> Result<WgpuRenderPipeline> {
        self.make_render_pipeline(pools, desc)
    }

    fn destroy_render_pipeline(&mut self, pipeline: WgpuRenderPipeline) {
        drop(pipeline);
    }

    fn create_compute_pipeline(
        &mut self,
        pools: &Pools<Self>,
        desc: &ComputePipelineDescriptor<'_>,
    ) -> Result<WgpuComputePipeline> {
        self.make_compute_pipeline(pools, desc)
    }

    fn destroy_compute_pipeline(&mut self, pipeline: WgpuComputePipeline) {
        drop(pipeline);
    }

    fn create_fence(&mut self, signaled: bool) -> Result<WgpuFence> {
        Ok(WgpuFence::new(signaled))
    }

    fn destroy_fence(&mut self, fence: WgpuFence) {
        drop(fence);
    }

    fn fence_status(&self, fence: &WgpuFence) -> Result<bool> {
        self.device.poll(wgpu::Maintain::Poll);
        Ok(fence.cell.is_signaled())
    }

    fn fence_signal(&mut self, fence: &WgpuFence) -> Result<()> {
        fence.cell.set(true);
        Ok(())
    }

    fn fence_reset(&mut self, fence: &WgpuFence) -> Result<()> {
        fence.cell.set(false);
        Ok(())
    }

    fn wait_fences(&self, fences: &[&WgpuFence], wait_all: bool, timeout_ns: u64) -> Result<WaitStatus> {
        if fences.is_empty() {
            return Ok(WaitStatus::Success);
        }
        let deadline = Instant::now().checked_add(Duration::from_nanos(timeout_ns));
        let Some(deadline) = deadline.filter(|_| timeout_ns != u64::MAX) else {
            self.device.poll(wgpu::Maintain::Wait);
            return if fences_done(fences, wait_all) {
                Ok(WaitStatus::Success)
            } else {
                Err(GfxError::Unknown(
                    "waiting forever on a fence that no submission will signal".into(),
                ))
            };
        };
        loop {
            let idle = self.device.poll(wgpu::Maintain::Poll).is_queue_empty();
            if fences_done(fences, wait_all) {
                return Ok(WaitStatus::Success);
            }
            // An idle queue has fired every pending callback during the poll,
            // so nothing left can signal these fences before the deadline.
            if idle || Instant::now() >= deadline {
                return Ok(WaitStatus::Timeout);
            }
            std::thread::sleep(FENCE_POLL_INTERVAL);
        }
    }

    fn create_semaphore(&mut self, desc: &SemaphoreDescriptor<'_>) -> Result<WgpuSemaphore> {
        if desc.semaphore_type == SemaphoreType::Timeline {
            return Err(timeline_unsupported());
        }
        Ok(WgpuSemaphore)
    }

    fn destroy_semaphore(&mut self, _semaphore: WgpuSemaphore) {}

    fn semaphore_value(&self, _semaphore: &WgpuSemaphore) -> Result<u64> {
        Err(timeline_unsupported())
    }

    fn semaphore_signal(&mut self, _semaphore: &WgpuSemaphore, _value: u64) -> Result<()> {
        Err(timeline_unsupported())
    }

    fn semaphore_wait(&self, _semaphore: &WgpuSemaphore, _value: u64, _timeout_ns: u64) -> Result<WaitStatus> {
        Err(timeline_unsupported())
    }

    fn create_query_set(&mut self, desc: &QuerySetDescriptor<'_>) -> Result<WgpuQuerySet> {
        self.make_query_set(desc)
    }

    fn destroy_query_set(&mut self, _query_set: WgpuQuerySet) {}

    fn submit(&mut self, pools: &Pools<Self>, info: &SubmitInfo<'_>) -> Result<()> {
        for entry in info.wait_semaphores.iter().chain(info.signal_semaphores) {
            pools.semaphore(entry.semaphore)?;
        }
        let fence = match info.signal_fence {
            Some(handle) => Some(&pools.fence(handle)?.native),
            None => None,
        };

        let mut recorded = Vec::with_capacity(info.command_buffers.len());
        for list in info.command_buffers {
            match commands::record(self, pools, list) {
                Ok(buffer) => recorded.push(buffer),
                Err(err) => {
                    log::error!("failed to record {:?}: {err}", list.label());
                    return Err(err);
                }
            }
        }

        self.checked(|_| {
            self.queue.submit(recorded);
        })
        .map_err(|err| GfxError::Unknown(format!("queue submission failed: {err}")))?;
        if let Some(fence) = fence {
            self.signal_when_done(fence);
        }
        Ok(())
    }

    fn surface_formats(&self, surface: &Arc<Surface>) -> Result<Vec<TextureFormat>> {
        self.formats(surface)
    }

    fn surface_present_modes(&self, surface: &Arc<Surface>) -> Result<Vec<PresentMode>> {
        self.present_modes(surface)
    }

    fn create_swapchain(
        &mut self,
        surface: &Arc<Surface>,
        desc: &SwapchainDescriptor<'_>,
    ) -> Result<(WgpuSwapchain, Vec<WgpuTextureView>)> {
        self.make_swapchain(surface, desc)
    }

    fn destroy_swapchain(&mut self, swapchain: WgpuSwapchain) {
        self.free_swapchain(swapchain)
    }

    /// wgpu blocks in `get_current_texture` with its own timeout.
    fn acquire_next_image(
        &mut self,
        swapchain: &mut WgpuSwapchain,
        _timeout_ns: u64,
        semaphore: Option<&WgpuSemaphore>,
        fence: Option<&WgpuFence>,
    ) -> Result<(AcquireStatus, Option<WgpuTextureView>)> {
        Ok(match self.acquire(swapchain, semaphore, fence)? {
            Some((index, view)) => (AcquireStatus::Acquired(index), Some(view)),
            None => (AcquireStatus::Timeout, None),
        })
    }

    fn present(&mut self, swapchain: &mut WgpuSwapchain, wait: &[&WgpuSemaphore]) -> Result<()> {
        self.present_image(swapchain, wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_all_needs_every_fence() {
        let (a, b) = (WgpuFence::new(true), WgpuFence::new(false));
        assert!(!fences_done(&[&a, &b], true));
        assert!(fences_done(&[&a, &b], false));
        b.cell.set(true);
        assert!(fences_done(&[&a, &b], true));
    }

    #[test]
    fn stale_completion_does_not_undo_reset() {
        let fence = WgpuFence::new(false);
        let epoch = fence.cell.arm();
        fence.cell.set(false);
        fence.cell.complete(epoch);
        assert!(!fence.cell.is_signaled());

        let epoch = fence.cell.arm();
        fence.cell.complete(epoch);
        assert!(fence.cell.is_signaled());
    }
}
