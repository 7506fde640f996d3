use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use super::cmd::{Command, CommandBuffer, CommandEncoder};
use super::error::{GfxError, Result};
use super::instance::{Surface, SurfaceInner};
use super::structs::*;
use super::validation::{self, ResolvedResource};
use super::GpuBackend;
use crate::utils::{align_up, Handle, Pool, TIMEOUT_INFINITE};

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

/// Native object plus the front-end metadata kept for it.
pub struct Record<N, I> {
    pub native: N,
    pub info: I,
}

impl<N, I> Record<N, I> {
    fn new(native: N, info: I) -> Self {
        Self { native, info }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MappedRange {
    pub offset: u64,
    pub size: u64,
    pub mode: MapMode,
}

#[derive(Clone, Debug)]
pub struct BufferState {
    pub info: BufferInfo,
    pub mapped: Option<MappedRange>,
}

#[derive(Clone, Debug)]
pub struct BindGroupInfo {
    pub layout: Handle<BindGroupLayout>,
    pub resources: Vec<BindingResource>,
}

/// Query set metadata plus which queries have ever been written by a
/// completed submission.
#[derive(Clone, Debug)]
pub struct QuerySetState {
    pub info: QuerySetInfo,
    pub written: Vec<bool>,
}

/// Queries written by one command list.
type WrittenQueries = HashSet<(Handle<QuerySet>, u32)>;

#[derive(Clone, Debug)]
pub struct SwapchainState {
    pub info: SwapchainInfo,
    pub images: Vec<Handle<TextureView>>,
    pub acquired: Option<u32>,
}

/// Typed arenas holding every object a device owns.
pub struct Pools<B: GpuBackend> {
    pub buffers: Pool<Buffer, Record<B::Buffer, BufferState>>,
    pub textures: Pool<Texture, Record<B::Texture, TextureInfo>>,
    pub texture_views: Pool<TextureView, Record<B::TextureView, TextureViewInfo>>,
    pub samplers: Pool<Sampler, Record<B::Sampler, ()>>,
    pub shaders: Pool<Shader, Record<B::Shader, ShaderInfo>>,
    pub bind_group_layouts: Pool<BindGroupLayout, Record<B::BindGroupLayout, Vec<BindGroupLayoutEntry>>>,
    pub bind_groups: Pool<BindGroup, Record<B::BindGroup, BindGroupInfo>>,
    pub render_passes: Pool<RenderPass, Record<B::RenderPass, RenderPassInfo>>,
    pub framebuffers: Pool<Framebuffer, Record<B::Framebuffer, FramebufferInfo>>,
    pub render_pipelines: Pool<RenderPipeline, Record<B::RenderPipeline, PipelineInfo>>,
    pub compute_pipelines: Pool<ComputePipeline, Record<B::ComputePipeline, PipelineInfo>>,
    pub fences: Pool<Fence, Record<B::Fence, ()>>,
    pub semaphores: Pool<Semaphore, Record<B::Semaphore, SemaphoreType>>,
    pub query_sets: Pool<QuerySet, Record<B::QuerySet, QuerySetState>>,
    pub swapchains: Pool<Swapchain, Record<B::Swapchain, SwapchainState>>,
}

impl<B: GpuBackend> Default for Pools<B> {
    fn default() -> Self {
        Self {
            buffers: Pool::default(),
            textures: Pool::default(),
            texture_views: Pool::default(),
            samplers: Pool::default(),
            shaders: Pool::default(),
            bind_group_layouts: Pool::default(),
            bind_groups: Pool::default(),
            render_passes: Pool::default(),
            framebuffers: Pool::default(),
            render_pipelines: Pool::default(),
            compute_pipelines: Pool::default(),
            fences: Pool::default(),
            semaphores: Pool::default(),
            query_sets: Pool::default(),
            swapchains: Pool::default(),
        }
    }
}

macro_rules! lookups {
    ($($name:ident / $name_mut:ident : $pool:ident, $kind:ty, $native:ident, $info:ty, $what:literal;)*) => {
        impl<B: GpuBackend> Pools<B> {
            $(
                pub fn $name(&self, handle: Handle<$kind>) -> Result<&Record<B::$native, $info>> {
                    self.$pool
                        .get_ref(handle)
                        .ok_or_else(|| GfxError::invalid_argument(concat!("stale ", $what, " handle")))
                }

                pub fn $name_mut(&mut self, handle: Handle<$kind>) -> Result<&mut Record<B::$native, $info>> {
                    self.$pool
                        .get_mut_ref(handle)
                        .ok_or_else(|| GfxError::invalid_argument(concat!("stale ", $what, " handle")))
                }
            )*
        }
    };
}

lookups! {
    buffer / buffer_mut: buffers, Buffer, Buffer, BufferState, "buffer";
    texture / texture_mut: textures, Texture, Texture, TextureInfo, "texture";
    texture_view / texture_view_mut: texture_views, TextureView, TextureView, TextureViewInfo, "texture view";
    sampler / sampler_mut: samplers, Sampler, Sampler, (), "sampler";
    shader / shader_mut: shaders, Shader, Shader, ShaderInfo, "shader";
    bind_group_layout / bind_group_layout_mut: bind_group_layouts, BindGroupLayout, BindGroupLayout, Vec<BindGroupLayoutEntry>, "bind group layout";
    bind_group / bind_group_mut: bind_groups, BindGroup, BindGroup, BindGroupInfo, "bind group";
    render_pass / render_pass_mut: render_passes, RenderPass, RenderPass, RenderPassInfo, "render pass";
    framebuffer / framebuffer_mut: framebuffers, Framebuffer, Framebuffer, FramebufferInfo, "framebuffer";
    render_pipeline / render_pipeline_mut: render_pipelines, RenderPipeline, RenderPipeline, PipelineInfo, "render pipeline";
    compute_pipeline / compute_pipeline_mut: compute_pipelines, ComputePipeline, ComputePipeline, PipelineInfo, "compute pipeline";
    fence / fence_mut: fences, Fence, Fence, (), "fence";
    semaphore / semaphore_mut: semaphores, Semaphore, Semaphore, SemaphoreType, "semaphore";
    query_set / query_set_mut: query_sets, QuerySet, QuerySet, QuerySetState, "query set";
    swapchain / swapchain_mut: swapchains, Swapchain, Swapchain, SwapchainState, "swapchain";
}

impl<B: GpuBackend> Pools<B> {
    /// A view is usable when it and its parent texture are both alive.
    fn live_view(&self, handle: Handle<TextureView>) -> Result<&Record<B::TextureView, TextureViewInfo>> {
        let view = self.texture_view(handle)?;
        if let Some(texture) = view.info.texture {
            if !self.textures.contains(texture) {
                return Err(GfxError::invalid_argument(
                    "texture view outlived its texture",
                ));
            }
        }
        Ok(view)
    }

    fn resolve_binding(&self, resource: &BindingResource) -> Option<ResolvedResource> {
        match *resource {
            BindingResource::Buffer { buffer, .. } => self
                .buffers
                .get_ref(buffer)
                .map(|b| ResolvedResource::Buffer(b.info.info)),
            BindingResource::Sampler(sampler) => self
                .samplers
                .get_ref(sampler)
                .map(|_| ResolvedResource::Sampler),
            BindingResource::TextureView(view) => {
                let view = self.live_view(view).ok()?;
                let usage = match view.info.texture {
                    Some(texture) => self.textures.get_ref(texture)?.info.usage,
                    None => TextureUsages::RENDER_ATTACHMENT,
                };
                Some(ResolvedResource::TextureView {
                    view: view.info,
                    usage,
                })
            }
        }
    }

    /// Host-side counter operations only apply to timeline semaphores.
    fn timeline(&self, handle: Handle<Semaphore>) -> Result<&B::Semaphore> {
        let record = self.semaphore(handle)?;
        if record.info != SemaphoreType::Timeline {
            return Err(GfxError::invalid_argument(
                "host signal and wait need a timeline semaphore",
            ));
        }
        Ok(&record.native)
    }

    fn layouts_compatible(&self, a: Handle<BindGroupLayout>, b: Handle<BindGroupLayout>) -> bool {
        if a == b {
            return true;
        }
        match (self.bind_group_layouts.get_ref(a), self.bind_group_layouts.get_ref(b)) {
            (Some(a), Some(b)) => a.info == b.info,
            _ => false,
        }
    }
}

fn already_destroyed(what: &str) -> GfxError {
    GfxError::invalid_state(format!("{what} was already destroyed"))
}

/// Per-pass state tracked while a command list is checked before submit.
#[derive(Default)]
struct PassCheck {
    signature: Option<PassSignature>,
    render_pipeline: Option<PipelineInfo>,
    compute_pipeline: Option<PipelineInfo>,
    bind_groups: [Option<Handle<BindGroupLayout>>; super::cmd::MAX_BIND_GROUPS as usize],
    vertex_buffers: u32,
    occlusion_set: Option<Handle<QuerySet>>,
}

/// Backend-independent device front end.
///
/// Owns the backend context and every object created through it. Argument and
/// state checks happen here so both backends reject the same inputs.
pub struct DeviceCore<B: GpuBackend> {
    pub(crate) id: u64,
    pub(crate) backend: B,
    pub(crate) pools: Pools<B>,
    limits: DeviceLimits,
}

impl<B: GpuBackend> DeviceCore<B> {
    pub(crate) fn new(backend: B) -> Self {
        let id = NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed);
        let limits = backend.limits();
        log::info!("{:?} device {id} ready", B::KIND);
        Self {
            id,
            backend,
            pools: Pools::default(),
            limits,
        }
    }

    pub fn backend(&self) -> Backend {
        B::KIND
    }

    pub fn limits(&self) -> DeviceLimits {
        self.limits
    }

    pub fn supports_shader_format(&self, source: ShaderSourceType) -> bool {
        self.backend.supports_shader_format(source)
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.backend.wait_idle()
    }

    // Buffers

    pub fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<Handle<Buffer>> {
        validation::buffer_descriptor(desc, &self.limits)?;
        let native = self.backend.create_buffer(desc)?;
        let state = BufferState {
            info: BufferInfo {
                size: desc.size,
                usage: desc.usage,
                memory_properties: desc.memory_properties,
            },
            mapped: None,
        };
        match self.pools.buffers.insert(Record::new(native, state)) {
            Some(handle) => {
                log::debug!("created buffer {:?} ({} bytes)", desc.label, desc.size);
                Ok(handle)
            }
            None => Err(GfxError::OutOfMemory),
        }
    }

    pub fn destroy_buffer(&mut self, handle: Handle<Buffer>) -> Result<()> {
        let mut record = self
            .pools
            .buffers
            .release(handle)
            .ok_or_else(|| already_destroyed("buffer"))?;
        if record.info.mapped.is_some() {
            self.backend.unmap_buffer(&mut record.native);
        }
        self.backend.destroy_buffer(record.native);
        log::debug!("destroyed buffer slot {}", handle.slot);
        Ok(())
    }

    pub fn buffer_info(&self, handle: Handle<Buffer>) -> Result<BufferInfo> {
        Ok(self.pools.buffer(handle)?.info.info)
    }

    pub fn map_buffer(
        &mut self,
        handle: Handle<Buffer>,
        offset: u64,
        size: u64,
        mode: MapMode,
    ) -> Result<()> {
        let record = self.pools.buffer_mut(handle)?;
        let info = record.info.info;
        let needed = match mode {
            MapMode::Read => BufferUsages::MAP_READ,
            MapMode::Write => BufferUsages::MAP_WRITE,
        };
        if !info.usage.contains(needed) {
            return Err(GfxError::invalid_argument(format!(
                "mapping for {mode:?} requires {needed:?} usage"
            )));
        }
        if record.info.mapped.is_some() {
            return Err(GfxError::invalid_state("buffer is already mapped"));
        }
        let size = if size == 0 { info.size.saturating_sub(offset) } else { size };
        if offset % 8 != 0 || size % validation::COPY_ALIGNMENT != 0 || size == 0 {
            return Err(GfxError::invalid_argument(
                "map offset must be a multiple of 8 and size a non-zero multiple of 4",
            ));
        }
        validation::buffer_range(&info, offset, size, "map_buffer")?;

        self.backend.map_buffer(&mut record.native, offset, size, mode)?;
        record.info.mapped = Some(MappedRange { offset, size, mode });
        Ok(())
    }

    fn mapped_range(&self, handle: Handle<Buffer>, offset: u64, len: usize, mode: MapMode) -> Result<()> {
        let record = self.pools.buffer(handle)?;
        let Some(range) = record.info.mapped else {
            return Err(GfxError::invalid_state("buffer is not mapped"));
        };
        if range.mode != mode {
            return Err(GfxError::invalid_state(format!(
                "buffer is mapped for {:?}, not {mode:?}",
                range.mode
            )));
        }
        let end = offset.checked_add(len as u64);
        if offset < range.offset || end.map_or(true, |end| end > range.offset + range.size) {
            return Err(GfxError::invalid_argument("access outside the mapped range"));
        }
        Ok(())
    }

    pub fn read_mapped(&self, handle: Handle<Buffer>, offset: u64, out: &mut [u8]) -> Result<()> {
        self.mapped_range(handle, offset, out.len(), MapMode::Read)?;
        let record = self.pools.buffer(handle)?;
        self.backend.read_mapped(&record.native, offset, out)
    }

    pub fn write_mapped(&mut self, handle: Handle<Buffer>, offset: u64, data: &[u8]) -> Result<()> {
        self.mapped_range(handle, offset, data.len(), MapMode::Write)?;
        let record = self.pools.buffer(handle)?;
        self.backend.write_mapped(&record.native, offset, data)
    }

    pub fn unmap_buffer(&mut self, handle: Handle<Buffer>) -> Result<()> {
        let record = self.pools.buffer_mut(handle)?;
        if record.info.mapped.take().is_none() {
            return Err(GfxError::invalid_state("buffer is not mapped"));
        }
        self.backend.unmap_buffer(&mut record.native);
        Ok(())
    }

    // Textures and views

    pub fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<Handle<Texture>> {
        validation::texture_descriptor(desc, &self.limits)?;
        let native = self.backend.create_texture(desc)?;
        let handle = self
            .pools
            .textures
            .insert(Record::new(native, TextureInfo::from(desc)))
            .ok_or(GfxError::OutOfMemory)?;
        log::debug!(
            "created texture {:?} {}x{}x{} {:?}",
            desc.label,
            desc.size.width,
            desc.size.height,
            desc.size.depth,
            desc.format
        );
        Ok(handle)
    }

    pub fn destroy_texture(&mut self, handle: Handle<Texture>) -> Result<()> {
        let record = self
            .pools
            .textures
            .release(handle)
            .ok_or_else(|| already_destroyed("texture"))?;
        self.backend.destroy_texture(record.native);
        Ok(())
    }

    pub fn texture_info(&self, handle: Handle<Texture>) -> Result<TextureInfo> {
        Ok(self.pools.texture(handle)?.info)
    }

    pub fn texture_layout(&self, handle: Handle<Texture>) -> Result<TextureLayout> {
        let record = self.pools.texture(handle)?;
        Ok(self.backend.texture_layout(&record.native))
    }

    pub fn create_texture_view(
        &mut self,
        texture: Handle<Texture>,
        desc: &TextureViewDescriptor<'_>,
    ) -> Result<Handle<TextureView>> {
        let record = self.pools.texture(texture)?;
        let info = validation::texture_view(texture, &record.info, desc)?;
        let native = self
            .backend
            .create_texture_view(&record.native, &info, desc.label)?;
        self.pools
            .texture_views
            .insert(Record::new(native, info))
            .ok_or(GfxError::OutOfMemory)
    }

    pub fn destroy_texture_view(&mut self, handle: Handle<TextureView>) -> Result<()> {
        let view = self
            .pools
            .texture_views
            .get_ref(handle)
            .ok_or_else(|| already_destroyed("texture view"))?;
        if view.info.texture.is_none() {
            return Err(GfxError::invalid_argument(
                "swapchain image views are destroyed with their swapchain",
            ));
        }
        if let Some(record) = self.pools.texture_views.release(handle) {
            self.backend.destroy_texture_view(record.native);
        }
        Ok(())
    }

    pub fn texture_view_info(&self, handle: Handle<TextureView>) -> Result<TextureViewInfo> {
        Ok(self.pools.texture_view(handle)?.info)
    }

    // Samplers and shaders

    pub fn create_sampler(&mut self, desc: &SamplerDescriptor<'_>) -> Result<Handle<Sampler>> {
        validation::sampler_descriptor(desc)?;
        let native = self.backend.create_sampler(desc)?;
        self.pools
            .samplers
            .insert(Record::new(native, ()))
            .ok_or(GfxError::OutOfMemory)
    }

    pub fn destroy_sampler(&mut self, handle: Handle<Sampler>) -> Result<()> {
        let record = self
            .pools
            .samplers
            .release(handle)
            .ok_or_else(|| already_destroyed("sampler"))?;
        self.backend.destroy_sampler(record.native);
        Ok(())
    }

    pub fn create_shader(&mut self, desc: &ShaderDescriptor<'_>) -> Result<Handle<Shader>> {
        validation::shader_descriptor(desc)?;
        let source_type = desc.source.source_type();
        if !self.backend.supports_shader_format(source_type) {
            return Err(GfxError::invalid_argument(format!(
                "{:?} backend cannot consume {source_type:?} shaders",
                B::KIND
            )));
        }
        let native = self.backend.create_shader(desc)?;
        let info = ShaderInfo {
            source_type,
            entry_point: desc.entry_point.to_owned(),
        };
        log::debug!("created {source_type:?} shader {:?}", desc.label);
        self.pools
            .shaders
            .insert(Record::new(native, info))
            .ok_or(GfxError::OutOfMemory)
    }

    pub fn destroy_shader(&mut self, handle: Handle<Shader>) -> Result<()> {
        let record = self
            .pools
            .shaders
            .release(handle)
            .ok_or_else(|| already_destroyed("shader"))?;
        self.backend.destroy_shader(record.native);
        Ok(())
    }

    // Bind groups

    pub fn create_bind_group_layout(
        &mut self,
        desc: &BindGroupLayoutDescriptor<'_>,
    ) -> Result<Handle<BindGroupLayout>> {
        validation::bind_group_layout(desc.entries)?;
        let native = self.backend.create_bind_group_layout(desc)?;
        self.pools
            .bind_group_layouts
            .insert(Record::new(native, desc.entries.to_vec()))
            .ok_or(GfxError::OutOfMemory)
    }

    pub fn destroy_bind_group_layout(&mut self, handle: Handle<BindGroupLayout>) -> Result<()> {
        let record = self
            .pools
            .bind_group_layouts
            .release(handle)
            .ok_or_else(|| already_destroyed("bind group layout"))?;
        self.backend.destroy_bind_group_layout(record.native);
        Ok(())
    }

    pub fn create_bind_group(&mut self, desc: &BindGroupDescriptor<'_>) -> Result<Handle<BindGroup>> {
        let layout = self.pools.bind_group_layout(desc.layout)?;
        validation::bind_group(&layout.info, desc.entries, |res| {
            self.pools.resolve_binding(res)
        })?;
        let native = self.backend.create_bind_group(&self.pools, desc)?;
        let info = BindGroupInfo {
            layout: desc.layout,
            resources: desc.entries.iter().map(|e| e.resource).collect(),
        };
        self.pools
            .bind_groups
            .insert(Record::new(native, info))
            .ok_or(GfxError::OutOfMemory)
    }

    pub fn destroy_bind_group(&mut self, handle: Handle<BindGroup>) -> Result<()> {
        let record = self
            .pools
            .bind_groups
            .release(handle)
            .ok_or_else(|| already_destroyed("bind group"))?;
        self.backend.destroy_bind_group(record.native);
        Ok(())
    }

    // Render passes, framebuffers and pipelines

    pub fn create_render_pass(&mut self, desc: &RenderPassDescriptor<'_>) -> Result<Handle<RenderPass>> {
        validation::render_pass(desc)?;
        let native = self.backend.create_render_pass(desc)?;
        let info = RenderPassInfo {
            color_attachments: desc.color_attachments.to_vec(),
            depth_stencil_attachment: desc.depth_stencil_attachment,
        };
        self.pools
            .render_passes
            .insert(Record::new(native, info))
            .ok_or(GfxError::OutOfMemory)
    }

    pub fn destroy_render_pass(&mut self, handle: Handle<RenderPass>) -> Result<()> {
        let record = self
            .pools
            .render_passes
            .release(handle)
            .ok_or_else(|| already_destroyed("render pass"))?;
        self.backend.destroy_render_pass(record.native);
        Ok(())
    }

    pub fn create_framebuffer(&mut self, desc: &FramebufferDescriptor<'_>) -> Result<Handle<Framebuffer>> {
        let pass = self.pools.render_pass(desc.render_pass)?;
        validation::framebuffer(&pass.info, desc, |view| {
            self.pools.live_view(view).ok().map(|v| v.info)
        })?;
        let native = self.backend.create_framebuffer(&self.pools, desc)?;
        let info = FramebufferInfo {
            render_pass: desc.render_pass,
            color_attachments: desc.color_attachments.to_vec(),
            depth_stencil_attachment: desc.depth_stencil_attachment,
            width: desc.width,
            height: desc.height,
        };
        self.pools
            .framebuffers
            .insert(Record::new(native, info))
            .ok_or(GfxError::OutOfMemory)
    }

    pub fn destroy_framebuffer(&mut self, handle: Handle<Framebuffer>) -> Result<()> {
        let record = self
            .pools
            .framebuffers
            .release(handle)
            .ok_or_else(|| already_destroyed("framebuffer"))?;
        self.backend.destroy_framebuffer(record.native);
        Ok(())
    }

    fn check_layouts(&self, layouts: &[Handle<BindGroupLayout>]) -> Result<()> {
        if layouts.len() > super::cmd::MAX_BIND_GROUPS as usize {
            return Err(GfxError::invalid_argument(format!(
                "pipelines support at most {} bind group layouts",
                super::cmd::MAX_BIND_GROUPS
            )));
        }
        for layout in layouts {
            self.pools.bind_group_layout(*layout)?;
        }
        Ok(())
    }

    pub fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor<'_>,
    ) -> Result<Handle<RenderPipeline>> {
        let pass = self.pools.render_pass(desc.render_pass)?;
        validation::render_pipeline(&pass.info, desc)?;
        let signature = pass.info.signature();
        self.pools.shader(desc.vertex.module)?;
        if let Some(fragment) = &desc.fragment {
            self.pools.shader(fragment.module)?;
        }
        self.check_layouts(desc.bind_group_layouts)?;

        let native = self.backend.create_render_pipeline(&self.pools, desc)?;
        let info = PipelineInfo {
            bind_group_layouts: desc.bind_group_layouts.to_vec(),
            pass_signature: Some(signature),
            vertex_buffer_count: desc.vertex.buffers.len() as u32,
        };
        log::debug!("created render pipeline {:?}", desc.label);
        self.pools
            .render_pipelines
            .insert(Record::new(native, info))
            .ok_or(GfxError::OutOfMemory)
    }

    pub fn destroy_render_pipeline(&mut self, handle: Handle<RenderPipeline>) -> Result<()> {
        let record = self
            .pools
            .render_pipelines
            .release(handle)
            .ok_or_else(|| already_destroyed("render pipeline"))?;
        self.backend.destroy_render_pipeline(record.native);
        Ok(())
    }

    pub fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor<'_>,
    ) -> Result<Handle<ComputePipeline>> {
        if desc.entry_point.is_empty() {
            return Err(GfxError::invalid_argument("compute entry point must be non-empty"));
        }
        self.pools.shader(desc.compute)?;
        self.check_layouts(desc.bind_group_layouts)?;
        let native = self.backend.create_compute_pipeline(&self.pools, desc)?;
        let info = PipelineInfo {
            bind_group_layouts: desc.bind_group_layouts.to_vec(),
            pass_signature: None,
            vertex_buffer_count: 0,
        };
        log::debug!("created compute pipeline {:?}", desc.label);
        self.pools
            .compute_pipelines
            .insert(Record::new(native, info))
            .ok_or(GfxError::OutOfMemory)
    }

    pub fn destroy_compute_pipeline(&mut self, handle: Handle<ComputePipeline>) -> Result<()> {
        let record = self
            .pools
            .compute_pipelines
            .release(handle)
            .ok_or_else(|| already_destroyed("compute pipeline"))?;
        self.backend.destroy_compute_pipeline(record.native);
        Ok(())
    }

    // Synchronization

    pub fn create_fence(&mut self, signaled: bool) -> Result<Handle<Fence>> {
        let native = self.backend.create_fence(signaled)?;
        self.pools
            .fences
            .insert(Record::new(native, ()))
            .ok_or(GfxError::OutOfMemory)
    }

    pub fn destroy_fence(&mut self, handle: Handle<Fence>) -> Result<()> {
        let record = self
            .pools
            .fences
            .release(handle)
            .ok_or_else(|| already_destroyed("fence"))?;
        self.backend.destroy_fence(record.native);
        Ok(())
    }

    pub fn fence_is_signaled(&self, handle: Handle<Fence>) -> Result<bool> {
        self.backend.fence_status(&self.pools.fence(handle)?.native)
    }

    pub fn fence_signal(&mut self, handle: Handle<Fence>) -> Result<()> {
        let record = self.pools.fence(handle)?;
        self.backend.fence_signal(&record.native)
    }

    pub fn fence_reset(&mut self, handle: Handle<Fence>) -> Result<()> {
        let record = self.pools.fence(handle)?;
        self.backend.fence_reset(&record.native)
    }

    pub fn fence_wait(&self, handle: Handle<Fence>, timeout_ns: u64) -> Result<WaitStatus> {
        self.wait_for_fences(&[handle], true, timeout_ns)
    }

    pub fn wait_for_fences(
        &self,
        fences: &[Handle<Fence>],
        wait_all: bool,
        timeout_ns: u64,
    ) -> Result<WaitStatus> {
        if fences.is_empty() {
            return Err(GfxError::invalid_argument("no fences to wait for"));
        }
        let natives = fences
            .iter()
            .map(|h| self.pools.fence(*h).map(|r| &r.native))
            .collect::<Result<Vec<_>>>()?;
        self.backend.wait_fences(&natives, wait_all, timeout_ns)
    }

    pub fn create_semaphore(&mut self, desc: &SemaphoreDescriptor<'_>) -> Result<Handle<Semaphore>> {
        let native = self.backend.create_semaphore(desc)?;
        self.pools
            .semaphores
            .insert(Record::new(native, desc.semaphore_type))
            .ok_or(GfxError::OutOfMemory)
    }

    pub fn destroy_semaphore(&mut self, handle: Handle<Semaphore>) -> Result<()> {
        let record = self
            .pools
            .semaphores
            .release(handle)
            .ok_or_else(|| already_destroyed("semaphore"))?;
        self.backend.destroy_semaphore(record.native);
        Ok(())
    }

    pub fn semaphore_type(&self, handle: Handle<Semaphore>) -> Result<SemaphoreType> {
        Ok(self.pools.semaphore(handle)?.info)
    }

    pub fn semaphore_value(&self, handle: Handle<Semaphore>) -> Result<u64> {
        self.backend.semaphore_value(self.pools.timeline(handle)?)
    }

    pub fn semaphore_signal(&mut self, handle: Handle<Semaphore>, value: u64) -> Result<()> {
        let semaphore = self.pools.timeline(handle)?;
        let current = self.backend.semaphore_value(semaphore)?;
        if value <= current {
            return Err(GfxError::invalid_argument(format!(
                "timeline values only increase: {value} <= current {current}"
            )));
        }
        self.backend.semaphore_signal(semaphore, value)
    }

    pub fn semaphore_wait(&self, handle: Handle<Semaphore>, value: u64, timeout_ns: u64) -> Result<WaitStatus> {
        self.backend
            .semaphore_wait(self.pools.timeline(handle)?, value, timeout_ns)
    }

    // Queries

    pub fn create_query_set(&mut self, desc: &QuerySetDescriptor<'_>) -> Result<Handle<QuerySet>> {
        validation::query_set_descriptor(desc)?;
        let native = self.backend.create_query_set(desc)?;
        let state = QuerySetState {
            info: desc.into(),
            written: vec![false; desc.count as usize],
        };
        match self.pools.query_sets.insert(Record::new(native, state)) {
            Some(handle) => {
                log::debug!("created {:?} query set {:?} ({} queries)", desc.query_type, desc.label, desc.count);
                Ok(handle)
            }
            None => Err(GfxError::OutOfMemory),
        }
    }

    pub fn destroy_query_set(&mut self, handle: Handle<QuerySet>) -> Result<()> {
        let record = self
            .pools
            .query_sets
            .release(handle)
            .ok_or_else(|| already_destroyed("query set"))?;
        self.backend.destroy_query_set(record.native);
        Ok(())
    }

    pub fn query_set_info(&self, handle: Handle<QuerySet>) -> Result<QuerySetInfo> {
        Ok(self.pools.query_set(handle)?.info.info)
    }

    // Commands

    pub fn create_command_encoder(&self, label: Option<&str>) -> CommandEncoder {
        CommandEncoder::new(self.id, label)
    }

    fn check_indirect(&self, buffer: Handle<Buffer>, offset: u64, size: u64) -> Result<()> {
        let info = self.pools.buffer(buffer)?.info.info;
        if !info.usage.contains(BufferUsages::INDIRECT) {
            return Err(GfxError::invalid_argument("indirect buffer lacks INDIRECT usage"));
        }
        if offset % 4 != 0 {
            return Err(GfxError::invalid_argument("indirect offset must be a multiple of 4"));
        }
        validation::buffer_range(&info, offset, size, "indirect arguments")
    }

    fn check_draw_state(&self, pass: &PassCheck, pipeline: Option<&PipelineInfo>) -> Result<()> {
        let Some(pipeline) = pipeline else {
            return Err(GfxError::invalid_state("no pipeline bound"));
        };
        for (index, layout) in pipeline.bind_group_layouts.iter().enumerate() {
            match pass.bind_groups[index] {
                Some(bound) if self.pools.layouts_compatible(bound, *layout) => {}
                Some(_) => {
                    return Err(GfxError::invalid_argument(format!(
                        "bind group {index} does not match the pipeline layout"
                    )))
                }
                None => {
                    return Err(GfxError::invalid_argument(format!(
                        "bind group {index} is not bound"
                    )))
                }
            }
        }
        let needed = (1u32 << pipeline.vertex_buffer_count) - 1;
        if pass.vertex_buffers & needed != needed {
            return Err(GfxError::invalid_argument(
                "not every vertex buffer the pipeline reads is bound",
            ));
        }
        Ok(())
    }

    fn check_query_write(
        &self,
        written: &mut WrittenQueries,
        query_set: Handle<QuerySet>,
        index: u32,
        ty: QueryType,
    ) -> Result<()> {
        let info = self.pools.query_set(query_set)?.info.info;
        validation::query_index(&info, index, ty)?;
        if !written.insert((query_set, index)) {
            return Err(GfxError::invalid_argument(format!(
                "query {index} is written twice in one command buffer"
            )));
        }
        Ok(())
    }

    /// Check that every handle a command list references is alive and every
    /// range is in bounds. Nothing is sent to the GPU when this fails.
    ///
    /// `earlier` holds queries written by command lists ahead of this one in
    /// the same submission. Returns the queries this list writes.
    fn validate_commands(&self, buffer: &CommandBuffer, earlier: &WrittenQueries) -> Result<WrittenQueries> {
        if buffer.device_id != self.id {
            return Err(GfxError::invalid_argument(
                "command buffer was recorded for another device",
            ));
        }
        let pools = &self.pools;
        let mut pass = PassCheck::default();
        let mut written = WrittenQueries::new();

        for command in buffer.commands() {
            match command {
                Command::CopyBufferToBuffer(copy) => {
                    let src = pools.buffer(copy.source)?.info.info;
                    let dst = pools.buffer(copy.destination)?.info.info;
                    validation::copy_buffer_to_buffer(&src, &dst, copy)?;
                }
                Command::CopyBufferToTexture(copy) => {
                    let src = pools.buffer(copy.source)?.info.info;
                    let dst = pools.texture(copy.destination)?.info;
                    validation::copy_buffer_to_texture(&src, &dst, copy)?;
                }
                Command::CopyTextureToBuffer(copy) => {
                    let src = pools.texture(copy.source)?.info;
                    let dst = pools.buffer(copy.destination)?.info.info;
                    validation::copy_texture_to_buffer(&src, &dst, copy)?;
                }
                Command::CopyTextureToTexture(copy) => {
                    let src = pools.texture(copy.source)?.info;
                    let dst = pools.texture(copy.destination)?.info;
                    validation::copy_texture_to_texture(&src, &dst, copy)?;
                }
                Command::BlitTextureToTexture(blit) => {
                    let src = pools.texture(blit.source)?.info;
                    let dst = pools.texture(blit.destination)?.info;
                    validation::blit_texture_to_texture(&src, &dst, blit)?;
                }
                Command::PipelineBarrier {
                    buffers, textures, ..
                } => {
                    for barrier in buffers {
                        pools.buffer(barrier.buffer)?;
                    }
                    for barrier in textures {
                        pools.texture(barrier.texture)?;
                    }
                }
                Command::GenerateMipmaps {
                    texture,
                    base_mip_level,
                    level_count,
                } => {
                    let info = pools.texture(*texture)?.info;
                    validation::generate_mipmaps(&info, *base_mip_level, *level_count)?;
                }
                Command::WriteTimestamp { query_set, index } => {
                    self.check_query_write(&mut written, *query_set, *index, QueryType::Timestamp)?;
                }
                Command::ResolveQuerySet {
                    query_set,
                    first_query,
                    query_count,
                    destination,
                    destination_offset,
                } => {
                    let set = &pools.query_set(*query_set)?.info;
                    let dst = pools.buffer(*destination)?.info.info;
                    validation::resolve_query_set(
                        &set.info,
                        &dst,
                        *first_query,
                        *query_count,
                        *destination_offset,
                    )?;
                    for index in *first_query..*first_query + *query_count {
                        let key = (*query_set, index);
                        let ever = set.written.get(index as usize).copied().unwrap_or(false);
                        if !ever && !written.contains(&key) && !earlier.contains(&key) {
                            return Err(GfxError::invalid_state(format!(
                                "query {index} is resolved but was never written"
                            )));
                        }
                    }
                }
                Command::BeginRenderPass(begin) => {
                    let render_pass = pools.render_pass(begin.render_pass)?;
                    let framebuffer = pools.framebuffer(begin.framebuffer)?;
                    let signature = render_pass.info.signature();
                    let fb_pass = pools.render_pass(framebuffer.info.render_pass)?;
                    if fb_pass.info.signature() != signature {
                        return Err(GfxError::invalid_argument(
                            "framebuffer was created for an incompatible render pass",
                        ));
                    }
                    let fb = &framebuffer.info;
                    for attachment in fb.color_attachments.iter().chain(&fb.depth_stencil_attachment) {
                        pools.live_view(attachment.view)?;
                        if let Some(resolve) = attachment.resolve_target {
                            pools.live_view(resolve)?;
                        }
                    }
                    for (i, color) in render_pass.info.color_attachments.iter().enumerate() {
                        if color.target.ops.load == LoadOp::Clear && begin.color_clear_values.len() <= i {
                            return Err(GfxError::invalid_argument(format!(
                                "color attachment {i} is cleared but has no clear value"
                            )));
                        }
                    }
                    pass = PassCheck {
                        signature: Some(signature),
                        ..Default::default()
                    };
                }
                Command::BeginComputePass { .. } => pass = PassCheck::default(),
                Command::EndPass => pass = PassCheck::default(),
                Command::SetRenderPipeline(handle) => {
                    let info = &pools.render_pipeline(*handle)?.info;
                    if info.pass_signature != pass.signature {
                        return Err(GfxError::invalid_argument(
                            "render pipeline is incompatible with the current render pass",
                        ));
                    }
                    pass.render_pipeline = Some(info.clone());
                }
                Command::SetComputePipeline(handle) => {
                    pass.compute_pipeline = Some(pools.compute_pipeline(*handle)?.info.clone());
                }
                Command::SetBindGroup {
                    index,
                    bind_group,
                    dynamic_offsets,
                } => {
                    let group = pools.bind_group(*bind_group)?;
                    for resource in &group.info.resources {
                        if pools.resolve_binding(resource).is_none() {
                            return Err(GfxError::invalid_argument(
                                "bind group references a destroyed resource",
                            ));
                        }
                    }
                    let layout = pools.bind_group_layout(group.info.layout)?;
                    let dynamic = layout
                        .info
                        .iter()
                        .filter(|e| matches!(e.ty, BindingType::Buffer { has_dynamic_offset: true, .. }))
                        .count();
                    if dynamic != dynamic_offsets.len() {
                        return Err(GfxError::invalid_argument(format!(
                            "bind group needs {dynamic} dynamic offsets, got {}",
                            dynamic_offsets.len()
                        )));
                    }
                    pass.bind_groups[*index as usize] = Some(group.info.layout);
                }
                Command::SetVertexBuffer { slot, buffer, offset } => {
                    let info = pools.buffer(*buffer)?.info.info;
                    if !info.usage.contains(BufferUsages::VERTEX) {
                        return Err(GfxError::invalid_argument("vertex buffer lacks VERTEX usage"));
                    }
                    validation::buffer_range(&info, *offset, 0, "vertex buffer")?;
                    pass.vertex_buffers |= 1 << slot;
                }
                Command::SetIndexBuffer { buffer, format, offset } => {
                    let info = pools.buffer(*buffer)?.info.info;
                    if !info.usage.contains(BufferUsages::INDEX) {
                        return Err(GfxError::invalid_argument("index buffer lacks INDEX usage"));
                    }
                    if offset % format.size() != 0 {
                        return Err(GfxError::invalid_argument(
                            "index buffer offset must be aligned to the index size",
                        ));
                    }
                    validation::buffer_range(&info, *offset, 0, "index buffer")?;
                }
                Command::SetViewport(_) | Command::SetScissorRect(_) => {}
                Command::Draw { .. } | Command::DrawIndexed { .. } => {
                    self.check_draw_state(&pass, pass.render_pipeline.as_ref())?;
                }
                Command::DrawIndirect { buffer, offset } => {
                    self.check_draw_state(&pass, pass.render_pipeline.as_ref())?;
                    self.check_indirect(*buffer, *offset, 16)?;
                }
                Command::DrawIndexedIndirect { buffer, offset } => {
                    self.check_draw_state(&pass, pass.render_pipeline.as_ref())?;
                    self.check_indirect(*buffer, *offset, 20)?;
                }
                Command::Dispatch { .. } => {
                    self.check_draw_state(&pass, pass.compute_pipeline.as_ref())?;
                }
                Command::DispatchIndirect { buffer, offset } => {
                    self.check_draw_state(&pass, pass.compute_pipeline.as_ref())?;
                    self.check_indirect(*buffer, *offset, 12)?;
                }
                Command::BeginOcclusionQuery { query_set, index } => {
                    if pass.occlusion_set.map_or(false, |set| set != *query_set) {
                        return Err(GfxError::invalid_argument(
                            "a render pass can only use one occlusion query set",
                        ));
                    }
                    pass.occlusion_set = Some(*query_set);
                    self.check_query_write(&mut written, *query_set, *index, QueryType::Occlusion)?;
                }
                Command::EndOcclusionQuery => {}
            }
        }
        Ok(written)
    }

    pub fn submit(&mut self, info: &SubmitInfo<'_>) -> Result<()> {
        let mut written = WrittenQueries::new();
        for buffer in info.command_buffers {
            let queries = self.validate_commands(buffer, &written)?;
            written.extend(queries);
        }
        for sem in info.wait_semaphores.iter().chain(info.signal_semaphores) {
            self.pools.semaphore(sem.semaphore)?;
        }
        if let Some(fence) = info.signal_fence {
            self.pools.fence(fence)?;
        }
        log::debug!(
            "submitting {} command buffers ({} waits, {} signals)",
            info.command_buffers.len(),
            info.wait_semaphores.len(),
            info.signal_semaphores.len()
        );
        self.backend.submit(&self.pools, info).map_err(|err| {
            log::error!("submission failed: {err}");
            err
        })?;
        for (query_set, index) in written {
            if let Some(flag) = self
                .pools
                .query_set_mut(query_set)
                .ok()
                .and_then(|r| r.info.written.get_mut(index as usize))
            {
                *flag = true;
            }
        }
        Ok(())
    }

    /// Record with `record`, submit, and block until the GPU is done.
    pub(crate) fn execute<F>(&mut self, label: &str, record: F) -> Result<()>
    where
        F: FnOnce(&mut CommandEncoder) -> Result<()>,
    {
        let mut encoder = self.create_command_encoder(Some(label));
        record(&mut encoder)?;
        let commands = encoder.finish()?;

        let fence = self.create_fence(false)?;
        let result = self
            .submit(&SubmitInfo {
                command_buffers: &[&commands],
                signal_fence: Some(fence),
                ..Default::default()
            })
            .and_then(|_| self.fence_wait(fence, TIMEOUT_INFINITE))
            .and_then(|status| match status {
                WaitStatus::Success => Ok(()),
                WaitStatus::Timeout => Err(GfxError::Unknown(format!("{label} timed out"))),
            });
        let destroyed = self.destroy_fence(fence);
        result.and(destroyed)
    }

    fn with_staging<F>(&mut self, data: &[u8], size: u64, record: F) -> Result<()>
    where
        F: FnOnce(&mut Self, Handle<Buffer>) -> Result<()>,
    {
        let staging = self.create_buffer(&BufferDescriptor {
            label: Some("gfx.staging"),
            size,
            usage: BufferUsages::MAP_WRITE | BufferUsages::COPY_SRC,
            memory_properties: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
        })?;
        let result = self
            .map_buffer(staging, 0, size, MapMode::Write)
            .and_then(|_| self.write_mapped(staging, 0, data))
            .and_then(|_| self.unmap_buffer(staging))
            .and_then(|_| record(self, staging));
        let destroyed = self.destroy_buffer(staging);
        result.and(destroyed)
    }

    pub fn write_buffer(&mut self, buffer: Handle<Buffer>, offset: u64, data: &[u8]) -> Result<()> {
        let info = self.buffer_info(buffer)?;
        if !info.usage.contains(BufferUsages::COPY_DST) {
            return Err(GfxError::invalid_argument("write_buffer target lacks COPY_DST usage"));
        }
        if data.is_empty() {
            return Ok(());
        }
        let size = data.len() as u64;
        if offset % validation::COPY_ALIGNMENT != 0 || size % validation::COPY_ALIGNMENT != 0 {
            return Err(GfxError::invalid_argument(
                "write_buffer offset and length must be multiples of 4",
            ));
        }
        validation::buffer_range(&info, offset, size, "write_buffer")?;

        self.with_staging(data, size, |core, staging| {
            core.execute("gfx.write_buffer", |encoder| {
                encoder.copy_buffer_to_buffer(&CopyBufferToBuffer {
                    source: staging,
                    source_offset: 0,
                    destination: buffer,
                    destination_offset: offset,
                    size,
                })
            })
        })
    }

    pub fn write_texture(&mut self, write: &TextureWrite, data: &[u8]) -> Result<()> {
        let info = self.texture_info(write.texture)?;
        if !info.usage.contains(TextureUsages::COPY_DST) {
            return Err(GfxError::invalid_argument("write_texture target lacks COPY_DST usage"));
        }
        let extent = write.extent;
        let tight = info.format.bytes_per_pixel() as usize * extent.width as usize;
        let pitch = validation::row_pitch(info.format, extent.width, write.bytes_per_row)? as usize;
        let rows = extent.height as usize * extent.depth as usize;
        if rows == 0 || tight == 0 {
            return Err(GfxError::invalid_argument("write_texture extent must be non-zero"));
        }
        let needed = validation::texture_copy_footprint(info.format, extent, write.bytes_per_row)?;
        if (data.len() as u64) < needed {
            return Err(GfxError::invalid_argument(format!(
                "write_texture needs {needed} bytes, got {}",
                data.len()
            )));
        }

        let padded = align_up(tight as u64, validation::ROW_PITCH_ALIGNMENT as u64) as usize;
        let staged_len = padded
            .checked_mul(rows)
            .ok_or_else(|| GfxError::invalid_argument("write_texture region is too large"))?;
        let mut staged = vec![0u8; staged_len];
        for row in 0..rows {
            let src = &data[row * pitch..row * pitch + tight];
            staged[row * padded..row * padded + tight].copy_from_slice(src);
        }

        let write = *write;
        self.with_staging(&staged, staged.len() as u64, |core, staging| {
            core.execute("gfx.write_texture", |encoder| {
                encoder.copy_buffer_to_texture(&CopyBufferToTexture {
                    source: staging,
                    source_offset: 0,
                    bytes_per_row: padded as u32,
                    destination: write.texture,
                    origin: write.origin,
                    extent,
                    mip_level: write.mip_level,
                    final_layout: write.final_layout,
                })
            })
        })
    }

    // Presentation

    pub fn surface_formats(&self, surface: &B::Surface) -> Result<Vec<TextureFormat>> {
        self.backend.surface_formats(surface)
    }

    pub fn surface_present_modes(&self, surface: &B::Surface) -> Result<Vec<PresentMode>> {
        self.backend.surface_present_modes(surface)
    }

    pub fn create_swapchain(
        &mut self,
        surface: &B::Surface,
        desc: &SwapchainDescriptor<'_>,
    ) -> Result<Handle<Swapchain>> {
        validation::swapchain_descriptor(desc)?;
        let (native, views) = self.backend.create_swapchain(surface, desc)?;
        let count = views.len() as u32;
        let extent = Extent3D::new(desc.width, desc.height, 1);
        let mut images = Vec::with_capacity(views.len());
        for view in views {
            let info = TextureViewInfo {
                texture: None,
                view_type: TextureViewType::D2,
                format: desc.format,
                base_mip_level: 0,
                mip_level_count: 1,
                base_array_layer: 0,
                array_layer_count: 1,
                extent,
                sample_count: SampleCount::S1,
            };
            match self.pools.texture_views.insert(Record::new(view, info)) {
                Some(handle) => images.push(handle),
                None => return Err(GfxError::OutOfMemory),
            }
        }
        let state = SwapchainState {
            info: SwapchainInfo {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                image_count: count,
                present_mode: desc.present_mode,
            },
            images,
            acquired: None,
        };
        log::info!(
            "created swapchain {}x{} with {count} images",
            desc.width,
            desc.height
        );
        self.pools
            .swapchains
            .insert(Record::new(native, state))
            .ok_or(GfxError::OutOfMemory)
    }

    pub fn destroy_swapchain(&mut self, handle: Handle<Swapchain>) -> Result<()> {
        let record = self
            .pools
            .swapchains
            .release(handle)
            .ok_or_else(|| already_destroyed("swapchain"))?;
        for view in &record.info.images {
            if let Some(view) = self.pools.texture_views.release(*view) {
                self.backend.destroy_texture_view(view.native);
            }
        }
        self.backend.destroy_swapchain(record.native);
        Ok(())
    }

    pub fn swapchain_info(&self, handle: Handle<Swapchain>) -> Result<SwapchainInfo> {
        Ok(self.pools.swapchain(handle)?.info.info)
    }

    pub fn swapchain_image_view(&self, handle: Handle<Swapchain>, index: u32) -> Result<Handle<TextureView>> {
        let record = self.pools.swapchain(handle)?;
        record
            .info
            .images
            .get(index as usize)
            .copied()
            .ok_or_else(|| GfxError::invalid_argument(format!("swapchain has no image {index}")))
    }

    pub fn acquire_next_image(
        &mut self,
        handle: Handle<Swapchain>,
        timeout_ns: u64,
        semaphore: Option<Handle<Semaphore>>,
        fence: Option<Handle<Fence>>,
    ) -> Result<AcquireStatus> {
        let semaphore = match semaphore {
            Some(s) => Some(
                &self
                    .pools
                    .semaphores
                    .get_ref(s)
                    .ok_or_else(|| GfxError::invalid_argument("stale semaphore handle"))?
                    .native,
            ),
            None => None,
        };
        let fence = match fence {
            Some(f) => Some(
                &self
                    .pools
                    .fences
                    .get_ref(f)
                    .ok_or_else(|| GfxError::invalid_argument("stale fence handle"))?
                    .native,
            ),
            None => None,
        };
        let record = self
            .pools
            .swapchains
            .get_mut_ref(handle)
            .ok_or_else(|| GfxError::invalid_argument("stale swapchain handle"))?;
        let (status, fresh) =
            self.backend
                .acquire_next_image(&mut record.native, timeout_ns, semaphore, fence)?;
        let Some(index) = status.image_index() else {
            return Ok(status);
        };
        record.info.acquired = Some(index);
        let view = record.info.images.get(index as usize).copied();

        if let (Some(fresh), Some(view)) = (fresh, view) {
            if let Some(slot) = self.pools.texture_views.get_mut_ref(view) {
                let old = std::mem::replace(&mut slot.native, fresh);
                self.backend.destroy_texture_view(old);
            }
        }
        Ok(status)
    }

    pub fn present(&mut self, handle: Handle<Swapchain>, wait_semaphores: &[Handle<Semaphore>]) -> Result<()> {
        let semaphores = &self.pools.semaphores;
        let waits = wait_semaphores
            .iter()
            .map(|s| {
                semaphores
                    .get_ref(*s)
                    .map(|r| &r.native)
                    .ok_or_else(|| GfxError::invalid_argument("stale semaphore handle"))
            })
            .collect::<Result<Vec<_>>>()?;
        let record = self
            .pools
            .swapchains
            .get_mut_ref(handle)
            .ok_or_else(|| GfxError::invalid_argument("stale swapchain handle"))?;
        if record.info.acquired.take().is_none() {
            return Err(GfxError::invalid_state("present without an acquired image"));
        }
        self.backend.present(&mut record.native, &waits)
    }

    fn destroy_all(&mut self) {
        let swapchains = self.pools.swapchains.drain();
        for swapchain in swapchains {
            for view in &swapchain.info.images {
                if let Some(view) = self.pools.texture_views.release(*view) {
                    self.backend.destroy_texture_view(view.native);
                }
            }
            self.backend.destroy_swapchain(swapchain.native);
        }
        for r in self.pools.framebuffers.drain() {
            self.backend.destroy_framebuffer(r.native);
        }
        for r in self.pools.render_pipelines.drain() {
            self.backend.destroy_render_pipeline(r.native);
        }
        for r in self.pools.compute_pipelines.drain() {
            self.backend.destroy_compute_pipeline(r.native);
        }
        for r in self.pools.bind_groups.drain() {
            self.backend.destroy_bind_group(r.native);
        }
        for r in self.pools.bind_group_layouts.drain() {
            self.backend.destroy_bind_group_layout(r.native);
        }
        for r in self.pools.render_passes.drain() {
            self.backend.destroy_render_pass(r.native);
        }
        for r in self.pools.shaders.drain() {
            self.backend.destroy_shader(r.native);
        }
        for r in self.pools.samplers.drain() {
            self.backend.destroy_sampler(r.native);
        }
        for r in self.pools.texture_views.drain() {
            self.backend.destroy_texture_view(r.native);
        }
        for r in self.pools.textures.drain() {
            self.backend.destroy_texture(r.native);
        }
        for mut r in self.pools.buffers.drain() {
            if r.info.mapped.is_some() {
                self.backend.unmap_buffer(&mut r.native);
            }
            self.backend.destroy_buffer(r.native);
        }
        for r in self.pools.fences.drain() {
            self.backend.destroy_fence(r.native);
        }
        for r in self.pools.semaphores.drain() {
            self.backend.destroy_semaphore(r.native);
        }
        for r in self.pools.query_sets.drain() {
            self.backend.destroy_query_set(r.native);
        }
    }
}

impl<B: GpuBackend> Drop for DeviceCore<B> {
    fn drop(&mut self) {
        if let Err(err) = self.backend.wait_idle() {
            log::error!("wait_idle before device teardown failed: {err}");
        }
        self.destroy_all();
        log::info!("{:?} device {} destroyed", B::KIND, self.id);
    }
}

//===----------------------------------------------------------------------===//
// Front end
//===----------------------------------------------------------------------===//

/// Command lists and synchronization for one [`Queue::submit`].
#[derive(Default)]
pub struct SubmitInfo<'a> {
    pub command_buffers: &'a [&'a CommandBuffer],
    pub wait_semaphores: &'a [SemaphoreSubmit],
    pub signal_semaphores: &'a [SemaphoreSubmit],
    pub signal_fence: Option<Handle<Fence>>,
}

pub(crate) enum DeviceInner {
    #[cfg(feature = "gfx-vulkan")]
    Vulkan(DeviceCore<super::vulkan::Context>),
    #[cfg(feature = "gfx-webgpu")]
    WebGpu(DeviceCore<super::webgpu::Context>),
}

macro_rules! with_core {
    ($inner:expr, $core:ident => $body:expr) => {
        match $inner {
            #[cfg(feature = "gfx-vulkan")]
            DeviceInner::Vulkan($core) => $body,
            #[cfg(feature = "gfx-webgpu")]
            DeviceInner::WebGpu($core) => $body,
        }
    };
}

macro_rules! forward {
    ($($(#[$meta:meta])* fn $name:ident(&self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&self $(, $arg: $ty)*) -> $ret {
                with_core!(&self.inner, core => core.$name($($arg),*))
            }
        )*
    };
}

macro_rules! forward_mut {
    ($($(#[$meta:meta])* fn $name:ident(&mut self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&mut self $(, $arg: $ty)*) -> $ret {
                with_core!(&mut self.inner, core => core.$name($($arg),*))
            }
        )*
    };
}

/// Logical GPU created from an [`crate::Adapter`].
///
/// Owns every resource created through it. Dropping the device waits for the
/// queue to drain and destroys whatever is still alive.
pub struct Device {
    pub(crate) inner: DeviceInner,
}

impl Device {
    pub(crate) fn new(inner: DeviceInner) -> Self {
        Self { inner }
    }

    /// The single submission queue of this device.
    pub fn queue(&mut self) -> Queue<'_> {
        Queue { device: self }
    }

    forward! {
        fn backend(&self) -> Backend;
        fn limits(&self) -> DeviceLimits;
        fn supports_shader_format(&self, source: ShaderSourceType) -> bool;
        /// Block until all submitted work has completed.
        fn wait_idle(&self) -> Result<()>;
        fn buffer_info(&self, buffer: Handle<Buffer>) -> Result<BufferInfo>;
        /// Copy mapped bytes starting at buffer offset `offset` into `out`.
        fn read_mapped(&self, buffer: Handle<Buffer>, offset: u64, out: &mut [u8]) -> Result<()>;
        fn texture_info(&self, texture: Handle<Texture>) -> Result<TextureInfo>;
        /// Layout the texture was left in by the last replayed command.
        fn texture_layout(&self, texture: Handle<Texture>) -> Result<TextureLayout>;
        fn texture_view_info(&self, view: Handle<TextureView>) -> Result<TextureViewInfo>;
        fn semaphore_type(&self, semaphore: Handle<Semaphore>) -> Result<SemaphoreType>;
        /// Current counter of a timeline semaphore.
        fn semaphore_value(&self, semaphore: Handle<Semaphore>) -> Result<u64>;
        /// Block until a timeline semaphore reaches `value`.
        fn semaphore_wait(&self, semaphore: Handle<Semaphore>, value: u64, timeout_ns: u64) -> Result<WaitStatus>;
        fn query_set_info(&self, query_set: Handle<QuerySet>) -> Result<QuerySetInfo>;
        fn fence_is_signaled(&self, fence: Handle<Fence>) -> Result<bool>;
        /// Wait for one fence. Only [`crate::TIMEOUT_INFINITE`] blocks forever.
        fn fence_wait(&self, fence: Handle<Fence>, timeout_ns: u64) -> Result<WaitStatus>;
        fn wait_for_fences(&self, fences: &[Handle<Fence>], wait_all: bool, timeout_ns: u64) -> Result<WaitStatus>;
        fn create_command_encoder(&self, label: Option<&str>) -> CommandEncoder;
        fn swapchain_info(&self, swapchain: Handle<Swapchain>) -> Result<SwapchainInfo>;
        fn swapchain_image_view(&self, swapchain: Handle<Swapchain>, index: u32) -> Result<Handle<TextureView>>;
    }

    forward_mut! {
        fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<Handle<Buffer>>;
        fn destroy_buffer(&mut self, buffer: Handle<Buffer>) -> Result<()>;
        /// Map a range for host access. `size == 0` maps to the end of the
        /// buffer. Blocks until the range is available.
        fn map_buffer(&mut self, buffer: Handle<Buffer>, offset: u64, size: u64, mode: MapMode) -> Result<()>;
        fn write_mapped(&mut self, buffer: Handle<Buffer>, offset: u64, data: &[u8]) -> Result<()>;
        fn unmap_buffer(&mut self, buffer: Handle<Buffer>) -> Result<()>;
        fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<Handle<Texture>>;
        fn destroy_texture(&mut self, texture: Handle<Texture>) -> Result<()>;
        fn create_texture_view(&mut self, texture: Handle<Texture>, desc: &TextureViewDescriptor<'_>) -> Result<Handle<TextureView>>;
        fn destroy_texture_view(&mut self, view: Handle<TextureView>) -> Result<()>;
        fn create_sampler(&mut self, desc: &SamplerDescriptor<'_>) -> Result<Handle<Sampler>>;
        fn destroy_sampler(&mut self, sampler: Handle<Sampler>) -> Result<()>;
        fn create_shader(&mut self, desc: &ShaderDescriptor<'_>) -> Result<Handle<Shader>>;
        fn destroy_shader(&mut self, shader: Handle<Shader>) -> Result<()>;
        fn create_bind_group_layout(&mut self, desc: &BindGroupLayoutDescriptor<'_>) -> Result<Handle<BindGroupLayout>>;
        fn destroy_bind_group_layout(&mut self, layout: Handle<BindGroupLayout>) -> Result<()>;
        /// Fails with `InvalidArgument`, without allocating anything, when the
        /// entries do not match the layout.
        fn create_bind_group(&mut self, desc: &BindGroupDescriptor<'_>) -> Result<Handle<BindGroup>>;
        fn destroy_bind_group(&mut self, group: Handle<BindGroup>) -> Result<()>;
        fn create_render_pass(&mut self, desc: &RenderPassDescriptor<'_>) -> Result<Handle<RenderPass>>;
        fn destroy_render_pass(&mut self, pass: Handle<RenderPass>) -> Result<()>;
        fn create_framebuffer(&mut self, desc: &FramebufferDescriptor<'_>) -> Result<Handle<Framebuffer>>;
        fn destroy_framebuffer(&mut self, framebuffer: Handle<Framebuffer>) -> Result<()>;
        fn create_render_pipeline(&mut self, desc: &RenderPipelineDescriptor<'_>) -> Result<Handle<RenderPipeline>>;
        fn destroy_render_pipeline(&mut self, pipeline: Handle<RenderPipeline>) -> Result<()>;
        fn create_compute_pipeline(&mut self, desc: &ComputePipelineDescriptor<'_>) -> Result<Handle<ComputePipeline>>;
        fn destroy_compute_pipeline(&mut self, pipeline: Handle<ComputePipeline>) -> Result<()>;
        fn create_fence(&mut self, signaled: bool) -> Result<Handle<Fence>>;
        fn destroy_fence(&mut self, fence: Handle<Fence>) -> Result<()>;
        fn fence_signal(&mut self, fence: Handle<Fence>) -> Result<()>;
        fn fence_reset(&mut self, fence: Handle<Fence>) -> Result<()>;
        fn create_semaphore(&mut self, desc: &SemaphoreDescriptor<'_>) -> Result<Handle<Semaphore>>;
        fn destroy_semaphore(&mut self, semaphore: Handle<Semaphore>) -> Result<()>;
        /// Set a timeline semaphore's counter from the host. Values must
        /// strictly increase.
        fn semaphore_signal(&mut self, semaphore: Handle<Semaphore>, value: u64) -> Result<()>;
        /// Timestamp sets fail with `FeatureNotSupported` on devices without
        /// timestamp support.
        fn create_query_set(&mut self, desc: &QuerySetDescriptor<'_>) -> Result<Handle<QuerySet>>;
        fn destroy_query_set(&mut self, query_set: Handle<QuerySet>) -> Result<()>;
        fn destroy_swapchain(&mut self, swapchain: Handle<Swapchain>) -> Result<()>;
        /// Next presentable image, or `Timeout`/`NotReady` when none became
        /// available in time. `Err(OutOfDate)` means the swapchain must be
        /// recreated.
        fn acquire_next_image(&mut self, swapchain: Handle<Swapchain>, timeout_ns: u64, semaphore: Option<Handle<Semaphore>>, fence: Option<Handle<Fence>>) -> Result<AcquireStatus>;
        fn present(&mut self, swapchain: Handle<Swapchain>, wait_semaphores: &[Handle<Semaphore>]) -> Result<()>;
    }

    pub fn surface_formats(&self, surface: &Surface) -> Result<Vec<TextureFormat>> {
        match (&self.inner, &surface.inner) {
            #[cfg(feature = "gfx-vulkan")]
            (DeviceInner::Vulkan(core), SurfaceInner::Vulkan(s)) => core.surface_formats(s),
            #[cfg(feature = "gfx-webgpu")]
            (DeviceInner::WebGpu(core), SurfaceInner::WebGpu(s)) => core.surface_formats(s),
            #[allow(unreachable_patterns)]
            _ => Err(backend_mismatch()),
        }
    }

    pub fn surface_present_modes(&self, surface: &Surface) -> Result<Vec<PresentMode>> {
        match (&self.inner, &surface.inner) {
            #[cfg(feature = "gfx-vulkan")]
            (DeviceInner::Vulkan(core), SurfaceInner::Vulkan(s)) => core.surface_present_modes(s),
            #[cfg(feature = "gfx-webgpu")]
            (DeviceInner::WebGpu(core), SurfaceInner::WebGpu(s)) => core.surface_present_modes(s),
            #[allow(unreachable_patterns)]
            _ => Err(backend_mismatch()),
        }
    }

    pub fn create_swapchain(
        &mut self,
        surface: &Surface,
        desc: &SwapchainDescriptor<'_>,
    ) -> Result<Handle<Swapchain>> {
        match (&mut self.inner, &surface.inner) {
            #[cfg(feature = "gfx-vulkan")]
            (DeviceInner::Vulkan(core), SurfaceInner::Vulkan(s)) => core.create_swapchain(s, desc),
            #[cfg(feature = "gfx-webgpu")]
            (DeviceInner::WebGpu(core), SurfaceInner::WebGpu(s)) => core.create_swapchain(s, desc),
            #[allow(unreachable_patterns)]
            _ => Err(backend_mismatch()),
        }
    }

    pub(crate) fn execute<F>(&mut self, label: &str, record: F) -> Result<()>
    where
        F: FnOnce(&mut CommandEncoder) -> Result<()>,
    {
        with_core!(&mut self.inner, core => core.execute(label, record))
    }
}

fn backend_mismatch() -> GfxError {
    GfxError::invalid_argument("surface and device belong to different backends")
}

/// Sole submission point of a [`Device`]. Submissions execute in call order.
pub struct Queue<'a> {
    device: &'a mut Device,
}

impl Queue<'_> {
    pub fn submit(&mut self, info: &SubmitInfo<'_>) -> Result<()> {
        with_core!(&mut self.device.inner, core => core.submit(info))
    }

    /// Upload `data` into `buffer` at `offset` through a staging buffer.
    /// Blocks until the copy has completed.
    pub fn write_buffer(&mut self, buffer: Handle<Buffer>, offset: u64, data: &[u8]) -> Result<()> {
        with_core!(&mut self.device.inner, core => core.write_buffer(buffer, offset, data))
    }

    /// Upload texel rows into a texture region. Blocks until done.
    pub fn write_texture(&mut self, write: &TextureWrite, data: &[u8]) -> Result<()> {
        with_core!(&mut self.device.inner, core => core.write_texture(write, data))
    }

    pub fn wait_idle(&mut self) -> Result<()> {
        self.device.wait_idle()
    }
}
