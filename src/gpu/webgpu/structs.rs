//! Native object types stored in the device arenas for the WebGPU backend.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::gpu::error::{GfxError, Result};
use crate::gpu::state::LayoutState;
use crate::gpu::structs::TextureLayout;

pub struct WgpuBuffer {
    pub(super) raw: wgpu::Buffer,
    /// `(offset, size)` of the range mapped by the last `map_buffer`.
    pub(super) mapped: Option<(u64, u64)>,
}

pub struct WgpuTexture {
    pub(super) raw: wgpu::Texture,
    /// WebGPU has no layouts; this mirrors what the Vulkan backend would
    /// report so both answer `texture_layout` the same way.
    pub(super) layout: Arc<LayoutState>,
}

pub struct WgpuTextureView {
    /// `None` for a swapchain slot whose image has not been acquired yet.
    pub(super) raw: Option<wgpu::TextureView>,
    pub(super) layout: Arc<LayoutState>,
}

impl WgpuTextureView {
    pub(super) fn raw(&self) -> Result<&wgpu::TextureView> {
        self.raw
            .as_ref()
            .ok_or_else(|| GfxError::invalid_state("swapchain image used before it was acquired"))
    }
}

pub struct WgpuSampler {
    pub(super) raw: wgpu::Sampler,
}

pub struct WgpuShader {
    pub(super) raw: wgpu::ShaderModule,
}

pub struct WgpuBindGroupLayout {
    pub(super) raw: wgpu::BindGroupLayout,
}

pub struct WgpuBindGroup {
    pub(super) raw: wgpu::BindGroup,
    /// Textures bound by this group and the layout a binding implies.
    pub(super) images: Vec<(Arc<LayoutState>, TextureLayout)>,
}

/// Render passes are plain attachment descriptions on WebGPU; the front
/// end's [`crate::RenderPassInfo`] carries everything replay needs.
pub struct WgpuRenderPass;

/// Attachment views are looked up from the framebuffer's info at replay,
/// so swapchain views replaced on acquire are always current.
pub struct WgpuFramebuffer;

pub struct WgpuRenderPipeline {
    pub(super) raw: wgpu::RenderPipeline,
}

pub struct WgpuComputePipeline {
    pub(super) raw: wgpu::ComputePipeline,
}

pub struct WgpuQuerySet {
    pub(super) raw: wgpu::QuerySet,
}

/// Signal state of a fence plus the epoch it belongs to.
///
/// Every host signal, reset and submission starts a new epoch. A work-done
/// callback only signals the epoch it was registered for, so a callback from
/// an older submission can never undo a later reset.
pub(super) struct FenceCell {
    state: Mutex<(bool, u64)>,
}

impl FenceCell {
    pub(super) fn new(signaled: bool) -> Self {
        Self {
            state: Mutex::new((signaled, 0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, (bool, u64)> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn is_signaled(&self) -> bool {
        self.lock().0
    }

    /// Force the state from the host.
    pub(super) fn set(&self, signaled: bool) {
        let mut state = self.lock();
        *state = (signaled, state.1.wrapping_add(1));
    }

    /// Unsignal for a new submission and return its epoch.
    pub(super) fn arm(&self) -> u64 {
        let mut state = self.lock();
        *state = (false, state.1.wrapping_add(1));
        state.1
    }

    pub(super) fn complete(&self, epoch: u64) {
        let mut state = self.lock();
        if state.1 == epoch {
            state.0 = true;
        }
    }
}

pub struct WgpuFence {
    pub(super) cell: Arc<FenceCell>,
}

impl WgpuFence {
    pub(super) fn new(signaled: bool) -> Self {
        Self {
            cell: Arc::new(FenceCell::new(signaled)),
        }
    }
}

/// The queue executes in submission order, so binary semaphores carry no
/// native object.
pub struct WgpuSemaphore;

pub struct Surface {
    pub(super) raw: wgpu::Surface<'static>,
}

pub struct WgpuSwapchain {
    pub(super) surface: Arc<Surface>,
    pub(super) config: wgpu::SurfaceConfiguration,
    /// Frame handed out by the last acquire and its index, consumed by
    /// present.
    pub(super) current: Option<(u32, wgpu::SurfaceTexture)>,
    /// Index the next acquired frame is reported under.
    pub(super) next: u32,
    pub(super) layouts: Vec<Arc<LayoutState>>,
}
