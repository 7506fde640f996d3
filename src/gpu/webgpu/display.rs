//! WebGPU surfaces and swapchains.
//!
//! A wgpu surface hands out one frame at a time, so the swapchain exposes
//! `image_count` placeholder views that receive a real view when their index
//! is acquired.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Arc;

use raw_window_handle as rwh;

use super::conversions::{present_mode_from_wgpu, texture_format, texture_format_from_wgpu};
use super::{Context, InstanceShared, Surface, WgpuFence, WgpuSemaphore, WgpuSwapchain, WgpuTextureView};
use crate::gpu::error::{GfxError, Result};
use crate::gpu::state::LayoutState;
use crate::gpu::structs::*;

fn non_null(ptr: *mut c_void, what: &str) -> Result<NonNull<c_void>> {
    NonNull::new(ptr).ok_or_else(|| GfxError::invalid_argument(format!("{what} is null")))
}

/// Raw handle pair wgpu understands for `window`.
fn surface_target(window: PlatformWindowHandle) -> Result<wgpu::SurfaceTargetUnsafe> {
    let (raw_display_handle, raw_window_handle) = match window {
        PlatformWindowHandle::Xlib { display, window } => (
            rwh::RawDisplayHandle::Xlib(rwh::XlibDisplayHandle::new(NonNull::new(display), 0)),
            rwh::RawWindowHandle::Xlib(rwh::XlibWindowHandle::new(window as std::os::raw::c_ulong)),
        ),
        PlatformWindowHandle::Xcb { connection, window } => {
            let window = std::num::NonZeroU32::new(window)
                .ok_or_else(|| GfxError::invalid_argument("XCB window id is zero"))?;
            (
                rwh::RawDisplayHandle::Xcb(rwh::XcbDisplayHandle::new(NonNull::new(connection), 0)),
                rwh::RawWindowHandle::Xcb(rwh::XcbWindowHandle::new(window)),
            )
        }
        PlatformWindowHandle::Wayland { display, surface } => (
            rwh::RawDisplayHandle::Wayland(rwh::WaylandDisplayHandle::new(non_null(
                display,
                "Wayland display",
            )?)),
            rwh::RawWindowHandle::Wayland(rwh::WaylandWindowHandle::new(non_null(
                surface,
                "Wayland surface",
            )?)),
        ),
        PlatformWindowHandle::Win32 { hinstance, hwnd } => {
            let hwnd = std::num::NonZeroIsize::new(hwnd as isize)
                .ok_or_else(|| GfxError::invalid_argument("HWND is null"))?;
            let mut handle = rwh::Win32WindowHandle::new(hwnd);
            handle.hinstance = std::num::NonZeroIsize::new(hinstance as isize);
            (
                rwh::RawDisplayHandle::Windows(rwh::WindowsDisplayHandle::new()),
                rwh::RawWindowHandle::Win32(handle),
            )
        }
        PlatformWindowHandle::Android { window } => (
            rwh::RawDisplayHandle::Android(rwh::AndroidDisplayHandle::new()),
            rwh::RawWindowHandle::AndroidNdk(rwh::AndroidNdkWindowHandle::new(non_null(
                window,
                "ANativeWindow",
            )?)),
        ),
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        PlatformWindowHandle::Metal { layer } => {
            return Ok(wgpu::SurfaceTargetUnsafe::CoreAnimationLayer(layer));
        }
        #[cfg(not(any(target_os = "macos", target_os = "ios")))]
        PlatformWindowHandle::Metal { .. } => {
            return Err(GfxError::PlatformUnsupported(
                "Metal layers are only available on Apple platforms".into(),
            ))
        }
    };
    Ok(wgpu::SurfaceTargetUnsafe::RawHandle {
        raw_display_handle,
        raw_window_handle,
    })
}

impl InstanceShared {
    pub fn create_surface(&self, desc: &SurfaceDescriptor<'_>) -> Result<Surface> {
        if !self.surfaces {
            return Err(GfxError::PlatformUnsupported(
                "instance was created without InstanceFeatures::SURFACE".into(),
            ));
        }
        let target = surface_target(desc.window)?;
        // The caller keeps the window alive for as long as the surface.
        let raw = unsafe { self.raw.create_surface_unsafe(target) }
            .map_err(|err| GfxError::PlatformUnsupported(format!("surface creation failed: {err}")))?;
        log::debug!(target: "gfx::webgpu", "created {} surface", desc.window.platform_name());
        Ok(Surface { raw })
    }
}

impl Context {
    fn require_swapchain(&self) -> Result<()> {
        if self.features.contains(DeviceFeatures::SWAPCHAIN) {
            Ok(())
        } else {
            Err(GfxError::FeatureNotSupported(
                "device was created without DeviceFeatures::SWAPCHAIN".into(),
            ))
        }
    }

    pub(super) fn formats(&self, surface: &Surface) -> Result<Vec<TextureFormat>> {
        let caps = surface.raw.get_capabilities(&self.adapter);
        let mut out: Vec<TextureFormat> = caps
            .formats
            .into_iter()
            .filter_map(texture_format_from_wgpu)
            .collect();
        out.dedup();
        Ok(out)
    }

    pub(super) fn present_modes(&self, surface: &Surface) -> Result<Vec<PresentMode>> {
        let caps = surface.raw.get_capabilities(&self.adapter);
        Ok(caps
            .present_modes
            .into_iter()
            .filter_map(present_mode_from_wgpu)
            .collect())
    }

    /// `Surface::configure` aborts on an invalid configuration, so every
    /// field is checked against the surface capabilities first.
    pub(super) fn make_swapchain(
        &mut self,
        surface: &Arc<Surface>,
        desc: &SwapchainDescriptor<'_>,
    ) -> Result<(WgpuSwapchain, Vec<WgpuTextureView>)> {
        self.require_swapchain()?;
        let caps = surface.raw.get_capabilities(&self.adapter);
        if caps.formats.is_empty() {
            return Err(GfxError::PlatformUnsupported(
                "the adapter cannot present to this surface".into(),
            ));
        }
        let format = texture_format(desc.format)?;
        if !caps.formats.contains(&format) {
            return Err(GfxError::FeatureNotSupported(format!(
                "surface cannot present {:?}",
                desc.format
            )));
        }
        let max = self.limits.max_texture_dimension_2d;
        if desc.width > max || desc.height > max {
            return Err(GfxError::invalid_argument(format!(
                "swapchain extent {}x{} exceeds the device limit of {max}",
                desc.width, desc.height
            )));
        }

        let wanted: wgpu::PresentMode = desc.present_mode.into();
        let present_mode = if caps.present_modes.contains(&wanted) {
            wanted
        } else {
            log::warn!(target: "gfx::webgpu", "{:?} is not supported by the surface, using FIFO", desc.present_mode);
            wgpu::PresentMode::Fifo
        };
        let usage = (wgpu::TextureUsages::from(desc.usage) | wgpu::TextureUsages::RENDER_ATTACHMENT)
            & caps.usages;

        let config = wgpu::SurfaceConfiguration {
            usage,
            format,
            width: desc.width,
            height: desc.height,
            present_mode,
            desired_maximum_frame_latency: desc.image_count.saturating_sub(1).max(1),
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: Vec::new(),
        };
        surface.raw.configure(&self.device, &config);

        let layouts: Vec<Arc<LayoutState>> = (0..desc.image_count)
            .map(|_| Arc::new(LayoutState::default()))
            .collect();
        let views = layouts
            .iter()
            .map(|layout| WgpuTextureView {
                raw: None,
                layout: layout.clone(),
            })
            .collect();
        Ok((
            WgpuSwapchain {
                surface: surface.clone(),
                config,
                current: None,
                next: 0,
                layouts,
            },
            views,
        ))
    }

    pub(super) fn free_swapchain(&mut self, mut swapchain: WgpuSwapchain) {
        if swapchain.current.take().is_some() {
            log::debug!(target: "gfx::webgpu", "dropping an acquired frame with its swapchain");
        }
    }

    /// Frames become available on the CPU timeline, so `fence` is signaled
    /// before returning and `semaphore` carries nothing. `None` means wgpu
    /// timed out waiting for a frame.
    pub(super) fn acquire(
        &mut self,
        swapchain: &mut WgpuSwapchain,
        semaphore: Option<&WgpuSemaphore>,
        fence: Option<&WgpuFence>,
    ) -> Result<Option<(u32, WgpuTextureView)>> {
        let _ = semaphore;
        if swapchain.current.take().is_some() {
            log::warn!(target: "gfx::webgpu", "acquired a new frame before presenting the previous one");
        }
        let frame = match swapchain.surface.raw.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Outdated) => return Err(GfxError::OutOfDate),
            Err(wgpu::SurfaceError::Lost) => return Err(GfxError::SurfaceLost),
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(GfxError::OutOfMemory),
            Err(wgpu::SurfaceError::Timeout) => {
                log::debug!(target: "gfx::webgpu", "timed out waiting for a swapchain image");
                return Ok(None);
            }
        };
        if frame.suboptimal {
            log::debug!(target: "gfx::webgpu", "swapchain is suboptimal for its surface");
        }

        let count = swapchain.layouts.len() as u32;
        let index = swapchain.next;
        swapchain.next = (index + 1) % count.max(1);
        let layout = swapchain
            .layouts
            .get(index as usize)
            .cloned()
            .ok_or_else(|| GfxError::invalid_state("swapchain has no images"))?;
        layout.set(TextureLayout::Undefined);

        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("gfx.swapchain"),
            format: Some(swapchain.config.format),
            ..Default::default()
        });
        swapchain.current = Some((index, frame));
        if let Some(fence) = fence {
            fence.cell.set(true);
        }
        Ok(Some((
            index,
            WgpuTextureView {
                raw: Some(view),
                layout,
            },
        )))
    }

    /// The queue has already executed everything submitted before this
    /// call, so `wait` needs no native counterpart.
    pub(super) fn present_image(&mut self, swapchain: &mut WgpuSwapchain, wait: &[&WgpuSemaphore]) -> Result<()> {
        let _ = wait;
        let (index, frame) = swapchain
            .current
            .take()
            .ok_or_else(|| GfxError::invalid_state("no swapchain image is acquired"))?;
        frame.present();
        if let Some(layout) = swapchain.layouts.get(index as usize) {
            layout.set(TextureLayout::PresentSrc);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_window_ids_are_rejected() {
        let xcb = PlatformWindowHandle::Xcb {
            connection: std::ptr::null_mut(),
            window: 0,
        };
        assert!(matches!(surface_target(xcb), Err(GfxError::InvalidArgument(_))));
        let wayland = PlatformWindowHandle::Wayland {
            display: std::ptr::null_mut(),
            surface: std::ptr::null_mut(),
        };
        assert!(matches!(surface_target(wayland), Err(GfxError::InvalidArgument(_))));
    }
}
