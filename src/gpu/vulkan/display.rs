use std::ffi::CStr;
use std::sync::Arc;

#[cfg(any(target_os = "macos", target_os = "ios"))]
use ash::extensions::ext;
use ash::extensions::khr;
use ash::vk;

use super::conversions::{image_usage, layout_access, present_mode_from_vk, texture_format_from_vk};
use super::{
    creation_error, Context, InstanceShared, Surface, VkFence, VkSemaphore, VkSwapchain,
    VkTextureView,
};
use crate::gpu::error::{GfxError, Result};
use crate::gpu::state::LayoutState;
use crate::gpu::structs::*;

/// A foreign window in the form `ash_window` consumes.
pub(super) struct NativeWindow(rwh_04::RawWindowHandle);

unsafe impl rwh_04::HasRawWindowHandle for NativeWindow {
    fn raw_window_handle(&self) -> rwh_04::RawWindowHandle {
        self.0
    }
}

impl NativeWindow {
    /// `None` for handles `ash_window` cannot build a surface from.
    pub(super) fn from_platform(window: &PlatformWindowHandle) -> Option<Self> {
        use rwh_04::*;
        let raw = match *window {
            PlatformWindowHandle::Xlib { display, window } => {
                let mut handle = XlibHandle::empty();
                handle.display = display;
                handle.window = window as std::os::raw::c_ulong;
                RawWindowHandle::Xlib(handle)
            }
            PlatformWindowHandle::Xcb { connection, window } => {
                let mut handle = XcbHandle::empty();
                handle.connection = connection;
                handle.window = window;
                RawWindowHandle::Xcb(handle)
            }
            PlatformWindowHandle::Wayland { display, surface } => {
                let mut handle = WaylandHandle::empty();
                handle.display = display;
                handle.surface = surface;
                RawWindowHandle::Wayland(handle)
            }
            PlatformWindowHandle::Win32 { hinstance, hwnd } => {
                let mut handle = Win32Handle::empty();
                handle.hinstance = hinstance;
                handle.hwnd = hwnd;
                RawWindowHandle::Win32(handle)
            }
            PlatformWindowHandle::Android { window } => {
                let mut handle = AndroidNdkHandle::empty();
                handle.a_native_window = window;
                RawWindowHandle::AndroidNdk(handle)
            }
            PlatformWindowHandle::Metal { .. } => return None,
        };
        Some(Self(raw))
    }

    /// Instance extensions a surface for this kind of window needs, minus
    /// `VK_KHR_surface` itself.
    pub(super) fn required_extensions(&self) -> Vec<&'static CStr> {
        match ash_window::enumerate_required_extensions(self) {
            Ok(names) => names
                .iter()
                .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
                .filter(|&name| name != khr::Surface::name())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn require_extensions(shared: &InstanceShared, names: &[&'static CStr], platform: &str) -> Result<()> {
    match names.iter().find(|name| !shared.surface_extensions.contains(name)) {
        None => Ok(()),
        Some(name) => Err(GfxError::PlatformUnsupported(format!(
            "{platform} surfaces need {name:?}, which the Vulkan loader does not provide"
        ))),
    }
}

/// Create a presentable surface for a native window.
pub fn create_surface(shared: &Arc<InstanceShared>, desc: &SurfaceDescriptor<'_>) -> Result<Surface> {
    if shared.surface_loader.is_none() {
        return Err(GfxError::PlatformUnsupported(
            "instance was created without InstanceFeatures::SURFACE".into(),
        ));
    }
    let platform = desc.window.platform_name();

    let raw = match NativeWindow::from_platform(&desc.window) {
        Some(native) => {
            let required = native.required_extensions();
            if required.is_empty() {
                return Err(GfxError::PlatformUnsupported(format!(
                    "{platform} windows are not supported by this build"
                )));
            }
            require_extensions(shared, &required, platform)?;
            unsafe { ash_window::create_surface(&shared.entry, &shared.instance, &native, None) }
        }
        None => metal_surface(shared, &desc.window)?,
    }
    .map_err(|err| GfxError::PlatformUnsupported(format!("surface creation failed: {err}")))?;

    log::debug!(target: "gfx::vulkan", "created {platform} surface");
    Ok(Surface {
        raw,
        instance: shared.clone(),
    })
}

/// Layer-backed surfaces have no window handle `ash_window` understands.
#[cfg(any(target_os = "macos", target_os = "ios"))]
fn metal_surface(
    shared: &InstanceShared,
    window: &PlatformWindowHandle,
) -> Result<ash::prelude::VkResult<vk::SurfaceKHR>> {
    let PlatformWindowHandle::Metal { layer } = *window else {
        return Err(GfxError::PlatformUnsupported(format!(
            "{} windows are not supported by this build",
            window.platform_name()
        )));
    };
    require_extensions(shared, &[ext::MetalSurface::name()], "Metal")?;
    let info = vk::MetalSurfaceCreateInfoEXT::builder().layer(layer as *const vk::CAMetalLayer);
    Ok(unsafe {
        ext::MetalSurface::new(&shared.entry, &shared.instance).create_metal_surface(&info, None)
    })
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
fn metal_surface(
    _shared: &InstanceShared,
    window: &PlatformWindowHandle,
) -> Result<ash::prelude::VkResult<vk::SurfaceKHR>> {
    Err(GfxError::PlatformUnsupported(format!(
        "{} windows are not supported by this build",
        window.platform_name()
    )))
}

impl Drop for Surface {
    fn drop(&mut self) {
        if let Some(loader) = &self.instance.surface_loader {
            unsafe { loader.destroy_surface(self.raw, None) };
        }
    }
}

fn surface_loader(surface: &Surface) -> Result<&khr::Surface> {
    surface
        .instance
        .surface_loader
        .as_ref()
        .ok_or_else(|| GfxError::PlatformUnsupported("surface support is not enabled".into()))
}

fn color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

impl Context {
    fn swapchain_loader(&self) -> Result<&khr::Swapchain> {
        self.swapchain_loader.as_ref().ok_or_else(|| {
            GfxError::FeatureNotSupported("device was created without DeviceFeatures::SWAPCHAIN".into())
        })
    }

    pub(super) fn formats(&self, surface: &Surface) -> Result<Vec<TextureFormat>> {
        let loader = surface_loader(surface)?;
        let formats =
            unsafe { loader.get_physical_device_surface_formats(self.pdevice, surface.raw) }?;
        let mut out: Vec<TextureFormat> = formats
            .iter()
            .filter_map(|f| texture_format_from_vk(f.format))
            .collect();
        out.dedup();
        Ok(out)
    }

    pub(super) fn present_modes(&self, surface: &Surface) -> Result<Vec<PresentMode>> {
        let loader = surface_loader(surface)?;
        let modes =
            unsafe { loader.get_physical_device_surface_present_modes(self.pdevice, surface.raw) }?;
        Ok(modes.into_iter().filter_map(present_mode_from_vk).collect())
    }

    pub(super) fn make_swapchain(
        &mut self,
        surface: &Arc<Surface>,
        desc: &SwapchainDescriptor<'_>,
    ) -> Result<(VkSwapchain, Vec<VkTextureView>)> {
        let loader = self.swapchain_loader()?.clone();
        let surface_fns = surface_loader(surface)?;

        let supported = unsafe {
            surface_fns.get_physical_device_surface_support(self.pdevice, self.queue_family, surface.raw)
        }?;
        if !supported {
            return Err(GfxError::PlatformUnsupported(
                "the device queue cannot present to this surface".into(),
            ));
        }

        let caps = unsafe {
            surface_fns.get_physical_device_surface_capabilities(self.pdevice, surface.raw)
        }?;
        let extent = if caps.current_extent.width != u32::MAX {
            caps.current_extent
        } else {
            vk::Extent2D {
                width: desc
                    .width
                    .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
                height: desc
                    .height
                    .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
            }
        };
        if extent.width != desc.width || extent.height != desc.height {
            log::warn!(
                "surface dictates a {}x{} swapchain, {}x{} was requested",
                extent.width,
                extent.height,
                desc.width,
                desc.height
            );
        }

        let mut image_count = desc.image_count.max(caps.min_image_count);
        if caps.max_image_count > 0 {
            image_count = image_count.min(caps.max_image_count);
        }

        let format: vk::Format = desc.format.into();
        let formats =
            unsafe { surface_fns.get_physical_device_surface_formats(self.pdevice, surface.raw) }?;
        let surface_format = formats
            .iter()
            .find(|f| f.format == format)
            .copied()
            .ok_or_else(|| {
                GfxError::FeatureNotSupported(format!("surface cannot present {:?}", desc.format))
            })?;

        let wanted: vk::PresentModeKHR = desc.present_mode.into();
        let modes = unsafe {
            surface_fns.get_physical_device_surface_present_modes(self.pdevice, surface.raw)
        }?;
        let present_mode = if modes.contains(&wanted) {
            wanted
        } else {
            log::warn!("{:?} is not supported by the surface, using FIFO", desc.present_mode);
            vk::PresentModeKHR::FIFO
        };

        let usage = (image_usage(desc.usage, desc.format) | vk::ImageUsageFlags::COLOR_ATTACHMENT)
            & caps.supported_usage_flags;
        let composite_alpha = [
            vk::CompositeAlphaFlagsKHR::OPAQUE,
            vk::CompositeAlphaFlagsKHR::INHERIT,
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
            vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        ]
        .into_iter()
        .find(|mode| caps.supported_composite_alpha.contains(*mode))
        .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE);

        let raw = unsafe {
            loader.create_swapchain(
                &vk::SwapchainCreateInfoKHR::builder()
                    .surface(surface.raw)
                    .min_image_count(image_count)
                    .image_format(surface_format.format)
                    .image_color_space(surface_format.color_space)
                    .image_extent(extent)
                    .image_array_layers(1)
                    .image_usage(usage)
                    .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                    .pre_transform(caps.current_transform)
                    .composite_alpha(composite_alpha)
                    .present_mode(present_mode)
                    .clipped(true),
                None,
            )
        }
        .map_err(creation_error)?;

        let mut swapchain = VkSwapchain {
            raw,
            images: Vec::new(),
            present_ready: Vec::new(),
            layouts: Vec::new(),
            current: None,
            _surface: surface.clone(),
        };
        let mut views = Vec::new();
        match self.fill_swapchain(&loader, &mut swapchain, &mut views, desc) {
            Ok(()) => Ok((swapchain, views)),
            Err(err) => {
                for view in views {
                    unsafe { self.device.destroy_image_view(view.raw, None) };
                }
                self.free_swapchain(swapchain);
                Err(err)
            }
        }
    }

    fn fill_swapchain(
        &mut self,
        loader: &khr::Swapchain,
        swapchain: &mut VkSwapchain,
        views: &mut Vec<VkTextureView>,
        desc: &SwapchainDescriptor<'_>,
    ) -> Result<()> {
        swapchain.images = unsafe { loader.get_swapchain_images(swapchain.raw) }?;
        for (i, image) in swapchain.images.iter().enumerate() {
            let layout = Arc::new(LayoutState::default());
            swapchain.layouts.push(layout.clone());

            let raw = unsafe {
                self.device.create_image_view(
                    &vk::ImageViewCreateInfo::builder()
                        .image(*image)
                        .view_type(vk::ImageViewType::TYPE_2D)
                        .format(desc.format.into())
                        .subresource_range(color_range()),
                    None,
                )
            }
            .map_err(creation_error)?;
            if let Some(label) = desc.label {
                self.label(raw, Some(&format!("{label}[{i}]")), vk::ObjectType::IMAGE_VIEW);
            }
            views.push(VkTextureView {
                raw,
                image: *image,
                format: desc.format,
                full_range: color_range(),
                layout,
            });

            let semaphore = unsafe {
                self.device
                    .create_semaphore(&vk::SemaphoreCreateInfo::builder(), None)
            }
            .map_err(creation_error)?;
            swapchain.present_ready.push(semaphore);
        }
        Ok(())
    }

    pub(super) fn free_swapchain(&mut self, swapchain: VkSwapchain) {
        // Presentation engine work is not covered by fences.
        if let Err(err) = unsafe { self.device.device_wait_idle() } {
            log::error!("wait before destroying a swapchain failed: {err}");
        }
        unsafe {
            for semaphore in &swapchain.present_ready {
                self.device.destroy_semaphore(*semaphore, None);
            }
            if let Some(loader) = &self.swapchain_loader {
                loader.destroy_swapchain(swapchain.raw, None);
            }
        }
    }

    pub(super) fn acquire(
        &mut self,
        swapchain: &mut VkSwapchain,
        timeout_ns: u64,
        semaphore: Option<&VkSemaphore>,
        fence: Option<&VkFence>,
    ) -> Result<AcquireStatus> {
        if semaphore.map_or(false, |s| s.timeline) {
            return Err(GfxError::invalid_argument(
                "image acquisition can only signal binary semaphores",
            ));
        }
        let loader = self.swapchain_loader()?;
        let result = unsafe {
            loader.acquire_next_image(
                swapchain.raw,
                timeout_ns,
                semaphore.map_or(vk::Semaphore::null(), |s| s.raw),
                fence.map_or(vk::Fence::null(), |f| f.raw),
            )
        };
        let index = match result {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    log::debug!("swapchain is suboptimal for its surface");
                }
                index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Err(GfxError::OutOfDate),
            Err(vk::Result::TIMEOUT) => return Ok(AcquireStatus::Timeout),
            Err(vk::Result::NOT_READY) => return Ok(AcquireStatus::NotReady),
            Err(err) => return Err(err.into()),
        };

        // Contents of a freshly acquired image are not preserved.
        if let Some(layout) = swapchain.layouts.get(index as usize) {
            layout.set(TextureLayout::Undefined);
        }
        swapchain.current = Some(index);
        Ok(AcquireStatus::Acquired(index))
    }

    /// Move `image` into the present layout with a one-off submission that
    /// consumes `waits` and signals `signal`.
    fn present_fixup(
        &mut self,
        image: vk::Image,
        state: &LayoutState,
        waits: &[vk::Semaphore],
        signal: vk::Semaphore,
    ) -> Result<()> {
        self.pool.reclaim()?;
        let cmd = self.pool.begin()?;
        let old: vk::ImageLayout = state.replace(TextureLayout::PresentSrc).into();
        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old)
            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .src_access_mask(layout_access(old))
            .dst_access_mask(vk::AccessFlags::empty())
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(color_range())
            .build();
        let recorded = unsafe {
            self.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
            self.device.end_command_buffer(cmd)
        };
        if let Err(err) = recorded {
            self.pool.discard(vec![cmd]);
            return Err(err.into());
        }

        let tracking = self.pool.submission_fence()?;
        let stages = vec![vk::PipelineStageFlags::ALL_COMMANDS; waits.len()];
        let submit = vk::SubmitInfo::builder()
            .command_buffers(std::slice::from_ref(&cmd))
            .wait_semaphores(waits)
            .wait_dst_stage_mask(&stages)
            .signal_semaphores(std::slice::from_ref(&signal))
            .build();
        if let Err(err) = unsafe { self.device.queue_submit(self.queue, &[submit], tracking) } {
            self.pool.discard(vec![cmd]);
            return Err(err.into());
        }
        self.pool.retire(tracking, vec![cmd]);
        Ok(())
    }

    pub(super) fn present_image(&mut self, swapchain: &mut VkSwapchain, wait: &[&VkSemaphore]) -> Result<()> {
        if wait.iter().any(|s| s.timeline) {
            return Err(GfxError::invalid_argument(
                "presentation can only wait on binary semaphores",
            ));
        }
        let index = swapchain
            .current
            .take()
            .ok_or_else(|| GfxError::invalid_state("no swapchain image is acquired"))?;
        let slot = index as usize;
        let (image, state, ready) = match (
            swapchain.images.get(slot),
            swapchain.layouts.get(slot),
            swapchain.present_ready.get(slot),
        ) {
            (Some(image), Some(state), Some(ready)) => (*image, state.clone(), *ready),
            _ => return Err(GfxError::invalid_state("acquired index is out of range")),
        };

        let mut waits: Vec<vk::Semaphore> = wait.iter().map(|s| s.raw).collect();
        if state.get() != TextureLayout::PresentSrc {
            self.present_fixup(image, &state, &waits, ready)?;
            waits = vec![ready];
        }

        let loader = self.swapchain_loader()?;
        let result = unsafe {
            loader.queue_present(
                self.queue,
                &vk::PresentInfoKHR::builder()
                    .wait_semaphores(&waits)
                    .swapchains(std::slice::from_ref(&swapchain.raw))
                    .image_indices(std::slice::from_ref(&index)),
            )
        };
        match result {
            Ok(suboptimal) => {
                if suboptimal {
                    log::debug!("presented to a suboptimal swapchain");
                }
                Ok(())
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(GfxError::OutOfDate),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rwh_04::HasRawWindowHandle;

    #[test]
    fn platform_handles_become_ash_window_handles() {
        let display = 0x10 as *mut std::ffi::c_void;
        let xlib = PlatformWindowHandle::Xlib { display, window: 7 };
        let native = NativeWindow::from_platform(&xlib).unwrap();
        match native.raw_window_handle() {
            rwh_04::RawWindowHandle::Xlib(handle) => {
                assert_eq!(handle.display, display);
                assert_eq!(handle.window, 7);
            }
            other => panic!("unexpected handle {other:?}"),
        }

        let xcb = PlatformWindowHandle::Xcb { connection: display, window: 3 };
        assert!(matches!(
            NativeWindow::from_platform(&xcb).unwrap().raw_window_handle(),
            rwh_04::RawWindowHandle::Xcb(_)
        ));
        let metal = PlatformWindowHandle::Metal { layer: display };
        assert!(NativeWindow::from_platform(&metal).is_none());
    }
}
