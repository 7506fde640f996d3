//! Vulkan backend built on `ash` and `vk-mem`.
//!
//! Objects live in the arenas of [`crate::gpu::device::DeviceCore`]; this
//! module only knows how to create, destroy and drive the native handles.
//! Command lists are replayed into one-time primary command buffers at submit
//! (see [`commands`]), with image layouts tracked per texture.

use std::ffi::{c_char, c_void, CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::extensions::{ext, khr};
use ash::vk;

use crate::gpu::device::{Pools, SubmitInfo};
use crate::gpu::error::{GfxError, Result};
use crate::gpu::instance::validation_requested;
use crate::gpu::structs::*;
use crate::gpu::GpuBackend;

mod command_pool;
mod commands;
mod conversions;
mod descriptor_sets;
mod display;
mod image;
mod memory;
mod pipelines;
mod structs;

pub use command_pool::CommandPool;
pub use display::create_surface;
pub use structs::*;

/// Names of debugging layers that should be enabled when validation is requested.
pub const DEBUG_LAYER_NAMES: [*const c_char; 1] =
    [b"VK_LAYER_KHRONOS_validation\0".as_ptr() as *const c_char];

const API_VERSION: u32 = vk::API_VERSION_1_2;

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();
    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!(target: "gfx::vulkan", "[{message_type:?}] {message}");
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!(target: "gfx::vulkan", "[{message_type:?}] {message}");
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::debug!(target: "gfx::vulkan", "[{message_type:?}] {message}");
    } else {
        log::trace!(target: "gfx::vulkan", "[{message_type:?}] {message}");
    }
    vk::FALSE
}

/// Failure of a `vkCreate*` call for a resource.
pub(super) fn creation_error(err: vk::Result) -> GfxError {
    match err {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            GfxError::OutOfMemory
        }
        vk::Result::ERROR_DEVICE_LOST => GfxError::DeviceLost,
        other => GfxError::resource_creation(other),
    }
}

fn has_extension(available: &[vk::ExtensionProperties], name: &CStr) -> bool {
    available
        .iter()
        .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == name)
}

/// Surface extensions for the window systems this platform can host.
fn platform_surface_extensions() -> Vec<&'static CStr> {
    let mut windows = Vec::new();
    #[cfg(all(
        unix,
        not(any(target_os = "macos", target_os = "ios", target_os = "android"))
    ))]
    {
        windows.push(PlatformWindowHandle::Xlib {
            display: std::ptr::null_mut(),
            window: 0,
        });
        windows.push(PlatformWindowHandle::Xcb {
            connection: std::ptr::null_mut(),
            window: 0,
        });
        windows.push(PlatformWindowHandle::Wayland {
            display: std::ptr::null_mut(),
            surface: std::ptr::null_mut(),
        });
    }
    #[cfg(windows)]
    windows.push(PlatformWindowHandle::Win32 {
        hinstance: std::ptr::null_mut(),
        hwnd: std::ptr::null_mut(),
    });
    #[cfg(target_os = "android")]
    windows.push(PlatformWindowHandle::Android {
        window: std::ptr::null_mut(),
    });

    let mut names: Vec<&'static CStr> = Vec::new();
    for native in windows.iter().filter_map(display::NativeWindow::from_platform) {
        for name in native.required_extensions() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    names.push(ext::MetalSurface::name());
    names
}

/// Loader, instance and debug messenger shared by every adapter, device and
/// surface created from one [`crate::Instance`].
pub struct InstanceShared {
    pub(super) entry: ash::Entry,
    pub(super) instance: ash::Instance,
    pub(super) debug_utils: Option<ext::DebugUtils>,
    debug_messenger: vk::DebugUtilsMessengerEXT,
    pub(super) surface_loader: Option<khr::Surface>,
    /// Platform surface extensions that were enabled.
    pub(super) surface_extensions: Vec<&'static CStr>,
}

impl InstanceShared {
    pub fn new(desc: &InstanceDescriptor<'_>) -> Result<Arc<Self>> {
        let enable_validation =
            validation_requested(desc) || desc.features.contains(InstanceFeatures::DEBUG);
        let entry = unsafe { ash::Entry::load() }?;

        let app_name = CString::new(desc.application_name)
            .map_err(|_| GfxError::invalid_argument("application name contains a NUL byte"))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(desc.application_version)
            .engine_name(CStr::from_bytes_with_nul(b"gfx\0").unwrap_or_default())
            .engine_version(crate::utils::version())
            .api_version(API_VERSION);

        let available = entry.enumerate_instance_extension_properties(None)?;
        let mut inst_exts: Vec<*const c_char> = Vec::new();
        let debug_enabled = enable_validation && has_extension(&available, ext::DebugUtils::name());
        if debug_enabled {
            inst_exts.push(ext::DebugUtils::name().as_ptr());
        } else if enable_validation {
            log::warn!("VK_EXT_debug_utils unavailable, validation messages will not be logged");
        }

        let mut surface_extensions = Vec::new();
        let mut surface_enabled = false;
        if desc.features.contains(InstanceFeatures::SURFACE) {
            if has_extension(&available, khr::Surface::name()) {
                surface_enabled = true;
                inst_exts.push(khr::Surface::name().as_ptr());
                for name in platform_surface_extensions() {
                    if has_extension(&available, name) {
                        inst_exts.push(name.as_ptr());
                        surface_extensions.push(name);
                    } else {
                        log::warn!("surface extension {name:?} unavailable");
                    }
                }
            } else {
                log::warn!("VK_KHR_surface unavailable, presentation disabled");
            }
        }

        let mut inst_layers = Vec::new();
        if enable_validation {
            let available_layers = entry.enumerate_instance_layer_properties()?;
            for &layer in &DEBUG_LAYER_NAMES {
                let name = unsafe { CStr::from_ptr(layer) };
                if available_layers
                    .iter()
                    .any(|prop| unsafe { CStr::from_ptr(prop.layer_name.as_ptr()) } == name)
                {
                    inst_layers.push(layer);
                } else {
                    log::warn!("validation layer {name:?} requested but not installed");
                }
            }
        }

        let instance = unsafe {
            entry.create_instance(
                &vk::InstanceCreateInfo::builder()
                    .application_info(&app_info)
                    .enabled_extension_names(&inst_exts)
                    .enabled_layer_names(&inst_layers),
                None,
            )
        }
        .map_err(|err| GfxError::Initialization(format!("vkCreateInstance failed: {err}")))?;

        let (debug_utils, debug_messenger) = if debug_enabled {
            let utils = ext::DebugUtils::new(&entry, &instance);
            let info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(vulkan_debug_callback));
            match unsafe { utils.create_debug_utils_messenger(&info, None) } {
                Ok(messenger) => (Some(utils), messenger),
                Err(err) => {
                    log::warn!("failed to create debug messenger: {err}");
                    (Some(utils), vk::DebugUtilsMessengerEXT::null())
                }
            }
        } else {
            (None, vk::DebugUtilsMessengerEXT::null())
        };

        let surface_loader = surface_enabled.then(|| khr::Surface::new(&entry, &instance));

        log::info!(
            "Vulkan instance created (validation: {}, surface: {})",
            !inst_layers.is_empty(),
            surface_loader.is_some()
        );
        Ok(Arc::new(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
            surface_loader,
            surface_extensions,
        }))
    }
}

impl Drop for InstanceShared {
    fn drop(&mut self) {
        unsafe {
            if let Some(utils) = &self.debug_utils {
                if self.debug_messenger != vk::DebugUtilsMessengerEXT::null() {
                    utils.destroy_debug_utils_messenger(self.debug_messenger, None);
                }
            }
            self.instance.destroy_instance(None);
        }
    }
}

pub fn enumerate_adapters(shared: &Arc<InstanceShared>) -> Result<Vec<Adapter>> {
    let pdevices = unsafe { shared.instance.enumerate_physical_devices() }?;
    Ok(pdevices
        .into_iter()
        .filter_map(|pdevice| Adapter::new(shared.clone(), pdevice))
        .collect())
}

/// Physical device with a graphics queue family.
pub struct Adapter {
    shared: Arc<InstanceShared>,
    pdevice: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    family: u32,
}

impl Adapter {
    fn new(shared: Arc<InstanceShared>, pdevice: vk::PhysicalDevice) -> Option<Self> {
        let properties = unsafe { shared.instance.get_physical_device_properties(pdevice) };
        let queue_props =
            unsafe { shared.instance.get_physical_device_queue_family_properties(pdevice) };
        let family = queue_props
            .iter()
            .position(|prop| prop.queue_flags.contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE));
        let Some(family) = family else {
            log::debug!(
                "skipping {:?}: no graphics queue family",
                unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            );
            return None;
        };
        Some(Self {
            shared,
            pdevice,
            properties,
            family: family as u32,
        })
    }

    pub fn info(&self) -> AdapterInfo {
        let name = unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) };
        let api = self.properties.api_version;
        AdapterInfo {
            name: name.to_string_lossy().into_owned(),
            driver_description: format!(
                "Vulkan {}.{}.{} (driver {:#x})",
                vk::api_version_major(api),
                vk::api_version_minor(api),
                vk::api_version_patch(api),
                self.properties.driver_version
            ),
            vendor_id: self.properties.vendor_id,
            device_id: self.properties.device_id,
            adapter_type: conversions::adapter_type_from_vk(self.properties.device_type),
            backend: Backend::Vulkan,
        }
    }

    pub fn limits(&self) -> DeviceLimits {
        let limits = &self.properties.limits;
        let memory = unsafe {
            self.shared
                .instance
                .get_physical_device_memory_properties(self.pdevice)
        };
        let largest_heap = memory.memory_heaps[..memory.memory_heap_count as usize]
            .iter()
            .map(|heap| heap.size)
            .max()
            .unwrap_or(0);
        DeviceLimits {
            min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment as u32,
            min_storage_buffer_offset_alignment: limits.min_storage_buffer_offset_alignment as u32,
            max_uniform_buffer_binding_size: limits.max_uniform_buffer_range,
            max_storage_buffer_binding_size: limits.max_storage_buffer_range,
            max_buffer_size: largest_heap,
            max_texture_dimension_1d: limits.max_image_dimension1_d,
            max_texture_dimension_2d: limits.max_image_dimension2_d,
            max_texture_dimension_3d: limits.max_image_dimension3_d,
            max_texture_array_layers: limits.max_image_array_layers,
        }
    }

    pub fn create_device(&self, desc: &DeviceDescriptor<'_>) -> Result<Context> {
        let instance = &self.shared.instance;
        let available = unsafe { instance.enumerate_device_extension_properties(self.pdevice) }
            .map_err(|err| GfxError::DeviceCreation(format!("{err}")))?;

        let mut extensions: Vec<*const c_char> = Vec::new();
        if desc.features.contains(DeviceFeatures::SWAPCHAIN) {
            if self.shared.surface_loader.is_none() {
                return Err(GfxError::FeatureNotSupported(
                    "swapchains need an instance created with InstanceFeatures::SURFACE".into(),
                ));
            }
            if !has_extension(&available, khr::Swapchain::name()) {
                return Err(GfxError::FeatureNotSupported(
                    "VK_KHR_swapchain is not available".into(),
                ));
            }
            extensions.push(khr::Swapchain::name().as_ptr());
        }
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        if has_extension(&available, vk::KhrPortabilitySubsetFn::name()) {
            extensions.push(vk::KhrPortabilitySubsetFn::name().as_ptr());
        }

        let supported = unsafe { instance.get_physical_device_features(self.pdevice) };
        let mut features = vk::PhysicalDeviceFeatures::default();
        if desc.features.contains(DeviceFeatures::ANISOTROPIC_FILTERING) {
            if supported.sampler_anisotropy != vk::TRUE {
                return Err(GfxError::FeatureNotSupported(
                    "anisotropic filtering".into(),
                ));
            }
            features.sampler_anisotropy = vk::TRUE;
        }

        let timeline = desc.features.contains(DeviceFeatures::TIMELINE_SEMAPHORE);
        if timeline {
            let mut query = vk::PhysicalDeviceTimelineSemaphoreFeatures::default();
            let mut features2 = vk::PhysicalDeviceFeatures2::builder().push_next(&mut query);
            unsafe { instance.get_physical_device_features2(self.pdevice, &mut features2) };
            let api = self.properties.api_version;
            let core_12 = vk::api_version_major(api) > 1 || vk::api_version_minor(api) >= 2;
            if query.timeline_semaphore != vk::TRUE || !core_12 {
                return Err(GfxError::FeatureNotSupported("timeline semaphores".into()));
            }
        }
        let mut timeline_features =
            vk::PhysicalDeviceTimelineSemaphoreFeatures::builder().timeline_semaphore(true);

        let priorities = [desc.queue_priority];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(self.family)
            .queue_priorities(&priorities)
            .build()];

        let mut device_ci = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);
        if timeline {
            device_ci = device_ci.push_next(&mut timeline_features);
        }

        let device = unsafe { instance.create_device(self.pdevice, &device_ci, None) }
            .map_err(|err| GfxError::DeviceCreation(format!("vkCreateDevice failed: {err}")))?;
        let queue = unsafe { device.get_device_queue(self.family, 0) };

        let allocator = match vk_mem::Allocator::new(vk_mem::AllocatorCreateInfo::new(
            instance,
            &device,
            self.pdevice,
        )) {
            Ok(allocator) => allocator,
            Err(err) => {
                unsafe { device.destroy_device(None) };
                return Err(GfxError::DeviceCreation(format!(
                    "memory allocator creation failed: {err}"
                )));
            }
        };

        let pool = match CommandPool::new(device.clone(), self.family) {
            Ok(pool) => pool,
            Err(err) => {
                drop(allocator);
                unsafe { device.destroy_device(None) };
                return Err(GfxError::DeviceCreation(format!(
                    "command pool creation failed: {err}"
                )));
            }
        };

        let swapchain_loader = desc
            .features
            .contains(DeviceFeatures::SWAPCHAIN)
            .then(|| khr::Swapchain::new(instance, &device));

        let context = Context {
            shared: self.shared.clone(),
            pdevice: self.pdevice,
            device,
            queue,
            queue_family: self.family,
            pool,
            allocator: ManuallyDrop::new(allocator),
            swapchain_loader,
            features: desc.features,
            limits: self.limits(),
            timestamps: self.properties.limits.timestamp_compute_and_graphics == vk::TRUE,
        };
        if let Some(label) = desc.label {
            context.set_name(context.device.handle(), label, vk::ObjectType::DEVICE);
        }
        log::info!("created Vulkan device on {}", self.info().name);
        Ok(context)
    }
}

/// Logical device plus everything needed to drive its single queue.
pub struct Context {
    shared: Arc<InstanceShared>,
    pdevice: vk::PhysicalDevice,
    pub(super) device: ash::Device,
    queue: vk::Queue,
    queue_family: u32,
    pub(super) pool: CommandPool,
    pub(super) allocator: ManuallyDrop<vk_mem::Allocator>,
    pub(super) swapchain_loader: Option<khr::Swapchain>,
    features: DeviceFeatures,
    limits: DeviceLimits,
    timestamps: bool,
}

impl Context {
    fn set_name<T>(&self, obj: T, name: &str, t: vk::ObjectType)
    where
        T: vk::Handle,
    {
        let Some(utils) = &self.shared.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::builder()
            .object_name(&name)
            .object_type(t)
            .object_handle(obj.as_raw());
        if let Err(err) = unsafe { utils.set_debug_utils_object_name(self.device.handle(), &info) } {
            log::warn!("failed to name {t:?}: {err}");
        }
    }

    fn label<T: vk::Handle>(&self, obj: T, label: Option<&str>, t: vk::ObjectType) {
        if let Some(label) = label {
            self.set_name(obj, label, t);
        }
    }

    /// Whether blits from `format` may use linear filtering.
    pub(super) fn supports_linear_blit(&self, format: vk::Format) -> bool {
        let properties = unsafe {
            self.shared
                .instance
                .get_physical_device_format_properties(self.pdevice, format)
        };
        properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
    }

    /// Submit an empty batch that signals `fence` once prior work is done.
    fn signal_on_idle(&self, fence: vk::Fence) -> Result<()> {
        unsafe { self.device.queue_submit(self.queue, &[], fence) }?;
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        unsafe {
            if let Err(err) = self.device.device_wait_idle() {
                log::error!("vkDeviceWaitIdle failed during teardown: {err}");
            }
            self.pool.destroy();
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
    }
}

fn semaphore_values(
    pools: &Pools<Context>,
    entries: &[SemaphoreSubmit],
) -> Result<(Vec<vk::Semaphore>, Vec<u64>, bool)> {
    let mut raws = Vec::with_capacity(entries.len());
    let mut values = Vec::with_capacity(entries.len());
    let mut any_timeline = false;
    for entry in entries {
        let semaphore = &pools.semaphore(entry.semaphore)?.native;
        raws.push(semaphore.raw);
        values.push(if semaphore.timeline { entry.value } else { 0 });
        any_timeline |= semaphore.timeline;
    }
    Ok((raws, values, any_timeline))
}

impl GpuBackend for Context {
    type Buffer = VkBuffer;
    type Texture = VkTexture;
    type TextureView = VkTextureView;
    type Sampler = VkSampler;
    type Shader = VkShader;
    type BindGroupLayout = VkBindGroupLayout;
    type BindGroup = VkBindGroup;
    type RenderPass = VkRenderPass;
    type Framebuffer = VkFramebuffer;
    type RenderPipeline = VkPipeline;
    type ComputePipeline = VkPipeline;
    type Fence = VkFence;
    type Semaphore = VkSemaphore;
    type QuerySet = VkQuerySet;
    type Surface = Arc<Surface>;
    type Swapchain = VkSwapchain;

    const KIND: Backend = Backend::Vulkan;

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn supports_shader_format(&self, source: ShaderSourceType) -> bool {
        source == ShaderSourceType::SpirV
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<VkBuffer> {
        self.make_buffer(desc)
    }

    fn destroy_buffer(&mut self, buffer: VkBuffer) {
        self.free_buffer(buffer)
    }

    fn map_buffer(&mut self, buffer: &mut VkBuffer, offset: u64, size: u64, mode: MapMode) -> Result<()> {
        self.map(buffer, offset, size, mode)
    }

    fn read_mapped(&self, buffer: &VkBuffer, offset: u64, out: &mut [u8]) -> Result<()> {
        self.read(buffer, offset, out)
    }

    fn write_mapped(&mut self, buffer: &VkBuffer, offset: u64, data: &[u8]) -> Result<()> {
        self.write(buffer, offset, data)
    }

    fn unmap_buffer(&mut self, buffer: &mut VkBuffer) {
        self.unmap(buffer)
    }

    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<VkTexture> {
        self.make_texture(desc)
    }

    fn destroy_texture(&mut self, texture: VkTexture) {
        self.free_texture(texture)
    }

    fn texture_layout(&self, texture: &VkTexture) -> TextureLayout {
        texture.layout.get()
    }

    fn create_texture_view(
        &mut self,
        texture: &VkTexture,
        info: &TextureViewInfo,
        label: Option<&str>,
    ) -> Result<VkTextureView> {
        self.make_texture_view(texture, info, label)
    }

    fn destroy_texture_view(&mut self, view: VkTextureView) {
        unsafe { self.device.destroy_image_view(view.raw, None) };
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor<'_>) -> Result<VkSampler> {
        self.make_sampler(desc)
    }

    fn destroy_sampler(&mut self, sampler: VkSampler) {
        unsafe { self.device.destroy_sampler(sampler.raw, None) };
    }

    fn create_shader(&mut self, desc: &ShaderDescriptor<'_>) -> Result<VkShader> {
        self.make_shader(desc)
    }

    fn destroy_shader(&mut self, shader: VkShader) {
        unsafe { self.device.destroy_shader_module(shader.module, None) };
    }

    fn create_bind_group_layout(
        &mut self,
        desc: &BindGroupLayoutDescriptor<'_>,
    ) -> Result<VkBindGroupLayout> {
        self.make_bind_group_layout(desc)
    }

    fn destroy_bind_group_layout(&mut self, layout: VkBindGroupLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout.raw, None) };
    }

    fn create_bind_group(
        &mut self,
        pools: &Pools<Self>,
        desc: &BindGroupDescriptor<'_>,
    ) -> Result<VkBindGroup> {
        self.make_bind_group(pools, desc)
    }

    fn destroy_bind_group(&mut self, group: VkBindGroup) {
        unsafe { self.device.destroy_descriptor_pool(group.pool, None) };
    }

    fn create_render_pass(&mut self, desc: &RenderPassDescriptor<'_>) -> Result<VkRenderPass> {
        self.make_render_pass(desc)
    }

    fn destroy_render_pass(&mut self, pass: VkRenderPass) {
        unsafe { self.device.destroy_render_pass(pass.raw, None) };
    }

    fn create_framebuffer(
        &mut self,
        pools: &Pools<Self>,
        desc: &FramebufferDescriptor<'_>,
    ) -> Result<VkFramebuffer> {
        self.make_framebuffer(pools, desc)
    }

    fn destroy_framebuffer(&mut self, framebuffer: VkFramebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer.raw, None) };
    }

    fn create_render_pipeline(
        &mut self,
        pools: &Pools<Self>,
        desc: &RenderPipelineDescriptor<'_>,
    ) -> Result<VkPipeline> {
        self.make_render_pipeline(pools, desc)
    }

    fn destroy_render_pipeline(&mut self, pipeline: VkPipeline) {
        self.free_pipeline(pipeline)
    }

    fn create_compute_pipeline(
        &mut self,
        pools: &Pools<Self>,
        desc: &ComputePipelineDescriptor<'_>,
    ) -> Result<VkPipeline> {
        self.make_compute_pipeline(pools, desc)
    }

    fn destroy_compute_pipeline(&mut self, pipeline: VkPipeline) {
        self.free_pipeline(pipeline)
    }

    fn create_fence(&mut self, signaled: bool) -> Result<VkFence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let raw = unsafe {
            self.device
                .create_fence(&vk::FenceCreateInfo::builder().flags(flags), None)
        }
        .map_err(creation_error)?;
        Ok(VkFence { raw })
    }

    fn destroy_fence(&mut self, fence: VkFence) {
        unsafe { self.device.destroy_fence(fence.raw, None) };
    }

    fn fence_status(&self, fence: &VkFence) -> Result<bool> {
        Ok(unsafe { self.device.get_fence_status(fence.raw) }?)
    }

    fn fence_signal(&mut self, fence: &VkFence) -> Result<()> {
        if self.fence_status(fence)? {
            return Ok(());
        }
        self.signal_on_idle(fence.raw)?;
        // The empty batch completes once the queue drains; block until then so
        // the fence reads as signaled as soon as this returns.
        unsafe { self.device.wait_for_fences(&[fence.raw], true, u64::MAX) }?;
        Ok(())
    }

    fn fence_reset(&mut self, fence: &VkFence) -> Result<()> {
        unsafe { self.device.reset_fences(&[fence.raw]) }?;
        Ok(())
    }

    fn wait_fences(&self, fences: &[&VkFence], wait_all: bool, timeout_ns: u64) -> Result<WaitStatus> {
        if fences.is_empty() {
            return Ok(WaitStatus::Success);
        }
        let raws: Vec<vk::Fence> = fences.iter().map(|f| f.raw).collect();
        match unsafe { self.device.wait_for_fences(&raws, wait_all, timeout_ns) } {
            Ok(()) => Ok(WaitStatus::Success),
            Err(vk::Result::TIMEOUT) => Ok(WaitStatus::Timeout),
            Err(vk::Result::ERROR_DEVICE_LOST) => Err(GfxError::DeviceLost),
            Err(err) => Err(GfxError::Unknown(format!("vkWaitForFences failed: {err}"))),
        }
    }

    fn create_semaphore(&mut self, desc: &SemaphoreDescriptor<'_>) -> Result<VkSemaphore> {
        let timeline = desc.semaphore_type == SemaphoreType::Timeline;
        if timeline && !self.features.contains(DeviceFeatures::TIMELINE_SEMAPHORE) {
            return Err(GfxError::FeatureNotSupported(
                "timeline semaphores need DeviceFeatures::TIMELINE_SEMAPHORE".into(),
            ));
        }
        let mut type_info = vk::SemaphoreTypeCreateInfo::builder()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(desc.initial_value);
        let mut info = vk::SemaphoreCreateInfo::builder();
        if timeline {
            info = info.push_next(&mut type_info);
        }
        let raw = unsafe { self.device.create_semaphore(&info, None) }.map_err(creation_error)?;
        self.label(raw, desc.label, vk::ObjectType::SEMAPHORE);
        Ok(VkSemaphore { raw, timeline })
    }

    fn destroy_semaphore(&mut self, semaphore: VkSemaphore) {
        unsafe { self.device.destroy_semaphore(semaphore.raw, None) };
    }

    fn semaphore_value(&self, semaphore: &VkSemaphore) -> Result<u64> {
        Ok(unsafe { self.device.get_semaphore_counter_value(semaphore.raw) }?)
    }

    fn semaphore_signal(&mut self, semaphore: &VkSemaphore, value: u64) -> Result<()> {
        let info = vk::SemaphoreSignalInfo::builder()
            .semaphore(semaphore.raw)
            .value(value);
        unsafe { self.device.signal_semaphore(&info) }?;
        Ok(())
    }

    fn semaphore_wait(&self, semaphore: &VkSemaphore, value: u64, timeout_ns: u64) -> Result<WaitStatus> {
        let semaphores = [semaphore.raw];
        let values = [value];
        let info = vk::SemaphoreWaitInfo::builder()
            .semaphores(&semaphores)
            .values(&values);
        match unsafe { self.device.wait_semaphores(&info, timeout_ns) } {
            Ok(()) => Ok(WaitStatus::Success),
            Err(vk::Result::TIMEOUT) => Ok(WaitStatus::Timeout),
            Err(vk::Result::ERROR_DEVICE_LOST) => Err(GfxError::DeviceLost),
            Err(err) => Err(GfxError::Unknown(format!("vkWaitSemaphores failed: {err}"))),
        }
    }

    fn create_query_set(&mut self, desc: &QuerySetDescriptor<'_>) -> Result<VkQuerySet> {
        let query_type = match desc.query_type {
            QueryType::Occlusion => vk::QueryType::OCCLUSION,
            QueryType::Timestamp if self.timestamps => vk::QueryType::TIMESTAMP,
            QueryType::Timestamp => {
                return Err(GfxError::FeatureNotSupported(
                    "timestamps on the graphics and compute queue".into(),
                ))
            }
        };
        let info = vk::QueryPoolCreateInfo::builder()
            .query_type(query_type)
            .query_count(desc.count);
        let raw = unsafe { self.device.create_query_pool(&info, None) }.map_err(creation_error)?;
        self.label(raw, desc.label, vk::ObjectType::QUERY_POOL);
        Ok(VkQuerySet { raw })
    }

    fn destroy_query_set(&mut self, query_set: VkQuerySet) {
        unsafe { self.device.destroy_query_pool(query_set.raw, None) };
    }

    fn submit(&mut self, pools: &Pools<Self>, info: &SubmitInfo<'_>) -> Result<()> {
        self.pool.reclaim()?;

        let mut recorded = Vec::with_capacity(info.command_buffers.len());
        for list in info.command_buffers {
            let cmd = match self.pool.begin() {
                Ok(cmd) => cmd,
                Err(err) => {
                    self.pool.discard(recorded);
                    return Err(err);
                }
            };
            recorded.push(cmd);
            if let Err(err) = commands::record(self, pools, cmd, list) {
                log::error!("failed to record {:?}: {err}", list.label());
                self.pool.discard(recorded);
                return Err(err);
            }
        }

        let (waits, wait_values, wait_timeline) = semaphore_values(pools, info.wait_semaphores)?;
        let (signals, signal_values, signal_timeline) = semaphore_values(pools, info.signal_semaphores)?;
        let stages = vec![vk::PipelineStageFlags::ALL_COMMANDS; waits.len()];
        let fence = match info.signal_fence {
            Some(handle) => pools.fence(handle)?.native.raw,
            None => vk::Fence::null(),
        };

        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::builder()
            .wait_semaphore_values(&wait_values)
            .signal_semaphore_values(&signal_values);
        let mut submit = vk::SubmitInfo::builder()
            .command_buffers(&recorded)
            .wait_semaphores(&waits)
            .wait_dst_stage_mask(&stages)
            .signal_semaphores(&signals);
        if wait_timeline || signal_timeline {
            submit = submit.push_next(&mut timeline_info);
        }

        if let Err(err) = unsafe { self.device.queue_submit(self.queue, &[submit.build()], fence) } {
            log::error!("vkQueueSubmit failed: {err}");
            self.pool.discard(recorded);
            return Err(err.into());
        }

        let tracking = self.pool.submission_fence()?;
        if let Err(err) = self.signal_on_idle(tracking) {
            // Without a tracking fence the buffers can only be reused once idle.
            self.wait_idle()?;
            self.pool.discard(recorded);
            return Err(err);
        }
        self.pool.retire(tracking, recorded);
        log::trace!("{} submissions in flight", self.pool.pending());
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
    ) -> Result<(VkSwapchain, Vec<VkTextureView>)> {
        self.make_swapchain(surface, desc)
    }

    fn destroy_swapchain(&mut self, swapchain: VkSwapchain) {
        self.free_swapchain(swapchain)
    }

    fn acquire_next_image(
        &mut self,
        swapchain: &mut VkSwapchain,
        timeout_ns: u64,
        semaphore: Option<&VkSemaphore>,
        fence: Option<&VkFence>,
    ) -> Result<(AcquireStatus, Option<VkTextureView>)> {
        let status = self.acquire(swapchain, timeout_ns, semaphore, fence)?;
        Ok((status, None))
    }

    fn present(&mut self, swapchain: &mut VkSwapchain, wait: &[&VkSemaphore]) -> Result<()> {
        self.present_image(swapchain, wait)
    }
}
