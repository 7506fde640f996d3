use std::sync::Arc;

use super::device::{Device, DeviceCore, DeviceInner};
use super::error::{GfxError, Result};
use super::structs::*;

#[cfg(not(any(feature = "gfx-vulkan", feature = "gfx-webgpu")))]
compile_error!("enable at least one of the `gfx-vulkan` or `gfx-webgpu` features");

/// Environment variable forcing validation layers on (`1`).
pub const ENV_VALIDATION: &str = "GFX_VALIDATION";
/// Environment variable picking the backend when [`Backend::Auto`] is requested.
pub const ENV_BACKEND: &str = "GFX_BACKEND";

/// `1` forces validation on and `0` forces it off; anything else defers to
/// the descriptor.
fn validation_override(env: Option<&str>, requested: bool) -> bool {
    match env {
        Some("1") => true,
        Some("0") => false,
        _ => requested,
    }
}

pub(crate) fn validation_requested(desc: &InstanceDescriptor<'_>) -> bool {
    let env = std::env::var(ENV_VALIDATION).ok();
    validation_override(env.as_deref(), desc.enable_validation)
}

fn backend_from_env() -> Option<Backend> {
    let value = std::env::var(ENV_BACKEND).ok()?;
    match value.to_ascii_lowercase().as_str() {
        "vulkan" | "vk" => Some(Backend::Vulkan),
        "webgpu" | "wgpu" => Some(Backend::WebGpu),
        other => {
            log::warn!("ignoring unknown {ENV_BACKEND} value {other:?}");
            None
        }
    }
}

#[derive(Clone)]
pub(crate) enum InstanceInner {
    #[cfg(feature = "gfx-vulkan")]
    Vulkan(Arc<super::vulkan::InstanceShared>),
    #[cfg(feature = "gfx-webgpu")]
    WebGpu(Arc<super::webgpu::InstanceShared>),
}

/// Root object for one backend.
///
/// Adapters and devices keep the native instance alive, so dropping the
/// `Instance` early is harmless.
pub struct Instance {
    inner: InstanceInner,
}

impl Instance {
    pub fn new(desc: &InstanceDescriptor<'_>) -> Result<Self> {
        let backend = match desc.backend {
            Backend::Auto => backend_from_env().unwrap_or(Backend::Auto),
            other => other,
        };
        let inner = match backend {
            Backend::Vulkan => Self::vulkan(desc)?,
            Backend::WebGpu => Self::webgpu(desc)?,
            Backend::Auto => match Self::vulkan(desc) {
                Ok(inner) => inner,
                Err(err) => {
                    log::warn!("Vulkan unavailable ({err}), falling back to WebGPU");
                    Self::webgpu(desc)?
                }
            },
        };
        let instance = Self { inner };
        log::info!("created {:?} instance", instance.backend());
        Ok(instance)
    }

    #[cfg(feature = "gfx-vulkan")]
    fn vulkan(desc: &InstanceDescriptor<'_>) -> Result<InstanceInner> {
        Ok(InstanceInner::Vulkan(super::vulkan::InstanceShared::new(desc)?))
    }

    #[cfg(not(feature = "gfx-vulkan"))]
    fn vulkan(_desc: &InstanceDescriptor<'_>) -> Result<InstanceInner> {
        Err(GfxError::Initialization(
            "built without the gfx-vulkan feature".into(),
        ))
    }

    #[cfg(feature = "gfx-webgpu")]
    fn webgpu(desc: &InstanceDescriptor<'_>) -> Result<InstanceInner> {
        Ok(InstanceInner::WebGpu(super::webgpu::InstanceShared::new(desc)?))
    }

    #[cfg(not(feature = "gfx-webgpu"))]
    fn webgpu(_desc: &InstanceDescriptor<'_>) -> Result<InstanceInner> {
        Err(GfxError::Initialization(
            "built without the gfx-webgpu feature".into(),
        ))
    }

    pub fn backend(&self) -> Backend {
        match &self.inner {
            #[cfg(feature = "gfx-vulkan")]
            InstanceInner::Vulkan(_) => Backend::Vulkan,
            #[cfg(feature = "gfx-webgpu")]
            InstanceInner::WebGpu(_) => Backend::WebGpu,
        }
    }

    pub fn enumerate_adapters(&self) -> Result<Vec<Adapter>> {
        let adapters: Vec<Adapter> = match &self.inner {
            #[cfg(feature = "gfx-vulkan")]
            InstanceInner::Vulkan(shared) => super::vulkan::enumerate_adapters(shared)?
                .into_iter()
                .map(|a| Adapter::new(AdapterInner::Vulkan(a)))
                .collect(),
            #[cfg(feature = "gfx-webgpu")]
            InstanceInner::WebGpu(shared) => shared
                .enumerate_adapters()
                .into_iter()
                .map(|a| Adapter::new(AdapterInner::WebGpu(a)))
                .collect(),
        };
        for (i, adapter) in adapters.iter().enumerate() {
            log::debug!("adapter {i}: {} ({:?})", adapter.info.name, adapter.info.adapter_type);
        }
        Ok(adapters)
    }

    /// Pick an adapter by index, or by preference when no index is given.
    pub fn request_adapter(&self, desc: &AdapterDescriptor) -> Result<Adapter> {
        let mut adapters = self.enumerate_adapters()?;
        if adapters.is_empty() {
            return Err(GfxError::NoAdapter);
        }
        let index = match desc.adapter_index {
            Some(index) if (index as usize) < adapters.len() => index as usize,
            Some(index) => {
                log::error!("adapter index {index} out of range ({} found)", adapters.len());
                return Err(GfxError::NoAdapter);
            }
            None => {
                let infos: Vec<AdapterInfo> = adapters.iter().map(|a| a.info.clone()).collect();
                select_adapter(&infos, desc.preference).ok_or(GfxError::NoAdapter)?
            }
        };
        let adapter = adapters.swap_remove(index);
        log::info!("selected adapter {}", adapter.info.name);
        Ok(adapter)
    }

    /// Create a presentation surface for a platform window.
    ///
    /// Fails with `PlatformUnsupported` when the handle names a windowing
    /// system this build or backend cannot drive, so callers can fall back to
    /// headless rendering.
    pub fn create_surface(&self, desc: &SurfaceDescriptor<'_>) -> Result<Surface> {
        if !desc.window.is_complete() {
            return Err(GfxError::invalid_argument("window handle has null fields"));
        }
        if !desc.window.is_native_to_host() {
            return Err(GfxError::PlatformUnsupported(format!(
                "{} windows are not available on this platform",
                desc.window.platform_name()
            )));
        }
        let inner = match &self.inner {
            #[cfg(feature = "gfx-vulkan")]
            InstanceInner::Vulkan(shared) => {
                SurfaceInner::Vulkan(Arc::new(super::vulkan::create_surface(shared, desc)?))
            }
            #[cfg(feature = "gfx-webgpu")]
            InstanceInner::WebGpu(shared) => SurfaceInner::WebGpu(Arc::new(shared.create_surface(desc)?)),
        };
        Ok(Surface { inner })
    }
}

/// Index of the adapter best matching `preference`.
pub(crate) fn select_adapter(adapters: &[AdapterInfo], preference: AdapterPreference) -> Option<usize> {
    let rank = |ty: AdapterType| -> u8 {
        let order: &[AdapterType] = match preference {
            AdapterPreference::HighPerformance => &[
                AdapterType::DiscreteGpu,
                AdapterType::IntegratedGpu,
                AdapterType::VirtualGpu,
            ],
            AdapterPreference::LowPower => &[
                AdapterType::IntegratedGpu,
                AdapterType::DiscreteGpu,
                AdapterType::VirtualGpu,
            ],
            AdapterPreference::Software => &[AdapterType::Cpu],
            AdapterPreference::Undefined => &[],
        };
        order.iter().position(|t| *t == ty).unwrap_or(order.len()) as u8
    };
    if preference == AdapterPreference::Software
        && !adapters.iter().any(|a| a.adapter_type == AdapterType::Cpu)
    {
        return None;
    }
    adapters
        .iter()
        .enumerate()
        .min_by_key(|(i, a)| (rank(a.adapter_type), *i))
        .map(|(i, _)| i)
}

pub(crate) enum AdapterInner {
    #[cfg(feature = "gfx-vulkan")]
    Vulkan(super::vulkan::Adapter),
    #[cfg(feature = "gfx-webgpu")]
    WebGpu(super::webgpu::Adapter),
}

/// A physical GPU exposed by an [`Instance`].
pub struct Adapter {
    inner: AdapterInner,
    info: AdapterInfo,
    limits: DeviceLimits,
}

impl Adapter {
    fn new(inner: AdapterInner) -> Self {
        let (info, limits) = match &inner {
            #[cfg(feature = "gfx-vulkan")]
            AdapterInner::Vulkan(a) => (a.info(), a.limits()),
            #[cfg(feature = "gfx-webgpu")]
            AdapterInner::WebGpu(a) => (a.info(), a.limits()),
        };
        Self { inner, info, limits }
    }

    pub fn info(&self) -> &AdapterInfo {
        &self.info
    }

    pub fn limits(&self) -> DeviceLimits {
        self.limits
    }

    pub fn create_device(&self, desc: &DeviceDescriptor<'_>) -> Result<Device> {
        if !(0.0..=1.0).contains(&desc.queue_priority) {
            return Err(GfxError::invalid_argument("queue priority must be within 0..=1"));
        }
        let inner = match &self.inner {
            #[cfg(feature = "gfx-vulkan")]
            AdapterInner::Vulkan(a) => DeviceInner::Vulkan(DeviceCore::new(a.create_device(desc)?)),
            #[cfg(feature = "gfx-webgpu")]
            AdapterInner::WebGpu(a) => DeviceInner::WebGpu(DeviceCore::new(a.create_device(desc)?)),
        };
        Ok(Device::new(inner))
    }
}

pub(crate) enum SurfaceInner {
    #[cfg(feature = "gfx-vulkan")]
    Vulkan(Arc<super::vulkan::Surface>),
    #[cfg(feature = "gfx-webgpu")]
    WebGpu(Arc<super::webgpu::Surface>),
}

/// Presentation target bound to a platform window.
pub struct Surface {
    pub(crate) inner: SurfaceInner,
}

impl Surface {
    pub fn backend(&self) -> Backend {
        match &self.inner {
            #[cfg(feature = "gfx-vulkan")]
            SurfaceInner::Vulkan(_) => Backend::Vulkan,
            #[cfg(feature = "gfx-webgpu")]
            SurfaceInner::WebGpu(_) => Backend::WebGpu,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_env_overrides_descriptor() {
        assert!(validation_override(Some("1"), false));
        assert!(!validation_override(Some("0"), true));
        assert!(validation_override(None, true));
        assert!(!validation_override(None, false));
        assert!(validation_override(Some("yes"), true));
        assert!(!validation_override(Some(""), false));
    }

    fn info(ty: AdapterType) -> AdapterInfo {
        AdapterInfo {
            adapter_type: ty,
            ..Default::default()
        }
    }

    #[test]
    fn preference_orders_adapter_types() {
        let adapters = [
            info(AdapterType::Cpu),
            info(AdapterType::IntegratedGpu),
            info(AdapterType::DiscreteGpu),
        ];
        assert_eq!(select_adapter(&adapters, AdapterPreference::HighPerformance), Some(2));
        assert_eq!(select_adapter(&adapters, AdapterPreference::LowPower), Some(1));
        assert_eq!(select_adapter(&adapters, AdapterPreference::Software), Some(0));
        assert_eq!(select_adapter(&adapters, AdapterPreference::Undefined), Some(0));
    }

    #[test]
    fn software_preference_needs_cpu_adapter() {
        let adapters = [info(AdapterType::DiscreteGpu)];
        assert_eq!(select_adapter(&adapters, AdapterPreference::Software), None);
        assert_eq!(select_adapter(&[], AdapterPreference::HighPerformance), None);
    }

    #[test]
    fn explicit_validation_flag_wins() {
        let desc = InstanceDescriptor {
            enable_validation: true,
            ..Default::default()
        };
        assert!(validation_requested(&desc));
    }
}
