use thiserror::Error;

/// Stable integer projection of every outcome the API can report.
///
/// Non-negative values are successes, negative values are errors. The numbers
/// never change between releases so foreign bindings can rely on them.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success = 0,
    Timeout = 1,
    NotReady = 2,
    ErrorInvalidArgument = -1,
    ErrorNotFound = -2,
    ErrorOutOfMemory = -3,
    ErrorDeviceLost = -4,
    ErrorSurfaceLost = -5,
    ErrorOutOfDate = -6,
    ErrorBackendNotLoaded = -7,
    ErrorFeatureNotSupported = -8,
    ErrorUnknown = -9,
    ErrorInitialization = -10,
    ErrorNoAdapter = -11,
    ErrorDeviceCreation = -12,
    ErrorResourceCreation = -13,
    ErrorInvalidState = -14,
    ErrorPlatformUnsupported = -15,
}

impl ResultCode {
    pub fn is_success(self) -> bool {
        (self as i32) >= 0
    }

    pub fn is_error(self) -> bool {
        (self as i32) < 0
    }
}

/// Human readable name of a result code.
pub fn result_to_string(code: ResultCode) -> &'static str {
    match code {
        ResultCode::Success => "Success",
        ResultCode::Timeout => "Timeout",
        ResultCode::NotReady => "Not ready",
        ResultCode::ErrorInvalidArgument => "Invalid argument",
        ResultCode::ErrorNotFound => "Not found",
        ResultCode::ErrorOutOfMemory => "Out of memory",
        ResultCode::ErrorDeviceLost => "Device lost",
        ResultCode::ErrorSurfaceLost => "Surface lost",
        ResultCode::ErrorOutOfDate => "Out of date",
        ResultCode::ErrorBackendNotLoaded => "Backend not loaded",
        ResultCode::ErrorFeatureNotSupported => "Feature not supported",
        ResultCode::ErrorUnknown => "Unknown error",
        ResultCode::ErrorInitialization => "Initialization failed",
        ResultCode::ErrorNoAdapter => "No adapter",
        ResultCode::ErrorDeviceCreation => "Device creation failed",
        ResultCode::ErrorResourceCreation => "Resource creation failed",
        ResultCode::ErrorInvalidState => "Invalid state",
        ResultCode::ErrorPlatformUnsupported => "Platform unsupported",
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GfxError {
    #[error("backend initialization failed: {0}")]
    Initialization(String),
    #[error("no suitable adapter found")]
    NoAdapter,
    #[error("device creation failed: {0}")]
    DeviceCreation(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("resource creation failed: {0}")]
    ResourceCreation(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("platform integration unavailable: {0}")]
    PlatformUnsupported(String),
    #[error("surface is out of date and the swapchain must be recreated")]
    OutOfDate,
    #[error("out of memory")]
    OutOfMemory,
    #[error("device lost")]
    DeviceLost,
    #[error("surface lost")]
    SurfaceLost,
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Convenient crate-wide result type.
pub type Result<T, E = GfxError> = std::result::Result<T, E>;

impl GfxError {
    pub fn code(&self) -> ResultCode {
        match self {
            GfxError::Initialization(_) => ResultCode::ErrorInitialization,
            GfxError::NoAdapter => ResultCode::ErrorNoAdapter,
            GfxError::DeviceCreation(_) => ResultCode::ErrorDeviceCreation,
            GfxError::InvalidArgument(_) => ResultCode::ErrorInvalidArgument,
            GfxError::ResourceCreation(_) => ResultCode::ErrorResourceCreation,
            GfxError::InvalidState(_) => ResultCode::ErrorInvalidState,
            GfxError::PlatformUnsupported(_) => ResultCode::ErrorPlatformUnsupported,
            GfxError::OutOfDate => ResultCode::ErrorOutOfDate,
            GfxError::OutOfMemory => ResultCode::ErrorOutOfMemory,
            GfxError::DeviceLost => ResultCode::ErrorDeviceLost,
            GfxError::SurfaceLost => ResultCode::ErrorSurfaceLost,
            GfxError::FeatureNotSupported(_) => ResultCode::ErrorFeatureNotSupported,
            GfxError::Unknown(_) => ResultCode::ErrorUnknown,
        }
    }

    /// True for conditions caused by the host lacking a GPU, a display or a
    /// platform integration. Callers may skip the dependent functionality.
    pub fn is_platform_unavailable(&self) -> bool {
        matches!(
            self,
            GfxError::PlatformUnsupported(_) | GfxError::NoAdapter | GfxError::Initialization(_)
        )
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        GfxError::InvalidArgument(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        GfxError::InvalidState(msg.into())
    }

    pub(crate) fn resource_creation(err: impl std::fmt::Display) -> Self {
        GfxError::ResourceCreation(err.to_string())
    }
}

impl From<GfxError> for ResultCode {
    fn from(err: GfxError) -> Self {
        err.code()
    }
}

#[cfg(feature = "gfx-vulkan")]
impl From<ash::vk::Result> for GfxError {
    fn from(res: ash::vk::Result) -> Self {
        use ash::vk;
        match res {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                GfxError::OutOfMemory
            }
            vk::Result::ERROR_DEVICE_LOST => GfxError::DeviceLost,
            vk::Result::ERROR_SURFACE_LOST_KHR => GfxError::SurfaceLost,
            vk::Result::ERROR_OUT_OF_DATE_KHR => GfxError::OutOfDate,
            vk::Result::ERROR_FEATURE_NOT_PRESENT
            | vk::Result::ERROR_EXTENSION_NOT_PRESENT
            | vk::Result::ERROR_LAYER_NOT_PRESENT
            | vk::Result::ERROR_FORMAT_NOT_SUPPORTED => {
                GfxError::FeatureNotSupported(format!("{res}"))
            }
            vk::Result::ERROR_INITIALIZATION_FAILED | vk::Result::ERROR_INCOMPATIBLE_DRIVER => {
                GfxError::Initialization(format!("{res}"))
            }
            other => GfxError::Unknown(format!("{other}")),
        }
    }
}

#[cfg(feature = "gfx-vulkan")]
impl From<ash::LoadingError> for GfxError {
    fn from(err: ash::LoadingError) -> Self {
        GfxError::Initialization(format!("failed to load the Vulkan loader: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes_are_stable() {
        assert_eq!(ResultCode::Success as i32, 0);
        assert_eq!(ResultCode::Timeout as i32, 1);
        assert_eq!(ResultCode::NotReady as i32, 2);
        assert_eq!(ResultCode::ErrorInvalidArgument as i32, -1);
        assert_eq!(ResultCode::ErrorUnknown as i32, -9);
    }

    #[test]
    fn every_error_maps_to_a_negative_code() {
        let errors = [
            GfxError::Initialization(String::new()),
            GfxError::NoAdapter,
            GfxError::DeviceCreation(String::new()),
            GfxError::InvalidArgument(String::new()),
            GfxError::ResourceCreation(String::new()),
            GfxError::InvalidState(String::new()),
            GfxError::PlatformUnsupported(String::new()),
            GfxError::OutOfDate,
            GfxError::OutOfMemory,
            GfxError::DeviceLost,
            GfxError::SurfaceLost,
            GfxError::FeatureNotSupported(String::new()),
            GfxError::Unknown(String::new()),
        ];
        for err in errors {
            assert!(err.code().is_error(), "{err:?} mapped to {:?}", err.code());
        }
        assert!(ResultCode::Timeout.is_success());
    }

    #[test]
    fn platform_unavailable_is_distinct() {
        assert!(GfxError::PlatformUnsupported("headless".into()).is_platform_unavailable());
        assert!(!GfxError::InvalidState("x".into()).is_platform_unavailable());
        assert_eq!(
            GfxError::PlatformUnsupported(String::new()).code(),
            ResultCode::ErrorPlatformUnsupported
        );
    }

    #[test]
    fn result_strings() {
        assert_eq!(result_to_string(ResultCode::Success), "Success");
        assert_eq!(result_to_string(ResultCode::ErrorOutOfDate), "Out of date");
    }

    #[cfg(feature = "gfx-vulkan")]
    #[test]
    fn vulkan_results_map_to_kinds() {
        use ash::vk;
        assert_eq!(
            GfxError::from(vk::Result::ERROR_OUT_OF_DATE_KHR),
            GfxError::OutOfDate
        );
        assert_eq!(
            GfxError::from(vk::Result::ERROR_DEVICE_LOST),
            GfxError::DeviceLost
        );
        assert_eq!(
            GfxError::from(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            GfxError::OutOfMemory
        );
    }
}
