mod common;

use std::ffi::c_void;

use gfx::*;
use serial_test::serial;

fn instance(backend: Backend) -> Option<Instance> {
    common::init_logging();
    match Instance::new(&InstanceDescriptor {
        backend,
        features: InstanceFeatures::SURFACE,
        ..Default::default()
    }) {
        Ok(instance) => Some(instance),
        Err(err) if err.is_platform_unavailable() => None,
        Err(err) => panic!("instance creation failed: {err}"),
    }
}

/// A well-formed handle for a window system this host does not run.
fn foreign_window() -> PlatformWindowHandle {
    let fake = 0x1000 as *mut c_void;
    if cfg!(windows) {
        PlatformWindowHandle::Wayland {
            display: fake,
            surface: fake,
        }
    } else {
        PlatformWindowHandle::Win32 {
            hinstance: fake,
            hwnd: fake,
        }
    }
}

fn check_surface_errors(backend: Backend) {
    let Some(instance) = instance(backend) else {
        return;
    };

    let incomplete = instance.create_surface(&SurfaceDescriptor {
        label: None,
        window: PlatformWindowHandle::Xlib {
            display: std::ptr::null_mut(),
            window: 1,
        },
    });
    assert!(matches!(incomplete, Err(GfxError::InvalidArgument(_))));

    let foreign = instance.create_surface(&SurfaceDescriptor {
        label: Some("foreign"),
        window: foreign_window(),
    });
    let err = foreign.err().expect("foreign window systems must be refused");
    assert!(matches!(err, GfxError::PlatformUnsupported(_)), "{err:?}");
    assert!(err.is_platform_unavailable());
}

#[test]
#[serial]
#[cfg(feature = "gfx-vulkan")]
fn test_vulkan_surface_errors() {
    check_surface_errors(Backend::Vulkan);
}

#[test]
#[serial]
#[cfg(feature = "gfx-webgpu")]
fn test_webgpu_surface_errors() {
    check_surface_errors(Backend::WebGpu);
}

/// Opens an X11 window when the host has a display, then builds a swapchain
/// for it and cycles a few frames through acquire and present.
#[cfg(all(
    unix,
    not(any(target_os = "macos", target_os = "ios", target_os = "android"))
))]
fn check_swapchain(backend: Backend) {
    use rwh_04::{HasRawWindowHandle, RawWindowHandle};
    use winit::platform::unix::EventLoopExtUnix;

    let Some(instance) = instance(backend) else {
        return;
    };
    let Ok(event_loop) = winit::event_loop::EventLoop::<()>::new_x11_any_thread() else {
        log::warn!("skipping: no X11 display");
        return;
    };
    let Ok(window) = winit::window::WindowBuilder::new()
        .with_title("gfx swapchain")
        .with_inner_size(winit::dpi::PhysicalSize::new(64u32, 64u32))
        .build(&event_loop)
    else {
        return;
    };
    let RawWindowHandle::Xlib(xlib) = window.raw_window_handle() else {
        return;
    };

    let surface = match instance.create_surface(&SurfaceDescriptor {
        label: Some("swapchain test"),
        window: PlatformWindowHandle::Xlib {
            display: xlib.display,
            window: xlib.window as u64,
        },
    }) {
        Ok(surface) => surface,
        Err(err) if err.is_platform_unavailable() => return,
        Err(err) => panic!("surface creation failed: {err}"),
    };
    let adapter = match instance.request_adapter(&AdapterDescriptor::default()) {
        Ok(adapter) => adapter,
        Err(err) if err.is_platform_unavailable() => return,
        Err(err) => panic!("no adapter: {err}"),
    };
    let mut device = adapter
        .create_device(&DeviceDescriptor {
            label: Some("swapchain device"),
            features: DeviceFeatures::SWAPCHAIN,
            ..Default::default()
        })
        .unwrap();

    let format = device
        .surface_formats(&surface)
        .unwrap()
        .first()
        .copied()
        .unwrap_or(TextureFormat::B8G8R8A8Unorm);
    let swapchain = match device.create_swapchain(
        &surface,
        &SwapchainDescriptor {
            label: Some("swapchain test"),
            width: 64,
            height: 64,
            format,
            ..Default::default()
        },
    ) {
        Ok(swapchain) => swapchain,
        Err(err) if err.is_platform_unavailable() => return,
        Err(err) => panic!("swapchain creation failed: {err}"),
    };
    let info = device.swapchain_info(swapchain).unwrap();
    assert!(info.image_count >= 1);

    let ready = device
        .create_semaphore(&SemaphoreDescriptor::default())
        .unwrap();
    for _ in 0..3 {
        let status = device
            .acquire_next_image(swapchain, TIMEOUT_INFINITE, Some(ready), None)
            .unwrap();
        let AcquireStatus::Acquired(index) = status else {
            panic!("an infinite acquire must yield an image, got {status:?}");
        };
        assert!(index < info.image_count);
        device.swapchain_image_view(swapchain, index).unwrap();
        device.present(swapchain, &[ready]).unwrap();
    }
    let err = device.present(swapchain, &[]).unwrap_err();
    assert!(matches!(err, GfxError::InvalidState(_)));

    device.wait_idle().unwrap();
    device.destroy_semaphore(ready).unwrap();
    device.destroy_swapchain(swapchain).unwrap();
}

#[test]
#[serial]
#[cfg(all(
    feature = "gfx-vulkan",
    unix,
    not(any(target_os = "macos", target_os = "ios", target_os = "android"))
))]
fn test_vulkan_swapchain_frames() {
    check_swapchain(Backend::Vulkan);
}

#[test]
#[serial]
#[cfg(all(
    feature = "gfx-webgpu",
    unix,
    not(any(target_os = "macos", target_os = "ios", target_os = "android"))
))]
fn test_webgpu_swapchain_frames() {
    check_swapchain(Backend::WebGpu);
}

#[test]
#[serial]
fn test_auto_backend_picks_a_real_backend() {
    let Some(instance) = instance(Backend::Auto) else {
        return;
    };
    assert_ne!(instance.backend(), Backend::Auto);
    if let Ok(adapters) = instance.enumerate_adapters() {
        for adapter in adapters {
            assert_eq!(adapter.info().backend, instance.backend());
        }
    }
}

#[test]
#[serial]
fn test_swapchain_descriptor_defaults() {
    let desc = SwapchainDescriptor::default();
    assert_eq!(desc.present_mode, PresentMode::Fifo);
    assert!(desc.image_count >= 2);
}

#[test]
fn test_result_codes_are_stable() {
    assert_eq!(GfxError::OutOfDate.code() as i32, -6);
    assert_eq!(GfxError::SurfaceLost.code() as i32, -5);
    assert_eq!(ResultCode::from(WaitStatus::Timeout), ResultCode::Timeout);
    assert!(ResultCode::Timeout.is_success());
    assert_eq!(result_to_string(ResultCode::ErrorOutOfDate), "Out of date");
}

#[test]
fn test_acquire_status_is_not_an_error() {
    assert_eq!(AcquireStatus::Acquired(2).image_index(), Some(2));
    assert_eq!(AcquireStatus::Timeout.image_index(), None);
    assert_eq!(ResultCode::from(AcquireStatus::Acquired(0)), ResultCode::Success);
    assert_eq!(ResultCode::from(AcquireStatus::Timeout), ResultCode::Timeout);
    assert_eq!(ResultCode::from(AcquireStatus::NotReady), ResultCode::NotReady);
    assert!(ResultCode::from(AcquireStatus::NotReady).is_success());
}
