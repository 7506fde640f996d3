#![cfg(feature = "gfx-vulkan")]

#[macro_use]
mod common;

use gfx::*;
use serial_test::serial;

#[test]
#[serial]
fn test_device() {
    let device = device_or_skip!(Backend::Vulkan);
    assert_eq!(device.backend(), Backend::Vulkan);
    assert!(device.limits().max_texture_dimension_2d >= 4096);
    assert!(device.supports_shader_format(ShaderSourceType::SpirV));
    assert!(!device.supports_shader_format(ShaderSourceType::Wgsl));
}

#[test]
#[serial]
fn test_buffer_upload_and_readback() {
    let mut device = device_or_skip!(Backend::Vulkan);
    common::upload_and_read_back(&mut device);
}

#[test]
#[serial]
fn test_texture_round_trip() {
    let mut device = device_or_skip!(Backend::Vulkan);
    common::texture_round_trip(&mut device);
}

#[test]
#[serial]
fn test_clear_render_target() {
    let mut device = device_or_skip!(Backend::Vulkan);
    common::clear_render_target(&mut device);
}

#[test]
#[serial]
fn test_compute_dispatch() {
    let mut device = device_or_skip!(Backend::Vulkan);
    common::empty_compute_dispatch(&mut device);
}

#[test]
#[serial]
fn test_fences() {
    let mut device = device_or_skip!(Backend::Vulkan);
    common::fence_lifecycle(&mut device);
    common::submit_signals_fence(&mut device);
}

#[test]
#[serial]
fn test_semaphores() {
    let mut device = device_or_skip!(Backend::Vulkan);
    common::semaphores(&mut device);
}

#[test]
#[serial]
fn test_timeline_semaphore_when_enabled() {
    let Some(mut device) =
        common::ValidationDevice::headless(Backend::Vulkan, DeviceFeatures::TIMELINE_SEMAPHORE)
    else {
        return;
    };
    let semaphore = device
        .create_semaphore(&SemaphoreDescriptor {
            semaphore_type: SemaphoreType::Timeline,
            initial_value: 3,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(device.semaphore_type(semaphore).unwrap(), SemaphoreType::Timeline);
    assert_eq!(device.semaphore_value(semaphore).unwrap(), 3);
    assert_eq!(device.semaphore_wait(semaphore, 3, 0).unwrap(), WaitStatus::Success);
    assert_eq!(
        device.semaphore_wait(semaphore, 5, 1_000_000).unwrap(),
        WaitStatus::Timeout
    );

    device.semaphore_signal(semaphore, 5).unwrap();
    assert_eq!(device.semaphore_value(semaphore).unwrap(), 5);
    assert_eq!(
        device.semaphore_wait(semaphore, 5, TIMEOUT_INFINITE).unwrap(),
        WaitStatus::Success
    );

    let err = device.semaphore_signal(semaphore, 5).unwrap_err();
    assert!(matches!(err, GfxError::InvalidArgument(_)));
    device.destroy_semaphore(semaphore).unwrap();
}

#[test]
#[serial]
fn test_handle_rules() {
    let mut device = device_or_skip!(Backend::Vulkan);
    common::stale_handles_are_rejected(&mut device);
    common::submit_with_destroyed_resource_fails(&mut device);
}

#[test]
#[serial]
fn test_mapping_rules() {
    let mut device = device_or_skip!(Backend::Vulkan);
    common::mapping_rules(&mut device);
}

#[test]
#[serial]
fn test_wgsl_is_rejected() {
    let mut device = device_or_skip!(Backend::Vulkan);
    let err = device
        .create_shader(&ShaderDescriptor {
            label: None,
            source: ShaderSource::Wgsl("@compute @workgroup_size(1) fn main() {}"),
            entry_point: "main",
        })
        .unwrap_err();
    assert!(matches!(err, GfxError::InvalidArgument(_)));
}

#[test]
#[serial]
fn test_generate_mipmaps() {
    let mut device = device_or_skip!(Backend::Vulkan);
    common::generate_mipmaps(&mut device);
}

#[test]
#[serial]
fn test_query_sets() {
    let mut device = device_or_skip!(Backend::Vulkan);
    common::query_set_rules(&mut device);
    common::timestamps(&mut device);
    common::occlusion_without_draws(&mut device);
}
