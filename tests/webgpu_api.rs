#![cfg(feature = "gfx-webgpu")]

#[macro_use]
mod common;

use gfx::*;
use serial_test::serial;

const DOUBLE_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read_write> values: array<u32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x < arrayLength(&values)) {
        values[id.x] = values[id.x] * 2u;
    }
}
"#;

#[test]
#[serial]
fn test_device() {
    let device = device_or_skip!(Backend::WebGpu);
    assert_eq!(device.backend(), Backend::WebGpu);
    assert!(device.supports_shader_format(ShaderSourceType::Wgsl));
    assert!(device.supports_shader_format(ShaderSourceType::SpirV));
    assert!(device.limits().min_storage_buffer_offset_alignment.is_power_of_two());
}

#[test]
#[serial]
fn test_buffer_upload_and_readback() {
    let mut device = device_or_skip!(Backend::WebGpu);
    common::upload_and_read_back(&mut device);
}

#[test]
#[serial]
fn test_texture_round_trip() {
    let mut device = device_or_skip!(Backend::WebGpu);
    common::texture_round_trip(&mut device);
}

#[test]
#[serial]
fn test_clear_render_target() {
    let mut device = device_or_skip!(Backend::WebGpu);
    common::clear_render_target(&mut device);
}

#[test]
#[serial]
fn test_spirv_compute_dispatch() {
    let mut device = device_or_skip!(Backend::WebGpu);
    common::empty_compute_dispatch(&mut device);
}

#[test]
#[serial]
fn test_wgsl_compute_doubles_values() {
    let mut device = device_or_skip!(Backend::WebGpu);
    let values: Vec<u32> = (0..256).collect();
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();

    let storage = common::storage_buffer(&mut device, bytes.len() as u64);
    let readback = common::readback_buffer(&mut device, bytes.len() as u64);
    device.queue().write_buffer(storage, 0, &bytes).unwrap();

    let shader = device
        .create_shader(&ShaderDescriptor {
            label: Some("double"),
            source: ShaderSource::Wgsl(DOUBLE_WGSL),
            entry_point: "main",
        })
        .unwrap();
    let layout = device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("double"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage,
                    has_dynamic_offset: false,
                    min_binding_size: 0,
                },
            }],
        })
        .unwrap();
    let group = device
        .create_bind_group(&BindGroupDescriptor {
            label: Some("double"),
            layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer {
                    buffer: storage,
                    offset: 0,
                    size: 0,
                },
            }],
        })
        .unwrap();
    let pipeline = device
        .create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("double"),
            compute: shader,
            entry_point: "main",
            bind_group_layouts: &[layout],
        })
        .unwrap();

    let size = bytes.len() as u64;
    CommandExecutor::new(&mut device)
        .with_label("double")
        .execute(|encoder| {
            let mut pass = encoder.begin_compute_pass(Some("double"))?;
            pass.set_pipeline(pipeline)?;
            pass.set_bind_group(0, group, &[])?;
            pass.dispatch_workgroups(values.len() as u32 / 64, 1, 1)?;
            pass.end()?;
            encoder.copy_buffer_to_buffer(&CopyBufferToBuffer {
                source: storage,
                source_offset: 0,
                destination: readback,
                destination_offset: 0,
                size,
            })
        })
        .unwrap();

    let out = common::read_back(&mut device, readback, bytes.len());
    let doubled: Vec<u32> = out
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let expected: Vec<u32> = values.iter().map(|v| v * 2).collect();
    assert_eq!(doubled, expected);

    device.destroy_compute_pipeline(pipeline).unwrap();
    device.destroy_bind_group(group).unwrap();
    device.destroy_bind_group_layout(layout).unwrap();
    device.destroy_shader(shader).unwrap();
    device.destroy_buffer(storage).unwrap();
    device.destroy_buffer(readback).unwrap();
}

#[test]
#[serial]
fn test_fences() {
    let mut device = device_or_skip!(Backend::WebGpu);
    common::fence_lifecycle(&mut device);
    common::submit_signals_fence(&mut device);
}

#[test]
#[serial]
fn test_idle_queue_ends_finite_fence_wait_early() {
    let mut device = device_or_skip!(Backend::WebGpu);
    let fence = device.create_fence(false).unwrap();
    let started = std::time::Instant::now();
    assert_eq!(
        device.fence_wait(fence, 5_000_000_000).unwrap(),
        WaitStatus::Timeout
    );
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
    device.destroy_fence(fence).unwrap();
}

#[test]
#[serial]
fn test_semaphores() {
    let mut device = device_or_skip!(Backend::WebGpu);
    common::semaphores(&mut device);
}

#[test]
#[serial]
fn test_timeline_semaphores_are_unavailable() {
    common::init_logging();
    let Ok(instance) = Instance::new(&InstanceDescriptor {
        backend: Backend::WebGpu,
        ..Default::default()
    }) else {
        return;
    };
    let Ok(adapter) = instance.request_adapter(&AdapterDescriptor::default()) else {
        return;
    };
    let err = adapter
        .create_device(&DeviceDescriptor {
            features: DeviceFeatures::TIMELINE_SEMAPHORE,
            ..Default::default()
        })
        .err()
        .expect("timeline semaphores should be refused");
    assert!(matches!(err, GfxError::FeatureNotSupported(_)));
}

#[test]
#[serial]
fn test_handle_rules() {
    let mut device = device_or_skip!(Backend::WebGpu);
    common::stale_handles_are_rejected(&mut device);
    common::submit_with_destroyed_resource_fails(&mut device);
}

#[test]
#[serial]
fn test_mapping_rules() {
    let mut device = device_or_skip!(Backend::WebGpu);
    common::mapping_rules(&mut device);
}

#[test]
#[serial]
fn test_unaligned_multi_row_copy_is_rejected() {
    let mut device = device_or_skip!(Backend::WebGpu);
    let texture = device
        .create_texture(&TextureDescriptor {
            size: Extent3D::new(3, 2, 1),
            format: TextureFormat::R8G8B8A8Unorm,
            usage: TextureUsages::COPY_SRC,
            ..Default::default()
        })
        .unwrap();
    let readback = common::readback_buffer(&mut device, 256);
    let result = CommandExecutor::new(&mut device).execute(|encoder| {
        encoder.copy_texture_to_buffer(&CopyTextureToBuffer {
            source: texture,
            origin: Origin3D::default(),
            mip_level: 0,
            destination: readback,
            destination_offset: 0,
            bytes_per_row: 0,
            extent: Extent3D::new(3, 2, 1),
            final_layout: TextureLayout::TransferSrc,
        })
    });
    assert!(matches!(result, Err(GfxError::InvalidArgument(_))), "{result:?}");
    device.destroy_buffer(readback).unwrap();
    device.destroy_texture(texture).unwrap();
}

#[test]
#[serial]
fn test_generate_mipmaps() {
    let mut device = device_or_skip!(Backend::WebGpu);
    common::generate_mipmaps(&mut device);
}

#[test]
#[serial]
fn test_query_sets() {
    let mut device = device_or_skip!(Backend::WebGpu);
    common::query_set_rules(&mut device);
    common::timestamps(&mut device);
    common::occlusion_without_draws(&mut device);
}
