#![allow(dead_code)]

use gfx::gpu::instance::ENV_VALIDATION;
use gfx::*;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Device opened with validation enabled for the duration of a test.
///
/// Hosts without a usable driver for `backend` produce `None` so tests can
/// bail out instead of failing.
pub struct ValidationDevice {
    device: Option<Device>,
    _instance: Instance,
    original_validation: Option<String>,
}

impl ValidationDevice {
    pub fn headless(backend: Backend, features: DeviceFeatures) -> Option<Self> {
        init_logging();
        let original_validation = std::env::var(ENV_VALIDATION).ok();
        std::env::set_var(ENV_VALIDATION, "1");

        match open(backend, features) {
            Ok((instance, device)) => Some(Self {
                device: Some(device),
                _instance: instance,
                original_validation,
            }),
            Err(err) => {
                restore(&original_validation);
                if err.is_platform_unavailable() {
                    log::warn!("skipping: {backend:?} unavailable ({err})");
                    None
                } else {
                    panic!("failed to open a {backend:?} device: {err}");
                }
            }
        }
    }
}

fn open(backend: Backend, features: DeviceFeatures) -> Result<(Instance, Device)> {
    let instance = Instance::new(&InstanceDescriptor {
        backend,
        application_name: "gfx-tests",
        ..Default::default()
    })?;
    let adapter = instance.request_adapter(&AdapterDescriptor::default())?;
    let device = adapter.create_device(&DeviceDescriptor {
        label: Some("test device"),
        features,
        ..Default::default()
    })?;
    Ok((instance, device))
}

fn restore(original: &Option<String>) {
    match original {
        Some(value) => std::env::set_var(ENV_VALIDATION, value),
        None => std::env::remove_var(ENV_VALIDATION),
    }
}

impl std::ops::Deref for ValidationDevice {
    type Target = Device;

    fn deref(&self) -> &Self::Target {
        self.device.as_ref().expect("device should be present")
    }
}

impl std::ops::DerefMut for ValidationDevice {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.device.as_mut().expect("device should be present")
    }
}

impl Drop for ValidationDevice {
    fn drop(&mut self) {
        // The device goes before the instance it came from.
        drop(self.device.take());
        restore(&self.original_validation);
    }
}

/// Open a device or return from the calling test.
#[allow(unused_macros)]
macro_rules! device_or_skip {
    ($backend:expr) => {
        device_or_skip!($backend, gfx::DeviceFeatures::empty())
    };
    ($backend:expr, $features:expr) => {
        match common::ValidationDevice::headless($backend, $features) {
            Some(device) => device,
            None => return,
        }
    };
}

pub fn storage_buffer(device: &mut Device, size: u64) -> Handle<Buffer> {
    device
        .create_buffer(&BufferDescriptor {
            label: Some("storage"),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
        })
        .expect("storage buffer")
}

pub fn readback_buffer(device: &mut Device, size: u64) -> Handle<Buffer> {
    device
        .create_buffer(&BufferDescriptor {
            label: Some("readback"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            memory_properties: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
        })
        .expect("readback buffer")
}

/// Map `buffer` for reading and copy out its first `len` bytes.
pub fn read_back(device: &mut Device, buffer: Handle<Buffer>, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    device
        .map_buffer(buffer, 0, len as u64, MapMode::Read)
        .expect("map readback");
    device.read_mapped(buffer, 0, &mut out).expect("read mapped");
    device.unmap_buffer(buffer).expect("unmap readback");
    out
}

//===----------------------------------------------------------------------===//
// Scenarios shared by every backend
//===----------------------------------------------------------------------===//

pub fn upload_and_read_back(device: &mut Device) {
    let data: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
    let gpu = storage_buffer(device, data.len() as u64);
    let readback = readback_buffer(device, data.len() as u64);

    device.queue().write_buffer(gpu, 0, &data).expect("write_buffer");
    CommandExecutor::new(device)
        .execute(|encoder| {
            encoder.copy_buffer_to_buffer(&CopyBufferToBuffer {
                source: gpu,
                source_offset: 0,
                destination: readback,
                destination_offset: 0,
                size: data.len() as u64,
            })
        })
        .expect("copy to readback");

    assert_eq!(read_back(device, readback, data.len()), data);
    device.destroy_buffer(gpu).unwrap();
    device.destroy_buffer(readback).unwrap();
}

pub fn texture_round_trip(device: &mut Device) {
    // 64 RGBA8 texels make a 256 byte row, which both backends copy as is.
    let extent = Extent3D::new(64, 4, 1);
    let texels: Vec<u8> = (0..64 * 4 * 4).map(|i| (i * 7 % 256) as u8).collect();
    let texture = device
        .create_texture(&TextureDescriptor {
            label: Some("round trip"),
            size: extent,
            format: TextureFormat::R8G8B8A8Unorm,
            usage: TextureUsages::COPY_SRC | TextureUsages::COPY_DST | TextureUsages::TEXTURE_BINDING,
            ..Default::default()
        })
        .expect("texture");
    assert_eq!(device.texture_layout(texture).unwrap(), TextureLayout::Undefined);

    device
        .queue()
        .write_texture(
            &TextureWrite {
                texture,
                mip_level: 0,
                origin: Origin3D::default(),
                extent,
                bytes_per_row: 0,
                final_layout: TextureLayout::ShaderReadOnly,
            },
            &texels,
        )
        .expect("write_texture");
    assert_eq!(device.texture_layout(texture).unwrap(), TextureLayout::ShaderReadOnly);

    let readback = readback_buffer(device, texels.len() as u64);
    CommandExecutor::new(device)
        .execute(|encoder| {
            encoder.copy_texture_to_buffer(&CopyTextureToBuffer {
                source: texture,
                origin: Origin3D::default(),
                mip_level: 0,
                destination: readback,
                destination_offset: 0,
                bytes_per_row: 256,
                extent,
                final_layout: TextureLayout::TransferSrc,
            })
        })
        .expect("copy to readback");
    assert_eq!(device.texture_layout(texture).unwrap(), TextureLayout::TransferSrc);
    assert_eq!(read_back(device, readback, texels.len()), texels);

    device.destroy_buffer(readback).unwrap();
    device.destroy_texture(texture).unwrap();
}

pub fn fence_lifecycle(device: &mut Device) {
    let unsignaled = device.create_fence(false).unwrap();
    assert!(!device.fence_is_signaled(unsignaled).unwrap());
    device.destroy_fence(unsignaled).unwrap();

    let fence = device.create_fence(true).unwrap();
    assert!(device.fence_is_signaled(fence).unwrap());
    assert_eq!(device.fence_wait(fence, 0).unwrap(), WaitStatus::Success);

    device.fence_reset(fence).unwrap();
    assert!(!device.fence_is_signaled(fence).unwrap());
    assert_eq!(
        device.fence_wait(fence, 1_000_000).unwrap(),
        WaitStatus::Timeout
    );

    device.fence_signal(fence).unwrap();
    assert!(device.fence_is_signaled(fence).unwrap());
    assert_eq!(device.fence_wait(fence, 0).unwrap(), WaitStatus::Success);

    device.fence_signal(fence).unwrap();
    device.fence_reset(fence).unwrap();
    assert!(!device.fence_is_signaled(fence).unwrap());
    device.fence_signal(fence).unwrap();

    let other = device.create_fence(false).unwrap();
    assert_eq!(
        device.wait_for_fences(&[fence, other], false, 0).unwrap(),
        WaitStatus::Success
    );
    assert_eq!(
        device.wait_for_fences(&[fence, other], true, 0).unwrap(),
        WaitStatus::Timeout
    );

    device.destroy_fence(fence).unwrap();
    device.destroy_fence(other).unwrap();
}

pub fn submit_signals_fence(device: &mut Device) {
    let gpu = storage_buffer(device, 256);
    let readback = readback_buffer(device, 256);
    let fence = device.create_fence(false).unwrap();

    let mut encoder = device.create_command_encoder(Some("submit"));
    encoder
        .copy_buffer_to_buffer(&CopyBufferToBuffer {
            source: gpu,
            source_offset: 0,
            destination: readback,
            destination_offset: 0,
            size: 256,
        })
        .unwrap();
    let commands = encoder.finish().unwrap();
    device
        .queue()
        .submit(&SubmitInfo {
            command_buffers: &[&commands],
            signal_fence: Some(fence),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(
        device.fence_wait(fence, TIMEOUT_INFINITE).unwrap(),
        WaitStatus::Success
    );

    // A recorded list can be submitted again.
    device.fence_reset(fence).unwrap();
    device
        .queue()
        .submit(&SubmitInfo {
            command_buffers: &[&commands],
            signal_fence: Some(fence),
            ..Default::default()
        })
        .unwrap();
    device.queue().wait_idle().unwrap();
    assert!(device.fence_is_signaled(fence).unwrap());

    device.destroy_fence(fence).unwrap();
    device.destroy_buffer(gpu).unwrap();
    device.destroy_buffer(readback).unwrap();
}

pub fn stale_handles_are_rejected(device: &mut Device) {
    let buffer = storage_buffer(device, 64);
    device.destroy_buffer(buffer).unwrap();

    assert!(matches!(device.destroy_buffer(buffer), Err(GfxError::InvalidState(_))));
    assert!(matches!(device.buffer_info(buffer), Err(GfxError::InvalidArgument(_))));

    // The slot is reused under a new generation; the old handle stays dead.
    let replacement = storage_buffer(device, 64);
    assert_eq!(replacement.slot, buffer.slot);
    assert_ne!(replacement, buffer);
    assert!(device.buffer_info(buffer).is_err());
    assert_eq!(device.buffer_info(replacement).unwrap().size, 64);
    device.destroy_buffer(replacement).unwrap();
}

pub fn submit_with_destroyed_resource_fails(device: &mut Device) {
    let source = storage_buffer(device, 64);
    let destination = storage_buffer(device, 64);
    let mut encoder = device.create_command_encoder(None);
    encoder
        .copy_buffer_to_buffer(&CopyBufferToBuffer {
            source,
            source_offset: 0,
            destination,
            destination_offset: 0,
            size: 64,
        })
        .unwrap();
    let commands = encoder.finish().unwrap();

    device.destroy_buffer(source).unwrap();
    let err = device
        .queue()
        .submit(&SubmitInfo {
            command_buffers: &[&commands],
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, GfxError::InvalidArgument(_)), "{err:?}");
    device.destroy_buffer(destination).unwrap();
}

pub fn mapping_rules(device: &mut Device) {
    let gpu_only = storage_buffer(device, 64);
    assert!(matches!(
        device.map_buffer(gpu_only, 0, 0, MapMode::Read),
        Err(GfxError::InvalidArgument(_))
    ));

    let upload = device
        .create_buffer(&BufferDescriptor {
            label: Some("upload"),
            size: 64,
            usage: BufferUsages::MAP_WRITE | BufferUsages::COPY_SRC,
            memory_properties: MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
        })
        .unwrap();
    assert!(matches!(
        device.map_buffer(upload, 0, 0, MapMode::Read),
        Err(GfxError::InvalidArgument(_))
    ));
    device.map_buffer(upload, 0, 0, MapMode::Write).unwrap();
    assert!(matches!(
        device.map_buffer(upload, 0, 0, MapMode::Write),
        Err(GfxError::InvalidState(_))
    ));
    assert!(matches!(
        device.write_mapped(upload, 60, &[0u8; 8]),
        Err(GfxError::InvalidArgument(_))
    ));
    device.write_mapped(upload, 8, &[1u8; 16]).unwrap();
    device.unmap_buffer(upload).unwrap();
    assert!(matches!(device.unmap_buffer(upload), Err(GfxError::InvalidState(_))));

    // Destroying a mapped buffer unmaps it first.
    device.map_buffer(upload, 0, 0, MapMode::Write).unwrap();
    device.destroy_buffer(upload).unwrap();
    device.destroy_buffer(gpu_only).unwrap();
}

pub fn semaphores(device: &mut Device) {
    let binary = device
        .create_semaphore(&SemaphoreDescriptor::default())
        .unwrap();
    assert_eq!(device.semaphore_type(binary).unwrap(), SemaphoreType::Binary);
    assert!(matches!(
        device.semaphore_signal(binary, 1),
        Err(GfxError::InvalidArgument(_))
    ));
    assert!(matches!(
        device.semaphore_wait(binary, 1, 0),
        Err(GfxError::InvalidArgument(_))
    ));
    assert!(matches!(
        device.semaphore_value(binary),
        Err(GfxError::InvalidArgument(_))
    ));
    device.destroy_semaphore(binary).unwrap();

    let timeline = device.create_semaphore(&SemaphoreDescriptor {
        semaphore_type: SemaphoreType::Timeline,
        ..Default::default()
    });
    assert!(matches!(timeline, Err(GfxError::FeatureNotSupported(_))));
}

pub fn clear_render_target(device: &mut Device) {
    let extent = Extent3D::new(64, 2, 1);
    let target = device
        .create_texture(&TextureDescriptor {
            label: Some("clear target"),
            size: extent,
            format: TextureFormat::R8G8B8A8Unorm,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
            ..Default::default()
        })
        .unwrap();
    let view = device
        .create_texture_view(target, &TextureViewDescriptor::default())
        .unwrap();
    let pass = device
        .create_render_pass(&RenderPassDescriptor {
            label: Some("clear"),
            color_attachments: &[RenderPassColorAttachment {
                target: ColorAttachmentTarget {
                    format: TextureFormat::R8G8B8A8Unorm,
                    sample_count: SampleCount::S1,
                    ops: LoadStoreOps {
                        load: LoadOp::Clear,
                        store: StoreOp::Store,
                    },
                    final_layout: TextureLayout::TransferSrc,
                },
                resolve_target: None,
            }],
            depth_stencil_attachment: None,
        })
        .unwrap();
    let framebuffer = device
        .create_framebuffer(&FramebufferDescriptor {
            label: None,
            render_pass: pass,
            color_attachments: &[FramebufferAttachment {
                view,
                resolve_target: None,
            }],
            depth_stencil_attachment: None,
            width: extent.width,
            height: extent.height,
        })
        .unwrap();

    let readback = readback_buffer(device, 256 * 2);
    CommandExecutor::new(device)
        .with_label("clear")
        .execute(|encoder| {
            encoder
                .begin_render_pass(&RenderPassBeginInfo {
                    label: Some("clear"),
                    render_pass: pass,
                    framebuffer,
                    color_clear_values: &[Color::new(1.0, 0.0, 0.0, 1.0)],
                    depth_clear_value: 1.0,
                    stencil_clear_value: 0,
                })?
                .end()?;
            encoder.copy_texture_to_buffer(&CopyTextureToBuffer {
                source: target,
                origin: Origin3D::default(),
                mip_level: 0,
                destination: readback,
                destination_offset: 0,
                bytes_per_row: 256,
                extent,
                final_layout: TextureLayout::TransferSrc,
            })
        })
        .unwrap();

    let pixels = read_back(device, readback, 256 * 2);
    for texel in pixels.chunks_exact(4) {
        assert_eq!(texel, [255, 0, 0, 255]);
    }

    device.destroy_framebuffer(framebuffer).unwrap();
    device.destroy_render_pass(pass).unwrap();
    device.destroy_texture_view(view).unwrap();
    device.destroy_texture(target).unwrap();
    device.destroy_buffer(readback).unwrap();
}

/// `void main() {}` compute shader with a 1x1x1 workgroup.
#[rustfmt::skip]
pub const EMPTY_COMPUTE_SPIRV: &[u32] = &[
    0x0723_0203, 0x0001_0000, 0, 5, 0,
    0x0002_0011, 1,
    0x0003_000E, 0, 1,
    0x0005_000F, 5, 1, 0x6E69_616D, 0,
    0x0006_0010, 1, 17, 1, 1, 1,
    0x0002_0013, 2,
    0x0003_0021, 3, 2,
    0x0005_0036, 2, 1, 0, 3,
    0x0002_00F8, 4,
    0x0001_00FD,
    0x0001_0038,
];

pub fn empty_compute_dispatch(device: &mut Device) {
    let shader = device
        .create_shader(&ShaderDescriptor {
            label: Some("empty compute"),
            source: ShaderSource::SpirV(EMPTY_COMPUTE_SPIRV),
            entry_point: "main",
        })
        .unwrap();
    let pipeline = device
        .create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("empty compute"),
            compute: shader,
            entry_point: "main",
            bind_group_layouts: &[],
        })
        .unwrap();

    CommandExecutor::new(device)
        .execute(|encoder| {
            let mut pass = encoder.begin_compute_pass(Some("empty"))?;
            pass.set_pipeline(pipeline)?;
            pass.dispatch_workgroups(4, 1, 1)?;
            pass.end()
        })
        .unwrap();

    let fence = device.create_fence(false).unwrap();
    let mut encoder = device.create_command_encoder(Some("single dispatch"));
    {
        let mut pass = encoder.begin_compute_pass(Some("single")).unwrap();
        pass.set_pipeline(pipeline).unwrap();
        pass.dispatch_workgroups(1, 1, 1).unwrap();
        pass.end().unwrap();
    }
    let commands = encoder.finish().unwrap();
    device
        .queue()
        .submit(&SubmitInfo {
            command_buffers: &[&commands],
            signal_fence: Some(fence),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(
        device.fence_wait(fence, TIMEOUT_INFINITE).unwrap(),
        WaitStatus::Success
    );

    device.destroy_fence(fence).unwrap();
    device.destroy_compute_pipeline(pipeline).unwrap();
    device.destroy_shader(shader).unwrap();
}

//===----------------------------------------------------------------------===//
// Mipmaps
//===----------------------------------------------------------------------===//

pub fn generate_mipmaps(device: &mut Device) {
    const TEXEL: [u8; 4] = [40, 80, 120, 255];
    let extent = Extent3D::new(64, 64, 1);
    let texture = device
        .create_texture(&TextureDescriptor {
            label: Some("mipmapped"),
            size: extent,
            mip_level_count: 4,
            format: TextureFormat::R8G8B8A8Unorm,
            usage: TextureUsages::COPY_SRC | TextureUsages::COPY_DST | TextureUsages::TEXTURE_BINDING,
            ..Default::default()
        })
        .unwrap();
    let texels: Vec<u8> = TEXEL.iter().copied().cycle().take(64 * 64 * 4).collect();
    device
        .queue()
        .write_texture(
            &TextureWrite {
                texture,
                mip_level: 0,
                origin: Origin3D::default(),
                extent,
                bytes_per_row: 0,
                final_layout: TextureLayout::TransferDst,
            },
            &texels,
        )
        .unwrap();

    CommandExecutor::new(device)
        .execute(|encoder| encoder.generate_mipmaps(texture))
        .unwrap();
    assert_eq!(device.texture_layout(texture).unwrap(), TextureLayout::ShaderReadOnly);

    // Level 3 is 8x8; a solid color averages to itself.
    let readback = readback_buffer(device, 256 * 8);
    CommandExecutor::new(device)
        .execute(|encoder| {
            encoder.copy_texture_to_buffer(&CopyTextureToBuffer {
                source: texture,
                origin: Origin3D::default(),
                mip_level: 3,
                destination: readback,
                destination_offset: 0,
                bytes_per_row: 256,
                extent: Extent3D::new(8, 8, 1),
                final_layout: TextureLayout::ShaderReadOnly,
            })
        })
        .unwrap();
    let pixels = read_back(device, readback, 256 * 8);
    for row in pixels.chunks_exact(256) {
        for texel in row[..8 * 4].chunks_exact(4) {
            for (got, want) in texel.iter().zip(TEXEL) {
                assert!(got.abs_diff(want) <= 1, "{texel:?} != {TEXEL:?}");
            }
        }
    }

    // The base of a partial range must be inside the chain.
    let err = CommandExecutor::new(device)
        .execute(|encoder| encoder.generate_mipmaps_range(texture, 4, 1))
        .unwrap_err();
    assert!(matches!(err, GfxError::InvalidArgument(_)), "{err:?}");
    CommandExecutor::new(device)
        .execute(|encoder| encoder.generate_mipmaps_range(texture, 1, 3))
        .unwrap();

    device.destroy_buffer(readback).unwrap();
    device.destroy_texture(texture).unwrap();

    let upload_only = device
        .create_texture(&TextureDescriptor {
            label: Some("upload only"),
            size: extent,
            mip_level_count: 4,
            format: TextureFormat::R8G8B8A8Unorm,
            usage: TextureUsages::COPY_DST | TextureUsages::TEXTURE_BINDING,
            ..Default::default()
        })
        .unwrap();
    let err = CommandExecutor::new(device)
        .execute(|encoder| encoder.generate_mipmaps(upload_only))
        .unwrap_err();
    assert!(matches!(err, GfxError::InvalidArgument(_)), "{err:?}");
    device.destroy_texture(upload_only).unwrap();
}

//===----------------------------------------------------------------------===//
// Queries
//===----------------------------------------------------------------------===//

fn resolve_buffer(device: &mut Device) -> Handle<Buffer> {
    device
        .create_buffer(&BufferDescriptor {
            label: Some("query results"),
            size: 256,
            usage: BufferUsages::QUERY_RESOLVE | BufferUsages::COPY_SRC,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
        })
        .unwrap()
}

/// Copy the first `count` resolved results out of `resolved`.
fn read_queries(device: &mut Device, resolved: Handle<Buffer>, count: usize) -> Vec<u64> {
    let size = (count * 8) as u64;
    let readback = readback_buffer(device, size);
    CommandExecutor::new(device)
        .execute(|encoder| {
            encoder.copy_buffer_to_buffer(&CopyBufferToBuffer {
                source: resolved,
                source_offset: 0,
                destination: readback,
                destination_offset: 0,
                size,
            })
        })
        .unwrap();
    let bytes = read_back(device, readback, count * 8);
    device.destroy_buffer(readback).unwrap();
    bytes
        .chunks_exact(8)
        .map(|b| u64::from_le_bytes(b.try_into().unwrap()))
        .collect()
}

pub fn query_set_rules(device: &mut Device) {
    assert!(matches!(
        device.create_query_set(&QuerySetDescriptor::default()),
        Err(GfxError::InvalidArgument(_))
    ));
    let occlusion = device
        .create_query_set(&QuerySetDescriptor {
            label: Some("occlusion"),
            query_type: QueryType::Occlusion,
            count: 2,
        })
        .unwrap();
    assert_eq!(
        device.query_set_info(occlusion).unwrap(),
        QuerySetInfo {
            query_type: QueryType::Occlusion,
            count: 2,
        }
    );
    let resolved = resolve_buffer(device);

    // Nothing has written these queries yet.
    let err = CommandExecutor::new(device)
        .execute(|encoder| encoder.resolve_query_set(occlusion, 0, 2, resolved, 0))
        .unwrap_err();
    assert!(matches!(err, GfxError::InvalidState(_)), "{err:?}");

    // Timestamps cannot go into an occlusion set.
    let err = CommandExecutor::new(device)
        .execute(|encoder| encoder.write_timestamp(occlusion, 0))
        .unwrap_err();
    assert!(matches!(err, GfxError::InvalidArgument(_)), "{err:?}");

    device.destroy_buffer(resolved).unwrap();
    device.destroy_query_set(occlusion).unwrap();
    assert!(matches!(
        device.destroy_query_set(occlusion),
        Err(GfxError::InvalidState(_))
    ));
    assert!(matches!(
        device.query_set_info(occlusion),
        Err(GfxError::InvalidArgument(_))
    ));
}

pub fn timestamps(device: &mut Device) {
    let set = match device.create_query_set(&QuerySetDescriptor {
        label: Some("timestamps"),
        query_type: QueryType::Timestamp,
        count: 2,
    }) {
        Ok(set) => set,
        Err(GfxError::FeatureNotSupported(what)) => {
            log::warn!("skipping timestamps: {what}");
            return;
        }
        Err(err) => panic!("timestamp query set: {err:?}"),
    };
    let resolved = resolve_buffer(device);

    let err = CommandExecutor::new(device)
        .execute(|encoder| {
            encoder.write_timestamp(set, 0)?;
            encoder.write_timestamp(set, 0)
        })
        .unwrap_err();
    assert!(matches!(err, GfxError::InvalidArgument(_)), "{err:?}");

    CommandExecutor::new(device)
        .execute(|encoder| {
            encoder.write_timestamp(set, 0)?;
            encoder.write_timestamp(set, 1)?;
            encoder.resolve_query_set(set, 0, 2, resolved, 0)
        })
        .unwrap();
    let ticks = read_queries(device, resolved, 2);
    assert!(ticks[1] >= ticks[0], "{ticks:?}");

    // Written queries stay resolvable in later submissions.
    CommandExecutor::new(device)
        .execute(|encoder| encoder.resolve_query_set(set, 1, 1, resolved, 0))
        .unwrap();

    device.destroy_buffer(resolved).unwrap();
    device.destroy_query_set(set).unwrap();
}

pub fn occlusion_without_draws(device: &mut Device) {
    let target = device
        .create_texture(&TextureDescriptor {
            label: Some("occlusion target"),
            size: Extent3D::new(16, 16, 1),
            format: TextureFormat::R8G8B8A8Unorm,
            usage: TextureUsages::RENDER_ATTACHMENT,
            ..Default::default()
        })
        .unwrap();
    let view = device
        .create_texture_view(target, &TextureViewDescriptor::default())
        .unwrap();
    let pass = device
        .create_render_pass(&RenderPassDescriptor {
            label: Some("occlusion"),
            color_attachments: &[RenderPassColorAttachment {
                target: ColorAttachmentTarget {
                    format: TextureFormat::R8G8B8A8Unorm,
                    sample_count: SampleCount::S1,
                    ops: LoadStoreOps {
                        load: LoadOp::Clear,
                        store: StoreOp::Store,
                    },
                    final_layout: TextureLayout::ColorAttachment,
                },
                resolve_target: None,
            }],
            depth_stencil_attachment: None,
        })
        .unwrap();
    let framebuffer = device
        .create_framebuffer(&FramebufferDescriptor {
            label: None,
            render_pass: pass,
            color_attachments: &[FramebufferAttachment {
                view,
                resolve_target: None,
            }],
            depth_stencil_attachment: None,
            width: 16,
            height: 16,
        })
        .unwrap();
    let set = device
        .create_query_set(&QuerySetDescriptor {
            label: Some("occlusion"),
            query_type: QueryType::Occlusion,
            count: 1,
        })
        .unwrap();
    let resolved = resolve_buffer(device);

    CommandExecutor::new(device)
        .execute(|encoder| {
            let mut rpass = encoder.begin_render_pass(&RenderPassBeginInfo {
                label: Some("occlusion"),
                render_pass: pass,
                framebuffer,
                color_clear_values: &[Color::new(0.0, 0.0, 0.0, 1.0)],
                depth_clear_value: 1.0,
                stencil_clear_value: 0,
            })?;
            rpass.begin_occlusion_query(set, 0)?;
            rpass.end_occlusion_query()?;
            rpass.end()?;
            encoder.resolve_query_set(set, 0, 1, resolved, 0)
        })
        .unwrap();
    assert_eq!(read_queries(device, resolved, 1), [0]);

    device.destroy_buffer(resolved).unwrap();
    device.destroy_query_set(set).unwrap();
    device.destroy_framebuffer(framebuffer).unwrap();
    device.destroy_render_pass(pass).unwrap();
    device.destroy_texture_view(view).unwrap();
    device.destroy_texture(target).unwrap();
}
