//! Mip chain generation. WebGPU has no blit command, so each level is drawn
//! from the one above it with a fullscreen triangle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::gpu::structs::{SampleCount, TextureDescriptor, TextureType, TextureUsages};

const SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv * vec2<f32>(2.0, -2.0) + vec2<f32>(-1.0, 1.0), 0.0, 1.0);
    out.uv = uv;
    return out;
}

@group(0) @binding(0) var source: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(source, source_sampler, in.uv);
}
"#;

/// Native usages a texture needs for [`MipmapBlitter::generate`].
pub(super) const BLIT_USAGES: wgpu::TextureUsages =
    wgpu::TextureUsages::RENDER_ATTACHMENT.union(wgpu::TextureUsages::TEXTURE_BINDING);

/// Usages to add on top of what `desc` asks for so its mips can later be
/// generated. Empty when the texture can never be a generation target or
/// the format cannot be drawn to and sampled.
pub(super) fn extra_usages(desc: &TextureDescriptor<'_>, allowed: wgpu::TextureUsages) -> wgpu::TextureUsages {
    let target = desc.mip_level_count > 1
        && desc.sample_count == SampleCount::S1
        && matches!(desc.texture_type, TextureType::D2 | TextureType::Cube)
        && desc.usage.contains(TextureUsages::COPY_SRC | TextureUsages::COPY_DST);
    if target && allowed.contains(BLIT_USAGES) {
        BLIT_USAGES
    } else {
        wgpu::TextureUsages::empty()
    }
}

struct BlitPipeline {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    filterable: bool,
}

/// Shader, samplers and one pipeline per target format, built on first use.
pub(super) struct MipmapBlitter {
    shader: wgpu::ShaderModule,
    linear: wgpu::Sampler,
    nearest: wgpu::Sampler,
    pipelines: Mutex<HashMap<wgpu::TextureFormat, Arc<BlitPipeline>>>,
}

impl MipmapBlitter {
    pub(super) fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("gfx.mipmaps"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });
        let sampler = |filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("gfx.mipmaps"),
                mag_filter: filter,
                min_filter: filter,
                ..Default::default()
            })
        };
        Self {
            shader,
            linear: sampler(wgpu::FilterMode::Linear),
            nearest: sampler(wgpu::FilterMode::Nearest),
            pipelines: Mutex::new(HashMap::new()),
        }
    }

    fn pipeline(&self, device: &wgpu::Device, format: wgpu::TextureFormat, filterable: bool) -> Arc<BlitPipeline> {
        let mut pipelines = self.pipelines.lock().unwrap_or_else(PoisonError::into_inner);
        pipelines
            .entry(format)
            .or_insert_with(|| {
                log::debug!("building mipmap pipeline for {format:?}");
                Arc::new(self.build(device, format, filterable))
            })
            .clone()
    }

    fn build(&self, device: &wgpu::Device, format: wgpu::TextureFormat, filterable: bool) -> BlitPipeline {
        let sampler_type = if filterable {
            wgpu::SamplerBindingType::Filtering
        } else {
            wgpu::SamplerBindingType::NonFiltering
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gfx.mipmaps"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(sampler_type),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gfx.mipmaps"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("gfx.mipmaps"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: "vs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: "fs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(format.into())],
            }),
            multiview: None,
        });
        BlitPipeline {
            pipeline,
            layout,
            filterable,
        }
    }

    /// Record passes filling levels `base_mip_level + 1 .. base_mip_level +
    /// level_count` of every layer of `texture`.
    pub(super) fn generate(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
        filterable: bool,
        base_mip_level: u32,
        level_count: u32,
    ) {
        let format = texture.format();
        let blit = self.pipeline(device, format, filterable);
        let sampler = if blit.filterable {
            &self.linear
        } else {
            &self.nearest
        };
        let view = |mip_level, layer| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("gfx.mipmaps"),
                format: Some(format),
                dimension: Some(wgpu::TextureViewDimension::D2),
                aspect: wgpu::TextureAspect::All,
                base_mip_level: mip_level,
                mip_level_count: Some(1),
                base_array_layer: layer,
                array_layer_count: Some(1),
            })
        };

        for layer in 0..texture.depth_or_array_layers() {
            for level in base_mip_level + 1..base_mip_level + level_count {
                let source = view(level - 1, layer);
                let target = view(level, layer);
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("gfx.mipmaps"),
                    layout: &blit.layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&source),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(sampler),
                        },
                    ],
                });
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("gfx.mipmaps"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(&blit.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blit_usages_cover_sampling_and_drawing() {
        assert!(BLIT_USAGES.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(BLIT_USAGES.contains(wgpu::TextureUsages::TEXTURE_BINDING));
        assert!(!BLIT_USAGES.contains(wgpu::TextureUsages::COPY_DST));
    }

    #[test]
    fn only_mipmapped_copyable_textures_get_blit_usages() {
        let all = wgpu::TextureUsages::all();
        let desc = TextureDescriptor {
            size: crate::gpu::structs::Extent3D::new(8, 8, 1),
            mip_level_count: 4,
            usage: TextureUsages::COPY_SRC | TextureUsages::COPY_DST,
            ..Default::default()
        };
        assert_eq!(extra_usages(&desc, all), BLIT_USAGES);
        assert!(extra_usages(&desc, wgpu::TextureUsages::TEXTURE_BINDING).is_empty());

        let single = TextureDescriptor {
            mip_level_count: 1,
            ..desc.clone()
        };
        assert!(extra_usages(&single, all).is_empty());
        let upload_only = TextureDescriptor {
            usage: TextureUsages::COPY_DST,
            ..desc.clone()
        };
        assert!(extra_usages(&upload_only, all).is_empty());
        let volume = TextureDescriptor {
            texture_type: TextureType::D3,
            ..desc
        };
        assert!(extra_usages(&volume, all).is_empty());
    }
}
