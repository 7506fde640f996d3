use super::conversions::texture_format;
use super::{
    creation_error, Context, WgpuComputePipeline, WgpuFramebuffer, WgpuRenderPass,
    WgpuRenderPipeline,
};
use crate::gpu::device::Pools;
use crate::gpu::error::{GfxError, Result};
use crate::gpu::structs::*;
use crate::utils::Handle;

impl Context {
    /// Only checks that every attachment is expressible; the pass itself is
    /// described again when it begins.
    pub(super) fn make_render_pass(&mut self, desc: &RenderPassDescriptor<'_>) -> Result<WgpuRenderPass> {
        for color in desc.color_attachments {
            texture_format(color.target.format)?;
            if let Some(resolve) = color.resolve_target {
                texture_format(resolve.format)?;
            }
        }
        if let Some(depth) = desc.depth_stencil_attachment {
            if depth.resolve_target.is_some() {
                return Err(GfxError::FeatureNotSupported(
                    "depth/stencil resolve attachments".into(),
                ));
            }
            texture_format(depth.target.format)?;
        }
        Ok(WgpuRenderPass)
    }

    pub(super) fn make_framebuffer(
        &mut self,
        pools: &Pools<Self>,
        desc: &FramebufferDescriptor<'_>,
    ) -> Result<WgpuFramebuffer> {
        let pass = pools.render_pass(desc.render_pass)?;
        let resolves = pass
            .info
            .color_attachments
            .iter()
            .zip(desc.color_attachments)
            .all(|(slot, attachment)| slot.resolve_target.is_some() == attachment.resolve_target.is_some());
        if desc.color_attachments.len() != pass.info.color_attachments.len()
            || !resolves
            || desc.depth_stencil_attachment.is_some() != pass.info.depth_stencil_attachment.is_some()
        {
            return Err(GfxError::invalid_argument(
                "framebuffer attachments do not match the render pass",
            ));
        }
        Ok(WgpuFramebuffer)
    }

    fn make_pipeline_layout(
        &self,
        pools: &Pools<Self>,
        label: Option<&str>,
        layouts: &[Handle<BindGroupLayout>],
    ) -> Result<wgpu::PipelineLayout> {
        let groups = layouts
            .iter()
            .map(|h| pools.bind_group_layout(*h).map(|r| &r.native.raw))
            .collect::<Result<Vec<_>>>()?;
        self.checked(|device| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label,
                bind_group_layouts: &groups,
                push_constant_ranges: &[],
            })
        })
        .map_err(creation_error)
    }

    fn primitive_state(&self, primitive: &PrimitiveState) -> Result<wgpu::PrimitiveState> {
        let cull_mode = match primitive.cull_mode {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
            CullMode::FrontAndBack => {
                return Err(GfxError::FeatureNotSupported(
                    "culling both faces is not available on WebGPU".into(),
                ))
            }
        };
        let needed = match primitive.polygon_mode {
            PolygonMode::Fill => wgpu::Features::empty(),
            PolygonMode::Line => wgpu::Features::POLYGON_MODE_LINE,
            PolygonMode::Point => wgpu::Features::POLYGON_MODE_POINT,
        };
        if !self.device.features().contains(needed) {
            return Err(GfxError::FeatureNotSupported(format!(
                "{:?} polygon mode",
                primitive.polygon_mode
            )));
        }
        let strip = matches!(
            primitive.topology,
            PrimitiveTopology::LineStrip | PrimitiveTopology::TriangleStrip
        );
        Ok(wgpu::PrimitiveState {
            topology: primitive.topology.into(),
            strip_index_format: primitive
                .strip_index_format
                .filter(|_| strip)
                .map(Into::into),
            front_face: primitive.front_face.into(),
            cull_mode,
            unclipped_depth: false,
            polygon_mode: primitive.polygon_mode.into(),
            conservative: false,
        })
    }

    pub(super) fn make_render_pipeline(
        &mut self,
        pools: &Pools<Self>,
        desc: &RenderPipelineDescriptor<'_>,
    ) -> Result<WgpuRenderPipeline> {
        let vertex_module = &pools.shader(desc.vertex.module)?.native.raw;
        let fragment_module = match &desc.fragment {
            Some(fragment) => Some(&pools.shader(fragment.module)?.native.raw),
            None => None,
        };

        let attributes: Vec<Vec<wgpu::VertexAttribute>> = desc
            .vertex
            .buffers
            .iter()
            .map(|buffer| {
                buffer
                    .attributes
                    .iter()
                    .map(|a| wgpu::VertexAttribute {
                        format: a.format.into(),
                        offset: a.offset,
                        shader_location: a.shader_location,
                    })
                    .collect()
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = desc
            .vertex
            .buffers
            .iter()
            .zip(&attributes)
            .map(|(buffer, attributes)| wgpu::VertexBufferLayout {
                array_stride: buffer.array_stride,
                step_mode: buffer.step_mode.into(),
                attributes,
            })
            .collect();

        let targets = match &desc.fragment {
            Some(fragment) => fragment
                .targets
                .iter()
                .map(|t| {
                    Ok(Some(wgpu::ColorTargetState {
                        format: texture_format(t.format)?,
                        blend: t.blend.map(|b| wgpu::BlendState {
                            color: b.color.into(),
                            alpha: b.alpha.into(),
                        }),
                        write_mask: t.write_mask.into(),
                    }))
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let depth_stencil = match desc.depth_stencil {
            Some(d) => Some(wgpu::DepthStencilState {
                format: texture_format(d.format)?,
                depth_write_enabled: d.depth_write_enabled,
                depth_compare: d.depth_compare.into(),
                stencil: wgpu::StencilState {
                    front: (&d.stencil_front).into(),
                    back: (&d.stencil_back).into(),
                    read_mask: d.stencil_read_mask,
                    write_mask: d.stencil_write_mask,
                },
                bias: wgpu::DepthBiasState {
                    constant: d.depth_bias,
                    slope_scale: d.depth_bias_slope_scale,
                    clamp: d.depth_bias_clamp,
                },
            }),
            None => None,
        };

        let primitive = self.primitive_state(&desc.primitive)?;
        let layout = self.make_pipeline_layout(pools, desc.label, desc.bind_group_layouts)?;
        let fragment = match (&desc.fragment, fragment_module) {
            (Some(fragment), Some(module)) => Some(wgpu::FragmentState {
                module,
                entry_point: fragment.entry_point,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &targets,
            }),
            _ => None,
        };

        let raw = self
            .checked(|device| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: desc.label,
                    layout: Some(&layout),
                    vertex: wgpu::VertexState {
                        module: vertex_module,
                        entry_point: desc.vertex.entry_point,
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                        buffers: &buffers,
                    },
                    primitive,
                    depth_stencil,
                    multisample: wgpu::MultisampleState {
                        count: desc.sample_count.as_u32(),
                        mask: !0,
                        alpha_to_coverage_enabled: false,
                    },
                    fragment,
                    multiview: None,
                })
            })
            .map_err(creation_error)?;
        Ok(WgpuRenderPipeline { raw })
    }

    pub(super) fn make_compute_pipeline(
        &mut self,
        pools: &Pools<Self>,
        desc: &ComputePipelineDescriptor<'_>,
    ) -> Result<WgpuComputePipeline> {
        let module = &pools.shader(desc.compute)?.native.raw;
        let layout = self.make_pipeline_layout(pools, desc.label, desc.bind_group_layouts)?;
        let raw = self
            .checked(|device| {
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: desc.label,
                    layout: Some(&layout),
                    module,
                    entry_point: desc.entry_point,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                })
            })
            .map_err(creation_error)?;
        Ok(WgpuComputePipeline { raw })
    }
}
