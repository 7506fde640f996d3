use std::ffi::CString;

use ash::vk;

use super::conversions::stencil_op_state;
use super::{
    creation_error, AttachmentLayouts, Context, FramebufferImage, VkFramebuffer, VkPipeline,
    VkRenderPass, VkShader,
};
use crate::gpu::device::Pools;
use crate::gpu::error::{GfxError, Result};
use crate::gpu::structs::*;
use crate::utils::Handle;

/// Layout used for an attachment while the pass runs, and the one it is
/// left in afterwards.
fn attachment_layouts(depth: bool, final_layout: TextureLayout) -> AttachmentLayouts {
    AttachmentLayouts {
        attachment: if depth {
            TextureLayout::DepthStencilAttachment
        } else {
            TextureLayout::ColorAttachment
        },
        final_layout,
    }
}

fn entry_point(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| GfxError::invalid_argument("entry point contains a NUL byte"))
}

impl Context {
    pub(super) fn make_shader(&mut self, desc: &ShaderDescriptor<'_>) -> Result<VkShader> {
        let ShaderSource::SpirV(words) = desc.source else {
            return Err(GfxError::invalid_argument(
                "the Vulkan backend only accepts SPIR-V shaders",
            ));
        };
        let module = unsafe {
            self.device
                .create_shader_module(&vk::ShaderModuleCreateInfo::builder().code(words), None)
        }
        .map_err(creation_error)?;
        self.label(module, desc.label, vk::ObjectType::SHADER_MODULE);
        Ok(VkShader { module })
    }

    pub(super) fn make_render_pass(&mut self, desc: &RenderPassDescriptor<'_>) -> Result<VkRenderPass> {
        let mut attachments = Vec::new();
        let mut layouts = Vec::new();

        let mut describe = |format: TextureFormat,
                            samples: SampleCount,
                            ops: LoadStoreOps,
                            stencil: LoadStoreOps,
                            final_layout: TextureLayout,
                            depth: bool| {
            let state = attachment_layouts(depth, final_layout);
            let in_pass: vk::ImageLayout = state.attachment.into();
            let after = if final_layout == TextureLayout::Undefined {
                in_pass
            } else {
                final_layout.into()
            };
            attachments.push(
                vk::AttachmentDescription::builder()
                    .format(format.into())
                    .samples(samples.into())
                    .load_op(ops.load.into())
                    .store_op(ops.store.into())
                    .stencil_load_op(stencil.load.into())
                    .stencil_store_op(stencil.store.into())
                    .initial_layout(in_pass)
                    .final_layout(after)
                    .build(),
            );
            layouts.push(state);
            (attachments.len() - 1) as u32
        };

        let unused = LoadStoreOps {
            load: LoadOp::DontCare,
            store: StoreOp::DontCare,
        };
        let mut color_refs = Vec::with_capacity(desc.color_attachments.len());
        for color in desc.color_attachments {
            let t = color.target;
            let index = describe(t.format, t.sample_count, t.ops, unused, t.final_layout, false);
            color_refs.push(vk::AttachmentReference {
                attachment: index,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            });
        }

        let any_resolve = desc.color_attachments.iter().any(|c| c.resolve_target.is_some());
        let mut resolve_refs = Vec::new();
        if any_resolve {
            for color in desc.color_attachments {
                let reference = match color.resolve_target {
                    Some(r) => vk::AttachmentReference {
                        attachment: describe(r.format, r.sample_count, r.ops, unused, r.final_layout, false),
                        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    },
                    None => vk::AttachmentReference {
                        attachment: vk::ATTACHMENT_UNUSED,
                        layout: vk::ImageLayout::UNDEFINED,
                    },
                };
                resolve_refs.push(reference);
            }
        }

        let mut depth_ref = None;
        if let Some(depth) = desc.depth_stencil_attachment {
            if depth.resolve_target.is_some() {
                return Err(GfxError::FeatureNotSupported(
                    "depth/stencil resolve attachments".into(),
                ));
            }
            let t = depth.target;
            depth_ref = Some(vk::AttachmentReference {
                attachment: describe(t.format, t.sample_count, t.depth_ops, t.stencil_ops, t.final_layout, true),
                layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            });
        }

        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if any_resolve {
            subpass = subpass.resolve_attachments(&resolve_refs);
        }
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }
        let subpasses = [subpass.build()];

        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
            | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
        let access = vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
        let dependencies = [
            vk::SubpassDependency {
                src_subpass: vk::SUBPASS_EXTERNAL,
                dst_subpass: 0,
                src_stage_mask: stages,
                dst_stage_mask: stages,
                src_access_mask: access,
                dst_access_mask: access
                    | vk::AccessFlags::COLOR_ATTACHMENT_READ
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
                dependency_flags: vk::DependencyFlags::BY_REGION,
            },
            vk::SubpassDependency {
                src_subpass: 0,
                dst_subpass: vk::SUBPASS_EXTERNAL,
                src_stage_mask: stages,
                dst_stage_mask: vk::PipelineStageFlags::ALL_COMMANDS,
                src_access_mask: access,
                dst_access_mask: vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
                dependency_flags: vk::DependencyFlags::empty(),
            },
        ];

        let raw = unsafe {
            self.device.create_render_pass(
                &vk::RenderPassCreateInfo::builder()
                    .attachments(&attachments)
                    .subpasses(&subpasses)
                    .dependencies(&dependencies),
                None,
            )
        }
        .map_err(creation_error)?;
        self.label(raw, desc.label, vk::ObjectType::RENDER_PASS);
        Ok(VkRenderPass {
            raw,
            attachments: layouts,
            has_depth: depth_ref.is_some(),
        })
    }

    pub(super) fn make_framebuffer(
        &mut self,
        pools: &Pools<Self>,
        desc: &FramebufferDescriptor<'_>,
    ) -> Result<VkFramebuffer> {
        let pass = &pools.render_pass(desc.render_pass)?.native;

        // Same order as the render pass attachments.
        let mut order: Vec<Handle<TextureView>> =
            desc.color_attachments.iter().map(|a| a.view).collect();
        order.extend(desc.color_attachments.iter().filter_map(|a| a.resolve_target));
        order.extend(desc.depth_stencil_attachment.map(|a| a.view));
        if order.len() != pass.attachments.len() {
            return Err(GfxError::invalid_argument(
                "framebuffer attachments do not match the render pass",
            ));
        }

        let mut views = Vec::with_capacity(order.len());
        let mut images = Vec::with_capacity(order.len());
        for (handle, layouts) in order.iter().zip(&pass.attachments) {
            let view = &pools.texture_view(*handle)?.native;
            views.push(view.raw);
            images.push(FramebufferImage {
                image: view.image,
                full_range: view.full_range,
                state: view.layout.clone(),
                layouts: *layouts,
            });
        }

        let raw = unsafe {
            self.device.create_framebuffer(
                &vk::FramebufferCreateInfo::builder()
                    .render_pass(pass.raw)
                    .attachments(&views)
                    .width(desc.width)
                    .height(desc.height)
                    .layers(1),
                None,
            )
        }
        .map_err(creation_error)?;
        self.label(raw, desc.label, vk::ObjectType::FRAMEBUFFER);
        Ok(VkFramebuffer {
            raw,
            extent: vk::Extent2D {
                width: desc.width,
                height: desc.height,
            },
            images,
        })
    }

    fn make_pipeline_layout(
        &self,
        pools: &Pools<Self>,
        layouts: &[Handle<BindGroupLayout>],
    ) -> Result<vk::PipelineLayout> {
        let set_layouts = layouts
            .iter()
            .map(|h| pools.bind_group_layout(*h).map(|r| r.native.raw))
            .collect::<Result<Vec<_>>>()?;
        let layout = unsafe {
            self.device.create_pipeline_layout(
                &vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts),
                None,
            )
        }
        .map_err(creation_error)?;
        Ok(layout)
    }

    pub(super) fn make_render_pipeline(
        &mut self,
        pools: &Pools<Self>,
        desc: &RenderPipelineDescriptor<'_>,
    ) -> Result<VkPipeline> {
        let render_pass = pools.render_pass(desc.render_pass)?.native.raw;
        let vertex_module = pools.shader(desc.vertex.module)?.native.module;
        let fragment_module = match &desc.fragment {
            Some(fragment) => Some(pools.shader(fragment.module)?.native.module),
            None => None,
        };

        let vertex_entry = entry_point(desc.vertex.entry_point)?;
        let fragment_entry = match &desc.fragment {
            Some(fragment) => Some(entry_point(fragment.entry_point)?),
            None => None,
        };
        let mut stages = vec![vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_module)
            .name(&vertex_entry)
            .build()];
        if let (Some(module), Some(name)) = (fragment_module, fragment_entry.as_ref()) {
            stages.push(
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(vk::ShaderStageFlags::FRAGMENT)
                    .module(module)
                    .name(name)
                    .build(),
            );
        }

        let mut bindings = Vec::with_capacity(desc.vertex.buffers.len());
        let mut attributes = Vec::new();
        for (slot, buffer) in desc.vertex.buffers.iter().enumerate() {
            bindings.push(vk::VertexInputBindingDescription {
                binding: slot as u32,
                stride: buffer.array_stride as u32,
                input_rate: buffer.step_mode.into(),
            });
            attributes.extend(buffer.attributes.iter().map(|a| vk::VertexInputAttributeDescription {
                location: a.shader_location,
                binding: slot as u32,
                format: a.format.into(),
                offset: a.offset as u32,
            }));
        }
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let strip = matches!(
            desc.primitive.topology,
            PrimitiveTopology::LineStrip | PrimitiveTopology::TriangleStrip
        );
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(desc.primitive.topology.into())
            .primitive_restart_enable(strip && desc.primitive.strip_index_format.is_some());

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let depth_bias = desc
            .depth_stencil
            .map(|d| (d.depth_bias, d.depth_bias_slope_scale, d.depth_bias_clamp))
            .unwrap_or((0, 0.0, 0.0));
        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(desc.primitive.polygon_mode.into())
            .cull_mode(desc.primitive.cull_mode.into())
            .front_face(desc.primitive.front_face.into())
            .depth_bias_enable(depth_bias.0 != 0 || depth_bias.1 != 0.0)
            .depth_bias_constant_factor(depth_bias.0 as f32)
            .depth_bias_slope_factor(depth_bias.1)
            .depth_bias_clamp(depth_bias.2)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(desc.sample_count.into());

        let depth_stencil = desc.depth_stencil.map(|d| {
            let stencil_used = d.stencil_front != StencilFaceState::default()
                || d.stencil_back != StencilFaceState::default();
            vk::PipelineDepthStencilStateCreateInfo::builder()
                .depth_test_enable(true)
                .depth_write_enable(d.depth_write_enabled)
                .depth_compare_op(d.depth_compare.into())
                .stencil_test_enable(stencil_used)
                .front(stencil_op_state(&d.stencil_front, d.stencil_read_mask, d.stencil_write_mask))
                .back(stencil_op_state(&d.stencil_back, d.stencil_read_mask, d.stencil_write_mask))
                .min_depth_bounds(0.0)
                .max_depth_bounds(1.0)
                .build()
        });

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc
            .fragment
            .as_ref()
            .map(|f| f.targets.iter().map(|t| (*t).into()).collect())
            .unwrap_or_default();
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::builder().attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let layout = self.make_pipeline_layout(pools, desc.bind_group_layouts)?;
        let mut info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);
        if let Some(depth_stencil) = depth_stencil.as_ref() {
            info = info.depth_stencil_state(depth_stencil);
        }

        let result = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[info.build()], None)
        };
        match result {
            Ok(pipelines) if !pipelines.is_empty() => {
                let raw = pipelines[0];
                self.label(raw, desc.label, vk::ObjectType::PIPELINE);
                Ok(VkPipeline { raw, layout })
            }
            Ok(_) => {
                unsafe { self.device.destroy_pipeline_layout(layout, None) };
                Err(GfxError::ResourceCreation("no pipeline returned".into()))
            }
            Err((_, err)) => {
                unsafe { self.device.destroy_pipeline_layout(layout, None) };
                Err(creation_error(err))
            }
        }
    }

    pub(super) fn make_compute_pipeline(
        &mut self,
        pools: &Pools<Self>,
        desc: &ComputePipelineDescriptor<'_>,
    ) -> Result<VkPipeline> {
        let module = pools.shader(desc.compute)?.native.module;
        let name = entry_point(desc.entry_point)?;
        let stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module)
            .name(&name)
            .build();

        let layout = self.make_pipeline_layout(pools, desc.bind_group_layouts)?;
        let info = vk::ComputePipelineCreateInfo::builder()
            .stage(stage)
            .layout(layout)
            .build();
        let result = unsafe {
            self.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[info], None)
        };
        match result {
            Ok(pipelines) if !pipelines.is_empty() => {
                let raw = pipelines[0];
                self.label(raw, desc.label, vk::ObjectType::PIPELINE);
                Ok(VkPipeline { raw, layout })
            }
            Ok(_) => {
                unsafe { self.device.destroy_pipeline_layout(layout, None) };
                Err(GfxError::ResourceCreation("no pipeline returned".into()))
            }
            Err((_, err)) => {
                unsafe { self.device.destroy_pipeline_layout(layout, None) };
                Err(creation_error(err))
            }
        }
    }

    pub(super) fn free_pipeline(&mut self, pipeline: VkPipeline) {
        unsafe {
            self.device.destroy_pipeline(pipeline.raw, None);
            self.device.destroy_pipeline_layout(pipeline.layout, None);
        }
    }
}
