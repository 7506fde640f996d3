//! Replays recorded command lists into Vulkan command buffers.
//!
//! Image layouts are tracked per texture and transitions are inserted while
//! replaying. Every top-level segment is preceded by a full memory barrier,
//! so ordering between copies and passes never needs user barriers.

use ash::vk;

use super::conversions::{clear_color, copy_aspect, layout_access, offset3d};
use super::{Context, VkTexture};
use crate::gpu::cmd::{BeginRenderPass, Command, CommandBuffer, Segment, MAX_BIND_GROUPS};
use crate::gpu::device::{Pools, Record};
use crate::gpu::error::{GfxError, Result};
use crate::gpu::state::LayoutState;
use crate::gpu::structs::*;
use crate::utils::Handle;

type TextureRecord = Record<VkTexture, TextureInfo>;

/// Subresource and offset for one side of a copy. `z` names a slice of a
/// 3D texture and an array layer otherwise.
fn copy_placement(
    info: &TextureInfo,
    origin: Origin3D,
    depth: u32,
    mip_level: u32,
) -> (vk::ImageSubresourceLayers, vk::Offset3D) {
    let volume = info.texture_type == TextureType::D3;
    let layers = vk::ImageSubresourceLayers {
        aspect_mask: copy_aspect(info.format),
        mip_level,
        base_array_layer: if volume { 0 } else { origin.z },
        layer_count: if volume { 1 } else { depth.max(1) },
    };
    let mut offset = offset3d(origin);
    if !volume {
        offset.z = 0;
    }
    (layers, offset)
}

fn copy_extent(info: &TextureInfo, extent: Extent3D) -> vk::Extent3D {
    vk::Extent3D {
        width: extent.width,
        height: extent.height,
        depth: if info.texture_type == TextureType::D3 {
            extent.depth
        } else {
            1
        },
    }
}

fn row_length(info: &TextureInfo, bytes_per_row: u32) -> u32 {
    match info.format.bytes_per_pixel() {
        0 => 0,
        bpp => bytes_per_row / bpp,
    }
}

fn end_offset(offset: vk::Offset3D, extent: vk::Extent3D) -> vk::Offset3D {
    vk::Offset3D {
        x: offset.x + extent.width as i32,
        y: offset.y + extent.height as i32,
        z: offset.z + extent.depth as i32,
    }
}

/// Extent of mip `level` along one axis.
fn mip_extent(size: u32, level: u32) -> i32 {
    size.checked_shr(level).unwrap_or(0).max(1) as i32
}

/// Every query a pass begins, so they can be reset before the pass opens.
fn pass_queries(commands: &[Command]) -> impl Iterator<Item = (Handle<QuerySet>, u32)> + '_ {
    commands.iter().filter_map(|c| match c {
        Command::BeginOcclusionQuery { query_set, index } => Some((*query_set, *index)),
        _ => None,
    })
}

struct Recorder<'a> {
    ctx: &'a Context,
    device: &'a ash::Device,
    pools: &'a Pools<Context>,
    cmd: vk::CommandBuffer,
    bind_point: vk::PipelineBindPoint,
    layout: vk::PipelineLayout,
    bind_groups: [Option<(vk::DescriptorSet, &'a [u32])>; MAX_BIND_GROUPS as usize],
    bind_groups_dirty: bool,
    occlusion: Option<(vk::QueryPool, u32)>,
}

impl<'a> Recorder<'a> {
    fn memory_barrier(&self) {
        let barrier = vk::MemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
            .build();
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.cmd,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[barrier],
                &[],
                &[],
            )
        };
    }

    fn transition(
        &self,
        image: vk::Image,
        range: vk::ImageSubresourceRange,
        state: &LayoutState,
        new: TextureLayout,
    ) {
        let old = state.replace(new);
        if old != new {
            self.image_barrier(image, range, old.into(), new.into());
        }
    }

    fn image_barrier(
        &self,
        image: vk::Image,
        range: vk::ImageSubresourceRange,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) {
        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old)
            .new_layout(new)
            .src_access_mask(layout_access(old))
            .dst_access_mask(layout_access(new))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(range)
            .build();
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.cmd,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            )
        };
    }

    fn transition_texture(&self, texture: &TextureRecord, layout: TextureLayout) {
        let native = &texture.native;
        self.transition(native.raw, native.full_range, &native.layout, layout);
    }

    /// `Undefined` leaves the texture in the layout the copy used.
    fn finish_texture(&self, texture: &TextureRecord, final_layout: TextureLayout) {
        if final_layout != TextureLayout::Undefined {
            self.transition_texture(texture, final_layout);
        }
    }

    fn top_level(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::CopyBufferToBuffer(copy) => {
                let src = self.pools.buffer(copy.source)?.native.raw;
                let dst = self.pools.buffer(copy.destination)?.native.raw;
                let region = vk::BufferCopy {
                    src_offset: copy.source_offset,
                    dst_offset: copy.destination_offset,
                    size: copy.size,
                };
                unsafe { self.device.cmd_copy_buffer(self.cmd, src, dst, &[region]) };
            }
            Command::CopyBufferToTexture(copy) => {
                let src = self.pools.buffer(copy.source)?.native.raw;
                let texture = self.pools.texture(copy.destination)?;
                let (layers, offset) =
                    copy_placement(&texture.info, copy.origin, copy.extent.depth, copy.mip_level);
                let region = vk::BufferImageCopy {
                    buffer_offset: copy.source_offset,
                    buffer_row_length: row_length(&texture.info, copy.bytes_per_row),
                    buffer_image_height: 0,
                    image_subresource: layers,
                    image_offset: offset,
                    image_extent: copy_extent(&texture.info, copy.extent),
                };
                self.transition_texture(texture, TextureLayout::TransferDst);
                unsafe {
                    self.device.cmd_copy_buffer_to_image(
                        self.cmd,
                        src,
                        texture.native.raw,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[region],
                    )
                };
                self.finish_texture(texture, copy.final_layout);
            }
            Command::CopyTextureToBuffer(copy) => {
                let texture = self.pools.texture(copy.source)?;
                let dst = self.pools.buffer(copy.destination)?.native.raw;
                let (layers, offset) =
                    copy_placement(&texture.info, copy.origin, copy.extent.depth, copy.mip_level);
                let region = vk::BufferImageCopy {
                    buffer_offset: copy.destination_offset,
                    buffer_row_length: row_length(&texture.info, copy.bytes_per_row),
                    buffer_image_height: 0,
                    image_subresource: layers,
                    image_offset: offset,
                    image_extent: copy_extent(&texture.info, copy.extent),
                };
                self.transition_texture(texture, TextureLayout::TransferSrc);
                unsafe {
                    self.device.cmd_copy_image_to_buffer(
                        self.cmd,
                        texture.native.raw,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        dst,
                        &[region],
                    )
                };
                self.finish_texture(texture, copy.final_layout);
            }
            Command::CopyTextureToTexture(copy) => {
                let src = self.pools.texture(copy.source)?;
                let dst = self.pools.texture(copy.destination)?;
                let (src_layers, src_offset) = copy_placement(
                    &src.info,
                    copy.source_origin,
                    copy.extent.depth,
                    copy.source_mip_level,
                );
                let (dst_layers, dst_offset) = copy_placement(
                    &dst.info,
                    copy.destination_origin,
                    copy.extent.depth,
                    copy.destination_mip_level,
                );
                let volume = src.info.texture_type == TextureType::D3
                    || dst.info.texture_type == TextureType::D3;
                let region = vk::ImageCopy {
                    src_subresource: src_layers,
                    src_offset,
                    dst_subresource: dst_layers,
                    dst_offset,
                    extent: vk::Extent3D {
                        width: copy.extent.width,
                        height: copy.extent.height,
                        depth: if volume { copy.extent.depth } else { 1 },
                    },
                };
                let (src_layout, dst_layout) = self.prepare_pair(src, dst);
                unsafe {
                    self.device.cmd_copy_image(
                        self.cmd,
                        src.native.raw,
                        src_layout,
                        dst.native.raw,
                        dst_layout,
                        &[region],
                    )
                };
                self.finish_texture(src, copy.source_final_layout);
                self.finish_texture(dst, copy.destination_final_layout);
            }
            Command::BlitTextureToTexture(blit) => {
                let src = self.pools.texture(blit.source)?;
                let dst = self.pools.texture(blit.destination)?;
                let (src_layers, src_offset) = copy_placement(
                    &src.info,
                    blit.source_origin,
                    blit.source_extent.depth,
                    blit.source_mip_level,
                );
                let (dst_layers, dst_offset) = copy_placement(
                    &dst.info,
                    blit.destination_origin,
                    blit.destination_extent.depth,
                    blit.destination_mip_level,
                );
                let region = vk::ImageBlit {
                    src_subresource: src_layers,
                    src_offsets: [
                        src_offset,
                        end_offset(src_offset, copy_extent(&src.info, blit.source_extent)),
                    ],
                    dst_subresource: dst_layers,
                    dst_offsets: [
                        dst_offset,
                        end_offset(dst_offset, copy_extent(&dst.info, blit.destination_extent)),
                    ],
                };
                let (src_layout, dst_layout) = self.prepare_pair(src, dst);
                unsafe {
                    self.device.cmd_blit_image(
                        self.cmd,
                        src.native.raw,
                        src_layout,
                        dst.native.raw,
                        dst_layout,
                        &[region],
                        blit.filter.into(),
                    )
                };
                self.finish_texture(src, blit.source_final_layout);
                self.finish_texture(dst, blit.destination_final_layout);
            }
            Command::PipelineBarrier {
                memory,
                buffers,
                textures,
            } => self.pipeline_barrier(memory, buffers, textures)?,
            Command::GenerateMipmaps {
                texture,
                base_mip_level,
                level_count,
            } => {
                let texture = self.pools.texture(*texture)?;
                self.generate_mipmaps(texture, *base_mip_level, *level_count);
            }
            Command::WriteTimestamp { query_set, index } => {
                let pool = self.pools.query_set(*query_set)?.native.raw;
                unsafe {
                    self.device.cmd_reset_query_pool(self.cmd, pool, *index, 1);
                    self.device.cmd_write_timestamp(
                        self.cmd,
                        vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                        pool,
                        *index,
                    );
                }
            }
            Command::ResolveQuerySet {
                query_set,
                first_query,
                query_count,
                destination,
                destination_offset,
            } => {
                let pool = self.pools.query_set(*query_set)?.native.raw;
                let dst = self.pools.buffer(*destination)?.native.raw;
                unsafe {
                    self.device.cmd_copy_query_pool_results(
                        self.cmd,
                        pool,
                        *first_query,
                        *query_count,
                        dst,
                        *destination_offset,
                        std::mem::size_of::<u64>() as u64,
                        vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WAIT,
                    )
                };
            }
            other => {
                return Err(GfxError::invalid_state(format!(
                    "{other:?} recorded outside of a pass"
                )))
            }
        }
        Ok(())
    }

    /// Downsample level by level with linear blits where the format allows.
    /// Every level ends up in `ShaderReadOnly`.
    fn generate_mipmaps(&self, texture: &TextureRecord, base_mip_level: u32, level_count: u32) {
        let info = &texture.info;
        let native = &texture.native;
        let levels = match level_count {
            0 => info.mip_level_count.saturating_sub(base_mip_level),
            n => n,
        };
        if levels <= 1 {
            return;
        }
        let last = base_mip_level + levels - 1;
        let filter = if self.ctx.supports_linear_blit(native.format) {
            vk::Filter::LINEAR
        } else {
            vk::Filter::NEAREST
        };
        let layers = native.full_range.layer_count;
        let level_range = |base_mip_level, level_count| vk::ImageSubresourceRange {
            base_mip_level,
            level_count,
            ..native.full_range
        };
        let subresource = |mip_level| vk::ImageSubresourceLayers {
            aspect_mask: native.aspect,
            mip_level,
            base_array_layer: 0,
            layer_count: layers,
        };

        self.transition_texture(texture, TextureLayout::TransferDst);
        for level in base_mip_level..last {
            self.image_barrier(
                native.raw,
                level_range(level, 1),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            );
            let region = vk::ImageBlit {
                src_subresource: subresource(level),
                src_offsets: [
                    vk::Offset3D::default(),
                    vk::Offset3D {
                        x: mip_extent(info.size.width, level),
                        y: mip_extent(info.size.height, level),
                        z: 1,
                    },
                ],
                dst_subresource: subresource(level + 1),
                dst_offsets: [
                    vk::Offset3D::default(),
                    vk::Offset3D {
                        x: mip_extent(info.size.width, level + 1),
                        y: mip_extent(info.size.height, level + 1),
                        z: 1,
                    },
                ],
            };
            unsafe {
                self.device.cmd_blit_image(
                    self.cmd,
                    native.raw,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    native.raw,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                    filter,
                )
            };
        }
        // Sources go back to TransferDst so one tracked layout covers the image.
        self.image_barrier(
            native.raw,
            level_range(base_mip_level, levels - 1),
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        self.transition_texture(texture, TextureLayout::ShaderReadOnly);
    }

    /// Layouts for a transfer between two textures. A texture copied onto
    /// itself stays in `General` for both roles.
    fn prepare_pair(
        &self,
        src: &TextureRecord,
        dst: &TextureRecord,
    ) -> (vk::ImageLayout, vk::ImageLayout) {
        if src.native.raw == dst.native.raw {
            self.transition_texture(src, TextureLayout::General);
            return (vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL);
        }
        self.transition_texture(src, TextureLayout::TransferSrc);
        self.transition_texture(dst, TextureLayout::TransferDst);
        (
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
    }

    fn pipeline_barrier(
        &self,
        memory: &[MemoryBarrier],
        buffers: &[BufferBarrier],
        textures: &[TextureBarrier],
    ) -> Result<()> {
        let mut src_stage = PipelineStages::empty();
        let mut dst_stage = PipelineStages::empty();

        let memory_barriers: Vec<vk::MemoryBarrier> = memory
            .iter()
            .map(|b| {
                src_stage |= b.src_stage;
                dst_stage |= b.dst_stage;
                vk::MemoryBarrier::builder()
                    .src_access_mask(b.src_access.into())
                    .dst_access_mask(b.dst_access.into())
                    .build()
            })
            .collect();

        let mut buffer_barriers = Vec::with_capacity(buffers.len());
        for b in buffers {
            src_stage |= b.src_stage;
            dst_stage |= b.dst_stage;
            buffer_barriers.push(
                vk::BufferMemoryBarrier::builder()
                    .src_access_mask(b.src_access.into())
                    .dst_access_mask(b.dst_access.into())
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(self.pools.buffer(b.buffer)?.native.raw)
                    .offset(b.offset)
                    .size(if b.size == 0 { vk::WHOLE_SIZE } else { b.size })
                    .build(),
            );
        }

        let mut image_barriers = Vec::with_capacity(textures.len());
        for b in textures {
            src_stage |= b.src_stage;
            dst_stage |= b.dst_stage;
            let texture = &self.pools.texture(b.texture)?.native;
            // Undefined means "whatever the texture is in now".
            let tracked = texture.layout.replace(b.new_layout);
            let old = if b.old_layout == TextureLayout::Undefined {
                tracked
            } else {
                b.old_layout
            };
            image_barriers.push(
                vk::ImageMemoryBarrier::builder()
                    .old_layout(old.into())
                    .new_layout(b.new_layout.into())
                    .src_access_mask(b.src_access.into())
                    .dst_access_mask(b.dst_access.into())
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(texture.raw)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: texture.aspect,
                        base_mip_level: b.base_mip_level,
                        level_count: if b.mip_level_count == 0 {
                            vk::REMAINING_MIP_LEVELS
                        } else {
                            b.mip_level_count
                        },
                        base_array_layer: b.base_array_layer,
                        layer_count: if b.array_layer_count == 0 {
                            vk::REMAINING_ARRAY_LAYERS
                        } else {
                            b.array_layer_count
                        },
                    })
                    .build(),
            );
        }

        unsafe {
            self.device.cmd_pipeline_barrier(
                self.cmd,
                src_stage.into(),
                dst_stage.into(),
                vk::DependencyFlags::empty(),
                &memory_barriers,
                &buffer_barriers,
                &image_barriers,
            )
        };
        Ok(())
    }

    /// Move every image a pass samples or stores into its binding layout.
    fn prepare_bindings(&self, commands: &[Command]) -> Result<()> {
        for command in commands {
            if let Command::SetBindGroup { bind_group, .. } = command {
                for image in &self.pools.bind_group(*bind_group)?.native.images {
                    self.transition(image.image, image.full_range, &image.state, image.layout);
                }
            }
        }
        Ok(())
    }

    fn reset_pass_state(&mut self, bind_point: vk::PipelineBindPoint) {
        self.bind_point = bind_point;
        self.layout = vk::PipelineLayout::null();
        self.bind_groups = [None; MAX_BIND_GROUPS as usize];
        self.bind_groups_dirty = false;
    }

    fn render_pass(&mut self, begin: &BeginRenderPass, commands: &'a [Command]) -> Result<()> {
        let pass = self.pools.render_pass(begin.render_pass)?;
        let framebuffer = &self.pools.framebuffer(begin.framebuffer)?.native;

        self.prepare_bindings(commands)?;
        for (query_set, index) in pass_queries(commands) {
            let pool = self.pools.query_set(query_set)?.native.raw;
            unsafe { self.device.cmd_reset_query_pool(self.cmd, pool, index, 1) };
        }
        for image in &framebuffer.images {
            self.transition(image.image, image.full_range, &image.state, image.layouts.attachment);
        }

        let resolves = pass
            .info
            .color_attachments
            .iter()
            .filter(|c| c.resolve_target.is_some())
            .count();
        let mut clear_values: Vec<vk::ClearValue> = (0..pass.info.color_attachments.len())
            .map(|i| clear_color(begin.color_clear_values.get(i).copied().unwrap_or_default()))
            .collect();
        clear_values.extend((0..resolves).map(|_| clear_color(Color::default())));
        if pass.native.has_depth {
            clear_values.push(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: begin.depth_clear_value,
                    stencil: begin.stencil_clear_value,
                },
            });
        }

        let area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: framebuffer.extent,
        };
        unsafe {
            self.device.cmd_begin_render_pass(
                self.cmd,
                &vk::RenderPassBeginInfo::builder()
                    .render_pass(pass.native.raw)
                    .framebuffer(framebuffer.raw)
                    .render_area(area)
                    .clear_values(&clear_values),
                vk::SubpassContents::INLINE,
            );
            self.device.cmd_set_viewport(
                self.cmd,
                0,
                &[vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: area.extent.width as f32,
                    height: area.extent.height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                }],
            );
            self.device.cmd_set_scissor(self.cmd, 0, &[area]);
        }

        self.reset_pass_state(vk::PipelineBindPoint::GRAPHICS);
        let replayed = commands.iter().try_for_each(|c| self.pass_command(c));
        unsafe { self.device.cmd_end_render_pass(self.cmd) };
        replayed?;

        // The render pass performed the final transitions itself.
        for image in &framebuffer.images {
            let layout = match image.layouts.final_layout {
                TextureLayout::Undefined => image.layouts.attachment,
                other => other,
            };
            image.state.set(layout);
        }
        Ok(())
    }

    fn compute_pass(&mut self, commands: &'a [Command]) -> Result<()> {
        self.prepare_bindings(commands)?;
        self.reset_pass_state(vk::PipelineBindPoint::COMPUTE);
        commands.iter().try_for_each(|c| self.pass_command(c))
    }

    fn flush_bind_groups(&mut self) {
        if !self.bind_groups_dirty || self.layout == vk::PipelineLayout::null() {
            return;
        }
        for (index, bound) in self.bind_groups.iter().enumerate() {
            if let Some((set, offsets)) = bound {
                unsafe {
                    self.device.cmd_bind_descriptor_sets(
                        self.cmd,
                        self.bind_point,
                        self.layout,
                        index as u32,
                        &[*set],
                        offsets,
                    )
                };
            }
        }
        self.bind_groups_dirty = false;
    }

    fn pass_command(&mut self, command: &'a Command) -> Result<()> {
        match command {
            Command::SetRenderPipeline(handle) => {
                let pipeline = &self.pools.render_pipeline(*handle)?.native;
                unsafe {
                    self.device
                        .cmd_bind_pipeline(self.cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.raw)
                };
                self.layout = pipeline.layout;
                self.bind_groups_dirty = true;
            }
            Command::SetComputePipeline(handle) => {
                let pipeline = &self.pools.compute_pipeline(*handle)?.native;
                unsafe {
                    self.device
                        .cmd_bind_pipeline(self.cmd, vk::PipelineBindPoint::COMPUTE, pipeline.raw)
                };
                self.layout = pipeline.layout;
                self.bind_groups_dirty = true;
            }
            Command::SetBindGroup {
                index,
                bind_group,
                dynamic_offsets,
            } => {
                let set = self.pools.bind_group(*bind_group)?.native.set;
                let slot = self
                    .bind_groups
                    .get_mut(*index as usize)
                    .ok_or_else(|| GfxError::invalid_argument("bind group index out of range"))?;
                *slot = Some((set, dynamic_offsets.as_slice()));
                self.bind_groups_dirty = true;
            }
            Command::SetVertexBuffer {
                slot,
                buffer,
                offset,
            } => {
                let raw = self.pools.buffer(*buffer)?.native.raw;
                unsafe {
                    self.device
                        .cmd_bind_vertex_buffers(self.cmd, *slot, &[raw], &[*offset])
                };
            }
            Command::SetIndexBuffer {
                buffer,
                format,
                offset,
            } => {
                let raw = self.pools.buffer(*buffer)?.native.raw;
                unsafe {
                    self.device
                        .cmd_bind_index_buffer(self.cmd, raw, *offset, (*format).into())
                };
            }
            Command::SetViewport(v) => unsafe {
                self.device.cmd_set_viewport(
                    self.cmd,
                    0,
                    &[vk::Viewport {
                        x: v.x,
                        y: v.y,
                        width: v.width,
                        height: v.height,
                        min_depth: v.min_depth,
                        max_depth: v.max_depth,
                    }],
                )
            },
            Command::SetScissorRect(r) => unsafe {
                self.device.cmd_set_scissor(
                    self.cmd,
                    0,
                    &[vk::Rect2D {
                        offset: vk::Offset2D {
                            x: r.x as i32,
                            y: r.y as i32,
                        },
                        extent: vk::Extent2D {
                            width: r.width,
                            height: r.height,
                        },
                    }],
                )
            },
            Command::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => {
                self.flush_bind_groups();
                unsafe {
                    self.device.cmd_draw(
                        self.cmd,
                        *vertex_count,
                        *instance_count,
                        *first_vertex,
                        *first_instance,
                    )
                };
            }
            Command::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                base_vertex,
                first_instance,
            } => {
                self.flush_bind_groups();
                unsafe {
                    self.device.cmd_draw_indexed(
                        self.cmd,
                        *index_count,
                        *instance_count,
                        *first_index,
                        *base_vertex,
                        *first_instance,
                    )
                };
            }
            Command::DrawIndirect { buffer, offset } => {
                let raw = self.pools.buffer(*buffer)?.native.raw;
                self.flush_bind_groups();
                unsafe { self.device.cmd_draw_indirect(self.cmd, raw, *offset, 1, 0) };
            }
            Command::DrawIndexedIndirect { buffer, offset } => {
                let raw = self.pools.buffer(*buffer)?.native.raw;
                self.flush_bind_groups();
                unsafe {
                    self.device
                        .cmd_draw_indexed_indirect(self.cmd, raw, *offset, 1, 0)
                };
            }
            Command::Dispatch { x, y, z } => {
                self.flush_bind_groups();
                unsafe { self.device.cmd_dispatch(self.cmd, *x, *y, *z) };
            }
            Command::DispatchIndirect { buffer, offset } => {
                let raw = self.pools.buffer(*buffer)?.native.raw;
                self.flush_bind_groups();
                unsafe { self.device.cmd_dispatch_indirect(self.cmd, raw, *offset) };
            }
            Command::BeginOcclusionQuery { query_set, index } => {
                let pool = self.pools.query_set(*query_set)?.native.raw;
                unsafe {
                    self.device
                        .cmd_begin_query(self.cmd, pool, *index, vk::QueryControlFlags::empty())
                };
                self.occlusion = Some((pool, *index));
            }
            Command::EndOcclusionQuery => {
                let (pool, index) = self
                    .occlusion
                    .take()
                    .ok_or_else(|| GfxError::invalid_state("no occlusion query is open"))?;
                unsafe { self.device.cmd_end_query(self.cmd, pool, index) };
            }
            other => {
                return Err(GfxError::invalid_state(format!(
                    "{other:?} is not legal inside a pass"
                )))
            }
        }
        Ok(())
    }
}

/// Record `list` into `cmd`, which must be in the recording state. The
/// command buffer is ended on success.
pub(super) fn record(
    ctx: &Context,
    pools: &Pools<Context>,
    cmd: vk::CommandBuffer,
    list: &CommandBuffer,
) -> Result<()> {
    let mut recorder = Recorder {
        ctx,
        device: &ctx.device,
        pools,
        cmd,
        bind_point: vk::PipelineBindPoint::GRAPHICS,
        layout: vk::PipelineLayout::null(),
        bind_groups: [None; MAX_BIND_GROUPS as usize],
        bind_groups_dirty: false,
        occlusion: None,
    };

    for segment in list.segments() {
        recorder.memory_barrier();
        match segment {
            Segment::Command(command) => recorder.top_level(command)?,
            Segment::RenderPass { begin, commands } => recorder.render_pass(begin, commands)?,
            Segment::ComputePass { label, commands } => {
                log::trace!("replaying compute pass {label:?}");
                recorder.compute_pass(commands)?
            }
        }
    }
    // Make the results visible to whatever runs after this submission.
    recorder.memory_barrier();

    unsafe { ctx.device.end_command_buffer(cmd) }?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(texture_type: TextureType) -> TextureInfo {
        TextureInfo {
            texture_type,
            size: Extent3D {
                width: 8,
                height: 8,
                depth: 4,
            },
            array_layer_count: 4,
            mip_level_count: 1,
            sample_count: SampleCount::S1,
            format: TextureFormat::R8G8B8A8Unorm,
            usage: TextureUsages::COPY_DST,
        }
    }

    #[test]
    fn z_selects_layers_for_arrays_and_slices_for_volumes() {
        let origin = Origin3D { x: 1, y: 2, z: 3 };

        let (layers, offset) = copy_placement(&info(TextureType::D2), origin, 1, 0);
        assert_eq!(layers.base_array_layer, 3);
        assert_eq!(layers.layer_count, 1);
        assert_eq!(offset.z, 0);

        let (layers, offset) = copy_placement(&info(TextureType::D3), origin, 1, 0);
        assert_eq!(layers.base_array_layer, 0);
        assert_eq!(layers.layer_count, 1);
        assert_eq!(offset.z, 3);
    }

    #[test]
    fn mip_extents_never_reach_zero() {
        assert_eq!(mip_extent(16, 0), 16);
        assert_eq!(mip_extent(16, 2), 4);
        assert_eq!(mip_extent(16, 4), 1);
        assert_eq!(mip_extent(16, 9), 1);
        assert_eq!(mip_extent(5, 1), 2);
        assert_eq!(mip_extent(1, 40), 1);
    }

    #[test]
    fn pass_queries_lists_every_begin() {
        let set = Handle::new(3, 1);
        let commands = [
            Command::BeginOcclusionQuery { query_set: set, index: 0 },
            Command::Draw {
                vertex_count: 3,
                instance_count: 1,
                first_vertex: 0,
                first_instance: 0,
            },
            Command::EndOcclusionQuery,
            Command::BeginOcclusionQuery { query_set: set, index: 2 },
            Command::EndOcclusionQuery,
        ];
        let queries: Vec<_> = pass_queries(&commands).collect();
        assert_eq!(queries, vec![(set, 0), (set, 2)]);
    }

    #[test]
    fn volume_extent_keeps_depth() {
        let extent = Extent3D {
            width: 4,
            height: 4,
            depth: 2,
        };
        assert_eq!(copy_extent(&info(TextureType::D3), extent).depth, 2);
        assert_eq!(copy_extent(&info(TextureType::D2), extent).depth, 1);
    }

    #[test]
    fn row_length_is_counted_in_texels() {
        let texture = info(TextureType::D2);
        assert_eq!(row_length(&texture, 0), 0);
        assert_eq!(row_length(&texture, 256), 64);
    }
}
