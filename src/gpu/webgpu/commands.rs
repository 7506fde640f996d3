//! Replays recorded command lists into a `wgpu::CommandEncoder`.
//!
//! WebGPU synchronizes on its own, so barriers only update the layouts
//! reported by `texture_layout`. Layout changes mirror what the Vulkan
//! backend would do for the same list.

use super::conversions::{color, copy_aspect, extent, origin};
use super::mipmaps::BLIT_USAGES;
use super::{Context, WgpuTexture};
use crate::gpu::cmd::{BeginRenderPass, Command, CommandBuffer, Segment};
use crate::gpu::device::{Pools, Record};
use crate::gpu::error::{GfxError, Result};
use crate::gpu::structs::*;

type TextureRecord = Record<WgpuTexture, TextureInfo>;

fn image_copy<'a>(texture: &'a TextureRecord, mip_level: u32, at: Origin3D) -> wgpu::ImageCopyTexture<'a> {
    wgpu::ImageCopyTexture {
        texture: &texture.native.raw,
        mip_level,
        origin: origin(at),
        aspect: copy_aspect(texture.info.format),
    }
}

/// Buffer side of a buffer/texture copy. Pitches spanning more than one row
/// must honour WebGPU's row alignment.
fn data_layout(info: &TextureInfo, offset: u64, bytes_per_row: u32, size: Extent3D) -> Result<wgpu::ImageDataLayout> {
    let pitch = match bytes_per_row {
        0 => size.width * info.format.bytes_per_pixel(),
        pitch => pitch,
    };
    let multi_row = size.height > 1 || size.depth > 1;
    if multi_row && pitch % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT != 0 {
        return Err(GfxError::invalid_argument(format!(
            "bytes_per_row {pitch} is not a multiple of {}",
            wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
        )));
    }
    Ok(wgpu::ImageDataLayout {
        offset,
        bytes_per_row: multi_row.then_some(pitch),
        rows_per_image: (size.depth > 1).then_some(size.height),
    })
}

/// `Undefined` leaves the texture in the layout the transfer used.
fn finish_texture(texture: &TextureRecord, transfer: TextureLayout, final_layout: TextureLayout) {
    let layout = match final_layout {
        TextureLayout::Undefined => transfer,
        other => other,
    };
    texture.native.layout.set(layout);
}

fn generate_mipmaps(
    ctx: &Context,
    encoder: &mut wgpu::CommandEncoder,
    texture: &TextureRecord,
    base_mip_level: u32,
    level_count: u32,
) -> Result<()> {
    let levels = match level_count {
        0 => texture.info.mip_level_count.saturating_sub(base_mip_level),
        n => n,
    };
    if levels <= 1 {
        return Ok(());
    }
    let raw = &texture.native.raw;
    if !raw.usage().contains(BLIT_USAGES) {
        return Err(GfxError::FeatureNotSupported(format!(
            "mipmap generation for {:?} on WebGPU",
            texture.info.format
        )));
    }
    let filterable = ctx
        .adapter
        .get_texture_format_features(raw.format())
        .flags
        .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE);
    ctx.mipmap_blitter()
        .generate(&ctx.device, encoder, raw, filterable, base_mip_level, levels);
    texture.native.layout.set(TextureLayout::ShaderReadOnly);
    Ok(())
}

fn top_level(
    ctx: &Context,
    pools: &Pools<Context>,
    encoder: &mut wgpu::CommandEncoder,
    command: &Command,
) -> Result<()> {
    match command {
        Command::CopyBufferToBuffer(copy) => {
            let src = &pools.buffer(copy.source)?.native.raw;
            let dst = &pools.buffer(copy.destination)?.native.raw;
            encoder.copy_buffer_to_buffer(
                src,
                copy.source_offset,
                dst,
                copy.destination_offset,
                copy.size,
            );
        }
        Command::CopyBufferToTexture(copy) => {
            let src = &pools.buffer(copy.source)?.native.raw;
            let texture = pools.texture(copy.destination)?;
            encoder.copy_buffer_to_texture(
                wgpu::ImageCopyBuffer {
                    buffer: src,
                    layout: data_layout(&texture.info, copy.source_offset, copy.bytes_per_row, copy.extent)?,
                },
                image_copy(texture, copy.mip_level, copy.origin),
                extent(copy.extent),
            );
            finish_texture(texture, TextureLayout::TransferDst, copy.final_layout);
        }
        Command::CopyTextureToBuffer(copy) => {
            let texture = pools.texture(copy.source)?;
            let dst = &pools.buffer(copy.destination)?.native.raw;
            encoder.copy_texture_to_buffer(
                image_copy(texture, copy.mip_level, copy.origin),
                wgpu::ImageCopyBuffer {
                    buffer: dst,
                    layout: data_layout(
                        &texture.info,
                        copy.destination_offset,
                        copy.bytes_per_row,
                        copy.extent,
                    )?,
                },
                extent(copy.extent),
            );
            finish_texture(texture, TextureLayout::TransferSrc, copy.final_layout);
        }
        Command::CopyTextureToTexture(copy) => {
            let src = pools.texture(copy.source)?;
            let dst = pools.texture(copy.destination)?;
            encoder.copy_texture_to_texture(
                image_copy(src, copy.source_mip_level, copy.source_origin),
                image_copy(dst, copy.destination_mip_level, copy.destination_origin),
                extent(copy.extent),
            );
            finish_texture(src, TextureLayout::TransferSrc, copy.source_final_layout);
            finish_texture(dst, TextureLayout::TransferDst, copy.destination_final_layout);
        }
        Command::BlitTextureToTexture(blit) => {
            let src = pools.texture(blit.source)?;
            let dst = pools.texture(blit.destination)?;
            // WebGPU has no blit; only the copy-equivalent case is expressible.
            if blit.source_extent != blit.destination_extent || src.info.format != dst.info.format {
                return Err(GfxError::FeatureNotSupported(
                    "scaling or format-converting blits on WebGPU".into(),
                ));
            }
            encoder.copy_texture_to_texture(
                image_copy(src, blit.source_mip_level, blit.source_origin),
                image_copy(dst, blit.destination_mip_level, blit.destination_origin),
                extent(blit.source_extent),
            );
            finish_texture(src, TextureLayout::TransferSrc, blit.source_final_layout);
            finish_texture(dst, TextureLayout::TransferDst, blit.destination_final_layout);
        }
        Command::PipelineBarrier {
            buffers, textures, ..
        } => {
            for b in buffers {
                pools.buffer(b.buffer)?;
            }
            for b in textures {
                pools.texture(b.texture)?.native.layout.set(b.new_layout);
            }
        }
        Command::GenerateMipmaps {
            texture,
            base_mip_level,
            level_count,
        } => {
            let texture = pools.texture(*texture)?;
            generate_mipmaps(ctx, encoder, texture, *base_mip_level, *level_count)?;
        }
        Command::WriteTimestamp { query_set, index } => {
            encoder.write_timestamp(&pools.query_set(*query_set)?.native.raw, *index);
        }
        Command::ResolveQuerySet {
            query_set,
            first_query,
            query_count,
            destination,
            destination_offset,
        } => {
            encoder.resolve_query_set(
                &pools.query_set(*query_set)?.native.raw,
                *first_query..first_query + query_count,
                &pools.buffer(*destination)?.native.raw,
                *destination_offset,
            );
        }
        other => {
            return Err(GfxError::invalid_state(format!(
                "{other:?} recorded outside of a pass"
            )))
        }
    }
    Ok(())
}

/// Record the layouts every texture bound in `commands` is used in.
fn prepare_bindings(pools: &Pools<Context>, commands: &[Command]) -> Result<()> {
    for command in commands {
        if let Command::SetBindGroup { bind_group, .. } = command {
            for (state, layout) in &pools.bind_group(*bind_group)?.native.images {
                state.set(*layout);
            }
        }
    }
    Ok(())
}

fn load_op<V>(op: LoadOp, clear: V) -> wgpu::LoadOp<V> {
    match op {
        LoadOp::Load => wgpu::LoadOp::Load,
        // WebGPU has no "don't care"; clearing is the cheapest defined load.
        LoadOp::Clear | LoadOp::DontCare => wgpu::LoadOp::Clear(clear),
    }
}

fn attachment_final(final_layout: TextureLayout, attachment: TextureLayout) -> TextureLayout {
    match final_layout {
        TextureLayout::Undefined => attachment,
        other => other,
    }
}

fn render_pass(
    pools: &Pools<Context>,
    encoder: &mut wgpu::CommandEncoder,
    begin: &BeginRenderPass,
    commands: &[Command],
) -> Result<()> {
    let pass = &pools.render_pass(begin.render_pass)?.info;
    let framebuffer = &pools.framebuffer(begin.framebuffer)?.info;
    prepare_bindings(pools, commands)?;

    let mut colors = Vec::with_capacity(pass.color_attachments.len());
    let mut finals = Vec::new();
    for (i, (slot, attachment)) in pass
        .color_attachments
        .iter()
        .zip(&framebuffer.color_attachments)
        .enumerate()
    {
        let view = &pools.texture_view(attachment.view)?.native;
        finals.push((
            view.layout.clone(),
            attachment_final(slot.target.final_layout, TextureLayout::ColorAttachment),
        ));
        let resolve_target = match (attachment.resolve_target, slot.resolve_target) {
            (Some(handle), Some(target)) => {
                let resolve = &pools.texture_view(handle)?.native;
                finals.push((
                    resolve.layout.clone(),
                    attachment_final(target.final_layout, TextureLayout::ColorAttachment),
                ));
                Some(resolve.raw()?)
            }
            _ => None,
        };
        let clear = begin.color_clear_values.get(i).copied().unwrap_or_default();
        colors.push(Some(wgpu::RenderPassColorAttachment {
            view: view.raw()?,
            resolve_target,
            ops: wgpu::Operations {
                load: load_op(slot.target.ops.load, color(clear)),
                store: slot.target.ops.store.into(),
            },
        }));
    }

    let depth_stencil = match (pass.depth_stencil_attachment, framebuffer.depth_stencil_attachment) {
        (Some(slot), Some(attachment)) => {
            let view = &pools.texture_view(attachment.view)?.native;
            let target = slot.target;
            finals.push((
                view.layout.clone(),
                attachment_final(target.final_layout, TextureLayout::DepthStencilAttachment),
            ));
            Some(wgpu::RenderPassDepthStencilAttachment {
                view: view.raw()?,
                depth_ops: target.format.has_depth().then(|| wgpu::Operations {
                    load: load_op(target.depth_ops.load, begin.depth_clear_value),
                    store: target.depth_ops.store.into(),
                }),
                stencil_ops: target.format.has_stencil().then(|| wgpu::Operations {
                    load: load_op(target.stencil_ops.load, begin.stencil_clear_value),
                    store: target.stencil_ops.store.into(),
                }),
            })
        }
        _ => None,
    };

    // Every occlusion query in a pass shares the set named by the first one.
    let occlusion_query_set = match commands.iter().find_map(|c| match c {
        Command::BeginOcclusionQuery { query_set, .. } => Some(*query_set),
        _ => None,
    }) {
        Some(handle) => Some(&pools.query_set(handle)?.native.raw),
        None => None,
    };

    {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: begin.label.as_deref(),
            color_attachments: &colors,
            depth_stencil_attachment: depth_stencil,
            timestamp_writes: None,
            occlusion_query_set,
        });
        for command in commands {
            render_command(pools, &mut rpass, command)?;
        }
    }

    for (state, layout) in finals {
        state.set(layout);
    }
    Ok(())
}

fn render_command<'a>(
    pools: &'a Pools<Context>,
    rpass: &mut wgpu::RenderPass<'a>,
    command: &Command,
) -> Result<()> {
    match command {
        Command::SetRenderPipeline(handle) => {
            rpass.set_pipeline(&pools.render_pipeline(*handle)?.native.raw);
        }
        Command::SetBindGroup {
            index,
            bind_group,
            dynamic_offsets,
        } => {
            let group = &pools.bind_group(*bind_group)?.native.raw;
            rpass.set_bind_group(*index, group, dynamic_offsets);
        }
        Command::SetVertexBuffer {
            slot,
            buffer,
            offset,
        } => {
            let raw = &pools.buffer(*buffer)?.native.raw;
            rpass.set_vertex_buffer(*slot, raw.slice(*offset..));
        }
        Command::SetIndexBuffer {
            buffer,
            format,
            offset,
        } => {
            let raw = &pools.buffer(*buffer)?.native.raw;
            rpass.set_index_buffer(raw.slice(*offset..), (*format).into());
        }
        Command::SetViewport(v) => {
            rpass.set_viewport(v.x, v.y, v.width, v.height, v.min_depth, v.max_depth);
        }
        Command::SetScissorRect(r) => rpass.set_scissor_rect(r.x, r.y, r.width, r.height),
        Command::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        } => rpass.draw(
            *first_vertex..first_vertex + vertex_count,
            *first_instance..first_instance + instance_count,
        ),
        Command::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        } => rpass.draw_indexed(
            *first_index..first_index + index_count,
            *base_vertex,
            *first_instance..first_instance + instance_count,
        ),
        Command::DrawIndirect { buffer, offset } => {
            rpass.draw_indirect(&pools.buffer(*buffer)?.native.raw, *offset);
        }
        Command::DrawIndexedIndirect { buffer, offset } => {
            rpass.draw_indexed_indirect(&pools.buffer(*buffer)?.native.raw, *offset);
        }
        Command::BeginOcclusionQuery { index, .. } => rpass.begin_occlusion_query(*index),
        Command::EndOcclusionQuery => rpass.end_occlusion_query(),
        other => {
            return Err(GfxError::invalid_state(format!(
                "{other:?} is not legal inside a render pass"
            )))
        }
    }
    Ok(())
}

fn compute_pass(
    pools: &Pools<Context>,
    encoder: &mut wgpu::CommandEncoder,
    label: Option<&str>,
    commands: &[Command],
) -> Result<()> {
    prepare_bindings(pools, commands)?;
    let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label,
        timestamp_writes: None,
    });
    for command in commands {
        compute_command(pools, &mut cpass, command)?;
    }
    Ok(())
}

fn compute_command<'a>(
    pools: &'a Pools<Context>,
    cpass: &mut wgpu::ComputePass<'a>,
    command: &Command,
) -> Result<()> {
    match command {
        Command::SetComputePipeline(handle) => {
            cpass.set_pipeline(&pools.compute_pipeline(*handle)?.native.raw);
        }
        Command::SetBindGroup {
            index,
            bind_group,
            dynamic_offsets,
        } => {
            let group = &pools.bind_group(*bind_group)?.native.raw;
            cpass.set_bind_group(*index, group, dynamic_offsets);
        }
        Command::Dispatch { x, y, z } => cpass.dispatch_workgroups(*x, *y, *z),
        Command::DispatchIndirect { buffer, offset } => {
            cpass.dispatch_workgroups_indirect(&pools.buffer(*buffer)?.native.raw, *offset);
        }
        other => {
            return Err(GfxError::invalid_state(format!(
                "{other:?} is not legal inside a compute pass"
            )))
        }
    }
    Ok(())
}

/// Record `list` into a fresh encoder and finish it.
pub(super) fn record(ctx: &Context, pools: &Pools<Context>, list: &CommandBuffer) -> Result<wgpu::CommandBuffer> {
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: list.label() });
    for segment in list.segments() {
        match segment {
            Segment::Command(command) => top_level(ctx, pools, &mut encoder, command)?,
            Segment::RenderPass { begin, commands } => render_pass(pools, &mut encoder, begin, commands)?,
            Segment::ComputePass { label, commands } => compute_pass(pools, &mut encoder, label, commands)?,
        }
    }
    Ok(encoder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(format: TextureFormat) -> TextureInfo {
        TextureInfo {
            format,
            ..Default::default()
        }
    }

    #[test]
    fn single_rows_need_no_pitch() {
        let layout = data_layout(&info(TextureFormat::R8Unorm), 16, 0, Extent3D::new(3, 1, 1)).unwrap();
        assert_eq!(layout.offset, 16);
        assert_eq!(layout.bytes_per_row, None);
        assert_eq!(layout.rows_per_image, None);
    }

    #[test]
    fn multi_row_pitch_must_be_aligned() {
        let rgba = info(TextureFormat::R8G8B8A8Unorm);
        let err = data_layout(&rgba, 0, 0, Extent3D::new(3, 2, 1)).unwrap_err();
        assert!(matches!(err, GfxError::InvalidArgument(_)));

        let layout = data_layout(&rgba, 0, 256, Extent3D::new(3, 2, 4)).unwrap();
        assert_eq!(layout.bytes_per_row, Some(256));
        assert_eq!(layout.rows_per_image, Some(2));
    }

    #[test]
    fn dont_care_loads_clear() {
        assert_eq!(load_op(LoadOp::DontCare, 0.5f32), wgpu::LoadOp::Clear(0.5));
        assert_eq!(load_op(LoadOp::Load, 0.5f32), wgpu::LoadOp::Load);
    }
}
