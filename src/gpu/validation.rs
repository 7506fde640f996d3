//! Descriptor checks run by the device front end before any backend call.

use std::collections::HashSet;

use super::error::{GfxError, Result};
use super::structs::*;

pub(crate) const SPIRV_MAGIC: u32 = 0x0723_0203;
/// Copy granularity shared by both backends.
pub(crate) const COPY_ALIGNMENT: u64 = 4;
/// Row pitch required for buffer/texture copies on WebGPU.
pub(crate) const ROW_PITCH_ALIGNMENT: u32 = 256;

fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(GfxError::invalid_argument(msg))
}

/// `start..start + len` lies within `0..limit`.
fn span_fits(start: u32, len: u32, limit: u32) -> bool {
    start.checked_add(len).map_or(false, |end| end <= limit)
}

pub fn buffer_descriptor(desc: &BufferDescriptor<'_>, limits: &DeviceLimits) -> Result<()> {
    if desc.size == 0 {
        return invalid("buffer size must be non-zero");
    }
    if desc.usage.is_empty() {
        return invalid("buffer usage must be non-empty");
    }
    if limits.max_buffer_size != 0 && desc.size > limits.max_buffer_size {
        return invalid(format!(
            "buffer size {} exceeds device limit {}",
            desc.size, limits.max_buffer_size
        ));
    }
    let mappable = desc
        .usage
        .intersects(BufferUsages::MAP_READ | BufferUsages::MAP_WRITE);
    if mappable && desc.size % COPY_ALIGNMENT != 0 {
        return invalid("mappable buffers must have a size that is a multiple of 4");
    }
    if desc.usage.contains(BufferUsages::MAP_READ | BufferUsages::MAP_WRITE) {
        return invalid("a buffer cannot be mapped for both read and write");
    }
    Ok(())
}

fn max_mips(size: Extent3D) -> u32 {
    let largest = size.width.max(size.height).max(size.depth);
    32 - largest.leading_zeros()
}

pub fn texture_descriptor(desc: &TextureDescriptor<'_>, limits: &DeviceLimits) -> Result<()> {
    let size = desc.size;
    if size.width == 0 || size.height == 0 || size.depth == 0 {
        return invalid("texture extent must be non-zero");
    }
    if desc.format == TextureFormat::Undefined {
        return invalid("texture format must be defined");
    }
    if desc.usage.is_empty() {
        return invalid("texture usage must be non-empty");
    }
    if desc.array_layer_count == 0 {
        return invalid("texture must have at least one array layer");
    }
    if desc.mip_level_count == 0 || desc.mip_level_count > max_mips(size) {
        return invalid(format!(
            "mip level count {} out of range 1..={}",
            desc.mip_level_count,
            max_mips(size)
        ));
    }

    let max_dim = match desc.texture_type {
        TextureType::D1 => {
            if size.height != 1 || size.depth != 1 {
                return invalid("1D textures must have height and depth of 1");
            }
            limits.max_texture_dimension_1d
        }
        TextureType::D2 => {
            if size.depth != 1 {
                return invalid("2D textures must have depth 1; use array layers");
            }
            limits.max_texture_dimension_2d
        }
        TextureType::D3 => {
            if desc.array_layer_count != 1 {
                return invalid("3D textures cannot have array layers");
            }
            limits.max_texture_dimension_3d
        }
        TextureType::Cube => {
            if size.width != size.height || size.depth != 1 {
                return invalid("cube textures must be square with depth 1");
            }
            if desc.array_layer_count % 6 != 0 {
                return invalid("cube textures need a multiple of 6 array layers");
            }
            limits.max_texture_dimension_2d
        }
    };
    if max_dim != 0 && size.width.max(size.height).max(size.depth) > max_dim {
        return invalid(format!("texture extent exceeds device limit {max_dim}"));
    }
    if limits.max_texture_array_layers != 0
        && desc.array_layer_count > limits.max_texture_array_layers
    {
        return invalid("texture array layer count exceeds device limit");
    }
    if desc.sample_count != SampleCount::S1 && desc.mip_level_count != 1 {
        return invalid("multisampled textures must have a single mip level");
    }
    Ok(())
}

/// Resolve a view descriptor against the texture it is created on.
pub fn texture_view(
    texture: crate::Handle<Texture>,
    info: &TextureInfo,
    desc: &TextureViewDescriptor<'_>,
) -> Result<TextureViewInfo> {
    if desc.base_mip_level >= info.mip_level_count {
        return invalid("view base mip level is outside the texture");
    }
    if desc.base_array_layer >= info.array_layer_count {
        return invalid("view base array layer is outside the texture");
    }
    let mip_level_count = desc
        .mip_level_count
        .unwrap_or(info.mip_level_count - desc.base_mip_level);
    let array_layer_count = desc
        .array_layer_count
        .unwrap_or(info.array_layer_count - desc.base_array_layer);
    if mip_level_count == 0 || !span_fits(desc.base_mip_level, mip_level_count, info.mip_level_count) {
        return invalid("view mip range is outside the texture");
    }
    if array_layer_count == 0
        || !span_fits(desc.base_array_layer, array_layer_count, info.array_layer_count)
    {
        return invalid("view array layer range is outside the texture");
    }

    let view_type = desc.view_type.unwrap_or_else(|| {
        TextureViewType::default_for(info.texture_type, array_layer_count)
    });
    let layers_ok = match view_type {
        TextureViewType::D1 | TextureViewType::D2 | TextureViewType::D3 => {
            array_layer_count == 1
        }
        TextureViewType::Cube => array_layer_count == 6,
        TextureViewType::CubeArray => array_layer_count % 6 == 0,
        TextureViewType::D1Array | TextureViewType::D2Array => true,
    };
    if !layers_ok {
        return invalid(format!(
            "{array_layer_count} array layers do not fit a {view_type:?} view"
        ));
    }

    let format = desc.format.unwrap_or(info.format);
    if format == TextureFormat::Undefined {
        return invalid("view format must be defined");
    }
    if format.is_depth_stencil() != info.format.is_depth_stencil() {
        return invalid("view format is incompatible with the texture format");
    }

    Ok(TextureViewInfo {
        texture: Some(texture),
        view_type,
        format,
        base_mip_level: desc.base_mip_level,
        mip_level_count,
        base_array_layer: desc.base_array_layer,
        array_layer_count,
        extent: info.size.mip_level(desc.base_mip_level),
        sample_count: info.sample_count,
    })
}

pub fn sampler_descriptor(desc: &SamplerDescriptor<'_>) -> Result<()> {
    if desc.max_anisotropy == 0 {
        return invalid("sampler anisotropy must be at least 1");
    }
    if desc.lod_min_clamp < 0.0 || desc.lod_min_clamp > desc.lod_max_clamp {
        return invalid("sampler LOD clamp range is empty or negative");
    }
    if desc.max_anisotropy > 1
        && (desc.mag_filter != FilterMode::Linear
            || desc.min_filter != FilterMode::Linear
            || desc.mipmap_filter != FilterMode::Linear)
    {
        return invalid("anisotropic filtering requires linear filters");
    }
    Ok(())
}

pub fn shader_descriptor(desc: &ShaderDescriptor<'_>) -> Result<()> {
    if desc.entry_point.is_empty() {
        return invalid("shader entry point must be non-empty");
    }
    match desc.source {
        ShaderSource::SpirV(words) => {
            if words.len() < 5 {
                return invalid("SPIR-V module is shorter than its header");
            }
            if words[0] != SPIRV_MAGIC {
                return invalid("SPIR-V module has a bad magic number");
            }
        }
        ShaderSource::Wgsl(text) => {
            if text.trim().is_empty() {
                return invalid("WGSL source is empty");
            }
        }
    }
    Ok(())
}

pub fn bind_group_layout(entries: &[BindGroupLayoutEntry]) -> Result<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.binding) {
            return invalid(format!("binding {} declared twice", entry.binding));
        }
        if entry.visibility.is_empty() {
            return invalid(format!("binding {} is visible to no stage", entry.binding));
        }
        if let BindingType::StorageTexture { format, .. } = entry.ty {
            if format == TextureFormat::Undefined {
                return invalid(format!(
                    "storage texture binding {} needs a format",
                    entry.binding
                ));
            }
        }
    }
    Ok(())
}

/// What a bind group entry resolved to, looked up by the caller.
#[derive(Clone, Copy, Debug)]
pub enum ResolvedResource {
    Buffer(BufferInfo),
    Sampler,
    TextureView {
        view: TextureViewInfo,
        usage: TextureUsages,
    },
}

/// Check bind group entries against their layout. `resolve` returns `None`
/// for stale handles.
pub fn bind_group<F>(
    layout: &[BindGroupLayoutEntry],
    entries: &[BindGroupEntry],
    resolve: F,
) -> Result<()>
where
    F: Fn(&BindingResource) -> Option<ResolvedResource>,
{
    if layout.len() != entries.len() {
        return invalid(format!(
            "bind group has {} entries but its layout declares {}",
            entries.len(),
            layout.len()
        ));
    }

    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.binding) {
            return invalid(format!("binding {} provided twice", entry.binding));
        }
        let Some(slot) = layout.iter().find(|l| l.binding == entry.binding) else {
            return invalid(format!("binding {} is not in the layout", entry.binding));
        };
        let Some(resolved) = resolve(&entry.resource) else {
            return invalid(format!(
                "binding {} refers to a destroyed resource",
                entry.binding
            ));
        };

        match (slot.ty, entry.resource, resolved) {
            (
                BindingType::Buffer {
                    ty,
                    min_binding_size,
                    ..
                },
                BindingResource::Buffer { offset, size, .. },
                ResolvedResource::Buffer(info),
            ) => {
                let needed = match ty {
                    BufferBindingType::Uniform => BufferUsages::UNIFORM,
                    BufferBindingType::Storage | BufferBindingType::ReadOnlyStorage => {
                        BufferUsages::STORAGE
                    }
                };
                if !info.usage.contains(needed) {
                    return invalid(format!(
                        "binding {} buffer lacks {needed:?} usage",
                        entry.binding
                    ));
                }
                if offset >= info.size {
                    return invalid(format!("binding {} offset past buffer end", entry.binding));
                }
                let bound = if size == 0 { info.size - offset } else { size };
                if offset.checked_add(bound).map_or(true, |end| end > info.size) {
                    return invalid(format!("binding {} range past buffer end", entry.binding));
                }
                if bound < min_binding_size {
                    return invalid(format!(
                        "binding {} range is smaller than the layout minimum",
                        entry.binding
                    ));
                }
            }
            (BindingType::Sampler { .. }, BindingResource::Sampler(_), ResolvedResource::Sampler) => {}
            (
                BindingType::Texture {
                    view_dimension,
                    multisampled,
                    ..
                },
                BindingResource::TextureView(_),
                ResolvedResource::TextureView { view, usage },
            ) => {
                if !usage.contains(TextureUsages::TEXTURE_BINDING) {
                    return invalid(format!(
                        "binding {} texture lacks TEXTURE_BINDING usage",
                        entry.binding
                    ));
                }
                if view.view_type != view_dimension {
                    return invalid(format!(
                        "binding {} view is {:?}, layout expects {view_dimension:?}",
                        entry.binding, view.view_type
                    ));
                }
                if multisampled != (view.sample_count != SampleCount::S1) {
                    return invalid(format!(
                        "binding {} multisampling does not match the layout",
                        entry.binding
                    ));
                }
            }
            (
                BindingType::StorageTexture {
                    format,
                    view_dimension,
                    ..
                },
                BindingResource::TextureView(_),
                ResolvedResource::TextureView { view, usage },
            ) => {
                if !usage.contains(TextureUsages::STORAGE_BINDING) {
                    return invalid(format!(
                        "binding {} texture lacks STORAGE_BINDING usage",
                        entry.binding
                    ));
                }
                if view.format != format || view.view_type != view_dimension {
                    return invalid(format!(
                        "binding {} storage view does not match the layout",
                        entry.binding
                    ));
                }
            }
            _ => {
                return invalid(format!(
                    "binding {} resource type does not match the layout",
                    entry.binding
                ))
            }
        }
    }
    Ok(())
}

pub fn render_pass(desc: &RenderPassDescriptor<'_>) -> Result<()> {
    if desc.color_attachments.is_empty() && desc.depth_stencil_attachment.is_none() {
        return invalid("render pass needs at least one attachment");
    }
    for (i, color) in desc.color_attachments.iter().enumerate() {
        let target = color.target;
        if target.format == TextureFormat::Undefined || target.format.is_depth_stencil() {
            return invalid(format!("color attachment {i} needs a color format"));
        }
        if let Some(resolve) = color.resolve_target {
            if target.sample_count == SampleCount::S1 {
                return invalid(format!(
                    "color attachment {i} resolves but is not multisampled"
                ));
            }
            if resolve.sample_count != SampleCount::S1 || resolve.format != target.format {
                return invalid(format!("color attachment {i} resolve target mismatch"));
            }
        }
    }
    if let Some(depth) = desc.depth_stencil_attachment {
        if !depth.target.format.is_depth_stencil() {
            return invalid("depth attachment needs a depth/stencil format");
        }
    }
    let samples: HashSet<_> = desc
        .color_attachments
        .iter()
        .map(|c| c.target.sample_count)
        .chain(desc.depth_stencil_attachment.map(|d| d.target.sample_count))
        .collect();
    if samples.len() > 1 {
        return invalid("render pass attachments disagree on sample count");
    }
    Ok(())
}

pub fn framebuffer<F>(pass: &RenderPassInfo, desc: &FramebufferDescriptor<'_>, view: F) -> Result<()>
where
    F: Fn(crate::Handle<TextureView>) -> Option<TextureViewInfo>,
{
    if desc.width == 0 || desc.height == 0 {
        return invalid("framebuffer extent must be non-zero");
    }
    if desc.color_attachments.len() != pass.color_attachments.len() {
        return invalid(format!(
            "framebuffer has {} color attachments, render pass expects {}",
            desc.color_attachments.len(),
            pass.color_attachments.len()
        ));
    }
    if desc.depth_stencil_attachment.is_some() != pass.depth_stencil_attachment.is_some() {
        return invalid("framebuffer depth attachment does not match the render pass");
    }

    let check = |handle: crate::Handle<TextureView>, format: TextureFormat, samples: SampleCount| {
        let Some(info) = view(handle) else {
            return invalid("framebuffer attachment refers to a destroyed view");
        };
        if info.format != format || info.sample_count != samples {
            return invalid(format!(
                "attachment view is {:?}/{:?}, render pass expects {format:?}/{samples:?}",
                info.format, info.sample_count
            ));
        }
        if info.extent.width < desc.width || info.extent.height < desc.height {
            return invalid("attachment view is smaller than the framebuffer");
        }
        Ok(())
    };

    for (attachment, slot) in desc.color_attachments.iter().zip(&pass.color_attachments) {
        check(attachment.view, slot.target.format, slot.target.sample_count)?;
        match (attachment.resolve_target, slot.resolve_target) {
            (Some(resolve), Some(target)) => check(resolve, target.format, target.sample_count)?,
            (None, None) => {}
            _ => return invalid("framebuffer resolve targets do not match the render pass"),
        }
    }
    if let (Some(attachment), Some(slot)) =
        (desc.depth_stencil_attachment, pass.depth_stencil_attachment)
    {
        check(attachment.view, slot.target.format, slot.target.sample_count)?;
    }
    Ok(())
}

pub fn render_pipeline(pass: &RenderPassInfo, desc: &RenderPipelineDescriptor<'_>) -> Result<()> {
    if desc.vertex.entry_point.is_empty() {
        return invalid("vertex entry point must be non-empty");
    }
    let targets = desc.fragment.as_ref().map(|f| f.targets).unwrap_or(&[]);
    if targets.len() != pass.color_attachments.len() {
        return invalid(format!(
            "pipeline writes {} color targets, render pass has {}",
            targets.len(),
            pass.color_attachments.len()
        ));
    }
    for (i, (target, slot)) in targets.iter().zip(&pass.color_attachments).enumerate() {
        if target.format != slot.target.format {
            return invalid(format!("color target {i} format does not match the pass"));
        }
    }
    match (&desc.depth_stencil, &pass.depth_stencil_attachment) {
        (Some(state), Some(slot)) if state.format != slot.target.format => {
            return invalid("depth state format does not match the pass");
        }
        (Some(_), None) => return invalid("depth state given but the pass has no depth"),
        _ => {}
    }
    let pass_samples = pass
        .color_attachments
        .first()
        .map(|c| c.target.sample_count)
        .or(pass.depth_stencil_attachment.map(|d| d.target.sample_count))
        .unwrap_or_default();
    if desc.sample_count != pass_samples {
        return invalid("pipeline sample count does not match the render pass");
    }

    if desc.vertex.buffers.len() > super::cmd::MAX_VERTEX_BUFFERS as usize {
        return invalid(format!(
            "at most {} vertex buffers are supported",
            super::cmd::MAX_VERTEX_BUFFERS
        ));
    }
    let mut locations = HashSet::new();
    for layout in desc.vertex.buffers {
        for attr in layout.attributes {
            let end = attr.offset.checked_add(attr.format.size());
            if layout.array_stride != 0 && end.map_or(true, |end| end > layout.array_stride) {
                return invalid(format!(
                    "vertex attribute at location {} overruns its stride",
                    attr.shader_location
                ));
            }
            if !locations.insert(attr.shader_location) {
                return invalid(format!(
                    "vertex location {} used twice",
                    attr.shader_location
                ));
            }
        }
    }
    Ok(())
}

pub fn swapchain_descriptor(desc: &SwapchainDescriptor<'_>) -> Result<()> {
    if desc.width == 0 || desc.height == 0 {
        return invalid("swapchain extent must be non-zero");
    }
    if desc.image_count == 0 {
        return invalid("swapchain needs at least one image");
    }
    if desc.format == TextureFormat::Undefined || desc.format.is_depth_stencil() {
        return invalid("swapchain needs a color format");
    }
    if desc.usage.is_empty() {
        return invalid("swapchain usage must be non-empty");
    }
    Ok(())
}

pub fn buffer_range(info: &BufferInfo, offset: u64, size: u64, what: &str) -> Result<()> {
    match offset.checked_add(size) {
        Some(end) if end <= info.size => Ok(()),
        _ => invalid(format!(
            "{what}: range {offset}+{size} exceeds buffer size {}",
            info.size
        )),
    }
}

pub fn copy_buffer_to_buffer(
    src: &BufferInfo,
    dst: &BufferInfo,
    copy: &CopyBufferToBuffer,
) -> Result<()> {
    if copy.size == 0 || copy.size % COPY_ALIGNMENT != 0 {
        return invalid("buffer copy size must be a non-zero multiple of 4");
    }
    if copy.source_offset % COPY_ALIGNMENT != 0 || copy.destination_offset % COPY_ALIGNMENT != 0 {
        return invalid("buffer copy offsets must be multiples of 4");
    }
    if !src.usage.contains(BufferUsages::COPY_SRC) {
        return invalid("copy source buffer lacks COPY_SRC usage");
    }
    if !dst.usage.contains(BufferUsages::COPY_DST) {
        return invalid("copy destination buffer lacks COPY_DST usage");
    }
    buffer_range(src, copy.source_offset, copy.size, "copy source")?;
    buffer_range(dst, copy.destination_offset, copy.size, "copy destination")
}

/// Bytes one row of `extent` occupies in a buffer, honoring an explicit pitch.
pub fn row_pitch(format: TextureFormat, width: u32, bytes_per_row: u32) -> Result<u32> {
    let Some(tight) = format.bytes_per_pixel().checked_mul(width) else {
        return invalid(format!("a row of {width} {format:?} texels does not fit in 32 bits"));
    };
    if bytes_per_row == 0 {
        Ok(tight)
    } else if bytes_per_row < tight {
        invalid(format!(
            "bytes_per_row {bytes_per_row} is smaller than a tightly packed row of {tight}"
        ))
    } else if bytes_per_row % format.bytes_per_pixel().max(1) != 0 {
        invalid("bytes_per_row must be a multiple of the texel size")
    } else {
        Ok(bytes_per_row)
    }
}

fn texture_region(info: &TextureInfo, mip: u32, origin: Origin3D, extent: Extent3D) -> Result<()> {
    if mip >= info.mip_level_count {
        return invalid("copy mip level is outside the texture");
    }
    if extent.width == 0 || extent.height == 0 || extent.depth == 0 {
        return invalid("copy extent must be non-zero");
    }
    let level = info.size.mip_level(mip);
    let depth = if info.texture_type == TextureType::D3 {
        level.depth
    } else {
        info.array_layer_count
    };
    if !span_fits(origin.x, extent.width, level.width)
        || !span_fits(origin.y, extent.height, level.height)
        || !span_fits(origin.z, extent.depth, depth)
    {
        return invalid("copy region is outside the texture");
    }
    Ok(())
}

/// Buffer side footprint of a texture copy.
pub fn texture_copy_footprint(
    format: TextureFormat,
    extent: Extent3D,
    bytes_per_row: u32,
) -> Result<u64> {
    let pitch = row_pitch(format, extent.width, bytes_per_row)? as u64;
    let tight = format.bytes_per_pixel() as u64 * extent.width as u64;
    let rows = extent.height as u64 * extent.depth as u64;
    rows.checked_sub(1)
        .and_then(|full| pitch.checked_mul(full))
        .and_then(|bytes| bytes.checked_add(tight))
        .map_or_else(|| invalid("texture copy footprint is empty or overflows"), Ok)
}

fn buffer_texture_layout(
    format: TextureFormat,
    extent: Extent3D,
    offset: u64,
    bytes_per_row: u32,
) -> Result<u64> {
    let texel = format.bytes_per_pixel() as u64;
    if texel == 0 {
        return invalid("cannot copy a texture with an undefined format");
    }
    let align = if texel % COPY_ALIGNMENT == 0 {
        texel
    } else {
        COPY_ALIGNMENT * texel / gcd(COPY_ALIGNMENT, texel)
    };
    if offset % align != 0 {
        return invalid(format!("buffer offset {offset} must be a multiple of {align}"));
    }
    let pitch = row_pitch(format, extent.width, bytes_per_row)?;
    let rows = extent.height as u64 * extent.depth as u64;
    if rows > 1 && pitch % ROW_PITCH_ALIGNMENT != 0 {
        return invalid(format!(
            "bytes_per_row {pitch} must be a multiple of {ROW_PITCH_ALIGNMENT} for multi-row copies"
        ));
    }
    texture_copy_footprint(format, extent, bytes_per_row)
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

pub fn copy_buffer_to_texture(
    src: &BufferInfo,
    dst: &TextureInfo,
    copy: &CopyBufferToTexture,
) -> Result<()> {
    if !src.usage.contains(BufferUsages::COPY_SRC) {
        return invalid("copy source buffer lacks COPY_SRC usage");
    }
    if !dst.usage.contains(TextureUsages::COPY_DST) {
        return invalid("copy destination texture lacks COPY_DST usage");
    }
    if dst.sample_count != SampleCount::S1 {
        return invalid("cannot copy into a multisampled texture");
    }
    texture_region(dst, copy.mip_level, copy.origin, copy.extent)?;
    let footprint =
        buffer_texture_layout(dst.format, copy.extent, copy.source_offset, copy.bytes_per_row)?;
    buffer_range(src, copy.source_offset, footprint, "texture upload source")
}

pub fn copy_texture_to_buffer(
    src: &TextureInfo,
    dst: &BufferInfo,
    copy: &CopyTextureToBuffer,
) -> Result<()> {
    if !src.usage.contains(TextureUsages::COPY_SRC) {
        return invalid("copy source texture lacks COPY_SRC usage");
    }
    if !dst.usage.contains(BufferUsages::COPY_DST) {
        return invalid("copy destination buffer lacks COPY_DST usage");
    }
    if src.sample_count != SampleCount::S1 {
        return invalid("cannot copy out of a multisampled texture");
    }
    texture_region(src, copy.mip_level, copy.origin, copy.extent)?;
    let footprint = buffer_texture_layout(
        src.format,
        copy.extent,
        copy.destination_offset,
        copy.bytes_per_row,
    )?;
    buffer_range(dst, copy.destination_offset, footprint, "texture readback destination")
}

pub fn copy_texture_to_texture(
    src: &TextureInfo,
    dst: &TextureInfo,
    copy: &CopyTextureToTexture,
) -> Result<()> {
    if !src.usage.contains(TextureUsages::COPY_SRC) {
        return invalid("copy source texture lacks COPY_SRC usage");
    }
    if !dst.usage.contains(TextureUsages::COPY_DST) {
        return invalid("copy destination texture lacks COPY_DST usage");
    }
    if src.format.bytes_per_pixel() != dst.format.bytes_per_pixel() {
        return invalid("texture copy between formats of different texel size");
    }
    texture_region(src, copy.source_mip_level, copy.source_origin, copy.extent)?;
    texture_region(dst, copy.destination_mip_level, copy.destination_origin, copy.extent)
}

pub fn blit_texture_to_texture(
    src: &TextureInfo,
    dst: &TextureInfo,
    blit: &BlitTextureToTexture,
) -> Result<()> {
    if !src.usage.contains(TextureUsages::COPY_SRC) {
        return invalid("blit source texture lacks COPY_SRC usage");
    }
    if !dst.usage.contains(TextureUsages::COPY_DST) {
        return invalid("blit destination texture lacks COPY_DST usage");
    }
    if src.sample_count != SampleCount::S1 || dst.sample_count != SampleCount::S1 {
        return invalid("blits cannot involve multisampled textures");
    }
    if src.format.is_depth_stencil() != dst.format.is_depth_stencil() {
        return invalid("blit between color and depth formats");
    }
    texture_region(src, blit.source_mip_level, blit.source_origin, blit.source_extent)?;
    texture_region(
        dst,
        blit.destination_mip_level,
        blit.destination_origin,
        blit.destination_extent,
    )
}

/// Upper bound on queries in one set; matches the WebGPU limit.
pub(crate) const MAX_QUERY_COUNT: u32 = 4096;
/// Resolve destinations must be aligned to this many bytes.
pub(crate) const QUERY_RESOLVE_ALIGNMENT: u64 = 256;
/// Each resolved query occupies one `u64`.
pub(crate) const QUERY_RESULT_SIZE: u64 = 8;

pub fn query_set_descriptor(desc: &QuerySetDescriptor<'_>) -> Result<()> {
    if desc.count == 0 || desc.count > MAX_QUERY_COUNT {
        return invalid(format!(
            "query set count must lie in 1..={MAX_QUERY_COUNT}, got {}",
            desc.count
        ));
    }
    Ok(())
}

pub fn query_index(info: &QuerySetInfo, index: u32, expected: QueryType) -> Result<()> {
    if info.query_type != expected {
        return invalid(format!(
            "query set holds {:?} queries, command needs {expected:?}",
            info.query_type
        ));
    }
    if index >= info.count {
        return invalid(format!("query index {index} out of range for {} queries", info.count));
    }
    Ok(())
}

pub fn resolve_query_set(
    set: &QuerySetInfo,
    dst: &BufferInfo,
    first_query: u32,
    query_count: u32,
    offset: u64,
) -> Result<()> {
    if query_count == 0 || !span_fits(first_query, query_count, set.count) {
        return invalid(format!(
            "resolve of queries {first_query}+{query_count} exceeds {} queries",
            set.count
        ));
    }
    if !dst.usage.contains(BufferUsages::QUERY_RESOLVE) {
        return invalid("resolve destination lacks QUERY_RESOLVE usage");
    }
    if offset % QUERY_RESOLVE_ALIGNMENT != 0 {
        return invalid("resolve destination offset must be a multiple of 256");
    }
    buffer_range(dst, offset, query_count as u64 * QUERY_RESULT_SIZE, "query resolve")
}

/// Check a mipmap generation request and return the number of levels it
/// writes (excluding the base level).
pub fn generate_mipmaps(info: &TextureInfo, base_mip_level: u32, level_count: u32) -> Result<u32> {
    if !matches!(info.texture_type, TextureType::D2 | TextureType::Cube) {
        return invalid("mipmaps can only be generated for 2D and cube textures");
    }
    if info.sample_count != SampleCount::S1 {
        return invalid("mipmaps cannot be generated for multisampled textures");
    }
    if info.format.is_depth_stencil() {
        return invalid("mipmaps cannot be generated for depth or stencil formats");
    }
    if !info.usage.contains(TextureUsages::COPY_SRC | TextureUsages::COPY_DST) {
        return invalid("mipmap generation needs COPY_SRC and COPY_DST usage");
    }
    let level_count = match level_count {
        0 => info.mip_level_count.saturating_sub(base_mip_level),
        n => n,
    };
    if level_count == 0 || !span_fits(base_mip_level, level_count, info.mip_level_count) {
        return invalid(format!(
            "mip levels {base_mip_level}+{level_count} exceed {} levels",
            info.mip_level_count
        ));
    }
    Ok(level_count - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Handle;

    fn limits() -> DeviceLimits {
        DeviceLimits {
            max_buffer_size: 1 << 30,
            max_texture_dimension_1d: 4096,
            max_texture_dimension_2d: 4096,
            max_texture_dimension_3d: 256,
            max_texture_array_layers: 256,
            ..Default::default()
        }
    }

    fn uniform_layout() -> [BindGroupLayoutEntry; 2] {
        [
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: 16,
                },
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler { comparison: false },
            },
        ]
    }

    #[test]
    fn zero_sized_buffer_rejected() {
        let desc = BufferDescriptor {
            size: 0,
            usage: BufferUsages::UNIFORM,
            ..Default::default()
        };
        assert!(matches!(
            buffer_descriptor(&desc, &limits()),
            Err(GfxError::InvalidArgument(_))
        ));
    }

    #[test]
    fn mappable_buffer_needs_aligned_size() {
        let desc = BufferDescriptor {
            size: 6,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            ..Default::default()
        };
        assert!(buffer_descriptor(&desc, &limits()).is_err());
        let desc = BufferDescriptor { size: 8, ..desc };
        assert!(buffer_descriptor(&desc, &limits()).is_ok());
    }

    #[test]
    fn texture_rules() {
        let good = TextureDescriptor {
            size: Extent3D::new(64, 64, 1),
            mip_level_count: 7,
            usage: TextureUsages::TEXTURE_BINDING,
            ..Default::default()
        };
        assert!(texture_descriptor(&good, &limits()).is_ok());

        let too_many_mips = TextureDescriptor {
            mip_level_count: 8,
            ..good.clone()
        };
        assert!(texture_descriptor(&too_many_mips, &limits()).is_err());

        let undefined = TextureDescriptor {
            format: TextureFormat::Undefined,
            ..good.clone()
        };
        assert!(texture_descriptor(&undefined, &limits()).is_err());

        let bad_cube = TextureDescriptor {
            texture_type: TextureType::Cube,
            array_layer_count: 4,
            ..good
        };
        assert!(texture_descriptor(&bad_cube, &limits()).is_err());
    }

    #[test]
    fn view_inherits_texture_ranges() {
        let info = TextureInfo {
            texture_type: TextureType::D2,
            size: Extent3D::new(32, 16, 1),
            array_layer_count: 3,
            mip_level_count: 4,
            sample_count: SampleCount::S1,
            format: TextureFormat::R8G8B8A8Unorm,
            usage: TextureUsages::TEXTURE_BINDING,
        };
        let handle = Handle::new(0, 0);
        let view = texture_view(
            handle,
            &info,
            &TextureViewDescriptor {
                base_mip_level: 1,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(view.mip_level_count, 3);
        assert_eq!(view.array_layer_count, 3);
        assert_eq!(view.view_type, TextureViewType::D2Array);
        assert_eq!(view.extent, Extent3D::new(16, 8, 1));

        let out_of_range = TextureViewDescriptor {
            base_array_layer: 2,
            array_layer_count: Some(2),
            ..Default::default()
        };
        assert!(texture_view(handle, &info, &out_of_range).is_err());
    }

    #[test]
    fn spirv_magic_checked() {
        let words = [0xdead_beef, 0, 0, 0, 0];
        let desc = ShaderDescriptor {
            source: ShaderSource::SpirV(&words),
            ..Default::default()
        };
        assert!(shader_descriptor(&desc).is_err());
        let words = [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0];
        let desc = ShaderDescriptor {
            source: ShaderSource::SpirV(&words),
            ..Default::default()
        };
        assert!(shader_descriptor(&desc).is_ok());
    }

    #[test]
    fn duplicate_layout_bindings_rejected() {
        let mut entries = uniform_layout();
        entries[1].binding = 0;
        assert!(bind_group_layout(&entries).is_err());
        assert!(bind_group_layout(&uniform_layout()).is_ok());
    }

    #[test]
    fn bind_group_matches_layout() {
        let buffer = Handle::new(0, 0);
        let sampler = Handle::new(1, 0);
        let entries = [
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer {
                    buffer,
                    offset: 0,
                    size: 0,
                },
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(sampler),
            },
        ];
        let resolve = |res: &BindingResource| match res {
            BindingResource::Buffer { .. } => Some(ResolvedResource::Buffer(BufferInfo {
                size: 64,
                usage: BufferUsages::UNIFORM,
                memory_properties: MemoryProperties::empty(),
            })),
            BindingResource::Sampler(_) => Some(ResolvedResource::Sampler),
            BindingResource::TextureView(_) => None,
        };
        assert!(bind_group(&uniform_layout(), &entries, resolve).is_ok());

        // Missing entry.
        assert!(matches!(
            bind_group(&uniform_layout(), &entries[..1], resolve),
            Err(GfxError::InvalidArgument(_))
        ));

        // Sampler where a buffer is expected.
        let mut swapped = [
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::Sampler(sampler),
            },
            entries[0],
        ];
        swapped[1].binding = 1;
        assert!(bind_group(&uniform_layout(), &swapped, resolve).is_err());
    }

    #[test]
    fn bind_group_buffer_needs_usage() {
        let entries = [
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer {
                    buffer: Handle::new(0, 0),
                    offset: 0,
                    size: 16,
                },
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(Handle::new(0, 0)),
            },
        ];
        let resolve = |res: &BindingResource| match res {
            BindingResource::Buffer { .. } => Some(ResolvedResource::Buffer(BufferInfo {
                size: 64,
                usage: BufferUsages::STORAGE,
                memory_properties: MemoryProperties::empty(),
            })),
            _ => Some(ResolvedResource::Sampler),
        };
        assert!(bind_group(&uniform_layout(), &entries, resolve).is_err());
    }

    #[test]
    fn render_pass_requires_attachments() {
        assert!(render_pass(&RenderPassDescriptor::default()).is_err());
        let color = [RenderPassColorAttachment {
            target: ColorAttachmentTarget {
                format: TextureFormat::R8G8B8A8Unorm,
                ..Default::default()
            },
            resolve_target: None,
        }];
        let desc = RenderPassDescriptor {
            color_attachments: &color,
            ..Default::default()
        };
        assert!(render_pass(&desc).is_ok());

        let depth_as_color = [RenderPassColorAttachment {
            target: ColorAttachmentTarget {
                format: TextureFormat::Depth32Float,
                ..Default::default()
            },
            resolve_target: None,
        }];
        let desc = RenderPassDescriptor {
            color_attachments: &depth_as_color,
            ..Default::default()
        };
        assert!(render_pass(&desc).is_err());
    }

    #[test]
    fn copy_alignment_and_bounds() {
        let src = BufferInfo {
            size: 256,
            usage: BufferUsages::COPY_SRC,
            memory_properties: MemoryProperties::empty(),
        };
        let dst = BufferInfo {
            usage: BufferUsages::COPY_DST,
            ..src
        };
        let mut copy = CopyBufferToBuffer {
            source: Handle::new(0, 0),
            source_offset: 0,
            destination: Handle::new(1, 0),
            destination_offset: 0,
            size: 256,
        };
        assert!(copy_buffer_to_buffer(&src, &dst, &copy).is_ok());
        copy.size = 6;
        assert!(copy_buffer_to_buffer(&src, &dst, &copy).is_err());
        copy.size = 8;
        copy.destination_offset = 252;
        assert!(copy_buffer_to_buffer(&src, &dst, &copy).is_err());
        let wrong_usage = CopyBufferToBuffer {
            size: 4,
            destination_offset: 0,
            ..copy
        };
        assert!(copy_buffer_to_buffer(&dst, &dst, &wrong_usage).is_err());
    }

    #[test]
    fn texture_footprint_uses_pitch() {
        let fp = texture_copy_footprint(TextureFormat::R8G8B8A8Unorm, Extent3D::new(4, 2, 1), 256)
            .unwrap();
        assert_eq!(fp, 256 + 16);
        assert!(row_pitch(TextureFormat::R8G8B8A8Unorm, 4, 8).is_err());
        assert_eq!(row_pitch(TextureFormat::R8G8B8A8Unorm, 4, 0).unwrap(), 16);
    }

    #[test]
    fn oversized_arguments_are_rejected_not_overflowed() {
        let layout = [uniform_layout()[0]];
        let whole_size = [BindGroupEntry {
            binding: 0,
            resource: BindingResource::Buffer {
                buffer: Handle::new(0, 0),
                offset: 16,
                size: u64::MAX,
            },
        }];
        let resolve = |_: &BindingResource| {
            Some(ResolvedResource::Buffer(BufferInfo {
                size: 64,
                usage: BufferUsages::UNIFORM,
                memory_properties: MemoryProperties::empty(),
            }))
        };
        assert!(matches!(
            bind_group(&layout, &whole_size, resolve),
            Err(GfxError::InvalidArgument(_))
        ));

        assert!(matches!(
            row_pitch(TextureFormat::R32G32B32A32Float, u32::MAX / 8, 0),
            Err(GfxError::InvalidArgument(_))
        ));

        let info = TextureInfo {
            texture_type: TextureType::D2,
            size: Extent3D::new(16, 16, 1),
            array_layer_count: 1,
            mip_level_count: 1,
            sample_count: SampleCount::S1,
            format: TextureFormat::R8G8B8A8Unorm,
            usage: TextureUsages::COPY_SRC,
        };
        let origin = Origin3D {
            x: u32::MAX,
            ..Default::default()
        };
        assert!(matches!(
            texture_region(&info, 0, origin, Extent3D::new(1, 1, 1)),
            Err(GfxError::InvalidArgument(_))
        ));

        let view = TextureViewDescriptor {
            base_mip_level: 0,
            mip_level_count: Some(u32::MAX),
            ..Default::default()
        };
        assert!(texture_view(Handle::new(0, 0), &info, &view).is_err());
    }

    #[test]
    fn multi_row_copies_need_aligned_pitch() {
        let format = TextureFormat::R8G8B8A8Unorm;
        assert!(buffer_texture_layout(format, Extent3D::new(4, 1, 1), 0, 0).is_ok());
        assert!(buffer_texture_layout(format, Extent3D::new(4, 2, 1), 0, 0).is_err());
        assert!(buffer_texture_layout(format, Extent3D::new(4, 2, 1), 0, 256).is_ok());
        assert!(buffer_texture_layout(format, Extent3D::new(4, 1, 1), 2, 0).is_err());
        assert_eq!(gcd(4, 12), 4);
    }

    fn mipmapped() -> TextureInfo {
        TextureInfo::from(&TextureDescriptor {
            size: Extent3D::new(16, 16, 1),
            mip_level_count: 4,
            format: TextureFormat::R8G8B8A8Unorm,
            usage: TextureUsages::COPY_SRC | TextureUsages::COPY_DST | TextureUsages::TEXTURE_BINDING,
            ..Default::default()
        })
    }

    #[test]
    fn mipmap_generation_counts_written_levels() {
        let info = mipmapped();
        assert_eq!(generate_mipmaps(&info, 0, 0).unwrap(), 3);
        assert_eq!(generate_mipmaps(&info, 1, 0).unwrap(), 2);
        assert_eq!(generate_mipmaps(&info, 1, 2).unwrap(), 1);
        assert_eq!(generate_mipmaps(&info, 3, 1).unwrap(), 0);
        assert!(generate_mipmaps(&info, 4, 0).is_err());
        assert!(generate_mipmaps(&info, 2, 3).is_err());
        assert!(generate_mipmaps(&info, u32::MAX, 2).is_err());
    }

    #[test]
    fn mipmap_generation_rejects_unsuitable_textures() {
        let no_copy = TextureInfo {
            usage: TextureUsages::TEXTURE_BINDING,
            ..mipmapped()
        };
        assert!(generate_mipmaps(&no_copy, 0, 0).is_err());
        let depth = TextureInfo {
            format: TextureFormat::Depth32Float,
            ..mipmapped()
        };
        assert!(generate_mipmaps(&depth, 0, 0).is_err());
        let volume = TextureInfo {
            texture_type: TextureType::D3,
            ..mipmapped()
        };
        assert!(generate_mipmaps(&volume, 0, 0).is_err());
        let msaa = TextureInfo {
            sample_count: SampleCount::S4,
            ..mipmapped()
        };
        assert!(generate_mipmaps(&msaa, 0, 0).is_err());
    }

    #[test]
    fn query_rules() {
        let desc = QuerySetDescriptor {
            query_type: QueryType::Timestamp,
            count: 4,
            ..Default::default()
        };
        assert!(query_set_descriptor(&desc).is_ok());
        assert!(query_set_descriptor(&QuerySetDescriptor { count: 0, ..desc }).is_err());
        assert!(query_set_descriptor(&QuerySetDescriptor {
            count: MAX_QUERY_COUNT + 1,
            ..desc
        })
        .is_err());

        let set = QuerySetInfo::from(&desc);
        assert!(query_index(&set, 3, QueryType::Timestamp).is_ok());
        assert!(query_index(&set, 4, QueryType::Timestamp).is_err());
        assert!(query_index(&set, 0, QueryType::Occlusion).is_err());

        let dst = BufferInfo {
            size: 512,
            usage: BufferUsages::QUERY_RESOLVE | BufferUsages::COPY_SRC,
            memory_properties: MemoryProperties::DEVICE_LOCAL,
        };
        assert!(resolve_query_set(&set, &dst, 0, 4, 0).is_ok());
        assert!(resolve_query_set(&set, &dst, 0, 4, 256).is_ok());
        assert!(resolve_query_set(&set, &dst, 0, 4, 8).is_err());
        assert!(resolve_query_set(&set, &dst, 2, 3, 0).is_err());
        assert!(resolve_query_set(&set, &dst, 0, 0, 0).is_err());
        let small = BufferInfo { size: 16, ..dst };
        assert!(resolve_query_set(&set, &small, 0, 4, 0).is_err());
        let plain = BufferInfo {
            usage: BufferUsages::COPY_DST,
            ..dst
        };
        assert!(resolve_query_set(&set, &plain, 0, 1, 0).is_err());
    }
}
