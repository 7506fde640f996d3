use std::borrow::Cow;
use std::num::NonZeroU64;
use std::sync::mpsc;
use std::sync::Arc;

use super::conversions::{binding_type, texture_format, view_dimension};
use super::mipmaps;
use super::{
    creation_error, Context, WgpuBindGroup, WgpuBindGroupLayout, WgpuBuffer, WgpuQuerySet,
    WgpuSampler, WgpuShader, WgpuTexture, WgpuTextureView,
};
use crate::gpu::device::Pools;
use crate::gpu::error::{GfxError, Result};
use crate::gpu::state::{binding_layout, LayoutState};
use crate::gpu::structs::*;

impl Context {
    pub(super) fn make_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<WgpuBuffer> {
        let raw = self
            .checked(|device| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: desc.label,
                    size: desc.size,
                    usage: desc.usage.into(),
                    mapped_at_creation: false,
                })
            })
            .map_err(creation_error)?;
        Ok(WgpuBuffer { raw, mapped: None })
    }

    pub(super) fn free_buffer(&mut self, buffer: WgpuBuffer) {
        if buffer.mapped.is_some() {
            buffer.raw.unmap();
        }
        buffer.raw.destroy();
    }

    /// Blocks on the device until the mapping callback has fired.
    pub(super) fn map(&mut self, buffer: &mut WgpuBuffer, offset: u64, size: u64, mode: MapMode) -> Result<()> {
        let (sender, receiver) = mpsc::channel();
        buffer
            .raw
            .slice(offset..offset + size)
            .map_async(mode.into(), move |res| {
                sender.send(res).ok();
            });
        self.device.poll(wgpu::Maintain::Wait);

        match receiver.try_recv() {
            Ok(Ok(())) => {
                buffer.mapped = Some((offset, size));
                Ok(())
            }
            Ok(Err(err)) => Err(GfxError::Unknown(format!("buffer mapping failed: {err}"))),
            Err(_) => Err(GfxError::Unknown(
                "buffer mapping did not complete after waiting on the device".into(),
            )),
        }
    }

    fn mapped_window(buffer: &WgpuBuffer, offset: u64, len: usize) -> Result<(u64, u64, std::ops::Range<usize>)> {
        let (base, size) = buffer
            .mapped
            .ok_or_else(|| GfxError::invalid_state("buffer is not mapped"))?;
        let start = offset
            .checked_sub(base)
            .ok_or_else(|| GfxError::invalid_argument("access before the mapped range"))?;
        let end = start + len as u64;
        if end > size {
            return Err(GfxError::invalid_argument("access past the mapped range"));
        }
        Ok((base, size, start as usize..end as usize))
    }

    pub(super) fn read(&self, buffer: &WgpuBuffer, offset: u64, out: &mut [u8]) -> Result<()> {
        let (base, size, window) = Self::mapped_window(buffer, offset, out.len())?;
        let view = buffer.raw.slice(base..base + size).get_mapped_range();
        let src = view
            .get(window)
            .ok_or_else(|| GfxError::invalid_argument("access past the mapped range"))?;
        out.copy_from_slice(src);
        Ok(())
    }

    pub(super) fn write(&mut self, buffer: &WgpuBuffer, offset: u64, data: &[u8]) -> Result<()> {
        let (base, size, window) = Self::mapped_window(buffer, offset, data.len())?;
        let mut view = buffer.raw.slice(base..base + size).get_mapped_range_mut();
        let dst = view
            .get_mut(window)
            .ok_or_else(|| GfxError::invalid_argument("access past the mapped range"))?;
        dst.copy_from_slice(data);
        Ok(())
    }

    pub(super) fn unmap(&mut self, buffer: &mut WgpuBuffer) {
        if buffer.mapped.take().is_some() {
            buffer.raw.unmap();
        }
    }

    pub(super) fn make_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<WgpuTexture> {
        let format = texture_format(desc.format)?;
        let size = match desc.texture_type {
            TextureType::D1 => wgpu::Extent3d {
                width: desc.size.width,
                height: 1,
                depth_or_array_layers: desc.array_layer_count,
            },
            TextureType::D2 | TextureType::Cube => wgpu::Extent3d {
                width: desc.size.width,
                height: desc.size.height,
                depth_or_array_layers: desc.array_layer_count,
            },
            TextureType::D3 => wgpu::Extent3d {
                width: desc.size.width,
                height: desc.size.height,
                depth_or_array_layers: desc.size.depth,
            },
        };
        let allowed = self.adapter.get_texture_format_features(format).allowed_usages;
        let usage = wgpu::TextureUsages::from(desc.usage) | mipmaps::extra_usages(desc, allowed);
        let raw = self
            .checked(|device| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: desc.label,
                    size,
                    mip_level_count: desc.mip_level_count,
                    sample_count: desc.sample_count.as_u32(),
                    dimension: desc.texture_type.into(),
                    format,
                    usage,
                    view_formats: &[],
                })
            })
            .map_err(creation_error)?;
        Ok(WgpuTexture {
            raw,
            layout: Arc::new(LayoutState::default()),
        })
    }

    pub(super) fn make_query_set(&mut self, desc: &QuerySetDescriptor<'_>) -> Result<WgpuQuerySet> {
        let ty = match desc.query_type {
            QueryType::Occlusion => wgpu::QueryType::Occlusion,
            QueryType::Timestamp => {
                let needed = wgpu::Features::TIMESTAMP_QUERY
                    | wgpu::Features::TIMESTAMP_QUERY_INSIDE_ENCODERS;
                if !self.device.features().contains(needed) {
                    return Err(GfxError::FeatureNotSupported(
                        "timestamp queries inside command encoders".into(),
                    ));
                }
                wgpu::QueryType::Timestamp
            }
        };
        let raw = self
            .checked(|device| {
                device.create_query_set(&wgpu::QuerySetDescriptor {
                    label: desc.label,
                    ty,
                    count: desc.count,
                })
            })
            .map_err(creation_error)?;
        Ok(WgpuQuerySet { raw })
    }

    pub(super) fn make_texture_view(
        &mut self,
        texture: &WgpuTexture,
        info: &TextureViewInfo,
        label: Option<&str>,
    ) -> Result<WgpuTextureView> {
        let format = texture_format(info.format)?;
        let dimension = view_dimension(info.view_type)?;
        let raw = self
            .checked(|_| {
                texture.raw.create_view(&wgpu::TextureViewDescriptor {
                    label,
                    format: Some(format),
                    dimension: Some(dimension),
                    aspect: wgpu::TextureAspect::All,
                    base_mip_level: info.base_mip_level,
                    mip_level_count: Some(info.mip_level_count),
                    base_array_layer: info.base_array_layer,
                    array_layer_count: Some(info.array_layer_count),
                })
            })
            .map_err(creation_error)?;
        Ok(WgpuTextureView {
            raw: Some(raw),
            layout: texture.layout.clone(),
        })
    }

    pub(super) fn make_sampler(&mut self, desc: &SamplerDescriptor<'_>) -> Result<WgpuSampler> {
        let mut anisotropy = desc.max_anisotropy.max(1);
        if anisotropy > 1 && !self.features.contains(DeviceFeatures::ANISOTROPIC_FILTERING) {
            log::warn!("anisotropic filtering was not enabled on this device, ignoring max_anisotropy");
            anisotropy = 1;
        }
        let all_linear = [desc.mag_filter, desc.min_filter, desc.mipmap_filter]
            .iter()
            .all(|f| *f == FilterMode::Linear);
        if anisotropy > 1 && !all_linear {
            log::warn!("WebGPU only filters anisotropically with linear filters, ignoring max_anisotropy");
            anisotropy = 1;
        }
        let raw = self
            .checked(|device| {
                device.create_sampler(&wgpu::SamplerDescriptor {
                    label: desc.label,
                    address_mode_u: desc.address_mode_u.into(),
                    address_mode_v: desc.address_mode_v.into(),
                    address_mode_w: desc.address_mode_w.into(),
                    mag_filter: desc.mag_filter.into(),
                    min_filter: desc.min_filter.into(),
                    mipmap_filter: desc.mipmap_filter.into(),
                    lod_min_clamp: desc.lod_min_clamp,
                    lod_max_clamp: desc.lod_max_clamp,
                    compare: desc.compare.map(Into::into),
                    anisotropy_clamp: anisotropy,
                    border_color: None,
                })
            })
            .map_err(creation_error)?;
        Ok(WgpuSampler { raw })
    }

    pub(super) fn make_shader(&mut self, desc: &ShaderDescriptor<'_>) -> Result<WgpuShader> {
        let source = match desc.source {
            ShaderSource::Wgsl(code) => wgpu::ShaderSource::Wgsl(Cow::Borrowed(code)),
            ShaderSource::SpirV(words) => wgpu::ShaderSource::SpirV(Cow::Borrowed(words)),
        };
        let raw = self
            .checked(|device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: desc.label,
                    source,
                })
            })
            .map_err(creation_error)?;
        Ok(WgpuShader { raw })
    }

    pub(super) fn make_bind_group_layout(
        &mut self,
        desc: &BindGroupLayoutDescriptor<'_>,
    ) -> Result<WgpuBindGroupLayout> {
        let entries = desc
            .entries
            .iter()
            .map(|entry| {
                Ok(wgpu::BindGroupLayoutEntry {
                    binding: entry.binding,
                    visibility: entry.visibility.into(),
                    ty: binding_type(&entry.ty)?,
                    count: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let raw = self
            .checked(|device| {
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: desc.label,
                    entries: &entries,
                })
            })
            .map_err(creation_error)?;
        Ok(WgpuBindGroupLayout { raw })
    }

    pub(super) fn make_bind_group(
        &mut self,
        pools: &Pools<Self>,
        desc: &BindGroupDescriptor<'_>,
    ) -> Result<WgpuBindGroup> {
        let layout = pools.bind_group_layout(desc.layout)?;

        let mut entries = Vec::with_capacity(desc.entries.len());
        let mut images = Vec::new();
        for entry in desc.entries {
            let slot = layout
                .info
                .iter()
                .find(|e| e.binding == entry.binding)
                .ok_or_else(|| {
                    GfxError::invalid_argument(format!("binding {} is not in the layout", entry.binding))
                })?;
            let resource = match entry.resource {
                BindingResource::Buffer { buffer, offset, size } => {
                    wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &pools.buffer(buffer)?.native.raw,
                        offset,
                        size: NonZeroU64::new(size),
                    })
                }
                BindingResource::Sampler(sampler) => {
                    wgpu::BindingResource::Sampler(&pools.sampler(sampler)?.native.raw)
                }
                BindingResource::TextureView(view) => {
                    let view = pools.texture_view(view)?;
                    images.push((
                        view.native.layout.clone(),
                        binding_layout(&slot.ty, view.info.format),
                    ));
                    wgpu::BindingResource::TextureView(view.native.raw()?)
                }
            };
            entries.push(wgpu::BindGroupEntry {
                binding: entry.binding,
                resource,
            });
        }

        let raw = self
            .checked(|device| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: desc.label,
                    layout: &layout.native.raw,
                    entries: &entries,
                })
            })
            .map_err(creation_error)?;
        Ok(WgpuBindGroup { raw, images })
    }
}
