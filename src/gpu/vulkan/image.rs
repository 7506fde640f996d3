use std::sync::Arc;

use ash::vk;
use vk_mem::Alloc;

use super::conversions::{aspect_mask, image_usage};
use super::{creation_error, Context, VkSampler, VkTexture, VkTextureView};
use crate::gpu::error::Result;
use crate::gpu::state::LayoutState;
use crate::gpu::structs::*;

impl Context {
    pub(super) fn make_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<VkTexture> {
        let format: vk::Format = desc.format.into();
        let (extent, layers) = match desc.texture_type {
            TextureType::D1 => (vk::Extent3D { width: desc.size.width, height: 1, depth: 1 }, desc.array_layer_count),
            TextureType::D2 | TextureType::Cube => (
                vk::Extent3D { width: desc.size.width, height: desc.size.height, depth: 1 },
                desc.array_layer_count,
            ),
            TextureType::D3 => (
                vk::Extent3D {
                    width: desc.size.width,
                    height: desc.size.height,
                    depth: desc.size.depth,
                },
                1,
            ),
        };
        let flags = if desc.texture_type == TextureType::Cube {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };

        let (raw, alloc) = unsafe {
            self.allocator.create_image(
                &vk::ImageCreateInfo::builder()
                    .flags(flags)
                    .image_type(desc.texture_type.into())
                    .format(format)
                    .extent(extent)
                    .mip_levels(desc.mip_level_count)
                    .array_layers(layers)
                    .samples(desc.sample_count.into())
                    .tiling(vk::ImageTiling::OPTIMAL)
                    .usage(image_usage(desc.usage, desc.format))
                    .sharing_mode(vk::SharingMode::EXCLUSIVE)
                    .initial_layout(vk::ImageLayout::UNDEFINED),
                &vk_mem::AllocationCreateInfo {
                    usage: vk_mem::MemoryUsage::Auto,
                    ..Default::default()
                },
            )
        }
        .map_err(creation_error)?;

        self.label(raw, desc.label, vk::ObjectType::IMAGE);
        let aspect = aspect_mask(desc.format);
        Ok(VkTexture {
            raw,
            alloc,
            format,
            aspect,
            full_range: vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: desc.mip_level_count,
                base_array_layer: 0,
                layer_count: layers,
            },
            layout: Arc::new(LayoutState::default()),
        })
    }

    pub(super) fn free_texture(&mut self, mut texture: VkTexture) {
        unsafe { self.allocator.destroy_image(texture.raw, &mut texture.alloc) };
    }

    pub(super) fn make_texture_view(
        &mut self,
        texture: &VkTexture,
        info: &TextureViewInfo,
        label: Option<&str>,
    ) -> Result<VkTextureView> {
        let range = vk::ImageSubresourceRange {
            aspect_mask: texture.aspect,
            base_mip_level: info.base_mip_level,
            level_count: info.mip_level_count,
            base_array_layer: info.base_array_layer,
            layer_count: info.array_layer_count,
        };
        let raw = unsafe {
            self.device.create_image_view(
                &vk::ImageViewCreateInfo::builder()
                    .image(texture.raw)
                    .view_type(info.view_type.into())
                    .format(info.format.into())
                    .subresource_range(range),
                None,
            )
        }
        .map_err(creation_error)?;
        self.label(raw, label, vk::ObjectType::IMAGE_VIEW);

        // Layouts are tracked for the whole image, so transitions made through
        // a view cover the texture's full range.
        Ok(VkTextureView {
            raw,
            image: texture.raw,
            format: info.format,
            full_range: texture.full_range,
            layout: texture.layout.clone(),
        })
    }

    pub(super) fn make_sampler(&mut self, desc: &SamplerDescriptor<'_>) -> Result<VkSampler> {
        let anisotropy = desc.max_anisotropy > 1
            && self.features.contains(DeviceFeatures::ANISOTROPIC_FILTERING);
        if desc.max_anisotropy > 1 && !anisotropy {
            log::warn!("anisotropic filtering was not enabled on this device, ignoring max_anisotropy");
        }
        let info = vk::SamplerCreateInfo::builder()
            .mag_filter(desc.mag_filter.into())
            .min_filter(desc.min_filter.into())
            .mipmap_mode(desc.mipmap_filter.into())
            .address_mode_u(desc.address_mode_u.into())
            .address_mode_v(desc.address_mode_v.into())
            .address_mode_w(desc.address_mode_w.into())
            .min_lod(desc.lod_min_clamp)
            .max_lod(desc.lod_max_clamp)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(f32::from(desc.max_anisotropy.max(1)))
            .compare_enable(desc.compare.is_some())
            .compare_op(desc.compare.unwrap_or_default().into())
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK);
        let raw = unsafe { self.device.create_sampler(&info, None) }.map_err(creation_error)?;
        self.label(raw, desc.label, vk::ObjectType::SAMPLER);
        Ok(VkSampler { raw })
    }
}
