use std::collections::HashMap;

use ash::vk;

use super::conversions::descriptor_type;
use super::{creation_error, BoundImage, Context, VkBindGroup, VkBindGroupLayout};
use crate::gpu::device::Pools;
use crate::gpu::error::{GfxError, Result};
use crate::gpu::state::binding_layout;
use crate::gpu::structs::*;

enum DescriptorInfo {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

impl Context {
    pub(super) fn make_bind_group_layout(
        &mut self,
        desc: &BindGroupLayoutDescriptor<'_>,
    ) -> Result<VkBindGroupLayout> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
            .entries
            .iter()
            .map(|entry| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(entry.binding)
                    .descriptor_type(descriptor_type(&entry.ty))
                    .descriptor_count(1)
                    .stage_flags(entry.visibility.into())
                    .build()
            })
            .collect();
        let raw = unsafe {
            self.device.create_descriptor_set_layout(
                &vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings),
                None,
            )
        }
        .map_err(creation_error)?;
        self.label(raw, desc.label, vk::ObjectType::DESCRIPTOR_SET_LAYOUT);
        Ok(VkBindGroupLayout {
            raw,
            entries: desc.entries.to_vec(),
        })
    }

    /// Every bind group owns a pool sized exactly for its layout, so freeing
    /// the group is a single pool destruction.
    pub(super) fn make_bind_group(
        &mut self,
        pools: &Pools<Self>,
        desc: &BindGroupDescriptor<'_>,
    ) -> Result<VkBindGroup> {
        let layout = &pools.bind_group_layout(desc.layout)?.native;

        let mut counts: HashMap<vk::DescriptorType, u32> = HashMap::new();
        for entry in &layout.entries {
            *counts.entry(descriptor_type(&entry.ty)).or_default() += 1;
        }
        let mut sizes: Vec<vk::DescriptorPoolSize> = counts
            .into_iter()
            .map(|(ty, descriptor_count)| vk::DescriptorPoolSize { ty, descriptor_count })
            .collect();
        // Pools may not be created empty.
        if sizes.is_empty() {
            sizes.push(vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLER,
                descriptor_count: 1,
            });
        }

        // Resolve every resource before allocating anything.
        let mut infos = Vec::with_capacity(desc.entries.len());
        let mut images = Vec::new();
        for entry in desc.entries {
            let slot = layout
                .entries
                .iter()
                .find(|e| e.binding == entry.binding)
                .ok_or_else(|| {
                    GfxError::invalid_argument(format!("binding {} is not in the layout", entry.binding))
                })?;
            let info = match entry.resource {
                BindingResource::Buffer { buffer, offset, size } => {
                    DescriptorInfo::Buffer(vk::DescriptorBufferInfo {
                        buffer: pools.buffer(buffer)?.native.raw,
                        offset,
                        range: if size == 0 { vk::WHOLE_SIZE } else { size },
                    })
                }
                BindingResource::Sampler(sampler) => DescriptorInfo::Image(vk::DescriptorImageInfo {
                    sampler: pools.sampler(sampler)?.native.raw,
                    ..Default::default()
                }),
                BindingResource::TextureView(view) => {
                    let view = pools.texture_view(view)?;
                    let layout = binding_layout(&slot.ty, view.info.format);
                    images.push(BoundImage {
                        image: view.native.image,
                        full_range: view.native.full_range,
                        state: view.native.layout.clone(),
                        layout,
                    });
                    DescriptorInfo::Image(vk::DescriptorImageInfo {
                        image_view: view.native.raw,
                        image_layout: layout.into(),
                        ..Default::default()
                    })
                }
            };
            infos.push((entry.binding, descriptor_type(&slot.ty), info));
        }

        let pool = unsafe {
            self.device.create_descriptor_pool(
                &vk::DescriptorPoolCreateInfo::builder()
                    .max_sets(1)
                    .pool_sizes(&sizes),
                None,
            )
        }
        .map_err(creation_error)?;

        let set = match unsafe {
            self.device.allocate_descriptor_sets(
                &vk::DescriptorSetAllocateInfo::builder()
                    .descriptor_pool(pool)
                    .set_layouts(&[layout.raw]),
            )
        } {
            Ok(sets) if !sets.is_empty() => sets[0],
            Ok(_) => {
                unsafe { self.device.destroy_descriptor_pool(pool, None) };
                return Err(GfxError::ResourceCreation("no descriptor set allocated".into()));
            }
            Err(err) => {
                unsafe { self.device.destroy_descriptor_pool(pool, None) };
                return Err(creation_error(err));
            }
        };

        let writes: Vec<vk::WriteDescriptorSet> = infos
            .iter()
            .map(|(binding, ty, info)| {
                let write = vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(*ty);
                match info {
                    DescriptorInfo::Buffer(b) => write.buffer_info(std::slice::from_ref(b)).build(),
                    DescriptorInfo::Image(i) => write.image_info(std::slice::from_ref(i)).build(),
                }
            })
            .collect();
        unsafe { self.device.update_descriptor_sets(&writes, &[]) };

        self.label(set, desc.label, vk::ObjectType::DESCRIPTOR_SET);
        Ok(VkBindGroup { pool, set, images })
    }
}
