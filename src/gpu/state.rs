use std::sync::atomic::{AtomicU8, Ordering};

use super::structs::{BindingType, TextureFormat, TextureLayout};

/// Last known layout of a texture, updated while command lists are replayed.
///
/// Replay only holds shared references to the resource arenas, so the
/// layout lives in an atomic next to the native texture.
#[derive(Debug)]
pub struct LayoutState(AtomicU8);

const LAYOUTS: [TextureLayout; 9] = [
    TextureLayout::Undefined,
    TextureLayout::General,
    TextureLayout::ColorAttachment,
    TextureLayout::DepthStencilAttachment,
    TextureLayout::DepthStencilReadOnly,
    TextureLayout::ShaderReadOnly,
    TextureLayout::TransferSrc,
    TextureLayout::TransferDst,
    TextureLayout::PresentSrc,
];

impl Default for LayoutState {
    fn default() -> Self {
        Self::new(TextureLayout::Undefined)
    }
}

impl LayoutState {
    pub fn new(layout: TextureLayout) -> Self {
        Self(AtomicU8::new(layout as u8))
    }

    pub fn get(&self) -> TextureLayout {
        LAYOUTS
            .get(self.0.load(Ordering::Acquire) as usize)
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&self, layout: TextureLayout) {
        self.0.store(layout as u8, Ordering::Release);
    }

    /// Store `layout` and return the previous one.
    pub fn replace(&self, layout: TextureLayout) -> TextureLayout {
        let old = self.0.swap(layout as u8, Ordering::AcqRel);
        LAYOUTS.get(old as usize).copied().unwrap_or_default()
    }
}

/// Layout a texture is expected in while bound through `ty`.
pub fn binding_layout(ty: &BindingType, format: TextureFormat) -> TextureLayout {
    match ty {
        BindingType::StorageTexture { .. } => TextureLayout::General,
        _ if format.is_depth_stencil() => TextureLayout::DepthStencilReadOnly,
        _ => TextureLayout::ShaderReadOnly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::structs::{StorageTextureAccess, TextureSampleType, TextureViewType};

    #[test]
    fn table_matches_discriminants() {
        for (i, layout) in LAYOUTS.iter().enumerate() {
            assert_eq!(*layout as usize, i);
        }
    }

    #[test]
    fn replace_returns_previous() {
        let state = LayoutState::default();
        assert_eq!(state.get(), TextureLayout::Undefined);
        assert_eq!(
            state.replace(TextureLayout::TransferDst),
            TextureLayout::Undefined
        );
        state.set(TextureLayout::ShaderReadOnly);
        assert_eq!(state.get(), TextureLayout::ShaderReadOnly);
    }

    #[test]
    fn storage_textures_bind_in_general_layout() {
        let storage = BindingType::StorageTexture {
            format: TextureFormat::R32Float,
            view_dimension: TextureViewType::D2,
            access: StorageTextureAccess::ReadWrite,
        };
        assert_eq!(binding_layout(&storage, TextureFormat::R32Float), TextureLayout::General);
        let sampled = BindingType::Texture {
            sample_type: TextureSampleType::Depth,
            view_dimension: TextureViewType::D2,
            multisampled: false,
        };
        assert_eq!(
            binding_layout(&sampled, TextureFormat::Depth32Float),
            TextureLayout::DepthStencilReadOnly
        );
    }
}
