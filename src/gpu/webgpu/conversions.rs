use std::num::NonZeroU64;

use crate::gpu::error::{GfxError, Result};
use crate::gpu::structs::*;

pub(super) fn texture_format(format: TextureFormat) -> Result<wgpu::TextureFormat> {
    Ok(match format {
        TextureFormat::Undefined => {
            return Err(GfxError::invalid_argument("texture format is undefined"))
        }
        TextureFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
        TextureFormat::R8G8Unorm => wgpu::TextureFormat::Rg8Unorm,
        TextureFormat::R8G8B8A8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::R8G8B8A8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::B8G8R8A8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        TextureFormat::B8G8R8A8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        TextureFormat::R16Float => wgpu::TextureFormat::R16Float,
        TextureFormat::R16G16Float => wgpu::TextureFormat::Rg16Float,
        TextureFormat::R16G16B16A16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        TextureFormat::R32G32Float => wgpu::TextureFormat::Rg32Float,
        TextureFormat::R32G32B32Float => {
            return Err(GfxError::FeatureNotSupported(
                "three-channel texture formats are not available on WebGPU".into(),
            ))
        }
        TextureFormat::R32G32B32A32Float => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::Depth16Unorm => wgpu::TextureFormat::Depth16Unorm,
        TextureFormat::Depth24Plus => wgpu::TextureFormat::Depth24Plus,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        TextureFormat::Stencil8 => wgpu::TextureFormat::Stencil8,
        TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        TextureFormat::Depth32FloatStencil8 => wgpu::TextureFormat::Depth32FloatStencil8,
    })
}

pub(super) fn texture_format_from_wgpu(format: wgpu::TextureFormat) -> Option<TextureFormat> {
    Some(match format {
        wgpu::TextureFormat::R8Unorm => TextureFormat::R8Unorm,
        wgpu::TextureFormat::Rg8Unorm => TextureFormat::R8G8Unorm,
        wgpu::TextureFormat::Rgba8Unorm => TextureFormat::R8G8B8A8Unorm,
        wgpu::TextureFormat::Rgba8UnormSrgb => TextureFormat::R8G8B8A8UnormSrgb,
        wgpu::TextureFormat::Bgra8Unorm => TextureFormat::B8G8R8A8Unorm,
        wgpu::TextureFormat::Bgra8UnormSrgb => TextureFormat::B8G8R8A8UnormSrgb,
        wgpu::TextureFormat::R16Float => TextureFormat::R16Float,
        wgpu::TextureFormat::Rg16Float => TextureFormat::R16G16Float,
        wgpu::TextureFormat::Rgba16Float => TextureFormat::R16G16B16A16Float,
        wgpu::TextureFormat::R32Float => TextureFormat::R32Float,
        wgpu::TextureFormat::Rg32Float => TextureFormat::R32G32Float,
        wgpu::TextureFormat::Rgba32Float => TextureFormat::R32G32B32A32Float,
        _ => return None,
    })
}

/// Copies of combined depth-stencil textures may only name one aspect.
pub(super) fn copy_aspect(format: TextureFormat) -> wgpu::TextureAspect {
    if format.has_depth() && format.has_stencil() {
        wgpu::TextureAspect::DepthOnly
    } else {
        wgpu::TextureAspect::All
    }
}

const BUFFER_USAGES: [(BufferUsages, wgpu::BufferUsages); 10] = [
    (BufferUsages::MAP_READ, wgpu::BufferUsages::MAP_READ),
    (BufferUsages::MAP_WRITE, wgpu::BufferUsages::MAP_WRITE),
    (BufferUsages::COPY_SRC, wgpu::BufferUsages::COPY_SRC),
    (BufferUsages::COPY_DST, wgpu::BufferUsages::COPY_DST),
    (BufferUsages::INDEX, wgpu::BufferUsages::INDEX),
    (BufferUsages::VERTEX, wgpu::BufferUsages::VERTEX),
    (BufferUsages::UNIFORM, wgpu::BufferUsages::UNIFORM),
    (BufferUsages::STORAGE, wgpu::BufferUsages::STORAGE),
    (BufferUsages::INDIRECT, wgpu::BufferUsages::INDIRECT),
    (BufferUsages::QUERY_RESOLVE, wgpu::BufferUsages::QUERY_RESOLVE),
];

impl From<BufferUsages> for wgpu::BufferUsages {
    fn from(usage: BufferUsages) -> Self {
        BUFFER_USAGES
            .iter()
            .filter(|(ours, _)| usage.contains(*ours))
            .fold(wgpu::BufferUsages::empty(), |acc, (_, theirs)| acc | *theirs)
    }
}

const TEXTURE_USAGES: [(TextureUsages, wgpu::TextureUsages); 5] = [
    (TextureUsages::COPY_SRC, wgpu::TextureUsages::COPY_SRC),
    (TextureUsages::COPY_DST, wgpu::TextureUsages::COPY_DST),
    (TextureUsages::TEXTURE_BINDING, wgpu::TextureUsages::TEXTURE_BINDING),
    (TextureUsages::STORAGE_BINDING, wgpu::TextureUsages::STORAGE_BINDING),
    (TextureUsages::RENDER_ATTACHMENT, wgpu::TextureUsages::RENDER_ATTACHMENT),
];

impl From<TextureUsages> for wgpu::TextureUsages {
    fn from(usage: TextureUsages) -> Self {
        TEXTURE_USAGES
            .iter()
            .filter(|(ours, _)| usage.contains(*ours))
            .fold(wgpu::TextureUsages::empty(), |acc, (_, theirs)| acc | *theirs)
    }
}

impl From<ShaderStages> for wgpu::ShaderStages {
    fn from(stages: ShaderStages) -> Self {
        let mut out = wgpu::ShaderStages::NONE;
        if stages.contains(ShaderStages::VERTEX) {
            out |= wgpu::ShaderStages::VERTEX;
        }
        if stages.contains(ShaderStages::FRAGMENT) {
            out |= wgpu::ShaderStages::FRAGMENT;
        }
        if stages.contains(ShaderStages::COMPUTE) {
            out |= wgpu::ShaderStages::COMPUTE;
        }
        out
    }
}

impl From<TextureType> for wgpu::TextureDimension {
    fn from(ty: TextureType) -> Self {
        match ty {
            TextureType::D1 => wgpu::TextureDimension::D1,
            TextureType::D2 | TextureType::Cube => wgpu::TextureDimension::D2,
            TextureType::D3 => wgpu::TextureDimension::D3,
        }
    }
}

pub(super) fn view_dimension(ty: TextureViewType) -> Result<wgpu::TextureViewDimension> {
    Ok(match ty {
        TextureViewType::D1 => wgpu::TextureViewDimension::D1,
        TextureViewType::D2 => wgpu::TextureViewDimension::D2,
        TextureViewType::D3 => wgpu::TextureViewDimension::D3,
        TextureViewType::Cube => wgpu::TextureViewDimension::Cube,
        TextureViewType::D2Array => wgpu::TextureViewDimension::D2Array,
        TextureViewType::CubeArray => wgpu::TextureViewDimension::CubeArray,
        TextureViewType::D1Array => {
            return Err(GfxError::FeatureNotSupported(
                "1D array views are not available on WebGPU".into(),
            ))
        }
    })
}

impl From<FilterMode> for wgpu::FilterMode {
    fn from(filter: FilterMode) -> Self {
        match filter {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl From<AddressMode> for wgpu::AddressMode {
    fn from(mode: AddressMode) -> Self {
        match mode {
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
            AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        }
    }
}

impl From<CompareFunction> for wgpu::CompareFunction {
    fn from(func: CompareFunction) -> Self {
        match func {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
            CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

impl From<BlendFactor> for wgpu::BlendFactor {
    fn from(factor: BlendFactor) -> Self {
        match factor {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::Src => wgpu::BlendFactor::Src,
            BlendFactor::OneMinusSrc => wgpu::BlendFactor::OneMinusSrc,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFactor::Dst => wgpu::BlendFactor::Dst,
            BlendFactor::OneMinusDst => wgpu::BlendFactor::OneMinusDst,
            BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
            BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
            BlendFactor::SrcAlphaSaturated => wgpu::BlendFactor::SrcAlphaSaturated,
            BlendFactor::Constant => wgpu::BlendFactor::Constant,
            BlendFactor::OneMinusConstant => wgpu::BlendFactor::OneMinusConstant,
        }
    }
}

impl From<BlendOperation> for wgpu::BlendOperation {
    fn from(op: BlendOperation) -> Self {
        match op {
            BlendOperation::Add => wgpu::BlendOperation::Add,
            BlendOperation::Subtract => wgpu::BlendOperation::Subtract,
            BlendOperation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
            BlendOperation::Min => wgpu::BlendOperation::Min,
            BlendOperation::Max => wgpu::BlendOperation::Max,
        }
    }
}

impl From<BlendComponent> for wgpu::BlendComponent {
    fn from(c: BlendComponent) -> Self {
        wgpu::BlendComponent {
            src_factor: c.src_factor.into(),
            dst_factor: c.dst_factor.into(),
            operation: c.operation.into(),
        }
    }
}

impl From<ColorWrites> for wgpu::ColorWrites {
    fn from(mask: ColorWrites) -> Self {
        // Same bit assignment on both sides.
        wgpu::ColorWrites::from_bits_truncate(mask.bits())
    }
}

impl From<StencilOperation> for wgpu::StencilOperation {
    fn from(op: StencilOperation) -> Self {
        match op {
            StencilOperation::Keep => wgpu::StencilOperation::Keep,
            StencilOperation::Zero => wgpu::StencilOperation::Zero,
            StencilOperation::Replace => wgpu::StencilOperation::Replace,
            StencilOperation::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
            StencilOperation::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
            StencilOperation::Invert => wgpu::StencilOperation::Invert,
            StencilOperation::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
            StencilOperation::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
        }
    }
}

impl From<&StencilFaceState> for wgpu::StencilFaceState {
    fn from(face: &StencilFaceState) -> Self {
        wgpu::StencilFaceState {
            compare: face.compare.into(),
            fail_op: face.fail_op.into(),
            depth_fail_op: face.depth_fail_op.into(),
            pass_op: face.pass_op.into(),
        }
    }
}

impl From<PrimitiveTopology> for wgpu::PrimitiveTopology {
    fn from(topology: PrimitiveTopology) -> Self {
        match topology {
            PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
            PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
            PrimitiveTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }
}

impl From<FrontFace> for wgpu::FrontFace {
    fn from(face: FrontFace) -> Self {
        match face {
            FrontFace::CounterClockwise => wgpu::FrontFace::Ccw,
            FrontFace::Clockwise => wgpu::FrontFace::Cw,
        }
    }
}

impl From<PolygonMode> for wgpu::PolygonMode {
    fn from(mode: PolygonMode) -> Self {
        match mode {
            PolygonMode::Fill => wgpu::PolygonMode::Fill,
            PolygonMode::Line => wgpu::PolygonMode::Line,
            PolygonMode::Point => wgpu::PolygonMode::Point,
        }
    }
}

impl From<IndexFormat> for wgpu::IndexFormat {
    fn from(format: IndexFormat) -> Self {
        match format {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }
}

impl From<VertexStepMode> for wgpu::VertexStepMode {
    fn from(mode: VertexStepMode) -> Self {
        match mode {
            VertexStepMode::Vertex => wgpu::VertexStepMode::Vertex,
            VertexStepMode::Instance => wgpu::VertexStepMode::Instance,
        }
    }
}

impl From<VertexFormat> for wgpu::VertexFormat {
    fn from(format: VertexFormat) -> Self {
        match format {
            VertexFormat::Float32 => wgpu::VertexFormat::Float32,
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
            VertexFormat::Uint32 => wgpu::VertexFormat::Uint32,
            VertexFormat::Uint32x2 => wgpu::VertexFormat::Uint32x2,
            VertexFormat::Uint32x3 => wgpu::VertexFormat::Uint32x3,
            VertexFormat::Uint32x4 => wgpu::VertexFormat::Uint32x4,
            VertexFormat::Sint32 => wgpu::VertexFormat::Sint32,
            VertexFormat::Sint32x2 => wgpu::VertexFormat::Sint32x2,
            VertexFormat::Sint32x3 => wgpu::VertexFormat::Sint32x3,
            VertexFormat::Sint32x4 => wgpu::VertexFormat::Sint32x4,
            VertexFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
        }
    }
}

impl From<StoreOp> for wgpu::StoreOp {
    fn from(op: StoreOp) -> Self {
        match op {
            StoreOp::Store => wgpu::StoreOp::Store,
            StoreOp::DontCare => wgpu::StoreOp::Discard,
        }
    }
}

impl From<MapMode> for wgpu::MapMode {
    fn from(mode: MapMode) -> Self {
        match mode {
            MapMode::Read => wgpu::MapMode::Read,
            MapMode::Write => wgpu::MapMode::Write,
        }
    }
}

impl From<PresentMode> for wgpu::PresentMode {
    fn from(mode: PresentMode) -> Self {
        match mode {
            PresentMode::Immediate => wgpu::PresentMode::Immediate,
            PresentMode::Fifo => wgpu::PresentMode::Fifo,
            PresentMode::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentMode::Mailbox => wgpu::PresentMode::Mailbox,
        }
    }
}

pub(super) fn present_mode_from_wgpu(mode: wgpu::PresentMode) -> Option<PresentMode> {
    match mode {
        wgpu::PresentMode::Immediate => Some(PresentMode::Immediate),
        wgpu::PresentMode::Fifo => Some(PresentMode::Fifo),
        wgpu::PresentMode::FifoRelaxed => Some(PresentMode::FifoRelaxed),
        wgpu::PresentMode::Mailbox => Some(PresentMode::Mailbox),
        _ => None,
    }
}

pub(super) fn adapter_type_from_wgpu(ty: wgpu::DeviceType) -> AdapterType {
    match ty {
        wgpu::DeviceType::DiscreteGpu => AdapterType::DiscreteGpu,
        wgpu::DeviceType::IntegratedGpu => AdapterType::IntegratedGpu,
        wgpu::DeviceType::VirtualGpu => AdapterType::VirtualGpu,
        wgpu::DeviceType::Cpu => AdapterType::Cpu,
        wgpu::DeviceType::Other => AdapterType::Unknown,
    }
}

pub(super) fn limits_from_wgpu(limits: &wgpu::Limits) -> DeviceLimits {
    DeviceLimits {
        min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment,
        min_storage_buffer_offset_alignment: limits.min_storage_buffer_offset_alignment,
        max_uniform_buffer_binding_size: limits.max_uniform_buffer_binding_size,
        max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size,
        max_buffer_size: limits.max_buffer_size,
        max_texture_dimension_1d: limits.max_texture_dimension_1d,
        max_texture_dimension_2d: limits.max_texture_dimension_2d,
        max_texture_dimension_3d: limits.max_texture_dimension_3d,
        max_texture_array_layers: limits.max_texture_array_layers,
    }
}

pub(super) fn binding_type(ty: &BindingType) -> Result<wgpu::BindingType> {
    Ok(match *ty {
        BindingType::Buffer {
            ty,
            has_dynamic_offset,
            min_binding_size,
        } => wgpu::BindingType::Buffer {
            ty: match ty {
                BufferBindingType::Uniform => wgpu::BufferBindingType::Uniform,
                BufferBindingType::Storage => wgpu::BufferBindingType::Storage { read_only: false },
                BufferBindingType::ReadOnlyStorage => {
                    wgpu::BufferBindingType::Storage { read_only: true }
                }
            },
            has_dynamic_offset,
            min_binding_size: NonZeroU64::new(min_binding_size),
        },
        BindingType::Sampler { comparison } => wgpu::BindingType::Sampler(if comparison {
            wgpu::SamplerBindingType::Comparison
        } else {
            wgpu::SamplerBindingType::Filtering
        }),
        BindingType::Texture {
            sample_type,
            view_dimension: dimension,
            multisampled,
        } => wgpu::BindingType::Texture {
            sample_type: match sample_type {
                TextureSampleType::Float => wgpu::TextureSampleType::Float { filterable: true },
                TextureSampleType::UnfilterableFloat => {
                    wgpu::TextureSampleType::Float { filterable: false }
                }
                TextureSampleType::Depth => wgpu::TextureSampleType::Depth,
                TextureSampleType::Sint => wgpu::TextureSampleType::Sint,
                TextureSampleType::Uint => wgpu::TextureSampleType::Uint,
            },
            view_dimension: view_dimension(dimension)?,
            multisampled,
        },
        BindingType::StorageTexture {
            format,
            view_dimension: dimension,
            access,
        } => wgpu::BindingType::StorageTexture {
            access: match access {
                StorageTextureAccess::WriteOnly => wgpu::StorageTextureAccess::WriteOnly,
                StorageTextureAccess::ReadOnly => wgpu::StorageTextureAccess::ReadOnly,
                StorageTextureAccess::ReadWrite => wgpu::StorageTextureAccess::ReadWrite,
            },
            format: texture_format(format)?,
            view_dimension: view_dimension(dimension)?,
        },
    })
}

pub(super) fn color(c: Color) -> wgpu::Color {
    wgpu::Color {
        r: f64::from(c.r),
        g: f64::from(c.g),
        b: f64::from(c.b),
        a: f64::from(c.a),
    }
}

pub(super) fn origin(o: Origin3D) -> wgpu::Origin3d {
    wgpu::Origin3d {
        x: o.x,
        y: o.y,
        z: o.z,
    }
}

pub(super) fn extent(e: Extent3D) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: e.width,
        height: e.height,
        depth_or_array_layers: e.depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usages_map_bit_for_bit() {
        let usage = BufferUsages::MAP_READ | BufferUsages::COPY_DST;
        assert_eq!(
            wgpu::BufferUsages::from(usage),
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST
        );
        assert_eq!(
            wgpu::TextureUsages::from(TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC),
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC
        );
        assert_eq!(wgpu::ColorWrites::from(ColorWrites::ALL), wgpu::ColorWrites::ALL);
    }

    #[test]
    fn formats_without_a_wgpu_equivalent_are_rejected() {
        assert!(matches!(
            texture_format(TextureFormat::Undefined),
            Err(GfxError::InvalidArgument(_))
        ));
        assert!(matches!(
            texture_format(TextureFormat::R32G32B32Float),
            Err(GfxError::FeatureNotSupported(_))
        ));
        assert!(view_dimension(TextureViewType::D1Array).is_err());
    }

    #[test]
    fn color_formats_round_trip() {
        for format in [
            TextureFormat::B8G8R8A8Unorm,
            TextureFormat::R8G8B8A8UnormSrgb,
            TextureFormat::R16G16B16A16Float,
        ] {
            let native = texture_format(format).unwrap();
            assert_eq!(texture_format_from_wgpu(native), Some(format));
        }
    }

    #[test]
    fn combined_depth_stencil_copies_use_the_depth_aspect() {
        assert_eq!(
            copy_aspect(TextureFormat::Depth24PlusStencil8),
            wgpu::TextureAspect::DepthOnly
        );
        assert_eq!(copy_aspect(TextureFormat::R8Unorm), wgpu::TextureAspect::All);
    }
}
