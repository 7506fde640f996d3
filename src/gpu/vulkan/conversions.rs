use ash::vk;

use crate::gpu::structs::*;

impl From<FilterMode> for vk::Filter {
    fn from(filter: FilterMode) -> Self {
        match filter {
            FilterMode::Nearest => vk::Filter::NEAREST,
            FilterMode::Linear => vk::Filter::LINEAR,
        }
    }
}

impl From<FilterMode> for vk::SamplerMipmapMode {
    fn from(filter: FilterMode) -> Self {
        match filter {
            FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
            FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
        }
    }
}

impl From<AddressMode> for vk::SamplerAddressMode {
    fn from(mode: AddressMode) -> Self {
        match mode {
            AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
            AddressMode::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
            AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        }
    }
}

impl From<CompareFunction> for vk::CompareOp {
    fn from(func: CompareFunction) -> Self {
        match func {
            CompareFunction::Never => vk::CompareOp::NEVER,
            CompareFunction::Less => vk::CompareOp::LESS,
            CompareFunction::Equal => vk::CompareOp::EQUAL,
            CompareFunction::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
            CompareFunction::Greater => vk::CompareOp::GREATER,
            CompareFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
            CompareFunction::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
            CompareFunction::Always => vk::CompareOp::ALWAYS,
        }
    }
}

impl From<BlendFactor> for vk::BlendFactor {
    fn from(factor: BlendFactor) -> Self {
        match factor {
            BlendFactor::Zero => vk::BlendFactor::ZERO,
            BlendFactor::One => vk::BlendFactor::ONE,
            BlendFactor::Src => vk::BlendFactor::SRC_COLOR,
            BlendFactor::OneMinusSrc => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
            BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
            BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            BlendFactor::Dst => vk::BlendFactor::DST_COLOR,
            BlendFactor::OneMinusDst => vk::BlendFactor::ONE_MINUS_DST_COLOR,
            BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
            BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
            BlendFactor::SrcAlphaSaturated => vk::BlendFactor::SRC_ALPHA_SATURATE,
            BlendFactor::Constant => vk::BlendFactor::CONSTANT_COLOR,
            BlendFactor::OneMinusConstant => vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
        }
    }
}

impl From<BlendOperation> for vk::BlendOp {
    fn from(op: BlendOperation) -> Self {
        match op {
            BlendOperation::Add => vk::BlendOp::ADD,
            BlendOperation::Subtract => vk::BlendOp::SUBTRACT,
            BlendOperation::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
            BlendOperation::Min => vk::BlendOp::MIN,
            BlendOperation::Max => vk::BlendOp::MAX,
        }
    }
}

impl From<ColorWrites> for vk::ColorComponentFlags {
    fn from(writes: ColorWrites) -> Self {
        let mut flags = vk::ColorComponentFlags::empty();
        if writes.contains(ColorWrites::RED) {
            flags |= vk::ColorComponentFlags::R;
        }
        if writes.contains(ColorWrites::GREEN) {
            flags |= vk::ColorComponentFlags::G;
        }
        if writes.contains(ColorWrites::BLUE) {
            flags |= vk::ColorComponentFlags::B;
        }
        if writes.contains(ColorWrites::ALPHA) {
            flags |= vk::ColorComponentFlags::A;
        }
        flags
    }
}

impl From<ColorTargetState> for vk::PipelineColorBlendAttachmentState {
    fn from(state: ColorTargetState) -> Self {
        let blend = state.blend.unwrap_or_default();
        vk::PipelineColorBlendAttachmentState::builder()
            .blend_enable(state.blend.is_some())
            .color_write_mask(state.write_mask.into())
            .src_color_blend_factor(blend.color.src_factor.into())
            .dst_color_blend_factor(blend.color.dst_factor.into())
            .color_blend_op(blend.color.operation.into())
            .src_alpha_blend_factor(blend.alpha.src_factor.into())
            .dst_alpha_blend_factor(blend.alpha.dst_factor.into())
            .alpha_blend_op(blend.alpha.operation.into())
            .build()
    }
}

impl From<StencilOperation> for vk::StencilOp {
    fn from(op: StencilOperation) -> Self {
        match op {
            StencilOperation::Keep => vk::StencilOp::KEEP,
            StencilOperation::Zero => vk::StencilOp::ZERO,
            StencilOperation::Replace => vk::StencilOp::REPLACE,
            StencilOperation::IncrementClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
            StencilOperation::DecrementClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
            StencilOperation::Invert => vk::StencilOp::INVERT,
            StencilOperation::IncrementWrap => vk::StencilOp::INCREMENT_AND_WRAP,
            StencilOperation::DecrementWrap => vk::StencilOp::DECREMENT_AND_WRAP,
        }
    }
}

pub(super) fn stencil_op_state(face: &StencilFaceState, read: u32, write: u32) -> vk::StencilOpState {
    vk::StencilOpState {
        fail_op: face.fail_op.into(),
        pass_op: face.pass_op.into(),
        depth_fail_op: face.depth_fail_op.into(),
        compare_op: face.compare.into(),
        compare_mask: read,
        write_mask: write,
        reference: 0,
    }
}

impl From<PrimitiveTopology> for vk::PrimitiveTopology {
    fn from(topology: PrimitiveTopology) -> Self {
        match topology {
            PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
            PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
            PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
            PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
            PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        }
    }
}

impl From<CullMode> for vk::CullModeFlags {
    fn from(mode: CullMode) -> Self {
        match mode {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
            CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
        }
    }
}

impl From<FrontFace> for vk::FrontFace {
    fn from(face: FrontFace) -> Self {
        match face {
            FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
            FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        }
    }
}

impl From<PolygonMode> for vk::PolygonMode {
    fn from(mode: PolygonMode) -> Self {
        match mode {
            PolygonMode::Fill => vk::PolygonMode::FILL,
            PolygonMode::Line => vk::PolygonMode::LINE,
            PolygonMode::Point => vk::PolygonMode::POINT,
        }
    }
}

impl From<IndexFormat> for vk::IndexType {
    fn from(format: IndexFormat) -> Self {
        match format {
            IndexFormat::Uint16 => vk::IndexType::UINT16,
            IndexFormat::Uint32 => vk::IndexType::UINT32,
        }
    }
}

impl From<VertexStepMode> for vk::VertexInputRate {
    fn from(mode: VertexStepMode) -> Self {
        match mode {
            VertexStepMode::Vertex => vk::VertexInputRate::VERTEX,
            VertexStepMode::Instance => vk::VertexInputRate::INSTANCE,
        }
    }
}

impl From<VertexFormat> for vk::Format {
    fn from(format: VertexFormat) -> Self {
        match format {
            VertexFormat::Float32 => vk::Format::R32_SFLOAT,
            VertexFormat::Float32x2 => vk::Format::R32G32_SFLOAT,
            VertexFormat::Float32x3 => vk::Format::R32G32B32_SFLOAT,
            VertexFormat::Float32x4 => vk::Format::R32G32B32A32_SFLOAT,
            VertexFormat::Uint32 => vk::Format::R32_UINT,
            VertexFormat::Uint32x2 => vk::Format::R32G32_UINT,
            VertexFormat::Uint32x3 => vk::Format::R32G32B32_UINT,
            VertexFormat::Uint32x4 => vk::Format::R32G32B32A32_UINT,
            VertexFormat::Sint32 => vk::Format::R32_SINT,
            VertexFormat::Sint32x2 => vk::Format::R32G32_SINT,
            VertexFormat::Sint32x3 => vk::Format::R32G32B32_SINT,
            VertexFormat::Sint32x4 => vk::Format::R32G32B32A32_SINT,
            VertexFormat::Unorm8x4 => vk::Format::R8G8B8A8_UNORM,
        }
    }
}

impl From<TextureFormat> for vk::Format {
    fn from(format: TextureFormat) -> Self {
        match format {
            TextureFormat::Undefined => vk::Format::UNDEFINED,
            TextureFormat::R8Unorm => vk::Format::R8_UNORM,
            TextureFormat::R8G8Unorm => vk::Format::R8G8_UNORM,
            TextureFormat::R8G8B8A8Unorm => vk::Format::R8G8B8A8_UNORM,
            TextureFormat::R8G8B8A8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
            TextureFormat::B8G8R8A8Unorm => vk::Format::B8G8R8A8_UNORM,
            TextureFormat::B8G8R8A8UnormSrgb => vk::Format::B8G8R8A8_SRGB,
            TextureFormat::R16Float => vk::Format::R16_SFLOAT,
            TextureFormat::R16G16Float => vk::Format::R16G16_SFLOAT,
            TextureFormat::R16G16B16A16Float => vk::Format::R16G16B16A16_SFLOAT,
            TextureFormat::R32Float => vk::Format::R32_SFLOAT,
            TextureFormat::R32G32Float => vk::Format::R32G32_SFLOAT,
            TextureFormat::R32G32B32Float => vk::Format::R32G32B32_SFLOAT,
            TextureFormat::R32G32B32A32Float => vk::Format::R32G32B32A32_SFLOAT,
            TextureFormat::Depth16Unorm => vk::Format::D16_UNORM,
            TextureFormat::Depth24Plus => vk::Format::X8_D24_UNORM_PACK32,
            TextureFormat::Depth32Float => vk::Format::D32_SFLOAT,
            TextureFormat::Stencil8 => vk::Format::S8_UINT,
            TextureFormat::Depth24PlusStencil8 => vk::Format::D24_UNORM_S8_UINT,
            TextureFormat::Depth32FloatStencil8 => vk::Format::D32_SFLOAT_S8_UINT,
        }
    }
}

/// Inverse of the [`TextureFormat`] mapping, for surface format queries.
pub(super) fn texture_format_from_vk(format: vk::Format) -> Option<TextureFormat> {
    Some(match format {
        vk::Format::R8_UNORM => TextureFormat::R8Unorm,
        vk::Format::R8G8_UNORM => TextureFormat::R8G8Unorm,
        vk::Format::R8G8B8A8_UNORM => TextureFormat::R8G8B8A8Unorm,
        vk::Format::R8G8B8A8_SRGB => TextureFormat::R8G8B8A8UnormSrgb,
        vk::Format::B8G8R8A8_UNORM => TextureFormat::B8G8R8A8Unorm,
        vk::Format::B8G8R8A8_SRGB => TextureFormat::B8G8R8A8UnormSrgb,
        vk::Format::R16G16B16A16_SFLOAT => TextureFormat::R16G16B16A16Float,
        vk::Format::R32G32B32A32_SFLOAT => TextureFormat::R32G32B32A32Float,
        _ => return None,
    })
}

pub(super) fn aspect_mask(format: TextureFormat) -> vk::ImageAspectFlags {
    let mut aspect = vk::ImageAspectFlags::empty();
    if format.has_depth() {
        aspect |= vk::ImageAspectFlags::DEPTH;
    }
    if format.has_stencil() {
        aspect |= vk::ImageAspectFlags::STENCIL;
    }
    if aspect.is_empty() {
        vk::ImageAspectFlags::COLOR
    } else {
        aspect
    }
}

impl From<SampleCount> for vk::SampleCountFlags {
    fn from(count: SampleCount) -> Self {
        match count {
            SampleCount::S1 => vk::SampleCountFlags::TYPE_1,
            SampleCount::S2 => vk::SampleCountFlags::TYPE_2,
            SampleCount::S4 => vk::SampleCountFlags::TYPE_4,
            SampleCount::S8 => vk::SampleCountFlags::TYPE_8,
            SampleCount::S16 => vk::SampleCountFlags::TYPE_16,
            SampleCount::S32 => vk::SampleCountFlags::TYPE_32,
            SampleCount::S64 => vk::SampleCountFlags::TYPE_64,
        }
    }
}

impl From<TextureType> for vk::ImageType {
    fn from(ty: TextureType) -> Self {
        match ty {
            TextureType::D1 => vk::ImageType::TYPE_1D,
            TextureType::D2 | TextureType::Cube => vk::ImageType::TYPE_2D,
            TextureType::D3 => vk::ImageType::TYPE_3D,
        }
    }
}

impl From<TextureViewType> for vk::ImageViewType {
    fn from(ty: TextureViewType) -> Self {
        match ty {
            TextureViewType::D1 => vk::ImageViewType::TYPE_1D,
            TextureViewType::D2 => vk::ImageViewType::TYPE_2D,
            TextureViewType::D3 => vk::ImageViewType::TYPE_3D,
            TextureViewType::Cube => vk::ImageViewType::CUBE,
            TextureViewType::D1Array => vk::ImageViewType::TYPE_1D_ARRAY,
            TextureViewType::D2Array => vk::ImageViewType::TYPE_2D_ARRAY,
            TextureViewType::CubeArray => vk::ImageViewType::CUBE_ARRAY,
        }
    }
}

/// `Undefined` is only meaningful as a source layout.
impl From<TextureLayout> for vk::ImageLayout {
    fn from(layout: TextureLayout) -> Self {
        match layout {
            TextureLayout::Undefined => vk::ImageLayout::UNDEFINED,
            TextureLayout::General => vk::ImageLayout::GENERAL,
            TextureLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            TextureLayout::DepthStencilAttachment => {
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
            }
            TextureLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            TextureLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            TextureLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            TextureLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            TextureLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }
}

impl From<LoadOp> for vk::AttachmentLoadOp {
    fn from(op: LoadOp) -> Self {
        match op {
            LoadOp::Load => vk::AttachmentLoadOp::LOAD,
            LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
            LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
        }
    }
}

impl From<StoreOp> for vk::AttachmentStoreOp {
    fn from(op: StoreOp) -> Self {
        match op {
            StoreOp::Store => vk::AttachmentStoreOp::STORE,
            StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
        }
    }
}

impl From<BufferUsages> for vk::BufferUsageFlags {
    fn from(usage: BufferUsages) -> Self {
        let mut flags = vk::BufferUsageFlags::empty();
        if usage.intersects(BufferUsages::COPY_SRC | BufferUsages::MAP_WRITE) {
            flags |= vk::BufferUsageFlags::TRANSFER_SRC;
        }
        if usage.intersects(BufferUsages::COPY_DST | BufferUsages::MAP_READ | BufferUsages::QUERY_RESOLVE) {
            flags |= vk::BufferUsageFlags::TRANSFER_DST;
        }
        if usage.contains(BufferUsages::INDEX) {
            flags |= vk::BufferUsageFlags::INDEX_BUFFER;
        }
        if usage.contains(BufferUsages::VERTEX) {
            flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
        }
        if usage.contains(BufferUsages::UNIFORM) {
            flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
        }
        if usage.contains(BufferUsages::STORAGE) {
            flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
        }
        if usage.contains(BufferUsages::INDIRECT) {
            flags |= vk::BufferUsageFlags::INDIRECT_BUFFER;
        }
        flags
    }
}

pub(super) fn image_usage(usage: TextureUsages, format: TextureFormat) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(TextureUsages::COPY_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsages::COPY_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(TextureUsages::TEXTURE_BINDING) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsages::STORAGE_BINDING) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsages::RENDER_ATTACHMENT) {
        flags |= if format.is_depth_stencil() {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        } else {
            vk::ImageUsageFlags::COLOR_ATTACHMENT
        };
    }
    flags
}

impl From<MemoryProperties> for vk::MemoryPropertyFlags {
    fn from(props: MemoryProperties) -> Self {
        let mut flags = vk::MemoryPropertyFlags::empty();
        if props.contains(MemoryProperties::DEVICE_LOCAL) {
            flags |= vk::MemoryPropertyFlags::DEVICE_LOCAL;
        }
        if props.contains(MemoryProperties::HOST_VISIBLE) {
            flags |= vk::MemoryPropertyFlags::HOST_VISIBLE;
        }
        if props.contains(MemoryProperties::HOST_COHERENT) {
            flags |= vk::MemoryPropertyFlags::HOST_COHERENT;
        }
        if props.contains(MemoryProperties::HOST_CACHED) {
            flags |= vk::MemoryPropertyFlags::HOST_CACHED;
        }
        flags
    }
}

impl From<ShaderStages> for vk::ShaderStageFlags {
    fn from(stages: ShaderStages) -> Self {
        let mut flags = vk::ShaderStageFlags::empty();
        if stages.contains(ShaderStages::VERTEX) {
            flags |= vk::ShaderStageFlags::VERTEX;
        }
        if stages.contains(ShaderStages::FRAGMENT) {
            flags |= vk::ShaderStageFlags::FRAGMENT;
        }
        if stages.contains(ShaderStages::COMPUTE) {
            flags |= vk::ShaderStageFlags::COMPUTE;
        }
        flags
    }
}

// The stage and access bit values are the Vulkan ones.
impl From<PipelineStages> for vk::PipelineStageFlags {
    fn from(stages: PipelineStages) -> Self {
        if stages.is_empty() {
            return vk::PipelineStageFlags::ALL_COMMANDS;
        }
        vk::PipelineStageFlags::from_raw(stages.bits())
    }
}

impl From<AccessFlags> for vk::AccessFlags {
    fn from(access: AccessFlags) -> Self {
        vk::AccessFlags::from_raw(access.bits())
    }
}

pub(super) fn descriptor_type(ty: &BindingType) -> vk::DescriptorType {
    match *ty {
        BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset,
            ..
        } => {
            if has_dynamic_offset {
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
            } else {
                vk::DescriptorType::UNIFORM_BUFFER
            }
        }
        BindingType::Buffer {
            has_dynamic_offset, ..
        } => {
            if has_dynamic_offset {
                vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
            } else {
                vk::DescriptorType::STORAGE_BUFFER
            }
        }
        BindingType::Sampler { .. } => vk::DescriptorType::SAMPLER,
        BindingType::Texture { .. } => vk::DescriptorType::SAMPLED_IMAGE,
        BindingType::StorageTexture { .. } => vk::DescriptorType::STORAGE_IMAGE,
    }
}

/// Aspect used for buffer/image copies, which may only name one aspect.
pub(super) fn copy_aspect(format: TextureFormat) -> vk::ImageAspectFlags {
    if format.has_depth() {
        vk::ImageAspectFlags::DEPTH
    } else if format.has_stencil() {
        vk::ImageAspectFlags::STENCIL
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

impl From<PresentMode> for vk::PresentModeKHR {
    fn from(mode: PresentMode) -> Self {
        match mode {
            PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
            PresentMode::Fifo => vk::PresentModeKHR::FIFO,
            PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
            PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        }
    }
}

pub(super) fn present_mode_from_vk(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        _ => None,
    }
}

pub(super) fn adapter_type_from_vk(ty: vk::PhysicalDeviceType) -> AdapterType {
    match ty {
        vk::PhysicalDeviceType::DISCRETE_GPU => AdapterType::DiscreteGpu,
        vk::PhysicalDeviceType::INTEGRATED_GPU => AdapterType::IntegratedGpu,
        vk::PhysicalDeviceType::VIRTUAL_GPU => AdapterType::VirtualGpu,
        vk::PhysicalDeviceType::CPU => AdapterType::Cpu,
        _ => AdapterType::Unknown,
    }
}

/// Access mask that covers every read/write an image may see in `layout`.
pub(super) fn layout_access(layout: vk::ImageLayout) -> vk::AccessFlags {
    match layout {
        vk::ImageLayout::UNDEFINED | vk::ImageLayout::PRESENT_SRC_KHR => vk::AccessFlags::empty(),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => vk::AccessFlags::TRANSFER_READ,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => vk::AccessFlags::TRANSFER_WRITE,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => {
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        }
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => {
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
        }
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
        | vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => vk::AccessFlags::SHADER_READ,
        _ => vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
    }
}

pub(super) fn clear_color(color: Color) -> vk::ClearValue {
    vk::ClearValue {
        color: vk::ClearColorValue {
            float32: [color.r, color.g, color.b, color.a],
        },
    }
}

pub(super) fn offset3d(origin: Origin3D) -> vk::Offset3D {
    vk::Offset3D {
        x: origin.x as i32,
        y: origin.y as i32,
        z: origin.z as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_bits_match_vulkan() {
        let stages = PipelineStages::TRANSFER | PipelineStages::COMPUTE_SHADER;
        assert_eq!(
            vk::PipelineStageFlags::from(stages),
            vk::PipelineStageFlags::TRANSFER | vk::PipelineStageFlags::COMPUTE_SHADER
        );
        assert_eq!(
            vk::AccessFlags::from(AccessFlags::SHADER_WRITE | AccessFlags::MEMORY_READ),
            vk::AccessFlags::SHADER_WRITE | vk::AccessFlags::MEMORY_READ
        );
    }

    #[test]
    fn depth_formats_use_depth_aspect() {
        assert_eq!(aspect_mask(TextureFormat::R8G8B8A8Unorm), vk::ImageAspectFlags::COLOR);
        assert_eq!(
            aspect_mask(TextureFormat::Depth24PlusStencil8),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            image_usage(TextureUsages::RENDER_ATTACHMENT, TextureFormat::Depth32Float),
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        );
    }

    #[test]
    fn surface_formats_round_trip() {
        for format in [TextureFormat::B8G8R8A8Unorm, TextureFormat::R8G8B8A8UnormSrgb] {
            assert_eq!(texture_format_from_vk(format.into()), Some(format));
        }
    }

    #[test]
    fn dynamic_buffers_get_dynamic_descriptors() {
        let ty = BindingType::Buffer {
            ty: BufferBindingType::Storage,
            has_dynamic_offset: true,
            min_binding_size: 0,
        };
        assert_eq!(descriptor_type(&ty), vk::DescriptorType::STORAGE_BUFFER_DYNAMIC);
    }

    #[test]
    fn combined_depth_stencil_copies_name_depth() {
        assert_eq!(copy_aspect(TextureFormat::Depth24PlusStencil8), vk::ImageAspectFlags::DEPTH);
        assert_eq!(copy_aspect(TextureFormat::Stencil8), vk::ImageAspectFlags::STENCIL);
    }
}
