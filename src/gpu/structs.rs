use std::ffi::c_void;

use bitflags::bitflags;
#[cfg(feature = "gfx-serde")]
use serde::{Deserialize, Serialize};

use crate::utils::Handle;

macro_rules! object_kinds {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug)]
            pub enum $name {}
        )*
    };
}

object_kinds! {
    /// Marker for [`Handle<Buffer>`].
    Buffer,
    /// Marker for [`Handle<Texture>`].
    Texture,
    TextureView,
    Sampler,
    Shader,
    BindGroupLayout,
    BindGroup,
    RenderPass,
    Framebuffer,
    RenderPipeline,
    ComputePipeline,
    Fence,
    Semaphore,
    QuerySet,
    /// Marker for [`Handle<Swapchain>`]. Swapchain images are exposed as
    /// texture views owned by the swapchain.
    Swapchain,
}

//===----------------------------------------------------------------------===//
// Enumerations
//===----------------------------------------------------------------------===//

#[repr(i32)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum Backend {
    Vulkan = 0,
    WebGpu = 1,
    /// Vulkan when it loads, WebGPU otherwise.
    #[default]
    Auto = 2,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum AdapterType {
    DiscreteGpu,
    IntegratedGpu,
    VirtualGpu,
    Cpu,
    #[default]
    Unknown,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum AdapterPreference {
    #[default]
    Undefined,
    LowPower,
    HighPerformance,
    Software,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum PresentMode {
    Immediate,
    #[default]
    Fifo,
    FifoRelaxed,
    Mailbox,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
    FrontAndBack,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum IndexFormat {
    Uint16,
    #[default]
    Uint32,
}

impl IndexFormat {
    pub fn size(self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum VertexStepMode {
    #[default]
    Vertex,
    Instance,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    #[default]
    Float32x4,
    Uint32,
    Uint32x2,
    Uint32x3,
    Uint32x4,
    Sint32,
    Sint32x2,
    Sint32x3,
    Sint32x4,
    Unorm8x4,
}

impl VertexFormat {
    pub fn size(self) -> u64 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 | VertexFormat::Sint32 => 4,
            VertexFormat::Unorm8x4 => 4,
            VertexFormat::Float32x2 | VertexFormat::Uint32x2 | VertexFormat::Sint32x2 => 8,
            VertexFormat::Float32x3 | VertexFormat::Uint32x3 | VertexFormat::Sint32x3 => 12,
            VertexFormat::Float32x4 | VertexFormat::Uint32x4 | VertexFormat::Sint32x4 => 16,
        }
    }
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum TextureFormat {
    #[default]
    Undefined,
    R8Unorm,
    R8G8Unorm,
    R8G8B8A8Unorm,
    R8G8B8A8UnormSrgb,
    B8G8R8A8Unorm,
    B8G8R8A8UnormSrgb,
    R16Float,
    R16G16Float,
    R16G16B16A16Float,
    R32Float,
    R32G32Float,
    R32G32B32Float,
    R32G32B32A32Float,
    Depth16Unorm,
    Depth24Plus,
    Depth32Float,
    Stencil8,
    Depth24PlusStencil8,
    Depth32FloatStencil8,
}

impl TextureFormat {
    /// Size of one texel in bytes, 0 for `Undefined`.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Undefined => 0,
            TextureFormat::R8Unorm | TextureFormat::Stencil8 => 1,
            TextureFormat::R8G8Unorm | TextureFormat::R16Float | TextureFormat::Depth16Unorm => 2,
            TextureFormat::R8G8B8A8Unorm
            | TextureFormat::R8G8B8A8UnormSrgb
            | TextureFormat::B8G8R8A8Unorm
            | TextureFormat::B8G8R8A8UnormSrgb
            | TextureFormat::R16G16Float
            | TextureFormat::R32Float
            | TextureFormat::Depth24Plus
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8 => 4,
            TextureFormat::R16G16B16A16Float
            | TextureFormat::R32G32Float
            | TextureFormat::Depth32FloatStencil8 => 8,
            TextureFormat::R32G32B32Float => 12,
            TextureFormat::R32G32B32A32Float => 16,
        }
    }

    pub fn has_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth16Unorm
                | TextureFormat::Depth24Plus
                | TextureFormat::Depth32Float
                | TextureFormat::Depth24PlusStencil8
                | TextureFormat::Depth32FloatStencil8
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(
            self,
            TextureFormat::Stencil8
                | TextureFormat::Depth24PlusStencil8
                | TextureFormat::Depth32FloatStencil8
        )
    }

    pub fn is_depth_stencil(self) -> bool {
        self.has_depth() || self.has_stencil()
    }
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum TextureType {
    D1,
    #[default]
    D2,
    D3,
    Cube,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum TextureViewType {
    D1,
    #[default]
    D2,
    D3,
    Cube,
    D1Array,
    D2Array,
    CubeArray,
}

impl TextureViewType {
    /// View type used when a view descriptor leaves it unspecified.
    pub fn default_for(ty: TextureType, array_layers: u32) -> Self {
        match ty {
            TextureType::D1 if array_layers > 1 => TextureViewType::D1Array,
            TextureType::D1 => TextureViewType::D1,
            TextureType::D2 if array_layers > 1 => TextureViewType::D2Array,
            TextureType::D2 => TextureViewType::D2,
            TextureType::D3 => TextureViewType::D3,
            TextureType::Cube if array_layers > 6 => TextureViewType::CubeArray,
            TextureType::Cube => TextureViewType::Cube,
        }
    }
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum TextureSampleType {
    #[default]
    Float,
    UnfilterableFloat,
    Depth,
    Sint,
    Uint,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum TextureLayout {
    #[default]
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum AddressMode {
    #[default]
    Repeat,
    MirrorRepeat,
    ClampToEdge,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    #[default]
    Always,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum BlendOperation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum BlendFactor {
    Zero,
    #[default]
    One,
    Src,
    OneMinusSrc,
    SrcAlpha,
    OneMinusSrcAlpha,
    Dst,
    OneMinusDst,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturated,
    Constant,
    OneMinusConstant,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum StencilOperation {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

#[repr(u32)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum SampleCount {
    #[default]
    S1 = 1,
    S2 = 2,
    S4 = 4,
    S8 = 8,
    S16 = 16,
    S32 = 32,
    S64 = 64,
}

impl SampleCount {
    pub fn from_samples(samples: u32) -> Option<Self> {
        match samples {
            1 => Some(SampleCount::S1),
            2 => Some(SampleCount::S2),
            4 => Some(SampleCount::S4),
            8 => Some(SampleCount::S8),
            16 => Some(SampleCount::S16),
            32 => Some(SampleCount::S32),
            64 => Some(SampleCount::S64),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum ShaderSourceType {
    Wgsl,
    #[default]
    SpirV,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum LoadOp {
    Load,
    #[default]
    Clear,
    DontCare,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum StoreOp {
    #[default]
    Store,
    DontCare,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum BufferBindingType {
    #[default]
    Uniform,
    Storage,
    ReadOnlyStorage,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum StorageTextureAccess {
    #[default]
    WriteOnly,
    ReadOnly,
    ReadWrite,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum SemaphoreType {
    #[default]
    Binary,
    Timeline,
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum QueryType {
    /// Samples passing the depth and stencil tests between a begin/end pair.
    #[default]
    Occlusion,
    /// GPU clock ticks, written at a point in the command stream.
    Timestamp,
}

#[repr(C)]
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub enum MapMode {
    Read,
    Write,
}

/// Outcome of a wait that did not fail.
#[repr(C)]
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitStatus {
    Success,
    Timeout,
}

impl From<WaitStatus> for crate::ResultCode {
    fn from(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Success => crate::ResultCode::Success,
            WaitStatus::Timeout => crate::ResultCode::Timeout,
        }
    }
}

/// Outcome of a swapchain acquire that did not fail.
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireStatus {
    /// Index of the image now owned by the caller.
    Acquired(u32),
    /// No image became available within the timeout.
    Timeout,
    /// A zero timeout was given and no image was ready.
    NotReady,
}

impl AcquireStatus {
    pub fn image_index(self) -> Option<u32> {
        match self {
            AcquireStatus::Acquired(index) => Some(index),
            AcquireStatus::Timeout | AcquireStatus::NotReady => None,
        }
    }
}

impl From<AcquireStatus> for crate::ResultCode {
    fn from(status: AcquireStatus) -> Self {
        match status {
            AcquireStatus::Acquired(_) => crate::ResultCode::Success,
            AcquireStatus::Timeout => crate::ResultCode::Timeout,
            AcquireStatus::NotReady => crate::ResultCode::NotReady,
        }
    }
}

//===----------------------------------------------------------------------===//
// Flags
//===----------------------------------------------------------------------===//

bitflags! {
    #[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
    #[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
    pub struct BufferUsages: u32 {
        const MAP_READ = 1 << 0;
        const MAP_WRITE = 1 << 1;
        const COPY_SRC = 1 << 2;
        const COPY_DST = 1 << 3;
        const INDEX = 1 << 4;
        const VERTEX = 1 << 5;
        const UNIFORM = 1 << 6;
        const STORAGE = 1 << 7;
        const INDIRECT = 1 << 8;
        /// Destination of `resolve_query_set`.
        const QUERY_RESOLVE = 1 << 9;
    }
}

bitflags! {
    #[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
    #[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
    pub struct TextureUsages: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const TEXTURE_BINDING = 1 << 2;
        const STORAGE_BINDING = 1 << 3;
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

bitflags! {
    #[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
    #[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
    pub struct MemoryProperties: u32 {
        const DEVICE_LOCAL = 1 << 0;
        const HOST_VISIBLE = 1 << 1;
        const HOST_COHERENT = 1 << 2;
        const HOST_CACHED = 1 << 3;
    }
}

bitflags! {
    #[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
    #[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

bitflags! {
    #[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
    #[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 0x0000_0001;
        const DRAW_INDIRECT = 0x0000_0002;
        const VERTEX_INPUT = 0x0000_0004;
        const VERTEX_SHADER = 0x0000_0008;
        const TESSELLATION_CONTROL_SHADER = 0x0000_0010;
        const TESSELLATION_EVALUATION_SHADER = 0x0000_0020;
        const GEOMETRY_SHADER = 0x0000_0040;
        const FRAGMENT_SHADER = 0x0000_0080;
        const EARLY_FRAGMENT_TESTS = 0x0000_0100;
        const LATE_FRAGMENT_TESTS = 0x0000_0200;
        const COLOR_ATTACHMENT_OUTPUT = 0x0000_0400;
        const COMPUTE_SHADER = 0x0000_0800;
        const TRANSFER = 0x0000_1000;
        const BOTTOM_OF_PIPE = 0x0000_2000;
        const ALL_GRAPHICS = 0x0000_FFFF;
        const ALL_COMMANDS = 0x0001_0000;
    }
}

bitflags! {
    #[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
    #[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
    pub struct AccessFlags: u32 {
        const INDIRECT_COMMAND_READ = 1 << 0;
        const INDEX_READ = 1 << 1;
        const VERTEX_ATTRIBUTE_READ = 1 << 2;
        const UNIFORM_READ = 1 << 3;
        const INPUT_ATTACHMENT_READ = 1 << 4;
        const SHADER_READ = 1 << 5;
        const SHADER_WRITE = 1 << 6;
        const COLOR_ATTACHMENT_READ = 1 << 7;
        const COLOR_ATTACHMENT_WRITE = 1 << 8;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 9;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 10;
        const TRANSFER_READ = 1 << 11;
        const TRANSFER_WRITE = 1 << 12;
        const MEMORY_READ = 1 << 14;
        const MEMORY_WRITE = 1 << 15;
    }
}

bitflags! {
    #[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
    #[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
    pub struct ColorWrites: u32 {
        const RED = 0x1;
        const GREEN = 0x2;
        const BLUE = 0x4;
        const ALPHA = 0x8;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

impl Default for ColorWrites {
    fn default() -> Self {
        ColorWrites::ALL
    }
}

bitflags! {
    #[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
    #[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
    pub struct InstanceFeatures: u32 {
        /// Load the window-system integration needed by [`crate::Surface`].
        const SURFACE = 1 << 0;
        /// Enable validation / debug reporting routed into `log`.
        const DEBUG = 1 << 1;
    }
}

bitflags! {
    #[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
    #[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
    pub struct DeviceFeatures: u32 {
        const SWAPCHAIN = 1 << 0;
        const TIMELINE_SEMAPHORE = 1 << 1;
        const ANISOTROPIC_FILTERING = 1 << 2;
    }
}

//===----------------------------------------------------------------------===//
// Plain structures
//===----------------------------------------------------------------------===//

#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

#[repr(C)]
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct Extent3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Default for Extent3D {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth: 1,
        }
    }
}

impl Extent3D {
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Size of mip `level`, never smaller than one texel.
    pub fn mip_level(&self, level: u32) -> Self {
        Self {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
            depth: (self.depth >> level).max(1),
        }
    }
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct Origin3D {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[repr(C)]
#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

//===----------------------------------------------------------------------===//
// System descriptors
//===----------------------------------------------------------------------===//

#[derive(Clone, Debug)]
pub struct InstanceDescriptor<'a> {
    pub backend: Backend,
    pub application_name: &'a str,
    pub application_version: u32,
    /// Overridden to `true` when `GFX_VALIDATION=1` is set.
    pub enable_validation: bool,
    pub features: InstanceFeatures,
}

impl Default for InstanceDescriptor<'_> {
    fn default() -> Self {
        Self {
            backend: Backend::Auto,
            application_name: "gfx",
            application_version: crate::utils::make_version(1, 0, 0),
            enable_validation: false,
            features: InstanceFeatures::empty(),
        }
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdapterDescriptor {
    /// Pick this entry of [`crate::Instance::enumerate_adapters`]; `None`
    /// selects by `preference`.
    pub adapter_index: Option<u32>,
    pub preference: AdapterPreference,
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub driver_description: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub adapter_type: AdapterType,
    pub backend: Backend,
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceLimits {
    pub min_uniform_buffer_offset_alignment: u32,
    pub min_storage_buffer_offset_alignment: u32,
    pub max_uniform_buffer_binding_size: u32,
    pub max_storage_buffer_binding_size: u32,
    pub max_buffer_size: u64,
    pub max_texture_dimension_1d: u32,
    pub max_texture_dimension_2d: u32,
    pub max_texture_dimension_3d: u32,
    pub max_texture_array_layers: u32,
}

#[derive(Clone, Debug)]
pub struct DeviceDescriptor<'a> {
    pub label: Option<&'a str>,
    pub queue_priority: f32,
    pub features: DeviceFeatures,
}

impl Default for DeviceDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            queue_priority: 1.0,
            features: DeviceFeatures::empty(),
        }
    }
}

//===----------------------------------------------------------------------===//
// Resource descriptors
//===----------------------------------------------------------------------===//

#[derive(Default, Clone, Debug)]
pub struct BufferDescriptor<'a> {
    pub label: Option<&'a str>,
    pub size: u64,
    pub usage: BufferUsages,
    pub memory_properties: MemoryProperties,
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferInfo {
    pub size: u64,
    pub usage: BufferUsages,
    pub memory_properties: MemoryProperties,
}

/// Destination of [`crate::Queue::write_texture`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureWrite {
    pub texture: Handle<Texture>,
    pub mip_level: u32,
    pub origin: Origin3D,
    pub extent: Extent3D,
    /// Row pitch of the source data; 0 means tightly packed.
    pub bytes_per_row: u32,
    pub final_layout: TextureLayout,
}

#[derive(Clone, Debug)]
pub struct TextureDescriptor<'a> {
    pub label: Option<&'a str>,
    pub texture_type: TextureType,
    pub size: Extent3D,
    pub array_layer_count: u32,
    pub mip_level_count: u32,
    pub sample_count: SampleCount,
    pub format: TextureFormat,
    pub usage: TextureUsages,
}

impl Default for TextureDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            texture_type: TextureType::D2,
            size: Extent3D::default(),
            array_layer_count: 1,
            mip_level_count: 1,
            sample_count: SampleCount::S1,
            format: TextureFormat::R8G8B8A8Unorm,
            usage: TextureUsages::empty(),
        }
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureInfo {
    pub texture_type: TextureType,
    pub size: Extent3D,
    pub array_layer_count: u32,
    pub mip_level_count: u32,
    pub sample_count: SampleCount,
    pub format: TextureFormat,
    pub usage: TextureUsages,
}

impl From<&TextureDescriptor<'_>> for TextureInfo {
    fn from(desc: &TextureDescriptor<'_>) -> Self {
        Self {
            texture_type: desc.texture_type,
            size: desc.size,
            array_layer_count: desc.array_layer_count,
            mip_level_count: desc.mip_level_count,
            sample_count: desc.sample_count,
            format: desc.format,
            usage: desc.usage,
        }
    }
}

/// Unset fields inherit from the texture the view is created on.
#[derive(Default, Clone, Debug)]
pub struct TextureViewDescriptor<'a> {
    pub label: Option<&'a str>,
    pub view_type: Option<TextureViewType>,
    pub format: Option<TextureFormat>,
    pub base_mip_level: u32,
    pub mip_level_count: Option<u32>,
    pub base_array_layer: u32,
    pub array_layer_count: Option<u32>,
}

/// Fully resolved view metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureViewInfo {
    /// `None` for views owned by a swapchain.
    pub texture: Option<Handle<Texture>>,
    pub view_type: TextureViewType,
    pub format: TextureFormat,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
    /// Size of the view's base mip level.
    pub extent: Extent3D,
    pub sample_count: SampleCount,
}

#[derive(Clone, Debug)]
pub struct SamplerDescriptor<'a> {
    pub label: Option<&'a str>,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    pub compare: Option<CompareFunction>,
    pub max_anisotropy: u16,
}

impl Default for SamplerDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: None,
            max_anisotropy: 1,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ShaderSource<'a> {
    SpirV(&'a [u32]),
    Wgsl(&'a str),
}

impl ShaderSource<'_> {
    pub fn source_type(&self) -> ShaderSourceType {
        match self {
            ShaderSource::SpirV(_) => ShaderSourceType::SpirV,
            ShaderSource::Wgsl(_) => ShaderSourceType::Wgsl,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ShaderDescriptor<'a> {
    pub label: Option<&'a str>,
    pub source: ShaderSource<'a>,
    pub entry_point: &'a str,
}

impl Default for ShaderDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            source: ShaderSource::SpirV(&[]),
            entry_point: "main",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderInfo {
    pub source_type: ShaderSourceType,
    pub entry_point: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingType {
    Buffer {
        ty: BufferBindingType,
        has_dynamic_offset: bool,
        min_binding_size: u64,
    },
    Sampler {
        comparison: bool,
    },
    Texture {
        sample_type: TextureSampleType,
        view_dimension: TextureViewType,
        multisampled: bool,
    },
    StorageTexture {
        format: TextureFormat,
        view_dimension: TextureViewType,
        access: StorageTextureAccess,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStages,
    pub ty: BindingType,
}

#[derive(Default, Clone, Debug)]
pub struct BindGroupLayoutDescriptor<'a> {
    pub label: Option<&'a str>,
    pub entries: &'a [BindGroupLayoutEntry],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingResource {
    /// `size == 0` binds from `offset` to the end of the buffer.
    Buffer {
        buffer: Handle<Buffer>,
        offset: u64,
        size: u64,
    },
    Sampler(Handle<Sampler>),
    TextureView(Handle<TextureView>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindGroupEntry {
    pub binding: u32,
    pub resource: BindingResource,
}

#[derive(Clone, Debug)]
pub struct BindGroupDescriptor<'a> {
    pub label: Option<&'a str>,
    pub layout: Handle<BindGroupLayout>,
    pub entries: &'a [BindGroupEntry],
}

//===----------------------------------------------------------------------===//
// Render passes and framebuffers
//===----------------------------------------------------------------------===//

#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct LoadStoreOps {
    pub load: LoadOp,
    pub store: StoreOp,
}

#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct ColorAttachmentTarget {
    pub format: TextureFormat,
    pub sample_count: SampleCount,
    pub ops: LoadStoreOps,
    pub final_layout: TextureLayout,
}

#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct RenderPassColorAttachment {
    pub target: ColorAttachmentTarget,
    pub resolve_target: Option<ColorAttachmentTarget>,
}

#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct DepthStencilAttachmentTarget {
    pub format: TextureFormat,
    pub sample_count: SampleCount,
    pub depth_ops: LoadStoreOps,
    pub stencil_ops: LoadStoreOps,
    pub final_layout: TextureLayout,
}

#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct RenderPassDepthStencilAttachment {
    pub target: DepthStencilAttachmentTarget,
    pub resolve_target: Option<DepthStencilAttachmentTarget>,
}

#[derive(Default, Clone, Debug)]
pub struct RenderPassDescriptor<'a> {
    pub label: Option<&'a str>,
    pub color_attachments: &'a [RenderPassColorAttachment],
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
}

/// Owned copy of a [`RenderPassDescriptor`], kept for validation.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct RenderPassInfo {
    pub color_attachments: Vec<RenderPassColorAttachment>,
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramebufferAttachment {
    pub view: Handle<TextureView>,
    pub resolve_target: Option<Handle<TextureView>>,
}

#[derive(Clone, Debug)]
pub struct FramebufferDescriptor<'a> {
    pub label: Option<&'a str>,
    pub render_pass: Handle<RenderPass>,
    pub color_attachments: &'a [FramebufferAttachment],
    pub depth_stencil_attachment: Option<FramebufferAttachment>,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramebufferInfo {
    pub render_pass: Handle<RenderPass>,
    pub color_attachments: Vec<FramebufferAttachment>,
    pub depth_stencil_attachment: Option<FramebufferAttachment>,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug)]
pub struct RenderPassBeginInfo<'a> {
    pub label: Option<&'a str>,
    pub render_pass: Handle<RenderPass>,
    pub framebuffer: Handle<Framebuffer>,
    /// One per color attachment; used where the load op is `Clear`.
    pub color_clear_values: &'a [Color],
    pub depth_clear_value: f32,
    pub stencil_clear_value: u32,
}

//===----------------------------------------------------------------------===//
// Pipelines
//===----------------------------------------------------------------------===//

#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct BlendComponent {
    pub operation: BlendOperation,
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
}

#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct ColorTargetState {
    pub format: TextureFormat,
    pub blend: Option<BlendState>,
    pub write_mask: ColorWrites,
}

#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct VertexAttribute {
    pub format: VertexFormat,
    pub offset: u64,
    pub shader_location: u32,
}

#[derive(Default, Clone, Debug)]
pub struct VertexBufferLayout<'a> {
    pub array_stride: u64,
    pub attributes: &'a [VertexAttribute],
    pub step_mode: VertexStepMode,
}

#[derive(Clone, Debug)]
pub struct VertexState<'a> {
    pub module: Handle<Shader>,
    pub entry_point: &'a str,
    pub buffers: &'a [VertexBufferLayout<'a>],
}

#[derive(Clone, Debug)]
pub struct FragmentState<'a> {
    pub module: Handle<Shader>,
    pub entry_point: &'a str,
    pub targets: &'a [ColorTargetState],
}

#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct PrimitiveState {
    pub topology: PrimitiveTopology,
    pub strip_index_format: Option<IndexFormat>,
    pub front_face: FrontFace,
    pub cull_mode: CullMode,
    pub polygon_mode: PolygonMode,
}

#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "gfx-serde", derive(Serialize, Deserialize))]
pub struct DepthStencilState {
    pub format: TextureFormat,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
    pub stencil_front: StencilFaceState,
    pub stencil_back: StencilFaceState,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,
    pub depth_bias: i32,
    pub depth_bias_slope_scale: f32,
    pub depth_bias_clamp: f32,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            format: TextureFormat::Depth32Float,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil_front: StencilFaceState::default(),
            stencil_back: StencilFaceState::default(),
            stencil_read_mask: 0xff,
            stencil_write_mask: 0xff,
            depth_bias: 0,
            depth_bias_slope_scale: 0.0,
            depth_bias_clamp: 0.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RenderPipelineDescriptor<'a> {
    pub label: Option<&'a str>,
    pub render_pass: Handle<RenderPass>,
    pub vertex: VertexState<'a>,
    pub fragment: Option<FragmentState<'a>>,
    pub primitive: PrimitiveState,
    pub depth_stencil: Option<DepthStencilState>,
    pub sample_count: SampleCount,
    pub bind_group_layouts: &'a [Handle<BindGroupLayout>],
}

#[derive(Clone, Debug)]
pub struct ComputePipelineDescriptor<'a> {
    pub label: Option<&'a str>,
    pub compute: Handle<Shader>,
    pub entry_point: &'a str,
    pub bind_group_layouts: &'a [Handle<BindGroupLayout>],
}

/// Attachment formats a render pass or pipeline was built for. Two passes
/// with equal signatures are interchangeable.
#[derive(Default, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PassSignature {
    pub colors: Vec<(TextureFormat, SampleCount)>,
    pub depth_stencil: Option<(TextureFormat, SampleCount)>,
}

impl RenderPassInfo {
    pub fn signature(&self) -> PassSignature {
        PassSignature {
            colors: self
                .color_attachments
                .iter()
                .map(|c| (c.target.format, c.target.sample_count))
                .collect(),
            depth_stencil: self
                .depth_stencil_attachment
                .map(|d| (d.target.format, d.target.sample_count)),
        }
    }
}

/// Metadata kept for every pipeline, checked when draws and dispatches are
/// submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineInfo {
    pub bind_group_layouts: Vec<Handle<BindGroupLayout>>,
    /// `None` for compute pipelines.
    pub pass_signature: Option<PassSignature>,
    pub vertex_buffer_count: u32,
}

//===----------------------------------------------------------------------===//
// Synchronization
//===----------------------------------------------------------------------===//

#[derive(Default, Clone, Debug)]
pub struct FenceDescriptor<'a> {
    pub label: Option<&'a str>,
    pub signaled: bool,
}

#[derive(Default, Clone, Debug)]
pub struct SemaphoreDescriptor<'a> {
    pub label: Option<&'a str>,
    pub semaphore_type: SemaphoreType,
    /// Ignored for binary semaphores.
    pub initial_value: u64,
}

#[derive(Default, Clone, Debug)]
pub struct QuerySetDescriptor<'a> {
    pub label: Option<&'a str>,
    pub query_type: QueryType,
    /// Number of queries, at least 1.
    pub count: u32,
}

#[derive(Default, Hash, Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuerySetInfo {
    pub query_type: QueryType,
    pub count: u32,
}

impl From<&QuerySetDescriptor<'_>> for QuerySetInfo {
    fn from(desc: &QuerySetDescriptor<'_>) -> Self {
        Self {
            query_type: desc.query_type,
            count: desc.count,
        }
    }
}

/// Semaphore reference inside a submission. `value` is only read for
/// timeline semaphores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SemaphoreSubmit {
    pub semaphore: Handle<Semaphore>,
    pub value: u64,
}

impl From<Handle<Semaphore>> for SemaphoreSubmit {
    fn from(semaphore: Handle<Semaphore>) -> Self {
        Self {
            semaphore,
            value: 0,
        }
    }
}

//===----------------------------------------------------------------------===//
// Barriers and copies
//===----------------------------------------------------------------------===//

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryBarrier {
    pub src_stage: PipelineStages,
    pub dst_stage: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferBarrier {
    pub buffer: Handle<Buffer>,
    pub src_stage: PipelineStages,
    pub dst_stage: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub offset: u64,
    /// 0 covers the rest of the buffer.
    pub size: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureBarrier {
    pub texture: Handle<Texture>,
    pub old_layout: TextureLayout,
    pub new_layout: TextureLayout,
    pub src_stage: PipelineStages,
    pub dst_stage: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct PipelineBarrier<'a> {
    pub memory_barriers: &'a [MemoryBarrier],
    pub buffer_barriers: &'a [BufferBarrier],
    pub texture_barriers: &'a [TextureBarrier],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyBufferToBuffer {
    pub source: Handle<Buffer>,
    pub source_offset: u64,
    pub destination: Handle<Buffer>,
    pub destination_offset: u64,
    pub size: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyBufferToTexture {
    pub source: Handle<Buffer>,
    pub source_offset: u64,
    /// Row pitch of the source data; 0 means tightly packed.
    pub bytes_per_row: u32,
    pub destination: Handle<Texture>,
    pub origin: Origin3D,
    pub extent: Extent3D,
    pub mip_level: u32,
    pub final_layout: TextureLayout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyTextureToBuffer {
    pub source: Handle<Texture>,
    pub origin: Origin3D,
    pub mip_level: u32,
    pub destination: Handle<Buffer>,
    pub destination_offset: u64,
    /// Row pitch of the destination data; 0 means tightly packed.
    pub bytes_per_row: u32,
    pub extent: Extent3D,
    pub final_layout: TextureLayout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyTextureToTexture {
    pub source: Handle<Texture>,
    pub source_origin: Origin3D,
    pub source_mip_level: u32,
    pub source_final_layout: TextureLayout,
    pub destination: Handle<Texture>,
    pub destination_origin: Origin3D,
    pub destination_mip_level: u32,
    pub destination_final_layout: TextureLayout,
    pub extent: Extent3D,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlitTextureToTexture {
    pub source: Handle<Texture>,
    pub source_origin: Origin3D,
    pub source_extent: Extent3D,
    pub source_mip_level: u32,
    pub source_final_layout: TextureLayout,
    pub destination: Handle<Texture>,
    pub destination_origin: Origin3D,
    pub destination_extent: Extent3D,
    pub destination_mip_level: u32,
    pub destination_final_layout: TextureLayout,
    pub filter: FilterMode,
}

//===----------------------------------------------------------------------===//
// Presentation
//===----------------------------------------------------------------------===//

/// Native window identifiers. The pointers are never dereferenced by this
/// crate; they are handed to the backend's window-system integration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformWindowHandle {
    Xlib {
        display: *mut c_void,
        window: u64,
    },
    Xcb {
        connection: *mut c_void,
        window: u32,
    },
    Wayland {
        display: *mut c_void,
        surface: *mut c_void,
    },
    Win32 {
        hinstance: *mut c_void,
        hwnd: *mut c_void,
    },
    Metal {
        layer: *mut c_void,
    },
    Android {
        window: *mut c_void,
    },
}

impl PlatformWindowHandle {
    /// True when none of the required pointers/ids are null.
    pub fn is_complete(&self) -> bool {
        match *self {
            PlatformWindowHandle::Xlib { display, window } => !display.is_null() && window != 0,
            PlatformWindowHandle::Xcb { connection, window } => {
                !connection.is_null() && window != 0
            }
            PlatformWindowHandle::Wayland { display, surface } => {
                !display.is_null() && !surface.is_null()
            }
            PlatformWindowHandle::Win32 { hwnd, .. } => !hwnd.is_null(),
            PlatformWindowHandle::Metal { layer } => !layer.is_null(),
            PlatformWindowHandle::Android { window } => !window.is_null(),
        }
    }

    pub fn platform_name(&self) -> &'static str {
        match self {
            PlatformWindowHandle::Xlib { .. } => "Xlib",
            PlatformWindowHandle::Xcb { .. } => "XCB",
            PlatformWindowHandle::Wayland { .. } => "Wayland",
            PlatformWindowHandle::Win32 { .. } => "Win32",
            PlatformWindowHandle::Metal { .. } => "Metal",
            PlatformWindowHandle::Android { .. } => "Android",
        }
    }

    /// Whether the windowing system exists on the platform this crate was
    /// compiled for.
    pub fn is_native_to_host(&self) -> bool {
        match self {
            PlatformWindowHandle::Xlib { .. }
            | PlatformWindowHandle::Xcb { .. }
            | PlatformWindowHandle::Wayland { .. } => cfg!(all(
                unix,
                not(any(target_os = "macos", target_os = "ios", target_os = "android"))
            )),
            PlatformWindowHandle::Win32 { .. } => cfg!(windows),
            PlatformWindowHandle::Metal { .. } => {
                cfg!(any(target_os = "macos", target_os = "ios"))
            }
            PlatformWindowHandle::Android { .. } => cfg!(target_os = "android"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SurfaceDescriptor<'a> {
    pub label: Option<&'a str>,
    pub window: PlatformWindowHandle,
}

#[derive(Clone, Debug)]
pub struct SwapchainDescriptor<'a> {
    pub label: Option<&'a str>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsages,
    pub present_mode: PresentMode,
    pub image_count: u32,
}

impl Default for SwapchainDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            width: 0,
            height: 0,
            format: TextureFormat::B8G8R8A8Unorm,
            usage: TextureUsages::RENDER_ATTACHMENT,
            present_mode: PresentMode::Fifo,
            image_count: 3,
        }
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainInfo {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub image_count: u32,
    pub present_mode: PresentMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_discriminants_are_stable() {
        assert_eq!(Backend::Vulkan as i32, 0);
        assert_eq!(Backend::WebGpu as i32, 1);
        assert_eq!(Backend::Auto as i32, 2);
    }

    #[test]
    fn format_sizes() {
        assert_eq!(TextureFormat::R8Unorm.bytes_per_pixel(), 1);
        assert_eq!(TextureFormat::R8G8B8A8Unorm.bytes_per_pixel(), 4);
        assert_eq!(TextureFormat::R32G32B32A32Float.bytes_per_pixel(), 16);
        assert_eq!(TextureFormat::Undefined.bytes_per_pixel(), 0);
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(!TextureFormat::R32Float.is_depth_stencil());
    }

    #[test]
    fn mip_extent_never_reaches_zero() {
        let e = Extent3D::new(16, 4, 1);
        assert_eq!(e.mip_level(3), Extent3D::new(2, 1, 1));
        assert_eq!(e.mip_level(10), Extent3D::new(1, 1, 1));
    }

    #[test]
    fn default_view_types() {
        assert_eq!(
            TextureViewType::default_for(TextureType::D2, 1),
            TextureViewType::D2
        );
        assert_eq!(
            TextureViewType::default_for(TextureType::D2, 4),
            TextureViewType::D2Array
        );
        assert_eq!(
            TextureViewType::default_for(TextureType::Cube, 6),
            TextureViewType::Cube
        );
    }

    #[test]
    fn sample_counts() {
        assert_eq!(SampleCount::from_samples(4), Some(SampleCount::S4));
        assert_eq!(SampleCount::from_samples(3), None);
        assert_eq!(SampleCount::S8.as_u32(), 8);
    }

    #[test]
    fn null_window_handles_are_incomplete() {
        let handle = PlatformWindowHandle::Xlib {
            display: std::ptr::null_mut(),
            window: 7,
        };
        assert!(!handle.is_complete());
    }
}
