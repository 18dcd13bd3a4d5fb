//! Pipeline family / graphics pipeline description (spec.md §3.2, §4.4).

use serde::{Deserialize, Serialize};

use crate::{ParameterSetLayoutHandle, PassHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    TriangleList,
    TriangleStrip,
    LineList,
    LineStrip,
    PointList,
}

/// Vector/matrix class of a vertex attribute (spec.md §4.4.1 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeClass {
    Vec1,
    Vec2,
    Vec3,
    Vec4,
    Mat3x3,
    Mat4x4,
}

impl AttributeClass {
    /// Number of underlying scalar components, used to size attribute
    /// buffers (a `Mat3x3` consumes three `Vec3`-sized locations etc.).
    pub fn component_count(self) -> u32 {
        match self {
            Self::Vec1 => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
            Self::Mat3x3 => 3,
            Self::Mat4x4 => 4,
        }
    }

    pub fn location_count(self) -> u32 {
        match self {
            Self::Mat3x3 => 3,
            Self::Mat4x4 => 4,
            _ => 1,
        }
    }
}

/// Per-component item format (spec.md §4.4.1 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemFormat {
    Float16,
    Float32,
    Unorm8,
    Unorm16,
    Snorm8,
    Snorm16,
    Uint8,
    Uint16,
    Uint32,
    Sint8,
    Sint16,
    Sint32,
}

impl ItemFormat {
    pub fn byte_size(self) -> u32 {
        match self {
            Self::Float16 | Self::Unorm16 | Self::Snorm16 | Self::Uint16 | Self::Sint16 => 2,
            Self::Float32 | Self::Uint32 | Self::Sint32 => 4,
            Self::Unorm8 | Self::Snorm8 | Self::Uint8 | Self::Sint8 => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexAttribute {
    pub location: u32,
    pub class: AttributeClass,
    pub item_format: ItemFormat,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexAttributeSource {
    pub binding: u32,
    pub stride: u32,
    pub per_instance: bool,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolygonMode {
    Fill,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CullMode {
    None,
    Back,
    Front,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RasterizerState {
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
}

/// 1:1 with the source's `kan_render_compare_operation_t` (spec.md
/// §4.4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOperation {
    Never,
    Always,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StencilOpState {
    pub fail: StencilOperation,
    pub pass: StencilOperation,
    pub depth_fail: StencilOperation,
    pub compare: CompareOperation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOperation,
    pub stencil_test: bool,
    pub front: StencilOpState,
    pub back: StencilOpState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendFactor {
    Zero,
    One,
    SourceColor,
    OneMinusSourceColor,
    DestColor,
    OneMinusDestColor,
    SourceAlpha,
    OneMinusSourceAlpha,
    DestAlpha,
    OneMinusDestAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SourceAlphaSaturate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ColorOutputSetup {
    pub blend_enabled: bool,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOperation,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOperation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePriority {
    Cache,
    Active,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderStageEntryPoint {
    pub stage: ShaderStage,
    pub function_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// The three set layouts shared by every pipeline in a family (spec.md
/// §3.2 "Pipeline family"). Any may be absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineFamilySetLayouts {
    pub set_material: Option<ParameterSetLayoutHandle>,
    pub set_object: Option<ParameterSetLayoutHandle>,
    pub set_shared: Option<ParameterSetLayoutHandle>,
}

/// A fully assembled graphics pipeline description (spec.md §3.2).
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc {
    pub pass: PassHandle,
    pub topology: Topology,
    pub vertex_attribute_sources: Vec<VertexAttributeSource>,
    pub push_constant_size: u32,
    /// `[pass, material, object, shared]`, any may be absent.
    pub set_layouts: [Option<ParameterSetLayoutHandle>; 4],
    pub rasterizer: RasterizerState,
    pub depth_stencil: DepthStencilState,
    pub color_outputs: Vec<ColorOutputSetup>,
    pub blend_constants: [f32; 4],
    pub entry_points: Vec<ShaderStageEntryPoint>,
    pub priority: PipelinePriority,
}
