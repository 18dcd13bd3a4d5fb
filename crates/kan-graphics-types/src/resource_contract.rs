//! The resource shapes consumed from (and request contract sent to) the
//! resource provider (spec.md §6.2). The provider itself is out of
//! scope (spec.md §1); only these shapes are specified.

use kan_base::id::{Id, IdDomain};
use serde::{Deserialize, Serialize};

use crate::descriptor::DescriptorSetLayoutDesc;
use crate::pipeline::{ColorOutputSetup, ShaderStageEntryPoint, VertexAttributeSource};

pub struct ResourceRequestDomain;
impl IdDomain for ResourceRequestDomain {
    const NAME: &'static str = "resource-request";
}
pub type ResourceRequestId = Id<ResourceRequestDomain>;

pub struct TextureUsageDomain;
impl IdDomain for TextureUsageDomain {
    const NAME: &'static str = "texture-usage";
}
pub type TextureUsageId = Id<TextureUsageDomain>;

pub struct MaterialUsageDomain;
impl IdDomain for MaterialUsageDomain {
    const NAME: &'static str = "material-usage";
}
pub type MaterialUsageId = Id<MaterialUsageDomain>;

pub struct MaterialInstanceUsageDomain;
impl IdDomain for MaterialInstanceUsageDomain {
    const NAME: &'static str = "material-instance-usage";
}
pub type MaterialInstanceUsageId = Id<MaterialInstanceUsageDomain>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    CompiledMaterial,
    CompiledPipelineFamily,
    CompiledPipeline,
    CompiledMaterialInstance,
    CompiledMaterialInstanceStatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourcePriority {
    /// `material-info-priority` — issued the moment a material gains
    /// its first usage (spec.md §4.5.2).
    MaterialInfo,
    /// `material-data-priority` — issued for the family/pipeline
    /// resources a material's info resolves to.
    MaterialData,
}

/// spec.md §6.2: "Resource requests carry `(request_id, type, name,
/// priority, provided_container_id?, expecting_new_data?, sleeping?)`."
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub id: ResourceRequestId,
    pub ty: ResourceType,
    pub name: String,
    pub priority: ResourcePriority,
    pub provided_container_id: Option<u64>,
    pub expecting_new_data: bool,
    pub sleeping: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    F1,
    F2,
    F3,
    F4,
    U1,
    U2,
    U3,
    U4,
    S1,
    S2,
    S3,
    S4,
    F3x3,
    F4x4,
}

impl ParameterType {
    pub fn byte_size(self) -> u32 {
        match self {
            Self::F1 | Self::U1 | Self::S1 => 4,
            Self::F2 | Self::U2 | Self::S2 => 8,
            Self::F3 | Self::U3 | Self::S3 => 12,
            Self::F4 | Self::U4 | Self::S4 => 16,
            Self::F3x3 => 36,
            Self::F4x4 => 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParameterValue {
    F1(f32),
    F2([f32; 2]),
    F3([f32; 3]),
    F4([f32; 4]),
    U1(u32),
    U2([u32; 2]),
    U3([u32; 3]),
    U4([u32; 4]),
    S1(i32),
    S2([i32; 2]),
    S3([i32; 3]),
    S4([i32; 4]),
    F3x3([f32; 9]),
    F4x4([f32; 16]),
}

impl ParameterValue {
    pub fn ty(&self) -> ParameterType {
        match self {
            Self::F1(_) => ParameterType::F1,
            Self::F2(_) => ParameterType::F2,
            Self::F3(_) => ParameterType::F3,
            Self::F4(_) => ParameterType::F4,
            Self::U1(_) => ParameterType::U1,
            Self::U2(_) => ParameterType::U2,
            Self::U3(_) => ParameterType::U3,
            Self::U4(_) => ParameterType::U4,
            Self::S1(_) => ParameterType::S1,
            Self::S2(_) => ParameterType::S2,
            Self::S3(_) => ParameterType::S3,
            Self::S4(_) => ParameterType::S4,
            Self::F3x3(_) => ParameterType::F3x3,
            Self::F4x4(_) => ParameterType::F4x4,
        }
    }

    pub fn write_into(&self, dst: &mut [u8]) {
        fn write_f32s(dst: &mut [u8], values: &[f32]) {
            for (chunk, v) in dst.chunks_exact_mut(4).zip(values) {
                chunk.copy_from_slice(&v.to_le_bytes());
            }
        }
        fn write_u32s(dst: &mut [u8], values: &[u32]) {
            for (chunk, v) in dst.chunks_exact_mut(4).zip(values) {
                chunk.copy_from_slice(&v.to_le_bytes());
            }
        }
        fn write_i32s(dst: &mut [u8], values: &[i32]) {
            for (chunk, v) in dst.chunks_exact_mut(4).zip(values) {
                chunk.copy_from_slice(&v.to_le_bytes());
            }
        }

        match self {
            Self::F1(v) => write_f32s(dst, &[*v]),
            Self::F2(v) => write_f32s(dst, v),
            Self::F3(v) => write_f32s(dst, v),
            Self::F4(v) => write_f32s(dst, v),
            Self::F3x3(v) => write_f32s(dst, v),
            Self::F4x4(v) => write_f32s(dst, v),
            Self::U1(v) => write_u32s(dst, &[*v]),
            Self::U2(v) => write_u32s(dst, v),
            Self::U3(v) => write_u32s(dst, v),
            Self::U4(v) => write_u32s(dst, v),
            Self::S1(v) => write_i32s(dst, &[*v]),
            Self::S2(v) => write_i32s(dst, v),
            Self::S3(v) => write_i32s(dst, v),
            Self::S4(v) => write_i32s(dst, v),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterAssignment {
    pub name: String,
    pub value: ParameterValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainParameterMeta {
    pub name: String,
    pub ty: ParameterType,
    pub offset: u32,
    pub total_item_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerBindingMeta {
    pub name: String,
    pub binding: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageBindingMeta {
    pub name: String,
    pub binding: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaBufferKind {
    Uniform,
    Storage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferBindingMeta {
    pub name: String,
    pub binding: u32,
    pub kind: MetaBufferKind,
    pub main_parameters: Vec<MainParameterMeta>,
    /// Present when this buffer has a variable-length "tail" array
    /// (spec.md §4.6.6).
    pub tail_name: Option<String>,
    pub tail_item_size: u32,
    pub tail_item_parameters: Vec<MainParameterMeta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetBindingsMeta {
    pub buffers: Vec<BufferBindingMeta>,
    pub samplers: Vec<SamplerBindingMeta>,
    pub images: Vec<ImageBindingMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstancedParameterMeta {
    pub name: String,
    pub ty: ParameterType,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstancedAttributeSource {
    pub block_size: u32,
    pub main_parameters: Vec<InstancedParameterMeta>,
}

/// `(vertex_attribute_sources, has_instanced_attribute_source,
/// instanced_attribute_source, push_constant_size, set_material,
/// set_object, set_shared)` (spec.md §6.2).
#[derive(Debug, Clone)]
pub struct CompiledPipelineFamily {
    pub vertex_attribute_sources: Vec<VertexAttributeSource>,
    pub has_instanced_attribute_source: bool,
    pub instanced_attribute_source: Option<InstancedAttributeSource>,
    pub push_constant_size: u32,
    pub set_material: SetBindingsMeta,
    pub set_object: SetBindingsMeta,
    pub set_shared: SetBindingsMeta,
    /// Layouts derived from the bindings metadata above, built at
    /// inspection time (spec.md §4.4.1 step 3).
    pub set_material_layout: DescriptorSetLayoutDesc,
    pub set_object_layout: DescriptorSetLayoutDesc,
    pub set_shared_layout: DescriptorSetLayoutDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeFormat {
    Spirv,
    Glsl,
    Wgsl,
}

#[derive(Debug, Clone)]
pub struct CompiledPipeline {
    pub color_outputs: Vec<ColorOutputSetup>,
    pub color_blend_constants: [f32; 4],
    pub code: Vec<u8>,
    pub code_format: CodeFormat,
    pub entry_points: Vec<ShaderStageEntryPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassVariantRef {
    pub pass: String,
    pub variant_index: u32,
    pub pipeline: String,
}

/// `(pipeline_family: name, pass_variants: [{pass, variant_index,
/// pipeline}])` (spec.md §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledMaterial {
    pub pipeline_family: String,
    pub pass_variants: Vec<PassVariantRef>,
}

/// `(static_data, instanced_parameters)` (spec.md §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledMaterialInstance {
    pub static_data: String,
    pub instanced_parameters: Vec<ParameterAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailSetEntry {
    pub tail_name: String,
    pub index: u32,
    pub parameters: Vec<ParameterAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailAppendEntry {
    pub tail_name: String,
    pub parameters: Vec<ParameterAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAssignment {
    pub name: String,
    pub texture_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerAssignment {
    pub name: String,
}

/// `(material, parameters, samplers, images, tail_set, tail_append)`
/// (spec.md §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledMaterialInstanceStatic {
    pub material: String,
    pub parameters: Vec<ParameterAssignment>,
    pub samplers: Vec<SamplerAssignment>,
    pub images: Vec<ImageAssignment>,
    pub tail_set: Vec<TailSetEntry>,
    pub tail_append: Vec<TailAppendEntry>,
}
