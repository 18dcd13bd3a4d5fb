//! Pipeline Family / Pipeline / Pass-Variant Store (C4, spec.md §4.4).

use std::collections::HashMap;

use kan_graphics_types::descriptor::DescriptorSetLayoutDesc;
use kan_graphics_types::pipeline::GraphicsPipelineDesc;
use kan_graphics_types::resource_contract::{CompiledPipeline, CompiledPipelineFamily, ResourceRequestId};
use kan_graphics_types::{ParameterSetLayoutHandle, PassHandle, PipelineHandle};
use log::{error, warn};

/// What the store needs from the real backend to realize a family's
/// layouts and a pipeline's compiled variants. A Vulkan session
/// implements this over `vkCreateDescriptorSetLayout` /
/// `vkCreateShaderModule` / `vkCreateGraphicsPipelines`.
pub trait PipelineBackend {
    fn create_set_layout(&mut self, desc: &DescriptorSetLayoutDesc) -> ParameterSetLayoutHandle;
    fn destroy_set_layout(&mut self, handle: ParameterSetLayoutHandle);

    /// Returns `None` when the backend does not support `code_format`
    /// (spec.md §4.4.1 step 5, "build a code module ... if the backend
    /// supports its format").
    fn create_code_module(&mut self, code: &[u8], format: kan_graphics_types::resource_contract::CodeFormat) -> Option<CodeModuleHandleId>;
    fn destroy_code_module(&mut self, handle: CodeModuleHandleId);

    fn resolve_pass(&self, pass_name: &str) -> Option<PassHandle>;
    fn pass_variant_layout(&self, pass: PassHandle, variant_index: u32) -> Option<ParameterSetLayoutHandle>;

    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> PipelineHandle;
    fn destroy_graphics_pipeline(&mut self, handle: PipelineHandle);
}

/// Opaque id for a transient code module; unlike the long-lived handles
/// in `kan_graphics_types::handles`, code modules are destroyed within
/// the same inspection pass that creates them (spec.md §4.4.1 step 5:
/// "Destroy the code module after pipeline creation returns").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeModuleHandleId(pub u64);

#[derive(Debug, Clone)]
pub struct FamilyState {
    pub name: String,
    pub request_id: ResourceRequestId,
    pub set_material: Option<ParameterSetLayoutHandle>,
    pub set_object: Option<ParameterSetLayoutHandle>,
    pub set_shared: Option<ParameterSetLayoutHandle>,
    pub refcount: u32,
    pub last_inspection_ns: Option<u64>,
}

impl FamilyState {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request_id: ResourceRequestId::INVALID,
            set_material: None,
            set_object: None,
            set_shared: None,
            refcount: 0,
            last_inspection_ns: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineState {
    pub pipeline_name: String,
    pub family_name: String,
    pub request_id: ResourceRequestId,
    pub refcount: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassVariantKey {
    pub pass_name_idx: u32,
    pub variant_index: u32,
}

#[derive(Debug, Clone)]
pub struct PipelinePassVariantState {
    pub pipeline_name: String,
    pub pass_name: String,
    pub variant_index: u32,
    pub refcount: u32,
    pub compiled_pipeline: Option<PipelineHandle>,
}

#[derive(Debug, Default)]
pub struct PipelineStore {
    pub families: HashMap<String, FamilyState>,
    pub pipelines: HashMap<String, PipelineState>,
    pub pass_variants: HashMap<(String, String, u32), PipelinePassVariantState>,
}

impl PipelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find-or-insert with refcount increment (spec.md §4.5.5 "find or
    /// insert a pipeline-state for `pipeline`, incrementing its
    /// refcount").
    pub fn attach_family(&mut self, name: &str) -> &mut FamilyState {
        let entry = self
            .families
            .entry(name.to_string())
            .or_insert_with(|| FamilyState::new(name));
        entry.refcount += 1;
        entry
    }

    /// spec.md §4.4.3: "Detachment unconditionally decrements, deletes
    /// on zero, and schedules the corresponding resource request for
    /// deferred deletion." Returns the request id to delete when the
    /// family is removed.
    pub fn detach_family(&mut self, name: &str) -> Option<ResourceRequestId> {
        let Some(state) = self.families.get_mut(name) else {
            return None;
        };
        state.refcount = state.refcount.saturating_sub(1);
        if state.refcount == 0 {
            let removed = self.families.remove(name)?;
            Some(removed.request_id)
        } else {
            None
        }
    }

    pub fn attach_pipeline(&mut self, pipeline_name: &str, family_name: &str) -> bool {
        let entry = self.pipelines.entry(pipeline_name.to_string());
        match entry {
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                occupied.get_mut().refcount += 1;
                false
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(PipelineState {
                    pipeline_name: pipeline_name.to_string(),
                    family_name: family_name.to_string(),
                    request_id: ResourceRequestId::INVALID,
                    refcount: 1,
                });
                true
            }
        }
    }

    pub fn detach_pipeline(&mut self, pipeline_name: &str) -> Option<ResourceRequestId> {
        let Some(state) = self.pipelines.get_mut(pipeline_name) else {
            return None;
        };
        state.refcount = state.refcount.saturating_sub(1);
        if state.refcount == 0 {
            let removed = self.pipelines.remove(pipeline_name)?;
            Some(removed.request_id)
        } else {
            None
        }
    }

    pub fn attach_pass_variant(
        &mut self,
        pipeline_name: &str,
        pass_name: &str,
        variant_index: u32,
    ) -> bool {
        let key = (pipeline_name.to_string(), pass_name.to_string(), variant_index);
        match self.pass_variants.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                occupied.get_mut().refcount += 1;
                false
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(PipelinePassVariantState {
                    pipeline_name: pipeline_name.to_string(),
                    pass_name: pass_name.to_string(),
                    variant_index,
                    refcount: 1,
                    compiled_pipeline: None,
                });
                true
            }
        }
    }

    pub fn detach_pass_variant(
        &mut self,
        pipeline_name: &str,
        pass_name: &str,
        variant_index: u32,
    ) -> Option<PipelinePassVariantState> {
        let key = (pipeline_name.to_string(), pass_name.to_string(), variant_index);
        let state = self.pass_variants.get_mut(&key)?;
        state.refcount = state.refcount.saturating_sub(1);
        if state.refcount == 0 {
            self.pass_variants.remove(&key)
        } else {
            None
        }
    }

    /// spec.md §4.4.1: pipeline family reconstruction, triggered when
    /// the family's resource request delivers content at inspection
    /// time `now_ns`.
    pub fn inspect_family<B: PipelineBackend>(
        &mut self,
        backend: &mut B,
        family_name: &str,
        now_ns: u64,
        compiled: &CompiledPipelineFamily,
        compiled_pipeline_of: impl Fn(&str) -> Option<CompiledPipeline>,
    ) {
        let Some(family) = self.families.get_mut(family_name) else {
            return;
        };
        // Step 1.
        if family.last_inspection_ns == Some(now_ns) {
            return;
        }

        // Step 3: destroy prior layouts, build new ones.
        if let Some(handle) = family.set_material.take() {
            backend.destroy_set_layout(handle);
        }
        if let Some(handle) = family.set_object.take() {
            backend.destroy_set_layout(handle);
        }
        if let Some(handle) = family.set_shared.take() {
            backend.destroy_set_layout(handle);
        }
        family.set_material = Some(backend.create_set_layout(&compiled.set_material_layout));
        family.set_object = Some(backend.create_set_layout(&compiled.set_object_layout));
        family.set_shared = Some(backend.create_set_layout(&compiled.set_shared_layout));

        let pipeline_names: Vec<String> = self
            .pipelines
            .values()
            .filter(|p| p.family_name == family_name)
            .map(|p| p.pipeline_name.clone())
            .collect();

        // Step 5: for every pipeline in this family.
        for pipeline_name in &pipeline_names {
            let Some(pipeline) = compiled_pipeline_of(pipeline_name) else {
                warn!("no bytecode available for pipeline {pipeline_name}");
                continue;
            };
            let code_module = backend.create_code_module(&pipeline.code, pipeline.code_format);
            if code_module.is_none() {
                warn!(
                    "backend does not support code format {:?} for pipeline {pipeline_name}",
                    pipeline.code_format
                );
            }

            let variant_keys: Vec<(String, String, u32)> = self
                .pass_variants
                .keys()
                .filter(|(p, _, _)| p == pipeline_name)
                .cloned()
                .collect();

            for key in variant_keys {
                let Some(state) = self.pass_variants.get_mut(&key) else {
                    continue;
                };
                if let Some(old) = state.compiled_pipeline.take() {
                    backend.destroy_graphics_pipeline(old);
                }
                let Some(pass) = backend.resolve_pass(&state.pass_name) else {
                    continue;
                };
                let pass_layout = backend.pass_variant_layout(pass, state.variant_index);
                let desc = GraphicsPipelineDesc {
                    pass,
                    topology: kan_graphics_types::pipeline::Topology::TriangleList,
                    vertex_attribute_sources: compiled.vertex_attribute_sources.clone(),
                    push_constant_size: compiled.push_constant_size,
                    set_layouts: [pass_layout, family.set_material, family.set_object, family.set_shared],
                    rasterizer: kan_graphics_types::pipeline::RasterizerState {
                        polygon_mode: kan_graphics_types::pipeline::PolygonMode::Fill,
                        cull_mode: kan_graphics_types::pipeline::CullMode::Back,
                    },
                    depth_stencil: default_depth_stencil(),
                    color_outputs: pipeline.color_outputs.clone(),
                    blend_constants: pipeline.color_blend_constants,
                    entry_points: pipeline.entry_points.clone(),
                    priority: kan_graphics_types::pipeline::PipelinePriority::Cache,
                };
                let compiled_handle = backend.create_graphics_pipeline(&desc);
                state.compiled_pipeline = Some(compiled_handle);
            }

            if let Some(module) = code_module {
                backend.destroy_code_module(module);
            }
        }

        family.last_inspection_ns = Some(now_ns);
    }
}

fn default_depth_stencil() -> kan_graphics_types::pipeline::DepthStencilState {
    use kan_graphics_types::pipeline::*;
    DepthStencilState {
        depth_test: true,
        depth_write: true,
        depth_compare: CompareOperation::LessOrEqual,
        stencil_test: false,
        front: StencilOpState {
            fail: StencilOperation::Keep,
            pass: StencilOperation::Keep,
            depth_fail: StencilOperation::Keep,
            compare: CompareOperation::Always,
        },
        back: StencilOpState {
            fail: StencilOperation::Keep,
            pass: StencilOperation::Keep,
            depth_fail: StencilOperation::Keep,
            compare: CompareOperation::Always,
        },
    }
}

/// spec.md §4.4.2: `compare-operation`, `stencil-operation`,
/// `blend-factor`, `blend-operation` all map 1:1 with the backend's
/// native enums; since this crate's backend-agnostic types already use
/// the same variant set (`kan_graphics_types::pipeline`), the
/// conversion at the real backend boundary is a direct `match` with no
/// fallback arm — any unmapped variant is a compile error, not a
/// runtime one.
pub fn log_unused_pipeline_result(result: &CompiledPipeline) {
    if result.entry_points.is_empty() {
        error!("compiled pipeline has no shader stage entry points");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_refcount_deletes_at_zero() {
        let mut store = PipelineStore::new();
        store.attach_family("F");
        store.attach_family("F");
        assert!(store.detach_family("F").is_none());
        assert!(store.detach_family("F").is_some());
        assert!(!store.families.contains_key("F"));
    }

    #[test]
    fn pass_variant_refcount_deletes_at_zero() {
        let mut store = PipelineStore::new();
        store.attach_pass_variant("P", "opaque", 0);
        store.attach_pass_variant("P", "opaque", 0);
        assert!(store.detach_pass_variant("P", "opaque", 0).is_none());
        assert!(store.detach_pass_variant("P", "opaque", 0).is_some());
    }

    #[test]
    fn distinct_variant_indices_are_independent() {
        let mut store = PipelineStore::new();
        store.attach_pass_variant("P", "opaque", 0);
        store.attach_pass_variant("P", "opaque", 1);
        assert_eq!(store.pass_variants.len(), 2);
    }
}
