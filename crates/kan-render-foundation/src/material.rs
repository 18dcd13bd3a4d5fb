//! Material Management Engine (C5, spec.md §4.5).

use std::collections::HashMap;

use kan_graphics_types::resource_contract::{
    CompiledMaterial, InstancedAttributeSource, ResourceRequestId, SetBindingsMeta,
};
use kan_graphics_types::pipeline::VertexAttributeSource;
use kan_graphics_types::{ParameterSetLayoutHandle, PipelineHandle};
use log::warn;

use crate::flags::MaterialPassVariantFlagState;
use crate::pipeline_store::PipelineStore;

#[derive(Debug, Clone)]
pub struct MaterialPassVariant {
    pub pass: String,
    pub variant_index: u32,
    pub pipeline: String,
    pub found_in_new_data: bool,
    pub passed_to_loaded_data: bool,
}

impl MaterialPassVariant {
    fn flag_state(&self) -> MaterialPassVariantFlagState {
        MaterialPassVariantFlagState::from_bits(self.found_in_new_data, self.passed_to_loaded_data)
    }
}

#[derive(Debug, Clone)]
pub struct LoadedPipelineEntry {
    pub pass: String,
    pub variant_index: u32,
    pub pipeline: PipelineHandle,
}

/// `loaded_material(name, set_material, set_object, set_shared,
/// pipelines[], metadata)` (spec.md §6.3).
#[derive(Debug, Clone, Default)]
pub struct LoadedMaterial {
    pub set_material: Option<ParameterSetLayoutHandle>,
    pub set_object: Option<ParameterSetLayoutHandle>,
    pub set_shared: Option<ParameterSetLayoutHandle>,
    pub pipelines: Vec<LoadedPipelineEntry>,
    pub vertex_attribute_sources: Vec<VertexAttributeSource>,
    pub has_instanced_attribute_source: bool,
    pub instanced_attribute_source: Option<InstancedAttributeSource>,
    pub push_constant_size: u32,
    pub set_material_bindings: SetBindingsMeta,
}

#[derive(Debug, Clone)]
pub struct MaterialState {
    pub name: String,
    pub refcount: u32,
    pub request_id: ResourceRequestId,
    pub current_pipeline_family_name: Option<String>,
    pub last_loaded_pipeline_family_name: Option<String>,
    pub pass_variants: Vec<MaterialPassVariant>,
    pub loaded: Option<LoadedMaterial>,
    pub is_preload_native: bool,
}

impl MaterialState {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            refcount: 0,
            request_id: ResourceRequestId::INVALID,
            current_pipeline_family_name: None,
            last_loaded_pipeline_family_name: None,
            pass_variants: Vec::new(),
            loaded: None,
            is_preload_native: false,
        }
    }
}

/// A single raised/lowered priority observation, reported back so the
/// caller can forward it to the resource provider (kept out of this
/// crate per spec.md §1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityChange {
    RaiseLoadedPipelinesToActive,
    LowerLoadedPipelinesToCache,
}

#[derive(Debug, Default)]
pub struct MaterialEngine {
    pub materials: HashMap<String, MaterialState>,
    pub preload_materials: bool,
}

impl MaterialEngine {
    pub fn new(preload_materials: bool) -> Self {
        Self {
            materials: HashMap::new(),
            preload_materials,
        }
    }

    /// spec.md §4.5.2 "On insert".
    pub fn usage_insert(&mut self, name: &str) -> Vec<PriorityChange> {
        let mut changes = Vec::new();
        let existed = self.materials.contains_key(name);
        let state = self
            .materials
            .entry(name.to_string())
            .or_insert_with(|| MaterialState::new(name));
        state.refcount += 1;
        if !existed {
            state.request_id = ResourceRequestId::INVALID; // issued by caller at material-info-priority
        }
        if state.refcount == 1 && self.preload_materials {
            changes.push(PriorityChange::RaiseLoadedPipelinesToActive);
        }
        changes
    }

    /// spec.md §4.5.2 "On change": insert new, decrement old.
    pub fn usage_change(&mut self, old_name: &str, new_name: &str) -> Vec<PriorityChange> {
        let mut changes = self.usage_insert(new_name);
        changes.extend(self.usage_decrement(old_name));
        changes
    }

    /// spec.md §4.5.2 "On delete/decrement".
    pub fn usage_decrement(&mut self, name: &str) -> Vec<PriorityChange> {
        let mut changes = Vec::new();
        let Some(state) = self.materials.get_mut(name) else {
            return changes;
        };
        state.refcount = state.refcount.saturating_sub(1);
        if state.refcount == 0 {
            let should_delete = !self.preload_materials || !state.is_preload_native;
            if should_delete {
                self.materials.remove(name);
            }
        } else if self.preload_materials {
            changes.push(PriorityChange::LowerLoadedPipelinesToCache);
        }
        changes
    }

    /// spec.md §4.5.2 "native-entry insert events arrive in preload
    /// mode": create a zero-refcount preload state so the material
    /// starts loading before any usage references it.
    pub fn native_entry_inserted(&mut self, name: &str) {
        if !self.preload_materials {
            return;
        }
        let state = self
            .materials
            .entry(name.to_string())
            .or_insert_with(|| MaterialState::new(name));
        state.is_preload_native = true;
    }

    /// spec.md §4.5.4: material inspection on compiled-material update.
    /// `pass_present` answers whether a given pass name exists in the
    /// current context (the condition for creating new attachments).
    pub fn inspect_material(
        &mut self,
        pipelines: &mut PipelineStore,
        name: &str,
        compiled: &CompiledMaterial,
        pass_present: impl Fn(&str) -> bool,
    ) {
        let Some(state) = self.materials.get_mut(name) else {
            return;
        };

        // Step 2: pipeline-family change.
        if state.current_pipeline_family_name.as_deref() != Some(compiled.pipeline_family.as_str()) {
            if let Some(old) = &state.current_pipeline_family_name {
                if state.last_loaded_pipeline_family_name.as_deref() != Some(old.as_str()) {
                    pipelines.detach_family(old);
                }
            }
            state.current_pipeline_family_name = Some(compiled.pipeline_family.clone());
            let family = pipelines.attach_family(&compiled.pipeline_family);
            family.request_id = ResourceRequestId::INVALID; // forces a meta reload
        }

        // Step 3.
        for variant in &mut state.pass_variants {
            variant.found_in_new_data = false;
        }

        // Step 4.
        for entry in &compiled.pass_variants {
            let existing = state.pass_variants.iter_mut().find(|v| {
                v.pass == entry.pass && v.variant_index == entry.variant_index
            });
            match existing {
                Some(variant) => {
                    variant.found_in_new_data = true;
                    variant.pipeline = entry.pipeline.clone();
                }
                None => {
                    state.pass_variants.push(MaterialPassVariant {
                        pass: entry.pass.clone(),
                        variant_index: entry.variant_index,
                        pipeline: entry.pipeline.clone(),
                        found_in_new_data: true,
                        passed_to_loaded_data: false,
                    });
                    if pass_present(&entry.pass) {
                        attach_pass_variant(pipelines, &entry.pipeline, &entry.pass, entry.variant_index);
                    }
                }
            }
        }

        // Step 5: reconciliation pass.
        let mut to_remove = Vec::new();
        for (idx, variant) in state.pass_variants.iter_mut().enumerate() {
            match variant.flag_state().reconcile() {
                crate::flags::Reconciliation::Keep => {}
                crate::flags::Reconciliation::DetachPipeline => {
                    // Loaded data still references this pass-variant's
                    // `compiled_pipeline`; only the pipeline itself is
                    // detached here, the pass-variant survives until the
                    // next successful load replaces it.
                    pipelines.detach_pipeline(&variant.pipeline);
                }
                crate::flags::Reconciliation::DetachBothAndDelete => {
                    pipelines.detach_pass_variant(&variant.pipeline, &variant.pass, variant.variant_index);
                    pipelines.detach_pipeline(&variant.pipeline);
                    to_remove.push(idx);
                }
            }
        }
        for idx in to_remove.into_iter().rev() {
            state.pass_variants.remove(idx);
        }
    }

    /// spec.md §4.5.6: family load finalization. Returns `true` if a
    /// `material-updated` event should be emitted for `name`.
    pub fn finalize_family_load(
        &mut self,
        pipelines: &mut PipelineStore,
        name: &str,
        family_name: &str,
        compiled_push_constant_size: u32,
        vertex_attribute_sources: Vec<VertexAttributeSource>,
        instanced_attribute_source: Option<InstancedAttributeSource>,
        set_material_bindings: SetBindingsMeta,
    ) -> bool {
        let Some(state) = self.materials.get_mut(name) else {
            return false;
        };
        if state.current_pipeline_family_name.as_deref() != Some(family_name) {
            return false;
        }
        let Some(family) = pipelines.families.get(family_name) else {
            return false;
        };

        let mut loaded = LoadedMaterial {
            set_material: family.set_material,
            set_object: family.set_object,
            set_shared: family.set_shared,
            pipelines: Vec::new(),
            vertex_attribute_sources,
            has_instanced_attribute_source: instanced_attribute_source.is_some(),
            instanced_attribute_source,
            push_constant_size: compiled_push_constant_size,
            set_material_bindings,
        };

        for variant in &mut state.pass_variants {
            if !variant.found_in_new_data {
                continue;
            }
            if let Some(pv) = pipelines
                .pass_variants
                .get(&(variant.pipeline.clone(), variant.pass.clone(), variant.variant_index))
            {
                if let Some(compiled_pipeline) = pv.compiled_pipeline {
                    loaded.pipelines.push(LoadedPipelineEntry {
                        pass: variant.pass.clone(),
                        variant_index: variant.variant_index,
                        pipeline: compiled_pipeline,
                    });
                }
            }
            variant.passed_to_loaded_data = true;
        }
        loaded.pipelines.sort_by(|a, b| a.pass.cmp(&b.pass).then(a.variant_index.cmp(&b.variant_index)));

        if state.last_loaded_pipeline_family_name.as_deref() != Some(family_name) {
            if let Some(old) = state.last_loaded_pipeline_family_name.take() {
                pipelines.detach_family(&old);
            }
            state.last_loaded_pipeline_family_name = Some(family_name.to_string());
        }

        state.loaded = Some(loaded);
        true
    }
}

fn attach_pass_variant(pipelines: &mut PipelineStore, pipeline: &str, pass: &str, variant_index: u32) {
    let is_new_pipeline = pipelines.attach_pipeline(pipeline, pass);
    if is_new_pipeline {
        if let Some(p) = pipelines.pipelines.get_mut(pipeline) {
            p.request_id = ResourceRequestId::INVALID;
        }
    }
    let is_new_variant = pipelines.attach_pass_variant(pipeline, pass, variant_index);
    if !is_new_variant {
        warn!("pass-variant ({pipeline}, {pass}, {variant_index}) attached more than once for the same material update");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kan_graphics_types::resource_contract::PassVariantRef;

    #[test]
    fn usage_insert_then_delete_removes_state() {
        let mut engine = MaterialEngine::new(false);
        engine.usage_insert("mat");
        assert_eq!(engine.materials["mat"].refcount, 1);
        engine.usage_decrement("mat");
        assert!(!engine.materials.contains_key("mat"));
    }

    #[test]
    fn preload_keeps_state_alive_at_zero_refcount() {
        let mut engine = MaterialEngine::new(true);
        engine.usage_insert("mat");
        engine.materials.get_mut("mat").unwrap().is_preload_native = true;
        engine.usage_decrement("mat");
        assert!(engine.materials.contains_key("mat"));
    }

    #[test]
    fn inspect_material_creates_pass_variant_and_attaches() {
        let mut engine = MaterialEngine::new(false);
        engine.usage_insert("mat");
        let mut pipelines = PipelineStore::new();
        let compiled = CompiledMaterial {
            pipeline_family: "fam".to_string(),
            pass_variants: vec![PassVariantRef {
                pass: "opaque".to_string(),
                variant_index: 0,
                pipeline: "pipe".to_string(),
            }],
        };
        engine.inspect_material(&mut pipelines, "mat", &compiled, |_| true);
        assert_eq!(engine.materials["mat"].pass_variants.len(), 1);
        assert!(pipelines.pass_variants.contains_key(&("pipe".to_string(), "opaque".to_string(), 0)));
        assert_eq!(pipelines.families["fam"].refcount, 1);
    }

    #[test]
    fn passed_to_loaded_only_detaches_pipeline_but_keeps_pass_variant() {
        let mut engine = MaterialEngine::new(false);
        engine.usage_insert("mat");
        let mut pipelines = PipelineStore::new();
        let compiled = CompiledMaterial {
            pipeline_family: "fam".to_string(),
            pass_variants: vec![PassVariantRef {
                pass: "opaque".to_string(),
                variant_index: 0,
                pipeline: "pipe".to_string(),
            }],
        };
        engine.inspect_material(&mut pipelines, "mat", &compiled, |_| true);
        // Mark it as already delivered to loaded data, then the next
        // inspection drops the variant from the new resource entirely:
        // found_in_new_data=false, passed_to_loaded_data=true ("Loaded").
        engine.materials.get_mut("mat").unwrap().pass_variants[0].passed_to_loaded_data = true;
        let empty = CompiledMaterial {
            pipeline_family: "fam".to_string(),
            pass_variants: vec![],
        };
        engine.inspect_material(&mut pipelines, "mat", &empty, |_| true);
        // The pass-variant survives — the loaded record still points at
        // its compiled_pipeline — only the pipeline is detached.
        assert_eq!(engine.materials["mat"].pass_variants.len(), 1);
        assert!(pipelines.pass_variants.contains_key(&("pipe".to_string(), "opaque".to_string(), 0)));
        assert!(!pipelines.pipelines.contains_key("pipe"));
    }

    #[test]
    fn orphan_pass_variant_detaches_both_and_deletes() {
        let mut engine = MaterialEngine::new(false);
        engine.usage_insert("mat");
        let mut pipelines = PipelineStore::new();
        let compiled = CompiledMaterial {
            pipeline_family: "fam".to_string(),
            pass_variants: vec![PassVariantRef {
                pass: "opaque".to_string(),
                variant_index: 0,
                pipeline: "pipe".to_string(),
            }],
        };
        engine.inspect_material(&mut pipelines, "mat", &compiled, |_| true);
        // Never passed to loaded data and no longer present upstream:
        // found_in_new_data=false, passed_to_loaded_data=false ("Orphan").
        let empty = CompiledMaterial {
            pipeline_family: "fam".to_string(),
            pass_variants: vec![],
        };
        engine.inspect_material(&mut pipelines, "mat", &empty, |_| true);
        assert!(engine.materials["mat"].pass_variants.is_empty());
        assert!(!pipelines.pass_variants.contains_key(&("pipe".to_string(), "opaque".to_string(), 0)));
        assert!(!pipelines.pipelines.contains_key("pipe"));
    }
}
