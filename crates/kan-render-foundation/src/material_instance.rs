//! Material Instance Engine (C6, spec.md §4.6).

use std::collections::HashMap;

use kan_base::id::IdAllocator;
use kan_graphics_types::resource_contract::{
    CompiledMaterialInstance, CompiledMaterialInstanceStatic, MaterialInstanceUsageId,
    MaterialUsageDomain, MaterialUsageId, ParameterAssignment, ResourceRequestId, TextureUsageId,
};
use kan_graphics_types::pipeline::{AttributeClass, ItemFormat};
use kan_graphics_types::{BufferHandle, ParameterSetHandle};
use log::warn;

/// A single usage record: `material-instance-usage(usage-id, name,
/// image_best_advised_mip, image_worst_advised_mip)` (spec.md §4.6.1).
#[derive(Debug, Clone)]
pub struct MaterialInstanceUsage {
    pub usage_id: MaterialInstanceUsageId,
    pub instance_name: String,
    pub image_best_advised_mip: u32,
    pub image_worst_advised_mip: u32,
    pub custom_instanced_parameters: Option<Vec<ParameterAssignment>>,
}

#[derive(Debug, Clone)]
pub struct StaticImageBinding {
    pub name: String,
    pub texture_name: String,
    pub texture_usage_id: TextureUsageId,
}

#[derive(Debug, Clone)]
pub struct StaticState {
    pub name: String,
    pub refcount: u32,
    pub request_id: ResourceRequestId,
    pub loaded_material_name: Option<String>,
    pub loading_material_name: Option<String>,
    pub last_applied_inspection_time_ns: Option<u64>,
    pub images: Vec<StaticImageBinding>,
    pub parameter_set: Option<ParameterSetHandle>,
    pub buffers: Vec<BufferHandle>,
    pub best_advised_mip: u32,
    pub worst_advised_mip: u32,
    pub needs_mip_update: bool,
    pub hot_reload_possible: bool,
    /// Material-usage keeping `loaded_material_name` (or the material
    /// currently loading into it) referenced (spec.md §3.3, §3.4
    /// invariant 6).
    pub current_material_usage_id: Option<MaterialUsageId>,
    /// Usage of the material this static is switching away from; held
    /// until the new load finishes so the old material isn't dropped
    /// mid-transition.
    pub kept_material_usage_id: Option<MaterialUsageId>,
}

impl StaticState {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            refcount: 0,
            request_id: ResourceRequestId::INVALID,
            loaded_material_name: None,
            loading_material_name: None,
            last_applied_inspection_time_ns: None,
            images: Vec::new(),
            parameter_set: None,
            buffers: Vec::new(),
            best_advised_mip: u32::MAX,
            worst_advised_mip: 0,
            needs_mip_update: false,
            hot_reload_possible: true,
            current_material_usage_id: None,
            kept_material_usage_id: None,
        }
    }
}

/// A material-usage create/rename/release the caller must mirror
/// against `MaterialEngine` (spec.md §4.6.2, §4.6.5, mirroring
/// `PriorityChange` as the cross-engine coordination shape).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialUsageChange {
    Insert { usage_id: MaterialUsageId, name: String },
    Rename { usage_id: MaterialUsageId, old_name: String, new_name: String },
    Remove { usage_id: MaterialUsageId, name: String },
}

/// `loaded_material_instance(name, material_name, parameter_set,
/// instanced_data)` (spec.md §6.3).
#[derive(Debug, Clone, Default)]
pub struct LoadedMaterialInstance {
    pub material_name: Option<String>,
    pub parameter_set: Option<ParameterSetHandle>,
    pub instanced_data: Vec<u8>,
}

/// `custom_loaded_material_instance(usage_id,
/// last_inspection_time_ns, material_name, parameter_set,
/// instanced_data)` (spec.md §6.3).
#[derive(Debug, Clone)]
pub struct CustomLoadedMaterialInstance {
    pub usage_id: MaterialInstanceUsageId,
    pub last_inspection_time_ns: u64,
    pub material_name: Option<String>,
    pub parameter_set: Option<ParameterSetHandle>,
    pub instanced_data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MaterialInstanceState {
    pub name: String,
    pub refcount: u32,
    pub request_id: ResourceRequestId,
    pub static_name: Option<String>,
    pub loaded_static_name: Option<String>,
    pub loaded: LoadedMaterialInstance,
}

impl MaterialInstanceState {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            refcount: 0,
            request_id: ResourceRequestId::INVALID,
            static_name: None,
            loaded_static_name: None,
            loaded: LoadedMaterialInstance::default(),
        }
    }
}

/// `material_instance_singleton(usage_id_counter,
/// custom_sync_inspection_marker_ns)` (spec.md §6.3).
#[derive(Debug, Default)]
pub struct MaterialInstanceSingleton {
    pub usage_id_counter: u32,
    pub custom_sync_inspection_marker_ns: u64,
}

#[derive(Debug, Default)]
pub struct MaterialInstanceEngine {
    pub instances: HashMap<String, MaterialInstanceState>,
    pub statics: HashMap<String, StaticState>,
    pub usages: Vec<MaterialInstanceUsage>,
    pub singleton: MaterialInstanceSingleton,
    /// Per-usage override records (spec.md §4.6.7, §6.3
    /// `custom_loaded_material_instance`), keyed by the usage they
    /// override.
    pub custom_loaded: HashMap<MaterialInstanceUsageId, CustomLoadedMaterialInstance>,
    /// Backs `current_material_usage_id`/`kept_material_usage_id`:
    /// records which material name each minted material-usage-id
    /// refers to, so it can be named in a `MaterialUsageChange` when
    /// released or renamed.
    material_usages: HashMap<MaterialUsageId, String>,
    material_usage_allocator: IdAllocator<MaterialUsageDomain>,
}

impl MaterialInstanceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_material_usage_id(&mut self) -> MaterialUsageId {
        self.material_usage_allocator.allocate()
    }

    /// Releases a material-usage id if valid, returning the change the
    /// caller must mirror against `MaterialEngine::usage_decrement`.
    fn release_material_usage(&mut self, usage_id: Option<MaterialUsageId>) -> Option<MaterialUsageChange> {
        let usage_id = usage_id?;
        let name = self.material_usages.remove(&usage_id)?;
        Some(MaterialUsageChange::Remove { usage_id, name })
    }

    /// spec.md §4.6.2 planning: usage insert.
    pub fn usage_insert(&mut self, usage: MaterialInstanceUsage) {
        let state = self
            .instances
            .entry(usage.instance_name.clone())
            .or_insert_with(|| MaterialInstanceState::new(&usage.instance_name));
        state.refcount += 1;
        self.usages.push(usage);
    }

    /// spec.md §4.6.2 planning: cascade-detach on refcount reaching 0,
    /// per `HELPER_UNLINK_STATIC_STATE_DATA`. Returns material-usage
    /// changes the caller must mirror against `MaterialEngine`.
    pub fn usage_remove(&mut self, usage_id: MaterialInstanceUsageId) -> Vec<MaterialUsageChange> {
        let mut changes = Vec::new();
        let Some(pos) = self.usages.iter().position(|u| u.usage_id == usage_id) else {
            return changes;
        };
        let usage = self.usages.remove(pos);
        self.custom_loaded.remove(&usage.usage_id);
        let Some(state) = self.instances.get_mut(&usage.instance_name) else {
            return changes;
        };
        state.refcount = state.refcount.saturating_sub(1);
        if state.refcount == 0 {
            let static_name = state.static_name.clone();
            self.instances.remove(&usage.instance_name);
            if let Some(static_name) = static_name {
                changes.extend(self.unlink_static(&static_name).1);
            }
        } else if let Some(static_name) = state.static_name.clone() {
            if let Some(s) = self.statics.get_mut(&static_name) {
                s.needs_mip_update = true;
            }
        }
        changes
    }

    /// `HELPER_UNLINK_STATIC_STATE_DATA` (spec.md §4.6.2): decrement
    /// the static's refcount; on zero, schedule deletion and delete
    /// the kept and current material-usages alongside its
    /// image/texture-usage records.
    fn unlink_static(&mut self, static_name: &str) -> (Option<ResourceRequestId>, Vec<MaterialUsageChange>) {
        let Some(s) = self.statics.get_mut(static_name) else {
            return (None, Vec::new());
        };
        s.refcount = s.refcount.saturating_sub(1);
        if s.refcount == 0 {
            let Some(removed) = self.statics.remove(static_name) else {
                return (None, Vec::new());
            };
            let mut changes = Vec::new();
            changes.extend(self.release_material_usage(removed.current_material_usage_id));
            changes.extend(self.release_material_usage(removed.kept_material_usage_id));
            (Some(removed.request_id), changes)
        } else {
            (None, Vec::new())
        }
    }

    fn ensure_static(&mut self, name: &str) -> &mut StaticState {
        self.statics
            .entry(name.to_string())
            .or_insert_with(|| StaticState::new(name))
    }

    /// spec.md §4.6.3: mip propagation. Aggregates per-instance first,
    /// then per-static across instances sharing it, and returns the
    /// statics whose advised mips changed so the caller can forward
    /// texture-usage advisories.
    pub fn propagate_mips(&mut self) -> Vec<String> {
        let mut per_instance: HashMap<String, (u32, u32)> = HashMap::new();
        for usage in &self.usages {
            let entry = per_instance
                .entry(usage.instance_name.clone())
                .or_insert((u32::MAX, 0));
            entry.0 = entry.0.min(usage.image_best_advised_mip);
            entry.1 = entry.1.max(usage.image_worst_advised_mip);
        }

        let mut per_static: HashMap<String, (u32, u32)> = HashMap::new();
        for instance in self.instances.values() {
            let Some(static_name) = &instance.static_name else {
                continue;
            };
            let Some((best, worst)) = per_instance.get(&instance.name) else {
                continue;
            };
            let entry = per_static
                .entry(static_name.clone())
                .or_insert((u32::MAX, 0));
            entry.0 = entry.0.min(*best);
            entry.1 = entry.1.max(*worst);
        }

        let mut changed = Vec::new();
        for (name, (best, worst)) in per_static {
            if let Some(s) = self.statics.get_mut(&name) {
                if s.best_advised_mip != best || s.worst_advised_mip != worst {
                    s.best_advised_mip = best;
                    s.worst_advised_mip = worst;
                    changed.push(name);
                }
            }
        }
        changed
    }

    /// spec.md §4.6.4: material instance inspection on
    /// compiled-material-instance update. Returns material-usage
    /// changes the caller must mirror against `MaterialEngine`.
    pub fn inspect_instance(
        &mut self,
        name: &str,
        compiled: &CompiledMaterialInstance,
        now_ns: u64,
    ) -> Vec<MaterialUsageChange> {
        let mut changes = Vec::new();
        let Some(state) = self.instances.get_mut(name) else {
            return changes;
        };
        if state.static_name.as_deref() != Some(compiled.static_data.as_str()) {
            let old_static = state.static_name.clone();
            if let Some(old) = &old_static {
                if state.loaded_static_name.as_deref() != Some(old.as_str()) {
                    changes.extend(self.unlink_static(old).1);
                }
            }
            let new_name = compiled.static_data.clone();
            if self.statics.contains_key(&new_name) {
                let s = self.statics.get_mut(&new_name).unwrap();
                s.refcount += 1;
                s.needs_mip_update = true;
            } else {
                let s = self.ensure_static(&new_name);
                s.refcount = 1;
            }
            self.instances.get_mut(name).unwrap().static_name = Some(new_name);
        }
        let static_name = self.instances[name].static_name.clone();
        if let Some(static_name) = static_name {
            changes.extend(self.inspect_static(&static_name, now_ns, None));
        }
        changes
    }

    /// spec.md §4.6.5: static inspection. `new_data` is `Some` only
    /// when the caller has fresh compiled bytes ready to instantiate;
    /// readiness gating (resource loaded, referencing material loaded,
    /// at least one referencing instance loaded, every image's texture
    /// loaded) is the caller's responsibility via `ready`.
    pub fn inspect_static(
        &mut self,
        static_name: &str,
        now_ns: u64,
        new_data: Option<(&CompiledMaterialInstanceStatic, bool)>,
    ) -> Vec<MaterialUsageChange> {
        let mut changes = Vec::new();
        let Some((data, ready)) = new_data else {
            return changes;
        };
        if !ready {
            return changes;
        }
        {
            let Some(s) = self.statics.get(static_name) else {
                return changes;
            };
            if s.last_applied_inspection_time_ns == Some(now_ns) {
                return changes;
            }
        }

        // Keep the outgoing material usage alive across the switch
        // (mirrors `on_material_instance_static_updated`): the static
        // only swaps `current`/`kept` when the referenced material
        // actually changes, and only mints a fresh usage the first
        // time it does so for a given transition.
        let material_changed = self.statics[static_name].loaded_material_name.as_deref() != Some(data.material.as_str());
        if material_changed {
            let current = self.statics[static_name].current_material_usage_id;
            let already_kept = self.statics[static_name].kept_material_usage_id.is_some();
            match current {
                Some(current_id) if already_kept => {
                    let old_name = self.material_usages.get(&current_id).cloned();
                    if old_name.as_deref() != Some(data.material.as_str()) {
                        self.material_usages.insert(current_id, data.material.clone());
                        changes.push(MaterialUsageChange::Rename {
                            usage_id: current_id,
                            old_name: old_name.unwrap_or_default(),
                            new_name: data.material.clone(),
                        });
                    }
                }
                Some(current_id) => {
                    let new_id = self.next_material_usage_id();
                    self.material_usages.insert(new_id, data.material.clone());
                    changes.push(MaterialUsageChange::Insert {
                        usage_id: new_id,
                        name: data.material.clone(),
                    });
                    let s = self.statics.get_mut(static_name).unwrap();
                    s.kept_material_usage_id = Some(current_id);
                    s.current_material_usage_id = Some(new_id);
                }
                None => {
                    let new_id = self.next_material_usage_id();
                    self.material_usages.insert(new_id, data.material.clone());
                    changes.push(MaterialUsageChange::Insert {
                        usage_id: new_id,
                        name: data.material.clone(),
                    });
                    self.statics.get_mut(static_name).unwrap().current_material_usage_id = Some(new_id);
                }
            }
        }

        // §4.6.5 step 1: the switch completed this pass, so any kept
        // usage from a prior transition is now dangling.
        let kept = self.statics.get_mut(static_name).unwrap().kept_material_usage_id.take();
        changes.extend(self.release_material_usage(kept));

        let s = self.statics.get_mut(static_name).unwrap();
        s.images.retain(|img| data.images.iter().any(|i| i.name == img.name));
        for image in &data.images {
            if !s.images.iter().any(|i| i.name == image.name) {
                s.images.push(StaticImageBinding {
                    name: image.name.clone(),
                    texture_name: image.texture_name.clone(),
                    texture_usage_id: TextureUsageId::INVALID,
                });
            }
        }

        s.loaded_material_name = Some(data.material.clone());
        s.loading_material_name = None;
        s.last_applied_inspection_time_ns = Some(now_ns);
        changes
    }

    /// spec.md §4.6.6: stage a static's buffer bytes. Pure computation
    /// over the compiled static's parameters so it can be unit-tested
    /// without a real backend; the backend constructs the actual GPU
    /// buffer/parameter-set from the returned bytes.
    pub fn stage_static_buffer(
        data: &CompiledMaterialInstanceStatic,
        buffer: &kan_graphics_types::resource_contract::BufferBindingMeta,
    ) -> Vec<u8> {
        let max_tail_index = data
            .tail_set
            .iter()
            .filter(|entry| Some(entry.tail_name.as_str()) == buffer.tail_name.as_deref())
            .map(|entry| entry.index)
            .max();
        let tail_append_count = data
            .tail_append
            .iter()
            .filter(|entry| Some(entry.tail_name.as_str()) == buffer.tail_name.as_deref())
            .count() as u32;

        let main_size = buffer
            .main_parameters
            .iter()
            .map(|p| p.offset + p.ty.byte_size())
            .max()
            .unwrap_or(0);
        let tail_slots = max_tail_index.map(|idx| idx + 1).unwrap_or(0) + tail_append_count;
        let total = main_size + buffer.tail_item_size * tail_slots;
        if total == 0 {
            return Vec::new();
        }
        let aligned = (total as usize).next_multiple_of(16);
        let mut bytes = vec![0u8; aligned];

        for param in &data.parameters {
            let Some(meta) = buffer.main_parameters.iter().find(|m| m.name == param.name) else {
                continue;
            };
            if meta.ty != param.value.ty() {
                warn!("parameter {} type mismatch, skipping", param.name);
                continue;
            }
            if meta.total_item_count != 1 {
                warn!("parameter {} is an array (unsupported), skipping", param.name);
                continue;
            }
            let offset = meta.offset as usize;
            write_param(&mut bytes, offset, param);
        }

        let stride = buffer.tail_item_size;
        let mut tail_append_offset = 0u32;
        for entry in &data.tail_set {
            if Some(entry.tail_name.as_str()) != buffer.tail_name.as_deref() {
                continue;
            }
            let base = entry.index * stride;
            for param in &entry.parameters {
                let Some(meta) = buffer.tail_item_parameters.iter().find(|m| m.name == param.name) else {
                    continue;
                };
                write_param(&mut bytes, (base + meta.offset) as usize, param);
            }
            tail_append_offset = tail_append_offset.max(base + stride);
        }

        for entry in &data.tail_append {
            if Some(entry.tail_name.as_str()) != buffer.tail_name.as_deref() {
                continue;
            }
            let base = tail_append_offset;
            for param in &entry.parameters {
                let Some(meta) = buffer.tail_item_parameters.iter().find(|m| m.name == param.name) else {
                    continue;
                };
                write_param(&mut bytes, (base + meta.offset) as usize, param);
            }
            tail_append_offset += stride;
        }

        bytes
    }

    /// spec.md §4.6.7: loaded record propagation to every
    /// material-instance bound to `static_name`. `instanced_layout`
    /// describes the family's instanced attribute source, if any.
    /// Also walks every usage of each propagated instance, creating,
    /// updating, or deleting its per-usage custom-loaded record.
    /// Returns material-usage changes the caller must mirror against
    /// `MaterialEngine`.
    pub fn propagate_to_instances(
        &mut self,
        static_name: &str,
        instanced_layout: Option<&kan_graphics_types::resource_contract::InstancedAttributeSource>,
        instance_params: &HashMap<String, Vec<ParameterAssignment>>,
        now_ns: u64,
    ) -> Vec<MaterialUsageChange> {
        let mut changes = Vec::new();
        let Some(s) = self.statics.get(static_name).cloned() else {
            return changes;
        };
        let names: Vec<String> = self
            .instances
            .values()
            .filter(|i| i.static_name.as_deref() == Some(static_name))
            .map(|i| i.name.clone())
            .collect();

        for name in names {
            let params = instance_params.get(&name);
            let instanced_data = instanced_layout
                .map(|layout| write_instanced_attributes(layout, params))
                .unwrap_or_default();

            let old_loaded_static = {
                let instance = self.instances.get_mut(&name).unwrap();
                instance.loaded.material_name = s.loaded_material_name.clone();
                instance.loaded.parameter_set = s.parameter_set;
                instance.loaded.instanced_data = instanced_data.clone();

                if instance.loaded_static_name.as_deref() != Some(static_name) {
                    instance.loaded_static_name.replace(static_name.to_string())
                } else {
                    None
                }
            };
            if let Some(old) = old_loaded_static {
                changes.extend(self.unlink_static(&old).1);
            }

            let usage_ids: Vec<MaterialInstanceUsageId> = self
                .usages
                .iter()
                .filter(|u| u.instance_name == name)
                .map(|u| u.usage_id)
                .collect();
            for usage_id in usage_ids {
                let Some(usage) = self.usages.iter().find(|u| u.usage_id == usage_id) else {
                    continue;
                };
                let Some(custom_params) = usage
                    .custom_instanced_parameters
                    .clone()
                    .filter(|p| !p.is_empty())
                else {
                    self.custom_loaded.remove(&usage_id);
                    continue;
                };
                let mut overlaid = instanced_data.clone();
                if let Some(layout) = instanced_layout {
                    overlay_instanced_attributes(&mut overlaid, layout, &custom_params);
                }
                self.custom_loaded.insert(
                    usage_id,
                    CustomLoadedMaterialInstance {
                        usage_id,
                        last_inspection_time_ns: now_ns,
                        material_name: s.loaded_material_name.clone(),
                        parameter_set: s.parameter_set,
                        instanced_data: overlaid,
                    },
                );
            }
        }
        changes
    }

    /// spec.md §4.6.7 custom-sync mutator: recomputes a single usage's
    /// custom-loaded record from scratch, or deletes it once it has no
    /// custom parameters left. Runs as its own phase, independent of
    /// the main inspection pass, on custom-instanced-parameter
    /// insert/change/delete events; stamps the result with the shared
    /// `custom_sync_inspection_marker_ns`.
    pub fn sync_custom_usage(
        &mut self,
        usage_id: MaterialInstanceUsageId,
        instanced_layout: Option<&kan_graphics_types::resource_contract::InstancedAttributeSource>,
    ) {
        let Some(usage) = self.usages.iter().find(|u| u.usage_id == usage_id).cloned() else {
            self.custom_loaded.remove(&usage_id);
            return;
        };
        let Some(custom_params) = usage.custom_instanced_parameters.filter(|p| !p.is_empty()) else {
            self.custom_loaded.remove(&usage_id);
            return;
        };
        let Some(instance) = self.instances.get(&usage.instance_name) else {
            self.custom_loaded.remove(&usage_id);
            return;
        };
        let mut instanced_data = instance.loaded.instanced_data.clone();
        if let Some(layout) = instanced_layout {
            overlay_instanced_attributes(&mut instanced_data, layout, &custom_params);
        }
        let last_inspection_time_ns = self.singleton.custom_sync_inspection_marker_ns;
        self.custom_loaded.insert(
            usage_id,
            CustomLoadedMaterialInstance {
                usage_id,
                last_inspection_time_ns,
                material_name: instance.loaded.material_name.clone(),
                parameter_set: instance.loaded.parameter_set,
                instanced_data,
            },
        );
    }

    /// spec.md §4.6.8: material update reaction. Invalidates any
    /// static whose loaded/loading material matches `material_name`
    /// and could not be re-inspected this frame.
    pub fn on_material_updated(&mut self, material_name: &str, reinspected_this_frame: &[String]) {
        for s in self.statics.values_mut() {
            let matches = s.loaded_material_name.as_deref() == Some(material_name)
                || s.loading_material_name.as_deref() == Some(material_name);
            if matches && !reinspected_this_frame.contains(&s.name) {
                s.parameter_set = None;
                s.buffers.clear();
                s.loaded_material_name = None;
            }
        }
    }

    /// spec.md §4.6.9: texture update reaction. Returns the names of
    /// statics that bind `texture_name`, batched by the caller in
    /// chunks of up to K for image-only parameter-set rebinds.
    pub fn statics_bound_to_texture(&self, texture_name: &str) -> Vec<String> {
        self.statics
            .values()
            .filter(|s| s.images.iter().any(|img| img.texture_name == texture_name))
            .map(|s| s.name.clone())
            .collect()
    }
}

fn write_param(bytes: &mut [u8], offset: usize, param: &ParameterAssignment) {
    let size = param.value.ty().byte_size() as usize;
    if offset + size > bytes.len() {
        warn!("parameter {} write out of bounds, skipping", param.name);
        return;
    }
    param.value.write_into(&mut bytes[offset..offset + size]);
}

/// spec.md §4.6.7: only `float32`/`uint32`/`sint32` item formats are
/// legal for instanced attributes; vector classes map to matching
/// `f/u/s N` parameter types and matrix classes require a float32
/// base. Anything else is logged and skipped.
fn write_instanced_attributes(
    layout: &kan_graphics_types::resource_contract::InstancedAttributeSource,
    params: Option<&Vec<ParameterAssignment>>,
) -> Vec<u8> {
    let mut bytes = vec![0u8; layout.block_size as usize];
    if let Some(params) = params {
        overlay_instanced_attributes(&mut bytes, layout, params);
    }
    bytes
}

/// Writes each of `params` into `bytes` at its attribute's offset,
/// leaving everything else untouched — used both to build an
/// instance's base instanced-data bytes and, per spec.md §4.6.7, to
/// overlay a usage's custom parameters on top of an inherited copy of
/// those bytes.
fn overlay_instanced_attributes(
    bytes: &mut Vec<u8>,
    layout: &kan_graphics_types::resource_contract::InstancedAttributeSource,
    params: &[ParameterAssignment],
) {
    if bytes.len() < layout.block_size as usize {
        bytes.resize(layout.block_size as usize, 0);
    }
    for meta in &layout.main_parameters {
        let Some(param) = params.iter().find(|p| p.name == meta.name) else {
            continue;
        };
        if param.value.ty() != meta.ty {
            warn!("instanced parameter {} type mismatch, skipping", meta.name);
            continue;
        }
        write_param(bytes, meta.offset as usize, param);
    }
}

/// spec.md §4.4.2-style conversion: vertex attribute class/format to
/// legality for instanced attributes (only float32/uint32/sint32 base
/// formats are legal there).
pub fn instanced_item_format_is_legal(format: ItemFormat, class: AttributeClass) -> bool {
    let base_legal = matches!(format, ItemFormat::Float32 | ItemFormat::Uint32 | ItemFormat::Sint32);
    let matrix_requires_float = matches!(class, AttributeClass::Mat3x3 | AttributeClass::Mat4x4)
        && format != ItemFormat::Float32;
    base_legal && !matrix_requires_float
}

#[cfg(test)]
mod tests {
    use super::*;
    use kan_graphics_types::resource_contract::{
        BufferBindingMeta, MainParameterMeta, MetaBufferKind, ParameterType, ParameterValue,
    };

    #[test]
    fn stage_static_buffer_writes_main_parameter() {
        let meta = BufferBindingMeta {
            name: "ubo".to_string(),
            binding: 0,
            kind: MetaBufferKind::Uniform,
            main_parameters: vec![MainParameterMeta {
                name: "tint".to_string(),
                ty: ParameterType::F4,
                offset: 0,
                total_item_count: 1,
            }],
            tail_name: None,
            tail_item_size: 0,
            tail_item_parameters: Vec::new(),
        };
        let data = CompiledMaterialInstanceStatic {
            material: "mat".to_string(),
            parameters: vec![ParameterAssignment {
                name: "tint".to_string(),
                value: ParameterValue::F4([1.0, 0.5, 0.25, 1.0]),
            }],
            samplers: Vec::new(),
            images: Vec::new(),
            tail_set: Vec::new(),
            tail_append: Vec::new(),
        };
        let bytes = MaterialInstanceEngine::stage_static_buffer(&data, &meta);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
    }

    #[test]
    fn mip_propagation_aggregates_best_and_worst() {
        let mut engine = MaterialInstanceEngine::new();
        engine.usage_insert(MaterialInstanceUsage {
            usage_id: MaterialInstanceUsageId::INVALID,
            instance_name: "inst".to_string(),
            image_best_advised_mip: 2,
            image_worst_advised_mip: 5,
            custom_instanced_parameters: None,
        });
        engine.instances.get_mut("inst").unwrap().static_name = Some("static".to_string());
        engine.statics.insert("static".to_string(), StaticState::new("static"));
        let changed = engine.propagate_mips();
        assert_eq!(changed, vec!["static".to_string()]);
        assert_eq!(engine.statics["static"].best_advised_mip, 2);
        assert_eq!(engine.statics["static"].worst_advised_mip, 5);
    }

    #[test]
    fn instanced_attribute_legality() {
        assert!(instanced_item_format_is_legal(ItemFormat::Float32, AttributeClass::Vec3));
        assert!(!instanced_item_format_is_legal(ItemFormat::Uint16, AttributeClass::Vec3));
        assert!(!instanced_item_format_is_legal(ItemFormat::Uint32, AttributeClass::Mat4x4));
    }

    fn compiled_static(material: &str) -> CompiledMaterialInstanceStatic {
        CompiledMaterialInstanceStatic {
            material: material.to_string(),
            parameters: Vec::new(),
            samplers: Vec::new(),
            images: Vec::new(),
            tail_set: Vec::new(),
            tail_append: Vec::new(),
        }
    }

    #[test]
    fn static_inspection_mints_and_later_drops_kept_material_usage() {
        let mut engine = MaterialInstanceEngine::new();
        engine.statics.insert("static".to_string(), StaticState::new("static"));

        let first = compiled_static("mat-a");
        let changes = engine.inspect_static("static", 1, Some((&first, true)));
        assert_eq!(
            changes,
            vec![MaterialUsageChange::Insert {
                usage_id: engine.statics["static"].current_material_usage_id.unwrap(),
                name: "mat-a".to_string(),
            }]
        );
        assert!(engine.statics["static"].kept_material_usage_id.is_none());
        let first_usage = engine.statics["static"].current_material_usage_id.unwrap();

        let second = compiled_static("mat-b");
        let changes = engine.inspect_static("static", 2, Some((&second, true)));
        let second_usage = engine.statics["static"].current_material_usage_id.unwrap();
        assert_ne!(first_usage, second_usage);
        assert_eq!(engine.statics["static"].kept_material_usage_id, Some(first_usage));
        assert!(changes
            .iter()
            .any(|c| matches!(c, MaterialUsageChange::Insert { usage_id, name } if *usage_id == second_usage && name == "mat-b")));

        let reload = compiled_static("mat-b");
        let changes = engine.inspect_static("static", 3, Some((&reload, true)));
        assert!(engine.statics["static"].kept_material_usage_id.is_none());
        assert_eq!(
            changes,
            vec![MaterialUsageChange::Remove {
                usage_id: first_usage,
                name: "mat-a".to_string(),
            }]
        );
    }

    #[test]
    fn unlink_static_releases_current_and_kept_material_usages() {
        let mut engine = MaterialInstanceEngine::new();
        engine.statics.insert(
            "static".to_string(),
            StaticState {
                refcount: 1,
                ..StaticState::new("static")
            },
        );
        let first = compiled_static("mat-a");
        engine.inspect_static("static", 1, Some((&first, true)));
        let second = compiled_static("mat-b");
        engine.inspect_static("static", 2, Some((&second, true)));
        let (current, kept) = {
            let s = &engine.statics["static"];
            (s.current_material_usage_id.unwrap(), s.kept_material_usage_id.unwrap())
        };

        let (_, changes) = engine.unlink_static("static");
        assert!(!engine.statics.contains_key("static"));
        assert!(changes
            .iter()
            .any(|c| matches!(c, MaterialUsageChange::Remove { usage_id, .. } if *usage_id == current)));
        assert!(changes
            .iter()
            .any(|c| matches!(c, MaterialUsageChange::Remove { usage_id, .. } if *usage_id == kept)));
    }

    #[test]
    fn propagate_to_instances_creates_and_clears_custom_loaded_record() {
        let layout = kan_graphics_types::resource_contract::InstancedAttributeSource {
            block_size: 4,
            main_parameters: vec![kan_graphics_types::resource_contract::InstancedParameterMeta {
                name: "tint_r".to_string(),
                ty: ParameterType::F1,
                offset: 0,
            }],
        };

        let mut engine = MaterialInstanceEngine::new();
        engine.statics.insert(
            "static".to_string(),
            StaticState {
                loaded_material_name: Some("mat".to_string()),
                ..StaticState::new("static")
            },
        );
        engine.instances.insert(
            "inst".to_string(),
            MaterialInstanceState {
                static_name: Some("static".to_string()),
                ..MaterialInstanceState::new("inst")
            },
        );
        let usage_id = MaterialInstanceUsageId::INVALID;
        engine.usage_insert(MaterialInstanceUsage {
            usage_id,
            instance_name: "inst".to_string(),
            image_best_advised_mip: 0,
            image_worst_advised_mip: 0,
            custom_instanced_parameters: Some(vec![ParameterAssignment {
                name: "tint_r".to_string(),
                value: ParameterValue::F1(0.75),
            }]),
        });

        engine.propagate_to_instances("static", Some(&layout), &HashMap::new(), 10);
        let record = engine.custom_loaded.get(&usage_id).expect("custom record created");
        assert_eq!(record.material_name.as_deref(), Some("mat"));
        assert_eq!(&record.instanced_data[0..4], &0.75f32.to_le_bytes());

        engine.usages[0].custom_instanced_parameters = None;
        engine.propagate_to_instances("static", Some(&layout), &HashMap::new(), 11);
        assert!(engine.custom_loaded.get(&usage_id).is_none());
    }

    #[test]
    fn sync_custom_usage_recomputes_and_deletes() {
        let layout = kan_graphics_types::resource_contract::InstancedAttributeSource {
            block_size: 4,
            main_parameters: vec![kan_graphics_types::resource_contract::InstancedParameterMeta {
                name: "tint_r".to_string(),
                ty: ParameterType::F1,
                offset: 0,
            }],
        };

        let mut engine = MaterialInstanceEngine::new();
        engine.instances.insert(
            "inst".to_string(),
            MaterialInstanceState {
                loaded: LoadedMaterialInstance {
                    material_name: Some("mat".to_string()),
                    parameter_set: None,
                    instanced_data: vec![0u8; 4],
                },
                ..MaterialInstanceState::new("inst")
            },
        );
        let usage_id = MaterialInstanceUsageId::INVALID;
        engine.usages.push(MaterialInstanceUsage {
            usage_id,
            instance_name: "inst".to_string(),
            image_best_advised_mip: 0,
            image_worst_advised_mip: 0,
            custom_instanced_parameters: Some(vec![ParameterAssignment {
                name: "tint_r".to_string(),
                value: ParameterValue::F1(0.5),
            }]),
        });

        engine.sync_custom_usage(usage_id, Some(&layout));
        let record = engine.custom_loaded.get(&usage_id).expect("custom record created");
        assert_eq!(&record.instanced_data[0..4], &0.5f32.to_le_bytes());

        engine.usages[0].custom_instanced_parameters = None;
        engine.sync_custom_usage(usage_id, Some(&layout));
        assert!(engine.custom_loaded.get(&usage_id).is_none());
    }
}
