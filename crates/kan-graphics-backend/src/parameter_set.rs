//! Parameter Set Engine (C3, spec.md §4.3): creates stable/unstable
//! parameter sets on top of the descriptor arena (C1) and performs
//! copy-on-write updates.

use std::collections::HashMap;

use kan_graphics_types::descriptor::{DescriptorBindingType, DescriptorSetLayoutDesc};
use kan_graphics_types::{ImageHandle, ImageViewHandle, ParameterSetLayoutHandle};

use crate::descriptor_arena::{DescriptorArena, DescriptorPoolBackend};
use crate::session::FRAMES_IN_FLIGHT;

/// One bound sampler state, opaque to this engine beyond identity
/// (spec.md §3.2 doesn't specify sampler contents beyond "sampler
/// state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerHandle(pub u32);

#[derive(Debug, Clone, Copy)]
pub struct BufferRange {
    pub buffer: kan_graphics_types::BufferHandle,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageBinding {
    pub image: ImageHandle,
    pub array_index: u32,
    pub layer_offset: u32,
    pub layer_count: u32,
}

/// spec.md §4.3.2 input binding variants.
#[derive(Debug, Clone, Copy)]
pub enum BindingUpdate {
    Buffer(BufferRange),
    Sampler(SamplerHandle),
    Image(ImageBinding),
}

/// A bound image view this engine owns and must destroy on rebind/set
/// destruction (spec.md §3.2 "tracks bound image views (owned;
/// destroyed on rebind)").
#[derive(Debug, Clone, Copy)]
pub struct BoundImageView {
    pub view: ImageViewHandle,
    pub image: ImageHandle,
}

/// What the engine needs from the real backend to allocate descriptor
/// sets, write updates, and create/destroy image views. A Vulkan
/// session implements this in terms of `vkUpdateDescriptorSets` and
/// `vkCreateImageView`/`vkDestroyImageView`.
pub trait ParameterSetBackend: DescriptorPoolBackend {
    fn create_image_view(&mut self, image: ImageHandle, binding: &ImageBinding) -> ImageViewHandle;
    fn destroy_image_view(&mut self, view: ImageViewHandle);
    /// Applies one combined descriptor-set write (spec.md §4.3.2 step 5).
    fn write_updates(
        &mut self,
        set: &Self::Set,
        layout: &DescriptorSetLayoutDesc,
        updates: &[(u32, BindingUpdate)],
        views: &HashMap<u32, ImageViewHandle>,
    );
    /// Copies one binding's current contents from `source` to `target`
    /// (spec.md §4.3.2 step 3, copy-on-write transfer).
    fn copy_binding(&mut self, source: &Self::Set, target: &Self::Set, binding_index: u32);
    fn is_submitted(&self, set: &Self::Set) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSetKind {
    Stable,
    Unstable,
}

pub struct ParameterSet<B: ParameterSetBackend> {
    pub kind: ParameterSetKind,
    pub layout: DescriptorSetLayoutDesc,
    pub layout_handle: ParameterSetLayoutHandle,
    /// One set for `Stable`, one per frame-in-flight for `Unstable`.
    allocations: Vec<crate::descriptor_arena::DescriptorAllocation<B::Set>>,
    /// Index into `allocations` last written (unstable only).
    last_written: usize,
    /// Whether the stable set's current allocation has ever been part
    /// of a submitted command buffer (spec.md invariant 2).
    submitted: bool,
    image_views: HashMap<u32, BoundImageView>,
    pub tracking_name: String,
}

impl<B: ParameterSetBackend> ParameterSet<B> {
    /// spec.md §4.3.1.
    pub fn create(
        backend: &mut B,
        arena: &mut DescriptorArena<B>,
        layout_handle: ParameterSetLayoutHandle,
        layout: DescriptorSetLayoutDesc,
        kind: ParameterSetKind,
        tracking_name: impl Into<String>,
    ) -> Option<Self> {
        let count = match kind {
            ParameterSetKind::Stable => 1,
            ParameterSetKind::Unstable => FRAMES_IN_FLIGHT as usize,
        };
        let mut allocations = Vec::with_capacity(count);
        for _ in 0..count {
            match arena.allocate(backend, &layout) {
                Some(alloc) => allocations.push(alloc),
                None => {
                    for alloc in allocations {
                        arena.free(backend, alloc);
                    }
                    return None;
                }
            }
        }
        Some(Self {
            kind,
            layout,
            layout_handle,
            allocations,
            last_written: 0,
            submitted: false,
            image_views: HashMap::new(),
            tracking_name: tracking_name.into(),
        })
    }

    /// spec.md §4.3.2.
    pub fn update(
        &mut self,
        backend: &mut B,
        arena: &mut DescriptorArena<B>,
        current_frame_in_flight_index: usize,
        updates: &[(u32, BindingUpdate)],
        render_targets: &mut dyn RenderTargetTracker,
    ) {
        // Step 1: drop render-target attachments whose binding is
        // targeted by a new image binding for a different image.
        for (binding_index, update) in updates {
            if let BindingUpdate::Image(new_binding) = update {
                if let Some(bound) = self.image_views.get(binding_index) {
                    if bound.image != new_binding.image {
                        render_targets.detach(bound.image, self.layout_handle, *binding_index);
                    }
                }
            }
        }

        // Step 2: select source/target.
        let target_index = match self.kind {
            ParameterSetKind::Stable => {
                if self.submitted || self.allocations.is_empty() {
                    let old = if self.allocations.is_empty() {
                        None
                    } else {
                        Some(self.allocations.remove(0))
                    };
                    if let Some(old) = old {
                        arena.free(backend, old);
                    }
                    let fresh = arena
                        .allocate(backend, &self.layout)
                        .expect("fresh stable allocation should succeed after freeing the old one");
                    self.allocations.push(fresh);
                    self.submitted = false;
                    0
                } else {
                    0
                }
            }
            ParameterSetKind::Unstable => current_frame_in_flight_index % self.allocations.len(),
        };
        let source_index = match self.kind {
            ParameterSetKind::Stable => target_index,
            ParameterSetKind::Unstable => self.last_written,
        };

        // Step 3: copy-on-write transfer for every binding not
        // explicitly updated.
        if source_index != target_index {
            let updated_indices: Vec<u32> = updates.iter().map(|(i, _)| *i).collect();
            for binding in &self.layout.bindings {
                if updated_indices.contains(&binding.index) {
                    continue;
                }
                let (source_alloc, target_alloc) =
                    borrow_two(&self.allocations, source_index, target_index);
                backend.copy_binding(&source_alloc.set, &target_alloc.set, binding.index);
            }
        }

        // Step 4: apply updates, creating/destroying image views as
        // needed.
        let mut new_views = HashMap::new();
        for (binding_index, update) in updates {
            if let BindingUpdate::Image(image_binding) = update {
                if let Some(old) = self.image_views.remove(binding_index) {
                    backend.destroy_image_view(old.view);
                }
                let view = backend.create_image_view(image_binding.image, image_binding);
                self.image_views.insert(*binding_index, BoundImageView {
                    view,
                    image: image_binding.image,
                });
                new_views.insert(*binding_index, view);
            }
        }
        let set = &self.allocations[target_index].set;
        backend.write_updates(set, &self.layout, updates, &new_views);

        if let ParameterSetKind::Unstable = self.kind {
            self.last_written = target_index;
        }

        // Step 6: attach new combined-image-sampler render targets.
        for (binding_index, update) in updates {
            if let BindingUpdate::Image(image_binding) = update {
                let binding_desc = self.layout.binding(*binding_index);
                if matches!(
                    binding_desc.map(|b| b.ty),
                    Some(DescriptorBindingType::CombinedImageSampler)
                ) && render_targets.is_render_target(image_binding.image)
                {
                    render_targets.attach(image_binding.image, self.layout_handle, *binding_index);
                }
            }
        }
    }

    /// spec.md §4.3.3: schedule for deferred destruction. This engine
    /// models the schedule's *effects*; the actual frame-deferred queue
    /// is owned by the render backend session.
    pub fn destroy(
        mut self,
        backend: &mut B,
        arena: &mut DescriptorArena<B>,
        render_targets: &mut dyn RenderTargetTracker,
    ) {
        for (binding_index, bound) in self.image_views.drain() {
            render_targets.detach(bound.image, self.layout_handle, binding_index);
            backend.destroy_image_view(bound.view);
        }
        for allocation in self.allocations.drain(..) {
            arena.free(backend, allocation);
        }
    }

    pub fn mark_submitted(&mut self) {
        if self.kind == ParameterSetKind::Stable {
            self.submitted = true;
        }
    }
}

fn borrow_two<T>(items: &[T], a: usize, b: usize) -> (&T, &T) {
    assert_ne!(a, b);
    if a < b {
        let (left, right) = items.split_at(b);
        (&left[a], &right[0])
    } else {
        let (left, right) = items.split_at(a);
        (&right[0], &left[b])
    }
}

/// Bidirectional render-target back-reference tracking (spec.md §4.3.2
/// step 6, §3.2 "render-target attachments (weak back-references)").
/// Implemented by whatever owns the image arena.
pub trait RenderTargetTracker {
    fn is_render_target(&self, image: ImageHandle) -> bool;
    fn attach(&mut self, image: ImageHandle, set_layout: ParameterSetLayoutHandle, binding: u32);
    fn detach(&mut self, image: ImageHandle, set_layout: ParameterSetLayoutHandle, binding: u32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use kan_graphics_types::descriptor::{DescriptorBindingType, DescriptorSetLayoutBinding, DescriptorTypeCounts};
    use slotmap::SlotMap;

    #[derive(Default)]
    struct FakeBackend {
        next_id: u32,
        views_created: u32,
        views_destroyed: u32,
        copies: u32,
        writes: u32,
    }

    impl DescriptorPoolBackend for FakeBackend {
        type Pool = u32;
        type Set = u32;

        fn create_pool(&mut self, _capacities: &DescriptorTypeCounts, _max_sets: u32) -> Self::Pool {
            self.next_id += 1;
            self.next_id
        }

        fn destroy_pool(&mut self, _pool: &mut Self::Pool) {}

        fn allocate(&mut self, _pool: &mut Self::Pool, _layout: &DescriptorSetLayoutDesc) -> Option<Self::Set> {
            self.next_id += 1;
            Some(self.next_id)
        }
    }

    impl ParameterSetBackend for FakeBackend {
        fn create_image_view(&mut self, _image: ImageHandle, _binding: &ImageBinding) -> ImageViewHandle {
            self.views_created += 1;
            let mut map: SlotMap<ImageViewHandle, ()> = SlotMap::with_key();
            map.insert(())
        }

        fn destroy_image_view(&mut self, _view: ImageViewHandle) {
            self.views_destroyed += 1;
        }

        fn write_updates(
            &mut self,
            _set: &Self::Set,
            _layout: &DescriptorSetLayoutDesc,
            _updates: &[(u32, BindingUpdate)],
            _views: &HashMap<u32, ImageViewHandle>,
        ) {
            self.writes += 1;
        }

        fn copy_binding(&mut self, _source: &Self::Set, _target: &Self::Set, _binding_index: u32) {
            self.copies += 1;
        }

        fn is_submitted(&self, _set: &Self::Set) -> bool {
            false
        }
    }

    struct NullRenderTargets;
    impl RenderTargetTracker for NullRenderTargets {
        fn is_render_target(&self, _image: ImageHandle) -> bool {
            false
        }
        fn attach(&mut self, _image: ImageHandle, _set_layout: ParameterSetLayoutHandle, _binding: u32) {}
        fn detach(&mut self, _image: ImageHandle, _set_layout: ParameterSetLayoutHandle, _binding: u32) {}
    }

    fn two_binding_layout() -> DescriptorSetLayoutDesc {
        DescriptorSetLayoutDesc {
            bindings: vec![
                DescriptorSetLayoutBinding {
                    index: 0,
                    ty: DescriptorBindingType::UniformBuffer,
                    stable_binding: true,
                    name: "frame".to_string(),
                },
                DescriptorSetLayoutBinding {
                    index: 1,
                    ty: DescriptorBindingType::CombinedImageSampler,
                    stable_binding: false,
                    name: "albedo".to_string(),
                },
            ],
        }
    }

    fn layout_handle() -> ParameterSetLayoutHandle {
        let mut map: SlotMap<ParameterSetLayoutHandle, ()> = SlotMap::with_key();
        map.insert(())
    }

    #[test]
    fn stable_set_reallocates_once_submitted() {
        let mut backend = FakeBackend::default();
        let mut arena: DescriptorArena<FakeBackend> = DescriptorArena::new();
        let mut targets = NullRenderTargets;
        let mut set = ParameterSet::create(
            &mut backend,
            &mut arena,
            layout_handle(),
            two_binding_layout(),
            ParameterSetKind::Stable,
            "test-stable",
        )
        .expect("allocation should succeed");

        set.update(
            &mut backend,
            &mut arena,
            0,
            &[(0, BindingUpdate::Buffer(BufferRange {
                buffer: kan_graphics_types::BufferHandle::default(),
                offset: 0,
                size: 64,
            }))],
            &mut targets,
        );
        assert_eq!(arena.pool_count(), 1, "first update reuses the initial allocation");

        set.mark_submitted();
        set.update(
            &mut backend,
            &mut arena,
            0,
            &[(0, BindingUpdate::Buffer(BufferRange {
                buffer: kan_graphics_types::BufferHandle::default(),
                offset: 0,
                size: 64,
            }))],
            &mut targets,
        );
        assert!(backend.copies == 0, "binding 0 was explicitly updated, no copy-on-write needed");
    }

    #[test]
    fn unstable_set_allocates_one_set_per_frame_in_flight() {
        let mut backend = FakeBackend::default();
        let mut arena: DescriptorArena<FakeBackend> = DescriptorArena::new();
        let set = ParameterSet::create(
            &mut backend,
            &mut arena,
            layout_handle(),
            two_binding_layout(),
            ParameterSetKind::Unstable,
            "test-unstable",
        )
        .expect("allocation should succeed");
        assert_eq!(set.allocations.len(), FRAMES_IN_FLIGHT as usize);
    }
}
