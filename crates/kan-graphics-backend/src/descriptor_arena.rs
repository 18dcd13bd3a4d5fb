//! Descriptor Set Arena (C1, spec.md §4.1): pools descriptor sets for a
//! given layout, growing on demand and releasing pools once empty.
//!
//! This module deliberately stops short of a real `ash::vk::DescriptorPool`
//! wrapper — the host crate's `VulkanPoolBackend` trait below is the seam
//! a concrete Vulkan session plugs into, so the sizing/free-list logic can
//! be exercised without a real device.

use std::collections::VecDeque;

use kan_graphics_types::descriptor::{DescriptorSetLayoutDesc, DescriptorTypeCounts};

/// What the arena needs from the real backend to create/destroy a pool.
/// A Vulkan session implements this over `vkCreateDescriptorPool` /
/// `vkAllocateDescriptorSets` / `vkDestroyDescriptorPool`.
pub trait DescriptorPoolBackend {
    type Pool;
    type Set;

    fn create_pool(&mut self, capacities: &DescriptorTypeCounts, max_sets: u32) -> Self::Pool;
    fn destroy_pool(&mut self, pool: &mut Self::Pool);
    fn allocate(&mut self, pool: &mut Self::Pool, layout: &DescriptorSetLayoutDesc) -> Option<Self::Set>;
}

const DEFAULT_MAX_SETS: u32 = 64;
const DEFAULT_CAPACITY_PER_TYPE: u32 = 128;

struct PoolNode<P> {
    pool: P,
    active_allocations: u32,
    capacities: DescriptorTypeCounts,
    max_sets: u32,
}

/// Running totals used by the new-pool sizing heuristic (spec.md §4.1
/// step 2): "each per-type capacity = round(total_type_bindings_ever_allocated
/// / total_allocations_ever)".
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorArenaStats {
    pub total_allocations: u64,
    pub uniform_buffer_bindings: u64,
    pub storage_buffer_bindings: u64,
    pub combined_image_sampler_bindings: u64,
}

impl DescriptorArenaStats {
    fn record(&mut self, counts: &DescriptorTypeCounts) {
        self.total_allocations += 1;
        self.uniform_buffer_bindings += counts.uniform_buffer as u64;
        self.storage_buffer_bindings += counts.storage_buffer as u64;
        self.combined_image_sampler_bindings += counts.combined_image_sampler as u64;
    }

    fn heuristic_capacities(&self) -> DescriptorTypeCounts {
        if self.total_allocations == 0 {
            return DescriptorTypeCounts {
                uniform_buffer: DEFAULT_CAPACITY_PER_TYPE,
                storage_buffer: DEFAULT_CAPACITY_PER_TYPE,
                combined_image_sampler: DEFAULT_CAPACITY_PER_TYPE,
            };
        }
        let round = |total: u64| -> u32 {
            ((total + self.total_allocations / 2) / self.total_allocations).max(1) as u32
        };
        DescriptorTypeCounts {
            uniform_buffer: round(self.uniform_buffer_bindings),
            storage_buffer: round(self.storage_buffer_bindings),
            combined_image_sampler: round(self.combined_image_sampler_bindings),
        }
    }
}

/// An allocation handed back to the parameter-set engine: which pool it
/// came from (by index into the arena's pool list) plus the backend set.
pub struct DescriptorAllocation<S> {
    pool_index: usize,
    pub set: S,
}

/// Doubly-linked-list-of-pools arena (spec.md §4.1). Modeled as a
/// `VecDeque` of slots rather than an intrusive linked list: pools are
/// walked front-to-back on allocation and removed by index on empty,
/// which is what the teacher's equivalent structures do once hiarc
/// ownership bookkeeping is factored out.
pub struct DescriptorArena<B: DescriptorPoolBackend> {
    pools: VecDeque<PoolNode<B::Pool>>,
    stats: DescriptorArenaStats,
}

impl<B: DescriptorPoolBackend> DescriptorArena<B> {
    pub fn new() -> Self {
        Self {
            pools: VecDeque::new(),
            stats: DescriptorArenaStats::default(),
        }
    }

    pub fn stats(&self) -> DescriptorArenaStats {
        self.stats
    }

    /// spec.md §4.1 steps 1-3. Returns `None` on total allocation
    /// failure — spec.md marks this "transient"; callers retry next
    /// frame.
    pub fn allocate(
        &mut self,
        backend: &mut B,
        layout: &DescriptorSetLayoutDesc,
    ) -> Option<DescriptorAllocation<B::Set>> {
        for (index, node) in self.pools.iter_mut().enumerate() {
            if let Some(set) = backend.allocate(&mut node.pool, layout) {
                node.active_allocations += 1;
                self.stats.record(&layout.counts_by_type());
                return Some(DescriptorAllocation { pool_index: index, set });
            }
        }

        let capacities = self.stats.heuristic_capacities();
        let pool = backend.create_pool(&capacities, DEFAULT_MAX_SETS);
        self.pools.push_back(PoolNode {
            pool,
            active_allocations: 0,
            capacities,
            max_sets: DEFAULT_MAX_SETS,
        });
        let index = self.pools.len() - 1;
        let node = &mut self.pools[index];
        let set = backend.allocate(&mut node.pool, layout)?;
        node.active_allocations += 1;
        self.stats.record(&layout.counts_by_type());
        Some(DescriptorAllocation { pool_index: index, set })
    }

    /// spec.md §4.1 "Freeing": decrements active count, destroys the
    /// pool once it reaches zero.
    pub fn free(&mut self, backend: &mut B, allocation: DescriptorAllocation<B::Set>) {
        let DescriptorAllocation { pool_index, set: _ } = allocation;
        if let Some(node) = self.pools.get_mut(pool_index) {
            node.active_allocations = node.active_allocations.saturating_sub(1);
            if node.active_allocations == 0 {
                let mut node = self.pools.remove(pool_index).expect("index just checked");
                backend.destroy_pool(&mut node.pool);
            }
        }
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }
}

impl<B: DescriptorPoolBackend> Default for DescriptorArena<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kan_graphics_types::descriptor::{DescriptorBindingType, DescriptorSetLayoutBinding};

    #[derive(Default)]
    struct FakeBackend {
        next_pool_id: u32,
        /// Remaining capacity per pool id, simulating exhaustion.
        capacity: std::collections::HashMap<u32, u32>,
    }

    impl DescriptorPoolBackend for FakeBackend {
        type Pool = u32;
        type Set = u32;

        fn create_pool(&mut self, _capacities: &DescriptorTypeCounts, max_sets: u32) -> Self::Pool {
            self.next_pool_id += 1;
            self.capacity.insert(self.next_pool_id, max_sets);
            self.next_pool_id
        }

        fn destroy_pool(&mut self, pool: &mut Self::Pool) {
            self.capacity.remove(pool);
        }

        fn allocate(&mut self, pool: &mut Self::Pool, _layout: &DescriptorSetLayoutDesc) -> Option<Self::Set> {
            let remaining = self.capacity.get_mut(pool)?;
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
            Some(*pool)
        }
    }

    fn layout() -> DescriptorSetLayoutDesc {
        DescriptorSetLayoutDesc {
            bindings: vec![DescriptorSetLayoutBinding {
                index: 0,
                ty: DescriptorBindingType::UniformBuffer,
                stable_binding: true,
                name: "frame".to_string(),
            }],
        }
    }

    #[test]
    fn grows_a_new_pool_when_none_exist() {
        let mut backend = FakeBackend::default();
        let mut arena: DescriptorArena<FakeBackend> = DescriptorArena::new();
        let alloc = arena.allocate(&mut backend, &layout()).expect("allocates");
        assert_eq!(arena.pool_count(), 1);
        assert_eq!(arena.stats().total_allocations, 1);
        arena.free(&mut backend, alloc);
        assert_eq!(arena.pool_count(), 0, "pool destroyed once empty");
    }

    #[test]
    fn heuristic_uses_observed_average_after_first_pool() {
        let mut backend = FakeBackend::default();
        let mut arena: DescriptorArena<FakeBackend> = DescriptorArena::new();
        let a = arena.allocate(&mut backend, &layout()).unwrap();
        let b = arena.allocate(&mut backend, &layout()).unwrap();
        // Both came from the same (first) pool since it has free capacity.
        assert_eq!(arena.pool_count(), 1);
        arena.free(&mut backend, a);
        arena.free(&mut backend, b);
        assert_eq!(arena.pool_count(), 0);
    }
}
