//! Descriptor-set layout description (spec.md §3.2).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorBindingType {
    UniformBuffer,
    StorageBuffer,
    CombinedImageSampler,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorSetLayoutBinding {
    pub index: u32,
    pub ty: DescriptorBindingType,
    /// A "stable" binding keeps the same underlying buffer/image across
    /// updates (only its contents change) rather than being rebound on
    /// every [`crate::resource_contract`]-driven reload.
    pub stable_binding: bool,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptorSetLayoutDesc {
    pub bindings: Vec<DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutDesc {
    /// Per-type binding counts, used by the descriptor arena's new-pool
    /// sizing heuristic (spec.md §4.1).
    pub fn counts_by_type(&self) -> DescriptorTypeCounts {
        let mut counts = DescriptorTypeCounts::default();
        for binding in &self.bindings {
            match binding.ty {
                DescriptorBindingType::UniformBuffer => counts.uniform_buffer += 1,
                DescriptorBindingType::StorageBuffer => counts.storage_buffer += 1,
                DescriptorBindingType::CombinedImageSampler => counts.combined_image_sampler += 1,
            }
        }
        counts
    }

    pub fn binding(&self, index: u32) -> Option<&DescriptorSetLayoutBinding> {
        self.bindings.iter().find(|b| b.index == index)
    }

    pub fn binding_by_name(&self, name: &str) -> Option<&DescriptorSetLayoutBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DescriptorTypeCounts {
    pub uniform_buffer: u32,
    pub storage_buffer: u32,
    pub combined_image_sampler: u32,
}

impl DescriptorTypeCounts {
    pub fn total(&self) -> u32 {
        self.uniform_buffer + self.storage_buffer + self.combined_image_sampler
    }

    pub fn add(&mut self, other: &Self) {
        self.uniform_buffer += other.uniform_buffer;
        self.storage_buffer += other.storage_buffer;
        self.combined_image_sampler += other.combined_image_sampler;
    }
}
