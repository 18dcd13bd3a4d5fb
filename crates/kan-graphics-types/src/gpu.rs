//! Physical device enumeration (spec.md §4.2.1/§4.2.2), mirroring the
//! teacher's `graphics_types::gpu` module.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuType {
    Unknown,
    Integrated,
    Discrete,
    Virtual,
    Cpu,
}

/// Inferred from heap visibility (spec.md §4.2.1 step 4): any
/// device-local heap that is not host-visible is `Separate`; any
/// non-coherent device-local heap is `Unified`; otherwise
/// `UnifiedCoherent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryType {
    Separate,
    Unified,
    UnifiedCoherent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gpu {
    pub id: u32,
    pub name: String,
    pub ty: GpuType,
    pub memory_type: MemoryType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gpus {
    pub gpus: Vec<Gpu>,
}

/// Heap description used purely to derive [`MemoryType`]; kept
/// separate from the raw `ash::vk::MemoryHeap` so this crate has no
/// backend dependency.
#[derive(Debug, Clone, Copy)]
pub struct MemoryHeapInfo {
    pub device_local: bool,
    pub host_visible: bool,
    pub host_coherent: bool,
}

pub fn infer_memory_type(heaps: &[MemoryHeapInfo]) -> MemoryType {
    let device_local_heaps = heaps.iter().filter(|h| h.device_local);
    let mut any_device_local = false;
    let mut any_separate = false;
    let mut any_non_coherent = false;

    for heap in device_local_heaps {
        any_device_local = true;
        if !heap.host_visible {
            any_separate = true;
        } else if !heap.host_coherent {
            any_non_coherent = true;
        }
    }

    if !any_device_local {
        // No device-local heap at all (e.g. a software rasterizer): treat
        // conservatively as separate, matching "not host-visible" default.
        return MemoryType::Separate;
    }
    if any_separate {
        MemoryType::Separate
    } else if any_non_coherent {
        MemoryType::Unified
    } else {
        MemoryType::UnifiedCoherent
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CurGpu {
    pub id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separate_wins_over_unified() {
        let heaps = [
            MemoryHeapInfo {
                device_local: true,
                host_visible: false,
                host_coherent: false,
            },
            MemoryHeapInfo {
                device_local: true,
                host_visible: true,
                host_coherent: true,
            },
        ];
        assert_eq!(infer_memory_type(&heaps), MemoryType::Separate);
    }

    #[test]
    fn unified_coherent_when_all_local_heaps_visible_and_coherent() {
        let heaps = [MemoryHeapInfo {
            device_local: true,
            host_visible: true,
            host_coherent: true,
        }];
        assert_eq!(infer_memory_type(&heaps), MemoryType::UnifiedCoherent);
    }

    #[test]
    fn unified_when_local_heap_visible_but_not_coherent() {
        let heaps = [MemoryHeapInfo {
            device_local: true,
            host_visible: true,
            host_coherent: false,
        }];
        assert_eq!(infer_memory_type(&heaps), MemoryType::Unified);
    }
}
