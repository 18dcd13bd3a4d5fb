//! Frame-lifetime short-lived attribute buffer allocator (spec.md §5,
//! "Frame lifetime buffer allocator").

use kan_graphics_types::BufferHandle;

#[derive(Debug, Clone, Copy)]
pub struct FrameLifetimeSlice {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
}

/// Supplies short-lived, per-frame GPU-visible byte ranges (e.g.
/// instanced transform attributes), recycled in bulk every frame.
pub trait FrameLifetimeAllocator {
    fn allocate(&mut self, size: u64) -> FrameLifetimeSlice;

    /// Write `bytes` at the start of a previously allocated slice.
    fn patch(&mut self, slice: FrameLifetimeSlice, bytes: &[u8]);

    /// Called once per frame by the render backend session; all slices
    /// handed out before this call become invalid for further writes.
    fn recycle_all(&mut self);
}
