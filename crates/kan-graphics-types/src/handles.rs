//! Opaque handles into backend-owned arenas (spec.md §3.1).
//!
//! Each handle is a generational `slotmap` key: distinct object kinds
//! cannot be confused with one another, stale handles from a destroyed
//! slot are rejected rather than silently aliasing a reused slot, and
//! `Key::null()` is the distinguished "zero-equivalent" invalid value
//! the spec calls for.

use slotmap::new_key_type;

new_key_type! {
    pub struct BufferHandle;
    pub struct ImageHandle;
    pub struct ImageViewHandle;
    pub struct ParameterSetLayoutHandle;
    pub struct ParameterSetHandle;
    pub struct PipelineHandle;
    pub struct FrameLifetimeAllocatorHandle;
    pub struct SurfaceHandle;
    pub struct PassHandle;
    pub struct CodeModuleHandle;
}
