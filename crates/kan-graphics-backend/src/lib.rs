//! Render Backend Session (C2, spec.md §4.2) and its two closest
//! collaborators: the Descriptor Set Arena (C1, spec.md §4.1) and the
//! Parameter Set Engine (C3, spec.md §4.3). Built on `ash`, mirroring
//! the teacher's `graphics-backend` crate's Vulkan backend.

pub mod descriptor_arena;
pub mod device;
pub mod error;
pub mod frame;
pub mod instance;
pub mod parameter_set;
pub mod session;
pub mod swapchain;

pub use error::BackendError;
pub use session::RenderBackendSession;
