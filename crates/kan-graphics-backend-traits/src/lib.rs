//! The contract surface the render frontend's engines compile against
//! instead of a concrete resource provider / window system (spec.md §1
//! lists both as external collaborators; spec.md §6.2/§6.4 describe the
//! shapes that cross the boundary). Mirrors the teacher's
//! `graphics-backend-traits` crate: small, independently documented
//! trait groups rather than one monolithic interface.

pub mod frame_lifetime;
pub mod resource_provider;
pub mod window;

pub use frame_lifetime::FrameLifetimeAllocator;
pub use resource_provider::ResourceProvider;
pub use window::{WindowHandle, WindowSystem};
