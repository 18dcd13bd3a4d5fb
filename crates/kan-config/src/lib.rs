//! Render backend configuration (spec.md §4.2.1) and the atomic debug
//! mode flags the backend checks on hot paths, mirroring the teacher's
//! `config::config::AtomicGfxDebugModes`.

pub mod debug;
pub mod render_config;

pub use debug::AtomicGfxDebugModes;
pub use render_config::RenderConfig;
