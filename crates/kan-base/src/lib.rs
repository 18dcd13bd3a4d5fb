//! Identifiers shared by every render-frontend crate (spec.md §3.1).
//!
//! Opaque backend handles (buffer, image, pipeline, parameter set, ...)
//! are defined with `slotmap::new_key_type!` at their point of use in
//! `kan-graphics-types`, since a generational arena key only makes
//! sense paired with the arena that issues it.

pub mod id;

pub use id::{Id, IdAllocator};
