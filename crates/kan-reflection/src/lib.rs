//! The contract of the "reflective dataflow substrate" the material,
//! material-instance, and text engines run on top of (spec.md §1, §5).
//!
//! The real registry/patch-builder/migration-engine triplet is out of
//! scope and unspecified beyond its contract; this crate provides only
//! that contract — a typed insert/change/delete event stream over
//! logically indexed records, and a checkpoint-ordered mutator
//! scheduler — plus a minimal in-memory implementation so the engines
//! in `kan-render-foundation` are unit-testable without the real
//! substrate.

pub mod events;
pub mod graph;

pub use events::{EventQueue, UsageEvent};
pub use graph::{Checkpoint, Mutator, MutatorGraph};
