//! Recyclable object pools, mirroring the teacher's `pool` crate.
//!
//! The render frontend allocates a lot of short-lived, same-shaped
//! scratch data every frame/inspection (staging byte buffers for
//! material-instance uniform data, `Vec<DescriptorBindingUpdate>` for
//! parameter-set updates, per-glyph work lists). Pulling these from a
//! pool instead of the allocator keeps steady-state frame cost flat.

pub mod arc;
pub mod datatypes;
pub mod mt_datatypes;
pub mod mt_pool;
pub mod pool;
pub mod traits;

pub use arc::PoolArc;
pub use datatypes::PoolVec;
pub use pool::Pool;
