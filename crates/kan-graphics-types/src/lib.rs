//! Backend entity and resource-contract data types shared across the
//! render frontend (spec.md §3.2 and §6.2).

pub mod buffer;
pub mod descriptor;
pub mod gpu;
pub mod handles;
pub mod image;
pub mod pipeline;
pub mod resource_contract;

pub use handles::*;
