//! Render foundation: pipeline family/pipeline/pass-variant store (C4),
//! material management (C5), and material instance management (C6)
//! (spec.md §2, §4.4-§4.6).

pub mod flags;
pub mod material;
pub mod material_instance;
pub mod pipeline_store;

pub use flags::{MaterialPassVariantFlagState, Reconciliation};
pub use material::{LoadedMaterial, MaterialEngine, MaterialState, PriorityChange};
pub use material_instance::{
    CustomLoadedMaterialInstance, MaterialInstanceEngine, MaterialInstanceSingleton,
    MaterialInstanceState, MaterialInstanceUsage, MaterialUsageChange, StaticState,
};
pub use pipeline_store::{
    CodeModuleHandleId, FamilyState, PipelineBackend, PipelinePassVariantState, PipelineState,
    PipelineStore,
};
