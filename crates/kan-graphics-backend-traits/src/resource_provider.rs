//! Resource request contract consumed by C4/C5/C6 (spec.md §6.2).
//!
//! The resource provider itself — discovery, compilation, on-disk
//! loading — is out of scope (spec.md §1). What the material and
//! material-instance engines need from it is exactly this surface:
//! issue a request, react to it sleeping/waking, and ask for it to be
//! deleted. The actual compiled content arrives back through whatever
//! event mechanism `kan-reflection` models; this trait only carries the
//! request lifecycle half of the contract.

use std::fmt::Debug;

use kan_graphics_types::resource_contract::{ResourcePriority, ResourceRequestId, ResourceType};

#[derive(Debug, thiserror::Error)]
pub enum ResourceRequestError {
    #[error("no request with id {0:?} is tracked by the provider")]
    UnknownRequest(ResourceRequestId),
}

/// Implemented by whatever owns the real resource discovery/compilation
/// pipeline. Engines only ever see this trait.
pub trait ResourceProvider: Debug {
    /// Issue a new request for a named resource of the given type at
    /// the given priority; returns the id callers use to track it.
    fn issue_request(
        &mut self,
        ty: ResourceType,
        name: &str,
        priority: ResourcePriority,
    ) -> ResourceRequestId;

    /// Put a request to sleep: state tracking it stays alive but its
    /// content bytes may be released (spec.md §6.2).
    fn put_to_sleep(&mut self, id: ResourceRequestId) -> Result<(), ResourceRequestError>;

    /// Wake a sleeping request so it reloads its content.
    fn wake(&mut self, id: ResourceRequestId) -> Result<(), ResourceRequestError>;

    /// Schedule a request for deferred deletion.
    fn delete_request(&mut self, id: ResourceRequestId) -> Result<(), ResourceRequestError>;

    /// Raise/lower a request's priority without changing its identity,
    /// used when preload keeps a material's pipelines at `active`
    /// priority while it has usages (spec.md §4.5.2).
    fn set_priority(
        &mut self,
        id: ResourceRequestId,
        priority: ResourcePriority,
    ) -> Result<(), ResourceRequestError>;

    fn is_sleeping(&self, id: ResourceRequestId) -> bool;
    fn is_fully_loaded(&self, id: ResourceRequestId) -> bool;
}
