//! Window-system contract for surface lifecycle (spec.md §4.2.3).

use std::fmt::Debug;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Opaque reference to a platform window, handed back to the window
/// system by the caller of [`crate::resource_provider`]-adjacent
/// surface calls.
pub type WindowHandle = u64;

/// Implemented by the application's windowing layer (out of scope per
/// spec.md §1, "Application windowing"). The render backend session
/// registers one binding per surface and expects `init`/`shutdown` to
/// be invoked at the times spec.md §4.2.3 describes.
pub trait WindowSystem: Debug {
    type Window: HasWindowHandle + HasDisplayHandle;

    fn window(&self, handle: WindowHandle) -> Option<&Self::Window>;

    /// Current pixel size of the window, used to detect resizes that
    /// force swap-chain recreation (spec.md §4.2.4 step 3).
    fn window_size(&self, handle: WindowHandle) -> Option<(u32, u32)>;

    /// Register a surface so the window system can invoke `shutdown` on
    /// window close even if the render backend never explicitly
    /// destroys the surface first.
    fn register_surface_binding(&mut self, handle: WindowHandle, surface_index: usize);

    fn unregister_surface_binding(&mut self, surface_index: usize);
}

/// Window-system capability flags a backend requires from the caller
/// (spec.md §6.1 `get_required_window_flags`).
pub const REQUIRES_VULKAN_SUPPORT: &str = "supports-vulkan";
