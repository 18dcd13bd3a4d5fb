use serde::{Deserialize, Serialize};

/// `(application_name, major, minor, patch, disable_render?,
/// prefer_vsync?)` (spec.md §4.2.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub application_name: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub disable_render: bool,
    pub prefer_vsync: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            application_name: "kan-application".to_string(),
            major: 0,
            minor: 1,
            patch: 0,
            disable_render: false,
            prefer_vsync: true,
        }
    }
}

/// Fixed per spec.md §4.2.1 step 2: "Create instance with engine name
/// `Kan`, API version 1.1."
pub const ENGINE_NAME: &str = "Kan";
pub const ENGINE_API_MAJOR: u32 = 1;
pub const ENGINE_API_MINOR: u32 = 1;
