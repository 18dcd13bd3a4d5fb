//! Image description (spec.md §3.2 and §4.2.2 step 3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    R8Unorm,
    Rgba8Unorm,
    Bgra8Srgb,
    D32Sfloat,
    D32SfloatS8Uint,
    D24UnormS8Uint,
}

impl ImageFormat {
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::D32SfloatS8Uint | Self::D24UnormS8Uint)
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Self::D32Sfloat | Self::D32SfloatS8Uint | Self::D24UnormS8Uint)
    }
}

/// Depth formats considered in order of preference, spec.md §4.2.2
/// step 3: `{D32_SFLOAT, D32_SFLOAT_S8_UINT, D24_UNORM_S8_UINT}`.
pub const DEPTH_FORMAT_PREFERENCE: [ImageFormat; 3] = [
    ImageFormat::D32Sfloat,
    ImageFormat::D32SfloatS8Uint,
    ImageFormat::D24UnormS8Uint,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDesc {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub layer_count: u32,
    pub mip_count: u32,
    pub render_target: bool,
    pub supports_sampling: bool,
    pub always_layered: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageDescError {
    #[error("layer_count must be >= 1, got {0}")]
    ZeroLayers(u32),
    #[error("mip_count must be >= 1, got {0}")]
    ZeroMips(u32),
}

impl ImageDesc {
    pub fn validate(&self) -> Result<(), ImageDescError> {
        if self.layer_count < 1 {
            return Err(ImageDescError::ZeroLayers(self.layer_count));
        }
        if self.mip_count < 1 {
            return Err(ImageDescError::ZeroMips(self.mip_count));
        }
        Ok(())
    }
}
