//! Closed, caller-matchable failure sets, mirroring the teacher's
//! `config::traits::ConfigFromStrErr` style: a `thiserror` enum per
//! failure domain rather than one catch-all error.

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("vulkan instance creation failed: {0}")]
    InstanceCreation(#[source] ash::vk::Result),
    #[error("no physical device advertises the swap-chain extension")]
    NoSwapchainCapableDevice,
    #[error("no queue family on the selected device supports graphics")]
    NoGraphicsQueueFamily,
    #[error("no queue family on the selected device supports transfer")]
    NoTransferQueueFamily,
    #[error("no supported depth format among the preference list")]
    NoSupportedDepthFormat,
    #[error("logical device creation failed: {0}")]
    DeviceCreation(#[source] ash::vk::Result),
    #[error("surface has no supported formats")]
    NoSurfaceFormats,
    #[error("surface has no supported present modes")]
    NoPresentModes,
    #[error("swap-chain creation failed: {0}")]
    SwapchainCreation(#[source] ash::vk::Result),
    #[error("vulkan call failed: {0}")]
    Vulkan(#[source] ash::vk::Result),
    #[error("unknown surface handle")]
    UnknownSurface,
}

impl From<ash::vk::Result> for BackendError {
    fn from(value: ash::vk::Result) -> Self {
        Self::Vulkan(value)
    }
}
