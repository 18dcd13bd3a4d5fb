//! Surface and swap-chain lifecycle (spec.md §4.2.3).

use ash::khr::{surface, swapchain};
use ash::vk;

use crate::device::Device;
use crate::error::BackendError;

const PREFERRED_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;
const PREFERRED_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

pub struct Swapchain {
    pub loader: swapchain::Device,
    pub handle: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    /// One per frame-in-flight, spec.md §4.2.3 "one image-available
    /// semaphore per frame-in-flight".
    pub image_available_semaphores: Vec<vk::Semaphore>,
}

impl Swapchain {
    /// spec.md §4.2.3 "Swap-chain construction".
    pub fn new(
        device: &Device,
        surface_loader: &surface::Instance,
        surface: vk::SurfaceKHR,
        window_size: (u32, u32),
        frames_in_flight: u32,
        prefer_vsync: bool,
        old_swapchain: Option<vk::SwapchainKHR>,
    ) -> Result<Self, BackendError> {
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(device.physical_device, surface)
        }
        .map_err(BackendError::from)?;
        if formats.is_empty() {
            return Err(BackendError::NoSurfaceFormats);
        }
        let chosen_format = formats
            .iter()
            .find(|f| f.format == PREFERRED_FORMAT && f.color_space == PREFERRED_COLOR_SPACE)
            .copied()
            .unwrap_or(formats[0]);

        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device.physical_device, surface)
        }
        .map_err(BackendError::from)?;
        if present_modes.is_empty() {
            return Err(BackendError::NoPresentModes);
        }
        let desired_present_mode = if prefer_vsync {
            vk::PresentModeKHR::FIFO
        } else {
            vk::PresentModeKHR::IMMEDIATE
        };
        let present_mode = present_modes
            .iter()
            .find(|m| **m == desired_present_mode)
            .copied()
            .unwrap_or(vk::PresentModeKHR::FIFO);

        let capabilities = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(device.physical_device, surface)
        }
        .map_err(BackendError::from)?;

        let extent = clamp_extent(window_size, &capabilities);

        let desired_image_count = frames_in_flight + 1;
        let image_count = if capabilities.max_image_count == 0 {
            desired_image_count.max(capabilities.min_image_count + 1)
        } else {
            desired_image_count
                .max(capabilities.min_image_count + 1)
                .min(capabilities.max_image_count)
        };

        let loader = swapchain::Device::new(&device.instance.vk_instance, &device.vk_device);

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(chosen_format.format)
            .image_color_space(chosen_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);
        if let Some(old) = old_swapchain {
            create_info = create_info.old_swapchain(old);
        }

        let handle = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(BackendError::SwapchainCreation)?;
        let images = unsafe { loader.get_swapchain_images(handle) }.map_err(BackendError::from)?;

        let image_views = images
            .iter()
            .map(|image| create_view(device, *image, chosen_format.format))
            .collect::<Result<Vec<_>, _>>()?;

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let image_available_semaphores = (0..frames_in_flight)
            .map(|_| unsafe { device.vk_device.create_semaphore(&semaphore_info, None) })
            .collect::<Result<Vec<_>, _>>()
            .map_err(BackendError::from)?;

        Ok(Self {
            loader,
            handle,
            format: chosen_format.format,
            extent,
            images,
            image_views,
            image_available_semaphores,
        })
    }

    /// # Safety
    /// Caller must have waited device-idle first (spec.md §4.2.3
    /// shutdown callback).
    pub unsafe fn destroy(&self, device: &Device) {
        for view in &self.image_views {
            device.vk_device.destroy_image_view(*view, None);
        }
        for semaphore in &self.image_available_semaphores {
            device.vk_device.destroy_semaphore(*semaphore, None);
        }
        self.loader.destroy_swapchain(self.handle, None);
    }
}

fn clamp_extent(window_size: (u32, u32), capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: window_size
            .0
            .clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: window_size
            .1
            .clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

fn create_view(device: &Device, image: vk::Image, format: vk::Format) -> Result<vk::ImageView, BackendError> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping::default())
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    unsafe { device.vk_device.create_image_view(&create_info, None) }.map_err(BackendError::from)
}

/// One registered window surface, tracked by the render backend
/// session's surface list (spec.md §4.2.3, §3.5).
pub struct Surface {
    pub surface_loader: surface::Instance,
    pub handle: vk::SurfaceKHR,
    pub swapchain: Option<Swapchain>,
    pub needs_recreation: bool,
    /// Frame-in-flight index at which the current image was acquired;
    /// `None` means no image is currently acquired for this surface.
    pub acquired_image_frame: Option<u32>,
    pub acquired_image_index: u32,
    pub last_known_window_size: (u32, u32),
}

impl Surface {
    pub fn new(surface_loader: surface::Instance, handle: vk::SurfaceKHR, window_size: (u32, u32)) -> Self {
        Self {
            surface_loader,
            handle,
            swapchain: None,
            needs_recreation: true,
            acquired_image_frame: None,
            acquired_image_index: 0,
            last_known_window_size: window_size,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.swapchain.is_some() && !self.needs_recreation
    }
}
