//! Device selection (spec.md §4.2.2): queue family discovery, depth
//! format selection, logical device and frame synchronization object
//! creation.

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;
use kan_graphics_types::image::{ImageFormat, DEPTH_FORMAT_PREFERENCE};
use log::info;

use crate::error::BackendError;
use crate::instance::Instance;

pub const SWAPCHAIN_EXTENSION: &CStr = vk::KHR_SWAPCHAIN_NAME;

#[derive(Debug, Clone, Copy)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub transfer: u32,
}

impl QueueFamilies {
    pub fn shared(&self) -> bool {
        self.graphics == self.transfer
    }
}

fn to_vk_format(format: ImageFormat) -> vk::Format {
    match format {
        ImageFormat::D32Sfloat => vk::Format::D32_SFLOAT,
        ImageFormat::D32SfloatS8Uint => vk::Format::D32_SFLOAT_S8_UINT,
        ImageFormat::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        ImageFormat::R8Unorm => vk::Format::R8_UNORM,
        ImageFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        ImageFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
    }
}

/// spec.md §4.2.2 step 1.
pub fn supports_swapchain_extension(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<bool, BackendError> {
    let extensions = unsafe {
        instance
            .vk_instance
            .enumerate_device_extension_properties(physical_device)
    }
    .map_err(BackendError::from)?;
    Ok(extensions.iter().any(|ext| {
        let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
        name == SWAPCHAIN_EXTENSION
    }))
}

/// spec.md §4.2.2 step 2: "Find the first queue family with graphics
/// support and the first with transfer support. Reuse the same queue
/// family if it provides both."
pub fn select_queue_families(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<QueueFamilies, BackendError> {
    let families = unsafe {
        instance
            .vk_instance
            .get_physical_device_queue_family_properties(physical_device)
    };

    let combined = families.iter().position(|f| {
        f.queue_flags.contains(vk::QueueFlags::GRAPHICS) && f.queue_flags.contains(vk::QueueFlags::TRANSFER)
    });
    if let Some(index) = combined {
        let index = index as u32;
        return Ok(QueueFamilies {
            graphics: index,
            transfer: index,
        });
    }

    let graphics = families
        .iter()
        .position(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|i| i as u32)
        .ok_or(BackendError::NoGraphicsQueueFamily)?;
    let transfer = families
        .iter()
        .position(|f| f.queue_flags.contains(vk::QueueFlags::TRANSFER))
        .map(|i| i as u32)
        .ok_or(BackendError::NoTransferQueueFamily)?;

    Ok(QueueFamilies { graphics, transfer })
}

/// spec.md §4.2.2 step 3: first supported depth format from the
/// preference list with depth-stencil-attachment optimal-tiling
/// support.
pub fn select_depth_format(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<(ImageFormat, bool), BackendError> {
    for candidate in DEPTH_FORMAT_PREFERENCE {
        let props = unsafe {
            instance
                .vk_instance
                .get_physical_device_format_properties(physical_device, to_vk_format(candidate))
        };
        if props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        {
            return Ok((candidate, candidate.has_stencil()));
        }
    }
    Err(BackendError::NoSupportedDepthFormat)
}

pub struct Device {
    pub instance: Arc<Instance>,
    pub physical_device: vk::PhysicalDevice,
    pub vk_device: ash::Device,
    pub queue_families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub transfer_queue: vk::Queue,
    pub depth_format: ImageFormat,
    pub depth_has_stencil: bool,
}

impl Device {
    /// spec.md §4.2.2 steps 1-5 (the memory allocator itself is a
    /// distinct concern left to the caller: spec.md only requires it be
    /// "bound to this device").
    pub fn new(instance: Arc<Instance>, gpu_id: u32) -> Result<Self, BackendError> {
        let physical_device = instance.physical_device_by_id(gpu_id)?;

        if !supports_swapchain_extension(&instance, physical_device)? {
            return Err(BackendError::NoSwapchainCapableDevice);
        }

        let queue_families = select_queue_families(&instance, physical_device)?;
        let (depth_format, depth_has_stencil) = select_depth_format(&instance, physical_device)?;

        let priorities = [1.0f32];
        let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_families.graphics)
            .queue_priorities(&priorities)];
        if !queue_families.shared() {
            queue_create_infos.push(
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(queue_families.transfer)
                    .queue_priorities(&priorities),
            );
        }

        let extension_names = [SWAPCHAIN_EXTENSION.as_ptr()];
        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names);

        let vk_device = unsafe {
            instance
                .vk_instance
                .create_device(physical_device, &create_info, None)
        }
        .map_err(BackendError::DeviceCreation)?;

        let graphics_queue = unsafe { vk_device.get_device_queue(queue_families.graphics, 0) };
        let transfer_queue = if queue_families.shared() {
            graphics_queue
        } else {
            unsafe { vk_device.get_device_queue(queue_families.transfer, 0) }
        };

        info!(
            "logical device created (graphics queue family {}, transfer queue family {}, shared={})",
            queue_families.graphics,
            queue_families.transfer,
            queue_families.shared()
        );

        Ok(Self {
            instance,
            physical_device,
            vk_device,
            queue_families,
            graphics_queue,
            transfer_queue,
            depth_format,
            depth_has_stencil,
        })
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe { self.vk_device.destroy_device(None) };
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("queue_families", &self.queue_families)
            .field("depth_format", &self.depth_format)
            .finish()
    }
}

/// Per-frame-in-flight synchronization and command state (spec.md
/// §4.2.2 steps 6-7).
pub struct FrameSync {
    pub transfer_finished_semaphore: vk::Semaphore,
    pub render_finished_semaphore: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
    pub graphics_command_pool: vk::CommandPool,
    pub graphics_command_buffer: vk::CommandBuffer,
    pub transfer_command_pool: vk::CommandPool,
    pub transfer_command_buffer: vk::CommandBuffer,
}

impl FrameSync {
    pub fn new(device: &Device) -> Result<Self, BackendError> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let transfer_finished_semaphore =
            unsafe { device.vk_device.create_semaphore(&semaphore_info, None) }?;
        let render_finished_semaphore =
            unsafe { device.vk_device.create_semaphore(&semaphore_info, None) }?;

        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let in_flight_fence = unsafe { device.vk_device.create_fence(&fence_info, None) }?;

        let graphics_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(device.queue_families.graphics)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let graphics_command_pool =
            unsafe { device.vk_device.create_command_pool(&graphics_pool_info, None) }?;
        let graphics_command_buffer = Self::allocate_primary(device, graphics_command_pool)?;

        let transfer_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(device.queue_families.transfer)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let transfer_command_pool =
            unsafe { device.vk_device.create_command_pool(&transfer_pool_info, None) }?;
        let transfer_command_buffer = Self::allocate_primary(device, transfer_command_pool)?;

        Ok(Self {
            transfer_finished_semaphore,
            render_finished_semaphore,
            in_flight_fence,
            graphics_command_pool,
            graphics_command_buffer,
            transfer_command_pool,
            transfer_command_buffer,
        })
    }

    fn allocate_primary(
        device: &Device,
        pool: vk::CommandPool,
    ) -> Result<vk::CommandBuffer, BackendError> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { device.vk_device.allocate_command_buffers(&alloc_info) }?;
        Ok(buffers[0])
    }

    /// # Safety
    /// `device` must be the same device this was created from, and the
    /// caller must ensure these objects are no longer in use (wait
    /// device-idle first, spec.md §4.2.5).
    pub unsafe fn destroy(&self, device: &Device) {
        device
            .vk_device
            .destroy_command_pool(self.graphics_command_pool, None);
        device
            .vk_device
            .destroy_command_pool(self.transfer_command_pool, None);
        device.vk_device.destroy_fence(self.in_flight_fence, None);
        device
            .vk_device
            .destroy_semaphore(self.transfer_finished_semaphore, None);
        device
            .vk_device
            .destroy_semaphore(self.render_finished_semaphore, None);
    }
}
