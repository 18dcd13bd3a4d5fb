//! Render Backend Session (C2, spec.md §4.2): ties instance, device,
//! per-frame synchronization, and the surface list into the frame state
//! machine described in §4.2.4.

use std::sync::Arc;

use ash::khr::surface;
use ash::vk;
use kan_config::{AtomicGfxDebugModes, RenderConfig};
use kan_graphics_types::SurfaceHandle;
use log::{info, warn};
use slotmap::SlotMap;

use crate::device::{Device, FrameSync};
use crate::error::BackendError;
use crate::frame::FrameState;
use crate::instance::Instance;
use crate::swapchain::{Surface, Swapchain};

/// Compile-time frame-in-flight count (spec.md §3.4 invariant 8:
/// "typical value 2 or 3").
pub const FRAMES_IN_FLIGHT: u32 = 2;

struct EnabledBackend {
    device: Device,
    frame_syncs: Vec<FrameSync>,
}

/// Render Backend Session. When `config.disable_render` is set, the
/// session holds no Vulkan resources at all and every per-frame
/// operation is a no-op — a headless run mode used by tooling and
/// tests (spec.md §4.2.1 "When render enabled:" implies an else
/// branch).
pub struct RenderBackendSession {
    config: RenderConfig,
    debug_modes: Arc<AtomicGfxDebugModes>,
    instance: Option<Arc<Instance>>,
    backend: Option<EnabledBackend>,
    surfaces: SlotMap<SurfaceHandle, Surface>,
    frame_state: FrameState,
    current_frame_in_flight_index: u32,
}

impl RenderBackendSession {
    /// spec.md §4.2.1. `required_window_extensions` come from the
    /// window system (out of scope, spec.md §1); `enable_validation`
    /// corresponds to "when build-configured". Returns before device
    /// selection (spec.md §4.2.2), which the caller drives with
    /// [`Self::select_device`] once it knows which gpu id to use.
    pub fn new(
        config: RenderConfig,
        required_window_extensions: &[*const i8],
        enable_validation: bool,
    ) -> Result<Self, BackendError> {
        let debug_modes = Arc::new(AtomicGfxDebugModes::new());

        let instance = if config.disable_render {
            info!("render backend session created with rendering disabled");
            None
        } else {
            Some(Instance::new(
                &config.application_name,
                required_window_extensions,
                enable_validation,
            )?)
        };

        Ok(Self {
            config,
            debug_modes,
            instance,
            backend: None,
            surfaces: SlotMap::with_key(),
            frame_state: FrameState::Idle,
            current_frame_in_flight_index: 0,
        })
    }

    pub fn debug_modes(&self) -> &Arc<AtomicGfxDebugModes> {
        &self.debug_modes
    }

    pub fn is_render_enabled(&self) -> bool {
        !self.config.disable_render
    }

    pub fn instance(&self) -> Option<&Arc<Instance>> {
        self.instance.as_ref()
    }

    pub fn enumerate_gpus(&self) -> Result<kan_graphics_types::gpu::Gpus, BackendError> {
        match &self.instance {
            Some(instance) => instance.enumerate_gpus(&self.debug_modes),
            None => Ok(kan_graphics_types::gpu::Gpus::default()),
        }
    }

    /// Selects `gpu_id` as the active device, completing spec.md
    /// §4.2.2 steps 1-7. Rolls back nothing itself on failure: the
    /// caller drops the partially-constructed session, and `Drop`
    /// destroys only what was actually created.
    pub fn select_device(&mut self, gpu_id: u32) -> Result<(), BackendError> {
        let Some(instance) = self.instance.clone() else {
            return Ok(());
        };
        let device = Device::new(instance, gpu_id)?;
        let frame_syncs = (0..FRAMES_IN_FLIGHT)
            .map(|_| FrameSync::new(&device))
            .collect::<Result<Vec<_>, _>>()?;

        info!("device selected: gpu id {gpu_id}, {FRAMES_IN_FLIGHT} frames in flight");
        self.backend = Some(EnabledBackend { device, frame_syncs });
        Ok(())
    }

    /// spec.md §4.2.3: creates a surface on demand and constructs its
    /// swap chain.
    pub fn create_surface(
        &mut self,
        surface_loader: surface::Instance,
        surface_handle: vk::SurfaceKHR,
        window_size: (u32, u32),
    ) -> Result<SurfaceHandle, BackendError> {
        let mut record = Surface::new(surface_loader, surface_handle, window_size);
        if let Some(backend) = &self.backend {
            let swapchain = Swapchain::new(
                &backend.device,
                &record.surface_loader,
                record.handle,
                window_size,
                FRAMES_IN_FLIGHT,
                self.config.prefer_vsync,
                None,
            )?;
            record.swapchain = Some(swapchain);
            record.needs_recreation = false;
        }
        Ok(self.surfaces.insert(record))
    }

    /// spec.md §4.2.3 shutdown callback.
    pub fn destroy_surface(&mut self, handle: SurfaceHandle) -> Result<(), BackendError> {
        let Some(backend) = &self.backend else {
            self.surfaces.remove(handle);
            return Ok(());
        };
        unsafe { backend.device.vk_device.device_wait_idle() }.map_err(BackendError::from)?;
        if let Some(mut record) = self.surfaces.remove(handle) {
            if let Some(swapchain) = record.swapchain.take() {
                unsafe { swapchain.destroy(&backend.device) };
            }
            unsafe {
                record
                    .surface_loader
                    .destroy_surface(record.handle, None)
            };
        }
        Ok(())
    }

    /// spec.md §4.2.4 `next_frame`. Returns `Ok(false)` when the frame
    /// was skipped (fence wait timeout, or a swap-chain recreation was
    /// pending and consumed this frame instead of rendering).
    pub fn next_frame(&mut self) -> Result<bool, BackendError> {
        let Some(backend) = &self.backend else {
            return Ok(true);
        };

        if self.frame_state != FrameState::Idle {
            self.submit()?;
        }

        let index = self.current_frame_in_flight_index as usize;
        let fence = backend.frame_syncs[index].in_flight_fence;
        const FENCE_TIMEOUT_NS: u64 = 1_000_000_000;
        let signaled = unsafe {
            backend
                .device
                .vk_device
                .wait_for_fences(&[fence], true, FENCE_TIMEOUT_NS)
        };
        if signaled.is_err() {
            warn!("in-flight fence wait timed out, skipping frame");
            return Ok(false);
        }

        let mut needs_recreation = false;
        for surface in self.surfaces.values_mut() {
            let Some(swapchain) = &surface.swapchain else {
                surface.needs_recreation = true;
                needs_recreation = true;
                continue;
            };
            if surface.last_known_window_size != (swapchain.extent.width, swapchain.extent.height) {
                surface.needs_recreation = true;
            }
            if surface.needs_recreation {
                needs_recreation = true;
                continue;
            }
            if surface.acquired_image_frame != Some(self.current_frame_in_flight_index) {
                let acquire = unsafe {
                    swapchain.loader.acquire_next_image(
                        swapchain.handle,
                        u64::MAX,
                        swapchain.image_available_semaphores[index],
                        vk::Fence::null(),
                    )
                };
                match acquire {
                    Ok((image_index, suboptimal)) => {
                        if suboptimal {
                            surface.needs_recreation = true;
                            needs_recreation = true;
                        } else {
                            surface.acquired_image_index = image_index;
                            surface.acquired_image_frame = Some(self.current_frame_in_flight_index);
                        }
                    }
                    Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                        surface.needs_recreation = true;
                        needs_recreation = true;
                    }
                    Err(e) => return Err(BackendError::from(e)),
                }
            }
        }

        if needs_recreation {
            self.recreate_pending_swapchains()?;
            return Ok(false);
        }

        unsafe { backend.device.vk_device.reset_fences(&[fence]) }.map_err(BackendError::from)?;
        unsafe {
            backend.device.vk_device.reset_command_pool(
                backend.frame_syncs[index].graphics_command_pool,
                vk::CommandPoolResetFlags::empty(),
            )
        }
        .map_err(BackendError::from)?;
        unsafe {
            backend.device.vk_device.reset_command_pool(
                backend.frame_syncs[index].transfer_command_pool,
                vk::CommandPoolResetFlags::empty(),
            )
        }
        .map_err(BackendError::from)?;

        self.frame_state = FrameState::Acquired;
        Ok(true)
    }

    fn recreate_pending_swapchains(&mut self) -> Result<(), BackendError> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        unsafe { backend.device.vk_device.device_wait_idle() }.map_err(BackendError::from)?;
        for surface in self.surfaces.values_mut() {
            if !surface.needs_recreation {
                continue;
            }
            if let Some(old) = surface.swapchain.take() {
                unsafe { old.destroy(&backend.device) };
            }
            let swapchain = Swapchain::new(
                &backend.device,
                &surface.surface_loader,
                surface.handle,
                surface.last_known_window_size,
                FRAMES_IN_FLIGHT,
                self.config.prefer_vsync,
                None,
            )?;
            surface.swapchain = Some(swapchain);
            surface.needs_recreation = false;
            surface.acquired_image_frame = None;
        }
        Ok(())
    }

    /// spec.md §4.2.4 "Submission path". Invoked implicitly by the next
    /// `next_frame` call, or explicitly to flush the current frame.
    pub fn submit(&mut self) -> Result<(), BackendError> {
        let Some(backend) = &self.backend else {
            self.frame_state = FrameState::Idle;
            return Ok(());
        };
        if self.frame_state == FrameState::Idle {
            return Ok(());
        }

        let index = self.current_frame_in_flight_index as usize;
        let sync = &backend.frame_syncs[index];

        if self.frame_state == FrameState::Acquired {
            let begin_info = vk::CommandBufferBeginInfo::default();
            unsafe {
                backend
                    .device
                    .vk_device
                    .begin_command_buffer(sync.transfer_command_buffer, &begin_info)
            }
            .map_err(BackendError::from)?;
            // Accumulated transfer commands are recorded externally by
            // the systems that called into this frame.
            unsafe {
                backend
                    .device
                    .vk_device
                    .end_command_buffer(sync.transfer_command_buffer)
            }
            .map_err(BackendError::from)?;

            let wait_semaphores: Vec<vk::Semaphore> = self
                .surfaces
                .values()
                .filter(|s| s.is_healthy())
                .filter_map(|s| s.swapchain.as_ref())
                .map(|sc| sc.image_available_semaphores[index])
                .collect();
            let wait_stages = vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; wait_semaphores.len()];
            let signal = [sync.transfer_finished_semaphore];
            let command_buffers = [sync.transfer_command_buffer];
            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal);
            unsafe {
                backend
                    .device
                    .vk_device
                    .queue_submit(backend.device.transfer_queue, &[submit_info], vk::Fence::null())
            }
            .map_err(BackendError::from)?;

            self.frame_state = FrameState::TransferRecorded;
        }

        if self.frame_state == FrameState::TransferRecorded {
            let begin_info = vk::CommandBufferBeginInfo::default();
            unsafe {
                backend
                    .device
                    .vk_device
                    .begin_command_buffer(sync.graphics_command_buffer, &begin_info)
            }
            .map_err(BackendError::from)?;
            // Accumulated graphics commands are recorded externally.
            for surface in self.surfaces.values() {
                if !surface.is_healthy() {
                    continue;
                }
                let Some(swapchain) = &surface.swapchain else {
                    continue;
                };
                let image = swapchain.images[surface.acquired_image_index as usize];
                let barrier = vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                unsafe {
                    backend.device.vk_device.cmd_pipeline_barrier(
                        sync.graphics_command_buffer,
                        vk::PipelineStageFlags::TOP_OF_PIPE,
                        vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[barrier],
                    )
                };
            }
            unsafe {
                backend
                    .device
                    .vk_device
                    .end_command_buffer(sync.graphics_command_buffer)
            }
            .map_err(BackendError::from)?;

            let wait_semaphores = [sync.transfer_finished_semaphore];
            let wait_stages = [vk::PipelineStageFlags::TRANSFER];
            let signal_semaphores = [sync.render_finished_semaphore];
            let command_buffers = [sync.graphics_command_buffer];
            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores);
            unsafe {
                backend.device.vk_device.queue_submit(
                    backend.device.graphics_queue,
                    &[submit_info],
                    sync.in_flight_fence,
                )
            }
            .map_err(BackendError::from)?;

            self.frame_state = FrameState::GraphicsRecorded;
        }

        if self.frame_state == FrameState::GraphicsRecorded {
            let swapchains: Vec<vk::SwapchainKHR> = self
                .surfaces
                .values()
                .filter(|s| s.is_healthy())
                .filter_map(|s| s.swapchain.as_ref().map(|sc| sc.handle))
                .collect();
            let image_indices: Vec<u32> = self
                .surfaces
                .values()
                .filter(|s| s.is_healthy())
                .map(|s| s.acquired_image_index)
                .collect();
            if !swapchains.is_empty() {
                let wait_semaphores = [sync.render_finished_semaphore];
                let present_info = vk::PresentInfoKHR::default()
                    .wait_semaphores(&wait_semaphores)
                    .swapchains(&swapchains)
                    .image_indices(&image_indices);
                let surface = self
                    .surfaces
                    .values()
                    .find(|s| s.is_healthy())
                    .and_then(|s| s.swapchain.as_ref());
                if let Some(swapchain) = surface {
                    let _ = unsafe {
                        swapchain
                            .loader
                            .queue_present(backend.device.graphics_queue, &present_info)
                    };
                }
            }
            self.frame_state = FrameState::Presented;
        }

        for surface in self.surfaces.values_mut() {
            surface.acquired_image_frame = None;
        }
        self.frame_state = FrameState::Idle;
        self.current_frame_in_flight_index = (self.current_frame_in_flight_index + 1) % FRAMES_IN_FLIGHT;
        Ok(())
    }

    /// spec.md §4.2.5.
    pub fn shutdown(&mut self) -> Result<(), BackendError> {
        let Some(backend) = self.backend.take() else {
            return Ok(());
        };
        unsafe { backend.device.vk_device.device_wait_idle() }.map_err(BackendError::from)?;
        assert!(
            self.surfaces.is_empty(),
            "surfaces are owned by the window system and must be destroyed before shutdown"
        );
        for sync in &backend.frame_syncs {
            unsafe { sync.destroy(&backend.device) };
        }
        Ok(())
    }
}
