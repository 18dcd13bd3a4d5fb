//! Instance creation and physical device enumeration (spec.md §4.2.1).

use std::ffi::{CStr, CString};
use std::sync::Arc;

use ash::ext::debug_utils;
use ash::vk;
use kan_config::AtomicGfxDebugModes;
use kan_graphics_types::gpu::{CurGpu, Gpu, GpuType, Gpus, MemoryHeapInfo, MemoryType};
use log::{debug, error, info, warn};

use crate::error::BackendError;

/// Fixed per spec.md §4.2.1 step 2.
const ENGINE_NAME: &str = "Kan";
const ENGINE_API_VERSION: u32 = vk::make_api_version(0, 1, 1, 0);

pub struct Instance {
    pub entry: ash::Entry,
    pub vk_instance: ash::Instance,
    pub debug_utils: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// spec.md §4.2.1 steps 1-3.
    pub fn new(
        application_name: &str,
        required_extensions: &[*const i8],
        enable_validation: bool,
    ) -> Result<Arc<Self>, BackendError> {
        let entry = unsafe { ash::Entry::load() }.expect("failed to resolve platform vulkan symbols");

        let app_name = CString::new(application_name).unwrap_or_default();
        let engine_name = CString::new(ENGINE_NAME).unwrap();
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .engine_name(&engine_name)
            .api_version(ENGINE_API_VERSION);

        let validation_layer = CString::new("VK_LAYER_KHRONOS_validation").unwrap();
        let layer_names = [validation_layer.as_ptr()];

        let mut extensions: Vec<*const i8> = required_extensions.to_vec();
        let debug_ext_name = debug_utils::NAME.as_ptr();
        if enable_validation {
            extensions.push(debug_ext_name);
        }

        let validation_available = enable_validation && Self::validation_layer_available(&entry);
        if enable_validation && !validation_available {
            warn!("validation layers requested but not present on this platform");
        }

        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions);
        if validation_available {
            create_info = create_info.enabled_layer_names(&layer_names);
        }

        let vk_instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(BackendError::InstanceCreation)?;

        let debug_utils_pair = if validation_available {
            Some(Self::install_debug_messenger(&entry, &vk_instance))
        } else {
            None
        };

        Ok(Arc::new(Self {
            entry,
            vk_instance,
            debug_utils: debug_utils_pair,
        }))
    }

    fn validation_layer_available(entry: &ash::Entry) -> bool {
        let Ok(layers) = (unsafe { entry.enumerate_instance_layer_properties() }) else {
            return false;
        };
        layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name.to_str() == Ok("VK_LAYER_KHRONOS_validation")
        })
    }

    /// spec.md §4.2.1 step 3: "wire debug messenger with severity
    /// thresholds `{error, warning, info} -> error/warning/info log;
    /// verbose -> debug`."
    fn install_debug_messenger(
        entry: &ash::Entry,
        vk_instance: &ash::Instance,
    ) -> (debug_utils::Instance, vk::DebugUtilsMessengerEXT) {
        let loader = debug_utils::Instance::new(entry, vk_instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback));
        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .expect("debug messenger creation should not fail once the extension is enabled");
        (loader, messenger)
    }

    /// spec.md §4.2.1 step 4.
    pub fn enumerate_gpus(&self, debug_modes: &AtomicGfxDebugModes) -> Result<Gpus, BackendError> {
        let devices = unsafe { self.vk_instance.enumerate_physical_devices() }
            .map_err(BackendError::from)?;

        let mut gpus = Vec::with_capacity(devices.len());
        for (index, device) in devices.iter().enumerate() {
            let props = unsafe { self.vk_instance.get_physical_device_properties(*device) };
            let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
                .to_string_lossy()
                .into_owned();
            let ty = match props.device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => GpuType::Discrete,
                vk::PhysicalDeviceType::INTEGRATED_GPU => GpuType::Integrated,
                vk::PhysicalDeviceType::VIRTUAL_GPU => GpuType::Virtual,
                vk::PhysicalDeviceType::CPU => GpuType::Cpu,
                _ => GpuType::Unknown,
            };

            let mem_props = unsafe {
                self.vk_instance
                    .get_physical_device_memory_properties(*device)
            };
            let heaps: Vec<MemoryHeapInfo> = mem_props.memory_types
                [..mem_props.memory_type_count as usize]
                .iter()
                .map(|memory_type| {
                    let heap = mem_props.memory_heaps[memory_type.heap_index as usize];
                    MemoryHeapInfo {
                        device_local: heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL),
                        host_visible: memory_type
                            .property_flags
                            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE),
                        host_coherent: memory_type
                            .property_flags
                            .contains(vk::MemoryPropertyFlags::HOST_COHERENT),
                    }
                })
                .collect();
            let memory_type = kan_graphics_types::gpu::infer_memory_type(&heaps);

            if kan_config::debug::is_verbose(debug_modes) {
                debug!("gpu {index}: {name} ({ty:?}, {memory_type:?})");
            }

            gpus.push(Gpu {
                id: index as u32,
                name,
                ty,
                memory_type,
            });
        }

        info!("enumerated {} physical device(s)", gpus.len());
        Ok(Gpus { gpus })
    }

    pub fn physical_device_by_id(&self, id: u32) -> Result<vk::PhysicalDevice, BackendError> {
        let devices = unsafe { self.vk_instance.enumerate_physical_devices() }
            .map_err(BackendError::from)?;
        devices
            .get(id as usize)
            .copied()
            .ok_or(BackendError::NoSwapchainCapableDevice)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if let Some((loader, messenger)) = self.debug_utils.take() {
            unsafe { loader.destroy_debug_utils_messenger(messenger, None) };
        }
        unsafe { self.vk_instance.destroy_instance(None) };
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("has_debug_utils", &self.debug_utils.is_some())
            .finish()
    }
}

unsafe extern "system" fn vulkan_debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _ty: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy();
    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("{message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("{message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => info!("{message}"),
        _ => debug!("{message}"),
    }
    vk::FALSE
}
