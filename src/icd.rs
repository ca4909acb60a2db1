// ICD entry points - the flat C surface
//
// Every function here translates handles through the global table, reads
// the caller's structs through `create_info`, and reports failures as status
// codes. Nothing in this module panics on bad input.

#![allow(non_snake_case)]

use ash::vk::{self, Handle};
use std::ffi::CStr;
use std::os::raw::c_char;
use std::sync::Arc;

use crate::command_pool::CommandPool;
use crate::config::{self, Config};
use crate::create_info;
use crate::device::Device;
use crate::enumerate::write_counted;
use crate::error::{MirvError, Result};
use crate::handles::HandleTable;
use crate::instance::Instance;
use crate::object::{Object, TypedObject};
use crate::physical_device::PhysicalDevice;
use crate::queue::Queue;

/// The only API version this driver reports.
pub const DRIVER_API_VERSION: u32 = vk::API_VERSION_1_0;

fn table() -> &'static HandleTable {
    HandleTable::global()
}

fn lookup<T: TypedObject>(handle: impl Handle) -> Result<Arc<T>> {
    table()
        .get::<T>(handle.as_raw())
        .ok_or(MirvError::InvalidHandle(T::TYPE))
}

fn report(entry: &str, err: MirvError) -> vk::Result {
    log::warn!("{} failed: {}", entry, err);
    err.into()
}

fn reject_allocator(p_allocator: *const vk::AllocationCallbacks) -> Result<()> {
    if p_allocator.is_null() {
        Ok(())
    } else {
        Err(MirvError::NotImplemented("custom host allocators"))
    }
}

fn ignore_allocator(entry: &str, p_allocator: *const vk::AllocationCallbacks) {
    if !p_allocator.is_null() {
        log::warn!("{}: ignoring custom host allocator", entry);
    }
}

/// Stores the created handle, or null on failure.
fn finish<H: Handle>(entry: &str, out: &mut H, result: Result<u64>) -> vk::Result {
    match result {
        Ok(raw) => {
            *out = H::from_raw(raw);
            vk::Result::SUCCESS
        }
        Err(err) => {
            *out = H::from_raw(0);
            report(entry, err)
        }
    }
}

// =============================================================================
// INSTANCE
// =============================================================================

unsafe fn create_instance(info: *const vk::InstanceCreateInfo, config: &Config) -> Result<u64> {
    let request = create_info::instance_request(info)?;
    let instance = Instance::new(config.backends.clone());
    let handle = table().add(&instance);
    log::info!(
        "Created instance {:#x} for {} (engine {})",
        handle,
        request.application_name.as_deref().unwrap_or("<unnamed>"),
        request.engine_name.as_deref().unwrap_or("<none>")
    );
    Ok(handle)
}

#[no_mangle]
pub unsafe extern "system" fn vkCreateInstance(
    p_create_info: *const vk::InstanceCreateInfo,
    p_allocator: *const vk::AllocationCallbacks,
    p_instance: *mut vk::Instance,
) -> vk::Result {
    let config = config::current();
    crate::init_logging(&config);

    let Some(out) = p_instance.as_mut() else {
        return report("vkCreateInstance", MirvError::Validation("null instance output"));
    };
    let result = reject_allocator(p_allocator).and_then(|()| create_instance(p_create_info, &config));
    finish("vkCreateInstance", out, result)
}

#[no_mangle]
pub unsafe extern "system" fn vkDestroyInstance(
    instance: vk::Instance,
    p_allocator: *const vk::AllocationCallbacks,
) {
    ignore_allocator("vkDestroyInstance", p_allocator);
    if let Some(instance) = table().remove::<Instance>(instance.as_raw()) {
        instance.release_handles(table());
    }
}

#[no_mangle]
pub unsafe extern "system" fn vkEnumeratePhysicalDevices(
    instance: vk::Instance,
    p_physical_device_count: *mut u32,
    p_physical_devices: *mut vk::PhysicalDevice,
) -> vk::Result {
    let instance = match lookup::<Instance>(instance) {
        Ok(instance) => instance,
        Err(err) => {
            if let Some(count) = p_physical_device_count.as_mut() {
                *count = 0;
            }
            return report("vkEnumeratePhysicalDevices", err);
        }
    };

    let handles: Vec<vk::PhysicalDevice> = instance
        .physical_devices()
        .iter()
        .map(|pd| vk::PhysicalDevice::from_raw(table().add(pd)))
        .collect();
    write_counted(&handles, p_physical_device_count, p_physical_devices)
}

#[no_mangle]
pub unsafe extern "system" fn vkEnumerateInstanceVersion(p_api_version: *mut u32) -> vk::Result {
    match p_api_version.as_mut() {
        Some(version) => {
            *version = DRIVER_API_VERSION;
            vk::Result::SUCCESS
        }
        None => vk::Result::ERROR_VALIDATION_FAILED_EXT,
    }
}

#[no_mangle]
pub unsafe extern "system" fn vkEnumerateInstanceLayerProperties(
    p_property_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    write_counted::<vk::LayerProperties>(&[], p_property_count, p_properties)
}

#[no_mangle]
pub unsafe extern "system" fn vkEnumerateInstanceExtensionProperties(
    p_layer_name: *const c_char,
    p_property_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    if !p_layer_name.is_null() {
        return report(
            "vkEnumerateInstanceExtensionProperties",
            MirvError::LayerNotPresent,
        );
    }
    write_counted::<vk::ExtensionProperties>(&[], p_property_count, p_properties)
}

// =============================================================================
// PHYSICAL DEVICE
// =============================================================================

#[no_mangle]
pub unsafe extern "system" fn vkGetPhysicalDeviceProperties(
    physical_device: vk::PhysicalDevice,
    p_properties: *mut vk::PhysicalDeviceProperties,
) {
    let Some(out) = p_properties.as_mut() else {
        return;
    };
    *out = match lookup::<PhysicalDevice>(physical_device) {
        Ok(pd) => *pd.properties(),
        Err(_) => vk::PhysicalDeviceProperties::default(),
    };
}

#[no_mangle]
pub unsafe extern "system" fn vkGetPhysicalDeviceQueueFamilyProperties(
    physical_device: vk::PhysicalDevice,
    p_queue_family_property_count: *mut u32,
    p_queue_family_properties: *mut vk::QueueFamilyProperties,
) {
    match lookup::<PhysicalDevice>(physical_device) {
        Ok(pd) => {
            write_counted(
                pd.queue_families(),
                p_queue_family_property_count,
                p_queue_family_properties,
            );
        }
        Err(_) => {
            if let Some(count) = p_queue_family_property_count.as_mut() {
                *count = 0;
            }
        }
    }
}

#[no_mangle]
pub unsafe extern "system" fn vkGetPhysicalDeviceFeatures(
    _physical_device: vk::PhysicalDevice,
    p_features: *mut vk::PhysicalDeviceFeatures,
) {
    if let Some(out) = p_features.as_mut() {
        *out = vk::PhysicalDeviceFeatures::default();
    }
}

#[no_mangle]
pub unsafe extern "system" fn vkGetPhysicalDeviceMemoryProperties(
    _physical_device: vk::PhysicalDevice,
    p_memory_properties: *mut vk::PhysicalDeviceMemoryProperties,
) {
    if let Some(out) = p_memory_properties.as_mut() {
        *out = vk::PhysicalDeviceMemoryProperties::default();
    }
}

#[no_mangle]
pub unsafe extern "system" fn vkEnumerateDeviceLayerProperties(
    _physical_device: vk::PhysicalDevice,
    p_property_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    write_counted::<vk::LayerProperties>(&[], p_property_count, p_properties)
}

#[no_mangle]
pub unsafe extern "system" fn vkEnumerateDeviceExtensionProperties(
    _physical_device: vk::PhysicalDevice,
    p_layer_name: *const c_char,
    p_property_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    if !p_layer_name.is_null() {
        return report(
            "vkEnumerateDeviceExtensionProperties",
            MirvError::LayerNotPresent,
        );
    }
    write_counted::<vk::ExtensionProperties>(&[], p_property_count, p_properties)
}

// =============================================================================
// DEVICE
// =============================================================================

unsafe fn create_device(
    physical_device: vk::PhysicalDevice,
    info: *const vk::DeviceCreateInfo,
) -> Result<u64> {
    let pd = lookup::<PhysicalDevice>(physical_device)?;
    let request = create_info::device_request(info)?;
    let device = pd.create_device(&request)?;
    Ok(table().add(&device))
}

#[no_mangle]
pub unsafe extern "system" fn vkCreateDevice(
    physical_device: vk::PhysicalDevice,
    p_create_info: *const vk::DeviceCreateInfo,
    p_allocator: *const vk::AllocationCallbacks,
    p_device: *mut vk::Device,
) -> vk::Result {
    let Some(out) = p_device.as_mut() else {
        return report("vkCreateDevice", MirvError::Validation("null device output"));
    };
    let result =
        reject_allocator(p_allocator).and_then(|()| create_device(physical_device, p_create_info));
    finish("vkCreateDevice", out, result)
}

#[no_mangle]
pub unsafe extern "system" fn vkDestroyDevice(
    device: vk::Device,
    p_allocator: *const vk::AllocationCallbacks,
) {
    ignore_allocator("vkDestroyDevice", p_allocator);
    if let Some(device) = table().remove::<Device>(device.as_raw()) {
        device.release_handles(table());
    }
}

#[no_mangle]
pub unsafe extern "system" fn vkGetDeviceQueue(
    device: vk::Device,
    queue_family_index: u32,
    queue_index: u32,
    p_queue: *mut vk::Queue,
) {
    let Some(out) = p_queue.as_mut() else {
        return;
    };
    let published = lookup::<Device>(device).ok().and_then(|device| {
        let queue = device.queue(queue_family_index, queue_index)?;
        publish_queue(&device, &queue)
    });
    *out = match published {
        Some(handle) => vk::Queue::from_raw(handle),
        None => {
            log::warn!(
                "vkGetDeviceQueue: no queue {} in family {}",
                queue_index,
                queue_family_index
            );
            vk::Queue::null()
        }
    };
}

/// Publishes `queue` unless `device` was retired meanwhile.
///
/// `vkDestroyDevice` clears the device's stamp before evicting its queues,
/// so a queue published after that eviction is taken back out here.
fn publish_queue(device: &Device, queue: &Arc<Queue>) -> Option<u64> {
    let handle = table().add(queue);
    if device.header().handle().is_none() {
        drop(table().remove::<Queue>(handle));
        return None;
    }
    Some(handle)
}

unsafe fn create_command_pool(device: vk::Device, info: *const vk::CommandPoolCreateInfo) -> Result<u64> {
    let device = lookup::<Device>(device)?;
    let request = create_info::command_pool_request(info)?;
    let pool = device.create_command_pool(&request)?;
    Ok(table().add(&pool))
}

#[no_mangle]
pub unsafe extern "system" fn vkCreateCommandPool(
    device: vk::Device,
    p_create_info: *const vk::CommandPoolCreateInfo,
    p_allocator: *const vk::AllocationCallbacks,
    p_command_pool: *mut vk::CommandPool,
) -> vk::Result {
    let Some(out) = p_command_pool.as_mut() else {
        return report(
            "vkCreateCommandPool",
            MirvError::Validation("null command pool output"),
        );
    };
    let result =
        reject_allocator(p_allocator).and_then(|()| create_command_pool(device, p_create_info));
    finish("vkCreateCommandPool", out, result)
}

#[no_mangle]
pub unsafe extern "system" fn vkDestroyCommandPool(
    device: vk::Device,
    command_pool: vk::CommandPool,
    p_allocator: *const vk::AllocationCallbacks,
) {
    ignore_allocator("vkDestroyCommandPool", p_allocator);
    let Some(pool) = table().get::<CommandPool>(command_pool.as_raw()) else {
        return;
    };
    let owner = pool.device().and_then(|d| d.header().handle());
    if owner != Some(device.as_raw()) {
        log::warn!(
            "vkDestroyCommandPool: pool {:#x} does not belong to device {:#x}",
            command_pool.as_raw(),
            device.as_raw()
        );
        return;
    }
    drop(table().remove::<CommandPool>(command_pool.as_raw()));
}

// =============================================================================
// PROC ADDRESS LOOKUP
// =============================================================================

macro_rules! proc_table {
    ($table:ident: $($name:ident),* $(,)?) => {
        fn $table(name: &[u8]) -> vk::PFN_vkVoidFunction {
            $(
                if name == stringify!($name).as_bytes() {
                    // SAFETY: the loader casts the pointer back to the
                    // signature the name stands for.
                    return Some(unsafe {
                        std::mem::transmute::<*const (), unsafe extern "system" fn()>(
                            $name as *const (),
                        )
                    });
                }
            )*
            None
        }
    };
}

proc_table!(global_proc:
    vkCreateInstance,
    vkEnumerateInstanceVersion,
    vkEnumerateInstanceLayerProperties,
    vkEnumerateInstanceExtensionProperties,
    vkGetInstanceProcAddr,
);

proc_table!(instance_proc:
    vkDestroyInstance,
    vkEnumeratePhysicalDevices,
    vkGetPhysicalDeviceProperties,
    vkGetPhysicalDeviceQueueFamilyProperties,
    vkGetPhysicalDeviceFeatures,
    vkGetPhysicalDeviceMemoryProperties,
    vkEnumerateDeviceLayerProperties,
    vkEnumerateDeviceExtensionProperties,
    vkCreateDevice,
);

proc_table!(device_proc:
    vkDestroyDevice,
    vkGetDeviceQueue,
    vkCreateCommandPool,
    vkDestroyCommandPool,
    vkGetDeviceProcAddr,
);

#[no_mangle]
pub unsafe extern "system" fn vkGetInstanceProcAddr(
    instance: vk::Instance,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    if p_name.is_null() {
        return None;
    }
    let name = CStr::from_ptr(p_name).to_bytes();
    if let Some(f) = global_proc(name) {
        return Some(f);
    }
    if table().get::<Instance>(instance.as_raw()).is_none() {
        return None;
    }
    instance_proc(name).or_else(|| device_proc(name))
}

#[no_mangle]
pub unsafe extern "system" fn vkGetDeviceProcAddr(
    device: vk::Device,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    if p_name.is_null() || table().get::<Device>(device.as_raw()).is_none() {
        return None;
    }
    device_proc(CStr::from_ptr(p_name).to_bytes())
}
