// =============================================================================
// MIRV-PROBE - Smoke test of the driver's entry points
// =============================================================================
//
// Drives the exported vk* functions the way an application would:
// 1. Create an instance
// 2. Enumerate physical devices
// 3. Find a transfer-capable queue family on the first one
// 4. Create a device with one queue from that family and fetch it
// 5. Tear everything down
//
// Prints "OK" and exits 0 when every step succeeded.
//
// =============================================================================

use anyhow::{bail, ensure, Context, Result};
use ash::vk::{self, Handle};
use std::ptr;

use mirv::icd;
use mirv::Config;

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    let config = Config::load();
    mirv::init_logging(&config);
    log::info!("Starting mirv-probe");

    unsafe { probe() }?;

    println!("OK");
    Ok(())
}

fn check(result: vk::Result, what: &str) -> Result<()> {
    if result != vk::Result::SUCCESS {
        bail!("{} returned {:?}", what, result);
    }
    Ok(())
}

// =============================================================================
// PROBE SEQUENCE
// =============================================================================

unsafe fn probe() -> Result<()> {
    let app_name = b"mirv-probe\0";
    let app_info = vk::ApplicationInfo {
        p_application_name: app_name.as_ptr().cast(),
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };
    let instance_info = vk::InstanceCreateInfo {
        p_application_info: &app_info,
        ..Default::default()
    };

    let mut instance = vk::Instance::null();
    check(
        icd::vkCreateInstance(&instance_info, ptr::null(), &mut instance),
        "vkCreateInstance",
    )?;
    ensure!(instance.as_raw() != 0, "vkCreateInstance returned a null handle");

    let result = run_on_instance(instance);
    icd::vkDestroyInstance(instance, ptr::null());
    result
}

unsafe fn run_on_instance(instance: vk::Instance) -> Result<()> {
    let mut count = 0;
    check(
        icd::vkEnumeratePhysicalDevices(instance, &mut count, ptr::null_mut()),
        "vkEnumeratePhysicalDevices",
    )?;
    ensure!(count > 0, "no physical devices available");

    let mut physical_devices = vec![vk::PhysicalDevice::null(); count as usize];
    check(
        icd::vkEnumeratePhysicalDevices(instance, &mut count, physical_devices.as_mut_ptr()),
        "vkEnumeratePhysicalDevices",
    )?;
    let physical_device = physical_devices[0];

    let mut properties = vk::PhysicalDeviceProperties::default();
    icd::vkGetPhysicalDeviceProperties(physical_device, &mut properties);
    let name = std::ffi::CStr::from_ptr(properties.device_name.as_ptr());
    log::info!("Using {:?} (vendor {:#x})", name, properties.vendor_id);

    let mut family_count = 0;
    icd::vkGetPhysicalDeviceQueueFamilyProperties(physical_device, &mut family_count, ptr::null_mut());
    let mut families = vec![vk::QueueFamilyProperties::default(); family_count as usize];
    icd::vkGetPhysicalDeviceQueueFamilyProperties(
        physical_device,
        &mut family_count,
        families.as_mut_ptr(),
    );
    let family_index = families
        .iter()
        .position(|f| f.queue_flags.contains(vk::QueueFlags::TRANSFER))
        .context("no transfer-capable queue family")? as u32;

    let priority = 0.5f32;
    let queue_info = vk::DeviceQueueCreateInfo {
        queue_family_index: family_index,
        queue_count: 1,
        p_queue_priorities: &priority,
        ..Default::default()
    };
    let device_info = vk::DeviceCreateInfo {
        queue_create_info_count: 1,
        p_queue_create_infos: &queue_info,
        ..Default::default()
    };

    let mut device = vk::Device::null();
    check(
        icd::vkCreateDevice(physical_device, &device_info, ptr::null(), &mut device),
        "vkCreateDevice",
    )?;

    let mut queue = vk::Queue::null();
    icd::vkGetDeviceQueue(device, family_index, 0, &mut queue);
    icd::vkDestroyDevice(device, ptr::null());
    ensure!(queue.as_raw() != 0, "vkGetDeviceQueue returned a null queue");

    log::info!("Queue {:#x} from family {}", queue.as_raw(), family_index);
    Ok(())
}
