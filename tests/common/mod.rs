#![allow(dead_code)]

use ash::vk::{self, Handle};
use mirv::config::{self, BackendConfig, Config};
use mirv::icd;
use mirv::{live_objects, HandleTable, ObjectType};
use std::ptr;

/// Installs a config exposing only the null backend.
pub fn install_null(backends: BackendConfig) {
    config::install(Config {
        backends,
        ..Default::default()
    });
}

pub fn install_null_adapters(adapters: u32) {
    install_null(BackendConfig::null_only(adapters));
}

pub fn default_app_info() -> vk::ApplicationInfo {
    vk::ApplicationInfo {
        p_application_name: b"mirv-tests\0".as_ptr().cast(),
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    }
}

pub unsafe fn create_instance_with(info: &vk::InstanceCreateInfo) -> (vk::Result, vk::Instance) {
    let mut instance = vk::Instance::null();
    let result = icd::vkCreateInstance(info, ptr::null(), &mut instance);
    (result, instance)
}

pub unsafe fn create_instance() -> vk::Instance {
    let app = default_app_info();
    let info = vk::InstanceCreateInfo {
        p_application_info: &app,
        ..Default::default()
    };
    let (result, instance) = create_instance_with(&info);
    assert_eq!(result, vk::Result::SUCCESS);
    assert!(instance.as_raw() != 0);
    instance
}

pub unsafe fn physical_devices(instance: vk::Instance) -> Vec<vk::PhysicalDevice> {
    let mut count = 0;
    let result = icd::vkEnumeratePhysicalDevices(instance, &mut count, ptr::null_mut());
    assert_eq!(result, vk::Result::SUCCESS);

    let mut handles = vec![vk::PhysicalDevice::null(); count as usize];
    let result = icd::vkEnumeratePhysicalDevices(instance, &mut count, handles.as_mut_ptr());
    assert_eq!(result, vk::Result::SUCCESS);
    handles
}

pub unsafe fn queue_families(pd: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
    let mut count = 0;
    icd::vkGetPhysicalDeviceQueueFamilyProperties(pd, &mut count, ptr::null_mut());
    let mut families = vec![vk::QueueFamilyProperties::default(); count as usize];
    icd::vkGetPhysicalDeviceQueueFamilyProperties(pd, &mut count, families.as_mut_ptr());
    families.truncate(count as usize);
    families
}

/// Creates a device with one entry per `(family, priorities)` pair.
pub unsafe fn create_device(
    pd: vk::PhysicalDevice,
    queues: &[(u32, &[f32])],
) -> (vk::Result, vk::Device) {
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = queues
        .iter()
        .map(|&(family, priorities)| vk::DeviceQueueCreateInfo {
            queue_family_index: family,
            queue_count: priorities.len() as u32,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();
    let info = vk::DeviceCreateInfo {
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        ..Default::default()
    };

    let mut device = vk::Device::null();
    let result = icd::vkCreateDevice(pd, &info, ptr::null(), &mut device);
    (result, device)
}

pub unsafe fn create_command_pool(
    device: vk::Device,
    family: u32,
    flags: vk::CommandPoolCreateFlags,
) -> (vk::Result, vk::CommandPool) {
    let info = vk::CommandPoolCreateInfo {
        flags,
        queue_family_index: family,
        ..Default::default()
    };
    let mut pool = vk::CommandPool::null();
    let result = icd::vkCreateCommandPool(device, &info, ptr::null(), &mut pool);
    (result, pool)
}

/// Every object is gone and no handle is published.
pub fn assert_nothing_live() {
    for ty in ObjectType::ALL {
        assert_eq!(live_objects(ty), 0, "{:?} objects still alive", ty);
    }
    assert_eq!(HandleTable::global().occupied(), 0);
}
