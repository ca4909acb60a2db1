// Create info - caller-owned create-info structs read into owned requests
//
// Every check here runs before any backend is touched, and none of them
// changes state. Anything this driver does not support (chained structs,
// flags, layers, extensions, features, other API versions) is rejected.

use ash::vk;
use std::ffi::CStr;
use std::os::raw::c_char;

use crate::device::{CommandPoolRequest, DeviceRequest, QueueRequest};
use crate::error::{MirvError, Result};

/// What the application told us about itself at instance creation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstanceRequest {
    pub application_name: Option<String>,
    pub engine_name: Option<String>,
    pub api_version: u32,
}

unsafe fn opt_string(p: *const c_char) -> Option<String> {
    (!p.is_null()).then(|| CStr::from_ptr(p).to_string_lossy().into_owned())
}

unsafe fn slice_or_empty<'a, T>(p: *const T, count: u32) -> Result<&'a [T]> {
    match (count, p.is_null()) {
        (0, _) => Ok(&[]),
        (_, true) => Err(MirvError::Validation("non-zero count with a null array")),
        (n, false) => Ok(std::slice::from_raw_parts(p, n as usize)),
    }
}

fn is_supported_api_version(version: u32) -> bool {
    version == 0
        || (vk::api_version_variant(version) == 0
            && vk::api_version_major(version) == 1
            && vk::api_version_minor(version) == 0)
}

/// # Safety
/// `info` must be null or point to a valid `VkInstanceCreateInfo`, with every
/// pointer inside it valid for the counts it declares.
pub unsafe fn instance_request(info: *const vk::InstanceCreateInfo) -> Result<InstanceRequest> {
    let info = info
        .as_ref()
        .ok_or(MirvError::Validation("null instance create info"))?;
    if info.s_type != vk::StructureType::INSTANCE_CREATE_INFO {
        return Err(MirvError::Validation("wrong sType for instance create info"));
    }
    if !info.p_next.is_null() || !info.flags.is_empty() {
        return Err(MirvError::Validation("unsupported instance create info chain or flags"));
    }

    let mut request = InstanceRequest::default();
    if let Some(app) = info.p_application_info.as_ref() {
        if app.s_type != vk::StructureType::APPLICATION_INFO {
            return Err(MirvError::Validation("wrong sType for application info"));
        }
        if !app.p_next.is_null() {
            return Err(MirvError::Validation("unsupported application info chain"));
        }
        if !is_supported_api_version(app.api_version) {
            return Err(MirvError::IncompatibleDriver(app.api_version));
        }
        request.application_name = opt_string(app.p_application_name);
        request.engine_name = opt_string(app.p_engine_name);
        request.api_version = app.api_version;
    }

    if info.enabled_layer_count != 0 {
        return Err(MirvError::LayerNotPresent);
    }
    if info.enabled_extension_count != 0 {
        return Err(MirvError::ExtensionNotPresent);
    }
    Ok(request)
}

unsafe fn any_feature_enabled(features: *const vk::PhysicalDeviceFeatures) -> bool {
    let Some(features) = features.as_ref() else {
        return false;
    };
    // The struct is nothing but VkBool32 fields.
    let words = std::mem::size_of::<vk::PhysicalDeviceFeatures>() / std::mem::size_of::<vk::Bool32>();
    std::slice::from_raw_parts(features as *const _ as *const vk::Bool32, words)
        .iter()
        .any(|&b| b != vk::FALSE)
}

unsafe fn queue_request(info: &vk::DeviceQueueCreateInfo) -> Result<QueueRequest> {
    if info.s_type != vk::StructureType::DEVICE_QUEUE_CREATE_INFO {
        return Err(MirvError::Validation("wrong sType for device queue create info"));
    }
    if !info.p_next.is_null() || !info.flags.is_empty() {
        return Err(MirvError::Validation("unsupported queue create info chain or flags"));
    }
    if info.queue_count == 0 {
        return Err(MirvError::Validation("queueCount must be at least 1"));
    }
    if info.p_queue_priorities.is_null() {
        return Err(MirvError::Validation("null queue priorities"));
    }

    let priorities = std::slice::from_raw_parts(info.p_queue_priorities, info.queue_count as usize);
    if !priorities.iter().all(|p| (0.0..=1.0).contains(p)) {
        return Err(MirvError::Validation("queue priority outside [0, 1]"));
    }
    Ok(QueueRequest {
        family_index: info.queue_family_index,
        priorities: priorities.to_vec(),
    })
}

/// # Safety
/// `info` must be null or point to a valid `VkDeviceCreateInfo`, with every
/// pointer inside it valid for the counts it declares.
pub unsafe fn device_request(info: *const vk::DeviceCreateInfo) -> Result<DeviceRequest> {
    let info = info
        .as_ref()
        .ok_or(MirvError::Validation("null device create info"))?;
    if info.s_type != vk::StructureType::DEVICE_CREATE_INFO {
        return Err(MirvError::Validation("wrong sType for device create info"));
    }
    if !info.p_next.is_null() || !info.flags.is_empty() {
        return Err(MirvError::Validation("unsupported device create info chain or flags"));
    }
    if info.enabled_layer_count != 0 {
        return Err(MirvError::LayerNotPresent);
    }
    if info.enabled_extension_count != 0 {
        return Err(MirvError::ExtensionNotPresent);
    }
    if any_feature_enabled(info.p_enabled_features) {
        return Err(MirvError::FeatureNotPresent);
    }

    let queue_infos = slice_or_empty(info.p_queue_create_infos, info.queue_create_info_count)?;
    let queues = queue_infos
        .iter()
        .map(|q| queue_request(q))
        .collect::<Result<Vec<_>>>()?;
    Ok(DeviceRequest { queues })
}

/// # Safety
/// `info` must be null or point to a valid `VkCommandPoolCreateInfo`.
pub unsafe fn command_pool_request(
    info: *const vk::CommandPoolCreateInfo,
) -> Result<CommandPoolRequest> {
    let info = info
        .as_ref()
        .ok_or(MirvError::Validation("null command pool create info"))?;
    if info.s_type != vk::StructureType::COMMAND_POOL_CREATE_INFO {
        return Err(MirvError::Validation("wrong sType for command pool create info"));
    }
    if !info.p_next.is_null() {
        return Err(MirvError::Validation("unsupported command pool create info chain"));
    }
    let supported =
        vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER;
    if !supported.contains(info.flags) {
        return Err(MirvError::Validation("unsupported command pool flags"));
    }
    Ok(CommandPoolRequest {
        family_index: info.queue_family_index,
        flags: info.flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    fn app_info(api_version: u32) -> vk::ApplicationInfo {
        vk::ApplicationInfo {
            p_application_name: b"triangle\0".as_ptr() as *const c_char,
            application_version: 1,
            api_version,
            ..Default::default()
        }
    }

    #[test]
    fn default_instance_request_is_accepted() {
        let app = app_info(vk::API_VERSION_1_0);
        let info = vk::InstanceCreateInfo {
            p_application_info: &app,
            ..Default::default()
        };
        let request = unsafe { instance_request(&info) }.unwrap();
        assert_eq!(request.application_name.as_deref(), Some("triangle"));
        assert_eq!(request.engine_name, None);
        assert_eq!(request.api_version, vk::API_VERSION_1_0);

        let bare = vk::InstanceCreateInfo::default();
        assert!(unsafe { instance_request(&bare) }.is_ok());
    }

    #[test]
    fn instance_request_rejections() {
        assert_eq!(
            unsafe { instance_request(ptr::null()) },
            Err(MirvError::Validation("null instance create info"))
        );

        let wrong_type = vk::InstanceCreateInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            ..Default::default()
        };
        assert!(matches!(
            unsafe { instance_request(&wrong_type) },
            Err(MirvError::Validation(_))
        ));

        let app = app_info(vk::API_VERSION_1_1);
        let newer = vk::InstanceCreateInfo {
            p_application_info: &app,
            ..Default::default()
        };
        assert_eq!(
            unsafe { instance_request(&newer) },
            Err(MirvError::IncompatibleDriver(vk::API_VERSION_1_1))
        );

        let layers = vk::InstanceCreateInfo {
            enabled_layer_count: 1,
            ..Default::default()
        };
        assert_eq!(unsafe { instance_request(&layers) }, Err(MirvError::LayerNotPresent));

        let extensions = vk::InstanceCreateInfo {
            enabled_extension_count: 2,
            ..Default::default()
        };
        assert_eq!(
            unsafe { instance_request(&extensions) },
            Err(MirvError::ExtensionNotPresent)
        );
    }

    #[test]
    fn patch_versions_of_1_0_are_accepted() {
        assert!(is_supported_api_version(vk::make_api_version(0, 1, 0, 3)));
        assert!(is_supported_api_version(0));
        assert!(!is_supported_api_version(vk::make_api_version(0, 2, 0, 0)));
    }

    #[test]
    fn device_request_reads_queue_priorities() {
        let priorities = [0.5f32, 1.0];
        let queue = vk::DeviceQueueCreateInfo {
            queue_family_index: 2,
            queue_count: 2,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        };
        let info = vk::DeviceCreateInfo {
            queue_create_info_count: 1,
            p_queue_create_infos: &queue,
            ..Default::default()
        };

        let request = unsafe { device_request(&info) }.unwrap();
        assert_eq!(
            request.queues,
            vec![QueueRequest {
                family_index: 2,
                priorities: vec![0.5, 1.0],
            }]
        );
    }

    #[test]
    fn device_request_rejects_bad_queues() {
        let priorities = [1.5f32];
        let queue = vk::DeviceQueueCreateInfo {
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        };
        let info = vk::DeviceCreateInfo {
            queue_create_info_count: 1,
            p_queue_create_infos: &queue,
            ..Default::default()
        };
        assert!(matches!(
            unsafe { device_request(&info) },
            Err(MirvError::Validation(_))
        ));

        let empty = vk::DeviceQueueCreateInfo {
            queue_count: 0,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        };
        let info = vk::DeviceCreateInfo {
            queue_create_info_count: 1,
            p_queue_create_infos: &empty,
            ..Default::default()
        };
        assert!(matches!(
            unsafe { device_request(&info) },
            Err(MirvError::Validation(_))
        ));

        let dangling = vk::DeviceCreateInfo {
            queue_create_info_count: 1,
            ..Default::default()
        };
        assert!(matches!(
            unsafe { device_request(&dangling) },
            Err(MirvError::Validation(_))
        ));
    }

    #[test]
    fn device_request_rejects_features() {
        let features = vk::PhysicalDeviceFeatures {
            sampler_anisotropy: vk::TRUE,
            ..Default::default()
        };
        let info = vk::DeviceCreateInfo {
            p_enabled_features: &features,
            ..Default::default()
        };
        assert_eq!(
            unsafe { device_request(&info) },
            Err(MirvError::FeatureNotPresent)
        );

        let none = vk::PhysicalDeviceFeatures::default();
        let info = vk::DeviceCreateInfo {
            p_enabled_features: &none,
            ..Default::default()
        };
        assert_eq!(unsafe { device_request(&info) }.unwrap().queues.len(), 0);
    }

    #[test]
    fn command_pool_flags_are_checked() {
        let info = vk::CommandPoolCreateInfo {
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            queue_family_index: 1,
            ..Default::default()
        };
        let request = unsafe { command_pool_request(&info) }.unwrap();
        assert_eq!(request.family_index, 1);

        let protected = vk::CommandPoolCreateInfo {
            flags: vk::CommandPoolCreateFlags::PROTECTED,
            ..Default::default()
        };
        assert!(matches!(
            unsafe { command_pool_request(&protected) },
            Err(MirvError::Validation(_))
        ));
    }
}
