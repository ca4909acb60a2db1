// PhysicalDevice - immutable description of one adapter plus the factory
// for logical devices on it

use ash::vk;
use parking_lot::Mutex;
use std::ffi::CStr;
use std::sync::{Arc, Weak};

use crate::backend::{Adapter, BackendKind, DiscoveredAdapter};
use crate::device::{Device, DeviceRequest};
use crate::error::Result;
use crate::handles::HandleTable;
use crate::instance::Instance;
use crate::object::{impl_object, Object, ObjectHeader, ObjectType};

pub struct PhysicalDevice {
    header: ObjectHeader,
    instance: Weak<Instance>,
    backend: BackendKind,
    properties: vk::PhysicalDeviceProperties,
    queue_families: Vec<vk::QueueFamilyProperties>,
    adapter: Box<dyn Adapter>,
    devices: Mutex<Vec<Weak<Device>>>,
}
impl_object!(PhysicalDevice, ObjectType::PhysicalDevice);

impl PhysicalDevice {
    pub(crate) fn new(
        instance: Weak<Instance>,
        backend: BackendKind,
        discovered: DiscoveredAdapter,
    ) -> Arc<Self> {
        Arc::new(Self {
            header: ObjectHeader::new(ObjectType::PhysicalDevice),
            instance,
            backend,
            properties: discovered.desc.properties,
            queue_families: discovered.desc.queue_families,
            adapter: discovered.adapter,
            devices: Mutex::new(Vec::new()),
        })
    }

    pub fn instance(&self) -> Option<Arc<Instance>> {
        self.instance.upgrade()
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn queue_families(&self) -> &[vk::QueueFamilyProperties] {
        &self.queue_families
    }

    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    /// Creates a logical device with every requested queue realized.
    ///
    /// The device is returned only when the native device and all of its
    /// queues were created; on any failure nothing survives.
    pub fn create_device(self: &Arc<Self>, request: &DeviceRequest) -> Result<Arc<Device>> {
        let native = self.adapter.create_device().map_err(|e| {
            log::warn!("Native device creation failed on {}: {}", self.name(), e);
            e
        })?;

        let device = Device::new(Arc::downgrade(self), native);
        device.add_all_queues(&self.queue_families, &request.queues)?;

        let mut devices = self.devices.lock();
        devices.retain(|d| d.strong_count() > 0);
        devices.push(Arc::downgrade(&device));
        drop(devices);

        log::info!(
            "Created device on {} with {} queue family(ies)",
            self.name(),
            request.queues.len()
        );
        Ok(device)
    }

    /// Devices created on this adapter that are still alive.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.lock().iter().filter_map(Weak::upgrade).collect()
    }

    /// Evicts every still-published device of this adapter from `table`,
    /// together with the handles those devices handed out.
    pub fn release_handles(&self, table: &HandleTable) {
        for device in self.devices() {
            let Some(handle) = device.header().handle() else {
                continue;
            };
            if let Some(device) = table.remove::<Device>(handle) {
                device.release_handles(table);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, NullBackendConfig};
    use crate::device::QueueRequest;
    use crate::error::MirvError;

    fn first_physical_device(config: BackendConfig) -> (Arc<Instance>, Arc<PhysicalDevice>) {
        let instance = Instance::new(config);
        let pd = instance.physical_devices()[0].clone();
        (instance, pd)
    }

    #[test]
    fn describes_the_adapter() {
        let (_instance, pd) = first_physical_device(BackendConfig::null_only(1));
        assert_eq!(pd.name(), "Null Adapter 0");
        assert_eq!(pd.backend(), BackendKind::Null);
        assert_eq!(pd.properties().api_version, vk::API_VERSION_1_0);
        assert_eq!(pd.queue_families().len(), 3);
    }

    #[test]
    fn native_failure_creates_no_device() {
        let mut config = BackendConfig::null_only(1);
        config.null = NullBackendConfig {
            adapters: 1,
            fail_device_creation: true,
            ..Default::default()
        };
        let (_instance, pd) = first_physical_device(config);
        let request = DeviceRequest {
            queues: vec![QueueRequest {
                family_index: 0,
                priorities: vec![1.0],
            }],
        };
        assert!(matches!(
            pd.create_device(&request),
            Err(MirvError::InitializationFailed(_))
        ));
    }

    #[test]
    fn device_points_back_at_its_physical_device() {
        let (_instance, pd) = first_physical_device(BackendConfig::null_only(1));
        let request = DeviceRequest {
            queues: vec![QueueRequest {
                family_index: 2,
                priorities: vec![0.5],
            }],
        };
        let device = pd.create_device(&request).unwrap();
        assert!(Arc::ptr_eq(&device.physical_device().unwrap(), &pd));
        assert_eq!(pd.devices().len(), 1);

        drop(device);
        assert!(pd.devices().is_empty());
    }

    #[test]
    fn releasing_handles_evicts_live_devices() {
        let table = HandleTable::new();
        let (_instance, pd) = first_physical_device(BackendConfig::null_only(1));
        let request = DeviceRequest {
            queues: vec![QueueRequest {
                family_index: 0,
                priorities: vec![1.0],
            }],
        };
        let device = pd.create_device(&request).unwrap();
        let device_handle = table.add(&device);
        table.add(&device.queue(0, 0).unwrap());
        drop(device);

        pd.release_handles(&table);
        assert_eq!(table.occupied(), 0);
        assert!(table.get::<Device>(device_handle).is_none());
        assert!(pd.devices().is_empty());
    }
}
