// Instance - backend aggregation and the cached physical-device list

use std::sync::{Arc, OnceLock};

use crate::backend::{self, InstanceBackend};
use crate::config::BackendConfig;
use crate::handles::HandleTable;
use crate::object::{impl_object, Object, ObjectHeader, ObjectType};
use crate::physical_device::PhysicalDevice;

pub struct Instance {
    header: ObjectHeader,
    config: BackendConfig,
    backends: OnceLock<Vec<Arc<dyn InstanceBackend>>>,
    physical_devices: OnceLock<Vec<Arc<PhysicalDevice>>>,
}
impl_object!(Instance, ObjectType::Instance);

impl Instance {
    /// Creates an instance that probes the backends enabled in `config` the
    /// first time they are needed.
    pub fn new(config: BackendConfig) -> Arc<Self> {
        Arc::new(Self {
            header: ObjectHeader::new(ObjectType::Instance),
            config,
            backends: OnceLock::new(),
            physical_devices: OnceLock::new(),
        })
    }

    #[cfg(test)]
    fn with_backends(backends: Vec<Arc<dyn InstanceBackend>>) -> Arc<Self> {
        Arc::new(Self {
            header: ObjectHeader::new(ObjectType::Instance),
            config: BackendConfig::default(),
            backends: OnceLock::from(backends),
            physical_devices: OnceLock::new(),
        })
    }

    /// Backends that came up, probed exactly once.
    ///
    /// A platform with no usable backend yields an empty list, not an error.
    pub fn backends(&self) -> &[Arc<dyn InstanceBackend>] {
        self.backends.get_or_init(|| {
            let backends = backend::probe_all(&self.config);
            if backends.is_empty() {
                log::warn!("No graphics backend available");
            }
            backends
        })
    }

    /// Physical devices across all backends, in backend probe order.
    ///
    /// Enumerated once and cached, so the same adapter always maps to the
    /// same object (and therefore the same handle) for the instance's life.
    pub fn physical_devices(self: &Arc<Self>) -> &[Arc<PhysicalDevice>] {
        self.physical_devices.get_or_init(|| {
            let mut found = Vec::new();
            for backend in self.backends() {
                for adapter in backend.enumerate_adapters() {
                    found.push(PhysicalDevice::new(
                        Arc::downgrade(self),
                        backend.kind(),
                        adapter,
                    ));
                }
            }
            log::info!("Discovered {} physical device(s)", found.len());
            for (i, pd) in found.iter().enumerate() {
                log::info!("  [{}] {} ({:?})", i, pd.name(), pd.backend());
            }
            found
        })
    }

    /// Evicts the handles of this instance's physical devices, and of any
    /// device still alive on them, from `table`.
    pub fn release_handles(&self, table: &HandleTable) {
        let Some(physical_devices) = self.physical_devices.get() else {
            return;
        };
        for pd in physical_devices {
            pd.release_handles(table);
            if let Some(handle) = pd.header().handle() {
                drop(table.remove::<PhysicalDevice>(handle));
            }
        }
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        log::debug!("Destroying instance");
    }
}
