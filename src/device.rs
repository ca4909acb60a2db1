// Device - logical device and its queues
//
// Responsibilities:
// - Queue population at creation time (validated against the physical
//   device's queue families)
// - Queue lookup by (family, index)
// - Command pool creation against a requested family
// - Handle eviction for everything it handed out, on destroy

use ash::vk;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use crate::backend::NativeDevice;
use crate::command_pool::CommandPool;
use crate::error::{MirvError, Result};
use crate::handles::HandleTable;
use crate::object::{impl_object, Object, ObjectHeader, ObjectType};
use crate::physical_device::PhysicalDevice;
use crate::queue::Queue;

/// Queues wanted from one family: one priority per queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRequest {
    pub family_index: u32,
    pub priorities: Vec<f32>,
}

impl QueueRequest {
    pub fn queue_count(&self) -> u32 {
        self.priorities.len() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceRequest {
    pub queues: Vec<QueueRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPoolRequest {
    pub family_index: u32,
    pub flags: vk::CommandPoolCreateFlags,
}

pub struct Device {
    header: ObjectHeader,
    physical_device: Weak<PhysicalDevice>,
    native: Box<dyn NativeDevice>,
    // Filled once by `add_all_queues`, read-only afterwards.
    queues_by_family: Mutex<BTreeMap<u32, Vec<Arc<Queue>>>>,
    // Pools are owned by their handles; this only finds them again.
    command_pools: Mutex<Vec<Weak<CommandPool>>>,
}
impl_object!(Device, ObjectType::Device);

impl Device {
    pub(crate) fn new(
        physical_device: Weak<PhysicalDevice>,
        native: Box<dyn NativeDevice>,
    ) -> Arc<Self> {
        Arc::new(Self {
            header: ObjectHeader::new(ObjectType::Device),
            physical_device,
            native,
            queues_by_family: Mutex::new(BTreeMap::new()),
            command_pools: Mutex::new(Vec::new()),
        })
    }

    pub fn physical_device(&self) -> Option<Arc<PhysicalDevice>> {
        self.physical_device.upgrade()
    }

    /// Realizes every requested queue, or none of them.
    ///
    /// Queues are staged locally and installed only once all families
    /// succeeded, so a failure part-way through leaves the device without
    /// queues and drops the ones already realized.
    pub(crate) fn add_all_queues(
        self: &Arc<Self>,
        families: &[vk::QueueFamilyProperties],
        requests: &[QueueRequest],
    ) -> Result<()> {
        if requests.is_empty() {
            return Err(MirvError::InitializationFailed(
                "a device needs at least one queue family".to_string(),
            ));
        }

        let mut staged: BTreeMap<u32, Vec<Arc<Queue>>> = BTreeMap::new();
        for request in requests {
            let index = request.family_index;
            let family = families.get(index as usize).ok_or_else(|| {
                MirvError::InitializationFailed(format!(
                    "queue family {} out of range ({} families)",
                    index,
                    families.len()
                ))
            })?;
            if staged.contains_key(&index) {
                return Err(MirvError::InitializationFailed(format!(
                    "queue family {} requested twice",
                    index
                )));
            }
            if request.queue_count() > family.queue_count {
                return Err(MirvError::InitializationFailed(format!(
                    "{} queues requested from family {} which has {}",
                    request.queue_count(),
                    index,
                    family.queue_count
                )));
            }

            let natives =
                self.native
                    .create_queues(family, request.queue_count(), &request.priorities)?;
            let queues = natives
                .into_iter()
                .zip(&request.priorities)
                .enumerate()
                .map(|(i, (native, &priority))| {
                    Queue::new(
                        Arc::downgrade(self),
                        index,
                        i as u32,
                        priority,
                        native,
                    )
                })
                .collect();
            staged.insert(index, queues);
        }

        let mut installed = self.queues_by_family.lock();
        if !installed.is_empty() {
            return Err(MirvError::InitializationFailed(
                "device queues are already populated".to_string(),
            ));
        }
        *installed = staged;
        Ok(())
    }

    pub fn queue(&self, family_index: u32, queue_index: u32) -> Option<Arc<Queue>> {
        self.queues_by_family
            .lock()
            .get(&family_index)?
            .get(queue_index as usize)
            .cloned()
    }

    /// Families requested at creation, ascending.
    pub fn queue_family_indices(&self) -> Vec<u32> {
        self.queues_by_family.lock().keys().copied().collect()
    }

    pub fn queue_count(&self, family_index: u32) -> usize {
        self.queues_by_family
            .lock()
            .get(&family_index)
            .map_or(0, Vec::len)
    }

    pub fn create_command_pool(
        self: &Arc<Self>,
        request: &CommandPoolRequest,
    ) -> Result<Arc<CommandPool>> {
        if self.queue_count(request.family_index) == 0 {
            return Err(MirvError::Validation(
                "command pool family was not requested at device creation",
            ));
        }
        let pool = CommandPool::new(Arc::downgrade(self), request.family_index, request.flags);

        let mut pools = self.command_pools.lock();
        pools.retain(|p| p.strong_count() > 0);
        pools.push(Arc::downgrade(&pool));
        Ok(pool)
    }

    /// Pools created from this device that are still alive.
    pub fn command_pools(&self) -> Vec<Arc<CommandPool>> {
        self.command_pools
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Evicts the handles handed out for this device's queues and command
    /// pools from `table`.
    pub fn release_handles(&self, table: &HandleTable) {
        for pool in self.command_pools() {
            if let Some(handle) = pool.header().handle() {
                drop(table.remove::<CommandPool>(handle));
            }
        }

        let queues = self.queues_by_family.lock();
        for queue in queues.values().flatten() {
            if let Some(handle) = queue.header().handle() {
                drop(table.remove::<Queue>(handle));
            }
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        log::debug!("Destroying device");
    }
}
