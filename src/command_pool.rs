// CommandPool - bound to one queue family of one device
//
// Pools are tracked objects only; command buffer allocation is not wired to
// a native allocator yet.

use ash::vk;
use std::sync::{Arc, Weak};

use crate::device::Device;
use crate::object::{impl_object, ObjectHeader, ObjectType};

pub struct CommandPool {
    header: ObjectHeader,
    device: Weak<Device>,
    family_index: u32,
    flags: vk::CommandPoolCreateFlags,
}
impl_object!(CommandPool, ObjectType::CommandPool);

impl CommandPool {
    pub(crate) fn new(
        device: Weak<Device>,
        family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> Arc<Self> {
        Arc::new(Self {
            header: ObjectHeader::new(ObjectType::CommandPool),
            device,
            family_index,
            flags,
        })
    }

    pub fn device(&self) -> Option<Arc<Device>> {
        self.device.upgrade()
    }

    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    pub fn flags(&self) -> vk::CommandPoolCreateFlags {
        self.flags
    }
}
