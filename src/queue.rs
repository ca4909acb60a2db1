// Queue - one realized native queue of a device's queue family

use std::sync::{Arc, Weak};

use crate::backend::{NativeQueue, QueueKind};
use crate::device::Device;
use crate::object::{impl_object, ObjectHeader, ObjectType};

pub struct Queue {
    header: ObjectHeader,
    device: Weak<Device>,
    family_index: u32,
    index: u32,
    priority: f32,
    native: Box<dyn NativeQueue>,
}
impl_object!(Queue, ObjectType::Queue);

impl Queue {
    pub(crate) fn new(
        device: Weak<Device>,
        family_index: u32,
            index: u32,
        priority: f32,
        native: Box<dyn NativeQueue>,
    ) -> Arc<Self> {
        Arc::new(Self {
            header: ObjectHeader::new(ObjectType::Queue),
            device,
            family_index,
            index,
            priority,
            native,
        })
    }

    pub fn device(&self) -> Option<Arc<Device>> {
        self.device.upgrade()
    }

    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    /// Position within its family.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn priority(&self) -> f32 {
        self.priority
    }

    pub fn kind(&self) -> QueueKind {
        self.native.kind()
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("family_index", &self.family_index)
            .field("index", &self.index)
            .field("priority", &self.priority)
            .field("native", &self.native)
            .finish()
    }
}
