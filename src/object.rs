// Object - type tags and the header every handle-reachable object carries

use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Discriminator stamped on every object at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Instance,
    PhysicalDevice,
    Device,
    Queue,
    CommandPool,
}

impl ObjectType {
    pub const ALL: [ObjectType; 5] = [
        ObjectType::Instance,
        ObjectType::PhysicalDevice,
        ObjectType::Device,
        ObjectType::Queue,
        ObjectType::CommandPool,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

static LIVE_OBJECTS: [AtomicUsize; 5] = [
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
];

/// Number of objects of `ty` constructed and not yet destroyed, process-wide.
pub fn live_objects(ty: ObjectType) -> usize {
    LIVE_OBJECTS[ty.index()].load(Ordering::SeqCst)
}

/// Immutable type tag plus the handle the registry stamped on the object.
#[derive(Debug)]
pub struct ObjectHeader {
    ty: ObjectType,
    // 0 while the object is not published in a handle table.
    handle: AtomicU64,
}

impl ObjectHeader {
    pub fn new(ty: ObjectType) -> Self {
        LIVE_OBJECTS[ty.index()].fetch_add(1, Ordering::SeqCst);
        Self {
            ty,
            handle: AtomicU64::new(0),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.ty
    }

    /// The handle currently naming this object, if any.
    pub fn handle(&self) -> Option<u64> {
        match self.handle.load(Ordering::Acquire) {
            0 => None,
            h => Some(h),
        }
    }

    pub(crate) fn stamp(&self, handle: u64) {
        self.handle.store(handle, Ordering::Release);
    }

    /// Clears the stamp only if it still names `handle`.
    pub(crate) fn clear_stamp(&self, handle: u64) {
        let _ = self
            .handle
            .compare_exchange(handle, 0, Ordering::AcqRel, Ordering::Acquire);
    }
}

impl Drop for ObjectHeader {
    fn drop(&mut self) {
        let previous = LIVE_OBJECTS[self.ty.index()].fetch_sub(1, Ordering::SeqCst);
        assert!(previous > 0, "live object count underflow for {:?}", self.ty);
    }
}

/// Anything the handle table can hold.
pub trait Object: Any + Send + Sync {
    fn header(&self) -> &ObjectHeader;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// An [`Object`] with a statically known tag, used for checked lookups.
pub trait TypedObject: Object + Sized {
    const TYPE: ObjectType;
}

macro_rules! impl_object {
    ($ty:ty, $tag:expr) => {
        impl $crate::object::Object for $ty {
            fn header(&self) -> &$crate::object::ObjectHeader {
                &self.header
            }

            fn into_any(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::sync::Arc<dyn ::std::any::Any + Send + Sync> {
                self
            }
        }

        impl $crate::object::TypedObject for $ty {
            const TYPE: $crate::object::ObjectType = $tag;
        }
    };
}

pub(crate) use impl_object;
