// HandleTable - translates the opaque 64-bit handles given to callers back
// into owning references to live objects.
//
// All object kinds share one table and one handle space. Handle `h` lives in
// slot `h - 1`; 0 is never issued. A lookup only succeeds when the slot holds
// an object whose type tag matches the type the caller asked for, so a stale
// or wrong-kind handle resolves to nothing instead of to an unrelated object.
//
// Locking: the table mutex covers the slot vector and the free list and is
// held only to find or allocate a slot. Each slot has its own mutex for its
// contents, so `get`/`remove` on different handles never contend on anything
// but that brief lookup. The table lock may be taken before a slot lock,
// never the other way round.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::object::{Object, TypedObject};
use crate::rp::Rp;

#[derive(Default)]
struct Slot {
    object: Mutex<Rp<dyn Object>>,
}

#[derive(Default)]
struct TableState {
    slots: Vec<Arc<Slot>>,
    free: Vec<u64>,
}

#[derive(Default)]
pub struct HandleTable {
    state: Mutex<TableState>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table behind the exported entrypoints.
    pub fn global() -> &'static HandleTable {
        static TABLE: OnceLock<HandleTable> = OnceLock::new();
        TABLE.get_or_init(HandleTable::new)
    }

    /// Publishes `object` and returns its handle.
    ///
    /// Adding an object that is already published here returns the existing
    /// handle. Otherwise a recycled handle is reused, or a new one allocated.
    pub fn add<T: Object>(&self, object: &Arc<T>) -> u64 {
        let mut state = self.state.lock();

        if let Some(existing) = object.header().handle() {
            if Self::holds(&state, existing, object) {
                return existing;
            }
        }

        let handle = match state.free.pop() {
            Some(handle) => handle,
            None => {
                state.slots.push(Arc::new(Slot::default()));
                state.slots.len() as u64
            }
        };

        {
            let slot = &state.slots[(handle - 1) as usize];
            let mut contents = slot.object.lock();
            assert!(
                contents.is_null(),
                "free list handed out occupied handle {handle:#x}"
            );
            *contents.as_out_var() = Some(object.clone() as Arc<dyn Object>);
        }
        object.header().stamp(handle);

        log::debug!(
            "published {:?} as handle {:#x}",
            object.header().object_type(),
            handle
        );
        handle
    }

    /// Returns a new owning reference to the `T` named by `handle`.
    ///
    /// The reference keeps the object alive even if another thread removes
    /// the handle while the caller is still using it.
    pub fn get<T: TypedObject>(&self, handle: u64) -> Option<Arc<T>> {
        let slot = self.locate(handle)?;
        let object = {
            let contents = slot.object.lock();
            let object = contents.get()?;
            if object.header().object_type() != T::TYPE {
                return None;
            }
            object.clone()
        };
        object.into_any().downcast::<T>().ok()
    }

    /// Unpublishes the `T` named by `handle` and hands the table's reference
    /// to the caller.
    ///
    /// Removing an empty, never-issued or wrong-kind handle returns `None`
    /// and changes nothing.
    pub fn remove<T: TypedObject>(&self, handle: u64) -> Option<Arc<T>> {
        let slot = self.locate(handle)?;
        let object = {
            let mut contents = slot.object.lock();
            let object = match contents.get() {
                Some(object) if object.header().object_type() == T::TYPE => object.clone(),
                _ => return None,
            };
            contents.assign(None);
            object
        };
        object.header().clear_stamp(handle);
        self.state.lock().free.push(handle);

        log::debug!(
            "retired handle {:#x} ({:?})",
            handle,
            object.header().object_type()
        );
        object.into_any().downcast::<T>().ok()
    }

    /// Number of handles currently naming an object.
    pub fn occupied(&self) -> usize {
        let slots: Vec<Arc<Slot>> = self.state.lock().slots.clone();
        slots.iter().filter(|slot| !slot.object.lock().is_null()).count()
    }

    /// Number of slots ever allocated. Recycling keeps this from growing.
    pub fn slot_count(&self) -> usize {
        self.state.lock().slots.len()
    }

    fn locate(&self, handle: u64) -> Option<Arc<Slot>> {
        let index = usize::try_from(handle.checked_sub(1)?).ok()?;
        self.state.lock().slots.get(index).cloned()
    }

    fn holds<T: Object>(state: &TableState, handle: u64, object: &Arc<T>) -> bool {
        let Some(slot) = state.slots.get((handle - 1) as usize) else {
            return false;
        };
        let candidate = Rp::from(object.clone() as Arc<dyn Object>);
        slot.object.lock().ptr_eq(&candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{impl_object, ObjectHeader, ObjectType};
    use std::sync::Barrier;

    struct Widget {
        header: ObjectHeader,
        value: u32,
    }
    impl_object!(Widget, ObjectType::Queue);

    struct Gadget {
        header: ObjectHeader,
    }
    impl_object!(Gadget, ObjectType::Device);

    fn widget(value: u32) -> Arc<Widget> {
        Arc::new(Widget {
            header: ObjectHeader::new(ObjectType::Queue),
            value,
        })
    }

    fn gadget() -> Arc<Gadget> {
        Arc::new(Gadget {
            header: ObjectHeader::new(ObjectType::Device),
        })
    }

    #[test]
    fn handle_round_trip() {
        let table = HandleTable::new();
        let w = widget(5);
        let h = table.add(&w);

        assert_ne!(h, 0);
        let found = table.get::<Widget>(h).unwrap();
        assert!(Arc::ptr_eq(&found, &w));
        assert_eq!(found.value, 5);
        assert_eq!(w.header.handle(), Some(h));
    }

    #[test]
    fn add_is_idempotent() {
        let table = HandleTable::new();
        let w = widget(1);

        let first = table.add(&w);
        let second = table.add(&w);
        assert_eq!(first, second);
        assert_eq!(table.slot_count(), 1);
        assert_eq!(table.occupied(), 1);
    }

    #[test]
    fn zero_and_out_of_range_handles_resolve_to_nothing() {
        let table = HandleTable::new();
        table.add(&widget(1));

        assert!(table.get::<Widget>(0).is_none());
        assert!(table.get::<Widget>(2).is_none());
        assert!(table.get::<Widget>(u64::MAX).is_none());
        assert!(table.remove::<Widget>(0).is_none());
    }

    #[test]
    fn wrong_type_is_rejected_without_mutation() {
        let table = HandleTable::new();
        let w = widget(3);
        let h = table.add(&w);

        assert!(table.get::<Gadget>(h).is_none());
        assert!(table.remove::<Gadget>(h).is_none());
        assert_eq!(table.occupied(), 1);
        assert!(table.get::<Widget>(h).is_some());
    }

    #[test]
    fn removed_handles_are_recycled_for_new_objects() {
        let table = HandleTable::new();
        let w = widget(1);
        let h = table.add(&w);

        let removed = table.remove::<Widget>(h).unwrap();
        assert!(Arc::ptr_eq(&removed, &w));
        assert_eq!(w.header.handle(), None);
        assert!(table.get::<Widget>(h).is_none());
        assert!(table.get::<Gadget>(h).is_none());
        assert!(table.remove::<Widget>(h).is_none());

        let g = gadget();
        assert_eq!(table.add(&g), h);
        assert_eq!(table.slot_count(), 1);
        assert!(table.get::<Widget>(h).is_none());
        assert!(table.get::<Gadget>(h).is_some());
    }

    #[test]
    fn removal_hands_over_the_table_reference() {
        let table = HandleTable::new();
        let w = widget(9);
        let h = table.add(&w);
        assert_eq!(Arc::strong_count(&w), 2);

        let removed = table.remove::<Widget>(h);
        assert_eq!(Arc::strong_count(&w), 2);
        drop(removed);
        assert_eq!(Arc::strong_count(&w), 1);
    }

    #[test]
    fn reference_from_get_outlives_concurrent_remove() {
        let table = HandleTable::new();
        let h = table.add(&widget(42));
        let barrier = Barrier::new(2);

        std::thread::scope(|s| {
            s.spawn(|| {
                let held = table.get::<Widget>(h).unwrap();
                barrier.wait();
                barrier.wait();
                assert_eq!(held.value, 42);
                assert_eq!(Arc::strong_count(&held), 1);
            });
            s.spawn(|| {
                barrier.wait();
                assert!(table.remove::<Widget>(h).is_some());
                barrier.wait();
            });
        });

        assert_eq!(table.occupied(), 0);
    }

    #[test]
    fn concurrent_adds_get_distinct_handles() {
        let table = HandleTable::new();
        let widgets: Vec<_> = (0..64).map(widget).collect();

        let mut handles: Vec<u64> = std::thread::scope(|s| {
            let workers: Vec<_> = widgets
                .chunks(16)
                .map(|chunk| {
                    let table = &table;
                    s.spawn(move || chunk.iter().map(|w| table.add(w)).collect::<Vec<_>>())
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|worker| worker.join().unwrap())
                .collect()
        });

        handles.sort_unstable();
        handles.dedup();
        assert_eq!(handles.len(), 64);
        assert_eq!(table.occupied(), 64);
    }
}
