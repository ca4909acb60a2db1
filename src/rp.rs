// Rp - owning reference used for every object reachable through a handle
//
// `Rp` is a nullable strong reference. Cloning retains, dropping releases,
// and moving transfers ownership without touching the count. The atomic
// count itself lives in the `Arc` allocation, so it can never underflow and
// the referent is destroyed synchronously on whichever thread drops the last
// reference.

use std::fmt;
use std::sync::Arc;

pub struct Rp<T: ?Sized>(Option<Arc<T>>);

impl<T: ?Sized> Rp<T> {
    pub const fn null() -> Self {
        Self(None)
    }

    pub fn from_arc(value: Arc<T>) -> Self {
        Self(Some(value))
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<&Arc<T>> {
        self.0.as_ref()
    }

    /// Points this reference at `value`.
    ///
    /// The new referent is retained before the old one is released, so
    /// assigning an object to itself (or to a reference that shares a
    /// subgraph with the old value) never tears it down.
    pub fn assign(&mut self, value: Option<&Arc<T>>) {
        let retained = value.cloned();
        let previous = std::mem::replace(&mut self.0, retained);
        drop(previous);
    }

    /// Releases the current referent and exposes the storage slot for a
    /// creation-style call to fill in.
    ///
    /// Nothing is retained on this path: whatever the caller writes into the
    /// slot is adopted as-is.
    pub fn as_out_var(&mut self) -> &mut Option<Arc<T>> {
        self.0 = None;
        &mut self.0
    }

    /// Strong references to the referent, this one included. Zero for null.
    pub fn ref_count(&self) -> usize {
        self.0.as_ref().map_or(0, Arc::strong_count)
    }

    pub fn ptr_eq(&self, other: &Rp<T>) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ?Sized> Clone for Rp<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: ?Sized> Default for Rp<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> From<Arc<T>> for Rp<T> {
    fn from(value: Arc<T>) -> Self {
        Self::from_arc(value)
    }
}

impl<T: ?Sized> From<Option<Arc<T>>> for Rp<T> {
    fn from(value: Option<Arc<T>>) -> Self {
        Self(value)
    }
}

impl<T: ?Sized> fmt::Debug for Rp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => write!(f, "Rp({:p}, refs={})", Arc::as_ptr(value), self.ref_count()),
            None => write!(f, "Rp(null)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tracked<'a>(&'a AtomicUsize);

    impl Drop for Tracked<'_> {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn clone_retains_and_drop_releases() {
        let value = Rp::from_arc(Arc::new(7u32));
        assert_eq!(value.ref_count(), 1);

        let copy = value.clone();
        assert_eq!(value.ref_count(), 2);
        assert!(copy.ptr_eq(&value));

        drop(copy);
        assert_eq!(value.ref_count(), 1);
    }

    #[test]
    fn move_does_not_touch_the_count() {
        let value = Rp::from_arc(Arc::new(1u8));
        let moved = value;
        assert_eq!(moved.ref_count(), 1);
    }

    #[test]
    fn self_assignment_keeps_referent_alive() {
        let drops = AtomicUsize::new(0);
        let mut slot = Rp::from_arc(Arc::new(Tracked(&drops)));

        let same = slot.get().cloned();
        slot.assign(same.as_ref());
        drop(same);

        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(slot.ref_count(), 1);

        slot.assign(None);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(slot.is_null());
    }

    #[test]
    fn out_var_releases_previous_referent_first() {
        let drops = AtomicUsize::new(0);
        let mut slot = Rp::from_arc(Arc::new(Tracked(&drops)));

        let out = slot.as_out_var();
        assert!(out.is_none());
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        *out = Some(Arc::new(Tracked(&drops)));
        assert_eq!(slot.ref_count(), 1);
    }

    #[test]
    fn null_references_compare_equal() {
        let a: Rp<u32> = Rp::null();
        let b: Rp<u32> = Rp::default();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.ref_count(), 0);
        assert_eq!(format!("{:?}", a), "Rp(null)");
    }
}
