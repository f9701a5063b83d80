//! Non-owning list of shared instances.
//!
//! # Responsibility
//! - Track instances by `Weak` handle so the list never keeps them alive.
//! - Purge stale handles as a side effect of every read.
//!
//! # Invariants
//! - All access goes through one mutex; it is never held while a caller
//!   works with a yielded instance.
//! - Iteration order is insertion order minus purged entries.
//! - An iterator walks the live entries captured when it was created;
//!   later adds, removals and purges do not shift it.
//! - An instance can become stale at any moment; callers only ever see
//!   upgraded (live) `Arc`s.

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// List of weakly held `T` instances.
pub struct WeakList<T: ?Sized> {
    entries: Mutex<Vec<Weak<T>>>,
}

impl<T: ?Sized> WeakList<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Appends a non-owning handle to `instance`.
    pub fn add(&self, instance: &Arc<T>) {
        self.lock().push(Arc::downgrade(instance));
    }

    /// Appends an existing weak handle.
    ///
    /// # Errors
    /// - `DeadReference` when the handle no longer points to a live instance.
    pub fn add_weak(&self, handle: Weak<T>) -> Result<(), WeakListError> {
        if handle.strong_count() == 0 {
            return Err(WeakListError::DeadReference);
        }
        self.lock().push(handle);
        Ok(())
    }

    /// Removes the first live entry pointing at `instance`.
    pub fn remove(&self, instance: &Arc<T>) -> bool {
        let mut entries = self.lock();
        entries.retain(|entry| entry.strong_count() > 0);
        match entries
            .iter()
            .position(|entry| points_to(entry, instance))
        {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, instance: &Arc<T>) -> bool {
        let mut entries = self.lock();
        entries.retain(|entry| entry.strong_count() > 0);
        entries.iter().any(|entry| points_to(entry, instance))
    }

    /// Number of live entries; stale entries are purged first.
    pub fn len(&self) -> usize {
        let mut entries = self.lock();
        entries.retain(|entry| entry.strong_count() > 0);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Yields the instances live at the time of the call.
    ///
    /// Stale entries are purged and the rest upgraded under one lock; the
    /// lock is released before the first item is yielded.
    pub fn iter(&self) -> Iter<T> {
        Iter {
            live: self.snapshot().into_iter(),
        }
    }

    /// Collects every live instance at once, purging stale entries.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        let mut entries = self.lock();
        let mut live = Vec::with_capacity(entries.len());
        entries.retain(|entry| match entry.upgrade() {
            Some(instance) => {
                live.push(instance);
                true
            }
            None => false,
        });
        live
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Weak<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: ?Sized> Default for WeakList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Debug for WeakList<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakList")
            .field("entries", &self.lock().len())
            .finish()
    }
}

fn points_to<T: ?Sized>(entry: &Weak<T>, instance: &Arc<T>) -> bool {
    entry
        .upgrade()
        .is_some_and(|live| Arc::ptr_eq(&live, instance))
}

/// Iterator over the live entries of a `WeakList`.
///
/// Holds strong handles to the captured entries, so each one stays alive
/// until it has been yielded or the iterator is dropped.
pub struct Iter<T: ?Sized> {
    live: std::vec::IntoIter<Arc<T>>,
}

impl<T: ?Sized> Iterator for Iter<T> {
    type Item = Arc<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.live.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.live.size_hint()
    }
}

/// Invalid arguments to `WeakList`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeakListError {
    DeadReference,
}

impl Display for WeakListError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeadReference => write!(f, "cannot add a handle to a dropped instance"),
        }
    }
}

impl Error for WeakListError {}
