//! Scoped arena storage with typed, epoch-checked handles.
//!
//! Every node, struct and interface block of a compile lives in an
//! [`Arena`]. The arena follows a strict stack discipline: [`Arena::push`]
//! records a restore point and [`Arena::pop`] releases everything appended
//! since the matching push in one truncation. Values need no individual
//! teardown beyond their own `Drop`.
//!
//! Each pop advances the arena epoch. Handles remember the epoch they were
//! issued in, so a handle into a released region is rejected even after its
//! slot has been reused by a later compile.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use crate::error::ArenaError;

/// A typed handle into an [`Arena`].
///
/// Handles are lightweight identifiers (u32 index plus epoch) that provide
/// type-safe access to arena-allocated values.
pub struct Handle<T> {
    index: u32,
    epoch: u32,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.epoch == other.epoch
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index
            .cmp(&other.index)
            .then(self.epoch.cmp(&other.epoch))
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.epoch.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.index)
    }
}

impl<T> Handle<T> {
    pub(crate) fn new(index: u32, epoch: u32) -> Self {
        Self {
            index,
            epoch,
            _phantom: PhantomData,
        }
    }

    /// Returns the zero-based index of this handle.
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Returns the arena epoch this handle was issued in.
    pub fn epoch(self) -> u32 {
        self.epoch
    }
}

#[derive(Clone, Debug)]
struct Slot<T> {
    epoch: u32,
    value: T,
}

/// A bump arena with push/pop restore points and typed [`Handle`] access.
#[derive(Clone, Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    epoch: u32,
    marks: Vec<usize>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            epoch: 0,
            marks: Vec::new(),
        }
    }

    /// Returns the number of live elements in the arena.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the arena contains no elements.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of outstanding restore points.
    pub fn depth(&self) -> usize {
        self.marks.len()
    }

    /// Appends a value and returns its handle.
    ///
    /// Exhausting the 32-bit handle space is fatal.
    pub fn append(&mut self, value: T) -> Handle<T> {
        let index = u32::try_from(self.slots.len()).unwrap_or_else(|_| {
            panic!("arena overflow: {} items exceeds u32::MAX", self.slots.len())
        });
        self.slots.push(Slot {
            epoch: self.epoch,
            value,
        });
        Handle::new(index, self.epoch)
    }

    /// Returns `true` if the handle refers to a live value.
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.try_get(handle).is_some()
    }

    /// Returns a reference to the value if the handle is live.
    pub fn try_get(&self, handle: Handle<T>) -> Option<&T> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.epoch == handle.epoch)
            .map(|slot| &slot.value)
    }

    /// Returns a mutable reference to the value if the handle is live.
    pub fn try_get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.epoch == handle.epoch)
            .map(|slot| &mut slot.value)
    }

    /// Checked access that explains why a handle is not usable.
    pub fn get(&self, handle: Handle<T>) -> Result<&T, ArenaError> {
        match self.slots.get(handle.index()) {
            None => Err(ArenaError::OutOfBounds {
                index: handle.index(),
                size: self.slots.len(),
            }),
            Some(slot) if slot.epoch != handle.epoch => Err(ArenaError::Stale {
                index: handle.index(),
                issued: handle.epoch,
                current: slot.epoch,
            }),
            Some(slot) => Ok(&slot.value),
        }
    }

    /// Mutable counterpart of [`get`](Self::get).
    pub fn get_mut(&mut self, handle: Handle<T>) -> Result<&mut T, ArenaError> {
        let size = self.slots.len();
        match self.slots.get_mut(handle.index()) {
            None => Err(ArenaError::OutOfBounds {
                index: handle.index(),
                size,
            }),
            Some(slot) if slot.epoch != handle.epoch => Err(ArenaError::Stale {
                index: handle.index(),
                issued: handle.epoch,
                current: slot.epoch,
            }),
            Some(slot) => Ok(&mut slot.value),
        }
    }

    /// Records a restore point.
    pub fn push(&mut self) {
        self.marks.push(self.slots.len());
    }

    /// Releases everything appended since the matching [`push`](Self::push).
    ///
    /// Returns the number of released values. Popping without an outstanding
    /// restore point releases nothing.
    pub fn pop(&mut self) -> usize {
        let Some(mark) = self.marks.pop() else {
            return 0;
        };
        let released = self.slots.len() - mark;
        self.slots.truncate(mark);
        self.epoch = self.epoch.wrapping_add(1);
        released
    }

    /// Releases every value and every restore point.
    pub fn pop_all(&mut self) {
        self.marks.clear();
        self.slots.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Iterates over `(handle, &value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        // Safety: arena size bounded by u32::MAX (enforced in append)
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (Handle::new(i as u32, slot.epoch), &slot.value))
    }

    /// Iterates over `(handle, &mut value)` pairs.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(i, slot)| (Handle::new(i as u32, slot.epoch), &mut slot.value))
    }
}

impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        match self.try_get(handle) {
            Some(value) => value,
            None => panic!("invalid arena handle {handle:?} (epoch {})", handle.epoch),
        }
    }
}

impl<T> IndexMut<Handle<T>> for Arena<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        match self.try_get_mut(handle) {
            Some(value) => value,
            None => panic!("invalid arena handle {handle:?} (epoch {})", handle.epoch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_append_and_access() {
        let mut arena = Arena::new();
        let h0 = arena.append("hello");
        let h1 = arena.append("world");
        assert_eq!(arena[h0], "hello");
        assert_eq!(arena[h1], "world");
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn arena_iter() {
        let mut arena = Arena::new();
        arena.append(10);
        arena.append(20);
        arena.append(30);
        let items: Vec<_> = arena.iter().map(|(h, &v)| (h.index(), v)).collect();
        assert_eq!(items, vec![(0, 10), (1, 20), (2, 30)]);
    }

    #[test]
    fn pop_releases_since_matching_push() {
        let mut arena = Arena::new();
        let kept = arena.append(1);
        arena.push();
        arena.append(2);
        arena.push();
        arena.append(3);
        arena.append(4);
        assert_eq!(arena.pop(), 2);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.pop(), 1);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena[kept], 1);
        assert_eq!(arena.depth(), 0);
    }

    #[test]
    fn pop_without_push_is_noop() {
        let mut arena = Arena::new();
        arena.append(7);
        assert_eq!(arena.pop(), 0);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn stale_handle_rejected_after_reuse() {
        let mut arena = Arena::new();
        arena.push();
        let stale = arena.append(42);
        arena.pop();
        let fresh = arena.append(99);
        assert_eq!(stale.index(), fresh.index());
        assert_eq!(arena.try_get(stale), None);
        assert!(matches!(arena.get(stale), Err(ArenaError::Stale { .. })));
        assert!(matches!(arena.get_mut(stale), Err(ArenaError::Stale { .. })));
        assert_eq!(arena[fresh], 99);
        *arena.get_mut(fresh).unwrap() = 100;
        assert_eq!(arena[fresh], 100);
    }

    #[test]
    fn handles_survive_inner_pops() {
        let mut arena = Arena::new();
        let outer = arena.append("builtin");
        arena.push();
        arena.append("user");
        arena.pop();
        arena.push();
        arena.append("user again");
        arena.pop();
        assert_eq!(arena.try_get(outer), Some(&"builtin"));
    }

    #[test]
    fn out_of_bounds_reported() {
        let arena = Arena::<u8>::new();
        let handle = Handle::new(3, 0);
        assert_eq!(
            arena.get(handle),
            Err(ArenaError::OutOfBounds { index: 3, size: 0 })
        );
    }

    #[test]
    fn pop_all_clears_everything() {
        let mut arena = Arena::new();
        arena.push();
        let h = arena.append(1);
        arena.push();
        arena.append(2);
        arena.pop_all();
        assert!(arena.is_empty());
        assert_eq!(arena.depth(), 0);
        assert!(!arena.contains(h));
    }

    #[test]
    fn handle_ordering() {
        let h0: Handle<u32> = Handle::new(0, 0);
        let h1: Handle<u32> = Handle::new(1, 0);
        assert!(h0 < h1);
        assert_eq!(h0, h0);
    }
}
