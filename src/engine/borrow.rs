//! # Iteration Tracking
//!
//! Runtime bookkeeping that decides whether structural changes may be applied
//! immediately or must be queued.
//!
//! ## Purpose
//!
//! Two things are tracked with atomics, without taking the world lock:
//!
//! - **Depth**: the number of iterations currently in progress, on any
//!   thread. Nested iterations increment it again. While it is non-zero,
//!   structural changes are queued. When the outermost iteration exits, the
//!   queue is applied.
//! - **Exclusive owner**: the thread that holds the world's write lock for a
//!   typed column iteration or a `with_component_mut` closure. Any attempt
//!   by that same thread to take the world lock again would deadlock, so it
//!   panics with a descriptive message instead.
//!
//! ## State Encoding
//!
//! | Field | Value | Meaning |
//! |------:|------|--------|
//! | `depth` | `0` | No iteration; changes apply immediately |
//! | `depth` | `n > 0` | `n` nested or concurrent iterations |
//! | `exclusive` | `0` | No thread holds the lock for typed iteration |
//! | `exclusive` | `n > 0` | Typed iteration nesting count on `owner` |
//!
//! ## RAII Integration
//!
//! [`IterationGuard`] and [`ExclusiveGuard`] restore the counters on drop, so
//! a panicking closure leaves the tracker consistent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;


/// Tracks active iterations over a world.
#[derive(Debug, Default)]
pub struct IterationTracker {
    depth: AtomicUsize,
    exclusive: AtomicUsize,
    owner: Mutex<Option<ThreadId>>,
}

impl IterationTracker {
    /// Creates a tracker with no active iteration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of iterations currently in progress.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Returns `true` while any iteration is in progress.
    #[inline]
    pub fn is_iterating(&self) -> bool {
        self.depth() > 0
    }

    /// Marks the start of an iteration.
    pub fn enter(&self) -> IterationGuard<'_> {
        self.depth.fetch_add(1, Ordering::AcqRel);
        IterationGuard { tracker: self, released: false }
    }

    /// Records the current thread as holding the world lock for typed iteration.
    ///
    /// Must be called after the write lock was acquired.
    pub fn enter_exclusive(&self) -> ExclusiveGuard<'_> {
        *self.owner.lock() = Some(thread::current().id());
        self.exclusive.fetch_add(1, Ordering::AcqRel);
        ExclusiveGuard { tracker: self }
    }

    /// Panics if the current thread holds the world lock for typed iteration.
    ///
    /// ## Panics
    /// With a message naming `operation`, instead of deadlocking on the
    /// world lock.

    #[inline]
    pub fn assert_not_reentrant(&self, operation: &str) {
        if self.exclusive.load(Ordering::Acquire) == 0 {
            return;
        }
        let owner = *self.owner.lock();
        if owner == Some(thread::current().id()) {
            panic!(
                "`World::{operation}` called from inside a typed column iteration or \
                 `with_component_mut` closure on the same thread; the world is locked until the \
                 closure returns. Use `World::for_each` to access the world from the closure, or \
                 queue structural changes only"
            );
        }
    }
}

/// Active iteration. Decrements the depth when dropped.
#[must_use = "the iteration ends when the guard is dropped"]
pub struct IterationGuard<'a> {
    tracker: &'a IterationTracker,
    released: bool,
}

impl IterationGuard<'_> {
    /// Ends the iteration. Returns `true` if it was the outermost one.
    pub fn exit(mut self) -> bool {
        self.released = true;
        self.tracker.depth.fetch_sub(1, Ordering::AcqRel) == 1
    }
}

impl Drop for IterationGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            let previous = self.tracker.depth.fetch_sub(1, Ordering::AcqRel);
            debug_assert!(previous >= 1);
        }
    }
}

/// Marks the current thread as the lock holder for a typed iteration.
#[must_use = "the exclusive section ends when the guard is dropped"]
pub struct ExclusiveGuard<'a> {
    tracker: &'a IterationTracker,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        let previous = self.tracker.exclusive.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 {
            *self.tracker.owner.lock() = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_outermost_exit_reports_true() {
        let tracker = IterationTracker::new();
        let outer = tracker.enter();
        let inner = tracker.enter();
        assert_eq!(tracker.depth(), 2);
        assert!(!inner.exit());
        assert!(tracker.is_iterating());
        assert!(outer.exit());
        assert!(!tracker.is_iterating());
    }

    #[test]
    fn dropped_guard_restores_depth() {
        let tracker = IterationTracker::new();
        {
            let _guard = tracker.enter();
            assert_eq!(tracker.depth(), 1);
        }
        assert_eq!(tracker.depth(), 0);
    }

    #[test]
    #[should_panic(expected = "inside a typed column iteration")]
    fn reentry_on_owner_thread_panics() {
        let tracker = IterationTracker::new();
        let _exclusive = tracker.enter_exclusive();
        tracker.assert_not_reentrant("get_component");
    }

    #[test]
    fn other_threads_are_not_reentrant() {
        let tracker = IterationTracker::new();
        let _exclusive = tracker.enter_exclusive();
        std::thread::scope(|scope| {
            scope.spawn(|| tracker.assert_not_reentrant("get_component"));
        });
    }
}
