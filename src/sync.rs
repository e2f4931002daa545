//! Shared access to a buddy system.
//!
//! A [`BuddySystem`] requires exclusive access for every operation. Kernel code
//! that shares an instance between harts or interrupt handlers must go through
//! a [`LockedBuddySystem`], which serializes all operations with a spinlock.
//! Independent instances (e.g. one per memory zone) don't share any state and
//! can be locked separately.

use crate::mem::{AllocStats, BuddySystem, Frame, PageFrame, Result, DEFAULT_MAX_ORDER};
use spin::{Mutex, MutexGuard};

/// A buddy system that is protected by a spinlock.
pub struct LockedBuddySystem<'a, P, const MAX_ORDER: usize = DEFAULT_MAX_ORDER>(
    Mutex<BuddySystem<'a, P, MAX_ORDER>>,
);

impl<'a, P: PageFrame, const MAX_ORDER: usize> LockedBuddySystem<'a, P, MAX_ORDER> {
    /// Wrap the given buddy system into a lock.
    pub fn new(system: BuddySystem<'a, P, MAX_ORDER>) -> Self {
        Self(Mutex::new(system))
    }

    /// Acquire the lock, to perform multiple operations at once.
    pub fn lock(&self) -> MutexGuard<'_, BuddySystem<'a, P, MAX_ORDER>> {
        self.0.lock()
    }

    /// Allocate a block of `2^order` pages.
    pub fn alloc(&self, order: usize) -> Result<Frame> {
        self.0.lock().alloc(order)
    }

    /// Allocate the smallest block that holds `count` pages.
    pub fn alloc_pages(&self, count: usize) -> Result<Frame> {
        self.0.lock().alloc_pages(count)
    }

    /// Free a block that was allocated by this buddy system.
    pub fn free(&self, frame: Frame) -> Result<()> {
        self.0.lock().free(frame)
    }

    /// Allocate a single page through the page cache.
    pub fn alloc_cached(&self) -> Result<Frame> {
        self.0.lock().alloc_cached()
    }

    /// Return a single page to the page cache.
    pub fn free_cached(&self, frame: Frame) -> Result<()> {
        self.0.lock().free_cached(frame)
    }

    /// Return the statistics for this buddy system.
    pub fn stats(&self) -> AllocStats {
        self.0.lock().stats()
    }

    /// Consume the lock and return the inner buddy system.
    pub fn into_inner(self) -> BuddySystem<'a, P, MAX_ORDER> {
        self.0.into_inner()
    }
}
