//! Re-entrance detection.
//!
//! Every engine entry point pushes a [`ReentranceScope`]. When a transformer
//! running inside the driver causes another class to be loaded, that load
//! re-enters the engine, pushes a second scope and the depth exceeds
//! `max_depth`. The lock then raises its semaphore, which the driver reads
//! right after the unit returns (see [`ReentranceLock::observe`]).
//!
//! The depth is per lock instance, not per thread. Concurrent loads on
//! different threads that the host does not serialise can raise the
//! semaphore without any real re-entrance.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug)]
pub struct ReentranceLock {
    max_depth: usize,
    depth: AtomicUsize,
    semaphore: AtomicBool,
}

impl Default for ReentranceLock {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ReentranceLock {
    /// `max_depth` below 1 is raised to 1.
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
            depth: AtomicUsize::new(0),
            semaphore: AtomicBool::new(false),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Enter one level. The level is left when the returned scope drops.
    pub fn push(&self) -> ReentranceScope<'_> {
        let depth = self.depth.fetch_add(1, Ordering::AcqRel) + 1;
        if depth > self.max_depth {
            self.set();
        }
        ReentranceScope { lock: self, depth }
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// True while at least one scope is alive.
    pub fn is_locked(&self) -> bool {
        self.depth() > 0
    }

    pub fn set(&self) {
        self.semaphore.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.semaphore.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.semaphore.load(Ordering::Acquire)
    }

    /// Run `f` between a clear and a check of the semaphore.
    ///
    /// Returns `f`'s result and whether anything inside it re-entered. The
    /// semaphore is left cleared either way.
    pub fn observe<T>(&self, f: impl FnOnce() -> T) -> (T, bool) {
        self.clear();
        let value = f();
        let reentered = self.semaphore.swap(false, Ordering::AcqRel);
        (value, reentered)
    }
}

/// One level of engine nesting. Decrements the depth on drop.
#[derive(Debug)]
pub struct ReentranceScope<'a> {
    lock: &'a ReentranceLock,
    depth: usize,
}

impl ReentranceScope<'_> {
    /// Depth at the time this scope was entered.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_reentrant(&self) -> bool {
        self.depth > self.lock.max_depth
    }
}

impl Drop for ReentranceScope<'_> {
    fn drop(&mut self) {
        self.lock.depth.fetch_sub(1, Ordering::AcqRel);
    }
}
