use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

use super::{CountingSignal, MutualExclusionLock, Primitives};

/// Primitives that busy-wait instead of parking.
///
/// Blocked units burn CPU, but a handoff never waits for the scheduler to
/// wake a parked thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spin;

impl Primitives for Spin {
    type Signal = SpinSemaphore;
    type Lock = SpinLock;
    type Flag = CachePadded<AtomicBool>;
}

#[derive(Debug)]
pub struct SpinSemaphore {
    count: CachePadded<AtomicUsize>,
}

impl CountingSignal for SpinSemaphore {
    fn new(initial: usize) -> Self {
        Self {
            count: CachePadded::new(AtomicUsize::new(initial)),
        }
    }

    fn acquire(&self) {
        let backoff = Backoff::new();
        while !self.try_acquire() {
            backoff.snooze();
        }
    }

    fn try_acquire(&self) -> bool {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    fn release(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn value(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct SpinLock {
    locked: CachePadded<AtomicBool>,
}

pub struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

impl MutualExclusionLock for SpinLock {
    type Guard<'a> = SpinGuard<'a>;

    fn new() -> Self {
        Self {
            locked: CachePadded::new(AtomicBool::new(false)),
        }
    }

    fn lock(&self) -> Self::Guard<'_> {
        let backoff = Backoff::new();
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            backoff.snooze();
        }
    }

    fn try_lock(&self) -> Option<Self::Guard<'_>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinGuard { lock: self })
    }
}
