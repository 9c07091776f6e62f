//! The synchronization objects a [`Channel`](crate::channel::Channel) is built from.
//!
//! The rendezvous protocol is written once, against three small traits:
//!
//! - [`CountingSignal`] -- a counting semaphore (`available`, `taken`),
//! - [`MutualExclusionLock`] -- a non-reentrant lock (the writer and reader locks),
//! - [`AtomicFlag`] -- a boolean visible to every unit sharing the channel.
//!
//! A [`Primitives`] family picks one implementation of each. An execution
//! substrate that places units in separate address spaces provides its own
//! family backed by cross-address-space objects; the protocol does not change.
//!
//! Two families ship with the crate:
//!
//! - [`Parking`](parking::Parking) parks blocked OS threads (the default),
//! - [`Spin`](spin::Spin) never enters the kernel and spins with exponential backoff,
//!   trading CPU for handoff latency.

pub mod parking;
pub mod spin;

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_utils::CachePadded;

pub use parking::Parking;
pub use spin::Spin;

pub trait CountingSignal: Send + Sync + 'static {
    fn new(initial: usize) -> Self
    where
        Self: Sized;

    /// Blocks until the count is positive, then decrements it.
    fn acquire(&self);

    /// Decrements the count if it is positive. Never blocks.
    fn try_acquire(&self) -> bool;

    fn release(&self);

    /// Snapshot of the count, for logging only.
    fn value(&self) -> usize;
}

pub trait MutualExclusionLock: Send + Sync + 'static {
    type Guard<'a>
    where
        Self: 'a;

    fn new() -> Self
    where
        Self: Sized;

    fn lock(&self) -> Self::Guard<'_>;

    fn try_lock(&self) -> Option<Self::Guard<'_>>;
}

pub trait AtomicFlag: Send + Sync + 'static {
    fn new(value: bool) -> Self
    where
        Self: Sized;

    fn get(&self) -> bool;

    fn set(&self, value: bool);

    /// Stores `value` and returns the previous one.
    fn swap(&self, value: bool) -> bool;
}

/// One synchronization family per execution substrate.
pub trait Primitives: Send + Sync + 'static {
    type Signal: CountingSignal;
    type Lock: MutualExclusionLock;
    type Flag: AtomicFlag;
}

impl AtomicFlag for AtomicBool {
    fn new(value: bool) -> Self {
        AtomicBool::new(value)
    }

    fn get(&self) -> bool {
        self.load(Ordering::SeqCst)
    }

    fn set(&self, value: bool) {
        self.store(value, Ordering::SeqCst)
    }

    fn swap(&self, value: bool) -> bool {
        AtomicBool::swap(self, value, Ordering::SeqCst)
    }
}

impl<F: AtomicFlag> AtomicFlag for CachePadded<F> {
    fn new(value: bool) -> Self {
        CachePadded::new(F::new(value))
    }

    fn get(&self) -> bool {
        (**self).get()
    }

    fn set(&self, value: bool) {
        (**self).set(value)
    }

    fn swap(&self, value: bool) -> bool {
        (**self).swap(value)
    }
}
