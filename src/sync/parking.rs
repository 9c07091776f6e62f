use std::sync::atomic::AtomicBool;

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::{CountingSignal, MutualExclusionLock, Primitives};

/// Primitives for units that share memory and can be parked by the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parking;

impl Primitives for Parking {
    type Signal = Semaphore;
    type Lock = Lock;
    type Flag = AtomicBool;
}

#[derive(Debug)]
pub struct Semaphore {
    count: Mutex<usize>,
    nonzero: Condvar,
}

impl CountingSignal for Semaphore {
    fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            nonzero: Condvar::new(),
        }
    }

    fn acquire(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.nonzero.wait(&mut count);
        }
        *count -= 1;
    }

    fn try_acquire(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    fn release(&self) {
        *self.count.lock() += 1;
        self.nonzero.notify_one();
    }

    fn value(&self) -> usize {
        *self.count.lock()
    }
}

#[derive(Debug, Default)]
pub struct Lock(Mutex<()>);

impl MutualExclusionLock for Lock {
    type Guard<'a> = MutexGuard<'a, ()>;

    fn new() -> Self {
        Self(Mutex::new(()))
    }

    fn lock(&self) -> Self::Guard<'_> {
        self.0.lock()
    }

    fn try_lock(&self) -> Option<Self::Guard<'_>> {
        self.0.try_lock()
    }
}
