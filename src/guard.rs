//! Anything an [`Alt`](crate::alt::Alt) can wait on.
//!
//! A guard is offered to a choice in two phases. First the choice calls
//! [`enable`](Guard::enable) on every guard, which never blocks and tries to
//! reserve whatever the guard is offering. Once the choice has decided which
//! single guard it will take, it calls [`select`](Guard::select) on that one and
//! [`disable`](Guard::disable) on every other guard it reserved, handing the
//! reservations back untouched.
//!
//! The guards provided here:
//!
//! - a [`Channel`](crate::channel::Channel), which is selectable while a writer is
//!   offering a value and yields [`Event::Message`],
//! - a [`Timer`], selectable once its alarm has passed, yielding [`Event::Alarm`],
//! - a [`Delay`], always selectable, which sleeps when committed and then yields
//!   [`Event::Alarm`],
//! - a [`Condition`], selectable while its predicate holds, yielding
//!   [`Event::Skip`],
//! - [`Skip`], always selectable, yielding [`Event::Skip`].
//!
//! Guards are referenced by choices, never owned by them; one guard may sit in
//! any number of [`Alt`](crate::alt::Alt)s.

use std::{
    fmt, thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::error::Result;

/// What a committed guard produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T> {
    Message(T),
    Skip,
    Alarm(Instant),
}

impl<T> Event<T> {
    pub fn message(self) -> Option<T> {
        match self {
            Event::Message(value) => Some(value),
            Event::Skip | Event::Alarm(_) => None,
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, Event::Message(_))
    }
}

pub trait Guard<T>: Send + Sync {
    /// Whether the guard currently holds a reservation (or needs none).
    fn is_selectable(&self) -> bool;

    /// Tries to reserve the guard's offer without blocking.
    ///
    /// Returns `true` only if this call left the guard reserved for the caller.
    /// A guard already reserved by someone else reports `false`.
    fn enable(&self) -> bool;

    /// Hands back a reservation made by [`enable`](Self::enable) that was not
    /// selected.
    fn disable(&self);

    /// Commits to the reserved offer. Must only follow a successful
    /// [`enable`](Self::enable).
    fn select(&self) -> Result<Event<T>>;

    fn poison(&self) {}

    fn is_poisoned(&self) -> bool {
        false
    }
}

/// Always selectable, has no effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Skip;

impl<T> Guard<T> for Skip {
    fn is_selectable(&self) -> bool {
        true
    }

    fn enable(&self) -> bool {
        true
    }

    fn disable(&self) {}

    fn select(&self) -> Result<Event<T>> {
        Ok(Event::Skip)
    }
}

/// Selectable while `predicate` returns `true`.
///
/// The predicate is evaluated on every polling round, so it should be cheap and
/// must not block. Typical use is switching a branch of a choice on and off:
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use rendezvous::{alt::Alt, guard::{Condition, Event, Skip}};
///
/// let accepting = AtomicBool::new(true);
/// let open = Condition::new(|| accepting.load(Ordering::Relaxed));
/// let mut alt = Alt::<()>::new().guard(&open).guard(&Skip);
/// assert_eq!(alt.pri_select(), Ok(Event::Skip));
/// assert_eq!(alt.last_selected(), Some(0));
///
/// accepting.store(false, Ordering::Relaxed);
/// alt.pri_select().unwrap();
/// assert_eq!(alt.last_selected(), Some(1));
/// ```
pub struct Condition<F> {
    predicate: F,
}

impl<F: Fn() -> bool> Condition<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> fmt::Debug for Condition<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition").finish_non_exhaustive()
    }
}

impl<T, F: Fn() -> bool + Send + Sync> Guard<T> for Condition<F> {
    fn is_selectable(&self) -> bool {
        (self.predicate)()
    }

    fn enable(&self) -> bool {
        (self.predicate)()
    }

    fn disable(&self) {}

    fn select(&self) -> Result<Event<T>> {
        Ok(Event::Skip)
    }
}

/// Always selectable; committing to it sleeps for its duration.
#[derive(Debug, Clone, Copy)]
pub struct Delay {
    duration: Duration,
}

impl Delay {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl<T> Guard<T> for Delay {
    fn is_selectable(&self) -> bool {
        true
    }

    fn enable(&self) -> bool {
        true
    }

    fn disable(&self) {}

    fn select(&self) -> Result<Event<T>> {
        thread::sleep(self.duration);
        Ok(Event::Alarm(Instant::now()))
    }
}

/// Becomes selectable once its alarm has passed.
///
/// A timer without an alarm is always selectable. Racing a `Timer` against a
/// channel inside an [`Alt`](crate::alt::Alt) is how a bounded wait is written:
///
/// ```
/// use std::time::Duration;
/// use rendezvous::{alt::Alt, channel::Channel, guard::{Event, Timer}};
///
/// let input = Channel::<u32>::new();
/// let timer = Timer::new();
/// timer.set_alarm(Duration::from_millis(10));
///
/// let mut alt = Alt::new().guard(&input).guard(&timer);
/// assert!(matches!(alt.select(), Ok(Event::Alarm(_))));
/// ```
#[derive(Debug, Default)]
pub struct Timer {
    alarm: Mutex<Option<Instant>>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_alarm(&self, timeout: Duration) {
        *self.alarm.lock() = Some(Instant::now() + timeout);
    }

    pub fn clear_alarm(&self) {
        *self.alarm.lock() = None;
    }

    pub fn alarm(&self) -> Option<Instant> {
        *self.alarm.lock()
    }

    /// Current time.
    pub fn read(&self) -> Instant {
        Instant::now()
    }

    pub fn sleep(&self, duration: Duration) {
        thread::sleep(duration)
    }
}

impl<T> Guard<T> for Timer {
    fn is_selectable(&self) -> bool {
        match *self.alarm.lock() {
            None => true,
            Some(alarm) => Instant::now() >= alarm,
        }
    }

    fn enable(&self) -> bool {
        Guard::<T>::is_selectable(self)
    }

    fn disable(&self) {}

    fn select(&self) -> Result<Event<T>> {
        Ok(Event::Alarm(self.read()))
    }
}
