//! External choice over a set of guards.
//!
//! An [`Alt`] waits until at least one of its guards is ready, then commits to
//! exactly one of them. Three policies decide which one when several are ready:
//!
//! - [`select`](Alt::select) picks uniformly at random,
//! - [`fair_select`](Alt::fair_select) picks at random but never the guard chosen
//!   last time, unless it is the only one ready,
//! - [`pri_select`](Alt::pri_select) picks the lowest-indexed ready guard.
//!
//! ```
//! use std::thread;
//! use rendezvous::{alt::Alt, channel::Channel, guard::Event};
//!
//! let (a, b) = (Channel::new(), Channel::new());
//! let writer = {
//!     let a = a.clone();
//!     thread::spawn(move || a.write('A'))
//! };
//!
//! let mut alt = Alt::new().guard(&a).guard(&b);
//! assert_eq!(alt.select(), Ok(Event::Message('A')));
//! assert_eq!(alt.last_selected(), Some(0));
//! writer.join().unwrap().unwrap();
//! ```
//!
//! # Waiting
//!
//! Guards are polled: every round the `Alt` tries to enable each guard, and if
//! none could be reserved it sleeps for [`AltConfig::backoff`] before the next
//! round. A guard that is poisoned while the `Alt` waits ends the wait with
//! [`ChannelError::Poisoned`]; reservations already made are handed back first.
//!
//! Each `Alt` owns its own random number generator, so two choices never share
//! or contend on random state. Seed it with [`Alt::seeded`] for reproducible
//! runs.

use std::{fmt, thread, time::Duration};

use tracing::{debug, trace};

use crate::{
    error::{ChannelError, Result},
    guard::{Event, Guard},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AltConfig {
    /// Pause between polling rounds in which no guard was ready.
    pub backoff: Duration,
}

impl Default for AltConfig {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    Random,
    Fair,
    Priority,
}

pub struct Alt<'a, T> {
    guards: Vec<&'a dyn Guard<T>>,
    last_selected: Option<usize>,
    rng: fastrand::Rng,
    config: AltConfig,
}

impl<'a, T> Default for Alt<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> fmt::Debug for Alt<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alt")
            .field("guards", &self.guards.len())
            .field("last_selected", &self.last_selected)
            .field("config", &self.config)
            .finish()
    }
}

impl<'a, T> Alt<'a, T> {
    pub fn new() -> Self {
        Self::with_config(AltConfig::default())
    }

    pub fn with_config(config: AltConfig) -> Self {
        Self {
            guards: Vec::new(),
            last_selected: None,
            rng: fastrand::Rng::new(),
            config,
        }
    }

    /// Builds a choice over guards that are not all of the same type.
    ///
    /// Uses the default [`AltConfig`]; chain [`configure`](Self::configure) to
    /// change it.
    pub fn from_guards(guards: impl IntoIterator<Item = &'a dyn Guard<T>>) -> Self {
        let mut alt = Self::new();
        alt.guards.extend(guards);
        alt
    }

    pub fn configure(mut self, config: AltConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> AltConfig {
        self.config
    }

    /// Adds a guard after the ones already present. Index order is priority order.
    pub fn guard<G: Guard<T>>(mut self, guard: &'a G) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn push(&mut self, guard: &'a dyn Guard<T>) {
        self.guards.push(guard);
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Index of the guard committed by the most recent choice.
    pub fn last_selected(&self) -> Option<usize> {
        self.last_selected
    }

    pub fn select(&mut self) -> Result<Event<T>> {
        self.choose(Policy::Random)
    }

    pub fn fair_select(&mut self) -> Result<Event<T>> {
        self.choose(Policy::Fair)
    }

    pub fn pri_select(&mut self) -> Result<Event<T>> {
        self.choose(Policy::Priority)
    }

    /// Runs [`select`](Self::select) up to `n` times.
    pub fn repeat(&mut self, n: usize) -> Repeat<'_, 'a, T> {
        Repeat {
            alt: self,
            remaining: n,
        }
    }

    /// Poisons the guard chosen last and drops it from the choice.
    ///
    /// The committed guard no longer holds a reservation for this `Alt`, so
    /// nothing is handed back. Another choice holding a reservation on the same
    /// channel finds it poisoned when it commits.
    pub fn poison(&mut self) {
        let Some(index) = self.last_selected.take() else {
            return;
        };
        let guard = self.guards.remove(index);
        guard.poison();
        debug!(index, remaining = self.guards.len(), "alt poisoned guard");
    }

    fn choose(&mut self, policy: Policy) -> Result<Event<T>> {
        match self.guards.len() {
            0 => Err(ChannelError::NoGuardInAlt),
            1 => self.choose_only(),
            _ => self.choose_among(policy),
        }
    }

    fn choose_only(&mut self) -> Result<Event<T>> {
        let guard = self.guards[0];
        while !guard.enable() {
            if guard.is_poisoned() {
                return Err(ChannelError::Poisoned);
            }
            self.back_off();
        }
        self.last_selected = Some(0);
        guard.select()
    }

    fn choose_among(&mut self, policy: Policy) -> Result<Event<T>> {
        let mut reserved = vec![false; self.guards.len()];
        loop {
            for (index, guard) in self.guards.iter().enumerate() {
                if guard.is_poisoned() {
                    debug!(index, "alt saw poisoned guard");
                    self.release(&reserved, None);
                    return Err(ChannelError::Poisoned);
                }
                if !reserved[index] {
                    reserved[index] = guard.enable();
                }
            }
            if reserved.contains(&true) {
                break;
            }
            self.back_off();
        }

        let ready: Vec<usize> = (0..reserved.len()).filter(|&i| reserved[i]).collect();
        let chosen = match policy {
            Policy::Priority => ready[0],
            Policy::Random => ready[self.rng.usize(..ready.len())],
            Policy::Fair => {
                let candidates: Vec<usize> = match self.last_selected {
                    Some(last) if ready.len() > 1 => {
                        ready.iter().copied().filter(|&i| i != last).collect()
                    }
                    _ => ready.clone(),
                };
                candidates[self.rng.usize(..candidates.len())]
            }
        };

        self.release(&reserved, Some(chosen));
        self.last_selected = Some(chosen);
        debug!(chosen, ready = ready.len(), ?policy, "alt committed");
        self.guards[chosen].select()
    }

    /// Disables every guard this choice reserved, except `keep`.
    fn release(&self, reserved: &[bool], keep: Option<usize>) {
        for (index, guard) in self.guards.iter().enumerate() {
            if reserved[index] && Some(index) != keep {
                guard.disable();
            }
        }
    }

    fn back_off(&self) {
        trace!(backoff = ?self.config.backoff, "alt found nothing ready");
        if self.config.backoff.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.config.backoff);
        }
    }
}

/// Iterator returned by [`Alt::repeat`].
pub struct Repeat<'s, 'a, T> {
    alt: &'s mut Alt<'a, T>,
    remaining: usize,
}

impl<'s, 'a, T> Iterator for Repeat<'s, 'a, T> {
    type Item = Result<Event<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.alt.select())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Chooses between two guards, at random if both are ready.
pub fn choice<T, A, B>(a: &A, b: &B) -> Result<Event<T>>
where
    A: Guard<T>,
    B: Guard<T>,
{
    Alt::new().guard(a).guard(b).select()
}
