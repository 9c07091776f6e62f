//! A reusable barrier for a changing set of participants.
//!
//! Every enrolled participant calls [`Barrier::synchronise`]; none of them
//! returns until all of them have arrived, after which the barrier resets for the
//! next round. Participants can join with [`enrol`](Barrier::enrol) and leave with
//! [`retire`](Barrier::retire) between rounds. A participant that retires while
//! the others are waiting counts as having arrived.
//!
//! ```
//! use std::thread;
//! use rendezvous::barrier::Barrier;
//!
//! let barrier = Barrier::new(3);
//! let workers: Vec<_> = (0..3)
//!     .map(|_| {
//!         let barrier = barrier.clone();
//!         thread::spawn(move || {
//!             for _ in 0..4 {
//!                 barrier.synchronise();
//!             }
//!         })
//!     })
//!     .collect();
//! for worker in workers {
//!     worker.join().unwrap();
//! }
//! ```

use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Round {
    participants: usize,
    not_ready: usize,
    /// Bumped each time a round completes; waiters leave when it changes.
    generation: u64,
}

#[derive(Debug, Default)]
struct Shared {
    round: Mutex<Round>,
    changed: Condvar,
}

/// Handle to a barrier. Clones refer to the same barrier.
#[derive(Debug, Clone, Default)]
pub struct Barrier {
    shared: Arc<Shared>,
}

impl Barrier {
    pub fn new(participants: usize) -> Self {
        let barrier = Self::default();
        barrier.reset(participants);
        barrier
    }

    pub fn participants(&self) -> usize {
        self.shared.round.lock().participants
    }

    /// Sets the number of participants and starts a fresh round.
    pub fn reset(&self, participants: usize) {
        let mut round = self.shared.round.lock();
        round.participants = participants;
        round.not_ready = participants;
        self.shared.changed.notify_all();
    }

    pub fn enrol(&self) {
        let mut round = self.shared.round.lock();
        round.participants += 1;
        round.not_ready += 1;
        self.shared.changed.notify_all();
    }

    pub fn retire(&self) {
        let mut round = self.shared.round.lock();
        if round.participants == 0 {
            warn!("retire from a barrier with no participants");
            return;
        }
        round.participants -= 1;
        round.not_ready = round.not_ready.saturating_sub(1);
        if round.not_ready == 0 {
            self.complete(&mut round);
        } else {
            self.shared.changed.notify_all();
        }
    }

    /// Blocks until every enrolled participant has arrived.
    pub fn synchronise(&self) {
        let mut round = self.shared.round.lock();
        self.arrive(&mut round);
    }

    /// Waits until exactly `n` participants are enrolled, then synchronises.
    pub fn synchronise_with(&self, n: usize) {
        let mut round = self.shared.round.lock();
        while round.participants != n {
            self.shared.changed.wait(&mut round);
        }
        self.arrive(&mut round);
    }

    fn arrive(&self, round: &mut MutexGuard<'_, Round>) {
        round.not_ready = round.not_ready.saturating_sub(1);
        if round.not_ready == 0 {
            self.complete(round);
            return;
        }
        let generation = round.generation;
        while round.generation == generation {
            self.shared.changed.wait(round);
        }
    }

    fn complete(&self, round: &mut Round) {
        round.not_ready = round.participants;
        round.generation = round.generation.wrapping_add(1);
        debug!(
            participants = round.participants,
            generation = round.generation,
            "barrier released"
        );
        self.shared.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::Duration,
    };

    use super::*;

    #[test]
    fn enrol_and_retire_track_participants() {
        let barrier = Barrier::new(2);
        barrier.enrol();
        assert_eq!(barrier.participants(), 3);
        barrier.retire();
        barrier.retire();
        assert_eq!(barrier.participants(), 1);
        // A lone participant never waits.
        barrier.synchronise();
        barrier.retire();
        barrier.retire();
        assert_eq!(barrier.participants(), 0);
    }

    #[test]
    fn nobody_leaves_a_round_early() {
        const WORKERS: usize = 4;
        const ROUNDS: usize = 5;
        let barrier = Barrier::new(WORKERS);
        let arrived: Arc<Vec<AtomicUsize>> =
            Arc::new((0..ROUNDS).map(|_| AtomicUsize::new(0)).collect());

        let workers: Vec<_> = (0..WORKERS)
            .map(|i| {
                let (barrier, arrived) = (barrier.clone(), Arc::clone(&arrived));
                thread::spawn(move || {
                    for round in 0..ROUNDS {
                        thread::sleep(Duration::from_millis((i * 3 % 7) as u64));
                        arrived[round].fetch_add(1, Ordering::SeqCst);
                        barrier.synchronise();
                        assert_eq!(arrived[round].load(Ordering::SeqCst), WORKERS);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
    }

    #[test]
    fn retiring_releases_the_waiters() {
        let barrier = Barrier::new(2);
        let waiter = {
            let barrier = barrier.clone();
            thread::spawn(move || barrier.synchronise())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        barrier.retire();
        waiter.join().unwrap();
        assert_eq!(barrier.participants(), 1);
    }

    #[test]
    fn synchronise_with_waits_for_enough_participants() {
        let barrier = Barrier::new(1);
        let waiter = {
            let barrier = barrier.clone();
            thread::spawn(move || barrier.synchronise_with(2))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        barrier.enrol();
        barrier.synchronise();
        waiter.join().unwrap();
    }
}
