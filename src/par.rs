//! Parallel composition.
//!
//! A [`Par`] starts all of its processes at once and returns when every one of
//! them has finished. A `Par` is itself usable as a process (through
//! `Process::from`), so parallel and sequential compositions nest freely;
//! `Par`s nested directly inside a `Par` are flattened into it.
//!
//! ```
//! use rendezvous::{channel::Channel, par::Par, process::spawn_process};
//!
//! let chan = Channel::new();
//! let producer = spawn_process(chan.clone(), |c| Ok(c.write(42)?));
//! let consumer = spawn_process(chan.clone(), |c| {
//!     assert_eq!(c.read()?, 42);
//!     Ok(())
//! });
//!
//! assert_eq!(Par::new([producer, consumer]).start(), Ok(()));
//! ```

use std::{sync::Arc, time::Duration};

use tracing::{debug, info};

use crate::{
    error::{ChannelError, Result},
    poison::Poisonable,
    process::{Body, Exit, Process, State},
};

/// How long a join waits on one member before checking the others.
const JOIN_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub struct Par {
    procs: Vec<Process>,
}

impl Par {
    pub fn new(procs: impl IntoIterator<Item = Process>) -> Self {
        let mut flat = Vec::new();
        for mut proc in procs {
            if proc.is_idle_par() {
                if let Some(Body::Par(members)) = proc.into_body() {
                    flat.extend(members);
                }
            } else {
                flat.push(proc);
            }
        }
        Self { procs: flat }
    }

    pub fn len(&self) -> usize {
        self.procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }

    pub fn processes(&self) -> &[Process] {
        &self.procs
    }

    /// Runs every process and waits for all of them.
    ///
    /// If any process ended by poison, the resources of every process are
    /// poisoned and `Err(Poisoned)` is returned once all have finished.
    pub fn start(&self) -> Result<()> {
        run(&self.procs)
    }

    /// Starts every process without waiting.
    pub fn spawn(&self) {
        self.procs.iter().for_each(Process::spawn);
    }

    /// Waits for every spawned process to finish.
    pub fn join(&self) -> Result<()> {
        join_all(&self.procs)
    }

    pub fn terminate(&self) {
        self.procs.iter().for_each(Process::terminate);
    }
}

impl Poisonable for Par {
    fn poison(&self) {
        self.procs.poison()
    }
}

impl From<Par> for Process {
    fn from(par: Par) -> Self {
        let resources: Vec<Arc<dyn Poisonable>> =
            par.procs.iter().map(|p| Arc::clone(p.resources())).collect();
        Process::from_body(Arc::new(resources), Body::Par(par.procs))
    }
}

pub(crate) fn run(procs: &[Process]) -> Result<()> {
    info!(processes = procs.len(), "par starting");
    procs.iter().for_each(Process::spawn);
    join_all(procs)
}

fn join_all(procs: &[Process]) -> Result<()> {
    let mut pending: Vec<&Process> = procs.iter().collect();
    let mut poisoned = false;
    while !pending.is_empty() {
        let mut still_running = Vec::with_capacity(pending.len());
        for proc in pending {
            match proc.join(Some(JOIN_SLICE)) {
                Some(Exit::Poisoned) if !poisoned => {
                    debug!(process = %proc.name(), "par member poisoned, poisoning all members");
                    poisoned = true;
                    procs.poison();
                }
                Some(_) => {}
                // Never spawned: nothing to wait for.
                None if proc.state() == State::Idle => {}
                None => still_running.push(proc),
            }
        }
        pending = still_running;
    }
    info!(poisoned, "par finished");
    if poisoned {
        Err(ChannelError::Poisoned)
    } else {
        Ok(())
    }
}
