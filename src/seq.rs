//! Sequential composition.
//!
//! A [`Seq`] runs its processes one after another: each is started and joined
//! before the next one is spawned. `Seq`s nested directly inside a `Seq` are
//! flattened into it.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    error::{ChannelError, Result},
    poison::Poisonable,
    process::{Body, Exit, Process},
};

#[derive(Debug)]
pub struct Seq {
    procs: Vec<Process>,
}

impl Seq {
    pub fn new(procs: impl IntoIterator<Item = Process>) -> Self {
        let mut flat = Vec::new();
        for mut proc in procs {
            if proc.is_idle_seq() {
                if let Some(Body::Seq(members)) = proc.into_body() {
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

    /// Runs the processes in order.
    ///
    /// If one ends by poison the rest never run: they are terminated, every
    /// member's resources are poisoned and `Err(Poisoned)` is returned.
    pub fn start(&self) -> Result<()> {
        run(&self.procs)
    }
}

impl Poisonable for Seq {
    fn poison(&self) {
        self.procs.poison()
    }
}

impl From<Seq> for Process {
    fn from(seq: Seq) -> Self {
        let resources: Vec<Arc<dyn Poisonable>> =
            seq.procs.iter().map(|p| Arc::clone(p.resources())).collect();
        Process::from_body(Arc::new(resources), Body::Seq(seq.procs))
    }
}

pub(crate) fn run(procs: &[Process]) -> Result<()> {
    info!(processes = procs.len(), "seq starting");
    for (index, proc) in procs.iter().enumerate() {
        if proc.start() == Exit::Poisoned {
            debug!(process = %proc.name(), index, "seq member poisoned, abandoning the rest");
            procs[index + 1..].iter().for_each(Process::terminate);
            procs.poison();
            return Err(ChannelError::Poisoned);
        }
    }
    info!("seq finished");
    Ok(())
}
