//! Long-running processes built from a step function.
//!
//! A server calls its step function again and again until the step reports
//! [`Step::Done`] or fails. Poison ends a server like any other process: the
//! step returns `Err(Poisoned)` and the server's resources are poisoned.
//!
//! ```
//! use rendezvous::{channel::Channel, server::{spawn_server, Step}};
//!
//! let (input, output) = (Channel::<i64>::new(), Channel::new());
//! let negate = spawn_server((input.clone(), output.clone()), |(input, output)| {
//!     output.write(-input.read()?)?;
//!     Ok(Step::Continue)
//! });
//!
//! negate.spawn();
//! input.write(5).unwrap();
//! assert_eq!(output.read(), Ok(-5));
//! input.poison();
//! ```
//!
//! # Single stepping
//!
//! With [`Stepping::Triggered`] the server reads one unit from a trigger
//! channel before every step, so a test or debugger can advance it one step at
//! a time. Poisoning the trigger stops the server.

use tracing::trace;

use crate::{
    channel::Channel,
    error::ProcessError,
    poison::Poisonable,
    process::{spawn_process, Process},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Done,
}

#[derive(Debug, Clone, Default)]
pub enum Stepping {
    #[default]
    Free,
    Triggered(Channel<()>),
}

/// Builds a server that runs `step(&args)` until it is done.
pub fn spawn_server<A, F>(args: A, step: F) -> Process
where
    A: Poisonable + 'static,
    F: FnMut(&A) -> Result<Step, ProcessError> + Send + 'static,
{
    spawn_server_with(args, Stepping::Free, step)
}

pub fn spawn_server_with<A, F>(args: A, stepping: Stepping, mut step: F) -> Process
where
    A: Poisonable + 'static,
    F: FnMut(&A) -> Result<Step, ProcessError> + Send + 'static,
{
    let trigger = match stepping {
        Stepping::Free => None,
        Stepping::Triggered(trigger) => Some(trigger),
    };
    spawn_process((args, trigger), move |(args, trigger)| {
        let mut steps = 0u64;
        loop {
            if let Some(trigger) = trigger {
                trigger.read()?;
            }
            let next = step(args)?;
            steps += 1;
            trace!(steps, ?next, "server step");
            if next == Step::Done {
                return Ok(());
            }
        }
    })
}
