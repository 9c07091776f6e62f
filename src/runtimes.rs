//! Execution substrates: what actually runs a [`Process`](crate::process::Process).
//!
//! A substrate takes a job (the wrapped process body) and starts it on one
//! execution unit. Channels and everything built on them behave the same
//! whichever substrate runs the units.
//!
//! - [`Threads`] gives every process its own OS thread (the default).
//! - [`tokio::Blocking`] (feature `runtime-tokio`) runs processes on the blocking
//!   pool of a Tokio runtime, for programs that already have one.

use std::{fmt, io, thread};

/// The wrapped body of a process, ready to run. It records its own exit status.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Substrate: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Starts `job` on a fresh unit and returns without waiting for it.
    fn launch(&self, name: &str, job: Job) -> io::Result<Box<dyn Unit>>;
}

/// A launched unit of execution.
pub trait Unit: Send {
    /// Waits for the unit itself to wind down once its job has returned.
    fn join(self: Box<Self>);

    /// Stops the unit if the substrate is able to. Returns whether it tried.
    fn abort(&self) -> bool;
}

impl fmt::Debug for dyn Substrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One OS thread per process. Units share memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct Threads;

impl Substrate for Threads {
    fn name(&self) -> &'static str {
        "threads"
    }

    fn launch(&self, name: &str, job: Job) -> io::Result<Box<dyn Unit>> {
        let handle = thread::Builder::new().name(name.to_owned()).spawn(job)?;
        Ok(Box::new(handle))
    }
}

impl Unit for thread::JoinHandle<()> {
    fn join(self: Box<Self>) {
        // The job catches its own panics; nothing useful comes back here.
        let _ = (*self).join();
    }

    fn abort(&self) -> bool {
        false
    }
}

#[cfg(feature = "runtime-tokio")]
pub mod tokio {
    use std::io;

    use tokio::{runtime::Handle, task::JoinHandle};

    use super::{Job, Substrate, Unit};

    /// Runs processes on the blocking thread pool of a Tokio runtime.
    ///
    /// Processes block on channel operations, so they must never run on the
    /// async worker threads themselves.
    #[derive(Debug, Clone)]
    pub struct Blocking {
        handle: Handle,
    }

    impl Blocking {
        pub fn new(handle: Handle) -> Self {
            Self { handle }
        }

        /// Uses the runtime the caller is running in, if any.
        pub fn current() -> Option<Self> {
            Handle::try_current().ok().map(Self::new)
        }
    }

    impl Substrate for Blocking {
        fn name(&self) -> &'static str {
            "tokio-blocking"
        }

        fn launch(&self, _name: &str, job: Job) -> io::Result<Box<dyn Unit>> {
            Ok(Box::new(self.handle.spawn_blocking(job)))
        }
    }

    impl Unit for JoinHandle<()> {
        fn join(self: Box<Self>) {
            let _ = futures::executor::block_on(*self);
        }

        fn abort(&self) -> bool {
            // Only effective before the blocking task has started.
            JoinHandle::abort(self);
            true
        }
    }
}
