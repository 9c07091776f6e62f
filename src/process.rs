//! Processes: one unit of concurrent execution each.
//!
//! [`spawn_process`] wraps a function and the arguments it will be called with
//! into a [`Process`] handle. Nothing runs until the handle is
//! [`spawn`](Process::spawn)ed (returns at once) or [`start`](Process::start)ed
//! (returns when the body has finished).
//!
//! ```
//! use rendezvous::{channel::Channel, process::{spawn_process, Exit}};
//!
//! let out = Channel::new();
//! let hello = spawn_process(out.clone(), |out| {
//!     out.write("hello")?;
//!     Ok(())
//! })
//! .named("hello");
//!
//! hello.spawn();
//! assert_eq!(out.read(), Ok("hello"));
//! assert_eq!(hello.join(None), Some(Exit::Completed));
//! ```
//!
//! # Failure and poison
//!
//! The arguments are the process's declared resources. When the body returns
//! [`ChannelError::Poisoned`] every channel reachable from the arguments is
//! poisoned, so termination spreads to the neighbours. Any other error, and any
//! panic, ends only this process: it is logged and recorded in the [`Exit`].

use std::{
    any::Any,
    fmt, io,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, info_span, warn};

use crate::{
    error::{ChannelError, ProcessError},
    poison::Poisonable,
    runtimes::{Job, Substrate, Threads, Unit},
};

pub type ProcessId = u64;

static NEXT_PROCESS: AtomicU64 = AtomicU64::new(0);

/// How a process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    Completed,
    /// The body observed poison; its resources have been poisoned in turn.
    Poisoned,
    Failed(String),
    Panicked(String),
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    Finished(Exit),
}

pub(crate) enum Body {
    Func(Box<dyn FnOnce() -> Exit + Send>),
    Par(Vec<Process>),
    Seq(Vec<Process>),
}

impl Body {
    fn run(self) -> Exit {
        let outcome = match self {
            Body::Func(f) => return f(),
            Body::Par(members) => crate::par::run(&members),
            Body::Seq(members) => crate::seq::run(&members),
        };
        match outcome {
            Ok(()) => Exit::Completed,
            Err(_) => Exit::Poisoned,
        }
    }
}

#[derive(Default)]
struct Completion {
    exit: Mutex<Option<Exit>>,
    done: Condvar,
}

impl Completion {
    fn finish(&self, exit: Exit) {
        let mut slot = self.exit.lock();
        if slot.is_none() {
            *slot = Some(exit);
        }
        self.done.notify_all();
    }

    fn peek(&self) -> Option<Exit> {
        self.exit.lock().clone()
    }

    fn wait(&self, timeout: Option<Duration>) -> Option<Exit> {
        let mut slot = self.exit.lock();
        match timeout {
            None => {
                while slot.is_none() {
                    self.done.wait(&mut slot);
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while slot.is_none() {
                    if self.done.wait_until(&mut slot, deadline).timed_out() {
                        break;
                    }
                }
            }
        }
        slot.clone()
    }
}

pub struct Process {
    id: ProcessId,
    name: String,
    substrate: Arc<dyn Substrate>,
    resources: Arc<dyn Poisonable>,
    body: Mutex<Option<Body>>,
    unit: Mutex<Option<Box<dyn Unit>>>,
    completion: Arc<Completion>,
    terminated: Arc<AtomicBool>,
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Builds a process that will call `body(&args)`.
///
/// `args` are the process's resources: if the body returns
/// [`ChannelError::Poisoned`], everything in `args` is poisoned.
pub fn spawn_process<A, F>(args: A, body: F) -> Process
where
    A: Poisonable + 'static,
    F: FnOnce(&A) -> Result<(), ProcessError> + Send + 'static,
{
    let args = Arc::new(args);
    let resources: Arc<dyn Poisonable> = args.clone();
    Process::from_body(
        resources,
        Body::Func(Box::new(move || match body(&args) {
            Ok(()) => Exit::Completed,
            Err(ProcessError::Channel(ChannelError::Poisoned)) => {
                debug!("body poisoned, poisoning its resources");
                args.poison();
                Exit::Poisoned
            }
            Err(err) => Exit::Failed(err.to_string()),
        })),
    )
}

impl Process {
    pub(crate) fn from_body(resources: Arc<dyn Poisonable>, body: Body) -> Self {
        let id = NEXT_PROCESS.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            name: format!("proc-{id}"),
            substrate: Arc::new(Threads),
            resources,
            body: Mutex::new(Some(body)),
            unit: Mutex::new(None),
            completion: Arc::default(),
            terminated: Arc::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Runs this process, and any `Par`/`Seq` members inside it, on `substrate`.
    pub fn on(mut self, substrate: Arc<dyn Substrate>) -> Self {
        if let Some(Body::Par(members) | Body::Seq(members)) = self.body.get_mut() {
            let inner = std::mem::take(members);
            *members = inner
                .into_iter()
                .map(|member| member.on(Arc::clone(&substrate)))
                .collect();
        }
        self.substrate = substrate;
        self
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> State {
        match self.completion.peek() {
            Some(exit) => State::Finished(exit),
            None if self.body.lock().is_some() => State::Idle,
            None => State::Running,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state() == State::Running
    }

    /// Begins running the body without waiting for it. Later calls do nothing.
    pub fn spawn(&self) {
        let Some(body) = self.body.lock().take() else {
            return;
        };
        let job = self.job(body);
        match self.substrate.launch(&self.name, job) {
            Ok(unit) => *self.unit.lock() = Some(unit),
            Err(err) => self.launch_failed(err),
        }
    }

    /// Spawns the process and waits for it to finish.
    pub fn start(&self) -> Exit {
        self.spawn();
        self.wait()
    }

    /// Waits for a running process to finish, for at most `timeout` if given.
    ///
    /// Returns `None` if the process was never spawned or the timeout expired.
    pub fn join(&self, timeout: Option<Duration>) -> Option<Exit> {
        if self.body.lock().is_some() {
            return self.completion.peek();
        }
        let exit = self.completion.wait(timeout)?;
        self.reap();
        Some(exit)
    }

    /// Stops the process: its resources are poisoned so it leaves at its next
    /// channel operation, and the substrate is asked to abort it.
    ///
    /// A process that never ran is finished on the spot. Either way the exit is
    /// [`Exit::Terminated`].
    pub fn terminate(&self) {
        if self.completion.peek().is_some() {
            return;
        }
        self.terminated.store(true, Ordering::SeqCst);
        info!(process = %self.name, "terminating");
        self.resources.poison();
        if self.body.lock().take().is_some() {
            self.completion.finish(Exit::Terminated);
            return;
        }
        if let Some(unit) = self.unit.lock().as_ref() {
            unit.abort();
        }
    }

    pub(crate) fn resources(&self) -> &Arc<dyn Poisonable> {
        &self.resources
    }

    pub(crate) fn into_body(mut self) -> Option<Body> {
        self.body.get_mut().take()
    }

    pub(crate) fn is_idle_par(&mut self) -> bool {
        matches!(self.body.get_mut(), Some(Body::Par(_)))
    }

    pub(crate) fn is_idle_seq(&mut self) -> bool {
        matches!(self.body.get_mut(), Some(Body::Seq(_)))
    }

    fn wait(&self) -> Exit {
        let exit = self.completion.wait(None).unwrap_or(Exit::Terminated);
        self.reap();
        exit
    }

    fn reap(&self) {
        if let Some(unit) = self.unit.lock().take() {
            unit.join();
        }
    }

    fn launch_failed(&self, err: io::Error) {
        error!(process = %self.name, error = %err, "could not launch process");
        self.completion.finish(Exit::Failed(err.to_string()));
    }

    fn job(&self, body: Body) -> Job {
        let span = info_span!("process", name = %self.name, id = self.id);
        let completion = Arc::clone(&self.completion);
        let terminated = Arc::clone(&self.terminated);
        Box::new(move || {
            let _entered = span.enter();
            info!("started");
            let exit = match panic::catch_unwind(AssertUnwindSafe(|| body.run())) {
                Ok(exit) => exit,
                Err(payload) => Exit::Panicked(panic_message(payload)),
            };
            let exit = if terminated.load(Ordering::SeqCst) {
                Exit::Terminated
            } else {
                exit
            };
            match &exit {
                Exit::Completed | Exit::Terminated => info!(?exit, "finished"),
                Exit::Poisoned => debug!("finished by poison"),
                Exit::Failed(reason) => error!(%reason, "process failed"),
                Exit::Panicked(reason) => error!(%reason, "process panicked"),
            }
            completion.finish(exit);
        })
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if self.unit.get_mut().is_some() && self.completion.peek().is_none() {
            warn!(process = %self.name, "handle dropped while the process runs");
        }
    }
}

impl Poisonable for Process {
    fn poison(&self) {
        self.resources.poison()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}
