//! Communicating sequential processes: independent units of execution that share
//! nothing but synchronous channels.
//!
//! A program is a network of processes wired together by channels. Each process
//! runs its own body, blocking on channel reads and writes, and the network as a
//! whole is started, composed and torn down with a handful of operators:
//!
//! - **Rendezvous** -- a write blocks until exactly one reader has taken the value.
//! - **Choice** -- wait on several channels (or timers) at once and commit to one.
//! - **Composition** -- run processes side by side ([`Par`](par::Par)) or one after
//!   another ([`Seq`](seq::Seq)).
//! - **Poison** -- terminate a channel, and through it, the whole network.
//! - **Barriers** -- hold a group of processes until all of them arrive
//!   ([`Barrier`](barrier::Barrier)).
//!
//! # Channels
//!
//! A [`Channel`](channel::Channel) has no buffer. The writer is held until a reader
//! arrives, which means a successful write is also an acknowledgement.
//!
//! ```
//! use std::thread;
//! use rendezvous::channel::Channel;
//!
//! let chan = Channel::new();
//! let reader = {
//!     let chan = chan.clone();
//!     thread::spawn(move || chan.read())
//! };
//! chan.write("ping").unwrap();  // returns only after the reader took it
//! assert_eq!(reader.join().unwrap(), Ok("ping"));
//! ```
//!
//! Channel handles are cheap to clone and may be shared by any number of
//! writers and readers.
//!
//! # Processes
//!
//! [`spawn_process`](process::spawn_process) pairs a body with the arguments it
//! will run on. The arguments are also the process's declared resources: they
//! must be [`Poisonable`](poison::Poisonable), which every channel, and every
//! tuple, `Vec`, `Option`, map or array of channels, is.
//!
//! ```
//! use rendezvous::{channel::Channel, process::{spawn_process, Exit}};
//!
//! let (input, output) = (Channel::<u32>::new(), Channel::new());
//! let double = spawn_process((input.clone(), output.clone()), |(input, output)| loop {
//!     output.write(input.read()? * 2)?;
//! });
//!
//! double.spawn();
//! input.write(21).unwrap();
//! assert_eq!(output.read(), Ok(42));
//!
//! input.poison();
//! assert_eq!(double.join(None), Some(Exit::Poisoned));
//! assert!(output.is_poisoned());
//! ```
//!
//! The body above never returns on its own. It ends when a channel operation
//! fails with [`Poisoned`](error::ChannelError::Poisoned): the `?` hands the error
//! to the process wrapper, which poisons everything in the arguments. That is
//! how termination travels through a network: every neighbour of a poisoned
//! process finds its shared channel poisoned at its next operation, and passes
//! it on.
//!
//! Other failures stay local. A body that returns any other error, or panics,
//! is reported through `tracing` and recorded in its [`Exit`](process::Exit), and
//! nothing else is disturbed.
//!
//! Long-running processes that repeat one step are written with
//! [`spawn_server`](server::spawn_server).
//!
//! # Composition
//!
//! ```
//! use rendezvous::{
//!     builtins, channel::Channel, par::Par, process::{spawn_process, Process}, seq::Seq,
//! };
//!
//! let numbers = Channel::new();
//! let consumer = spawn_process(numbers.clone(), |numbers| {
//!     let mut last = 0;
//!     for _ in 0..93 {
//!         last = numbers.read()?;
//!     }
//!     assert_eq!(last, 12_200_160_415_121_876_738u64);
//!     Ok(())
//! });
//!
//! let hello = spawn_process((), |_| Ok(()));
//! let pipeline = Par::new([builtins::fibonacci(numbers), consumer]);
//! let program = Seq::new([hello, Process::from(pipeline)]);
//! assert!(program.start().is_ok());
//! ```
//!
//! A [`Par`](par::Par) starts every member at once and returns when all of them
//! have finished; a [`Seq`](seq::Seq) runs each member to completion before the
//! next. Both convert into a [`Process`](process::Process), so they nest.
//!
//! # Choice
//!
//! An [`Alt`](alt::Alt) waits on several [guards](guard::Guard) and commits to
//! exactly one ready guard, leaving the others untouched:
//!
//! ```
//! use std::{thread, time::Duration};
//! use rendezvous::{alt::Alt, channel::Channel, guard::{Event, Timer}};
//!
//! let (commands, data) = (Channel::<&str>::new(), Channel::<u8>::new());
//! let writer = {
//!     let commands = commands.clone();
//!     thread::spawn(move || commands.write("stop"))
//! };
//!
//! let command_events = Alt::new().guard(&commands).pri_select().unwrap();
//! assert_eq!(command_events, Event::Message("stop"));
//! writer.join().unwrap().unwrap();
//!
//! let timeout = Timer::new();
//! timeout.set_alarm(Duration::from_millis(5));
//! let mut alt = Alt::new().guard(&data).guard(&timeout);
//! assert!(matches!(alt.select(), Ok(Event::Alarm(_))));
//! ```
//!
//! # Substrates
//!
//! By default every process is one OS thread. The protocol itself only depends
//! on the small set of primitives in [`sync`], and on a [`Substrate`](runtimes::Substrate)
//! to launch units, so both can be swapped: see [`runtimes`] for a Tokio
//! blocking-pool substrate and [`codec`] for channels that carry bytes.
//! [`config::Config`] picks these from the environment.

pub mod alt;
pub mod barrier;
pub mod builtins;
pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod guard;
pub mod par;
pub mod poison;
pub mod process;
pub mod runtimes;
pub mod seq;
pub mod server;
pub mod sync;

pub use error::{ChannelError, ProcessError, Result};
