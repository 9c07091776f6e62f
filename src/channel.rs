//! Rendezvous channels: synchronous, unbuffered handoff of one value at a time.
//!
//! A [`write`](Channel::write) does not return until exactly one reader has taken
//! the value, either with a plain [`read`](Channel::read) or by committing the
//! channel as a guard of an [`Alt`](crate::alt::Alt). There is no buffering: the
//! channel has a single slot.
//!
//! ```
//! use std::thread;
//! use rendezvous::channel::Channel;
//!
//! let chan = Channel::new();
//! let writer = {
//!     let chan = chan.clone();
//!     thread::spawn(move || chan.write(7))
//! };
//! assert_eq!(chan.read(), Ok(7));
//! assert_eq!(writer.join().unwrap(), Ok(()));
//! ```
//!
//! # Many writers, many readers
//!
//! Any number of units may write to or read from the same channel. Writers
//! serialize on a writer lock and readers on a reader lock; whoever acquires the
//! lock first goes first. No FIFO order among concurrent writers (or readers) is
//! promised.
//!
//! # Poison
//!
//! [`poison`](Channel::poison) terminates a channel for good. Every later
//! operation fails with [`ChannelError::Poisoned`], and so does every operation
//! already blocked on the channel. [`write_poison`](Channel::write_poison) sends
//! the poison sentinel through the rendezvous instead, so the reader that
//! receives it is the one that poisons the channel.
//!
//! # Synchronization family and codec
//!
//! `Channel<T>` moves values directly and parks blocked threads. The two other
//! type parameters choose how the in-flight value is represented (a
//! [`Codec`]) and which [`Primitives`] the protocol runs on:
//!
//! ```
//! use rendezvous::{channel::Channel, codec::Bincode, sync::Spin};
//!
//! let chan: Channel<String, Bincode, Spin> = Channel::with_codec(Bincode);
//! # drop(chan);
//! ```

use std::{
    fmt,
    marker::PhantomData,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    codec::{Codec, Identity, Packet},
    error::{ChannelError, Result},
    guard::{Event, Guard},
    sync::{AtomicFlag, CountingSignal, MutualExclusionLock, Parking, Primitives},
};

static NEXT_CHANNEL: AtomicU64 = AtomicU64::new(0);

pub struct Channel<T, C: Codec<T> = Identity, P: Primitives = Parking> {
    shared: Arc<Shared<T, C, P>>,
}

struct Shared<T, C: Codec<T>, P: Primitives> {
    name: String,
    codec: C,
    slot: Mutex<Option<C::Wire>>,
    wlock: P::Lock,
    rlock: P::Lock,
    available: P::Signal,
    taken: P::Signal,
    is_alting: P::Flag,
    is_selectable: P::Flag,
    has_selected: P::Flag,
    poisoned: P::Flag,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T, C: Codec<T>, P: Primitives> Shared<T, C, P> {
    fn check_poison(&self) -> Result<()> {
        if self.poisoned.get() {
            trace!(channel = %self.name, "operation on poisoned channel");
            return Err(ChannelError::Poisoned);
        }
        Ok(())
    }
}

impl<T: Send + 'static> Channel<T> {
    pub fn new() -> Self {
        Self::with_codec(Identity)
    }
}

impl<T: Send + 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Codec<T>, P: Primitives> Clone for Channel<T, C, P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, C: Codec<T>, P: Primitives> fmt::Debug for Channel<T, C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.shared.name)
            .field("poisoned", &self.shared.poisoned.get())
            .finish()
    }
}

impl<T, C: Codec<T>, P: Primitives> Channel<T, C, P> {
    pub fn with_codec(codec: C) -> Self {
        let id = NEXT_CHANNEL.fetch_add(1, Ordering::Relaxed);
        Self {
            shared: Arc::new(Shared {
                name: format!("chan-{id}"),
                codec,
                slot: Mutex::new(None),
                wlock: <P::Lock as MutualExclusionLock>::new(),
                rlock: <P::Lock as MutualExclusionLock>::new(),
                available: <P::Signal as CountingSignal>::new(0),
                taken: <P::Signal as CountingSignal>::new(0),
                is_alting: <P::Flag as AtomicFlag>::new(false),
                is_selectable: <P::Flag as AtomicFlag>::new(false),
                has_selected: <P::Flag as AtomicFlag>::new(false),
                poisoned: <P::Flag as AtomicFlag>::new(false),
                _marker: PhantomData,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn is_poisoned(&self) -> bool {
        self.shared.poisoned.get()
    }

    /// Whether `other` is a handle to the same channel.
    pub fn same_channel(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Offers `value` and blocks until a reader has taken it.
    pub fn write(&self, value: T) -> Result<()> {
        self.offer(Packet::Data(value))
    }

    /// Sends the poison sentinel. Returns once a reader has received it; that
    /// reader poisons the channel.
    pub fn write_poison(&self) -> Result<()> {
        self.offer(Packet::Poison)
    }

    fn offer(&self, packet: Packet<T>) -> Result<()> {
        let s = &*self.shared;
        s.check_poison()?;
        let wire = s.codec.encode(packet)?;
        let _writer = s.wlock.lock();
        s.check_poison()?;
        trace!(channel = %s.name, "write started");
        // A new transaction: a previous Alt commit no longer blocks enabling.
        s.has_selected.set(false);
        *s.slot.lock() = Some(wire);
        s.available.release();
        trace!(
            channel = %s.name,
            available = s.available.value(),
            taken = s.taken.value(),
            "writer waiting"
        );
        s.taken.acquire();
        // Still in the slot means poison woke us, not a reader.
        if s.slot.lock().take().is_some() {
            debug!(channel = %s.name, "write abandoned, channel poisoned");
            return Err(ChannelError::Poisoned);
        }
        trace!(channel = %s.name, "write finished");
        Ok(())
    }

    /// Blocks until a writer offers a value, then takes it.
    pub fn read(&self) -> Result<T> {
        let s = &*self.shared;
        s.check_poison()?;
        let reader = s.rlock.lock();
        s.check_poison()?;
        trace!(channel = %s.name, "read started");
        s.available.acquire();
        s.check_poison()?;
        let Some(wire) = s.slot.lock().take() else {
            return Err(ChannelError::Poisoned);
        };
        s.taken.release();
        drop(reader);
        trace!(channel = %s.name, "read finished");
        self.unpack(wire)
    }

    fn unpack(&self, wire: C::Wire) -> Result<T> {
        match self.shared.codec.decode(wire)? {
            Packet::Data(value) => Ok(value),
            Packet::Poison => {
                debug!(channel = %self.shared.name, "received poison sentinel");
                self.poison();
                Err(ChannelError::Poisoned)
            }
        }
    }

    /// Permanently terminates the channel, waking any blocked reader or writer.
    ///
    /// Idempotent.
    pub fn poison(&self) {
        let s = &*self.shared;
        if s.poisoned.swap(true) {
            return;
        }
        debug!(channel = %s.name, "poisoned");
        s.available.release();
        s.taken.release();
    }
}

impl<T, C: Codec<T>, P: Primitives> Guard<T> for Channel<T, C, P> {
    fn is_selectable(&self) -> bool {
        self.shared.is_selectable.get()
    }

    fn enable(&self) -> bool {
        let s = &*self.shared;
        if s.poisoned.get() || s.has_selected.get() || s.is_selectable.get() {
            return false;
        }
        // Contention on the reader lock just means "not ready this round".
        let Some(_reader) = s.rlock.try_lock() else {
            return false;
        };
        // Reserve and record the reservation as one step, so two Alts can never
        // both believe they hold the same offer.
        if s.is_selectable.get() {
            return false;
        }
        s.is_alting.set(true);
        let reserved = s.available.try_acquire();
        s.is_selectable.set(reserved);
        trace!(channel = %s.name, reserved, alting = s.is_alting.get(), "enable");
        reserved
    }

    fn disable(&self) {
        let s = &*self.shared;
        s.is_alting.set(false);
        if s.is_selectable.swap(false) {
            s.available.release();
            trace!(channel = %s.name, "disable released reservation");
        }
    }

    fn select(&self) -> Result<Event<T>> {
        let s = &*self.shared;
        // Poison may have landed between enable and select; the reservation
        // then refers to nothing.
        if s.poisoned.get() {
            s.is_selectable.set(false);
            s.is_alting.set(false);
            return Err(ChannelError::Poisoned);
        }
        assert!(
            s.is_selectable.get(),
            "select on {} without a successful enable",
            s.name
        );
        let wire = s.slot.lock().take();
        // Flags are settled before `taken` lets the writer go, so the next
        // writer's reset of `has_selected` cannot be overwritten.
        s.has_selected.set(true);
        s.is_selectable.set(false);
        s.is_alting.set(false);
        // Empty means poison woke the writer and it reclaimed the value.
        let Some(wire) = wire else {
            return Err(ChannelError::Poisoned);
        };
        s.taken.release();
        trace!(channel = %s.name, "select finished");
        self.unpack(wire).map(Event::Message)
    }

    fn poison(&self) {
        Channel::poison(self)
    }

    fn is_poisoned(&self) -> bool {
        Channel::is_poisoned(self)
    }
}
