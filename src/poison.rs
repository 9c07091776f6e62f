//! Cascading termination.
//!
//! When a process observes [`Poisoned`](crate::error::ChannelError::Poisoned) on
//! any of its channels, every channel it holds is poisoned too, so its
//! neighbours stop at their next channel operation, and theirs after them. The
//! set of channels a process holds is declared when the process is built: the
//! arguments handed to [`spawn_process`](crate::process::spawn_process) must be
//! [`Poisonable`], and poisoning them reaches every channel they contain.
//!
//! `Poisonable` is implemented for channels, for the usual containers and
//! smart pointers of poisonable things, for tuples, and for
//! [`Process`](crate::process::Process) handles, so nested collections and
//! nested process graphs are all covered:
//!
//! ```
//! use rendezvous::{channel::Channel, poison::Poisonable};
//!
//! let a = Channel::<u8>::new();
//! let bs = vec![Channel::<String>::new(), Channel::new()];
//! let args = (a.clone(), Some(bs.clone()));
//!
//! args.poison();
//! assert!(a.is_poisoned());
//! assert!(bs.iter().all(|b| b.is_poisoned()));
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use crate::{channel::Channel, codec::Codec, sync::Primitives};

pub trait Poisonable: Send + Sync {
    /// Poisons every channel reachable from `self`. Must be idempotent.
    fn poison(&self);
}

impl<T, C: Codec<T>, P: Primitives> Poisonable for Channel<T, C, P> {
    fn poison(&self) {
        Channel::poison(self)
    }
}

impl<A: Poisonable + ?Sized> Poisonable for &A {
    fn poison(&self) {
        (**self).poison()
    }
}

impl<A: Poisonable + ?Sized> Poisonable for Box<A> {
    fn poison(&self) {
        (**self).poison()
    }
}

impl<A: Poisonable + ?Sized> Poisonable for Arc<A> {
    fn poison(&self) {
        (**self).poison()
    }
}

impl<A: Poisonable> Poisonable for Option<A> {
    fn poison(&self) {
        if let Some(inner) = self {
            inner.poison()
        }
    }
}

impl<A: Poisonable> Poisonable for [A] {
    fn poison(&self) {
        self.iter().for_each(Poisonable::poison)
    }
}

impl<A: Poisonable, const N: usize> Poisonable for [A; N] {
    fn poison(&self) {
        self.as_slice().poison()
    }
}

impl<A: Poisonable> Poisonable for Vec<A> {
    fn poison(&self) {
        self.as_slice().poison()
    }
}

impl<K: Send + Sync, A: Poisonable, S: Send + Sync> Poisonable for HashMap<K, A, S> {
    fn poison(&self) {
        self.values().for_each(Poisonable::poison)
    }
}

impl<K: Send + Sync, A: Poisonable> Poisonable for BTreeMap<K, A> {
    fn poison(&self) {
        self.values().for_each(Poisonable::poison)
    }
}

impl Poisonable for () {
    fn poison(&self) {}
}

macro_rules! tuple_poisonable {
    ($($name:ident)+) => {
        impl<$($name: Poisonable),+> Poisonable for ($($name,)+) {
            #[allow(non_snake_case)]
            fn poison(&self) {
                let ($($name,)+) = self;
                $($name.poison();)+
            }
        }
    };
}

tuple_poisonable!(A);
tuple_poisonable!(A B);
tuple_poisonable!(A B C);
tuple_poisonable!(A B C D);
tuple_poisonable!(A B C D E);
tuple_poisonable!(A B C D E F);
tuple_poisonable!(A B C D E F G);
tuple_poisonable!(A B C D E F G H);
tuple_poisonable!(A B C D E F G H I);
tuple_poisonable!(A B C D E F G H I J);
tuple_poisonable!(A B C D E F G H I J K);
tuple_poisonable!(A B C D E F G H I J K L);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaches_into_maps_and_arrays() {
        let chans = [Channel::<i32>::new(), Channel::new()];
        let mut by_name = HashMap::new();
        by_name.insert("out", Channel::<&str>::new());
        let args = (Arc::new(chans.clone()), Box::new(by_name.clone()), ());

        args.poison();
        assert!(chans.iter().all(Channel::is_poisoned));
        assert!(by_name["out"].is_poisoned());
    }

    #[test]
    fn is_idempotent() {
        let chan = Channel::<()>::new();
        let args = (chan.clone(), chan.clone());
        args.poison();
        args.poison();
        assert!(chan.is_poisoned());
    }
}
