use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use proptest::prelude::*;
use rendezvous::{
    channel::Channel,
    codec::{Authenticated, Bincode, Identity},
    sync::{Parking, Primitives, Spin},
    ChannelError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Spreads `values` over `writers` writer threads and drains them with
/// `readers` reader threads. Returns what the readers received.
fn shuffle_through<P: Primitives>(values: Vec<u16>, writers: usize, readers: usize) -> Vec<u16> {
    let chan: Channel<u16, Identity, P> = Channel::with_codec(Identity);
    let remaining = Arc::new(AtomicUsize::new(values.len()));
    let received = Arc::new(Mutex::new(Vec::new()));

    let mut shares = vec![Vec::new(); writers];
    for (i, value) in values.into_iter().enumerate() {
        shares[i % writers].push(value);
    }

    let writer_threads: Vec<_> = shares
        .into_iter()
        .map(|share| {
            let chan = chan.clone();
            thread::spawn(move || share.into_iter().try_for_each(|v| chan.write(v)))
        })
        .collect();
    let reader_threads: Vec<_> = (0..readers)
        .map(|_| {
            let (chan, remaining, received) =
                (chan.clone(), Arc::clone(&remaining), Arc::clone(&received));
            thread::spawn(move || {
                while remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    let value = chan.read().unwrap();
                    received.lock().push(value);
                }
            })
        })
        .collect();

    for writer in writer_threads {
        writer.join().unwrap().unwrap();
    }
    for reader in reader_threads {
        reader.join().unwrap();
    }
    let mut received = received.lock().clone();
    received.sort_unstable();
    received
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn every_value_is_delivered_exactly_once(
        values in prop::collection::vec(any::<u16>(), 0..48),
        writers in 1usize..4,
        readers in 1usize..4,
    ) {
        let mut expected = values.clone();
        expected.sort_unstable();
        prop_assert_eq!(shuffle_through::<Parking>(values, writers, readers), expected);
    }

    #[test]
    fn spinning_primitives_deliver_exactly_once(
        values in prop::collection::vec(any::<u16>(), 0..24),
        writers in 1usize..3,
    ) {
        let mut expected = values.clone();
        expected.sort_unstable();
        prop_assert_eq!(shuffle_through::<Spin>(values, writers, 2), expected);
    }
}

#[test]
fn poison_fails_every_operation_blocked_or_not() {
    init_tracing();
    let chan = Channel::<u32>::new();
    let blocked_readers: Vec<_> = (0..3)
        .map(|_| {
            let chan = chan.clone();
            thread::spawn(move || chan.read())
        })
        .collect();
    thread::sleep(Duration::from_millis(20));
    chan.poison();

    for reader in blocked_readers {
        assert_eq!(reader.join().unwrap(), Err(ChannelError::Poisoned));
    }
    assert_eq!(chan.read(), Err(ChannelError::Poisoned));
    assert_eq!(chan.write(1), Err(ChannelError::Poisoned));
}

#[test]
fn poison_fails_blocked_writers() {
    let chan: Channel<String, Bincode, Spin> = Channel::with_codec(Bincode);
    let blocked_writers: Vec<_> = (0..3)
        .map(|i| {
            let chan = chan.clone();
            thread::spawn(move || chan.write(format!("w{i}")))
        })
        .collect();
    thread::sleep(Duration::from_millis(20));
    chan.poison();
    for writer in blocked_writers {
        assert_eq!(writer.join().unwrap(), Err(ChannelError::Poisoned));
    }
}

#[test]
fn writer_then_poison_delivers_everything_first() {
    let chan = Channel::new();
    let writer = {
        let chan = chan.clone();
        thread::spawn(move || {
            for i in 0..5 {
                chan.write(i)?;
            }
            chan.poison();
            Ok::<_, ChannelError>(())
        })
    };
    let mut got = Vec::new();
    loop {
        match chan.read() {
            Ok(value) => got.push(value),
            Err(err) => {
                assert!(err.is_poisoned());
                break;
            }
        }
    }
    writer.join().unwrap().unwrap();
    assert_eq!(got, [0, 1, 2, 3, 4]);
}

#[test]
fn authenticated_channel_carries_structured_values() {
    let codec = Authenticated::new(b"shared secret");
    let chan: Channel<HashMap<String, u8>, Authenticated> = Channel::with_codec(codec);
    let writer = {
        let chan = chan.clone();
        thread::spawn(move || chan.write(HashMap::from([(String::from("k"), 1)])))
    };
    assert_eq!(chan.read().unwrap()["k"], 1);
    writer.join().unwrap().unwrap();
}
