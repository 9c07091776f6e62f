use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use rendezvous::{
    alt::{Alt, AltConfig},
    channel::Channel,
    guard::{Event, Guard, Skip, Timer},
    ChannelError,
};

/// Blocks until a writer is offering on `chan`, without taking the offer.
fn wait_for_offer<T: Send + 'static>(chan: &Channel<T>) {
    loop {
        if Guard::enable(chan) {
            Guard::disable(chan);
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

fn writer<T: Send + 'static>(chan: &Channel<T>, value: T) -> thread::JoinHandle<Result<(), ChannelError>> {
    let chan = chan.clone();
    thread::spawn(move || chan.write(value))
}

#[test]
fn empty_alt_fails() {
    assert_eq!(Alt::<()>::new().select(), Err(ChannelError::NoGuardInAlt));
}

#[test]
fn delayed_writers_are_selected_in_arrival_order() {
    let (c1, c2) = (Channel::new(), Channel::new());
    let a = writer(&c1, 'A');
    let b = {
        let c2 = c2.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            c2.write('B')
        })
    };
    let mut alt = Alt::new().guard(&c1).guard(&c2);
    assert_eq!(alt.select(), Ok(Event::Message('A')));
    assert_eq!(alt.select(), Ok(Event::Message('B')));
    a.join().unwrap().unwrap();
    b.join().unwrap().unwrap();
}

#[test]
fn one_commit_per_select_and_the_rest_stay_available() {
    let chans: Vec<Channel<usize>> = (0..3).map(|_| Channel::new()).collect();
    let writers: Vec<_> = chans.iter().enumerate().map(|(i, c)| writer(c, i)).collect();
    chans.iter().for_each(wait_for_offer);

    let mut alt = Alt::from_guards(chans.iter().map(|c| c as &dyn Guard<usize>));
    let Ok(Event::Message(first)) = alt.select() else {
        panic!("select over ready channels must yield a message");
    };
    assert_eq!(alt.last_selected(), Some(first));
    while !writers[first].is_finished() {
        thread::sleep(Duration::from_millis(1));
    }

    thread::sleep(Duration::from_millis(10));
    for (i, (chan, w)) in chans.iter().zip(&writers).enumerate() {
        if i != first {
            assert!(!w.is_finished(), "uncommitted writer {i} was released");
            assert!(!Guard::is_selectable(chan));
        }
    }

    let mut rest: Vec<usize> = (0..2).map(|_| alt.select().unwrap().message().unwrap()).collect();
    rest.push(first);
    rest.sort_unstable();
    assert_eq!(rest, [0, 1, 2]);
    for w in writers {
        w.join().unwrap().unwrap();
    }
}

#[test]
fn competing_alts_never_share_an_offer() {
    const N: usize = 200;
    let shared = Channel::new();
    let producer = {
        let shared = shared.clone();
        thread::spawn(move || (0..N).try_for_each(|i| shared.write(i)))
    };
    let taken = Arc::new(AtomicUsize::new(0));

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let (shared, taken) = (shared.clone(), Arc::clone(&taken));
            thread::spawn(move || {
                let idle = Channel::<usize>::new();
                let mut alt = Alt::with_config(AltConfig {
                    backoff: Duration::from_micros(50),
                })
                .guard(&shared)
                .guard(&idle);
                let mut got = Vec::new();
                while taken.fetch_add(1, Ordering::SeqCst) < N {
                    got.push(alt.select().unwrap().message().unwrap());
                }
                got
            })
        })
        .collect();

    let mut all: Vec<usize> = consumers
        .into_iter()
        .flat_map(|c| c.join().unwrap())
        .collect();
    producer.join().unwrap().unwrap();
    all.sort_unstable();
    assert_eq!(all, (0..N).collect::<Vec<_>>());
}

#[test]
fn alts_and_plain_readers_share_a_channel() {
    const N: usize = 100;
    let shared = Channel::new();
    let producer = {
        let shared = shared.clone();
        thread::spawn(move || (0..N).try_for_each(|i| shared.write(i)))
    };
    let taken = Arc::new(AtomicUsize::new(0));
    let alting = {
        let (shared, taken) = (shared.clone(), Arc::clone(&taken));
        thread::spawn(move || {
            let never = Timer::new();
            never.set_alarm(Duration::from_secs(3600));
            let mut alt = Alt::new().guard(&shared).guard(&never);
            let mut got = Vec::new();
            while taken.fetch_add(1, Ordering::SeqCst) < N {
                got.push(alt.select().unwrap().message().unwrap());
            }
            got
        })
    };
    let mut got = Vec::new();
    while taken.fetch_add(1, Ordering::SeqCst) < N {
        got.push(shared.read().unwrap());
    }
    got.extend(alting.join().unwrap());
    producer.join().unwrap().unwrap();
    got.sort_unstable();
    assert_eq!(got, (0..N).collect::<Vec<_>>());
}

#[test]
fn select_is_statistically_uniform() {
    const ROUNDS: usize = 6000;
    let guards = [Skip, Skip, Skip];
    let mut alt = Alt::<()>::from_guards(guards.iter().map(|g| g as &dyn Guard<()>)).seeded(42);
    let mut counts = [0usize; 3];
    for _ in 0..ROUNDS {
        assert_eq!(alt.select(), Ok(Event::Skip));
        counts[alt.last_selected().unwrap()] += 1;
    }
    let expected = ROUNDS as f64 / 3.0;
    let chi2: f64 = counts
        .iter()
        .map(|&c| (c as f64 - expected).powi(2) / expected)
        .sum();
    // 2 degrees of freedom, p = 0.001
    assert!(chi2 < 13.82, "counts {counts:?} give chi2 {chi2}");
}

#[test]
fn fair_select_never_repeats_while_two_are_ready() {
    let expired = Timer::new();
    let guards: [&dyn Guard<()>; 3] = [&Skip, &expired, &Skip];
    let mut alt = Alt::from_guards(guards);
    let mut seen = HashSet::new();
    let mut previous = None;
    for _ in 0..500 {
        alt.fair_select().unwrap();
        let chosen = alt.last_selected();
        assert_ne!(chosen, previous);
        seen.extend(chosen);
        previous = chosen;
    }
    assert_eq!(seen.len(), 3);
}

#[test]
fn fair_select_repeats_a_lone_ready_guard() {
    let later = Timer::new();
    later.set_alarm(Duration::from_secs(3600));
    let mut alt = Alt::<()>::new().guard(&later).guard(&Skip);
    for _ in 0..10 {
        assert_eq!(alt.fair_select(), Ok(Event::Skip));
        assert_eq!(alt.last_selected(), Some(1));
    }
}

#[test]
fn pri_select_is_deterministic() {
    let all_ready = [Skip, Skip, Skip];
    let mut alt = Alt::<()>::from_guards(all_ready.iter().map(|g| g as &dyn Guard<()>));
    for _ in 0..50 {
        alt.pri_select().unwrap();
        assert_eq!(alt.last_selected(), Some(0));
    }

    let not_yet = Timer::new();
    not_yet.set_alarm(Duration::from_secs(3600));
    let guards: [&dyn Guard<()>; 3] = [&not_yet, &Skip, &Skip];
    let mut alt = Alt::from_guards(guards);
    for _ in 0..50 {
        alt.pri_select().unwrap();
        assert_eq!(alt.last_selected(), Some(1));
    }
}

#[test]
fn poison_while_waiting_ends_the_select() {
    let (a, b) = (Channel::<u8>::new(), Channel::<u8>::new());
    let waiter = {
        let (a, b) = (a.clone(), b.clone());
        thread::spawn(move || {
            let mut alt = Alt::new().guard(&a).guard(&b);
            alt.select()
        })
    };
    thread::sleep(Duration::from_millis(20));
    b.poison();
    assert_eq!(waiter.join().unwrap(), Err(ChannelError::Poisoned));
    assert!(!a.is_poisoned());
}

#[test]
fn poison_sentinel_through_an_alt() {
    let chan = Channel::<u8>::new();
    let w = {
        let chan = chan.clone();
        thread::spawn(move || chan.write_poison())
    };
    let skip_never = Timer::new();
    skip_never.set_alarm(Duration::from_secs(3600));
    let mut alt = Alt::new().guard(&chan).guard(&skip_never);
    assert_eq!(alt.select(), Err(ChannelError::Poisoned));
    w.join().unwrap().unwrap();
    assert!(chan.is_poisoned());
}

#[test]
fn poison_from_one_alt_fails_a_reservation_held_elsewhere() {
    let chan = Channel::<u32>::new();
    let writer = {
        let chan = chan.clone();
        thread::spawn(move || (1..=2).try_for_each(|v| chan.write(v)))
    };
    let mut first = Alt::new().guard(&chan);
    assert_eq!(first.select(), Ok(Event::Message(1)));

    // A second choice reserves the next offer, then the first one poisons.
    while !Guard::enable(&chan) {
        thread::sleep(Duration::from_millis(1));
    }
    first.poison();

    assert_eq!(Guard::select(&chan), Err(ChannelError::Poisoned));
    assert_eq!(writer.join().unwrap(), Err(ChannelError::Poisoned));
}

#[test]
fn competing_alts_survive_a_poison_from_either() {
    const LAST: usize = 150;
    let shared = Channel::new();
    let producer = {
        let shared = shared.clone();
        thread::spawn(move || (0..).try_for_each(|i| shared.write(i)))
    };

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || {
                let idle = Channel::<usize>::new();
                let mut alt = Alt::with_config(AltConfig {
                    backoff: Duration::from_micros(20),
                })
                .guard(&shared)
                .guard(&idle);
                let mut got = Vec::new();
                loop {
                    match alt.select() {
                        Ok(Event::Message(value)) => {
                            got.push(value);
                            if value == LAST {
                                alt.poison();
                                return (got, true);
                            }
                        }
                        Ok(other) => panic!("unexpected event {other:?}"),
                        Err(err) => {
                            assert_eq!(err, ChannelError::Poisoned);
                            return (got, false);
                        }
                    }
                }
            })
        })
        .collect();

    let mut all = Vec::new();
    let mut poisoners = 0;
    for consumer in consumers {
        let (got, poisoned) = consumer.join().unwrap();
        all.extend(got);
        poisoners += usize::from(poisoned);
    }
    assert_eq!(producer.join().unwrap(), Err(ChannelError::Poisoned));
    assert_eq!(poisoners, 1);
    // Offers after LAST may be committed before the poison lands.
    all.sort_unstable();
    let before = all.len();
    all.dedup();
    assert_eq!(all.len(), before, "an offer was committed twice");
    assert_eq!(all[..=LAST], (0..=LAST).collect::<Vec<_>>()[..]);
}
