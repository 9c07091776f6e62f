//! Plumbing processes built only from channels and choice.
//!
//! Each function returns an idle [`Process`] whose resources are exactly the
//! channels passed in, so poisoning any of them tears the process down and
//! spreads to the rest. The classic ring that counts upward:
//!
//! ```
//! use rendezvous::{builtins, channel::Channel, par::Par};
//!
//! let (a, b, c, d) = (Channel::new(), Channel::new(), Channel::new(), Channel::new());
//! let ring = Par::new([
//!     builtins::prefix(c.clone(), a.clone(), 0u64),
//!     builtins::delta2(a.clone(), b.clone(), d.clone()),
//!     builtins::succ(b.clone(), c.clone()),
//! ]);
//! ring.spawn();
//! let first: Vec<u64> = (0..5).map(|_| d.read().unwrap()).collect();
//! assert_eq!(first, [0, 1, 2, 3, 4]);
//! d.poison();
//! assert!(ring.join().is_err());
//! ```

use std::{
    fmt::Display,
    io::Write,
    ops::{Add, Mul, Sub},
    thread,
    time::{Duration, Instant},
};

use crate::{
    alt::Alt,
    channel::Channel,
    error::ProcessError,
    guard::Event,
    process::{spawn_process, Process},
    server::{spawn_server, Step},
};

/// Writes `T::default()` forever.
pub fn zeroes<T>(output: Channel<T>) -> Process
where
    T: Default + Send + 'static,
{
    spawn_server(output, |output| {
        output.write(T::default())?;
        Ok(Step::Continue)
    })
    .named("zeroes")
}

pub fn id<T: Send + 'static>(input: Channel<T>, output: Channel<T>) -> Process {
    unary(input, output, |value| value).named("id")
}

pub fn succ<T>(input: Channel<T>, output: Channel<T>) -> Process
where
    T: Add<Output = T> + From<u8> + Send + 'static,
{
    unary(input, output, |value| value + T::from(1)).named("succ")
}

pub fn pred<T>(input: Channel<T>, output: Channel<T>) -> Process
where
    T: Sub<Output = T> + From<u8> + Send + 'static,
{
    unary(input, output, |value| value - T::from(1)).named("pred")
}

/// Writes `first`, then copies `input` to `output`.
pub fn prefix<T: Send + 'static>(input: Channel<T>, output: Channel<T>, first: T) -> Process {
    spawn_process((input, output), move |(input, output)| {
        output.write(first)?;
        loop {
            output.write(input.read()?)?;
        }
    })
    .named("prefix")
}

/// Copies every input value to both outputs, first `left` then `right`.
pub fn delta2<T>(input: Channel<T>, left: Channel<T>, right: Channel<T>) -> Process
where
    T: Clone + Send + 'static,
{
    spawn_server((input, left, right), |(input, left, right)| {
        let value = input.read()?;
        left.write(value.clone())?;
        right.write(value)?;
        Ok(Step::Continue)
    })
    .named("delta2")
}

/// Merges two inputs, never taking from the same input twice in a row while
/// both have data.
pub fn mux2<T: Send + 'static>(left: Channel<T>, right: Channel<T>, output: Channel<T>) -> Process {
    spawn_process((left, right, output), |(left, right, output)| {
        let mut alt = Alt::new().guard(left).guard(right);
        loop {
            if let Event::Message(value) = alt.fair_select()? {
                output.write(value)?;
            }
        }
    })
    .named("mux2")
}

/// Writes 0, 1, 2, ... forever.
pub fn generate(output: Channel<u64>) -> Process {
    let mut next = 0u64;
    spawn_server(output, move |output| {
        output.write(next)?;
        next += 1;
        Ok(Step::Continue)
    })
    .named("generate")
}

/// Writes the Fibonacci numbers that fit in a `u64`, then finishes.
pub fn fibonacci(output: Channel<u64>) -> Process {
    let (mut a, mut b) = (1u64, 1u64);
    spawn_server(output, move |output| {
        output.write(a)?;
        let Some(next) = a.checked_add(b) else {
            output.write(b)?;
            return Ok(Step::Done);
        };
        (a, b) = (b, next);
        Ok(Step::Continue)
    })
    .named("fibonacci")
}

/// Reads and discards forever.
pub fn blackhole<T: Send + 'static>(input: Channel<T>) -> Process {
    spawn_server(input, |input| {
        input.read()?;
        Ok(Step::Continue)
    })
    .named("blackhole")
}

pub fn fixed_delay<T: Send + 'static>(
    input: Channel<T>,
    output: Channel<T>,
    delay: Duration,
) -> Process {
    spawn_server((input, output), move |(input, output)| {
        let value = input.read()?;
        thread::sleep(delay);
        output.write(value)?;
        Ok(Step::Continue)
    })
    .named("fixed_delay")
}

/// Writes a tick every `resolution`.
///
/// Ticks follow a fixed schedule from the first one, so a slow reader delays a
/// tick without shifting the ones after it.
pub fn clock(output: Channel<()>, resolution: Duration) -> Process {
    let mut next = None;
    spawn_server(output, move |output| {
        let due = *next.get_or_insert_with(|| Instant::now() + resolution);
        thread::sleep(due.saturating_duration_since(Instant::now()));
        output.write(())?;
        next = Some(due + resolution);
        Ok(Step::Continue)
    })
    .named("clock")
}

/// Writes every input value to `sink`, one per line.
pub fn printer<T, W>(input: Channel<T>, mut sink: W) -> Process
where
    T: Display + Send + 'static,
    W: Write + Send + 'static,
{
    spawn_server(input, move |input| {
        let value = input.read()?;
        writeln!(sink, "{value}").map_err(ProcessError::failed)?;
        Ok(Step::Continue)
    })
    .named("printer")
}

/// Reads one value from each input and writes their sum.
pub fn pairs<T>(left: Channel<T>, right: Channel<T>, output: Channel<T>) -> Process
where
    T: Add<Output = T> + Send + 'static,
{
    binary(left, right, output, |a, b| a + b).named("pairs")
}

pub fn mult<T>(input: Channel<T>, output: Channel<T>, scale: T) -> Process
where
    T: Mul<Output = T> + Clone + Send + 'static,
{
    unary(input, output, move |value| value * scale.clone()).named("mult")
}

/// Writes each input value formatted after `prefix`.
pub fn sign<T>(input: Channel<T>, output: Channel<String>, prefix: impl Into<String>) -> Process
where
    T: Display + Send + 'static,
{
    let prefix = prefix.into();
    unary(input, output, move |value| format!("{prefix}{value}")).named("sign")
}

/// Writes `f(x)` for every input `x`.
pub fn unary<T, U, F>(input: Channel<T>, output: Channel<U>, mut f: F) -> Process
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> U + Send + 'static,
{
    spawn_server((input, output), move |(input, output)| {
        output.write(f(input.read()?))?;
        Ok(Step::Continue)
    })
}

/// Reads one value from each input and writes `f(a, b)`.
pub fn binary<T, U, V, F>(
    left: Channel<T>,
    right: Channel<U>,
    output: Channel<V>,
    mut f: F,
) -> Process
where
    T: Send + 'static,
    U: Send + 'static,
    V: Send + 'static,
    F: FnMut(T, U) -> V + Send + 'static,
{
    spawn_server((left, right, output), move |(left, right, output)| {
        let a = left.read()?;
        let b = right.read()?;
        output.write(f(a, b))?;
        Ok(Step::Continue)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::process::Exit;

    fn take<T: Send + 'static>(chan: &Channel<T>, n: usize) -> Vec<T> {
        (0..n).map(|_| chan.read().unwrap()).collect()
    }

    #[test]
    fn generators() {
        let (zs, gs, fs) = (Channel::<i32>::new(), Channel::new(), Channel::new());
        let procs = [zeroes(zs.clone()), generate(gs.clone()), fibonacci(fs.clone())];
        procs.iter().for_each(Process::spawn);
        assert_eq!(take(&zs, 3), [0, 0, 0]);
        assert_eq!(take(&gs, 4), [0, 1, 2, 3]);
        assert_eq!(take(&fs, 7), [1, 1, 2, 3, 5, 8, 13]);
        zs.poison();
        gs.poison();
        fs.poison();
        assert!(procs.iter().all(|p| p.join(None) == Some(Exit::Poisoned)));
    }

    #[test]
    fn fibonacci_stops_before_overflow() {
        let out = Channel::new();
        let fib = fibonacci(out.clone());
        fib.spawn();
        let values = take(&out, 93);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(values.last(), Some(&12_200_160_415_121_876_738));
        assert_eq!(fib.join(None), Some(Exit::Completed));
    }

    #[test]
    fn arithmetic() {
        let (a, b, c, d) = (Channel::new(), Channel::new(), Channel::new(), Channel::new());
        let (e, f) = (Channel::new(), Channel::new());
        let procs = [
            succ(a.clone(), b.clone()),
            mult(b.clone(), c.clone(), 10i64),
            pred(c.clone(), d.clone()),
            sign(d.clone(), e.clone(), "n="),
            id(e.clone(), f.clone()),
        ];
        procs.iter().for_each(Process::spawn);
        a.write(4).unwrap();
        assert_eq!(f.read(), Ok(String::from("n=49")));
        a.poison();
        assert!(procs.iter().all(|p| p.join(None) == Some(Exit::Poisoned)));
        assert!(f.is_poisoned());
    }

    #[test]
    fn pairs_and_binary() {
        let (l, r, out) = (Channel::new(), Channel::new(), Channel::new());
        let adder = pairs(l.clone(), r.clone(), out.clone());
        adder.spawn();
        let (l2, r2) = (l.clone(), r.clone());
        let feeder = std::thread::spawn(move || {
            l2.write(2).unwrap();
            r2.write(40).unwrap();
        });
        assert_eq!(out.read(), Ok(42));
        feeder.join().unwrap();
        l.poison();
        assert_eq!(adder.join(None), Some(Exit::Poisoned));
        assert!(out.is_poisoned());
    }

    #[test]
    fn mux2_takes_from_both() {
        let (l, r, out) = (Channel::new(), Channel::new(), Channel::new());
        let mux = mux2(l.clone(), r.clone(), out.clone());
        let feeders = [(l.clone(), 'l'), (r.clone(), 'r')].map(|(chan, tag)| {
            std::thread::spawn(move || while chan.write(tag).is_ok() {})
        });
        mux.spawn();
        let got = take(&out, 40);
        assert!(got.contains(&'l') && got.contains(&'r'));
        out.poison();
        assert_eq!(mux.join(None), Some(Exit::Poisoned));
        for feeder in feeders {
            feeder.join().unwrap();
        }
    }

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn printer_writes_lines() {
        let sink = Shared::default();
        let input = Channel::new();
        let p = printer(input.clone(), sink.clone());
        p.spawn();
        input.write(1.5).unwrap();
        input.write(-2.0).unwrap();
        input.poison();
        assert_eq!(p.join(None), Some(Exit::Poisoned));
        assert_eq!(String::from_utf8(sink.0.lock().clone()).unwrap(), "1.5\n-2\n");
    }

    #[test]
    fn clock_and_delay() {
        let (ticks, delayed) = (Channel::new(), Channel::new());
        let ticker = clock(ticks.clone(), Duration::from_millis(5));
        let delayer = fixed_delay(ticks.clone(), delayed.clone(), Duration::from_millis(5));
        ticker.spawn();
        delayer.spawn();
        assert_eq!(take(&delayed, 2), [(), ()]);
        delayed.poison();
        assert_eq!(delayer.join(None), Some(Exit::Poisoned));
        assert_eq!(ticker.join(None), Some(Exit::Poisoned));
    }

    #[test]
    fn clock_ticks_on_schedule() {
        let ticks = Channel::new();
        let ticker = clock(ticks.clone(), Duration::from_millis(10));
        let started = Instant::now();
        ticker.spawn();
        assert_eq!(take(&ticks, 5).len(), 5);
        assert!(started.elapsed() >= Duration::from_millis(50));
        ticks.poison();
        assert_eq!(ticker.join(None), Some(Exit::Poisoned));
    }
}
