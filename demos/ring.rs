//! A token passed around a ring of processes, each adding one.
//!
//! ```text
//! cargo run --example ring -- 16 100
//! RUST_LOG=rendezvous=debug cargo run --example ring
//! ```

use std::{env, time::Instant};

use rendezvous::{
    builtins,
    channel::Channel,
    config::Config,
    par::Par,
    process::{spawn_process, Exit, Process},
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1).map(|a| a.parse::<usize>());
    let size = args.next().and_then(Result::ok).unwrap_or(8).max(2);
    let laps = args.next().and_then(Result::ok).unwrap_or(50);
    let config = Config::from_env();

    // chans[i] feeds stage i; the driver sits between the last stage and the first.
    let chans: Vec<Channel<u64>> = (0..=size).map(|_| Channel::new()).collect();
    let mut stages: Vec<Process> = chans
        .windows(2)
        .map(|pair| builtins::succ(pair[0].clone(), pair[1].clone()))
        .collect();

    let (first, last) = (chans[0].clone(), chans[size].clone());
    stages.push(
        spawn_process((first, last), move |(first, last)| {
            let started = Instant::now();
            let mut token = 0;
            for lap in 1..=laps {
                first.write(token)?;
                token = last.read()?;
                if lap % 10 == 0 {
                    println!("lap {lap}: token {token}");
                }
            }
            let hops = laps * size;
            println!(
                "{hops} hops in {:?} ({:?} per hop)",
                started.elapsed(),
                started.elapsed() / hops.max(1) as u32
            );
            first.poison();
            Ok(())
        })
        .named("driver"),
    );

    let ring = Process::from(Par::new(stages)).on(config.substrate());
    match ring.start() {
        Exit::Poisoned => println!("ring shut down"),
        other => println!("ring ended unexpectedly: {other:?}"),
    }
}
