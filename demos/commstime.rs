//! The classic "commstime" benchmark: a prefix/delta/successor ring with a
//! consumer timing how long each communication takes.
//!
//! Runs on the substrate chosen by `CSP_SUBSTRATE`; with
//! `--features runtime-tokio` and `CSP_SUBSTRATE=tokio` the processes live on
//! Tokio's blocking pool.

use std::time::Instant;

use rendezvous::{
    builtins,
    channel::Channel,
    config::Config,
    par::Par,
    process::{spawn_process, Process},
};

const ROUNDS: u32 = 5;
const READS: u64 = 5_000;
// prefix -> delta2, delta2 -> succ, delta2 -> consumer, succ -> prefix
const CHANNELS_PER_READ: u32 = 4;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let substrate = config.substrate();
    println!("commstime on {}", substrate.name());

    let exit = tokio::task::spawn_blocking(move || {
        let (a, b, c, d) = (Channel::new(), Channel::new(), Channel::new(), Channel::new());
        let consumer = spawn_process(d.clone(), |d| {
            for round in 1..=ROUNDS {
                let started = Instant::now();
                for _ in 0..READS {
                    d.read()?;
                }
                let per_read = started.elapsed() / READS as u32;
                println!(
                    "round {round}: {per_read:?} per read, {:?} per communication",
                    per_read / CHANNELS_PER_READ
                );
            }
            d.poison();
            Ok(())
        })
        .named("consumer");

        let network = Process::from(Par::new([
            builtins::prefix(c.clone(), a.clone(), 0u64),
            builtins::delta2(a, b.clone(), d),
            builtins::succ(b, c),
            consumer,
        ]))
        .on(substrate);
        network.start()
    })
    .await;

    match exit {
        Ok(exit) => println!("finished: {exit:?}"),
        Err(err) => eprintln!("benchmark thread failed: {err}"),
    }
}
