//! Settings read from the environment.
//!
//! | variable              | values                   | default   |
//! |-----------------------|--------------------------|-----------|
//! | `CSP_SUBSTRATE`       | `threads`, `tokio`       | `threads` |
//! | `CSP_ALT_BACKOFF_US`  | microseconds             | `1000`    |
//! | `CSP_SINGLE_STEP`     | `1` to enable            | off       |
//!
//! Unrecognised values are reported with `warn!` and replaced by the default.

use std::{env, sync::Arc, time::Duration};

use tracing::warn;

use crate::{
    alt::AltConfig,
    channel::Channel,
    runtimes::{Substrate, Threads},
    server::Stepping,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubstrateKind {
    #[default]
    Threads,
    Tokio,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    pub substrate: SubstrateKind,
    pub alt: AltConfig,
    pub single_step: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        match lookup("CSP_SUBSTRATE").as_deref() {
            None | Some("threads") => {}
            Some("tokio") => config.substrate = SubstrateKind::Tokio,
            Some(other) => warn!(value = other, "unknown CSP_SUBSTRATE, using threads"),
        }

        if let Some(raw) = lookup("CSP_ALT_BACKOFF_US") {
            match raw.parse::<u64>() {
                Ok(us) => config.alt.backoff = Duration::from_micros(us),
                Err(err) => warn!(value = %raw, error = %err, "bad CSP_ALT_BACKOFF_US, using default"),
            }
        }

        match lookup("CSP_SINGLE_STEP").as_deref() {
            None | Some("0") | Some("") => {}
            Some("1") => config.single_step = true,
            Some(other) => warn!(value = other, "unknown CSP_SINGLE_STEP, stepping freely"),
        }

        config
    }

    pub fn alt(&self) -> AltConfig {
        self.alt
    }

    /// The configured substrate.
    ///
    /// `tokio` needs the `runtime-tokio` feature and must be asked for from
    /// inside a runtime; otherwise threads are used.
    pub fn substrate(&self) -> Arc<dyn Substrate> {
        match self.substrate {
            SubstrateKind::Threads => Arc::new(Threads),
            SubstrateKind::Tokio => tokio_substrate().unwrap_or_else(|| {
                warn!("tokio substrate unavailable, using threads");
                Arc::new(Threads)
            }),
        }
    }

    /// How a server should step: once per unit read from `trigger` when single
    /// stepping is on, freely otherwise.
    pub fn stepping(&self, trigger: &Channel<()>) -> Stepping {
        if self.single_step {
            Stepping::Triggered(trigger.clone())
        } else {
            Stepping::Free
        }
    }
}

#[cfg(feature = "runtime-tokio")]
fn tokio_substrate() -> Option<Arc<dyn Substrate>> {
    crate::runtimes::tokio::Blocking::current().map(|s| Arc::new(s) as Arc<dyn Substrate>)
}

#[cfg(not(feature = "runtime-tokio"))]
fn tokio_substrate() -> Option<Arc<dyn Substrate>> {
    None
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]);
        assert_eq!(config, Config::default());
        assert_eq!(config.alt().backoff, Duration::from_millis(1));
        assert_eq!(config.substrate().name(), "threads");
        assert!(matches!(config.stepping(&Channel::new()), Stepping::Free));
    }

    #[test]
    fn reads_every_variable() {
        let config = config(&[
            ("CSP_SUBSTRATE", "tokio"),
            ("CSP_ALT_BACKOFF_US", "250"),
            ("CSP_SINGLE_STEP", "1"),
        ]);
        assert_eq!(config.substrate, SubstrateKind::Tokio);
        assert_eq!(config.alt().backoff, Duration::from_micros(250));
        assert!(matches!(config.stepping(&Channel::new()), Stepping::Triggered(_)));
    }

    #[test]
    fn bad_values_fall_back() {
        let config = config(&[
            ("CSP_SUBSTRATE", "fibers"),
            ("CSP_ALT_BACKOFF_US", "soon"),
            ("CSP_SINGLE_STEP", "yes"),
        ]);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn tokio_outside_a_runtime_uses_threads() {
        let config = config(&[("CSP_SUBSTRATE", "tokio")]);
        assert_eq!(config.substrate().name(), "threads");
    }
}
