use core::{str::FromStr, time::Duration};
use derive_more::Display;
use tracing::warn;

/// How a [`Stream`](crate::space::Stream) turns "all prior work finished"
/// into a ready [`Completion`](crate::future::Completion).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamCompletion {
    /// Record an event on the stream and let the device poller resolve the
    /// handle once the event fires. Lower overhead; the default.
    #[display("event")]
    Event,
    /// Enqueue a host callback that resolves the handle when the stream
    /// reaches it. Kept for comparison and diagnostics.
    #[display("callback")]
    Callback,
}

impl Default for StreamCompletion {
    fn default() -> Self {
        if cfg!(feature = "stream-callback") {
            Self::Callback
        } else {
            Self::Event
        }
    }
}

impl FromStr for StreamCompletion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "event" | "0" => Ok(Self::Event),
            "callback" | "1" => Ok(Self::Callback),
            other => Err(format!("unknown stream completion strategy `{other}`")),
        }
    }
}

/// Runtime knobs for the emulated device and instance pools.
///
/// `Config::default()` gives the build-time defaults; `Config::from_env()`
/// applies `KTB_*` overrides on top of them. The global stream device is
/// configured from the environment the first time it is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Completion strategy for streams created by a device.
    pub stream_completion: StreamCompletion,
    /// Sleep between poller passes while events are pending.
    pub poll_interval: Duration,
    /// Upper bound on live streams per device, the default stream included.
    pub max_streams: usize,
    /// Number of instances an [`InstancePool`](crate::instance::InstancePool)
    /// allocates when built from a config.
    pub pool_instances: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stream_completion: StreamCompletion::default(),
            poll_interval: Duration::from_micros(50),
            max_streams: 256,
            pool_instances: 10,
        }
    }
}

impl Config {
    /// Environment variable selecting [`StreamCompletion`].
    pub const ENV_STREAM_COMPLETION: &'static str = "KTB_STREAM_COMPLETION";
    /// Environment variable for the poll interval in microseconds.
    pub const ENV_POLL_INTERVAL_US: &'static str = "KTB_POLL_INTERVAL_US";
    /// Environment variable bounding the number of live streams.
    pub const ENV_MAX_STREAMS: &'static str = "KTB_MAX_STREAMS";
    /// Environment variable for the default pool size.
    pub const ENV_POOL_INSTANCES: &'static str = "KTB_POOL_INSTANCES";

    /// Defaults overridden by any `KTB_*` variables that are set.
    ///
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = parse(&lookup, Self::ENV_STREAM_COMPLETION) {
            self.stream_completion = value;
        }
        if let Some(micros) = parse::<u64>(&lookup, Self::ENV_POLL_INTERVAL_US) {
            self.poll_interval = Duration::from_micros(micros);
        }
        if let Some(value) = parse(&lookup, Self::ENV_MAX_STREAMS) {
            self.max_streams = value;
        }
        if let Some(value) = parse(&lookup, Self::ENV_POOL_INSTANCES) {
            self.pool_instances = value;
        }
        self
    }

    /// Set the stream completion strategy.
    #[must_use]
    pub fn with_stream_completion(mut self, strategy: StreamCompletion) -> Self {
        self.stream_completion = strategy;
        self
    }

    /// Set the poller interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the live stream limit.
    #[must_use]
    pub fn with_max_streams(mut self, max_streams: usize) -> Self {
        self.max_streams = max_streams;
        self
    }

    /// Set the default pool size.
    #[must_use]
    pub fn with_pool_instances(mut self, pool_instances: usize) -> Self {
        self.pool_instances = pool_instances;
        self
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, value = %raw, %err, "ignoring invalid configuration override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::default().with_overrides(lookup(&[
            (Config::ENV_STREAM_COMPLETION, "callback"),
            (Config::ENV_POLL_INTERVAL_US, "10"),
            (Config::ENV_MAX_STREAMS, "4"),
            (Config::ENV_POOL_INSTANCES, "3"),
        ]));
        assert_eq!(config.stream_completion, StreamCompletion::Callback);
        assert_eq!(config.poll_interval, Duration::from_micros(10));
        assert_eq!(config.max_streams, 4);
        assert_eq!(config.pool_instances, 3);
    }

    #[test]
    fn invalid_overrides_keep_defaults() {
        let config = Config::default().with_overrides(lookup(&[
            (Config::ENV_STREAM_COMPLETION, "interrupt"),
            (Config::ENV_MAX_STREAMS, "many"),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn numeric_strategy_aliases() {
        assert_eq!("0".parse::<StreamCompletion>(), Ok(StreamCompletion::Event));
        assert_eq!(" Callback ".parse::<StreamCompletion>(), Ok(StreamCompletion::Callback));
    }
}
