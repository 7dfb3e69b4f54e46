//! Manager configuration.

use std::time::Duration;

use crate::error::{Error, Result};

/// Shortest delay the poller ever sleeps between two checks.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Polling behaviour for the outcome poller.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay before the first re-check.
    pub interval: Duration,

    /// Upper bound for the delay between checks.
    pub max_interval: Duration,

    /// Multiplier applied to the delay after each non-terminal check.
    /// `1.0` keeps the interval fixed.
    pub backoff: f64,

    /// How long to wait for a terminal state.
    pub timeout: Duration,

    /// How many times the deadline may be pushed back by another `timeout`
    /// before a timeout is reported. Zero means report immediately.
    pub timeout_extensions: u32,
}

impl PollConfig {
    /// Same config with a different timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Same config with a different base interval, raised to
    /// [`MIN_POLL_INTERVAL`] if shorter.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_POLL_INTERVAL);
        if self.max_interval < self.interval {
            self.max_interval = self.interval;
        }
        self
    }

    /// Delay to use after `current`, never below [`MIN_POLL_INTERVAL`].
    pub fn next_interval(&self, current: Duration) -> Duration {
        let next = if self.backoff.is_finite() && self.backoff > 1.0 {
            Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff)
                .unwrap_or(self.max_interval)
        } else {
            current
        };
        next.min(self.max_interval).max(MIN_POLL_INTERVAL)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(30),
            backoff: 1.0,
            timeout: Duration::from_secs(3600),
            timeout_extensions: 0,
        }
    }
}

/// Configuration for an [`crate::ExecutionManager`] and its HTTP collaborators.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Workflow engine base URL.
    pub engine_url: String,

    /// State store base URL.
    pub state_url: String,

    /// Function service base URL.
    pub functions_url: String,

    /// Timeout applied to each HTTP request.
    pub request_timeout: Duration,

    /// Maximum serialized payload size in bytes.
    pub max_payload_bytes: usize,

    /// Top-level fields every workflow payload must carry.
    pub required_fields: Vec<String>,

    /// Poller settings.
    pub poll: PollConfig,
}

impl ManagerConfig {
    /// Load configuration from `FLOWMGR_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let engine_url = lookup("FLOWMGR_ENGINE_URL").unwrap_or(defaults.engine_url);
        let state_url = lookup("FLOWMGR_STATE_URL").unwrap_or(defaults.state_url);
        let functions_url = lookup("FLOWMGR_FUNCTIONS_URL").unwrap_or(defaults.functions_url);

        let required_fields = lookup("FLOWMGR_REQUIRED_FIELDS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or(defaults.required_fields);

        let request_timeout = Duration::from_secs(parse_var(
            &lookup,
            "FLOWMGR_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?);

        let max_payload_bytes =
            parse_var(&lookup, "FLOWMGR_MAX_PAYLOAD_BYTES", defaults.max_payload_bytes)?;

        let poll = PollConfig {
            interval: Duration::from_secs(parse_var(
                &lookup,
                "FLOWMGR_POLL_INTERVAL_SECS",
                defaults.poll.interval.as_secs(),
            )?),
            max_interval: Duration::from_secs(parse_var(
                &lookup,
                "FLOWMGR_POLL_MAX_INTERVAL_SECS",
                defaults.poll.max_interval.as_secs(),
            )?),
            backoff: parse_var(&lookup, "FLOWMGR_POLL_BACKOFF", defaults.poll.backoff)?,
            timeout: Duration::from_secs(parse_var(
                &lookup,
                "FLOWMGR_POLL_TIMEOUT_SECS",
                defaults.poll.timeout.as_secs(),
            )?),
            timeout_extensions: parse_var(
                &lookup,
                "FLOWMGR_TIMEOUT_EXTENSIONS",
                defaults.poll.timeout_extensions,
            )?,
        };

        if poll.interval.is_zero() {
            return Err(Error::Config(
                "FLOWMGR_POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        if !poll.backoff.is_finite() || poll.backoff < 1.0 {
            return Err(Error::Config(format!(
                "FLOWMGR_POLL_BACKOFF must be a finite number of at least 1.0, got {}",
                poll.backoff
            )));
        }

        Ok(Self {
            engine_url,
            state_url,
            functions_url,
            request_timeout,
            max_payload_bytes,
            required_fields,
            poll,
        })
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            engine_url: "http://localhost:8083".to_string(),
            state_url: "http://localhost:8083".to_string(),
            functions_url: "http://localhost:8083".to_string(),
            request_timeout: Duration::from_secs(30),
            max_payload_bytes: 256 * 1024,
            required_fields: Vec::new(),
            poll: PollConfig::default(),
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", key, raw))),
    }
}
