//! Sliding-window tracking of 429 (Too Many Requests) responses.
//!
//! Observations are grouped per endpoint -- host plus query-stripped path --
//! and counted over a trailing window. Lists are pruned lazily on every
//! observation and periodically by [`RateLimitTracker::sweep`], so memory
//! stays bounded regardless of total historical traffic.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::UrlParts;

/// Configuration for 429 tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sliding-window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Interval between periodic sweeps in seconds. The tracker itself has no
    /// timer; the embedder calls [`RateLimitTracker::sweep`] on this cadence.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_window_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Key grouping 429 observations: lowercased host plus path with any query
/// string stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateKey {
    pub host: String,
    pub path: String,
}

impl RateKey {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        let host: String = host.into();
        let path: String = path.into();
        let path = path.split('?').next().unwrap_or("").to_string();
        Self {
            host: host.to_ascii_lowercase(),
            path,
        }
    }

    /// Derive the key from a raw URL. Unparseable URLs map to the empty key.
    pub fn from_url(raw: &str) -> Self {
        let parts = UrlParts::parse(raw);
        Self::new(parts.host, parts.path)
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.host, self.path)
    }
}

/// Tracks 429 observations per endpoint over a trailing window.
#[derive(Debug)]
pub struct RateLimitTracker {
    windows: HashMap<RateKey, Vec<DateTime<Utc>>>,
    window: Duration,
}

impl RateLimitTracker {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: HashMap::new(),
            window: Duration::seconds(config.window_secs as i64),
        }
    }

    /// Record a 429 observation and return the in-window count for the key.
    ///
    /// The key's list is pruned of entries older than the window before
    /// counting, so the return value is exact at `now`.
    pub fn observe_429(&mut self, key: &RateKey, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let times = self.windows.entry(key.clone()).or_default();
        times.push(now);
        times.retain(|t| *t > cutoff);
        times.len()
    }

    /// Current in-window count for a key without recording anything.
    pub fn count(&self, key: &RateKey, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        self.windows
            .get(key)
            .map(|times| times.iter().filter(|t| **t > cutoff).count())
            .unwrap_or(0)
    }

    /// Prune stale entries for every key and drop keys whose list empties.
    ///
    /// Runs on a fixed cadence independent of traffic
    /// ([`RateLimitConfig::sweep_interval_secs`]), so keys that stop
    /// receiving 429s do not linger.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        let before = self.windows.len();
        self.windows.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
        let dropped = before - self.windows.len();
        if dropped > 0 {
            debug!(dropped, remaining = self.windows.len(), "swept idle rate keys");
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
