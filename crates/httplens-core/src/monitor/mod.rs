//! The monitor context.
//!
//! [`TrafficMonitor`] owns the correlation store, the 429 tracker, the
//! compiled rule catalog, and the sticky domain filter -- the state the
//! original panel kept in process-wide singletons. All mutation flows through
//! it on a single logical thread; embedders running real OS threads serialize
//! access with one mutex around the whole context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MonitorConfig;
use crate::event::{CaptureEvent, ResponseInfo};
use crate::rate_limit::{RateKey, RateLimitTracker};
use crate::rules::{default_rules, Rule};
use crate::store::{Exchange, ExchangeStore, ExchangeUpdate, StoreStats};

/// Full, untruncated export of the store, handed to an external persistence
/// collaborator. The only read path that ignores the active domain filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub format_version: u32,
    pub generated_at: DateTime<Utc>,
    pub entry_count: usize,
    pub exchanges: Vec<Exchange>,
}

/// Wire format version written into [`ExportDocument`].
pub const EXPORT_FORMAT_VERSION: u32 = 1;

pub struct TrafficMonitor {
    store: ExchangeStore,
    tracker: RateLimitTracker,
    rules: Vec<Rule>,
    filter: Option<String>,
}

impl TrafficMonitor {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            store: ExchangeStore::new(config.max_items),
            tracker: RateLimitTracker::new(&config.rate_limit),
            rules: default_rules(),
            filter: None,
        }
    }

    /// Monitor with default configuration (50-item store, 5-minute window).
    pub fn with_defaults() -> Self {
        Self::new(&MonitorConfig::default())
    }

    /// Apply one capture lifecycle event.
    pub fn handle_event(&mut self, event: CaptureEvent) {
        self.handle_event_at(event, Utc::now());
    }

    /// Apply one capture lifecycle event with an explicit clock, for replay
    /// and tests.
    ///
    /// A 429 response is additionally routed to the rate-limit tracker, which
    /// fans the recent-429 marker out to every stored exchange on the same
    /// endpoint (including the one that just received the response).
    pub fn handle_event_at(&mut self, event: CaptureEvent, now: DateTime<Utc>) {
        match event {
            CaptureEvent::RequestStarted {
                id,
                method,
                url,
                headers,
            } => {
                self.store.upsert(
                    &id,
                    ExchangeUpdate {
                        method: Some(method),
                        url: Some(url),
                        request_headers: Some(headers),
                        ..Default::default()
                    },
                    &self.rules,
                );
            }
            CaptureEvent::RequestBody { id, body } => {
                self.store.upsert(
                    &id,
                    ExchangeUpdate {
                        request_body: Some(body),
                        ..Default::default()
                    },
                    &self.rules,
                );
            }
            CaptureEvent::ResponseStarted {
                id,
                status_code,
                status_line,
                headers,
                from_cache,
            } => {
                let response = ResponseInfo {
                    status_code,
                    status_line,
                    headers,
                    captured_at: now,
                    from_cache,
                };
                self.store.upsert(
                    &id,
                    ExchangeUpdate {
                        response: Some(response),
                        ..Default::default()
                    },
                    &self.rules,
                );
                if status_code == 429 {
                    if let Some(key) = self.store.get(&id).map(|e| e.rate_key()) {
                        self.observe_429(&key, now);
                    }
                }
            }
        }
    }

    /// Record a 429 for `key` and fan the marker out to matching exchanges.
    /// Returns the in-window observation count for the key.
    pub fn observe_429(&mut self, key: &RateKey, now: DateTime<Utc>) -> usize {
        let count = self.tracker.observe_429(key, now);
        let marked = self.store.mark_rate_limited(key, &self.rules);
        debug!(%key, count, marked, "429 observed");
        count
    }

    /// In-window 429 count for an endpoint.
    pub fn rate_limit_count(&self, key: &RateKey, now: DateTime<Utc>) -> usize {
        self.tracker.count(key, now)
    }

    /// Periodic maintenance tick; prunes idle rate-limit keys. Driven by the
    /// embedder on the configured sweep cadence.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        self.tracker.sweep(now);
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    /// Head-first snapshot of the store.
    ///
    /// An explicit `domain` overrides the sticky filter; `None` falls back to
    /// the sticky filter, and an unfiltered monitor returns everything.
    pub fn snapshot(&self, domain: Option<&str>) -> Vec<Exchange> {
        let domain = domain.or(self.filter.as_deref());
        self.store
            .iter()
            .filter(|e| domain.map_or(true, |d| domain_matches(&e.host, d)))
            .cloned()
            .collect()
    }

    /// Set the sticky domain filter; a value that trims to empty clears it.
    pub fn set_filter(&mut self, value: &str) {
        let trimmed = value.trim();
        self.filter = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_ascii_lowercase())
        };
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Empty the store. The active filter and rate-limit windows survive.
    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Exchange> {
        self.store.get(id)
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Export the full store -- untruncated, unfiltered -- for the external
    /// persistence collaborator.
    pub fn export(&self) -> ExportDocument {
        let exchanges: Vec<Exchange> = self.store.iter().cloned().collect();
        ExportDocument {
            format_version: EXPORT_FORMAT_VERSION,
            generated_at: Utc::now(),
            entry_count: exchanges.len(),
            exchanges,
        }
    }
}

/// Exact-host or subdomain match, ASCII case-insensitive.
///
/// `example.com` matches `example.com` and `api.example.com` but not
/// `notexample.com` or `example.com.evil.org`.
pub fn domain_matches(host: &str, domain: &str) -> bool {
    if host.is_empty() || domain.is_empty() {
        return false;
    }
    let host = host.to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}
