//! Bounded correlation store.
//!
//! Assembles partial capture events into complete exchange records keyed by
//! the opaque correlation id. The store is ordered (head = most recently
//! created), capped, and recomputes tags and score on every mutation so the
//! derived fields are never stale.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::{BodyDescriptor, Header, ResponseInfo, UrlParts};
use crate::rate_limit::RateKey;
use crate::rules::{classify, Rule};

/// One observed request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Opaque correlation key supplied by the capture layer.
    pub id: String,
    pub method: String,
    pub url: String,
    /// Host derived from `url`; empty when the URL does not parse.
    pub host: String,
    /// When the record was created.
    pub timestamp: DateTime<Utc>,
    pub request_headers: Vec<Header>,
    pub request_body: Option<BodyDescriptor>,
    pub response: Option<ResponseInfo>,
    /// Derived labels. Recomputed from scratch on every mutation, never
    /// accumulated incrementally.
    pub tags: BTreeSet<String>,
    /// Derived risk score: sum of matched rule weights.
    pub score: u32,
    /// Set when the rate-limit tracker observed a recent 429 for this
    /// exchange's endpoint. Sticky for the lifetime of the record.
    pub recent_429: bool,
}

impl Exchange {
    pub fn new(
        id: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
        request_headers: Vec<Header>,
    ) -> Self {
        let url: String = url.into();
        Self {
            id: id.into(),
            method: method.into(),
            host: UrlParts::parse(&url).host,
            url,
            timestamp: Utc::now(),
            request_headers,
            request_body: None,
            response: None,
            tags: BTreeSet::new(),
            score: 0,
            recent_429: false,
        }
    }

    /// The (host, path) rate key for this exchange's endpoint.
    pub fn rate_key(&self) -> RateKey {
        RateKey::from_url(&self.url)
    }
}

/// Partial field set applied by one capture event.
///
/// Only non-empty values replace what is already stored; absent fields keep
/// their prior values, so events may arrive in any order across fields.
#[derive(Debug, Clone, Default)]
pub struct ExchangeUpdate {
    pub method: Option<String>,
    pub url: Option<String>,
    pub request_headers: Option<Vec<Header>>,
    pub request_body: Option<BodyDescriptor>,
    pub response: Option<ResponseInfo>,
}

/// Lifetime statistics for a store instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Exchanges created since construction.
    pub total_created: u64,
    /// In-place merges applied to existing exchanges.
    pub total_merged: u64,
    /// Exchanges evicted by the capacity cap.
    pub total_evicted: u64,
    /// Current number of stored exchanges.
    pub current_len: usize,
}

/// Bounded, ordered collection of exchange records.
///
/// Head = most recently created. Updates never move an entry; eviction
/// removes the tail (oldest-created) only when a creation pushes the store
/// over capacity.
#[derive(Debug)]
pub struct ExchangeStore {
    entries: VecDeque<Exchange>,
    max_items: usize,
    total_created: u64,
    total_merged: u64,
    total_evicted: u64,
}

impl ExchangeStore {
    pub fn new(max_items: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_items.min(64)),
            max_items,
            total_created: 0,
            total_merged: 0,
            total_evicted: 0,
        }
    }

    /// Create or merge the exchange for `id`, then recompute its tags and
    /// score against `rules`.
    ///
    /// An unknown `id` creates a record at the head (evicting the tail if the
    /// store is over capacity); a known `id` merges in place without changing
    /// position. Host parsing never fails visibly -- an unparseable URL
    /// yields an empty host.
    pub fn upsert(&mut self, id: &str, update: ExchangeUpdate, rules: &[Rule]) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            merge(entry, update);
            let (tags, score) = classify(entry, rules);
            entry.tags = tags;
            entry.score = score;
            self.total_merged += 1;
            return;
        }

        let mut exchange = Exchange::new(id, "", "", Vec::new());
        merge(&mut exchange, update);
        let (tags, score) = classify(&exchange, rules);
        exchange.tags = tags;
        exchange.score = score;

        self.entries.push_front(exchange);
        self.total_created += 1;

        if self.entries.len() > self.max_items {
            if let Some(evicted) = self.entries.pop_back() {
                self.total_evicted += 1;
                debug!(id = %evicted.id, "store at capacity, evicted oldest exchange");
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Exchange> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Empty the store. Lifetime counters are preserved.
    pub fn clear(&mut self) {
        debug!(discarded = self.entries.len(), "store cleared");
        self.entries.clear();
    }

    /// Set the sticky recent-429 marker on every exchange whose endpoint
    /// equals `key` and recompute its tags and score. Returns the number of
    /// exchanges marked.
    pub fn mark_rate_limited(&mut self, key: &RateKey, rules: &[Rule]) -> usize {
        let mut marked = 0;
        for entry in self.entries.iter_mut() {
            if entry.rate_key() != *key {
                continue;
            }
            entry.recent_429 = true;
            let (tags, score) = classify(entry, rules);
            entry.tags = tags;
            entry.score = score;
            marked += 1;
        }
        marked
    }

    /// Head-first iteration (most recently created first).
    pub fn iter(&self) -> impl Iterator<Item = &Exchange> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_created: self.total_created,
            total_merged: self.total_merged,
            total_evicted: self.total_evicted,
            current_len: self.entries.len(),
        }
    }
}

/// Field-merge rule: a new value replaces the old only when non-empty;
/// absent fields retain prior values.
fn merge(entry: &mut Exchange, update: ExchangeUpdate) {
    if let Some(method) = update.method.filter(|m| !m.is_empty()) {
        entry.method = method;
    }
    if let Some(url) = update.url.filter(|u| !u.is_empty()) {
        entry.host = UrlParts::parse(&url).host;
        entry.url = url;
    }
    if let Some(headers) = update.request_headers.filter(|h| !h.is_empty()) {
        entry.request_headers = headers;
    }
    if let Some(body) = update.request_body.filter(|b| !b.is_empty()) {
        entry.request_body = Some(body);
    }
    if let Some(response) = update.response {
        entry.response = Some(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::default_rules;

    fn request_update(method: &str, url: &str, headers: Vec<Header>) -> ExchangeUpdate {
        ExchangeUpdate {
            method: Some(method.to_string()),
            url: Some(url.to_string()),
            request_headers: Some(headers),
            ..Default::default()
        }
    }

    fn response_update(status: u16, headers: Vec<Header>) -> ExchangeUpdate {
        ExchangeUpdate {
            response: Some(ResponseInfo {
                status_code: status,
                status_line: format!("HTTP/1.1 {status}"),
                headers,
                captured_at: Utc::now(),
                from_cache: false,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn create_then_merge_keeps_single_record() {
        let rules = default_rules();
        let mut store = ExchangeStore::new(50);

        store.upsert(
            "e1",
            request_update("GET", "https://example.com/a", Vec::new()),
            &rules,
        );
        store.upsert("e1", response_update(200, Vec::new()), &rules);

        assert_eq!(store.len(), 1);
        let entry = store.get("e1").unwrap();
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.host, "example.com");
        assert_eq!(entry.response.as_ref().unwrap().status_code, 200);
    }

    #[test]
    fn merge_is_order_independent_across_fields() {
        let rules = default_rules();
        let mut store = ExchangeStore::new(50);

        // Response arrives before the request line.
        store.upsert("e1", response_update(404, Vec::new()), &rules);
        store.upsert(
            "e1",
            request_update("POST", "https://example.com/x", Vec::new()),
            &rules,
        );

        let entry = store.get("e1").unwrap();
        assert_eq!(entry.method, "POST");
        assert_eq!(entry.response.as_ref().unwrap().status_code, 404);
        assert!(entry.tags.contains("error"));
    }

    #[test]
    fn empty_values_do_not_overwrite() {
        let rules = default_rules();
        let mut store = ExchangeStore::new(50);

        store.upsert(
            "e1",
            request_update("GET", "https://example.com/a", vec![Header::new("A", "1")]),
            &rules,
        );
        store.upsert("e1", request_update("", "", Vec::new()), &rules);

        let entry = store.get("e1").unwrap();
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.url, "https://example.com/a");
        assert_eq!(entry.request_headers.len(), 1);
    }

    #[test]
    fn unparseable_url_creates_with_empty_host() {
        let rules = default_rules();
        let mut store = ExchangeStore::new(50);

        store.upsert("e1", request_update("GET", "garbage", Vec::new()), &rules);
        assert_eq!(store.get("e1").unwrap().host, "");
    }

    #[test]
    fn capacity_evicts_oldest_created() {
        let rules = default_rules();
        let mut store = ExchangeStore::new(3);

        for i in 0..4 {
            store.upsert(
                &format!("e{i}"),
                request_update("GET", "https://example.com/", Vec::new()),
                &rules,
            );
        }

        assert_eq!(store.len(), 3);
        assert!(store.get("e0").is_none());
        // Head-first order: newest creation first.
        let ids: Vec<&str> = store.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e3", "e2", "e1"]);
        assert_eq!(store.stats().total_evicted, 1);
    }

    #[test]
    fn update_does_not_change_position() {
        let rules = default_rules();
        let mut store = ExchangeStore::new(50);

        for i in 0..3 {
            store.upsert(
                &format!("e{i}"),
                request_update("GET", "https://example.com/", Vec::new()),
                &rules,
            );
        }
        store.upsert("e0", response_update(200, Vec::new()), &rules);

        let ids: Vec<&str> = store.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e2", "e1", "e0"]);
    }

    #[test]
    fn mark_rate_limited_targets_matching_endpoint_only() {
        let rules = default_rules();
        let mut store = ExchangeStore::new(50);

        store.upsert(
            "e1",
            request_update("GET", "https://a.com/x?page=1", Vec::new()),
            &rules,
        );
        store.upsert(
            "e2",
            request_update("GET", "https://a.com/y", Vec::new()),
            &rules,
        );

        let marked = store.mark_rate_limited(&RateKey::new("a.com", "/x"), &rules);
        assert_eq!(marked, 1);

        let hit = store.get("e1").unwrap();
        assert!(hit.recent_429);
        assert!(hit.tags.contains("rate-limit"));

        let miss = store.get("e2").unwrap();
        assert!(!miss.recent_429);
        assert!(!miss.tags.contains("rate-limit"));
    }

    #[test]
    fn marker_is_sticky_across_later_merges() {
        let rules = default_rules();
        let mut store = ExchangeStore::new(50);

        store.upsert(
            "e1",
            request_update("GET", "https://a.com/x", Vec::new()),
            &rules,
        );
        store.mark_rate_limited(&RateKey::new("a.com", "/x"), &rules);
        store.upsert("e1", response_update(200, Vec::new()), &rules);

        let entry = store.get("e1").unwrap();
        assert!(entry.recent_429);
        assert!(entry.tags.contains("rate-limit"));
    }

    #[test]
    fn clear_empties_but_keeps_counters() {
        let rules = default_rules();
        let mut store = ExchangeStore::new(50);

        store.upsert(
            "e1",
            request_update("GET", "https://example.com/", Vec::new()),
            &rules,
        );
        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.stats().total_created, 1);
        assert_eq!(store.stats().current_len, 0);
    }
}
