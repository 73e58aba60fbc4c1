//! Canonical view construction and rule evaluation.

use std::collections::BTreeSet;

use crate::event::{header_value, Header, UrlParts};
use crate::store::Exchange;

use super::types::{HeaderSide, Rule};

/// Normalized projection of an exchange used as rule input.
///
/// Built fresh for every classification, so derived tags and score always
/// reflect the exchange's current fields and rate-limit marker.
#[derive(Debug)]
pub struct RequestView<'a> {
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub query: String,
    pub method: &'a str,
    pub body_text: String,
    pub request_headers: &'a [Header],
    pub response_headers: &'a [Header],
    pub status_code: Option<u16>,
    pub cookie_value: String,
    pub recent_429: bool,
}

impl<'a> RequestView<'a> {
    /// Build the canonical view for an exchange.
    pub fn of(exchange: &'a Exchange) -> Self {
        let parts = UrlParts::parse(&exchange.url);
        let response_headers = exchange
            .response
            .as_ref()
            .map(|r| r.headers.as_slice())
            .unwrap_or(&[]);
        let cookie_value = header_value(&exchange.request_headers, "cookie")
            .unwrap_or("")
            .to_string();
        let body_text = exchange
            .request_body
            .as_ref()
            .map(|b| b.as_text())
            .unwrap_or_default();

        Self {
            scheme: parts.scheme,
            host: parts.host,
            path: parts.path,
            query: parts.query,
            method: &exchange.method,
            body_text,
            request_headers: &exchange.request_headers,
            response_headers,
            status_code: exchange.response.as_ref().map(|r| r.status_code),
            cookie_value,
            recent_429: exchange.recent_429,
        }
    }

    /// Case-insensitive header lookup in the given block; first match wins.
    pub(crate) fn header(&self, side: HeaderSide, name: &str) -> Option<&str> {
        let headers = match side {
            HeaderSide::Request => self.request_headers,
            HeaderSide::Response => self.response_headers,
        };
        header_value(headers, name)
    }
}

/// Classify an exchange against a rule catalog.
///
/// Pure, deterministic, and total: every rule is evaluated independently, a
/// non-matching or unmatchable rule contributes nothing, and evaluation order
/// cannot affect the result. Tags carry set semantics; the score is the sum
/// of the weights of all matching rules.
pub fn classify(exchange: &Exchange, rules: &[Rule]) -> (BTreeSet<String>, u32) {
    let view = RequestView::of(exchange);
    let mut tags = BTreeSet::new();
    let mut score = 0u32;
    for rule in rules {
        if rule.signal.matches(&view) {
            tags.insert(rule.label.to_string());
            score += rule.weight;
        }
    }
    (tags, score)
}
