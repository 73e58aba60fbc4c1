//! Rule and signal matcher types.

use regex::Regex;

use super::engine::RequestView;

/// Which header block a header signal inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSide {
    Request,
    Response,
}

/// A single classification rule.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Stable identifier, unique within the catalog.
    pub id: &'static str,
    /// Label added to an exchange's tag set when the signal matches.
    pub label: &'static str,
    /// Relative severity; an exchange's score is the sum of the weights of
    /// all matching rules.
    pub weight: u32,
    /// Declarative matcher evaluated against the canonical view.
    pub signal: Signal,
}

/// Declarative signal matcher evaluated against the canonical request view.
#[derive(Debug, Clone)]
pub enum Signal {
    /// URL path matches the pattern.
    Path(Regex),
    /// Query string matches the pattern.
    Query(Regex),
    /// Stringified request body matches the pattern.
    Body(Regex),
    /// A header with one of the given names is present (name lookup is
    /// case-insensitive).
    HeaderPresent(HeaderSide, &'static [&'static str]),
    /// The named header's value equals `value` exactly.
    HeaderEquals(HeaderSide, &'static str, &'static str),
    /// The named header's value matches the pattern.
    HeaderMatches(HeaderSide, &'static str, Regex),
    /// The request Cookie header value matches the pattern.
    CookieMatches(Regex),
    /// Host contains one of the given fragments.
    HostContains(&'static [&'static str]),
    /// URL scheme is one of the given values.
    SchemeIn(&'static [&'static str]),
    /// Response status code is at least the threshold.
    StatusAtLeast(u16),
    /// The exchange carries the recent-429 marker.
    RateLimited,
    /// Any of the nested signals match.
    AnyOf(Vec<Signal>),
}

impl Signal {
    /// Evaluate this signal against a canonical view.
    pub fn matches(&self, view: &RequestView<'_>) -> bool {
        match self {
            Signal::Path(re) => re.is_match(&view.path),
            Signal::Query(re) => re.is_match(&view.query),
            Signal::Body(re) => re.is_match(&view.body_text),
            Signal::HeaderPresent(side, names) => names
                .iter()
                .any(|name| view.header(*side, name).is_some()),
            Signal::HeaderEquals(side, name, value) => {
                view.header(*side, name).map_or(false, |v| v == *value)
            }
            Signal::HeaderMatches(side, name, re) => {
                view.header(*side, name).map_or(false, |v| re.is_match(v))
            }
            Signal::CookieMatches(re) => re.is_match(&view.cookie_value),
            Signal::HostContains(fragments) => {
                fragments.iter().any(|f| view.host.contains(*f))
            }
            Signal::SchemeIn(schemes) => schemes.iter().any(|s| view.scheme == *s),
            Signal::StatusAtLeast(threshold) => {
                view.status_code.map_or(false, |code| code >= *threshold)
            }
            Signal::RateLimited => view.recent_429,
            Signal::AnyOf(signals) => signals.iter().any(|s| s.matches(view)),
        }
    }
}
