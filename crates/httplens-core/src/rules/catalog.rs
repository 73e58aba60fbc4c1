//! Built-in rule catalog.
//!
//! The catalog is written as a const table of uncompiled descriptors and
//! compiled once at monitor construction. A rule whose pattern fails to
//! compile is skipped with a warning rather than aborting catalog
//! construction -- one bad rule never takes down the rest.
//!
//! Weights are relative severity, not probabilities.

use regex::Regex;
use tracing::warn;

use super::types::{HeaderSide, Rule, Signal};

/// Uncompiled signal descriptor as written in the catalog table.
#[derive(Debug, Clone, Copy)]
enum SignalSpec {
    Path(&'static str),
    Query(&'static str),
    Body(&'static str),
    HeaderPresent(HeaderSide, &'static [&'static str]),
    HeaderEquals(HeaderSide, &'static str, &'static str),
    HeaderMatches(HeaderSide, &'static str, &'static str),
    Cookie(&'static str),
    HostContains(&'static [&'static str]),
    SchemeIn(&'static [&'static str]),
    StatusAtLeast(u16),
    RateLimited,
    AnyOf(&'static [SignalSpec]),
}

struct RuleSpec {
    id: &'static str,
    label: &'static str,
    weight: u32,
    signal: SignalSpec,
}

const SENSITIVE_PARAM: &str = r"(?i)(passw(or)?d|secret|token|api[-_]?key|apikey|private[-_]?key|ssn|credit[-_]?card|card[-_]?number|cvv|iban)";

const CATALOG: &[RuleSpec] = &[
    RuleSpec {
        id: "auth_path",
        label: "auth",
        weight: 3,
        signal: SignalSpec::Path(
            r"(?i)/(login|logout|signin|sign[-_]in|authenticate|auth|oauth|sso|session|token)(/|$|\.)",
        ),
    },
    RuleSpec {
        id: "authz_header",
        label: "authz",
        weight: 3,
        signal: SignalSpec::AnyOf(&[
            SignalSpec::HeaderPresent(HeaderSide::Request, &["authorization"]),
            SignalSpec::Cookie(
                r"(?i)(^|;\s*)(sessionid|session_id|jsessionid|phpsessid|sid|auth[-_]?token|access[-_]?token)=",
            ),
        ]),
    },
    RuleSpec {
        id: "oauth_flow",
        label: "oauth",
        weight: 3,
        signal: SignalSpec::AnyOf(&[
            SignalSpec::Path(r"(?i)/(authorize|callback)(/|$|\.)"),
            SignalSpec::Query(r"(?i)(openid|scope=|response_type=|client_id=)"),
        ]),
    },
    RuleSpec {
        id: "account_management",
        label: "account",
        weight: 2,
        signal: SignalSpec::Path(
            r"(?i)/(profile|account|settings|preferences|reset[-_]?password|change[-_]?password)(/|$|\.)",
        ),
    },
    RuleSpec {
        id: "file_upload",
        label: "upload",
        weight: 2,
        signal: SignalSpec::AnyOf(&[
            SignalSpec::Path(r"(?i)/(upload|import|attach)(/|$|\.)"),
            SignalSpec::HeaderMatches(
                HeaderSide::Request,
                "content-type",
                r"(?i)multipart/form-data",
            ),
        ]),
    },
    RuleSpec {
        id: "admin_surface",
        label: "admin",
        weight: 2,
        signal: SignalSpec::Path(
            r"(?i)/(admin|debug|status|metrics|health|actuator|console|phpmyadmin)(/|$|\.)",
        ),
    },
    RuleSpec {
        id: "graphql",
        label: "graphql",
        weight: 2,
        signal: SignalSpec::AnyOf(&[
            SignalSpec::Path(r"(?i)/graphql"),
            SignalSpec::HeaderMatches(
                HeaderSide::Request,
                "content-type",
                r"(?i)application/graphql",
            ),
        ]),
    },
    RuleSpec {
        id: "websocket",
        label: "websocket",
        weight: 1,
        signal: SignalSpec::AnyOf(&[
            SignalSpec::HeaderMatches(HeaderSide::Request, "upgrade", r"(?i)websocket"),
            SignalSpec::SchemeIn(&["ws", "wss"]),
        ]),
    },
    RuleSpec {
        id: "cors_wide_open",
        label: "cors-wide-open",
        weight: 3,
        signal: SignalSpec::HeaderEquals(HeaderSide::Response, "access-control-allow-origin", "*"),
    },
    RuleSpec {
        id: "sensitive_param",
        label: "sensitive-param",
        weight: 3,
        signal: SignalSpec::AnyOf(&[
            SignalSpec::Query(SENSITIVE_PARAM),
            SignalSpec::Body(SENSITIVE_PARAM),
        ]),
    },
    RuleSpec {
        id: "pii",
        label: "pii",
        weight: 3,
        signal: SignalSpec::Body(
            r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}|\b\d{3}-\d{2}-\d{4}\b",
        ),
    },
    RuleSpec {
        id: "server_fingerprint",
        label: "server-fingerprint",
        weight: 1,
        signal: SignalSpec::HeaderPresent(HeaderSide::Response, &["server", "x-powered-by"]),
    },
    RuleSpec {
        id: "framework_fingerprint",
        label: "framework-fingerprint",
        weight: 1,
        signal: SignalSpec::AnyOf(&[
            SignalSpec::HeaderPresent(
                HeaderSide::Response,
                &[
                    "x-nextjs-cache",
                    "x-nuxt",
                    "x-drupal-cache",
                    "x-generator",
                    "x-aspnet-version",
                ],
            ),
            SignalSpec::Body(r"(?i)(__next_data__|data-reactroot|ng-version|data-v-app|wp-content)"),
        ]),
    },
    RuleSpec {
        id: "cdn_host",
        label: "cdn",
        weight: 1,
        signal: SignalSpec::HostContains(&[
            "cloudfront.net",
            "cloudflare",
            "akamai",
            "fastly",
            "azureedge.net",
            "cdn.",
        ]),
    },
    RuleSpec {
        id: "error_status",
        label: "error",
        weight: 1,
        signal: SignalSpec::StatusAtLeast(400),
    },
    RuleSpec {
        id: "rate_limited",
        label: "rate-limit",
        weight: 2,
        signal: SignalSpec::RateLimited,
    },
    RuleSpec {
        id: "export_download",
        label: "export",
        weight: 2,
        signal: SignalSpec::AnyOf(&[
            SignalSpec::Path(r"(?i)/(export|download|backup|dump)(/|$|\.)"),
            SignalSpec::Path(r"(?i)\.(csv|xlsx?|sql|zip|tar|gz|bak)$"),
        ]),
    },
];

fn compile(rule_id: &str, source: &str) -> Option<Regex> {
    match Regex::new(source) {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(rule = rule_id, %err, "skipping rule with invalid pattern");
            None
        }
    }
}

fn compile_signal(rule_id: &str, spec: SignalSpec) -> Option<Signal> {
    Some(match spec {
        SignalSpec::Path(src) => Signal::Path(compile(rule_id, src)?),
        SignalSpec::Query(src) => Signal::Query(compile(rule_id, src)?),
        SignalSpec::Body(src) => Signal::Body(compile(rule_id, src)?),
        SignalSpec::HeaderPresent(side, names) => Signal::HeaderPresent(side, names),
        SignalSpec::HeaderEquals(side, name, value) => Signal::HeaderEquals(side, name, value),
        SignalSpec::HeaderMatches(side, name, src) => {
            Signal::HeaderMatches(side, name, compile(rule_id, src)?)
        }
        SignalSpec::Cookie(src) => Signal::CookieMatches(compile(rule_id, src)?),
        SignalSpec::HostContains(fragments) => Signal::HostContains(fragments),
        SignalSpec::SchemeIn(schemes) => Signal::SchemeIn(schemes),
        SignalSpec::StatusAtLeast(code) => Signal::StatusAtLeast(code),
        SignalSpec::RateLimited => Signal::RateLimited,
        SignalSpec::AnyOf(specs) => {
            let compiled = specs
                .iter()
                .map(|s| compile_signal(rule_id, *s))
                .collect::<Option<Vec<_>>>()?;
            Signal::AnyOf(compiled)
        }
    })
}

/// Compile the built-in catalog.
pub fn default_rules() -> Vec<Rule> {
    CATALOG
        .iter()
        .filter_map(|spec| {
            Some(Rule {
                id: spec.id,
                label: spec.label,
                weight: spec.weight,
                signal: compile_signal(spec.id, spec.signal)?,
            })
        })
        .collect()
}
