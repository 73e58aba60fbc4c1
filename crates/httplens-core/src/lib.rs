//! # httplens-core
//!
//! Core triage engine for HttpLens -- passive classification of HTTP
//! exchanges captured from a host browsing context.
//!
//! The crate assembles partial capture events into complete exchange records
//! (the correlation store), derives security-relevant tags and a risk score
//! for each record (the rule engine), and tracks repeated 429 responses per
//! endpoint over a sliding window (the rate-limit tracker). Capture, panel
//! rendering, transport, and export persistence are external collaborators.

pub mod config;
pub mod error;
pub mod event;
pub mod monitor;
pub mod protocol;
pub mod rate_limit;
pub mod rules;
pub mod store;
