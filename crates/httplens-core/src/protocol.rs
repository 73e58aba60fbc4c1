//! Command protocol for the external panel layer.
//!
//! The panel sends [`MonitorCommand`] messages to the core and receives
//! [`MonitorResponse`] replies. An unrecognized or malformed command yields
//! an explicit [`MonitorResponse::Error`] and never mutates state.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LensError;
use crate::monitor::{ExportDocument, TrafficMonitor};
use crate::store::Exchange;

/// A command sent from the panel to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MonitorCommand {
    /// Snapshot the store, optionally scoped to a domain.
    Snapshot {
        #[serde(default)]
        domain: Option<String>,
    },
    /// Set (or clear, when empty) the sticky domain filter.
    SetFilter { value: String },
    /// Read back the sticky domain filter.
    GetFilter,
    /// Empty the store.
    Clear,
    /// Export the full, unfiltered store contents.
    Export,
}

/// The core's reply to a panel command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum MonitorResponse {
    Exchanges { exchanges: Vec<Exchange> },
    Filter { value: Option<String> },
    Done,
    Export { document: ExportDocument },
    Error { message: String },
}

/// Execute a typed command against the monitor.
pub fn dispatch(monitor: &mut TrafficMonitor, command: MonitorCommand) -> MonitorResponse {
    match command {
        MonitorCommand::Snapshot { domain } => MonitorResponse::Exchanges {
            exchanges: monitor.snapshot(domain.as_deref()),
        },
        MonitorCommand::SetFilter { value } => {
            monitor.set_filter(&value);
            MonitorResponse::Done
        }
        MonitorCommand::GetFilter => MonitorResponse::Filter {
            value: monitor.filter().map(str::to_string),
        },
        MonitorCommand::Clear => {
            monitor.clear();
            MonitorResponse::Done
        }
        MonitorCommand::Export => MonitorResponse::Export {
            document: monitor.export(),
        },
    }
}

/// Parse a raw JSON command and execute it.
///
/// Malformed or unknown commands come back as [`MonitorResponse::Error`]
/// without touching monitor state.
pub fn dispatch_json(monitor: &mut TrafficMonitor, raw: &str) -> MonitorResponse {
    match serde_json::from_str::<MonitorCommand>(raw) {
        Ok(command) => dispatch(monitor, command),
        Err(err) => {
            let err = LensError::UnknownCommand(err.to_string());
            warn!(%err, "rejected panel command");
            MonitorResponse::Error {
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CaptureEvent;

    fn monitor_with_one_exchange() -> TrafficMonitor {
        let mut monitor = TrafficMonitor::with_defaults();
        monitor.handle_event(CaptureEvent::RequestStarted {
            id: "e1".to_string(),
            method: "GET".to_string(),
            url: "https://example.com/".to_string(),
            headers: Vec::new(),
        });
        monitor
    }

    #[test]
    fn snapshot_command_returns_exchanges() {
        let mut monitor = monitor_with_one_exchange();
        let response = dispatch_json(&mut monitor, r#"{"command":"snapshot"}"#);
        match response {
            MonitorResponse::Exchanges { exchanges } => assert_eq!(exchanges.len(), 1),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn filter_set_and_get_roundtrip() {
        let mut monitor = monitor_with_one_exchange();
        dispatch_json(
            &mut monitor,
            r#"{"command":"set_filter","value":"  Example.com "}"#,
        );
        let response = dispatch_json(&mut monitor, r#"{"command":"get_filter"}"#);
        match response {
            MonitorResponse::Filter { value } => assert_eq!(value.as_deref(), Some("example.com")),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn unknown_command_is_rejected_without_mutation() {
        let mut monitor = monitor_with_one_exchange();
        let response = dispatch_json(&mut monitor, r#"{"command":"self_destruct"}"#);
        assert!(matches!(response, MonitorResponse::Error { .. }));
        assert_eq!(monitor.snapshot(None).len(), 1);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let mut monitor = TrafficMonitor::with_defaults();
        let response = dispatch_json(&mut monitor, "{nope");
        assert!(matches!(response, MonitorResponse::Error { .. }));
    }

    #[test]
    fn export_command_bypasses_filter() {
        let mut monitor = monitor_with_one_exchange();
        monitor.set_filter("other.org");
        let response = dispatch_json(&mut monitor, r#"{"command":"export"}"#);
        match response {
            MonitorResponse::Export { document } => {
                assert_eq!(document.entry_count, 1);
                assert_eq!(document.exchanges.len(), 1);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
