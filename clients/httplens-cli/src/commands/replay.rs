//! `httplens replay` — feed a capture file through the monitor and print a
//! triage table.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use httplens_core::config::MonitorConfig;
use httplens_core::event::CaptureEvent;
use httplens_core::monitor::TrafficMonitor;

pub fn run(
    config: &MonitorConfig,
    events_path: &Path,
    domain: Option<&str>,
    min_score: u32,
    export_path: Option<&Path>,
) -> Result<()> {
    let file = File::open(events_path)
        .with_context(|| format!("failed to open capture file: {}", events_path.display()))?;

    let mut monitor = TrafficMonitor::new(config);
    let mut skipped = 0usize;

    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match CaptureEvent::from_json(&line) {
            Ok(event) => monitor.handle_event(event),
            Err(err) => {
                skipped += 1;
                warn!(line = lineno + 1, %err, "skipping malformed event");
            }
        }
    }

    let stats = monitor.stats();
    println!(
        "Replayed {} exchanges ({} evicted, {} malformed lines skipped)",
        stats.total_created, stats.total_evicted, skipped
    );
    println!();
    println!("{:>5}  {:<6} {:<4} {:<50} TAGS", "SCORE", "METHOD", "ST", "URL");

    for exchange in monitor.snapshot(domain) {
        if exchange.score < min_score {
            continue;
        }
        let status = exchange
            .response
            .as_ref()
            .map(|r| r.status_code.to_string())
            .unwrap_or_else(|| "-".to_string());
        let tags: Vec<&str> = exchange.tags.iter().map(String::as_str).collect();
        println!(
            "{:>5}  {:<6} {:<4} {:<50} {}",
            exchange.score,
            exchange.method,
            status,
            exchange.url,
            tags.join(",")
        );
    }

    if let Some(path) = export_path {
        let out = File::create(path)
            .with_context(|| format!("failed to create export file: {}", path.display()))?;
        serde_json::to_writer_pretty(out, &monitor.export())?;
        println!();
        println!("Export written to {}", path.display());
    }

    Ok(())
}
