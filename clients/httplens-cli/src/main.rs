//! CLI client for triaging captured HTTP traffic with the HttpLens core.

mod commands;

use clap::Parser;

/// HttpLens — passive triage of captured HTTP exchanges.
#[derive(Parser, Debug)]
#[command(name = "httplens", version, about)]
struct Cli {
    /// Path to the config file.
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Replay a JSON-lines capture file through the monitor and print a
    /// triage table.
    Replay {
        /// Path to a file with one capture event per line.
        events: String,

        /// Only show exchanges for this domain (exact or subdomain match).
        #[arg(long)]
        domain: Option<String>,

        /// Only show exchanges scoring at least this value.
        #[arg(long, default_value = "0")]
        min_score: u32,

        /// Write the full, unfiltered export document to this path.
        #[arg(long)]
        export: Option<String>,
    },

    /// List the built-in rule catalog.
    Rules,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => httplens_core::config::MonitorConfig::load(std::path::Path::new(path))?,
        None => httplens_core::config::MonitorConfig::default(),
    };

    match cli.command {
        Commands::Replay {
            events,
            domain,
            min_score,
            export,
        } => commands::replay::run(
            &config,
            std::path::Path::new(&events),
            domain.as_deref(),
            min_score,
            export.as_deref().map(std::path::Path::new),
        )?,

        Commands::Rules => commands::rules::run(),
    }

    Ok(())
}
