use std::io::IsTerminal;

use amlink::RelayStats;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Text
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct StatsOutput {
    server_to_client: u64,
    client_to_server: u64,
    failed: u64,
}

impl From<&RelayStats> for StatsOutput {
    fn from(stats: &RelayStats) -> Self {
        Self {
            server_to_client: stats.server_to_client,
            client_to_server: stats.client_to_server,
            failed: stats.failed,
        }
    }
}

pub fn render_stats(stats: &RelayStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string(&StatsOutput::from(stats))
            .unwrap_or_else(|_| "{}".to_string()),
        OutputFormat::Text => format!(
            "forwarded S->C: {} C->S: {} failed: {}",
            stats.server_to_client, stats.client_to_server, stats.failed
        ),
    }
}

pub fn print_stats(stats: &RelayStats, format: OutputFormat) {
    println!("{}", render_stats(stats, format));
}
