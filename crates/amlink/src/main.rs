mod exit;
mod logging;
mod output;

use std::time::Duration;

use amlink::transport::ConnectionSpec;
use amlink::{Relay, RelayConfig};
use clap::{ArgAction, Parser};
use crossbeam_channel::bounded;
use tracing::info;

use crate::exit::{relay_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::{print_stats, OutputFormat};

#[derive(Parser, Debug)]
#[command(
    name = "amrelay",
    version,
    about = "Relay Active Message packets between a server connection and its sources"
)]
struct Cli {
    /// Server-side connection string (listens unless --client-client).
    #[arg(value_name = "SERVER", default_value = "sf@0.0.0.0:9002")]
    server: ConnectionSpec,

    /// Source connection strings (dial unless --server-server).
    #[arg(value_name = "SOURCE", num_args = 1.., default_value = "sf@127.0.0.1:9001")]
    sources: Vec<ConnectionSpec>,

    /// Seconds between redial attempts.
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    reconnect: u64,

    /// Dial out on the server side too.
    #[arg(long, conflicts_with = "server_server")]
    client_client: bool,

    /// Listen on the source sides too.
    #[arg(long)]
    server_server: bool,

    /// Packets buffered per side before readers block.
    #[arg(long, value_name = "N", default_value_t = 0)]
    intake_capacity: usize,

    /// Output format for the exit summary.
    #[arg(long, value_name = "FORMAT")]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Debug logging; repeat for trace.
    #[arg(short = 'D', long = "debug", action = ArgAction::Count)]
    debug: u8,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { USAGE } else { SUCCESS };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    init_logging(cli.log_format, cli.log_level.raised_by(cli.debug));

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = run(cli, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

fn run(cli: Cli, format: OutputFormat) -> CliResult<i32> {
    let mut config = RelayConfig::new(
        cli.server,
        cli.sources,
        Duration::from_secs(cli.reconnect),
        cli.client_client,
        cli.server_server,
    )
    .map_err(|err| relay_error("invalid arguments", err))?;
    config.intake_capacity = cli.intake_capacity;

    let relay = Relay::from_config(&config).map_err(|err| relay_error("open failed", err))?;

    let (stop_tx, stop_rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;

    let sources: Vec<String> = config.sources.iter().map(|s| s.spec.to_string()).collect();
    info!(server = %config.server.spec, ?sources, "relay starting");
    let stats = relay
        .run(&stop_rx)
        .map_err(|err| relay_error("relay failed", err))?;
    print_stats(&stats, format);

    Ok(SUCCESS)
}
