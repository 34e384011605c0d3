//! OTG traffic-test harness
//!
//! - `run`: execute a TOML scenario file against the controller it names
//! - `b2b`: run the built-in two-port back-to-back UDP scenario
//!
//! Exits non-zero when the controller rejects a request or any check fails.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use otg_client::{HttpController, HttpControllerConfig};
use otg_harness::scenario::{self, DEFAULT_CAPTURE_OUT, DEFAULT_MAX_POLLS, Scenario};
use otg_harness::{CapturePort, Harness, PersistCapture, RunReport, RunSettings, Settle};

/// Traffic-test harness for OTG-style controllers.
#[derive(Parser, Debug)]
#[command(name = "otg-harness", about = "Run and verify traffic tests against an OTG controller")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario file.
    Run {
        /// Scenario TOML with [controller], [run] and [config] tables.
        #[arg(long)]
        scenario: PathBuf,
    },
    /// Run the built-in back-to-back scenario.
    B2b(B2bArgs),
}

#[derive(Args, Debug)]
struct B2bArgs {
    /// Controller base URL.
    #[arg(long)]
    controller: String,

    /// Test port location of p1.
    #[arg(long, default_value = "eth1")]
    p1_location: String,

    /// Test port location of p2.
    #[arg(long, default_value = "eth2")]
    p2_location: String,

    /// Where to write the capture of p2.
    #[arg(long, default_value = DEFAULT_CAPTURE_OUT)]
    capture_out: PathBuf,

    /// Skip TLS certificate verification.
    #[arg(long, default_value_t = false)]
    insecure: bool,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Read the configuration back and compare it with what was pushed.
    #[arg(long, default_value_t = false)]
    verify_round_trip: bool,

    /// Poll flow metrics every this many milliseconds until transmission
    /// stops, instead of reading port metrics once.
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Flow metric reads before giving up when polling.
    #[arg(long, default_value_t = DEFAULT_MAX_POLLS, value_parser = clap::value_parser!(u32).range(1..))]
    max_polls: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let report = match cli.command {
        Command::Run { scenario } => {
            let loaded = Scenario::load(&scenario)
                .with_context(|| format!("loading {}", scenario.display()))?;
            tracing::info!(
                scenario = %scenario.display(),
                controller = %loaded.controller.base_url,
                "otg-harness starting"
            );
            let controller = HttpController::with_config(loaded.controller);
            Harness::new(controller, loaded.settings).run(&loaded.config)?
        }
        Command::B2b(args) => {
            tracing::info!(controller = %args.controller, "otg-harness starting back-to-back run");
            let controller = HttpController::with_config(HttpControllerConfig {
                base_url: args.controller.clone(),
                timeout: args.timeout_secs.map(Duration::from_secs),
                insecure: args.insecure,
            });
            let settings = RunSettings {
                verify_round_trip: args.verify_round_trip,
                settle: match args.poll_ms {
                    Some(ms) => Settle::PollTransmit {
                        interval: Duration::from_millis(ms),
                        max_polls: args.max_polls,
                    },
                    None => Settle::None,
                },
                stop_capture_before_fetch: false,
                persist: Some(PersistCapture {
                    port: CapturePort::Named("p2".into()),
                    path: args.capture_out,
                }),
            };
            let config = scenario::b2b(&args.p1_location, &args.p2_location);
            Harness::new(controller, settings).run(&config)?
        }
    };

    log_report(&report);
    Ok(())
}

fn log_report(report: &RunReport) {
    for port in &report.counts.ports {
        tracing::info!(
            port = %port.name,
            frames_tx = port.frames_tx,
            frames_rx = port.frames_rx,
            "port totals"
        );
    }
    if let Some(path) = &report.persisted {
        tracing::info!(path = %path.display(), "capture saved");
    }
    tracing::info!(
        expected = report.counts.expected,
        total_tx = report.counts.total_tx,
        total_rx = report.counts.total_rx,
        "run passed"
    );
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn max_polls_defaults_to_scenario_default() {
        let cli = Cli::try_parse_from(["otg-harness", "b2b", "--controller", "http://c"]).unwrap();
        let Command::B2b(args) = cli.command else {
            panic!("expected b2b");
        };
        assert_eq!(args.max_polls, DEFAULT_MAX_POLLS);

        assert!(
            Cli::try_parse_from(["otg-harness", "b2b", "--controller", "c", "--max-polls", "0"])
                .is_err()
        );
    }
}
