//! turboprobe - stealth HTTPS liveness discovery.
//!
//! Hostnames on stdin, `https://<host>` lines on stdout, diagnostics on stderr.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tokio::io::{self, BufReader};
use tracing::{debug, info};
use turboprobe::cli::Args;
use turboprobe::config::{ProbeConfig, Settings};
use turboprobe::interface::SourceAddresses;
use turboprobe::logging;
use turboprobe::output::{print_error, print_warning};
use turboprobe::scanner::{DnsResolver, Engine, SystemBackend};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = match &args.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::load().context("Failed to load settings")?,
    };
    let config = ProbeConfig::try_from(args.apply(settings)).context("Invalid configuration")?;
    debug!(?config, "configuration resolved");

    let sources = SourceAddresses::discover(&config.interface)
        .with_context(|| format!("Cannot probe from interface {}", config.interface))?;
    info!(v4 = ?sources.v4, v6 = ?sources.v6, "source addresses");

    if !is_root() {
        print_warning("Not running as root; raw sockets and packet capture will likely fail");
    }

    let engine = Engine::new(config, sources, SystemBackend, DnsResolver::from_system());
    let summary = engine
        .run(BufReader::new(io::stdin()), io::stdout())
        .await
        .context("Probe run failed")?;

    if summary.workers_started == 0 && summary.dispatched > 0 {
        print_warning("No worker could start; no hosts were probed");
    }
    Ok(())
}

fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}
