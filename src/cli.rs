//! Command-line interface definitions for turboprobe.
//!
//! Uses `clap` derive macros for declarative argument parsing. Every probe
//! option is optional here so that an unset flag falls through to the
//! settings file and then to the built-in default.

use crate::config::Settings;
use crate::types::PortStrategy;
use clap::Parser;
use std::path::PathBuf;

/// Stealth HTTPS liveness discovery over TCP SYN probes.
///
/// Reads hostnames from stdin, one per line, and prints `https://<host>`
/// for every host that answers a SYN to port 443 with a SYN-ACK.
#[derive(Parser, Debug, Default)]
#[command(name = "turboprobe")]
#[command(version)]
#[command(about = "Stealth HTTPS liveness discovery using TCP SYN probes", long_about = None)]
pub struct Args {
    /// Number of concurrent workers, at most 10000 [default: 100]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: Option<u64>,

    /// Per-probe timeout in milliseconds [default: 300]
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Network interface to send and capture on [default: eth0]
    #[arg(short = 'i', long)]
    pub interface: Option<String>,

    /// Capture poll interval in milliseconds [default: 100]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: Option<u64>,

    /// Capture snapshot length in bytes [default: 128]
    #[arg(long, value_parser = clap::value_parser!(u32).range(64..))]
    pub snaplen: Option<u32>,

    /// Source port selection strategy [default: clock]
    #[arg(long, value_enum)]
    pub port_strategy: Option<PortStrategy>,

    /// Settings file to use instead of the default location
    #[arg(long, value_name = "PATH", env = "TURBOPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log per-host decisions to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Overlay the flags that were given on top of `settings`.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = usize::try_from(concurrency).unwrap_or(usize::MAX);
        }
        if let Some(timeout) = self.timeout {
            settings.timeout_ms = timeout;
        }
        if let Some(interface) = &self.interface {
            settings.interface = interface.clone();
        }
        if let Some(poll_interval) = self.poll_interval {
            settings.poll_interval_ms = poll_interval;
        }
        if let Some(snaplen) = self.snaplen {
            settings.snaplen = snaplen;
        }
        if let Some(strategy) = self.port_strategy {
            settings.port_strategy = strategy;
        }
        settings
    }
}
