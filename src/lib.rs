//! # turboprobe - Stealth HTTPS Liveness Discovery
//!
//! turboprobe reads hostnames and reports which of them accept TCP
//! connections on port 443, without ever completing a handshake. Each probe
//! is a single hand-built SYN; a SYN-ACK from the resolved address means the
//! host is live.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use turboprobe::config::ProbeConfig;
//! use turboprobe::interface::SourceAddresses;
//! use turboprobe::scanner::{DnsResolver, Engine, SystemBackend};
//! use tokio::io::{stdin, stdout, BufReader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ProbeConfig::default().with_concurrency(50);
//!     let sources = SourceAddresses::discover(&config.interface)?;
//!     let engine = Engine::new(config, sources, SystemBackend, DnsResolver::from_system());
//!
//!     let summary = engine.run(BufReader::new(stdin()), stdout()).await?;
//!     eprintln!("{} live of {}", summary.live, summary.dispatched);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Targets, flow keys and source port allocation
//! - [`scanner`] - Packet codec, capture, transmit, correlation and the worker pool
//! - [`interface`] - Local source address discovery
//! - [`config`] - Settings file and the immutable run configuration
//! - [`output`] - Result lines on stdout, diagnostics on stderr
//! - [`error`] - Error types

pub mod cli;
pub mod config;
pub mod error;
pub mod interface;
pub mod logging;
pub mod output;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use config::ProbeConfig;
pub use error::{ConfigError, ProbeError};
pub use interface::SourceAddresses;
pub use scanner::{Engine, RunSummary, SystemBackend};
pub use types::{FlowKey, ProbeOutcome, ProbeTarget};
