//! Configuration management for turboprobe.
//!
//! Command-line flags override an optional settings file, which overrides
//! the built-in defaults. The result is one immutable [`ProbeConfig`].

mod probe;
mod settings;

pub use probe::ProbeConfig;
pub use settings::{
    Settings, DEFAULT_CONCURRENCY, MAX_CONCURRENCY, DEFAULT_INTERFACE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SNAPLEN,
    DEFAULT_TIMEOUT_MS,
};
