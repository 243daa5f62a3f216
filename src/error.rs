//! Error types for turboprobe.
//!
//! Uses `thiserror` for ergonomic error definitions.

use crate::types::AddressFamily;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for probing operations.
///
/// Most variants are probe-local: the worker loop swallows them and the
/// hostname simply produces no output. Interface and configuration errors
/// are fatal at startup.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("DNS resolution failed for '{host}': {reason}")]
    DnsResolution { host: String, reason: String },

    #[error("DNS resolution timed out for '{0}'")]
    ResolveTimeout(String),

    #[error("no IP addresses found for '{0}'")]
    NoAddresses(String),

    #[error("no local {0} source address available")]
    NoSourceAddress(AddressFamily),

    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("failed to install capture filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Raw socket error: {0}")]
    RawSocket(String),

    #[error("send to {destination} failed: {reason}")]
    Send { destination: String, reason: String },

    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("interface {interface} has no usable {family} address")]
    MissingInterfaceAddress {
        interface: String,
        family: AddressFamily,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("worker task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),
}

/// Result type alias for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
