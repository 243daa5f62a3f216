//! Core type definitions shared by the probing pipeline.
//!
//! Newtypes and small enums that keep hostnames, flows and verdicts from
//! being confused with raw strings and tuples.

mod flow;
mod target;

pub use flow::{
    FlowKey, PortStrategy, SourcePortAllocator, EPHEMERAL_PORT_END, EPHEMERAL_PORT_START,
    HTTPS_PORT,
};
pub use target::{AddressFamily, ProbeOutcome, ProbeTarget, ResolvedAddress};
