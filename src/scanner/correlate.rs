//! Response correlation: waiting for the SYN-ACK of one probe.
//!
//! ```text
//!              SYN+ACK captured
//!   LISTENING ------------------> MATCHED    => Live
//!       |  \
//!       |   \  deadline passed
//!       |    `------------------> TIMED_OUT  => NotLive
//!       |
//!       `-- capture read error -> FAILED     => NotLive
//! ```
//!
//! Poll timeouts keep the machine in LISTENING; they only give it a chance
//! to re-check the deadline. The capture filter already restricts traffic
//! to the probe's flow, so any SYN-ACK seen is the answer.

use crate::scanner::packet;
use crate::scanner::traits::{CaptureEvent, PacketCapture};
use crate::types::ProbeOutcome;
use std::time::{Duration, Instant};
use tracing::debug;

/// States of the correlation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelatorState {
    Listening,
    Matched,
    TimedOut,
    Failed,
}

impl CorrelatorState {
    /// Whether the machine has stopped.
    pub fn is_terminal(self) -> bool {
        self != Self::Listening
    }
}

impl From<CorrelatorState> for ProbeOutcome {
    fn from(state: CorrelatorState) -> Self {
        match state {
            CorrelatorState::Matched => ProbeOutcome::Live,
            _ => ProbeOutcome::NotLive,
        }
    }
}

/// Drives a capture handle until a SYN-ACK arrives or `timeout` passes.
pub struct Correlator<'a, C: PacketCapture> {
    capture: &'a mut C,
    timeout: Duration,
    started: Instant,
    state: CorrelatorState,
}

impl<'a, C: PacketCapture> Correlator<'a, C> {
    /// Start listening now.
    pub fn new(capture: &'a mut C, timeout: Duration) -> Self {
        Self {
            capture,
            timeout,
            started: Instant::now(),
            state: CorrelatorState::Listening,
        }
    }

    /// Current state.
    pub fn state(&self) -> CorrelatorState {
        self.state
    }

    /// Advance by one capture poll.
    pub fn step(&mut self) -> CorrelatorState {
        if self.state.is_terminal() {
            return self.state;
        }
        if self.started.elapsed() >= self.timeout {
            self.state = CorrelatorState::TimedOut;
            return self.state;
        }

        self.state = match self.capture.next_packet() {
            Ok(CaptureEvent::Packet(datagram)) => match packet::inspect(&datagram) {
                Some(segment) if segment.is_syn_ack() => CorrelatorState::Matched,
                _ => CorrelatorState::Listening,
            },
            Ok(CaptureEvent::PollTimeout) => CorrelatorState::Listening,
            Err(e) => {
                debug!("capture read failed: {}", e);
                CorrelatorState::Failed
            }
        };
        self.state
    }

    /// Run until a terminal state.
    pub fn run(mut self) -> CorrelatorState {
        while !self.step().is_terminal() {}
        self.state
    }
}

/// Wait for a SYN-ACK on `capture` for at most `timeout`.
pub fn await_syn_ack<C: PacketCapture>(capture: &mut C, timeout: Duration) -> ProbeOutcome {
    Correlator::new(capture, timeout).run().into()
}
