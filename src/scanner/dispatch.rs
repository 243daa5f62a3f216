//! Feeding hostnames from input into the bounded work queue.

use crate::types::ProbeTarget;
use std::borrow::Cow;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// What the dispatcher did with its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Hostnames pushed onto the queue.
    pub dispatched: u64,
    /// Blank lines ignored.
    pub skipped: u64,
    /// Input ended with a read error rather than end-of-stream.
    pub read_error: bool,
    /// Every worker had exited, so the rest of the input was left unread.
    pub workers_gone: bool,
}

/// Reads newline-delimited hostnames and queues them for the workers.
pub struct Dispatcher<I> {
    input: I,
}

impl<I: AsyncBufRead + Unpin> Dispatcher<I> {
    pub fn new(input: I) -> Self {
        Self { input }
    }

    /// Queue every non-blank line, then close the queue.
    ///
    /// Suspends while the queue is full. Lines that are not valid UTF-8 are
    /// decoded lossily and queued like any other. A read error stops reading
    /// but leaves what was already queued to be processed.
    pub async fn run(self, queue: mpsc::Sender<ProbeTarget>) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut lines = self.input.split(b'\n');

        loop {
            match lines.next_segment().await {
                Ok(Some(bytes)) => {
                    let line = String::from_utf8_lossy(&bytes);
                    if matches!(line, Cow::Owned(_)) {
                        debug!(line = %line, "input line is not valid UTF-8");
                    }
                    let Some(target) = ProbeTarget::from_line(&line) else {
                        report.skipped += 1;
                        continue;
                    };
                    if queue.send(target).await.is_err() {
                        warn!("no workers left to take input, stopping dispatch");
                        report.workers_gone = true;
                        break;
                    }
                    report.dispatched += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Error reading input: {}", e);
                    report.read_error = true;
                    break;
                }
            }
        }

        // Dropping the sender tells the workers nothing more is coming.
        drop(queue);
        report
    }
}
