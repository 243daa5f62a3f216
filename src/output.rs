//! Output handling.
//!
//! Stdout carries nothing but result lines, written by [`ResultSink`] as
//! soon as each host is confirmed. Human-facing diagnostics go to stderr.

use crate::types::ProbeTarget;
use console::style;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Writes one `https://<host>` line per confirmed-live target.
pub struct ResultSink<W> {
    out: W,
}

impl<W: AsyncWrite + Unpin> ResultSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Write results in arrival order until every sender is gone.
    ///
    /// Each line is flushed immediately. Returns the number of lines written.
    pub async fn run(mut self, mut live: mpsc::Receiver<ProbeTarget>) -> io::Result<u64> {
        let mut written = 0;
        while let Some(target) = live.recv().await {
            let line = format!("{}\n", target.https_url());
            self.out.write_all(line.as_bytes()).await?;
            self.out.flush().await?;
            written += 1;
        }
        Ok(written)
    }
}

/// Print an error message to stderr.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message to stderr.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}
