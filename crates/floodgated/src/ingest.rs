//! Stdin ingest, one command per line.
//!
//! Stdin is read on a plain thread. A blocking read parked in tokio's
//! blocking pool would hold up runtime shutdown.

use std::io::BufRead;

use anyhow::{bail, Result};
use tokio::sync::mpsc;

use floodgate_services::{ChannelError, ChannelHandle};

const LINE_BACKLOG: usize = 64;

pub fn spawn_stdin_reader() -> std::io::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(LINE_BACKLOG);
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

/// Enqueue each non-blank line. Returns how many were accepted.
pub async fn forward_lines(
    mut lines: mpsc::Receiver<String>,
    handle: ChannelHandle<String>,
) -> Result<u64> {
    let mut accepted = 0;
    while let Some(line) = lines.recv().await {
        let command = line.trim_end_matches('\r');
        if command.trim().is_empty() {
            continue;
        }
        match handle.enqueue(command.to_string()).await {
            Ok(()) => accepted += 1,
            Err(ChannelError::Queue(e)) => {
                tracing::warn!(error = %e, command, "command refused at ingest");
            }
            Err(ChannelError::Closed) => bail!("dispatch worker stopped while reading stdin"),
        }
    }
    Ok(accepted)
}
