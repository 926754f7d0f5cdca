//! floodgated — throttled command relay.
//!
//! Reads one command per line on stdin and writes them to stdout no faster
//! than the configured token bucket allows. Logs go to stderr.
//!
//!   floodgated [CONFIG_PATH]
//!
//! SIGINT discards the backlog and exits. SIGHUP reloads the bucket
//! settings. EOF on stdin drains the backlog at the throttled rate, then exits.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use floodgate_core::{ChannelStats, FloodgateConfig};
use floodgate_services::{spawn_channel, ChannelHandle, WriterSender};

mod ingest;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Load config
    let config_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let path = FloodgateConfig::file_path();
            if let Err(e) = FloodgateConfig::write_default_if_missing(&path) {
                tracing::warn!(error = %e, "failed to write default config");
            }
            path
        }
    };
    let config = FloodgateConfig::load_from(&config_path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        FloodgateConfig::default()
    });
    tracing::info!(
        config = %config_path.display(),
        capacity = config.bucket.capacity,
        refill_interval_secs = config.bucket.refill_interval_secs,
        max_queue_depth = config.queue.max_depth,
        overflow = ?config.queue.overflow,
        "floodgated starting"
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Outbound channel ─────────────────────────────────────────────────────
    let sender = WriterSender::new(std::io::stdout());
    let (handle, mut failures, mut worker) =
        spawn_channel(&config, sender, shutdown_tx.subscribe());

    tokio::spawn(async move {
        while let Some(failure) = failures.recv().await {
            tracing::warn!(
                command = %failure.payload,
                error = %failure.error,
                waited = ?failure.enqueued_at.elapsed(),
                "command lost"
            );
        }
    });

    // ── Spawn tasks ──────────────────────────────────────────────────────────
    let stats_task = config
        .logging
        .stats_interval()
        .map(|every| tokio::spawn(stats_loop(handle.clone(), every)));

    let reload_task = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = reload_on_hangup(handle, config_path).await {
                tracing::error!(error = %e, "config reload task failed");
            }
        })
    };

    let lines = ingest::spawn_stdin_reader().context("failed to start stdin reader")?;
    let mut ingest_task = tokio::spawn(ingest::forward_lines(lines, handle));

    // ── Wait for exit ────────────────────────────────────────────────────────
    tokio::select! {
        r = &mut ingest_task => match r {
            Ok(Ok(accepted)) => tracing::info!(accepted, "stdin closed, draining queue"),
            Ok(Err(e)) => tracing::error!(error = %e, "ingest failed"),
            Err(e) => tracing::error!(error = %e, "ingest task panicked"),
        },
        r = &mut worker => {
            let stats = r.context("dispatch worker panicked")??;
            log_exit(&stats);
            return Ok(());
        }
    }

    // Remaining handles must go so the worker sees the channel close.
    if let Some(task) = stats_task {
        task.abort();
    }
    reload_task.abort();

    let stats = worker.await.context("dispatch worker panicked")??;
    log_exit(&stats);
    Ok(())
}

async fn stats_loop(handle: ChannelHandle<String>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;
    loop {
        interval.tick().await;
        let Ok(stats) = handle.stats().await else {
            return;
        };
        tracing::info!(
            queued = stats.queued,
            sent = stats.sent,
            send_failures = stats.send_failures,
            dropped = stats.dropped,
            rejected = stats.rejected,
            "channel stats"
        );
    }
}

#[cfg(unix)]
async fn reload_on_hangup(handle: ChannelHandle<String>, path: PathBuf) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    while hangup.recv().await.is_some() {
        match FloodgateConfig::load_from(&path) {
            Ok(config) => {
                // Queue settings only apply at startup.
                handle
                    .reconfigure(config.bucket)
                    .await
                    .context("dispatch worker stopped")?;
            }
            Err(e) => tracing::warn!(
                error = %e,
                path = %path.display(),
                "config reload failed, keeping current settings"
            ),
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn reload_on_hangup(_handle: ChannelHandle<String>, _path: PathBuf) -> Result<()> {
    Ok(())
}

fn log_exit(stats: &ChannelStats) {
    tracing::info!(
        processed = stats.delivered_or_failed(),
        sent = stats.sent,
        send_failures = stats.send_failures,
        dropped = stats.dropped,
        rejected = stats.rejected,
        "floodgated exiting"
    );
}
