//! Dispatch worker — owns one channel's scheduler and drives it from a
//! single tokio task.
//!
//! Requests arrive over a bounded mpsc channel and are answered over
//! oneshots, so an enqueue rejected by the overflow policy still fails at the
//! caller. The only other wakeup is the scheduler's armed deadline.
//!
//! Exit paths:
//!   shutdown signal:      disarm and discard whatever is queued
//!   every handle dropped: keep draining at the throttled rate, then exit

use std::time::Instant;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use floodgate_core::{
    BucketConfig, ChannelStats, FloodgateConfig, QueueError, Scheduler, SchedulerState,
    SendFailure, Sender, TickOutcome,
};

use crate::timer::{sleep_until_armed, DeadlineTimer};

/// Requests buffered between handles and the worker.
const REQUEST_BACKLOG: usize = 256;

pub type FailureReceiver<P> = mpsc::UnboundedReceiver<SendFailure<P>>;

enum Request<P> {
    Enqueue {
        payload: P,
        reply: oneshot::Sender<Result<(), QueueError>>,
    },
    Reconfigure {
        bucket: BucketConfig,
        reply: oneshot::Sender<()>,
    },
    Stats {
        reply: oneshot::Sender<ChannelStats>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("channel worker has stopped")]
    Closed,
}

/// Cloneable ingress to a running channel.
pub struct ChannelHandle<P> {
    request_tx: mpsc::Sender<Request<P>>,
}

impl<P> Clone for ChannelHandle<P> {
    fn clone(&self) -> Self {
        Self {
            request_tx: self.request_tx.clone(),
        }
    }
}

impl<P> ChannelHandle<P> {
    /// Queue a command for throttled delivery.
    pub async fn enqueue(&self, payload: P) -> Result<(), ChannelError> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Enqueue { payload, reply }).await?;
        let result = rx.await.map_err(|_| ChannelError::Closed)?;
        result.map_err(ChannelError::from)
    }

    /// Replace the token bucket. The new bucket starts full.
    pub async fn reconfigure(&self, bucket: BucketConfig) -> Result<(), ChannelError> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Reconfigure { bucket, reply }).await?;
        rx.await.map_err(|_| ChannelError::Closed)
    }

    pub async fn stats(&self) -> Result<ChannelStats, ChannelError> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Stats { reply }).await?;
        rx.await.map_err(|_| ChannelError::Closed)
    }

    async fn request(&self, request: Request<P>) -> Result<(), ChannelError> {
        self.request_tx
            .send(request)
            .await
            .map_err(|_| ChannelError::Closed)
    }
}

pub struct DispatchWorker<P, S> {
    scheduler: Scheduler<P, S, DeadlineTimer>,
    request_rx: mpsc::Receiver<Request<P>>,
    failure_tx: mpsc::UnboundedSender<SendFailure<P>>,
    shutdown: broadcast::Receiver<()>,
}

/// Spawn a worker for one outbound channel.
///
/// Returns the ingress handle, the stream of failed sends, and the task,
/// which resolves to the channel's final stats.
pub fn spawn_channel<P, S>(
    config: &FloodgateConfig,
    sender: S,
    shutdown: broadcast::Receiver<()>,
) -> (
    ChannelHandle<P>,
    FailureReceiver<P>,
    JoinHandle<anyhow::Result<ChannelStats>>,
)
where
    P: Send + 'static,
    S: Sender<P> + Send + 'static,
{
    let (request_tx, request_rx) = mpsc::channel(REQUEST_BACKLOG);
    let (failure_tx, failure_rx) = mpsc::unbounded_channel();
    let worker = DispatchWorker::new(config, sender, request_rx, failure_tx, shutdown);
    let task = tokio::spawn(worker.run());
    (ChannelHandle { request_tx }, failure_rx, task)
}

impl<P, S> DispatchWorker<P, S>
where
    S: Sender<P>,
{
    fn new(
        config: &FloodgateConfig,
        sender: S,
        request_rx: mpsc::Receiver<Request<P>>,
        failure_tx: mpsc::UnboundedSender<SendFailure<P>>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            scheduler: Scheduler::from_config(config, sender, DeadlineTimer::new(), now()),
            request_rx,
            failure_tx,
            shutdown,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<ChannelStats> {
        tracing::debug!(
            capacity = self.scheduler.bucket().capacity(),
            refill_interval = ?self.scheduler.bucket().refill_interval(),
            "dispatch worker started"
        );
        let mut accepting = true;

        loop {
            if !accepting && self.scheduler.state() == SchedulerState::Idle {
                tracing::info!("all handles dropped and queue drained, dispatch worker exiting");
                return Ok(self.scheduler.stats());
            }

            let deadline = self.scheduler.timer().deadline();

            tokio::select! {
                _ = self.shutdown.recv() => {
                    let discarded = self.scheduler.teardown();
                    tracing::info!(discarded, "dispatch worker shutting down");
                    return Ok(self.scheduler.stats());
                }

                request = self.request_rx.recv(), if accepting => {
                    match request {
                        Some(request) => self.handle(request),
                        None => {
                            accepting = false;
                            tracing::debug!(
                                queued = self.scheduler.queue_len(),
                                "all handles dropped, draining"
                            );
                        }
                    }
                }

                _ = sleep_until_armed(deadline) => self.tick(),
            }
        }
    }

    fn handle(&mut self, request: Request<P>) {
        match request {
            Request::Enqueue { payload, reply } => {
                let result = self.scheduler.enqueue(payload, now());
                let _ = reply.send(result);
            }
            Request::Reconfigure { bucket, reply } => {
                self.scheduler.reconfigure(&bucket, now());
                tracing::info!(
                    capacity = bucket.capacity,
                    refill_interval_secs = bucket.refill_interval_secs,
                    "token bucket reconfigured"
                );
                let _ = reply.send(());
            }
            Request::Stats { reply } => {
                let _ = reply.send(self.scheduler.stats());
            }
        }
    }

    fn tick(&mut self) {
        if let TickOutcome::Failed(failure) = self.scheduler.on_tick(now()) {
            // Nobody listening is fine; the scheduler already logged it.
            let _ = self.failure_tx.send(failure);
        }
    }
}

/// Read through tokio's clock so a paused test runtime controls it.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
