//! Drain scheduler — ties one token bucket to one command queue.
//!
//! The scheduler never sleeps. The host owns a [`Timer`] and calls
//! [`Scheduler::on_tick`] when the armed deadline passes; each tick sends at
//! most one command, then re-arms for the next permit or goes idle.
//!
//! ```text
//!            enqueue                 tick, queue non-empty
//!   Idle ───────────────▶ Waiting ◀──────────────────────┐
//!    ▲                      │ timer fires                 │
//!    │                      ▼                             │
//!    └────────────────── Draining ────────────────────────┘
//!       tick, queue empty
//! ```
//!
//! A startup burst is a run of ticks re-armed with zero delay.

use std::time::{Duration, Instant};

use crate::bucket::TokenBucketState;
use crate::config::{BucketConfig, FloodgateConfig};
use crate::error::{QueueError, SendError};
use crate::queue::CommandQueue;
use crate::stats::ChannelStats;

/// Deadline used when the next permit lies past what `Instant` can hold.
/// An early tick just re-arms.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Host timer. `arm` replaces any pending deadline.
pub trait Timer {
    fn arm(&mut self, deadline: Instant);
    fn disarm(&mut self);
}

/// Writes one fully-formed command to the remote end.
pub trait Sender<P> {
    fn send(&mut self, payload: &P) -> Result<(), SendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Queue empty, no timer armed.
    Idle,
    /// Queue non-empty, timer armed for `deadline`.
    Waiting { deadline: Instant },
    /// Inside a tick.
    Draining,
}

/// A command the sender refused. It is not re-queued.
#[derive(Debug)]
pub struct SendFailure<P> {
    pub payload: P,
    pub enqueued_at: Instant,
    pub error: SendError,
}

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome<P> {
    /// One command handed to the sender.
    Sent,
    /// One command consumed by a failed send.
    Failed(SendFailure<P>),
    /// Fired before a permit was available; re-armed.
    NotReady,
    /// Fired with nothing queued.
    Empty,
}

pub struct Scheduler<P, S, T> {
    bucket: TokenBucketState,
    queue: CommandQueue<P>,
    sender: S,
    timer: T,
    state: SchedulerState,
    sent: u64,
    send_failures: u64,
    rejected: u64,
    ticks: u64,
}

impl<P, S, T> Scheduler<P, S, T>
where
    S: Sender<P>,
    T: Timer,
{
    pub fn new(bucket: TokenBucketState, queue: CommandQueue<P>, sender: S, timer: T) -> Self {
        Self {
            bucket,
            queue,
            sender,
            timer,
            state: SchedulerState::Idle,
            sent: 0,
            send_failures: 0,
            rejected: 0,
            ticks: 0,
        }
    }

    /// Full bucket and empty queue built from `config`.
    pub fn from_config(config: &FloodgateConfig, sender: S, timer: T, now: Instant) -> Self {
        Self::new(
            TokenBucketState::from_config(&config.bucket, now),
            CommandQueue::new(&config.queue),
            sender,
            timer,
        )
    }

    /// Queue a command. Arms the timer if the channel was idle.
    pub fn enqueue(&mut self, payload: P, now: Instant) -> Result<(), QueueError> {
        let dropped_before = self.queue.dropped();
        if let Err(e) = self.queue.enqueue(payload, now) {
            self.rejected += 1;
            tracing::debug!(error = %e, "enqueue rejected");
            return Err(e);
        }
        if self.queue.dropped() > dropped_before {
            tracing::warn!(
                dropped = self.queue.dropped(),
                "queue at max depth, oldest command dropped"
            );
        }
        if self.state == SchedulerState::Idle {
            self.arm(now);
        }
        Ok(())
    }

    /// Handle a timer firing at `now`.
    pub fn on_tick(&mut self, now: Instant) -> TickOutcome<P> {
        self.state = SchedulerState::Draining;
        self.ticks += 1;

        let outcome = if self.queue.is_empty() {
            TickOutcome::Empty
        } else {
            let (permits, bucket) = self.bucket.advance(now);
            self.bucket = bucket;
            if permits == 0 {
                TickOutcome::NotReady
            } else {
                self.send_one()
            }
        };

        if self.queue.is_empty() {
            self.timer.disarm();
            self.state = SchedulerState::Idle;
            tracing::trace!("queue drained, scheduler idle");
        } else {
            self.arm(now);
        }
        outcome
    }

    /// Disarm the timer and discard the queue. Returns the discarded count.
    pub fn teardown(&mut self) -> usize {
        self.timer.disarm();
        self.state = SchedulerState::Idle;
        self.queue.clear()
    }

    /// Swap in a full bucket with new parameters.
    pub fn reconfigure(&mut self, config: &BucketConfig, now: Instant) {
        self.bucket = TokenBucketState::from_config(config, now);
        if !self.queue.is_empty() {
            self.arm(now);
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn bucket(&self) -> &TokenBucketState {
        &self.bucket
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            queued: self.queue.len(),
            sent: self.sent,
            send_failures: self.send_failures,
            dropped: self.queue.dropped(),
            rejected: self.rejected,
            ticks: self.ticks,
        }
    }

    fn send_one(&mut self) -> TickOutcome<P> {
        let command = match self.queue.pop_front() {
            Ok(command) => command,
            Err(e) => unreachable!("non-empty queue failed to pop: {e}"),
        };
        match self.sender.send(&command.payload) {
            Ok(()) => {
                self.sent += 1;
                TickOutcome::Sent
            }
            Err(error) => {
                self.send_failures += 1;
                tracing::warn!(error = %error, "send failed, command dropped");
                TickOutcome::Failed(SendFailure {
                    payload: command.payload,
                    enqueued_at: command.enqueued_at,
                    error,
                })
            }
        }
    }

    fn arm(&mut self, now: Instant) {
        let wait = self.bucket.time_until_next_permit(now);
        let deadline = now
            .checked_add(wait)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        self.timer.arm(deadline);
        self.state = SchedulerState::Waiting { deadline };
    }
}
