//! Command queue — strict FIFO backlog of commands waiting for a permit.
//!
//! Unbounded unless a max depth is configured. At max depth the overflow
//! policy decides: `Reject` fails the new enqueue, `DropOldest` evicts the
//! head and bumps the drop counter.

use std::collections::VecDeque;
use std::time::Instant;

use crate::config::{OverflowPolicy, QueueConfig};
use crate::error::QueueError;

/// A command waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCommand<P> {
    pub payload: P,
    pub enqueued_at: Instant,
}

#[derive(Debug)]
pub struct CommandQueue<P> {
    commands: VecDeque<QueuedCommand<P>>,
    max_depth: Option<usize>,
    overflow: OverflowPolicy,
    dropped: u64,
}

impl<P> CommandQueue<P> {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            commands: VecDeque::new(),
            max_depth: config.max_depth(),
            overflow: config.overflow,
            dropped: 0,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(&QueueConfig::default())
    }

    /// Append at the tail.
    pub fn enqueue(&mut self, payload: P, now: Instant) -> Result<(), QueueError> {
        if let Some(max_depth) = self.max_depth {
            if self.commands.len() >= max_depth {
                match self.overflow {
                    OverflowPolicy::Reject => {
                        return Err(QueueError::Full {
                            depth: self.commands.len(),
                            max_depth,
                        });
                    }
                    OverflowPolicy::DropOldest => {
                        self.commands.pop_front();
                        self.dropped += 1;
                    }
                }
            }
        }
        self.commands.push_back(QueuedCommand {
            payload,
            enqueued_at: now,
        });
        Ok(())
    }

    pub fn peek(&self) -> Option<&QueuedCommand<P>> {
        self.commands.front()
    }

    pub fn pop_front(&mut self) -> Result<QueuedCommand<P>, QueueError> {
        self.commands.pop_front().ok_or(QueueError::Empty)
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Commands evicted by `DropOldest` over the queue's lifetime.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Discard everything. Returns how many commands were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.commands.len();
        self.commands.clear();
        discarded
    }
}
