//! Timer collaborator for the tokio host.
//!
//! The scheduler only records a deadline here. The worker loop reads it and
//! sleeps until it, or not at all when nothing is armed.

use std::time::Instant;

use floodgate_core::Timer;

#[derive(Debug, Default)]
pub struct DeadlineTimer {
    deadline: Option<Instant>,
}

impl DeadlineTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Timer for DeadlineTimer {
    fn arm(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    fn disarm(&mut self) {
        self.deadline = None;
    }
}

/// Resolves at `deadline`, or never if there is none.
pub(crate) async fn sleep_until_armed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
