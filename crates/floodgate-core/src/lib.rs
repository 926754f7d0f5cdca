//! Token bucket, command queue, and drain scheduler.
//! Synchronous and runtime-free; the tokio host lives in floodgate-services.

pub mod bucket;
pub mod config;
pub mod error;
pub mod queue;
pub mod scheduler;
pub mod stats;

pub use bucket::TokenBucketState;
pub use config::{BucketConfig, ConfigError, FloodgateConfig, OverflowPolicy, QueueConfig};
pub use error::{QueueError, SendError};
pub use queue::{CommandQueue, QueuedCommand};
pub use scheduler::{Scheduler, SchedulerState, SendFailure, Sender, TickOutcome, Timer};
pub use stats::ChannelStats;
