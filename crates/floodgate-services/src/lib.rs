//! floodgate-services — tokio host for floodgate channels.
//!
//! A channel is one dispatch worker task owning one scheduler. All
//! mutation happens on that task; callers hold a cloneable
//! [`ChannelHandle`] and talk to it over a channel.

pub mod sender;
pub mod timer;
pub mod worker;

pub use sender::{MpscSender, WriterSender};
pub use timer::DeadlineTimer;
pub use worker::{spawn_channel, ChannelError, ChannelHandle, FailureReceiver};
