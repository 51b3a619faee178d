//! File-based rendezvous with the recognition worker.
//!
//! The channel is a plain directory. A file's presence is the signal, its
//! content the payload, its removal the acknowledgement. All waits are
//! bounded, cancellable polling loops.

pub mod channel;
pub mod messages;
pub mod wait;

pub use channel::ControlChannel;
pub use messages::Message;
pub use wait::{wait_until, WaitError, WaitPolicy};
