//! Change notification and long-poll coordination.

pub mod coordinator;
pub mod hub;

pub use coordinator::{LongPollCoordinator, LongPollOutcome, DEFAULT_CEILING};
pub use hub::{Hub, WaitOutcome, WaitTicket};
