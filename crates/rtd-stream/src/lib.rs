pub mod backoff;
pub mod client;
pub mod ring;

pub use backoff::{Backoff, MAX_RECONNECT_DELAY, RECONNECT_FLOOR};
pub use client::{ConnectionState, StreamClient};
pub use ring::{EventRing, MAX_EVENTS};
