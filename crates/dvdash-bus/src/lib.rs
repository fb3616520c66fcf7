//! MQTT adapter: feeds broker publishes into the dashboard engine.

pub mod client;
pub mod router;

pub use client::{run, spawn, Backoff, BusConfig};
pub use router::{Route, TopicRouter};
