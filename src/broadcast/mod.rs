// src/broadcast/mod.rs

//! Event distribution to connected viewers.
//!
//! [`BroadcastChannel`] is the subscriber set and fan-out; [`LiveChannel`]
//! wraps it with the live-refresh switch and lazy construction. The actual
//! transport (websocket, SSE, ...) lives outside this crate and talks to a
//! [`SubscriptionHandle`].

pub mod channel;
pub mod live;

use serde::Serialize;

pub use channel::{BroadcastChannel, SubscriberId, SubscriptionHandle};
pub use live::{ChannelOptions, LiveChannel};

/// Event payload: a JSON object.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Name of the event sent after every processed change set.
pub const RELOAD_EVENT: &str = "reload";

/// One named event as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastEvent {
    #[serde(rename = "event")]
    pub name: String,
    pub payload: Payload,
}
