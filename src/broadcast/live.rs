// src/broadcast/live.rs

use std::sync::OnceLock;

use tracing::{debug, info};

use super::channel::{BroadcastChannel, SubscriptionHandle};
use super::Payload;

/// Settings the channel is built with on first use.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Per-subscriber queue length.
    pub subscriber_buffer: usize,
    /// Path the external transport mounts the channel under; informational.
    pub mount_path: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            subscriber_buffer: 64,
            mount_path: "/live".to_string(),
        }
    }
}

/// The live-refresh endpoint of one context.
///
/// The underlying [`BroadcastChannel`] is only constructed the first time
/// someone broadcasts or subscribes, and never when live-refresh is
/// disabled. Construction goes through a `OnceLock`, so concurrent first
/// uses still end up sharing a single channel.
#[derive(Debug)]
pub struct LiveChannel {
    enabled: bool,
    options: ChannelOptions,
    channel: OnceLock<BroadcastChannel>,
}

impl LiveChannel {
    pub fn new(enabled: bool, options: ChannelOptions) -> Self {
        Self {
            enabled,
            options,
            channel: OnceLock::new(),
        }
    }

    /// A channel with live-refresh switched off.
    pub fn disabled() -> Self {
        Self::new(false, ChannelOptions::default())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the underlying channel has been built yet.
    pub fn is_constructed(&self) -> bool {
        self.channel.get().is_some()
    }

    /// Mount path for the transport, or `None` when live-refresh is off.
    pub fn mount_path(&self) -> Option<&str> {
        self.enabled.then_some(self.options.mount_path.as_str())
    }

    fn channel(&self) -> &BroadcastChannel {
        self.channel.get_or_init(|| {
            info!(
                mount_path = %self.options.mount_path,
                buffer = self.options.subscriber_buffer,
                "live-refresh channel constructed"
            );
            BroadcastChannel::new(self.options.subscriber_buffer)
        })
    }

    /// Broadcast to every subscriber. A no-op returning 0 when live-refresh
    /// is disabled.
    pub fn broadcast(&self, name: &str, payload: Payload) -> usize {
        if !self.enabled {
            debug!(event = %name, "live-refresh disabled; broadcast skipped");
            return 0;
        }
        self.channel().broadcast(name, payload)
    }

    /// Attach a subscriber, or `None` when live-refresh is disabled.
    pub fn subscribe(&self) -> Option<SubscriptionHandle> {
        if !self.enabled {
            return None;
        }
        Some(self.channel().subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.channel
            .get()
            .map_or(0, BroadcastChannel::subscriber_count)
    }

    /// Detach every subscriber. Does not construct the channel.
    pub fn close(&self) {
        if let Some(channel) = self.channel.get() {
            channel.close();
        }
    }
}
