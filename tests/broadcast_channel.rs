use std::sync::Arc;

use preview_live::broadcast::{ChannelOptions, LiveChannel, Payload, RELOAD_EVENT};
use preview_live::engine::LiveContext;
use preview_live_test_utils::builders::SettingsBuilder;
use preview_live_test_utils::fakes::FakeReindexer;

#[test]
fn disabled_live_refresh_builds_nothing() {
    let settings = SettingsBuilder::new().listen(false).auto_refresh(false).build();
    let ctx = LiveContext::new(settings, Arc::new(FakeReindexer::new(0)));

    assert_eq!(ctx.broadcast(RELOAD_EVENT, Payload::new()), 0);
    assert!(ctx.subscribe().is_none());
    assert!(ctx.channel().mount_path().is_none());
    assert!(!ctx.channel().is_constructed());
}

#[tokio::test]
async fn slow_subscriber_is_dropped_without_affecting_others() {
    let channel = LiveChannel::new(
        true,
        ChannelOptions {
            subscriber_buffer: 2,
            ..ChannelOptions::default()
        },
    );
    let slow = channel.subscribe().unwrap();
    let mut fast = channel.subscribe().unwrap();

    for i in 0..3 {
        let mut payload = Payload::new();
        payload.insert("n".into(), i.into());
        channel.broadcast("tick", payload);
        assert!(fast.recv().await.is_some());
    }

    // The third event overflowed the slow queue.
    assert_eq!(channel.subscriber_count(), 1);
    assert_eq!(channel.broadcast("tick", Payload::new()), 1);
    drop(slow);
}

#[tokio::test]
async fn dropped_handle_is_pruned() {
    let channel = LiveChannel::new(true, ChannelOptions::default());
    let sub = channel.subscribe().unwrap();
    assert_eq!(channel.subscriber_count(), 1);

    drop(sub);
    assert_eq!(channel.broadcast(RELOAD_EVENT, Payload::new()), 0);
    assert_eq!(channel.subscriber_count(), 0);
}

#[tokio::test]
async fn custom_events_go_through_the_context() {
    let settings = SettingsBuilder::new().listen(false).build();
    let ctx = LiveContext::new(settings, Arc::new(FakeReindexer::new(0)));
    let mut sub = ctx.subscribe().unwrap();

    let mut payload = Payload::new();
    payload.insert("message".into(), "compiled".into());
    assert_eq!(ctx.broadcast("status", payload.clone()), 1);

    let event = sub.recv().await.unwrap();
    assert_eq!(event.name, "status");
    assert_eq!(event.payload, payload);
    assert_eq!(
        serde_json::to_value(&event).unwrap(),
        serde_json::json!({"event": "status", "payload": {"message": "compiled"}})
    );
}
