//! Admission, queueing and contention behavior.

use std::time::Duration;

use tokio::time::sleep;

use super::{
    TestSource, current_content_id, publish, publish_again, settle, spawn_hub, wait_for_frame,
    wait_for_mount,
};
use crate::surface::{CardPhase, SurfaceEvent, SurfaceFrame};
use crate::types::{ArbiterState, PriorityLevel};

#[tokio::test(start_paused = true)]
async fn idle_request_throttles_then_displays() {
    let hub = spawn_hub();
    let mut frames = hub.subscribe_frames();
    let source = TestSource::new("greeter", PriorityLevel::Medium);
    assert!(publish(&hub, &source));

    settle().await;
    let snap = hub.snapshot().await.unwrap();
    assert_eq!(snap.state, ArbiterState::Throttling);
    assert_eq!(snap.queue_len, 1);

    let content_id = wait_for_mount(&mut frames).await;
    assert!(content_id.starts_with("greeter_"));
    wait_for_frame(&mut frames, |f| {
        matches!(
            f,
            SurfaceFrame::Phase {
                phase: CardPhase::Visible,
                ..
            }
        )
    })
    .await;

    let snap = hub.snapshot().await.unwrap();
    assert_eq!(snap.state, ArbiterState::Displaying);
    assert_eq!(snap.current_source.as_deref(), Some("greeter"));
    assert_eq!(snap.queue_len, 0);
    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn higher_priority_wins_the_throttle_window() {
    let hub = spawn_hub();
    let mut frames = hub.subscribe_frames();
    let low = TestSource::new("low_src", PriorityLevel::Low);
    let high = TestSource::new("high_src", PriorityLevel::High);

    publish(&hub, &low);
    sleep(Duration::from_millis(10)).await;
    publish(&hub, &high);

    let content_id = wait_for_mount(&mut frames).await;
    assert!(content_id.starts_with("high_src_"));

    // The earlier low request is still queued behind it.
    let snap = hub.snapshot().await.unwrap();
    assert_eq!(snap.current_source.as_deref(), Some("high_src"));
    assert_eq!(snap.queued_sources, vec!["low_src".to_string()]);
    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn equal_priority_serves_in_submission_order() {
    let hub = spawn_hub();
    let mut frames = hub.subscribe_frames();
    let first = TestSource::new("first_src", PriorityLevel::Medium);
    let second = TestSource::new("second_src", PriorityLevel::Medium);

    publish(&hub, &first);
    sleep(Duration::from_millis(10)).await;
    publish(&hub, &second);

    let content_id = wait_for_mount(&mut frames).await;
    assert!(content_id.starts_with("first_src_"));
    let snap = hub.snapshot().await.unwrap();
    assert_eq!(snap.queued_sources, vec!["second_src".to_string()]);
    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn busy_rejects_below_high_outright() {
    let hub = spawn_hub();
    let mut frames = hub.subscribe_frames();
    let showing = TestSource::new("showing", PriorityLevel::Medium);
    publish(&hub, &showing);
    wait_for_mount(&mut frames).await;

    // A second medium during display is dropped, not queued.
    let late = TestSource::new("late", PriorityLevel::Medium);
    publish(&hub, &late);
    settle().await;

    let snap = hub.snapshot().await.unwrap();
    assert_eq!(snap.state, ArbiterState::Displaying);
    assert_eq!(snap.current_source.as_deref(), Some("showing"));
    assert_eq!(snap.queue_len, 0);
    assert!(late.outcomes().is_empty());
    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn high_waits_out_the_cooldown() {
    let hub = spawn_hub();
    let mut frames = hub.subscribe_frames();
    let reporter = hub.surface_reporter();
    let showing = TestSource::new("showing", PriorityLevel::Medium);
    publish(&hub, &showing);
    wait_for_mount(&mut frames).await;
    wait_for_frame(&mut frames, |f| {
        matches!(
            f,
            SurfaceFrame::Phase {
                phase: CardPhase::Visible,
                ..
            }
        )
    })
    .await;

    let content_id = current_content_id(&hub).await;
    reporter.report(SurfaceEvent::Clicked { content_id });
    settle().await;
    assert_eq!(showing.outcomes(), vec![crate::types::Outcome::Clicked]);

    let high = TestSource::new("urgent", PriorityLevel::High);
    publish(&hub, &high);
    settle().await;

    // High is admitted while cooling down but does not cut the cooldown.
    let snap = hub.snapshot().await.unwrap();
    assert_eq!(snap.state, ArbiterState::Cooldown);
    assert_eq!(snap.queued_sources, vec!["urgent".to_string()]);

    // Cooldown expiry rolls straight into a fresh throttle window.
    let content_id = wait_for_mount(&mut frames).await;
    assert!(content_id.starts_with("urgent_"));
    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn critical_interrupts_without_resolving_the_victim() {
    let hub = spawn_hub();
    let mut frames = hub.subscribe_frames();
    let low = TestSource::new("background", PriorityLevel::Low);
    publish(&hub, &low);
    wait_for_mount(&mut frames).await;

    let critical = TestSource::new("alert", PriorityLevel::Critical);
    publish(&hub, &critical);

    let content_id = wait_for_mount(&mut frames).await;
    assert!(content_id.starts_with("alert_"));

    // The interrupted request resolves to nothing.
    assert!(low.outcomes().is_empty());

    // Critical cards are never auto-dismissed.
    sleep(Duration::from_secs(60)).await;
    let snap = hub.snapshot().await.unwrap();
    assert_eq!(snap.state, ArbiterState::Displaying);
    assert_eq!(snap.current_source.as_deref(), Some("alert"));
    assert!(critical.outcomes().is_empty());
    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn equal_priority_contender_is_requeued() {
    let hub = spawn_hub();
    let mut frames = hub.subscribe_frames();
    let first = TestSource::new("first_high", PriorityLevel::High);
    publish(&hub, &first);
    wait_for_mount(&mut frames).await;

    let second = TestSource::new("second_high", PriorityLevel::High);
    publish(&hub, &second);
    settle().await;

    // Equal priority cannot interrupt; it waits in the queue.
    let snap = hub.snapshot().await.unwrap();
    assert_eq!(snap.current_source.as_deref(), Some("first_high"));
    assert_eq!(snap.queued_sources, vec!["second_high".to_string()]);
    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn repeated_contender_keeps_one_queued_entry() {
    let hub = spawn_hub();
    let mut frames = hub.subscribe_frames();
    let blocker = TestSource::new("blocker", PriorityLevel::Critical);
    publish(&hub, &blocker);
    wait_for_mount(&mut frames).await;

    // Publishing twice while outranked requeues twice; the source must
    // still hold exactly one entry, carrying the newer content.
    let urgent = TestSource::new("urgent", PriorityLevel::High);
    urgent.set_text("first try");
    publish(&hub, &urgent);
    urgent.set_text("second try");
    publish_again(&hub, &urgent);
    settle().await;

    let snap = hub.snapshot().await.unwrap();
    assert_eq!(snap.queued_sources, vec!["urgent".to_string()]);

    let content_id = current_content_id(&hub).await;
    hub.surface_reporter()
        .report(SurfaceEvent::Clicked { content_id });

    let frame = wait_for_frame(&mut frames, |f| matches!(f, SurfaceFrame::Mount { .. })).await;
    let SurfaceFrame::Mount { card } = frame else {
        unreachable!();
    };
    assert_eq!(card.text_body, "second try");
    assert_eq!(hub.snapshot().await.unwrap().queue_len, 0);
    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn critical_cuts_the_cooldown_short() {
    let hub = spawn_hub();
    let mut frames = hub.subscribe_frames();
    let reporter = hub.surface_reporter();
    let showing = TestSource::new("showing", PriorityLevel::Medium);
    publish(&hub, &showing);
    wait_for_mount(&mut frames).await;
    wait_for_frame(&mut frames, |f| {
        matches!(
            f,
            SurfaceFrame::Phase {
                phase: CardPhase::Visible,
                ..
            }
        )
    })
    .await;

    let content_id = current_content_id(&hub).await;
    reporter.report(SurfaceEvent::Dismissed { content_id });
    settle().await;
    let snap = hub.snapshot().await.unwrap();
    assert_eq!(snap.state, ArbiterState::Cooldown);

    let critical = TestSource::new("alert", PriorityLevel::Critical);
    publish(&hub, &critical);
    settle().await;

    let snap = hub.snapshot().await.unwrap();
    assert_eq!(snap.state, ArbiterState::Displaying);
    assert_eq!(snap.current_source.as_deref(), Some("alert"));
    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stale_requests_are_dropped_unserved() {
    let hub = spawn_hub();
    let mut frames = hub.subscribe_frames();
    let reporter = hub.surface_reporter();
    let blocker = TestSource::new("blocker", PriorityLevel::Critical);
    publish(&hub, &blocker);
    wait_for_mount(&mut frames).await;

    let waiting = TestSource::new("waiting", PriorityLevel::High);
    publish(&hub, &waiting);
    settle().await;
    assert_eq!(hub.snapshot().await.unwrap().queue_len, 1);

    // Outlive the queue age, then free the slot.
    sleep(Duration::from_secs(121)).await;
    let content_id = current_content_id(&hub).await;
    reporter.report(SurfaceEvent::Clicked { content_id });

    sleep(Duration::from_secs(10)).await;
    let snap = hub.snapshot().await.unwrap();
    assert_eq!(snap.state, ArbiterState::Idle);
    assert_eq!(snap.queue_len, 0);
    assert!(waiting.outcomes().is_empty());
    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn same_source_replaces_its_queued_request() {
    let hub = spawn_hub();
    let mut frames = hub.subscribe_frames();
    let source = TestSource::new("greeter", PriorityLevel::Medium);

    source.set_text("first attempt");
    publish(&hub, &source);
    source.set_text("second attempt");
    publish_again(&hub, &source);
    settle().await;
    assert_eq!(hub.snapshot().await.unwrap().queue_len, 1);

    let frame = wait_for_frame(&mut frames, |f| matches!(f, SurfaceFrame::Mount { .. })).await;
    let SurfaceFrame::Mount { card } = frame else {
        unreachable!();
    };
    assert_eq!(card.text_body, "second attempt");
    hub.shutdown().await;
}
