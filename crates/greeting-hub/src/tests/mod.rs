//! End-to-end scheduling tests over a running hub.
//!
//! All tests run under paused virtual time, so throttle, cooldown and
//! dismiss timers elapse instantly and deterministically.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::sleep;

use crate::hub::GreetingHub;
use crate::source::{EventSource, HideHandle, HoldPolicy};
use crate::surface::SurfaceFrame;
use crate::types::{ContentSpec, Outcome, PriorityLevel, ScreenPosition, SizeClass};

mod scheduling;

/// Scripted source: always willing to trigger, records every outcome,
/// and for self-timed tests parks its hide handle for the test to use.
struct TestSource {
    id: String,
    priority: PriorityLevel,
    hold: HoldPolicy,
    text: Mutex<String>,
    image_url: String,
    outcomes: Mutex<Vec<Outcome>>,
    hide: Mutex<Option<HideHandle>>,
}

impl TestSource {
    fn base(id: &str, priority: PriorityLevel) -> Self {
        Self {
            id: id.to_string(),
            priority,
            hold: HoldPolicy::HubTimed,
            text: Mutex::new(format!("hello from {id}")),
            image_url: String::new(),
            outcomes: Mutex::new(Vec::new()),
            hide: Mutex::new(None),
        }
    }

    fn new(id: &str, priority: PriorityLevel) -> Arc<Self> {
        Arc::new(Self::base(id, priority))
    }

    fn self_timed(id: &str, priority: PriorityLevel) -> Arc<Self> {
        Arc::new(Self {
            hold: HoldPolicy::SelfTimed,
            ..Self::base(id, priority)
        })
    }

    fn with_image(id: &str, priority: PriorityLevel) -> Arc<Self> {
        Arc::new(Self {
            image_url: "/assets/test.png".to_string(),
            ..Self::base(id, priority)
        })
    }

    fn empty(id: &str, priority: PriorityLevel) -> Arc<Self> {
        let source = Self::new(id, priority);
        source.set_text("");
        source
    }

    fn set_text(&self, text: &str) {
        *self.text.lock().unwrap() = text.to_string();
    }

    fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.lock().unwrap().clone()
    }

    fn take_hide(&self) -> Option<HideHandle> {
        self.hide.lock().unwrap().take()
    }
}

impl EventSource for TestSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn can_trigger(&self) -> bool {
        true
    }

    fn priority(&self) -> PriorityLevel {
        self.priority
    }

    fn content(&self) -> ContentSpec {
        ContentSpec {
            image_url: self.image_url.clone(),
            text_body: self.text.lock().unwrap().clone(),
            screen_position: ScreenPosition::BottomRight,
            size_class: SizeClass::Medium,
        }
    }

    fn on_resolved(&self, outcome: Outcome) {
        self.outcomes.lock().unwrap().push(outcome);
    }

    fn hold(&self) -> HoldPolicy {
        self.hold
    }

    fn on_shown(&self, hide: HideHandle) {
        *self.hide.lock().unwrap() = Some(hide);
    }
}

fn spawn_hub() -> GreetingHub {
    GreetingHub::spawn(crate::config::HubConfig::default())
}

/// Attach a source and publish one request from it.
fn publish(hub: &GreetingHub, source: &Arc<TestSource>) -> bool {
    hub.attach(source.clone());
    let src: Arc<dyn EventSource> = source.clone();
    hub.publisher().request_display(&src)
}

/// Publish again without re-attaching.
fn publish_again(hub: &GreetingHub, source: &Arc<TestSource>) -> bool {
    let src: Arc<dyn EventSource> = source.clone();
    hub.publisher().request_display(&src)
}

/// Let queued messages drain and virtual time advance a hair.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

/// Receive frames until `pred` matches. Panics after ten virtual minutes.
async fn wait_for_frame<F>(rx: &mut broadcast::Receiver<SurfaceFrame>, pred: F) -> SurfaceFrame
where
    F: Fn(&SurfaceFrame) -> bool,
{
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            let frame = rx.recv().await.expect("frame stream closed");
            if pred(&frame) {
                return frame;
            }
        }
    })
    .await
    .expect("frame never arrived")
}

async fn wait_for_mount(rx: &mut broadcast::Receiver<SurfaceFrame>) -> String {
    let frame = wait_for_frame(rx, |f| matches!(f, SurfaceFrame::Mount { .. })).await;
    match frame {
        SurfaceFrame::Mount { card } => card.content_id,
        _ => unreachable!(),
    }
}

async fn current_content_id(hub: &GreetingHub) -> String {
    hub.snapshot()
        .await
        .expect("arbiter gone")
        .current_content_id
        .expect("nothing displaying")
}
