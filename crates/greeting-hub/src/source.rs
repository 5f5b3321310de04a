//! Event source contract and plumbing.
//!
//! Sources run fully independently: they decide locally when to publish a
//! display request, and hear back only through their response-bus
//! subscription. The hub calls into a source only via `on_resolved` and,
//! for self-timed sources, `on_shown`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::arbiter::ArbiterMsg;
use crate::bus::ResponseBus;
use crate::types::{ContentSpec, DisplayRequest, Outcome, PriorityLevel};

/// Who owns a card's display duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldPolicy {
    /// The hub applies the priority-based auto-dismiss timeout.
    HubTimed,
    /// The source receives a [`HideHandle`] in `on_shown` and must call
    /// `hide` exactly once. No hub-imposed ceiling applies.
    SelfTimed,
}

/// One-shot hide callback handed to a self-timed source.
///
/// Consuming `hide` guarantees at most one call; a hide for a card that is
/// no longer current is ignored by the arbiter.
pub struct HideHandle {
    tx: mpsc::UnboundedSender<ArbiterMsg>,
    content_id: String,
}

impl HideHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<ArbiterMsg>, content_id: String) -> Self {
        Self { tx, content_id }
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn hide(self) {
        let _ = self.tx.send(ArbiterMsg::SelfHide {
            content_id: self.content_id,
        });
    }
}

impl std::fmt::Debug for HideHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HideHandle")
            .field("content_id", &self.content_id)
            .finish()
    }
}

/// An independent producer of display requests.
pub trait EventSource: Send + Sync + 'static {
    /// Stable identifier, also the response-bus topic.
    fn id(&self) -> &str;

    /// Whether the source's trigger condition currently holds. May consult
    /// cooldown markers, sampling, or environment signals.
    fn can_trigger(&self) -> bool;

    fn priority(&self) -> PriorityLevel;

    /// Content to show. The instance id is assigned by the publish helper,
    /// never by the source.
    fn content(&self) -> ContentSpec;

    /// Resolution feedback, typically used to write a cooldown marker.
    fn on_resolved(&self, outcome: Outcome);

    fn hold(&self) -> HoldPolicy {
        HoldPolicy::HubTimed
    }

    /// Called once the card is visible, only for `SelfTimed` sources.
    fn on_shown(&self, hide: HideHandle) {
        drop(hide);
    }
}

/// Handle sources use to publish display requests.
#[derive(Clone)]
pub struct RequestPublisher {
    tx: mpsc::UnboundedSender<ArbiterMsg>,
}

impl RequestPublisher {
    pub(crate) fn new(tx: mpsc::UnboundedSender<ArbiterMsg>) -> Self {
        Self { tx }
    }

    /// Check the source's trigger condition and, if it holds, publish a
    /// display request with a fresh unique content id. Returns whether a
    /// request was published.
    pub fn request_display(&self, source: &Arc<dyn EventSource>) -> bool {
        if !source.can_trigger() {
            tracing::debug!(source_id = source.id(), "Trigger condition not met");
            return false;
        }

        let content_id = format!("{}_{}", source.id(), nanoid::nanoid!(10));
        let request = DisplayRequest {
            source_id: source.id().to_string(),
            priority: source.priority(),
            content: source.content().into_payload(content_id),
            submitted_at: Instant::now(),
            source: Arc::clone(source),
        };

        tracing::debug!(
            source_id = request.source_id,
            priority = ?request.priority,
            "Publishing display request"
        );
        self.tx.send(ArbiterMsg::Request(request)).is_ok()
    }
}

/// Open the source's standing response subscription: outcomes published
/// under its id are delivered to `on_resolved` until shutdown.
pub fn attach_source(
    bus: &ResponseBus,
    source: Arc<dyn EventSource>,
    token: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe(source.id());
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                outcome = rx.recv() => match outcome {
                    Some(outcome) => {
                        tracing::debug!(source_id = source.id(), ?outcome, "Outcome delivered");
                        source.on_resolved(outcome);
                    }
                    None => break,
                },
            }
        }
    })
}

/// When a source publishes on its own clock.
#[derive(Debug, Clone, Copy)]
pub struct TriggerPlan {
    pub initial_delay: Duration,
    pub repeat: Option<Duration>,
}

impl TriggerPlan {
    pub fn once_after(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            repeat: None,
        }
    }

    pub fn every(initial_delay: Duration, repeat: Duration) -> Self {
        Self {
            initial_delay,
            repeat: Some(repeat),
        }
    }
}

pub(crate) async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => true,
        _ = sleep(duration) => false,
    }
}

/// Drive a source's trigger plan: publish after the initial delay, then
/// optionally on every repeat interval, until shutdown.
pub fn run_trigger_loop(
    source: Arc<dyn EventSource>,
    publisher: RequestPublisher,
    plan: TriggerPlan,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if sleep_or_cancel(&token, plan.initial_delay).await {
            return;
        }
        publisher.request_display(&source);

        let Some(every) = plan.repeat else {
            return;
        };
        loop {
            if sleep_or_cancel(&token, every).await {
                tracing::debug!(source_id = source.id(), "Trigger loop stopped");
                return;
            }
            publisher.request_display(&source);
        }
    })
}
