//! Display arbiter: the single authority over the visible slot.
//!
//! Runs as one task draining a message queue plus at most one armed state
//! timer (throttle or cooldown). All competing requests are serialized
//! through the Idle → Throttling → Displaying → Cooldown state machine;
//! the on-screen slot is sequenced only by these states, never by a lock.

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::broker::RequestBroker;
use crate::bus::ResponseBus;
use crate::config::HubConfig;
use crate::presenter::Presenter;
use crate::source::{HideHandle, HoldPolicy};
use crate::surface::SurfaceEvent;
use crate::types::{ArbiterState, DisplayRequest, Outcome, PriorityLevel, QueuedRequest};

/// Messages handled by the arbiter loop. Every continuation carries the
/// content id it was created for and is ignored unless that id is still
/// current.
#[derive(Debug)]
pub enum ArbiterMsg {
    /// A source published a display request.
    Request(DisplayRequest),
    /// Interaction or asset report from the render surface.
    Surface(SurfaceEvent),
    /// The presenter finished the enter sequence; the card is visible.
    Shown { content_id: String },
    /// The hub-timed auto-dismiss timer fired.
    AutoTimeout { content_id: String },
    /// A self-timed source called its hide handle.
    SelfHide { content_id: String },
    /// Debug/introspection snapshot.
    Snapshot(oneshot::Sender<HubSnapshot>),
}

/// Point-in-time view of the arbiter, for debugging and tests.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HubSnapshot {
    pub state: ArbiterState,
    pub queue_len: usize,
    pub queued_sources: Vec<String>,
    pub current_source: Option<String>,
    pub current_content_id: Option<String>,
}

pub struct DisplayArbiter {
    config: HubConfig,
    state: ArbiterState,
    /// Deadline for the throttle or cooldown timer; `None` otherwise.
    deadline: Option<Instant>,
    broker: RequestBroker,
    presenter: Presenter,
    bus: ResponseBus,
    current: Option<QueuedRequest>,
    rx: mpsc::UnboundedReceiver<ArbiterMsg>,
    tx: mpsc::UnboundedSender<ArbiterMsg>,
    shutdown: CancellationToken,
}

impl DisplayArbiter {
    pub fn new(
        config: HubConfig,
        presenter: Presenter,
        bus: ResponseBus,
        rx: mpsc::UnboundedReceiver<ArbiterMsg>,
        tx: mpsc::UnboundedSender<ArbiterMsg>,
        shutdown: CancellationToken,
    ) -> Self {
        let broker = RequestBroker::new(config.max_queue_age, config.max_retries);
        Self {
            config,
            state: ArbiterState::Idle,
            deadline: None,
            broker,
            presenter,
            bus,
            current: None,
            rx,
            tx,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Display arbiter started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                msg = self.rx.recv() => match msg {
                    Some(msg) => self.handle(msg).await,
                    None => break,
                },
                _ = sleep_until(self.deadline.unwrap_or_else(Instant::now)),
                        if self.deadline.is_some() => {
                    self.on_deadline().await;
                }
            }
        }

        if self.presenter.is_active() {
            self.presenter.hide(true).await;
        }
        self.current = None;
        self.broker.clear();
        tracing::info!("Display arbiter stopped");
    }

    async fn handle(&mut self, msg: ArbiterMsg) {
        match msg {
            ArbiterMsg::Request(request) => self.admit(request).await,
            ArbiterMsg::Surface(event) => self.on_surface_event(event).await,
            ArbiterMsg::Shown { content_id } => self.on_shown(&content_id),
            ArbiterMsg::AutoTimeout { content_id } => {
                self.resolve_current(&content_id, Outcome::TimedOut).await;
            }
            ArbiterMsg::SelfHide { content_id } => {
                self.resolve_current(&content_id, Outcome::Dismissed).await;
            }
            ArbiterMsg::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Admission: decide what happens to an incoming request given the
    /// current state. While busy (displaying or cooling down), requests
    /// below High are rejected outright and never queued; the source is
    /// not notified.
    async fn admit(&mut self, request: DisplayRequest) {
        let busy =
            self.state == ArbiterState::Displaying || self.state == ArbiterState::Cooldown;
        if busy && request.priority < PriorityLevel::High {
            tracing::debug!(
                source_id = request.source_id,
                priority = ?request.priority,
                state = ?self.state,
                "Rejecting low-priority request while busy"
            );
            return;
        }

        match self.state {
            ArbiterState::Idle => {
                self.broker.add(QueuedRequest::new(request));
                self.state = ArbiterState::Throttling;
                self.deadline = Some(Instant::now() + self.config.throttle);
                tracing::debug!(
                    throttle_ms = self.config.throttle.as_millis() as u64,
                    "Request while idle, throttling"
                );
            }
            ArbiterState::Throttling => {
                // Coalesce into the pending throttle decision.
                self.broker.add(QueuedRequest::new(request));
            }
            ArbiterState::Displaying => self.contend(request).await,
            ArbiterState::Cooldown => {
                let priority = request.priority;
                self.broker.add(QueuedRequest::new(request));
                if priority == PriorityLevel::Critical {
                    // Critical is the only priority allowed to cut the
                    // cooldown short.
                    if let Some(next) =
                        self.broker.next_valid(ArbiterState::Cooldown, Instant::now())
                    {
                        tracing::info!(
                            source_id = next.source_id(),
                            "Critical request ends cooldown early"
                        );
                        self.deadline = None;
                        self.start_display(next).await;
                    }
                }
            }
        }
    }

    /// Contention against the currently displaying request: strictly
    /// greater priority interrupts immediately, anything else (High or
    /// Critical, already past the busy filter) is requeued with a retry
    /// increment.
    async fn contend(&mut self, request: DisplayRequest) {
        let Some(current) = &self.current else {
            // Displaying with no current request only happens transiently;
            // queue and let the next transition pick it up.
            self.broker.add(QueuedRequest::new(request));
            return;
        };

        if request.priority > current.priority() {
            tracing::info!(
                interrupted = current.source_id(),
                by = request.source_id,
                "Interrupting for higher-priority request"
            );
            // Interrupted attempt gets no outcome; the source is not told.
            self.presenter.hide(true).await;
            self.current = None;
            self.start_display(QueuedRequest::new(request)).await;
        } else {
            tracing::debug!(
                source_id = request.source_id,
                "Cannot interrupt, re-queueing"
            );
            self.broker.requeue(QueuedRequest::new(request));
        }
    }

    async fn on_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::AssetReady { content_id } => {
                self.presenter.asset_settled(&content_id, true);
            }
            SurfaceEvent::AssetFailed { content_id } => {
                self.presenter.asset_settled(&content_id, false);
            }
            SurfaceEvent::Clicked { content_id } => {
                self.resolve_current(&content_id, Outcome::Clicked).await;
            }
            SurfaceEvent::Dismissed { content_id } => {
                self.resolve_current(&content_id, Outcome::Dismissed).await;
            }
        }
    }

    /// The card is visible: hand self-timed sources their hide handle, or
    /// install the priority auto-dismiss timer.
    fn on_shown(&mut self, content_id: &str) {
        let Some(current) = &self.current else {
            return;
        };
        if current.content_id() != content_id {
            tracing::debug!(content_id, "Ignoring shown report for non-current card");
            return;
        }

        match current.request.source.hold() {
            HoldPolicy::SelfTimed => {
                tracing::debug!(
                    source_id = current.source_id(),
                    "Self-timed source owns the display duration"
                );
                let handle = HideHandle::new(self.tx.clone(), content_id.to_string());
                current.request.source.on_shown(handle);
            }
            HoldPolicy::HubTimed => {
                if let Some(timeout) = self.config.auto_dismiss(current.priority()) {
                    self.presenter.arm_auto_dismiss(content_id, timeout);
                }
            }
        }
    }

    /// Resolve the current display, but only if the continuation still
    /// refers to it.
    async fn resolve_current(&mut self, content_id: &str, outcome: Outcome) {
        let matches = self
            .current
            .as_ref()
            .is_some_and(|c| c.content_id() == content_id);
        if !matches {
            tracing::debug!(content_id, "Ignoring resolution for non-current card");
            return;
        }
        let Some(current) = self.current.take() else {
            return;
        };

        tracing::info!(
            source_id = current.source_id(),
            ?outcome,
            "Display resolved"
        );
        self.bus.publish(current.source_id(), outcome);
        self.presenter.hide(false).await;
        self.enter_cooldown().await;
    }

    async fn enter_cooldown(&mut self) {
        self.state = ArbiterState::Cooldown;
        self.deadline = Some(Instant::now() + self.config.cooldown);
        tracing::debug!(
            cooldown_ms = self.config.cooldown.as_millis() as u64,
            "Entering cooldown"
        );

        // A critical request queued earlier (e.g. one that lost contention)
        // does not wait out the cooldown.
        if let Some(next) = self.broker.next_valid(ArbiterState::Cooldown, Instant::now()) {
            tracing::info!(
                source_id = next.source_id(),
                "Queued critical request ends cooldown early"
            );
            self.deadline = None;
            self.start_display(next).await;
        }
    }

    async fn on_deadline(&mut self) {
        self.deadline = None;
        match self.state {
            ArbiterState::Throttling => {
                match self.broker.next_valid(ArbiterState::Throttling, Instant::now()) {
                    Some(next) => self.start_display(next).await,
                    None => {
                        self.state = ArbiterState::Idle;
                        tracing::debug!("Throttle expired with nothing valid to show");
                    }
                }
            }
            ArbiterState::Cooldown => {
                tracing::debug!("Cooldown finished");
                self.state = ArbiterState::Idle;
                self.run_admission();
            }
            // No timer is armed in other states.
            ArbiterState::Idle | ArbiterState::Displaying => {}
        }
    }

    /// Post-idle admission: anything still queued starts a fresh throttle
    /// window before the state ever settles.
    fn run_admission(&mut self) {
        if self.state == ArbiterState::Idle && !self.broker.is_empty() {
            self.state = ArbiterState::Throttling;
            self.deadline = Some(Instant::now() + self.config.throttle);
        }
    }

    async fn start_display(&mut self, request: QueuedRequest) {
        self.state = ArbiterState::Displaying;
        tracing::info!(
            source_id = request.source_id(),
            priority = ?request.priority(),
            "Promoting request to display"
        );

        match self.presenter.display(&request).await {
            Ok(()) => {
                self.current = Some(request);
            }
            Err(e) => {
                // Display failure: abort the attempt, do not retry, degrade
                // to "notification skipped". The source is not notified.
                tracing::error!(
                    source_id = request.source_id(),
                    error = %e,
                    "Failed to display, skipping"
                );
                self.current = None;
                self.state = ArbiterState::Idle;
                self.run_admission();
            }
        }
    }

    fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            state: self.state,
            queue_len: self.broker.len(),
            queued_sources: self.broker.source_ids(),
            current_source: self.current.as_ref().map(|c| c.source_id().to_string()),
            current_content_id: self.current.as_ref().map(|c| c.content_id().to_string()),
        }
    }
}
