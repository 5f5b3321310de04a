//! Hub wiring: explicit construction and ownership of the core.
//!
//! The hub is built and passed around, never reached for globally.
//! Sources get a [`RequestPublisher`]; the render surface gets a frame
//! subscription and an event injector; shutdown cancels everything.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::arbiter::{ArbiterMsg, DisplayArbiter, HubSnapshot};
use crate::bus::ResponseBus;
use crate::config::HubConfig;
use crate::presenter::Presenter;
use crate::source::{EventSource, RequestPublisher, attach_source};
use crate::surface::{SurfaceEvent, SurfaceFrame};

const FRAME_CHANNEL_CAPACITY: usize = 256;

/// Handle the surface uses to report interactions and asset readiness.
#[derive(Clone)]
pub struct SurfaceReporter {
    tx: mpsc::UnboundedSender<ArbiterMsg>,
}

impl SurfaceReporter {
    pub fn report(&self, event: SurfaceEvent) {
        let _ = self.tx.send(ArbiterMsg::Surface(event));
    }
}

/// A running greeting hub.
pub struct GreetingHub {
    tx: mpsc::UnboundedSender<ArbiterMsg>,
    frames: broadcast::Sender<SurfaceFrame>,
    bus: ResponseBus,
    shutdown: CancellationToken,
    arbiter: JoinHandle<()>,
}

impl GreetingHub {
    /// Build the bus, presenter and arbiter, and spawn the arbiter task.
    pub fn spawn(config: HubConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (frames, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        let bus = ResponseBus::new();
        let shutdown = CancellationToken::new();

        let presenter = Presenter::new(
            frames.clone(),
            tx.clone(),
            config.asset_timeout,
            config.animation,
        );
        let arbiter = DisplayArbiter::new(
            config,
            presenter,
            bus.clone(),
            rx,
            tx.clone(),
            shutdown.child_token(),
        );
        let arbiter = tokio::spawn(arbiter.run());

        Self {
            tx,
            frames,
            bus,
            shutdown,
            arbiter,
        }
    }

    /// Publisher handle for sources.
    pub fn publisher(&self) -> RequestPublisher {
        RequestPublisher::new(self.tx.clone())
    }

    /// Subscribe to the outbound frame stream.
    pub fn subscribe_frames(&self) -> broadcast::Receiver<SurfaceFrame> {
        self.frames.subscribe()
    }

    /// Reporter handle for the render surface.
    pub fn surface_reporter(&self) -> SurfaceReporter {
        SurfaceReporter {
            tx: self.tx.clone(),
        }
    }

    pub fn response_bus(&self) -> &ResponseBus {
        &self.bus
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Register a source: opens its standing response subscription so its
    /// outcomes reach `on_resolved`.
    pub fn attach(&self, source: Arc<dyn EventSource>) -> JoinHandle<()> {
        tracing::info!(source_id = source.id(), "Source attached");
        attach_source(&self.bus, source, self.shutdown.child_token())
    }

    /// Point-in-time view of the arbiter, for debugging and tests.
    pub async fn snapshot(&self) -> Option<HubSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ArbiterMsg::Snapshot(reply)).ok()?;
        rx.await.ok()
    }

    /// Cancel all hub tasks and wait for the arbiter to stop.
    pub async fn shutdown(self) {
        tracing::info!("Hub shutdown requested");
        self.shutdown.cancel();
        let _ = self.arbiter.await;
    }
}
