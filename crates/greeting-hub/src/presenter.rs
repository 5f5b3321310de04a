//! Presenter: owns the single visible card.
//!
//! Sequences one card through mount → asset wait → enter animation →
//! visible → (auto-dismiss) and back out through exit animation → unmount.
//! Every continuation is a cancellable task that reports back to the
//! arbiter with the content id it belongs to.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, broadcast, mpsc};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::arbiter::ArbiterMsg;
use crate::surface::{CardFrame, CardPhase, SurfaceFrame};
use crate::types::QueuedRequest;

/// Failure while building or inserting a card. The arbiter aborts the
/// attempt; the request is not retried.
#[derive(Debug, thiserror::Error)]
pub enum PresentError {
    #[error("card has no renderable content")]
    EmptyContent,
}

struct ActiveCard {
    content_id: String,
    /// Cancels the pending sequence and auto-dismiss continuations.
    cancel: CancellationToken,
    asset_ready: Arc<Notify>,
}

pub struct Presenter {
    frames: broadcast::Sender<SurfaceFrame>,
    feedback: mpsc::UnboundedSender<ArbiterMsg>,
    asset_timeout: Duration,
    animation: Duration,
    active: Option<ActiveCard>,
}

impl Presenter {
    pub fn new(
        frames: broadcast::Sender<SurfaceFrame>,
        feedback: mpsc::UnboundedSender<ArbiterMsg>,
        asset_timeout: Duration,
        animation: Duration,
    ) -> Self {
        Self {
            frames,
            feedback,
            asset_timeout,
            animation,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Mount a card and start its display sequence. At most one card is
    /// visible at a time; a conflicting call tears down the existing card
    /// first.
    pub async fn display(&mut self, request: &QueuedRequest) -> Result<(), PresentError> {
        if self.active.is_some() {
            tracing::warn!(
                content_id = request.content_id(),
                "Display while a card is active, tearing down the existing one"
            );
            self.hide(true).await;
        }

        let card = CardFrame::build(request, self.animation.as_millis() as u64);
        if card.text_body.is_empty() && card.image_url.is_empty() {
            return Err(PresentError::EmptyContent);
        }

        let content_id = card.content_id.clone();
        let has_asset = card.has_asset();
        let cancel = CancellationToken::new();
        let asset_ready = Arc::new(Notify::new());

        // Mounted hidden; the sequence task reveals it.
        let _ = self.frames.send(SurfaceFrame::Mount { card });
        tracing::debug!(content_id, "Card mounted");

        self.spawn_sequence(content_id.clone(), has_asset, cancel.clone(), asset_ready.clone());

        self.active = Some(ActiveCard {
            content_id,
            cancel,
            asset_ready,
        });
        Ok(())
    }

    /// Asset load report from the surface. Load failure is non-fatal; the
    /// card is shown either way.
    pub fn asset_settled(&self, content_id: &str, loaded: bool) {
        let Some(active) = &self.active else {
            return;
        };
        if active.content_id != content_id {
            tracing::debug!(content_id, "Ignoring asset report for non-current card");
            return;
        }
        if !loaded {
            tracing::warn!(content_id, "Image failed to load, showing anyway");
        }
        active.asset_ready.notify_one();
    }

    /// Install the auto-dismiss timer for a hub-timed card.
    pub fn arm_auto_dismiss(&self, content_id: &str, timeout: Duration) {
        let Some(active) = &self.active else {
            return;
        };
        if active.content_id != content_id {
            return;
        }

        let cancel = active.cancel.clone();
        let feedback = self.feedback.clone();
        let content_id = content_id.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sleep(timeout) => {
                    let _ = feedback.send(ArbiterMsg::AutoTimeout { content_id });
                }
            }
        });
    }

    /// Run the exit animation and release the slot. Cancels any pending
    /// sequence or auto-dismiss continuation first so superseded timers
    /// never fire.
    pub async fn hide(&mut self, interrupted: bool) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.cancel.cancel();

        if interrupted {
            tracing::info!(content_id = %active.content_id, "Card interrupted");
        }

        let _ = self.frames.send(SurfaceFrame::Phase {
            content_id: active.content_id.clone(),
            phase: CardPhase::Exiting,
        });
        sleep(self.animation).await;
        let _ = self.frames.send(SurfaceFrame::Unmount {
            content_id: active.content_id.clone(),
        });
        tracing::debug!(content_id = %active.content_id, "Card removed");
    }

    /// Asset wait → enter animation → visible → report shown.
    fn spawn_sequence(
        &self,
        content_id: String,
        has_asset: bool,
        cancel: CancellationToken,
        asset_ready: Arc<Notify>,
    ) {
        let frames = self.frames.clone();
        let feedback = self.feedback.clone();
        let asset_timeout = self.asset_timeout;
        let animation = self.animation;

        tokio::spawn(async move {
            let sequence = async {
                if has_asset {
                    let waited =
                        tokio::time::timeout(asset_timeout, asset_ready.notified()).await;
                    if waited.is_err() {
                        tracing::warn!(content_id, "Asset wait timed out, showing anyway");
                    }
                }

                let _ = frames.send(SurfaceFrame::Phase {
                    content_id: content_id.clone(),
                    phase: CardPhase::Entering,
                });
                sleep(animation).await;
                let _ = frames.send(SurfaceFrame::Phase {
                    content_id: content_id.clone(),
                    phase: CardPhase::Visible,
                });
                let _ = feedback.send(ArbiterMsg::Shown {
                    content_id: content_id.clone(),
                });
            };

            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sequence => {}
            }
        });
    }
}
