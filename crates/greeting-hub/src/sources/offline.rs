//! Connectivity-loss source.
//!
//! Watches an external connectivity signal and, while marked offline,
//! can publish a self-timed card. The card holds itself for a fixed
//! duration and then hides via its [`HideHandle`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use greeting_store::Store;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::source::{EventSource, HideHandle, HoldPolicy, RequestPublisher};
use crate::sources::{ContentVariant, pick_spec};
use crate::types::{ContentSpec, Outcome, PriorityLevel, ScreenPosition, SizeClass};

pub const SOURCE_ID: &str = "offline";

/// How long an offline card stays up before it hides itself.
const HOLD: Duration = Duration::from_secs(4);

pub struct OfflineSource {
    store: Store,
    probability: f64,
    online: AtomicBool,
}

impl OfflineSource {
    pub fn new(store: Store, probability: f64) -> Self {
        Self {
            store,
            probability,
            online: AtomicBool::new(true),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Mirror a connectivity watch channel into this source and publish a
    /// request on each transition to offline.
    pub fn watch_connectivity(
        self: Arc<Self>,
        mut rx: watch::Receiver<bool>,
        publisher: RequestPublisher,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.set_online(*rx.borrow());
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        let online = *rx.borrow_and_update();
                        self.set_online(online);
                        tracing::info!(online, "Connectivity changed");
                        if !online {
                            let source: Arc<dyn EventSource> = Arc::clone(&self) as _;
                            publisher.request_display(&source);
                        }
                    }
                }
            }
        })
    }
}

impl EventSource for OfflineSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    fn can_trigger(&self) -> bool {
        !self.is_online() && rand::thread_rng().gen_bool(self.probability)
    }

    fn priority(&self) -> PriorityLevel {
        PriorityLevel::Medium
    }

    fn content(&self) -> ContentSpec {
        let variants = self
            .store
            .override_data::<Vec<ContentVariant>>(SOURCE_ID)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_variants);
        pick_spec(&variants)
    }

    fn on_resolved(&self, outcome: Outcome) {
        tracing::debug!(?outcome, "Offline card resolved");
    }

    fn hold(&self) -> HoldPolicy {
        HoldPolicy::SelfTimed
    }

    fn on_shown(&self, hide: HideHandle) {
        tokio::spawn(async move {
            sleep(HOLD).await;
            hide.hide();
        });
    }
}

fn default_variants() -> Vec<ContentVariant> {
    vec![
        ContentVariant {
            texts: vec![
                "Looks like the network went out for a walk.".into(),
                "Offline. The cards still work, promise.".into(),
            ],
            image_url: "/assets/greetings/offline.png".into(),
            position: ScreenPosition::TopRight,
            size: SizeClass::Small,
        },
        ContentVariant {
            texts: vec!["No connection. Deep breaths.".into()],
            image_url: "/assets/greetings/offline-calm.png".into(),
            position: ScreenPosition::TopRight,
            size: SizeClass::Small,
        },
    ]
}
