//! Inactivity nag source.
//!
//! Tracks the last observed user activity and, once idle past the
//! threshold, occasionally asks to show a nag. Any resolution writes a
//! ten-minute cooldown marker so the nag does not repeat immediately.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use greeting_store::Store;
use rand::Rng;
use tokio::time::Instant;

use crate::source::EventSource;
use crate::sources::{ContentVariant, pick_spec};
use crate::types::{ContentSpec, Outcome, PriorityLevel, ScreenPosition, SizeClass};

pub const SOURCE_ID: &str = "inactivity";
const COOLDOWN_MINUTES: i64 = 10;

pub struct InactivitySource {
    store: Store,
    last_activity: Mutex<Instant>,
    idle_after: Duration,
    probability: f64,
}

impl InactivitySource {
    pub fn new(store: Store, idle_after: Duration, probability: f64) -> Self {
        Self {
            store,
            last_activity: Mutex::new(Instant::now()),
            idle_after,
            probability,
        }
    }

    /// Record observed user activity, resetting the idle clock.
    pub fn note_activity(&self) {
        let mut last = self.last_activity.lock().unwrap_or_else(|e| e.into_inner());
        *last = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        let last = self.last_activity.lock().unwrap_or_else(|e| e.into_inner());
        last.elapsed()
    }
}

impl EventSource for InactivitySource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    fn can_trigger(&self) -> bool {
        if self.idle_for() < self.idle_after {
            return false;
        }
        if self
            .store
            .marker_active(SOURCE_ID, Utc::now())
            .unwrap_or(false)
        {
            return false;
        }
        rand::thread_rng().gen_bool(self.probability)
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

    fn on_resolved(&self, _outcome: Outcome) {
        let expiry = Utc::now() + ChronoDuration::minutes(COOLDOWN_MINUTES);
        if let Err(e) = self.store.set_marker(SOURCE_ID, expiry) {
            tracing::warn!(error = %e, "Failed to write inactivity cooldown marker");
        }
    }
}

fn default_variants() -> Vec<ContentVariant> {
    vec![
        ContentVariant {
            texts: vec![
                "Still there? The page misses you.".into(),
                "I'm not lazy, I'm on energy-saving mode.".into(),
                "My only goal today is to remain completely still.".into(),
            ],
            image_url: "/assets/greetings/idle.png".into(),
            position: ScreenPosition::BottomRight,
            size: SizeClass::Medium,
        },
        ContentVariant {
            texts: vec![
                "Bro, are you sure you are awake?".into(),
                "You sure are lazier than I am!".into(),
            ],
            image_url: "/assets/greetings/idle-alt.png".into(),
            position: ScreenPosition::TopLeft,
            size: SizeClass::Small,
        },
    ]
}
