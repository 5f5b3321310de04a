//! Rotating tip source.
//!
//! Low priority, sampled: each trigger check passes with a small
//! probability so tips appear occasionally rather than on every sweep.

use greeting_store::Store;
use rand::Rng;

use crate::source::EventSource;
use crate::sources::{ContentVariant, pick_spec};
use crate::types::{ContentSpec, Outcome, PriorityLevel, ScreenPosition, SizeClass};

pub const SOURCE_ID: &str = "random_tip";

pub struct RandomTipSource {
    store: Store,
    probability: f64,
}

impl RandomTipSource {
    pub fn new(store: Store, probability: f64) -> Self {
        Self { store, probability }
    }
}

impl EventSource for RandomTipSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    fn can_trigger(&self) -> bool {
        rand::thread_rng().gen_bool(self.probability)
    }

    fn priority(&self) -> PriorityLevel {
        PriorityLevel::Low
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
        if outcome == Outcome::Clicked {
            tracing::debug!("Tip acknowledged");
        }
    }
}

fn default_variants() -> Vec<ContentVariant> {
    vec![
        ContentVariant {
            texts: vec![
                "Don't mind me, just thinking about naps.".into(),
                "Can't decide if I want to sleep or eat. Or both.".into(),
            ],
            image_url: "/assets/greetings/tip-cat.png".into(),
            position: ScreenPosition::BottomRight,
            size: SizeClass::Medium,
        },
        ContentVariant {
            texts: vec![
                "Just checking in with the crew.".into(),
                "We're all here, ready for anything!".into(),
            ],
            image_url: "/assets/greetings/tip-crew.png".into(),
            position: ScreenPosition::BottomRight,
            size: SizeClass::Medium,
        },
        ContentVariant {
            texts: vec![
                "Hmpf.".into(),
                "This is my resting annoyed face.".into(),
            ],
            image_url: "/assets/greetings/tip-grump.png".into(),
            position: ScreenPosition::BottomLeft,
            size: SizeClass::Medium,
        },
    ]
}
