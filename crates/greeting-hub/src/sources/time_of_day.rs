//! Time-of-day greeting source.
//!
//! High priority; greets once per cooldown window with a message matching
//! the local hour band. Clicking or dismissing writes a one-hour cooldown
//! marker; a timeout leaves the marker untouched so the greeting retries
//! on the next trigger.

use chrono::{Duration as ChronoDuration, Local, Timelike, Utc};
use greeting_store::Store;
use serde::{Deserialize, Serialize};

use crate::source::EventSource;
use crate::sources::{ContentVariant, pick_spec};
use crate::types::{ContentSpec, Outcome, PriorityLevel, ScreenPosition, SizeClass};

pub const SOURCE_ID: &str = "time_of_day";
const COOLDOWN_MINUTES: i64 = 60;

/// Local-hour band the greeting is chosen from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayBand {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl DayBand {
    pub fn for_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn current() -> Self {
        Self::for_hour(Local::now().hour())
    }
}

/// Variant table keyed by band. Overridable per band; an empty band falls
/// back to the built-in defaults for that band.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GreetingTable {
    #[serde(default)]
    pub morning: Vec<ContentVariant>,
    #[serde(default)]
    pub afternoon: Vec<ContentVariant>,
    #[serde(default)]
    pub evening: Vec<ContentVariant>,
    #[serde(default)]
    pub night: Vec<ContentVariant>,
}

impl GreetingTable {
    fn band(&self, band: DayBand) -> &[ContentVariant] {
        match band {
            DayBand::Morning => &self.morning,
            DayBand::Afternoon => &self.afternoon,
            DayBand::Evening => &self.evening,
            DayBand::Night => &self.night,
        }
    }
}

pub struct TimeOfDaySource {
    store: Store,
}

impl TimeOfDaySource {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn band_variants(&self, band: DayBand) -> Vec<ContentVariant> {
        if let Some(table) = self.store.override_data::<GreetingTable>(SOURCE_ID) {
            let variants = table.band(band);
            if !variants.is_empty() {
                return variants.to_vec();
            }
        }
        default_table().band(band).to_vec()
    }
}

impl EventSource for TimeOfDaySource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    fn can_trigger(&self) -> bool {
        // A store failure must not suppress greetings.
        !self
            .store
            .marker_active(SOURCE_ID, Utc::now())
            .unwrap_or(false)
    }

    fn priority(&self) -> PriorityLevel {
        PriorityLevel::High
    }

    fn content(&self) -> ContentSpec {
        pick_spec(&self.band_variants(DayBand::current()))
    }

    fn on_resolved(&self, outcome: Outcome) {
        if matches!(outcome, Outcome::Clicked | Outcome::Dismissed) {
            let expiry = Utc::now() + ChronoDuration::minutes(COOLDOWN_MINUTES);
            if let Err(e) = self.store.set_marker(SOURCE_ID, expiry) {
                tracing::warn!(error = %e, "Failed to write time-of-day cooldown marker");
            }
        }
    }
}

fn default_table() -> GreetingTable {
    let variant = |texts: &[&str], image_url: &str, position, size| ContentVariant {
        texts: texts.iter().map(|t| t.to_string()).collect(),
        image_url: image_url.to_string(),
        position,
        size,
    };

    GreetingTable {
        morning: vec![
            variant(
                &[
                    "Good morning! Have a great day!",
                    "Rise and shine!",
                    "A new day, a new beginning.",
                ],
                "/assets/greetings/morning.jpg",
                ScreenPosition::TopRight,
                SizeClass::Small,
            ),
            variant(
                &["Morning! Let's make it a good one."],
                "/assets/greetings/morning.jpg",
                ScreenPosition::TopLeft,
                SizeClass::Medium,
            ),
        ],
        afternoon: vec![
            variant(
                &[
                    "Good afternoon! Hope the day is productive.",
                    "Midday check-in. Time for a quick break?",
                ],
                "/assets/greetings/afternoon.jpg",
                ScreenPosition::TopRight,
                SizeClass::Small,
            ),
            variant(
                &["Keep up the good work this afternoon."],
                "/assets/greetings/afternoon.jpg",
                ScreenPosition::BottomRight,
                SizeClass::Medium,
            ),
        ],
        evening: vec![
            variant(
                &[
                    "Evening already. Time to unwind?",
                    "Hope you had a good day!",
                ],
                "/assets/greetings/evening.jpg",
                ScreenPosition::TopRight,
                SizeClass::Small,
            ),
            variant(
                &["Unwind and recharge."],
                "/assets/greetings/evening.jpg",
                ScreenPosition::BottomLeft,
                SizeClass::Medium,
            ),
        ],
        night: vec![variant(
            &[
                "Still up? Maybe call it a night.",
                "Another all-nighter? Get some sleep!",
                "It can wait until tomorrow. Rest up.",
            ],
            "/assets/greetings/night.jpg",
            ScreenPosition::TopRight,
            SizeClass::Small,
        )],
    }
}
