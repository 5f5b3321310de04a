//! Canonical event sources.
//!
//! Every source follows the same content pattern: a compiled-in default
//! variant table, overridable by a JSON blob persisted under the source's
//! id. Invalid or empty overrides fall back to the defaults.

pub mod inactivity;
pub mod offline;
pub mod random_tip;
pub mod time_of_day;

pub use inactivity::InactivitySource;
pub use offline::OfflineSource;
pub use random_tip::RandomTipSource;
pub use time_of_day::TimeOfDaySource;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::types::{ContentSpec, ScreenPosition, SizeClass};

/// One content variant: interchangeable texts over a single image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentVariant {
    pub texts: Vec<String>,
    pub image_url: String,
    pub position: ScreenPosition,
    pub size: SizeClass,
}

/// Pick a random variant and a random text from it.
pub(crate) fn pick_spec(variants: &[ContentVariant]) -> ContentSpec {
    let mut rng = rand::thread_rng();
    match variants.choose(&mut rng) {
        Some(variant) => ContentSpec {
            image_url: variant.image_url.clone(),
            text_body: variant.texts.choose(&mut rng).cloned().unwrap_or_default(),
            screen_position: variant.position,
            size_class: variant.size,
        },
        // An all-empty table degrades to a skipped display downstream.
        None => ContentSpec {
            image_url: String::new(),
            text_body: String::new(),
            screen_position: ScreenPosition::BottomRight,
            size_class: SizeClass::Medium,
        },
    }
}
