//! Core type definitions for the greeting hub.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::source::EventSource;

/// Priority of a display request. Higher variants win contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Where on the screen a greeting card is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    CenterLeft,
    CenterRight,
    Center,
}

/// Size class of a greeting card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

impl SizeClass {
    /// Maximum card height as a viewport-height percentage.
    pub fn max_height_vh(self) -> u8 {
        match self {
            Self::Small => 20,
            Self::Medium => 25,
            Self::Large => 40,
        }
    }
}

/// Content a source wants shown, before the hub assigns an instance id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSpec {
    pub image_url: String,
    pub text_body: String,
    pub screen_position: ScreenPosition,
    pub size_class: SizeClass,
}

impl ContentSpec {
    pub fn into_payload(self, id: String) -> ContentPayload {
        ContentPayload {
            id,
            image_url: self.image_url,
            text_body: self.text_body,
            screen_position: self.screen_position,
            size_class: self.size_class,
        }
    }
}

/// Renderable content with a per-instance unique id.
///
/// The id is unique per request instance so continuations for a request
/// that is no longer current can be safely ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPayload {
    pub id: String,
    pub image_url: String,
    pub text_body: String,
    pub screen_position: ScreenPosition,
    pub size_class: SizeClass,
}

/// A pending ask from a source to show one greeting.
#[derive(Clone)]
pub struct DisplayRequest {
    pub source_id: String,
    pub priority: PriorityLevel,
    pub content: ContentPayload,
    pub submitted_at: Instant,
    /// Back-reference to the owning source, used for the self-timed hide
    /// hook and never serialized.
    pub source: Arc<dyn EventSource>,
}

impl fmt::Debug for DisplayRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayRequest")
            .field("source_id", &self.source_id)
            .field("priority", &self.priority)
            .field("content_id", &self.content.id)
            .finish_non_exhaustive()
    }
}

/// A request while owned by the broker or, once dequeued, by the arbiter.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub request: DisplayRequest,
    pub retry_count: u32,
}

impl QueuedRequest {
    pub fn new(request: DisplayRequest) -> Self {
        Self {
            request,
            retry_count: 0,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.request.source_id
    }

    pub fn content_id(&self) -> &str {
        &self.request.content.id
    }

    pub fn priority(&self) -> PriorityLevel {
        self.request.priority
    }

    pub fn submitted_at(&self) -> Instant {
        self.request.submitted_at
    }
}

/// Resolution of a displayed greeting, as seen by its source.
///
/// These three are the only values that ever cross the response bus;
/// discards and failures are invisible to sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Clicked,
    Dismissed,
    TimedOut,
}

/// Arbiter state. Exactly one request is current while `Displaying`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbiterState {
    Idle,
    Throttling,
    Displaying,
    Cooldown,
}
