//! Wire protocol between the presenter and the render surface.
//!
//! The presenter pushes typed frames over a broadcast channel; whatever
//! frontend is attached (overlay page, demo logger, test harness) renders
//! them and reports interactions and asset readiness back as events.

use serde::{Deserialize, Serialize};

use crate::types::{ContentPayload, PriorityLevel, QueuedRequest, ScreenPosition, SizeClass};

/// Outbound frame describing what the surface should do.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceFrame {
    /// Insert the card, initially hidden.
    Mount { card: CardFrame },
    /// Advance the card's animation phase.
    Phase {
        content_id: String,
        phase: CardPhase,
    },
    /// Remove the card.
    Unmount { content_id: String },
}

/// Animation phase of a mounted card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardPhase {
    Hidden,
    Entering,
    Visible,
    Exiting,
}

/// Inbound event from the surface. Every event names the content id it
/// belongs to so stale reports are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceEvent {
    AssetReady { content_id: String },
    AssetFailed { content_id: String },
    Clicked { content_id: String },
    Dismissed { content_id: String },
}

impl SurfaceEvent {
    pub fn content_id(&self) -> &str {
        match self {
            Self::AssetReady { content_id }
            | Self::AssetFailed { content_id }
            | Self::Clicked { content_id }
            | Self::Dismissed { content_id } => content_id,
        }
    }
}

/// Enter/exit motion, derived from the card's screen position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardMotion {
    /// Top anchors slide in from above.
    SlideFromTop,
    /// Bottom anchors slide in from below.
    SlideFromBottom,
    SlideFromLeft,
    SlideFromRight,
    /// Center fades and scales.
    Scale,
}

impl CardMotion {
    pub fn for_position(position: ScreenPosition) -> Self {
        match position {
            ScreenPosition::TopLeft | ScreenPosition::TopRight => Self::SlideFromTop,
            ScreenPosition::BottomLeft | ScreenPosition::BottomRight => Self::SlideFromBottom,
            ScreenPosition::CenterLeft => Self::SlideFromLeft,
            ScreenPosition::CenterRight => Self::SlideFromRight,
            ScreenPosition::Center => Self::Scale,
        }
    }
}

/// Everything the surface needs to build one greeting card.
#[derive(Debug, Clone, Serialize)]
pub struct CardFrame {
    pub content_id: String,
    pub source_id: String,
    pub priority: PriorityLevel,
    pub image_url: String,
    pub text_body: String,
    pub position: ScreenPosition,
    pub size_class: SizeClass,
    pub max_height_vh: u8,
    pub motion: CardMotion,
    pub animation_ms: u64,
}

impl CardFrame {
    pub fn build(request: &QueuedRequest, animation_ms: u64) -> Self {
        let content: &ContentPayload = &request.request.content;
        Self {
            content_id: content.id.clone(),
            source_id: request.source_id().to_string(),
            priority: request.priority(),
            image_url: content.image_url.clone(),
            text_body: content.text_body.clone(),
            position: content.screen_position,
            size_class: content.size_class,
            max_height_vh: content.size_class.max_height_vh(),
            motion: CardMotion::for_position(content.screen_position),
            animation_ms,
        }
    }

    /// Whether the card references an image asset the surface must fetch.
    pub fn has_asset(&self) -> bool {
        !self.image_url.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_derived_from_anchor() {
        assert_eq!(
            CardMotion::for_position(ScreenPosition::TopRight),
            CardMotion::SlideFromTop
        );
        assert_eq!(
            CardMotion::for_position(ScreenPosition::BottomLeft),
            CardMotion::SlideFromBottom
        );
        assert_eq!(
            CardMotion::for_position(ScreenPosition::CenterLeft),
            CardMotion::SlideFromLeft
        );
        assert_eq!(
            CardMotion::for_position(ScreenPosition::Center),
            CardMotion::Scale
        );
    }

    #[test]
    fn frame_serializes_with_type_tag() {
        let frame = SurfaceFrame::Unmount {
            content_id: "tip_abc".into(),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "unmount");
        assert_eq!(json["content_id"], "tip_abc");
    }

    #[test]
    fn surface_event_roundtrip() {
        let json = r#"{"type":"asset_ready","content_id":"clock_1"}"#;
        let event: SurfaceEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.content_id(), "clock_1");
        assert!(matches!(event, SurfaceEvent::AssetReady { .. }));
    }
}
