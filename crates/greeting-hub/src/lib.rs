//! Greeting notification hub.
//!
//! Orchestrates ambient greeting cards on a start page: independent event
//! sources publish display requests, a priority broker queues them, and a
//! single arbiter state machine decides what one card, if any, is on
//! screen. Rendering is decoupled behind a frame broadcast so any surface
//! (native view, websocket overlay, test harness) can subscribe.

pub mod arbiter;
pub mod broker;
pub mod bus;
pub mod config;
pub mod hub;
pub mod presenter;
pub mod source;
pub mod sources;
pub mod surface;
pub mod types;

pub use arbiter::HubSnapshot;
pub use bus::ResponseBus;
pub use config::HubConfig;
pub use hub::{GreetingHub, SurfaceReporter};
pub use source::{EventSource, HideHandle, HoldPolicy, RequestPublisher, TriggerPlan};
pub use surface::{CardFrame, CardPhase, SurfaceEvent, SurfaceFrame};
pub use types::{
    ArbiterState, ContentPayload, ContentSpec, DisplayRequest, Outcome, PriorityLevel,
    QueuedRequest, ScreenPosition, SizeClass,
};

#[cfg(test)]
mod tests;
