//! Hub timing configuration: defaults with store-backed overrides.

use std::time::Duration;

use greeting_store::Store;
use serde::Deserialize;

use crate::types::PriorityLevel;

const CONFIG_KEY: &str = "hub_config";

/// Timing knobs for the arbiter and presenter.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Coalescing delay before the first post-idle request is served.
    pub throttle: Duration,
    /// Quiet interval after a greeting resolves.
    pub cooldown: Duration,
    /// Queued requests older than this are discarded unserved.
    pub max_queue_age: Duration,
    /// Requeue attempts before a contended request is discarded.
    pub max_retries: u32,
    /// How long the presenter waits for asset readiness before showing anyway.
    pub asset_timeout: Duration,
    /// Enter/exit animation duration.
    pub animation: Duration,
    pub dismiss_low: Duration,
    pub dismiss_medium: Duration,
    pub dismiss_high: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_secs(2),
            cooldown: Duration::from_secs(5),
            max_queue_age: Duration::from_secs(120),
            max_retries: 3,
            asset_timeout: Duration::from_secs(5),
            animation: Duration::from_millis(300),
            dismiss_low: Duration::from_secs(8),
            dismiss_medium: Duration::from_secs(12),
            dismiss_high: Duration::from_secs(15),
        }
    }
}

/// Optional persisted overrides, all in milliseconds.
#[derive(Debug, Default, Deserialize)]
struct StoredOverrides {
    throttle_ms: Option<u64>,
    cooldown_ms: Option<u64>,
    max_queue_age_ms: Option<u64>,
    max_retries: Option<u32>,
    asset_timeout_ms: Option<u64>,
    animation_ms: Option<u64>,
    dismiss_low_ms: Option<u64>,
    dismiss_medium_ms: Option<u64>,
    dismiss_high_ms: Option<u64>,
}

impl HubConfig {
    /// Load configuration, applying any persisted overrides on top of the
    /// defaults. Missing or invalid overrides fall back silently.
    pub fn load(store: &Store) -> Self {
        let mut config = Self::default();
        let Some(stored) = store.override_data::<StoredOverrides>(CONFIG_KEY) else {
            return config;
        };

        let ms = Duration::from_millis;
        if let Some(v) = stored.throttle_ms {
            config.throttle = ms(v);
        }
        if let Some(v) = stored.cooldown_ms {
            config.cooldown = ms(v);
        }
        if let Some(v) = stored.max_queue_age_ms {
            config.max_queue_age = ms(v);
        }
        if let Some(v) = stored.max_retries {
            config.max_retries = v;
        }
        if let Some(v) = stored.asset_timeout_ms {
            config.asset_timeout = ms(v);
        }
        if let Some(v) = stored.animation_ms {
            config.animation = ms(v);
        }
        if let Some(v) = stored.dismiss_low_ms {
            config.dismiss_low = ms(v);
        }
        if let Some(v) = stored.dismiss_medium_ms {
            config.dismiss_medium = ms(v);
        }
        if let Some(v) = stored.dismiss_high_ms {
            config.dismiss_high = ms(v);
        }

        tracing::info!(
            throttle_ms = config.throttle.as_millis() as u64,
            cooldown_ms = config.cooldown.as_millis() as u64,
            "Hub config loaded with stored overrides"
        );
        config
    }

    /// Auto-dismiss timeout for hub-timed sources. Critical never
    /// auto-dismisses.
    pub fn auto_dismiss(&self, priority: PriorityLevel) -> Option<Duration> {
        match priority {
            PriorityLevel::Low => Some(self.dismiss_low),
            PriorityLevel::Medium => Some(self.dismiss_medium),
            PriorityLevel::High => Some(self.dismiss_high),
            PriorityLevel::Critical => None,
        }
    }
}
