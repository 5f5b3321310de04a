//! Cooldown markers written by sources at resolution time.
//!
//! A marker is `{ scope, expires_at }`; the scope string is chosen by
//! the owning source (usually its source id) and is opaque here.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use crate::{Store, StoreError};

/// A persisted cooldown marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownMarker {
    pub scope: String,
    pub expires_at: DateTime<Utc>,
}

impl Store {
    /// Fetch the marker for a scope, if any.
    pub fn marker(&self, scope: &str) -> Result<Option<CooldownMarker>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT expires_at FROM cooldown_markers WHERE scope = ?1")?;
            let ts = stmt
                .query_row([scope], |row| row.get::<_, i64>(0))
                .optional()?;
            Ok(ts.map(|secs| CooldownMarker {
                scope: scope.to_string(),
                expires_at: Utc
                    .timestamp_opt(secs, 0)
                    .single()
                    .unwrap_or_else(Utc::now),
            }))
        })
    }

    /// Insert or replace the marker for a scope.
    pub fn set_marker(&self, scope: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cooldown_markers (scope, expires_at) VALUES (?1, ?2)
                 ON CONFLICT(scope) DO UPDATE SET expires_at = ?2",
                rusqlite::params![scope, expires_at.timestamp()],
            )?;
            Ok(())
        })
    }

    /// Whether an unexpired marker exists for a scope.
    pub fn marker_active(&self, scope: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(self
            .marker(scope)?
            .is_some_and(|marker| marker.expires_at > now))
    }

    /// Remove the marker for a scope.
    pub fn clear_marker(&self, scope: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM cooldown_markers WHERE scope = ?1", [scope])?;
            Ok(())
        })
    }

    /// Remove every marker that expired before `now`.
    pub fn prune_markers(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM cooldown_markers WHERE expires_at <= ?1",
                [now.timestamp()],
            )?;
            Ok(removed)
        })
    }
}
