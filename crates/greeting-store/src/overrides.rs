//! Content-data overrides keyed by source id.
//!
//! A source's built-in default content can be replaced by a JSON blob
//! stored here. The blob's schema is source-specific; parsing and
//! validation (with fallback to the defaults) happen in the source.

use rusqlite::OptionalExtension;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Store, StoreError};

impl Store {
    /// Fetch the raw override payload for a source, if any.
    pub fn override_payload(&self, source_id: &str) -> Result<Option<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT payload FROM content_overrides WHERE source_id = ?1")?;
            let payload = stmt
                .query_row([source_id], |row| row.get::<_, String>(0))
                .optional()?;
            Ok(payload)
        })
    }

    /// Store an override payload for a source.
    pub fn set_override_payload(&self, source_id: &str, payload: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO content_overrides (source_id, payload, updated_at)
                 VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(source_id) DO UPDATE SET payload = ?2, updated_at = CURRENT_TIMESTAMP",
                rusqlite::params![source_id, payload],
            )?;
            Ok(())
        })
    }

    /// Remove the override for a source.
    pub fn clear_override(&self, source_id: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM content_overrides WHERE source_id = ?1",
                [source_id],
            )?;
            Ok(())
        })
    }

    /// Typed read of an override blob. Returns `None` when the payload is
    /// missing or fails to parse; the caller falls back to its defaults.
    pub fn override_data<T: DeserializeOwned>(&self, source_id: &str) -> Option<T> {
        let payload = match self.override_payload(source_id) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(source_id, error = %e, "Failed to read content override");
                return None;
            }
        };
        match serde_json::from_str(&payload) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(source_id, error = %e, "Invalid content override, using defaults");
                None
            }
        }
    }

    /// Typed write of an override blob.
    pub fn set_override_data<T: Serialize>(
        &self,
        source_id: &str,
        data: &T,
    ) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(data).map_err(|e| StoreError::InvalidData(e.to_string()))?;
        self.set_override_payload(source_id, &payload)
    }
}
