//! Stale analysis session cleanup

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, warn};
use yaktoon_common::{keys, time, Store};

/// Ages beyond a century are treated as a century
const MAX_AGE_HOURS: u64 = 100 * 365 * 24;

fn last_update(raw: &str) -> Option<DateTime<Utc>> {
    let session: Value = serde_json::from_str(raw).ok()?;
    time::parse_iso(session.get("lastUpdate")?.as_str()?)
}

/// Delete persisted `medsky:session:*` entries not updated within `max_age_hours`
///
/// Entries without a readable `lastUpdate` are left alone. Returns keys removed.
pub async fn cleanup_sessions(store: &dyn Store, max_age_hours: u64, now: DateTime<Utc>) -> Result<usize> {
    let hours = max_age_hours.min(MAX_AGE_HOURS) as i64;
    let cutoff = now - Duration::hours(hours);
    let mut removed = 0;

    for key in store.keys(keys::MEDSKY_SESSION_PATTERN).await? {
        let Some(raw) = store.get(&key).await? else {
            continue;
        };
        match last_update(&raw) {
            Some(updated) if updated < cutoff => {
                if store.del(&key).await? {
                    debug!(key = %key, "Removed stale session");
                    removed += 1;
                }
            }
            Some(_) => {}
            None => warn!(key = %key, "Session has no readable lastUpdate, keeping it"),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use yaktoon_common::MemoryStore;

    #[tokio::test]
    async fn test_cleanup_removes_only_stale_sessions() {
        let memory = MemoryStore::new();
        let store: &dyn Store = &memory;
        let now = time::parse_iso("2024-05-02T12:00:00.000Z").unwrap();

        store
            .set_json("medsky:session:old", &json!({ "lastUpdate": "2024-05-01T00:00:00.000Z" }))
            .await
            .unwrap();
        store
            .set_json("medsky:session:fresh", &json!({ "lastUpdate": "2024-05-02T11:00:00.000Z" }))
            .await
            .unwrap();
        store.set("medsky:session:garbled", "not json").await.unwrap();

        let removed = cleanup_sessions(store, 24, now).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!store.exists("medsky:session:old").await.unwrap());
        assert!(store.exists("medsky:session:fresh").await.unwrap());
        assert!(store.exists("medsky:session:garbled").await.unwrap());
    }
}
