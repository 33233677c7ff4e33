//! Publish history and duplicate suppression
//!
//! Tracks, per account, when each content id was last published. The backing
//! document is a JSON object `account -> { content_id -> timestamp }`,
//! rewritten atomically after every change.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::store;
use crate::types::AccountId;

/// How long a published id stays suppressed for the same account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Once published, never again to the same account
    Permanent,
    /// Suppressed only while `now - last_published < window`
    Windowed(Duration),
}

impl Default for DedupPolicy {
    fn default() -> Self {
        DedupPolicy::Windowed(Duration::hours(24))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
struct Timestamp(DateTime<Utc>);

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .map(Timestamp)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}

/// Accepts RFC 3339 as well as offset-less ISO-8601 (taken as UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

type Records = BTreeMap<AccountId, BTreeMap<String, Timestamp>>;

/// Durable (account, content id) -> last published timestamp map.
///
/// Single writer: only one process may hold a store for a given file.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    policy: DedupPolicy,
    records: Records,
}

impl HistoryStore {
    /// Load the history at `path`.
    ///
    /// Never fails. A missing document yields an empty history; an unreadable
    /// or corrupt one is logged and also yields an empty history, since losing
    /// dedup state costs at most one repeated post.
    pub fn load(path: impl Into<PathBuf>, policy: DedupPolicy) -> Self {
        let path = path.into();
        let records = match store::read_document::<Records>(&path) {
            Ok(Some(records)) => records,
            Ok(None) => {
                debug!(path = %path.display(), "No history file, starting empty");
                Records::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable history, starting empty");
                Records::new()
            }
        };

        Self {
            path,
            policy,
            records,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Whether publishing `content_id` to `account` at `now` would be a repeat
    pub fn is_duplicate(&self, account: &AccountId, content_id: &str, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_published(account, content_id) else {
            return false;
        };

        match self.policy {
            DedupPolicy::Permanent => true,
            DedupPolicy::Windowed(window) => now - last < window,
        }
    }

    pub fn last_published(&self, account: &AccountId, content_id: &str) -> Option<DateTime<Utc>> {
        self.records
            .get(account)
            .and_then(|ids| ids.get(content_id))
            .map(|ts| ts.0)
    }

    /// Record a successful publish and persist before returning.
    ///
    /// Re-recording an id overwrites its timestamp. If the write fails the
    /// in-memory entry is restored, so the id stays eligible.
    pub fn record(
        &mut self,
        account: &AccountId,
        content_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let previous = self
            .records
            .entry(account.clone())
            .or_default()
            .insert(content_id.to_string(), Timestamp(at));

        if let Err(e) = self.flush() {
            let ids = self.records.entry(account.clone()).or_default();
            match previous {
                Some(ts) => {
                    ids.insert(content_id.to_string(), ts);
                }
                None => {
                    ids.remove(content_id);
                }
            }
            if ids.is_empty() {
                self.records.remove(account);
            }
            return Err(e);
        }

        debug!(account = %account, content_id, "Recorded publish");
        Ok(())
    }

    /// Persist the current history atomically
    pub fn flush(&self) -> Result<(), StorageError> {
        store::write_document(&self.path, &self.records)
    }

    /// Number of ids recorded for an account
    pub fn len_for(&self, account: &AccountId) -> usize {
        self.records.get(account).map_or(0, |ids| ids.len())
    }

    /// Content ids recorded for an account, in id order
    pub fn ids_for(&self, account: &AccountId) -> Vec<String> {
        self.records
            .get(account)
            .map(|ids| ids.keys().cloned().collect())
            .unwrap_or_default()
    }
}
