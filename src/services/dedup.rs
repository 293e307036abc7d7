//! Rejects bursts of identical story submissions.
//!
//! The guard is a process-local map keyed by `(owner, trimmed prompt)`. It is
//! not shared between instances and resets on restart.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Decides whether a submission may proceed.
///
/// `admit` must check and record in one step, without yielding, so two
/// concurrent identical submissions cannot both be admitted.
pub trait SubmissionGuard: Send + Sync {
    fn admit(&self, owner: Option<&str>, prompt: &str, now: DateTime<Utc>) -> bool;

    /// Forgets an admitted submission whose job was never created.
    fn release(&self, owner: Option<&str>, prompt: &str);
}

/// In-memory TTL map implementation of [`SubmissionGuard`].
#[derive(Debug)]
pub struct DuplicateGuard {
    cooldown: Duration,
    retention: Duration,
    recent: Mutex<HashMap<SubmissionKey, DateTime<Utc>>>,
}

/// Owner and trimmed prompt. Anonymous submitters share `None`, which no
/// resolved owner id can equal.
type SubmissionKey = (Option<String>, String);

impl DuplicateGuard {
    pub fn new(cooldown: Duration, retention: Duration) -> Self {
        Self {
            cooldown,
            retention,
            recent: Mutex::new(HashMap::new()),
        }
    }

    fn key(owner: Option<&str>, prompt: &str) -> SubmissionKey {
        (owner.map(str::to_string), prompt.trim().to_string())
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.recent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DuplicateGuard {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(3600))
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    // A clock that stepped backwards counts as "no time passed".
    now.signed_duration_since(since)
        .to_std()
        .unwrap_or_default()
}

impl SubmissionGuard for DuplicateGuard {
    fn admit(&self, owner: Option<&str>, prompt: &str, now: DateTime<Utc>) -> bool {
        let key = Self::key(owner, prompt);
        let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());

        let before = recent.len();
        recent.retain(|_, last_seen| elapsed(*last_seen, now) <= self.retention);
        if recent.len() < before {
            debug!(purged = before - recent.len(), "Purged stale submission keys");
        }

        if let Some(last_seen) = recent.get(&key) {
            if elapsed(*last_seen, now) < self.cooldown {
                return false;
            }
        }

        recent.insert(key, now);
        true
    }

    fn release(&self, owner: Option<&str>, prompt: &str) {
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&Self::key(owner, prompt));
    }
}
