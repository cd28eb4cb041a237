//! Login attempt guard: per-identifier failure counter with time-based lockout.
//!
//! State per identifier: `OK(0) → OK(n < max) → LOCKED → OK(0)`.
//! Locks expire lazily: "is locked" is computed from the stored lock instant
//! plus the window at check time, so there is no background eviction.
//! Expired records for other identifiers are swept whenever a new
//! identifier is inserted, which bounds the map to the identifiers seen
//! within one window.
//! All mutations go through one `Mutex` over the map, which serializes
//! concurrent read-modify-write cycles for the same identifier.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Default failures allowed before lockout.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout window (60 seconds).
pub const DEFAULT_LOCKOUT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardPolicy {
    pub max_attempts: u32,
    pub window: Duration,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window: DEFAULT_LOCKOUT_WINDOW,
        }
    }
}

#[derive(Debug, Clone)]
struct AttemptRecord {
    count: u32,
    last_attempt: Instant,
    locked_at: Option<Instant>,
}

/// Snapshot returned after recording a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptState {
    pub attempts: u32,
    pub max_attempts: u32,
    pub locked: bool,
    pub seconds_remaining: Option<u64>,
}

impl AttemptState {
    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }
}

/// Rejection returned while an identifier is locked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Too many failed attempts, retry in {seconds_remaining}s")]
pub struct Locked {
    pub seconds_remaining: u64,
    pub attempts: u32,
    pub max_attempts: u32,
}

pub struct LoginAttemptGuard {
    records: Mutex<HashMap<String, AttemptRecord>>,
    policy: GuardPolicy,
}

impl LoginAttemptGuard {
    pub fn new(policy: GuardPolicy) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> GuardPolicy {
        self.policy
    }

    pub fn check_allowed(&self, identifier: &str) -> Result<(), Locked> {
        self.check_allowed_at(identifier, Instant::now())
    }

    /// Fails with `Locked` while the identifier's lock window is open.
    /// Expired locks and stale counters are discarded here.
    pub fn check_allowed_at(&self, identifier: &str, now: Instant) -> Result<(), Locked> {
        let key = normalize(identifier);
        let mut records = self.lock_records();

        let Some(record) = records.get(&key) else {
            return Ok(());
        };

        if let Some(remaining) = self.lock_remaining(record, now) {
            return Err(Locked {
                seconds_remaining: ceil_secs(remaining),
                attempts: record.count,
                max_attempts: self.policy.max_attempts,
            });
        }

        if self.is_expired(record, now) {
            records.remove(&key);
        }
        Ok(())
    }

    pub fn record_failure(&self, identifier: &str) -> AttemptState {
        self.record_failure_at(identifier, Instant::now())
    }

    /// Count one failed attempt. Reaching `max_attempts` opens the lock window;
    /// failures recorded while locked do not extend it.
    pub fn record_failure_at(&self, identifier: &str, now: Instant) -> AttemptState {
        let key = normalize(identifier);
        let mut records = self.lock_records();

        if !records.contains_key(&key) {
            records.retain(|_, r| !self.is_expired(r, now));
        }

        let record = records.entry(key).or_insert(AttemptRecord {
            count: 0,
            last_attempt: now,
            locked_at: None,
        });

        if let Some(remaining) = self.lock_remaining(record, now) {
            return AttemptState {
                attempts: record.count,
                max_attempts: self.policy.max_attempts,
                locked: true,
                seconds_remaining: Some(ceil_secs(remaining)),
            };
        }

        if self.is_expired(record, now) {
            record.count = 0;
            record.locked_at = None;
        }

        record.count += 1;
        record.last_attempt = now;

        if record.count >= self.policy.max_attempts {
            record.locked_at = Some(now);
            tracing::warn!(
                attempts = record.count,
                window_secs = self.policy.window.as_secs(),
                "Login locked after repeated failures"
            );
            return AttemptState {
                attempts: record.count,
                max_attempts: self.policy.max_attempts,
                locked: true,
                seconds_remaining: Some(ceil_secs(self.policy.window)),
            };
        }

        AttemptState {
            attempts: record.count,
            max_attempts: self.policy.max_attempts,
            locked: false,
            seconds_remaining: None,
        }
    }

    /// Discard the identifier's record entirely.
    pub fn record_success(&self, identifier: &str) {
        self.lock_records().remove(&normalize(identifier));
    }

    /// Current failure count (0 when unknown or expired).
    pub fn attempts(&self, identifier: &str) -> u32 {
        self.attempts_at(identifier, Instant::now())
    }

    pub fn attempts_at(&self, identifier: &str, now: Instant) -> u32 {
        let records = self.lock_records();
        match records.get(&normalize(identifier)) {
            Some(record) if !self.is_expired(record, now) => record.count,
            _ => 0,
        }
    }

    /// Number of identifiers currently tracked.
    pub fn tracked(&self) -> usize {
        self.lock_records().len()
    }

    // A poisoned map is still consistent: every critical section is a
    // single in-place update.
    fn lock_records(&self) -> MutexGuard<'_, HashMap<String, AttemptRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_remaining(&self, record: &AttemptRecord, now: Instant) -> Option<Duration> {
        let locked_at = record.locked_at?;
        let elapsed = now.saturating_duration_since(locked_at);
        self.policy.window.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    /// Lock window passed, or the last failure is older than the window.
    fn is_expired(&self, record: &AttemptRecord, now: Instant) -> bool {
        let since = record.locked_at.unwrap_or(record.last_attempt);
        now.saturating_duration_since(since) >= self.policy.window
    }
}

impl Default for LoginAttemptGuard {
    fn default() -> Self {
        Self::new(GuardPolicy::default())
    }
}

/// Identifiers are emails; compare them trimmed and lowercased.
pub fn normalize(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}
