//! Bearer session tokens.
//!
//! Tokens are 32 random bytes, URL-safe base64. Only the SHA-256 of a
//! token is kept in memory, so a dump of the store cannot be replayed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

struct SessionEntry {
    user_id: Uuid,
    expires_at: Instant,
}

/// In-memory session store with a fixed TTL per session.
pub struct SessionStore {
    sessions: Mutex<HashMap<[u8; 32], SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Issue a token for `user_id`. Expired sessions are swept on each issue.
    pub fn issue(&self, user_id: Uuid) -> String {
        self.issue_at(user_id, Instant::now())
    }

    pub fn issue_at(&self, user_id: Uuid, now: Instant) -> String {
        let token = generate_token();
        let mut sessions = self.lock_sessions();
        sessions.retain(|_, s| now < s.expires_at);
        sessions.insert(
            hash_token(&token),
            SessionEntry {
                user_id,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    pub fn resolve(&self, token: &str) -> Option<Uuid> {
        self.resolve_at(token, Instant::now())
    }

    /// Resolve a token to its user. Expired tokens are removed and yield `None`.
    pub fn resolve_at(&self, token: &str, now: Instant) -> Option<Uuid> {
        let key = hash_token(token);
        let mut sessions = self.lock_sessions();
        let (user_id, expires_at) = sessions.get(&key).map(|e| (e.user_id, e.expires_at))?;
        if now >= expires_at {
            sessions.remove(&key);
            return None;
        }
        Some(user_id)
    }

    /// Revoke a token. Returns `false` if it was unknown.
    pub fn revoke(&self, token: &str) -> bool {
        self.lock_sessions().remove(&hash_token(token)).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<[u8; 32], SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
