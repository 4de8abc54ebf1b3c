//! The cache item data model and TTL resolution policy.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A stored value together with its expiration policy.
///
/// Invariant: if `persistent` is `true`, `expires_at` is meaningless and must
/// not be consulted. Otherwise `expires_at` is the unix-second instant after
/// which the item is considered expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheItem {
    pub value: Vec<u8>,
    pub expires_at: i64,
    pub persistent: bool,
}

impl CacheItem {
    /// Builds a new item for `value`, resolving `requested_ttl_s` against the
    /// configured policy (see [`TtlPolicy::resolve`]).
    #[must_use]
    pub fn new(value: Vec<u8>, requested_ttl_s: i64, policy: &TtlPolicy, now: i64) -> Self {
        let (expires_at, persistent) = policy.resolve(requested_ttl_s, now);
        Self {
            value,
            expires_at,
            persistent,
        }
    }

    /// `true` iff this item is expired as of `now` (unix seconds).
    ///
    /// Persistent items never expire.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        !self.persistent && now > self.expires_at
    }

    /// Remaining seconds until expiration, or `-1` for persistent items.
    ///
    /// Returns `0` for an already-expired item (callers should check
    /// [`is_expired`](Self::is_expired) first if they need to distinguish
    /// "about to expire" from "absent").
    #[must_use]
    pub fn ttl_remaining(&self, now: i64) -> i64 {
        if self.persistent {
            return -1;
        }
        (self.expires_at - now).max(0)
    }
}

/// Resolves requested TTLs (in seconds) against a default and a ceiling.
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    pub default_ttl_s: i64,
    pub max_ttl_s: i64,
}

impl TtlPolicy {
    #[must_use]
    pub fn new(default_ttl_s: i64, max_ttl_s: i64) -> Self {
        Self {
            default_ttl_s,
            max_ttl_s,
        }
    }

    /// Resolves a requested TTL into `(expires_at, persistent)`.
    ///
    /// - `req < 0` -> persistent, `expires_at` unused (returned as `now`)
    /// - `req == 0` -> the configured default
    /// - `0 < req <= max` -> `req`
    /// - `req > max` -> clamped to `max`
    #[must_use]
    pub fn resolve(&self, req: i64, now: i64) -> (i64, bool) {
        if req < 0 {
            return (now, true);
        }
        let ttl = if req == 0 {
            self.default_ttl_s
        } else {
            req.min(self.max_ttl_s)
        };
        (now + ttl, false)
    }
}

/// Current unix time in seconds.
#[must_use]
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs() as i64
}
