//! Distributed mutual exclusion.
//!
//! Locks are named keys in the coordination store. Acquisition is always
//! non-blocking: contention is a normal outcome (`None`), never an error,
//! and callers decide whether to retry with a short bounded backoff or drop
//! the work. Every lock carries a TTL so a crashed holder cannot wedge the
//! key forever, and release verifies ownership so a delayed unlock cannot
//! remove a lock that expired and was re-acquired by someone else.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Proof of lock ownership, returned by a successful acquisition.
///
/// The owner token is unique per acquisition; release compares it against
/// the stored value before deleting the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    key: String,
    owner: String,
}

impl LockToken {
    /// Build a token. Called by lock providers, not by lock users.
    #[must_use]
    pub const fn new(key: String, owner: String) -> Self {
        Self { key, owner }
    }

    /// The locked key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The caller-unique owner value stored under the key.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

/// A named mutual-exclusion primitive safe across processes.
pub trait LockProvider: Send + Sync {
    /// Attempt to acquire `key` for at most `ttl`.
    ///
    /// Returns `Ok(None)` immediately when the key is already held; that is
    /// contention, not an error. The TTL is applied atomically with the
    /// acquisition.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] when the coordination store is
    /// unreachable.
    fn try_lock(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<Option<LockToken>>> + Send;

    /// Release a held lock.
    ///
    /// A no-op when the stored owner no longer matches (the lock expired and
    /// was re-acquired by another holder).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] when the coordination store is
    /// unreachable; the TTL still bounds the lock's lifetime in that case.
    fn unlock(&self, token: LockToken) -> impl Future<Output = Result<()>> + Send;
}

/// Acquire several named locks as one logical unit.
///
/// Keys are de-duplicated and acquired in lexicographic order, so two
/// callers locking overlapping sets cannot deadlock. On contention for any
/// key the locks already held are released and `Ok(None)` is returned.
///
/// # Errors
///
/// Returns the first store error encountered; locks acquired before the
/// failure are released on a best-effort basis (their TTLs bound the rest).
pub async fn try_lock_all<L: LockProvider>(
    provider: &L,
    keys: &[&str],
    ttl: Duration,
) -> Result<Option<Vec<LockToken>>> {
    let mut ordered: Vec<&str> = keys.to_vec();
    ordered.sort_unstable();
    ordered.dedup();

    let mut held = Vec::with_capacity(ordered.len());
    for key in ordered {
        match provider.try_lock(key, ttl).await {
            Ok(Some(token)) => held.push(token),
            Ok(None) => {
                tracing::debug!(key, held = held.len(), "multi-lock contention, rolling back");
                unlock_all(provider, held).await;
                return Ok(None);
            },
            Err(err) => {
                unlock_all(provider, held).await;
                return Err(err);
            },
        }
    }
    Ok(Some(held))
}

/// Release a set of locks, in any order.
///
/// Failures are logged and swallowed: each entry's TTL already bounds its
/// lifetime, and callers of a release path have nothing useful to do with
/// the error.
pub async fn unlock_all<L: LockProvider>(provider: &L, tokens: Vec<LockToken>) {
    for token in tokens {
        let key = token.key().to_owned();
        if let Err(err) = provider.unlock(token).await {
            tracing::warn!(key = %key, error = %err, "failed to release lock");
        }
    }
}
