//! Soft advisory lock (review hold).
//!
//! The hold is a best-effort, time-leased courtesy that reduces wasted
//! concurrent review work. It is never a source of truth: correctness is
//! guaranteed solely by the version token, even with locking disabled
//! entirely. Callers fail OPEN when the lock service is unreachable.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;

/// An ephemeral review hold. Destroyed on release or lease expiry; never
/// persisted beyond its lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewHold {
    /// The record under review.
    pub record_id: String,
    /// Who is reviewing.
    pub holder: String,
    /// When the lease ends, set by the service at acquisition. The holder
    /// does not renew it.
    pub expires_at: DateTime<Utc>,
}

impl ReviewHold {
    /// Whole minutes remaining on the lease, clamped at zero.
    pub fn minutes_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_minutes().max(0)
    }

    /// Whether the lease is judged expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Outcome of an acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The hold was granted.
    Acquired(ReviewHold),
    /// Someone else is reviewing; the caller should not open the session.
    Refused {
        holder: String,
        expires_at: DateTime<Utc>,
    },
}

/// Trait for the lock collaborator. Implementations must tolerate being
/// unreachable; callers degrade to "no lock" on transport errors.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Attempt to take the review hold on a record.
    async fn acquire(&self, record_id: &str, holder: &str) -> Result<AcquireOutcome>;

    /// Release the hold. Fire-and-forget at call sites: failures are logged,
    /// never propagated to the user.
    async fn release(&self, record_id: &str) -> Result<()>;
}

/// In-memory lease table with a fixed lease duration.
pub struct InMemoryLockService {
    leases: RwLock<HashMap<String, ReviewHold>>,
    lease: Duration,
}

impl InMemoryLockService {
    /// Create a lock service with the given lease duration.
    pub fn with_lease_minutes(minutes: i64) -> Self {
        Self {
            leases: RwLock::new(HashMap::new()),
            lease: Duration::minutes(minutes),
        }
    }

    /// Create a lock service from configuration.
    pub fn from_config(config: &crate::config::LockConfig) -> Self {
        Self::with_lease_minutes(config.lease_minutes)
    }
}

impl Default for InMemoryLockService {
    fn default() -> Self {
        Self::with_lease_minutes(30)
    }
}

#[async_trait]
impl LockService for InMemoryLockService {
    async fn acquire(&self, record_id: &str, holder: &str) -> Result<AcquireOutcome> {
        let now = Utc::now();
        let mut leases = self.leases.write().await;

        if let Some(existing) = leases.get(record_id) {
            if !existing.is_expired(now) && existing.holder != holder {
                return Ok(AcquireOutcome::Refused {
                    holder: existing.holder.clone(),
                    expires_at: existing.expires_at,
                });
            }
            // Expired leases are reaped here; re-acquisition by the same
            // holder refreshes the lease.
        }

        let hold = ReviewHold {
            record_id: record_id.to_string(),
            holder: holder.to_string(),
            expires_at: now + self.lease,
        };
        leases.insert(record_id.to_string(), hold.clone());
        debug!("Hold acquired on {} by {}", record_id, holder);
        Ok(AcquireOutcome::Acquired(hold))
    }

    async fn release(&self, record_id: &str) -> Result<()> {
        let removed = self.leases.write().await.remove(record_id);
        if removed.is_some() {
            debug!("Hold released on {}", record_id);
        }
        Ok(())
    }
}
