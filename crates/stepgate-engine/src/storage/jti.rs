//! Consumed-token-id storage trait for replay prevention.
//!
//! # Security considerations
//!
//! - `mark_used` must be atomic: of any number of concurrent verifications
//!   racing on the same `jti`, exactly one may win
//! - it is called exactly once per externally-asserted token, after
//!   signature and expiry checks pass and before the claims are trusted
//! - entries may be pruned once their token's `exp` has passed; correctness
//!   must not depend on pruning timing

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::VerifyResult;

/// Storage trait for tracking consumed token identifiers.
#[async_trait]
pub trait JtiStore: Send + Sync {
    /// Atomically marks `jti` as consumed if it was not already.
    ///
    /// # Arguments
    ///
    /// * `jti` - the token id to consume
    /// * `expires_at` - when the entry may be pruned (the token's `exp`)
    ///
    /// # Returns
    ///
    /// `true` on first use, `false` if the id was already consumed
    /// (replay detected).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> VerifyResult<bool>;

    /// Returns `true` if `jti` has already been consumed.
    ///
    /// Prefer [`mark_used`](Self::mark_used), which checks and consumes
    /// atomically; this is for diagnostics only.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn is_used(&self, jti: &str) -> VerifyResult<bool>;

    /// Deletes entries whose tokens have expired and returns the count.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> VerifyResult<u64>;
}
