//! Verification-session storage trait.
//!
//! # Implementation notes
//!
//! Implementations must:
//!
//! - keep the `request_id -> sid` secondary index in step with the primary
//!   entry (both updated under the same critical section)
//! - treat expired entries as absent and evict them lazily on access
//! - make per-key reads and writes linearizable: a `get` never observes a
//!   half-written session

use async_trait::async_trait;

use crate::VerifyResult;
use crate::flow::session::VerificationSession;

/// Storage trait for verification sessions.
///
/// Sessions are keyed by `sid`; the provider callback looks them up by
/// `request_id` through a maintained secondary index rather than a scan.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts or overwrites the session under its `sid`.
    ///
    /// The session's `expires_at` is the recorded absolute expiry. The
    /// secondary index entry for `request_id` (if set) is updated
    /// atomically with the primary entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn put(&self, session: &VerificationSession) -> VerifyResult<()>;

    /// Returns the session for `sid` if present and not expired.
    ///
    /// An expired entry is evicted (index row included) and reported as
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get(&self, sid: &str) -> VerifyResult<Option<VerificationSession>>;

    /// Returns the session holding `request_id`, with the same expiry
    /// semantics as [`get`](Self::get).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_request_id(
        &self,
        request_id: &str,
    ) -> VerifyResult<Option<VerificationSession>>;

    /// Deletes the session under `sid`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, sid: &str) -> VerifyResult<()>;

    /// Deletes expired sessions and returns how many were removed.
    ///
    /// Only needed to bound memory; correctness never depends on it because
    /// reads evict lazily.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> VerifyResult<u64>;
}
