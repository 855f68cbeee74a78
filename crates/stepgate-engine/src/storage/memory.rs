//! In-memory storage backends.
//!
//! The default backends for a single-process deployment. Both stores guard
//! their maps with a single `tokio::sync::RwLock`, which keeps per-key
//! operations linearizable and lets the session store update the primary map
//! and the `request_id` index in one critical section.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::VerifyResult;
use crate::flow::session::VerificationSession;
use crate::storage::jti::JtiStore;
use crate::storage::session::SessionStore;

/// Primary map plus the `request_id -> sid` index, mutated together.
#[derive(Default)]
struct SessionMaps {
    sessions: HashMap<String, VerificationSession>,
    by_request_id: HashMap<String, String>,
}

impl SessionMaps {
    fn remove(&mut self, sid: &str) -> Option<VerificationSession> {
        let removed = self.sessions.remove(sid);
        if let Some(session) = &removed
            && let Some(request_id) = &session.request_id
        {
            self.by_request_id.remove(request_id);
        }
        removed
    }
}

/// In-memory [`SessionStore`].
#[derive(Default)]
pub struct InMemorySessionStore {
    inner: RwLock<SessionMaps>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evicts `sid` if the stored entry is expired, returning the live
    /// session otherwise.
    async fn get_live(&self, sid: &str) -> Option<VerificationSession> {
        {
            let maps = self.inner.read().await;
            match maps.sessions.get(sid) {
                Some(session) if !session.is_expired() => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: re-check under the write lock before evicting, another
        // writer may have refreshed the entry in the meantime.
        let mut maps = self.inner.write().await;
        let still_live = match maps.sessions.get(sid) {
            Some(session) if !session.is_expired() => Some(session.clone()),
            Some(_) => None,
            None => return None,
        };
        if still_live.is_none() {
            maps.remove(sid);
        }
        still_live
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, session: &VerificationSession) -> VerifyResult<()> {
        let mut maps = self.inner.write().await;

        // Drop a stale index row if the request id changed.
        let stale_request_id = maps
            .sessions
            .get(&session.sid)
            .and_then(|previous| previous.request_id.clone())
            .filter(|old| session.request_id.as_deref() != Some(old.as_str()));
        if let Some(old_request_id) = stale_request_id {
            maps.by_request_id.remove(&old_request_id);
        }

        if let Some(request_id) = &session.request_id {
            maps.by_request_id
                .insert(request_id.clone(), session.sid.clone());
        }
        maps.sessions.insert(session.sid.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, sid: &str) -> VerifyResult<Option<VerificationSession>> {
        Ok(self.get_live(sid).await)
    }

    async fn find_by_request_id(
        &self,
        request_id: &str,
    ) -> VerifyResult<Option<VerificationSession>> {
        let sid = {
            let maps = self.inner.read().await;
            match maps.by_request_id.get(request_id) {
                Some(sid) => sid.clone(),
                None => return Ok(None),
            }
        };
        Ok(self.get_live(&sid).await)
    }

    async fn delete(&self, sid: &str) -> VerifyResult<()> {
        let mut maps = self.inner.write().await;
        maps.remove(sid);
        Ok(())
    }

    async fn cleanup_expired(&self) -> VerifyResult<u64> {
        let mut maps = self.inner.write().await;
        let expired: Vec<String> = maps
            .sessions
            .values()
            .filter(|s| s.is_expired())
            .map(|s| s.sid.clone())
            .collect();
        let count = expired.len() as u64;
        for sid in expired {
            maps.remove(&sid);
        }
        Ok(count)
    }
}

/// In-memory [`JtiStore`].
#[derive(Default)]
pub struct InMemoryJtiStore {
    used: RwLock<HashMap<String, OffsetDateTime>>,
}

impl InMemoryJtiStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JtiStore for InMemoryJtiStore {
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> VerifyResult<bool> {
        let mut used = self.used.write().await;
        if used.contains_key(jti) {
            return Ok(false);
        }
        used.insert(jti.to_string(), expires_at);
        Ok(true)
    }

    async fn is_used(&self, jti: &str) -> VerifyResult<bool> {
        let used = self.used.read().await;
        Ok(used.contains_key(jti))
    }

    async fn cleanup_expired(&self) -> VerifyResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut used = self.used.write().await;
        let before = used.len();
        used.retain(|_, expires_at| *expires_at > now);
        Ok((before - used.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::session::{DeclaredIdentity, FlowStep};
    use std::sync::Arc;
    use std::time::Duration;
    use time::Duration as TimeDuration;

    fn test_session() -> VerificationSession {
        VerificationSession::begin(
            DeclaredIdentity {
                name: "Kim".to_string(),
                id_number: "900101-1234567".to_string(),
            },
            Duration::from_secs(600),
        )
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = InMemorySessionStore::new();
        let session = test_session();

        store.put(&session).await.unwrap();
        let loaded = store.get(&session.sid).await.unwrap().unwrap();
        assert_eq!(loaded.sid, session.sid);
        assert_eq!(loaded.step, FlowStep::Step1Done);
    }

    #[tokio::test]
    async fn test_get_unknown_returns_none() {
        let store = InMemorySessionStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_evicted() {
        let store = InMemorySessionStore::new();
        let mut session = test_session();
        session.request_id = Some("req-1".to_string());
        session.expires_at = OffsetDateTime::now_utc() - TimeDuration::seconds(1);

        store.put(&session).await.unwrap();
        assert!(store.get(&session.sid).await.unwrap().is_none());
        // The index row must not outlive the entry.
        assert!(store.find_by_request_id("req-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_request_id() {
        let store = InMemorySessionStore::new();
        let mut session = test_session();
        session.request_id = Some("req-42".to_string());
        store.put(&session).await.unwrap();

        let found = store.find_by_request_id("req-42").await.unwrap().unwrap();
        assert_eq!(found.sid, session.sid);

        assert!(store.find_by_request_id("req-43").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_stale_index_row() {
        let store = InMemorySessionStore::new();
        let mut session = test_session();
        session.request_id = Some("req-old".to_string());
        store.put(&session).await.unwrap();

        session.request_id = Some("req-new".to_string());
        store.put(&session).await.unwrap();

        assert!(store.find_by_request_id("req-old").await.unwrap().is_none());
        assert!(
            store
                .find_by_request_id("req-new")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemorySessionStore::new();
        let mut session = test_session();
        session.request_id = Some("req-7".to_string());
        store.put(&session).await.unwrap();

        store.delete(&session.sid).await.unwrap();
        assert!(store.get(&session.sid).await.unwrap().is_none());
        assert!(store.find_by_request_id("req-7").await.unwrap().is_none());

        // Second delete is a no-op.
        store.delete(&session.sid).await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_expired_counts() {
        let store = InMemorySessionStore::new();

        let live = test_session();
        store.put(&live).await.unwrap();

        let mut dead = test_session();
        dead.expires_at = OffsetDateTime::now_utc() - TimeDuration::seconds(1);
        store.put(&dead).await.unwrap();

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(store.get(&live.sid).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_jti_first_use_wins() {
        let store = InMemoryJtiStore::new();
        let exp = OffsetDateTime::now_utc() + TimeDuration::minutes(5);

        assert!(store.mark_used("jti-1", exp).await.unwrap());
        assert!(!store.mark_used("jti-1", exp).await.unwrap());
        assert!(store.is_used("jti-1").await.unwrap());
        assert!(!store.is_used("jti-2").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_jti_concurrent_consumers_race_one_winner() {
        let store = Arc::new(InMemoryJtiStore::new());
        let exp = OffsetDateTime::now_utc() + TimeDuration::minutes(5);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.mark_used("contested", exp).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_jti_cleanup_prunes_only_expired() {
        let store = InMemoryJtiStore::new();
        let now = OffsetDateTime::now_utc();

        store
            .mark_used("expired", now - TimeDuration::seconds(1))
            .await
            .unwrap();
        store
            .mark_used("live", now + TimeDuration::minutes(5))
            .await
            .unwrap();

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(!store.is_used("expired").await.unwrap());
        assert!(store.is_used("live").await.unwrap());
    }
}
