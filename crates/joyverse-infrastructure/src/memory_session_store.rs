//! In-memory session store.
//!
//! A fully invariant-enforcing [`SessionStore`] used by tests and local
//! development when no backend is running. It is the reference behavior
//! the HTTP store's backend is expected to match: one active session per
//! user, append-only samples, closed sessions reject appends.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use joyverse_core::clock::{Clock, SystemClock};
use joyverse_core::error::{JoyverseError, Result};
use joyverse_core::session::{
    AppendAck, EmotionSample, GameKind, Session, SessionStore, SessionSummary, StartedSession,
};

/// Session store backed by a process-local map.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a store with an injected clock so tests can pin timestamps.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Snapshot of a session by id, for assertions and local dashboards.
    pub async fn session(&self, session_id: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    /// All sessions belonging to `user_id`, in no particular order.
    pub async fn sessions_for_user(&self, user_id: &str) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|session| session.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn start_session(&self, user_id: &str, game: GameKind) -> Result<StartedSession> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;

        // Close any other active session for this user first.
        for session in sessions.values_mut() {
            if session.user_id == user_id && session.is_active {
                session.close(now, None);
            }
        }

        let session = Session::new(Uuid::new_v4().to_string(), user_id, game, now);
        let started = StartedSession {
            session_id: session.id.clone(),
            game,
        };
        sessions.insert(session.id.clone(), session);

        Ok(started)
    }

    async fn append_emotion_sample(
        &self,
        session_id: &str,
        sample: EmotionSample,
    ) -> Result<AppendAck> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| JoyverseError::not_found("session", session_id))?;

        if !session.is_active {
            return Err(JoyverseError::session_closed(session_id));
        }

        session.push_sample(sample);
        Ok(AppendAck {
            total_samples: session.samples.len(),
        })
    }

    async fn end_session(
        &self,
        session_id: &str,
        duration_seconds: Option<u64>,
    ) -> Result<SessionSummary> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| JoyverseError::not_found("session", session_id))?;

        if session.is_active {
            session.close(now, duration_seconds);
        } else if let Some(duration) = duration_seconds {
            // Re-ending refreshes the duration, mirroring the backend's
            // save-on-end semantics.
            session.duration_seconds = duration;
        }

        Ok(session.summary())
    }

    async fn active_session(&self, user_id: &str) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .find(|session| session.user_id == user_id && session.is_active)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use joyverse_core::clock::FixedClock;
    use joyverse_core::difficulty::DifficultyTier;

    fn sample(word: &str) -> EmotionSample {
        EmotionSample::new(
            word,
            "happy",
            0.9,
            DifficultyTier::Easy,
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_start_creates_active_medium_session() {
        let store = MemorySessionStore::new();
        let started = store
            .start_session("child-9", GameKind::SnakeWords)
            .await
            .unwrap();

        let session = store.session(&started.session_id).await.unwrap();
        assert!(session.is_active);
        assert_eq!(session.difficulty, DifficultyTier::Medium);
        assert_eq!(session.user_id, "child-9");
    }

    #[tokio::test]
    async fn test_at_most_one_active_session_per_user() {
        let store = MemorySessionStore::new();

        let first = store
            .start_session("child-9", GameKind::SnakeWords)
            .await
            .unwrap();
        let second = store
            .start_session("child-9", GameKind::WordCatcher)
            .await
            .unwrap();
        let third = store
            .start_session("child-9", GameKind::BouncyLetters)
            .await
            .unwrap();

        let all = store.sessions_for_user("child-9").await;
        let active: Vec<_> = all.iter().filter(|s| s.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, third.session_id);

        // Superseded sessions got an end time.
        for closed in [&first.session_id, &second.session_id] {
            let session = store.session(closed).await.unwrap();
            assert!(!session.is_active);
            assert!(session.ended_at.is_some());
        }
    }

    #[tokio::test]
    async fn test_other_users_sessions_unaffected() {
        let store = MemorySessionStore::new();
        let other = store
            .start_session("child-7", GameKind::SnakeWords)
            .await
            .unwrap();
        store
            .start_session("child-9", GameKind::SnakeWords)
            .await
            .unwrap();

        assert!(store.session(&other.session_id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_append_to_active_session() {
        let store = MemorySessionStore::new();
        let started = store
            .start_session("child-9", GameKind::SnakeWords)
            .await
            .unwrap();

        let ack = store
            .append_emotion_sample(&started.session_id, sample("cat"))
            .await
            .unwrap();
        assert_eq!(ack.total_samples, 1);

        let ack = store
            .append_emotion_sample(&started.session_id, sample("dog"))
            .await
            .unwrap();
        assert_eq!(ack.total_samples, 2);

        let session = store.session(&started.session_id).await.unwrap();
        assert_eq!(session.rounds_played, 2);
    }

    #[tokio::test]
    async fn test_append_to_unknown_session_is_not_found() {
        let store = MemorySessionStore::new();
        let err = store
            .append_emotion_sample("missing", sample("cat"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_append_to_closed_session_is_rejected() {
        let store = MemorySessionStore::new();
        let started = store
            .start_session("child-9", GameKind::SnakeWords)
            .await
            .unwrap();
        store.end_session(&started.session_id, None).await.unwrap();

        let err = store
            .append_emotion_sample(&started.session_id, sample("cat"))
            .await
            .unwrap_err();
        assert!(err.is_session_closed());
    }

    #[tokio::test]
    async fn test_end_session_records_duration_and_summary() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let store = MemorySessionStore::with_clock(clock.clone());
        let started = store
            .start_session("child-9", GameKind::SnakeWords)
            .await
            .unwrap();
        store
            .append_emotion_sample(&started.session_id, sample("cat"))
            .await
            .unwrap();

        clock.advance_secs(300);
        let summary = store
            .end_session(&started.session_id, Some(300))
            .await
            .unwrap();

        assert_eq!(summary.duration_seconds, 300);
        assert_eq!(summary.total_samples, 1);
        assert_eq!(summary.rounds_played, 1);

        let session = store.session(&started.session_id).await.unwrap();
        assert_eq!(
            session.ended_at,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 5, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_active_session_lookup() {
        let store = MemorySessionStore::new();
        assert!(store.active_session("child-9").await.unwrap().is_none());

        let started = store
            .start_session("child-9", GameKind::SnakeWords)
            .await
            .unwrap();
        let active = store.active_session("child-9").await.unwrap().unwrap();
        assert_eq!(active.id, started.session_id);

        store.end_session(&started.session_id, None).await.unwrap();
        assert!(store.active_session("child-9").await.unwrap().is_none());
    }
}
