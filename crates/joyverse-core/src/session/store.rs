//! Session store trait.
//!
//! Defines the interface for session persistence operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::model::{EmotionSample, GameKind, Session, SessionSummary};
use crate::error::Result;

/// Acknowledgement of a successful session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartedSession {
    pub session_id: String,
    pub game: GameKind,
}

/// Acknowledgement of a successful sample append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendAck {
    /// Total samples the session holds after the append
    pub total_samples: usize,
}

/// An abstract store for session persistence.
///
/// This trait defines the contract for persisting sessions and their
/// emotion samples, decoupling the controller from the specific storage
/// mechanism (remote HTTP API, in-memory store for tests/dev).
///
/// Every call is an independent request to the persistence boundary; no
/// transactional coupling between calls is assumed. The controller's
/// one-commit-per-word discipline is the only duplicate-write prevention.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Starts a new active session for `user_id`.
    ///
    /// Any other active session for the same user is closed first, so at
    /// most one session per user is ever active. The new session starts on
    /// the default tier.
    async fn start_session(&self, user_id: &str, game: GameKind) -> Result<StartedSession>;

    /// Appends one emotion sample to an active session.
    ///
    /// # Errors
    ///
    /// - [`JoyverseError::NotFound`] if the session does not exist
    /// - [`JoyverseError::SessionClosed`] if the session has ended
    ///
    /// [`JoyverseError::NotFound`]: crate::error::JoyverseError::NotFound
    /// [`JoyverseError::SessionClosed`]: crate::error::JoyverseError::SessionClosed
    async fn append_emotion_sample(
        &self,
        session_id: &str,
        sample: EmotionSample,
    ) -> Result<AppendAck>;

    /// Closes a session, recording the final duration if given.
    ///
    /// Returns the end-of-session summary. Ending an already-closed session
    /// refreshes the duration and returns the summary rather than failing;
    /// ending an unknown session is `NotFound`.
    async fn end_session(
        &self,
        session_id: &str,
        duration_seconds: Option<u64>,
    ) -> Result<SessionSummary>;

    /// Returns the user's currently active session, if any.
    async fn active_session(&self, user_id: &str) -> Result<Option<Session>>;
}
