//! HttpSessionStore - REST implementation of the session persistence API.
//!
//! Talks to the Joyverse backend's game routes. Each trait call is one
//! independent HTTP request; there is no client-side caching of session
//! state beyond the session→user mapping the append endpoint requires.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use joyverse_core::error::{JoyverseError, Result};
use joyverse_core::session::{
    AppendAck, EmotionSample, GameKind, Session, SessionStore, SessionSummary, StartedSession,
};

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const START_PATH: &str = "/api/game/start";
const EMOTION_PATH: &str = "/api/game/emotion";
const END_PATH: &str = "/api/game/end";
const CURRENT_SESSION_PATH: &str = "/api/game/current-session";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Session store that talks to the backend HTTP API.
pub struct HttpSessionStore {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    /// The append endpoint authenticates the owning user, so remember the
    /// user for every session this client starts.
    session_users: Mutex<HashMap<String, String>>,
}

impl HttpSessionStore {
    /// Creates a new store against the provided backend base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            session_users: Mutex::new(HashMap::new()),
        }
    }

    /// Loads the base URL from the JOYVERSE_BACKEND_URL environment
    /// variable, falling back to the local development default.
    pub fn from_env() -> Self {
        let base_url = env::var("JOYVERSE_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Self::new(base_url)
    }

    /// Overrides the per-request timeout after construction.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn user_for(&self, session_id: &str) -> Option<String> {
        let users = self.session_users.lock().unwrap();
        users.get(session_id).cloned()
    }

    async fn post_json<B, R>(&self, path: &str, entity_id: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(self.url(path))
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| JoyverseError::persistence(format!("backend request failed: {err}")))?;

        Self::decode_response(response, entity_id).await
    }

    async fn decode_response<R>(response: reqwest::Response, entity_id: &str) -> Result<R>
    where
        R: for<'de> Deserialize<'de>,
    {
        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read backend error body".to_string());
            return Err(map_http_error(status, body_text, entity_id));
        }

        response.json().await.map_err(|err| {
            JoyverseError::persistence(format!("failed to parse backend response: {err}"))
        })
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn start_session(&self, user_id: &str, game: GameKind) -> Result<StartedSession> {
        let request = StartGameRequest {
            user_id,
            game_name: game.display_name(),
        };
        let response: StartGameResponse = self.post_json(START_PATH, user_id, &request).await?;

        debug!(session_id = %response.session_id, "session started");
        {
            let mut users = self.session_users.lock().unwrap();
            users.insert(response.session_id.clone(), user_id.to_string());
        }

        Ok(StartedSession {
            session_id: response.session_id,
            game,
        })
    }

    async fn append_emotion_sample(
        &self,
        session_id: &str,
        sample: EmotionSample,
    ) -> Result<AppendAck> {
        let user_id = self.user_for(session_id).ok_or_else(|| {
            JoyverseError::not_found("session", session_id)
        })?;
        let request = SubmitEmotionRequest {
            user_id: &user_id,
            session_id,
            emotion: &sample.emotion,
            confidence: sample.confidence,
            word: &sample.word,
            difficulty: sample.difficulty.to_string(),
        };
        // The backend also answers with its own next_difficulty suggestion;
        // the tier decision is client-side policy, so only the ack is kept.
        let response: SubmitEmotionResponse =
            self.post_json(EMOTION_PATH, session_id, &request).await?;

        Ok(AppendAck {
            total_samples: response.total_samples,
        })
    }

    async fn end_session(
        &self,
        session_id: &str,
        duration_seconds: Option<u64>,
    ) -> Result<SessionSummary> {
        let request = EndGameRequest {
            session_id,
            duration_seconds,
        };
        let response: EndGameResponse = self.post_json(END_PATH, session_id, &request).await?;

        let summary = response.session_summary;
        Ok(SessionSummary {
            session_id: session_id.to_string(),
            game: game_kind_from_display(&summary.game_name),
            duration_seconds: summary.duration_seconds,
            rounds_played: summary.rounds_played,
            total_samples: summary.total_samples,
        })
    }

    async fn active_session(&self, user_id: &str) -> Result<Option<Session>> {
        let url = format!("{}/{user_id}", self.url(CURRENT_SESSION_PATH));
        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|err| JoyverseError::persistence(format!("backend request failed: {err}")))?;

        let parsed: CurrentSessionResponse = Self::decode_response(response, user_id).await?;
        let session = parsed.session.map(|dto| dto.into_session(user_id));

        // An adopted session must be appendable too, so learn its owner.
        if let Some(ref session) = session {
            let mut users = self.session_users.lock().unwrap();
            users.insert(session.id.clone(), user_id.to_string());
        }

        Ok(session)
    }
}

// ============================================================================
// Wire DTOs (backend field naming is camelCase)
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartGameRequest<'a> {
    user_id: &'a str,
    game_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartGameResponse {
    session_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitEmotionRequest<'a> {
    user_id: &'a str,
    session_id: &'a str,
    emotion: &'a str,
    confidence: f32,
    word: &'a str,
    difficulty: String,
}

#[derive(Deserialize)]
struct SubmitEmotionResponse {
    #[serde(default)]
    total_samples: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EndGameRequest<'a> {
    session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<u64>,
}

#[derive(Deserialize)]
struct EndGameResponse {
    session_summary: SessionSummaryDto,
}

#[derive(Deserialize)]
struct SessionSummaryDto {
    #[serde(default)]
    duration_seconds: u64,
    #[serde(default)]
    total_samples: usize,
    #[serde(default)]
    rounds_played: u32,
    #[serde(default)]
    game_name: String,
}

#[derive(Deserialize)]
struct CurrentSessionResponse {
    session: Option<CurrentSessionDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentSessionDto {
    session_id: String,
    #[serde(default)]
    game_name: String,
    #[serde(default)]
    rounds_played: u32,
    #[serde(default)]
    duration_seconds: u64,
    #[serde(default)]
    recent_emotions: Vec<EmotionSampleDto>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct EmotionSampleDto {
    word: String,
    emotion: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl CurrentSessionDto {
    fn into_session(self, user_id: &str) -> Session {
        let started_at = self.created_at.unwrap_or_else(Utc::now);
        let mut session = Session::new(
            self.session_id,
            user_id,
            game_kind_from_display(&self.game_name),
            started_at,
        );
        session.duration_seconds = self.duration_seconds;
        for dto in self.recent_emotions {
            let difficulty = dto
                .difficulty
                .as_deref()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_default();
            session.push_sample(EmotionSample::new(
                dto.word,
                dto.emotion,
                dto.confidence,
                difficulty,
                dto.timestamp.unwrap_or(started_at),
            ));
        }
        // recent_emotions is a tail window; the backend's round counter wins.
        session.rounds_played = self.rounds_played;
        session
    }
}

#[derive(Deserialize)]
struct BackendErrorResponse {
    error: String,
}

fn map_http_error(status: StatusCode, body: String, entity_id: &str) -> JoyverseError {
    let message = serde_json::from_str::<BackendErrorResponse>(&body)
        .map(|wrapper| wrapper.error)
        .unwrap_or(body);

    match status {
        StatusCode::NOT_FOUND => JoyverseError::not_found("session", entity_id),
        _ => JoyverseError::persistence(format!("backend returned {status}: {message}")),
    }
}

fn game_kind_from_display(name: &str) -> GameKind {
    match name {
        "Word Catcher" => GameKind::WordCatcher,
        "Bouncy Letters" => GameKind::BouncyLetters,
        _ => GameKind::SnakeWords,
    }
}
