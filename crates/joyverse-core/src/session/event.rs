use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::SessionSummary;
use crate::difficulty::DifficultyTier;
use crate::emotion::BackgroundTheme;

/// Game lifecycle states reported by the game UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Ready,
    Playing,
    Paused,
    GameOver,
}

/// What caused a pending emotion to be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushTrigger {
    WordCompleted,
    PeriodicFlush,
    ManualSave,
    Unload,
    GameOver,
}

/// High-level events the session controller publishes to its subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A probe result mapped to a cosmetic background theme.
    BackgroundEmotionChanged {
        emotion: String,
        theme: BackgroundTheme,
    },
    /// The policy moved the difficulty tier.
    DifficultyChanged {
        previous: DifficultyTier,
        next: DifficultyTier,
    },
    /// A pending emotion was committed as a sample.
    SampleCommitted {
        word: String,
        emotion: String,
        trigger: FlushTrigger,
    },
    /// A manual or terminal save finished.
    SaveCompleted {
        at: DateTime<Utc>,
    },
    /// A terminal flush could not be persisted; data may be lost.
    SaveFailed {
        reason: String,
    },
    /// The session was closed.
    SessionEnded {
        summary: SessionSummary,
    },
}
