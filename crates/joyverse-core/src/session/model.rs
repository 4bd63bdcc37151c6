//! Session domain model.
//!
//! This module contains the core `Session` aggregate: one play session of
//! one game by one child, with its append-only emotion samples and the
//! difficulty tier in effect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumString};

use crate::difficulty::DifficultyTier;
use crate::emotion::normalize_label;

/// The games a session can belong to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum GameKind {
    SnakeWords,
    WordCatcher,
    BouncyLetters,
}

impl GameKind {
    /// Human-readable name the dashboards show.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SnakeWords => "Snake Word Game",
            Self::WordCatcher => "Word Catcher",
            Self::BouncyLetters => "Bouncy Letters",
        }
    }
}

impl Default for GameKind {
    fn default() -> Self {
        Self::SnakeWords
    }
}

/// One emotion observation tied to a word, embedded in its owning session.
///
/// Samples are append-only: once recorded they are never mutated. They are
/// created only when a pending emotion is committed (word completion,
/// periodic flush, or unload flush) — never directly from raw polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSample {
    /// The word the player was solving when the emotion was captured
    pub word: String,
    /// Normalized (lowercase) emotion label
    pub emotion: String,
    /// Classifier confidence in [0, 1]
    pub confidence: f32,
    /// Difficulty tier in effect at capture time
    pub difficulty: DifficultyTier,
    /// When the reading was captured
    pub captured_at: DateTime<Utc>,
}

impl EmotionSample {
    /// Creates a sample, normalizing the label and clamping confidence.
    pub fn new(
        word: impl Into<String>,
        emotion: impl AsRef<str>,
        confidence: f32,
        difficulty: DifficultyTier,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            word: word.into(),
            emotion: normalize_label(emotion.as_ref()),
            confidence: confidence.clamp(0.0, 1.0),
            difficulty,
            captured_at,
        }
    }
}

/// One entry of a session's difficulty progression, in sample order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionEntry {
    /// 1-based position in the session
    pub order: usize,
    pub word: String,
    pub difficulty: DifficultyTier,
    pub emotion: String,
}

/// Compact end-of-session report returned when a session is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub game: GameKind,
    pub duration_seconds: u64,
    pub rounds_played: u32,
    pub total_samples: usize,
}

/// A play session aggregate.
///
/// Invariants:
/// - At most one active session exists per user; starting a new session
///   closes any prior active ones (enforced by the store).
/// - `samples` is append-only and `rounds_played` tracks its length.
/// - A closed session (`is_active == false`) rejects further samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identifier assigned by the store
    pub id: String,
    /// Owning user's identifier
    pub user_id: String,
    /// Which game this session belongs to
    pub game: GameKind,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// When the session ended, if it has
    pub ended_at: Option<DateTime<Utc>>,
    /// Whether the session is still accepting samples
    pub is_active: bool,
    /// Current difficulty tier
    pub difficulty: DifficultyTier,
    /// Number of rounds (words) with a recorded sample
    pub rounds_played: u32,
    /// Total play duration in seconds, reported at save/end time
    pub duration_seconds: u64,
    /// Ordered emotion samples collected during play
    pub samples: Vec<EmotionSample>,
}

impl Session {
    /// Creates a fresh active session at the default tier.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        game: GameKind,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            game,
            started_at,
            ended_at: None,
            is_active: true,
            difficulty: DifficultyTier::default(),
            rounds_played: 0,
            duration_seconds: 0,
            samples: Vec::new(),
        }
    }

    /// Appends a sample and bumps the round counter.
    pub fn push_sample(&mut self, sample: EmotionSample) {
        self.samples.push(sample);
        self.rounds_played = self.samples.len() as u32;
    }

    /// Closes the session at `ended_at`, recording the final duration.
    pub fn close(&mut self, ended_at: DateTime<Utc>, duration_seconds: Option<u64>) {
        self.is_active = false;
        self.ended_at = Some(ended_at);
        if let Some(duration) = duration_seconds {
            self.duration_seconds = duration;
        }
    }

    /// Mean confidence across all samples, or 0.0 for an empty session.
    pub fn average_confidence(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: f32 = self.samples.iter().map(|s| s.confidence).sum();
        total / self.samples.len() as f32
    }

    /// Count of samples per emotion label.
    pub fn emotion_distribution(&self) -> HashMap<String, usize> {
        let mut distribution = HashMap::new();
        for sample in &self.samples {
            *distribution.entry(sample.emotion.clone()).or_insert(0) += 1;
        }
        distribution
    }

    /// The word/tier/emotion trail in sample order, for therapist review.
    pub fn difficulty_progression(&self) -> Vec<ProgressionEntry> {
        self.samples
            .iter()
            .enumerate()
            .map(|(index, sample)| ProgressionEntry {
                order: index + 1,
                word: sample.word.clone(),
                difficulty: sample.difficulty,
                emotion: sample.emotion.clone(),
            })
            .collect()
    }

    /// The end-of-session report.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            game: self.game,
            duration_seconds: self.duration_seconds,
            rounds_played: self.rounds_played,
            total_samples: self.samples.len(),
        }
    }
}
