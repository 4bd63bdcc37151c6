use chrono::{DateTime, Utc};

use super::model::EmotionSample;
use crate::difficulty::DifficultyTier;
use crate::emotion::EmotionReading;

/// The single unconsumed emotion reading awaiting a word to attach to.
///
/// Client-only and never persisted. Each new probe result overwrites the
/// slot; the slot is consumed exactly once, when a word completes or a
/// flush forces it out.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEmotion {
    pub emotion: String,
    pub confidence: f32,
    /// Tier in effect when the reading was captured; the committed sample
    /// carries this, not the tier at commit time.
    pub difficulty_at_capture: DifficultyTier,
    pub captured_at: DateTime<Utc>,
}

impl PendingEmotion {
    pub fn from_reading(
        reading: &EmotionReading,
        difficulty_at_capture: DifficultyTier,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            emotion: reading.emotion.clone(),
            confidence: reading.confidence,
            difficulty_at_capture,
            captured_at,
        }
    }

    /// Materializes the pending reading as a sample for `word`.
    pub fn into_sample(self, word: impl Into<String>) -> EmotionSample {
        EmotionSample::new(
            word,
            self.emotion,
            self.confidence,
            self.difficulty_at_capture,
            self.captured_at,
        )
    }
}
