//! Emotion labels, categories, and cosmetic background mapping.
//!
//! The classifier boundary returns free-form lowercase labels. This module
//! owns the accepted-label set, the category split the difficulty policy
//! keys on, and the mapping from labels to the cosmetic background themes
//! the game UIs render.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::Display;

/// Labels the positive category covers (raise difficulty when confident).
const POSITIVE_EMOTIONS: &[&str] = &["happy", "excited", "confident", "proud", "joy"];

/// Labels the negative category covers (lower difficulty when confident).
const NEGATIVE_EMOTIONS: &[&str] = &[
    "sad",
    "sadness",
    "frustrated",
    "frustration",
    "angry",
    "anger",
    "anxious",
    "fearful",
    "fear",
    "disgust",
];

/// Labels that hold the current difficulty.
const NEUTRAL_EMOTIONS: &[&str] = &[
    "neutral",
    "calm",
    "focused",
    "surprise",
    "surprised",
    "disgusted",
];

/// The category a label falls into for difficulty adaptation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionCategory {
    Positive,
    Negative,
    Neutral,
    /// Label outside the accepted set; treated like neutral by the policy.
    Unknown,
}

impl EmotionCategory {
    /// Classifies a label into its adaptation category.
    ///
    /// Matching is case-insensitive; unrecognized labels are `Unknown`.
    pub fn classify(label: &str) -> Self {
        let lower = label.to_lowercase();
        let lower = lower.as_str();
        if POSITIVE_EMOTIONS.contains(&lower) {
            Self::Positive
        } else if NEGATIVE_EMOTIONS.contains(&lower) {
            Self::Negative
        } else if NEUTRAL_EMOTIONS.contains(&lower) {
            Self::Neutral
        } else {
            Self::Unknown
        }
    }
}

/// Returns true when `label` is in the accepted emotion set.
pub fn is_supported_emotion(label: &str) -> bool {
    EmotionCategory::classify(label) != EmotionCategory::Unknown
}

/// Normalizes a raw classifier label for storage (lowercased, trimmed).
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// A single classifier output: the detected label and its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionReading {
    /// Normalized (lowercase) emotion label
    pub emotion: String,
    /// Confidence score in [0, 1]
    pub confidence: f32,
}

impl EmotionReading {
    /// Creates a reading, normalizing the label and clamping confidence to [0, 1].
    pub fn new(emotion: impl AsRef<str>, confidence: f32) -> Self {
        Self {
            emotion: normalize_label(emotion.as_ref()),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// The adaptation category of this reading's label.
    pub fn category(&self) -> EmotionCategory {
        EmotionCategory::classify(&self.emotion)
    }
}

/// Cosmetic background theme a game UI can render for an emotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackgroundTheme {
    Frustration,
    Sadness,
    Anger,
    Fear,
    Neutral,
    Happy,
}

static BACKGROUND_THEMES: Lazy<HashMap<&'static str, BackgroundTheme>> = Lazy::new(|| {
    HashMap::from([
        ("frustration", BackgroundTheme::Frustration),
        ("frustrated", BackgroundTheme::Frustration),
        ("sadness", BackgroundTheme::Sadness),
        ("sad", BackgroundTheme::Sadness),
        ("anger", BackgroundTheme::Anger),
        ("angry", BackgroundTheme::Anger),
        ("fear", BackgroundTheme::Fear),
        ("fearful", BackgroundTheme::Fear),
        ("neutral", BackgroundTheme::Neutral),
        ("happy", BackgroundTheme::Happy),
        ("joy", BackgroundTheme::Happy),
    ])
});

/// Maps a label to its background theme, if it has one.
///
/// `surprised` is deliberately unmapped: the UIs keep the previous
/// background for it.
pub fn background_theme(label: &str) -> Option<BackgroundTheme> {
    BACKGROUND_THEMES.get(normalize_label(label).as_str()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_categories() {
        assert_eq!(EmotionCategory::classify("happy"), EmotionCategory::Positive);
        assert_eq!(EmotionCategory::classify("Proud"), EmotionCategory::Positive);
        assert_eq!(
            EmotionCategory::classify("frustrated"),
            EmotionCategory::Negative
        );
        assert_eq!(EmotionCategory::classify("disgust"), EmotionCategory::Negative);
        assert_eq!(EmotionCategory::classify("calm"), EmotionCategory::Neutral);
        assert_eq!(EmotionCategory::classify("surprise"), EmotionCategory::Neutral);
        assert_eq!(
            EmotionCategory::classify("bewildered"),
            EmotionCategory::Unknown
        );
    }

    #[test]
    fn test_reading_clamps_confidence() {
        assert_eq!(EmotionReading::new("Happy", 1.7).confidence, 1.0);
        assert_eq!(EmotionReading::new("happy", -0.2).confidence, 0.0);
        assert_eq!(EmotionReading::new("  HAPPY ", 0.5).emotion, "happy");
    }

    #[test]
    fn test_reading_category() {
        assert_eq!(
            EmotionReading::new("happy", 0.9).category(),
            EmotionCategory::Positive
        );
        assert!(is_supported_emotion("fear"));
        assert!(!is_supported_emotion("bewildered"));
    }

    #[test]
    fn test_background_theme_mapping() {
        assert_eq!(background_theme("happy"), Some(BackgroundTheme::Happy));
        assert_eq!(background_theme("sad"), Some(BackgroundTheme::Sadness));
        assert_eq!(background_theme("surprised"), None);
        assert_eq!(background_theme("focused"), None);
    }
}
