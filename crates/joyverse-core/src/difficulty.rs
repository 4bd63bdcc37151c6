//! Difficulty tiers and the emotion-driven adaptation policy.
//!
//! The policy is the pure heart of the adaptation loop: no I/O, no state,
//! just a rule table from (current tier, emotion, confidence) to the next
//! tier. Tier movements are always single steps.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::emotion::EmotionCategory;

/// Ordered difficulty tier for the word games.
///
/// The derived `Ord` follows declaration order: `Easy < Medium < Hard`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DifficultyTier {
    Easy,
    Medium,
    Hard,
}

impl DifficultyTier {
    /// One tier harder, saturating at `Hard`.
    pub fn step_up(self) -> Self {
        match self {
            Self::Easy => Self::Medium,
            Self::Medium | Self::Hard => Self::Hard,
        }
    }

    /// One tier easier, saturating at `Easy`.
    pub fn step_down(self) -> Self {
        match self {
            Self::Hard => Self::Medium,
            Self::Medium | Self::Easy => Self::Easy,
        }
    }
}

impl Default for DifficultyTier {
    /// New sessions start on `Medium`.
    fn default() -> Self {
        Self::Medium
    }
}

// Confidence the classifier must report before a tier moves. Raising into
// hard is stricter than raising out of easy; lowering out of hard is the
// most permissive drop.
const RAISE_TO_MEDIUM_THRESHOLD: f32 = 0.7;
const RAISE_TO_HARD_THRESHOLD: f32 = 0.8;
const LOWER_TO_MEDIUM_THRESHOLD: f32 = 0.6;
const LOWER_TO_EASY_THRESHOLD: f32 = 0.7;

/// Stateless mapping from emotion evidence to difficulty tiers.
pub struct DifficultyPolicy;

impl DifficultyPolicy {
    /// Computes the next tier from the current tier and one emotion reading.
    ///
    /// - Positive emotions raise one step when confidence clears the step's
    ///   threshold (`easy→medium` > 0.7, `medium→hard` > 0.8).
    /// - Negative emotions lower one step when confidence clears the step's
    ///   threshold (`hard→medium` > 0.6, `medium→easy` > 0.7).
    /// - Neutral and unrecognized emotions hold the current tier.
    ///
    /// The result never differs from `current` by more than one step.
    pub fn next(current: DifficultyTier, emotion: &str, confidence: f32) -> DifficultyTier {
        match EmotionCategory::classify(emotion) {
            EmotionCategory::Positive => match current {
                DifficultyTier::Easy if confidence > RAISE_TO_MEDIUM_THRESHOLD => {
                    DifficultyTier::Medium
                }
                DifficultyTier::Medium if confidence > RAISE_TO_HARD_THRESHOLD => {
                    DifficultyTier::Hard
                }
                other => other,
            },
            EmotionCategory::Negative => match current {
                DifficultyTier::Hard if confidence > LOWER_TO_MEDIUM_THRESHOLD => {
                    DifficultyTier::Medium
                }
                DifficultyTier::Medium if confidence > LOWER_TO_EASY_THRESHOLD => {
                    DifficultyTier::Easy
                }
                other => other,
            },
            EmotionCategory::Neutral | EmotionCategory::Unknown => current,
        }
    }

    /// Cold-start recommendation with no current tier to anchor on.
    ///
    /// Used when a game wants a starting tier from a single reading:
    /// confident positive → `Hard`, tentative positive → `Medium`,
    /// confident negative → `Medium`, struggling negative → `Easy`,
    /// everything else → `Medium`.
    pub fn recommend(emotion: &str, confidence: f32) -> DifficultyTier {
        match EmotionCategory::classify(emotion) {
            EmotionCategory::Positive => {
                if confidence > RAISE_TO_MEDIUM_THRESHOLD {
                    DifficultyTier::Hard
                } else {
                    DifficultyTier::Medium
                }
            }
            EmotionCategory::Negative => {
                if confidence > LOWER_TO_MEDIUM_THRESHOLD {
                    DifficultyTier::Medium
                } else {
                    DifficultyTier::Easy
                }
            }
            EmotionCategory::Neutral | EmotionCategory::Unknown => DifficultyTier::Medium,
        }
    }
}
