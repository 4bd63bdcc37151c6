//! Emotion probe seam.
//!
//! One `capture()` is one full camera-acquire → landmark-extract →
//! classify → camera-release cycle. Implementations live in the
//! interaction layer; the trait sits here so the application layer can
//! orchestrate without knowing about cameras or HTTP.

use async_trait::async_trait;
use thiserror::Error;

use crate::emotion::EmotionReading;

/// Failures of a single probe cycle.
///
/// All variants are per-tick and transient: callers treat them as "no
/// update this cycle" and keep the previous emotion/difficulty state.
#[derive(Error, Debug, Clone)]
pub enum ProbeError {
    /// No face or landmarks could be extracted from the frame.
    #[error("capture failed: {0}")]
    Capture(String),

    /// The remote classifier call failed or timed out.
    #[error("classifier failed: {0}")]
    Classifier(String),

    /// A capture is already in flight; this call did not touch the camera.
    #[error("capture already in flight")]
    Busy,
}

/// Captures one emotion reading from the player's face.
#[async_trait]
pub trait EmotionProbe: Send + Sync {
    /// Runs one capture cycle and returns the classified emotion.
    ///
    /// At most one capture may be in flight per probe; re-entrant calls
    /// must return [`ProbeError::Busy`] without acquiring the camera.
    async fn capture(&self) -> Result<EmotionReading, ProbeError>;
}
