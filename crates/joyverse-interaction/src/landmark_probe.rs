//! Landmark-based emotion probe.
//!
//! Composes a [`FrameSource`] and an [`EmotionClassifier`] into the
//! [`EmotionProbe`] the session controller polls. Exactly one capture may
//! be in flight at a time; a second call while busy returns
//! [`ProbeError::Busy`] without touching the camera.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use joyverse_core::emotion::{EmotionReading, is_supported_emotion};
use joyverse_core::probe::{EmotionProbe, ProbeError};

use crate::classifier_api_client::EmotionClassifier;
use crate::frame_source::FrameSource;

/// Probe that extracts one landmark frame and classifies it remotely.
pub struct LandmarkEmotionProbe {
    frames: Arc<dyn FrameSource>,
    classifier: Arc<dyn EmotionClassifier>,
    in_flight: AtomicBool,
}

impl LandmarkEmotionProbe {
    pub fn new(frames: Arc<dyn FrameSource>, classifier: Arc<dyn EmotionClassifier>) -> Self {
        Self {
            frames,
            classifier,
            in_flight: AtomicBool::new(false),
        }
    }

    async fn run_cycle(&self) -> Result<EmotionReading, ProbeError> {
        let frame = self.frames.capture_landmarks().await?;
        let reading = self.classifier.classify(&frame).await?;
        if !is_supported_emotion(&reading.emotion) {
            // Unrecognized labels still flow through; the policy holds the
            // tier for them.
            debug!(emotion = %reading.emotion, "classifier returned an unrecognized label");
        }
        debug!(
            emotion = %reading.emotion,
            confidence = reading.confidence,
            "probe cycle completed"
        );
        Ok(reading)
    }
}

/// Clears the in-flight flag even if the capture future is dropped mid-await.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[async_trait]
impl EmotionProbe for LandmarkEmotionProbe {
    async fn capture(&self) -> Result<EmotionReading, ProbeError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("dropping probe tick, capture already in flight");
            return Err(ProbeError::Busy);
        }
        let _guard = InFlightGuard(&self.in_flight);

        self.run_cycle().await
    }
}
