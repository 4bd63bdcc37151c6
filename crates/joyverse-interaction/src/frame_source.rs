//! Camera/landmark-extraction seam.
//!
//! The actual camera and face-mesh pipeline is a platform capability
//! outside this workspace; implementations of [`FrameSource`] wrap it.
//! The contract matters more than the implementation: one call is one
//! acquire → extract → release cycle, so the camera is never held open
//! between polls.

use async_trait::async_trait;

use joyverse_core::probe::ProbeError;

/// Number of floats one landmark frame carries (468 landmarks × 2 coords).
pub const LANDMARK_VECTOR_LEN: usize = 936;

/// One face-landmark snapshot extracted from a single camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    pub landmarks: Vec<f32>,
}

impl LandmarkFrame {
    /// Wraps a raw landmark vector, rejecting frames of the wrong arity.
    pub fn new(landmarks: Vec<f32>) -> Result<Self, ProbeError> {
        if landmarks.len() != LANDMARK_VECTOR_LEN {
            return Err(ProbeError::Capture(format!(
                "expected {LANDMARK_VECTOR_LEN} landmark values, got {}",
                landmarks.len()
            )));
        }
        Ok(Self { landmarks })
    }
}

/// Produces one landmark frame per call.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Acquires the camera, extracts landmarks from one frame, and releases
    /// the camera before returning.
    ///
    /// # Errors
    ///
    /// [`ProbeError::Capture`] when no face/landmarks are found or the
    /// camera cannot be acquired.
    async fn capture_landmarks(&self) -> Result<LandmarkFrame, ProbeError>;
}
