//! Remote-capability clients for the Joyverse engine: the camera/landmark
//! seam and the FER classifier client, composed into the emotion probe the
//! session controller polls.

pub mod classifier_api_client;
pub mod frame_source;
pub mod landmark_probe;

pub use classifier_api_client::{EmotionClassifier, EmotionClassifierClient};
pub use frame_source::{FrameSource, LANDMARK_VECTOR_LEN, LandmarkFrame};
pub use landmark_probe::LandmarkEmotionProbe;
