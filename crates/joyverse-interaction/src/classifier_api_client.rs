//! EmotionClassifierClient - REST client for the remote FER service.
//!
//! The classifier is an opaque capability: it takes a landmark vector and
//! returns a categorical emotion with a confidence score. Configuration
//! priority: explicit base URL > JOYVERSE_CLASSIFIER_URL environment variable.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use joyverse_core::emotion::EmotionReading;
use joyverse_core::probe::ProbeError;

use crate::frame_source::{LANDMARK_VECTOR_LEN, LandmarkFrame};

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DETECT_PATH: &str = "/detect_emotion";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Classifies a landmark frame into an emotion reading.
///
/// Split from the HTTP client so the probe can be exercised without a
/// running classifier service.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn classify(&self, frame: &LandmarkFrame) -> Result<EmotionReading, ProbeError>;
}

/// Client that talks to the FER classifier HTTP API.
#[derive(Clone)]
pub struct EmotionClassifierClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl EmotionClassifierClient {
    /// Creates a new client against the provided base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: trim_trailing_slash(base_url.into()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Loads the base URL from the JOYVERSE_CLASSIFIER_URL environment
    /// variable, falling back to the local development default.
    pub fn from_env() -> Self {
        let base_url =
            env::var("JOYVERSE_CLASSIFIER_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Self::new(base_url)
    }

    /// Overrides the per-request timeout after construction.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn send_request(&self, body: &DetectEmotionRequest<'_>) -> Result<EmotionReading, ProbeError> {
        let url = format!("{}{}", self.base_url, DETECT_PATH);
        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                ProbeError::Classifier(format!("classifier request failed: {err}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read classifier error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        let parsed: DetectEmotionResponse = response.json().await.map_err(|err| {
            ProbeError::Classifier(format!("failed to parse classifier response: {err}"))
        })?;

        Ok(EmotionReading::new(parsed.emotion, parsed.confidence))
    }
}

#[async_trait]
impl EmotionClassifier for EmotionClassifierClient {
    async fn classify(&self, frame: &LandmarkFrame) -> Result<EmotionReading, ProbeError> {
        // The service rejects anything but a full frame; fail locally first.
        if frame.landmarks.len() != LANDMARK_VECTOR_LEN {
            return Err(ProbeError::Capture(format!(
                "expected {LANDMARK_VECTOR_LEN} landmark values, got {}",
                frame.landmarks.len()
            )));
        }

        let request = DetectEmotionRequest {
            landmarks: &frame.landmarks,
        };
        self.send_request(&request).await
    }
}

#[derive(Serialize)]
struct DetectEmotionRequest<'a> {
    landmarks: &'a [f32],
}

#[derive(Deserialize)]
struct DetectEmotionResponse {
    emotion: String,
    confidence: f32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    detail: String,
}

fn map_http_error(status: StatusCode, body: String) -> ProbeError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.detail)
        .unwrap_or(body);
    ProbeError::Classifier(format!("classifier returned {status}: {message}"))
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let landmarks = vec![0.25_f32; 4];
        let request = DetectEmotionRequest {
            landmarks: &landmarks,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["landmarks"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_map_http_error_extracts_detail() {
        let err = map_http_error(
            StatusCode::BAD_REQUEST,
            r#"{"detail":"No landmarks data provided"}"#.to_string(),
        );
        match err {
            ProbeError::Classifier(message) => {
                assert!(message.contains("No landmarks data provided"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_map_http_error_falls_back_to_raw_body() {
        let err = map_http_error(StatusCode::BAD_GATEWAY, "upstream down".to_string());
        match err {
            ProbeError::Classifier(message) => assert!(message.contains("upstream down")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = EmotionClassifierClient::new("http://localhost:8000/");
        assert_eq!(client.base_url, "http://localhost:8000");
    }
}
