//! Engine assembly.
//!
//! Wires the configured HTTP store and classifier-backed probe into a
//! ready-to-use [`GameSessionController`]. The camera/landmark side cannot
//! be constructed here — it is a platform capability — so callers hand in
//! their [`FrameSource`].

use std::sync::Arc;

use joyverse_core::session::GameKind;
use joyverse_infrastructure::{ConfigService, EngineConfig, HttpSessionStore};
use joyverse_interaction::{EmotionClassifierClient, FrameSource, LandmarkEmotionProbe};

use crate::controller::{GameSessionController, SessionTiming};

/// Builds controllers from one engine configuration.
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Reads the configuration through the given service.
    pub fn from_config_service(service: &ConfigService) -> Self {
        Self::new(service.get_config())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Assembles a controller for `user_id` playing `game`.
    pub fn build(
        &self,
        user_id: impl Into<String>,
        game: GameKind,
        frames: Arc<dyn FrameSource>,
    ) -> Arc<GameSessionController> {
        let store = Arc::new(
            HttpSessionStore::new(self.config.backend_url.clone())
                .with_request_timeout(self.config.request_timeout()),
        );
        let classifier = Arc::new(
            EmotionClassifierClient::new(self.config.classifier_url.clone())
                .with_request_timeout(self.config.capture_timeout()),
        );
        let probe = Arc::new(LandmarkEmotionProbe::new(frames, classifier));

        Arc::new(
            GameSessionController::new(store, probe, user_id, game)
                .with_timing(SessionTiming::from_config(&self.config)),
        )
    }
}
