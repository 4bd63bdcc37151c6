//! Application layer of the Joyverse engine: the game session controller
//! and the wiring that assembles it from configuration.

pub mod controller;
pub mod engine;

pub use controller::{GameSessionController, Phase, SessionTiming};
pub use engine::EngineBuilder;
