//! Persistence and configuration implementations for the Joyverse engine.

pub mod config_service;
pub mod http_session_store;
pub mod memory_session_store;
pub mod paths;

pub use config_service::{ConfigService, EngineConfig};
pub use http_session_store::HttpSessionStore;
pub use memory_session_store::MemorySessionStore;
