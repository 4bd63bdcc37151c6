//! Session domain module.
//!
//! This module contains all session-related domain models, the store
//! interface, and the ephemeral pending-emotion slot.
//!
//! # Module Structure
//!
//! - `model`: Core session aggregate (`Session`, `EmotionSample`, `GameKind`)
//! - `event`: Game status and controller event types
//! - `pending`: The ephemeral pending-emotion slot
//! - `store`: Store trait for session persistence

mod event;
mod model;
mod pending;
mod store;

// Re-export public API
pub use event::{FlushTrigger, GameStatus, SessionEvent};
pub use model::{EmotionSample, GameKind, ProgressionEntry, Session, SessionSummary};
pub use pending::PendingEmotion;
pub use store::{AppendAck, SessionStore, StartedSession};
