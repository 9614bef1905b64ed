//! The "report a sighting" flow: answer validation, the per-sender cooldown
//! and the questionnaire state machine.

pub mod cooldown;
pub mod engine;
pub mod state;
pub mod store;
pub mod validation;

pub use cooldown::RateLimiter;
pub use engine::ConversationEngine;
pub use store::{InsertOutcome, SightingStore};
pub use validation::AnswerPolicy;
