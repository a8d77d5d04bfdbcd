//! REST API for the PawFeed backend.
//!
//! Provides:
//! - axum server with public auth routes and bearer-token-protected
//!   feed/schedule routes
//! - the feed orchestrator composing command dispatch with feed-log
//!   persistence
//! - the schedule runner firing stored schedules
//! - the voice-command grammar

pub mod auth;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod scheduler;
pub mod server;
pub mod voice;

pub use error::{ApiError, Result};
pub use orchestrator::FeedOrchestrator;
pub use scheduler::ScheduleRunner;
pub use server::{create_router, run, AppState};
pub use voice::{ParsedFeed, VoiceParseError, VoiceParser};
