//! Core chat components
//!
//! Chatroom and message collections, the AI reply gateway, and the
//! orchestration that ties a user's turn to its reply.

mod gateway;
mod message_log;
mod orchestrator;
mod registry;
mod session;
mod store;

pub use gateway::{AiGateway, ReplySource};
pub use message_log::MessageLog;
pub use orchestrator::ConversationOrchestrator;
pub use registry::ChatroomRegistry;
pub use session::{OtpChallenge, SessionManager, User};
pub use store::{PersistentStore, SqliteBackend};

/// Errors surfaced to callers of the core components
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid one-time code")]
    InvalidOtp,

    #[error("Chatroom not found: {0}")]
    RoomNotFound(String),
}
