//! Error taxonomy for room operations
//!
//! Store and generator failures surface here and are turned into
//! user-visible messages at the session boundary.

use crate::store::StoreError;
use crate::types::RoomStatus;

pub type QuizResult<T> = Result<T, QuizError>;

#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("Room {0} not found")]
    NotFound(String),

    #[error("Room {0} has already started")]
    AlreadyStarted(String),

    #[error("Question generation failed: {0}")]
    GenerationFailed(String),

    #[error("Performance summary failed: {0}")]
    SummaryFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid room code: {0:?}")]
    InvalidRoomCode(String),

    #[error("Invalid status transition from {from:?} to {to:?}")]
    InvalidTransition { from: RoomStatus, to: RoomStatus },

    #[error("Quiz is not in progress (status {0:?})")]
    NotInProgress(RoomStatus),

    #[error("Question index {index} out of range ({count} questions)")]
    InvalidQuestion { index: usize, count: usize },

    #[error("Player {0} is not in this room")]
    PlayerNotFound(String),

    #[error("Question {0} was already answered")]
    AlreadyAnswered(usize),

    #[error("Only the host can {0}")]
    NotHost(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for QuizError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(code) => QuizError::NotFound(code),
            other => QuizError::Store(other),
        }
    }
}

impl QuizError {
    /// Short machine-readable code for the wire protocol
    pub fn code(&self) -> &'static str {
        match self {
            QuizError::NotFound(_) => "NOT_FOUND",
            QuizError::AlreadyStarted(_) => "ALREADY_STARTED",
            QuizError::GenerationFailed(_) => "GENERATION_FAILED",
            QuizError::SummaryFailed(_) => "SUMMARY_FAILED",
            QuizError::ConnectionFailed(_) => "CONNECTION_FAILED",
            QuizError::InvalidRoomCode(_) => "INVALID_ROOM_CODE",
            QuizError::InvalidTransition { .. } => "INVALID_TRANSITION",
            QuizError::NotInProgress(_) => "NOT_IN_PROGRESS",
            QuizError::InvalidQuestion { .. } => "INVALID_QUESTION",
            QuizError::PlayerNotFound(_) => "PLAYER_NOT_FOUND",
            QuizError::AlreadyAnswered(_) => "ALREADY_ANSWERED",
            QuizError::NotHost(_) => "NOT_HOST",
            QuizError::InvalidInput(_) => "INVALID_INPUT",
            QuizError::Store(_) => "STORE_ERROR",
        }
    }

    /// Message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            QuizError::NotFound(_) => "Room not found".to_string(),
            QuizError::AlreadyStarted(_) => "This quiz has already started".to_string(),
            QuizError::GenerationFailed(_) => {
                "Could not generate questions for this topic. Please try again.".to_string()
            }
            QuizError::ConnectionFailed(_) => {
                "Could not connect. Please refresh and try again.".to_string()
            }
            QuizError::Store(_) => "Something went wrong. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}
