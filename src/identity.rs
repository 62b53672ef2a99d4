//! Anonymous participant identity

use crate::error::{QuizError, QuizResult};
use crate::types::ParticipantId;
use async_trait::async_trait;
use ulid::Ulid;

/// Yields a stable identifier for the participant behind a session
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Issue a fresh identifier
    async fn sign_in(&self) -> QuizResult<ParticipantId>;

    /// Re-establish a previously issued identifier (e.g. after a reconnect)
    async fn resume(&self, participant_id: &str) -> QuizResult<ParticipantId>;
}

/// Issues ULIDs; no account, no secret
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousIdentity;

#[async_trait]
impl IdentityProvider for AnonymousIdentity {
    async fn sign_in(&self) -> QuizResult<ParticipantId> {
        Ok(Ulid::new().to_string())
    }

    async fn resume(&self, participant_id: &str) -> QuizResult<ParticipantId> {
        Ulid::from_string(participant_id.trim())
            .map(|id| id.to_string())
            .map_err(|e| QuizError::ConnectionFailed(format!("invalid participant id: {}", e)))
    }
}
