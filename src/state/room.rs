use super::{generate_room_code, RejoinPolicy, RoomService};
use crate::error::{QuizError, QuizResult};
use crate::llm::QuestionGenerator;
use crate::store::{Patch, StoreError};
use crate::types::*;
use std::collections::HashMap;

/// Everything needed to open a room
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub topic: String,
    pub difficulty: Difficulty,
    pub timer_seconds: u32,
    pub questions: Vec<Question>,
    pub host_id: ParticipantId,
    pub host_name: String,
}

/// A room whose questions still need to be generated
#[derive(Debug, Clone)]
pub struct RoomRequest {
    pub topic: String,
    pub difficulty: Difficulty,
    pub num_questions: usize,
    pub timer_seconds: u32,
    pub host_id: ParticipantId,
    pub host_name: String,
}

/// Blank names get a friendly generated one instead
fn display_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        petname::petname(2, " ").unwrap_or_else(|| "Anonymous".to_string())
    } else {
        trimmed.to_string()
    }
}

impl RoomService {
    /// Validate generated questions before anything is persisted
    fn validate_questions(questions: &[Question]) -> QuizResult<()> {
        if questions.is_empty() {
            return Err(QuizError::GenerationFailed(
                "no questions were generated".to_string(),
            ));
        }
        for (i, question) in questions.iter().enumerate() {
            question
                .validate()
                .map_err(|e| QuizError::GenerationFailed(format!("question {}: {}", i, e)))?;
        }
        Ok(())
    }

    /// Create a room in `Lobby` whose only player is the host
    pub async fn create_room(&self, new_room: NewRoom) -> QuizResult<Room> {
        Self::validate_questions(&new_room.questions)?;
        if new_room.timer_seconds == 0 {
            return Err(QuizError::InvalidInput(
                "timer must be at least one second".to_string(),
            ));
        }

        let host = Player::new(new_room.host_id.clone(), display_name(&new_room.host_name));
        let mut players = HashMap::new();
        players.insert(host.id.clone(), host);

        let mut room = Room {
            code: generate_room_code(),
            topic: new_room.topic.trim().to_string(),
            difficulty: new_room.difficulty,
            timer_seconds: new_room.timer_seconds,
            questions: new_room.questions,
            host_id: new_room.host_id,
            status: RoomStatus::Lobby,
            players,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let attempts = self.config.max_code_attempts.max(1);
        for attempt in 1..=attempts {
            match self.store.create_room(room.clone()).await {
                Ok(()) => {
                    tracing::info!(
                        "Created room {} on {:?} ({} questions)",
                        room.code,
                        room.topic,
                        room.questions.len()
                    );
                    return Ok(room);
                }
                Err(StoreError::AlreadyExists(code)) if attempt < attempts => {
                    tracing::debug!("Room code {} collided, drawing a new one", code);
                    room.code = generate_room_code();
                }
                Err(e) => return Err(e.into()),
            }
        }

        // The loop always returns on its final attempt
        Err(QuizError::Store(StoreError::AlreadyExists(
            room.code.to_string(),
        )))
    }

    /// Ask the generator for questions, then create the room
    pub async fn create_room_with_generator(
        &self,
        generator: &dyn QuestionGenerator,
        request: RoomRequest,
    ) -> QuizResult<Room> {
        let RoomRequest {
            topic,
            difficulty,
            num_questions,
            timer_seconds,
            host_id,
            host_name,
        } = request;

        if topic.trim().is_empty() {
            return Err(QuizError::InvalidInput("topic is required".to_string()));
        }
        if num_questions == 0 {
            return Err(QuizError::InvalidInput(
                "at least one question is required".to_string(),
            ));
        }

        let questions = generator
            .generate(topic.trim(), difficulty, num_questions)
            .await
            .map_err(|e| {
                tracing::warn!("Question generation for {:?} failed: {}", topic, e);
                QuizError::GenerationFailed(e.to_string())
            })?;

        self.create_room(NewRoom {
            topic,
            difficulty,
            timer_seconds,
            questions,
            host_id,
            host_name,
        })
        .await
    }

    /// Point-in-time read of a room
    pub async fn get_room(&self, code: &RoomCode) -> QuizResult<Room> {
        Ok(self.store.get_room(code).await?)
    }

    /// Add (or re-add) a participant to a room that is still in the lobby
    pub async fn join_room(
        &self,
        code: &RoomCode,
        participant_id: &str,
        name: &str,
    ) -> QuizResult<Room> {
        let room = self.store.get_room(code).await?;
        if room.status != RoomStatus::Lobby {
            return Err(QuizError::AlreadyStarted(code.to_string()));
        }

        let name = display_name(name);
        let player = match (self.config.rejoin_policy, room.players.get(participant_id)) {
            (RejoinPolicy::ResumeOnRejoin, Some(existing)) => Player {
                name,
                ..existing.clone()
            },
            _ => Player::new(participant_id.to_string(), name),
        };

        tracing::info!("{} ({}) joined room {}", player.name, player.id, code);
        Ok(self
            .store
            .apply_patch(code, vec![Patch::UpsertPlayer(player)])
            .await?)
    }

    /// Move a room from `Lobby` to `InProgress`
    pub async fn start_quiz(&self, code: &RoomCode) -> QuizResult<Room> {
        let room = self.store.get_room(code).await?;
        if !room.status.can_transition_to(RoomStatus::InProgress) {
            return Err(QuizError::InvalidTransition {
                from: room.status,
                to: RoomStatus::InProgress,
            });
        }

        tracing::info!(
            "Starting quiz in room {} with {} player(s)",
            code,
            room.players.len()
        );
        Ok(self
            .store
            .apply_patch(code, vec![Patch::SetStatus(RoomStatus::InProgress)])
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{new_room, question, service};
    use super::super::RoomConfig;
    use super::*;
    use crate::llm::{LlmError, LlmResult};
    use crate::store::{MemoryStore, RoomStore};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedGenerator(Vec<Question>);

    #[async_trait]
    impl QuestionGenerator for FixedGenerator {
        async fn generate(
            &self,
            _topic: &str,
            _difficulty: Difficulty,
            _num_questions: usize,
        ) -> LlmResult<Vec<Question>> {
            Ok(self.0.clone())
        }
    }

    struct FailingGenerator;

    fn request(num_questions: usize) -> RoomRequest {
        RoomRequest {
            topic: "Oceans".to_string(),
            difficulty: Difficulty::Easy,
            num_questions,
            timer_seconds: 20,
            host_id: "ada-id".to_string(),
            host_name: "Ada".to_string(),
        }
    }

    #[async_trait]
    impl QuestionGenerator for FailingGenerator {
        async fn generate(
            &self,
            _topic: &str,
            _difficulty: Difficulty,
            _num_questions: usize,
        ) -> LlmResult<Vec<Question>> {
            Err(LlmError::ParseError("not json".to_string()))
        }
    }

    #[tokio::test]
    async fn test_create_room_starts_in_lobby_with_host() {
        let (service, _store) = service();
        let room = service.create_room(new_room(3)).await.unwrap();

        let stored = service.get_room(&room.code).await.unwrap();
        assert_eq!(stored.status, RoomStatus::Lobby);
        assert_eq!(stored.players.len(), 1);
        let host = &stored.players["ada-id"];
        assert_eq!(host.name, "Ada");
        assert_eq!(host.score, 0);
        assert!(host.answers.is_empty());
        assert_eq!(stored.host_id, "ada-id");
        assert_eq!(stored.questions.len(), 3);
        assert_eq!(stored.timer_seconds, 30);
    }

    #[tokio::test]
    async fn test_create_room_rejects_malformed_questions() {
        let (service, store) = service();

        let result = service.create_room(new_room(0)).await;
        assert!(matches!(result, Err(QuizError::GenerationFailed(_))));

        let mut bad = new_room(2);
        bad.questions[1].correct_answer = "not an option".to_string();
        let result = service.create_room(bad).await;
        assert!(matches!(result, Err(QuizError::GenerationFailed(_))));

        assert_eq!(store.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_room_rejects_zero_timer() {
        let (service, _store) = service();
        let mut request = new_room(1);
        request.timer_seconds = 0;
        assert!(matches!(
            service.create_room(request).await,
            Err(QuizError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_host_name_gets_generated_name() {
        let (service, _store) = service();
        let mut request = new_room(1);
        request.host_name = "   ".to_string();
        let room = service.create_room(request).await.unwrap();
        assert!(!room.players["ada-id"].name.trim().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_generator() {
        let (service, _store) = service();
        let generator = FixedGenerator(vec![question(0), question(1)]);

        let room = service
            .create_room_with_generator(&generator, request(2))
            .await
            .unwrap();
        assert_eq!(room.questions.len(), 2);
        assert_eq!(room.difficulty, Difficulty::Easy);
    }

    #[tokio::test]
    async fn test_generator_failure_maps_to_generation_failed() {
        let (service, store) = service();
        let result = service
            .create_room_with_generator(&FailingGenerator, request(3))
            .await;
        assert!(matches!(result, Err(QuizError::GenerationFailed(_))));
        assert_eq!(store.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_join_adds_player_without_touching_status() {
        let (service, _store) = service();
        let room = service.create_room(new_room(3)).await.unwrap();

        let joined = service.join_room(&room.code, "bo-id", "Bo").await.unwrap();
        assert_eq!(joined.players.len(), 2);
        assert_eq!(joined.players["bo-id"].name, "Bo");
        assert_eq!(joined.status, RoomStatus::Lobby);
    }

    #[tokio::test]
    async fn test_join_missing_room() {
        let (service, _store) = service();
        let code = RoomCode::parse("ZZZZZ").unwrap();
        let result = service.join_room(&code, "bo-id", "Bo").await;
        assert!(matches!(result, Err(QuizError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_join_after_start_is_rejected_and_players_untouched() {
        let (service, _store) = service();
        let room = service.create_room(new_room(3)).await.unwrap();
        service.start_quiz(&room.code).await.unwrap();

        let result = service.join_room(&room.code, "bo-id", "Bo").await;
        assert!(matches!(result, Err(QuizError::AlreadyStarted(_))));

        let stored = service.get_room(&room.code).await.unwrap();
        assert_eq!(stored.players.len(), 1);
        assert!(!stored.players.contains_key("bo-id"));
    }

    #[tokio::test]
    async fn test_rejoin_resets_by_default() {
        let (service, store) = service();
        let room = service.create_room(new_room(3)).await.unwrap();
        service.join_room(&room.code, "bo-id", "Bo").await.unwrap();
        store
            .apply_patch(
                &room.code,
                vec![Patch::IncrementScore {
                    player_id: "bo-id".to_string(),
                    delta: 10,
                }],
            )
            .await
            .unwrap();

        let rejoined = service
            .join_room(&room.code, "bo-id", "Bo 2")
            .await
            .unwrap();
        assert_eq!(rejoined.players["bo-id"].score, 0);
        assert_eq!(rejoined.players["bo-id"].name, "Bo 2");
    }

    #[tokio::test]
    async fn test_rejoin_resumes_when_configured() {
        let store = Arc::new(MemoryStore::new());
        let service = RoomService::with_config(
            store.clone(),
            RoomConfig {
                rejoin_policy: RejoinPolicy::ResumeOnRejoin,
                ..RoomConfig::default()
            },
        );
        let room = service.create_room(new_room(3)).await.unwrap();
        service.join_room(&room.code, "bo-id", "Bo").await.unwrap();
        store
            .apply_patch(
                &room.code,
                vec![Patch::IncrementScore {
                    player_id: "bo-id".to_string(),
                    delta: 10,
                }],
            )
            .await
            .unwrap();

        let rejoined = service
            .join_room(&room.code, "bo-id", "Bo 2")
            .await
            .unwrap();
        assert_eq!(rejoined.players["bo-id"].score, 10);
        assert_eq!(rejoined.players["bo-id"].name, "Bo 2");
    }

    #[tokio::test]
    async fn test_start_quiz_only_from_lobby() {
        let (service, _store) = service();
        let room = service.create_room(new_room(1)).await.unwrap();

        let started = service.start_quiz(&room.code).await.unwrap();
        assert_eq!(started.status, RoomStatus::InProgress);

        let again = service.start_quiz(&room.code).await;
        assert!(matches!(
            again,
            Err(QuizError::InvalidTransition {
                from: RoomStatus::InProgress,
                to: RoomStatus::InProgress
            })
        ));
    }

    #[tokio::test]
    async fn test_finished_room_cannot_restart() {
        let (service, _store) = service();
        let room = service.create_room(new_room(1)).await.unwrap();
        service.start_quiz(&room.code).await.unwrap();
        service
            .submit_answer(&room.code, "ada-id", 0, None)
            .await
            .unwrap();

        let result = service.start_quiz(&room.code).await;
        assert!(matches!(
            result,
            Err(QuizError::InvalidTransition {
                from: RoomStatus::Finished,
                to: RoomStatus::InProgress
            })
        ));
        let stored = service.get_room(&room.code).await.unwrap();
        assert_eq!(stored.status, RoomStatus::Finished);
    }
}
