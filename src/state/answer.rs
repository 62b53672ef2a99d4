use super::RoomService;
use crate::error::{QuizError, QuizResult};
use crate::store::Patch;
use crate::types::*;

impl RoomService {
    /// Record a participant's answer to one question.
    ///
    /// `answer_text == None` is the timeout sentinel and is never correct.
    /// Answering the last question also finishes the room in the same write.
    pub async fn submit_answer(
        &self,
        code: &RoomCode,
        participant_id: &str,
        question_index: usize,
        answer_text: Option<String>,
    ) -> QuizResult<Answer> {
        let room = self.store.get_room(code).await?;

        let last_index = room.last_question_index();
        let is_last = last_index == Some(question_index);

        // The final question may land on a room another player already
        // finished; it still counts
        let accepts = if is_last {
            room.status.can_transition_to(RoomStatus::Finished)
        } else {
            room.status == RoomStatus::InProgress
        };
        if !accepts {
            return Err(QuizError::NotInProgress(room.status));
        }

        let question = room
            .questions
            .get(question_index)
            .ok_or(QuizError::InvalidQuestion {
                index: question_index,
                count: room.questions.len(),
            })?;

        let player = room
            .players
            .get(participant_id)
            .ok_or_else(|| QuizError::PlayerNotFound(participant_id.to_string()))?;
        if player.has_answered(question_index) {
            return Err(QuizError::AlreadyAnswered(question_index));
        }

        let is_correct = answer_text.as_deref() == Some(question.correct_answer.as_str());
        let answer = Answer {
            question_index,
            answer_text,
            is_correct,
        };

        let mut patches = vec![Patch::AppendAnswer {
            player_id: participant_id.to_string(),
            answer: answer.clone(),
        }];
        if is_correct {
            patches.push(Patch::IncrementScore {
                player_id: participant_id.to_string(),
                delta: POINTS_PER_CORRECT_ANSWER,
            });
        }
        if is_last {
            patches.push(Patch::SetStatus(RoomStatus::Finished));
        }

        self.store.apply_patch(code, patches).await?;

        tracing::info!(
            "{} answered question {} in room {} ({})",
            participant_id,
            question_index,
            code,
            if is_correct { "correct" } else { "incorrect" }
        );
        if is_last {
            tracing::info!("Room {} finished", code);
        }

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{new_room, service};
    use super::*;

    async fn started_room(service: &RoomService, num_questions: usize) -> Room {
        let room = service.create_room(new_room(num_questions)).await.unwrap();
        service.join_room(&room.code, "bo-id", "Bo").await.unwrap();
        service.start_quiz(&room.code).await.unwrap()
    }

    #[tokio::test]
    async fn test_correct_answer_scores_ten() {
        let (service, _store) = service();
        let room = started_room(&service, 3).await;

        let answer = service
            .submit_answer(&room.code, "bo-id", 0, Some("right 0".to_string()))
            .await
            .unwrap();
        assert!(answer.is_correct);

        let stored = service.get_room(&room.code).await.unwrap();
        let bo = &stored.players["bo-id"];
        assert_eq!(bo.score, 10);
        assert_eq!(
            bo.answers,
            vec![Answer {
                question_index: 0,
                answer_text: Some("right 0".to_string()),
                is_correct: true,
            }]
        );
        assert_eq!(stored.status, RoomStatus::InProgress);
    }

    #[tokio::test]
    async fn test_wrong_answer_scores_nothing() {
        let (service, _store) = service();
        let room = started_room(&service, 3).await;

        let answer = service
            .submit_answer(&room.code, "bo-id", 0, Some("wrong a0".to_string()))
            .await
            .unwrap();
        assert!(!answer.is_correct);

        let stored = service.get_room(&room.code).await.unwrap();
        assert_eq!(stored.players["bo-id"].score, 0);
        assert_eq!(stored.players["bo-id"].answers.len(), 1);
    }

    #[tokio::test]
    async fn test_match_is_exact() {
        let (service, _store) = service();
        let room = started_room(&service, 2).await;

        let answer = service
            .submit_answer(&room.code, "bo-id", 0, Some("Right 0".to_string()))
            .await
            .unwrap();
        assert!(!answer.is_correct);
    }

    #[tokio::test]
    async fn test_timeout_sentinel_on_last_question_finishes_room() {
        let (service, _store) = service();
        let room = started_room(&service, 3).await;

        let answer = service
            .submit_answer(&room.code, "bo-id", 2, None)
            .await
            .unwrap();
        assert!(!answer.is_correct);
        assert_eq!(answer.answer_text, None);

        let stored = service.get_room(&room.code).await.unwrap();
        assert_eq!(stored.status, RoomStatus::Finished);
        assert_eq!(stored.players["bo-id"].score, 0);
    }

    #[tokio::test]
    async fn test_second_final_answer_keeps_room_finished() {
        let (service, _store) = service();
        let room = started_room(&service, 2).await;

        service
            .submit_answer(&room.code, "bo-id", 1, Some("right 1".to_string()))
            .await
            .unwrap();
        service
            .submit_answer(&room.code, "ada-id", 1, Some("right 1".to_string()))
            .await
            .unwrap();

        let stored = service.get_room(&room.code).await.unwrap();
        assert_eq!(stored.status, RoomStatus::Finished);
        assert_eq!(stored.players["bo-id"].score, 10);
        assert_eq!(stored.players["ada-id"].score, 10);
    }

    #[tokio::test]
    async fn test_players_do_not_interfere() {
        let (service, _store) = service();
        let room = started_room(&service, 3).await;

        let (a, b) = tokio::join!(
            service.submit_answer(&room.code, "ada-id", 0, Some("right 0".to_string())),
            service.submit_answer(&room.code, "bo-id", 0, Some("wrong b0".to_string())),
        );
        a.unwrap();
        b.unwrap();

        let stored = service.get_room(&room.code).await.unwrap();
        assert_eq!(stored.players["ada-id"].score, 10);
        assert_eq!(stored.players["ada-id"].answers.len(), 1);
        assert!(stored.players["ada-id"].answers[0].is_correct);
        assert_eq!(stored.players["bo-id"].score, 0);
        assert_eq!(stored.players["bo-id"].answers.len(), 1);
        assert!(!stored.players["bo-id"].answers[0].is_correct);
    }

    #[tokio::test]
    async fn test_submit_requires_in_progress() {
        let (service, _store) = service();
        let room = service.create_room(new_room(2)).await.unwrap();

        let result = service
            .submit_answer(&room.code, "ada-id", 0, Some("right 0".to_string()))
            .await;
        assert!(matches!(
            result,
            Err(QuizError::NotInProgress(RoomStatus::Lobby))
        ));
    }

    #[tokio::test]
    async fn test_final_answer_cannot_finish_a_lobby_room() {
        let (service, _store) = service();
        let room = service.create_room(new_room(1)).await.unwrap();

        let result = service.submit_answer(&room.code, "ada-id", 0, None).await;
        assert!(matches!(
            result,
            Err(QuizError::NotInProgress(RoomStatus::Lobby))
        ));
        let stored = service.get_room(&room.code).await.unwrap();
        assert_eq!(stored.status, RoomStatus::Lobby);
        assert!(stored.players["ada-id"].answers.is_empty());
    }

    #[tokio::test]
    async fn test_non_final_answer_rejected_after_finish() {
        let (service, _store) = service();
        let room = started_room(&service, 2).await;
        service
            .submit_answer(&room.code, "bo-id", 1, None)
            .await
            .unwrap();

        let result = service
            .submit_answer(&room.code, "ada-id", 0, Some("right 0".to_string()))
            .await;
        assert!(matches!(
            result,
            Err(QuizError::NotInProgress(RoomStatus::Finished))
        ));
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_and_duplicates() {
        let (service, _store) = service();
        let room = started_room(&service, 2).await;

        let result = service
            .submit_answer(&room.code, "bo-id", 5, None)
            .await;
        assert!(matches!(
            result,
            Err(QuizError::InvalidQuestion { index: 5, count: 2 })
        ));

        service
            .submit_answer(&room.code, "bo-id", 0, Some("right 0".to_string()))
            .await
            .unwrap();
        let result = service
            .submit_answer(&room.code, "bo-id", 0, Some("right 0".to_string()))
            .await;
        assert!(matches!(result, Err(QuizError::AlreadyAnswered(0))));

        let stored = service.get_room(&room.code).await.unwrap();
        assert_eq!(stored.players["bo-id"].score, 10);
    }

    #[tokio::test]
    async fn test_unknown_player_rejected() {
        let (service, _store) = service();
        let room = started_room(&service, 2).await;

        let result = service
            .submit_answer(&room.code, "ghost", 0, None)
            .await;
        assert!(matches!(result, Err(QuizError::PlayerNotFound(_))));
    }
}
