use super::*;
use crate::types::{Player, Role, Room, POINTS_PER_CORRECT_ANSWER};
use serde::Serialize;

/// Writes a short natural-language recap of a finished quiz
#[async_trait]
pub trait PerformanceSummarizer: Send + Sync {
    async fn summarize(
        &self,
        role: Role,
        topic: &str,
        data: &PerformanceData,
    ) -> LlmResult<String>;
}

/// How one question went, from the requester's point of view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionOutcome {
    pub question: String,
    pub correct_answer: String,
    /// The requesting player's answer; `None` for hosts or unanswered questions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_answer: Option<String>,
    pub answered: usize,
    pub correct: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    pub name: String,
    pub score: u32,
}

/// Read-only digest of a room handed to the summarizer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceData {
    pub subject: String,
    pub score: u32,
    pub max_score: u32,
    pub correct_answers: usize,
    pub outcomes: Vec<QuestionOutcome>,
    pub standings: Vec<Standing>,
}

impl PerformanceData {
    fn build(room: &Room, player_id: Option<&str>) -> Self {
        let player = player_id.and_then(|id| room.players.get(id));

        let outcomes = room
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| {
                let answers = room
                    .players
                    .values()
                    .filter_map(|p| p.answers.iter().find(|a| a.question_index == index));
                let (answered, correct) = answers.fold((0, 0), |(n, c), a| {
                    (n + 1, c + usize::from(a.is_correct))
                });
                let given_answer = player.and_then(|p| {
                    p.answers
                        .iter()
                        .find(|a| a.question_index == index)
                        .and_then(|a| a.answer_text.clone())
                });
                QuestionOutcome {
                    question: question.text.clone(),
                    correct_answer: question.correct_answer.clone(),
                    given_answer,
                    answered,
                    correct,
                }
            })
            .collect();

        let standings = room
            .leaderboard()
            .into_iter()
            .map(|p| Standing {
                name: p.name.clone(),
                score: p.score,
            })
            .collect();

        Self {
            subject: player
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "the whole room".to_string()),
            score: player.map(|p| p.score).unwrap_or(0),
            max_score: room.questions.len() as u32 * POINTS_PER_CORRECT_ANSWER,
            correct_answers: player.map(Player::correct_count).unwrap_or(0),
            outcomes,
            standings,
        }
    }

    /// Digest for one player; `None` if they are not in the room
    pub fn for_player(room: &Room, player_id: &str) -> Option<Self> {
        room.players
            .contains_key(player_id)
            .then(|| Self::build(room, Some(player_id)))
    }

    /// Digest of the whole room for the host
    pub fn for_host(room: &Room) -> Self {
        Self::build(room, None)
    }
}

const PLAYER_SUMMARY_PROMPT: &str = "You are a friendly quiz coach. In three or four sentences, \
summarize how this player did, name one topic area they handled well and one worth revisiting. \
Address the player directly. Plain text only.";

const HOST_SUMMARY_PROMPT: &str = "You are a quiz analyst. In three or four sentences, summarize \
how the group did, mention the strongest and weakest questions and congratulate the winner. \
Plain text only.";

/// Summarizer backed by an [`LlmProvider`]
pub struct LlmSummarizer {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            timeout: config.default_timeout,
        }
    }
}

#[async_trait]
impl PerformanceSummarizer for LlmSummarizer {
    async fn summarize(
        &self,
        role: Role,
        topic: &str,
        data: &PerformanceData,
    ) -> LlmResult<String> {
        let system = match role {
            Role::Host => HOST_SUMMARY_PROMPT,
            Role::Player => PLAYER_SUMMARY_PROMPT,
        };
        let data_json =
            serde_json::to_string(data).map_err(|e| LlmError::ParseError(e.to_string()))?;

        let request = GenerateRequest {
            system: system.to_string(),
            prompt: format!("Quiz topic: {}\nResults: {}", topic, data_json),
            max_tokens: Some(400),
            timeout: self.timeout,
        };

        let response = self.provider.generate(request).await?;
        let text = response.text.trim();
        if text.is_empty() {
            tracing::warn!("Summarizer returned an empty response");
            return Err(LlmError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}
