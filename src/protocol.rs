use crate::config::AppConfig;
use crate::session::{SessionState, UserAction};
use crate::types::{Difficulty, ParticipantId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        topic: String,
        #[serde(default)]
        difficulty: Option<Difficulty>,
        #[serde(default)]
        num_questions: Option<usize>,
        #[serde(default)]
        timer_seconds: Option<u32>,
        #[serde(default)]
        name: String,
    },
    JoinRoom {
        code: String,
        #[serde(default)]
        name: String,
    },
    StartQuiz,
    SelectAnswer {
        answer: String,
    },
    SubmitAnswer,
    RequestSummary,
    DismissError,
    ReturnHome,
}

impl ClientMessage {
    /// Map to a session action, filling omitted room settings from config
    pub fn into_action(self, config: &AppConfig) -> UserAction {
        match self {
            ClientMessage::CreateRoom {
                topic,
                difficulty,
                num_questions,
                timer_seconds,
                name,
            } => UserAction::CreateRoom {
                topic,
                difficulty: difficulty.unwrap_or(Difficulty::Medium),
                num_questions: num_questions.unwrap_or(config.default_questions),
                timer_seconds: timer_seconds.unwrap_or(config.default_timer_seconds),
                name,
            },
            ClientMessage::JoinRoom { code, name } => UserAction::JoinRoom { code, name },
            ClientMessage::StartQuiz => UserAction::StartQuiz,
            ClientMessage::SelectAnswer { answer } => UserAction::SelectAnswer(answer),
            ClientMessage::SubmitAnswer => UserAction::SubmitAnswer,
            ClientMessage::RequestSummary => UserAction::RequestSummary,
            ClientMessage::DismissError => UserAction::DismissError,
            ClientMessage::ReturnHome => UserAction::ReturnHome,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome { participant_id: ParticipantId },
    Session { state: Box<SessionState> },
    Error { code: String, msg: String },
}
