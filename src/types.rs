use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::QuizError;

/// Opaque participant identifier issued by the identity provider
pub type ParticipantId = String;

/// Points awarded for a correct answer
pub const POINTS_PER_CORRECT_ANSWER: u32 = 10;

/// Every question offers exactly this many options
pub const OPTIONS_PER_QUESTION: usize = 4;

/// Length of a room code
pub const ROOM_CODE_LENGTH: usize = 5;

/// Short public identifier used by players to locate a room.
///
/// Always uppercase ASCII alphanumeric, exactly [`ROOM_CODE_LENGTH`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalize user input (trim + uppercase) and validate the format
    pub fn parse(input: &str) -> Result<Self, QuizError> {
        let normalized = input.trim().to_ascii_uppercase();
        if normalized.len() != ROOM_CODE_LENGTH
            || !normalized.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(QuizError::InvalidRoomCode(input.trim().to_string()));
        }
        Ok(Self(normalized))
    }

    /// Wrap a code the caller has already produced in canonical form
    pub(crate) fn from_canonical(code: String) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = QuizError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Lobby,
    InProgress,
    Finished,
}

impl RoomStatus {
    /// Forward-only transition table. Re-setting the same status is allowed
    /// so concurrent final submissions stay idempotent.
    pub fn can_transition_to(self, to: RoomStatus) -> bool {
        use RoomStatus::*;

        matches!(
            (self, to),
            (Lobby, InProgress) | (InProgress, Finished) | (Finished, Finished)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
}

impl Question {
    /// Check the shape invariants: non-empty text, exactly four distinct
    /// non-blank options, and a correct answer that is one of them.
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("question text is empty".to_string());
        }
        if self.options.len() != OPTIONS_PER_QUESTION {
            return Err(format!(
                "expected {} options, got {}",
                OPTIONS_PER_QUESTION,
                self.options.len()
            ));
        }
        if self.options.iter().any(|o| o.trim().is_empty()) {
            return Err("question has a blank option".to_string());
        }
        for (i, option) in self.options.iter().enumerate() {
            if self.options[..i].contains(option) {
                return Err(format!("duplicate option: {}", option));
            }
        }
        if !self.options.contains(&self.correct_answer) {
            return Err(format!(
                "correct answer {:?} is not one of the options",
                self.correct_answer
            ));
        }
        Ok(())
    }
}

/// One player's response to one question.
/// `answer_text == None` means the countdown ran out before a submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub question_index: usize,
    pub answer_text: Option<String>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: ParticipantId,
    pub name: String,
    pub score: u32,
    pub answers: Vec<Answer>,
}

impl Player {
    pub fn new(id: ParticipantId, name: String) -> Self {
        Self {
            id,
            name,
            score: 0,
            answers: Vec::new(),
        }
    }

    pub fn has_answered(&self, question_index: usize) -> bool {
        self.answers
            .iter()
            .any(|a| a.question_index == question_index)
    }

    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_correct).count()
    }
}

/// The shared document representing one quiz session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub code: RoomCode,
    pub topic: String,
    pub difficulty: Difficulty,
    pub timer_seconds: u32,
    pub questions: Vec<Question>,
    pub host_id: ParticipantId,
    pub status: RoomStatus,
    pub players: HashMap<ParticipantId, Player>,
    pub created_at: String,
}

impl Room {
    pub fn last_question_index(&self) -> Option<usize> {
        self.questions.len().checked_sub(1)
    }

    pub fn is_host(&self, participant_id: &str) -> bool {
        self.host_id == participant_id
    }

    /// Players ordered by score (highest first), ties by name then id
    pub fn leaderboard(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        players
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Player,
}
