use super::*;
use crate::types::{Difficulty, Question};
use serde::Deserialize;

/// Produces the question set for a new room
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Generate exactly `num_questions` questions about `topic`
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        num_questions: usize,
    ) -> LlmResult<Vec<Question>>;
}

const QUESTION_SYSTEM_PROMPT: &str = r#"You write multiple-choice quiz questions.

Reply with a JSON array and nothing else. Each element must look like:
{"text": "...", "options": ["...", "...", "...", "..."], "correct_answer": "...", "explanation": "..."}

Rules:
- exactly 4 distinct options per question
- correct_answer must be copied verbatim from options
- explanation is one short sentence"#;

/// Question generator backed by an [`LlmProvider`]
pub struct LlmQuestionGenerator {
    provider: Arc<dyn LlmProvider>,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmQuestionGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            max_tokens: config.default_max_tokens,
            timeout: config.default_timeout,
        }
    }
}

#[async_trait]
impl QuestionGenerator for LlmQuestionGenerator {
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        num_questions: usize,
    ) -> LlmResult<Vec<Question>> {
        let request = GenerateRequest {
            system: QUESTION_SYSTEM_PROMPT.to_string(),
            prompt: format!(
                "Write {} {} questions about: {}",
                num_questions, difficulty, topic
            ),
            max_tokens: Some(self.max_tokens),
            timeout: self.timeout,
        };

        tracing::info!(
            "Generating {} {} questions about {:?} via {}",
            num_questions,
            difficulty,
            topic,
            self.provider.name()
        );

        let response = self.provider.generate(request).await?;
        let questions = parse_questions(&response.text, num_questions)?;

        tracing::info!(
            "Generated {} questions in {}ms",
            questions.len(),
            response.metadata.latency_ms
        );
        Ok(questions)
    }
}

#[derive(Deserialize)]
struct RawQuestion {
    #[serde(alias = "question")]
    text: String,
    options: Vec<String>,
    #[serde(alias = "correctAnswer", alias = "answer")]
    correct_answer: String,
    #[serde(default)]
    explanation: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuestions {
    List(Vec<RawQuestion>),
    Wrapped { questions: Vec<RawQuestion> },
}

/// Drop a surrounding markdown code fence, if any
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string ("json") on the opening fence line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse model output into exactly `expected` validated questions
pub fn parse_questions(text: &str, expected: usize) -> LlmResult<Vec<Question>> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let raw: RawQuestions =
        serde_json::from_str(body).map_err(|e| LlmError::ParseError(e.to_string()))?;
    let raw = match raw {
        RawQuestions::List(list) => list,
        RawQuestions::Wrapped { questions } => questions,
    };

    if raw.len() != expected {
        return Err(LlmError::ParseError(format!(
            "expected {} questions, got {}",
            expected,
            raw.len()
        )));
    }

    raw.into_iter()
        .enumerate()
        .map(|(i, q)| {
            let question = Question {
                text: q.text.trim().to_string(),
                options: q.options.iter().map(|o| o.trim().to_string()).collect(),
                correct_answer: q.correct_answer.trim().to_string(),
                explanation: q.explanation.trim().to_string(),
            };
            question
                .validate()
                .map_err(|e| LlmError::ParseError(format!("question {}: {}", i, e)))?;
            Ok(question)
        })
        .collect()
}
