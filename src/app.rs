use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::identity::{AnonymousIdentity, IdentityProvider};
use crate::llm::{
    LlmConfig, LlmProvider, LlmQuestionGenerator, LlmSummarizer, PerformanceSummarizer,
    QuestionGenerator,
};
use crate::session::SessionController;
use crate::state::RoomService;
use crate::store::RoomStore;
use crate::types::ParticipantId;
use crate::{api, ws};

/// Shared server state handed to every connection
pub struct AppState {
    pub config: AppConfig,
    pub service: RoomService,
    pub identity: Arc<dyn IdentityProvider>,
    pub generator: Option<Arc<dyn QuestionGenerator>>,
    pub summarizer: Option<Arc<dyn PerformanceSummarizer>>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn RoomStore>) -> Self {
        let service = RoomService::with_config(store, config.room_config());
        Self {
            config,
            service,
            identity: Arc::new(AnonymousIdentity),
            generator: None,
            summarizer: None,
        }
    }

    /// Back question generation and summaries with one LLM provider
    pub fn with_llm(mut self, provider: Arc<dyn LlmProvider>, llm_config: &LlmConfig) -> Self {
        self.generator = Some(Arc::new(LlmQuestionGenerator::new(
            provider.clone(),
            llm_config,
        )));
        self.summarizer = Some(Arc::new(LlmSummarizer::new(provider, llm_config)));
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn QuestionGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn PerformanceSummarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// A fresh controller for one client session
    pub fn session(&self, participant_id: ParticipantId) -> SessionController {
        let mut controller = SessionController::new(self.service.clone(), participant_id);
        if let Some(generator) = &self.generator {
            controller = controller.with_generator(generator.clone());
        }
        if let Some(summarizer) = &self.summarizer {
            controller = controller.with_summarizer(summarizer.clone());
        }
        controller
    }
}

/// HTTP routes: the session socket plus the read-only API
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/rooms/{code}", get(api::get_room))
        .route("/api/health", get(api::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
