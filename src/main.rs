use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizroom::{app, config::AppConfig, llm, store::MemoryStore};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting quizroom...");

    let config = AppConfig::from_env();
    let addr = config.bind_addr;
    let mut state = app::AppState::new(config, Arc::new(MemoryStore::new()));

    let llm_config = llm::LlmConfig::from_env();
    match llm_config.build_provider() {
        Ok(provider) => {
            tracing::info!("Using LLM provider {}", provider.name());
            state = state.with_llm(provider, &llm_config);
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize LLM provider: {}. Rooms cannot be created.",
                e
            );
        }
    }

    let router = app::router(Arc::new(state));

    tracing::info!("Listening on http://{}", addr);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
