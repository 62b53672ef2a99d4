//! Server configuration from the environment

use crate::state::{RejoinPolicy, RoomConfig};
use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub rejoin_policy: RejoinPolicy,
    /// Question count used when a create request leaves it out
    pub default_questions: usize,
    /// Per-question timer used when a create request leaves it out
    pub default_timer_seconds: u32,
    pub max_code_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7878)),
            rejoin_policy: RejoinPolicy::default(),
            default_questions: 5,
            default_timer_seconds: 30,
            max_code_attempts: RoomConfig::default().max_code_attempts,
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a variable, keeping the default (with a warning) when it is malformed
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env_value(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

impl AppConfig {
    /// Load from `QUIZROOM_*` variables; blank values fall back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            bind_addr: parse_env("QUIZROOM_BIND_ADDR", defaults.bind_addr),
            rejoin_policy: parse_env("QUIZROOM_REJOIN_POLICY", defaults.rejoin_policy),
            default_questions: parse_env("QUIZROOM_DEFAULT_QUESTIONS", defaults.default_questions)
                .max(1),
            default_timer_seconds: parse_env(
                "QUIZROOM_DEFAULT_TIMER",
                defaults.default_timer_seconds,
            )
            .max(1),
            max_code_attempts: parse_env("QUIZROOM_MAX_CODE_ATTEMPTS", defaults.max_code_attempts)
                .max(1),
        };

        tracing::debug!("Loaded configuration: {:?}", config);
        config
    }

    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            rejoin_policy: self.rejoin_policy,
            max_code_attempts: self.max_code_attempts,
        }
    }
}
