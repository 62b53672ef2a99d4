mod answer;
mod code;
mod room;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::store::RoomStore;

pub use code::generate_room_code;
pub use room::{NewRoom, RoomRequest};

/// What happens when a participant joins a room they are already in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RejoinPolicy {
    /// Overwrite the player entry: score and answers start over
    #[default]
    ResetOnRejoin,
    /// Keep score and answers, only refresh the display name
    ResumeOnRejoin,
}

impl std::str::FromStr for RejoinPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" | "reset-on-rejoin" | "reset_on_rejoin" => Ok(RejoinPolicy::ResetOnRejoin),
            "resume" | "resume-on-rejoin" | "resume_on_rejoin" => {
                Ok(RejoinPolicy::ResumeOnRejoin)
            }
            other => Err(format!("unknown rejoin policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub rejoin_policy: RejoinPolicy,
    /// How many fresh codes to try when a generated code collides
    pub max_code_attempts: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            rejoin_policy: RejoinPolicy::ResetOnRejoin,
            max_code_attempts: 5,
        }
    }
}

/// Room state machine.
///
/// Owns the `Lobby -> InProgress -> Finished` transitions and the player and
/// answer invariants. Every operation is a read followed by one patch batch
/// against the store.
#[derive(Clone)]
pub struct RoomService {
    store: Arc<dyn RoomStore>,
    config: RoomConfig,
}

impl RoomService {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self::with_config(store, RoomConfig::default())
    }

    pub fn with_config(store: Arc<dyn RoomStore>, config: RoomConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn RoomStore> {
        &self.store
    }
}
