//! Room store boundary
//!
//! The store holds room documents, applies field-scoped patches and fans out
//! full snapshots to subscribers. It never retries and never validates game
//! rules; that belongs to [`crate::state::RoomService`].

mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::{Answer, ParticipantId, Player, Room, RoomCode, RoomStatus};

pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("room {0} already exists")]
    AlreadyExists(String),

    #[error("room {0} not found")]
    NotFound(String),

    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A partial, field-scoped update to a stored room
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    SetStatus(RoomStatus),
    /// Replaces the whole player subtree
    UpsertPlayer(Player),
    AppendAnswer {
        player_id: ParticipantId,
        answer: Answer,
    },
    IncrementScore {
        player_id: ParticipantId,
        delta: u32,
    },
}

impl Patch {
    /// Merge this patch into `room`, touching only the fields it names
    pub fn apply(&self, room: &mut Room) -> StoreResult<()> {
        match self {
            Patch::SetStatus(status) => {
                if !room.status.can_transition_to(*status) {
                    return Err(StoreError::InvalidPatch(format!(
                        "room {} cannot go from {:?} to {:?}",
                        room.code, room.status, status
                    )));
                }
                room.status = *status;
            }
            Patch::UpsertPlayer(player) => {
                room.players.insert(player.id.clone(), player.clone());
            }
            Patch::AppendAnswer { player_id, answer } => {
                let player = room.players.get_mut(player_id).ok_or_else(|| {
                    StoreError::InvalidPatch(format!("no player {} to append to", player_id))
                })?;
                player.answers.push(answer.clone());
            }
            Patch::IncrementScore { player_id, delta } => {
                let player = room.players.get_mut(player_id).ok_or_else(|| {
                    StoreError::InvalidPatch(format!("no player {} to score", player_id))
                })?;
                player.score = player.score.saturating_add(*delta);
            }
        }
        Ok(())
    }
}

/// Event delivered to a subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Snapshot(Room),
    Removed,
}

/// Live feed of room snapshots.
///
/// The first event is the current document. Cancelling (or dropping) stops
/// delivery; events already buffered are discarded.
#[derive(Debug)]
pub struct Subscription {
    code: RoomCode,
    rx: mpsc::UnboundedReceiver<RoomEvent>,
    canceled: bool,
}

impl Subscription {
    pub fn new(code: RoomCode, rx: mpsc::UnboundedReceiver<RoomEvent>) -> Self {
        Self {
            code,
            rx,
            canceled: false,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Wait for the next event. Returns `None` once cancelled or when the
    /// store drops the feed.
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        if self.canceled {
            return None;
        }
        self.rx.recv().await
    }

    /// Non-blocking variant of [`Subscription::recv`]
    pub fn try_recv(&mut self) -> Option<RoomEvent> {
        if self.canceled {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Stop delivery. Safe to call more than once.
    pub fn cancel(&mut self) {
        if !self.canceled {
            self.canceled = true;
            self.rx.close();
            tracing::debug!("Subscription to room {} canceled", self.code);
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }
}

/// Abstract real-time document store for rooms
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Persist a new room; fails with `AlreadyExists` on a code collision
    async fn create_room(&self, room: Room) -> StoreResult<()>;

    /// Point-in-time read
    async fn get_room(&self, code: &RoomCode) -> StoreResult<Room>;

    /// Apply a batch of patches atomically and return the committed document
    async fn apply_patch(&self, code: &RoomCode, patches: Vec<Patch>) -> StoreResult<Room>;

    /// Subscribe to full-document snapshots of a room
    async fn subscribe(&self, code: &RoomCode) -> StoreResult<Subscription>;

    /// Remove a room; subscribers receive `RoomEvent::Removed`
    async fn delete_room(&self, code: &RoomCode) -> StoreResult<()>;
}
