use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};

use super::{Patch, RoomEvent, RoomStore, StoreError, StoreResult, Subscription};
use crate::types::{Room, RoomCode};

struct RoomEntry {
    room: Room,
    subscribers: Vec<mpsc::UnboundedSender<RoomEvent>>,
}

impl RoomEntry {
    /// Push an event to every live subscriber, dropping closed ones
    fn fan_out(&mut self, event: RoomEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// In-process room store.
///
/// All writes and fan-out happen under one lock, so every subscriber sees
/// committed documents in commit order.
#[derive(Default)]
pub struct MemoryStore {
    rooms: RwLock<HashMap<RoomCode, RoomEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rooms currently stored
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Number of live subscribers for a room (closed ones are pruned lazily)
    pub async fn subscriber_count(&self, code: &RoomCode) -> usize {
        self.rooms
            .read()
            .await
            .get(code)
            .map(|entry| entry.subscribers.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn create_room(&self, room: Room) -> StoreResult<()> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.code) {
            return Err(StoreError::AlreadyExists(room.code.to_string()));
        }

        tracing::debug!("Created room {}", room.code);
        rooms.insert(
            room.code.clone(),
            RoomEntry {
                room,
                subscribers: Vec::new(),
            },
        );
        Ok(())
    }

    async fn get_room(&self, code: &RoomCode) -> StoreResult<Room> {
        self.rooms
            .read()
            .await
            .get(code)
            .map(|entry| entry.room.clone())
            .ok_or_else(|| StoreError::NotFound(code.to_string()))
    }

    async fn apply_patch(&self, code: &RoomCode, patches: Vec<Patch>) -> StoreResult<Room> {
        let mut rooms = self.rooms.write().await;
        let entry = rooms
            .get_mut(code)
            .ok_or_else(|| StoreError::NotFound(code.to_string()))?;

        // Apply to a copy so a failing patch leaves the stored document untouched
        let mut updated = entry.room.clone();
        for patch in &patches {
            patch.apply(&mut updated)?;
        }

        entry.room = updated.clone();
        entry.fan_out(RoomEvent::Snapshot(updated.clone()));

        tracing::debug!(
            "Applied {} patch(es) to room {} ({} subscriber(s))",
            patches.len(),
            code,
            entry.subscribers.len()
        );
        Ok(updated)
    }

    async fn subscribe(&self, code: &RoomCode) -> StoreResult<Subscription> {
        let mut rooms = self.rooms.write().await;
        let entry = rooms
            .get_mut(code)
            .ok_or_else(|| StoreError::NotFound(code.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        // Initial snapshot; the receiver is alive so this cannot fail
        let _ = tx.send(RoomEvent::Snapshot(entry.room.clone()));
        entry.subscribers.push(tx);

        Ok(Subscription::new(code.clone(), rx))
    }

    async fn delete_room(&self, code: &RoomCode) -> StoreResult<()> {
        let mut entry = self
            .rooms
            .write()
            .await
            .remove(code)
            .ok_or_else(|| StoreError::NotFound(code.to_string()))?;

        entry.fan_out(RoomEvent::Removed);
        tracing::info!("Deleted room {}", code);
        Ok(())
    }
}
