//! Room registry - lookup and lazy creation of rooms
//!
//! The registry lock covers lookup and first-time opening only; once a room
//! is handed out, its moves run under the room's own lock, so independent
//! rooms proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::{CascadeEngine, EngineConfig, GemRng};
use crate::room::{Room, RoomError, RoomOptions, RoomServices};
use crate::types::RoomId;

struct Rooms {
    open: HashMap<RoomId, Arc<Room>>,
    /// Server-wide source; every room forks its own stream from it
    rng: GemRng,
}

pub struct RoomRegistry {
    rooms: Mutex<Rooms>,
    engine: EngineConfig,
    services: RoomServices,
    options: RoomOptions,
}

impl RoomRegistry {
    pub fn new(
        engine: EngineConfig,
        rng: GemRng,
        services: RoomServices,
        options: RoomOptions,
    ) -> Self {
        Self {
            rooms: Mutex::new(Rooms {
                open: HashMap::new(),
                rng,
            }),
            engine,
            services,
            options,
        }
    }

    /// Return the open room, opening it from the board store on first use
    pub async fn get_or_open(&self, id: &RoomId) -> Result<Arc<Room>, RoomError> {
        let mut rooms = self.rooms.lock().await;
        if let Some(room) = rooms.open.get(id) {
            return Ok(Arc::clone(room));
        }

        let engine = CascadeEngine::new(self.engine, rooms.rng.fork());
        let room = Arc::new(
            Room::open(id.clone(), engine, self.services.clone(), self.options).await?,
        );
        rooms.open.insert(id.clone(), Arc::clone(&room));
        Ok(room)
    }

    pub async fn get(&self, id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.lock().await.open.get(id).cloned()
    }

    pub async fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.lock().await.open.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.rooms.lock().await.open.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
