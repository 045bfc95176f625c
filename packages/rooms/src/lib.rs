//! Registered rooms.
//!
//! A host registers a room (subject, capacity, host details) over HTTP before
//! anyone connects to the live game. Players then join by room code. Storage
//! sits behind the [`RoomStore`] trait; [`InMemoryRoomStore`] is the only
//! implementation.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use tokio::sync::RwLock;

#[cfg(feature = "api")]
pub mod api;

pub mod models;

pub use models::{CreateRoom, JoinOutcome, RegisteredPlayer, Room};

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const ROOM_CODE_LENGTH: usize = 6;
const MAX_CODE_ATTEMPTS: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room {0} already exists")]
    AlreadyExists(String),
    #[error("Room {0} not found")]
    NotFound(String),
    #[error("Room {0} is full")]
    Full(String),
    #[error("All fields are required")]
    MissingFields,
    #[error("Room must allow at least one player")]
    InvalidCapacity,
    #[error("Failed to generate a free room code")]
    CodeExhausted,
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    /// # Errors
    ///
    /// * [`RoomError::AlreadyExists`] if the room id is taken
    async fn insert(&self, room: Room) -> Result<(), RoomError>;

    async fn get(&self, room_id: &str) -> Option<Room>;

    /// # Errors
    ///
    /// * [`RoomError::NotFound`] if the room does not exist
    /// * Any error from [`Room::try_join`]
    async fn join(
        &self,
        room_id: &str,
        name: &str,
        country: &str,
    ) -> Result<JoinOutcome, RoomError>;

    async fn remove(&self, room_id: &str) -> Option<Room>;
}

#[derive(Debug, Default)]
pub struct InMemoryRoomStore {
    rooms: RwLock<BTreeMap<String, Room>>,
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn insert(&self, room: Room) -> Result<(), RoomError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.room_id) {
            return Err(RoomError::AlreadyExists(room.room_id));
        }
        rooms.insert(room.room_id.clone(), room);
        drop(rooms);
        Ok(())
    }

    async fn get(&self, room_id: &str) -> Option<Room> {
        self.rooms.read().await.get(room_id).cloned()
    }

    async fn join(
        &self,
        room_id: &str,
        name: &str,
        country: &str,
    ) -> Result<JoinOutcome, RoomError> {
        self.rooms
            .write()
            .await
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?
            .try_join(name, country)
    }

    async fn remove(&self, room_id: &str) -> Option<Room> {
        self.rooms.write().await.remove(room_id)
    }
}

/// Generates a random room code such as `K3ZQ9A`.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_CODE_LENGTH)
        .map(|_| char::from(ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())]))
        .collect()
}

/// Room codes are matched case-insensitively and without surrounding
/// whitespace.
#[must_use]
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// # Errors
///
/// * [`RoomError::MissingFields`] if the subject or host details are blank
/// * [`RoomError::InvalidCapacity`] if `num_players` is `0`
/// * [`RoomError::AlreadyExists`] if the requested code is taken
/// * [`RoomError::CodeExhausted`] if no free code could be generated
pub async fn create_room<R: Rng + ?Sized>(
    store: &dyn RoomStore,
    request: CreateRoom,
    rng: &mut R,
) -> Result<Room, RoomError> {
    if request.subject.trim().is_empty()
        || request.host_name.trim().is_empty()
        || request.host_country.trim().is_empty()
    {
        return Err(RoomError::MissingFields);
    }
    if request.num_players == 0 {
        return Err(RoomError::InvalidCapacity);
    }

    let host_name = request.host_name.trim().to_string();
    let host_country = request.host_country.trim().to_string();

    let players = if request.host_is_player {
        vec![RegisteredPlayer {
            name: host_name.clone(),
            country: host_country.clone(),
        }]
    } else {
        vec![]
    };

    let mut room = Room {
        room_id: String::new(),
        subject: request.subject.trim().to_string(),
        num_players: request.num_players,
        host_name,
        host_country,
        host_is_player: request.host_is_player,
        players,
    };

    if let Some(room_id) = request
        .room_id
        .as_deref()
        .map(normalize_room_code)
        .filter(|x| !x.is_empty())
    {
        room.room_id = room_id;
        store.insert(room.clone()).await?;
        log::debug!("Created room {}", room.room_id);
        return Ok(room);
    }

    for _ in 0..MAX_CODE_ATTEMPTS {
        room.room_id = generate_room_code(rng);
        match store.insert(room.clone()).await {
            Ok(()) => {
                log::debug!("Created room {} with generated code", room.room_id);
                return Ok(room);
            }
            Err(RoomError::AlreadyExists(code)) => {
                log::debug!("Generated room code {code} is taken, retrying");
            }
            Err(e) => return Err(e),
        }
    }

    Err(RoomError::CodeExhausted)
}

/// # Errors
///
/// * [`RoomError::NotFound`] if the room does not exist
pub async fn get_room(store: &dyn RoomStore, room_id: &str) -> Result<Room, RoomError> {
    let room_id = normalize_room_code(room_id);
    store
        .get(&room_id)
        .await
        .ok_or(RoomError::NotFound(room_id))
}

/// # Errors
///
/// * [`RoomError::MissingFields`] if the name or country is blank
/// * [`RoomError::NotFound`] if the room does not exist
/// * [`RoomError::Full`] if the room is full
pub async fn join_room(
    store: &dyn RoomStore,
    room_id: &str,
    name: &str,
    country: &str,
) -> Result<JoinOutcome, RoomError> {
    let room_id = normalize_room_code(room_id);
    if room_id.is_empty() || name.trim().is_empty() || country.trim().is_empty() {
        return Err(RoomError::MissingFields);
    }

    let outcome = store.join(&room_id, name, country).await?;
    log::debug!("join_room: room_id={room_id} name={name} outcome={outcome:?}");
    Ok(outcome)
}

/// # Errors
///
/// * [`RoomError::NotFound`] if the room does not exist
pub async fn get_players(
    store: &dyn RoomStore,
    room_id: &str,
) -> Result<Vec<RegisteredPlayer>, RoomError> {
    Ok(get_room(store, room_id).await?.players)
}

/// # Errors
///
/// * [`RoomError::NotFound`] if the room does not exist
pub async fn remove_room(store: &dyn RoomStore, room_id: &str) -> Result<Room, RoomError> {
    let room_id = normalize_room_code(room_id);
    store
        .remove(&room_id)
        .await
        .ok_or(RoomError::NotFound(room_id))
}
