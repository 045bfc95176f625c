use serde::{Deserialize, Serialize};

use crate::RoomError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredPlayer {
    pub name: String,
    pub country: String,
}

/// A room created by a host before the live game starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: String,
    pub subject: String,
    /// Maximum number of players, host included when the host plays.
    pub num_players: usize,
    pub host_name: String,
    pub host_country: String,
    pub host_is_player: bool,
    pub players: Vec<RegisteredPlayer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined,
}

impl Room {
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.num_players
    }

    /// Adds a player unless one with the same name is already registered. A
    /// full room rejects everyone, registered names included.
    ///
    /// # Errors
    ///
    /// * If the name or country is blank
    /// * If the room is full
    pub fn try_join(&mut self, name: &str, country: &str) -> Result<JoinOutcome, RoomError> {
        let name = name.trim();
        let country = country.trim();

        if name.is_empty() || country.is_empty() {
            return Err(RoomError::MissingFields);
        }

        if self.is_full() {
            return Err(RoomError::Full(self.room_id.clone()));
        }

        if self.players.iter().any(|x| x.name == name) {
            return Ok(JoinOutcome::AlreadyJoined);
        }

        self.players.push(RegisteredPlayer {
            name: name.to_string(),
            country: country.to_string(),
        });

        Ok(JoinOutcome::Joined)
    }
}

/// Request body for creating a room. A missing `room_id` gets a generated
/// code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoom {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub subject: String,
    pub num_players: usize,
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub host_country: String,
    #[serde(default)]
    pub host_is_player: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: String,
}
