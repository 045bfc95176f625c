//! Wire types for the live quiz room protocol.
//!
//! Every WebSocket frame is a JSON object of the form
//! `{"event": "<name>", "payload": <body>}`. Events without a body omit
//! `payload`.
//!
//! ```rust
//! use booxclash_game_models::ClientMessage;
//!
//! let message: ClientMessage =
//!     serde_json::from_str(r#"{"event":"startGame","payload":{"roomId":"ABC123"}}"#).unwrap();
//!
//! assert_eq!(message.room_id(), "ABC123");
//! ```

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use serde::{Deserialize, Serialize};
use strum_macros::AsRefStr;

/// Connection id assigned to each WebSocket client.
pub type ConnId = u64;

/// Short alphanumeric room code.
pub type RoomId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub socket_id: ConnId,
    pub name: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub socket_id: ConnId,
    pub name: String,
    pub country: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub socket_id: ConnId,
    pub name: String,
    pub country: String,
    pub score: u32,
    pub is_current: bool,
}

/// A multiple choice question as stored in the question bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

impl Question {
    /// Compares an answer with the correct one, ignoring surrounding
    /// whitespace and letter case.
    #[must_use]
    pub fn is_correct(&self, answer: &str) -> bool {
        answer
            .trim()
            .eq_ignore_ascii_case(self.correct_answer.trim())
    }

    /// The question without its answer, safe to send to players.
    #[must_use]
    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            question: self.question.clone(),
            options: self.options.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub question: String,
    pub options: Vec<String>,
}

/// How a round ends.
///
/// * `Classic` - scores accumulate and the host decides when to stop
/// * `Knockout` - the lowest scorers of each round are eliminated until one
///   player remains
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum GameMode {
    #[default]
    Classic,
    Knockout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    pub player_id: ConnId,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostJoinRoom {
    pub room_id: RoomId,
    pub max_players: usize,
    pub host_name: String,
    pub host_country: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub mode: Option<GameMode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub room_id: RoomId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    pub room_id: RoomId,
}

/// An answer submitted by the player whose turn it is.
///
/// Older clients also send `socketId` and `isCorrect`. Both are ignored: the
/// sender is the connection and correctness is decided by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswer {
    pub room_id: RoomId,
    #[serde(default)]
    pub answer: String,
}

/// Events sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ClientMessage {
    HostJoinRoom(HostJoinRoom),
    JoinRoom(JoinRoom),
    StartGame(RoomRef),
    StartNextRound(RoomRef),
    Answer(SubmitAnswer),
    LeaveRoom(RoomRef),
}

impl ClientMessage {
    #[must_use]
    pub fn room_id(&self) -> &str {
        match self {
            Self::HostJoinRoom(x) => &x.room_id,
            Self::JoinRoom(x) => &x.room_id,
            Self::StartGame(x) | Self::StartNextRound(x) | Self::LeaveRoom(x) => &x.room_id,
            Self::Answer(x) => &x.room_id,
        }
    }
}

impl std::fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerListUpdate {
    pub players: Vec<PlayerSummary>,
    pub joined_count: usize,
    pub max_players: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerWaiting {
    pub message: String,
    pub current: usize,
    pub max: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStarting {
    pub round: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub question: PublicQuestion,
    pub current_player: Player,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub time_left: u32,
    pub round: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerUpdate {
    pub time_left: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub correct: bool,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAnswersUpdate {
    pub answers: Vec<AnswerEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundEnded {
    pub round: u32,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub eliminated: Vec<Player>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eliminated {
    pub message: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOver {
    pub champion: Option<Player>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Events sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ServerMessage {
    AssignId(ConnId),
    PlayerListUpdate(PlayerListUpdate),
    PlayerWaiting(PlayerWaiting),
    RoomFull(Notice),
    Error(Notice),
    GameStarting,
    RoundStarting(RoundStarting),
    NewQuestion(NewQuestion),
    TimerUpdate(TimerUpdate),
    TimeUp,
    AnswerResult(AnswerResult),
    PlayerAnswersUpdate(PlayerAnswersUpdate),
    RoundEnded(RoundEnded),
    Eliminated(Eliminated),
    GameOver(GameOver),
}

impl ServerMessage {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(Notice {
            message: message.into(),
        })
    }

    #[must_use]
    pub fn room_full(message: impl Into<String>) -> Self {
        Self::RoomFull(Notice {
            message: message.into(),
        })
    }

    /// # Errors
    ///
    /// * If the message fails to serialize
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl std::fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}
