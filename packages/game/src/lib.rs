#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Live quiz rooms.
//!
//! [`GameRooms`] owns every live room and is driven by one call per inbound
//! event. It never performs IO: each call returns the [`Effect`]s the caller
//! must carry out, in order. Timers come back in through
//! [`GameRooms::timer`] carrying the epoch they were scheduled with, and a
//! timer whose epoch no longer matches the room is dropped.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    sync::Arc,
    time::Duration,
};

use booxclash_config::ServerConfig;
use booxclash_game_models::{
    AnswerEntry, AnswerResult, ConnId, Eliminated, GameMode, GameOver, HostJoinRoom, JoinRoom,
    NewQuestion, Player, PlayerAnswersUpdate, PlayerSummary, PlayerWaiting, RoomId, RoundEnded,
    RoundStarting, ServerMessage, SubmitAnswer, TimerUpdate,
};
use booxclash_knockout::eliminate_lowest;
use booxclash_questions::QuestionBank;
use rand::{Rng, SeedableRng as _, rngs::StdRng};
use strum_macros::AsRefStr;
use thiserror::Error;

mod room;

pub use room::{DEFAULT_SUBJECT, LiveRoom, Phase};

/// Points awarded for a correct answer.
pub const CORRECT_ANSWER_POINTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameTimings {
    pub turn_seconds: u32,
    pub game_start_delay: Duration,
    pub round_start_delay: Duration,
    pub tick: Duration,
}

impl Default for GameTimings {
    fn default() -> Self {
        Self {
            turn_seconds: 20,
            game_start_delay: Duration::from_millis(4000),
            round_start_delay: Duration::from_millis(2000),
            tick: Duration::from_secs(1),
        }
    }
}

impl From<&ServerConfig> for GameTimings {
    fn from(value: &ServerConfig) -> Self {
        Self {
            turn_seconds: value.turn_seconds,
            game_start_delay: value.game_start_delay,
            round_start_delay: value.round_start_delay,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every member of the room at the time the effect is carried out.
    Room(RoomId),
    Connection(ConnId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
pub enum Timer {
    FirstQuestion,
    Tick { time_left: u32 },
    TurnExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send {
        to: Recipient,
        message: ServerMessage,
    },
    Schedule {
        room_id: RoomId,
        epoch: u64,
        delay: Duration,
        timer: Timer,
    },
    RoomClosed(RoomId),
}

impl Effect {
    fn to_room(room_id: &str, message: ServerMessage) -> Self {
        Self::Send {
            to: Recipient::Room(room_id.to_string()),
            message,
        }
    }

    const fn to_connection(conn: ConnId, message: ServerMessage) -> Self {
        Self::Send {
            to: Recipient::Connection(conn),
            message,
        }
    }
}

/// Reasons an inbound event is rejected. Sent back to the sender as an
/// `error` event (or `roomFull`).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("Room not found.")]
    RoomNotFound,
    #[error("Name and country are required.")]
    MissingFields,
    #[error("maxPlayers must be at least 1.")]
    InvalidMaxPlayers,
    #[error("Room is full.")]
    RoomFull,
    #[error("You have already joined the room.")]
    AlreadyJoined,
    #[error("Game already started.")]
    AlreadyStarted,
    #[error("Only the host can do that.")]
    NotHost,
    #[error("Not enough players to start.")]
    NotEnoughPlayers,
    #[error("The round is not over yet.")]
    RoundNotOver,
    #[error("The game is over.")]
    GameOver,
    #[error("No question is active.")]
    NoActiveQuestion,
    #[error("It is not your turn.")]
    NotYourTurn,
}

impl From<GameError> for ServerMessage {
    fn from(value: GameError) -> Self {
        match value {
            GameError::RoomFull => Self::room_full(value.to_string()),
            _ => Self::error(value.to_string()),
        }
    }
}

/// Every live room, keyed by room id.
pub struct GameRooms<R = StdRng> {
    rooms: BTreeMap<RoomId, LiveRoom>,
    bank: Arc<QuestionBank>,
    timings: GameTimings,
    rng: R,
    /// Highest epoch handed out to a room that has since closed. New rooms
    /// start above it so a reused room id never accepts an old timer.
    retired_epoch: u64,
}

impl GameRooms<StdRng> {
    #[must_use]
    pub fn new(bank: Arc<QuestionBank>, timings: GameTimings) -> Self {
        Self::with_rng(bank, timings, StdRng::from_os_rng())
    }
}

impl<R: Rng> GameRooms<R> {
    #[must_use]
    pub const fn with_rng(bank: Arc<QuestionBank>, timings: GameTimings, rng: R) -> Self {
        Self {
            rooms: BTreeMap::new(),
            bank,
            timings,
            rng,
            retired_epoch: 0,
        }
    }

    #[must_use]
    pub fn room(&self, room_id: &str) -> Option<&LiveRoom> {
        self.rooms.get(room_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Connections that receive broadcasts for `room_id`.
    pub fn members(&self, room_id: &str) -> impl Iterator<Item = ConnId> + '_ {
        self.rooms
            .get(room_id)
            .into_iter()
            .flat_map(|x| x.members.iter().copied())
    }

    #[must_use]
    pub fn connect(&self, conn: ConnId) -> Vec<Effect> {
        vec![Effect::to_connection(conn, ServerMessage::AssignId(conn))]
    }

    pub fn host_join(&mut self, conn: ConnId, request: HostJoinRoom) -> Vec<Effect> {
        self.handle(conn, |rooms| rooms.try_host_join(conn, request))
    }

    pub fn join(&mut self, conn: ConnId, request: JoinRoom) -> Vec<Effect> {
        self.handle(conn, |rooms| rooms.try_join(conn, request))
    }

    pub fn start_game(&mut self, conn: ConnId, room_id: &str) -> Vec<Effect> {
        self.handle(conn, |rooms| rooms.try_start_game(conn, room_id))
    }

    pub fn start_next_round(&mut self, conn: ConnId, room_id: &str) -> Vec<Effect> {
        self.handle(conn, |rooms| rooms.try_start_next_round(conn, room_id))
    }

    pub fn answer(&mut self, conn: ConnId, request: &SubmitAnswer) -> Vec<Effect> {
        self.handle(conn, |rooms| rooms.try_answer(conn, request))
    }

    pub fn leave(&mut self, conn: ConnId, room_id: &str) -> Vec<Effect> {
        self.handle(conn, |rooms| {
            if !rooms.rooms.contains_key(room_id) {
                return Err(GameError::RoomNotFound);
            }
            let mut effects = vec![];
            rooms.remove_connection(room_id, conn, &mut effects);
            Ok(effects)
        })
    }

    /// Removes the connection from every room it is in.
    pub fn disconnect(&mut self, conn: ConnId) -> Vec<Effect> {
        let room_ids = self
            .rooms
            .iter()
            .filter(|(_, room)| room.members.contains(&conn) || room.has_player(conn))
            .map(|(room_id, _)| room_id.clone())
            .collect::<Vec<_>>();

        let mut effects = vec![];
        for room_id in room_ids {
            self.remove_connection(&room_id, conn, &mut effects);
        }
        effects
    }

    pub fn timer(&mut self, room_id: &str, epoch: u64, timer: Timer) -> Vec<Effect> {
        let Some(room) = self.rooms.get(room_id) else {
            log::debug!("timer: room {room_id} is gone, dropping {}", timer.as_ref());
            return vec![];
        };

        if room.timer_epoch != epoch {
            log::trace!(
                "timer: stale {} for room {room_id} (epoch {epoch} != {})",
                timer.as_ref(),
                room.timer_epoch
            );
            return vec![];
        }

        let mut effects = vec![];

        match (timer, room.phase) {
            (Timer::FirstQuestion, Phase::Starting) => {
                self.send_question(room_id, &mut effects);
            }
            (Timer::Tick { time_left }, Phase::Turn) => {
                effects.push(Effect::to_room(
                    room_id,
                    ServerMessage::TimerUpdate(TimerUpdate { time_left }),
                ));
                let (delay, timer) = if time_left == 0 {
                    (Duration::ZERO, Timer::TurnExpired)
                } else {
                    (
                        self.timings.tick,
                        Timer::Tick {
                            time_left: time_left - 1,
                        },
                    )
                };
                effects.push(Effect::Schedule {
                    room_id: room_id.to_string(),
                    epoch,
                    delay,
                    timer,
                });
            }
            (Timer::TurnExpired, Phase::Turn) => {
                log::debug!("timer: turn expired in room {room_id}");
                effects.push(Effect::to_room(room_id, ServerMessage::TimeUp));
                if let Some(room) = self.rooms.get_mut(room_id) {
                    room.current_player_index += 1;
                }
                self.continue_round(room_id, &mut effects);
            }
            (timer, phase) => {
                log::debug!(
                    "timer: ignoring {} in phase {} for room {room_id}",
                    timer.as_ref(),
                    phase.as_ref()
                );
            }
        }

        effects
    }

    fn handle(
        &mut self,
        conn: ConnId,
        f: impl FnOnce(&mut Self) -> Result<Vec<Effect>, GameError>,
    ) -> Vec<Effect> {
        f(self).unwrap_or_else(|e| {
            log::debug!("Rejected event from {conn}: {e}");
            vec![Effect::to_connection(conn, e.into())]
        })
    }

    fn try_host_join(
        &mut self,
        conn: ConnId,
        request: HostJoinRoom,
    ) -> Result<Vec<Effect>, GameError> {
        if request.max_players == 0 {
            return Err(GameError::InvalidMaxPlayers);
        }

        let host = Player {
            socket_id: conn,
            name: request.host_name.trim().to_string(),
            country: request.host_country.trim().to_string(),
        };

        let retired_epoch = self.retired_epoch;

        let room = match self.rooms.entry(request.room_id) {
            Entry::Occupied(entry) => {
                let room = entry.into_mut();
                if room.host.is_some_and(|x| x != conn) {
                    return Err(GameError::NotHost);
                }
                room.max_players = request.max_players;
                room.host = Some(conn);
                room.members.insert(conn);

                if room.phase == Phase::Lobby {
                    if let Some(subject) = request.subject {
                        room.subject = subject;
                    }
                    if let Some(mode) = request.mode {
                        room.mode = mode;
                    }
                    if !room.has_player(conn) {
                        room.add_player(host);
                    }
                }
                room
            }
            Entry::Vacant(entry) => {
                let mut room = LiveRoom::new(entry.key().clone(), host, request.max_players);
                room.timer_epoch = retired_epoch;
                if let Some(subject) = request.subject {
                    room.subject = subject;
                }
                room.mode = request.mode.unwrap_or_default();
                log::debug!(
                    "Created live room {} (subject={}, mode={}, maxPlayers={})",
                    room.room_id,
                    room.subject,
                    room.mode.as_ref(),
                    room.max_players
                );
                entry.insert(room)
            }
        };

        Ok(vec![Self::player_list_update(room)])
    }

    fn try_join(&mut self, conn: ConnId, request: JoinRoom) -> Result<Vec<Effect>, GameError> {
        let room = self
            .rooms
            .get_mut(&request.room_id)
            .ok_or(GameError::RoomNotFound)?;

        let name = request.name.trim();
        let country = request.country.trim();

        if name.is_empty() || country.is_empty() {
            return Err(GameError::MissingFields);
        }
        if room.is_full() {
            return Err(GameError::RoomFull);
        }
        if room.has_player(conn) {
            return Err(GameError::AlreadyJoined);
        }
        if room.phase != Phase::Lobby {
            return Err(GameError::AlreadyStarted);
        }

        room.add_player(Player {
            socket_id: conn,
            name: name.to_string(),
            country: country.to_string(),
        });

        log::debug!(
            "{name} joined room {} ({}/{})",
            room.room_id,
            room.players.len(),
            room.max_players
        );

        let waiting = ServerMessage::PlayerWaiting(PlayerWaiting {
            message: "Waiting for host...".to_string(),
            current: room.players.len(),
            max: room.max_players,
        });
        let full = room.is_full();

        let mut effects = vec![
            Self::player_list_update(room),
            Effect::to_connection(conn, waiting),
        ];

        if full {
            effects.push(Effect::to_room(
                &request.room_id,
                ServerMessage::room_full("Room is full. Waiting for host..."),
            ));
        }

        Ok(effects)
    }

    fn try_start_game(&mut self, conn: ConnId, room_id: &str) -> Result<Vec<Effect>, GameError> {
        let delay = self.timings.game_start_delay;
        let room = self.rooms.get_mut(room_id).ok_or(GameError::RoomNotFound)?;

        if room.host != Some(conn) {
            return Err(GameError::NotHost);
        }
        if room.phase != Phase::Lobby {
            return Err(GameError::AlreadyStarted);
        }
        if room.players.is_empty() {
            return Err(GameError::NotEnoughPlayers);
        }

        room.phase = Phase::Starting;
        room.current_player_index = 0;
        room.round_points.clear();
        let epoch = room.next_epoch();

        log::info!(
            "Starting game in room {room_id} with {} players",
            room.players.len()
        );

        Ok(vec![
            Effect::to_room(room_id, ServerMessage::GameStarting),
            Effect::Schedule {
                room_id: room_id.to_string(),
                epoch,
                delay,
                timer: Timer::FirstQuestion,
            },
        ])
    }

    fn try_start_next_round(
        &mut self,
        conn: ConnId,
        room_id: &str,
    ) -> Result<Vec<Effect>, GameError> {
        let delay = self.timings.round_start_delay;
        let room = self.rooms.get_mut(room_id).ok_or(GameError::RoomNotFound)?;

        if room.host != Some(conn) {
            return Err(GameError::NotHost);
        }
        match room.phase {
            Phase::RoundOver => {}
            Phase::Finished => return Err(GameError::GameOver),
            Phase::Lobby | Phase::Starting | Phase::Turn => return Err(GameError::RoundNotOver),
        }

        room.current_player_index = 0;
        room.answers.clear();
        room.round_points.clear();
        room.round += 1;
        room.phase = Phase::Starting;
        let epoch = room.next_epoch();
        let round = room.round;

        log::info!("Starting round {round} in room {room_id}");

        Ok(vec![
            Effect::to_room(
                room_id,
                ServerMessage::RoundStarting(RoundStarting { round }),
            ),
            Effect::Schedule {
                room_id: room_id.to_string(),
                epoch,
                delay,
                timer: Timer::FirstQuestion,
            },
        ])
    }

    fn try_answer(
        &mut self,
        conn: ConnId,
        request: &SubmitAnswer,
    ) -> Result<Vec<Effect>, GameError> {
        let room_id = request.room_id.as_str();
        let room = self.rooms.get_mut(room_id).ok_or(GameError::RoomNotFound)?;

        let question = match (room.phase, &room.current_question) {
            (Phase::Turn, Some(question)) => question,
            _ => return Err(GameError::NoActiveQuestion),
        };

        if room.current_player().map(|x| x.socket_id) != Some(conn) {
            return Err(GameError::NotYourTurn);
        }

        let correct = question.is_correct(&request.answer);
        let correct_answer = question.correct_answer.clone();

        if correct {
            *room.scores.entry(conn).or_default() += CORRECT_ANSWER_POINTS;
            *room.round_points.entry(conn).or_default() += CORRECT_ANSWER_POINTS;
        }
        room.answers.push(AnswerEntry {
            player_id: conn,
            answer: request.answer.clone(),
        });
        room.current_player_index += 1;

        log::debug!(
            "Player {conn} answered in room {room_id} (correct={correct}, score={})",
            room.score(conn)
        );

        let mut effects = vec![
            Effect::to_connection(
                conn,
                ServerMessage::AnswerResult(AnswerResult {
                    correct,
                    correct_answer,
                }),
            ),
            Effect::to_room(
                room_id,
                ServerMessage::PlayerAnswersUpdate(PlayerAnswersUpdate {
                    answers: room.answers.clone(),
                }),
            ),
            Self::player_list_update(room),
        ];

        self.continue_round(room_id, &mut effects);

        Ok(effects)
    }

    fn player_list_update(room: &LiveRoom) -> Effect {
        Effect::to_room(
            &room.room_id,
            ServerMessage::PlayerListUpdate(room.player_list_update()),
        )
    }

    /// Sends the question for the player at the current index, or ends the
    /// round when every player has had a turn.
    fn continue_round(&mut self, room_id: &str, effects: &mut Vec<Effect>) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };

        room.next_epoch();

        if room.current_player_index < room.players.len() {
            self.send_question(room_id, effects);
        } else {
            self.end_round(room_id, effects);
        }
    }

    fn send_question(&mut self, room_id: &str, effects: &mut Vec<Effect>) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };

        let Some(current_player) = room.current_player().cloned() else {
            log::debug!("send_question: no players left in room {room_id}");
            self.finish(room_id, effects);
            return;
        };

        let level = room.round.to_string();
        let Some(question) = self
            .bank
            .random_question(&room.subject, &level, &mut self.rng)
            .cloned()
        else {
            log::warn!("No questions found for {} level {level}", room.subject);
            effects.push(Effect::to_room(
                room_id,
                ServerMessage::error(format!("No questions for level {level}")),
            ));
            self.finish(room_id, effects);
            return;
        };

        room.phase = Phase::Turn;
        let epoch = room.next_epoch();
        let time_left = self.timings.turn_seconds;

        effects.push(Effect::to_room(
            room_id,
            ServerMessage::NewQuestion(NewQuestion {
                question: question.to_public(),
                current_player,
                leaderboard: room.leaderboard(),
                time_left,
                round: room.round,
            }),
        ));
        room.current_question = Some(question);

        effects.push(Effect::Schedule {
            room_id: room_id.to_string(),
            epoch,
            delay: self.timings.tick,
            timer: Timer::Tick {
                time_left: time_left.saturating_sub(1),
            },
        });
    }

    fn end_round(&mut self, room_id: &str, effects: &mut Vec<Effect>) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };

        room.current_question = None;
        room.next_epoch();

        if room.players.is_empty() {
            self.finish(room_id, effects);
            return;
        }

        let round = room.round;
        let leaderboard = room.leaderboard();

        let eliminated = match room.mode {
            GameMode::Classic => vec![],
            GameMode::Knockout => {
                let points = room
                    .players
                    .iter()
                    .map(|x| {
                        let points = room.round_points.get(&x.socket_id).copied();
                        (x.socket_id, points.unwrap_or_default())
                    })
                    .collect::<Vec<_>>();

                let mut eliminated = vec![];
                for conn in eliminate_lowest(&points).eliminated {
                    let score = room.score(conn);
                    let Some((_, player)) = room.remove_player(conn) else {
                        continue;
                    };
                    effects.push(Effect::to_connection(
                        conn,
                        ServerMessage::Eliminated(Eliminated {
                            message: format!("You have been eliminated in round {round}."),
                            score,
                        }),
                    ));
                    room.eliminated.push(PlayerSummary {
                        socket_id: conn,
                        name: player.name.clone(),
                        country: player.country.clone(),
                        score,
                    });
                    eliminated.push(player);
                }
                eliminated
            }
        };

        log::info!(
            "Round {round} ended in room {room_id} ({} eliminated)",
            eliminated.len()
        );

        effects.push(Effect::to_room(
            room_id,
            ServerMessage::RoundEnded(RoundEnded {
                round,
                leaderboard,
                eliminated,
            }),
        ));

        if room.mode == GameMode::Knockout && room.players.len() <= 1 {
            self.finish(room_id, effects);
        } else {
            room.phase = Phase::RoundOver;
        }
    }

    /// Ends the game and announces the top scorer.
    fn finish(&mut self, room_id: &str, effects: &mut Vec<Effect>) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };

        room.phase = Phase::Finished;
        room.current_question = None;
        room.next_epoch();

        let leaderboard = room.final_leaderboard();
        let champion = room
            .leaderboard()
            .first()
            .map(|x| Player {
                socket_id: x.socket_id,
                name: x.name.clone(),
                country: x.country.clone(),
            });

        log::info!(
            "Game over in room {room_id}, champion: {}",
            champion.as_ref().map_or("none", |x| x.name.as_str())
        );

        effects.push(Effect::to_room(
            room_id,
            ServerMessage::GameOver(GameOver {
                champion,
                leaderboard,
            }),
        ));
    }

    fn remove_connection(&mut self, room_id: &str, conn: ConnId, effects: &mut Vec<Effect>) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };

        room.members.remove(&conn);
        if room.host == Some(conn) {
            room.host = None;
        }

        let removed = room.remove_player(conn).map(|(index, _)| index);

        if room.is_empty() {
            log::info!("Closing empty room {room_id}");
            self.retired_epoch = self.retired_epoch.max(room.timer_epoch);
            self.rooms.remove(room_id);
            effects.push(Effect::RoomClosed(room_id.to_string()));
            return;
        }

        let Some(index) = removed else {
            return;
        };

        log::debug!("Removed player {conn} from room {room_id}");
        effects.push(Self::player_list_update(room));

        if room.phase != Phase::Turn {
            return;
        }

        if index == room.current_player_index {
            self.continue_round(room_id, effects);
        } else if index < room.current_player_index {
            room.current_player_index -= 1;
        }
    }
}
