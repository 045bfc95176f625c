use std::collections::{BTreeMap, BTreeSet};

use booxclash_game_models::{
    AnswerEntry, ConnId, GameMode, LeaderboardEntry, Player, PlayerListUpdate, PlayerSummary,
    Question, RoomId,
};
use strum_macros::AsRefStr;

pub const DEFAULT_SUBJECT: &str = "math";

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
pub enum Phase {
    /// Players are joining.
    Lobby,
    /// `gameStarting` or `roundStarting` was sent and the first question is
    /// pending.
    Starting,
    /// A player is answering.
    Turn,
    /// Waiting for the host to start the next round.
    RoundOver,
    Finished,
}

/// State of one live room.
#[derive(Debug, Clone)]
pub struct LiveRoom {
    pub room_id: RoomId,
    /// Active players in join order.
    pub players: Vec<Player>,
    /// Every connection that receives room broadcasts.
    pub members: BTreeSet<ConnId>,
    pub host: Option<ConnId>,
    pub max_players: usize,
    pub current_player_index: usize,
    pub scores: BTreeMap<ConnId, u32>,
    /// Points scored in the current round.
    pub round_points: BTreeMap<ConnId, u32>,
    pub answers: Vec<AnswerEntry>,
    pub round: u32,
    pub subject: String,
    pub mode: GameMode,
    pub phase: Phase,
    pub current_question: Option<Question>,
    pub timer_epoch: u64,
    /// Knocked out players with their final score.
    pub eliminated: Vec<PlayerSummary>,
}

impl LiveRoom {
    #[must_use]
    pub fn new(room_id: RoomId, host: Player, max_players: usize) -> Self {
        let host_id = host.socket_id;

        Self {
            room_id,
            players: vec![],
            members: BTreeSet::new(),
            host: Some(host_id),
            max_players,
            current_player_index: 0,
            scores: BTreeMap::new(),
            round_points: BTreeMap::new(),
            answers: vec![],
            round: 1,
            subject: DEFAULT_SUBJECT.to_string(),
            mode: GameMode::default(),
            phase: Phase::Lobby,
            current_question: None,
            timer_epoch: 0,
            eliminated: vec![],
        }
        .with_player(host)
    }

    fn with_player(mut self, player: Player) -> Self {
        self.add_player(player);
        self
    }

    pub fn add_player(&mut self, player: Player) {
        self.members.insert(player.socket_id);
        self.scores.insert(player.socket_id, 0);
        self.players.push(player);
    }

    #[must_use]
    pub fn has_player(&self, conn: ConnId) -> bool {
        self.players.iter().any(|x| x.socket_id == conn)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.members.is_empty()
    }

    #[must_use]
    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_player_index)
    }

    #[must_use]
    pub fn score(&self, conn: ConnId) -> u32 {
        self.scores.get(&conn).copied().unwrap_or_default()
    }

    /// Invalidates every pending timer and returns the new epoch.
    pub const fn next_epoch(&mut self) -> u64 {
        self.timer_epoch += 1;
        self.timer_epoch
    }

    /// Removes a player along with their score and answer. Returns the index
    /// they were at.
    pub fn remove_player(&mut self, conn: ConnId) -> Option<(usize, Player)> {
        let index = self.players.iter().position(|x| x.socket_id == conn)?;
        let player = self.players.remove(index);
        self.scores.remove(&conn);
        self.round_points.remove(&conn);
        self.answers.retain(|x| x.player_id != conn);
        Some((index, player))
    }

    #[must_use]
    pub fn player_list_update(&self) -> PlayerListUpdate {
        PlayerListUpdate {
            players: self
                .players
                .iter()
                .map(|x| PlayerSummary {
                    socket_id: x.socket_id,
                    name: x.name.clone(),
                    country: x.country.clone(),
                    score: self.score(x.socket_id),
                })
                .collect(),
            joined_count: self.players.len(),
            max_players: self.max_players,
        }
    }

    /// Active players sorted by score, highest first. Ties keep join order.
    #[must_use]
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let current = match self.phase {
            Phase::Turn => self.current_player().map(|x| x.socket_id),
            _ => None,
        };

        let mut leaderboard = self
            .players
            .iter()
            .map(|x| LeaderboardEntry {
                socket_id: x.socket_id,
                name: x.name.clone(),
                country: x.country.clone(),
                score: self.score(x.socket_id),
                is_current: Some(x.socket_id) == current,
            })
            .collect::<Vec<_>>();

        leaderboard.sort_by(|a, b| b.score.cmp(&a.score));
        leaderboard
    }

    /// Active players followed by eliminated ones, sorted by score.
    #[must_use]
    pub fn final_leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut leaderboard = self.leaderboard();
        leaderboard.extend(self.eliminated.iter().map(|x| LeaderboardEntry {
            socket_id: x.socket_id,
            name: x.name.clone(),
            country: x.country.clone(),
            score: x.score,
            is_current: false,
        }));
        leaderboard.sort_by(|a, b| b.score.cmp(&a.score));
        leaderboard
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn player(socket_id: ConnId, name: &str) -> Player {
        Player {
            socket_id,
            name: name.to_string(),
            country: "Zambia".to_string(),
        }
    }

    #[test_log::test]
    fn new_room_has_host_as_first_player() {
        let room = LiveRoom::new("ROOM1".to_string(), player(1, "Host"), 3);

        assert_eq!(room.players, vec![player(1, "Host")]);
        assert_eq!(room.host, Some(1));
        assert!(room.members.contains(&1));
        assert_eq!(room.score(1), 0);
        assert_eq!(room.subject, DEFAULT_SUBJECT);
        assert_eq!(room.round, 1);
        assert_eq!(room.phase, Phase::Lobby);
    }

    #[test_log::test]
    fn leaderboard_sorts_by_score_and_keeps_join_order_on_ties() {
        let mut room = LiveRoom::new("ROOM1".to_string(), player(1, "Host"), 4);
        room.add_player(player(2, "Alice"));
        room.add_player(player(3, "Bob"));
        room.scores.insert(3, 10);
        room.phase = Phase::Turn;
        room.current_player_index = 1;

        let leaderboard = room.leaderboard();

        assert_eq!(
            leaderboard
                .iter()
                .map(|x| (x.socket_id, x.score, x.is_current))
                .collect::<Vec<_>>(),
            vec![(3, 10, false), (1, 0, false), (2, 0, true)]
        );
    }

    #[test_log::test]
    fn remove_player_drops_score_and_answer() {
        let mut room = LiveRoom::new("ROOM1".to_string(), player(1, "Host"), 4);
        room.add_player(player(2, "Alice"));
        room.answers.push(AnswerEntry {
            player_id: 2,
            answer: "4".to_string(),
        });

        assert_eq!(room.remove_player(2), Some((1, player(2, "Alice"))));
        assert_eq!(room.remove_player(2), None);
        assert!(!room.scores.contains_key(&2));
        assert!(room.answers.is_empty());
    }
}
