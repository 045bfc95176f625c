//! Live game WebSocket server.
//!
//! A single command loop owns every connection and every live room, so room
//! state is never shared across tasks. Handlers talk to it through a
//! [`WsServerHandle`]. Turn timers are spawned tasks that sleep and then post
//! a [`Command::Timer`] back into the loop.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use booxclash_game::{Effect, GameRooms, Recipient, Timer};
use booxclash_game_models::{ClientMessage, ServerMessage};
use booxclash_logging::debug_or_trace;
use booxclash_rooms::RoomStore;
use strum_macros::AsRefStr;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::ws::{ConnId, Msg, RoomId};

#[derive(Debug, Error)]
pub enum WsServerError {
    #[error("WsServer is not running")]
    Closed,
    #[error(transparent)]
    Recv(#[from] oneshot::error::RecvError),
}

/// A command received by the [`WsServer`].
#[derive(Debug, AsRefStr)]
pub enum Command {
    Connect {
        conn_tx: mpsc::UnboundedSender<Msg>,
        res_tx: oneshot::Sender<ConnId>,
    },

    Disconnect {
        conn: ConnId,
    },

    /// Text frame received from a connection.
    Message {
        msg: Msg,
        conn: ConnId,
        res_tx: oneshot::Sender<()>,
    },

    Timer {
        room_id: RoomId,
        epoch: u64,
        timer: Timer,
    },
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Call and spawn [`run`](Self::run) to start processing commands.
#[allow(clippy::module_name_repetitions)]
pub struct WsServer {
    connections: BTreeMap<ConnId, mpsc::UnboundedSender<Msg>>,
    next_conn_id: ConnId,
    game: GameRooms,
    room_store: Arc<dyn RoomStore>,
    /// Cancels the pending timers of a live room.
    timers: BTreeMap<RoomId, CancellationToken>,
    cmd_tx: flume::Sender<Command>,
    cmd_rx: flume::Receiver<Command>,
    token: CancellationToken,
}

impl WsServer {
    #[must_use]
    pub fn new(game: GameRooms, room_store: Arc<dyn RoomStore>) -> (Self, WsServerHandle) {
        let (cmd_tx, cmd_rx) = flume::unbounded();
        let token = CancellationToken::new();
        let handle = WsServerHandle {
            cmd_tx: cmd_tx.clone(),
            token: token.clone(),
        };

        (
            Self {
                connections: BTreeMap::new(),
                next_conn_id: 1,
                game,
                room_store,
                timers: BTreeMap::new(),
                cmd_tx,
                cmd_rx,
                token,
            },
            handle,
        )
    }

    /// Send message directly to the user.
    fn send_message_to(&self, conn: ConnId, msg: Msg) {
        if let Some(sender) = self.connections.get(&conn) {
            // errors if client disconnected abruptly and hasn't been timed-out yet
            let _ = sender.send(msg);
        }
    }

    /// Send message to every member of a live room.
    fn send_room_message(&self, room_id: &str, msg: &str) {
        for conn in self.game.members(room_id) {
            if let Some(sender) = self.connections.get(&conn) {
                let _ = sender.send(msg.to_string());
            }
        }
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { to, message } => {
                    let msg = match message.to_json() {
                        Ok(msg) => msg,
                        Err(e) => {
                            log::error!("Failed to serialize {message}: {e:?}");
                            continue;
                        }
                    };
                    log::trace!("execute: sending {message} to {to:?}");
                    match to {
                        Recipient::Connection(conn) => self.send_message_to(conn, msg),
                        Recipient::Room(room_id) => self.send_room_message(&room_id, &msg),
                    }
                }
                Effect::Schedule {
                    room_id,
                    epoch,
                    delay,
                    timer,
                } => self.schedule(room_id, epoch, delay, timer),
                Effect::RoomClosed(room_id) => {
                    log::debug!("execute: room {room_id} closed");
                    if let Some(token) = self.timers.remove(&room_id) {
                        token.cancel();
                    }
                }
            }
        }
    }

    fn schedule(&mut self, room_id: RoomId, epoch: u64, delay: Duration, timer: Timer) {
        let token = self
            .timers
            .entry(room_id.clone())
            .or_insert_with(|| self.token.child_token())
            .clone();
        let cmd_tx = self.cmd_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    log::trace!("Timer {} for room {room_id} cancelled", timer.as_ref());
                }
                () = tokio::time::sleep(delay) => {
                    if let Err(e) = cmd_tx
                        .send_async(Command::Timer { room_id, epoch, timer })
                        .await
                    {
                        log::debug!("Failed to deliver timer: {e:?}");
                    }
                }
            }
        });
    }

    /// Register new session and assign unique ID to this session
    fn connect(&mut self, tx: mpsc::UnboundedSender<Msg>) -> ConnId {
        let id = self.next_conn_id;
        self.next_conn_id += 1;
        self.connections.insert(id, tx);

        log::debug!("Connected {id} ({} connections)", self.connections.len());

        let effects = self.game.connect(id);
        self.execute(effects);

        id
    }

    fn disconnect(&mut self, conn: ConnId) {
        self.connections.remove(&conn);
        log::debug!(
            "Disconnected {conn} ({} connections)",
            self.connections.len()
        );

        let effects = self.game.disconnect(conn);
        self.execute(effects);
    }

    async fn on_message(&mut self, conn: ConnId, msg: &str) {
        let message = match serde_json::from_str::<ClientMessage>(msg) {
            Ok(message) => message,
            Err(e) => {
                log::debug!("Invalid message from {conn}: {e}");
                self.execute(vec![Effect::Send {
                    to: Recipient::Connection(conn),
                    message: ServerMessage::error(format!("Invalid message: {e}")),
                }]);
                return;
            }
        };

        log::debug!("on_message: {message} from {conn} for {}", message.room_id());

        let effects = match message {
            ClientMessage::HostJoinRoom(mut request) => {
                if request.subject.is_none() {
                    request.subject = self.registered_subject(&request.room_id).await;
                }
                self.game.host_join(conn, request)
            }
            ClientMessage::JoinRoom(request) => self.game.join(conn, request),
            ClientMessage::StartGame(request) => self.game.start_game(conn, &request.room_id),
            ClientMessage::StartNextRound(request) => {
                self.game.start_next_round(conn, &request.room_id)
            }
            ClientMessage::Answer(request) => self.game.answer(conn, &request),
            ClientMessage::LeaveRoom(request) => self.game.leave(conn, &request.room_id),
        };

        self.execute(effects);
    }

    /// Subject of the room registered over HTTP, if there is one.
    async fn registered_subject(&self, room_id: &str) -> Option<String> {
        booxclash_rooms::get_room(&*self.room_store, room_id)
            .await
            .ok()
            .map(|x| x.subject)
            .filter(|x| !x.trim().is_empty())
    }

    async fn process_command(&mut self, cmd: Command) {
        let cmd_str = cmd.to_string();

        debug_or_trace!(
            ("process_command: cmd={cmd_str}"),
            ("process_command: cmd={cmd:?}")
        );

        match cmd {
            Command::Connect { conn_tx, res_tx } => {
                let conn = self.connect(conn_tx);
                if res_tx.send(conn).is_err() {
                    log::debug!("Connection {conn} went away before its id was delivered");
                    self.disconnect(conn);
                }
            }

            Command::Disconnect { conn } => {
                self.disconnect(conn);
            }

            Command::Message { msg, conn, res_tx } => {
                self.on_message(conn, &msg).await;
                let _ = res_tx.send(());
            }

            Command::Timer {
                room_id,
                epoch,
                timer,
            } => {
                let effects = self.game.timer(&room_id, epoch, timer);
                self.execute(effects);
            }
        }

        log::trace!("process_command: Finished processing cmd {cmd_str}");
    }

    pub async fn run(mut self) {
        let token = self.token.clone();
        let cmd_rx = self.cmd_rx.clone();

        while let Ok(Ok(cmd)) = tokio::select!(
            () = token.cancelled() => {
                log::debug!("WsServer was cancelled");
                Err(std::io::Error::new(std::io::ErrorKind::Interrupted, "Cancelled"))
            }
            cmd = cmd_rx.recv_async() => { Ok(cmd) }
        ) {
            log::trace!("Received WsServer command {cmd}");
            self.process_command(cmd).await;
        }

        for token in self.timers.values() {
            token.cancel();
        }

        log::debug!("Stopped WsServer");
    }
}

/// Handle and command sender for ws server.
///
/// Reduces boilerplate of setting up response channels in `WebSocket` handlers.
#[derive(Debug, Clone)]
pub struct WsServerHandle {
    cmd_tx: flume::Sender<Command>,
    token: CancellationToken,
}

impl WsServerHandle {
    /// Register client message sender and obtain connection ID.
    ///
    /// # Errors
    ///
    /// * If the server loop is not running
    pub async fn connect(&self, conn_tx: mpsc::UnboundedSender<Msg>) -> Result<ConnId, WsServerError> {
        log::trace!("Sending Connect command");
        let (res_tx, res_rx) = oneshot::channel();

        self.cmd_tx
            .send_async(Command::Connect { conn_tx, res_tx })
            .await
            .map_err(|_| WsServerError::Closed)?;

        Ok(res_rx.await?)
    }

    /// Forward a text frame to the server and wait until it is processed.
    ///
    /// # Errors
    ///
    /// * If the server loop is not running
    pub async fn send_message(
        &self,
        conn: ConnId,
        msg: impl Into<String> + Send,
    ) -> Result<(), WsServerError> {
        log::trace!("Sending Message command");
        let (res_tx, res_rx) = oneshot::channel();

        self.cmd_tx
            .send_async(Command::Message {
                msg: msg.into(),
                conn,
                res_tx,
            })
            .await
            .map_err(|_| WsServerError::Closed)?;

        Ok(res_rx.await?)
    }

    pub async fn disconnect(&self, conn: ConnId) {
        log::trace!("Sending Disconnect command");

        if let Err(e) = self.cmd_tx.send_async(Command::Disconnect { conn }).await {
            log::debug!("Failed to send Disconnect command: {e:?}");
        }
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use booxclash_game::GameTimings;
    use booxclash_questions::QuestionBank;
    use booxclash_rooms::{InMemoryRoomStore, models::CreateRoom};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;

    fn bank() -> QuestionBank {
        QuestionBank::from_json_str(
            r#"{
                "math": {
                    "1": [{ "question": "2 + 2?", "options": ["3", "4"], "correctAnswer": "4" }]
                },
                "science": {
                    "1": [{ "question": "H2O is?", "options": ["Water", "Salt"], "correctAnswer": "Water" }]
                }
            }"#,
        )
        .unwrap()
    }

    fn start(store: Arc<dyn RoomStore>) -> WsServerHandle {
        let timings = GameTimings {
            turn_seconds: 3,
            ..GameTimings::default()
        };
        let game = GameRooms::new(Arc::new(bank()), timings);
        let (server, handle) = WsServer::new(game, store);
        tokio::spawn(server.run());
        handle
    }

    struct Client {
        id: ConnId,
        rx: mpsc::UnboundedReceiver<Msg>,
    }

    impl Client {
        async fn connect(handle: &WsServerHandle) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let id = handle.connect(tx).await.unwrap();
            let mut client = Self { id, rx };
            assert_eq!(
                client.recv().await,
                json!({ "event": "assignId", "payload": id })
            );
            client
        }

        async fn recv(&mut self) -> Value {
            let msg = tokio::time::timeout(Duration::from_secs(60), self.rx.recv())
                .await
                .expect("timed out waiting for a message")
                .expect("connection closed");
            serde_json::from_str(&msg).unwrap()
        }

        /// Skips messages until one with the given event arrives.
        async fn recv_event(&mut self, event: &str) -> Value {
            loop {
                let msg = self.recv().await;
                if msg["event"] == event {
                    return msg;
                }
            }
        }

        async fn send(&self, handle: &WsServerHandle, msg: Value) {
            handle.send_message(self.id, msg.to_string()).await.unwrap();
        }
    }

    fn host_join_room(subject: Option<&str>) -> Value {
        let mut payload = json!({
            "roomId": "ROOM1",
            "maxPlayers": 2,
            "hostName": "Ms. Banda",
            "hostCountry": "Zambia",
        });
        if let Some(subject) = subject {
            payload["subject"] = json!(subject);
        }
        json!({ "event": "hostJoinRoom", "payload": payload })
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn connections_get_distinct_ids() {
        let handle = start(Arc::new(InMemoryRoomStore::default()));

        let a = Client::connect(&handle).await;
        let b = Client::connect(&handle).await;

        assert_ne!(a.id, b.id);
        handle.shutdown();
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn invalid_message_is_reported_to_the_sender() {
        let handle = start(Arc::new(InMemoryRoomStore::default()));
        let mut client = Client::connect(&handle).await;

        handle.send_message(client.id, "not json").await.unwrap();

        let msg = client.recv().await;
        assert_eq!(msg["event"], "error");
        assert!(
            msg["payload"]["message"]
                .as_str()
                .unwrap()
                .starts_with("Invalid message: ")
        );
        handle.shutdown();
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn game_runs_through_question_timer_and_round_end() {
        let handle = start(Arc::new(InMemoryRoomStore::default()));
        let mut host = Client::connect(&handle).await;
        let mut player = Client::connect(&handle).await;

        host.send(&handle, host_join_room(None)).await;
        assert_eq!(host.recv().await["payload"]["joinedCount"], 1);

        player
            .send(
                &handle,
                json!({
                    "event": "joinRoom",
                    "payload": { "roomId": "ROOM1", "name": "Alice", "country": "Kenya" },
                }),
            )
            .await;
        assert_eq!(player.recv().await["event"], "playerListUpdate");
        assert_eq!(player.recv().await["event"], "playerWaiting");
        assert_eq!(
            player.recv().await,
            json!({
                "event": "roomFull",
                "payload": { "message": "Room is full. Waiting for host..." },
            })
        );

        host.send(
            &handle,
            json!({ "event": "startGame", "payload": { "roomId": "ROOM1" } }),
        )
        .await;
        assert_eq!(player.recv_event("gameStarting").await["event"], "gameStarting");

        let question = player.recv_event("newQuestion").await;
        assert_eq!(question["payload"]["question"]["question"], "2 + 2?");
        assert_eq!(question["payload"]["currentPlayer"]["socketId"], host.id);
        assert_eq!(question["payload"]["timeLeft"], 3);
        assert!(question["payload"]["question"].get("correctAnswer").is_none());

        host.send(
            &handle,
            json!({
                "event": "answer",
                "payload": { "roomId": "ROOM1", "answer": "4", "isCorrect": false },
            }),
        )
        .await;
        assert_eq!(
            host.recv_event("answerResult").await["payload"],
            json!({ "correct": true, "correctAnswer": "4" })
        );

        let question = player.recv_event("newQuestion").await;
        assert_eq!(question["payload"]["currentPlayer"]["socketId"], player.id);

        assert_eq!(
            player.recv_event("timerUpdate").await["payload"]["timeLeft"],
            2
        );
        player.recv_event("timeUp").await;

        let ended = player.recv_event("roundEnded").await;
        assert_eq!(ended["payload"]["round"], 1);
        assert_eq!(ended["payload"]["leaderboard"][0]["socketId"], host.id);
        assert_eq!(ended["payload"]["leaderboard"][0]["score"], 10);

        handle.shutdown();
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn host_join_uses_registered_subject() {
        let store: Arc<dyn RoomStore> = Arc::new(InMemoryRoomStore::default());
        booxclash_rooms::create_room(
            &*store,
            CreateRoom {
                room_id: Some("ROOM1".to_string()),
                subject: "science".to_string(),
                num_players: 2,
                host_name: "Ms. Banda".to_string(),
                host_country: "Zambia".to_string(),
                host_is_player: true,
            },
            &mut rand::rng(),
        )
        .await
        .unwrap();
        let handle = start(store);
        let mut host = Client::connect(&handle).await;

        host.send(&handle, host_join_room(None)).await;
        host.send(
            &handle,
            json!({ "event": "startGame", "payload": { "roomId": "ROOM1" } }),
        )
        .await;

        let question = host.recv_event("newQuestion").await;
        assert_eq!(question["payload"]["question"]["question"], "H2O is?");
        handle.shutdown();
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn disconnecting_the_current_player_moves_the_turn() {
        let handle = start(Arc::new(InMemoryRoomStore::default()));
        let mut host = Client::connect(&handle).await;
        let player = Client::connect(&handle).await;

        host.send(&handle, host_join_room(Some("math"))).await;
        player
            .send(
                &handle,
                json!({
                    "event": "joinRoom",
                    "payload": { "roomId": "ROOM1", "name": "Alice", "country": "Kenya" },
                }),
            )
            .await;
        host.send(
            &handle,
            json!({ "event": "answer", "payload": { "roomId": "ROOM1", "answer": "4" } }),
        )
        .await;
        assert_eq!(
            host.recv_event("error").await["payload"]["message"],
            "No question is active."
        );

        host.send(
            &handle,
            json!({ "event": "startGame", "payload": { "roomId": "ROOM1" } }),
        )
        .await;
        host.recv_event("newQuestion").await;
        host.send(
            &handle,
            json!({ "event": "answer", "payload": { "roomId": "ROOM1", "answer": "3" } }),
        )
        .await;
        host.recv_event("newQuestion").await;

        handle.disconnect(player.id).await;

        let update = host.recv_event("playerListUpdate").await;
        assert_eq!(update["payload"]["joinedCount"], 1);
        let ended = host.recv_event("roundEnded").await;
        assert_eq!(ended["payload"]["leaderboard"].as_array().unwrap().len(), 1);
        handle.shutdown();
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn closing_a_room_cancels_its_timers() {
        let handle = start(Arc::new(InMemoryRoomStore::default()));
        let old_host = Client::connect(&handle).await;

        old_host.send(&handle, host_join_room(Some("math"))).await;
        old_host
            .send(
                &handle,
                json!({ "event": "startGame", "payload": { "roomId": "ROOM1" } }),
            )
            .await;
        handle.disconnect(old_host.id).await;

        let mut host = Client::connect(&handle).await;
        host.send(&handle, host_join_room(Some("math"))).await;
        assert_eq!(host.recv().await["event"], "playerListUpdate");

        tokio::time::sleep(Duration::from_secs(30)).await;
        handle.send_message(host.id, "flush").await.unwrap();

        let msg = host.recv().await;
        assert_eq!(msg["event"], "error");
        assert!(
            msg["payload"]["message"]
                .as_str()
                .unwrap()
                .starts_with("Invalid message: ")
        );
        handle.shutdown();
    }
}
