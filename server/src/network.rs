//! WebSocket transport and the server event loop.
//!
//! One task owns the [`Match`] and the [`ClientManager`]. Connection tasks
//! never touch either; they decode frames and forward [`ServerMessage`]s
//! over an unbounded channel. The owning task `select!`s over that channel
//! and three intervals (physics tick, broadcast, idle reaping), so message
//! handling, ticks and broadcasts are strictly serialized without locks.
//!
//! Each connection is split into a reader task and a writer task. The writer
//! drains a per-connection queue into the socket, so a slow client never
//! stalls the loop. It also pings the peer periodically; every inbound frame,
//! pongs included, counts as activity for idle reaping.

use crate::client_manager::{ClientManager, FrameSender};
use crate::config::ServerConfig;
use crate::game::Match;
use crate::physics::TickEvent;
use crate::session::LeaveOutcome;
use futures_util::{SinkExt, StreamExt};
use kickoff_shared::{ClientPacket, Encoding, ProtocolError, ServerPacket, Team};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, interval_at, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};

const STATS_EVERY_TICKS: u64 = 300;
const REAPER_PERIOD: Duration = Duration::from_secs(1);

/// Events forwarded from connection tasks to the server loop
#[derive(Debug)]
pub enum ServerMessage {
    /// Handshake finished; `sender` feeds the connection's writer task.
    ConnectionOpened {
        addr: SocketAddr,
        sender: FrameSender,
    },
    /// A game message decoded from a text or binary frame.
    PacketReceived {
        packet: ClientPacket,
        addr: SocketAddr,
        encoding: Encoding,
    },
    /// Any other inbound frame (ping, pong, undecodable data). Proves the
    /// socket is alive without carrying a game message.
    Activity {
        addr: SocketAddr,
    },
    ConnectionClosed {
        addr: SocketAddr,
    },
    Shutdown,
}

/// Encodes a server packet for a connection speaking `encoding`.
pub fn encode_frame(packet: &ServerPacket, encoding: Encoding) -> Result<Message, ProtocolError> {
    Ok(match encoding {
        Encoding::Json => Message::Text(packet.to_json()?),
        Encoding::Binary => Message::Binary(packet.to_bytes()?),
    })
}

/// Decodes an inbound frame. Control frames yield `None`.
pub fn decode_frame(frame: &Message) -> Option<Result<(ClientPacket, Encoding), ProtocolError>> {
    match frame {
        Message::Text(text) => Some(ClientPacket::from_json(text).map(|p| (p, Encoding::Json))),
        Message::Binary(bytes) => {
            Some(ClientPacket::from_bytes(bytes).map(|p| (p, Encoding::Binary)))
        }
        _ => None,
    }
}

/// Authoritative match server
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    clients: ClientManager,
    game: Match,
    rng: StdRng,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    /// Binds the listening socket. Failing to bind is the only fatal error.
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(config.max_clients),
            config,
            game: Match::new(),
            rng: StdRng::from_entropy(),
            server_tx,
            server_rx,
        })
    }

    /// Address actually bound, useful when the configured port is 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sender that can stop the loop with [`ServerMessage::Shutdown`].
    pub fn control_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Read-only view of the match, for inspection and tests.
    pub fn game(&self) -> &Match {
        &self.game
    }

    /// Spawns the accept loop; each connection gets its own task.
    fn spawn_listener(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();
        let ping_interval = self.config.ping_interval;

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            server_tx.clone(),
                            ping_interval,
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Queues a packet for one client in that client's preferred encoding.
    /// Unknown ids and closed connections are ignored.
    fn send_to(&self, client_id: u32, packet: &ServerPacket) {
        let Some(client) = self.clients.get(client_id) else {
            return;
        };
        match encode_frame(packet, client.encoding) {
            Ok(frame) => {
                client.send(frame);
            }
            Err(e) => error!("Failed to encode packet for client {}: {}", client_id, e),
        }
    }

    /// Sends a packet to every client, encoding it at most once per format.
    fn broadcast(&self, packet: &ServerPacket) {
        let mut json = None;
        let mut binary = None;

        for client in self.clients.iter() {
            let cached = match client.encoding {
                Encoding::Json => &mut json,
                Encoding::Binary => &mut binary,
            };
            if cached.is_none() {
                match encode_frame(packet, client.encoding) {
                    Ok(frame) => *cached = Some(frame),
                    Err(e) => {
                        error!("Failed to encode broadcast: {}", e);
                        continue;
                    }
                }
            }
            if let Some(frame) = cached {
                client.send(frame.clone());
            }
        }
    }

    /// Pushes the current snapshot to everyone. Consumes the out flag, so
    /// it is skipped while nobody is connected.
    fn broadcast_game_state(&mut self) {
        if self.clients.is_empty() {
            return;
        }
        let snapshot = self.game.take_snapshot();
        self.broadcast(&ServerPacket::GameState(snapshot));
    }

    /// Registers a new connection and spawns its player.
    ///
    /// The newcomer receives its id and team first. If this join starts the
    /// match everyone is told; a late joiner to a running match is told
    /// directly. A full server answers with `disconnected` and closes.
    fn handle_connect(&mut self, addr: SocketAddr, sender: FrameSender) {
        let Some(client_id) = self.clients.add_client(addr, sender.clone()) else {
            warn!("Rejecting {}: server full", addr);
            let refusal = ServerPacket::Disconnected {
                reason: "Server full".to_string(),
            };
            if let Ok(frame) = encode_frame(&refusal, Encoding::Json) {
                let _ = sender.send(frame);
            }
            let _ = sender.send(Message::Close(None));
            return;
        };

        let outcome = self.game.join(client_id);
        self.send_to(client_id, &ServerPacket::PlayerId(client_id));
        self.send_to(client_id, &ServerPacket::TeamAssignment(outcome.team));

        if outcome.started {
            self.broadcast(&ServerPacket::GameStarted(true));
        } else if self.game.is_active() {
            self.send_to(client_id, &ServerPacket::GameStarted(true));
        }

        self.broadcast_game_state();
    }

    /// Routes a decoded client message to the match.
    ///
    /// Marks the client active and remembers the frame encoding. Messages
    /// naming a player other than the sender's own are dropped.
    fn handle_packet(&mut self, packet: ClientPacket, addr: SocketAddr, encoding: Encoding) {
        let Some(client_id) = self.clients.find_client_by_addr(addr) else {
            debug!("Packet from unregistered connection {}", addr);
            return;
        };
        self.clients.touch(client_id, encoding);

        match packet {
            ClientPacket::PlayerState(update) => {
                if update.id != client_id {
                    debug!("Client {} sent state for player {}", client_id, update.id);
                    return;
                }
                self.game.apply_player_state(&update);
            }
            ClientPacket::PlayerInput { player_id, action } => {
                if player_id != client_id {
                    debug!("Client {} sent input for player {}", client_id, player_id);
                    return;
                }
                self.game.perform(player_id, action, Instant::now());
            }
        }
    }

    /// Marks a connection as alive without changing its encoding.
    fn handle_activity(&mut self, addr: SocketAddr) {
        if let Some(client_id) = self.clients.find_client_by_addr(addr) {
            self.clients.mark_seen(client_id);
        }
    }

    /// Forgets a closed connection and its player. Repeated or unknown
    /// addresses are no-ops.
    fn handle_disconnect(&mut self, addr: SocketAddr) {
        if let Some(client_id) = self.clients.find_client_by_addr(addr) {
            self.clients.remove_client(client_id);
            self.remove_player(client_id);
        }
    }

    /// Removes a player from the match, telling everyone if the match had to
    /// pause for lack of players.
    fn remove_player(&mut self, player_id: u32) {
        if self.game.leave(player_id) == LeaveOutcome::Stopped {
            self.broadcast(&ServerPacket::GameStarted(false));
        }
    }

    /// Closes and removes connections with no inbound frame for
    /// `client_timeout`.
    fn reap_idle_clients(&mut self) {
        for client in self.clients.check_timeouts(self.config.client_timeout) {
            warn!("Client {} timed out", client.id);
            client.close();
            self.remove_player(client.id);
        }
    }

    /// One physics tick. Tackle windows close in every phase; the match only
    /// advances while active.
    fn tick(&mut self) {
        self.game.expire_tackles(Instant::now());
        if !self.game.is_active() {
            return;
        }

        match self.game.step(&mut self.rng) {
            Some(TickEvent::Goal(team)) => {
                debug!("Tick {}: goal for team {}", self.game.tick, team.number());
            }
            Some(TickEvent::Out) => {
                debug!("Tick {}: ball out, restarting from centre", self.game.tick);
            }
            None => {}
        }

        if self.game.tick % STATS_EVERY_TICKS == 0 {
            debug!(
                "Tick {}: {} clients, {} players, ball ({:.1}, {:.1}), score {}-{}",
                self.game.tick,
                self.clients.len(),
                self.game.player_count(),
                self.game.ball.x,
                self.game.ball.y,
                self.game.score.get(Team::One),
                self.game.score.get(Team::Two)
            );
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_listener();

        let mut tick_interval = interval(self.config.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcast_interval = interval(self.config.broadcast_interval);
        broadcast_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut reaper_interval = interval(REAPER_PERIOD);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::ConnectionOpened { addr, sender }) => {
                            self.handle_connect(addr, sender);
                        }
                        Some(ServerMessage::PacketReceived { packet, addr, encoding }) => {
                            self.handle_packet(packet, addr, encoding);
                        }
                        Some(ServerMessage::Activity { addr }) => {
                            self.handle_activity(addr);
                        }
                        Some(ServerMessage::ConnectionClosed { addr }) => {
                            self.handle_disconnect(addr);
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                }
                _ = tick_interval.tick() => self.tick(),
                _ = broadcast_interval.tick() => self.broadcast_game_state(),
                _ = reaper_interval.tick() => self.reap_idle_clients(),
            }
        }

        Ok(())
    }
}

/// Runs one WebSocket connection until either side closes it.
///
/// The writer sends a ping every `ping_interval` so a healthy peer always
/// produces inbound pongs, even while it has nothing to say.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    ping_interval: Duration,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Message>();

    if server_tx
        .send(ServerMessage::ConnectionOpened {
            addr,
            sender: frame_tx,
        })
        .is_err()
    {
        return;
    }

    let writer = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + ping_interval;
        let mut ping_ticker = interval_at(start, ping_interval);

        loop {
            let frame = tokio::select! {
                frame = frame_rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                _ = ping_ticker.tick() => Message::Ping(Vec::new()),
            };
            let closing = matches!(frame, Message::Close(_));
            if ws_sender.send(frame).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        let frame = match result {
            Ok(Message::Close(_)) => break,
            Ok(frame) => frame,
            Err(e) => {
                debug!("Connection {} errored: {}", addr, e);
                break;
            }
        };

        let message = match decode_frame(&frame) {
            Some(Ok((packet, encoding))) => ServerMessage::PacketReceived {
                packet,
                addr,
                encoding,
            },
            Some(Err(e)) => {
                warn!("Dropping malformed message from {}: {}", addr, e);
                ServerMessage::Activity { addr }
            }
            None => ServerMessage::Activity { addr },
        };
        if server_tx.send(message).is_err() {
            break;
        }
    }

    let _ = server_tx.send(ServerMessage::ConnectionClosed { addr });
    writer.abort();
}
