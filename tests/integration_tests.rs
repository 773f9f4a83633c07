//! Integration tests for the match server
//!
//! These tests validate cross-component interactions and real WebSocket behavior.

use assert_approx_eq::assert_approx_eq;
use futures_util::{SinkExt, StreamExt};
use kickoff_server::config::ServerConfig;
use kickoff_server::game::{Match, Phase};
use kickoff_server::network::{Server, ServerMessage};
use kickoff_shared::{
    Action, ClientPacket, KeyState, PlayerStateUpdate, ServerPacket, Team, FIELD_HEIGHT,
    FIELD_WIDTH, KICK_POWER,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_test::assert_ok;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(2);

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests that a browser-shaped message decodes into the typed packet
    #[test]
    fn browser_messages_decode() {
        let raw = r#"{"playerState":{"id":4,"x":120.5,"y":80,"velocityX":2,
            "velocityY":0,"isKicking":false,"isRunning":true,"radius":14,
            "keys":{"d":true,"shift":true}}}"#;

        let packet = assert_ok!(ClientPacket::from_json(raw));
        match packet {
            ClientPacket::PlayerState(update) => {
                assert_eq!(update.id, 4);
                assert_eq!(update.x, 120.5);
                assert!(update.is_running);
                assert!(update.keys.pressed("d"));
            }
            other => panic!("Unexpected packet: {:?}", other),
        }
    }

    /// Tests the JSON shape a browser client relies on
    #[test]
    fn game_state_json_shape() {
        let mut game = Match::new();
        game.join(3);

        let json = assert_ok!(ServerPacket::GameState(game.take_snapshot()).to_json());
        let value: serde_json::Value = assert_ok!(serde_json::from_str(&json));

        let state = &value["gameState"];
        assert_eq!(state["ball"]["x"], 500.0);
        assert_eq!(state["players"]["3"]["team"], 1);
        assert_eq!(state["players"]["3"]["ultimateGauge"], 0.0);
        assert_eq!(state["score"]["team1"], 0);
        assert_eq!(state["outMessage"], false);
        assert_eq!(state["goalMessage"], false);
    }

    /// Tests that binary and JSON carry the same packet
    #[test]
    fn binary_and_json_agree() {
        let packet = ClientPacket::PlayerInput {
            player_id: 9,
            action: Action::TackleBall,
        };
        let from_json = assert_ok!(ClientPacket::from_json(&assert_ok!(packet.to_json())));
        let from_bytes = assert_ok!(ClientPacket::from_bytes(&assert_ok!(packet.to_bytes())));
        assert_eq!(from_json, from_bytes);
    }
}

/// MATCH FLOW TESTS
mod match_flow_tests {
    use super::*;

    /// Tests a full kick-off: two joins, a kick and a goal
    #[test]
    fn kickoff_to_goal() {
        let mut game = Match::new();
        assert!(!game.join(1).started);
        let second = game.join(2);
        assert!(second.started);
        assert_eq!(second.team, Team::Two);
        assert_eq!(game.phase, Phase::Active);

        // Team 1 player lines up just left of the ball and shoots right.
        let striker = game.player_mut(1).unwrap();
        striker.x = FIELD_WIDTH / 2.0 - 10.0;
        striker.y = FIELD_HEIGHT / 2.0;
        assert!(game.perform(1, Action::KickBall, Instant::now()));
        assert_approx_eq!(game.ball.velocity_x, KICK_POWER, 1e-5);
        assert_approx_eq!(game.ball.velocity_y, 0.0, 1e-5);

        // Park the defender out of the ball's path.
        game.player_mut(2).unwrap().y = 50.0;

        let mut rng = StdRng::seed_from_u64(7);
        let mut scored = false;
        for _ in 0..600 {
            game.step(&mut rng);
            if game.score.team1 == 1 {
                scored = true;
                break;
            }
        }

        assert!(scored, "ball should reach the right goal");
        assert_eq!((game.ball.x, game.ball.y), (500.0, 300.0));
        assert!(game.take_snapshot().goal_message);
    }

    /// Tests that only one player can hold the ball at a time
    #[test]
    fn dribble_exclusivity_over_toggle_sequence() {
        let mut game = Match::new();
        for id in 1..=4 {
            game.join(id);
            let player = game.player_mut(id).unwrap();
            player.x = FIELD_WIDTH / 2.0 - 20.0 + id as f32 * 8.0;
            player.y = FIELD_HEIGHT / 2.0 + 10.0;
        }

        let now = Instant::now();
        for round in 0..40u32 {
            let id = round % 4 + 1;
            game.perform(id, Action::ToggleDribble, now);
            let holders = game.players().filter(|p| p.is_dribbling).count();
            assert!(holders <= 1, "{} players dribbling", holders);
        }
    }

    /// Tests that departures are idempotent and reset the empty pitch
    #[test]
    fn disconnect_is_idempotent() {
        let mut game = Match::new();
        game.join(1);
        game.join(2);
        game.score.team2 = 4;

        game.leave(2);
        game.leave(2);
        assert_eq!(game.phase, Phase::Waiting);
        assert_eq!(game.score.team2, 4);

        game.leave(1);
        assert_eq!(game.score.team2, 0);
        assert_eq!(game.player_count(), 0);
    }
}

/// LIVE WEBSOCKET SERVER TESTS
mod network_tests {
    use super::*;

    /// Tests the join handshake for two clients and the kick-off notification
    #[tokio::test]
    async fn two_clients_start_a_match() {
        let (addr, control, handle) = start_server(ServerConfig {
            max_clients: 4,
            ..local_config()
        })
        .await;

        let mut first = connect(addr).await;
        assert_eq!(next_packet(&mut first).await, ServerPacket::PlayerId(1));
        assert_eq!(
            next_packet(&mut first).await,
            ServerPacket::TeamAssignment(Team::One)
        );

        let mut second = connect(addr).await;
        assert_eq!(next_packet(&mut second).await, ServerPacket::PlayerId(2));
        assert_eq!(
            next_packet(&mut second).await,
            ServerPacket::TeamAssignment(Team::Two)
        );
        assert_eq!(
            next_packet(&mut second).await,
            ServerPacket::GameStarted(true)
        );

        wait_for(&mut first, |p| *p == ServerPacket::GameStarted(true)).await;

        stop_server(control, handle).await;
    }

    /// Tests that a malformed frame is dropped without closing the connection
    #[tokio::test]
    async fn malformed_message_keeps_connection_open() {
        let (addr, control, handle) = start_server(local_config()).await;
        let mut socket = connect(addr).await;
        assert_eq!(next_packet(&mut socket).await, ServerPacket::PlayerId(1));

        assert_ok!(socket.send(Message::Text("{not json".into())).await);

        let update = ClientPacket::PlayerState(player_state(1, 123.0, 45.0));
        assert_ok!(socket.send(Message::Text(update.to_json().unwrap())).await);

        wait_for(&mut socket, |p| match p {
            ServerPacket::GameState(snapshot) => snapshot
                .players
                .get(&1)
                .is_some_and(|me| me.x == 123.0 && me.y == 45.0),
            _ => false,
        })
        .await;

        stop_server(control, handle).await;
    }

    /// Tests that a client speaking binary frames is answered in binary
    #[tokio::test]
    async fn binary_client_gets_binary_replies() {
        let (addr, control, handle) = start_server(local_config()).await;
        let mut socket = connect(addr).await;
        assert_eq!(next_packet(&mut socket).await, ServerPacket::PlayerId(1));

        let update = ClientPacket::PlayerState(player_state(1, 200.0, 200.0));
        assert_ok!(socket.send(Message::Binary(update.to_bytes().unwrap())).await);

        let found = timeout(WAIT, async {
            while let Some(Ok(frame)) = socket.next().await {
                if let Message::Binary(bytes) = frame {
                    return ServerPacket::from_bytes(&bytes).ok();
                }
            }
            None
        })
        .await;

        assert!(matches!(found, Ok(Some(ServerPacket::GameState(_)))));
        stop_server(control, handle).await;
    }

    /// Tests that a waiting player who sends no game messages keeps its seat
    #[tokio::test]
    async fn silent_waiting_client_is_not_reaped() {
        let (addr, control, handle) = start_server(ServerConfig {
            client_timeout: Duration::from_millis(500),
            ping_interval: Duration::from_millis(100),
            ..local_config()
        })
        .await;

        let mut socket = connect(addr).await;
        assert_eq!(next_packet(&mut socket).await, ServerPacket::PlayerId(1));

        // Three timeout periods with only control frames on the wire.
        let started = Instant::now();
        while started.elapsed() < Duration::from_millis(1500) {
            assert_ok!(socket.send(Message::Ping(Vec::new())).await);
            let _ = timeout(Duration::from_millis(100), async {
                while let Some(Ok(frame)) = socket.next().await {
                    assert!(
                        !matches!(frame, Message::Close(_)),
                        "live connection was closed"
                    );
                }
            })
            .await;
        }

        wait_for(&mut socket, |p| match p {
            ServerPacket::GameState(snapshot) => snapshot.players.contains_key(&1),
            _ => false,
        })
        .await;

        stop_server(control, handle).await;
    }

    /// Tests the capacity limit reply
    #[tokio::test]
    async fn full_server_refuses_connection() {
        let (addr, control, handle) = start_server(ServerConfig {
            max_clients: 1,
            ..local_config()
        })
        .await;

        let mut first = connect(addr).await;
        assert_eq!(next_packet(&mut first).await, ServerPacket::PlayerId(1));

        let mut second = connect(addr).await;
        assert_eq!(
            next_packet(&mut second).await,
            ServerPacket::Disconnected {
                reason: "Server full".to_string()
            }
        );

        stop_server(control, handle).await;
    }
}

// HELPER FUNCTIONS

fn local_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    }
}

fn player_state(id: u32, x: f32, y: f32) -> PlayerStateUpdate {
    PlayerStateUpdate {
        id,
        x,
        y,
        velocity_x: 0.0,
        velocity_y: 0.0,
        is_kicking: false,
        is_running: false,
        keys: KeyState::new(),
    }
}

async fn start_server(
    config: ServerConfig,
) -> (SocketAddr, mpsc::UnboundedSender<ServerMessage>, JoinHandle<()>) {
    let mut server = Server::new(config).await.expect("server should bind");
    let addr = server.local_addr();
    let control = server.control_handle();
    let handle = tokio::spawn(async move {
        let _ = server.run().await;
    });
    (addr, control, handle)
}

async fn stop_server(control: mpsc::UnboundedSender<ServerMessage>, handle: JoinHandle<()>) {
    let _ = control.send(ServerMessage::Shutdown);
    let _ = timeout(WAIT, handle).await;
}

async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = connect_async(format!("ws://{}", addr))
        .await
        .expect("client should connect");
    socket
}

/// Reads the next decodable server packet, skipping control frames.
async fn next_packet(socket: &mut Socket) -> ServerPacket {
    timeout(WAIT, async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return ServerPacket::from_json(&text).unwrap(),
                Some(Ok(Message::Binary(bytes))) => {
                    return ServerPacket::from_bytes(&bytes).unwrap()
                }
                Some(Ok(_)) => continue,
                other => panic!("connection ended: {:?}", other),
            }
        }
    })
    .await
    .expect("timed out waiting for a packet")
}

async fn wait_for<F>(socket: &mut Socket, mut predicate: F)
where
    F: FnMut(&ServerPacket) -> bool,
{
    let deadline = Instant::now() + WAIT;
    loop {
        assert!(Instant::now() < deadline, "expected packet never arrived");
        if predicate(&next_packet(socket).await) {
            return;
        }
    }
}
