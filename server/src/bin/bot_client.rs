//! Headless bot that plays a match over binary frames.
//!
//! The bot chases the ball, takes it under control, dribbles toward the
//! opposing goal and shoots once in range. Several bots make a cheap soak
//! test for the server.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use kickoff_shared::{
    distance, normalize, Action, ClientPacket, GameSnapshot, KeyState, PlayerStateUpdate,
    ServerPacket, Team, BALL_RADIUS, FIELD_HEIGHT, FIELD_WIDTH, PLAYER_RADIUS, PLAYER_RUN_SPEED,
    PLAYER_WALK_SPEED,
};
use log::{debug, info, warn};
use rand::Rng;
use std::time::Duration;
use tokio::time::{interval, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const SHOOTING_DISTANCE: f32 = 220.0;
const RUN_ENERGY_THRESHOLD: f32 = 30.0;
const ACTION_COOLDOWN_TICKS: u32 = 20;
const CONTROL_RANGE: f32 = PLAYER_RADIUS + BALL_RADIUS * 3.0;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless bot for the kickoff server")]
struct Args {
    /// Server WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:3000")]
    url: String,
    /// Seconds to play before disconnecting (0 plays until the server closes)
    #[arg(short, long, default_value_t = 0)]
    duration: u64,
}

/// Local view of the bot's own player plus the last snapshot it saw.
struct Bot {
    id: Option<u32>,
    team: Team,
    started: bool,
    x: f32,
    y: f32,
    velocity_x: f32,
    velocity_y: f32,
    cooldown: u32,
    snapshot: Option<GameSnapshot>,
}

impl Bot {
    fn new() -> Self {
        Self {
            id: None,
            team: Team::One,
            started: false,
            x: FIELD_WIDTH / 4.0,
            y: FIELD_HEIGHT / 2.0,
            velocity_x: 0.0,
            velocity_y: 0.0,
            cooldown: 0,
            snapshot: None,
        }
    }

    fn handle(&mut self, packet: ServerPacket) -> bool {
        match packet {
            ServerPacket::PlayerId(id) => {
                info!("Assigned player id {}", id);
                self.id = Some(id);
            }
            ServerPacket::TeamAssignment(team) => {
                info!("Playing for team {}", team.number());
                self.team = team;
                self.x = team.spawn_x();
            }
            ServerPacket::GameStarted(started) => {
                info!("Game {}", if started { "started" } else { "paused" });
                self.started = started;
            }
            ServerPacket::GameState(snapshot) => {
                if let Some(me) = self.id.and_then(|id| snapshot.players.get(&id)) {
                    // Kick-offs and knock-backs move us server side.
                    if distance(me.x, me.y, self.x, self.y) > PLAYER_RUN_SPEED * 4.0 {
                        self.x = me.x;
                        self.y = me.y;
                    }
                }
                self.snapshot = Some(snapshot);
            }
            ServerPacket::Disconnected { reason } => {
                warn!("Disconnected by server: {}", reason);
                return false;
            }
        }
        true
    }

    /// Point the bot attacks: the centre of the goal credited to its team.
    fn target_goal(&self) -> (f32, f32) {
        match self.team {
            Team::One => (FIELD_WIDTH, FIELD_HEIGHT / 2.0),
            Team::Two => (0.0, FIELD_HEIGHT / 2.0),
        }
    }

    /// Produces this tick's outgoing packets.
    fn plan<R: Rng>(&mut self, rng: &mut R) -> Vec<ClientPacket> {
        let (Some(id), Some(snapshot)) = (self.id, self.snapshot.as_ref()) else {
            return Vec::new();
        };
        let Some(me) = snapshot.players.get(&id) else {
            return Vec::new();
        };
        if !self.started {
            return Vec::new();
        }

        let ball = &snapshot.ball;
        let carrier = snapshot.players.values().find(|p| p.is_dribbling);
        let dribbling = me.is_dribbling;
        let (goal_x, goal_y) = self.target_goal();

        let (tx, ty) = if dribbling {
            (goal_x, goal_y)
        } else {
            (ball.x, ball.y)
        };
        let (dx, dy) = normalize(tx - self.x, ty - self.y);
        let running = me.energy > RUN_ENERGY_THRESHOLD && !dribbling;
        let speed = if running {
            PLAYER_RUN_SPEED
        } else {
            PLAYER_WALK_SPEED
        };
        let wobble = rng.gen_range(-0.2..0.2);

        self.velocity_x = (dx + wobble) * speed;
        self.velocity_y = (dy - wobble) * speed;
        self.x = (self.x + self.velocity_x).clamp(PLAYER_RADIUS, FIELD_WIDTH - PLAYER_RADIUS);
        self.y = (self.y + self.velocity_y).clamp(PLAYER_RADIUS, FIELD_HEIGHT - PLAYER_RADIUS);

        let mut keys = KeyState::new();
        keys.set("d", self.velocity_x > 0.1);
        keys.set("a", self.velocity_x < -0.1);
        keys.set("s", self.velocity_y > 0.1);
        keys.set("w", self.velocity_y < -0.1);
        keys.set("shift", running);

        let mut packets = vec![ClientPacket::PlayerState(PlayerStateUpdate {
            id,
            x: self.x,
            y: self.y,
            velocity_x: self.velocity_x,
            velocity_y: self.velocity_y,
            is_kicking: false,
            is_running: running,
            keys,
        })];

        if self.cooldown > 0 {
            self.cooldown -= 1;
            return packets;
        }

        let to_ball = distance(self.x, self.y, ball.x, ball.y);
        let action = if dribbling && distance(self.x, self.y, goal_x, goal_y) < SHOOTING_DISTANCE {
            Some(Action::KickBall)
        } else if carrier.is_none() && to_ball <= CONTROL_RANGE {
            Some(Action::ToggleDribble)
        } else if carrier.is_some_and(|c| c.id != id && c.team != self.team) && to_ball <= CONTROL_RANGE
        {
            Some(Action::TackleBall)
        } else {
            None
        };

        if let Some(action) = action {
            debug!("Bot {} -> {:?}", id, action);
            self.cooldown = ACTION_COOLDOWN_TICKS;
            packets.push(ClientPacket::PlayerInput {
                player_id: id,
                action,
            });
        }
        packets
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("Connecting to {}", args.url);
    let (ws_stream, _) = connect_async(args.url.as_str()).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let mut bot = Bot::new();
    let mut rng = rand::thread_rng();
    let mut ticker = interval(Duration::from_millis(16));
    let deadline = (args.duration > 0).then(|| Instant::now() + Duration::from_secs(args.duration));

    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            info!("Play time over");
            break;
        }

        tokio::select! {
            frame = ws_receiver.next() => {
                let packet = match frame {
                    Some(Ok(Message::Binary(bytes))) => ServerPacket::from_bytes(&bytes),
                    Some(Ok(Message::Text(text))) => ServerPacket::from_json(&text),
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("Connection error: {}", e);
                        break;
                    }
                };
                match packet {
                    Ok(packet) => {
                        if !bot.handle(packet) {
                            break;
                        }
                    }
                    Err(e) => warn!("Ignoring malformed server message: {}", e),
                }
            }
            _ = ticker.tick() => {
                for packet in bot.plan(&mut rng) {
                    ws_sender.send(Message::Binary(packet.to_bytes()?)).await?;
                }
            }
        }
    }

    let _ = ws_sender.send(Message::Close(None)).await;
    Ok(())
}
