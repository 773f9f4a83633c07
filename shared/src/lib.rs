use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod protocol;

pub use protocol::{
    Action, ClientPacket, Encoding, GameSnapshot, PlayerStateUpdate, ProtocolError, ServerPacket,
};

pub const FIELD_WIDTH: f32 = 1000.0;
pub const FIELD_HEIGHT: f32 = 600.0;

pub const PLAYER_RADIUS: f32 = 14.0;
pub const BALL_RADIUS: f32 = 6.0;
pub const GOAL_WIDTH: f32 = 12.0;
pub const GOAL_HEIGHT: f32 = 100.0;

pub const BALL_FRICTION: f32 = 0.99;
pub const PLAYER_SPEED: f32 = 2.0;
pub const PLAYER_WALK_SPEED: f32 = PLAYER_SPEED / 1.5;
pub const PLAYER_RUN_SPEED: f32 = PLAYER_SPEED * 1.5;

pub const KICK_POWER: f32 = 8.0;
pub const PASS_POWER: f32 = 5.0;
pub const KICK_RANGE_SLACK: f32 = 5.0;
pub const PASS_RANGE_SLACK: f32 = 10.0;
/// Share of the carrier's speed handed to the ball on release or contact.
pub const MOMENTUM_TRANSFER: f32 = 0.8;

pub const MAX_ENERGY: f32 = 100.0;
pub const ENERGY_DRAIN_RATE: f32 = 0.8;
pub const ENERGY_RECOVERY_RATE: f32 = 0.3;

pub const DRIBBLE_DISTANCE: f32 = PLAYER_RADIUS + BALL_RADIUS + 2.0;
pub const DRIBBLE_STRENGTH: f32 = 0.2;
pub const DRIBBLE_JITTER: f32 = 0.1;

pub const MAX_ULTIMATE_GAUGE: f32 = 100.0;
pub const ULTIMATE_GAIN_RATE: f32 = 0.2;
pub const ULTIMATE_KICK_MULTIPLIER: f32 = 2.0;

pub const TACKLE_DURATION_MS: u64 = 500;
pub const TACKLE_KNOCK_SPEED: f32 = 3.0;
pub const TACKLE_ENERGY_BONUS: f32 = 10.0;

/// Ticks the "OUT" banner stays up on clients.
pub const OUT_MESSAGE_DURATION: u32 = 90;
/// Ticks the "GOAL" banner stays up on clients.
pub const GOAL_MESSAGE_DURATION: u32 = 120;

pub const MIN_PLAYERS_TO_START: usize = 2;

/// Side of the match a player belongs to. Encoded on the wire as `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Team {
    One,
    Two,
}

impl Team {
    pub fn number(self) -> u8 {
        match self {
            Team::One => 1,
            Team::Two => 2,
        }
    }

    /// Kick-off x position, biased into the team's own half.
    pub fn spawn_x(self) -> f32 {
        match self {
            Team::One => FIELD_WIDTH / 4.0,
            Team::Two => FIELD_WIDTH / 4.0 * 3.0,
        }
    }
}

impl From<Team> for u8 {
    fn from(team: Team) -> u8 {
        team.number()
    }
}

impl TryFrom<u8> for Team {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Team::One),
            2 => Ok(Team::Two),
            other => Err(ProtocolError::InvalidTeam(other)),
        }
    }
}

/// Last key map reported by a client, keyed by lower-cased key name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyState(HashMap<String, bool>);

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pressed(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }

    pub fn set(&mut self, key: &str, down: bool) {
        self.0.insert(key.to_string(), down);
    }

    /// True while any movement key (WASD) is held.
    pub fn is_moving(&self) -> bool {
        ["w", "a", "s", "d"].iter().any(|key| self.pressed(key))
    }
}

impl<const N: usize> From<[(&str, bool); N]> for KeyState {
    fn from(keys: [(&str, bool); N]) -> Self {
        Self(keys.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: u32,
    pub team: Team,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub is_kicking: bool,
    pub is_running: bool,
    pub is_dribbling: bool,
    pub is_tackling: bool,
    pub energy: f32,
    pub ultimate_gauge: f32,
    pub keys: KeyState,
}

impl Player {
    pub fn new(id: u32, team: Team) -> Self {
        Self {
            id,
            team,
            x: team.spawn_x(),
            y: FIELD_HEIGHT / 2.0,
            radius: PLAYER_RADIUS,
            velocity_x: 0.0,
            velocity_y: 0.0,
            is_kicking: false,
            is_running: false,
            is_dribbling: false,
            is_tackling: false,
            energy: MAX_ENERGY,
            ultimate_gauge: 0.0,
            keys: KeyState::new(),
        }
    }

    /// Movement speed implied by the current walk/run mode.
    pub fn speed(&self) -> f32 {
        if self.is_running {
            PLAYER_RUN_SPEED
        } else {
            PLAYER_WALK_SPEED
        }
    }

    pub fn has_velocity(&self) -> bool {
        self.velocity_x != 0.0 || self.velocity_y != 0.0
    }

    pub fn velocity_magnitude(&self) -> f32 {
        magnitude(self.velocity_x, self.velocity_y)
    }

    pub fn distance_to(&self, ball: &Ball) -> f32 {
        distance(self.x, self.y, ball.x, ball.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
}

impl Ball {
    pub fn new() -> Self {
        Self {
            x: FIELD_WIDTH / 2.0,
            y: FIELD_HEIGHT / 2.0,
            radius: BALL_RADIUS,
            velocity_x: 0.0,
            velocity_y: 0.0,
        }
    }

    /// Places the ball on the centre spot at rest.
    pub fn reset(&mut self) {
        self.x = FIELD_WIDTH / 2.0;
        self.y = FIELD_HEIGHT / 2.0;
        self.velocity_x = 0.0;
        self.velocity_y = 0.0;
    }

    pub fn set_velocity(&mut self, angle: f32, speed: f32) {
        self.velocity_x = angle.cos() * speed;
        self.velocity_y = angle.sin() * speed;
    }

    pub fn speed(&self) -> f32 {
        magnitude(self.velocity_x, self.velocity_y)
    }

    /// Whether any part of the ball lies beyond the field edges.
    pub fn is_outside_field(&self) -> bool {
        self.x - self.radius < 0.0
            || self.x + self.radius > FIELD_WIDTH
            || self.y - self.radius < 0.0
            || self.y + self.radius > FIELD_HEIGHT
    }
}

impl Default for Ball {
    fn default() -> Self {
        Self::new()
    }
}

/// Goal mouth rectangle. `team` is the side that scores when the ball enters it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub team: Team,
}

impl Goal {
    /// The two goals of the pitch; each side attacks the far end.
    pub fn field_goals() -> [Goal; 2] {
        let y = FIELD_HEIGHT / 2.0 - GOAL_HEIGHT / 2.0;
        [
            Goal {
                x: 0.0,
                y,
                width: GOAL_WIDTH,
                height: GOAL_HEIGHT,
                team: Team::Two,
            },
            Goal {
                x: FIELD_WIDTH - GOAL_WIDTH,
                y,
                width: GOAL_WIDTH,
                height: GOAL_HEIGHT,
                team: Team::One,
            },
        ]
    }

    /// The ball's horizontal extent overlaps the goal and its centre is
    /// strictly inside the goal's vertical span.
    pub fn contains_ball(&self, ball: &Ball) -> bool {
        ball.x - ball.radius < self.x + self.width
            && ball.x + ball.radius > self.x
            && ball.y > self.y
            && ball.y < self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub team1: u32,
    pub team2: u32,
}

impl Score {
    pub fn record(&mut self, team: Team) {
        match team {
            Team::One => self.team1 += 1,
            Team::Two => self.team2 += 1,
        }
    }

    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::One => self.team1,
            Team::Two => self.team2,
        }
    }
}

pub fn magnitude(x: f32, y: f32) -> f32 {
    (x * x + y * y).sqrt()
}

pub fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    magnitude(x2 - x1, y2 - y1)
}

/// Returns the unit vector of `(x, y)`, or zero for the zero vector.
pub fn normalize(x: f32, y: f32) -> (f32, f32) {
    let len = magnitude(x, y);
    if len > 0.0 {
        (x / len, y / len)
    } else {
        (0.0, 0.0)
    }
}
