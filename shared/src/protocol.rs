//! Wire protocol shared by the server and any Rust client.
//!
//! Every message is an externally tagged enum with camelCase names, so a
//! browser sees `{"playerId": 3}` or `{"playerInput": {"playerId": 3,
//! "action": "kickBall"}}`. The same types travel as JSON in WebSocket text
//! frames and as bincode in binary frames.

use crate::{Ball, KeyState, Player, Score, Team};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Upper bound for a single binary frame.
pub const MAX_BINARY_FRAME: u64 = 64 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed JSON message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed binary message: {0}")]
    Binary(#[from] bincode::Error),
    #[error("invalid team number {0}")]
    InvalidTeam(u8),
}

/// Frame encoding a connection speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Json,
    Binary,
}

/// Player-initiated ball actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    KickBall,
    ToggleDribble,
    PassBall,
    ReleaseBall,
    TackleBall,
}

/// Client-reported kinematics and key map. Unknown fields are ignored so
/// browser clients may send their full local player record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateUpdate {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub velocity_x: f32,
    #[serde(default)]
    pub velocity_y: f32,
    #[serde(default)]
    pub is_kicking: bool,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub keys: KeyState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientPacket {
    PlayerState(PlayerStateUpdate),
    #[serde(rename_all = "camelCase")]
    PlayerInput { player_id: u32, action: Action },
}

/// Authoritative state pushed to every client each broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub ball: Ball,
    pub players: BTreeMap<u32, Player>,
    pub score: Score,
    /// Raised once per out event.
    pub out_message: bool,
    /// Raised while the goal banner timer is running.
    pub goal_message: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerPacket {
    PlayerId(u32),
    TeamAssignment(Team),
    GameStarted(bool),
    GameState(GameSnapshot),
    Disconnected { reason: String },
}

fn binary_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_BINARY_FRAME)
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(value)?)
}

fn encode_binary<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(binary_options().serialize(value)?)
}

fn decode_binary<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, ProtocolError> {
    Ok(binary_options().deserialize(bytes)?)
}

impl ClientPacket {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        encode_json(self)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_binary(self)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode_binary(bytes)
    }
}

impl ServerPacket {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        encode_json(self)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_binary(self)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode_binary(bytes)
    }
}
