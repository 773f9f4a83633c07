//! Authoritative match state.
//!
//! `Match` is the single owner of everything the simulation touches: the
//! roster, the ball, the score, goal rectangles, banner timers, the match
//! phase and pending tackle timers. It performs no validation of its own;
//! the resolver (`actions`), stepper (`physics`) and session logic
//! (`session`) enforce the invariants on top of it.

use kickoff_shared::{
    Ball, GameSnapshot, Goal, Player, PlayerStateUpdate, Score, Team, TACKLE_DURATION_MS,
};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Whether the tick loop is simulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Waiting,
    Active,
}

/// Pending tackle flag resets, keyed by player id.
///
/// Arming a timer for a player that already has one replaces the deadline.
#[derive(Debug, Default)]
pub struct TackleTimers {
    deadlines: HashMap<u32, Instant>,
}

impl TackleTimers {
    pub fn arm(&mut self, player_id: u32, now: Instant) {
        let deadline = now + Duration::from_millis(TACKLE_DURATION_MS);
        self.deadlines.insert(player_id, deadline);
    }

    pub fn cancel(&mut self, player_id: u32) -> bool {
        self.deadlines.remove(&player_id).is_some()
    }

    pub fn is_armed(&self, player_id: u32) -> bool {
        self.deadlines.contains_key(&player_id)
    }

    /// Removes and returns every timer whose deadline has passed.
    pub fn drain_expired(&mut self, now: Instant) -> Vec<u32> {
        let expired: Vec<u32> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            self.deadlines.remove(id);
        }
        expired
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }
}

#[derive(Debug)]
pub struct Match {
    pub tick: u64,
    pub phase: Phase,
    pub players: BTreeMap<u32, Player>,
    pub ball: Ball,
    pub score: Score,
    pub goals: [Goal; 2],
    pub out_message_timer: u32,
    pub goal_message_timer: u32,
    /// Set when the ball goes out, cleared by the next snapshot.
    pub out_pending: bool,
    pub tackle_timers: TackleTimers,
}

impl Match {
    pub fn new() -> Self {
        Self {
            tick: 0,
            phase: Phase::Waiting,
            players: BTreeMap::new(),
            ball: Ball::new(),
            score: Score::default(),
            goals: Goal::field_goals(),
            out_message_timer: 0,
            goal_message_timer: 0,
            out_pending: false,
            tackle_timers: TackleTimers::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Number of players on (team 1, team 2).
    pub fn team_counts(&self) -> (usize, usize) {
        self.players
            .values()
            .fold((0, 0), |(one, two), player| match player.team {
                Team::One => (one + 1, two),
                Team::Two => (one, two + 1),
            })
    }

    /// Id of the player currently dribbling, if any.
    pub fn dribbler_id(&self) -> Option<u32> {
        self.players
            .values()
            .find(|player| player.is_dribbling)
            .map(|player| player.id)
    }

    pub fn clear_dribbling(&mut self) {
        for player in self.players.values_mut() {
            player.is_dribbling = false;
        }
    }

    /// Puts the ball back on the centre spot and releases any dribbler.
    pub fn reset_ball(&mut self) {
        self.clear_dribbling();
        self.ball.reset();
    }

    /// Copies client-reported kinematics and keys onto the player record.
    ///
    /// Updates carrying a non-finite coordinate or velocity are dropped;
    /// the ball takes its position and speed from these fields.
    pub fn apply_player_state(&mut self, update: &PlayerStateUpdate) -> bool {
        let Some(player) = self.players.get_mut(&update.id) else {
            return false;
        };
        let finite = [update.x, update.y, update.velocity_x, update.velocity_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            debug!("Dropping non-finite state from player {}", update.id);
            return false;
        }

        player.x = update.x;
        player.y = update.y;
        player.velocity_x = update.velocity_x;
        player.velocity_y = update.velocity_y;
        player.is_kicking = update.is_kicking;
        player.is_running = update.is_running && player.energy > 0.0;
        player.keys = update.keys.clone();
        true
    }

    /// Clears the tackle flag of every player whose tackle window has ended.
    pub fn expire_tackles(&mut self, now: Instant) {
        for id in self.tackle_timers.drain_expired(now) {
            if let Some(player) = self.players.get_mut(&id) {
                player.is_tackling = false;
                debug!("Tackle window closed for player {}", id);
            }
        }
    }

    /// Builds the broadcast snapshot. The out flag is edge-triggered and is
    /// consumed here; the goal flag stays up while its timer runs.
    pub fn take_snapshot(&mut self) -> GameSnapshot {
        let snapshot = GameSnapshot {
            ball: self.ball.clone(),
            players: self.players.clone(),
            score: self.score,
            out_message: self.out_pending,
            goal_message: self.goal_message_timer > 0,
        };
        self.out_pending = false;
        snapshot
    }
}

impl Default for Match {
    fn default() -> Self {
        Self::new()
    }
}
