//! Roster and match-phase transitions.

use crate::game::{Match, Phase};
use kickoff_shared::{Player, Team, MIN_PLAYERS_TO_START};
use log::info;

/// Result of adding a player to the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub team: Team,
    /// The roster just crossed the start threshold; clients must be told.
    pub started: bool,
}

/// Result of removing a player from the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// No such player; nothing changed.
    Unknown,
    /// Player removed, phase unchanged.
    Left,
    /// Roster fell below the minimum while active; back to waiting.
    Stopped,
    /// Last player left; score and ball were reset.
    Reset,
}

impl Match {
    /// Team 1 unless it already has more players than team 2.
    pub fn balanced_team(&self) -> Team {
        let (team1, team2) = self.team_counts();
        if team1 <= team2 {
            Team::One
        } else {
            Team::Two
        }
    }

    pub fn join(&mut self, id: u32) -> JoinOutcome {
        let team = self.balanced_team();
        let player = Player::new(id, team);
        info!(
            "Player {} joined team {} at ({}, {})",
            id,
            team.number(),
            player.x,
            player.y
        );
        self.players.insert(id, player);

        JoinOutcome {
            team,
            started: self.check_start(),
        }
    }

    /// Moves Waiting → Active when the roster reaches the minimum.
    /// Returns true only on the transition itself.
    pub fn check_start(&mut self) -> bool {
        if self.phase == Phase::Waiting && self.player_count() >= MIN_PLAYERS_TO_START {
            info!("Game started with {} players", self.player_count());
            self.phase = Phase::Active;
            self.reset_ball();
            true
        } else {
            false
        }
    }

    pub fn leave(&mut self, id: u32) -> LeaveOutcome {
        if self.players.remove(&id).is_none() {
            return LeaveOutcome::Unknown;
        }
        self.tackle_timers.cancel(id);
        info!("Player {} left ({} remaining)", id, self.player_count());

        if self.players.is_empty() {
            self.reset();
            LeaveOutcome::Reset
        } else if self.phase == Phase::Active && self.player_count() < MIN_PLAYERS_TO_START {
            info!("Not enough players, game paused");
            self.phase = Phase::Waiting;
            LeaveOutcome::Stopped
        } else {
            LeaveOutcome::Left
        }
    }

    /// Full reset once the pitch is empty.
    pub fn reset(&mut self) {
        self.score = Default::default();
        self.reset_ball();
        self.phase = Phase::Waiting;
        self.out_message_timer = 0;
        self.goal_message_timer = 0;
        self.out_pending = false;
        self.tackle_timers.clear();
        info!("Match reset");
    }
}
