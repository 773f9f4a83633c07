//! Possession and ball actions initiated by players.
//!
//! Every action names the acting player by id. Unknown ids and failed
//! proximity gates are silently ignored; the boolean result only reports
//! whether the action took effect.

use crate::game::Match;
use kickoff_shared::{
    Action, Ball, Player, BALL_RADIUS, KICK_POWER, KICK_RANGE_SLACK, MAX_ENERGY,
    MAX_ULTIMATE_GAUGE, MOMENTUM_TRANSFER, PASS_POWER, PASS_RANGE_SLACK, PLAYER_RADIUS,
    TACKLE_ENERGY_BONUS, TACKLE_KNOCK_SPEED, ULTIMATE_KICK_MULTIPLIER,
};
use log::debug;
use std::time::Instant;

/// Reach for taking or dropping dribbling control.
pub const DRIBBLE_RANGE: f32 = PLAYER_RADIUS + BALL_RADIUS * 3.0;

fn angle_to_ball(player: &Player, ball: &Ball) -> f32 {
    (ball.y - player.y).atan2(ball.x - player.x)
}

/// Hands the carrier's momentum to the ball.
fn release_ball(player: &Player, ball: &mut Ball) {
    if player.has_velocity() {
        ball.velocity_x = player.velocity_x * MOMENTUM_TRANSFER;
        ball.velocity_y = player.velocity_y * MOMENTUM_TRANSFER;
    }
}

impl Match {
    pub fn perform(&mut self, player_id: u32, action: Action, now: Instant) -> bool {
        let applied = match action {
            Action::KickBall => self.kick(player_id),
            Action::ToggleDribble => self.toggle_dribble(player_id),
            Action::PassBall => self.pass(player_id),
            Action::ReleaseBall => self.release(player_id),
            Action::TackleBall => self.tackle(player_id, now),
        };
        debug!("Player {} {:?} -> applied: {}", player_id, action, applied);
        applied
    }

    pub fn kick(&mut self, player_id: u32) -> bool {
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        let ball = &mut self.ball;

        let in_range = player.distance_to(ball) < player.radius + ball.radius + KICK_RANGE_SLACK;
        if !in_range {
            return false;
        }

        let mut power = KICK_POWER;
        if player.ultimate_gauge >= MAX_ULTIMATE_GAUGE {
            power *= ULTIMATE_KICK_MULTIPLIER;
            player.ultimate_gauge = 0.0;
            debug!("Player {} fired an ultimate kick", player_id);
        }

        ball.set_velocity(angle_to_ball(player, ball), power);
        player.is_dribbling = false;
        true
    }

    /// Takes or drops dribbling control. Only one player may dribble; a
    /// request while someone else holds the ball is ignored.
    pub fn toggle_dribble(&mut self, player_id: u32) -> bool {
        let other_dribbling = self
            .players
            .values()
            .any(|p| p.is_dribbling && p.id != player_id);
        if other_dribbling {
            return false;
        }

        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        let in_range = player.distance_to(&self.ball) < DRIBBLE_RANGE;
        if !in_range {
            return false;
        }

        player.is_dribbling = !player.is_dribbling;
        if !player.is_dribbling {
            release_ball(player, &mut self.ball);
        }
        true
    }

    pub fn release(&mut self, player_id: u32) -> bool {
        let Some(player) = self.players.get(&player_id) else {
            return false;
        };
        if !player.has_velocity() {
            return false;
        }
        release_ball(player, &mut self.ball);
        true
    }

    pub fn pass(&mut self, player_id: u32) -> bool {
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        let ball = &mut self.ball;

        let in_range = player.distance_to(ball) < player.radius + ball.radius + PASS_RANGE_SLACK;
        if !in_range {
            return false;
        }

        let angle = if player.has_velocity() {
            player.velocity_y.atan2(player.velocity_x)
        } else {
            angle_to_ball(player, ball)
        };

        player.is_dribbling = false;
        ball.set_velocity(angle, PASS_POWER);
        true
    }

    /// Raises the tackle flag for a short window and strips the ball from
    /// another player's dribble if the tackler is touching it.
    pub fn tackle(&mut self, player_id: u32, now: Instant) -> bool {
        let Some(tackler) = self.players.get_mut(&player_id) else {
            return false;
        };
        tackler.is_tackling = true;
        let (tackler_x, tackler_y, tackler_radius) = (tackler.x, tackler.y, tackler.radius);
        self.tackle_timers.arm(player_id, now);

        let Some(dribbler_id) = self
            .players
            .values()
            .find(|p| p.is_dribbling && p.id != player_id)
            .map(|p| p.id)
        else {
            return false;
        };

        let dx = self.ball.x - tackler_x;
        let dy = self.ball.y - tackler_y;
        let touching = dx.hypot(dy) <= tackler_radius + self.ball.radius;
        if !touching {
            return false;
        }

        if let Some(dribbler) = self.players.get_mut(&dribbler_id) {
            dribbler.is_dribbling = false;
        }
        self.ball.set_velocity(dy.atan2(dx), TACKLE_KNOCK_SPEED);

        if let Some(tackler) = self.players.get_mut(&player_id) {
            tackler.energy = (tackler.energy + TACKLE_ENERGY_BONUS).min(MAX_ENERGY);
        }
        debug!("Player {} tackled player {}", player_id, dribbler_id);
        true
    }
}
