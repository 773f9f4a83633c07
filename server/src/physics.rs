//! Fixed-tick simulation of the ball and player resources.

use crate::game::Match;
use kickoff_shared::{
    normalize, Team, BALL_FRICTION, DRIBBLE_DISTANCE, DRIBBLE_JITTER, DRIBBLE_STRENGTH,
    ENERGY_DRAIN_RATE, ENERGY_RECOVERY_RATE, GOAL_MESSAGE_DURATION, MAX_ENERGY,
    MAX_ULTIMATE_GAUGE, MOMENTUM_TRANSFER, OUT_MESSAGE_DURATION, ULTIMATE_GAIN_RATE,
};
use log::info;
use rand::Rng;

/// Notable outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    Out,
    Goal(Team),
}

impl Match {
    /// Advances the match by one tick.
    ///
    /// Order matters: resources, ball steering/friction, integration, out
    /// check, goal check, player contact, then banner timers.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Option<TickEvent> {
        self.tick += 1;
        self.update_player_resources();
        let event = self.update_ball(rng);

        self.out_message_timer = self.out_message_timer.saturating_sub(1);
        self.goal_message_timer = self.goal_message_timer.saturating_sub(1);
        event
    }

    fn update_player_resources(&mut self) {
        for player in self.players.values_mut() {
            let is_moving = player.keys.is_moving();

            if player.is_running && is_moving && player.energy > 0.0 {
                player.energy = (player.energy - ENERGY_DRAIN_RATE).max(0.0);
                if player.energy == 0.0 {
                    player.is_running = false;
                }
            } else if !is_moving {
                player.energy = (player.energy + ENERGY_RECOVERY_RATE).min(MAX_ENERGY);
            } else if !player.is_running {
                player.energy = (player.energy + ENERGY_RECOVERY_RATE * 0.5).min(MAX_ENERGY);
            }

            if player.is_dribbling && is_moving {
                player.ultimate_gauge =
                    (player.ultimate_gauge + ULTIMATE_GAIN_RATE).min(MAX_ULTIMATE_GAUGE);
            }
        }
    }

    fn update_ball<R: Rng>(&mut self, rng: &mut R) -> Option<TickEvent> {
        self.steer_ball(rng);

        self.ball.x += self.ball.velocity_x;
        self.ball.y += self.ball.velocity_y;

        if self.ball.is_outside_field() && !self.goals.iter().any(|g| g.contains_ball(&self.ball))
        {
            info!("Ball out at ({:.1}, {:.1})", self.ball.x, self.ball.y);
            self.out_pending = true;
            self.out_message_timer = OUT_MESSAGE_DURATION;
            self.reset_ball();
            return Some(TickEvent::Out);
        }

        let scoring_team = self
            .goals
            .iter()
            .find(|g| g.contains_ball(&self.ball))
            .map(|g| g.team);
        if let Some(team) = scoring_team {
            self.score.record(team);
            info!(
                "Goal for team {} ({} - {})",
                team.number(),
                self.score.team1,
                self.score.team2
            );
            self.goal_message_timer = GOAL_MESSAGE_DURATION;
            self.reset_ball();
            return Some(TickEvent::Goal(team));
        }

        self.resolve_ball_contacts();
        None
    }

    /// Pulls the ball toward the dribbler's feet, or lets it roll out.
    fn steer_ball<R: Rng>(&mut self, rng: &mut R) {
        let Some(dribbler) = self.players.values().find(|p| p.is_dribbling) else {
            self.ball.velocity_x *= BALL_FRICTION;
            self.ball.velocity_y *= BALL_FRICTION;
            return;
        };
        let ball = &mut self.ball;
        let pull = 1.0 - DRIBBLE_STRENGTH;

        if dribbler.has_velocity() {
            let (dir_x, dir_y) = normalize(dribbler.velocity_x, dribbler.velocity_y);
            let target_x = dribbler.x + dir_x * DRIBBLE_DISTANCE;
            let target_y = dribbler.y + dir_y * DRIBBLE_DISTANCE;

            ball.velocity_x = (target_x - ball.x) * pull
                + dribbler.velocity_x * MOMENTUM_TRANSFER
                + rng.gen_range(-DRIBBLE_JITTER..DRIBBLE_JITTER);
            ball.velocity_y = (target_y - ball.y) * pull
                + dribbler.velocity_y * MOMENTUM_TRANSFER
                + rng.gen_range(-DRIBBLE_JITTER..DRIBBLE_JITTER);
        } else {
            let (dir_x, dir_y) = normalize(ball.x - dribbler.x, ball.y - dribbler.y);
            if dir_x == 0.0 && dir_y == 0.0 {
                return;
            }
            let target_x = dribbler.x + dir_x * DRIBBLE_DISTANCE;
            let target_y = dribbler.y + dir_y * DRIBBLE_DISTANCE;

            ball.velocity_x = (target_x - ball.x) * pull;
            ball.velocity_y = (target_y - ball.y) * pull;
        }
    }

    /// Single-shot push-out of the ball from every overlapping player.
    fn resolve_ball_contacts(&mut self) {
        let ball = &mut self.ball;
        for player in self.players.values() {
            let dx = ball.x - player.x;
            let dy = ball.y - player.y;
            let distance = dx.hypot(dy);
            let reach = player.radius + ball.radius;
            if distance >= reach {
                continue;
            }

            let angle = dy.atan2(dx);
            let overlap = reach - distance;
            ball.x += angle.cos() * overlap;
            ball.y += angle.sin() * overlap;

            let power = player.velocity_magnitude();
            if power > 0.0 {
                ball.set_velocity(angle, power * MOMENTUM_TRANSFER);
            }
        }
    }
}
