//! Rolling decision of which car leads a running race

use super::geometry::{distance_squared, relative_bearing};
use super::Side;
use shared::{CarStatus, Vector3};
use std::time::Duration;
use tokio::time::Instant;

/// Floor for the squared speed so a car at rest never compares as exactly zero
pub const MIN_SPEED_SQUARED: f32 = 0.077_160_617_28;
/// Cars further apart than this (50 units, squared) cannot overtake each other
pub const OVERTAKE_DISTANCE_SQUARED: f32 = 2500.0;

/// True when the opponent lies behind the car, judged from its own heading
fn is_behind(bearing: f32) -> bool {
    bearing > 90.0 && bearing < 275.0
}

fn speed_squared(status: &CarStatus) -> f32 {
    status.velocity.length_squared().max(MIN_SPEED_SQUARED)
}

/// Result of one leadership evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub leader: Side,
    /// Set when the lead changed hands during this evaluation. Never set on
    /// the very first evaluation of a race.
    pub overtake: bool,
}

#[derive(Debug)]
pub struct LeaderTracker {
    leader: Option<Side>,
    last_overtake_time: Option<Instant>,
    last_leader_position: Vector3,
}

impl LeaderTracker {
    pub fn new() -> Self {
        Self {
            leader: None,
            last_overtake_time: None,
            last_leader_position: Vector3::ZERO,
        }
    }

    pub fn leader(&self) -> Option<Side> {
        self.leader
    }

    pub fn follower(&self) -> Option<Side> {
        self.leader.map(Side::opponent)
    }

    /// Time of the last change of lead, or of the first evaluation
    pub fn last_overtake_time(&self) -> Option<Instant> {
        self.last_overtake_time
    }

    pub fn last_leader_position(&self) -> Vector3 {
        self.last_leader_position
    }

    pub fn set_last_leader_position(&mut self, position: Vector3) {
        self.last_leader_position = position;
    }

    pub fn since_last_overtake(&self, now: Instant) -> Duration {
        self.last_overtake_time
            .map(|time| now.saturating_duration_since(time))
            .unwrap_or(Duration::ZERO)
    }

    /// Re-evaluates the lead from the latest status of both cars.
    ///
    /// The first evaluation of a race only hands the lead to the challenger.
    /// The challenger's overtake condition is checked first, so it wins when
    /// both cars would qualify in the same evaluation.
    pub fn update(&mut self, challenger: &CarStatus, challenged: &CarStatus, now: Instant) -> Standing {
        let old_leader = match self.leader {
            Some(leader) => leader,
            None => {
                self.leader = Some(Side::Challenger);
                self.last_overtake_time = Some(now);
                self.last_leader_position = challenger.position;
                return Standing {
                    leader: Side::Challenger,
                    overtake: false,
                };
            }
        };

        let challenger_bearing = relative_bearing(challenger, challenged);
        let challenged_bearing = relative_bearing(challenged, challenger);

        let challenger_speed = speed_squared(challenger);
        let challenged_speed = speed_squared(challenged);

        let distance_squared = distance_squared(challenger, challenged);

        let mut leader = old_leader;
        if is_behind(challenger_bearing)
            && old_leader != Side::Challenger
            && challenger_speed > challenged_speed
            && distance_squared < OVERTAKE_DISTANCE_SQUARED
        {
            leader = Side::Challenger;
        } else if is_behind(challenged_bearing)
            && old_leader != Side::Challenged
            && challenged_speed > challenger_speed
            && distance_squared < OVERTAKE_DISTANCE_SQUARED
        {
            leader = Side::Challenged;
        }

        self.leader = Some(leader);

        let overtake = leader != old_leader;
        if overtake {
            self.last_overtake_time = Some(now);
            self.last_leader_position = match leader {
                Side::Challenger => challenger.position,
                Side::Challenged => challenged.position,
            };
        }

        Standing { leader, overtake }
    }
}

impl Default for LeaderTracker {
    fn default() -> Self {
        Self::new()
    }
}
