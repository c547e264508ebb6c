//! Head-to-head races between two connected players
//!
//! A [`Race`] is created once a challenge has been accepted and is started
//! exactly once. Its lifecycle runs as its own task:
//!
//! 1. If either player is already gone the race ends straight away.
//! 2. With strict line-up the players get 15 seconds to line up side by side.
//! 3. A "Ready... Set... Go!" countdown is sent with ping compensation, and
//!    the line-up is re-checked before every step.
//! 4. The race is polled every 250ms. The lead changes when the car behind
//!    passes the leader while faster and close by.
//! 5. The race ends when a player disconnects, when the leader teleports,
//!    when the cars drift too far apart, or when nobody has overtaken for a
//!    minute. The current leader, if any, is announced as the winner.
//!
//! Both players' racing markers are released on every way out of the
//! lifecycle, including errors and panics.

pub mod geometry;
pub mod leader;
pub mod line_up;
pub mod messenger;

use crate::entry_car::{EntryCar, RaceId};
use crate::outbox::{Outbox, OutboxError};
use leader::LeaderTracker;
use log::{debug, error, info, warn};
use shared::CarStatus;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

pub const LINE_UP_TIMEOUT: Duration = Duration::from_secs(15);
pub const LINE_UP_POLL_INTERVAL: Duration = Duration::from_millis(150);
pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);
pub const RACE_TICK: Duration = Duration::from_millis(250);
/// A race without any overtake for this long is over
pub const OVERTAKE_TIMEOUT: Duration = Duration::from_millis(60_000);
/// Squared leader displacement within one tick that counts as a teleport (200 units)
pub const TELEPORT_DISTANCE_SQUARED: f32 = 40_000.0;
/// Squared distance between the cars that ends the race (750 units)
pub const MAX_SEPARATION_SQUARED: f32 = 562_500.0;

const COUNTDOWN: [&str; 3] = ["Ready...", "Set...", "Go!"];

static NEXT_RACE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error)]
pub enum RaceError {
    #[error("{0} is already in a race")]
    AlreadyRacing(String),
    #[error("server is shutting down: {0}")]
    ServerClosed(#[from] OutboxError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Challenger,
    Challenged,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Challenger => Side::Challenged,
            Side::Challenged => Side::Challenger,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// A player was gone before the race could begin
    OpponentDisconnected,
    LineUpTimeout,
    OutOfLine,
    /// A player disconnected while racing
    Disconnected,
    Teleported,
    TooFarApart,
    NoOvertakes,
    Faulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceOutcome {
    pub reason: FinishReason,
    pub winner: Option<Side>,
}

impl RaceOutcome {
    fn new(reason: FinishReason, winner: Option<Side>) -> Self {
        Self { reason, winner }
    }

    fn without_winner(reason: FinishReason) -> Self {
        Self::new(reason, None)
    }
}

/// Handle to a started race. Dropping it does not stop the race.
#[derive(Debug)]
pub struct RaceHandle {
    race_id: RaceId,
    task: JoinHandle<RaceOutcome>,
}

impl RaceHandle {
    pub fn race_id(&self) -> RaceId {
        self.race_id
    }

    /// Waits for the race to end. Returns `None` if the race task was aborted.
    pub async fn finished(self) -> Option<RaceOutcome> {
        self.task.await.ok()
    }
}

/// Releases both racing markers when dropped
struct RaceMarkers {
    race_id: RaceId,
    cars: [Arc<EntryCar>; 2],
}

impl Drop for RaceMarkers {
    fn drop(&mut self) {
        for car in &self.cars {
            car.release_race(self.race_id);
        }
    }
}

#[derive(Debug)]
pub struct Race {
    id: RaceId,
    challenger: Arc<EntryCar>,
    challenged: Arc<EntryCar>,
    challenger_name: String,
    challenged_name: String,
    line_up_required: bool,
    has_started: AtomicBool,
    outbox: Outbox,
}

impl Race {
    /// Creates a race and marks both cars as racing in it.
    ///
    /// Fails without touching either marker if one of the cars is already
    /// in another race.
    pub fn new(
        challenger: Arc<EntryCar>,
        challenged: Arc<EntryCar>,
        line_up_required: bool,
        outbox: Outbox,
    ) -> Result<Arc<Self>, RaceError> {
        let id = NEXT_RACE_ID.fetch_add(1, Ordering::Relaxed);

        if !challenger.try_claim_race(id) {
            return Err(RaceError::AlreadyRacing(challenger.name.clone()));
        }
        if !challenged.try_claim_race(id) {
            challenger.release_race(id);
            return Err(RaceError::AlreadyRacing(challenged.name.clone()));
        }

        Ok(Arc::new(Self {
            id,
            challenger_name: challenger.name.clone(),
            challenged_name: challenged.name.clone(),
            challenger,
            challenged,
            line_up_required,
            has_started: AtomicBool::new(false),
            outbox,
        }))
    }

    /// Creates a race and starts it right away
    pub fn create_and_start(
        challenger: Arc<EntryCar>,
        challenged: Arc<EntryCar>,
        line_up_required: bool,
        outbox: Outbox,
    ) -> Result<RaceHandle, RaceError> {
        let race = Self::new(challenger, challenged, line_up_required, outbox)?;
        // A freshly created race has never been started
        race.start().ok_or_else(|| RaceError::AlreadyRacing(race.challenger_name.clone()))
    }

    pub fn id(&self) -> RaceId {
        self.id
    }

    pub fn has_started(&self) -> bool {
        self.has_started.load(Ordering::Acquire)
    }

    pub fn line_up_required(&self) -> bool {
        self.line_up_required
    }

    /// Launches the race lifecycle without waiting for it.
    ///
    /// Only the first call launches anything; later calls return `None`.
    pub fn start(self: &Arc<Self>) -> Option<RaceHandle> {
        if self.has_started.swap(true, Ordering::AcqRel) {
            return None;
        }

        info!(
            "Starting race between {} and {}",
            self.challenger_name, self.challenged_name
        );

        let race = Arc::clone(self);
        let task = tokio::spawn(race.supervise());

        Some(RaceHandle {
            race_id: self.id,
            task,
        })
    }

    /// Runs the lifecycle in its own task so that errors and panics end up
    /// in the same cleanup as a normal finish.
    async fn supervise(self: Arc<Self>) -> RaceOutcome {
        let markers = RaceMarkers {
            race_id: self.id,
            cars: [Arc::clone(&self.challenger), Arc::clone(&self.challenged)],
        };

        let lifecycle = tokio::spawn(Arc::clone(&self).run());
        let outcome = match lifecycle.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(
                    "Error while running race between {} and {}: {}",
                    self.challenger_name, self.challenged_name, e
                );
                RaceOutcome::without_winner(FinishReason::Faulted)
            }
            Err(e) => {
                error!(
                    "Race between {} and {} crashed: {}",
                    self.challenger_name, self.challenged_name, e
                );
                RaceOutcome::without_winner(FinishReason::Faulted)
            }
        };

        drop(markers);
        self.finish(&outcome);
        outcome
    }

    async fn run(self: Arc<Self>) -> Result<RaceOutcome, RaceError> {
        if !self.both_connected() {
            self.send_message("Opponent has disconnected.")?;
            return Ok(RaceOutcome::without_winner(FinishReason::OpponentDisconnected));
        }

        if self.line_up_required && !self.are_lined_up().await {
            self.send_message("You have 15 seconds to line up.")?;

            let lined_up = tokio::select! {
                _ = sleep(LINE_UP_TIMEOUT) => false,
                _ = self.wait_for_line_up() => true,
            };

            if !lined_up {
                self.send_message("You did not line up in time. The race has been cancelled.")?;
                return Ok(RaceOutcome::without_winner(FinishReason::LineUpTimeout));
            }

            if !self.both_connected() {
                self.send_message("Opponent has disconnected.")?;
                return Ok(RaceOutcome::without_winner(FinishReason::OpponentDisconnected));
            }
        }

        for (stage, &message) in COUNTDOWN.iter().enumerate() {
            if !self.are_lined_up().await {
                self.send_message("You went out of line. The race has been cancelled.")?;
                return Ok(RaceOutcome::without_winner(FinishReason::OutOfLine));
            }

            self.spawn_timed_message(message);

            if stage + 1 < COUNTDOWN.len() {
                sleep(COUNTDOWN_INTERVAL).await;
            }
        }

        self.run_race().await
    }

    /// Polls until the cars are lined up or one of the players leaves
    async fn wait_for_line_up(&self) {
        while self.both_connected() && !self.are_lined_up().await {
            sleep(LINE_UP_POLL_INTERVAL).await;
        }
    }

    async fn run_race(&self) -> Result<RaceOutcome, RaceError> {
        let mut tracker = LeaderTracker::new();

        loop {
            if !self.challenger.is_connected() {
                return Ok(RaceOutcome::new(FinishReason::Disconnected, Some(Side::Challenged)));
            } else if !self.challenged.is_connected() {
                return Ok(RaceOutcome::new(FinishReason::Disconnected, Some(Side::Challenger)));
            }

            let (challenger, challenged) = self.statuses().await;
            let now = Instant::now();

            let standing = tracker.update(&challenger, &challenged, now);
            if standing.overtake {
                self.send_message(&format!(
                    "{} has overtaken {}",
                    self.name(standing.leader),
                    self.name(standing.leader.opponent())
                ))?;
            }

            let (leader, follower) = match standing.leader {
                Side::Challenger => (&challenger, &challenged),
                Side::Challenged => (&challenged, &challenger),
            };

            if tracker.last_leader_position().distance_squared(&leader.position)
                > TELEPORT_DISTANCE_SQUARED
            {
                debug!(
                    "Leader {} teleported, ending race",
                    self.name(standing.leader)
                );
                return Ok(RaceOutcome::without_winner(FinishReason::Teleported));
            }
            tracker.set_last_leader_position(leader.position);

            if geometry::distance_squared(leader, follower) > MAX_SEPARATION_SQUARED {
                debug!(
                    "{} and {} are too far apart, ending race",
                    self.challenger_name, self.challenged_name
                );
                return Ok(RaceOutcome::without_winner(FinishReason::TooFarApart));
            }

            if tracker.since_last_overtake(now) > OVERTAKE_TIMEOUT {
                debug!(
                    "No overtake between {} and {} for {:?}",
                    self.challenger_name, self.challenged_name, OVERTAKE_TIMEOUT
                );
                return Ok(RaceOutcome::new(FinishReason::NoOvertakes, Some(standing.leader)));
            }

            sleep(RACE_TICK).await;
        }
    }

    fn finish(&self, outcome: &RaceOutcome) {
        if let Some(winner) = outcome.winner {
            let message = format!(
                "{} just beat {} in a race.",
                self.name(winner),
                self.name(winner.opponent())
            );
            if let Err(e) = self.outbox.broadcast_chat(&message) {
                warn!("Failed to announce race result: {}", e);
            }
        }

        info!(
            "Ending race between {} and {}.",
            self.challenger_name, self.challenged_name
        );
    }

    /// Display name captured when the race was created
    pub fn name(&self, side: Side) -> &str {
        match side {
            Side::Challenger => &self.challenger_name,
            Side::Challenged => &self.challenged_name,
        }
    }

    fn both_connected(&self) -> bool {
        self.challenger.is_connected() && self.challenged.is_connected()
    }

    async fn statuses(&self) -> (CarStatus, CarStatus) {
        (self.challenger.status().await, self.challenged.status().await)
    }

    async fn are_lined_up(&self) -> bool {
        let (challenger, challenged) = self.statuses().await;
        line_up::are_lined_up(&challenger, &challenged, self.line_up_required)
    }

    /// Sends a private message to whichever players are still connected
    fn send_message(&self, message: &str) -> Result<(), RaceError> {
        self.outbox.send_chat(&self.challenger, message)?;
        self.outbox.send_chat(&self.challenged, message)?;
        Ok(())
    }

    /// Sends a countdown step in the background so the countdown keeps its pace
    fn spawn_timed_message(&self, message: &'static str) {
        let outbox = self.outbox.clone();
        let challenger = Arc::clone(&self.challenger);
        let challenged = Arc::clone(&self.challenged);

        tokio::spawn(async move {
            if let Err(e) = messenger::send_timed(&outbox, message, &challenger, &challenged).await {
                warn!("Failed to send \"{}\": {}", message, e);
            }
        });
    }
}

impl Drop for Race {
    fn drop(&mut self) {
        // A started race releases its markers from the lifecycle instead
        if !*self.has_started.get_mut() {
            self.challenger.release_race(self.id);
            self.challenged.release_race(self.id);
        }
    }
}
