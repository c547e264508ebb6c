//! Per-player car record shared between the network loop and running races
//!
//! The network loop is the only writer of status, round-trip time and the
//! connectivity flag. Races only read those, and write nothing but the
//! racing marker of the two cars they own.

use crate::utils::{round_trip_ms, MAX_ROUND_TRIP_MS};
use shared::CarStatus;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Identifier of a race, unique for the lifetime of the process.
pub type RaceId = u64;

const NO_RACE: RaceId = 0;
const NO_PING: u64 = 0;

#[derive(Debug)]
pub struct EntryCar {
    /// Session slot assigned by the server
    pub session_id: u8,
    /// Display name chosen at connect time
    pub name: String,
    /// Network address for sending responses
    pub addr: SocketAddr,
    status: RwLock<CarStatus>,
    ping_ms: AtomicU32,
    /// Timestamp of the ping still waiting for its pong
    last_ping_sent: AtomicU64,
    connected: AtomicBool,
    current_race: AtomicU64,
}

impl EntryCar {
    pub fn new(session_id: u8, name: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            session_id,
            name: name.into(),
            addr,
            status: RwLock::new(CarStatus::default()),
            ping_ms: AtomicU32::new(0),
            last_ping_sent: AtomicU64::new(NO_PING),
            connected: AtomicBool::new(true),
            current_race: AtomicU64::new(NO_RACE),
        }
    }

    /// Returns a copy of the latest reported status
    pub async fn status(&self) -> CarStatus {
        *self.status.read().await
    }

    pub async fn set_status(&self, status: CarStatus) {
        *self.status.write().await = status;
    }

    /// Last measured round-trip time
    pub fn ping(&self) -> Duration {
        Duration::from_millis(self.ping_ms.load(Ordering::Relaxed) as u64)
    }

    /// Stores a round-trip time, capped at [`MAX_ROUND_TRIP_MS`]
    pub fn set_ping(&self, ping_ms: u32) {
        self.ping_ms
            .store(ping_ms.min(MAX_ROUND_TRIP_MS), Ordering::Relaxed);
    }

    /// Remembers the timestamp of the ping just sent to this car
    pub fn record_ping_sent(&self, timestamp: u64) {
        self.last_ping_sent.store(timestamp, Ordering::Release);
    }

    /// Updates the round-trip time from a pong.
    ///
    /// Only an echo of the last ping sent counts, and only once. Returns
    /// false when the pong was ignored.
    pub fn accept_pong(&self, timestamp: u64, now: u64) -> bool {
        if timestamp == NO_PING {
            return false;
        }

        let Some(ping_ms) = round_trip_ms(timestamp, now) else {
            return false;
        };

        if self
            .last_ping_sent
            .compare_exchange(timestamp, NO_PING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.set_ping(ping_ms);
        true
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Flags the car as gone. Running races notice at their next poll.
    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    pub fn current_race(&self) -> Option<RaceId> {
        match self.current_race.load(Ordering::Acquire) {
            NO_RACE => None,
            id => Some(id),
        }
    }

    pub fn is_racing(&self) -> bool {
        self.current_race().is_some()
    }

    /// Sets the racing marker to `race_id` if the car is not racing yet.
    pub fn try_claim_race(&self, race_id: RaceId) -> bool {
        self.current_race
            .compare_exchange(NO_RACE, race_id, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clears the racing marker, but only while it still belongs to `race_id`.
    pub fn release_race(&self, race_id: RaceId) -> bool {
        self.current_race
            .compare_exchange(race_id, NO_RACE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
