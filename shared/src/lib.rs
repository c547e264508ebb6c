use serde::{Deserialize, Serialize};
use std::ops::Sub;

pub const PROTOCOL_VERSION: u32 = 1;

/// Session id the server uses as the sender of its own chat messages.
pub const SERVER_SESSION_ID: u8 = 255;

pub const MAX_NAME_LENGTH: usize = 32;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: String,
    },
    CarUpdate {
        status: CarStatus,
    },
    Pong {
        timestamp: u64,
    },
    Disconnect,

    Connected {
        session_id: u8,
    },
    Ping {
        timestamp: u64,
    },
    WorldState {
        timestamp: u64,
        cars: Vec<CarSnapshot>,
    },
    Disconnected {
        reason: String,
    },

    Chat {
        session_id: u8,
        message: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn distance_squared(&self, other: &Vector3) -> f32 {
        (*other - *self).length_squared()
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, other: Vector3) -> Vector3 {
        Vector3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

/// Latest client-reported state of a car.
///
/// `rotation` holds yaw, pitch and roll in radians, in that order.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct CarStatus {
    pub position: Vector3,
    pub velocity: Vector3,
    pub rotation: Vector3,
    pub timestamp: u64,
}

impl CarStatus {
    pub fn new(position: Vector3, velocity: Vector3, rotation: Vector3) -> Self {
        Self {
            position,
            velocity,
            rotation,
            timestamp: 0,
        }
    }

    /// Heading in degrees within [0, 360), taken from the yaw component.
    pub fn rotation_angle(&self) -> f32 {
        self.rotation.x.to_degrees().rem_euclid(360.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CarSnapshot {
    pub session_id: u8,
    pub status: CarStatus,
}
