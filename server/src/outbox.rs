//! Outbound packet queue shared by the game loop and running races

use crate::entry_car::EntryCar;
use shared::{Packet, SERVER_SESSION_ID};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::sync::mpsc;

/// Messages sent from the game loop and races to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
    },
}

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("outbound packet queue is closed")]
    Closed,
}

/// Cloneable handle for queueing packets to clients
///
/// Sends never wait for delivery. A send only fails once the network
/// sender task has gone away.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<GameMessage>,
}

impl Outbox {
    pub fn new(tx: mpsc::UnboundedSender<GameMessage>) -> Self {
        Self { tx }
    }

    /// Creates an outbox together with the receiving end of its queue
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GameMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send_packet(&self, packet: Packet, addr: SocketAddr) -> Result<(), OutboxError> {
        self.tx
            .send(GameMessage::SendPacket { packet, addr })
            .map_err(|_| OutboxError::Closed)
    }

    /// Queues a packet for every connected client
    pub fn broadcast_packet(&self, packet: Packet) -> Result<(), OutboxError> {
        self.tx
            .send(GameMessage::BroadcastPacket { packet })
            .map_err(|_| OutboxError::Closed)
    }

    /// Sends a server chat line to one car. Disconnected cars are skipped.
    pub fn send_chat(&self, car: &EntryCar, message: &str) -> Result<(), OutboxError> {
        if !car.is_connected() {
            return Ok(());
        }

        self.send_packet(
            Packet::Chat {
                session_id: SERVER_SESSION_ID,
                message: message.to_string(),
            },
            car.addr,
        )
    }

    /// Sends a server chat line to every connected client
    pub fn broadcast_chat(&self, message: &str) -> Result<(), OutboxError> {
        self.broadcast_packet(Packet::Chat {
            session_id: SERVER_SESSION_ID,
            message: message.to_string(),
        })
    }
}
