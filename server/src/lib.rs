//! # Race Server Library
//!
//! This library provides the server side of a multiplayer driving game. It
//! keeps track of connected players and their cars, relays car state between
//! them, and runs head-to-head races that players start by challenging each
//! other in chat.
//!
//! ## Core Responsibilities
//!
//! ### Client Management
//! Handles the complete lifecycle of client connections including:
//! - Connection establishment and session slot assignment
//! - Round-trip time measurement through periodic pings
//! - Disconnection handling and timeout cleanup
//!
//! ### State Broadcasting
//! Cars report their own position, velocity and rotation. The server does
//! not simulate physics; it stores the latest report per car and broadcasts
//! every car's state to all clients at a fixed tick rate.
//!
//! ### Races
//! A player sends `/race <name>` and the other player answers `/accept`.
//! The race then runs as its own task next to the network loop: it waits for
//! the cars to line up, counts down with ping compensation so that both
//! players see "Go!" at the same moment, follows who is leading, and
//! announces the winner in chat.
//!
//! ## Module Organization
//!
//! ### Entry Car Module (`entry_car`)
//! The per-player record shared between the network loop and races.
//!
//! ### Client Manager Module (`client_manager`)
//! Connection tracking, session ids and timeouts.
//!
//! ### Outbox Module (`outbox`)
//! Queue of outgoing packets, drained by the network sender task.
//!
//! ### Race Module (`race`)
//! Line-up detection, leadership tracking, ping-compensated messaging and
//! the race lifecycle itself.
//!
//! ### Challenge Module (`challenge`)
//! The `/race` and `/accept` chat commands.
//!
//! ### Network Module (`network`)
//! UDP socket handling, packet dispatch and the main server loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     // Broadcast car state 18 times per second
//!     let mut server = Server::new(
//!         "127.0.0.1:9600",
//!         Duration::from_millis(55),
//!         ServerConfig::default(),
//!     ).await?;
//!
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod challenge;
pub mod client_manager;
pub mod entry_car;
pub mod network;
pub mod outbox;
pub mod race;
pub mod utils;
