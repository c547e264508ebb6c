//! Client connection management for the race server
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Session slot assignment and capacity management
//! - Lookup by network address and by display name
//!
//! Each client owns an [`EntryCar`] that is shared with running races.
//! Removing a client marks its car as disconnected so that a race it takes
//! part in notices at its next poll.

use crate::entry_car::EntryCar;
use log::info;
use shared::SERVER_SESSION_ID;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A connected client and its connection bookkeeping
#[derive(Debug)]
pub struct Client {
    /// Car record shared with the rest of the server
    pub car: Arc<EntryCar>,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(car: Arc<EntryCar>) -> Self {
        Self {
            car,
            last_seen: Instant::now(),
        }
    }

    /// Records activity from the client
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if no packets have been received from this client
    /// within the specified timeout duration, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Session ids are small integers handed out lowest-free-first, the same
/// way slots on a race server are numbered. The id reserved for server
/// chat is never handed out.
pub struct ClientManager {
    /// Connected clients indexed by session id
    clients: HashMap<u8, Client>,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients: max_clients.min(SERVER_SESSION_ID as usize),
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns the new car if successful, None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, name: &str) -> Option<Arc<EntryCar>> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let session_id = (0..self.max_clients as u8).find(|id| !self.clients.contains_key(id))?;

        let car = Arc::new(EntryCar::new(session_id, name, addr));
        info!("{} connected from {} (session {})", name, addr, session_id);
        self.clients.insert(session_id, Client::new(Arc::clone(&car)));

        Some(car)
    }

    /// Removes a client from the server
    ///
    /// Returns the removed car, already marked as disconnected, or None if
    /// the client was already gone.
    pub fn remove_client(&mut self, session_id: u8) -> Option<Arc<EntryCar>> {
        let client = self.clients.remove(&session_id)?;
        client.car.mark_disconnected();
        info!("{} disconnected (session {})", client.car.name, session_id);
        Some(client.car)
    }

    /// Finds a client's car by its network address
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<Arc<EntryCar>> {
        self.clients
            .values()
            .find(|client| client.car.addr == addr)
            .map(|client| Arc::clone(&client.car))
    }

    /// Finds a client's car by display name, ignoring case
    pub fn find_by_name(&self, name: &str) -> Option<Arc<EntryCar>> {
        self.clients
            .values()
            .find(|client| client.car.name.eq_ignore_ascii_case(name))
            .map(|client| Arc::clone(&client.car))
    }

    /// Refreshes the activity timestamp of a client. Returns false if the
    /// client is unknown.
    pub fn touch(&mut self, session_id: u8) -> bool {
        match self.clients.get_mut(&session_id) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed cars so other systems can drop their state.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Arc<EntryCar>> {
        let timed_out: Vec<u8> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|session_id| self.remove_client(session_id))
            .collect()
    }

    /// Gets all session ids and their network addresses
    pub fn get_client_addrs(&self) -> Vec<(u8, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.car.addr))
            .collect()
    }

    /// Gets every connected car
    pub fn cars(&self) -> Vec<Arc<EntryCar>> {
        self.clients
            .values()
            .map(|client| Arc::clone(&client.car))
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_timeout() {
        let car = Arc::new(EntryCar::new(0, "Alice", test_addr()));
        let mut client = Client::new(car);

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));

        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_capacity_never_reaches_server_session_id() {
        let manager = ClientManager::new(1000);
        assert_eq!(manager.max_clients, SERVER_SESSION_ID as usize);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);

        let alice = manager.add_client(test_addr(), "Alice").unwrap();
        let bob = manager.add_client(test_addr2(), "Bob").unwrap();

        assert_eq!(alice.session_id, 0);
        assert_eq!(bob.session_id, 1);
        assert_eq!(bob.name, "Bob");
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert!(manager.add_client(test_addr(), "Alice").is_some());
        assert!(manager.add_client(test_addr2(), "Bob").is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_session_id_reused_after_removal() {
        let mut manager = ClientManager::new(3);
        manager.add_client(test_addr(), "Alice").unwrap();
        manager.add_client(test_addr2(), "Bob").unwrap();

        manager.remove_client(0).unwrap();
        let carol = manager
            .add_client("127.0.0.1:8082".parse().unwrap(), "Carol")
            .unwrap();

        assert_eq!(carol.session_id, 0);
    }

    #[test]
    fn test_remove_client_marks_car_disconnected() {
        let mut manager = ClientManager::new(2);
        let car = manager.add_client(test_addr(), "Alice").unwrap();
        assert!(car.is_connected());

        let removed = manager.remove_client(car.session_id).unwrap();
        assert!(Arc::ptr_eq(&removed, &car));
        assert!(!car.is_connected());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_remove_nonexistent_client() {
        let mut manager = ClientManager::new(2);
        assert!(manager.remove_client(99).is_none());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        let alice = manager.add_client(test_addr(), "Alice").unwrap();
        manager.add_client(test_addr2(), "Bob").unwrap();

        let found = manager.find_by_addr(test_addr()).unwrap();
        assert_eq!(found.session_id, alice.session_id);

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert!(manager.find_by_addr(unknown_addr).is_none());
    }

    #[test]
    fn test_find_client_by_name() {
        let mut manager = ClientManager::new(2);
        manager.add_client(test_addr(), "Alice").unwrap();

        assert!(manager.find_by_name("alice").is_some());
        assert!(manager.find_by_name("ALICE").is_some());
        assert!(manager.find_by_name("Bob").is_none());
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new(2);
        let alice = manager.add_client(test_addr(), "Alice").unwrap();
        manager.add_client(test_addr2(), "Bob").unwrap();

        if let Some(client) = manager.clients.get_mut(&alice.session_id) {
            client.last_seen = Instant::now() - Duration::from_secs(10);
        }

        let removed = manager.check_timeouts(Duration::from_secs(5));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].name, "Alice");
        assert!(!alice.is_connected());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_touch_unknown_client() {
        let mut manager = ClientManager::new(2);
        assert!(!manager.touch(4));
    }
}
