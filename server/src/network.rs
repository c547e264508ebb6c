//! Server network layer handling UDP communications and game loop coordination

use crate::challenge::{ChallengeBook, ChatCommand};
use crate::client_manager::ClientManager;
use crate::entry_car::EntryCar;
use crate::outbox::{GameMessage, Outbox};
use crate::utils::get_timestamp;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{CarSnapshot, Packet, MAX_NAME_LENGTH, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// How often every client is pinged to measure its round-trip time
pub const PING_INTERVAL: Duration = Duration::from_secs(1);

/// Runtime settings of the server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_clients: usize,
    /// Silence after which a client is dropped
    pub client_timeout: Duration,
    /// Whether accepted challenges require a strict line-up
    pub line_up_required: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_clients: 16,
            client_timeout: Duration::from_secs(5),
            line_up_required: true,
        }
    }
}

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        session_id: u8,
    },
}

/// Main server coordinating networking, chat commands and races
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    challenges: ChallengeBook,
    outbox: Outbox,
    config: ServerConfig,
    tick_duration: Duration,
    tick: u64,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbox, game_rx) = Outbox::channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            challenges: ChallengeBook::new(),
            outbox,
            config,
            tick_duration,
            tick: 0,
            server_tx,
            server_rx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (session_id, addr) in client_addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to session {}: {}", session_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.config.client_timeout;

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for car in timed_out {
                    let message = ServerMessage::ClientTimeout {
                        session_id: car.session_id,
                    };
                    if let Err(e) = server_tx.send(message) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    /// Spawns task that pings every client for round-trip measurement
    fn spawn_ping_sender(&self) {
        let clients = Arc::clone(&self.clients);
        let outbox = self.outbox.clone();

        tokio::spawn(async move {
            let mut interval = interval(PING_INTERVAL);

            loop {
                interval.tick().await;

                let cars = {
                    let clients_guard = clients.read().await;
                    clients_guard.cars()
                };

                for car in cars {
                    let timestamp = get_timestamp();
                    car.record_ping_sent(timestamp);
                    if let Err(e) = outbox.send_packet(Packet::Ping { timestamp }, car.addr) {
                        error!("Failed to queue ping: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.outbox.send_packet(packet, addr) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn send_chat(&self, car: &EntryCar, message: &str) {
        if let Err(e) = self.outbox.send_chat(car, message) {
            error!("Failed to queue chat message: {}", e);
        }
    }

    /// Looks up the sender of a packet and records its activity
    async fn touch_client(&self, addr: SocketAddr) -> Option<Arc<EntryCar>> {
        let mut clients = self.clients.write().await;
        let car = clients.find_by_addr(addr)?;
        clients.touch(car.session_id);
        Some(car)
    }

    async fn remove_client(&mut self, session_id: u8) {
        let removed = {
            let mut clients = self.clients.write().await;
            clients.remove_client(session_id)
        };

        if removed.is_some() {
            self.challenges.forget(session_id);
        }
    }

    /// Processes incoming packets and updates server state
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                name,
            } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );
                self.handle_connect(client_version, name.trim(), addr).await;
            }

            Packet::CarUpdate { status } => {
                if let Some(car) = self.touch_client(addr).await {
                    car.set_status(status).await;
                }
            }

            Packet::Pong { timestamp } => {
                if let Some(car) = self.touch_client(addr).await {
                    if !car.accept_pong(timestamp, get_timestamp()) {
                        debug!("Ignoring unexpected pong from {}", car.name);
                    }
                }
            }

            Packet::Chat { message, .. } => {
                if let Some(car) = self.touch_client(addr).await {
                    self.handle_chat(car, &message).await;
                }
            }

            Packet::Disconnect => {
                let car = {
                    let clients = self.clients.read().await;
                    clients.find_by_addr(addr)
                };

                if let Some(car) = car {
                    self.remove_client(car.session_id).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_connect(&mut self, client_version: u32, name: &str, addr: SocketAddr) {
        if client_version != PROTOCOL_VERSION {
            let reason = "Unsupported client version".to_string();
            self.send_packet(Packet::Disconnected { reason }, addr);
            return;
        }

        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            let reason = "Invalid name".to_string();
            self.send_packet(Packet::Disconnected { reason }, addr);
            return;
        }

        // Remove existing connection if present
        let existing = {
            let clients = self.clients.read().await;
            clients.find_by_addr(addr)
        };

        if let Some(existing) = existing {
            info!(
                "Removing existing session {} from {}",
                existing.session_id, addr
            );
            self.remove_client(existing.session_id).await;
        }

        let car = {
            let mut clients = self.clients.write().await;
            if clients.find_by_name(name).is_some() {
                None
            } else {
                Some(clients.add_client(addr, name))
            }
        };

        let response = match car {
            None => Packet::Disconnected {
                reason: "Name already in use".to_string(),
            },
            Some(None) => Packet::Disconnected {
                reason: "Server full".to_string(),
            },
            Some(Some(car)) => Packet::Connected {
                session_id: car.session_id,
            },
        };
        self.send_packet(response, addr);
    }

    async fn handle_chat(&mut self, car: Arc<EntryCar>, message: &str) {
        let Some(command) = ChatCommand::parse(message) else {
            let packet = Packet::Chat {
                session_id: car.session_id,
                message: format!("{}: {}", car.name, message),
            };
            if let Err(e) = self.outbox.broadcast_packet(packet) {
                error!("Failed to queue chat broadcast: {}", e);
            }
            return;
        };

        let result = match command {
            ChatCommand::Race(name) => {
                let target = if name.is_empty() {
                    None
                } else {
                    let clients = self.clients.read().await;
                    clients.find_by_name(&name)
                };
                self.challenges.challenge(&car, target, &self.outbox)
            }
            ChatCommand::Accept => self
                .challenges
                .accept(&car, self.config.line_up_required, &self.outbox)
                .map(|_| ()),
            ChatCommand::Unknown(name) => {
                debug!("{} sent unknown command /{}", car.name, name);
                self.send_chat(&car, "Unknown command.");
                Ok(())
            }
        };

        if let Err(e) = result {
            error!("Failed to handle command from {}: {}", car.name, e);
        }
    }

    /// Broadcasts every car's latest status to all connected clients
    async fn broadcast_world_state(&self) {
        let cars = {
            let clients = self.clients.read().await;
            if clients.is_empty() {
                return;
            }
            clients.cars()
        };

        let mut snapshots = Vec::with_capacity(cars.len());
        for car in cars {
            snapshots.push(CarSnapshot {
                session_id: car.session_id,
                status: car.status().await,
            });
        }

        let packet = Packet::WorldState {
            timestamp: get_timestamp(),
            cars: snapshots,
        };

        if let Err(e) = self.outbox.broadcast_packet(packet) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), ServerError> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();
        self.spawn_ping_sender();

        let mut tick_interval = interval(self.tick_duration);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { session_id }) => {
                            self.challenges.forget(session_id);
                        },
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    self.tick += 1;
                    self.broadcast_world_state().await;

                    // Periodic performance monitoring
                    if self.tick % 60 == 0 {
                        let client_count = {
                            let clients = self.clients.read().await;
                            clients.len()
                        };

                        if client_count > 0 {
                            debug!("Tick {}: {} clients, {:.1}Hz, {} open challenges",
                                   self.tick, client_count, 1.0 / dt, self.challenges.len());
                        }
                    }
                },
            }
        }

        Ok(())
    }
}
