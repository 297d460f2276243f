//! Server network layer handling TCP connections and tick coordination

use crate::client_manager::{Peer, PeerManager};
use crate::error::ServerError;
use log::{debug, error, info, warn};
use shared::input::direction_for_key;
use shared::protocol::encode_handshake;
use shared::{
    ClientPacket, Config, Direction, GameState, InitPacket, LocalCommand, NullSurface,
    ProtocolError, ServerPacket, Surface, TickEvent,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Time writers get to flush the final Quit on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Accepted {
        stream: TcpStream,
        addr: SocketAddr,
    },
    PacketReceived {
        session: u64,
        packet: ClientPacket,
    },
    /// The peer's stream ended. `error` is None for a clean close.
    Disconnected {
        session: u64,
        error: Option<ProtocolError>,
    },
}

/// Main server coordinating connections and the authoritative world
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    game: GameState,
    surface: Box<dyn Surface>,
    peers: PeerManager,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    /// Binds the listening socket and spawns the server's own snake.
    pub async fn bind(config: &Config) -> Result<Self, ServerError> {
        let game = GameState::server(config.tick_delay())?;
        Self::with_game(config, game).await
    }

    /// Binds the listening socket around an already prepared world.
    pub async fn with_game(config: &Config, game: GameState) -> Result<Self, ServerError> {
        let addr = config.listen_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            game,
            surface: Box::new(NullSurface),
            peers: PeerManager::new(),
            server_tx,
            server_rx,
        })
    }

    pub fn with_surface(mut self, surface: Box<dyn Surface>) -> Self {
        self.surface = surface;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Spawns task that accepts incoming connections
    fn spawn_acceptor(&mut self) -> Option<JoinHandle<()>> {
        let listener = self.listener.take()?;
        let server_tx = self.server_tx.clone();

        Some(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if server_tx
                            .send(ServerMessage::Accepted { stream, addr })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }))
    }

    /// Spawns task that decodes packets from one peer
    fn spawn_reader(&self, reader: OwnedReadHalf, session: u64) -> JoinHandle<()> {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            loop {
                match ClientPacket::read_from(&mut reader).await {
                    Ok(packet) => {
                        if server_tx
                            .send(ServerMessage::PacketReceived { session, packet })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        let error = if e.is_closed() { None } else { Some(e) };
                        let _ = server_tx.send(ServerMessage::Disconnected { session, error });
                        break;
                    }
                }
            }
        })
    }

    /// Spawns task that drains one peer's outbound queue into its socket
    fn spawn_writer(
        mut writer: OwnedWriteHalf,
        mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
        addr: SocketAddr,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(bytes) = outbound.recv().await {
                if let Err(e) = writer.write_all(&bytes).await {
                    warn!("Failed to send to {}: {}", addr, e);
                    break;
                }
            }
            let _ = writer.shutdown().await;
        })
    }

    fn broadcast_packet(&self, packet: &ServerPacket, exclude: Option<u8>) {
        match packet.encode() {
            Ok(bytes) => {
                self.peers.broadcast(&bytes, exclude);
            }
            Err(e) => error!("Failed to encode {:?}: {}", packet, e),
        }
    }

    /// Sends a refusal handshake and closes the connection
    fn refuse(mut stream: TcpStream, addr: SocketAddr) {
        let bytes = match InitPacket::refusal().encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode refusal: {}", e);
                return;
            }
        };
        tokio::spawn(async move {
            if let Err(e) = stream.write_all(&bytes).await {
                debug!("Failed to send refusal to {}: {}", addr, e);
            }
            let _ = stream.shutdown().await;
        });
    }

    /// Admits a new connection: spawns its snake, sends the handshake and
    /// announces it to everyone else.
    fn handle_accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        let id = match self.game.spawn_snake() {
            Ok(id) => id,
            Err(e) => {
                warn!("Refusing connection from {}: {}", addr, e);
                Self::refuse(stream, addr);
                return;
            }
        };

        let Some(init) = self.game.init_packet_for(id) else {
            error!("Spawned snake {} has no cells", id);
            self.game.disconnect(id, self.surface.as_mut());
            return;
        };
        let bytes = match encode_handshake(&init, &self.game.snapshot_for(id)) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to build handshake for {}: {}", addr, e);
                self.game.disconnect(id, self.surface.as_mut());
                return;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", addr, e);
        }
        let (reader, writer) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let session = self.peers.next_session();
        let peer = Peer::new(id, session, addr, outbound_tx);

        let writer = Self::spawn_writer(writer, outbound_rx, addr);
        let reader = self.spawn_reader(reader, session);
        self.peers.add(peer.with_tasks(reader, writer));
        if !self.peers.send_to(id, bytes) {
            warn!("Handshake for peer {} could not be queued", id);
        }

        debug!(
            "Sent handshake to peer {}: {} other snakes, sync offset {}ms",
            id, init.alive_count, init.sync_offset_ms
        );
        self.broadcast_packet(
            &ServerPacket::Connection {
                id,
                start: init.start(),
            },
            Some(id),
        );

        self.game.show_snake(id, self.surface.as_mut());
        self.surface.refresh();
    }

    /// Processes a packet from a connected peer
    fn handle_packet(&mut self, session: u64, packet: ClientPacket) {
        let Some(id) = self.peers.id_of(session) else {
            debug!("Dropping {:?} from closed session {}", packet, session);
            return;
        };

        match packet {
            ClientPacket::Direction { direction } => {
                if self.game.set_direction(id, direction) {
                    debug!("Snake {} turned {:?}", id, direction);
                    self.broadcast_packet(&ServerPacket::Direction { id, direction }, Some(id));
                } else {
                    debug!("Ignored turn {:?} for snake {}", direction, id);
                }
            }

            ClientPacket::Loss { id: claimed } => {
                if claimed != id {
                    warn!("Peer {} reported loss for snake {}", id, claimed);
                }
                if self.game.release(id, self.surface.as_mut()) {
                    info!("Snake {} lost", id);
                    self.surface.refresh();
                    self.broadcast_packet(&ServerPacket::Loss { id }, Some(id));
                }
            }

            ClientPacket::Quit { id: claimed } => {
                if claimed != id {
                    warn!("Peer {} quit as snake {}", id, claimed);
                }
                self.teardown(session);
            }
        }
    }

    /// Removes a peer: frees its snake, closes its socket and tells the rest.
    fn teardown(&mut self, session: u64) {
        let Some(peer) = self.peers.remove(session) else {
            return;
        };
        let id = peer.id;
        peer.hang_up();

        self.game.disconnect(id, self.surface.as_mut());
        self.surface.refresh();
        self.broadcast_packet(&ServerPacket::Quit { id }, Some(id));
    }

    fn handle_command(&mut self, command: LocalCommand) -> bool {
        match command {
            LocalCommand::Key(key) => {
                if let Some(direction) = direction_for_key(key) {
                    self.steer(direction);
                }
                true
            }
            LocalCommand::Quit => false,
        }
    }

    /// Turns the server's own snake and tells every peer
    fn steer(&mut self, direction: Direction) {
        if self.game.steer_local(direction) {
            let id = self.game.local_id();
            self.broadcast_packet(&ServerPacket::Direction { id, direction }, None);
        }
    }

    fn handle_tick(&mut self) {
        for event in self.game.tick(self.surface.as_mut()) {
            match event {
                TickEvent::LocalLoss { id } => {
                    info!("Server snake {} lost", id);
                    self.broadcast_packet(&ServerPacket::Loss { id }, Some(id));
                }
                TickEvent::AppleMoved { eaten_by, apple } => {
                    debug!("Snake {} ate the apple, new apple at {:?}", eaten_by, apple);
                    self.broadcast_packet(&ServerPacket::Apple { apple }, None);
                }
            }
        }

        if self.game.tick_count() % 50 == 0 && !self.peers.is_empty() {
            debug!(
                "Tick {}: {} peers, {} live snakes",
                self.game.tick_count(),
                self.peers.len(),
                self.game.arena.live_count()
            );
        }
    }

    /// Main server loop coordinating connections, keys and ticks
    ///
    /// Runs until a quit command arrives or the command channel closes, then
    /// notifies every peer and closes their sockets.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<LocalCommand>,
    ) -> Result<(), ServerError> {
        let acceptor = self.spawn_acceptor();

        self.game.draw_board(self.surface.as_mut());

        let mut tick_interval = interval(self.game.tick_delay());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Accepted { stream, addr }) => {
                            self.handle_accept(stream, addr);
                        }
                        Some(ServerMessage::PacketReceived { session, packet }) => {
                            self.handle_packet(session, packet);
                        }
                        Some(ServerMessage::Disconnected { session, error }) => {
                            if let Some(e) = error {
                                warn!("Dropping session {}: {}", session, e);
                            }
                            self.teardown(session);
                        }
                        // The loop holds a sender itself
                        None => break,
                    }
                },

                // Handle local keys
                command = commands.recv() => {
                    match command {
                        Some(command) => {
                            if !self.handle_command(command) {
                                break;
                            }
                        }
                        None => break,
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    self.handle_tick();
                },
            }
        }

        if let Some(acceptor) = acceptor {
            acceptor.abort();
        }
        self.shutdown().await;
        Ok(())
    }

    /// Broadcasts Quit for the server and closes every peer socket
    pub async fn shutdown(&mut self) {
        info!("Server shutting down");
        self.broadcast_packet(&ServerPacket::Quit { id: self.game.local_id() }, None);

        let writers: Vec<JoinHandle<()>> = self
            .peers
            .drain()
            .into_iter()
            .filter_map(Peer::hang_up)
            .collect();

        for writer in writers {
            if tokio::time::timeout(SHUTDOWN_GRACE, writer).await.is_err() {
                debug!("Writer did not flush before shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::config::Role;
    use shared::protocol::{MAGIC_CONNECTION, MAGIC_QUIT};
    use shared::{Cell, SnakeState, DEFAULT_SNAKE_LENGTH, SPAWN_COLUMN};
    use tokio::io::AsyncReadExt;

    /// Server with the apple parked away from every snake's path
    async fn test_server() -> Server {
        let mut game = GameState::server(Duration::from_millis(1000)).unwrap();
        game.set_apple(Cell::new(90, 30), &mut NullSurface);
        Server::with_game(&local_config(), game).await.unwrap()
    }

    fn local_config() -> Config {
        let mut config = Config::new(Role::Server);
        config.host = Some("127.0.0.1".to_string());
        config.port = 0;
        config.tick_delay_ms = 1000;
        config
    }

    #[test]
    fn test_server_message_creation() {
        let msg = ServerMessage::PacketReceived {
            session: 7,
            packet: ClientPacket::Direction {
                direction: Direction::Left,
            },
        };

        match msg {
            ServerMessage::PacketReceived { session, packet } => {
                assert_eq!(session, 7);
                assert_eq!(
                    packet,
                    ClientPacket::Direction {
                        direction: Direction::Left
                    }
                );
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[tokio::test]
    async fn test_bind_reports_address() {
        let server = Server::bind(&local_config()).await.unwrap();

        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.game().arena.live_count(), 1);
        assert!(server.game().is_authoritative());
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = local_config();
        config.port = taken.local_addr().unwrap().port();

        match Server::bind(&config).await {
            Err(ServerError::Bind { addr, .. }) => {
                assert_eq!(addr, format!("127.0.0.1:{}", config.port));
            }
            Err(e) => panic!("Unexpected error {}", e),
            Ok(_) => panic!("Bind should have failed"),
        }
    }

    #[tokio::test]
    async fn test_handshake_and_shutdown() {
        let server = test_server().await;
        let addr = server.local_addr();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(server.run(commands_rx));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let init = InitPacket::read_from(&mut stream).await.unwrap();
        assert_eq!(init.new_id, 1);
        assert_eq!(init.alive_count, 1);
        assert_eq!(init.start(), Cell::new(SPAWN_COLUMN + 1, 0));
        assert_eq!(init.tick_delay_ms, 1000);

        let server_snake = SnakeState::read_from(&mut stream).await.unwrap();
        assert_eq!(server_snake.id, 0);
        assert_eq!(server_snake.cells.len(), DEFAULT_SNAKE_LENGTH as usize);

        commands_tx.send(LocalCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, vec![MAGIC_QUIT, 0]);
    }

    #[tokio::test]
    async fn test_second_peer_announced_to_first() {
        let server = test_server().await;
        let addr = server.local_addr();
        let (_commands_tx, commands_rx) = mpsc::unbounded_channel();
        tokio::spawn(server.run(commands_rx));

        let mut first = TcpStream::connect(addr).await.unwrap();
        let init = InitPacket::read_from(&mut first).await.unwrap();
        for _ in 0..init.alive_count {
            SnakeState::read_from(&mut first).await.unwrap();
        }

        let mut second = TcpStream::connect(addr).await.unwrap();
        let init = InitPacket::read_from(&mut second).await.unwrap();
        assert_eq!(init.new_id, 2);
        assert_eq!(init.alive_count, 2);

        let mut announce = [0u8; 6];
        first.read_exact(&mut announce).await.unwrap();
        assert_eq!(announce[0], MAGIC_CONNECTION);
        assert_eq!(announce[1], 2);
        assert_eq!(u16::from_be_bytes([announce[2], announce[3]]), SPAWN_COLUMN + 2);
        assert_eq!(u16::from_be_bytes([announce[4], announce[5]]), 0);
    }
}
