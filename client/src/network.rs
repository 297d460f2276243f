use crate::error::SessionError;
use log::{debug, error, info, warn};
use shared::input::direction_for_key;
use shared::{
    ClientPacket, GameState, InitPacket, LocalCommand, NullSurface, ProtocolError, ServerPacket,
    Snake, SnakeState, Surface, TickEvent, DEFAULT_SNAKE_LENGTH,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// How a session ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The local player asked to leave
    Quit,
    /// The server shut down or closed the connection
    ServerClosed,
}

pub struct Client {
    reader: Option<BufReader<OwnedReadHalf>>,
    reader_task: Option<JoinHandle<()>>,
    writer: OwnedWriteHalf,
    server_addr: SocketAddr,

    game: GameState,
    surface: Box<dyn Surface>,
}

impl Client {
    /// Joins a server and mirrors its world.
    ///
    /// Blocks for the init header and every bulk snake entry, then sleeps
    /// until the server's next tick boundary so both sides tick together.
    pub async fn connect(server_addr: &str) -> Result<Self, SessionError> {
        info!("Connecting to server at {}...", server_addr);

        let stream = TcpStream::connect(server_addr)
            .await
            .map_err(|source| SessionError::Connect {
                addr: server_addr.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let init = InitPacket::read_from(&mut reader).await?;
        if init.is_refusal() {
            warn!("Server at {} refused the connection", peer_addr);
            return Err(SessionError::Refused);
        }

        let mut game = GameState::client(&init)?;
        for _ in 0..init.alive_count {
            let state = SnakeState::read_from(&mut reader).await?;
            game.insert_snake(state.into_snake())?;
        }
        info!(
            "Connected! Snake id {}, {} other snakes, tick {}ms",
            init.new_id, init.alive_count, init.tick_delay_ms
        );

        let wait = game
            .tick_delay()
            .saturating_sub(Duration::from_millis(init.sync_offset_ms as u64));
        debug!("Waiting {:?} for the next tick boundary", wait);
        sleep(wait).await;

        Ok(Client {
            reader: Some(reader),
            reader_task: None,
            writer,
            server_addr: peer_addr,
            game,
            surface: Box::new(NullSurface),
        })
    }

    pub fn with_surface(mut self, surface: Box<dyn Surface>) -> Self {
        self.surface = surface;
        self
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    async fn send_packet(&mut self, packet: ClientPacket) -> Result<(), SessionError> {
        self.writer.write_all(&packet.encode()).await?;
        Ok(())
    }

    /// Spawns task that decodes packets from the server
    fn spawn_reader(
        &mut self,
    ) -> Option<mpsc::UnboundedReceiver<Result<ServerPacket, ProtocolError>>> {
        let mut reader = self.reader.take()?;
        let (tx, rx) = mpsc::unbounded_channel();

        self.reader_task = Some(tokio::spawn(async move {
            loop {
                let result = ServerPacket::read_from(&mut reader).await;
                let failed = result.is_err();
                if tx.send(result).is_err() || failed {
                    break;
                }
            }
        }));

        Some(rx)
    }

    /// Stops decoding server packets
    fn stop_reader(&self) {
        if let Some(task) = &self.reader_task {
            task.abort();
        }
    }

    /// Applies a server packet to the local mirror.
    ///
    /// Returns the session end when the server announces its own departure.
    fn handle_packet(&mut self, packet: ServerPacket) -> Option<SessionEnd> {
        let surface = self.surface.as_mut();

        match packet {
            ServerPacket::Direction { id, direction } => {
                if !self.game.set_direction(id, direction) {
                    debug!("Ignored turn {:?} for snake {}", direction, id);
                }
            }

            ServerPacket::Apple { apple } => {
                self.game.set_apple(apple, surface);
            }

            ServerPacket::Loss { id } => {
                if self.game.release(id, surface) {
                    info!("Snake {} lost", id);
                }
            }

            ServerPacket::Connection { id, start } => {
                let snake = Snake::vertical(id, start, DEFAULT_SNAKE_LENGTH);
                match self.game.insert_snake(snake) {
                    Ok(()) => {
                        info!("Snake {} joined at {:?}", id, start);
                        self.game.show_snake(id, surface);
                    }
                    Err(e) => warn!("Could not add snake {}: {}", id, e),
                }
            }

            ServerPacket::Quit { id } => {
                if id == 0 {
                    info!("Server is shutting down");
                    return Some(SessionEnd::ServerClosed);
                }
                info!("Snake {} quit", id);
                self.game.disconnect(id, surface);
            }
        }

        self.surface.refresh();
        None
    }

    /// Returns false when the player asked to leave
    async fn handle_command(&mut self, command: LocalCommand) -> Result<bool, SessionError> {
        match command {
            LocalCommand::Key(key) => {
                if let Some(direction) = direction_for_key(key) {
                    if self.game.steer_local(direction) {
                        self.send_packet(ClientPacket::Direction { direction }).await?;
                    }
                }
                Ok(true)
            }
            LocalCommand::Quit => Ok(false),
        }
    }

    async fn handle_tick(&mut self) -> Result<(), SessionError> {
        for event in self.game.tick(self.surface.as_mut()) {
            match event {
                TickEvent::LocalLoss { id } => {
                    info!("Our snake {} lost, spectating", id);
                    self.send_packet(ClientPacket::Loss { id }).await?;
                }
                TickEvent::AppleMoved { .. } => {
                    warn!("Apple moved on a mirror, ignoring");
                }
            }
        }
        Ok(())
    }

    /// Runs the session until the player quits or the server goes away.
    ///
    /// The client keeps ticking after its own snake died, so the player can
    /// watch the rest of the game.
    pub async fn run(
        mut self,
        commands: mpsc::UnboundedReceiver<LocalCommand>,
    ) -> Result<SessionEnd, SessionError> {
        let result = self.play(commands).await;
        self.stop_reader();
        result
    }

    async fn play(
        &mut self,
        mut commands: mpsc::UnboundedReceiver<LocalCommand>,
    ) -> Result<SessionEnd, SessionError> {
        let Some(mut inbound) = self.spawn_reader() else {
            return Ok(SessionEnd::ServerClosed);
        };

        self.game.draw_board(self.surface.as_mut());

        let mut tick_interval = interval(self.game.tick_delay());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let end = loop {
            tokio::select! {
                packet = inbound.recv() => {
                    match packet {
                        Some(Ok(packet)) => {
                            if let Some(end) = self.handle_packet(packet) {
                                break end;
                            }
                        }
                        Some(Err(e)) if e.is_closed() => {
                            info!("Server {} closed the connection", self.server_addr);
                            break SessionEnd::ServerClosed;
                        }
                        Some(Err(e)) => {
                            error!("Lost sync with server: {}", e);
                            return Err(e.into());
                        }
                        None => break SessionEnd::ServerClosed,
                    }
                },

                command = commands.recv() => {
                    match command {
                        Some(command) => {
                            if !self.handle_command(command).await? {
                                break SessionEnd::Quit;
                            }
                        }
                        None => break SessionEnd::Quit,
                    }
                },

                _ = tick_interval.tick() => {
                    self.handle_tick().await?;
                },
            }
        };

        if end == SessionEnd::Quit {
            self.quit().await?;
        }
        Ok(end)
    }

    /// Tells the server we are leaving and closes the socket
    pub async fn quit(&mut self) -> Result<(), SessionError> {
        self.stop_reader();
        let id = self.game.local_id();
        info!("Leaving {} as snake {}", self.server_addr, id);
        self.send_packet(ClientPacket::Quit { id }).await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}
