//! Binary wire protocol
//!
//! Every message except the join handshake starts with a one-byte magic tag
//! and has a size fully determined by that tag, so no framing is needed on
//! the TCP stream. Bodies are encoded with bincode using fixed-width,
//! big-endian integers, which produces the packed field layout directly.
//!
//! Handshake (server to a joining client, no magic byte):
//! - [`InitPacket`], 14 bytes
//! - `alive_count` × [`SnakeState`]: `id:u8, length:u16, direction:u8`
//!   followed by `length` pairs of `x:u16, y:u16`, tail first
//!
//! After the handshake the client sends [`ClientPacket`]s and the server
//! sends [`ServerPacket`]s. The client form of `Direction` omits the id,
//! which the server knows from the connection.

use bincode::Options;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ProtocolError;
use crate::snake::{Cell, Direction, Snake};

pub const MAGIC_DIRECTION: u8 = 0;
pub const MAGIC_APPLE: u8 = 1;
pub const MAGIC_LOSS: u8 = 2;
pub const MAGIC_CONNECTION: u8 = 3;
pub const MAGIC_QUIT: u8 = 4;

/// `new_id` value the server uses to turn a joining client away
pub const REFUSED_ID: u8 = 0;

pub const INIT_PACKET_SIZE: usize = 14;
const SNAKE_HEADER_SIZE: usize = 4;
const CELL_SIZE: usize = 4;

fn wire() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
}

fn encode_body<T: Serialize>(out: &mut Vec<u8>, body: &T) -> Result<(), ProtocolError> {
    wire().serialize_into(out, body)?;
    Ok(())
}

fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(wire().deserialize(bytes)?)
}

/// Reads exactly `len` bytes, mapping a short read to `Truncated`.
async fn read_body<R>(reader: &mut R, len: usize, kind: &'static str) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    match reader.read_exact(&mut buf).await {
        Ok(_) => Ok(buf),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ProtocolError::Truncated { kind })
        }
        Err(e) => Err(e.into()),
    }
}

/// Reads the leading magic byte; a clean EOF here means the peer left.
async fn read_magic<R>(reader: &mut R) -> Result<u8, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut magic = [0u8; 1];
    match reader.read(&mut magic).await? {
        0 => Err(ProtocolError::Closed),
        _ => Ok(magic[0]),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitPacket {
    pub new_id: u8,
    /// Live snakes that follow in the bulk state, excluding the new one
    pub alive_count: u8,
    pub start_x: u16,
    pub start_y: u16,
    pub apple_x: u16,
    pub apple_y: u16,
    pub tick_delay_ms: u16,
    /// Milliseconds elapsed since the server's last tick
    pub sync_offset_ms: u16,
}

impl InitPacket {
    pub fn refusal() -> Self {
        Self {
            new_id: REFUSED_ID,
            alive_count: 0,
            start_x: 0,
            start_y: 0,
            apple_x: 0,
            apple_y: 0,
            tick_delay_ms: 0,
            sync_offset_ms: 0,
        }
    }

    pub fn is_refusal(&self) -> bool {
        self.new_id == REFUSED_ID
    }

    pub fn start(&self) -> Cell {
        Cell::new(self.start_x, self.start_y)
    }

    pub fn apple(&self) -> Cell {
        Cell::new(self.apple_x, self.apple_y)
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::with_capacity(INIT_PACKET_SIZE);
        encode_body(&mut out, self)?;
        Ok(out)
    }

    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, ProtocolError> {
        let body = read_body(reader, INIT_PACKET_SIZE, "init").await?;
        decode_body(&body)
    }
}

#[derive(Serialize, Deserialize)]
struct SnakeHeader {
    id: u8,
    length: u16,
    direction: u8,
}

/// One entry of the bulk snake state sent during the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnakeState {
    pub id: u8,
    pub direction: Direction,
    /// Tail first
    pub cells: Vec<Cell>,
}

impl SnakeState {
    pub fn from_snake(snake: &Snake) -> Self {
        Self {
            id: snake.id,
            direction: snake.direction,
            cells: snake.cells().collect(),
        }
    }

    pub fn into_snake(self) -> Snake {
        Snake::from_cells(self.id, self.direction, self.cells)
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        let header = SnakeHeader {
            id: self.id,
            length: self.cells.len() as u16,
            direction: self.direction.as_u8(),
        };
        encode_body(out, &header)?;
        for cell in &self.cells {
            encode_body(out, cell)?;
        }
        Ok(())
    }

    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, ProtocolError> {
        let header: SnakeHeader =
            decode_body(&read_body(reader, SNAKE_HEADER_SIZE, "snake state").await?)?;
        let direction = Direction::try_from(header.direction)?;

        let body = read_body(reader, header.length as usize * CELL_SIZE, "snake state").await?;
        let cells = body
            .chunks_exact(CELL_SIZE)
            .map(decode_body::<Cell>)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: header.id,
            direction,
            cells,
        })
    }
}

/// Encodes the full handshake: init packet followed by every bulk entry.
pub fn encode_handshake(init: &InitPacket, snakes: &[SnakeState]) -> Result<Vec<u8>, ProtocolError> {
    let mut out = init.encode()?;
    for snake in snakes {
        snake.encode_into(&mut out)?;
    }
    Ok(out)
}

/// Messages a client sends to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPacket {
    Direction { direction: Direction },
    Loss { id: u8 },
    Quit { id: u8 },
}

impl ClientPacket {
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            ClientPacket::Direction { direction } => vec![MAGIC_DIRECTION, direction.as_u8()],
            ClientPacket::Loss { id } => vec![MAGIC_LOSS, id],
            ClientPacket::Quit { id } => vec![MAGIC_QUIT, id],
        }
    }

    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, ProtocolError> {
        match read_magic(reader).await? {
            MAGIC_DIRECTION => {
                let body = read_body(reader, 1, "direction").await?;
                Ok(ClientPacket::Direction {
                    direction: Direction::try_from(body[0])?,
                })
            }
            MAGIC_LOSS => {
                let body = read_body(reader, 1, "loss").await?;
                Ok(ClientPacket::Loss { id: body[0] })
            }
            MAGIC_QUIT => {
                let body = read_body(reader, 1, "quit").await?;
                Ok(ClientPacket::Quit { id: body[0] })
            }
            other => Err(ProtocolError::UnknownMagic(other)),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ConnectionBody {
    id: u8,
    x: u16,
    y: u16,
}

/// Messages the server sends to clients after the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPacket {
    Direction { id: u8, direction: Direction },
    Apple { apple: Cell },
    Loss { id: u8 },
    /// A new peer joined with a default snake whose tail is at `start`
    Connection { id: u8, start: Cell },
    Quit { id: u8 },
}

impl ServerPacket {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::with_capacity(6);
        match *self {
            ServerPacket::Direction { id, direction } => {
                out.extend_from_slice(&[MAGIC_DIRECTION, id, direction.as_u8()]);
            }
            ServerPacket::Apple { apple } => {
                out.push(MAGIC_APPLE);
                encode_body(&mut out, &apple)?;
            }
            ServerPacket::Loss { id } => out.extend_from_slice(&[MAGIC_LOSS, id]),
            ServerPacket::Connection { id, start } => {
                out.push(MAGIC_CONNECTION);
                encode_body(
                    &mut out,
                    &ConnectionBody {
                        id,
                        x: start.x,
                        y: start.y,
                    },
                )?;
            }
            ServerPacket::Quit { id } => out.extend_from_slice(&[MAGIC_QUIT, id]),
        }
        Ok(out)
    }

    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, ProtocolError> {
        match read_magic(reader).await? {
            MAGIC_DIRECTION => {
                let body = read_body(reader, 2, "direction").await?;
                Ok(ServerPacket::Direction {
                    id: body[0],
                    direction: Direction::try_from(body[1])?,
                })
            }
            MAGIC_APPLE => {
                let apple: Cell = decode_body(&read_body(reader, CELL_SIZE, "apple").await?)?;
                Ok(ServerPacket::Apple { apple })
            }
            MAGIC_LOSS => {
                let body = read_body(reader, 1, "loss").await?;
                Ok(ServerPacket::Loss { id: body[0] })
            }
            MAGIC_CONNECTION => {
                let body: ConnectionBody =
                    decode_body(&read_body(reader, 5, "connection").await?)?;
                Ok(ServerPacket::Connection {
                    id: body.id,
                    start: Cell::new(body.x, body.y),
                })
            }
            MAGIC_QUIT => {
                let body = read_body(reader, 1, "quit").await?;
                Ok(ServerPacket::Quit { id: body[0] })
            }
            other => Err(ProtocolError::UnknownMagic(other)),
        }
    }
}
