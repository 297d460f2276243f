//! # Snake Arena Server Library
//!
//! This library provides the hosting side of a networked snake game. The
//! server plays like any other participant, with its own snake (always id 0),
//! but it also owns the apple and admits new players.
//!
//! ## Core Responsibilities
//!
//! ### Connection Multiplexing
//! One listening socket plus one TCP connection per peer. Every connection
//! gets a reader task that decodes client packets and a writer task that
//! drains an outbound byte queue, so a slow peer never stalls the others.
//!
//! ### Admission
//! A new connection gets a freshly spawned snake, the join handshake (init
//! header plus every other live snake), and is announced to the existing
//! peers. When no slot or spawn column is left the connection is refused
//! with an init header carrying id 0, and the server keeps running.
//!
//! ### Relaying
//! Direction changes, losses and quits received from one peer are applied
//! locally and rebroadcast to every other peer, never echoed back.
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! The world state is owned by one loop that selects over network events,
//! local key commands and the tick timer. Network tasks only move bytes, so
//! the world is never touched concurrently and needs no locks.
//!
//! ### Trust-the-Peer Collisions
//! Each participant checks only its own snake for collisions and reports
//! its own loss. The server applies reported losses without verifying them.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! The registry of connected peers, keyed by session handle, with targeted
//! sends and broadcasts that can exclude the originator.
//!
//! ### Network Module (`network`)
//! The server loop: accepting, dispatching, ticking and shutdown.
//!
//! ### Error Module (`error`)
//! Startup and runtime failures of the server.

pub mod client_manager;
pub mod error;
pub mod network;

pub use client_manager::{Peer, PeerManager};
pub use error::ServerError;
pub use network::{Server, ServerMessage};
