//! # Snake Arena Client Library
//!
//! This library joins a running arena server and keeps a local mirror of its
//! world in step with it.
//!
//! ## Architecture Overview
//!
//! ### Join Handshake
//! On connect the server sends an init header (our snake id, its start cell,
//! the apple, the tick delay and how far into the current tick it is)
//! followed by every other live snake. The client rebuilds all of them,
//! then sleeps out the rest of the server's tick so both sides tick on the
//! same boundaries from then on.
//!
//! ### Lockstep Mirror
//! Every participant runs the same tick rules. The client collision-checks
//! only its own snake and reports its loss to the server; everything else
//! it learns from relayed direction, apple, loss, connection and quit
//! packets. After its own snake dies the client keeps running as a
//! spectator.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! The session: connecting, the handshake, the inbound packet loop, local
//! key handling and ticking.
//!
//! ### Error Module (`error`)
//! Connection, refusal and protocol failures of a session.

pub mod error;
pub mod network;

pub use error::SessionError;
pub use network::{Client, SessionEnd};
