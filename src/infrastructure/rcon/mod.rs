//! Remote console (Source RCON) client and the restart countdown built on it

pub mod announcer;
pub mod client;

pub use announcer::{run_sequence, RconRestartAnnouncer};
pub use client::{Packet, RconClient, RconError};
