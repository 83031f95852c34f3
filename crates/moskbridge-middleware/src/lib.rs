//! `moskbridge-middleware` – Session & Transport
//!
//! Glue between the counterpart socket, the host rig and the shell.
//!
//! # Modules
//!
//! - [`bus`] – [`StatusBus`][bus::StatusBus]: broadcast channel carrying
//!   user-visible status lines.
//! - [`session`] – [`Session`][session::Session]: the connection state
//!   machine; owns the joint binding, root offset and uuid table.
//! - [`connection`] – [`Bridge`][connection::Bridge]: the tokio task that
//!   owns the session and rig, reads newline-delimited JSON from the
//!   counterpart and serves [`ShellRequest`][connection::ShellRequest]s.

pub mod bus;
pub mod connection;
pub mod session;

pub use bus::{StatusBus, StatusReceiver};
pub use connection::{Bridge, BridgeHandle, DEFAULT_HOST, DEFAULT_PORT, ShellRequest};
pub use session::{Reply, Session, SessionSettings, SessionState};
