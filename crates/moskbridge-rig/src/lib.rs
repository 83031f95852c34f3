//! `moskbridge-rig` – the host scene graph, seen from the bridge.
//!
//! The bridge never owns the host's nodes.  It talks to the host exclusively
//! through the [`HostRig`][host::HostRig] trait, so any 3D application can be
//! plugged in without touching the retargeting code.
//!
//! # Modules
//!
//! - [`host`] – [`HostRig`][host::HostRig], [`NodeHandle`][host::NodeHandle]
//!   and [`NodeKind`][host::NodeKind]: the collaborator interface.
//! - [`sim`] – [`SimRig`][sim::SimRig]: an in-memory scene for tests and for
//!   running the bridge without a host application, loadable from TOML.

pub mod host;
pub mod sim;

pub use host::{HostRig, NodeHandle, NodeKind};
pub use sim::{SimNode, SimRig};
