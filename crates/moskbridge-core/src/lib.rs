//! `moskbridge-core` – Mapping & Retargeting
//!
//! Everything between a joint name on the wire and a transform on a host
//! node.  Nothing in here performs I/O; the session in
//! `moskbridge-middleware` drives these pieces against a
//! [`HostRig`][moskbridge_rig::HostRig].
//!
//! # Modules
//!
//! - [`profile`] – [`ModelProfile`][profile::ModelProfile]: per-rig naming
//!   and pre-transform configuration, with built-in presets.
//! - [`frames`] – [`CalibrationFrame`][frames::CalibrationFrame] capture and
//!   the [`FrameRegistry`][frames::FrameRegistry] that stores them.
//! - [`mapper`] – resolves counterpart joint names to host nodes and builds
//!   the per-session [`JointBinding`][mapper::JointBinding].
//! - [`retarget`] – the frame conversion formulas and the stream drivers
//!   that apply them to a rig.

pub mod frames;
pub mod mapper;
pub mod profile;
pub mod retarget;

pub use frames::{CalibrationFrame, FrameRegistry, FrameSource};
pub use mapper::{AmbiguityPolicy, JointBinding, JointTable, build_mapping, locate_root_offset, resolve};
pub use profile::{ModelProfile, RootOffsetNodes};
pub use retarget::{Capture, Pose, RootContext, RootOffset, StreamReport};
