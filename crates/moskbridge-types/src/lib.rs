//! `moskbridge-types` – shared vocabulary of the bridge.
//!
//! Joint identifiers, the DoF classification, user-visible status records,
//! the workspace-wide [`BridgeError`], and (in [`protocol`]) the JSON packets
//! exchanged with the counterpart.

pub mod protocol;

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use protocol::{
    CommandObject, IncomingPacket, InterJoint, JointSample, JointSpace, NetCommand,
    OutgoingMessage, OutgoingPacket,
};

/// `Anatom` value the counterpart uses to flag a 6-DoF joint.
pub const ANATOM_SIX_DOF: i64 = 7;

// ────────────────────────────────────────────────────────────────────────────
// JointName
// ────────────────────────────────────────────────────────────────────────────

/// Canonical joint identifier, cheap to clone.
///
/// Borrows as `str`, so maps keyed by `JointName` can be queried with a plain
/// string slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JointName(Arc<str>);

impl JointName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for JointName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for JointName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JointName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for JointName {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DoF
// ────────────────────────────────────────────────────────────────────────────

/// Whether a streamed joint carries rotation only or rotation + translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DofKind {
    ThreeDof,
    SixDof,
}

impl DofKind {
    /// Classify the counterpart's `Anatom` code.  Only
    /// [`ANATOM_SIX_DOF`] marks a 6-DoF joint; anything else (including an
    /// absent code) is rotation-only.
    pub fn from_anatom(anatom: Option<i64>) -> Self {
        match anatom {
            Some(ANATOM_SIX_DOF) => DofKind::SixDof,
            _ => DofKind::ThreeDof,
        }
    }

    pub fn has_translation(self) -> bool {
        matches!(self, DofKind::SixDof)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Status
// ────────────────────────────────────────────────────────────────────────────

/// Severity of a user-visible status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusLevel {
    Success,
    Info,
    Error,
}

/// One line of user-visible status text, published whenever the session
/// changes state or something goes wrong.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: StatusLevel,
    pub message: String,
}

impl Status {
    pub fn new(level: StatusLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(StatusLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(StatusLevel::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(StatusLevel::Error, message)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            StatusLevel::Success => write!(f, "SUCCESS: {}", self.message),
            StatusLevel::Info => write!(f, "{}", self.message),
            StatusLevel::Error => write!(f, "ERROR: {}", self.message),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Every failure the bridge can report.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Malformed Packet: {0}")]
    MalformedPacket(String),

    #[error("Couldn't map joints ({requested} requested). Check the host's namespaces maybe.")]
    EmptyMapping { requested: usize },

    #[error("Host Error on {node}: {details}")]
    Host { node: String, details: String },

    #[error("Calibration missing for mapped joint {0}")]
    MissingCalibration(String),

    #[error("Mosketch is not connected")]
    NotConnected,

    #[error("Connection is already opened")]
    AlreadyConnected,

    #[error("No counterpart uuid for joint {0}")]
    UnknownJointUuid(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}
