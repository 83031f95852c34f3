//! Counterpart wire protocol.
//!
//! Every message is one JSON value per line.  Inbound, the counterpart sends
//! `Hierarchy`, `JointsStream` and `JointsUuids` objects; the decoder also
//! accepts any of them wrapped in a single-element array.  Outbound, the
//! bridge sends plain packet objects ([`OutgoingPacket`]) and commands
//! ([`NetCommand`]), the latter always wrapped in a single-element array so
//! the counterpart can buffer them.
//!
//! ```text
//! {"Type":"Hierarchy","Joints":["Root_M","Spine1_M"]}
//! {"Type":"JointsStream","Joints":[{"Name":"Root_M","LR":[0,0,0,1],"LT":[0,1,0],"Anatom":7}]}
//! [{"Type":"NetCommand","object":"scene","command":"setStreamingJointSpace","parameters":{"jointSpace":"Local"}}]
//! ```

use std::collections::BTreeMap;
use std::fmt;

use moskbridge_math::{Quaternion, Vec3};
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};

use crate::{BridgeError, DofKind, JointName};

const KNOWN_INCOMING: [&str; 3] = ["Hierarchy", "JointsStream", "JointsUuids"];

// ────────────────────────────────────────────────────────────────────────────
// Joint samples
// ────────────────────────────────────────────────────────────────────────────

/// Pose of one joint inside a `JointsStream` packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    #[serde(rename = "Name")]
    pub name: JointName,
    /// Local rotation, `[x, y, z, w]`.
    #[serde(rename = "LR")]
    pub rotation: Quaternion,
    /// Local translation in canonical metres.
    #[serde(rename = "LT", default)]
    pub translation: Vec3,
    /// Anatomical code; `7` marks a six-DoF joint.  Sent as `7` or `7.0`.
    #[serde(
        rename = "Anatom",
        default,
        deserialize_with = "anatom_code",
        skip_serializing_if = "Option::is_none"
    )]
    pub anatom: Option<i64>,
}

fn anatom_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(code) = number.as_i64() {
        return Ok(Some(code));
    }
    match number.as_f64() {
        Some(v) if v.fract() == 0.0 && v.abs() <= i64::MAX as f64 => Ok(Some(v as i64)),
        _ => Err(de::Error::custom(format!(
            "Anatom must be an integral number, got {number}"
        ))),
    }
}

impl JointSample {
    pub fn new(name: impl Into<JointName>, rotation: Quaternion, translation: Vec3) -> Self {
        Self {
            name: name.into(),
            rotation,
            translation,
            anatom: None,
        }
    }

    pub fn with_anatom(mut self, anatom: i64) -> Self {
        self.anatom = Some(anatom);
        self
    }

    pub fn dof(&self) -> DofKind {
        DofKind::from_anatom(self.anatom)
    }
}

/// Entry of an `InterJoints` packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterJoint {
    #[serde(rename = "Name")]
    pub name: JointName,
}

// ────────────────────────────────────────────────────────────────────────────
// Inbound
// ────────────────────────────────────────────────────────────────────────────

/// Packets the counterpart sends to the bridge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "Type")]
pub enum IncomingPacket {
    /// Declares the canonical joint names; triggers a full mapping rebuild.
    Hierarchy {
        #[serde(rename = "Joints")]
        joints: Vec<JointName>,
    },
    /// One pose frame.
    JointsStream {
        #[serde(rename = "Joints")]
        joints: Vec<JointSample>,
    },
    /// Joint name → counterpart identifier, one single-key object per joint.
    JointsUuids {
        #[serde(rename = "Joints")]
        joints: Vec<BTreeMap<String, String>>,
    },
}

impl IncomingPacket {
    /// Decode one received line.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::MalformedPacket`] for non-JSON input, a missing
    /// or unknown `Type`, or a packet whose fields do not match its type.
    pub fn decode(line: &str) -> Result<Self, BridgeError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| BridgeError::MalformedPacket(format!("received a non-JSON object: {e}")))?;

        let value = match value {
            Value::Array(mut items) if items.len() == 1 => items.remove(0),
            Value::Array(items) => {
                return Err(BridgeError::MalformedPacket(format!(
                    "expected a single packet, got an array of {}",
                    items.len()
                )));
            }
            other => other,
        };

        let kind = value
            .get("Type")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::MalformedPacket("missing \"Type\" key".to_string()))?
            .to_string();
        if !KNOWN_INCOMING.contains(&kind.as_str()) {
            return Err(BridgeError::MalformedPacket(format!(
                "unknown data type received: {kind}"
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| BridgeError::MalformedPacket(format!("{kind}: {e}")))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IncomingPacket::Hierarchy { .. } => "Hierarchy",
            IncomingPacket::JointsStream { .. } => "JointsStream",
            IncomingPacket::JointsUuids { .. } => "JointsUuids",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Outbound packets
// ────────────────────────────────────────────────────────────────────────────

/// Packets the bridge sends as plain JSON objects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Type")]
pub enum OutgoingPacket {
    /// Hierarchy mapped; the counterpart may start streaming.
    AckHierarchyInitialized,
    /// A `JointsStream` frame was processed.
    JointsStreamAck,
    /// Host pose pushed to the counterpart.
    JointsStream {
        #[serde(rename = "Joints")]
        joints: Vec<JointSample>,
    },
    /// Joints the counterpart should treat as non-sketchable.
    InterJoints {
        #[serde(rename = "Joints")]
        joints: Vec<InterJoint>,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Commands
// ────────────────────────────────────────────────────────────────────────────

/// Target object of a [`NetCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandObject {
    Scene,
    Joint,
}

/// Space in which the counterpart streams joint transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JointSpace {
    #[default]
    Local,
    World,
}

impl fmt::Display for JointSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JointSpace::Local => write!(f, "Local"),
            JointSpace::World => write!(f, "World"),
        }
    }
}

/// A counterpart command: `{"Type":"NetCommand","object":..,"command":..,"parameters":{..}}`.
///
/// `parameters` is always a JSON object and every value in it is a string,
/// including numbers and booleans (`"1"`, `"true"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type", rename = "NetCommand")]
pub struct NetCommand {
    pub object: CommandObject,
    pub command: String,
    pub parameters: Map<String, Value>,
}

fn flag(on: bool) -> String {
    let value = if on { "1" } else { "0" };
    value.to_string()
}

impl NetCommand {
    fn new(object: CommandObject, command: &str, params: &[(&str, String)]) -> Self {
        let parameters = params
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
            .collect();
        Self {
            object,
            command: command.to_string(),
            parameters,
        }
    }

    /// `orient_mode` is `0` or `1`.
    pub fn set_streaming_joint_orient_mode(orient_mode: u8) -> Self {
        Self::new(
            CommandObject::Scene,
            "setStreamingJointOrientMode",
            &[("jointOrientMode", orient_mode.to_string())],
        )
    }

    pub fn set_streaming_joint_space(space: JointSpace) -> Self {
        Self::new(
            CommandObject::Scene,
            "setStreamingJointSpace",
            &[("jointSpace", space.to_string())],
        )
    }

    pub fn set_wireframe_visibility(visible: bool) -> Self {
        Self::new(
            CommandObject::Scene,
            "setWireframeVisibility",
            &[("visible", visible.to_string())],
        )
    }

    pub fn set_sketchable(uuid: &str, sketchable: bool) -> Self {
        Self::new(
            CommandObject::Joint,
            "setSketchable",
            &[("uuid", uuid.to_string()), ("sketchable", sketchable.to_string())],
        )
    }

    pub fn select_by_uuid(uuid: &str, erase_group: bool, toggle_if_selected: bool) -> Self {
        Self::new(
            CommandObject::Scene,
            "selectByUuid",
            &[
                ("uuid", uuid.to_string()),
                ("eraseGroup", flag(erase_group)),
                ("toggleIfSelected", flag(toggle_if_selected)),
            ],
        )
    }

    /// Attach position effectors to the currently selected joints.
    pub fn attach_num_ik_effector() -> Self {
        Self::new(CommandObject::Scene, "attachNumIKEffector", &[])
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Encoding
// ────────────────────────────────────────────────────────────────────────────

/// Anything the bridge writes to the counterpart.
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingMessage {
    Packet(OutgoingPacket),
    Command(NetCommand),
}

impl OutgoingMessage {
    /// Serialise to a single JSON line (without the trailing newline).
    pub fn encode(&self) -> Result<String, BridgeError> {
        let encoded = match self {
            OutgoingMessage::Packet(packet) => serde_json::to_string(packet),
            OutgoingMessage::Command(command) => serde_json::to_string(&[command]),
        };
        encoded.map_err(|e| BridgeError::MalformedPacket(format!("encode failed: {e}")))
    }

    /// Short label for logs.
    pub fn label(&self) -> &str {
        match self {
            OutgoingMessage::Packet(OutgoingPacket::AckHierarchyInitialized) => {
                "AckHierarchyInitialized"
            }
            OutgoingMessage::Packet(OutgoingPacket::JointsStreamAck) => "JointsStreamAck",
            OutgoingMessage::Packet(OutgoingPacket::JointsStream { .. }) => "JointsStream",
            OutgoingMessage::Packet(OutgoingPacket::InterJoints { .. }) => "InterJoints",
            OutgoingMessage::Command(command) => &command.command,
        }
    }
}

impl From<OutgoingPacket> for OutgoingMessage {
    fn from(packet: OutgoingPacket) -> Self {
        OutgoingMessage::Packet(packet)
    }
}

impl From<NetCommand> for OutgoingMessage {
    fn from(command: NetCommand) -> Self {
        OutgoingMessage::Command(command)
    }
}
