//! Session/protocol state machine.
//!
//! A [`Session`] owns everything a connection learns: the joint binding, the
//! root pre-transform and the counterpart's joint uuids.  It performs no I/O.
//! Each entry point takes the host rig by reference and returns a [`Reply`]
//! listing the messages the transport must write and whether it must close
//! the socket afterwards.
//!
//! ```text
//! Disconnected ──begin_connect──▶ Connecting ──on_connected──▶ AwaitingHierarchy
//!      ▲                                                          │ Hierarchy
//!      │ close / transport error / empty mapping                  ▼
//!      └──────────────────────────────────────────────────── Streaming ◀─┐
//!                                                                 └──────┘ Hierarchy (re-init)
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use moskbridge_core::{
    AmbiguityPolicy, JointBinding, ModelProfile, RootOffset, build_mapping, locate_root_offset,
    retarget,
};
use moskbridge_rig::HostRig;
use moskbridge_types::{
    BridgeError, IncomingPacket, InterJoint, JointName, JointSample, JointSpace, NetCommand,
    OutgoingMessage, OutgoingPacket,
};
use tracing::{debug, info, warn};

use crate::bus::StatusBus;

const NOT_CONNECTED: &str = "Mosketch is not connected!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingHierarchy,
    Streaming,
}

impl SessionState {
    /// `true` once the socket is up, with or without a hierarchy.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::AwaitingHierarchy | Self::Streaming)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::AwaitingHierarchy => write!(f, "awaiting hierarchy"),
            Self::Streaming => write!(f, "streaming"),
        }
    }
}

/// Choices fixed for the lifetime of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub profile: ModelProfile,
    pub joint_space: JointSpace,
    pub ambiguity: AmbiguityPolicy,
}

/// What the transport must do after a session call.
#[derive(Debug, Default, PartialEq)]
pub struct Reply {
    /// Messages to write, in order.
    pub messages: Vec<OutgoingMessage>,
    /// Close the socket once `messages` are flushed.
    pub close: bool,
}

impl Reply {
    fn send(messages: Vec<OutgoingMessage>) -> Self {
        Self {
            messages,
            close: false,
        }
    }

    fn close() -> Self {
        Self {
            messages: Vec::new(),
            close: true,
        }
    }
}

pub struct Session {
    state: SessionState,
    settings: SessionSettings,
    bus: Arc<StatusBus>,
    endpoint: String,
    binding: JointBinding,
    root: Option<RootOffset>,
    uuids: BTreeMap<JointName, String>,
}

impl Session {
    pub fn new(settings: SessionSettings, bus: Arc<StatusBus>) -> Self {
        Self {
            state: SessionState::Disconnected,
            settings,
            bus,
            endpoint: String::new(),
            binding: JointBinding::default(),
            root: None,
            uuids: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn status_bus(&self) -> &Arc<StatusBus> {
        &self.bus
    }

    pub fn binding(&self) -> &JointBinding {
        &self.binding
    }

    pub fn root_offset(&self) -> Option<&RootOffset> {
        self.root.as_ref()
    }

    pub fn uuid_of(&self, name: &str) -> Option<&str> {
        self.uuids.get(name).map(String::as_str)
    }

    pub fn uuid_count(&self) -> usize {
        self.uuids.len()
    }

    fn clear_mapping(&mut self) {
        self.binding.clear();
        self.root = None;
    }

    /// Mapping plus uuids; the uuid table outlives hierarchies and only
    /// goes away with the connection.
    fn clear_tables(&mut self) {
        self.clear_mapping();
        self.uuids.clear();
    }

    fn require_connected(&self) -> Result<(), BridgeError> {
        if self.state.is_connected() {
            Ok(())
        } else {
            self.bus.error(NOT_CONNECTED);
            Err(BridgeError::NotConnected)
        }
    }

    // ── connection lifecycle ────────────────────────────────────────────────

    /// Start connecting to `endpoint`.  Refused unless disconnected.
    pub fn begin_connect(&mut self, endpoint: &str) -> Result<(), BridgeError> {
        if self.state != SessionState::Disconnected {
            self.bus.error("connection is already opened.");
            return Err(BridgeError::AlreadyConnected);
        }
        self.endpoint = endpoint.to_string();
        self.state = SessionState::Connecting;
        info!(endpoint, profile = %self.settings.profile.name, "connecting");
        self.bus.success(format!("Connecting to {endpoint}"));
        Ok(())
    }

    pub fn on_connected(&mut self) {
        if self.state != SessionState::Connecting {
            warn!(state = %self.state, "connected notification out of sequence");
            return;
        }
        self.state = SessionState::AwaitingHierarchy;
        self.bus
            .success(format!("connection opened on {}", self.endpoint));
    }

    /// Close the session.  Safe in any state; a second call is a no-op.
    pub fn close(&mut self) -> Reply {
        if self.state == SessionState::Disconnected {
            self.bus.info("connection is already closed.");
            return Reply::default();
        }
        self.state = SessionState::Disconnected;
        self.clear_tables();
        self.bus
            .success(format!("connection closed on {}", self.endpoint));
        Reply::close()
    }

    /// The peer closed the socket.
    pub fn on_disconnected(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.state = SessionState::Disconnected;
        self.clear_tables();
        self.bus
            .success(format!("connection closed on {}", self.endpoint));
    }

    pub fn on_transport_error(&mut self, error: &BridgeError) {
        warn!(error = %error, "transport failure");
        self.state = SessionState::Disconnected;
        self.clear_tables();
        self.bus.error(error.to_string());
    }

    // ── inbound packets ─────────────────────────────────────────────────────

    /// Decode and dispatch one received line.
    pub fn handle_line(&mut self, rig: &mut dyn HostRig, line: &str) -> Reply {
        if line.trim().is_empty() {
            return Reply::default();
        }
        match IncomingPacket::decode(line) {
            Ok(packet) => self.handle_packet(rig, packet),
            Err(e) => {
                self.on_malformed(&e);
                Reply::default()
            }
        }
    }

    /// Report a packet that could not be decoded.  The session stays up.
    pub fn on_malformed(&self, error: &BridgeError) {
        warn!(error = %error, "dropping malformed packet");
        self.bus.error(error.to_string());
    }

    pub fn handle_packet(&mut self, rig: &mut dyn HostRig, packet: IncomingPacket) -> Reply {
        if !self.state.is_connected() {
            debug!(kind = packet.kind(), state = %self.state, "packet ignored");
            return Reply::default();
        }
        match packet {
            IncomingPacket::Hierarchy { joints } => self.on_hierarchy(rig, &joints),
            IncomingPacket::JointsStream { joints } => self.on_stream(rig, &joints),
            IncomingPacket::JointsUuids { joints } => {
                self.on_uuids(&joints);
                Reply::default()
            }
        }
    }

    /// Rebuild the mapping from a `Hierarchy` packet.
    pub fn on_hierarchy(&mut self, rig: &mut dyn HostRig, names: &[JointName]) -> Reply {
        if !self.state.is_connected() {
            warn!(state = %self.state, "hierarchy received while not connected");
            return Reply::default();
        }
        self.clear_mapping();

        let profile = &self.settings.profile;
        let binding = match build_mapping(&*rig, profile, self.settings.ambiguity, names) {
            Ok(binding) => binding,
            Err(e) => {
                warn!(error = %e, "hierarchy rejected, closing");
                self.state = SessionState::Disconnected;
                self.clear_tables();
                self.bus
                    .error("Couldn't map joints. Check the host's namespaces maybe.");
                return Reply::close();
            }
        };

        let mut messages: Vec<OutgoingMessage> = vec![OutgoingPacket::AckHierarchyInitialized.into()];
        if let Some(mode) = profile.orient_mode {
            messages.push(NetCommand::set_streaming_joint_orient_mode(mode).into());
        }
        messages.push(NetCommand::set_streaming_joint_space(self.settings.joint_space).into());
        if !profile.inter_joints.is_empty() {
            let joints = profile
                .inter_joints
                .iter()
                .map(|name| InterJoint {
                    name: JointName::new(name),
                })
                .collect();
            messages.push(OutgoingPacket::InterJoints { joints }.into());
        }

        self.root = match locate_root_offset(&*rig, profile) {
            Ok(root) => root,
            Err(e) => {
                warn!(error = %e, "cannot read root pre-transform");
                None
            }
        };

        self.bus.success(format!(
            "mapped {} host joints out of {}",
            binding.streamed().len(),
            binding.host_nodes
        ));
        self.binding = binding;
        self.state = SessionState::Streaming;
        Reply::send(messages)
    }

    /// Apply a `JointsStream` packet in receipt order and acknowledge it.
    pub fn on_stream(&mut self, rig: &mut dyn HostRig, samples: &[JointSample]) -> Reply {
        if !self.state.is_connected() {
            return Reply::default();
        }
        let report =
            retarget::apply_stream(rig, self.binding.streamed(), self.root.as_ref(), samples);
        debug!(
            applied = report.applied,
            skipped = report.skipped,
            failed = report.failed.len(),
            "stream applied"
        );
        for e in &report.failed {
            if matches!(e, BridgeError::MissingCalibration(_)) {
                self.bus.error(e.to_string());
            }
        }
        Reply::send(vec![OutgoingPacket::JointsStreamAck.into()])
    }

    /// Record the counterpart's joint uuids.
    pub fn on_uuids(&mut self, entries: &[BTreeMap<String, String>]) {
        for entry in entries {
            for (name, uuid) in entry {
                self.uuids.insert(JointName::new(name), uuid.clone());
            }
        }
        info!(total = self.uuids.len(), "joint uuids received");
    }

    // ── shell actions ───────────────────────────────────────────────────────

    /// Push the host's current pose to the counterpart.
    pub fn update_counterpart(&self, rig: &dyn HostRig) -> Result<OutgoingMessage, BridgeError> {
        self.require_connected()?;
        let capture = retarget::capture_stream(rig, self.binding.streamed(), self.root.as_ref());
        if !capture.failed.is_empty() {
            self.bus.error(format!(
                "cannot send {} joint values ({})",
                capture.failed.len(),
                capture.failed[0]
            ));
        }
        debug!(joints = capture.samples.len(), "pose captured");
        Ok(OutgoingPacket::JointsStream {
            joints: capture.samples,
        }
        .into())
    }

    fn uuid_for(&self, name: &str) -> Result<String, BridgeError> {
        self.require_connected()?;
        match self.uuids.get(name) {
            Some(uuid) => Ok(uuid.clone()),
            None => {
                let err = BridgeError::UnknownJointUuid(name.to_string());
                self.bus.error(err.to_string());
                Err(err)
            }
        }
    }

    pub fn select_joint(
        &self,
        name: &str,
        erase_group: bool,
        toggle_if_selected: bool,
    ) -> Result<OutgoingMessage, BridgeError> {
        let uuid = self.uuid_for(name)?;
        Ok(NetCommand::select_by_uuid(&uuid, erase_group, toggle_if_selected).into())
    }

    pub fn set_sketchable(&self, name: &str, sketchable: bool) -> Result<OutgoingMessage, BridgeError> {
        let uuid = self.uuid_for(name)?;
        Ok(NetCommand::set_sketchable(&uuid, sketchable).into())
    }

    pub fn set_wireframe(&self, visible: bool) -> Result<OutgoingMessage, BridgeError> {
        self.require_connected()?;
        Ok(NetCommand::set_wireframe_visibility(visible).into())
    }

    pub fn attach_ik_effector(&self) -> Result<OutgoingMessage, BridgeError> {
        self.require_connected()?;
        Ok(NetCommand::attach_num_ik_effector().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::StatusReceiver;
    use moskbridge_math::{Quaternion, Vec3};
    use moskbridge_rig::SimRig;
    use moskbridge_types::{ANATOM_SIX_DOF, StatusLevel};

    fn skeleton() -> SimRig {
        SimRig::new()
            .with_joint("Root_M", Quaternion::identity())
            .with_joint("Spine1_M", Quaternion::identity())
            .with_joint("Hip_L", Quaternion::identity())
    }

    fn session(profile: ModelProfile) -> (Session, StatusReceiver) {
        let bus = Arc::new(StatusBus::default());
        let rx = bus.subscribe();
        let settings = SessionSettings {
            profile,
            ..SessionSettings::default()
        };
        (Session::new(settings, bus), rx)
    }

    fn connected(profile: ModelProfile) -> (Session, StatusReceiver) {
        let (mut s, mut rx) = session(profile);
        s.begin_connect("127.0.0.1:16094").unwrap();
        s.on_connected();
        rx.drain();
        (s, rx)
    }

    fn hierarchy(names: &[&str]) -> String {
        serde_json::json!({ "Type": "Hierarchy", "Joints": names }).to_string()
    }

    fn labels(reply: &Reply) -> Vec<&str> {
        reply.messages.iter().map(OutgoingMessage::label).collect()
    }

    #[test]
    fn connect_twice_is_refused() {
        let (mut s, mut rx) = session(ModelProfile::no_rig());
        s.begin_connect("127.0.0.1:16094").unwrap();
        assert_eq!(s.begin_connect("127.0.0.1:16094"), Err(BridgeError::AlreadyConnected));
        let last = rx.drain().pop().unwrap();
        assert_eq!(last.message, "connection is already opened.");
        assert_eq!(s.state(), SessionState::Connecting);
    }

    #[test]
    fn lifecycle_reaches_streaming() {
        let (mut s, _rx) = connected(ModelProfile::no_rig());
        assert_eq!(s.state(), SessionState::AwaitingHierarchy);
        let mut rig = skeleton();
        let reply = s.handle_line(&mut rig, &hierarchy(&["Root_M", "Spine1_M"]));
        assert!(!reply.close);
        assert_eq!(s.state(), SessionState::Streaming);
        assert_eq!(s.binding().streamed().len(), 2);
    }

    #[test]
    fn no_rig_handshake_sends_ack_then_commands() {
        let (mut s, mut rx) = connected(ModelProfile::no_rig());
        let mut rig = skeleton();
        let reply = s.handle_line(&mut rig, &hierarchy(&["Root_M", "Hip_L"]));
        assert_eq!(
            labels(&reply),
            vec!["AckHierarchyInitialized", "setStreamingJointOrientMode", "setStreamingJointSpace"]
        );

        let OutgoingMessage::Command(cmd) = &reply.messages[1] else {
            panic!("expected a command");
        };
        assert_eq!(cmd.parameters["jointOrientMode"], "1");

        let status = rx.drain().pop().unwrap();
        assert_eq!(status.message, "mapped 2 host joints out of 3");
    }

    #[test]
    fn rigged_handshake_announces_inter_joints() {
        let (mut s, _rx) = connected(ModelProfile::mosko_rigged());
        let mut rig = SimRig::new()
            .with_joint("Spine1_M", Quaternion::identity())
            .with_transform("FKSpine1_M");
        let reply = s.handle_line(&mut rig, &hierarchy(&["Spine1_M"]));
        assert_eq!(
            labels(&reply),
            vec![
                "AckHierarchyInitialized",
                "setStreamingJointOrientMode",
                "setStreamingJointSpace",
                "InterJoints"
            ]
        );
    }

    #[test]
    fn deepsea_handshake_skips_orient_mode() {
        let (mut s, _rx) = connected(ModelProfile::deepsea_rigged());
        let mut rig = SimRig::new().with_transform("FKXtailMain1_M");
        let reply = s.handle_line(&mut rig, &hierarchy(&["tailMain1_M"]));
        assert_eq!(
            labels(&reply),
            vec!["AckHierarchyInitialized", "setStreamingJointSpace"]
        );
    }

    #[test]
    fn empty_mapping_closes_session() {
        let (mut s, mut rx) = connected(ModelProfile::no_rig());
        let mut rig = skeleton();
        let reply = s.handle_line(&mut rig, &hierarchy(&["Tail_M", "Fin_L"]));

        assert!(reply.close);
        assert!(reply.messages.is_empty());
        assert_eq!(s.state(), SessionState::Disconnected);
        assert!(s.binding().joints.is_empty());
        assert!(s.binding().controllers.is_empty());
        let status = rx.drain().pop().unwrap();
        assert_eq!(status.level, StatusLevel::Error);
        assert!(status.message.starts_with("Couldn't map joints"));
    }

    #[test]
    fn second_hierarchy_replaces_first() {
        let (mut s, _rx) = connected(ModelProfile::no_rig());
        let mut rig = skeleton();
        s.handle_line(&mut rig, &hierarchy(&["Root_M", "Spine1_M"]));
        s.handle_line(&mut rig, &hierarchy(&["Hip_L"]));
        let table = s.binding().streamed();
        assert!(table.contains("Hip_L"));
        assert!(!table.contains("Root_M"));
        assert!(!table.contains("Spine1_M"));
    }

    #[test]
    fn stream_is_applied_and_acknowledged() {
        let (mut s, _rx) = connected(ModelProfile::no_rig());
        let mut rig = skeleton();
        s.handle_line(&mut rig, &hierarchy(&["Root_M", "Hip_L"]));

        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.5);
        let line = serde_json::json!({
            "Type": "JointsStream",
            "Joints": [
                { "Name": "Root_M", "LR": q.to_array(), "LT": [0.0, 1.0, 0.0], "Anatom": ANATOM_SIX_DOF },
                { "Name": "Hip_L", "LR": q.to_array(), "LT": [9.0, 9.0, 9.0] },
                { "Name": "Unknown_M", "LR": [0.0, 0.0, 0.0, 1.0] }
            ]
        })
        .to_string();
        let reply = s.handle_line(&mut rig, &line);
        assert_eq!(labels(&reply), vec!["JointsStreamAck"]);

        let root = rig.handle_of("Root_M").unwrap();
        let hip = rig.handle_of("Hip_L").unwrap();
        assert!(rig.local_rotation(hip).unwrap().approx_eq(q, 1e-9));
        assert!(rig.local_translation(root).unwrap().approx_eq(Vec3::new(0.0, 100.0, 0.0), 1e-9));
        assert_eq!(rig.local_translation(hip).unwrap(), Vec3::zero());
    }

    #[test]
    fn malformed_line_is_dropped_and_session_survives() {
        let (mut s, mut rx) = connected(ModelProfile::no_rig());
        let mut rig = skeleton();
        let reply = s.handle_line(&mut rig, r#"{"Type":"Teleport"}"#);
        assert_eq!(reply, Reply::default());
        assert_eq!(s.state(), SessionState::AwaitingHierarchy);
        let status = rx.drain().pop().unwrap();
        assert!(status.message.contains("unknown data type received: Teleport"));

        let reply = s.handle_line(&mut rig, "not json at all");
        assert_eq!(reply, Reply::default());
    }

    #[test]
    fn double_close_is_benign() {
        let (mut s, mut rx) = connected(ModelProfile::no_rig());
        let first = s.close();
        assert!(first.close);
        let second = s.close();
        assert_eq!(second, Reply::default());
        let last = rx.drain().pop().unwrap();
        assert_eq!(last.message, "connection is already closed.");
        assert_eq!(last.level, StatusLevel::Info);
    }

    #[test]
    fn close_clears_every_table() {
        let (mut s, _rx) = connected(ModelProfile::no_rig());
        let mut rig = skeleton();
        s.handle_line(&mut rig, &hierarchy(&["Root_M"]));
        s.handle_line(
            &mut rig,
            r#"{"Type":"JointsUuids","Joints":[{"Root_M":"u-1"}]}"#,
        );
        assert_eq!(s.uuid_count(), 1);

        s.close();
        assert!(s.binding().is_empty());
        assert_eq!(s.uuid_count(), 0);
        assert!(s.root_offset().is_none());
    }

    #[test]
    fn uuids_survive_a_new_hierarchy() {
        let (mut s, _rx) = connected(ModelProfile::no_rig());
        let mut rig = skeleton();
        s.handle_line(
            &mut rig,
            r#"{"Type":"JointsUuids","Joints":[{"Hip_L":"u-hip"}]}"#,
        );
        s.handle_line(&mut rig, &hierarchy(&["Root_M", "Hip_L"]));
        s.handle_line(&mut rig, &hierarchy(&["Spine1_M"]));

        assert_eq!(s.uuid_of("Hip_L"), Some("u-hip"));
        assert!(s.select_joint("Hip_L", true, true).is_ok());
        assert!(!s.binding().streamed().contains("Hip_L"));
    }

    #[test]
    fn failed_hierarchy_drops_uuids_with_the_session() {
        let (mut s, _rx) = connected(ModelProfile::no_rig());
        let mut rig = skeleton();
        s.handle_line(
            &mut rig,
            r#"{"Type":"JointsUuids","Joints":[{"Hip_L":"u-hip"}]}"#,
        );
        let reply = s.handle_line(&mut rig, &hierarchy(&["Tail_M"]));
        assert!(reply.close);
        assert_eq!(s.uuid_count(), 0);
    }

    #[test]
    fn transport_error_disconnects() {
        let (mut s, mut rx) = connected(ModelProfile::no_rig());
        s.on_transport_error(&BridgeError::Transport("connection reset".into()));
        assert_eq!(s.state(), SessionState::Disconnected);
        let status = rx.drain().pop().unwrap();
        assert_eq!(status.level, StatusLevel::Error);
        assert!(status.message.contains("connection reset"));
    }

    #[test]
    fn packets_before_connect_are_ignored() {
        let (mut s, _rx) = session(ModelProfile::no_rig());
        let mut rig = skeleton();
        let reply = s.handle_line(&mut rig, &hierarchy(&["Root_M"]));
        assert_eq!(reply, Reply::default());
        assert_eq!(s.state(), SessionState::Disconnected);
    }

    #[test]
    fn update_requires_connection() {
        let (s, mut rx) = session(ModelProfile::no_rig());
        let rig = skeleton();
        assert_eq!(s.update_counterpart(&rig), Err(BridgeError::NotConnected));
        assert_eq!(rx.drain().pop().unwrap().message, "Mosketch is not connected!");
    }

    #[test]
    fn update_streams_bound_pose() {
        let (mut s, _rx) = connected(ModelProfile::no_rig());
        let mut rig = skeleton();
        s.handle_line(&mut rig, &hierarchy(&["Spine1_M", "Root_M"]));
        let hip = rig.handle_of("Root_M").unwrap();
        rig.set_local_translation(hip, Vec3::new(0.0, 90.0, 0.0)).unwrap();

        let msg = s.update_counterpart(&rig).unwrap();
        let OutgoingMessage::Packet(OutgoingPacket::JointsStream { joints }) = msg else {
            panic!("expected a JointsStream packet");
        };
        assert_eq!(joints.len(), 2);
        assert_eq!(joints[0].name.as_str(), "Root_M");
        assert!(joints[0].translation.approx_eq(Vec3::new(0.0, 0.9, 0.0), 1e-9));
    }

    #[test]
    fn rigged_root_uses_offset_system() {
        let (mut s, _rx) = connected(ModelProfile::mosko_rigged());
        let mut rig = SimRig::new()
            .with_joint("RootX_M", Quaternion::identity())
            .with_transform("FKOffsetRoot_M")
            .with_transform("RootCenter_M");
        let center = rig.handle_of("RootCenter_M").unwrap();
        rig.set_local_translation(center, Vec3::new(0.0, 50.0, 0.0)).unwrap();

        s.handle_line(&mut rig, &hierarchy(&["RootX_M"]));
        assert!(s.root_offset().is_some());

        let line = serde_json::json!({
            "Type": "JointsStream",
            "Joints": [{ "Name": "RootX_M", "LR": [0.0, 0.0, 0.0, 1.0], "LT": [0.0, 1.0, 0.0], "Anatom": 7 }]
        })
        .to_string();
        s.handle_line(&mut rig, &line);
        let root = rig.handle_of("RootX_M").unwrap();
        assert!(rig.local_translation(root).unwrap().approx_eq(Vec3::new(0.0, 50.0, 0.0), 1e-9));
    }

    #[test]
    fn commands_resolve_uuids() {
        let (mut s, mut rx) = connected(ModelProfile::no_rig());
        let mut rig = skeleton();
        s.handle_line(
            &mut rig,
            r#"[{"Type":"JointsUuids","Joints":[{"Hip_L":"u-hip"},{"Spine1_M":"u-spine"}]}]"#,
        );

        let OutgoingMessage::Command(select) = s.select_joint("Hip_L", true, true).unwrap() else {
            panic!("expected a command");
        };
        assert_eq!(select.command, "selectByUuid");
        assert_eq!(select.parameters["uuid"], "u-hip");
        assert_eq!(select.parameters["eraseGroup"], "1");

        let OutgoingMessage::Command(sketch) = s.set_sketchable("Spine1_M", false).unwrap() else {
            panic!("expected a command");
        };
        assert_eq!(sketch.parameters["sketchable"], "false");

        rx.drain();
        assert_eq!(
            s.select_joint("Tail_M", true, true),
            Err(BridgeError::UnknownJointUuid("Tail_M".into()))
        );
        assert_eq!(rx.drain().pop().unwrap().level, StatusLevel::Error);
    }

    #[test]
    fn scene_commands_need_connection() {
        let (s, _rx) = session(ModelProfile::no_rig());
        assert_eq!(s.set_wireframe(true), Err(BridgeError::NotConnected));
        assert_eq!(s.attach_ik_effector(), Err(BridgeError::NotConnected));
    }
}
