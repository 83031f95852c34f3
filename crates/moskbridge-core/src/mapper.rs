//! Name/role mapping.
//!
//! Every counterpart joint name is bound twice: once to the skeletal joint of
//! the same name, and once to the rig controller named by [`resolve`].  The
//! active profile decides which of the two tables is streamed.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use moskbridge_rig::{HostRig, NodeHandle, NodeKind};
use moskbridge_types::{BridgeError, JointName};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::frames::{self, CalibrationFrame, FrameRegistry, FrameSource};
use crate::profile::ModelProfile;
use crate::retarget::RootOffset;

/// What to do when several host nodes carry the requested name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// Bind the first node in host listing order.
    #[default]
    FirstListed,
    /// Leave the joint unbound.
    Reject,
}

impl fmt::Display for AmbiguityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstListed => write!(f, "first-listed"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for AmbiguityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first-listed" | "first" => Ok(Self::FirstListed),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown ambiguity policy '{other}'")),
        }
    }
}

/// Host node name expected to drive `canonical` under `profile`.
pub fn resolve(canonical: &str, profile: &ModelProfile) -> String {
    if profile.passthrough_names.contains(canonical)
        || profile.direct_joint_names.contains(canonical)
    {
        canonical.to_string()
    } else if profile.alt_prefix_names.contains(canonical) {
        format!("{}{canonical}", profile.alt_prefix)
    } else {
        format!("{}{canonical}", profile.controller_prefix)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tables
// ────────────────────────────────────────────────────────────────────────────

/// Joint name → host node, with the calibration frame of each binding.
#[derive(Debug, Default, Clone)]
pub struct JointTable {
    nodes: BTreeMap<JointName, NodeHandle>,
    frames: FrameRegistry,
}

impl JointTable {
    /// Assemble a table from separately built parts.  Every name in `nodes`
    /// is expected to have a frame in `frames`.
    pub fn from_parts(nodes: BTreeMap<JointName, NodeHandle>, frames: FrameRegistry) -> Self {
        Self { nodes, frames }
    }

    pub fn insert(&mut self, name: JointName, node: NodeHandle, frame: CalibrationFrame) {
        self.frames.insert(name.clone(), frame);
        self.nodes.insert(name, node);
    }

    pub fn node(&self, name: &str) -> Option<NodeHandle> {
        self.nodes.get(name).copied()
    }

    pub fn frame(&self, name: &str) -> Option<&CalibrationFrame> {
        self.frames.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&JointName, NodeHandle)> {
        self.nodes.iter().map(|(name, node)| (name, *node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.frames.clear();
    }
}

/// Both tables produced by one hierarchy.
#[derive(Debug, Default, Clone)]
pub struct JointBinding {
    pub joints: JointTable,
    pub controllers: JointTable,
    /// Transform nodes the host listed while binding.
    pub host_nodes: usize,
    stream_controllers: bool,
}

impl JointBinding {
    /// The table inbound and outbound streams go through.
    pub fn streamed(&self) -> &JointTable {
        if self.stream_controllers {
            &self.controllers
        } else {
            &self.joints
        }
    }

    pub fn is_empty(&self) -> bool {
        self.streamed().is_empty()
    }

    pub fn clear(&mut self) {
        self.joints.clear();
        self.controllers.clear();
        self.host_nodes = 0;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Binding
// ────────────────────────────────────────────────────────────────────────────

/// Host nodes of one kind grouped by name, listing order preserved.
struct NodeIndex {
    by_name: HashMap<String, Vec<NodeHandle>>,
    len: usize,
}

impl NodeIndex {
    fn build(rig: &dyn HostRig, kind: NodeKind) -> Self {
        let listed = rig.list_nodes(kind);
        let mut by_name: HashMap<String, Vec<NodeHandle>> = HashMap::new();
        for node in &listed {
            match rig.node_name(*node) {
                Ok(name) => by_name.entry(name).or_default().push(*node),
                Err(e) => warn!(node = node.raw(), error = %e, "cannot read node name"),
            }
        }
        Self {
            by_name,
            len: listed.len(),
        }
    }

    fn pick(&self, name: &str, kind: NodeKind, policy: AmbiguityPolicy) -> Option<NodeHandle> {
        let Some(candidates) = self.by_name.get(name) else {
            debug!(host_name = name, kind = ?kind, "no host node with this name");
            return None;
        };
        match (candidates.as_slice(), policy) {
            ([single], _) => Some(*single),
            (many, AmbiguityPolicy::FirstListed) => {
                warn!(host_name = name, matches = many.len(), "ambiguous host name, taking the first one");
                many.first().copied()
            }
            (many, AmbiguityPolicy::Reject) => {
                warn!(host_name = name, matches = many.len(), "ambiguous host name, joint left unbound");
                None
            }
        }
    }
}

fn bind(
    rig: &dyn HostRig,
    table: &mut JointTable,
    name: &JointName,
    node: NodeHandle,
    expected: FrameSource,
) {
    match frames::capture(rig, node) {
        Ok((frame, source)) => {
            if source != expected {
                match expected {
                    FrameSource::Joint => {
                        warn!(joint = %name, "bound a controller where a joint was expected")
                    }
                    FrameSource::Transform => {
                        debug!(joint = %name, "bound a joint where a controller was expected")
                    }
                }
            }
            table.insert(name.clone(), node, frame);
        }
        Err(e) => warn!(joint = %name, error = %e, "cannot capture calibration, joint skipped"),
    }
}

/// Bind every name of a hierarchy to host nodes and capture their frames.
///
/// Returns [`BridgeError::EmptyMapping`] when the table the profile streams
/// through ends up empty.
pub fn build_mapping(
    rig: &dyn HostRig,
    profile: &ModelProfile,
    policy: AmbiguityPolicy,
    names: &[JointName],
) -> Result<JointBinding, BridgeError> {
    let joints = NodeIndex::build(rig, NodeKind::Joint);
    let transforms = NodeIndex::build(rig, NodeKind::Transform);

    let mut binding = JointBinding {
        host_nodes: transforms.len,
        stream_controllers: profile.stream_controllers,
        ..JointBinding::default()
    };

    for name in names {
        if let Some(node) = joints.pick(name.as_str(), NodeKind::Joint, policy) {
            bind(rig, &mut binding.joints, name, node, FrameSource::Joint);
        }
        let controller = resolve(name.as_str(), profile);
        if let Some(node) = transforms.pick(&controller, NodeKind::Transform, policy) {
            bind(rig, &mut binding.controllers, name, node, FrameSource::Transform);
        }
    }

    if binding.is_empty() {
        warn!(
            requested = names.len(),
            profile = %profile.name,
            "no joint of the hierarchy could be bound"
        );
        return Err(BridgeError::EmptyMapping {
            requested: names.len(),
        });
    }

    info!(
        joints = binding.joints.len(),
        controllers = binding.controllers.len(),
        host_nodes = binding.host_nodes,
        "hierarchy bound"
    );
    Ok(binding)
}

/// Find the profile's root pre-transform nodes in the host.
///
/// Returns `Ok(None)` when the profile has no root system or the host lacks
/// one of its nodes.
pub fn locate_root_offset(
    rig: &dyn HostRig,
    profile: &ModelProfile,
) -> Result<Option<RootOffset>, BridgeError> {
    let Some(nodes) = &profile.root_offset else {
        return Ok(None);
    };
    let pre = rig
        .find_by_name(NodeKind::Transform, &nodes.pre_rotation_node)?
        .first()
        .copied();
    let translation = rig
        .find_by_name(NodeKind::Transform, &nodes.translation_node)?
        .first()
        .copied();

    match (pre, translation) {
        (Some(pre), Some(translation_source)) => {
            let pre_rotation = rig.local_rotation(pre)?;
            debug!(
                pre_rotation_node = %nodes.pre_rotation_node,
                translation_node = %nodes.translation_node,
                "root pre-transform located"
            );
            Ok(Some(RootOffset {
                joint: JointName::new(&nodes.root_joint),
                pre_rotation,
                translation_source,
            }))
        }
        _ => {
            warn!(
                pre_rotation_node = %nodes.pre_rotation_node,
                translation_node = %nodes.translation_node,
                "root pre-transform nodes missing, root joint treated as a regular joint"
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moskbridge_math::{Quaternion, Vec3};
    use moskbridge_rig::{SimNode, SimRig};

    fn names(list: &[&str]) -> Vec<JointName> {
        list.iter().map(|n| JointName::from(*n)).collect()
    }

    // ── resolve ─────────────────────────────────────────────────────────────

    #[test]
    fn resolve_applies_rules_in_order() {
        let mosko = ModelProfile::mosko_rigged();
        assert_eq!(resolve("RootX_M", &mosko), "RootX_M");
        assert_eq!(resolve("ToesEnd_L", &mosko), "ToesEnd_L");
        assert_eq!(resolve("Neck_M", &mosko), "FKXNeck_M");
        assert_eq!(resolve("Spine1_M", &mosko), "FKSpine1_M");
    }

    #[test]
    fn resolve_deepsea_tail_uses_extra_chain() {
        let deepsea = ModelProfile::deepsea_rigged();
        assert_eq!(resolve("tailMain2_M", &deepsea), "FKXtailMain2_M");
        assert_eq!(resolve("Head_M", &deepsea), "FKHead_M");
        assert_eq!(resolve("RootX_M", &deepsea), "RootX_M");
    }

    #[test]
    fn resolve_no_rig_is_identity() {
        assert_eq!(resolve("Hip_L", &ModelProfile::no_rig()), "Hip_L");
    }

    #[test]
    fn policy_parses_from_text() {
        assert_eq!("reject".parse::<AmbiguityPolicy>(), Ok(AmbiguityPolicy::Reject));
        assert_eq!(
            "First-Listed".parse::<AmbiguityPolicy>(),
            Ok(AmbiguityPolicy::FirstListed)
        );
        assert!("random".parse::<AmbiguityPolicy>().is_err());
    }

    // ── build_mapping ───────────────────────────────────────────────────────

    fn rigged_scene() -> SimRig {
        SimRig::new()
            .with_joint("RootX_M", Quaternion::identity())
            .with_joint("Spine1_M", Quaternion::identity())
            .with_joint("ToesEnd_L", Quaternion::identity())
            .with_transform("FKSpine1_M")
            .with_transform("FKXNeck_M")
            .with_transform("FKOffsetRoot_M")
            .with_transform("RootCenter_M")
    }

    #[test]
    fn no_rig_binds_joints_by_exact_name() {
        let rig = SimRig::new()
            .with_joint("Hip_L", Quaternion::identity())
            .with_joint("Knee_L", Quaternion::identity());
        let binding = build_mapping(
            &rig,
            &ModelProfile::no_rig(),
            AmbiguityPolicy::default(),
            &names(&["Hip_L", "Knee_L", "Tail_M"]),
        )
        .unwrap();
        assert_eq!(binding.joints.len(), 2);
        assert!(binding.streamed().contains("Hip_L"));
        assert!(!binding.streamed().contains("Tail_M"));
        assert_eq!(binding.host_nodes, 2);
    }

    #[test]
    fn rigged_binds_controllers_through_prefixes() {
        let rig = rigged_scene();
        let binding = build_mapping(
            &rig,
            &ModelProfile::mosko_rigged(),
            AmbiguityPolicy::default(),
            &names(&["RootX_M", "Spine1_M", "Neck_M", "ToesEnd_L"]),
        )
        .unwrap();

        let controllers = binding.streamed();
        assert_eq!(controllers.len(), 4);
        assert_eq!(controllers.node("Spine1_M"), rig.handle_of("FKSpine1_M"));
        assert_eq!(controllers.node("Neck_M"), rig.handle_of("FKXNeck_M"));
        assert_eq!(controllers.node("ToesEnd_L"), rig.handle_of("ToesEnd_L"));
        assert_eq!(controllers.node("RootX_M"), rig.handle_of("RootX_M"));
        assert_eq!(binding.joints.len(), 3);
    }

    #[test]
    fn every_binding_has_a_frame() {
        let rig = rigged_scene();
        let binding = build_mapping(
            &rig,
            &ModelProfile::mosko_rigged(),
            AmbiguityPolicy::default(),
            &names(&["RootX_M", "Spine1_M", "Neck_M"]),
        )
        .unwrap();
        for (name, _) in binding.controllers.iter() {
            assert!(binding.controllers.frame(name.as_str()).is_some());
        }
    }

    #[test]
    fn empty_streamed_table_is_an_error() {
        let rig = SimRig::new().with_joint("Spine1_M", Quaternion::identity());
        let err = build_mapping(
            &rig,
            &ModelProfile::no_rig(),
            AmbiguityPolicy::default(),
            &names(&["Hip_L", "Knee_L"]),
        )
        .unwrap_err();
        assert_eq!(err, BridgeError::EmptyMapping { requested: 2 });
    }

    #[test]
    fn ambiguous_names_follow_policy() {
        let first = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.4);
        let rig = SimRig::new()
            .with_node(SimNode::joint("Hip_L", first))
            .with_joint("Hip_L", Quaternion::identity())
            .with_joint("Knee_L", Quaternion::identity());
        let hierarchy = names(&["Hip_L", "Knee_L"]);

        let binding = build_mapping(
            &rig,
            &ModelProfile::no_rig(),
            AmbiguityPolicy::FirstListed,
            &hierarchy,
        )
        .unwrap();
        assert_eq!(binding.joints.node("Hip_L"), Some(NodeHandle::new(0)));

        let binding = build_mapping(
            &rig,
            &ModelProfile::no_rig(),
            AmbiguityPolicy::Reject,
            &hierarchy,
        )
        .unwrap();
        assert!(!binding.joints.contains("Hip_L"));
        assert!(binding.joints.contains("Knee_L"));
    }

    #[test]
    fn rebuilding_drops_previous_names() {
        let rig = SimRig::new()
            .with_joint("Hip_L", Quaternion::identity())
            .with_joint("Hip_R", Quaternion::identity());
        let profile = ModelProfile::no_rig();
        let first =
            build_mapping(&rig, &profile, AmbiguityPolicy::default(), &names(&["Hip_L"])).unwrap();
        assert!(first.joints.contains("Hip_L"));
        let second =
            build_mapping(&rig, &profile, AmbiguityPolicy::default(), &names(&["Hip_R"])).unwrap();
        assert!(!second.joints.contains("Hip_L"));
        assert!(second.joints.contains("Hip_R"));
    }

    #[test]
    fn binding_clear_empties_both_tables() {
        let rig = rigged_scene();
        let mut binding = build_mapping(
            &rig,
            &ModelProfile::mosko_rigged(),
            AmbiguityPolicy::default(),
            &names(&["Spine1_M"]),
        )
        .unwrap();
        binding.clear();
        assert!(binding.joints.is_empty());
        assert!(binding.controllers.is_empty());
        assert!(binding.is_empty());
    }

    // ── root offset ─────────────────────────────────────────────────────────

    #[test]
    fn root_offset_found_for_rigged_profile() {
        let pre = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.25);
        let mut rig = rigged_scene();
        let pre_node = rig.handle_of("FKOffsetRoot_M").unwrap();
        rig.node_mut(pre_node).unwrap().rotation = pre;

        let offset = locate_root_offset(&rig, &ModelProfile::mosko_rigged())
            .unwrap()
            .unwrap();
        assert_eq!(offset.joint.as_str(), "RootX_M");
        assert_eq!(offset.pre_rotation, pre);
        assert_eq!(Some(offset.translation_source), rig.handle_of("RootCenter_M"));
    }

    #[test]
    fn root_offset_absent_when_nodes_missing() {
        let rig = SimRig::new().with_transform("FKOffsetRoot_M");
        assert!(
            locate_root_offset(&rig, &ModelProfile::deepsea_rigged())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn root_offset_absent_without_profile_system() {
        let rig = rigged_scene();
        assert!(
            locate_root_offset(&rig, &ModelProfile::no_rig())
                .unwrap()
                .is_none()
        );
    }
}
