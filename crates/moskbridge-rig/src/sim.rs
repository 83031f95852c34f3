//! In-memory host scene for tests and host-less runs.
//!
//! [`SimRig`] implements [`HostRig`] over a flat list of [`SimNode`]s.  It can
//! be assembled with the builder methods or loaded from a TOML scene file:
//!
//! ```toml
//! [[nodes]]
//! name = "Root_M"
//! joint_orient = [0.0, 0.0, 0.0, 1.0]
//! translation = [0.0, 95.0, 0.0]
//!
//! [[nodes]]
//! name = "FKSpine1_M"
//! rotate_axis = [0.0, 0.0, 1.5707963]
//! ```
//!
//! A node with a `joint_orient` is a skeletal joint; a node without one is a
//! plain transform (rig controller).  Listing order is the file order.

use std::path::Path;

use moskbridge_math::{Quaternion, Vec3};
use moskbridge_types::BridgeError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::host::{HostRig, NodeHandle, NodeKind};

// ────────────────────────────────────────────────────────────────────────────
// Scene nodes
// ────────────────────────────────────────────────────────────────────────────

/// A single simulated scene node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimNode {
    pub name: String,
    /// `Some` marks the node as a skeletal joint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint_orient: Option<Quaternion>,
    /// Euler XYZ, radians.
    #[serde(default)]
    pub rotate_axis: Vec3,
    #[serde(default)]
    pub rotation: Quaternion,
    /// Host units (centimetres).
    #[serde(default)]
    pub translation: Vec3,
    /// Locked nodes reject every setter with [`BridgeError::Host`].
    #[serde(default)]
    pub locked: bool,
}

impl SimNode {
    pub fn joint(name: impl Into<String>, joint_orient: Quaternion) -> Self {
        Self {
            name: name.into(),
            joint_orient: Some(joint_orient),
            rotate_axis: Vec3::zero(),
            rotation: Quaternion::identity(),
            translation: Vec3::zero(),
            locked: false,
        }
    }

    pub fn transform(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            joint_orient: None,
            rotate_axis: Vec3::zero(),
            rotation: Quaternion::identity(),
            translation: Vec3::zero(),
            locked: false,
        }
    }

    pub fn with_rotate_axis(mut self, euler_xyz_rad: Vec3) -> Self {
        self.rotate_axis = euler_xyz_rad;
        self
    }

    pub fn with_rotation(mut self, rotation: Quaternion) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    pub fn is_joint(&self) -> bool {
        self.joint_orient.is_some()
    }
}

/// On-disk scene layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SceneFile {
    #[serde(default)]
    nodes: Vec<SimNode>,
}

// ────────────────────────────────────────────────────────────────────────────
// SimRig
// ────────────────────────────────────────────────────────────────────────────

/// A simulated host scene.  Handles are indices into the node list.
#[derive(Debug, Default, Clone)]
pub struct SimRig {
    nodes: Vec<SimNode>,
}

impl SimRig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a skeletal joint.
    pub fn with_joint(mut self, name: impl Into<String>, joint_orient: Quaternion) -> Self {
        self.nodes.push(SimNode::joint(name, joint_orient));
        self
    }

    /// Builder: append a plain transform (controller).
    pub fn with_transform(mut self, name: impl Into<String>) -> Self {
        self.nodes.push(SimNode::transform(name));
        self
    }

    /// Builder: append a fully specified node.
    pub fn with_node(mut self, node: SimNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Append `node` and return its handle.
    pub fn add_node(&mut self, node: SimNode) -> NodeHandle {
        self.nodes.push(node);
        NodeHandle::new((self.nodes.len() - 1) as u64)
    }

    /// Parse a TOML scene description.
    pub fn from_toml_str(source: &str) -> Result<Self, BridgeError> {
        let scene: SceneFile = toml::from_str(source)
            .map_err(|e| BridgeError::Config(format!("invalid scene file: {e}")))?;
        Ok(Self { nodes: scene.nodes })
    }

    /// Load a TOML scene description from disk.
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("cannot read scene {}: {e}", path.display()))
        })?;
        let rig = Self::from_toml_str(&source)?;
        debug!(path = %path.display(), nodes = rig.nodes.len(), "scene loaded");
        Ok(rig)
    }

    /// Serialize the current scene state back to TOML.
    pub fn to_toml_string(&self) -> Result<String, BridgeError> {
        let scene = SceneFile {
            nodes: self.nodes.clone(),
        };
        toml::to_string_pretty(&scene)
            .map_err(|e| BridgeError::Config(format!("cannot serialize scene: {e}")))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First node named `name`, regardless of kind.
    pub fn handle_of(&self, name: &str) -> Option<NodeHandle> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(|i| NodeHandle::new(i as u64))
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&SimNode> {
        self.nodes.get(handle.raw() as usize)
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut SimNode> {
        self.nodes.get_mut(handle.raw() as usize)
    }

    fn get(&self, handle: NodeHandle) -> Result<&SimNode, BridgeError> {
        self.node(handle).ok_or_else(|| unknown_handle(handle))
    }

    fn get_writable(&mut self, handle: NodeHandle) -> Result<&mut SimNode, BridgeError> {
        let node = self
            .nodes
            .get_mut(handle.raw() as usize)
            .ok_or_else(|| unknown_handle(handle))?;
        if node.locked {
            return Err(BridgeError::Host {
                node: node.name.clone(),
                details: "node is locked".to_string(),
            });
        }
        Ok(node)
    }
}

fn unknown_handle(handle: NodeHandle) -> BridgeError {
    BridgeError::Host {
        node: format!("#{}", handle.raw()),
        details: "unknown node handle".to_string(),
    }
}

impl HostRig for SimRig {
    fn list_nodes(&self, kind: NodeKind) -> Vec<NodeHandle> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| kind == NodeKind::Transform || n.is_joint())
            .map(|(i, _)| NodeHandle::new(i as u64))
            .collect()
    }

    fn node_name(&self, node: NodeHandle) -> Result<String, BridgeError> {
        Ok(self.get(node)?.name.clone())
    }

    fn local_rotation(&self, node: NodeHandle) -> Result<Quaternion, BridgeError> {
        Ok(self.get(node)?.rotation)
    }

    fn set_local_rotation(
        &mut self,
        node: NodeHandle,
        rotation: Quaternion,
    ) -> Result<(), BridgeError> {
        self.get_writable(node)?.rotation = rotation;
        Ok(())
    }

    fn local_translation(&self, node: NodeHandle) -> Result<Vec3, BridgeError> {
        Ok(self.get(node)?.translation)
    }

    fn set_local_translation(
        &mut self,
        node: NodeHandle,
        translation: Vec3,
    ) -> Result<(), BridgeError> {
        self.get_writable(node)?.translation = translation;
        Ok(())
    }

    fn rotate_axis(&self, node: NodeHandle) -> Result<Vec3, BridgeError> {
        Ok(self.get(node)?.rotate_axis)
    }

    fn joint_orient(&self, node: NodeHandle) -> Result<Option<Quaternion>, BridgeError> {
        Ok(self.get(node)?.joint_orient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rig() -> SimRig {
        SimRig::new()
            .with_joint("Root_M", Quaternion::identity())
            .with_transform("FKRoot_M")
            .with_joint("Spine1_M", Quaternion::identity())
    }

    #[test]
    fn joint_listing_excludes_plain_transforms() {
        let rig = sample_rig();
        let joints = rig.list_nodes(NodeKind::Joint);
        assert_eq!(joints, vec![NodeHandle::new(0), NodeHandle::new(2)]);
    }

    #[test]
    fn transform_listing_includes_joints() {
        let rig = sample_rig();
        assert_eq!(rig.list_nodes(NodeKind::Transform).len(), 3);
    }

    #[test]
    fn setters_update_local_state() {
        let mut rig = sample_rig();
        let h = rig.handle_of("FKRoot_M").unwrap();
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.5);
        rig.set_local_rotation(h, q).unwrap();
        rig.set_local_translation(h, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(rig.local_rotation(h).unwrap(), q);
        assert_eq!(rig.local_translation(h).unwrap(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn locked_node_rejects_writes() {
        let mut rig = SimRig::new().with_node(SimNode::transform("FKHip_L").locked());
        let h = rig.handle_of("FKHip_L").unwrap();
        let err = rig
            .set_local_rotation(h, Quaternion::identity())
            .unwrap_err();
        assert!(matches!(err, BridgeError::Host { ref node, .. } if node == "FKHip_L"));
    }

    #[test]
    fn unknown_handle_is_host_error() {
        let rig = sample_rig();
        let err = rig.local_rotation(NodeHandle::new(99)).unwrap_err();
        assert!(matches!(err, BridgeError::Host { .. }));
    }

    #[test]
    fn toml_scene_parses_with_defaults() {
        let src = r#"
            [[nodes]]
            name = "Root_M"
            joint_orient = [0.0, 0.0, 0.0, 1.0]
            translation = [0.0, 95.0, 0.0]

            [[nodes]]
            name = "FKSpine1_M"
            rotate_axis = [0.0, 0.0, 1.5]
        "#;
        let rig = SimRig::from_toml_str(src).unwrap();
        assert_eq!(rig.len(), 2);
        let root = rig.node(NodeHandle::new(0)).unwrap();
        assert!(root.is_joint());
        assert_eq!(root.translation, Vec3::new(0.0, 95.0, 0.0));
        assert_eq!(root.rotation, Quaternion::identity());
        let ctrl = rig.node(NodeHandle::new(1)).unwrap();
        assert!(!ctrl.is_joint());
        assert_eq!(ctrl.rotate_axis, Vec3::new(0.0, 0.0, 1.5));
    }

    #[test]
    fn malformed_scene_is_config_error() {
        let err = SimRig::from_toml_str("[[nodes]]\nname = 3").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn scene_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.toml");
        let rig = sample_rig().with_node(
            SimNode::transform("FKOffsetRoot_M").with_translation(Vec3::new(0.0, 10.0, 0.0)),
        );
        std::fs::write(&path, rig.to_toml_string().unwrap()).unwrap();

        let loaded = SimRig::load(&path).unwrap();
        assert_eq!(loaded.len(), 4);
        let h = loaded.handle_of("FKOffsetRoot_M").unwrap();
        assert_eq!(
            loaded.local_translation(h).unwrap(),
            Vec3::new(0.0, 10.0, 0.0)
        );
    }

    #[test]
    fn missing_scene_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SimRig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
