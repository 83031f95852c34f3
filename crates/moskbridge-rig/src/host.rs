//! Generic `HostRig` trait for the 3D host's scene graph.
//!
//! Hosts implement this trait and hand it to the session.  All transforms are
//! read and written in the node's local ("transform") space, in host linear
//! units (centimetres).

use moskbridge_math::{Quaternion, Vec3};
use moskbridge_types::BridgeError;

/// Opaque, non-owning reference to a node in the host's scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u64);

impl NodeHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Node families the bridge lists.
///
/// Skeletal joints are transforms too: listing [`NodeKind::Transform`]
/// includes every joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Joint,
    Transform,
}

/// The host application's scene graph.
///
/// # Contract
///
/// * `list_nodes` returns handles in the host's own listing order.  The
///   mapper's first-match tie-break depends on that order.
/// * `joint_orient` returns `Ok(None)` for nodes that are not skeletal joints
///   (plain transforms, rig controllers).
/// * Getter/setter failures for a single node are reported as
///   [`BridgeError::Host`]; they never poison the whole rig.
pub trait HostRig: Send {
    /// Every node of `kind`, in host listing order.
    fn list_nodes(&self, kind: NodeKind) -> Vec<NodeHandle>;

    fn node_name(&self, node: NodeHandle) -> Result<String, BridgeError>;

    /// Local rotation in transform space.
    fn local_rotation(&self, node: NodeHandle) -> Result<Quaternion, BridgeError>;

    fn set_local_rotation(&mut self, node: NodeHandle, rotation: Quaternion)
    -> Result<(), BridgeError>;

    /// Local translation in transform space, host units.
    fn local_translation(&self, node: NodeHandle) -> Result<Vec3, BridgeError>;

    fn set_local_translation(
        &mut self,
        node: NodeHandle,
        translation: Vec3,
    ) -> Result<(), BridgeError>;

    /// Rotate-axis pre-rotation as Euler XYZ angles in radians.
    fn rotate_axis(&self, node: NodeHandle) -> Result<Vec3, BridgeError>;

    /// Joint-orient pre-rotation, or `None` if `node` is not a joint.
    fn joint_orient(&self, node: NodeHandle) -> Result<Option<Quaternion>, BridgeError>;

    /// All nodes of `kind` named exactly `name`, in listing order.
    fn find_by_name(&self, kind: NodeKind, name: &str) -> Result<Vec<NodeHandle>, BridgeError> {
        let mut found = Vec::new();
        for node in self.list_nodes(kind) {
            if self.node_name(node)? == name {
                found.push(node);
            }
        }
        Ok(found)
    }
}
