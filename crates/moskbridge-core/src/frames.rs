//! Per-joint calibration frames.
//!
//! A [`CalibrationFrame`] stores the two pre-rotations that separate a host
//! node's local rotation from the counterpart's canonical local rotation.
//! Frames are captured once, when a hierarchy is bound, and stay immutable
//! until the next hierarchy arrives.

use std::collections::BTreeMap;

use moskbridge_math::Quaternion;
use moskbridge_rig::{HostRig, NodeHandle};
use moskbridge_types::{BridgeError, JointName};
use tracing::debug;

/// Inverses of a node's rotate-axis and joint-orient pre-rotations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationFrame {
    pub rotate_axis_inverse: Quaternion,
    pub joint_orient_inverse: Quaternion,
}

impl CalibrationFrame {
    pub fn new(rotate_axis_inverse: Quaternion, joint_orient_inverse: Quaternion) -> Self {
        Self {
            rotate_axis_inverse,
            joint_orient_inverse,
        }
    }

    pub fn identity() -> Self {
        Self::new(Quaternion::identity(), Quaternion::identity())
    }
}

/// Which branch produced the joint-orient term of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    /// The node is a skeletal joint; its joint orient was used.
    Joint,
    /// The node is a plain transform; its current local rotation was used.
    Transform,
}

/// Read the calibration frame of `node` from the host.
pub fn capture(
    rig: &dyn HostRig,
    node: NodeHandle,
) -> Result<(CalibrationFrame, FrameSource), BridgeError> {
    let rotate_axis = Quaternion::from_euler_xyz(rig.rotate_axis(node)?);
    let (orient, source) = match rig.joint_orient(node)? {
        Some(joint_orient) => (joint_orient, FrameSource::Joint),
        None => (rig.local_rotation(node)?, FrameSource::Transform),
    };
    let frame = CalibrationFrame::new(rotate_axis.inverse(), orient.inverse());
    debug!(node = node.raw(), source = ?source, "calibration frame captured");
    Ok((frame, source))
}

/// Calibration frames keyed by counterpart joint name.
#[derive(Debug, Default, Clone)]
pub struct FrameRegistry {
    frames: BTreeMap<JointName, CalibrationFrame>,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame` for `name`, replacing any previous frame.
    pub fn insert(&mut self, name: JointName, frame: CalibrationFrame) {
        self.frames.insert(name, frame);
    }

    pub fn get(&self, name: &str) -> Option<&CalibrationFrame> {
        self.frames.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frames.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
