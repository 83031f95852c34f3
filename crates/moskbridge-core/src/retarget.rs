//! Frame conversion between host local space and canonical joint space.
//!
//! Notation: `RO` is a frame's rotate-axis inverse, `JO` its joint-orient
//! inverse, `oJO` the root pre-transform rotation and `oT` the root offset
//! translation.
//!
//! | direction | joint | rotation | translation |
//! |-----------|-------|----------|-------------|
//! | outbound | other | `inv(RO) * l * inv(JO)` | `l_t * 0.01` |
//! | outbound | root | `oJO * inv(RO) * l * inv(JO) * inv(oJO)` | `(l_t + oT) * 0.01` |
//! | inbound | other | `RO * c * JO` | 6-DoF: `rotate(c_t, RO) * 100` |
//! | inbound | root | `inv(oJO) * RO * c * JO * oJO` | 6-DoF: `rotate(c_t, RO) * 100 - oT` |
//!
//! The root formulas are not mutual inverses unless `oJO` commutes with the
//! frame terms; they are applied as listed.

use moskbridge_math::{Quaternion, Vec3, to_canonical_units, to_host_units};
use moskbridge_rig::{HostRig, NodeHandle};
use moskbridge_types::{BridgeError, DofKind, JointName, JointSample};
use tracing::{error, trace, warn};

use crate::frames::CalibrationFrame;
use crate::mapper::JointTable;

// ────────────────────────────────────────────────────────────────────────────
// Pure formulas
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub rotation: Quaternion,
    pub translation: Vec3,
}

impl Pose {
    pub fn new(rotation: Quaternion, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }
}

/// Root pre-transform values in effect for one conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootContext {
    /// `oJO`
    pub pre_rotation: Quaternion,
    /// `oT`, host units.
    pub offset_translation: Vec3,
}

impl RootContext {
    pub fn identity() -> Self {
        Self {
            pre_rotation: Quaternion::identity(),
            offset_translation: Vec3::zero(),
        }
    }
}

/// Host local pose → canonical pose.
pub fn outbound(local: Pose, frame: &CalibrationFrame, root: Option<&RootContext>) -> Pose {
    let core =
        frame.rotate_axis_inverse.inverse() * local.rotation * frame.joint_orient_inverse.inverse();
    match root {
        None => Pose::new(core, to_canonical_units(local.translation)),
        Some(ctx) => Pose::new(
            ctx.pre_rotation * core * ctx.pre_rotation.inverse(),
            to_canonical_units(local.translation + ctx.offset_translation),
        ),
    }
}

/// Canonical rotation → host local rotation.
pub fn inbound_rotation(
    canonical: Quaternion,
    frame: &CalibrationFrame,
    root: Option<&RootContext>,
) -> Quaternion {
    let core = frame.rotate_axis_inverse * canonical * frame.joint_orient_inverse;
    match root {
        None => core,
        Some(ctx) => ctx.pre_rotation.inverse() * core * ctx.pre_rotation,
    }
}

/// Canonical translation → host local translation.
pub fn inbound_translation(
    canonical: Vec3,
    frame: &CalibrationFrame,
    root: Option<&RootContext>,
) -> Vec3 {
    let local = to_host_units(frame.rotate_axis_inverse.rotate(canonical));
    match root {
        None => local,
        Some(ctx) => local - ctx.offset_translation,
    }
}

/// Canonical pose → host local rotation and, for 6-DoF joints, translation.
pub fn inbound(
    canonical: Pose,
    dof: DofKind,
    frame: &CalibrationFrame,
    root: Option<&RootContext>,
) -> (Quaternion, Option<Vec3>) {
    let rotation = inbound_rotation(canonical.rotation, frame, root);
    let translation = dof
        .has_translation()
        .then(|| inbound_translation(canonical.translation, frame, root));
    (rotation, translation)
}

// ────────────────────────────────────────────────────────────────────────────
// Root offset
// ────────────────────────────────────────────────────────────────────────────

/// The root pre-transform system found in the host after a hierarchy.
///
/// `oJO` is read once when the system is located; `oT` is read from its
/// source node on every conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct RootOffset {
    pub joint: JointName,
    pub pre_rotation: Quaternion,
    pub translation_source: NodeHandle,
}

impl RootOffset {
    pub fn context(&self, rig: &dyn HostRig) -> Result<RootContext, BridgeError> {
        Ok(RootContext {
            pre_rotation: self.pre_rotation,
            offset_translation: rig.local_translation(self.translation_source)?,
        })
    }

    fn context_for(
        root: Option<&Self>,
        name: &JointName,
        rig: &dyn HostRig,
    ) -> Result<Option<RootContext>, BridgeError> {
        match root.filter(|r| &r.joint == name) {
            Some(offset) => offset.context(rig).map(Some),
            None => Ok(None),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stream drivers
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of applying one inbound stream packet.
#[derive(Debug, Default)]
pub struct StreamReport {
    pub applied: usize,
    /// Samples whose name is not in the table.
    pub skipped: usize,
    /// Per-joint failures; the rest of the packet was still applied.
    pub failed: Vec<BridgeError>,
}

/// Outcome of reading the outbound pose.
#[derive(Debug, Default)]
pub struct Capture {
    /// Name-sorted canonical samples.
    pub samples: Vec<JointSample>,
    pub failed: Vec<BridgeError>,
}

fn frame_for<'a>(table: &'a JointTable, name: &JointName) -> Result<&'a CalibrationFrame, BridgeError> {
    let frame = table.frame(name.as_str());
    debug_assert!(frame.is_some(), "mapped joint {name} has no calibration frame");
    frame.ok_or_else(|| {
        error!(joint = %name, "mapped joint has no calibration frame");
        BridgeError::MissingCalibration(name.to_string())
    })
}

/// Write every sample of an inbound packet onto the rig, in receipt order.
pub fn apply_stream(
    rig: &mut dyn HostRig,
    table: &JointTable,
    root: Option<&RootOffset>,
    samples: &[JointSample],
) -> StreamReport {
    let mut report = StreamReport::default();

    for sample in samples {
        let Some(node) = table.node(sample.name.as_str()) else {
            trace!(joint = %sample.name, "joint not mapped, skipped");
            report.skipped += 1;
            continue;
        };
        match apply_sample(rig, table, root, node, sample) {
            Ok(()) => report.applied += 1,
            Err(e) => {
                if !matches!(e, BridgeError::MissingCalibration(_)) {
                    warn!(joint = %sample.name, error = %e, "failed to apply joint");
                }
                report.failed.push(e);
            }
        }
    }
    report
}

fn apply_sample(
    rig: &mut dyn HostRig,
    table: &JointTable,
    root: Option<&RootOffset>,
    node: NodeHandle,
    sample: &JointSample,
) -> Result<(), BridgeError> {
    let frame = frame_for(table, &sample.name)?;
    let ctx = RootOffset::context_for(root, &sample.name, rig)?;
    let canonical = Pose::new(sample.rotation, sample.translation);
    let (rotation, translation) = inbound(canonical, sample.dof(), frame, ctx.as_ref());

    rig.set_local_rotation(node, rotation)?;
    if let Some(translation) = translation {
        rig.set_local_translation(node, translation)?;
    }
    Ok(())
}

/// Read the current pose of every mapped node as canonical samples.
pub fn capture_stream(
    rig: &dyn HostRig,
    table: &JointTable,
    root: Option<&RootOffset>,
) -> Capture {
    let mut capture = Capture::default();

    for (name, node) in table.iter() {
        match capture_sample(rig, table, root, name, node) {
            Ok(sample) => capture.samples.push(sample),
            Err(e) => {
                if !matches!(e, BridgeError::MissingCalibration(_)) {
                    warn!(joint = %name, error = %e, "failed to read joint");
                }
                capture.failed.push(e);
            }
        }
    }
    capture
}

fn capture_sample(
    rig: &dyn HostRig,
    table: &JointTable,
    root: Option<&RootOffset>,
    name: &JointName,
    node: NodeHandle,
) -> Result<JointSample, BridgeError> {
    let frame = frame_for(table, name)?;
    let ctx = RootOffset::context_for(root, name, rig)?;
    let local = Pose::new(rig.local_rotation(node)?, rig.local_translation(node)?);
    let canonical = outbound(local, frame, ctx.as_ref());
    Ok(JointSample::new(
        name.clone(),
        canonical.rotation,
        canonical.translation,
    ))
}
