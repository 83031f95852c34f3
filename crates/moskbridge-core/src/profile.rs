//! Model profiles.
//!
//! A [`ModelProfile`] captures everything that differs between rigs: how
//! counterpart joint names become host controller names, which joints bypass
//! the controllers, which root joint carries an extra pre-transform and which
//! one-time commands are sent after the hierarchy handshake.
//!
//! Three presets ship built in (`no-rig`, `mosko-rigged`, `deepsea-rigged`).
//! Every field has a serde default, so a TOML table only needs to name the
//! fields it changes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Names of the built-in presets, in display order.
pub const PRESET_NAMES: [&str; 3] = ["no-rig", "mosko-rigged", "deepsea-rigged"];

const ROOT_JOINT: &str = "RootX_M";

/// Host nodes that form the root pre-transform system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootOffsetNodes {
    /// Counterpart joint that receives the root formulas.
    pub root_joint: String,
    /// Transform whose local rotation is the pre-rotation `oJO`.
    pub pre_rotation_node: String,
    /// Transform whose local translation is the offset `oT`.
    pub translation_node: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelProfile {
    pub name: String,
    /// Default prefix turning a joint name into its controller name.
    pub controller_prefix: String,
    /// Prefix used instead for names in `alt_prefix_names`.
    pub alt_prefix: String,
    pub alt_prefix_names: BTreeSet<String>,
    /// Names resolved verbatim (well-known roots).
    pub passthrough_names: BTreeSet<String>,
    /// Joints with no controller; the joint itself is driven.
    pub direct_joint_names: BTreeSet<String>,
    /// Value of `setStreamingJointOrientMode`, if the profile sends one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orient_mode: Option<u8>,
    /// Joints announced as non-sketchable after the handshake.
    pub inter_joints: Vec<String>,
    /// Stream through the controller table instead of the joint table.
    pub stream_controllers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_offset: Option<RootOffsetNodes>,
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self::no_rig()
    }
}

impl ModelProfile {
    /// Plain skeleton: joints are driven directly by name.
    pub fn no_rig() -> Self {
        Self {
            name: "no-rig".to_string(),
            controller_prefix: String::new(),
            alt_prefix: String::new(),
            alt_prefix_names: BTreeSet::new(),
            passthrough_names: names([ROOT_JOINT]),
            direct_joint_names: BTreeSet::new(),
            root_offset: None,
            orient_mode: Some(1),
            inter_joints: Vec::new(),
            stream_controllers: false,
        }
    }

    /// Mosko with its FK control rig.
    pub fn mosko_rigged() -> Self {
        Self {
            name: "mosko-rigged".to_string(),
            controller_prefix: "FK".to_string(),
            alt_prefix: "FKX".to_string(),
            alt_prefix_names: names(["Neck_M", "NeckPart1_M", "NeckPart2_M"]),
            passthrough_names: names([ROOT_JOINT]),
            direct_joint_names: names(["ToesEnd_L", "ToesEnd_R"]),
            root_offset: Some(RootOffsetNodes {
                root_joint: ROOT_JOINT.to_string(),
                pre_rotation_node: "FKOffsetRoot_M".to_string(),
                translation_node: "RootCenter_M".to_string(),
            }),
            orient_mode: Some(0),
            inter_joints: [
                "HipPart1_L",
                "HipPart2_L",
                "ShoulderPart1_L",
                "ShoulderPart2_L",
                "ElbowPart1_L",
                "ElbowPart2_L",
                "RootPart1_M",
                "RootPart2_M",
                "NeckPart1_M",
                "NeckPart2_M",
                "HipPart1_R",
                "HipPart2_R",
                "ShoulderPart1_R",
                "ShoulderPart2_R",
                "ElbowPart1_R",
                "ElbowPart2_R",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            stream_controllers: true,
        }
    }

    /// DeepSea creature rig: fins and tail sit on the extra FKX chain.
    pub fn deepsea_rigged() -> Self {
        Self {
            name: "deepsea-rigged".to_string(),
            controller_prefix: "FK".to_string(),
            alt_prefix: "FKX".to_string(),
            alt_prefix_names: names(DEEPSEA_FKX_NAMES),
            passthrough_names: names([ROOT_JOINT]),
            direct_joint_names: BTreeSet::new(),
            root_offset: Some(RootOffsetNodes {
                root_joint: ROOT_JOINT.to_string(),
                pre_rotation_node: "FKOffsetRoot_M".to_string(),
                translation_node: "RootOffsetX_M".to_string(),
            }),
            orient_mode: None,
            inter_joints: Vec::new(),
            stream_controllers: true,
        }
    }

    /// Look up a built-in preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "no-rig" => Some(Self::no_rig()),
            "mosko-rigged" => Some(Self::mosko_rigged()),
            "deepsea-rigged" => Some(Self::deepsea_rigged()),
            _ => None,
        }
    }

    /// `true` when `name` is the joint that receives the root formulas.
    pub fn is_root_joint(&self, name: &str) -> bool {
        self.root_offset
            .as_ref()
            .is_some_and(|r| r.root_joint == name)
    }
}

fn names<const N: usize>(list: [&str; N]) -> BTreeSet<String> {
    list.into_iter().map(String::from).collect()
}

const DEEPSEA_FKX_NAMES: [&str; 93] = [
    "BodyFinSide2_L",
    "BodyFinSide2Part1_L",
    "BodyFinSide2Part2_L",
    "BodyFinSide3_L",
    "BodyFinSide3Part1_L",
    "BodyFinSide3Part2_L",
    "finSide_L",
    "finSidePart1_L",
    "finSidePart2_L",
    "finSide2_L",
    "finSide2Part1_L",
    "finSide2Part2_L",
    "finSide4_L",
    "finSide4Part1_L",
    "finSide4Part2_L",
    "BodyFinLowerA_L",
    "BodyFinLowerAPart1_L",
    "BodyFinLowerAPart2_L",
    "BodyFinLowerA1_L",
    "BodyFinLowerA1Part1_L",
    "BodyFinLowerA1Part2_L",
    "BodyFinLowerB_L",
    "BodyFinLowerBPart1_L",
    "BodyFinLowerBPart2_L",
    "BodyFinLowerB1_L",
    "BodyFinLowerB1Part1_L",
    "BodyFinLowerB1Part2_L",
    "BackE_M",
    "BackEPart1_M",
    "BackEPart2_M",
    "BackEPart3_M",
    "BackEPart4_M",
    "tailMain1_M",
    "tailMain1Part1_M",
    "tailMain1Part2_M",
    "tailMain1Part3_M",
    "tailMain1Part4_M",
    "tailMain2_M",
    "tailMain2Part1_M",
    "tailMain2Part2_M",
    "tailMain2Part3_M",
    "tailMain2Part4_M",
    "tailMain3_M",
    "tailMain3Part1_M",
    "tailMain3Part2_M",
    "tailMain3Part3_M",
    "tailMain3Part4_M",
    "tailMain4_M",
    "tailMain4Part1_M",
    "tailMain4Part2_M",
    "tailMain4Part3_M",
    "tailMain4Part4_M",
    "BodyFinUpper4_M",
    "BodyFinUpper4Part1_M",
    "BodyFinUpper4Part2_M",
    "BodyFinUpper5_M",
    "BodyFinUpper5Part1_M",
    "BodyFinUpper5Part2_M",
    "bodyFinUpper1_M",
    "bodyFinUpper1Part1_M",
    "bodyFinUpper2_M",
    "bodyFinUpper2Part1_M",
    "BodyFinUpper1_M",
    "BodyFinUpper1Part1_M",
    "BodyFinUpper2_M",
    "BodyFinUpper2Part1_M",
    "BodyFinSide2_R",
    "BodyFinSide2Part1_R",
    "BodyFinSide2Part2_R",
    "BodyFinSide3_R",
    "BodyFinSide3Part1_R",
    "BodyFinSide3Part2_R",
    "finSide_R",
    "finSidePart1_R",
    "finSidePart2_R",
    "finSide2_R",
    "finSide2Part1_R",
    "finSide2Part2_R",
    "finSide4_R",
    "finSide4Part1_R",
    "finSide4Part2_R",
    "BodyFinLowerA_R",
    "BodyFinLowerAPart1_R",
    "BodyFinLowerAPart2_R",
    "BodyFinLowerA1_R",
    "BodyFinLowerA1Part1_R",
    "BodyFinLowerA1Part2_R",
    "BodyFinLowerB_R",
    "BodyFinLowerBPart1_R",
    "BodyFinLowerBPart2_R",
    "BodyFinLowerB1_R",
    "BodyFinLowerB1Part1_R",
    "BodyFinLowerB1Part2_R",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_name_resolves() {
        for name in PRESET_NAMES {
            let profile = ModelProfile::preset(name).unwrap();
            assert_eq!(profile.name, name);
        }
        assert!(ModelProfile::preset("unknown").is_none());
    }

    #[test]
    fn orient_modes_match_rig_kind() {
        assert_eq!(ModelProfile::no_rig().orient_mode, Some(1));
        assert_eq!(ModelProfile::mosko_rigged().orient_mode, Some(0));
        assert_eq!(ModelProfile::deepsea_rigged().orient_mode, None);
    }

    #[test]
    fn rigged_presets_stream_controllers() {
        assert!(!ModelProfile::no_rig().stream_controllers);
        assert!(ModelProfile::mosko_rigged().stream_controllers);
        assert!(ModelProfile::deepsea_rigged().stream_controllers);
    }

    #[test]
    fn deepsea_fins_use_alt_prefix() {
        let p = ModelProfile::deepsea_rigged();
        assert!(p.alt_prefix_names.contains("tailMain3Part2_M"));
        assert!(p.alt_prefix_names.contains("BodyFinLowerB1Part2_R"));
        assert!(!p.alt_prefix_names.contains("Spine1_M"));
    }

    #[test]
    fn root_joint_only_with_offset_system() {
        assert!(ModelProfile::mosko_rigged().is_root_joint("RootX_M"));
        assert!(!ModelProfile::mosko_rigged().is_root_joint("Spine1_M"));
        assert!(!ModelProfile::no_rig().is_root_joint("RootX_M"));
    }

    #[test]
    fn partial_toml_table_falls_back_to_defaults() {
        let src = r#"
            name = "custom"
            controller_prefix = "CTRL_"
            stream_controllers = true
        "#;
        let profile: ModelProfile = toml::from_str(src).unwrap();
        assert_eq!(profile.name, "custom");
        assert_eq!(profile.controller_prefix, "CTRL_");
        assert!(profile.stream_controllers);
        assert_eq!(profile.orient_mode, Some(1));
        assert!(profile.passthrough_names.contains("RootX_M"));
    }

    #[test]
    fn profile_survives_toml_round_trip() {
        let original = ModelProfile::mosko_rigged();
        let text = toml::to_string(&original).unwrap();
        let parsed: ModelProfile = toml::from_str(&text).unwrap();
        assert_eq!(parsed, original);
    }
}
