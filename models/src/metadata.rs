//! The top-level layout document.

use crate::behaviors::{
    ComboBehavior, HoldTapBehavior, InputListener, MacroBehavior, TapDanceBehavior,
};
use crate::error::{LayoutError, Result};
use crate::types::{ConfigValue, LayerBindings};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One Kconfig parameter destined for the generated `.conf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigParameter {
    #[serde(rename = "paramName", alias = "param_name")]
    pub param_name: String,
    pub value: ConfigValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The complete in-memory layout: layers, behavior collections, raw
/// passthrough sections and document metadata.
///
/// Invariants: `layers.len() == layer_names.len()`, layer names unique,
/// behavior names unique within their collection. The managers in the
/// `zmk-layout` crate uphold these; direct field edits are on the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LayoutData {
    pub keyboard: String,
    #[serde(default)]
    pub title: String,
    #[serde(alias = "layerNames", default)]
    pub layer_names: Vec<String>,
    #[serde(default)]
    pub layers: Vec<LayerBindings>,
    #[serde(
        rename = "holdTaps",
        alias = "hold_taps",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub hold_taps: Vec<HoldTapBehavior>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combos: Vec<ComboBehavior>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub macros: Vec<MacroBehavior>,
    #[serde(
        rename = "tapDances",
        alias = "tap_dances",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tap_dances: Vec<TapDanceBehavior>,
    #[serde(
        rename = "inputListeners",
        alias = "input_listeners",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub input_listeners: Vec<InputListener>,
    #[serde(
        rename = "configParameters",
        alias = "config_parameters",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub config_parameters: Vec<ConfigParameter>,
    /// Raw devicetree text for user behavior definitions the model does not
    /// type; emitted verbatim before the generated behavior blocks.
    #[serde(
        rename = "customDefinedBehaviors",
        alias = "custom_defined_behaviors",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub custom_defined_behaviors: String,
    /// Raw devicetree text for nodes with unrecognized compatibles; emitted
    /// verbatim before the keymap node.
    #[serde(
        rename = "customDevicetree",
        alias = "custom_devicetree",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub custom_devicetree: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub creator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Fields this version of the model does not know; preserved on
    /// round-trip.
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl LayoutData {
    pub fn new(keyboard: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            keyboard: keyboard.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layer_names.iter().position(|n| n == name)
    }

    /// Size of the widest layer; zero when there are no layers.
    pub fn max_layer_size(&self) -> usize {
        self.layers.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Names of user-defined behaviors, each with its `&` prefix, across all
    /// behavior collections.
    pub fn user_behavior_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        names.extend(self.hold_taps.iter().map(|b| format!("&{}", b.name)));
        names.extend(self.macros.iter().map(|b| format!("&{}", b.name)));
        names.extend(self.tap_dances.iter().map(|b| format!("&{}", b.name)));
        names
    }

    /// Check the structural invariants that serialization cannot express.
    pub fn check_invariants(&self) -> Result<()> {
        if self.keyboard.is_empty() {
            return Err(LayoutError::MissingKeyboard);
        }
        if self.layers.len() != self.layer_names.len() {
            return Err(LayoutError::LayerCountMismatch {
                layers: self.layers.len(),
                names: self.layer_names.len(),
            });
        }
        for (i, name) in self.layer_names.iter().enumerate() {
            if self.layer_names[..i].contains(name) {
                return Err(LayoutError::LayerExists(name.clone()));
            }
        }
        for (i, ht) in self.hold_taps.iter().enumerate() {
            if ht.bindings.len() != 2 {
                return Err(LayoutError::HoldTapArity {
                    name: ht.name.clone(),
                    got: ht.bindings.len(),
                });
            }
            if self.hold_taps[..i].iter().any(|h| h.name == ht.name) {
                return Err(LayoutError::BehaviorExists(ht.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LayoutBinding;

    fn sample() -> LayoutData {
        let mut data = LayoutData::new("corne", "Test Layout");
        data.layer_names = vec!["base".into(), "nav".into()];
        data.layers = vec![
            vec![
                LayoutBinding::from_str("&kp Q").unwrap(),
                LayoutBinding::from_str("&mo 1").unwrap(),
            ],
            vec![LayoutBinding::from_str("&trans").unwrap()],
        ];
        data
    }

    #[test]
    fn wire_uses_camel_case_for_collections() {
        let mut data = sample();
        data.hold_taps.push(HoldTapBehavior {
            name: "hm".into(),
            bindings: vec!["&kp".into(), "&kp".into()],
            ..Default::default()
        });
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("holdTaps").is_some());
        assert!(json.get("hold_taps").is_none());
        assert!(json.get("layer_names").is_some());
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let json = r#"{
            "keyboard": "corne",
            "title": "t",
            "layer_names": ["base"],
            "layers": [["&kp A"]],
            "futureField": {"nested": true}
        }"#;
        let data: LayoutData = serde_json::from_str(json).unwrap();
        assert_eq!(data.extra["futureField"]["nested"], true);
        let back = serde_json::to_value(&data).unwrap();
        assert_eq!(back["futureField"]["nested"], true);
    }

    #[test]
    fn json_round_trip_is_identity() {
        let data = sample();
        let json = serde_json::to_string(&data).unwrap();
        let back: LayoutData = serde_json::from_str(&json).unwrap();
        assert_eq!(data, back);
    }

    #[test]
    fn invariants_catch_count_mismatch() {
        let mut data = sample();
        data.layer_names.push("extra".into());
        assert!(matches!(
            data.check_invariants(),
            Err(LayoutError::LayerCountMismatch { .. })
        ));
    }

    #[test]
    fn max_layer_size() {
        assert_eq!(sample().max_layer_size(), 2);
        assert_eq!(LayoutData::new("x", "y").max_layer_size(), 0);
    }
}
