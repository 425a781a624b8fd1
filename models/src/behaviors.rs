//! Behavior records lifted from a keymap: hold-taps, combos, macros,
//! tap-dances and input listeners.

use crate::core::LayoutBinding;
use serde::{Deserialize, Serialize};

/// A `zmk,behavior-hold-tap` definition. `bindings` always has length 2
/// (hold behavior, then tap behavior); the managers enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HoldTapBehavior {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<String>,
    #[serde(
        rename = "tappingTermMs",
        alias = "tapping_term_ms",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tapping_term_ms: Option<u32>,
    #[serde(
        rename = "quickTapMs",
        alias = "quick_tap_ms",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub quick_tap_ms: Option<u32>,
    #[serde(
        rename = "requirePriorIdleMs",
        alias = "require_prior_idle_ms",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub require_prior_idle_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    #[serde(
        rename = "holdTriggerKeyPositions",
        alias = "hold_trigger_key_positions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hold_trigger_key_positions: Option<Vec<u16>>,
    #[serde(
        rename = "holdTriggerOnRelease",
        alias = "hold_trigger_on_release",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hold_trigger_on_release: Option<bool>,
    #[serde(
        rename = "retroTap",
        alias = "retro_tap",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub retro_tap: Option<bool>,
}

/// A combo: press `key_positions` together to trigger `binding`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboBehavior {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "keyPositions", alias = "key_positions")]
    pub key_positions: Vec<u16>,
    pub binding: LayoutBinding,
    #[serde(
        rename = "timeoutMs",
        alias = "timeout_ms",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<i64>>,
    #[serde(
        rename = "requirePriorIdleMs",
        alias = "require_prior_idle_ms",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub require_prior_idle_ms: Option<u32>,
}

/// A `zmk,behavior-macro` definition: a recorded sequence of bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MacroBehavior {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<LayoutBinding>,
    #[serde(
        rename = "waitMs",
        alias = "wait_ms",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub wait_ms: Option<u32>,
    #[serde(
        rename = "tapMs",
        alias = "tap_ms",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tap_ms: Option<u32>,
}

/// A `zmk,behavior-tap-dance` definition; `bindings` has at least 2 entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TapDanceBehavior {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        rename = "tappingTermMs",
        alias = "tapping_term_ms",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tapping_term_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<LayoutBinding>,
}

/// One child node of an input listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InputListenerNode {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<i64>,
    #[serde(
        rename = "inputProcessors",
        alias = "input_processors",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub input_processors: Vec<LayoutBinding>,
}

/// A `&…_input_listener { … }` overlay node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InputListener {
    /// Listener reference including the leading `&`.
    pub code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<InputListenerNode>,
}
