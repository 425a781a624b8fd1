//! Deterministic devicetree and Kconfig emission.
//!
//! Same input, same bytes: collections emit in model insertion order, behavior
//! properties in a fixed order (`compatible`, `#binding-cells`, `flavor`,
//! `tapping-term-ms`, `quick-tap-ms`, `bindings`, then the rest
//! alphabetically), and nothing consults a hash map during writing.

use crate::providers::KeyboardProfile;
use indexmap::IndexMap;
use itertools::Itertools;
use std::fmt::Write as _;
use thiserror::Error;
use zmk_layout_models::{
    ComboBehavior, ConfigValue, HoldTapBehavior, InputListener, LayoutBinding, LayoutData,
    MacroBehavior, TapDanceBehavior,
};

/// Contract violations: the model handed in cannot be serialized faithfully.
/// Callers are expected to validate before emitting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("hold-tap '{0}' must have exactly 2 bindings to emit")]
    HoldTapArity(String),
    #[error("tap-dance '{0}' must have at least 2 bindings to emit")]
    TapDanceArity(String),
    #[error("combo '{0}' must have at least one key position to emit")]
    EmptyComboPositions(String),
}

/// All discrete output fragments for one layout.
#[derive(Debug, Clone, Default)]
pub struct EmitFragments {
    pub layer_defines: String,
    pub behaviors_dtsi: String,
    pub tap_dances_dtsi: String,
    pub combos_dtsi: String,
    pub macros_dtsi: String,
    pub input_listeners_dtsi: String,
    pub keymap_node: String,
    pub kconfig_lines: String,
    pub kconfig_settings: IndexMap<String, ConfigValue>,
}

pub struct ZmkGenerator<'a> {
    profile: &'a KeyboardProfile,
}

impl<'a> ZmkGenerator<'a> {
    pub fn new(profile: &'a KeyboardProfile) -> Self {
        Self { profile }
    }

    /// Emit every fragment for `data`.
    pub fn generate_fragments(&self, data: &LayoutData) -> Result<EmitFragments, EmitError> {
        let (kconfig_lines, kconfig_settings) = self.generate_kconfig_conf(data);
        Ok(EmitFragments {
            layer_defines: self.generate_layer_defines(&data.layer_names),
            behaviors_dtsi: self.generate_behaviors_dtsi(&data.hold_taps)?,
            tap_dances_dtsi: self.generate_tap_dances_dtsi(&data.tap_dances)?,
            combos_dtsi: self.generate_combos_dtsi(&data.combos)?,
            macros_dtsi: self.generate_macros_dtsi(&data.macros),
            input_listeners_dtsi: self.generate_input_listeners_dtsi(&data.input_listeners),
            keymap_node: self.generate_keymap_node(&data.layer_names, &data.layers),
            kconfig_lines,
            kconfig_settings,
        })
    }

    /// One `#define` per layer, in layer order, using the profile's pattern.
    pub fn generate_layer_defines(&self, layer_names: &[String]) -> String {
        layer_names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                self.profile
                    .patterns
                    .layer_define
                    .replace("{layer_name}", name)
                    .replace("{layer_index}", &index.to_string())
            })
            .join("\n")
    }

    /// Hold-tap definitions inside a `behaviors` node. Returned without the
    /// `/ { … };` wrapper; the builder supplies it.
    pub fn generate_behaviors_dtsi(
        &self,
        hold_taps: &[HoldTapBehavior],
    ) -> Result<String, EmitError> {
        if hold_taps.is_empty() {
            return Ok(String::new());
        }
        let mut out = String::from("    behaviors {\n");
        for ht in hold_taps {
            if ht.bindings.len() != 2 {
                return Err(EmitError::HoldTapArity(ht.name.clone()));
            }
            let _ = writeln!(out, "        {name}: {name} {{", name = ht.name);
            let _ = writeln!(
                out,
                "            compatible = \"{}\";",
                self.profile.compatible.hold_tap
            );
            out.push_str("            #binding-cells = <2>;\n");
            if let Some(flavor) = &ht.flavor {
                let _ = writeln!(out, "            flavor = \"{flavor}\";");
            }
            push_int_property(&mut out, "tapping-term-ms", ht.tapping_term_ms);
            push_int_property(&mut out, "quick-tap-ms", ht.quick_tap_ms);
            let cells = ht.bindings.iter().map(|b| format!("<{b}>")).join(", ");
            let _ = writeln!(out, "            bindings = {cells};");
            if let Some(positions) = &ht.hold_trigger_key_positions {
                let list = positions.iter().map(u16::to_string).join(" ");
                let _ = writeln!(out, "            hold-trigger-key-positions = <{list}>;");
            }
            if ht.hold_trigger_on_release == Some(true) {
                out.push_str("            hold-trigger-on-release;\n");
            }
            if let Some(description) = &ht.description {
                let _ = writeln!(out, "            label = \"{description}\";");
            }
            push_int_property(&mut out, "require-prior-idle-ms", ht.require_prior_idle_ms);
            if ht.retro_tap == Some(true) {
                out.push_str("            retro-tap;\n");
            }
            out.push_str("        };\n");
        }
        out.push_str("    };");
        Ok(out)
    }

    /// Tap-dance definitions, same shape as hold-taps.
    pub fn generate_tap_dances_dtsi(
        &self,
        tap_dances: &[TapDanceBehavior],
    ) -> Result<String, EmitError> {
        if tap_dances.is_empty() {
            return Ok(String::new());
        }
        let mut out = String::from("    behaviors {\n");
        for td in tap_dances {
            if td.bindings.len() < 2 {
                return Err(EmitError::TapDanceArity(td.name.clone()));
            }
            let _ = writeln!(out, "        {name}: {name} {{", name = td.name);
            let _ = writeln!(
                out,
                "            compatible = \"{}\";",
                self.profile.compatible.tap_dance
            );
            out.push_str("            #binding-cells = <0>;\n");
            push_int_property(&mut out, "tapping-term-ms", td.tapping_term_ms);
            let cells = td.bindings.iter().map(|b| format!("<{b}>")).join(", ");
            let _ = writeln!(out, "            bindings = {cells};");
            if let Some(description) = &td.description {
                let _ = writeln!(out, "            label = \"{description}\";");
            }
            out.push_str("        };\n");
        }
        out.push_str("    };");
        Ok(out)
    }

    /// Full `/ { combos { … }; };` block.
    pub fn generate_combos_dtsi(&self, combos: &[ComboBehavior]) -> Result<String, EmitError> {
        if combos.is_empty() {
            return Ok(String::new());
        }
        let mut out = String::from("/ {\n    combos {\n");
        let _ = writeln!(
            out,
            "        compatible = \"{}\";",
            self.profile.compatible.combos
        );
        for combo in combos {
            if combo.key_positions.is_empty() {
                return Err(EmitError::EmptyComboPositions(combo.name.clone()));
            }
            let _ = writeln!(out, "        {} {{", combo.name);
            push_int_property_at(&mut out, 12, "timeout-ms", combo.timeout_ms);
            let positions = combo.key_positions.iter().map(u16::to_string).join(" ");
            let _ = writeln!(out, "            key-positions = <{positions}>;");
            if let Some(layers) = &combo.layers {
                let list = layers.iter().map(i64::to_string).join(" ");
                let _ = writeln!(out, "            layers = <{list}>;");
            }
            let _ = writeln!(out, "            bindings = <{}>;", combo.binding);
            push_int_property_at(&mut out, 12, "require-prior-idle-ms", combo.require_prior_idle_ms);
            out.push_str("        };\n");
        }
        out.push_str("    };\n};");
        Ok(out)
    }

    /// Full `/ { macros { … }; };` block.
    pub fn generate_macros_dtsi(&self, macros: &[MacroBehavior]) -> String {
        if macros.is_empty() {
            return String::new();
        }
        let mut out = String::from("/ {\n    macros {\n");
        for mac in macros {
            let _ = writeln!(out, "        {name}: {name} {{", name = mac.name);
            let _ = writeln!(
                out,
                "            compatible = \"{}\";",
                self.profile.compatible.macro_
            );
            out.push_str("            #binding-cells = <0>;\n");
            let stream = format_binding_stream(&mac.bindings);
            let _ = writeln!(out, "            bindings = <{stream}>;");
            if let Some(description) = &mac.description {
                let _ = writeln!(out, "            label = \"{description}\";");
            }
            push_int_property_at(&mut out, 12, "tap-ms", mac.tap_ms);
            push_int_property_at(&mut out, 12, "wait-ms", mac.wait_ms);
            out.push_str("        };\n");
        }
        out.push_str("    };\n};");
        out
    }

    /// Input listener overlays, emitted as bare `&listener { … };` roots.
    pub fn generate_input_listeners_dtsi(&self, listeners: &[InputListener]) -> String {
        let mut blocks = Vec::new();
        for listener in listeners {
            let mut out = String::new();
            let _ = writeln!(out, "{} {{", listener.code);
            for node in &listener.nodes {
                let _ = writeln!(out, "    {} {{", node.code);
                if let Some(description) = &node.description {
                    let _ = writeln!(out, "        label = \"{description}\";");
                }
                if !node.layers.is_empty() {
                    let list = node.layers.iter().map(i64::to_string).join(" ");
                    let _ = writeln!(out, "        layers = <{list}>;");
                }
                if !node.input_processors.is_empty() {
                    let stream = format_binding_stream(&node.input_processors);
                    let _ = writeln!(out, "        input-processors = <{stream}>;");
                }
                out.push_str("    };\n");
            }
            out.push_str("};");
            blocks.push(out);
        }
        blocks.join("\n\n")
    }

    /// The keymap node, without its `/ { … };` wrapper. Bindings of a layer
    /// are joined by single spaces on one line.
    pub fn generate_keymap_node(
        &self,
        layer_names: &[String],
        layers: &[Vec<LayoutBinding>],
    ) -> String {
        let mut out = String::from("    keymap {\n");
        let _ = writeln!(
            out,
            "        compatible = \"{}\";",
            self.profile.compatible.keymap
        );
        for (name, bindings) in layer_names.iter().zip(layers) {
            out.push('\n');
            let _ = writeln!(out, "        {name} {{");
            let stream = format_binding_stream(bindings);
            let _ = writeln!(out, "            bindings = <{stream}>;");
            out.push_str("        };\n");
        }
        out.push_str("    };");
        out
    }

    /// `.conf` content plus the mirrored settings map, in declared order.
    pub fn generate_kconfig_conf(
        &self,
        data: &LayoutData,
    ) -> (String, IndexMap<String, ConfigValue>) {
        let mut settings: IndexMap<String, ConfigValue> = IndexMap::new();
        settings.insert(
            format!("{}KEYBOARD_NAME", self.profile.patterns.kconfig_prefix),
            ConfigValue::Str(self.profile.keyboard_name.clone()),
        );
        for param in &data.config_parameters {
            let key = if param.param_name.starts_with("CONFIG_") {
                param.param_name.clone()
            } else {
                format!("{}{}", self.profile.patterns.kconfig_prefix, param.param_name)
            };
            settings.insert(key, param.value.clone());
        }

        let mut out = String::from("# Generated Kconfig configuration\n");
        let _ = writeln!(out, "# Keyboard: {}", self.profile.keyboard_name);
        out.push('\n');
        for (key, value) in &settings {
            let _ = writeln!(out, "{key}={value}");
        }
        (out, settings)
    }
}

/// `&kp Q &mo 1 &trans` — the flat form used inside a single cell list.
fn format_binding_stream(bindings: &[LayoutBinding]) -> String {
    bindings.iter().map(LayoutBinding::to_str).join(" ")
}

fn push_int_property(out: &mut String, name: &str, value: Option<u32>) {
    push_int_property_at(out, 12, name, value);
}

fn push_int_property_at(out: &mut String, indent: usize, name: &str, value: Option<u32>) {
    if let Some(n) = value {
        let _ = writeln!(out, "{:indent$}{name} = <{n}>;", "", indent = indent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zmk_layout_models::LayoutParam;

    fn profile() -> KeyboardProfile {
        KeyboardProfile::default()
    }

    fn binding(s: &str) -> LayoutBinding {
        LayoutBinding::from_str(s).unwrap()
    }

    #[test]
    fn layer_defines_follow_pattern_and_order() {
        let profile = profile();
        let gen = ZmkGenerator::new(&profile);
        let names = vec!["base".to_owned(), "nav".to_owned()];
        assert_eq!(
            gen.generate_layer_defines(&names),
            "#define base_LAYER 0\n#define nav_LAYER 1"
        );
    }

    #[test]
    fn behaviors_fixed_property_order() {
        let profile = profile();
        let gen = ZmkGenerator::new(&profile);
        let ht = HoldTapBehavior {
            name: "hm".into(),
            bindings: vec!["&kp".into(), "&kp".into()],
            tapping_term_ms: Some(280),
            quick_tap_ms: Some(175),
            flavor: Some("tap-preferred".into()),
            require_prior_idle_ms: Some(150),
            ..Default::default()
        };
        let out = gen.generate_behaviors_dtsi(&[ht]).unwrap();
        let compatible = out.find("compatible").unwrap();
        let cells = out.find("#binding-cells").unwrap();
        let flavor = out.find("flavor").unwrap();
        let term = out.find("tapping-term-ms").unwrap();
        let quick = out.find("quick-tap-ms").unwrap();
        let bindings = out.find("bindings").unwrap();
        let idle = out.find("require-prior-idle-ms").unwrap();
        assert!(compatible < cells && cells < flavor && flavor < term);
        assert!(term < quick && quick < bindings && bindings < idle);
        assert!(out.contains("bindings = <&kp>, <&kp>;"));
    }

    #[test]
    fn behaviors_reject_bad_arity() {
        let profile = profile();
        let gen = ZmkGenerator::new(&profile);
        let ht = HoldTapBehavior {
            name: "broken".into(),
            bindings: vec!["&kp".into()],
            ..Default::default()
        };
        assert_eq!(
            gen.generate_behaviors_dtsi(&[ht]),
            Err(EmitError::HoldTapArity("broken".into()))
        );
    }

    #[test]
    fn combo_emission_shape() {
        let profile = profile();
        let gen = ZmkGenerator::new(&profile);
        let combo = ComboBehavior {
            name: "esc_combo".into(),
            description: None,
            key_positions: vec![0, 1],
            binding: binding("&kp ESC"),
            timeout_ms: Some(50),
            layers: None,
            require_prior_idle_ms: None,
        };
        let out = gen.generate_combos_dtsi(&[combo]).unwrap();
        assert!(out.starts_with("/ {\n    combos {"));
        assert!(out.contains("compatible = \"zmk,combos\";"));
        assert!(out.contains("esc_combo {"));
        assert!(out.contains("timeout-ms = <50>;"));
        assert!(out.contains("key-positions = <0 1>;"));
        assert!(out.contains("bindings = <&kp ESC>;"));
        let timeout = out.find("timeout-ms").unwrap();
        let positions = out.find("key-positions").unwrap();
        let bindings = out.find("bindings").unwrap();
        assert!(timeout < positions && positions < bindings);
    }

    #[test]
    fn keymap_node_joins_bindings_with_single_spaces() {
        let profile = profile();
        let gen = ZmkGenerator::new(&profile);
        let names = vec!["base".to_owned()];
        let layers = vec![vec![binding("&kp Q"), binding("&kp LC(LS(A))"), binding("&trans")]];
        let out = gen.generate_keymap_node(&names, &layers);
        assert!(out.contains("bindings = <&kp Q &kp LC(LS(A)) &trans>;"));
        assert!(out.contains("compatible = \"zmk,keymap\";"));
    }

    #[test]
    fn nested_params_format_with_commas() {
        let b = LayoutBinding::new(
            "&kp",
            vec![LayoutParam::new(
                "LC",
                vec![LayoutParam::new("LS", vec![LayoutParam::word("A")])],
            )],
        );
        assert_eq!(b.to_str(), "&kp LC(LS(A))");
    }

    #[test]
    fn absent_numeric_properties_are_omitted() {
        let profile = profile();
        let gen = ZmkGenerator::new(&profile);
        let ht = HoldTapBehavior {
            name: "hm".into(),
            bindings: vec!["&kp".into(), "&kp".into()],
            ..Default::default()
        };
        let out = gen.generate_behaviors_dtsi(&[ht]).unwrap();
        assert!(!out.contains("tapping-term-ms"));
        assert!(!out.contains("flavor"));
    }

    #[test]
    fn kconfig_declared_order_and_value_forms() {
        let mut profile = profile();
        profile.keyboard_name = "corne".into();
        let gen = ZmkGenerator::new(&profile);
        let mut data = LayoutData::new("corne", "t");
        data.config_parameters = vec![
            zmk_layout_models::ConfigParameter {
                param_name: "SLEEP".into(),
                value: ConfigValue::Bool(true),
                description: None,
            },
            zmk_layout_models::ConfigParameter {
                param_name: "IDLE_TIMEOUT".into(),
                value: ConfigValue::Int(60000),
                description: None,
            },
        ];
        let (content, settings) = gen.generate_kconfig_conf(&data);
        assert!(content.starts_with("# Generated Kconfig configuration"));
        let name_at = content.find("CONFIG_ZMK_KEYBOARD_NAME=\"corne\"").unwrap();
        let sleep_at = content.find("CONFIG_ZMK_SLEEP=y").unwrap();
        let idle_at = content.find("CONFIG_ZMK_IDLE_TIMEOUT=60000").unwrap();
        assert!(name_at < sleep_at && sleep_at < idle_at);
        assert_eq!(settings.len(), 3);
        assert_eq!(
            settings.get("CONFIG_ZMK_SLEEP"),
            Some(&ConfigValue::Bool(true))
        );
    }

    #[test]
    fn emission_is_deterministic() {
        let profile = profile();
        let gen = ZmkGenerator::new(&profile);
        let mut data = LayoutData::new("kb", "t");
        data.layer_names = vec!["base".into()];
        data.layers = vec![vec![binding("&kp A"), binding("&mo 1")]];
        data.macros.push(MacroBehavior {
            name: "m1".into(),
            bindings: vec![binding("&kp X")],
            ..Default::default()
        });
        let first = gen.generate_fragments(&data).unwrap();
        let second = gen.generate_fragments(&data).unwrap();
        assert_eq!(first.keymap_node, second.keymap_node);
        assert_eq!(first.macros_dtsi, second.macros_dtsi);
        assert_eq!(first.kconfig_lines, second.kconfig_lines);
    }
}
