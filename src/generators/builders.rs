//! Fluent export façade: `layout.export().keymap()…generate()`.

use crate::generators::zmk::{EmitError, EmitFragments, ZmkGenerator};
use crate::layout::Layout;
use crate::providers::KeyboardProfile;
use indexmap::IndexMap;
use itertools::Itertools;
use zmk_layout_models::{ConfigParameter, ConfigValue, LayoutData};

/// Entry point for export operations on a [`Layout`].
pub struct ExportManager<'a> {
    layout: &'a Layout,
}

impl<'a> ExportManager<'a> {
    pub(crate) fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    /// Start a keymap export chain.
    pub fn keymap(&self) -> KeymapBuilder<'a> {
        KeymapBuilder::new(self.layout, None)
    }

    /// Start a keymap export chain with an explicit keyboard profile.
    pub fn keymap_with_profile(&self, profile: KeyboardProfile) -> KeymapBuilder<'a> {
        KeymapBuilder::new(self.layout, Some(profile))
    }

    /// Start a config export chain.
    pub fn config(&self) -> ConfigBuilder<'a> {
        ConfigBuilder::new(self.layout, None)
    }

    /// Start a config export chain with an explicit keyboard profile.
    pub fn config_with_profile(&self, profile: KeyboardProfile) -> ConfigBuilder<'a> {
        ConfigBuilder::new(self.layout, Some(profile))
    }

    /// Serialize the layout document to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        crate::json::serialize_layout_data(self.layout.data())
    }
}

/// Chainable keymap generation.
pub struct KeymapBuilder<'a> {
    layout: &'a Layout,
    profile: KeyboardProfile,
    include_headers: bool,
    include_behaviors: bool,
    include_combos: bool,
    include_macros: bool,
    include_tap_dances: bool,
    template: Option<String>,
    context: serde_json::Map<String, serde_json::Value>,
}

/// Profile synthesized from the layout plus whatever the configuration
/// provider knows (include list, kconfig defaults).
fn default_profile(layout: &Layout) -> KeyboardProfile {
    let mut profile = KeyboardProfile::for_layout(layout.data());
    let configuration = &layout.providers().configuration;
    let includes = configuration.get_include_files();
    if !includes.is_empty() {
        profile.keymap.header_includes = includes;
    }
    profile.kconfig_options = configuration.get_kconfig_options();
    profile
}

impl<'a> KeymapBuilder<'a> {
    fn new(layout: &'a Layout, profile: Option<KeyboardProfile>) -> Self {
        let profile = profile.unwrap_or_else(|| default_profile(layout));
        Self {
            layout,
            profile,
            include_headers: true,
            include_behaviors: true,
            include_combos: true,
            include_macros: true,
            include_tap_dances: true,
            template: None,
            context: serde_json::Map::new(),
        }
    }

    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }

    pub fn with_behaviors(mut self, include: bool) -> Self {
        self.include_behaviors = include;
        self
    }

    pub fn with_combos(mut self, include: bool) -> Self {
        self.include_combos = include;
        self
    }

    pub fn with_macros(mut self, include: bool) -> Self {
        self.include_macros = include;
        self
    }

    pub fn with_tap_dances(mut self, include: bool) -> Self {
        self.include_tap_dances = include;
        self
    }

    /// Use a template (source text, not a path) instead of the fixed
    /// concatenation order. Rendering goes through the layout's
    /// `TemplateProvider` when one is present, else plain `{{key}}`
    /// replacement over the fragment context.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Add a custom template context variable.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Produce the final keymap text.
    pub fn generate(self) -> Result<String, crate::Error> {
        let data = self.layout.data();
        let generator = ZmkGenerator::new(&self.profile);
        let mut fragments = generator.generate_fragments(data)?;
        if !self.include_behaviors {
            fragments.behaviors_dtsi.clear();
        }
        if !self.include_tap_dances {
            fragments.tap_dances_dtsi.clear();
        }
        if !self.include_combos {
            fragments.combos_dtsi.clear();
        }
        if !self.include_macros {
            fragments.macros_dtsi.clear();
        }

        if let Some(template) = &self.template {
            let context = self.template_context(data, &fragments);
            return self.render_template(template, &context);
        }
        Ok(self.assemble(data, &fragments))
    }

    fn resolved_includes(&self) -> String {
        self.profile
            .keymap
            .header_includes
            .iter()
            .map(|include| format!("#include <{include}>"))
            .join("\n")
    }

    /// Fixed assembly order; missing fragments collapse without leaving
    /// blank sections.
    fn assemble(&self, data: &LayoutData, fragments: &EmitFragments) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.include_headers {
            let year = time::OffsetDateTime::now_utc().year();
            parts.push(format!(
                "/*\n * Copyright (c) {year} The ZMK Contributors\n * SPDX-License-Identifier: MIT\n */"
            ));
            let includes = self.resolved_includes();
            if !includes.is_empty() {
                parts.push(includes);
            }
        }
        if !self.profile.keymap.key_position_header.is_empty() {
            parts.push(self.profile.keymap.key_position_header.clone());
        }
        if !fragments.layer_defines.is_empty() {
            parts.push(fragments.layer_defines.clone());
        }
        if !data.custom_defined_behaviors.is_empty() {
            parts.push(data.custom_defined_behaviors.clone());
        }
        if !fragments.behaviors_dtsi.is_empty() {
            parts.push(format!("/ {{\n{}\n}};", fragments.behaviors_dtsi));
        }
        if !fragments.tap_dances_dtsi.is_empty() {
            parts.push(format!("/ {{\n{}\n}};", fragments.tap_dances_dtsi));
        }
        if !fragments.combos_dtsi.is_empty() {
            parts.push(fragments.combos_dtsi.clone());
        }
        if !fragments.macros_dtsi.is_empty() {
            parts.push(fragments.macros_dtsi.clone());
        }
        if !self.profile.keymap.system_behaviors_dts.is_empty() {
            parts.push(self.profile.keymap.system_behaviors_dts.clone());
        }
        if !data.custom_devicetree.is_empty() {
            parts.push(data.custom_devicetree.clone());
        }
        if !fragments.input_listeners_dtsi.is_empty() {
            parts.push(fragments.input_listeners_dtsi.clone());
        }
        parts.push(format!("/ {{\n{}\n}};", fragments.keymap_node));

        let mut out = parts.join("\n\n");
        out.push('\n');
        out
    }

    fn template_context(&self, data: &LayoutData, fragments: &EmitFragments) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("keyboard".into(), data.keyboard.clone().into());
        map.insert(
            "layer_names".into(),
            serde_json::Value::from(data.layer_names.clone()),
        );
        map.insert("layer_defines".into(), fragments.layer_defines.clone().into());
        map.insert("keymap_node".into(), fragments.keymap_node.clone().into());
        map.insert(
            "user_behaviors_dtsi".into(),
            fragments.behaviors_dtsi.clone().into(),
        );
        map.insert(
            "user_tap_dances_dtsi".into(),
            fragments.tap_dances_dtsi.clone().into(),
        );
        map.insert("combos_dtsi".into(), fragments.combos_dtsi.clone().into());
        map.insert("user_macros_dtsi".into(), fragments.macros_dtsi.clone().into());
        map.insert("resolved_includes".into(), self.resolved_includes().into());
        map.insert(
            "key_position_header".into(),
            self.profile.keymap.key_position_header.clone().into(),
        );
        map.insert(
            "system_behaviors_dts".into(),
            self.profile.keymap.system_behaviors_dts.clone().into(),
        );
        map.insert(
            "custom_defined_behaviors".into(),
            data.custom_defined_behaviors.clone().into(),
        );
        map.insert(
            "custom_devicetree".into(),
            data.custom_devicetree.clone().into(),
        );
        map.insert(
            "profile_name".into(),
            format!(
                "{}/{}",
                self.profile.keyboard_name, self.profile.firmware_version
            )
            .into(),
        );
        map.insert(
            "firmware_version".into(),
            self.profile.firmware_version.clone().into(),
        );
        for (key, value) in &self.context {
            map.insert(key.clone(), value.clone());
        }
        serde_json::Value::Object(map)
    }

    fn render_template(
        &self,
        template: &str,
        context: &serde_json::Value,
    ) -> Result<String, crate::Error> {
        if let Some(provider) = &self.layout.providers().template {
            return provider
                .render_string(template, context)
                .map_err(|e| crate::Error::Template(e.to_string()));
        }
        // No provider wired in: plain {{key}} replacement.
        let map = context.as_object().expect("context built as object");
        let mut out = template.to_owned();
        for (key, value) in map {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out = out.replace(&format!("{{{{{key}}}}}"), &text);
            out = out.replace(&format!("{{{{ {key} }}}}"), &text);
        }
        Ok(out)
    }
}

/// Chainable `.conf` generation.
pub struct ConfigBuilder<'a> {
    layout: &'a Layout,
    profile: KeyboardProfile,
    options: IndexMap<String, ConfigValue>,
    use_defaults: bool,
}

impl<'a> ConfigBuilder<'a> {
    fn new(layout: &'a Layout, profile: Option<KeyboardProfile>) -> Self {
        let profile = profile.unwrap_or_else(|| default_profile(layout));
        Self {
            layout,
            profile,
            options: IndexMap::new(),
            use_defaults: true,
        }
    }

    /// Set one additional kconfig option; overrides a declared parameter of
    /// the same name.
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Include the profile's default kconfig options.
    pub fn with_defaults(mut self, use_defaults: bool) -> Self {
        self.use_defaults = use_defaults;
        self
    }

    /// Produce the `.conf` content plus the settings map mirroring it.
    pub fn generate(self) -> Result<(String, IndexMap<String, ConfigValue>), EmitError> {
        let mut data = self.layout.data().clone();
        if self.use_defaults {
            for (name, value) in &self.profile.kconfig_options {
                if !data.config_parameters.iter().any(|p| &p.param_name == name) {
                    data.config_parameters.push(ConfigParameter {
                        param_name: name.clone(),
                        value: value.clone(),
                        description: None,
                    });
                }
            }
        }
        for (name, value) in &self.options {
            match data
                .config_parameters
                .iter_mut()
                .find(|p| &p.param_name == name)
            {
                Some(param) => param.value = value.clone(),
                None => data.config_parameters.push(ConfigParameter {
                    param_name: name.clone(),
                    value: value.clone(),
                    description: None,
                }),
            }
        }
        let generator = ZmkGenerator::new(&self.profile);
        Ok(generator.generate_kconfig_conf(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;

    fn layout() -> Layout {
        let mut layout = Layout::create_empty("test_board", "Test Layout");
        {
            let mut layers = layout.layers();
            layers.add("base").unwrap().set(0, "&kp Q").unwrap().set(1, "&kp W").unwrap();
            layers.add("raise").unwrap().set(0, "&kp N1").unwrap();
        }
        layout
    }

    #[test]
    fn generate_basic_keymap() {
        let layout = layout();
        let keymap = layout.export().keymap().generate().unwrap();
        assert!(keymap.contains("keymap {"));
        assert!(keymap.contains("&kp Q"));
        assert!(keymap.contains("&kp W"));
        assert!(keymap.contains("compatible = \"zmk,keymap\";"));
    }

    #[test]
    fn headers_toggle() {
        let layout = layout();
        let with = layout.export().keymap().with_headers(true).generate().unwrap();
        let without = layout.export().keymap().with_headers(false).generate().unwrap();
        assert!(with.len() > without.len());
        assert!(with.contains("Copyright"));
        assert!(with.contains("#include <behaviors.dtsi>"));
        assert!(!without.contains("Copyright"));
    }

    #[test]
    fn behaviors_toggle() {
        let mut layout = layout();
        layout
            .behaviors()
            .add_hold_tap(zmk_layout_models::HoldTapBehavior {
                name: "mt_ctrl".into(),
                bindings: vec!["&kp".into(), "&kp".into()],
                tapping_term_ms: Some(200),
                ..Default::default()
            })
            .unwrap();
        let with = layout.export().keymap().generate().unwrap();
        assert!(with.contains("mt_ctrl"));
        let without = layout
            .export()
            .keymap()
            .with_behaviors(false)
            .generate()
            .unwrap();
        assert!(!without.contains("mt_ctrl"));
    }

    #[test]
    fn missing_fragments_collapse() {
        let layout = layout();
        let keymap = layout
            .export()
            .keymap()
            .with_headers(false)
            .generate()
            .unwrap();
        // No behaviors/combos/macros: output starts at the layer defines.
        assert!(keymap.starts_with("#define base_LAYER 0"));
        assert!(!keymap.contains("\n\n\n"));
    }

    #[test]
    fn template_rendering_without_provider() {
        let layout = layout();
        let out = layout
            .export()
            .keymap()
            .with_template("// {{keyboard}}\n{{keymap_node}}")
            .with_context("author", "someone")
            .generate()
            .unwrap();
        assert!(out.starts_with("// test_board"));
        assert!(out.contains("keymap {"));
    }

    #[test]
    fn config_builder_merges_options() {
        let layout = layout();
        let (content, settings) = layout
            .export()
            .config()
            .with_option("IDLE_TIMEOUT", 45000i64)
            .with_option("SLEEP", true)
            .generate()
            .unwrap();
        assert!(content.contains("# Generated Kconfig configuration"));
        assert!(content.contains("CONFIG_ZMK_KEYBOARD_NAME=\"test_board\""));
        assert!(content.contains("CONFIG_ZMK_IDLE_TIMEOUT=45000"));
        assert!(content.contains("CONFIG_ZMK_SLEEP=y"));
        assert_eq!(settings.get("CONFIG_ZMK_IDLE_TIMEOUT"), Some(&ConfigValue::Int(45000)));
    }

    #[test]
    fn keymap_emission_round_trips() {
        let layout = layout();
        let keymap = layout.export().keymap().generate().unwrap();
        let mut parser = zmk_layout_parser::ZmkKeymapParser::new();
        let result = parser.parse_keymap(&keymap, "test_board");
        assert!(result.is_ok(), "{:?}", result.errors);
        assert_eq!(result.layout.layer_names, vec!["base", "raise"]);
        assert_eq!(result.layout.layers[0].len(), 2);
        assert_eq!(result.layout.layers[0][0].to_str(), "&kp Q");
    }
}
