//! Default provider implementations for standalone use.

use super::{
    ConfigurationProvider, FormattingConfig, LayoutProviders, ProviderError, SystemBehavior,
    TemplateProvider, ValidationRules,
};
use indexmap::IndexMap;
use std::rc::Rc;
use zmk_layout_models::ConfigValue;

/// ZMK stock behaviors, used for validation when no external profile is
/// wired in.
const SYSTEM_BEHAVIORS: &[(&str, &str)] = &[
    ("&kp", "key press"),
    ("&mt", "mod-tap"),
    ("&lt", "layer-tap"),
    ("&mo", "momentary layer"),
    ("&to", "to layer"),
    ("&tog", "toggle layer"),
    ("&sl", "sticky layer"),
    ("&sk", "sticky key"),
    ("&trans", "transparent"),
    ("&none", "no-op"),
    ("&bootloader", "enter bootloader"),
    ("&reset", "reset keyboard"),
    ("&key_repeat", "repeat last key"),
    ("&caps_word", "caps word"),
    ("&gresc", "grave escape"),
    ("&rgb_ug", "RGB underglow control"),
    ("&bt", "bluetooth control"),
    ("&ext_power", "external power control"),
    ("&out", "output selection"),
];

/// Generic keyboard configuration with ZMK defaults.
#[derive(Debug, Default)]
pub struct DefaultConfigurationProvider;

impl ConfigurationProvider for DefaultConfigurationProvider {
    fn get_behavior_definitions(&self) -> Vec<SystemBehavior> {
        SYSTEM_BEHAVIORS
            .iter()
            .map(|(name, description)| SystemBehavior::new(*name, *description))
            .collect()
    }

    fn get_include_files(&self) -> Vec<String> {
        vec!["behaviors.dtsi".into(), "dt-bindings/zmk/keys.h".into()]
    }

    fn get_validation_rules(&self) -> ValidationRules {
        ValidationRules {
            max_layers: 10,
            key_positions: Vec::new(),
            supported_behaviors: SYSTEM_BEHAVIORS
                .iter()
                .map(|(name, _)| (*name).to_owned())
                .collect(),
        }
    }

    fn get_formatting_config(&self) -> FormattingConfig {
        FormattingConfig::default()
    }

    fn get_kconfig_options(&self) -> IndexMap<String, ConfigValue> {
        IndexMap::new()
    }

    fn get_template_context(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }
}

/// `{{key}}` substitution over a flat context; no control flow. Enough for
/// header templates without pulling in a real template engine.
#[derive(Debug, Default)]
pub struct SimpleTemplateProvider;

impl TemplateProvider for SimpleTemplateProvider {
    fn render_string(
        &self,
        template: &str,
        context: &serde_json::Value,
    ) -> Result<String, ProviderError> {
        let Some(map) = context.as_object() else {
            return Err(ProviderError::Render(
                "template context must be an object".into(),
            ));
        };
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

    fn has_template_syntax(&self, content: &str) -> bool {
        content.contains("{{") || content.contains("{%")
    }

    fn escape_content(&self, content: &str) -> String {
        content.replace("{{", "{{ '{{' }}").replace("{%", "{{ '{%' }}")
    }
}

/// Provider bundle used when the caller supplies none.
pub fn create_default_providers() -> LayoutProviders {
    LayoutProviders {
        configuration: Rc::new(DefaultConfigurationProvider),
        template: None,
    }
}
