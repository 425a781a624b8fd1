//! Provider interfaces the core consumes.
//!
//! Keyboard-specific data (key counts, include lists, kconfig defaults) comes
//! from a [`ConfigurationProvider`]; optional output templating goes through a
//! [`TemplateProvider`]. Both are pure from the core's perspective. Logging
//! uses the `log` facade directly.

pub mod factory;

pub use factory::{create_default_providers, DefaultConfigurationProvider, SimpleTemplateProvider};

use indexmap::IndexMap;
use std::rc::Rc;
use thiserror::Error;
use zmk_layout_models::{ConfigValue, LayoutData};

/// A behavior the target firmware ships with, e.g. `&kp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemBehavior {
    /// Reference name including the leading `&`.
    pub name: String,
    pub description: String,
}

impl SystemBehavior {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Keyboard-specific validation constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
    pub max_layers: usize,
    pub key_positions: Vec<usize>,
    pub supported_behaviors: Vec<String>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_layers: 10,
            key_positions: Vec::new(),
            supported_behaviors: Vec::new(),
        }
    }
}

/// Formatting preferences for generated files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattingConfig {
    /// Spaces between bindings when laying out rows.
    pub key_gap: usize,
    /// Spaces of base indentation inside generated nodes.
    pub base_indent: usize,
    /// Keys per row, used by key-position headers.
    pub rows: Vec<usize>,
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            key_gap: 1,
            base_indent: 4,
            rows: Vec::new(),
        }
    }
}

/// Compatible strings the emitter writes for each construct kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibleStrings {
    pub keymap: String,
    pub hold_tap: String,
    pub tap_dance: String,
    pub macro_: String,
    pub combos: String,
}

impl Default for CompatibleStrings {
    fn default() -> Self {
        Self {
            keymap: "zmk,keymap".into(),
            hold_tap: "zmk,behavior-hold-tap".into(),
            tap_dance: "zmk,behavior-tap-dance".into(),
            macro_: "zmk,behavior-macro".into(),
            combos: "zmk,combos".into(),
        }
    }
}

/// Text patterns for generated identifiers. `layer_define` understands the
/// `{layer_name}` and `{layer_index}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePatterns {
    pub kconfig_prefix: String,
    pub layer_define: String,
}

impl Default for ProfilePatterns {
    fn default() -> Self {
        Self {
            kconfig_prefix: "CONFIG_ZMK_".into(),
            layer_define: "#define {layer_name}_LAYER {layer_index}".into(),
        }
    }
}

/// Static text sections spliced into generated keymaps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeymapSections {
    pub header_includes: Vec<String>,
    pub key_position_header: String,
    pub system_behaviors_dts: String,
}

/// Everything the emitter needs to know about the target keyboard.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardProfile {
    pub keyboard_name: String,
    pub firmware_version: String,
    pub key_count: usize,
    pub compatible: CompatibleStrings,
    pub patterns: ProfilePatterns,
    pub keymap: KeymapSections,
    pub kconfig_options: IndexMap<String, ConfigValue>,
}

impl Default for KeyboardProfile {
    fn default() -> Self {
        Self {
            keyboard_name: "generic".into(),
            firmware_version: "1.0.0".into(),
            key_count: 42,
            compatible: CompatibleStrings::default(),
            patterns: ProfilePatterns::default(),
            keymap: KeymapSections {
                header_includes: vec!["behaviors.dtsi".into(), "dt-bindings/zmk/keys.h".into()],
                ..Default::default()
            },
            kconfig_options: IndexMap::new(),
        }
    }
}

impl KeyboardProfile {
    /// Minimal profile synthesized from a layout when the caller supplies
    /// none: keyboard name from the data, key count from the widest layer.
    pub fn for_layout(data: &LayoutData) -> Self {
        let mut profile = Self::default();
        if !data.keyboard.is_empty() {
            profile.keyboard_name = data.keyboard.clone();
        }
        let widest = data.max_layer_size();
        if widest > 0 {
            profile.key_count = widest;
        }
        profile
    }
}

/// Keyboard configuration abstraction. All methods are pure.
pub trait ConfigurationProvider {
    fn get_behavior_definitions(&self) -> Vec<SystemBehavior>;
    fn get_include_files(&self) -> Vec<String>;
    fn get_validation_rules(&self) -> ValidationRules;
    fn get_formatting_config(&self) -> FormattingConfig;
    fn get_kconfig_options(&self) -> IndexMap<String, ConfigValue>;
    fn get_template_context(&self) -> serde_json::Map<String, serde_json::Value>;
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("template rendering failed: {0}")]
    Render(String),
}

/// Optional template rendering hook. Absence means the core emits by plain
/// fragment concatenation.
pub trait TemplateProvider {
    fn render_string(
        &self,
        template: &str,
        context: &serde_json::Value,
    ) -> Result<String, ProviderError>;
    fn has_template_syntax(&self, content: &str) -> bool;
    fn escape_content(&self, content: &str) -> String;
}

/// The provider bundle a [`crate::Layout`] carries.
#[derive(Clone)]
pub struct LayoutProviders {
    pub configuration: Rc<dyn ConfigurationProvider>,
    pub template: Option<Rc<dyn TemplateProvider>>,
}

impl std::fmt::Debug for LayoutProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutProviders")
            .field("template", &self.template.is_some())
            .finish()
    }
}
