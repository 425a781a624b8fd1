//! The owning `Layout` façade.
//!
//! A `Layout` owns one [`LayoutData`] and hands out short-lived managers for
//! mutation, a validation pipeline for inspection and an export manager for
//! generation. Single-owner discipline is enforced by the borrow checker:
//! managers borrow the layout mutably, so two of them can never mutate the
//! same data at once.

use crate::generators::builders::ExportManager;
use crate::managers::{BehaviorManager, LayerManager};
use crate::providers::{create_default_providers, LayoutProviders};
use crate::validation::ValidationPipeline;
use zmk_layout_models::{LayoutData, LayoutError};
use zmk_layout_parser::dt::ParseError;
use zmk_layout_parser::{detect_format, DetectedFormat, ZmkKeymapParser};

/// Result of importing a `.keymap`: the layout plus all diagnostics.
#[derive(Debug)]
pub struct KeymapImport {
    pub layout: Layout,
    pub errors: Vec<ParseError>,
    pub warnings: Vec<ParseError>,
}

impl KeymapImport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug)]
pub struct Layout {
    data: LayoutData,
    providers: LayoutProviders,
}

impl Layout {
    pub fn new(data: LayoutData, providers: Option<LayoutProviders>) -> Self {
        Self {
            data,
            providers: providers.unwrap_or_else(create_default_providers),
        }
    }

    /// Empty layout with no layers.
    pub fn create_empty(keyboard: impl Into<String>, title: impl Into<String>) -> Self {
        let keyboard = keyboard.into();
        let mut title = title.into();
        if title.is_empty() {
            title = format!("New {keyboard} Layout");
        }
        Self::new(LayoutData::new(keyboard, title), None)
    }

    /// Load from a JSON layout document.
    pub fn from_json(content: &str) -> Result<Self, crate::Error> {
        let data = crate::json::parse_layout_data(content, false)?;
        data.check_invariants()?;
        Ok(Self::new(data, None))
    }

    /// Parse a `.keymap` devicetree source. Never fails outright: malformed
    /// input yields a partial layout plus diagnostics on the import record.
    pub fn from_keymap(content: &str, keyboard: &str) -> KeymapImport {
        let mut parser = ZmkKeymapParser::new();
        let result = parser.parse_keymap(content, keyboard);
        KeymapImport {
            layout: Self::new(result.layout, None),
            errors: result.errors,
            warnings: result.warnings,
        }
    }

    /// Auto-detect JSON vs devicetree input.
    pub fn from_string(content: &str, keyboard: &str) -> Result<KeymapImport, crate::Error> {
        match detect_format(content) {
            DetectedFormat::Json => {
                let layout = Self::from_json(content)?;
                Ok(KeymapImport {
                    layout,
                    errors: Vec::new(),
                    warnings: Vec::new(),
                })
            }
            DetectedFormat::DeviceTree => Ok(Self::from_keymap(content, keyboard)),
        }
    }

    pub fn data(&self) -> &LayoutData {
        &self.data
    }

    pub(crate) fn providers(&self) -> &LayoutProviders {
        &self.providers
    }

    /// Fluent layer operations.
    pub fn layers(&mut self) -> LayerManager<'_> {
        LayerManager::new(&mut self.data)
    }

    /// Fluent behavior operations.
    pub fn behaviors(&mut self) -> BehaviorManager<'_> {
        BehaviorManager::new(&mut self.data)
    }

    /// Start an immutable validation pipeline over this layout.
    pub fn validate(&self) -> ValidationPipeline<'_> {
        ValidationPipeline::new(&self.data)
    }

    /// Export façade for keymap/config generation.
    pub fn export(&self) -> ExportManager<'_> {
        ExportManager::new(self)
    }

    /// Hard structural invariants; a clean result is required before emit.
    pub fn check(&self) -> Result<(), LayoutError> {
        self.data.check_invariants()
    }

    /// Serialize to a JSON layout document.
    pub fn to_json(&self) -> Result<String, crate::Error> {
        Ok(crate::json::serialize_layout_data(&self.data)?)
    }

    /// Deep copy sharing the same providers.
    pub fn copy(&self) -> Self {
        Self {
            data: self.data.clone(),
            providers: self.providers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_empty_defaults_title() {
        let layout = Layout::create_empty("corne", "");
        assert_eq!(layout.data().title, "New corne Layout");
        assert_eq!(layout.data().keyboard, "corne");
    }

    #[test]
    fn from_string_detects_json() {
        let import = Layout::from_string(
            r#"{"keyboard": "corne", "title": "t", "layer_names": ["base"], "layers": [["&kp A"]]}"#,
            "ignored",
        )
        .unwrap();
        assert!(import.is_clean());
        assert_eq!(import.layout.data().keyboard, "corne");
    }

    #[test]
    fn from_string_detects_devicetree() {
        let import = Layout::from_string(
            "/ { keymap { compatible = \"zmk,keymap\"; base { bindings = <&kp A>; }; }; };",
            "corne",
        )
        .unwrap();
        assert!(import.is_clean());
        assert_eq!(import.layout.data().layer_names, vec!["base"]);
    }

    #[test]
    fn copy_is_independent() {
        let mut layout = Layout::create_empty("kb", "t");
        layout.layers().add("base").unwrap();
        let copy = layout.copy();
        layout.layers().add("extra").unwrap();
        assert_eq!(copy.data().layer_names, vec!["base"]);
        assert_eq!(layout.data().layer_names, vec!["base", "extra"]);
    }

    #[test]
    fn check_flags_inconsistent_data() {
        let mut data = LayoutData::new("kb", "t");
        data.layer_names.push("orphan".into());
        let layout = Layout::new(data, None);
        assert!(layout.check().is_err());
    }
}
