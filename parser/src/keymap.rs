//! Whole-document entry point: parse a `.keymap` into a [`LayoutData`].

use crate::dt::{parse_dt, ParseError};
use crate::extract::{extract_layout, harvest_defines};
use rustc_hash::FxHashMap;
use zmk_layout_models::LayoutData;

/// Rough format sniffing for inputs that could be either JSON layout
/// documents or devicetree keymaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFormat {
    Json,
    DeviceTree,
}

/// JSON starts with `{` after whitespace; everything else is attempted as
/// devicetree.
pub fn detect_format(content: &str) -> DetectedFormat {
    match content.trim_start().as_bytes().first() {
        Some(b'{') => DetectedFormat::Json,
        _ => DetectedFormat::DeviceTree,
    }
}

/// Outcome of a keymap parse. `layout` is always present and best-effort;
/// `errors` being empty means the document was structurally sound.
#[derive(Debug)]
pub struct KeymapParseResult {
    pub layout: LayoutData,
    pub errors: Vec<ParseError>,
    pub warnings: Vec<ParseError>,
}

impl KeymapParseResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parses `.keymap` sources and keeps the `#define` table of the last parse
/// for callers that need to resolve substitutions themselves.
#[derive(Debug, Default)]
pub struct ZmkKeymapParser {
    defines: FxHashMap<String, String>,
}

impl ZmkKeymapParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// `#define` directives harvested by the most recent
    /// [`parse_keymap`](Self::parse_keymap) call.
    pub fn defines(&self) -> &FxHashMap<String, String> {
        &self.defines
    }

    /// Parse keymap source for `keyboard` into a layout. Never fails: a
    /// malformed document yields a partial layout plus diagnostics.
    pub fn parse_keymap(&mut self, content: &str, keyboard: &str) -> KeymapParseResult {
        let (roots, parse_diagnostics) = parse_dt(content);
        self.defines = harvest_defines(&roots);
        log::debug!(
            "parsed {} roots, {} defines for '{keyboard}'",
            roots.len(),
            self.defines.len()
        );

        let extraction = extract_layout(&roots, content, &self.defines);
        let mut layout = extraction.layout;
        layout.keyboard = keyboard.to_owned();
        if layout.title.is_empty() {
            layout.title = format!("{keyboard} keymap");
        }

        let (errors, warnings): (Vec<ParseError>, Vec<ParseError>) = parse_diagnostics
            .into_iter()
            .chain(extraction.diagnostics)
            .partition(ParseError::is_error);
        KeymapParseResult {
            layout,
            errors,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_json_by_leading_brace() {
        assert_eq!(detect_format("  {\"keyboard\": \"x\"}"), DetectedFormat::Json);
        assert_eq!(detect_format("/ { };"), DetectedFormat::DeviceTree);
        assert_eq!(detect_format(""), DetectedFormat::DeviceTree);
        assert_eq!(
            detect_format("#include <behaviors.dtsi>"),
            DetectedFormat::DeviceTree
        );
    }

    #[test]
    fn parse_keymap_fills_metadata() {
        let mut parser = ZmkKeymapParser::new();
        let result = parser.parse_keymap(
            "/ { keymap { compatible = \"zmk,keymap\"; base { bindings = <&kp A>; }; }; };",
            "corne",
        );
        assert!(result.is_ok(), "errors: {:?}", result.errors);
        assert_eq!(result.layout.keyboard, "corne");
        assert_eq!(result.layout.title, "corne keymap");
        assert_eq!(result.layout.layer_names, vec!["base"]);
    }

    #[test]
    fn parse_keymap_keeps_defines() {
        let mut parser = ZmkKeymapParser::new();
        parser.parse_keymap("#define SLOW 400\n/ { keymap { compatible = \"zmk,keymap\"; }; };", "kb");
        assert_eq!(parser.defines().get("SLOW").map(String::as_str), Some("400"));
    }

    #[test]
    fn malformed_input_yields_partial_layout() {
        let mut parser = ZmkKeymapParser::new();
        let result = parser.parse_keymap("/ { keymap { compatible = ", "kb");
        assert!(!result.is_ok());
        assert_eq!(result.layout.keyboard, "kb");
    }
}
