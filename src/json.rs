//! JSON layout document load/dump.
//!
//! Loading accepts a string or an already-parsed value, validates it into the
//! model, and optionally resolves `${var}` / `{{var}}` placeholders from the
//! document's `variables` map. The resolution flag is an explicit parameter;
//! round-trip tooling passes `skip_variable_resolution = true` to keep
//! placeholders verbatim.

use zmk_layout_models::{LayoutBinding, LayoutData, ParamValue};

/// Parse and validate a layout document from a JSON string.
pub fn parse_layout_data(
    content: &str,
    skip_variable_resolution: bool,
) -> Result<LayoutData, serde_json::Error> {
    let mut data: LayoutData = serde_json::from_str(content)?;
    if !skip_variable_resolution {
        resolve_variables(&mut data);
    }
    Ok(data)
}

/// Parse and validate a layout document from a decoded JSON value.
pub fn parse_layout_value(
    value: serde_json::Value,
    skip_variable_resolution: bool,
) -> Result<LayoutData, serde_json::Error> {
    let mut data: LayoutData = serde_json::from_value(value)?;
    if !skip_variable_resolution {
        resolve_variables(&mut data);
    }
    Ok(data)
}

/// Serialize with stable key order and two-space indentation; unset optional
/// fields are omitted. Variables are left untouched so the output
/// round-trips.
pub fn serialize_layout_data(data: &LayoutData) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}

fn variable_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute `${name}`, `{{name}}` and `{{ name }}` occurrences from the
/// document's `variables` map. One pass, no recursion into replacements.
fn resolve_variables(data: &mut LayoutData) {
    if data.variables.is_empty() {
        return;
    }
    let substitutions: Vec<(Vec<String>, String)> = data
        .variables
        .iter()
        .map(|(name, value)| {
            (
                vec![
                    format!("${{{name}}}"),
                    format!("{{{{{name}}}}}"),
                    format!("{{{{ {name} }}}}"),
                ],
                variable_text(value),
            )
        })
        .collect();

    let apply = |text: &mut String| {
        for (patterns, replacement) in &substitutions {
            for pattern in patterns {
                if text.contains(pattern.as_str()) {
                    *text = text.replace(pattern.as_str(), replacement);
                }
            }
        }
    };

    for layer in &mut data.layers {
        for binding in layer {
            resolve_binding(binding, &apply);
        }
    }
    for combo in &mut data.combos {
        resolve_binding(&mut combo.binding, &apply);
    }
    for mac in &mut data.macros {
        for binding in &mut mac.bindings {
            resolve_binding(binding, &apply);
        }
    }
    for td in &mut data.tap_dances {
        for binding in &mut td.bindings {
            resolve_binding(binding, &apply);
        }
    }
    apply(&mut data.custom_defined_behaviors);
    apply(&mut data.custom_devicetree);
}

fn resolve_binding(binding: &mut LayoutBinding, apply: &impl Fn(&mut String)) {
    apply(&mut binding.behavior);
    // Parameter trees are shallow in practice; walk them with a work list.
    let mut stack: Vec<&mut zmk_layout_models::LayoutParam> =
        binding.params.iter_mut().collect();
    while let Some(param) = stack.pop() {
        if let ParamValue::Str(s) = &mut param.value {
            apply(s);
            // A substitution may have produced a number, e.g. `&mo ${nav}`
            // with nav = 2; re-classify so layer references validate.
            if let Ok(n) = s.parse::<i64>() {
                param.value = ParamValue::Int(n);
            }
        }
        stack.extend(param.params.iter_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "keyboard": "corne",
        "title": "Test",
        "layer_names": ["base"],
        "layers": [["&kp ${main_key}", {"value": "&mo", "params": [1]}]],
        "variables": {"main_key": "Q"}
    }"#;

    #[test]
    fn variables_resolve_by_default() {
        let data = parse_layout_data(DOC, false).unwrap();
        assert_eq!(data.layers[0][0].to_str(), "&kp Q");
    }

    #[test]
    fn skip_flag_preserves_placeholders() {
        let data = parse_layout_data(DOC, true).unwrap();
        assert_eq!(data.layers[0][0].params[0].value.as_str(), Some("${main_key}"));
    }

    #[test]
    fn double_brace_placeholders() {
        let doc = r#"{
            "keyboard": "kb",
            "title": "t",
            "layer_names": ["base"],
            "layers": [["&kp {{ key }}"]],
            "variables": {"key": "W"}
        }"#;
        let data = parse_layout_data(doc, false).unwrap();
        assert_eq!(data.layers[0][0].to_str(), "&kp W");
    }

    #[test]
    fn serialize_then_parse_is_identity() {
        let data = parse_layout_data(DOC, true).unwrap();
        let json = serialize_layout_data(&data).unwrap();
        let back = parse_layout_data(&json, true).unwrap();
        assert_eq!(data, back);
    }

    #[test]
    fn dump_uses_wire_aliases_and_omits_unset() {
        let mut data = parse_layout_data(DOC, true).unwrap();
        data.hold_taps.push(zmk_layout_models::HoldTapBehavior {
            name: "hm".into(),
            bindings: vec!["&kp".into(), "&kp".into()],
            ..Default::default()
        });
        let json = serialize_layout_data(&data).unwrap();
        assert!(json.contains("\"holdTaps\""));
        assert!(!json.contains("tappingTermMs"));
        assert!(!json.contains("\"combos\""));
    }

    #[test]
    fn parse_layout_value_accepts_decoded_json() {
        let value: serde_json::Value = serde_json::from_str(DOC).unwrap();
        let data = parse_layout_value(value, true).unwrap();
        assert_eq!(data.keyboard, "corne");
    }

    #[test]
    fn numeric_variable_renders_as_number() {
        let doc = r#"{
            "keyboard": "kb",
            "title": "t",
            "layer_names": ["base"],
            "layers": [["&mo ${nav}"]],
            "variables": {"nav": 2}
        }"#;
        let data = parse_layout_data(doc, false).unwrap();
        assert_eq!(data.layers[0][0].to_str(), "&mo 2");
    }
}
