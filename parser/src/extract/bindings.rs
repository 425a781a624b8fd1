//! Splitting `bindings` cell-lists into typed bindings.
//!
//! A cell-list such as `<&kp LC(LS(A)) &mt LSHIFT ESC &trans>` is a flat
//! stream: each reference starts a new binding and the tokens that follow are
//! its parameters until the next reference. Nested call forms arrive from the
//! parser as single strings (`"LC(LS(A))"`) and are re-parsed into parameter
//! trees here.

use crate::dt::{DTValue, ParseError};
use rustc_hash::FxHashMap;
use zmk_layout_models::{parse_params, LayoutBinding, LayoutParam};

/// Split a `bindings` property value into bindings.
///
/// `at` is the (line, column) used for diagnostics, typically the owning
/// node's position. Malformed elements degrade to placeholder bindings so the
/// sequence length stays stable.
pub fn split_bindings(
    value: &DTValue,
    defines: &FxHashMap<String, String>,
    at: (usize, usize),
    diagnostics: &mut Vec<ParseError>,
) -> Vec<LayoutBinding> {
    let mut elements = Vec::new();
    flatten(value, &mut elements);

    let mut bindings: Vec<LayoutBinding> = Vec::new();
    let mut current: Option<LayoutBinding> = None;
    for element in elements {
        match element {
            DTValue::Reference(name) => {
                bindings.extend(current.take());
                current = Some(LayoutBinding::bare(format!("&{name}")));
            }
            DTValue::Integer(n) => match current.as_mut() {
                Some(binding) => binding.params.push(LayoutParam::int(*n)),
                None => diagnostics.push(ParseError::warning(
                    format!("standalone parameter '{n}' outside a binding; dropped"),
                    at.0,
                    at.1,
                )),
            },
            DTValue::String(s) => match current.as_mut() {
                Some(binding) => binding.params.extend(parse_param_text(
                    s,
                    defines,
                    at,
                    diagnostics,
                )),
                None => diagnostics.push(ParseError::warning(
                    format!("standalone parameter '{s}' outside a binding; dropped"),
                    at.0,
                    at.1,
                )),
            },
            DTValue::Boolean(_) | DTValue::Bytes(_) | DTValue::Array(_) => {
                diagnostics.push(ParseError::warning(
                    "uninterpretable element in bindings list; kept as placeholder",
                    at.0,
                    at.1,
                ));
                bindings.extend(current.take());
                bindings.push(LayoutBinding::bare(format!("{element:?}")));
            }
        }
    }
    bindings.extend(current);
    bindings
}

/// Flatten nested arrays (`<…>, <…>` groups and parenthesized expressions)
/// into one element stream.
fn flatten<'v>(value: &'v DTValue, out: &mut Vec<&'v DTValue>) {
    match value {
        DTValue::Array(items) => {
            for item in items {
                flatten(item, out);
            }
        }
        other => out.push(other),
    }
}

/// Parse one parameter token, applying a single pass of `#define`
/// substitution to bare identifiers.
fn parse_param_text(
    text: &str,
    defines: &FxHashMap<String, String>,
    at: (usize, usize),
    diagnostics: &mut Vec<ParseError>,
) -> Vec<LayoutParam> {
    let resolved = if !text.contains('(') {
        match defines.get(text) {
            Some(replacement) if !replacement.is_empty() => {
                log::debug!("substituting define {text} -> {replacement}");
                replacement.as_str()
            }
            _ => text,
        }
    } else {
        text
    };
    match parse_params(resolved) {
        Ok(params) => params,
        Err(reason) => {
            diagnostics.push(ParseError::warning(
                format!("malformed parameter '{text}': {reason}"),
                at.0,
                at.1,
            ));
            vec![LayoutParam::word(text)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zmk_layout_models::ParamValue;

    fn defines() -> FxHashMap<String, String> {
        FxHashMap::default()
    }

    fn cells(items: Vec<DTValue>) -> DTValue {
        DTValue::Array(items)
    }

    #[test]
    fn splits_on_references() {
        let value = cells(vec![
            DTValue::Reference("kp".into()),
            DTValue::String("Q".into()),
            DTValue::Reference("mt".into()),
            DTValue::String("LSHIFT".into()),
            DTValue::String("ESC".into()),
            DTValue::Reference("trans".into()),
        ]);
        let mut diags = Vec::new();
        let bindings = split_bindings(&value, &defines(), (1, 1), &mut diags);
        assert!(diags.is_empty());
        assert_eq!(
            bindings
                .iter()
                .map(LayoutBinding::to_str)
                .collect::<Vec<_>>(),
            vec!["&kp Q", "&mt LSHIFT ESC", "&trans"]
        );
    }

    #[test]
    fn nested_call_text_becomes_param_tree() {
        let value = cells(vec![
            DTValue::Reference("kp".into()),
            DTValue::String("LC(LS(A))".into()),
        ]);
        let mut diags = Vec::new();
        let bindings = split_bindings(&value, &defines(), (1, 1), &mut diags);
        assert_eq!(bindings.len(), 1);
        let outer = &bindings[0].params[0];
        assert_eq!(outer.value, ParamValue::Str("LC".into()));
        assert_eq!(outer.params[0].value, ParamValue::Str("LS".into()));
        assert_eq!(outer.params[0].params[0].value, ParamValue::Str("A".into()));
    }

    #[test]
    fn standalone_parameter_warns_and_drops() {
        let value = cells(vec![
            DTValue::String("Q".into()),
            DTValue::Reference("kp".into()),
            DTValue::String("W".into()),
        ]);
        let mut diags = Vec::new();
        let bindings = split_bindings(&value, &defines(), (3, 5), &mut diags);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].to_str(), "&kp W");
        assert_eq!(diags.len(), 1);
        assert_eq!((diags[0].line, diags[0].column), (3, 5));
    }

    #[test]
    fn define_substitution_single_pass() {
        let mut defines = defines();
        defines.insert("HM_A".into(), "LGUI".into());
        let value = cells(vec![
            DTValue::Reference("kp".into()),
            DTValue::String("HM_A".into()),
        ]);
        let mut diags = Vec::new();
        let bindings = split_bindings(&value, &defines, (1, 1), &mut diags);
        assert_eq!(bindings[0].to_str(), "&kp LGUI");
    }

    #[test]
    fn comma_separated_groups_flatten() {
        // <&kp>, <&mo> as used by hold-tap and macro properties.
        let value = cells(vec![
            DTValue::Array(vec![
                DTValue::Reference("kp".into()),
                DTValue::String("A".into()),
            ]),
            DTValue::Array(vec![
                DTValue::Reference("kp".into()),
                DTValue::String("B".into()),
            ]),
        ]);
        let mut diags = Vec::new();
        let bindings = split_bindings(&value, &defines(), (1, 1), &mut diags);
        assert_eq!(
            bindings
                .iter()
                .map(LayoutBinding::to_str)
                .collect::<Vec<_>>(),
            vec!["&kp A", "&kp B"]
        );
    }

    #[test]
    fn numeric_params_stay_integers() {
        let value = cells(vec![
            DTValue::Reference("mo".into()),
            DTValue::Integer(2),
        ]);
        let mut diags = Vec::new();
        let bindings = split_bindings(&value, &defines(), (1, 1), &mut diags);
        assert_eq!(bindings[0].params[0].value, ParamValue::Int(2));
    }
}
