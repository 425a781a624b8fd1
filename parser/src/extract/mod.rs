//! Lifting ZMK constructs out of parsed devicetree roots.
//!
//! Constructs are identified by their `compatible` string (hold-taps,
//! tap-dances, macros, the keymap node) or by conventional parent names
//! (`combos`, `macros`, `behaviors`). Anything unrecognized is preserved
//! verbatim so it survives a round-trip.

pub mod bindings;

pub use bindings::split_bindings;

use crate::dt::{DTNode, DTProperty, DTValue, ParseError};
use rustc_hash::FxHashMap;
use zmk_layout_models::{
    ComboBehavior, HoldTapBehavior, InputListener, InputListenerNode, LayoutBinding, LayoutData,
    MacroBehavior, TapDanceBehavior,
};

const KEYMAP_COMPATIBLE: &str = "zmk,keymap";
const HOLD_TAP_COMPATIBLE: &str = "zmk,behavior-hold-tap";
const TAP_DANCE_COMPATIBLE: &str = "zmk,behavior-tap-dance";
const MACRO_COMPATIBLE: &str = "zmk,behavior-macro";
const COMBOS_COMPATIBLE: &str = "zmk,combos";
const INPUT_LISTENER_COMPATIBLE: &str = "zmk,input-listener";
const INPUT_LISTENER_SUFFIX: &str = "_input_listener";

/// Outcome of extraction: a best-effort layout plus everything worth telling
/// the caller. An `Error`-severity diagnostic means no keymap node was found.
#[derive(Debug)]
pub struct ExtractionResult {
    pub layout: LayoutData,
    pub diagnostics: Vec<ParseError>,
}

/// Collect `#define NAME VALUE` directives from every node of every root.
pub fn harvest_defines(roots: &[DTNode]) -> FxHashMap<String, String> {
    let mut defines = FxHashMap::default();
    for root in roots {
        root.visit(&mut |node| {
            for conditional in &node.conditionals {
                if conditional.directive != "define" {
                    continue;
                }
                match conditional.condition.split_once(char::is_whitespace) {
                    Some((name, replacement)) => {
                        defines.insert(name.to_owned(), replacement.trim().to_owned());
                    }
                    None if !conditional.condition.is_empty() => {
                        defines.insert(conditional.condition.clone(), String::new());
                    }
                    None => {}
                }
            }
        });
    }
    defines
}

/// Walk `roots` and lift every recognized construct into a [`LayoutData`].
pub fn extract_layout(
    roots: &[DTNode],
    source: &str,
    defines: &FxHashMap<String, String>,
) -> ExtractionResult {
    let mut ex = Extractor {
        source,
        defines,
        layout: LayoutData::default(),
        diagnostics: Vec::new(),
    };
    ex.run(roots);
    ExtractionResult {
        layout: ex.layout,
        diagnostics: ex.diagnostics,
    }
}

struct Extractor<'a> {
    source: &'a str,
    defines: &'a FxHashMap<String, String>,
    layout: LayoutData,
    diagnostics: Vec<ParseError>,
}

impl<'a> Extractor<'a> {
    fn run(&mut self, roots: &[DTNode]) {
        self.extract_keymap(roots);
        self.extract_hold_taps(roots);
        self.extract_tap_dances(roots);
        self.extract_macros(roots);
        self.extract_combos(roots);
        self.extract_input_listeners(roots);
        self.extract_custom_behaviors(roots);
        self.extract_custom_devicetree(roots);
    }

    fn warn(&mut self, node: &DTNode, message: impl Into<String>) {
        self.diagnostics.push(ParseError::warning(
            message,
            node.span.start.line,
            node.span.start.column,
        ));
    }

    fn node_pos(node: &DTNode) -> (usize, usize) {
        (node.span.start.line, node.span.start.column)
    }

    fn split(&mut self, node: &DTNode, value: &DTValue) -> Vec<LayoutBinding> {
        split_bindings(
            value,
            self.defines,
            Self::node_pos(node),
            &mut self.diagnostics,
        )
    }

    fn extract_keymap(&mut self, roots: &[DTNode]) {
        let mut keymaps = Vec::new();
        for root in roots {
            keymaps.extend(root.find_by_compatible(KEYMAP_COMPATIBLE));
        }
        let Some(keymap) = keymaps.first().copied() else {
            self.diagnostics.push(ParseError::error(
                format!("no node with compatible = \"{KEYMAP_COMPATIBLE}\" found"),
                1,
                1,
            ));
            return;
        };
        if keymaps.len() > 1 {
            self.warn(
                keymaps[1],
                "multiple keymap nodes found; using the first one",
            );
        }

        for layer in keymap.children.values() {
            self.layout.layer_names.push(layer.name.clone());
            let bindings = match layer.property("bindings").and_then(|p| p.value.as_ref()) {
                Some(value) => self.split(layer, value),
                None => {
                    self.warn(layer, format!("layer '{}' has no bindings", layer.name));
                    Vec::new()
                }
            };
            self.layout.layers.push(bindings);
        }
    }

    fn extract_hold_taps(&mut self, roots: &[DTNode]) {
        for node in find_all_by_compatible(roots, HOLD_TAP_COMPATIBLE) {
            let bindings: Vec<String> = node
                .property("bindings")
                .and_then(|p| p.value.as_ref())
                .map(|v| {
                    v.reference_elements()
                        .into_iter()
                        .map(|r| format!("&{r}"))
                        .collect()
                })
                .unwrap_or_default();
            if bindings.len() != 2 {
                self.warn(
                    node,
                    format!(
                        "hold-tap '{}' has {} bindings, expected 2",
                        behavior_name(node),
                        bindings.len()
                    ),
                );
            }
            let hold_tap = HoldTapBehavior {
                name: behavior_name(node),
                description: node.property_string("label").map(str::to_owned),
                bindings,
                tapping_term_ms: property_u32(node, "tapping-term-ms"),
                quick_tap_ms: property_u32(node, "quick-tap-ms"),
                require_prior_idle_ms: property_u32(node, "require-prior-idle-ms"),
                flavor: node.property_string("flavor").map(str::to_owned),
                hold_trigger_key_positions: node
                    .property("hold-trigger-key-positions")
                    .and_then(|p| p.value.as_ref())
                    .map(|v| v.int_elements().into_iter().map(|n| n as u16).collect()),
                hold_trigger_on_release: node
                    .property_flag("hold-trigger-on-release")
                    .then_some(true),
                retro_tap: node.property_flag("retro-tap").then_some(true),
            };
            self.layout.hold_taps.push(hold_tap);
        }
    }

    fn extract_tap_dances(&mut self, roots: &[DTNode]) {
        for node in find_all_by_compatible(roots, TAP_DANCE_COMPATIBLE) {
            let bindings = match node.property("bindings").and_then(|p| p.value.as_ref()) {
                Some(value) => self.split(node, value),
                None => Vec::new(),
            };
            if bindings.len() < 2 {
                self.warn(
                    node,
                    format!(
                        "tap-dance '{}' has {} bindings, expected at least 2",
                        behavior_name(node),
                        bindings.len()
                    ),
                );
            }
            self.layout.tap_dances.push(TapDanceBehavior {
                name: behavior_name(node),
                description: node.property_string("label").map(str::to_owned),
                tapping_term_ms: property_u32(node, "tapping-term-ms"),
                bindings,
            });
        }
    }

    fn extract_macros(&mut self, roots: &[DTNode]) {
        let mut nodes: Vec<&DTNode> = Vec::new();
        // Covers the one-param and two-param macro compatibles as well.
        for root in roots {
            root.visit(&mut |node| {
                if node
                    .compatible()
                    .is_some_and(|c| c.starts_with(MACRO_COMPATIBLE))
                {
                    nodes.push(node);
                }
            });
        }
        // Conventional `macros { … }` parents may omit the compatible.
        for root in roots {
            for parent in root.find_by_name("macros") {
                for child in parent.children.values() {
                    if child.compatible().is_none() {
                        nodes.push(child);
                    }
                }
            }
        }
        for node in nodes {
            let bindings = match node.property("bindings").and_then(|p| p.value.as_ref()) {
                Some(value) => self.split(node, value),
                None => {
                    self.warn(
                        node,
                        format!("macro '{}' has no bindings", behavior_name(node)),
                    );
                    Vec::new()
                }
            };
            self.layout.macros.push(MacroBehavior {
                name: behavior_name(node),
                description: node.property_string("label").map(str::to_owned),
                bindings,
                wait_ms: property_u32(node, "wait-ms"),
                tap_ms: property_u32(node, "tap-ms"),
            });
        }
    }

    fn extract_combos(&mut self, roots: &[DTNode]) {
        let mut parents: Vec<&DTNode> = Vec::new();
        for root in roots {
            root.visit(&mut |node| {
                if node.name == "combos" || node.compatible() == Some(COMBOS_COMPATIBLE) {
                    if !parents.iter().any(|p| std::ptr::eq(*p, node)) {
                        parents.push(node);
                    }
                }
            });
        }
        for parent in parents {
            for node in parent.children.values() {
                let key_positions: Vec<u16> = node
                    .property("key-positions")
                    .and_then(|p| p.value.as_ref())
                    .map(|v| v.int_elements().into_iter().map(|n| n as u16).collect())
                    .unwrap_or_default();
                if key_positions.is_empty() {
                    self.warn(node, format!("combo '{}' has no key positions", node.name));
                }
                let mut combo_bindings = match node.property("bindings").and_then(|p| p.value.as_ref())
                {
                    Some(value) => self.split(node, value),
                    None => Vec::new(),
                };
                if combo_bindings.len() > 1 {
                    self.warn(
                        node,
                        format!(
                            "combo '{}' has {} bindings, using the first",
                            node.name,
                            combo_bindings.len()
                        ),
                    );
                }
                let Some(binding) = combo_bindings.drain(..).next() else {
                    self.warn(node, format!("combo '{}' has no binding; skipped", node.name));
                    continue;
                };
                self.layout.combos.push(ComboBehavior {
                    name: node.name.clone(),
                    description: node.property_string("label").map(str::to_owned),
                    key_positions,
                    binding,
                    timeout_ms: property_u32(node, "timeout-ms"),
                    layers: node
                        .property("layers")
                        .and_then(|p| p.value.as_ref())
                        .map(|v| v.int_elements()),
                    require_prior_idle_ms: property_u32(node, "require-prior-idle-ms"),
                });
            }
        }
    }

    fn extract_input_listeners(&mut self, roots: &[DTNode]) {
        for root in roots {
            if !is_input_listener(root) {
                continue;
            }
            // The parser has no compatible to go on for bare references, so
            // one is synthesized before the node is treated as a listener.
            let mut node = root.clone();
            if node.compatible().is_none() {
                node.add_property(DTProperty::new(
                    "compatible",
                    Some(DTValue::String(INPUT_LISTENER_COMPATIBLE.to_owned())),
                ));
            }
            let mut listener = InputListener {
                code: node.name.clone(),
                nodes: Vec::new(),
            };
            for child in node.children.values() {
                let input_processors = match child
                    .property("input-processors")
                    .and_then(|p| p.value.as_ref())
                {
                    Some(value) => self.split(child, value),
                    None => Vec::new(),
                };
                listener.nodes.push(InputListenerNode {
                    code: child.name.clone(),
                    description: child.property_string("label").map(str::to_owned),
                    layers: child
                        .property("layers")
                        .and_then(|p| p.value.as_ref())
                        .map(|v| v.int_elements())
                        .unwrap_or_default(),
                    input_processors,
                });
            }
            self.layout.input_listeners.push(listener);
        }
    }

    /// Children of a `behaviors` parent whose compatible the model does not
    /// type (mod-morphs, sticky keys, …) are preserved as raw text.
    fn extract_custom_behaviors(&mut self, roots: &[DTNode]) {
        let mut fragments: Vec<String> = Vec::new();
        for root in roots {
            for parent in root.find_by_name("behaviors") {
                for child in parent.children.values() {
                    match child.compatible() {
                        None => {
                            self.warn(
                                child,
                                format!("behavior '{}' has no compatible; skipped", child.name),
                            );
                        }
                        Some(c)
                            if c == HOLD_TAP_COMPATIBLE
                                || c == TAP_DANCE_COMPATIBLE
                                || c.starts_with(MACRO_COMPATIBLE) => {}
                        Some(_) => {
                            let text = child.span.slice(self.source).trim_end();
                            if !text.is_empty() {
                                fragments.push(text.to_owned());
                            }
                        }
                    }
                }
            }
        }
        if !fragments.is_empty() {
            self.layout.custom_defined_behaviors = format!(
                "/ {{\n    behaviors {{\n        {}\n    }};\n}};",
                fragments.join("\n        ")
            );
        }
    }

    /// Top-level constructs the model does not understand round-trip as raw
    /// devicetree text.
    fn extract_custom_devicetree(&mut self, roots: &[DTNode]) {
        let mut wrapped: Vec<String> = Vec::new();
        let mut bare: Vec<String> = Vec::new();
        for root in roots {
            if is_input_listener(root) {
                continue;
            }
            if root.name.starts_with('&') || root.label.is_some() {
                // Unrecognized overlay fragment: keep it whole.
                let text = root.span.slice(self.source).trim_end();
                if !text.is_empty() {
                    bare.push(text.to_owned());
                }
                continue;
            }
            for child in root.children.values() {
                if !subtree_is_recognized(child) {
                    let text = child.span.slice(self.source).trim_end();
                    if !text.is_empty() {
                        wrapped.push(text.to_owned());
                    }
                }
            }
        }
        let mut sections = Vec::new();
        if !wrapped.is_empty() {
            sections.push(format!("/ {{\n    {}\n}};", wrapped.join("\n    ")));
        }
        sections.extend(bare);
        if !sections.is_empty() {
            self.layout.custom_devicetree = sections.join("\n\n");
        }
    }
}

fn is_input_listener(node: &DTNode) -> bool {
    (node.name.starts_with('&') && node.name.ends_with(INPUT_LISTENER_SUFFIX))
        || node.compatible() == Some(INPUT_LISTENER_COMPATIBLE)
}

/// Behavior nodes are addressed by their devicetree label when they have one
/// (`hm: homerow_mods { … }` is used as `&hm`), falling back to the node name.
fn behavior_name(node: &DTNode) -> String {
    node.label.clone().unwrap_or_else(|| node.name.clone())
}

fn property_u32(node: &DTNode, name: &str) -> Option<u32> {
    node.property_int(name).and_then(|n| u32::try_from(n).ok())
}

fn find_all_by_compatible<'a>(roots: &'a [DTNode], compatible: &str) -> Vec<&'a DTNode> {
    let mut found = Vec::new();
    for root in roots {
        found.extend(root.find_by_compatible(compatible));
    }
    found
}

/// True when the subtree contains anything the extractor lifts itself.
fn subtree_is_recognized(node: &DTNode) -> bool {
    let mut recognized = false;
    node.visit(&mut |n| {
        let known_name = matches!(
            n.name.as_str(),
            "keymap" | "behaviors" | "combos" | "macros"
        );
        let known_compatible = n.compatible().is_some_and(|c| {
            c == KEYMAP_COMPATIBLE
                || c == HOLD_TAP_COMPATIBLE
                || c == TAP_DANCE_COMPATIBLE
                || c == COMBOS_COMPATIBLE
                || c == INPUT_LISTENER_COMPATIBLE
                || c.starts_with(MACRO_COMPATIBLE)
        });
        if known_name || known_compatible {
            recognized = true;
        }
    });
    recognized
}

#[cfg(test)]
mod tests;
