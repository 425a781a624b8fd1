//! Immutable, accumulating validation over a layout.
//!
//! Every check consumes the pipeline and returns a new one carrying the union
//! of prior findings; the underlying [`LayoutData`] is never touched. Checks
//! are independently invocable and side-effect free.

use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashSet};
use zmk_layout_models::{LayoutBinding, LayoutData, ParamValue};

/// Behaviors every ZMK firmware provides.
static KNOWN_BEHAVIORS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "&kp",
        "&mt",
        "&lt",
        "&mo",
        "&to",
        "&tog",
        "&sl",
        "&trans",
        "&none",
        "&bootloader",
        "&reset",
        "&key_repeat",
        "&caps_word",
        "&sk",
        "&gresc",
        "&rgb_ug",
        "&bt",
        "&ext_power",
        "&out",
    ]
    .into_iter()
    .collect()
});

/// Behaviors whose first parameter is a layer.
const LAYER_BEHAVIORS: &[&str] = &["&mo", "&lt", "&sl", "&to", "&tog"];

/// Custom-behavior prefixes conventionally used for user definitions.
const USER_BEHAVIOR_PREFIXES: &[&str] = &["&hm", "&hrm", "&ht", "&sk", "&sl"];

/// Layers larger than this are treated as corrupt data.
const HARD_KEY_LIMIT: usize = 200;

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub message: String,
}

impl ValidationIssue {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Findings of a completed pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSummary {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub is_valid: bool,
}

#[derive(Debug, Clone)]
pub struct ValidationPipeline<'a> {
    data: &'a LayoutData,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl<'a> ValidationPipeline<'a> {
    pub fn new(data: &'a LayoutData) -> Self {
        Self {
            data,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn user_defined(&self) -> HashSet<String> {
        self.data.user_behavior_names().into_iter().collect()
    }

    fn for_each_binding(&self, mut f: impl FnMut(&str, usize, &LayoutBinding)) {
        for (name, layer) in self.data.layer_names.iter().zip(&self.data.layers) {
            for (position, binding) in layer.iter().enumerate() {
                f(name, position, binding);
            }
        }
    }

    /// Binding syntax and behavior names. A binding not starting with `&` is
    /// an error; a behavior neither built in nor user-defined is a warning.
    pub fn validate_bindings(mut self) -> Self {
        let user_defined = self.user_defined();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        self.for_each_binding(|layer, position, binding| {
            if !binding.behavior.starts_with('&') {
                errors.push(ValidationIssue::new(format!(
                    "invalid binding syntax in layer '{layer}' at position {position}: '{}'",
                    binding.behavior
                )));
                return;
            }
            if !KNOWN_BEHAVIORS.contains(binding.behavior.as_str())
                && !user_defined.contains(&binding.behavior)
            {
                warnings.push(ValidationIssue::new(format!(
                    "unknown behavior in layer '{layer}' at position {position}: '{}'",
                    binding.behavior
                )));
            }
        });
        self.errors.append(&mut errors);
        self.warnings.append(&mut warnings);
        self
    }

    /// First parameter of `&mo &lt &sl &to &tog` must resolve to a layer.
    pub fn validate_layer_references(mut self) -> Self {
        let layer_count = self.data.layer_names.len();
        let mut errors = Vec::new();
        self.for_each_binding(|layer, position, binding| {
            if !LAYER_BEHAVIORS.contains(&binding.behavior.as_str()) {
                return;
            }
            let Some(param) = binding.params.first() else {
                return;
            };
            match &param.value {
                ParamValue::Int(n) => {
                    if *n < 0 || *n >= layer_count as i64 {
                        errors.push(ValidationIssue::new(format!(
                            "layer reference out of bounds in '{layer}' at position {position}: \
                             {n} (max_layer = {}) in '{}'",
                            layer_count.saturating_sub(1),
                            binding.to_str()
                        )));
                    }
                }
                ParamValue::Str(s) => {
                    let is_placeholder = s.starts_with('$') || s.starts_with("{{");
                    if !is_placeholder && !self.data.layer_names.contains(s) {
                        errors.push(ValidationIssue::new(format!(
                            "unknown layer reference in '{layer}' at position {position}: \
                             '{s}' in '{}'",
                            binding.to_str()
                        )));
                    }
                }
            }
        });
        self.errors.append(&mut errors);
        self
    }

    /// Layer sizes: above `max_keys` warns, above the hard limit errors.
    pub fn validate_key_positions(mut self, max_keys: usize) -> Self {
        for (name, layer) in self.data.layer_names.iter().zip(&self.data.layers) {
            let count = layer.len();
            if count > max_keys {
                self.warnings.push(ValidationIssue::new(format!(
                    "layer '{name}' has {count} bindings, more than the recommended {max_keys}"
                )));
            }
            if count > HARD_KEY_LIMIT {
                self.errors.push(ValidationIssue::new(format!(
                    "layer '{name}' has an unusually high key count: {count}"
                )));
            }
        }
        self
    }

    /// Conventionally prefixed custom behaviors (`&hm_l`, `&ht_esc`, …) that
    /// have no matching definition in the model.
    pub fn validate_behavior_references(mut self) -> Self {
        let user_defined = self.user_defined();
        let mut undefined: BTreeSet<String> = BTreeSet::new();
        self.for_each_binding(|_, _, binding| {
            let behavior = binding.behavior.as_str();
            let conventional = USER_BEHAVIOR_PREFIXES
                .iter()
                .any(|prefix| behavior.starts_with(&format!("{prefix}_")));
            if conventional && !user_defined.contains(behavior) {
                undefined.insert(behavior.to_owned());
            }
        });
        if !undefined.is_empty() {
            let names = undefined.into_iter().collect::<Vec<_>>().join(", ");
            self.warnings.push(ValidationIssue::new(format!(
                "custom behavior references without a definition: {names}"
            )));
        }
        self
    }

    /// Combo positions must fit the widest layer; identical position sets
    /// across combos warn.
    pub fn validate_combo_positions(mut self) -> Self {
        let max_position = self.data.max_layer_size();
        let mut seen: HashSet<Vec<u16>> = HashSet::new();
        for combo in &self.data.combos {
            let mut sorted = combo.key_positions.clone();
            sorted.sort_unstable();
            if !seen.insert(sorted.clone()) {
                self.warnings.push(ValidationIssue::new(format!(
                    "duplicate combo positions {sorted:?} in combo '{}'",
                    combo.name
                )));
            }
            for &position in &combo.key_positions {
                if usize::from(position) >= max_position {
                    self.errors.push(ValidationIssue::new(format!(
                        "combo '{}' position {position} exceeds the maximum key count {max_position}",
                        combo.name
                    )));
                }
            }
        }
        self
    }

    /// Run every check with default limits.
    pub fn validate_all(self, max_keys: usize) -> Self {
        self.validate_bindings()
            .validate_layer_references()
            .validate_key_positions(max_keys)
            .validate_behavior_references()
            .validate_combo_positions()
    }

    pub fn collect_errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn collect_warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn summary(self) -> ValidationSummary {
        let is_valid = self.errors.is_empty();
        ValidationSummary {
            errors: self.errors,
            warnings: self.warnings,
            is_valid,
        }
    }
}
