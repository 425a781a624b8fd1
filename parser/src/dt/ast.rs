//! Typed devicetree AST.
//!
//! Nodes keep their properties and children in insertion order; the emitter
//! depends on that order to reproduce source layout. Comments attach to the
//! property or node they precede; preprocessor lines are retained as
//! [`DTConditional`] annotations and never evaluated.

use indexmap::IndexMap;
use std::fmt;

/// A location in the source, 1-based line/column plus byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Byte range of a construct; `end.offset` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn slice<'a>(&self, src: &'a str) -> &'a str {
        src.get(self.start.offset..self.end.offset).unwrap_or("")
    }
}

/// A devicetree property value.
#[derive(Debug, Clone, PartialEq)]
pub enum DTValue {
    String(String),
    Integer(i64),
    /// Cell lists (`<&kp Q 3>`) and comma-separated value groups. Elements
    /// may themselves be arrays for `<…>, <…>` properties and parenthesized
    /// expressions.
    Array(Vec<DTValue>),
    /// `&name` with the `&` stripped; the symbol stays unresolved.
    Reference(String),
    Boolean(bool),
    Bytes(Vec<u8>),
}

impl DTValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DTValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            DTValue::Integer(n) => Some(*n),
            DTValue::Array(items) if items.len() == 1 => items[0].as_int(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DTValue]> {
        match self {
            DTValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Integer elements of a (possibly nested) cell list, in order.
    pub fn int_elements(&self) -> Vec<i64> {
        let mut out = Vec::new();
        self.collect_ints(&mut out);
        out
    }

    fn collect_ints(&self, out: &mut Vec<i64>) {
        match self {
            DTValue::Integer(n) => out.push(*n),
            DTValue::Array(items) => {
                for item in items {
                    item.collect_ints(out);
                }
            }
            _ => {}
        }
    }

    /// Reference names (without `&`) of a (possibly nested) cell list.
    pub fn reference_elements(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<String>) {
        match self {
            DTValue::Reference(name) => out.push(name.clone()),
            DTValue::Array(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            _ => {}
        }
    }
}

/// A retained comment. `is_block` follows a hard contract: true iff the text
/// starts with `/*` and closes with `*/`; `//` and `#…` text is never a
/// block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DTComment {
    pub text: String,
    pub is_block: bool,
}

impl DTComment {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let is_block = is_block_comment(&text);
        Self { text, is_block }
    }
}

/// The block-comment contract from the parser: equivalent to matching
/// `/\*(.|\n)*?\*/` (DOTALL) anchored at the start of the text.
pub fn is_block_comment(text: &str) -> bool {
    text.starts_with("/*") && text.get(2..).is_some_and(|rest| rest.contains("*/"))
}

/// A retained preprocessor line, split into the directive word and the rest
/// of the line. `#define FOO 1` gives `("define", "FOO 1")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DTConditional {
    pub directive: String,
    pub condition: String,
}

impl DTConditional {
    /// Split a raw `#…` line. The leading `#` and any space before the
    /// directive word are dropped.
    pub fn from_raw(raw: &str) -> Self {
        let body = raw.trim_start().trim_start_matches('#').trim_start();
        match body.split_once(char::is_whitespace) {
            Some((directive, rest)) => Self {
                directive: directive.to_owned(),
                condition: rest.trim().to_owned(),
            },
            None => Self {
                directive: body.to_owned(),
                condition: String::new(),
            },
        }
    }
}

/// A property; `value == None` encodes the boolean-true form `name;`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DTProperty {
    pub name: String,
    pub value: Option<DTValue>,
    pub comments_before: Vec<DTComment>,
    pub comments_inline: Vec<DTComment>,
}

impl DTProperty {
    pub fn new(name: impl Into<String>, value: Option<DTValue>) -> Self {
        Self {
            name: name.into(),
            value,
            comments_before: Vec::new(),
            comments_inline: Vec::new(),
        }
    }

    /// True for the bare `name;` form.
    pub fn is_boolean(&self) -> bool {
        self.value.is_none()
    }
}

/// A devicetree node. `children` keys are the composite `name@address` so
/// same-name nodes at different unit addresses coexist.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DTNode {
    pub name: String,
    pub unit_address: Option<String>,
    pub label: Option<String>,
    pub properties: IndexMap<String, DTProperty>,
    pub children: IndexMap<String, DTNode>,
    pub comments: Vec<DTComment>,
    pub conditionals: Vec<DTConditional>,
    /// Reference names appearing in this node's property values.
    pub references: Vec<String>,
    pub span: Span,
}

impl DTNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Composite `name@address` used as the child-map key.
    pub fn full_name(&self) -> String {
        match &self.unit_address {
            Some(addr) => format!("{}@{addr}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn add_property(&mut self, property: DTProperty) {
        if let Some(value) = &property.value {
            self.references.extend(value.reference_elements());
        }
        self.properties.insert(property.name.clone(), property);
    }

    /// Insert a child under its composite name. Returns the node it replaced,
    /// if any (later definitions win).
    pub fn add_child(&mut self, child: DTNode) -> Option<DTNode> {
        self.children.insert(child.full_name(), child)
    }

    pub fn property(&self, name: &str) -> Option<&DTProperty> {
        self.properties.get(name)
    }

    pub fn property_string(&self, name: &str) -> Option<&str> {
        self.properties.get(name)?.value.as_ref()?.as_str()
    }

    pub fn property_int(&self, name: &str) -> Option<i64> {
        self.properties.get(name)?.value.as_ref()?.as_int()
    }

    /// True when the boolean-true property `name;` is present.
    pub fn property_flag(&self, name: &str) -> bool {
        self.properties.get(name).is_some_and(DTProperty::is_boolean)
    }

    pub fn compatible(&self) -> Option<&str> {
        self.property_string("compatible")
    }

    /// Child by plain name, ignoring unit addresses.
    pub fn child(&self, name: &str) -> Option<&DTNode> {
        self.children.values().find(|c| c.name == name)
    }

    /// Depth-first walk over this node and all descendants.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a DTNode)) {
        f(self);
        for child in self.children.values() {
            child.visit(f);
        }
    }

    /// All descendants (including self) whose `compatible` equals `value`.
    pub fn find_by_compatible<'a>(&'a self, value: &str) -> Vec<&'a DTNode> {
        let mut found = Vec::new();
        self.visit(&mut |node| {
            if node.compatible() == Some(value) {
                found.push(node);
            }
        });
        found
    }

    /// All descendants (including self) with the given plain name.
    pub fn find_by_name<'a>(&'a self, name: &str) -> Vec<&'a DTNode> {
        let mut found = Vec::new();
        self.visit(&mut |node| {
            if node.name == name {
                found.push(node);
            }
        });
        found
    }
}

impl fmt::Display for DTNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{label}: {}", self.full_name()),
            None => write!(f, "{}", self.full_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_comment_contract() {
        // Mirrors the documented DOTALL regex contract.
        let cases: &[(&str, bool)] = &[
            ("// single line", false),
            ("// /* not a block */", false),
            ("/* block */", true),
            ("/* multi\nline */", true),
            ("/**/", true),
            ("/*\t*/", true),
            ("/* outer /* inner */", true),
            ("#define FOO", false),
            ("#endif", false),
            ("/*", false),
            ("*/", false),
            ("", false),
            ("/* unclosed", false),
            ("text /* with block */ inside", false),
        ];
        for (text, expected) in cases {
            assert_eq!(
                is_block_comment(text),
                *expected,
                "is_block mismatch for {text:?}"
            );
            assert_eq!(DTComment::new(*text).is_block, *expected);
        }
    }

    #[test]
    fn conditional_splits_directive() {
        let c = DTConditional::from_raw("#define HM_TAP 280");
        assert_eq!(c.directive, "define");
        assert_eq!(c.condition, "HM_TAP 280");

        let c = DTConditional::from_raw("#endif");
        assert_eq!(c.directive, "endif");
        assert_eq!(c.condition, "");

        let c = DTConditional::from_raw("#include <behaviors.dtsi>");
        assert_eq!(c.directive, "include");
        assert_eq!(c.condition, "<behaviors.dtsi>");
    }

    #[test]
    fn full_name_includes_unit_address() {
        let mut node = DTNode::new("flash");
        node.unit_address = Some("1000".into());
        assert_eq!(node.full_name(), "flash@1000");
    }

    #[test]
    fn children_keep_insertion_order() {
        let mut parent = DTNode::new("keymap");
        for name in ["base", "nav", "sym"] {
            parent.add_child(DTNode::new(name));
        }
        let names: Vec<_> = parent.children.values().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["base", "nav", "sym"]);
    }

    #[test]
    fn add_property_collects_references() {
        let mut node = DTNode::new("combo_esc");
        node.add_property(DTProperty::new(
            "bindings",
            Some(DTValue::Array(vec![
                DTValue::Reference("kp".into()),
                DTValue::String("ESC".into()),
            ])),
        ));
        assert_eq!(node.references, vec!["kp"]);
    }

    #[test]
    fn find_by_compatible_walks_depth_first() {
        let mut root = DTNode::new("/");
        let mut keymap = DTNode::new("keymap");
        keymap.add_property(DTProperty::new(
            "compatible",
            Some(DTValue::String("zmk,keymap".into())),
        ));
        root.add_child(keymap);
        assert_eq!(root.find_by_compatible("zmk,keymap").len(), 1);
        assert!(root.find_by_compatible("zmk,combos").is_empty());
    }
}
