//! Bindings and their nested parameter trees.
//!
//! A binding is a `&behavior` reference followed by zero or more parameters.
//! Parameters may themselves be calls (`LC(LS(A))`), so they form a tree of
//! [`LayoutParam`] values of bounded depth.

use crate::error::{LayoutError, Result};
use crate::types::ParamValue;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Maximum parameter nesting accepted when parsing and produced when
/// formatting. Inputs deeper than this are rejected rather than recursed into.
pub const MAX_PARAM_DEPTH: usize = 64;

/// One parameter of a binding; `params` is non-empty for call forms such as
/// `LC(LS(A))`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LayoutParam {
    pub value: ParamValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<LayoutParam>,
}

impl LayoutParam {
    pub fn new(value: impl Into<ParamValue>, params: Vec<LayoutParam>) -> Self {
        Self {
            value: value.into(),
            params,
        }
    }

    pub fn word(value: impl Into<String>) -> Self {
        Self {
            value: ParamValue::Str(value.into()),
            params: Vec::new(),
        }
    }

    pub fn int(value: i64) -> Self {
        Self {
            value: ParamValue::Int(value),
            params: Vec::new(),
        }
    }
}

impl<'de> Deserialize<'de> for LayoutParam {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Scalar(ParamValue),
            Full {
                value: ParamValue,
                #[serde(default)]
                params: Vec<LayoutParam>,
            },
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Scalar(value) => LayoutParam {
                value,
                params: Vec::new(),
            },
            Repr::Full { value, params } => LayoutParam { value, params },
        })
    }
}

impl fmt::Display for LayoutParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_param(f, self)
    }
}

// Explicit work stack so pathological nesting cannot blow the call stack.
fn write_param(f: &mut fmt::Formatter<'_>, root: &LayoutParam) -> fmt::Result {
    enum Item<'a> {
        Node(&'a LayoutParam),
        Lit(&'static str),
    }
    let mut stack = vec![Item::Node(root)];
    while let Some(item) = stack.pop() {
        match item {
            Item::Lit(s) => f.write_str(s)?,
            Item::Node(p) => {
                write!(f, "{}", p.value)?;
                if !p.params.is_empty() {
                    stack.push(Item::Lit(")"));
                    for (i, child) in p.params.iter().enumerate().rev() {
                        stack.push(Item::Node(child));
                        if i > 0 {
                            stack.push(Item::Lit(","));
                        }
                    }
                    stack.push(Item::Lit("("));
                }
            }
        }
    }
    Ok(())
}

/// A single key binding: `&behavior param…`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LayoutBinding {
    /// The behavior reference including its leading `&`. Serialized as
    /// `value` on the wire.
    #[serde(rename = "value")]
    pub behavior: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<LayoutParam>,
}

impl LayoutBinding {
    pub fn new(behavior: impl Into<String>, params: Vec<LayoutParam>) -> Self {
        Self {
            behavior: behavior.into(),
            params,
        }
    }

    /// A binding with no parameters, e.g. `&trans`.
    pub fn bare(behavior: impl Into<String>) -> Self {
        Self::new(behavior, Vec::new())
    }

    /// Parse a binding from its keymap spelling, e.g. `"&kp LC(LS(A))"`.
    ///
    /// The behavior is the first whitespace-delimited token; the remainder is
    /// parsed as parameter expressions with nested call support. Decimal
    /// integers become [`ParamValue::Int`]; everything else stays a string.
    pub fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(LayoutError::InvalidBinding {
                binding: s.to_owned(),
                reason: "empty binding".to_owned(),
            });
        }
        let (behavior, rest) = match s.find(char::is_whitespace) {
            Some(at) => (&s[..at], &s[at..]),
            None => (s, ""),
        };
        let params = parse_params(rest).map_err(|reason| LayoutError::InvalidBinding {
            binding: s.to_owned(),
            reason,
        })?;
        Ok(Self {
            behavior: behavior.to_owned(),
            params,
        })
    }

    /// Render back to keymap spelling. Inverse of [`LayoutBinding::from_str`]
    /// modulo whitespace normalization.
    pub fn to_str(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LayoutBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.behavior)?;
        for p in &self.params {
            write!(f, " {p}")?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for LayoutBinding {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Str(String),
            Obj {
                value: String,
                #[serde(default)]
                params: Vec<LayoutParam>,
            },
        }
        match Repr::deserialize(deserializer)? {
            Repr::Str(s) => LayoutBinding::from_str(&s).map_err(D::Error::custom),
            Repr::Obj { value, params } => Ok(LayoutBinding {
                behavior: value,
                params,
            }),
        }
    }
}

fn classify_atom(atom: &str) -> ParamValue {
    let digits = atom.strip_prefix('-').unwrap_or(atom);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = atom.parse::<i64>() {
            return ParamValue::Int(n);
        }
    }
    ParamValue::Str(atom.to_owned())
}

struct ParamCursor<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> ParamCursor<'a> {
    fn skip_separators(&mut self) {
        while let Some(&b) = self.src.get(self.pos) {
            if b.is_ascii_whitespace() || b == b',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn take_atom(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(&b) = self.src.get(self.pos) {
            if b.is_ascii_whitespace() || matches!(b, b',' | b'(' | b')') {
                break;
            }
            self.pos += 1;
        }
        // Parameter text is always a slice of valid UTF-8 input on ASCII
        // boundaries.
        std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("")
    }

    fn parse_list(&mut self, depth: usize) -> std::result::Result<Vec<LayoutParam>, String> {
        if depth > MAX_PARAM_DEPTH {
            return Err(format!("parameter nesting deeper than {MAX_PARAM_DEPTH}"));
        }
        let mut out = Vec::new();
        loop {
            self.skip_separators();
            match self.peek() {
                None | Some(b')') => return Ok(out),
                Some(b'(') => {
                    return Err("unexpected '(' with no preceding parameter name".to_owned())
                }
                Some(_) => {
                    let atom = self.take_atom();
                    if atom.is_empty() {
                        return Err("empty parameter".to_owned());
                    }
                    let params = if self.peek() == Some(b'(') {
                        self.pos += 1;
                        let inner = self.parse_list(depth + 1)?;
                        if self.peek() != Some(b')') {
                            return Err(format!("missing ')' after '{atom}('"));
                        }
                        self.pos += 1;
                        inner
                    } else {
                        Vec::new()
                    };
                    out.push(LayoutParam {
                        value: classify_atom(atom),
                        params,
                    });
                }
            }
        }
    }
}

/// Parse a whitespace/comma separated parameter expression list.
pub fn parse_params(s: &str) -> std::result::Result<Vec<LayoutParam>, String> {
    let mut cursor = ParamCursor {
        src: s.as_bytes(),
        pos: 0,
    };
    let params = cursor.parse_list(0)?;
    cursor.skip_separators();
    if cursor.peek() == Some(b')') {
        return Err("unbalanced ')'".to_owned());
    }
    Ok(params)
}
