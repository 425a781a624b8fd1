//! Devicetree tokenizer, parser and keymap extractor for
//! [zmk-layout](https://github.com/zmk-layout/zmk-layout).
//!
//! The pipeline is `tokenize -> parse -> extract`: bytes become a token
//! stream, the recursive-descent parser builds an error-tolerant devicetree
//! AST, and the extractor lifts ZMK constructs (layers, hold-taps, combos,
//! macros, tap-dances, input listeners) into the typed layout model.

pub mod dt;
pub mod extract;
pub mod keymap;

pub use dt::{parse_dt, ParseError, Severity};
pub use keymap::{detect_format, DetectedFormat, KeymapParseResult, ZmkKeymapParser};
