//! Typed layout model for [zmk-layout](https://github.com/zmk-layout/zmk-layout).
//!
//! This crate is the shared vocabulary between the keymap parser and the
//! generators: bindings with nested parameters, behavior records (hold-taps,
//! combos, macros, tap-dances, input listeners) and the top-level
//! [`LayoutData`] document that serializes to and from the JSON layout format.

pub mod behaviors;
pub mod core;
pub mod error;
pub mod metadata;
pub mod types;

pub use self::behaviors::*;
pub use self::core::*;
pub use self::error::{LayoutError, Result};
pub use self::metadata::*;
pub use self::types::*;
