//! Bidirectional toolkit for ZMK keyboard firmware keymaps.
//!
//! `.keymap` devicetree sources and JSON layout documents convert into a
//! shared in-memory model ([`models::LayoutData`]) that can be inspected,
//! mutated through fluent managers, validated, and emitted back as
//! byte-stable `.keymap`/`.conf` output.
//!
//! ```no_run
//! use zmk_layout::Layout;
//!
//! let mut layout = Layout::create_empty("corne", "My Layout");
//! layout.layers().add("base")?.set(0, "&kp ESC")?;
//! let keymap = layout.export().keymap().generate()?;
//! # Ok::<(), zmk_layout::Error>(())
//! ```

pub mod generators;
pub mod json;
pub mod layout;
pub mod managers;
pub mod providers;
pub mod validation;

pub use generators::builders::{ConfigBuilder, ExportManager, KeymapBuilder};
pub use generators::zmk::{EmitError, ZmkGenerator};
pub use layout::{KeymapImport, Layout};
pub use validation::{ValidationIssue, ValidationPipeline, ValidationSummary};

pub use zmk_layout_models as models;
pub use zmk_layout_parser as parser;

use thiserror::Error;

/// Top-level error for the library façade.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Model(#[from] models::LayoutError),
    #[error("invalid JSON layout: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Emit(#[from] generators::zmk::EmitError),
    #[error("template rendering failed: {0}")]
    Template(String),
}
