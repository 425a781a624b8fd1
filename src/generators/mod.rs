//! Keymap and Kconfig generation: the deterministic emitter plus the fluent
//! export builders layered on top of it.

pub mod builders;
pub mod zmk;

pub use builders::{ConfigBuilder, ExportManager, KeymapBuilder};
pub use zmk::{EmitError, EmitFragments, ZmkGenerator};
