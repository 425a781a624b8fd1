//! Fluent mutation managers over the layout model.
//!
//! Operations are atomic: any error leaves the model unchanged. Proxies
//! resolve their layer by name on every call rather than caching indices.

pub mod behaviors;
pub mod layers;
pub mod proxy;

pub use behaviors::{BehaviorManager, BehaviorRef};
pub use layers::LayerManager;
pub use proxy::LayerProxy;
