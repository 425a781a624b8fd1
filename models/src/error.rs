use thiserror::Error;

pub type Result<T> = std::result::Result<T, LayoutError>;

/// Invariant violations raised by the model and its managers. These are hard
/// errors: an operation that returns one has left the model unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("layer '{0}' already exists")]
    LayerExists(String),
    #[error("layer '{0}' not found")]
    LayerNotFound(String),
    #[error("position {position} out of range for length {len}")]
    PositionOutOfRange { position: usize, len: usize },
    #[error("range {start}..{end} expects {expected} bindings, got {got}")]
    RangeLengthMismatch {
        start: usize,
        end: usize,
        expected: usize,
        got: usize,
    },
    #[error("reorder list must name every existing layer exactly once")]
    ReorderMismatch,
    #[error("behavior '{0}' already exists")]
    BehaviorExists(String),
    #[error("behavior '{0}' not found")]
    BehaviorNotFound(String),
    #[error("hold-tap '{name}' requires exactly 2 bindings, got {got}")]
    HoldTapArity { name: String, got: usize },
    #[error("tap-dance '{name}' requires at least 2 bindings, got {got}")]
    TapDanceArity { name: String, got: usize },
    #[error("combo '{0}' requires at least one key position")]
    EmptyComboPositions(String),
    #[error("invalid binding '{binding}': {reason}")]
    InvalidBinding { binding: String, reason: String },
    #[error("keyboard name is required")]
    MissingKeyboard,
    #[error("{layers} layers but {names} layer names")]
    LayerCountMismatch { layers: usize, names: usize },
    #[error("invalid layout data: {0}")]
    InvalidData(String),
}
