//! Error types for the value model.

use serde::{Deserialize, Serialize};

/// Errors raised by value buffers, segments and RefValues.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ValueError {
    /// Two buffers disagree on component count or per-component dimensions.
    #[error("value shape mismatch: {expected} vs {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// An operation combined two segments of different variants.
    #[error("incompatible segment variants: {left} vs {right}")]
    IncompatibleSegments { left: String, right: String },

    /// Penetration outside [0, 1].
    #[error("penetration {penetration} is outside [0, 1]")]
    PenetrationOutOfRange { penetration: f32 },

    /// Segment index outside the segment list.
    #[error("segment index {index} out of range (count {count})")]
    SegmentOutOfRange { index: usize, count: usize },

    /// A length/compute call arrived before initialize().
    #[error("RefValues used before initialize()")]
    NotInitialized,

    /// initialize() or make_discrete() called a second time.
    #[error("operation already applied: {operation}")]
    AlreadyApplied { operation: String },

    /// A RefValues or buffer was constructed with no content.
    #[error("empty value model: {reason}")]
    Empty { reason: String },
}
