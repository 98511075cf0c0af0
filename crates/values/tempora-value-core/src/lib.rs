//! tempora-value-core: animation value model (engine-agnostic)
//!
//! Defines the rectangular value buffers, the value/motion segment variants,
//! and the RefValues container that precomputes paced-timing lengths and
//! interpolates into a caller-provided output buffer. Timing logic lives in
//! tempora-timing-core; this crate knows nothing about clocks or intervals.

pub mod error;
pub mod refvalues;
pub mod segment;
pub mod value;

// Re-exports for consumers (adapters)
pub use error::ValueError;
pub use refvalues::RefValues;
pub use segment::{MotionSegment, RotateMode, Segment, ValueSegment, MOTION_DIMS};
pub use value::ValueBuf;
