//! tempora-timing-core (engine-agnostic)
//!
//! The declarative timing core: total-ordered time values, instance times
//! produced by offset/sync-base/event conditions, concrete activation
//! intervals with dependent tracking, the per-element state machine
//! (restart/repeat/fill/reset), and time containers cascading samples in
//! document order from a seekable root. Value interpolation lives in
//! tempora-value-core; this crate drives it through AnimationFunction while
//! an element is active.

pub mod anim;
pub mod binding;
pub mod condition;
pub mod config;
pub mod element;
pub mod error;
pub mod ids;
pub mod instance;
pub mod interval;
pub mod outputs;
pub mod schedule;
pub mod time;

// Re-exports for consumers (adapters)
pub use anim::{AnimationFunction, CalcMode};
pub use binding::TargetResolver;
pub use condition::{Condition, ConditionKind};
pub use config::Config;
pub use element::{ElementKind, ElementState, Fill, Restart, TimedElement};
pub use error::TimingError;
pub use ids::{ElementId, IdAllocator, InstanceId, IntervalId};
pub use instance::{InstanceOrigin, InstanceTime};
pub use interval::Interval;
pub use outputs::{Change, Outputs, TimingEvent};
pub use schedule::Schedule;
pub use time::TimeValue;
pub use tempora_value_core::{
    MotionSegment, RefValues, RotateMode, Segment, ValueBuf, ValueSegment,
};
