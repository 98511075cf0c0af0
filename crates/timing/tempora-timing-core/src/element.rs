//! Timed elements: the unit of scheduling.

use serde::{Deserialize, Serialize};

use crate::anim::AnimationFunction;
use crate::condition::Condition;
use crate::ids::{ElementId, IntervalId};
use crate::instance::InstanceTime;
use crate::time::TimeValue;

/// Restart policy while/after an element has run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Restart {
    /// A new begin instance restarts the element even mid-interval.
    Always,
    /// New intervals may only form while the element is not active.
    WhenNotActive,
    /// One interval, ever (until a reset).
    Never,
}

/// Behavior after the active interval ends. The state machine only signals
/// active vs not; applying freeze/remove is the property system's job.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fill {
    Remove,
    Freeze,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementState {
    /// No interval has begun; looking for the next begin.
    Waiting,
    /// Inside `[begin, end)` of the current interval.
    Active,
    /// The last interval ended; eligible to restart per policy.
    PostActive,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    /// Carries an optional animation function.
    Leaf,
    /// Owns an ordered sequence of children and cascades sampling to them.
    Container,
    /// Container that maps local time to wall clock and supports seeking.
    Root,
}

/// Per-element scheduling state. All cross-element mutation goes through
/// the schedule; elements never reach into each other's lists.
#[derive(Debug)]
pub struct TimedElement {
    pub id: ElementId,
    pub name: String,
    pub kind: ElementKind,
    pub(crate) parent: Option<ElementId>,
    pub(crate) children: Vec<ElementId>,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) begin_instances: Vec<InstanceTime>,
    pub(crate) end_instances: Vec<InstanceTime>,

    /// One non-repeated run; indefinite when unset.
    pub simple_dur: TimeValue,
    /// Finite repetition count, fractional allowed.
    pub repeat_count: Option<f32>,
    /// Cap on the total repeated duration; indefinite when unset.
    pub repeat_dur: TimeValue,
    pub restart: Restart,
    pub fill: Fill,

    pub(crate) state: ElementState,
    /// The live interval: upcoming while waiting, current while active.
    pub(crate) current_interval: Option<IntervalId>,
    /// The most recent ended interval, kept until superseded so its
    /// dependents and the next begin floor stay valid.
    pub(crate) prev_interval: Option<IntervalId>,
    /// Time since interval begin modulo the simple duration.
    pub(crate) simple_time: i64,
    pub(crate) iteration: u32,
    pub(crate) has_run: bool,
    /// Parent simple time seen at the most recent sample of this element.
    pub(crate) last_local: Option<i64>,

    pub(crate) anim: Option<AnimationFunction>,
}

impl TimedElement {
    pub(crate) fn new(id: ElementId, name: String, kind: ElementKind) -> Self {
        Self {
            id,
            name,
            kind,
            parent: None,
            children: Vec::new(),
            conditions: Vec::new(),
            begin_instances: Vec::new(),
            end_instances: Vec::new(),
            simple_dur: TimeValue::Indefinite,
            repeat_count: None,
            repeat_dur: TimeValue::Indefinite,
            restart: Restart::Always,
            fill: Fill::Remove,
            state: ElementState::Waiting,
            current_interval: None,
            prev_interval: None,
            simple_time: 0,
            iteration: 0,
            has_run: false,
            last_local: None,
            anim: None,
        }
    }

    #[inline]
    pub fn is_container(&self) -> bool {
        matches!(self.kind, ElementKind::Container | ElementKind::Root)
    }

    #[inline]
    pub fn state(&self) -> ElementState {
        self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == ElementState::Active
    }

    /// Frozen elements keep their last value by contract of the property
    /// system; the state machine only reports the fact.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.state == ElementState::PostActive && self.fill == Fill::Freeze
    }

    #[inline]
    pub fn simple_time(&self) -> i64 {
        self.simple_time
    }

    #[inline]
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    #[inline]
    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    /// The intrinsic active duration from simple duration and repeat
    /// configuration; indefinite when nothing bounds it.
    pub(crate) fn intrinsic_active_dur(&self) -> TimeValue {
        let repeated = match (self.simple_dur, self.repeat_count) {
            (TimeValue::Resolved(d), Some(c)) if d > 0 && c.is_finite() => {
                TimeValue::Resolved((d as f64 * c as f64).round() as i64)
            }
            (TimeValue::Resolved(d), None) => TimeValue::Resolved(d),
            _ => TimeValue::Indefinite,
        };
        repeated.min(self.repeat_dur)
    }
}
