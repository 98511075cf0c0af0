//! Per-tick output contracts.
//!
//! A sample call produces value changes keyed by resolved target handles,
//! plus the semantic timing events of that tick. Adapters apply changes to
//! the host property system and transport events.

use serde::{Deserialize, Serialize};

use crate::ids::ElementId;
use crate::time::TimeValue;
use tempora_value_core::ValueBuf;

/// One animated value for a given element this tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Change {
    pub element: ElementId,
    pub key: String,
    pub value: ValueBuf,
}

/// Discrete semantic signals emitted during stepping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TimingEvent {
    /// A new activation window was resolved (not necessarily begun yet).
    IntervalResolved {
        element: ElementId,
        begin: i64,
        end: TimeValue,
    },
    IntervalBegan {
        element: ElementId,
        begin: i64,
    },
    IntervalEnded {
        element: ElementId,
        time: i64,
    },
    IntervalPruned {
        element: ElementId,
    },
    Repeat {
        element: ElementId,
        iteration: u32,
    },
    Seeked {
        time: i64,
        backward: bool,
    },
}

/// Outputs returned by Schedule::sample().
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub events: Vec<TimingEvent>,
}

impl Outputs {
    #[inline]
    pub fn clear(&mut self) {
        self.changes.clear();
        self.events.clear();
    }

    #[inline]
    pub fn push_change(&mut self, change: Change) {
        self.changes.push(change);
    }

    #[inline]
    pub fn push_event(&mut self, event: TimingEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.events.is_empty()
    }
}
