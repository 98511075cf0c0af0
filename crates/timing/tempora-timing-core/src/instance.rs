//! Instance times.
//!
//! An instance time is a candidate begin or end time contributed to exactly
//! one list of exactly one element by exactly one condition. Sync-base
//! instances carry a back-reference to the interval they were derived from,
//! so pruning that interval can cancel them.

use serde::{Deserialize, Serialize};

use crate::ids::{ElementId, InstanceId, IntervalId};
use crate::time::TimeValue;

/// Which condition produced an instance time, and what it is pinned to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceOrigin {
    /// Fixed offset from the container begin; inserted once at construction
    /// and never recomputed. Survives reset.
    Offset,
    /// Derived from another element's interval boundary. `condition` is the
    /// index of the producing condition in the owner's condition list.
    SyncBase {
        interval: IntervalId,
        syncbase: ElementId,
        condition: usize,
    },
    /// Delivered by an event (possibly repeat-filtered). Cleared on reset.
    Event,
}

/// One candidate time in an element's begin or end list.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceTime {
    pub id: InstanceId,
    pub time: TimeValue,
    pub origin: InstanceOrigin,
}

impl InstanceTime {
    #[inline]
    pub fn survives_reset(&self) -> bool {
        matches!(self.origin, InstanceOrigin::Offset)
    }
}

/// Keep an instance list in priority (ascending time) order.
pub(crate) fn sort_instances(list: &mut [InstanceTime]) {
    list.sort_by(|a, b| a.time.cmp(&b.time));
}
