//! Conditions: the producers of instance times.
//!
//! A closed union dispatched by match at the call sites (construction,
//! interval-change notification, event delivery) rather than virtual
//! methods. Each condition feeds exactly one list (begin or end) of its
//! owning element.

use serde::{Deserialize, Serialize};

use crate::ids::ElementId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionKind {
    /// One instance time at `offset` from the container begin, emitted at
    /// construction; never recomputed.
    Offset { offset: i64 },
    /// Tracks `syncbase`'s most recent interval. A begin-list condition
    /// follows the interval's begin, an end-list condition its end; the
    /// instance is recomputed whenever that boundary changes and removed
    /// when the interval is pruned.
    SyncBase { syncbase: ElementId, offset: i64 },
    /// Emits an instance each time a qualifying event arrives from
    /// `source`. With `repeat = Some(n)` only the repeat notification for
    /// iteration `n` qualifies; with `None` any generic event does.
    EventRepeat {
        source: ElementId,
        repeat: Option<u32>,
        offset: i64,
    },
}

/// A condition plus the list it feeds on its owner.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub is_begin: bool,
    pub kind: ConditionKind,
}

impl Condition {
    #[inline]
    pub fn offset(&self) -> i64 {
        match self.kind {
            ConditionKind::Offset { offset } => offset,
            ConditionKind::SyncBase { offset, .. } => offset,
            ConditionKind::EventRepeat { offset, .. } => offset,
        }
    }
}
