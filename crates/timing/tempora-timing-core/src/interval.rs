//! Activation intervals.
//!
//! A concrete `[begin, end)` window. Begin is always resolved; end may be
//! indefinite while no end instance has firmed up. The interval tracks the
//! sync-base instance times that depend on each boundary so boundary
//! changes can notify them, and pruning can detach them.

use serde::{Deserialize, Serialize};

use crate::error::TimingError;
use crate::ids::{ElementId, InstanceId};
use crate::time::TimeValue;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Interval {
    pub owner: ElementId,
    begin: TimeValue,
    end: TimeValue,
    /// Instance times recomputed when `begin` changes: `(owner, instance)`.
    begin_dependents: Vec<(ElementId, InstanceId)>,
    /// Instance times recomputed when `end` changes.
    end_dependents: Vec<(ElementId, InstanceId)>,
}

impl Interval {
    pub fn new(owner: ElementId, begin: TimeValue, end: TimeValue) -> Result<Self, TimingError> {
        if !begin.is_resolved() {
            return Err(TimingError::UnresolvedTime {
                context: "interval begin".into(),
            });
        }
        Ok(Self {
            owner,
            begin,
            end,
            begin_dependents: Vec::new(),
            end_dependents: Vec::new(),
        })
    }

    #[inline]
    pub fn begin(&self) -> TimeValue {
        self.begin
    }

    #[inline]
    pub fn end(&self) -> TimeValue {
        self.end
    }

    #[inline]
    pub fn begin_ms(&self) -> i64 {
        // Invariant: begin is resolved (checked at construction and set_begin).
        self.begin.resolved().unwrap_or(0)
    }

    /// Active window test for a container-local sample time.
    #[inline]
    pub fn contains(&self, t: i64) -> bool {
        TimeValue::Resolved(t) >= self.begin && TimeValue::Resolved(t) < self.end
    }

    /// Replace the begin. The caller notifies begin-dependents afterwards.
    pub fn set_begin(&mut self, begin: TimeValue) -> Result<(), TimingError> {
        if !begin.is_resolved() {
            return Err(TimingError::UnresolvedTime {
                context: "interval begin".into(),
            });
        }
        self.begin = begin;
        Ok(())
    }

    /// Replace the end (indefinite allowed). The caller notifies
    /// end-dependents afterwards.
    pub fn set_end(&mut self, end: TimeValue) {
        self.end = end;
    }

    /// Register a dependent instance, partitioned by the dependent's own
    /// begin/end orientation.
    pub fn add_dependent(&mut self, owner: ElementId, instance: InstanceId, on_begin: bool) {
        let list = if on_begin {
            &mut self.begin_dependents
        } else {
            &mut self.end_dependents
        };
        if !list.contains(&(owner, instance)) {
            list.push((owner, instance));
        }
    }

    pub fn remove_dependent(&mut self, owner: ElementId, instance: InstanceId) {
        self.begin_dependents.retain(|d| *d != (owner, instance));
        self.end_dependents.retain(|d| *d != (owner, instance));
    }

    #[inline]
    pub fn begin_dependents(&self) -> &[(ElementId, InstanceId)] {
        &self.begin_dependents
    }

    #[inline]
    pub fn end_dependents(&self) -> &[(ElementId, InstanceId)] {
        &self.end_dependents
    }

    /// Drain every dependent, end-list first, each list in reverse order,
    /// so detach during disposal never shifts a live index.
    pub fn take_dependents_reversed(&mut self) -> Vec<(ElementId, InstanceId)> {
        let mut out = Vec::with_capacity(self.begin_dependents.len() + self.end_dependents.len());
        while let Some(d) = self.end_dependents.pop() {
            out.push(d);
        }
        while let Some(d) = self.begin_dependents.pop() {
            out.push(d);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_must_be_resolved() {
        assert!(Interval::new(ElementId(0), TimeValue::Unresolved, TimeValue::Indefinite).is_err());
        assert!(Interval::new(ElementId(0), TimeValue::Indefinite, TimeValue::Indefinite).is_err());
        let mut iv =
            Interval::new(ElementId(0), TimeValue::Resolved(0), TimeValue::Indefinite).unwrap();
        assert!(iv.set_begin(TimeValue::Unresolved).is_err());
    }

    #[test]
    fn half_open_window() {
        let iv = Interval::new(
            ElementId(0),
            TimeValue::Resolved(1000),
            TimeValue::Resolved(4000),
        )
        .unwrap();
        assert!(iv.contains(1000));
        assert!(iv.contains(3999));
        assert!(!iv.contains(4000));
        assert!(!iv.contains(999));
    }

    #[test]
    fn dependents_drained_in_reverse() {
        let mut iv =
            Interval::new(ElementId(0), TimeValue::Resolved(0), TimeValue::Indefinite).unwrap();
        iv.add_dependent(ElementId(1), InstanceId(10), true);
        iv.add_dependent(ElementId(2), InstanceId(11), true);
        iv.add_dependent(ElementId(3), InstanceId(12), false);
        let drained = iv.take_dependents_reversed();
        assert_eq!(
            drained,
            vec![
                (ElementId(3), InstanceId(12)),
                (ElementId(2), InstanceId(11)),
                (ElementId(1), InstanceId(10)),
            ]
        );
    }
}
