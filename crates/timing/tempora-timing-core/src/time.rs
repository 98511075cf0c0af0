//! Total-ordered time values.
//!
//! A time is either resolved (signed milliseconds, may be negative),
//! indefinite (unbounded future) or unresolved (no value yet). The total
//! order places unresolved above indefinite above every resolved value; the
//! derived Ord on the variant order below encodes exactly that.

use serde::{Deserialize, Serialize};

/// A timing value in container-local milliseconds, or one of the two
/// special markers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum TimeValue {
    /// A concrete offset. Ordinary numeric order among resolved values.
    Resolved(i64),
    /// Unbounded future; greater than every resolved value.
    Indefinite,
    /// No value yet; greater than everything else.
    Unresolved,
}

impl TimeValue {
    #[inline]
    pub fn is_resolved(&self) -> bool {
        matches!(self, TimeValue::Resolved(_))
    }

    /// The resolved milliseconds, if any.
    #[inline]
    pub fn resolved(&self) -> Option<i64> {
        match self {
            TimeValue::Resolved(v) => Some(*v),
            _ => None,
        }
    }

    /// Total-order comparison, readable at call sites.
    #[inline]
    pub fn greater_than_or_equal(&self, other: TimeValue) -> bool {
        *self >= other
    }

    /// Same identity or same resolved value.
    #[inline]
    pub fn is_same_time(&self, other: TimeValue) -> bool {
        *self == other
    }

    /// Shift a resolved value; the markers absorb any offset.
    #[inline]
    pub fn offset_by(self, offset_ms: i64) -> TimeValue {
        match self {
            TimeValue::Resolved(v) => TimeValue::Resolved(v.saturating_add(offset_ms)),
            marker => marker,
        }
    }
}

impl From<i64> for TimeValue {
    fn from(ms: i64) -> Self {
        TimeValue::Resolved(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// it should order resolved numerically with both markers above
    #[test]
    fn total_order() {
        let a = TimeValue::Resolved(-5);
        let b = TimeValue::Resolved(1000);
        assert!(b.greater_than_or_equal(a));
        assert!(!a.greater_than_or_equal(b));
        assert!(a.greater_than_or_equal(a));
        assert!(TimeValue::Indefinite.greater_than_or_equal(b));
        assert!(TimeValue::Unresolved.greater_than_or_equal(TimeValue::Indefinite));
        assert!(TimeValue::Unresolved.greater_than_or_equal(b));
        assert!(!TimeValue::Indefinite.greater_than_or_equal(TimeValue::Unresolved));
    }

    #[test]
    fn min_prefers_resolved() {
        let end = TimeValue::Indefinite.min(TimeValue::Resolved(4000));
        assert_eq!(end, TimeValue::Resolved(4000));
    }

    #[test]
    fn offset_absorbed_by_markers() {
        assert_eq!(TimeValue::Resolved(10).offset_by(-4), TimeValue::Resolved(6));
        assert_eq!(TimeValue::Indefinite.offset_by(100), TimeValue::Indefinite);
        assert_eq!(TimeValue::Unresolved.offset_by(100), TimeValue::Unresolved);
    }
}
