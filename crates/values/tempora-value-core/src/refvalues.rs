//! RefValues: the ordered segment list behind one animation.
//!
//! Lifecycle: build the segments, optionally `make_discrete()`, then
//! `initialize()` exactly once to cache the paced-timing lengths, then
//! `compute()`/length reads during sampling. Component shape is taken from
//! the first segment and assumed uniform across the rest (contract, not
//! re-validated per segment).

use serde::{Deserialize, Serialize};

use crate::error::ValueError;
use crate::segment::Segment;
use crate::value::ValueBuf;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefValues {
    segments: Vec<Segment>,
    seg_lengths: Vec<f32>,
    total_length: f32,
    initialized: bool,
    discrete_applied: bool,
}

impl RefValues {
    /// Build from a non-empty segment list.
    pub fn new(segments: Vec<Segment>) -> Result<Self, ValueError> {
        if segments.is_empty() {
            return Err(ValueError::Empty {
                reason: "RefValues needs at least one segment".into(),
            });
        }
        Ok(Self {
            segments,
            seg_lengths: Vec::new(),
            total_length: 0.0,
            initialized: false,
            discrete_applied: false,
        })
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Component count, derived from the first segment's start value shape.
    #[inline]
    pub fn component_count(&self) -> usize {
        self.segments[0].component_count()
    }

    pub fn segment(&self, index: usize) -> Result<&Segment, ValueError> {
        self.segments.get(index).ok_or(ValueError::SegmentOutOfRange {
            index,
            count: self.segments.len(),
        })
    }

    pub fn segment_mut(&mut self, index: usize) -> Result<&mut Segment, ValueError> {
        let count = self.segments.len();
        self.segments
            .get_mut(index)
            .ok_or(ValueError::SegmentOutOfRange { index, count })
    }

    /// Append a trailing zero-length segment holding the final value, so a
    /// discrete animation visibly keeps its last value for the last step
    /// instead of disappearing. One-shot: a second call is rejected.
    pub fn make_discrete(&mut self) -> Result<(), ValueError> {
        if self.discrete_applied {
            return Err(ValueError::AlreadyApplied {
                operation: "make_discrete".into(),
            });
        }
        if self.initialized {
            return Err(ValueError::AlreadyApplied {
                operation: "initialize before make_discrete".into(),
            });
        }
        let last = self
            .segments
            .last()
            .ok_or(ValueError::Empty {
                reason: "RefValues has no segments".into(),
            })?
            .clone();
        let end = last.end_value();
        let mut hold = last;
        hold.set_start(end)?;
        self.segments.push(hold);
        self.discrete_applied = true;
        Ok(())
    }

    /// Compute and cache the total and per-segment geometric lengths for
    /// paced timing. Must be called exactly once, after the segment list is
    /// final and before any compute/length call.
    pub fn initialize(&mut self) -> Result<(), ValueError> {
        if self.initialized {
            return Err(ValueError::AlreadyApplied {
                operation: "initialize".into(),
            });
        }
        self.seg_lengths.clear();
        self.total_length = 0.0;
        for seg in &self.segments {
            let len = seg.length()?;
            self.seg_lengths.push(len);
            self.total_length += len;
        }
        self.initialized = true;
        Ok(())
    }

    #[inline]
    fn require_initialized(&self) -> Result<(), ValueError> {
        if self.initialized {
            Ok(())
        } else {
            Err(ValueError::NotInitialized)
        }
    }

    /// Cached geometric length of one segment.
    pub fn segment_length(&self, index: usize) -> Result<f32, ValueError> {
        self.require_initialized()?;
        self.seg_lengths
            .get(index)
            .copied()
            .ok_or(ValueError::SegmentOutOfRange {
                index,
                count: self.segments.len(),
            })
    }

    /// Cached total geometric length across segments.
    pub fn total_length(&self) -> Result<f32, ValueError> {
        self.require_initialized()?;
        Ok(self.total_length)
    }

    /// Interpolate segment `index` at `penetration` into the caller's
    /// buffer. The buffer contents are valid only until the next compute
    /// call that reuses the same buffer.
    pub fn compute(
        &self,
        index: usize,
        penetration: f32,
        out: &mut ValueBuf,
    ) -> Result<(), ValueError> {
        self.require_initialized()?;
        self.segment(index)?.compute(penetration, out)
    }
}
