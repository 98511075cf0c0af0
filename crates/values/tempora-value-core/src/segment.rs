//! Segment variants.
//!
//! A closed union of the two interpolation shapes the engine knows:
//! - ValueSegment: linear per-dimension interpolation between two buffers.
//! - MotionSegment: a 2D affine transform whose translation interpolates
//!   along a straight line while the rotation block stays fixed at the
//!   value pre-computed at construction (auto tangent, reversed tangent, or
//!   an explicit angle).
//!
//! Dispatch happens with a match at the handful of call sites rather than
//! trait objects; both variants are plain data.

use serde::{Deserialize, Serialize};

use crate::error::ValueError;
use crate::value::ValueBuf;

/// Slot count of a motion value: `[a, b, c, d, tx, ty]`.
pub const MOTION_DIMS: usize = 6;

/// How a motion segment derives its rotation block.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum RotateMode {
    /// Heading of the straight line from start to end point.
    Auto,
    /// Auto heading plus pi.
    Reverse,
    /// Explicit angle in radians.
    Fixed(f32),
}

/// Linear interpolation between two equally-shaped value buffers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueSegment {
    start: ValueBuf,
    end: ValueBuf,
}

impl ValueSegment {
    pub fn new(start: ValueBuf, end: ValueBuf) -> Result<Self, ValueError> {
        if !start.shape_matches(&end) {
            return Err(ValueError::ShapeMismatch {
                expected: format!("{} components", start.component_count()),
                actual: format!("{} components", end.component_count()),
            });
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn start(&self) -> &ValueBuf {
        &self.start
    }

    #[inline]
    pub fn end(&self) -> &ValueBuf {
        &self.end
    }
}

/// A 2D affine transform `[a, b, c, d, tx, ty]` (column vectors `[a b]`,
/// `[c d]`, translation `[tx ty]`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionSegment {
    start: [f32; MOTION_DIMS],
    end: [f32; MOTION_DIMS],
}

/// `m1 * m2` for 2x3 affine transforms in `[a, b, c, d, tx, ty]` layout.
#[inline]
fn affine_mul(m1: [f32; 6], m2: [f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[2] * m2[1],
        m1[1] * m2[0] + m1[3] * m2[1],
        m1[0] * m2[2] + m1[2] * m2[3],
        m1[1] * m2[2] + m1[3] * m2[3],
        m1[0] * m2[4] + m1[2] * m2[5] + m1[4],
        m1[1] * m2[4] + m1[3] * m2[5] + m1[5],
    ]
}

const AFFINE_IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

impl MotionSegment {
    /// Build a segment between two points. The rotation block is derived
    /// once, here, and never re-interpolated.
    pub fn new(from: [f32; 2], to: [f32; 2], mode: RotateMode) -> Self {
        let angle = match mode {
            RotateMode::Auto => (to[1] - from[1]).atan2(to[0] - from[0]),
            RotateMode::Reverse => (to[1] - from[1]).atan2(to[0] - from[0]) + std::f32::consts::PI,
            RotateMode::Fixed(a) => a,
        };
        let (sin, cos) = angle.sin_cos();
        let rot = [cos, sin, -sin, cos];
        Self {
            start: [rot[0], rot[1], rot[2], rot[3], from[0], from[1]],
            end: [rot[0], rot[1], rot[2], rot[3], to[0], to[1]],
        }
    }

    #[inline]
    pub fn start_transform(&self) -> [f32; MOTION_DIMS] {
        self.start
    }

    #[inline]
    pub fn end_transform(&self) -> [f32; MOTION_DIMS] {
        self.end
    }

    #[inline]
    fn translation(m: &[f32; MOTION_DIMS]) -> [f32; 2] {
        [m[4], m[5]]
    }
}

/// Closed union of segment variants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    Value(ValueSegment),
    Motion(MotionSegment),
}

impl Segment {
    fn variant_name(&self) -> &'static str {
        match self {
            Segment::Value(_) => "value",
            Segment::Motion(_) => "motion",
        }
    }

    /// Component count of this segment's values.
    pub fn component_count(&self) -> usize {
        match self {
            Segment::Value(s) => s.start.component_count(),
            Segment::Motion(_) => 1,
        }
    }

    /// Start value as a buffer (motion segments materialize their 6 slots).
    pub fn start_value(&self) -> ValueBuf {
        match self {
            Segment::Value(s) => s.start.clone(),
            Segment::Motion(s) => ValueBuf::single(s.start.to_vec()).unwrap_or_default(),
        }
    }

    /// End value as a buffer.
    pub fn end_value(&self) -> ValueBuf {
        match self {
            Segment::Value(s) => s.end.clone(),
            Segment::Motion(s) => ValueBuf::single(s.end.to_vec()).unwrap_or_default(),
        }
    }

    /// Replace the start value.
    pub fn set_start(&mut self, start: ValueBuf) -> Result<(), ValueError> {
        match self {
            Segment::Value(s) => {
                if !s.end.shape_matches(&start) {
                    return Err(ValueError::ShapeMismatch {
                        expected: format!("{} components", s.end.component_count()),
                        actual: format!("{} components", start.component_count()),
                    });
                }
                s.start = start;
                Ok(())
            }
            Segment::Motion(s) => {
                if start.component_count() != 1 || start.dims(0) != MOTION_DIMS {
                    return Err(ValueError::ShapeMismatch {
                        expected: format!("1 component of {MOTION_DIMS} dims"),
                        actual: format!("{} components", start.component_count()),
                    });
                }
                for (slot, v) in s.start.iter_mut().zip(start.component(0).iter()) {
                    *slot = *v;
                }
                Ok(())
            }
        }
    }

    /// Zero the start value (additive "by" animations start from nothing;
    /// for motion that is the identity transform).
    pub fn set_zero_start(&mut self) {
        match self {
            Segment::Value(s) => s.start.zero(),
            Segment::Motion(s) => s.start = AFFINE_IDENTITY,
        }
    }

    /// Interpolate at `penetration` into `out`. The buffer is conformed to
    /// the segment's value shape; its contents are valid until the next call
    /// that reuses it.
    pub fn compute(&self, penetration: f32, out: &mut ValueBuf) -> Result<(), ValueError> {
        if !(0.0..=1.0).contains(&penetration) {
            return Err(ValueError::PenetrationOutOfRange { penetration });
        }
        match self {
            Segment::Value(s) => out.lerp_from(&s.start, &s.end, penetration),
            Segment::Motion(s) => {
                // Rotation block held at the end value; translation lerps.
                let p = penetration;
                let tx = p * s.end[4] + (1.0 - p) * s.start[4];
                let ty = p * s.end[5] + (1.0 - p) * s.start[5];
                let v = ValueBuf::single(vec![s.end[0], s.end[1], s.end[2], s.end[3], tx, ty])?;
                out.fill_from(&v);
                Ok(())
            }
        }
    }

    /// Geometric length used by paced timing.
    pub fn length(&self) -> Result<f32, ValueError> {
        match self {
            Segment::Value(s) => s.start.distance(&s.end),
            Segment::Motion(s) => {
                let a = MotionSegment::translation(&s.start);
                let b = MotionSegment::translation(&s.end);
                let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
                Ok((dx * dx + dy * dy).sqrt())
            }
        }
    }

    /// Whether this segment can take part in additive composition with a
    /// same-variant delta. Capability query for adapters stacking
    /// animations; both current variants qualify.
    pub fn is_additive(&self) -> bool {
        match self {
            Segment::Value(_) | Segment::Motion(_) => true,
        }
    }

    /// Compose `delta`'s end value onto this segment's end value. Value
    /// segments add component-wise; motion segments chain transforms by
    /// affine multiplication.
    pub fn add_to_end(&mut self, delta: &Segment) -> Result<(), ValueError> {
        match (self, delta) {
            (Segment::Value(s), Segment::Value(d)) => s.end.add_assign(&d.end),
            (Segment::Motion(s), Segment::Motion(d)) => {
                s.end = affine_mul(s.end, d.end);
                Ok(())
            }
            (a, b) => Err(ValueError::IncompatibleSegments {
                left: a.variant_name().into(),
                right: b.variant_name().into(),
            }),
        }
    }

    /// Fold `times` copies of this segment's end delta onto a computed value
    /// (accumulate semantics across repeat iterations). Value segments add a
    /// scaled vector; motion segments chain the end transform.
    pub fn accumulate_into(&self, out: &mut ValueBuf, times: u32) -> Result<(), ValueError> {
        if times == 0 {
            return Ok(());
        }
        match self {
            Segment::Value(s) => out.add_scaled(&s.end, times as f32),
            Segment::Motion(s) => {
                if out.component_count() != 1 || out.dims(0) != MOTION_DIMS {
                    return Err(ValueError::ShapeMismatch {
                        expected: format!("1 component of {MOTION_DIMS} dims"),
                        actual: format!("{} components", out.component_count()),
                    });
                }
                let c = out.component(0);
                let mut m = [c[0], c[1], c[2], c[3], c[4], c[5]];
                for _ in 0..times {
                    m = affine_mul(s.end, m);
                }
                out.fill_from(&ValueBuf::single(m.to_vec())?);
                Ok(())
            }
        }
    }

    /// Merge with a following same-typed segment by taking its end value
    /// (a "to" animation chained after a "from").
    pub fn collapse(&mut self, other: &Segment) -> Result<(), ValueError> {
        match (self, other) {
            (Segment::Value(s), Segment::Value(o)) => {
                if !s.end.shape_matches(&o.end) {
                    return Err(ValueError::ShapeMismatch {
                        expected: format!("{} components", s.end.component_count()),
                        actual: format!("{} components", o.end.component_count()),
                    });
                }
                s.end = o.end.clone();
                Ok(())
            }
            (Segment::Motion(s), Segment::Motion(o)) => {
                s.end = o.end;
                Ok(())
            }
            (a, b) => Err(ValueError::IncompatibleSegments {
                left: a.variant_name().into(),
                right: b.variant_name().into(),
            }),
        }
    }
}
