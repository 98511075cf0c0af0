//! Animation functions: the glue from simple time to interpolated values.
//!
//! An animation function owns a RefValues and maps the owning element's
//! simple time to a (segment, penetration) pair under one of three calc
//! modes, then computes into the schedule's scratch buffer. Accumulate
//! composition folds the final-segment delta once per completed iteration.

use serde::{Deserialize, Serialize};

use tempora_value_core::{RefValues, ValueBuf, ValueError};

use crate::time::TimeValue;

/// How whole-animation fraction maps onto segments.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalcMode {
    /// Step between values, holding each (a trailing hold segment is
    /// appended so the final value stays visible).
    Discrete,
    /// Equal time per segment, linear within each.
    Linear,
    /// Time distributed proportionally to geometric segment length.
    Paced,
}

#[derive(Debug)]
pub struct AnimationFunction {
    /// Canonical target path; used as the output key until prebinding
    /// resolves a handle.
    pub target: String,
    pub(crate) handle: Option<String>,
    pub calc_mode: CalcMode,
    pub additive: bool,
    pub accumulate: bool,
    pub(crate) enabled: bool,
    values: RefValues,
}

impl AnimationFunction {
    /// Finalize a value model for this function: discrete mode appends its
    /// trailing hold segment, then paced lengths are cached.
    pub fn new(
        target: impl Into<String>,
        mut values: RefValues,
        calc_mode: CalcMode,
    ) -> Result<Self, ValueError> {
        if calc_mode == CalcMode::Discrete {
            values.make_discrete()?;
        }
        values.initialize()?;
        Ok(Self {
            target: target.into(),
            handle: None,
            calc_mode,
            additive: false,
            accumulate: false,
            enabled: true,
            values,
        })
    }

    pub fn additive(mut self) -> Self {
        self.additive = true;
        self
    }

    pub fn accumulating(mut self) -> Self {
        self.accumulate = true;
        self
    }

    #[inline]
    pub fn values(&self) -> &RefValues {
        &self.values
    }

    /// The key changes are published under.
    #[inline]
    pub fn output_key(&self) -> &str {
        self.handle.as_deref().unwrap_or(&self.target)
    }

    /// Map simple time within the simple duration to (segment, penetration).
    fn locate(&self, simple_time: i64, simple_dur: TimeValue) -> Result<(usize, f32), ValueError> {
        let n = self.values.segment_count();
        let fraction = match simple_dur.resolved() {
            Some(d) if d > 0 => (simple_time as f64 / d as f64).clamp(0.0, 1.0) as f32,
            _ => 0.0,
        };
        match self.calc_mode {
            CalcMode::Discrete => {
                let seg = ((fraction * n as f32) as usize).min(n - 1);
                Ok((seg, 0.0))
            }
            CalcMode::Linear => {
                let x = fraction * n as f32;
                let seg = (x as usize).min(n - 1);
                Ok((seg, (x - seg as f32).clamp(0.0, 1.0)))
            }
            CalcMode::Paced => {
                let total = self.values.total_length()?;
                if total <= 0.0 {
                    return Ok((0, 0.0));
                }
                let mut remaining = fraction * total;
                for i in 0..n {
                    let len = self.values.segment_length(i)?;
                    if remaining <= len || i == n - 1 {
                        let p = if len > 0.0 {
                            (remaining / len).clamp(0.0, 1.0)
                        } else {
                            0.0
                        };
                        return Ok((i, p));
                    }
                    remaining -= len;
                }
                Ok((n - 1, 1.0))
            }
        }
    }

    /// Compute the animated value for the current sample into `out`. The
    /// buffer contents are valid until the next compute call reusing it.
    pub fn compute(
        &self,
        simple_time: i64,
        simple_dur: TimeValue,
        iteration: u32,
        out: &mut ValueBuf,
    ) -> Result<(), ValueError> {
        let (seg, penetration) = self.locate(simple_time, simple_dur)?;
        self.values.compute(seg, penetration, out)?;
        if self.accumulate && iteration > 0 {
            let last = self.values.segment(self.values.segment_count() - 1)?;
            last.accumulate_into(out, iteration)?;
        }
        Ok(())
    }
}
