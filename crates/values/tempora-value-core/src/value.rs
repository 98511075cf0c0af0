//! Rectangular value buffers.
//!
//! A value is one sub-array per logical component (e.g. one component for a
//! scalar opacity, several for a dash pattern), each holding one or more
//! numeric dimensions. Buffers are reused across compute calls, so shape
//! conformance is an explicit, checked operation rather than an allocation.

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// A rectangular array of f32: `components[c][d]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueBuf {
    components: Vec<Vec<f32>>,
}

fn shape_string(components: &[Vec<f32>]) -> String {
    let dims: Vec<String> = components.iter().map(|c| c.len().to_string()).collect();
    format!("[{}]", dims.join(", "))
}

impl ValueBuf {
    /// Build a buffer from explicit components. Rejects an empty component
    /// list and empty components.
    pub fn new(components: Vec<Vec<f32>>) -> Result<Self, ValueError> {
        if components.is_empty() {
            return Err(ValueError::Empty {
                reason: "value has no components".into(),
            });
        }
        if components.iter().any(|c| c.is_empty()) {
            return Err(ValueError::Empty {
                reason: "value has a zero-dimension component".into(),
            });
        }
        Ok(Self { components })
    }

    /// Single-component scalar value.
    pub fn scalar(x: f32) -> Self {
        Self {
            components: vec![vec![x]],
        }
    }

    /// Single component with the given dimensions.
    pub fn single(dims: Vec<f32>) -> Result<Self, ValueError> {
        Self::new(vec![dims])
    }

    #[inline]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    #[inline]
    pub fn dims(&self, component: usize) -> usize {
        self.components.get(component).map_or(0, |c| c.len())
    }

    #[inline]
    pub fn component(&self, component: usize) -> &[f32] {
        &self.components[component]
    }

    #[inline]
    pub fn get(&self, component: usize, dim: usize) -> f32 {
        self.components[component][dim]
    }

    #[inline]
    pub fn components(&self) -> &[Vec<f32>] {
        &self.components
    }

    /// True when both buffers have the same component count and dimensions.
    pub fn shape_matches(&self, other: &ValueBuf) -> bool {
        self.components.len() == other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a.len() == b.len())
    }

    fn shape_err(&self, other: &ValueBuf) -> ValueError {
        ValueError::ShapeMismatch {
            expected: shape_string(&self.components),
            actual: shape_string(&other.components),
        }
    }

    /// Resize this buffer (reusing its allocations) to the shape of `src`.
    pub fn conform_to(&mut self, src: &ValueBuf) {
        self.components.resize(src.components.len(), Vec::new());
        for (dst, s) in self.components.iter_mut().zip(src.components.iter()) {
            dst.resize(s.len(), 0.0);
        }
    }

    /// Copy `src` into this buffer, conforming the shape first.
    pub fn fill_from(&mut self, src: &ValueBuf) {
        self.conform_to(src);
        for (dst, s) in self.components.iter_mut().zip(src.components.iter()) {
            dst.copy_from_slice(s);
        }
    }

    /// Write `p*end + (1-p)*start` into this buffer.
    pub fn lerp_from(
        &mut self,
        start: &ValueBuf,
        end: &ValueBuf,
        p: f32,
    ) -> Result<(), ValueError> {
        if !start.shape_matches(end) {
            return Err(start.shape_err(end));
        }
        self.conform_to(start);
        for (c, (sa, sb)) in self
            .components
            .iter_mut()
            .zip(start.components.iter().zip(end.components.iter()))
        {
            for (d, (a, b)) in c.iter_mut().zip(sa.iter().zip(sb.iter())) {
                *d = p * b + (1.0 - p) * a;
            }
        }
        Ok(())
    }

    /// Component-wise `self += other`.
    pub fn add_assign(&mut self, other: &ValueBuf) -> Result<(), ValueError> {
        if !self.shape_matches(other) {
            return Err(self.shape_err(other));
        }
        for (c, o) in self.components.iter_mut().zip(other.components.iter()) {
            for (d, v) in c.iter_mut().zip(o.iter()) {
                *d += v;
            }
        }
        Ok(())
    }

    /// Component-wise `self += k * other`.
    pub fn add_scaled(&mut self, other: &ValueBuf, k: f32) -> Result<(), ValueError> {
        if !self.shape_matches(other) {
            return Err(self.shape_err(other));
        }
        for (c, o) in self.components.iter_mut().zip(other.components.iter()) {
            for (d, v) in c.iter_mut().zip(o.iter()) {
                *d += k * v;
            }
        }
        Ok(())
    }

    /// Zero every dimension in place.
    pub fn zero(&mut self) {
        for c in self.components.iter_mut() {
            for d in c.iter_mut() {
                *d = 0.0;
            }
        }
    }

    /// Sum over components of the Euclidean distance between the two buffers.
    pub fn distance(&self, other: &ValueBuf) -> Result<f32, ValueError> {
        if !self.shape_matches(other) {
            return Err(self.shape_err(other));
        }
        let mut total = 0.0f32;
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            let mut sq = 0.0f32;
            for (x, y) in a.iter().zip(b.iter()) {
                let d = x - y;
                sq += d * d;
            }
            total += sq.sqrt();
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_midpoint() {
        let a = ValueBuf::new(vec![vec![0.0, 0.0]]).unwrap();
        let b = ValueBuf::new(vec![vec![10.0, 4.0]]).unwrap();
        let mut out = ValueBuf::default();
        out.lerp_from(&a, &b, 0.5).unwrap();
        assert_eq!(out.get(0, 0), 5.0);
        assert_eq!(out.get(0, 1), 2.0);
    }

    #[test]
    fn distance_sums_per_component() {
        let a = ValueBuf::new(vec![vec![0.0, 0.0], vec![0.0]]).unwrap();
        let b = ValueBuf::new(vec![vec![3.0, 4.0], vec![2.0]]).unwrap();
        assert_eq!(a.distance(&b).unwrap(), 7.0);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let a = ValueBuf::scalar(1.0);
        let b = ValueBuf::new(vec![vec![1.0, 2.0]]).unwrap();
        assert!(matches!(
            a.distance(&b),
            Err(ValueError::ShapeMismatch { .. })
        ));
    }
}
