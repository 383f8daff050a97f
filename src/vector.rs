use crate::error::{AlignError, AlignResult};
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A real vector whose dimension is fixed when it is created.
///
/// Used both as particle state (position/velocity) and as the parameter
/// domain of an objective. Operations never mutate `self`; they return a
/// fresh vector of the same dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector {
    components: Vec<f64>,
}

impl Vector {
    pub fn new(components: Vec<f64>) -> Self {
        Self { components }
    }

    pub fn zeros(dimension: usize) -> Self {
        Self {
            components: vec![0.0; dimension],
        }
    }

    #[inline(always)]
    pub fn dimension(&self) -> usize {
        self.components.len()
    }

    #[inline(always)]
    pub fn components(&self) -> &[f64] {
        &self.components
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.components.get(index).copied()
    }

    /// Returns a copy with component `index` replaced by `value`.
    pub fn with_component(&self, index: usize, value: f64) -> AlignResult<Vector> {
        if index >= self.dimension() {
            return Err(AlignError::DimensionMismatch {
                expected: self.dimension(),
                found: index + 1,
            });
        }
        let mut components = self.components.clone();
        components[index] = value;
        Ok(Vector { components })
    }

    /// Returns a vector of this dimension holding `values`.
    pub fn replaced(&self, values: &[f64]) -> AlignResult<Vector> {
        self.check_dimension(values.len())?;
        Ok(Vector {
            components: values.to_vec(),
        })
    }

    pub fn add(&self, other: &Vector) -> AlignResult<Vector> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn subtract(&self, other: &Vector) -> AlignResult<Vector> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn scale(&self, scalar: f64) -> Vector {
        Vector {
            components: self.components.iter().map(|&c| c * scalar).collect(),
        }
    }

    /// Multiplies every component by an independent draw from `[0, 1)`.
    pub fn jitter(&self, rng: &mut Rng) -> Vector {
        Vector {
            components: self.components.iter().map(|&c| c * rng.f64()).collect(),
        }
    }

    pub fn norm(&self) -> f64 {
        self.components.iter().map(|c| c * c).sum::<f64>().sqrt()
    }

    fn zip_with(&self, other: &Vector, op: impl Fn(f64, f64) -> f64) -> AlignResult<Vector> {
        self.check_dimension(other.dimension())?;
        Ok(Vector {
            components: self
                .components
                .iter()
                .zip(&other.components)
                .map(|(&a, &b)| op(a, b))
                .collect(),
        })
    }

    fn check_dimension(&self, found: usize) -> AlignResult<()> {
        if found != self.dimension() {
            return Err(AlignError::DimensionMismatch {
                expected: self.dimension(),
                found,
            });
        }
        Ok(())
    }
}

impl From<Vec<f64>> for Vector {
    fn from(components: Vec<f64>) -> Self {
        Self::new(components)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, c) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.5}", c)?;
        }
        write!(f, "]")
    }
}
