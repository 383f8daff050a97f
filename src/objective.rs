use crate::cancel::CancelToken;
use crate::cloud::{PointCloud, Transform};
use crate::config::ObjectiveParams;
use crate::error::{AlignError, AlignResult};
use crate::transport::Mapping;
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::debug;

/// Something the swarm can minimise.
pub trait Objective {
    fn evaluate(&self, params: &Vector) -> AlignResult<f64>;
}

impl<F> Objective for F
where
    F: Fn(&Vector) -> f64,
{
    fn evaluate(&self, params: &Vector) -> AlignResult<f64> {
        Ok(self(params))
    }
}

pub fn sphere(v: &Vector) -> f64 {
    v.components().iter().map(|x| x * x).sum()
}

/// `((2x + 5 sin x)^2 + (2y + 5 sin y)^2) / 40`, a bumpy bowl with its minimum at the origin.
pub fn wavy_parabola(v: &Vector) -> f64 {
    let term = |i: usize| {
        let c = v.get(i).unwrap_or(0.0);
        (2.0 * c + 5.0 * c.sin()).powi(2)
    };
    (term(0) + term(1)) / 40.0
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    EnumString,
    Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TransformKind {
    Translation,
    TranslationRotation,
    #[default]
    Trs,
}

impl TransformKind {
    pub fn dimension(self) -> usize {
        match self {
            TransformKind::Translation => 2,
            TransformKind::TranslationRotation => 3,
            TransformKind::Trs => 5,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    EnumString,
    Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum CostMetric {
    #[default]
    Euclidean,
    SquaredEuclidean,
}

impl CostMetric {
    #[inline(always)]
    pub fn distance(self, dx: f64, dy: f64) -> f64 {
        let sq = dx * dx + dy * dy;
        match self {
            CostMetric::Euclidean => sq.sqrt(),
            CostMetric::SquaredEuclidean => sq,
        }
    }
}

/// Transport cost between a fixed reference cloud and a transformed candidate cloud.
///
/// Both clouds are normalised to unit mass and padded with dummies to a common size.
/// The reference supplies mass, the candidate demands it.
#[derive(Debug, Clone)]
pub struct AlignmentObjective {
    reference: PointCloud,
    candidate: PointCloud,
    kind: TransformKind,
    metric: CostMetric,
    delta: f64,
    rotation_penalty: f64,
    scale_penalty: f64,
    cancel: Option<CancelToken>,
}

impl AlignmentObjective {
    pub fn new(
        reference: &PointCloud,
        candidate: &PointCloud,
        params: &ObjectiveParams,
        delta: f64,
    ) -> AlignResult<Self> {
        if !(delta.is_finite() && delta > 0.0) {
            return Err(AlignError::InvalidTolerance(delta));
        }
        let reference = reference.normalized()?;
        let candidate = candidate.normalized()?;
        let size = reference.len().max(candidate.len());

        debug!(
            "Alignment objective: {} reference / {} candidate points, padded to {}",
            reference.len(),
            candidate.len(),
            size
        );

        Ok(Self {
            reference: reference.padded_to(size),
            candidate: candidate.padded_to(size),
            kind: params.transform,
            metric: params.metric,
            delta,
            rotation_penalty: params.rotation_penalty,
            scale_penalty: params.scale_penalty,
            cancel: None,
        })
    }

    /// Polls `token` between solver phases of every evaluation.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn dimension(&self) -> usize {
        self.kind.dimension()
    }

    pub fn size(&self) -> usize {
        self.reference.len()
    }

    /// Costs laid out `[a * n + b]` with `a` a candidate point and `b` a reference point.
    /// Pairs involving a dummy cost nothing.
    pub fn cost_matrix(&self, candidate: &PointCloud) -> Vec<f64> {
        let refs = self.reference.points();
        let mut costs = Vec::with_capacity(refs.len() * refs.len());
        for c in candidate.points() {
            for r in refs {
                if c.is_dummy || r.is_dummy {
                    costs.push(0.0);
                } else {
                    costs.push(self.metric.distance(r.x - c.x, r.y - c.y));
                }
            }
        }
        costs
    }

    /// The transport plan behind one fitness value, without penalties.
    pub fn mapping_for(&self, params: &Vector) -> AlignResult<(Transform, Mapping)> {
        if params.dimension() != self.dimension() {
            return Err(AlignError::DimensionMismatch {
                expected: self.dimension(),
                found: params.dimension(),
            });
        }
        let transform = Transform::from_parameters(params)?;
        let moved = transform.apply(&self.candidate);
        let costs = self.cost_matrix(&moved);

        let mapping = Mapping::approximate_with_cancel(
            &self.reference.masses(),
            &moved.masses(),
            &costs,
            self.delta,
            self.cancel.as_ref(),
        )?;
        Ok((transform, mapping))
    }
}

impl Objective for AlignmentObjective {
    fn evaluate(&self, params: &Vector) -> AlignResult<f64> {
        let (transform, mapping) = self.mapping_for(params)?;
        let (sx, sy) = transform.scale_offset;
        let penalty = self.rotation_penalty * transform.rotation * transform.rotation
            + self.scale_penalty * (sx.abs() + sy.abs());
        Ok(mapping.total_cost() + penalty)
    }
}
