use super::solver::{solve_with_cancel, SolverStats};
use crate::cancel::CancelToken;
use crate::error::{AlignError, AlignResult};
use serde::Serialize;
use strum_macros::Display;
use tracing::{debug, warn};

// Scaled integers beyond this lose exactness once summed as f64.
const MAX_SCALED_VALUE: f64 = 1e15;

/// An additive approximation of the optimal transport between two discrete
/// mass distributions.
///
/// Supply vertices (B) and demand vertices (A) both number `n`. `costs` and
/// the resulting flow are laid out `[a * n + b]`: row = demand, column = supply.
#[derive(Debug, Clone, Serialize)]
pub struct Mapping {
    n: usize,
    flow: Vec<f64>,
    total_cost: f64,
    stats: SolverStats,
}

impl Mapping {
    /// Computes a plan whose cost is within roughly `delta` of optimal.
    ///
    /// Smaller `delta` means a larger scaled integer instance and more solver phases.
    pub fn approximate(
        supplies: &[f64],
        demands: &[f64],
        costs: &[f64],
        delta: f64,
    ) -> AlignResult<Self> {
        Self::approximate_with_cancel(supplies, demands, costs, delta, None)
    }

    pub fn approximate_with_cancel(
        supplies: &[f64],
        demands: &[f64],
        costs: &[f64],
        delta: f64,
        cancel: Option<&CancelToken>,
    ) -> AlignResult<Self> {
        if !(delta.is_finite() && delta > 0.0) {
            return Err(AlignError::InvalidTolerance(delta));
        }
        validate_inputs(supplies, demands, costs)?;

        let n = supplies.len();
        let max_cost = costs.iter().cloned().fold(0.0, f64::max);

        // Demand rounds up and supply rounds down.
        let alpha = 4.0 * max_cost / delta;
        let mass_scale = alpha * n as f64;

        let max_mass = supplies.iter().chain(demands).cloned().fold(0.0, f64::max);
        if max_cost * alpha > MAX_SCALED_VALUE || max_mass * mass_scale > MAX_SCALED_VALUE {
            return Err(AlignError::Validation(format!(
                "delta {} is too small for an instance with max cost {} and n={}",
                delta, max_cost, n
            )));
        }

        let mut flow = vec![0.0; n * n];
        let mut stats = SolverStats::default();

        if alpha > 0.0 {
            let scaled_costs: Vec<i64> = costs
                .iter()
                .map(|&c| (c * alpha).floor() as i64)
                .collect();
            let scaled_demands: Vec<i64> = demands
                .iter()
                .map(|&d| (d * mass_scale).ceil() as i64)
                .collect();
            let mut scaled_supplies: Vec<i64> = supplies
                .iter()
                .map(|&s| (s * mass_scale).floor() as i64)
                .collect();

            // The solver runs supply to exhaustion, so surplus supply is held back
            // here and left to the greedy repair.
            let mut excess =
                scaled_supplies.iter().sum::<i64>() - scaled_demands.iter().sum::<i64>();
            for s in scaled_supplies.iter_mut() {
                if excess <= 0 {
                    break;
                }
                let cut = excess.min(*s);
                *s -= cut;
                excess -= cut;
            }

            let plan = solve_with_cancel(&scaled_costs, &scaled_supplies, &scaled_demands, cancel)?;
            stats = plan.stats;

            for (f, &scaled) in flow.iter_mut().zip(plan.matched()) {
                *f = scaled as f64 / mass_scale;
            }
        }

        let mut residual_supply = supplies.to_vec();
        let mut residual_demand = demands.to_vec();
        for a in 0..n {
            for b in 0..n {
                let f = flow[a * n + b];
                residual_supply[b] -= f;
                residual_demand[a] -= f;
            }
        }

        // Pull back flow into over-saturated demand vertices.
        for a in 0..n {
            let mut b = 0;
            while residual_demand[a] < 0.0 && b < n {
                let reduction = (-residual_demand[a]).min(flow[a * n + b]);
                flow[a * n + b] -= reduction;
                residual_demand[a] += reduction;
                residual_supply[b] += reduction;
                b += 1;
            }
        }

        // Greedily match whatever mass is left over.
        for b in 0..n {
            let mut a = 0;
            while residual_supply[b] > 0.0 && a < n {
                let increase = residual_supply[b].min(residual_demand[a]);
                if increase > 0.0 {
                    flow[a * n + b] += increase;
                    residual_demand[a] -= increase;
                    residual_supply[b] -= increase;
                }
                a += 1;
            }
        }

        let total_cost = flow.iter().zip(costs).map(|(f, c)| f * c).sum();

        debug!(
            "Mapping: n={} alpha={:.3} phases={} cost={:.6}",
            n, alpha, stats.phases, total_cost
        );

        Ok(Self {
            n,
            flow,
            total_cost,
            stats,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Mass moved from supply vertex `b` to demand vertex `a`.
    #[inline(always)]
    pub fn flow(&self, a: usize, b: usize) -> f64 {
        self.flow[a * self.n + b]
    }

    pub fn flows(&self) -> &[f64] {
        &self.flow
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    /// Checks this plan's marginals against the inputs it was built from.
    pub fn verify(
        &self,
        supplies: &[f64],
        demands: &[f64],
        threshold: f64,
    ) -> Vec<MarginalViolation> {
        verify_flow(supplies, demands, &self.flow, threshold)
    }
}

fn validate_inputs(supplies: &[f64], demands: &[f64], costs: &[f64]) -> AlignResult<()> {
    let n = supplies.len();
    if demands.len() != n {
        return Err(AlignError::DimensionMismatch {
            expected: n,
            found: demands.len(),
        });
    }
    if costs.len() != n * n {
        return Err(AlignError::DimensionMismatch {
            expected: n * n,
            found: costs.len(),
        });
    }
    if costs.iter().any(|c| !c.is_finite() || *c < 0.0) {
        return Err(AlignError::Validation(
            "costs must be finite and non-negative".to_string(),
        ));
    }
    if supplies
        .iter()
        .chain(demands)
        .any(|m| !m.is_finite() || *m < 0.0)
    {
        return Err(AlignError::Validation(
            "masses must be finite and non-negative".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum Side {
    Supply,
    Demand,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarginalViolation {
    pub side: Side,
    pub index: usize,
    /// Input mass minus transported mass.
    pub residual: f64,
}

/// Lists every vertex whose transported mass differs from its input by more than `threshold`.
///
/// `flow` is laid out `[a * n + b]`.
pub fn verify_flow(
    supplies: &[f64],
    demands: &[f64],
    flow: &[f64],
    threshold: f64,
) -> Vec<MarginalViolation> {
    let n = supplies.len();
    let mut violations = Vec::new();
    if demands.len() != n || flow.len() != n * n {
        warn!(
            "verify_flow: shape mismatch (n={}, demands={}, flow={})",
            n,
            demands.len(),
            flow.len()
        );
        return violations;
    }

    for i in 0..n {
        let shipped: f64 = (0..n).map(|a| flow[a * n + i]).sum();
        let received: f64 = (0..n).map(|b| flow[i * n + b]).sum();

        let residual_b = supplies[i] - shipped;
        let residual_a = demands[i] - received;
        if residual_b.abs() > threshold {
            warn!("Violation {}: {:.3e} at index {}", Side::Supply, residual_b, i);
            violations.push(MarginalViolation {
                side: Side::Supply,
                index: i,
                residual: residual_b,
            });
        }
        if residual_a.abs() > threshold {
            warn!("Violation {}: {:.3e} at index {}", Side::Demand, residual_a, i);
            violations.push(MarginalViolation {
                side: Side::Demand,
                index: i,
                residual: residual_a,
            });
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0)]
    #[case(-0.5)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_rejects_bad_delta(#[case] delta: f64) {
        let res = Mapping::approximate(&[1.0], &[1.0], &[1.0], delta);
        assert!(matches!(res, Err(AlignError::InvalidTolerance(_))));
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let res = Mapping::approximate(&[0.5, 0.5], &[1.0], &[0.0; 4], 0.1);
        assert!(matches!(res, Err(AlignError::DimensionMismatch { .. })));
        let res = Mapping::approximate(&[0.5, 0.5], &[0.5, 0.5], &[0.0; 3], 0.1);
        assert!(matches!(res, Err(AlignError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_rejects_negative_cost() {
        let res = Mapping::approximate(&[1.0], &[1.0], &[-1.0], 0.1);
        assert!(matches!(res, Err(AlignError::Validation(_))));
    }

    #[test]
    fn test_identical_points_cost_nothing() {
        // Two points, zero cost on the diagonal.
        let costs = [0.0, 2.0, 2.0, 0.0];
        let m = Mapping::approximate(&[0.5, 0.5], &[0.5, 0.5], &costs, 0.01).unwrap();
        assert!(m.total_cost() < 0.01, "cost was {}", m.total_cost());
        assert!(m.verify(&[0.5, 0.5], &[0.5, 0.5], 1e-9).is_empty());
    }

    #[test]
    fn test_all_zero_costs_still_feasible() {
        let supplies = [0.2, 0.3, 0.5];
        let demands = [0.6, 0.1, 0.3];
        let m = Mapping::approximate(&supplies, &demands, &[0.0; 9], 0.01).unwrap();
        assert_eq!(m.total_cost(), 0.0);
        assert_eq!(m.stats().phases, 0);
        assert!(m.verify(&supplies, &demands, 1e-9).is_empty());
    }

    #[test]
    fn test_dummy_entries_are_absorbed() {
        // Second supply is a zero-mass dummy with zero cost against everything.
        let supplies = [1.0, 0.0];
        let demands = [0.5, 0.5];
        let costs = [1.0, 0.0, 3.0, 0.0];
        let m = Mapping::approximate(&supplies, &demands, &costs, 0.01).unwrap();
        assert!((m.total_cost() - 2.0).abs() < 0.02, "cost was {}", m.total_cost());
        assert!(m.verify(&supplies, &demands, 1e-6).is_empty());
    }

    #[test]
    fn test_verify_flow_reports_both_sides() {
        let flow = [0.5, 0.0, 0.0, 0.0];
        let v = verify_flow(&[0.5, 0.5], &[0.5, 0.5], &flow, 1e-6);
        assert_eq!(v.len(), 2);
        assert!(v.iter().any(|x| x.side == Side::Supply && x.index == 1));
        assert!(v.iter().any(|x| x.side == Side::Demand && x.index == 1));
    }
}
