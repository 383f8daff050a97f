use crate::cancel::CancelToken;
use crate::error::{AlignError, AlignResult};
use serde::Serialize;
use tracing::debug;

const INF: i64 = i64::MAX;

/// Counters collected while solving one instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SolverStats {
    pub phases: usize,
    pub augmentations: usize,
    /// Sum of edge counts over every augmenting path pushed.
    pub path_length: usize,
}

/// Integer transport plan between `n` supply vertices (B) and `n` demand vertices (A).
#[derive(Debug, Clone)]
pub struct TransportPlan {
    n: usize,
    /// Flow committed on (a, b), stored `[a * n + b]`.
    matched: Vec<i64>,
    /// Remaining forward residual on (b, a), stored `[b * n + a]`.
    unmatched: Vec<i64>,
    pub stats: SolverStats,
}

impl TransportPlan {
    pub fn n(&self) -> usize {
        self.n
    }

    /// Units moved between demand vertex `a` and supply vertex `b`.
    #[inline(always)]
    pub fn flow(&self, a: usize, b: usize) -> i64 {
        self.matched[a * self.n + b]
    }

    pub fn matched(&self) -> &[i64] {
        &self.matched
    }

    pub fn shipped_from(&self, b: usize) -> i64 {
        (0..self.n).map(|a| self.flow(a, b)).sum()
    }

    pub fn received_by(&self, a: usize) -> i64 {
        (0..self.n).map(|b| self.flow(a, b)).sum()
    }

    /// Cost of the plan under `costs` laid out `[a * n + b]`.
    pub fn total_cost(&self, costs: &[i64]) -> i64 {
        self.matched
            .iter()
            .zip(costs)
            .map(|(&f, &c)| f * c)
            .sum()
    }

    /// The residual graph as a `2n x 2n` block matrix.
    ///
    /// Rows/columns `0..n` are supply vertices and `n..2n` demand vertices.
    /// `[n + a][b]` holds matched flow, `[b][n + a]` the unused forward residual.
    pub fn to_block_matrix(&self) -> Vec<Vec<i64>> {
        let n = self.n;
        let mut block = vec![vec![0; 2 * n]; 2 * n];
        for i in 0..n {
            for j in 0..n {
                block[i + n][j] = self.matched[i * n + j];
                block[i][j + n] = self.unmatched[i * n + j];
            }
        }
        block
    }
}

/// Residual state of one instance, mutated in place across phases.
struct ResidualGraph {
    n: usize,
    cost_ba: Vec<i64>,
    cost_ab: Vec<i64>,
    // 0..n are B, n..2n are A.
    duals: Vec<i64>,
    cap_ba: Vec<i64>,
    cap_ab: Vec<i64>,
    deficiency_b: Vec<i64>,
    deficiency_a: Vec<i64>,
    free_b: Vec<bool>,
    free_a: Vec<bool>,
    // Next neighbour index each vertex's DFS resumes from within a phase.
    next_neighbor: Vec<usize>,
    path: Vec<usize>,
}

impl ResidualGraph {
    fn new(costs: &[i64], supplies: &[i64], demands: &[i64]) -> Self {
        let n = supplies.len();
        let mut cost_ba = vec![0; n * n];
        let mut cap_ba = vec![0; n * n];
        for b in 0..n {
            for a in 0..n {
                cost_ba[b * n + a] = costs[a * n + b];
                cap_ba[b * n + a] = supplies[b].min(demands[a]);
            }
        }

        Self {
            n,
            cost_ba,
            cost_ab: costs.to_vec(),
            duals: vec![0; 2 * n],
            cap_ba,
            cap_ab: vec![0; n * n],
            deficiency_b: supplies.to_vec(),
            deficiency_a: demands.to_vec(),
            free_b: supplies.iter().map(|&s| s != 0).collect(),
            free_a: demands.iter().map(|&d| d != 0).collect(),
            next_neighbor: vec![0; 2 * n],
            path: Vec::with_capacity(2 * n),
        }
    }

    fn has_free_supply(&self) -> bool {
        self.free_b.iter().any(|&f| f)
    }

    /// Dijkstra over slack lengths from every free supply vertex at once.
    /// Fills `lv` and returns the distance to the nearest free demand vertex.
    fn shortest_free_distance(&self, lv: &mut [i64]) -> AlignResult<i64> {
        let n = self.n;
        lv.fill(INF);
        for b in 0..n {
            if self.free_b[b] {
                lv[b] = 0;
            }
        }

        let mut settled = vec![false; 2 * n];
        for _ in 0..2 * n {
            let mut min_dist = INF;
            let mut min_vertex = None;
            for v in 0..2 * n {
                if !settled[v] && lv[v] < min_dist {
                    min_dist = lv[v];
                    min_vertex = Some(v);
                }
            }

            let Some(u) = min_vertex else {
                break;
            };
            settled[u] = true;

            if u < n {
                let row = u * n;
                for a in 0..n {
                    if self.cap_ba[row + a] > 0 {
                        let d = min_dist + self.cost_ba[row + a] + 1
                            - self.duals[u]
                            - self.duals[n + a];
                        if d < lv[n + a] {
                            lv[n + a] = d;
                        }
                    }
                }
            } else {
                let a = u - n;
                if self.free_a[a] {
                    return Ok(min_dist);
                }
                let row = a * n;
                for b in 0..n {
                    if self.cap_ab[row + b] > 0 {
                        let d = min_dist + self.duals[u] + self.duals[b] - self.cost_ab[row + b];
                        if d < lv[b] {
                            lv[b] = d;
                        }
                    }
                }
            }
        }

        Err(AlignError::SolverInvariantViolation(
            "no augmenting path reaches a free demand vertex while supply remains".to_string(),
        ))
    }

    fn adjust_duals(&mut self, lv: &[i64], dist: i64) -> AlignResult<()> {
        let n = self.n;
        for (v, &l) in lv.iter().enumerate() {
            let delta = (dist - l).max(0);
            if v < n {
                self.duals[v] += delta;
                if self.duals[v] < 0 {
                    return Err(AlignError::SolverInvariantViolation(format!(
                        "supply vertex {} has negative dual weight {}",
                        v, self.duals[v]
                    )));
                }
            } else {
                self.duals[v] -= delta;
                if self.duals[v] > 0 {
                    return Err(AlignError::SolverInvariantViolation(format!(
                        "demand vertex {} has positive dual weight {}",
                        v - n,
                        self.duals[v]
                    )));
                }
            }
        }
        Ok(())
    }

    #[inline(always)]
    fn is_admissible(&self, from: usize, to: usize) -> bool {
        let n = self.n;
        if from < n {
            let idx = from * n + (to - n);
            self.cap_ba[idx] > 0
                && self.cost_ba[idx] + 1 - self.duals[from] - self.duals[to] == 0
        } else {
            let idx = (from - n) * n + to;
            self.cap_ab[idx] > 0 && self.duals[from] + self.duals[to] == self.cost_ab[idx]
        }
    }

    /// Partial DFS over admissible edges from `start`. Leaves the path in
    /// `self.path` and returns whether it ends at a free demand vertex.
    fn find_augmenting_path(&mut self, start: usize) -> bool {
        let n = self.n;
        self.path.clear();
        self.path.push(start);

        while let Some(&end) = self.path.last() {
            if end >= n && self.free_a[end - n] {
                return true;
            }

            let range_end = if end < n { 2 * n } else { n };
            let mut extended = false;
            let mut i = self.next_neighbor[end];
            while i < range_end {
                self.next_neighbor[end] = i + 1;
                if self.is_admissible(end, i) {
                    self.path.push(i);
                    extended = true;
                    break;
                }
                i += 1;
            }

            if !extended {
                self.path.pop();
            }
        }
        false
    }

    /// Pushes the bottleneck amount along `self.path`. Only the endpoints
    /// change deficiency; interior vertices conserve flow.
    fn augment_path(&mut self) {
        let n = self.n;
        let first = self.path[0];
        let last = self.path[self.path.len() - 1] - n;

        let mut beta = self.deficiency_b[first].min(self.deficiency_a[last]);
        for w in self.path.windows(2) {
            let (u, v) = (w[0], w[1]);
            let cap = if u >= n {
                self.cap_ab[(u - n) * n + v]
            } else {
                self.cap_ba[u * n + (v - n)]
            };
            beta = beta.min(cap);
        }

        for j in 0..self.path.len() - 1 {
            let u = self.path[j];
            let v = self.path[j + 1];
            if u >= n {
                let a = u - n;
                self.cap_ab[a * n + v] -= beta;
                self.cap_ba[v * n + a] += beta;
                if self.cap_ab[a * n + v] > 0 {
                    self.next_neighbor[u] = v;
                }
            } else {
                let a = v - n;
                self.cap_ba[u * n + a] -= beta;
                self.cap_ab[a * n + u] += beta;
                if self.cap_ba[u * n + a] > 0 {
                    self.next_neighbor[u] = v;
                }
            }
        }

        self.deficiency_b[first] -= beta;
        if self.deficiency_b[first] == 0 {
            self.free_b[first] = false;
        }
        self.deficiency_a[last] -= beta;
        if self.deficiency_a[last] == 0 {
            self.free_a[last] = false;
        }
    }

    /// Maximal set of vertex-disjoint admissible augmenting paths.
    /// Returns the number of augmentations performed.
    fn augment_phase(&mut self, stats: &mut SolverStats) -> usize {
        let n = self.n;
        for v in 0..n {
            self.next_neighbor[v] = n;
            self.next_neighbor[n + v] = 0;
        }

        let mut pushed = 0;
        for b in 0..n {
            if !self.free_b[b] {
                continue;
            }
            while self.deficiency_b[b] > 0 && self.next_neighbor[b] < 2 * n {
                if !self.find_augmenting_path(b) {
                    break;
                }
                stats.path_length += self.path.len() - 1;
                self.augment_path();
                pushed += 1;
            }
        }
        stats.augmentations += pushed;
        pushed
    }

    fn into_plan(self, stats: SolverStats) -> TransportPlan {
        TransportPlan {
            n: self.n,
            matched: self.cap_ab,
            unmatched: self.cap_ba,
            stats,
        }
    }
}

fn validate_instance(costs: &[i64], supplies: &[i64], demands: &[i64]) -> AlignResult<()> {
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
    if let Some(c) = costs.iter().find(|&&c| c < 0) {
        return Err(AlignError::Validation(format!("negative scaled cost {}", c)));
    }
    if supplies.iter().chain(demands).any(|&m| m < 0) {
        return Err(AlignError::Validation(
            "supplies and demands must be non-negative".to_string(),
        ));
    }

    let total_supply: i64 = supplies.iter().sum();
    let total_demand: i64 = demands.iter().sum();
    if total_supply > total_demand {
        return Err(AlignError::SolverInvariantViolation(format!(
            "total supply {} exceeds total demand {}",
            total_supply, total_demand
        )));
    }
    Ok(())
}

/// Solves an integer transportation instance until every supply vertex is exhausted.
///
/// `costs` is laid out `[a * n + b]` (demand row, supply column). Requires
/// `sum(supplies) <= sum(demands)`.
pub fn solve(costs: &[i64], supplies: &[i64], demands: &[i64]) -> AlignResult<TransportPlan> {
    solve_with_cancel(costs, supplies, demands, None)
}

/// Same as [`solve`], polling `cancel` before every phase.
pub fn solve_with_cancel(
    costs: &[i64],
    supplies: &[i64],
    demands: &[i64],
    cancel: Option<&CancelToken>,
) -> AlignResult<TransportPlan> {
    validate_instance(costs, supplies, demands)?;

    let mut graph = ResidualGraph::new(costs, supplies, demands);
    let mut stats = SolverStats::default();
    let mut lv = vec![INF; 2 * graph.n];

    while graph.has_free_supply() {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(AlignError::Cancelled);
        }
        stats.phases += 1;

        let dist = graph.shortest_free_distance(&mut lv)?;
        graph.adjust_duals(&lv, dist)?;

        if graph.augment_phase(&mut stats) == 0 {
            return Err(AlignError::SolverInvariantViolation(format!(
                "phase {} found no admissible augmenting path",
                stats.phases
            )));
        }
    }

    debug!(
        "Transport solved: n={} phases={} augmentations={} path_length={}",
        graph.n, stats.phases, stats.augmentations, stats.path_length
    );

    Ok(graph.into_plan(stats))
}
