use crate::cancel::CancelToken;
use crate::config::SwarmParams;
use crate::error::{AlignError, AlignResult};
use crate::objective::Objective;
use crate::optimizer::particle::Swarm;
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, info};

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
pub enum Topology {
    #[default]
    Complete,
    Ring,
    VonNeumann,
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
pub enum Placement {
    #[default]
    Random,
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    Converged,
    Stagnated,
    IterationLimit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsoConfig {
    pub swarm_size: usize,
    pub inertia_weight: f64,
    pub personal_best_weight: f64,
    pub neighborhood_best_weight: f64,
    pub topology: Topology,
    pub placement: Placement,
    pub initial_velocity_bound: f64,
    /// Half-widths of the initial placement box; its dimension is the search dimension.
    pub init_region: Vector,
    pub max_iterations: usize,
    pub stagnation_limit: usize,
    pub stagnation_threshold: f64,
    pub convergence_epsilon: f64,
}

impl Default for PsoConfig {
    fn default() -> Self {
        Self {
            swarm_size: 15,
            inertia_weight: 0.75,
            personal_best_weight: 1.3,
            neighborhood_best_weight: 1.5,
            topology: Topology::Complete,
            placement: Placement::Random,
            initial_velocity_bound: 5.0,
            init_region: Vector::new(vec![10.0, 10.0, 3.0, 1.0, 1.0]),
            max_iterations: 1000,
            stagnation_limit: 150,
            stagnation_threshold: 1e-4,
            convergence_epsilon: 1e-7,
        }
    }
}

impl PsoConfig {
    pub fn with_region(init_region: Vector) -> Self {
        Self {
            init_region,
            ..Self::default()
        }
    }

    pub fn dimension(&self) -> usize {
        self.init_region.dimension()
    }

    /// Keeps the leading `dim` half-widths of the placement box.
    pub fn restricted_to(mut self, dim: usize) -> AlignResult<Self> {
        let region = self.init_region.components();
        if region.len() < dim {
            return Err(AlignError::Config(format!(
                "init region has {} components but the search needs {}",
                region.len(),
                dim
            )));
        }
        self.init_region = Vector::new(region[..dim].to_vec());
        Ok(self)
    }

    pub fn validate(&self) -> AlignResult<()> {
        if self.topology != Topology::Complete {
            return Err(AlignError::UnsupportedConfiguration(format!(
                "topology '{}' (only '{}' is supported)",
                self.topology,
                Topology::Complete
            )));
        }
        if self.placement != Placement::Random {
            return Err(AlignError::UnsupportedConfiguration(format!(
                "placement '{}' (only '{}' is supported)",
                self.placement,
                Placement::Random
            )));
        }
        if self.swarm_size == 0 {
            return Err(AlignError::Config("swarm size must be positive".into()));
        }
        if self.max_iterations == 0 {
            return Err(AlignError::Config("max iterations must be positive".into()));
        }
        if !(self.initial_velocity_bound.is_finite() && self.initial_velocity_bound > 0.0) {
            return Err(AlignError::Config(format!(
                "initial velocity bound must be positive, got {}",
                self.initial_velocity_bound
            )));
        }
        if self.init_region.dimension() == 0 {
            return Err(AlignError::Config("init region must not be empty".into()));
        }
        if let Some(bad) = self
            .init_region
            .components()
            .iter()
            .find(|b| !(b.is_finite() && **b > 0.0))
        {
            return Err(AlignError::Config(format!(
                "init region half-widths must be positive, got {}",
                bad
            )));
        }
        let weights = [
            self.inertia_weight,
            self.personal_best_weight,
            self.neighborhood_best_weight,
        ];
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(AlignError::Config("swarm weights must be finite".into()));
        }
        if !(self.stagnation_threshold >= 0.0 && self.convergence_epsilon >= 0.0) {
            return Err(AlignError::Config(
                "stagnation threshold and convergence epsilon must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

impl TryFrom<&SwarmParams> for PsoConfig {
    type Error = AlignError;

    fn try_from(params: &SwarmParams) -> AlignResult<Self> {
        Ok(Self {
            swarm_size: params.swarm_size,
            inertia_weight: params.inertia_weight,
            personal_best_weight: params.personal_best_weight,
            neighborhood_best_weight: params.neighborhood_best_weight,
            topology: params.topology,
            placement: params.placement,
            initial_velocity_bound: params.initial_velocity_bound,
            init_region: Vector::new(params.get_init_region()?),
            max_iterations: params.max_iterations,
            stagnation_limit: params.stagnation_limit,
            stagnation_threshold: params.stagnation_threshold,
            convergence_epsilon: params.convergence_epsilon,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub fitness: f64,
    pub location: Vector,
    pub iterations_used: usize,
    pub termination: Termination,
}

/// A trait for receiving updates between optimizer iterations.
/// Boolean return value indicates if the run should continue (true) or abort (false).
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, iteration: usize, best_fitness: f64) -> bool;
}

impl ProgressCallback for CancelToken {
    fn on_progress(&self, _iteration: usize, _best_fitness: f64) -> bool {
        !self.is_cancelled()
    }
}

pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _iteration: usize, _best_fitness: f64) -> bool {
        true
    }
}

pub struct Pso {
    config: PsoConfig,
}

impl Pso {
    /// Fails without building a swarm if the configuration is unusable.
    pub fn new(config: PsoConfig) -> AlignResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PsoConfig {
        &self.config
    }

    pub fn run<O, CB>(
        &self,
        objective: &O,
        seed: Option<u64>,
        callback: &CB,
    ) -> AlignResult<Solution>
    where
        O: Objective + ?Sized,
        CB: ProgressCallback + ?Sized,
    {
        let cfg = &self.config;
        let mut rng = if let Some(s) = seed {
            fastrand::Rng::with_seed(s)
        } else {
            fastrand::Rng::new()
        };

        let mut swarm = Swarm::random(
            &mut rng,
            cfg.swarm_size,
            &cfg.init_region,
            cfg.initial_velocity_bound,
        );
        let weights = (
            cfg.inertia_weight,
            cfg.personal_best_weight,
            cfg.neighborhood_best_weight,
        );

        let mut iteration = 0;
        let mut unchanged = 0;

        let termination = loop {
            if swarm.best_fitness.abs() <= cfg.convergence_epsilon {
                break Termination::Converged;
            }
            if unchanged >= cfg.stagnation_limit {
                break Termination::Stagnated;
            }
            if iteration >= cfg.max_iterations {
                break Termination::IterationLimit;
            }
            if !callback.on_progress(iteration, swarm.best_fitness) {
                return Err(AlignError::Cancelled);
            }

            // A. Move and evaluate every particle against the current bests
            let mut improved = false;
            for i in 0..swarm.len() {
                let p = &mut swarm.particles[i];
                p.advance()?;
                let fitness = objective.evaluate(&p.position)?;
                p.offer(fitness);

                if fitness < swarm.best_fitness {
                    let location = swarm.particles[i].position.clone();
                    if let Some(gain) = swarm.offer(fitness, &location) {
                        if gain > cfg.stagnation_threshold {
                            improved = true;
                        }
                    }
                }
            }

            // B. Steer toward the global best fixed by pass A
            let global_best = swarm.best_location.clone();
            for p in swarm.particles.iter_mut() {
                p.steer(global_best.as_ref(), weights, &mut rng)?;
            }

            if improved {
                unchanged = 0;
            } else {
                unchanged += 1;
            }
            iteration += 1;

            if iteration % 100 == 0 {
                debug!(
                    "PSO iteration {}: best={:.6e} unchanged={}",
                    iteration, swarm.best_fitness, unchanged
                );
            }
        };

        let location = swarm.best_location.ok_or_else(|| {
            AlignError::Validation("objective never produced a comparable fitness".into())
        })?;

        info!(
            "PSO finished ({}) after {} iterations: fitness={:.6e} at {}",
            termination, iteration, swarm.best_fitness, location
        );

        Ok(Solution {
            fitness: swarm.best_fitness,
            location,
            iterations_used: iteration,
            termination,
        })
    }
}
