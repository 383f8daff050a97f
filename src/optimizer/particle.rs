use crate::error::AlignResult;
use crate::vector::Vector;
use fastrand::Rng;

/// Draws each component uniformly from `[-bound_i, bound_i]`.
pub(crate) fn uniform_in_box(rng: &mut Rng, half_widths: &[f64]) -> Vec<f64> {
    half_widths
        .iter()
        .map(|&b| rng.f64() * 2.0 * b - b)
        .collect()
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vector,
    pub velocity: Vector,
    pub best_fitness: f64,
    pub best_location: Option<Vector>,
}

impl Particle {
    pub fn new(position: Vector, velocity: Vector) -> Self {
        Self {
            position,
            velocity,
            best_fitness: f64::INFINITY,
            best_location: None,
        }
    }

    pub fn advance(&mut self) -> AlignResult<()> {
        self.position = self.position.add(&self.velocity)?;
        Ok(())
    }

    /// Records `fitness` as the personal best if it beats it. The location is
    /// the current (already moved) position.
    pub fn offer(&mut self, fitness: f64) -> bool {
        if fitness < self.best_fitness {
            self.best_fitness = fitness;
            self.best_location = Some(self.position.clone());
            true
        } else {
            false
        }
    }

    /// `v = w*v + c1*jitter(pbest - x) + c2*jitter(gbest - x)`.
    ///
    /// A missing best contributes no pull.
    pub fn steer(
        &mut self,
        global_best: Option<&Vector>,
        weights: (f64, f64, f64),
        rng: &mut Rng,
    ) -> AlignResult<()> {
        let (inertia, cognitive, social) = weights;
        let mut velocity = self.velocity.scale(inertia);

        if let Some(pbest) = &self.best_location {
            let pull = pbest.subtract(&self.position)?.jitter(rng).scale(cognitive);
            velocity = velocity.add(&pull)?;
        }
        if let Some(gbest) = global_best {
            let pull = gbest.subtract(&self.position)?.jitter(rng).scale(social);
            velocity = velocity.add(&pull)?;
        }

        self.velocity = velocity;
        Ok(())
    }
}

/// The particles of one run plus the best fitness any of them has seen.
#[derive(Debug, Clone)]
pub struct Swarm {
    pub particles: Vec<Particle>,
    pub best_fitness: f64,
    pub best_location: Option<Vector>,
}

impl Swarm {
    pub fn random(
        rng: &mut Rng,
        size: usize,
        half_widths: &Vector,
        velocity_bound: f64,
    ) -> Self {
        let dim = half_widths.dimension();
        let velocity_box = vec![velocity_bound; dim];
        let particles = (0..size)
            .map(|_| {
                let position = Vector::new(uniform_in_box(rng, half_widths.components()));
                let velocity = Vector::new(uniform_in_box(rng, &velocity_box));
                Particle::new(position, velocity)
            })
            .collect();

        Self {
            particles,
            best_fitness: f64::INFINITY,
            best_location: None,
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Returns the improvement over the previous best, if any.
    pub fn offer(&mut self, fitness: f64, location: &Vector) -> Option<f64> {
        if fitness < self.best_fitness {
            let gain = self.best_fitness - fitness;
            self.best_fitness = fitness;
            self.best_location = Some(location.clone());
            Some(gain)
        } else {
            None
        }
    }
}
