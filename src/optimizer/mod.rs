pub mod particle;
pub mod runner;

pub use particle::{Particle, Swarm};
pub use runner::{
    NoProgress, Placement, ProgressCallback, Pso, PsoConfig, Solution, Termination, Topology,
};
