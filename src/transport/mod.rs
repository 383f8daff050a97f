pub mod mapping;
pub mod solver;

pub use mapping::{verify_flow, MarginalViolation, Mapping, Side};
pub use solver::{solve, solve_with_cancel, SolverStats, TransportPlan};
