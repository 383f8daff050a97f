use crate::error::{AlignError, AlignResult};
use crate::objective::{CostMetric, TransformKind};
use crate::optimizer::{Placement, Topology};
use clap::{parser::ValueSource, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    #[command(flatten)]
    pub swarm: SwarmParams,
    #[command(flatten)]
    pub transport: TransportParams,
    #[command(flatten)]
    pub objective: ObjectiveParams,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmParams {
    #[arg(long, default_value_t = 15)]
    pub swarm_size: usize,
    #[arg(long, default_value_t = 0.75)]
    pub inertia_weight: f64,
    #[arg(long, default_value_t = 1.3)]
    pub personal_best_weight: f64,
    #[arg(long, default_value_t = 1.5)]
    pub neighborhood_best_weight: f64,

    #[arg(long, default_value_t = Topology::Complete)]
    pub topology: Topology,
    #[arg(long, default_value_t = Placement::Random)]
    pub placement: Placement,

    #[arg(long, default_value_t = 5.0)]
    pub initial_velocity_bound: f64,
    // Half-widths per parameter: shift-x, shift-y, rotation, scale-x, scale-y
    #[arg(long, default_value = "10,10,3,1,1")]
    pub init_region: String,

    // === TERMINATION ===
    #[arg(long, default_value_t = 1000)]
    pub max_iterations: usize,
    #[arg(long, default_value_t = 150)]
    pub stagnation_limit: usize,
    #[arg(long, default_value_t = 1e-4)]
    pub stagnation_threshold: f64,
    #[arg(long, default_value_t = 1e-7)]
    pub convergence_epsilon: f64,

    #[arg(short = 'S', long)]
    pub seed: Option<u64>,
}

impl Default for SwarmParams {
    fn default() -> Self {
        Self {
            swarm_size: 15,
            inertia_weight: 0.75,
            personal_best_weight: 1.3,
            neighborhood_best_weight: 1.5,
            topology: Topology::Complete,
            placement: Placement::Random,
            initial_velocity_bound: 5.0,
            init_region: "10,10,3,1,1".to_string(),
            max_iterations: 1000,
            stagnation_limit: 150,
            stagnation_threshold: 1e-4,
            convergence_epsilon: 1e-7,
            seed: None,
        }
    }
}

impl SwarmParams {
    pub fn get_init_region(&self) -> AlignResult<Vec<f64>> {
        parse_f64_list(&self.init_region, "init_region")
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportParams {
    /// Additive error target of the transport approximation
    #[arg(long, default_value_t = 0.01)]
    pub delta: f64,
}

impl Default for TransportParams {
    fn default() -> Self {
        Self { delta: 0.01 }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveParams {
    #[arg(long, default_value_t = TransformKind::Trs)]
    pub transform: TransformKind,
    #[arg(long, default_value_t = CostMetric::Euclidean)]
    pub metric: CostMetric,
    #[arg(long, default_value_t = 1.0)]
    pub rotation_penalty: f64,
    #[arg(long, default_value_t = 1.0)]
    pub scale_penalty: f64,
}

impl Default for ObjectiveParams {
    fn default() -> Self {
        Self {
            transform: TransformKind::Trs,
            metric: CostMetric::Euclidean,
            rotation_penalty: 1.0,
            scale_penalty: 1.0,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> AlignResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Copies every value the user typed on the command line over `self`.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($group:ident . $field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$group.$field = cli.$group.$field.clone();
                }
            };
        }

        update_if_present!(swarm.swarm_size);
        update_if_present!(swarm.inertia_weight);
        update_if_present!(swarm.personal_best_weight);
        update_if_present!(swarm.neighborhood_best_weight);
        update_if_present!(swarm.topology);
        update_if_present!(swarm.placement);
        update_if_present!(swarm.initial_velocity_bound);
        update_if_present!(swarm.init_region);
        update_if_present!(swarm.max_iterations);
        update_if_present!(swarm.stagnation_limit);
        update_if_present!(swarm.stagnation_threshold);
        update_if_present!(swarm.convergence_epsilon);
        update_if_present!(swarm.seed);

        update_if_present!(transport.delta);

        update_if_present!(objective.transform);
        update_if_present!(objective.metric);
        update_if_present!(objective.rotation_penalty);
        update_if_present!(objective.scale_penalty);
    }
}

/// Parses a comma-separated list such as `10,10,3`.
pub fn parse_f64_list(s: &str, name: &str) -> AlignResult<Vec<f64>> {
    s.split(',')
        .map(|p| {
            p.trim().parse::<f64>().map_err(|_| {
                AlignError::Config(format!("invalid number '{}' in --{}", p.trim(), name))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_f64_list("1, 2.5,3", "x").unwrap(),
            vec![1.0, 2.5, 3.0]
        );
        assert!(matches!(
            parse_f64_list("1,,3", "x"),
            Err(AlignError::Config(_))
        ));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"swarm": {"swarm_size": 40}, "transport": {"delta": 0.5}}"#)
                .unwrap();
        assert_eq!(cfg.swarm.swarm_size, 40);
        assert_eq!(cfg.swarm.stagnation_limit, 150);
        assert_eq!(cfg.transport.delta, 0.5);
        assert_eq!(cfg.objective.transform, TransformKind::Trs);
    }
}
