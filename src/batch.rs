use crate::cancel::CancelToken;
use crate::cloud::PointCloud;
use crate::config::Config;
use crate::error::{AlignError, AlignResult};
use crate::objective::AlignmentObjective;
use crate::optimizer::{Pso, PsoConfig, Solution};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct LabeledCloud {
    pub id: String,
    pub cloud: PointCloud,
}

impl LabeledCloud {
    pub fn new(id: impl Into<String>, cloud: PointCloud) -> Self {
        Self {
            id: id.into(),
            cloud,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PairJob<'a> {
    pub reference: &'a LabeledCloud,
    pub candidate: &'a LabeledCloud,
}

/// Every candidate against every reference, candidate-major.
pub fn all_pairs<'a>(
    references: &'a [LabeledCloud],
    candidates: &'a [LabeledCloud],
) -> Vec<PairJob<'a>> {
    candidates
        .iter()
        .flat_map(|candidate| {
            references
                .iter()
                .map(move |reference| PairJob { reference, candidate })
        })
        .collect()
}

#[derive(Debug)]
pub struct PairOutcome {
    pub reference_id: String,
    pub candidate_id: String,
    pub result: AlignResult<Solution>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub candidate_id: String,
    pub reference_id: Option<String>,
    pub fitness: f64,
}

/// Runs independent alignments on a bounded worker pool.
pub struct BatchRunner {
    config: Config,
    pso: PsoConfig,
    threads: usize,
}

impl BatchRunner {
    /// `threads = None` uses the host's available parallelism.
    pub fn new(config: &Config, threads: Option<usize>) -> AlignResult<Self> {
        let pso = PsoConfig::try_from(&config.swarm)?
            .restricted_to(config.objective.transform.dimension())?;
        pso.validate()?;

        let threads = threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        });
        if threads == 0 {
            return Err(AlignError::Config("worker count must be positive".into()));
        }

        Ok(Self {
            config: config.clone(),
            pso,
            threads,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Outcomes come back in job order regardless of completion order.
    pub fn run(&self, jobs: &[PairJob<'_>], cancel: &CancelToken) -> AlignResult<Vec<PairOutcome>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| AlignError::Config(format!("failed to build worker pool: {}", e)))?;

        info!(
            "Running {} alignment jobs on {} workers",
            jobs.len(),
            self.threads
        );

        let outcomes = pool.install(|| {
            jobs.par_iter()
                .enumerate()
                .map(|(i, job)| PairOutcome {
                    reference_id: job.reference.id.clone(),
                    candidate_id: job.candidate.id.clone(),
                    result: self.run_one(i, job, cancel),
                })
                .collect::<Vec<_>>()
        });

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        if failed > 0 {
            warn!("{} of {} jobs did not produce a solution", failed, outcomes.len());
        }
        Ok(outcomes)
    }

    fn run_one(
        &self,
        index: usize,
        job: &PairJob<'_>,
        cancel: &CancelToken,
    ) -> AlignResult<Solution> {
        if cancel.is_cancelled() {
            return Err(AlignError::Cancelled);
        }
        let objective = AlignmentObjective::new(
            &job.reference.cloud,
            &job.candidate.cloud,
            &self.config.objective,
            self.config.transport.delta,
        )?
        .with_cancel(cancel.clone());

        let seed = self.config.swarm.seed.map(|s| s.wrapping_add(index as u64));
        let pso = Pso::new(self.pso.clone())?;
        pso.run(&objective, seed, cancel)
    }
}

/// Picks the lowest-fitness reference for each candidate, in first-seen candidate order.
pub fn classify(outcomes: &[PairOutcome]) -> Vec<Classification> {
    let mut out: Vec<Classification> = Vec::new();
    for o in outcomes {
        let idx = match out.iter().position(|c| c.candidate_id == o.candidate_id) {
            Some(i) => i,
            None => {
                out.push(Classification {
                    candidate_id: o.candidate_id.clone(),
                    reference_id: None,
                    fitness: f64::INFINITY,
                });
                out.len() - 1
            }
        };
        if let Ok(sol) = &o.result {
            if sol.fitness < out[idx].fitness {
                out[idx].fitness = sol.fitness;
                out[idx].reference_id = Some(o.reference_id.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::Termination;
    use crate::vector::Vector;

    fn ok(reference: &str, candidate: &str, fitness: f64) -> PairOutcome {
        PairOutcome {
            reference_id: reference.into(),
            candidate_id: candidate.into(),
            result: Ok(Solution {
                fitness,
                location: Vector::zeros(2),
                iterations_used: 1,
                termination: Termination::Converged,
            }),
        }
    }

    #[test]
    fn test_classify_picks_minimum_and_skips_errors() {
        let outcomes = vec![
            ok("zero", "a", 0.4),
            ok("one", "a", 0.1),
            PairOutcome {
                reference_id: "two".into(),
                candidate_id: "a".into(),
                result: Err(AlignError::Cancelled),
            },
            PairOutcome {
                reference_id: "zero".into(),
                candidate_id: "b".into(),
                result: Err(AlignError::Cancelled),
            },
        ];
        let c = classify(&outcomes);
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].reference_id.as_deref(), Some("one"));
        assert_eq!(c[0].fitness, 0.1);
        assert_eq!(c[1].candidate_id, "b");
        assert!(c[1].reference_id.is_none());
    }

    #[test]
    fn test_all_pairs_is_candidate_major() {
        let cloud = PointCloud::default();
        let refs = vec![
            LabeledCloud::new("r0", cloud.clone()),
            LabeledCloud::new("r1", cloud.clone()),
        ];
        let cands = vec![LabeledCloud::new("c0", cloud)];
        let jobs = all_pairs(&refs, &cands);
        let ids: Vec<_> = jobs
            .iter()
            .map(|j| (j.reference.id.as_str(), j.candidate.id.as_str()))
            .collect();
        assert_eq!(ids, vec![("r0", "c0"), ("r1", "c0")]);
    }

    #[test]
    fn test_rejects_zero_workers() {
        assert!(matches!(
            BatchRunner::new(&Config::default(), Some(0)),
            Err(AlignError::Config(_))
        ));
    }
}
