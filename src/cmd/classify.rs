use crate::reports;
use clap::Args;
use otalign::batch::{all_pairs, classify, BatchRunner, LabeledCloud};
use otalign::cloud::{PointCloud, Transform};
use otalign::config::{parse_f64_list, Config};
use otalign::{AlignError, AlignResult, CancelToken, Vector};
use std::path::Path;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub config: Config,

    /// Labelled reference cloud as `id=path.csv` (repeatable)
    #[arg(short, long = "reference", required = true)]
    pub references: Vec<String>,

    /// Cloud to classify as `id=path.csv` or `path.csv` (repeatable)
    #[arg(short, long = "candidate", required = true)]
    pub candidates: Vec<String>,

    /// Worker threads (defaults to available parallelism)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Randomly move each candidate first, drawing parameters from `[-b, b]` (2, 3 or 5 bounds)
    #[arg(long)]
    pub perturb: Option<String>,
}

fn load_labeled(spec: &str) -> AlignResult<LabeledCloud> {
    let (id, path) = match spec.split_once('=') {
        Some((id, path)) => (id.trim().to_string(), path.trim()),
        None => {
            let stem = Path::new(spec)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .ok_or_else(|| AlignError::Config(format!("cannot derive an id from '{}'", spec)))?;
            (stem, spec)
        }
    };
    if id.is_empty() {
        return Err(AlignError::Config(format!("empty id in '{}'", spec)));
    }
    Ok(LabeledCloud::new(id, PointCloud::load_csv(path)?))
}

pub fn run(args: ClassifyArgs, config: Config) -> AlignResult<()> {
    let references = args
        .references
        .iter()
        .map(|s| load_labeled(s))
        .collect::<AlignResult<Vec<_>>>()?;
    let mut candidates = args
        .candidates
        .iter()
        .map(|s| load_labeled(s))
        .collect::<AlignResult<Vec<_>>>()?;

    if let Some(spec) = &args.perturb {
        let bounds = Vector::new(parse_f64_list(spec, "perturb")?);
        let mut rng = match config.swarm.seed {
            Some(s) => fastrand::Rng::with_seed(s),
            None => fastrand::Rng::new(),
        };
        for c in candidates.iter_mut() {
            let t = Transform::random(&bounds, &mut rng)?;
            info!(
                "Perturbing {}: shift ({:.3}, {:.3}) rotation {:.3} scale ({:.3}, {:.3})",
                c.id, t.shift.0, t.shift.1, t.rotation, t.scale_offset.0, t.scale_offset.1
            );
            c.cloud = t.apply(&c.cloud);
        }
    }

    let runner = BatchRunner::new(&config, args.threads)?;
    let jobs = all_pairs(&references, &candidates);
    info!(
        "Classifying {} candidates against {} references",
        candidates.len(),
        references.len()
    );

    let outcomes = runner.run(&jobs, &CancelToken::new())?;

    reports::print_pair_outcomes(&outcomes);
    reports::print_classification(&classify(&outcomes));
    Ok(())
}
