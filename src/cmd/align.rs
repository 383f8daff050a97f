use crate::reports;
use clap::Args;
use otalign::cloud::PointCloud;
use otalign::config::Config;
use otalign::objective::AlignmentObjective;
use otalign::optimizer::{Pso, PsoConfig};
use otalign::{AlignResult, CancelToken};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct AlignArgs {
    #[command(flatten)]
    pub config: Config,

    /// CSV (x,y,mass) of the fixed cloud
    #[arg(short, long)]
    pub reference: PathBuf,

    /// CSV (x,y,mass) of the cloud being moved
    #[arg(short, long)]
    pub candidate: PathBuf,

    /// Print the solution as JSON instead of a table
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn run(args: AlignArgs, config: Config) -> AlignResult<()> {
    let reference = PointCloud::load_csv(&args.reference)?;
    let candidate = PointCloud::load_csv(&args.candidate)?;

    let objective = AlignmentObjective::new(
        &reference,
        &candidate,
        &config.objective,
        config.transport.delta,
    )?;
    let pso_config =
        PsoConfig::try_from(&config.swarm)?.restricted_to(config.objective.transform.dimension())?;
    let pso = Pso::new(pso_config)?;

    info!(
        "Aligning {} onto {} ({} transform, {} parameters)",
        args.candidate.display(),
        args.reference.display(),
        config.objective.transform,
        objective.dimension()
    );

    let start = Instant::now();
    let token = CancelToken::new();
    let solution = pso.run(&objective, config.swarm.seed, &token)?;
    let elapsed = start.elapsed();

    let (_, mapping) = objective.mapping_for(&solution.location)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&solution)?);
    } else {
        reports::print_alignment(
            &args.reference.display().to_string(),
            &args.candidate.display().to_string(),
            &solution,
            &mapping,
        );
        info!("Finished in {:.2?}", elapsed);
    }
    Ok(())
}
