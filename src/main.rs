use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use otalign::config::Config;
use std::process;
use tracing::{error, info, Level};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file with base settings; explicit flags still win
    #[arg(global = true, long)]
    config: Option<String>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Align(cmd::align::AlignArgs),
    Classify(cmd::classify::ClassifyArgs),
}

fn main() {
    // 1. Parse raw matches so explicit flags can be told apart from defaults
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    // 2. Flag-derived config and the subcommand's own matches
    let cli_config = match &cli.command {
        Commands::Align(args) => &args.config,
        Commands::Classify(args) => &args.config,
    };
    let sub_matches = matches
        .subcommand()
        .map(|(_, m)| m)
        .unwrap_or(&matches);

    // 3. Layer: file < command line
    let config = match &cli.config {
        Some(path) => {
            info!("Loading config from {}", path);
            match Config::load_from_file(path) {
                Ok(mut file_config) => {
                    file_config.merge_from_cli(cli_config, sub_matches);
                    file_config
                }
                Err(e) => {
                    error!("Failed to load config '{}': {}", path, e);
                    process::exit(1);
                }
            }
        }
        None => cli_config.clone(),
    };

    // 4. Execute
    let result = match cli.command {
        Commands::Align(args) => cmd::align::run(args, config),
        Commands::Classify(args) => cmd::classify::run(args, config),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}
