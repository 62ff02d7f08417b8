//! chartsync CLI - move Helm charts between repositories, dependencies included

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use chartsync_deps::DEFAULT_CONCURRENCY;

mod commands;
mod config;
mod error;
mod exit_codes;
mod util;

#[derive(Parser)]
#[command(name = "chartsync")]
#[command(author = "chartsync Contributors")]
#[command(version)]
#[command(about = "Move Helm charts between repositories, dependencies included", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Point the dependencies of an unpacked chart at the target and rebuild charts/
    Deps {
        /// Chart directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Configuration file (default: ~/.config/chartsync/config.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dependencies fetched at once
        #[arg(short = 'j', long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },

    /// List the dependencies of a packaged chart
    Inspect {
        /// Chart archive (.tgz)
        archive: PathBuf,

        /// Chart name, the folder the archive unpacks to
        #[arg(short, long)]
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();

    init_logging(cli.debug);

    let result = match cli.command {
        Commands::Deps {
            path,
            config,
            concurrency,
        } => commands::deps::run(&path, config.as_deref(), concurrency).await,

        Commands::Inspect {
            archive,
            name,
            json,
        } => commands::inspect::run(&archive, &name, json),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
