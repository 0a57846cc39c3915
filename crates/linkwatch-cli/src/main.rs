//! CLI for linkwatch — probe, normalize, store, archive your WiFi link.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::GlobalOpts;

#[derive(Parser)]
#[command(name = "linkwatch")]
#[command(about = "linkwatch — WiFi link-quality monitor")]
#[command(version = linkwatch_core::VERSION)]
struct Cli {
    /// Path to a JSON config file (default: ./linkwatch.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the live record directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the archive bundle directory
    #[arg(long, global = true)]
    archive_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one collection cycle now and report what was stored
    #[command(alias = "collect-once")]
    Collect,

    /// Start the background monitor daemon
    Start {
        /// Seconds between collection cycles
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Stop the background monitor daemon
    Stop,

    /// Report whether the daemon is running
    Status,

    /// List stored records (live store and archive bundles) in a time range
    List {
        /// Start of range: canonical stamp (20240310T100000.000Z) or YYYY-MM-DD
        #[arg(long)]
        since: Option<String>,

        /// End of range, same forms
        #[arg(long)]
        until: Option<String>,

        /// Emit one JSON document per line instead of the summary table
        #[arg(long)]
        json: bool,
    },

    /// The daemon loop itself; spawned by `start`, not for interactive use
    #[command(hide = true)]
    Run {
        /// Seconds between collection cycles
        #[arg(long)]
        interval: Option<u64>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let opts = GlobalOpts {
        config: cli.config,
        data_dir: cli.data_dir,
        archive_dir: cli.archive_dir,
    };

    let code = match cli.command {
        Commands::Collect => commands::collect::run(&opts),
        Commands::Start { interval } => commands::daemon::start(&opts, interval),
        Commands::Stop => commands::daemon::stop(&opts),
        Commands::Status => commands::daemon::status(&opts),
        Commands::List { since, until, json } => commands::list::run(&opts, since, until, json),
        Commands::Run { interval } => commands::daemon::run_loop(&opts, interval),
    };
    std::process::exit(code);
}
