use backup_orchestrator::backup::backup_config::Config;
use backup_orchestrator::backup::device::DeviceMap;
use backup_orchestrator::backup::process::SystemRunner;
use backup_orchestrator::backup::prune::{PruneMode, Pruner};
use backup_orchestrator::backup::result_error::result::Result;
use backup_orchestrator::backup::state::BackupState;
use clap::Parser;
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use tracing::{error, info, Level};

/// Prune old backups according to each volume's retention policy
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file
    #[arg(short, long, default_value = "/etc/backup/config.yml")]
    config: PathBuf,

    /// Prune backups past their retention policy
    #[arg(short, long)]
    prune: bool,

    /// Prune failed backup attempts
    #[arg(short = 'P', long)]
    prune_incomplete: bool,

    /// Only report what would be removed
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Log debug messages
    #[arg(short, long)]
    verbose: bool,
}

fn run(args: &Args) -> Result<()> {
    let config = Arc::new(Config::load(&args.config)?);
    let pool = Arc::new(ThreadPoolBuilder::new().build()?);

    let mut modes = Vec::new();
    if args.prune_incomplete {
        modes.push(PruneMode::Incomplete);
    }
    if args.prune {
        modes.push(PruneMode::Obsolete);
    }

    let mut state = BackupState::read_state(&config)?;
    for mode in modes {
        let report = Pruner::builder()
            .config(config.clone())
            .runner(Arc::new(SystemRunner))
            .pool(pool.clone())
            .act(!args.dry_run)
            .mode(mode)
            .build()
            .prune(&mut state, || DeviceMap::identify(&config))?;
        info!("{mode:?}: {report:?}");
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();
    if !args.prune && !args.prune_incomplete {
        error!("Nothing to do, use --prune and/or --prune-incomplete");
        exit(1);
    }

    if let Err(e) = run(&args) {
        error!("{e}");
        exit(1);
    }
}
