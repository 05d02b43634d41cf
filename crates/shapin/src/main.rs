use clap::{Parser, Subcommand};
use log::LevelFilter;
use shapin_lib::commands;
use shapin_lib::commands::app::{AppError, RunRequest};
use shapin_lib::config::Config;
use shapin_lib::domain::Mode;
use shapin_lib::infrastructure::repo;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the shapin CLI binary
#[derive(Debug, Error)]
enum ShapinError {
    /// Command orchestration failed.
    #[error(transparent)]
    App(#[from] AppError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Parser)]
#[command(name = "shapin")]
#[command(about = "Pin Github Actions to full commit SHAs", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pin, verify or update the actions used in workflow and action files
    Run(RunArgs),
    /// Create a default config file
    Init,
    /// Upgrade the config file to the current schema version
    Migrate,
}

#[derive(clap::Args)]
#[allow(clippy::struct_excessive_bools, reason = "one field per flag")]
struct RunArgs {
    /// Files to process instead of the configured targets
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Fail if any action is not pinned to a full commit SHA
    #[arg(long)]
    check: bool,

    /// Check that pinned SHAs match their version comments
    #[arg(long)]
    verify: bool,

    /// Update actions to their latest version
    #[arg(short, long)]
    update: bool,

    /// Show the changes that would be made
    #[arg(long)]
    diff: bool,

    /// Write changes to the files (default unless --check or --diff is given)
    #[arg(long)]
    fix: bool,

    /// Only process actions whose name matches this regular expression
    #[arg(short, long, value_name = "REGEX")]
    include: Vec<String>,

    /// Skip actions whose name matches this regular expression
    #[arg(short, long, value_name = "REGEX")]
    exclude: Vec<String>,
}

impl RunArgs {
    fn into_request(self) -> RunRequest {
        let mode = Mode {
            check: self.check,
            verify: self.verify,
            update: self.update,
            diff: self.diff,
            fix: self.fix || !(self.check || self.diff),
        };
        RunRequest {
            files: self.files,
            include: self.include,
            exclude: self.exclude,
            mode,
        }
    }
}

fn main() -> Result<(), ShapinError> {
    let cli = Cli::parse();

    init_logging(&cli);

    let cwd = std::env::current_dir()?;
    let repo_root = repo::root_or_current(&cwd);

    match cli.command {
        Commands::Run(args) => {
            let config = Config::load(&repo_root)?;
            commands::app::run(&config, &args.into_request())?;
        }
        Commands::Init => commands::app::init(&repo_root)?,
        Commands::Migrate => commands::app::migrate(&repo_root)?,
    }
    Ok(())
}

/// Initialize logging based on the verbosity level specified in the CLI
fn init_logging(cli: &Cli) {
    let verbose = cli.verbose;
    let mut builder = env_logger::builder();
    builder
        .filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format(move |buf, record| {
            let level = record.level();
            let style = &buf.default_level_style(level);
            if verbose {
                let timestamp = buf.timestamp();
                writeln!(
                    buf,
                    "{timestamp} [{style}{level}{style:#}] {}: {}",
                    record.target(),
                    record.args()
                )
            } else {
                writeln!(buf, "[{style}{level}{style:#}] {}", record.args())
            }
        });

    builder.init();
}
