use crate::commands::Command;
use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "shipit")]
#[command(
    about = "Cut a release from conventional commits: version, changelog, assets, publish, tag"
)]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'p',
        long,
        global = true,
        help = "Path to the repository root",
        default_value = "."
    )]
    pub path: PathBuf,

    #[arg(
        long,
        global = true,
        env = "SHIPIT_CONFIG",
        help = "Path to the release config (default: <path>/shipit.toml)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "SHIPIT_BRANCH",
        help = "Treat the checkout as this branch instead of detecting it"
    )]
    pub branch: Option<String>,

    #[arg(long, global = true, help = "Print the result as JSON on stdout")]
    pub json: bool,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub log_level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Run the release pipeline")]
    Release {
        #[arg(
            long,
            env = "SHIPIT_DRY_RUN",
            help = "Resolve version, notes and assets without writing anything"
        )]
        dry_run: bool,
    },
    #[command(about = "Show what the next release would be (same as release --dry-run)")]
    Plan,
    #[command(about = "Show version information")]
    Version,
}

impl From<Commands> for Command {
    fn from(cmd: Commands) -> Self {
        match cmd {
            Commands::Release { dry_run } => Self::Release { dry_run },
            Commands::Plan => Self::Release { dry_run: true },
            Commands::Version => Self::Version,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
