//! shipit command line entry point.
//!
//! Exit status: 0 for a release or a no-op run (wrong branch, nothing to
//! release, dry run), 1 for any fatal error.

mod cli;
mod commands;
mod tracing;

use crate::cli::Cli;
use crate::commands::Command;
use crate::commands::release::{ReleaseOptions, execute_release, render_human, render_json};
use crate::tracing::{TracingConfig, init_tracing};
use miette::IntoDiagnostic;
use shipit_release::DryRun;
use ::tracing::Instrument;

#[allow(clippy::print_stderr)]
fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    if let Err(error) = run_main() {
        eprintln!("{error:?}");
        std::process::exit(1);
    }
}

fn run_main() -> miette::Result<()> {
    let cli = cli::parse();

    init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.log_level.into(),
    })?;

    // The pipeline is strictly sequential; one thread is enough.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    runtime.block_on(run_cli(cli))
}

#[allow(clippy::print_stdout)]
async fn run_cli(cli: Cli) -> miette::Result<()> {
    let command: Command = cli.command.into();

    match command {
        Command::Version => {
            println!("{}", commands::version::get_version_info());
        }
        Command::Release { dry_run } => {
            let options = ReleaseOptions {
                root: cli.path,
                config: cli.config,
                branch: cli.branch,
                dry_run: if dry_run { DryRun::Yes } else { DryRun::No },
            };

            let command_name = if dry_run { "plan" } else { "release" };
            let span = crate::command_span!(command_name);
            let outcome = execute_release(&options).instrument(span).await?;

            if cli.json {
                println!("{}", render_json(&outcome).into_diagnostic()?);
            } else {
                print!("{}", render_human(&outcome, &options.root));
            }
        }
    }

    Ok(())
}
