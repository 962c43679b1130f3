pub mod release;
pub mod version;

/// A parsed command, independent of how clap spelled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Release { dry_run: bool },
    Version,
}
