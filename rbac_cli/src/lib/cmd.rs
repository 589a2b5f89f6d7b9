//! Commands for the reconciler CLI
//!

use std::path::PathBuf;

use clap::{self, Args, Parser, Subcommand};

use rbac_core::{config::CONFIG_FILE, logging::LevelFilter};

/// Reconcile ACS roles, access scopes and groups with a desired state
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None, arg_required_else_help = true)]
pub(crate) struct RbacArgs {
    #[clap(subcommand)]
    pub(crate) command: RbacCommand,
    #[clap(global = true, short = 'v', long)]
    pub(crate) log_level: Option<LevelFilter>,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum RbacCommand {
    /// Show the changes needed to bring each instance to its desired state
    Plan(ReconcileArgs),
    /// Apply the changes
    Apply(ReconcileArgs),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ReconcileArgs {
    /// Path to the project config
    #[clap(short, long, default_value = CONFIG_FILE)]
    pub(crate) config: PathBuf,
    /// Path to the credentials file (defaults to ~/.rbac/credentials.yaml)
    #[clap(long)]
    pub(crate) credentials: Option<PathBuf>,
    /// How many instances to reconcile at the same time
    #[clap(short, long, value_parser, default_value = "10")]
    pub(crate) thread_pool_size: usize,
    /// Instances to reconcile. All of them if not set.
    #[clap(short, long, use_value_delimiter = true, value_delimiter = ',')]
    pub(crate) instances: Option<Vec<String>>,
}
