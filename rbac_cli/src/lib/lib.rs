//! Full CLI library for the RBAC reconciler
//!

#![deny(missing_docs)]

mod cmd;
mod plan;

use anyhow::Result;
use clap::Parser;

use rbac_core::logging;

use cmd::{RbacArgs, RbacCommand};

/// Main CLI entrypoint.
pub async fn cli() -> Result<()> {
    let args = RbacArgs::parse();
    logging::setup(args.log_level);

    match &args.command {
        RbacCommand::Plan(reconcile_args) => plan::reconcile_instances(reconcile_args, true).await,
        RbacCommand::Apply(reconcile_args) => {
            plan::reconcile_instances(reconcile_args, false).await
        }
    }
}
