//!
//! Declarative RBAC reconciliation
//!
//! Builds the desired set of roles, access scopes and group assignments from
//! configuration, reads the current state from an access-control platform,
//! and applies the difference through a [`Gateway`].
#![deny(missing_docs)]

pub use config::{fetch_credentials, RbacConfig};
pub use current::get_current_state;
pub use desired::{get_desired_state, RbacQueryData};
pub use error::RbacError;
pub use gateway::Gateway;
pub use model::{AccessScope, AssignmentPair, NamespaceRef, Role};
pub use reconcile::{reconcile, Diff, DiffDetails};

pub mod config;
pub mod current;
pub mod desired;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod reconcile;

#[cfg(test)]
pub(crate) mod test_util;

use anyhow::{Context, Result};

use logging::debug;

#[macro_export]
/// Time the code inside the macro. Write the elapsed time to debug logs.
/// Derived from https://notes.iveselov.info/programming/time_it-a-case-study-in-rust-macros
macro_rules! log_runtime {
    ($context:literal, $($tt:tt)+) => {
        {
            debug!("{}: starting", $context);
            let timer = std::time::Instant::now();
            let x =
            $(
                $tt
            )+;
            debug!("{}: {:?}", $context, timer.elapsed());
            x
        }
    }
}

/// Run one full reconciliation cycle: build the desired state, fetch the
/// current state and reconcile the two.
pub async fn run_integration(
    query_data: &RbacQueryData,
    gateway: &dyn Gateway,
    auth_provider_id: &str,
    dry_run: bool,
) -> Result<Vec<Diff>> {
    let desired = get_desired_state(query_data).context("building desired state")?;
    let current = log_runtime!(
        "fetching current state",
        get_current_state(gateway, auth_provider_id)
            .await
            .context("fetching current state")?
    );
    log_runtime!(
        "reconciling",
        reconcile(&desired, &current, gateway, auth_provider_id, dry_run).await
    )
}
