//! RBAC reconciler CLI
//!

#![deny(missing_docs)]

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    rbac_lib::cli().await
}
