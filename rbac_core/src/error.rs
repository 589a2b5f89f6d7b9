//! Typed failures for a reconciliation pass.
//!
//! These travel inside [`anyhow::Error`] like every other error in the crate;
//! use `downcast_ref::<RbacError>()` to tell them apart.

use thiserror::Error;

/// Errors that abort a reconciliation pass.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RbacError {
    /// A desired role references a permission set the platform doesn't have.
    #[error("role `{role}` references permission set `{permission_set}`, which does not exist")]
    MissingPermissionSet {
        /// the role being reconciled
        role: String,
        /// the missing permission set name
        permission_set: String,
    },
    /// The desired-state input is structurally invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A reference in the platform's data couldn't be resolved.
    #[error("unable to resolve {kind} `{name}`")]
    Unresolved {
        /// The kind of entity, e.g. "access scope"
        kind: &'static str,
        /// The name or id that couldn't be found
        name: String,
    },
}

impl RbacError {
    /// Whether this is a configuration error (as opposed to a fetch error).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RbacError::MissingPermissionSet { .. } | RbacError::InvalidConfig(_)
        )
    }
}
