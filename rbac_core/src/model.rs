//! Canonical model shared by the desired and current state.
//!
//! Both sides of a reconciliation are built into these types so they can be
//! compared with plain value equality.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Name of the platform-provided scope that grants access everywhere.
pub const UNRESTRICTED_SCOPE_NAME: &str = "Unrestricted";
/// Description of the platform-provided unrestricted scope.
pub const UNRESTRICTED_SCOPE_DESCRIPTION: &str = "Access to all clusters and namespaces";
/// Attribute used to match identities to roles.
pub const EMAIL_ASSIGNMENT_KEY: &str = "email";

/// A member-matching predicate, such as `email = someone@example.com`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssignmentPair {
    /// Identity attribute name
    pub key: String,
    /// Identity attribute value
    pub value: String,
}

impl AssignmentPair {
    /// Basic constructor
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Build an email assignment.
    pub fn email(value: impl Into<String>) -> Self {
        Self::new(EMAIL_ASSIGNMENT_KEY, value)
    }
}

impl Display for AssignmentPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// A namespace, qualified by the cluster it lives in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRef {
    /// The cluster name
    pub cluster_name: String,
    /// The namespace name
    pub namespace_name: String,
}

impl NamespaceRef {
    /// Basic constructor
    pub fn new(cluster_name: impl Into<String>, namespace_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            namespace_name: namespace_name.into(),
        }
    }
}

impl Display for NamespaceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.cluster_name, self.namespace_name)
    }
}

/// Rules restricting a role to specific clusters and namespaces.
///
/// Both lists empty means the scope is unrestricted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessScope {
    /// Scope name, also its identity
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Clusters included in the scope
    pub clusters: Vec<String>,
    /// Namespaces included in the scope
    pub namespaces: Vec<NamespaceRef>,
    /// Whether the platform owns this scope. System default scopes are never
    /// created, updated, or deleted.
    pub system_default: bool,
}

impl AccessScope {
    /// The platform-provided scope with access to everything.
    pub fn unrestricted() -> Self {
        Self {
            name: UNRESTRICTED_SCOPE_NAME.to_owned(),
            description: UNRESTRICTED_SCOPE_DESCRIPTION.to_owned(),
            clusters: vec![],
            namespaces: vec![],
            system_default: true,
        }
    }
}

/// A named bundle of a permission set, an access scope, and member
/// assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role name, unique per platform
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Identities bound to the role
    pub assignments: Vec<AssignmentPair>,
    /// Name of the (pre-provisioned) permission set
    pub permission_set_name: String,
    /// The scope the role is restricted to
    pub access_scope: AccessScope,
    /// Whether the platform owns this role
    pub system_default: bool,
}
