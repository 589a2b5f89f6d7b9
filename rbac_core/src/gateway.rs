//! The contract between the reconciler and an access-control platform.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{AssignmentPair, NamespaceRef};

/// A role as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleRecord {
    /// Role name, unique per platform
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Id of the referenced permission set
    pub permission_set_id: String,
    /// Id of the referenced access scope
    pub access_scope_id: String,
    /// Whether the platform provides this role out of the box
    pub system_default: bool,
}

/// A group: one assignment bound to a role for one auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GroupRecord {
    /// Platform id of the group
    pub id: String,
    /// The role the group grants
    pub role_name: String,
    /// Identity attribute name
    pub key: String,
    /// Identity attribute value
    pub value: String,
    /// The auth provider the group belongs to
    pub auth_provider_id: String,
}

impl GroupRecord {
    /// The (key, value) predicate this group materializes.
    pub fn assignment(&self) -> AssignmentPair {
        AssignmentPair::new(self.key.to_owned(), self.value.to_owned())
    }
}

/// A group that doesn't exist yet, so has no id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupAdd {
    /// The role the group grants
    pub role_name: String,
    /// Identity attribute name
    pub key: String,
    /// Identity attribute value
    pub value: String,
    /// The auth provider the group belongs to
    pub auth_provider_id: String,
}

impl GroupAdd {
    /// Build the group for an assignment of a role.
    pub fn new(role_name: &str, assignment: &AssignmentPair, auth_provider_id: &str) -> Self {
        Self {
            role_name: role_name.to_owned(),
            key: assignment.key.to_owned(),
            value: assignment.value.to_owned(),
            auth_provider_id: auth_provider_id.to_owned(),
        }
    }
}

/// The platform's rule representation for an access scope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeRules {
    /// Clusters included in the scope
    #[serde(default)]
    pub included_clusters: Vec<String>,
    /// Namespaces included in the scope
    #[serde(default)]
    pub included_namespaces: Vec<NamespaceRef>,
}

/// An access scope as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessScopeRecord {
    /// Platform id of the scope
    pub id: String,
    /// Scope name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Scope rules. `None` means unrestricted.
    pub rules: Option<ScopeRules>,
}

/// A pre-provisioned permission set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionSetRecord {
    /// Platform id of the permission set
    pub id: String,
    /// Permission set name
    pub name: String,
}

/// Everything the reconciler needs from an access-control platform.
///
/// Implementations own transport, auth, timeouts and retries.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// List all roles.
    async fn get_roles(&self) -> Result<Vec<RoleRecord>>;
    /// List all groups, across auth providers.
    async fn get_groups(&self) -> Result<Vec<GroupRecord>>;
    /// List all access scopes.
    async fn get_access_scopes(&self) -> Result<Vec<AccessScopeRecord>>;
    /// List all permission sets.
    async fn get_permission_sets(&self) -> Result<Vec<PermissionSetRecord>>;
    /// Look up a single access scope.
    async fn get_access_scope_by_id(&self, id: &str) -> Result<AccessScopeRecord>;
    /// Look up a single permission set.
    async fn get_permission_set_by_id(&self, id: &str) -> Result<PermissionSetRecord>;

    /// Create a role.
    async fn create_role(
        &self,
        name: &str,
        description: &str,
        permission_set_id: &str,
        access_scope_id: &str,
    ) -> Result<()>;
    /// Create an access scope, returning its new id.
    async fn create_access_scope(
        &self,
        name: &str,
        description: &str,
        clusters: &[String],
        namespaces: &[NamespaceRef],
    ) -> Result<String>;
    /// Create several groups in one call.
    async fn create_group_batch(&self, additions: &[GroupAdd]) -> Result<()>;

    /// Update a role, by name.
    async fn update_role(
        &self,
        name: &str,
        description: &str,
        permission_set_id: &str,
        access_scope_id: &str,
    ) -> Result<()>;
    /// Update an access scope, by id.
    async fn update_access_scope(
        &self,
        id: &str,
        name: &str,
        description: &str,
        clusters: &[String],
        namespaces: &[NamespaceRef],
    ) -> Result<()>;
    /// Remove and add groups in one call.
    async fn update_group_batch(&self, removals: &[GroupRecord], additions: &[GroupAdd])
        -> Result<()>;

    /// Delete a role, by name.
    async fn delete_role(&self, name: &str) -> Result<()>;
    /// Delete several groups in one call.
    async fn delete_group_batch(&self, removals: &[GroupRecord]) -> Result<()>;
    /// Delete an access scope, by id.
    async fn delete_access_scope(&self, id: &str) -> Result<()>;
}
