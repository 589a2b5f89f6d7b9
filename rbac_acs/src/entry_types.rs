//! Wire types for the ACS v1 API and their translation to the records the
//! reconciler works with.

use rbac_core::{
    gateway::{
        AccessScopeRecord, GroupAdd, GroupRecord, PermissionSetRecord, RoleRecord, ScopeRules,
    },
    NamespaceRef,
};
use serde::{Deserialize, Serialize};

use crate::consts;

#[derive(Deserialize, Debug, Default)]
pub(crate) struct RolesResponse {
    #[serde(default)]
    pub(crate) roles: Vec<Role>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Role {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(default)]
    pub(crate) permission_set_id: String,
    #[serde(default)]
    pub(crate) access_scope_id: String,
    #[serde(default)]
    pub(crate) traits: Option<Traits>,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct Traits {
    #[serde(default)]
    pub(crate) origin: String,
}

impl From<Role> for RoleRecord {
    fn from(role: Role) -> Self {
        RoleRecord {
            system_default: role
                .traits
                .map_or(false, |t| t.origin == consts::DEFAULT_ORIGIN),
            name: role.name,
            description: role.description,
            permission_set_id: role.permission_set_id,
            access_scope_id: role.access_scope_id,
        }
    }
}

/// Body for creating or updating a role.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoleBody<'a> {
    pub(crate) name: &'a str,
    pub(crate) description: &'a str,
    pub(crate) permission_set_id: &'a str,
    pub(crate) access_scope_id: &'a str,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct GroupsResponse {
    #[serde(default)]
    pub(crate) groups: Vec<Group>,
}

#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Group {
    pub(crate) role_name: String,
    pub(crate) props: GroupProps,
}

#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroupProps {
    /// Empty for groups that don't exist yet
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) id: String,
    pub(crate) auth_provider_id: String,
    pub(crate) key: String,
    pub(crate) value: String,
}

impl From<Group> for GroupRecord {
    fn from(group: Group) -> Self {
        GroupRecord {
            id: group.props.id,
            role_name: group.role_name,
            key: group.props.key,
            value: group.props.value,
            auth_provider_id: group.props.auth_provider_id,
        }
    }
}

impl From<&GroupRecord> for Group {
    fn from(group: &GroupRecord) -> Self {
        Group {
            role_name: group.role_name.to_owned(),
            props: GroupProps {
                id: group.id.to_owned(),
                auth_provider_id: group.auth_provider_id.to_owned(),
                key: group.key.to_owned(),
                value: group.value.to_owned(),
            },
        }
    }
}

impl From<&GroupAdd> for Group {
    fn from(group: &GroupAdd) -> Self {
        Group {
            role_name: group.role_name.to_owned(),
            props: GroupProps {
                id: String::new(),
                auth_provider_id: group.auth_provider_id.to_owned(),
                key: group.key.to_owned(),
                value: group.value.to_owned(),
            },
        }
    }
}

/// Body of the batch endpoint: groups in `previous_groups` but not in
/// `required_groups` are removed, and the other way around.
#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroupBatchBody {
    pub(crate) previous_groups: Vec<Group>,
    pub(crate) required_groups: Vec<Group>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccessScopesResponse {
    #[serde(default)]
    pub(crate) access_scopes: Vec<AccessScope>,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct AccessScope {
    #[serde(default)]
    pub(crate) id: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(default)]
    pub(crate) rules: Option<ScopeRules>,
}

impl From<AccessScope> for AccessScopeRecord {
    fn from(scope: AccessScope) -> Self {
        AccessScopeRecord {
            id: scope.id,
            name: scope.name,
            description: scope.description,
            rules: scope.rules,
        }
    }
}

/// Body for creating or updating an access scope.
#[derive(Serialize, Debug)]
pub(crate) struct AccessScopeBody<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    pub(crate) id: &'a str,
    pub(crate) name: &'a str,
    pub(crate) description: &'a str,
    pub(crate) rules: RulesBody<'a>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RulesBody<'a> {
    pub(crate) included_clusters: &'a [String],
    pub(crate) included_namespaces: &'a [NamespaceRef],
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PermissionSetsResponse {
    #[serde(default)]
    pub(crate) permission_sets: Vec<PermissionSet>,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct PermissionSet {
    pub(crate) id: String,
    pub(crate) name: String,
}

impl From<PermissionSet> for PermissionSetRecord {
    fn from(ps: PermissionSet) -> Self {
        PermissionSetRecord {
            id: ps.id,
            name: ps.name,
        }
    }
}
