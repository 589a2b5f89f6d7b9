//! Read the current state from the platform.

use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::{
    gateway::{AccessScopeRecord, Gateway, GroupRecord},
    logging::debug,
    model::{AccessScope, AssignmentPair, Role},
};

impl From<AccessScopeRecord> for AccessScope {
    fn from(record: AccessScopeRecord) -> Self {
        match record.rules {
            Some(rules) => AccessScope {
                name: record.name,
                description: record.description,
                clusters: rules.included_clusters,
                namespaces: rules.included_namespaces,
                system_default: false,
            },
            // No rules at all is how the platform spells "everything"
            None => AccessScope {
                name: record.name,
                description: record.description,
                clusters: vec![],
                namespaces: vec![],
                system_default: true,
            },
        }
    }
}

/// Group the groups of one auth provider by role name, keeping their order.
pub(crate) fn groups_by_role(
    groups: Vec<GroupRecord>,
    auth_provider_id: &str,
) -> HashMap<String, Vec<GroupRecord>> {
    let mut res: HashMap<String, Vec<GroupRecord>> = HashMap::new();
    for group in groups {
        if group.auth_provider_id != auth_provider_id {
            continue;
        }
        res.entry(group.role_name.to_owned()).or_default().push(group);
    }
    res
}

/// Assemble the platform's roles into the canonical model.
///
/// Only groups belonging to `auth_provider_id` count as assignments.
pub async fn get_current_state(gateway: &dyn Gateway, auth_provider_id: &str) -> Result<Vec<Role>> {
    let roles = gateway.get_roles().await.context("listing roles")?;
    let mut groups = groups_by_role(
        gateway.get_groups().await.context("listing groups")?,
        auth_provider_id,
    );
    debug!("found {} roles on the platform", roles.len());

    let mut res = Vec::with_capacity(roles.len());
    for role in roles {
        let access_scope = gateway
            .get_access_scope_by_id(&role.access_scope_id)
            .await
            .with_context(|| {
                format!(
                    "fetching access scope {} of role {}",
                    role.access_scope_id, role.name
                )
            })?;
        let permission_set = gateway
            .get_permission_set_by_id(&role.permission_set_id)
            .await
            .with_context(|| {
                format!(
                    "fetching permission set {} of role {}",
                    role.permission_set_id, role.name
                )
            })?;

        let assignments = groups
            .remove(&role.name)
            .unwrap_or_default()
            .iter()
            .map(GroupRecord::assignment)
            .collect::<Vec<AssignmentPair>>();

        res.push(Role {
            name: role.name,
            description: role.description,
            assignments,
            permission_set_name: permission_set.name,
            access_scope: access_scope.into(),
            system_default: role.system_default,
        });
    }
    Ok(res)
}
