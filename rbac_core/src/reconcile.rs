//! Diff the desired state against the current state, and apply the
//! difference to the platform.
//!
//! A pass handles additions first, then removals, then updates. Within a role,
//! scope and permission set resolution always happen before the role is
//! written, and the role is always written before its groups.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
};

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use tokio::sync::OnceCell;

use crate::{
    current::groups_by_role,
    error::RbacError,
    gateway::{AccessScopeRecord, Gateway, GroupAdd, GroupRecord},
    logging::{debug, info, warn},
    model::{AccessScope, AssignmentPair, Role},
};

#[derive(Debug, Clone, PartialEq, Eq)]
/// A planned (or, outside of a dry run, applied) change to one role
pub struct Diff {
    /// The role being changed
    pub role_name: String,
    /// The specifics of the change
    pub details: DiffDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outlines the kind of change
pub enum DiffDetails {
    /// Create a role
    AddRole {
        /// Permission set the role grants
        permission_set: String,
        /// Scope the role is restricted to
        access_scope: String,
        /// Whether the scope is created by this change
        new_access_scope: bool,
        /// Identities assigned to the role
        assignments: Vec<AssignmentPair>,
    },
    /// Delete a role and its groups
    RemoveRole {
        /// Identities that lose the role
        assignments: Vec<AssignmentPair>,
        /// The scope deleted along with the role, if any
        deleted_access_scope: Option<String>,
    },
    /// Update a role in place
    ModifyRole {
        /// Role fields that change, as (field, old, new)
        role_changes: Vec<(String, String, String)>,
        /// The scope updated in place, if any
        updated_access_scope: Option<String>,
        /// Identities gaining the role
        add_assignments: Vec<AssignmentPair>,
        /// Identities losing the role
        remove_assignments: Vec<AssignmentPair>,
    },
}

impl Display for Diff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut text = "".to_owned();
        match &self.details {
            DiffDetails::AddRole {
                permission_set,
                access_scope,
                new_access_scope,
                assignments,
            } => {
                text += &format!("{}", format!("+ role: {}\n", self.role_name).green());
                text += &format!("  permission set: {permission_set}\n");
                if *new_access_scope {
                    text += &format!("{}", format!("  + access scope: {access_scope}\n").green());
                } else {
                    text += &format!("  access scope: {access_scope}\n");
                }
                if !assignments.is_empty() {
                    text += "  assignments:\n";
                }
                for a in assignments {
                    text += &format!("{}", format!("    + {a}\n").green());
                }
            }
            DiffDetails::RemoveRole {
                assignments,
                deleted_access_scope,
            } => {
                text += &format!("{}", format!("- role: {}\n", self.role_name).red());
                if let Some(scope) = deleted_access_scope {
                    text += &format!("{}", format!("  - access scope: {scope}\n").red());
                }
                if !assignments.is_empty() {
                    text += "  assignments:\n";
                }
                for a in assignments {
                    text += &format!("{}", format!("    - {a}\n").red());
                }
            }
            DiffDetails::ModifyRole {
                role_changes,
                updated_access_scope,
                add_assignments,
                remove_assignments,
            } => {
                text += &format!("{}{}\n", "~ role: ".yellow(), self.role_name.yellow());
                for (field, old, new) in role_changes {
                    text += &format!("{}", format!("  ~ {field}: {old} -> {new}\n").yellow());
                }
                if let Some(scope) = updated_access_scope {
                    text += &format!("{}", format!("  ~ access scope: {scope}\n").yellow());
                }
                if !add_assignments.is_empty() || !remove_assignments.is_empty() {
                    text += "  assignments:\n";
                }
                for a in add_assignments {
                    text += &format!("{}", format!("    + {a}\n").green());
                }
                for a in remove_assignments {
                    text += &format!("{}", format!("    - {a}\n").red());
                }
            }
        }
        write!(f, "{text}")
    }
}

/// Platform listings, each read at most once per pass and only when needed.
struct PlatformLookups<'a> {
    gateway: &'a dyn Gateway,
    auth_provider_id: &'a str,
    access_scopes: OnceCell<HashMap<String, AccessScopeRecord>>,
    permission_sets: OnceCell<HashMap<String, String>>,
    groups: OnceCell<HashMap<String, Vec<GroupRecord>>>,
}

impl<'a> PlatformLookups<'a> {
    fn new(gateway: &'a dyn Gateway, auth_provider_id: &'a str) -> Self {
        Self {
            gateway,
            auth_provider_id,
            access_scopes: OnceCell::new(),
            permission_sets: OnceCell::new(),
            groups: OnceCell::new(),
        }
    }

    /// Access scopes, by name
    async fn access_scopes(&self) -> Result<&HashMap<String, AccessScopeRecord>> {
        self.access_scopes
            .get_or_try_init(|| async {
                let scopes = self
                    .gateway
                    .get_access_scopes()
                    .await
                    .context("listing access scopes")?;
                Ok::<_, anyhow::Error>(scopes.into_iter().map(|s| (s.name.to_owned(), s)).collect())
            })
            .await
    }

    /// The id of an existing access scope. Fails if there is none.
    async fn access_scope_id(&self, name: &str) -> Result<String> {
        self.access_scopes()
            .await?
            .get(name)
            .map(|s| s.id.to_owned())
            .ok_or_else(|| {
                RbacError::Unresolved {
                    kind: "access scope",
                    name: name.to_owned(),
                }
                .into()
            })
    }

    /// The id of the permission set a role references.
    async fn permission_set_id(&self, role: &Role) -> Result<String> {
        let permission_sets = self
            .permission_sets
            .get_or_try_init(|| async {
                let sets = self
                    .gateway
                    .get_permission_sets()
                    .await
                    .context("listing permission sets")?;
                Ok::<_, anyhow::Error>(sets.into_iter().map(|p| (p.name, p.id)).collect())
            })
            .await?;
        permission_sets
            .get(&role.permission_set_name)
            .cloned()
            .ok_or_else(|| {
                RbacError::MissingPermissionSet {
                    role: role.name.to_owned(),
                    permission_set: role.permission_set_name.to_owned(),
                }
                .into()
            })
    }

    /// The groups of a role, for this auth provider.
    async fn groups(&self, role_name: &str) -> Result<Vec<GroupRecord>> {
        let groups = self
            .groups
            .get_or_try_init(|| async {
                let groups = self.gateway.get_groups().await.context("listing groups")?;
                Ok::<_, anyhow::Error>(groups_by_role(groups, self.auth_provider_id))
            })
            .await?;
        Ok(groups.get(role_name).cloned().unwrap_or_default())
    }
}

/// State for one reconciliation pass. Nothing here outlives the pass.
struct Reconciler<'a> {
    gateway: &'a dyn Gateway,
    auth_provider_id: &'a str,
    dry_run: bool,
    lookups: PlatformLookups<'a>,
    /// Scopes created during this pass, by name. The id is `None` in a dry run.
    created_scopes: HashMap<String, Option<String>>,
    /// Scopes deleted during this pass, by name
    deleted_scopes: HashSet<String>,
    /// Every scope name the desired state still uses
    desired_scopes: HashSet<&'a str>,
}

impl<'a> Reconciler<'a> {
    fn new(
        gateway: &'a dyn Gateway,
        auth_provider_id: &'a str,
        dry_run: bool,
        desired: &'a [Role],
    ) -> Self {
        Self {
            gateway,
            auth_provider_id,
            dry_run,
            lookups: PlatformLookups::new(gateway, auth_provider_id),
            created_scopes: HashMap::new(),
            deleted_scopes: HashSet::new(),
            desired_scopes: desired.iter().map(|r| r.access_scope.name.as_str()).collect(),
        }
    }

    fn announce(&self, action: String) {
        if self.dry_run {
            info!("[dry-run] {action}");
        } else {
            info!("{action}");
        }
    }

    /// Find the id of the scope a role should point at, creating the scope if
    /// it doesn't exist yet. Returns the id (`None` for a scope that would be
    /// created in a dry run) and whether this call created it.
    async fn resolve_access_scope(&mut self, scope: &AccessScope) -> Result<(Option<String>, bool)> {
        if let Some(existing) = self.lookups.access_scopes().await?.get(&scope.name) {
            return Ok((Some(existing.id.to_owned()), false));
        }
        if let Some(id) = self.created_scopes.get(&scope.name) {
            return Ok((id.to_owned(), false));
        }
        if scope.system_default {
            bail!(RbacError::Unresolved {
                kind: "access scope",
                name: scope.name.to_owned(),
            });
        }

        self.announce(format!("create access scope {}", scope.name));
        let id = if self.dry_run {
            None
        } else {
            Some(
                self.gateway
                    .create_access_scope(
                        &scope.name,
                        &scope.description,
                        &scope.clusters,
                        &scope.namespaces,
                    )
                    .await
                    .with_context(|| format!("creating access scope {}", scope.name))?,
            )
        };
        self.created_scopes.insert(scope.name.to_owned(), id.clone());
        Ok((id, true))
    }

    /// A scope can go once nothing desired uses it and it's ours to delete.
    fn scope_is_deletable(&self, scope: &AccessScope) -> bool {
        !scope.system_default
            && !self.desired_scopes.contains(scope.name.as_str())
            && !self.deleted_scopes.contains(&scope.name)
    }

    async fn delete_access_scope(&mut self, scope: &AccessScope) -> Result<()> {
        let id = self.lookups.access_scope_id(&scope.name).await?;
        self.announce(format!("delete access scope {}", scope.name));
        if !self.dry_run {
            self.gateway
                .delete_access_scope(&id)
                .await
                .with_context(|| format!("deleting access scope {}", scope.name))?;
        }
        self.deleted_scopes.insert(scope.name.to_owned());
        Ok(())
    }

    async fn add_role(&mut self, role: &Role) -> Result<Diff> {
        let permission_set_id = self.lookups.permission_set_id(role).await?;
        let (access_scope_id, new_access_scope) =
            self.resolve_access_scope(&role.access_scope).await?;
        let assignments = dedup_assignments(&role.assignments);

        self.announce(format!(
            "create role {} with {} assignment(s)",
            role.name,
            assignments.len()
        ));
        let diff = Diff {
            role_name: role.name.to_owned(),
            details: DiffDetails::AddRole {
                permission_set: role.permission_set_name.to_owned(),
                access_scope: role.access_scope.name.to_owned(),
                new_access_scope,
                assignments: assignments.clone(),
            },
        };
        if self.dry_run {
            return Ok(diff);
        }

        let access_scope_id = access_scope_id
            .ok_or_else(|| anyhow!("access scope {} has no id", role.access_scope.name))?;
        self.gateway
            .create_role(
                &role.name,
                &role.description,
                &permission_set_id,
                &access_scope_id,
            )
            .await
            .context("creating role")?;

        if !assignments.is_empty() {
            let additions = assignments
                .iter()
                .map(|a| GroupAdd::new(&role.name, a, self.auth_provider_id))
                .collect::<Vec<_>>();
            self.gateway
                .create_group_batch(&additions)
                .await
                .context("creating groups")?;
        }
        Ok(diff)
    }

    async fn remove_role(&mut self, role: &Role) -> Result<Option<Diff>> {
        if role.system_default {
            debug!("role {} is provided by the platform; leaving it alone", role.name);
            return Ok(None);
        }

        let groups = self.lookups.groups(&role.name).await?;
        let delete_scope = self.scope_is_deletable(&role.access_scope);
        // Resolve before mutating anything, so a bad reference fails early
        if delete_scope {
            self.lookups.access_scope_id(&role.access_scope.name).await?;
        }

        self.announce(format!(
            "delete role {} and {} group(s)",
            role.name,
            groups.len()
        ));
        if !self.dry_run {
            if !groups.is_empty() {
                self.gateway
                    .delete_group_batch(&groups)
                    .await
                    .context("deleting groups")?;
            }
            self.gateway
                .delete_role(&role.name)
                .await
                .context("deleting role")?;
        }
        if delete_scope {
            self.delete_access_scope(&role.access_scope).await?;
        }

        Ok(Some(Diff {
            role_name: role.name.to_owned(),
            details: DiffDetails::RemoveRole {
                assignments: groups.iter().map(GroupRecord::assignment).collect(),
                deleted_access_scope: delete_scope.then(|| role.access_scope.name.to_owned()),
            },
        }))
    }

    async fn update_role(&mut self, desired: &Role, current: &Role) -> Result<Option<Diff>> {
        if desired == current {
            return Ok(None);
        }
        if current.system_default {
            warn!(
                "role {} is provided by the platform and won't be updated",
                current.name
            );
            return Ok(None);
        }

        let scope_changed = desired.access_scope != current.access_scope;
        let mut role_changes = vec![];
        if desired.permission_set_name != current.permission_set_name {
            role_changes.push((
                "permission set".to_owned(),
                current.permission_set_name.to_owned(),
                desired.permission_set_name.to_owned(),
            ));
        }
        if desired.description != current.description {
            role_changes.push((
                "description".to_owned(),
                current.description.to_owned(),
                desired.description.to_owned(),
            ));
        }

        let mut updated_access_scope = None;
        if !role_changes.is_empty() || scope_changed {
            let permission_set_id = self.lookups.permission_set_id(desired).await?;

            // The platform's own scope is never edited. Point the role at
            // the desired scope instead.
            let repoint = scope_changed
                && (desired.access_scope.system_default || current.access_scope.system_default);
            let access_scope_id = if repoint {
                let (id, _) = self.resolve_access_scope(&desired.access_scope).await?;
                role_changes.push((
                    "access scope".to_owned(),
                    current.access_scope.name.to_owned(),
                    desired.access_scope.name.to_owned(),
                ));
                id
            } else {
                let id = self
                    .lookups
                    .access_scope_id(&current.access_scope.name)
                    .await?;
                if scope_changed {
                    self.update_access_scope_in_place(&id, &desired.access_scope)
                        .await?;
                    updated_access_scope = Some(desired.access_scope.name.to_owned());
                }
                Some(id)
            };

            self.announce(format!("update role {}", desired.name));
            if !self.dry_run {
                let access_scope_id = access_scope_id.ok_or_else(|| {
                    anyhow!("access scope {} has no id", desired.access_scope.name)
                })?;
                self.gateway
                    .update_role(
                        &desired.name,
                        &desired.description,
                        &permission_set_id,
                        &access_scope_id,
                    )
                    .await
                    .context("updating role")?;
            }

            if repoint && self.scope_is_deletable(&current.access_scope) {
                self.delete_access_scope(&current.access_scope).await?;
            }
        }

        let (add_assignments, remove_assignments) = self.update_groups(desired, current).await?;

        // Assignments can match as a set while differing in order
        if role_changes.is_empty()
            && updated_access_scope.is_none()
            && add_assignments.is_empty()
            && remove_assignments.is_empty()
        {
            return Ok(None);
        }

        Ok(Some(Diff {
            role_name: desired.name.to_owned(),
            details: DiffDetails::ModifyRole {
                role_changes,
                updated_access_scope,
                add_assignments,
                remove_assignments,
            },
        }))
    }

    async fn update_access_scope_in_place(&mut self, id: &str, scope: &AccessScope) -> Result<()> {
        self.announce(format!("update access scope {}", scope.name));
        if self.dry_run {
            return Ok(());
        }
        self.gateway
            .update_access_scope(
                id,
                &scope.name,
                &scope.description,
                &scope.clusters,
                &scope.namespaces,
            )
            .await
            .with_context(|| format!("updating access scope {}", scope.name))
    }

    /// Bring a role's groups in line with its desired assignments, in a
    /// single batch. Returns the (added, removed) assignments.
    async fn update_groups(
        &mut self,
        desired: &Role,
        current: &Role,
    ) -> Result<(Vec<AssignmentPair>, Vec<AssignmentPair>)> {
        let desired_set: HashSet<&AssignmentPair> = desired.assignments.iter().collect();
        let current_set: HashSet<&AssignmentPair> = current.assignments.iter().collect();
        if desired_set == current_set {
            return Ok((vec![], vec![]));
        }

        let current_groups = self.lookups.groups(&current.name).await?;
        let (removals, additions) =
            diff_groups(&current_groups, &desired.assignments, &desired.name, self.auth_provider_id);
        if removals.is_empty() && additions.is_empty() {
            return Ok((vec![], vec![]));
        }

        self.announce(format!(
            "update groups of role {}: +{} -{}",
            desired.name,
            additions.len(),
            removals.len()
        ));
        if !self.dry_run {
            self.gateway
                .update_group_batch(&removals, &additions)
                .await
                .context("updating groups")?;
        }

        Ok((
            additions
                .iter()
                .map(|g| AssignmentPair::new(g.key.to_owned(), g.value.to_owned()))
                .collect(),
            removals.iter().map(GroupRecord::assignment).collect(),
        ))
    }
}

/// Drop repeated assignments, keeping the first occurrence.
fn dedup_assignments(assignments: &[AssignmentPair]) -> Vec<AssignmentPair> {
    let mut seen = HashSet::new();
    assignments
        .iter()
        .filter(|a| seen.insert(*a))
        .cloned()
        .collect()
}

/// Compare a role's groups with its desired assignments on (key, value).
///
/// Returns the groups to remove and the groups to add.
fn diff_groups(
    current: &[GroupRecord],
    desired: &[AssignmentPair],
    role_name: &str,
    auth_provider_id: &str,
) -> (Vec<GroupRecord>, Vec<GroupAdd>) {
    let desired_set: HashSet<&AssignmentPair> = desired.iter().collect();
    let current_set: HashSet<AssignmentPair> =
        current.iter().map(GroupRecord::assignment).collect();

    let removals = current
        .iter()
        .filter(|g| !desired_set.contains(&g.assignment()))
        .cloned()
        .collect();
    let additions = dedup_assignments(desired)
        .iter()
        .filter(|a| !current_set.contains(*a))
        .map(|a| GroupAdd::new(role_name, a, auth_provider_id))
        .collect();
    (removals, additions)
}

/// Make the platform match `desired`.
///
/// `current` must be the state read from the same platform (see
/// [`crate::get_current_state`]). With `dry_run` set, the same reads are made
/// and the same plan is returned, but nothing is written.
pub async fn reconcile(
    desired: &[Role],
    current: &[Role],
    gateway: &dyn Gateway,
    auth_provider_id: &str,
    dry_run: bool,
) -> Result<Vec<Diff>> {
    let desired_by_name: HashMap<&str, &Role> =
        desired.iter().map(|r| (r.name.as_str(), r)).collect();
    let current_by_name: HashMap<&str, &Role> =
        current.iter().map(|r| (r.name.as_str(), r)).collect();

    let mut reconciler = Reconciler::new(gateway, auth_provider_id, dry_run, desired);
    let mut diffs = vec![];

    for role in desired
        .iter()
        .filter(|r| !current_by_name.contains_key(r.name.as_str()))
    {
        let diff = reconciler
            .add_role(role)
            .await
            .with_context(|| format!("adding role {}", role.name))?;
        diffs.push(diff);
    }

    for role in current
        .iter()
        .filter(|r| !desired_by_name.contains_key(r.name.as_str()))
    {
        if let Some(diff) = reconciler
            .remove_role(role)
            .await
            .with_context(|| format!("removing role {}", role.name))?
        {
            diffs.push(diff);
        }
    }

    for role in desired {
        if let Some(current_role) = current_by_name.get(role.name.as_str()) {
            if let Some(diff) = reconciler
                .update_role(role, current_role)
                .await
                .with_context(|| format!("updating role {}", role.name))?
            {
                diffs.push(diff);
            }
        }
    }

    if diffs.is_empty() {
        info!("no changes");
    }
    Ok(diffs)
}
