//! Build the desired state from configuration.
//!
//! The configuration lists, for every user, the roles they hold and the
//! permission grants those roles carry. Here it's flipped around: every
//! distinct grant becomes one [`Role`], and every user referencing it becomes
//! one of its assignments.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use yaml_peg::serde as yaml;

use crate::{
    error::RbacError,
    logging::debug,
    model::{AccessScope, AssignmentPair, NamespaceRef, Role},
};

/// The only service whose grants are reconciled here.
pub const ACS_SERVICE: &str = "acs";

lazy_static! {
    /// Maps configuration labels to the platform's permission set names.
    static ref PERMISSION_SET_NAMES: HashMap<&'static str, &'static str> = HashMap::from([
        ("admin", "Admin"),
        ("analyst", "Analyst"),
        ("vuln-admin", "Vulnerability Management Admin"),
    ]);
}

/// The raw query result: users, their roles, and those roles' grants.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RbacQueryData {
    /// Users with at least one grant
    #[serde(default)]
    pub acs_rbacs: Vec<UserGrants>,
}

/// A user and the roles assigned to them.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UserGrants {
    /// The identity used to match the user on the platform
    pub acs_user: Option<String>,
    /// Roles assigned to the user
    #[serde(default)]
    pub roles: Vec<UserRole>,
}

/// A role from the configuration.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRole {
    /// Role name (informational only)
    pub name: String,
    /// Grants carried by the role
    #[serde(default)]
    pub oidc_permissions: Vec<PermissionGrant>,
}

/// A single permission grant.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionGrant {
    /// Grant name. Becomes the name of the role (and usually its scope).
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// The service the grant applies to
    pub service: String,
    /// Permission set label, e.g. `admin`
    pub permission_set: String,
    /// Clusters the grant is restricted to
    #[serde(default)]
    pub clusters: Vec<ClusterRef>,
    /// Namespaces the grant is restricted to
    #[serde(default)]
    pub namespaces: Vec<NamespaceEntry>,
}

/// A cluster reference in the configuration.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterRef {
    /// Cluster name
    pub name: String,
}

/// A namespace reference in the configuration.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceEntry {
    /// Namespace name
    pub name: String,
    /// The cluster the namespace lives in
    pub cluster: ClusterRef,
}

impl RbacQueryData {
    /// Read the query data from a yaml or json file. Json is picked by file
    /// extension.
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.as_ref().display()))?;
        if path.as_ref().extension().map_or(false, |e| e == "json") {
            serde_json::from_str(&raw).context("deserializing desired state")
        } else {
            Self::from_yaml(&raw)
        }
    }

    /// Parse the query data from yaml.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let mut docs = yaml::from_str::<RbacQueryData>(raw)
            .map_err(|e| anyhow!("{e}"))
            .context("deserializing desired state")?;
        docs.pop()
            .ok_or_else(|| anyhow!("desired state file is empty"))
    }
}

impl PermissionGrant {
    /// Translate the configured label into the platform's permission set name.
    fn permission_set_name(&self) -> Result<String> {
        PERMISSION_SET_NAMES
            .get(self.permission_set.as_str())
            .map(|n| n.to_string())
            .ok_or_else(|| {
                RbacError::InvalidConfig(format!(
                    "grant `{}` uses unknown permission set `{}`",
                    self.name, self.permission_set
                ))
                .into()
            })
    }

    fn access_scope(&self) -> AccessScope {
        if self.clusters.is_empty() && self.namespaces.is_empty() {
            return AccessScope::unrestricted();
        }
        // Mixed cluster and namespace lists are kept as-is.
        AccessScope {
            name: self.name.to_owned(),
            description: self.description.to_owned(),
            clusters: self.clusters.iter().map(|c| c.name.to_owned()).collect(),
            namespaces: self
                .namespaces
                .iter()
                .map(|n| NamespaceRef::new(n.cluster.name.to_owned(), n.name.to_owned()))
                .collect(),
            system_default: false,
        }
    }

    fn to_role(&self) -> Result<Role> {
        Ok(Role {
            name: self.name.to_owned(),
            description: self.description.to_owned(),
            assignments: vec![],
            permission_set_name: self.permission_set_name()?,
            access_scope: self.access_scope(),
            system_default: false,
        })
    }
}

/// Build the desired roles from the query data.
///
/// Roles come out in the order their grant was first seen.
pub fn get_desired_state(query_data: &RbacQueryData) -> Result<Vec<Role>> {
    let mut roles: IndexMap<String, Role> = IndexMap::new();

    for user in &query_data.acs_rbacs {
        let acs_user = match &user.acs_user {
            Some(u) => u,
            None => {
                debug!("skipping user without an acs identity");
                continue;
            }
        };
        for grant in user.roles.iter().flat_map(|r| &r.oidc_permissions) {
            if grant.service != ACS_SERVICE {
                debug!("skipping grant {} for service {}", grant.name, grant.service);
                continue;
            }
            if grant.name.is_empty() {
                bail!(RbacError::InvalidConfig(format!(
                    "user `{acs_user}` has a grant without a name"
                )));
            }

            let candidate = grant.to_role()?;
            let role = roles
                .entry(grant.name.to_owned())
                .or_insert_with(|| candidate.clone());
            if !same_definition(role, &candidate) {
                bail!(RbacError::InvalidConfig(format!(
                    "grant `{}` is defined more than once with different settings",
                    grant.name
                )));
            }

            let assignment = AssignmentPair::email(acs_user.to_owned());
            if !role.assignments.contains(&assignment) {
                role.assignments.push(assignment);
            }
        }
    }

    Ok(roles.into_iter().map(|(_, role)| role).collect())
}

/// Compare everything but the assignments.
fn same_definition(a: &Role, b: &Role) -> bool {
    a.description == b.description
        && a.permission_set_name == b.permission_set_name
        && a.access_scope == b.access_scope
}
