//! Fixtures and a recording gateway for tests.

use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::{
    desired::{ClusterRef, NamespaceEntry, PermissionGrant, RbacQueryData, UserGrants, UserRole},
    gateway::{
        AccessScopeRecord, Gateway, GroupAdd, GroupRecord, PermissionSetRecord, RoleRecord,
        ScopeRules,
    },
    model::{AccessScope, AssignmentPair, NamespaceRef, Role},
};

pub(crate) const AUTH_PROVIDER_ID: &str = "6a41743c-792b-11ee-b962-0242ac120002";

/// Every call made against the [`FakeGateway`], with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    GetRoles,
    GetGroups,
    GetAccessScopes,
    GetPermissionSets,
    GetAccessScopeById(String),
    GetPermissionSetById(String),
    CreateRole {
        name: String,
        description: String,
        permission_set_id: String,
        access_scope_id: String,
    },
    CreateAccessScope {
        name: String,
        description: String,
        clusters: Vec<String>,
        namespaces: Vec<NamespaceRef>,
    },
    CreateGroupBatch(Vec<GroupAdd>),
    UpdateRole {
        name: String,
        description: String,
        permission_set_id: String,
        access_scope_id: String,
    },
    UpdateAccessScope {
        id: String,
        name: String,
        description: String,
        clusters: Vec<String>,
        namespaces: Vec<NamespaceRef>,
    },
    UpdateGroupBatch {
        removals: Vec<GroupRecord>,
        additions: Vec<GroupAdd>,
    },
    DeleteRole(String),
    DeleteGroupBatch(Vec<GroupRecord>),
    DeleteAccessScope(String),
}

impl Call {
    pub(crate) fn is_write(&self) -> bool {
        !matches!(
            self,
            Call::GetRoles
                | Call::GetGroups
                | Call::GetAccessScopes
                | Call::GetPermissionSets
                | Call::GetAccessScopeById(_)
                | Call::GetPermissionSetById(_)
        )
    }

    fn kind(&self) -> &'static str {
        match self {
            Call::GetRoles => "get_roles",
            Call::GetGroups => "get_groups",
            Call::GetAccessScopes => "get_access_scopes",
            Call::GetPermissionSets => "get_permission_sets",
            Call::GetAccessScopeById(_) => "get_access_scope_by_id",
            Call::GetPermissionSetById(_) => "get_permission_set_by_id",
            Call::CreateRole { .. } => "create_role",
            Call::CreateAccessScope { .. } => "create_access_scope",
            Call::CreateGroupBatch(_) => "create_group_batch",
            Call::UpdateRole { .. } => "update_role",
            Call::UpdateAccessScope { .. } => "update_access_scope",
            Call::UpdateGroupBatch { .. } => "update_group_batch",
            Call::DeleteRole(_) => "delete_role",
            Call::DeleteGroupBatch(_) => "delete_group_batch",
            Call::DeleteAccessScope(_) => "delete_access_scope",
        }
    }
}

/// An in-memory platform that records every call it receives.
#[derive(Default)]
pub(crate) struct FakeGateway {
    roles: Vec<RoleRecord>,
    groups: Vec<GroupRecord>,
    access_scopes: Vec<AccessScopeRecord>,
    permission_sets: Vec<PermissionSetRecord>,
    calls: Mutex<Vec<Call>>,
    fail_on: Option<&'static str>,
}

impl FakeGateway {
    pub(crate) fn new(
        roles: Vec<RoleRecord>,
        groups: Vec<GroupRecord>,
        access_scopes: Vec<AccessScopeRecord>,
        permission_sets: Vec<PermissionSetRecord>,
    ) -> Self {
        Self {
            roles,
            groups,
            access_scopes,
            permission_sets,
            ..Default::default()
        }
    }

    /// Make every call of the named kind fail.
    pub(crate) fn failing_on(mut self, kind: &'static str) -> Self {
        self.fail_on = Some(kind);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub(crate) fn reads(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| !c.is_write()).collect()
    }

    pub(crate) fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub(crate) fn count_kind(&self, kind: &str) -> usize {
        self.calls().iter().filter(|c| c.kind() == kind).count()
    }

    fn record(&self, call: Call) -> Result<()> {
        let kind = call.kind();
        self.calls.lock().unwrap().push(call);
        if self.fail_on == Some(kind) {
            bail!("{kind} failed");
        }
        Ok(())
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn get_roles(&self) -> Result<Vec<RoleRecord>> {
        self.record(Call::GetRoles)?;
        Ok(self.roles.clone())
    }

    async fn get_groups(&self) -> Result<Vec<GroupRecord>> {
        self.record(Call::GetGroups)?;
        Ok(self.groups.clone())
    }

    async fn get_access_scopes(&self) -> Result<Vec<AccessScopeRecord>> {
        self.record(Call::GetAccessScopes)?;
        Ok(self.access_scopes.clone())
    }

    async fn get_permission_sets(&self) -> Result<Vec<PermissionSetRecord>> {
        self.record(Call::GetPermissionSets)?;
        Ok(self.permission_sets.clone())
    }

    async fn get_access_scope_by_id(&self, id: &str) -> Result<AccessScopeRecord> {
        self.record(Call::GetAccessScopeById(id.to_owned()))?;
        self.access_scopes
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("no access scope with id {id}"))
    }

    async fn get_permission_set_by_id(&self, id: &str) -> Result<PermissionSetRecord> {
        self.record(Call::GetPermissionSetById(id.to_owned()))?;
        self.permission_sets
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("no permission set with id {id}"))
    }

    async fn create_role(
        &self,
        name: &str,
        description: &str,
        permission_set_id: &str,
        access_scope_id: &str,
    ) -> Result<()> {
        self.record(Call::CreateRole {
            name: name.to_owned(),
            description: description.to_owned(),
            permission_set_id: permission_set_id.to_owned(),
            access_scope_id: access_scope_id.to_owned(),
        })
    }

    async fn create_access_scope(
        &self,
        name: &str,
        description: &str,
        clusters: &[String],
        namespaces: &[NamespaceRef],
    ) -> Result<String> {
        self.record(Call::CreateAccessScope {
            name: name.to_owned(),
            description: description.to_owned(),
            clusters: clusters.to_vec(),
            namespaces: namespaces.to_vec(),
        })?;
        Ok(format!("new-{name}"))
    }

    async fn create_group_batch(&self, additions: &[GroupAdd]) -> Result<()> {
        self.record(Call::CreateGroupBatch(additions.to_vec()))
    }

    async fn update_role(
        &self,
        name: &str,
        description: &str,
        permission_set_id: &str,
        access_scope_id: &str,
    ) -> Result<()> {
        self.record(Call::UpdateRole {
            name: name.to_owned(),
            description: description.to_owned(),
            permission_set_id: permission_set_id.to_owned(),
            access_scope_id: access_scope_id.to_owned(),
        })
    }

    async fn update_access_scope(
        &self,
        id: &str,
        name: &str,
        description: &str,
        clusters: &[String],
        namespaces: &[NamespaceRef],
    ) -> Result<()> {
        self.record(Call::UpdateAccessScope {
            id: id.to_owned(),
            name: name.to_owned(),
            description: description.to_owned(),
            clusters: clusters.to_vec(),
            namespaces: namespaces.to_vec(),
        })
    }

    async fn update_group_batch(
        &self,
        removals: &[GroupRecord],
        additions: &[GroupAdd],
    ) -> Result<()> {
        self.record(Call::UpdateGroupBatch {
            removals: removals.to_vec(),
            additions: additions.to_vec(),
        })
    }

    async fn delete_role(&self, name: &str) -> Result<()> {
        self.record(Call::DeleteRole(name.to_owned()))
    }

    async fn delete_group_batch(&self, removals: &[GroupRecord]) -> Result<()> {
        self.record(Call::DeleteGroupBatch(removals.to_vec()))
    }

    async fn delete_access_scope(&self, id: &str) -> Result<()> {
        self.record(Call::DeleteAccessScope(id.to_owned()))
    }
}

fn acs_grant(
    name: &str,
    description: &str,
    permission_set: &str,
    clusters: &[&str],
    namespaces: &[(&str, &str)],
) -> PermissionGrant {
    PermissionGrant {
        name: name.to_owned(),
        description: description.to_owned(),
        service: "acs".to_owned(),
        permission_set: permission_set.to_owned(),
        clusters: clusters
            .iter()
            .map(|c| ClusterRef {
                name: c.to_string(),
            })
            .collect(),
        namespaces: namespaces
            .iter()
            .map(|(cluster, ns)| NamespaceEntry {
                name: ns.to_string(),
                cluster: ClusterRef {
                    name: cluster.to_string(),
                },
            })
            .collect(),
    }
}

fn user(acs_user: &str, role: &str, grant: PermissionGrant) -> UserGrants {
    UserGrants {
        acs_user: Some(acs_user.to_owned()),
        roles: vec![UserRole {
            name: role.to_owned(),
            oidc_permissions: vec![grant],
        }],
    }
}

pub(crate) fn query_data() -> RbacQueryData {
    let admin = acs_grant(
        "app-sre-acs-admin",
        "admin access to acs instance",
        "admin",
        &[],
        &[],
    );
    let analyst = acs_grant(
        "cluster-analyst",
        "analyst access to clusters in acs instance",
        "analyst",
        &["clusterA", "clusterB"],
        &[],
    );
    let vuln_admin = acs_grant(
        "service-vuln-admin",
        "vuln-admin access to service namespaces in acs instance",
        "vuln-admin",
        &[],
        &[
            ("stage-cluster", "serviceA-stage"),
            ("prod-cluster", "serviceA-prod"),
        ],
    );
    RbacQueryData {
        acs_rbacs: vec![
            user("foo@redhat.com", "app-sre-admin", admin.clone()),
            user("bar@redhat.com", "app-sre-admin", admin),
            user("foofoo@redhat.com", "tenant-role-a", analyst.clone()),
            user("barbar@redhat.com", "tenant-role-a", analyst),
            user("foobar@redhat.com", "tenant-role-b", vuln_admin),
        ],
    }
}

pub(crate) fn modeled_roles() -> Vec<Role> {
    vec![
        Role {
            name: "app-sre-acs-admin".to_owned(),
            description: "admin access to acs instance".to_owned(),
            assignments: vec![
                AssignmentPair::email("foo@redhat.com"),
                AssignmentPair::email("bar@redhat.com"),
            ],
            permission_set_name: "Admin".to_owned(),
            access_scope: AccessScope::unrestricted(),
            system_default: false,
        },
        Role {
            name: "cluster-analyst".to_owned(),
            description: "analyst access to clusters in acs instance".to_owned(),
            assignments: vec![
                AssignmentPair::email("foofoo@redhat.com"),
                AssignmentPair::email("barbar@redhat.com"),
            ],
            permission_set_name: "Analyst".to_owned(),
            access_scope: AccessScope {
                name: "cluster-analyst".to_owned(),
                description: "analyst access to clusters in acs instance".to_owned(),
                clusters: vec!["clusterA".to_owned(), "clusterB".to_owned()],
                namespaces: vec![],
                system_default: false,
            },
            system_default: false,
        },
        Role {
            name: "service-vuln-admin".to_owned(),
            description: "vuln-admin access to service namespaces in acs instance".to_owned(),
            assignments: vec![AssignmentPair::email("foobar@redhat.com")],
            permission_set_name: "Vulnerability Management Admin".to_owned(),
            access_scope: AccessScope {
                name: "service-vuln-admin".to_owned(),
                description: "vuln-admin access to service namespaces in acs instance"
                    .to_owned(),
                clusters: vec![],
                namespaces: vec![
                    NamespaceRef::new("stage-cluster", "serviceA-stage"),
                    NamespaceRef::new("prod-cluster", "serviceA-prod"),
                ],
                system_default: false,
            },
            system_default: false,
        },
    ]
}

pub(crate) fn api_roles() -> Vec<RoleRecord> {
    modeled_roles()
        .iter()
        .enumerate()
        .map(|(i, r)| RoleRecord {
            name: r.name.to_owned(),
            description: r.description.to_owned(),
            permission_set_id: (i + 1).to_string(),
            access_scope_id: (i + 1).to_string(),
            system_default: false,
        })
        .collect()
}

pub(crate) fn api_groups() -> Vec<GroupRecord> {
    [
        ("app-sre-acs-admin", "foo@redhat.com"),
        ("app-sre-acs-admin", "bar@redhat.com"),
        ("cluster-analyst", "foofoo@redhat.com"),
        ("cluster-analyst", "barbar@redhat.com"),
        ("service-vuln-admin", "foobar@redhat.com"),
    ]
    .iter()
    .enumerate()
    .map(|(i, (role, email))| GroupRecord {
        id: (i + 1).to_string(),
        role_name: role.to_string(),
        key: "email".to_owned(),
        value: email.to_string(),
        auth_provider_id: AUTH_PROVIDER_ID.to_owned(),
    })
    .collect()
}

pub(crate) fn api_access_scopes() -> Vec<AccessScopeRecord> {
    vec![
        AccessScopeRecord {
            id: "1".to_owned(),
            name: "Unrestricted".to_owned(),
            description: "Access to all clusters and namespaces".to_owned(),
            rules: None,
        },
        AccessScopeRecord {
            id: "2".to_owned(),
            name: "cluster-analyst".to_owned(),
            description: "analyst access to clusters in acs instance".to_owned(),
            rules: Some(ScopeRules {
                included_clusters: vec!["clusterA".to_owned(), "clusterB".to_owned()],
                included_namespaces: vec![],
            }),
        },
        AccessScopeRecord {
            id: "3".to_owned(),
            name: "service-vuln-admin".to_owned(),
            description: "vuln-admin access to service namespaces in acs instance".to_owned(),
            rules: Some(ScopeRules {
                included_clusters: vec![],
                included_namespaces: vec![
                    NamespaceRef::new("stage-cluster", "serviceA-stage"),
                    NamespaceRef::new("prod-cluster", "serviceA-prod"),
                ],
            }),
        },
    ]
}

pub(crate) fn api_permission_sets() -> Vec<PermissionSetRecord> {
    [("1", "Admin"), ("2", "Analyst"), ("3", "Vulnerability Management Admin")]
        .iter()
        .map(|(id, name)| PermissionSetRecord {
            id: id.to_string(),
            name: name.to_string(),
        })
        .collect()
}
