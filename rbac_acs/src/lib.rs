//! ACS Gateway
//!
//! Everything needed for connection and interaction with the ACS (StackRox)
//! Central API.
//!
//! ```
//! use rbac_core::config::{CredentialsMap, InstanceConfig};
//! use rbac_acs::AcsClient;
//!
//! let config = InstanceConfig {
//!     url: "https://central.example.com".to_owned(),
//!     ..Default::default()
//! };
//! let mut credentials = CredentialsMap::new();
//! credentials.insert("token".to_owned(), "my-token".to_owned());
//! let client = AcsClient::new(&config, &credentials).unwrap();
//! ```

#![deny(missing_docs)]

mod consts;
mod creds;
mod entry_types;
mod rest;

use std::collections::HashSet;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Method;

use rbac_core::{
    config::{CredentialsMap, InstanceConfig},
    gateway::{
        AccessScopeRecord, Gateway, GroupAdd, GroupRecord, PermissionSetRecord, RoleRecord,
    },
    logging::debug,
    NamespaceRef,
};

use entry_types::{
    AccessScope, AccessScopeBody, AccessScopesResponse, Group, GroupBatchBody, GroupsResponse,
    PermissionSet, PermissionSetsResponse, RoleBody, RolesResponse, RulesBody,
};
use rest::{AcsRestClient, AcsRestConfig};

/// Client for one ACS Central instance.
pub struct AcsClient {
    rest_client: AcsRestClient,
}

impl AcsClient {
    /// Validates the configs and bootstraps a client.
    ///
    /// The token comes from the credentials. The url comes from the instance
    /// config, unless the credentials override it.
    pub fn new(config: &InstanceConfig, credentials: &CredentialsMap) -> Result<Self> {
        let mut creds = creds::AcsCredentials {
            url: config.url.to_owned(),
            ..Default::default()
        };
        let mut required_fields: HashSet<_> = vec!["token"].into_iter().collect();

        for (k, v) in credentials.iter() {
            match k.as_ref() {
                "token" => creds.token = v.to_string(),
                "url" => creds.url = v.to_string(),
                _ => (),
            }
            required_fields.remove::<str>(k);
        }

        if !required_fields.is_empty() {
            return Err(anyhow![
                "ACS credentials missing required fields: {:#?}",
                required_fields
            ]);
        }

        Ok(AcsClient {
            rest_client: AcsRestClient::new(creds, AcsRestConfig { retry: true })?,
        })
    }

    async fn batch_groups(&self, body: GroupBatchBody) -> Result<()> {
        debug!(
            "group batch: {} previous, {} required",
            body.previous_groups.len(),
            body.required_groups.len()
        );
        self.rest_client
            .execute(Method::POST, "groupsbatch", &body)
            .await
    }
}

#[async_trait]
impl Gateway for AcsClient {
    async fn get_roles(&self) -> Result<Vec<RoleRecord>> {
        let res: RolesResponse = self.rest_client.get("roles").await?;
        Ok(res.roles.into_iter().map(Into::into).collect())
    }

    async fn get_groups(&self) -> Result<Vec<GroupRecord>> {
        let res: GroupsResponse = self.rest_client.get("groups").await?;
        Ok(res.groups.into_iter().map(Into::into).collect())
    }

    async fn get_access_scopes(&self) -> Result<Vec<AccessScopeRecord>> {
        let res: AccessScopesResponse = self.rest_client.get("simpleaccessscopes").await?;
        Ok(res.access_scopes.into_iter().map(Into::into).collect())
    }

    async fn get_permission_sets(&self) -> Result<Vec<PermissionSetRecord>> {
        let res: PermissionSetsResponse = self.rest_client.get("permissionsets").await?;
        Ok(res.permission_sets.into_iter().map(Into::into).collect())
    }

    async fn get_access_scope_by_id(&self, id: &str) -> Result<AccessScopeRecord> {
        let res: AccessScope = self
            .rest_client
            .get(&format!("simpleaccessscopes/{id}"))
            .await?;
        Ok(res.into())
    }

    async fn get_permission_set_by_id(&self, id: &str) -> Result<PermissionSetRecord> {
        let res: PermissionSet = self
            .rest_client
            .get(&format!("permissionsets/{id}"))
            .await?;
        Ok(res.into())
    }

    async fn create_role(
        &self,
        name: &str,
        description: &str,
        permission_set_id: &str,
        access_scope_id: &str,
    ) -> Result<()> {
        self.rest_client
            .execute(
                Method::POST,
                &format!("roles/{name}"),
                &RoleBody {
                    name,
                    description,
                    permission_set_id,
                    access_scope_id,
                },
            )
            .await
            .with_context(|| format!("creating role {name}"))
    }

    async fn create_access_scope(
        &self,
        name: &str,
        description: &str,
        clusters: &[String],
        namespaces: &[NamespaceRef],
    ) -> Result<String> {
        let res: AccessScope = self
            .rest_client
            .query(
                Method::POST,
                "simpleaccessscopes",
                &AccessScopeBody {
                    id: "",
                    name,
                    description,
                    rules: RulesBody {
                        included_clusters: clusters,
                        included_namespaces: namespaces,
                    },
                },
            )
            .await
            .with_context(|| format!("creating access scope {name}"))?;
        if res.id.is_empty() {
            return Err(anyhow!("no id returned for new access scope {name}"));
        }
        Ok(res.id)
    }

    async fn create_group_batch(&self, additions: &[GroupAdd]) -> Result<()> {
        self.batch_groups(GroupBatchBody {
            previous_groups: vec![],
            required_groups: additions.iter().map(Group::from).collect(),
        })
        .await
        .context("creating groups")
    }

    async fn update_role(
        &self,
        name: &str,
        description: &str,
        permission_set_id: &str,
        access_scope_id: &str,
    ) -> Result<()> {
        self.rest_client
            .execute(
                Method::PUT,
                &format!("roles/{name}"),
                &RoleBody {
                    name,
                    description,
                    permission_set_id,
                    access_scope_id,
                },
            )
            .await
            .with_context(|| format!("updating role {name}"))
    }

    async fn update_access_scope(
        &self,
        id: &str,
        name: &str,
        description: &str,
        clusters: &[String],
        namespaces: &[NamespaceRef],
    ) -> Result<()> {
        self.rest_client
            .execute(
                Method::PUT,
                &format!("simpleaccessscopes/{id}"),
                &AccessScopeBody {
                    id,
                    name,
                    description,
                    rules: RulesBody {
                        included_clusters: clusters,
                        included_namespaces: namespaces,
                    },
                },
            )
            .await
            .with_context(|| format!("updating access scope {name}"))
    }

    async fn update_group_batch(
        &self,
        removals: &[GroupRecord],
        additions: &[GroupAdd],
    ) -> Result<()> {
        self.batch_groups(GroupBatchBody {
            previous_groups: removals.iter().map(Group::from).collect(),
            required_groups: additions.iter().map(Group::from).collect(),
        })
        .await
        .context("updating groups")
    }

    async fn delete_role(&self, name: &str) -> Result<()> {
        self.rest_client
            .delete(&format!("roles/{name}"))
            .await
            .with_context(|| format!("deleting role {name}"))
    }

    async fn delete_group_batch(&self, removals: &[GroupRecord]) -> Result<()> {
        self.batch_groups(GroupBatchBody {
            previous_groups: removals.iter().map(Group::from).collect(),
            required_groups: vec![],
        })
        .await
        .context("deleting groups")
    }

    async fn delete_access_scope(&self, id: &str) -> Result<()> {
        self.rest_client
            .delete(&format!("simpleaccessscopes/{id}"))
            .await
            .with_context(|| format!("deleting access scope {id}"))
    }
}
