//! Plan or apply the changes for every selected instance

use std::{collections::HashMap, time::Instant};

use anyhow::{anyhow, bail, Result};
use futures::{stream, StreamExt};

use rbac_acs::AcsClient;
use rbac_core::{
    config::{default_credentials_path, CredentialsMap, InstanceConfig, InstanceName},
    fetch_credentials,
    logging::{debug, error, info, warn},
    run_integration, Diff, RbacConfig, RbacError, RbacQueryData,
};

use crate::cmd::ReconcileArgs;

pub(super) async fn reconcile_instances(args: &ReconcileArgs, dry_run: bool) -> Result<()> {
    let config = RbacConfig::read_from_file(&args.config).map_err(|e| {
        anyhow!(
            "unable to read {} - make sure you are in a directory with a reconciler config: {e:#}",
            args.config.display()
        )
    })?;
    let credentials_path = args
        .credentials
        .to_owned()
        .unwrap_or_else(default_credentials_path);
    let creds = fetch_credentials(credentials_path.to_owned()).map_err(|e| {
        anyhow!(
            "unable to read credentials from {}: {e:#}",
            credentials_path.display()
        )
    })?;

    let selected = select_instances(&config, &args.instances)?;
    if selected.is_empty() {
        warn!("no instances configured in {}", args.config.display());
        return Ok(());
    }
    debug!(
        "reconciling {} instance(s), {} at a time",
        selected.len(),
        args.thread_pool_size
    );

    let creds = &creds;
    let mut results = stream::iter(selected)
        .map(|(name, instance)| async move {
            let res = reconcile_instance(name, instance, creds, dry_run).await;
            (name, res)
        })
        .buffer_unordered(args.thread_pool_size.max(1))
        .collect::<Vec<_>>()
        .await;
    results.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut failed = vec![];
    for (name, res) in results {
        match res {
            Ok(diffs) => println!("{}", format_plan(name, &diffs)),
            Err(e) => {
                error!("{name}: {}", describe_failure(&e));
                failed.push(name.to_string());
            }
        }
    }
    if !failed.is_empty() {
        bail!("reconciliation failed for {}", failed.join(", "));
    }
    Ok(())
}

/// Pick the configured instances to work on. Asking for an instance that
/// isn't configured is an error.
fn select_instances<'a>(
    config: &'a RbacConfig,
    filter: &Option<Vec<String>>,
) -> Result<Vec<(&'a InstanceName, &'a InstanceConfig)>> {
    let Some(names) = filter else {
        return Ok(config.instances.iter().collect());
    };
    for name in names {
        if !config.instances.contains_key(&InstanceName(name.to_owned())) {
            bail!("no instance called {name} in the config");
        }
    }
    Ok(config
        .instances
        .iter()
        .filter(|(name, _)| names.contains(&name.0))
        .collect())
}

async fn reconcile_instance(
    name: &InstanceName,
    instance: &InstanceConfig,
    creds: &HashMap<String, CredentialsMap>,
    dry_run: bool,
) -> Result<Vec<Diff>> {
    let instance_creds = creds
        .get(&name.0)
        .ok_or_else(|| anyhow!("no credentials for instance {name}"))?;
    let query_data = RbacQueryData::read_from_file(&instance.desired_state)?;
    let client = AcsClient::new(instance, instance_creds)?;

    info!("reconciling {name}");
    let now = Instant::now();
    let diffs = run_integration(&query_data, &client, &instance.auth_provider_id, dry_run).await?;
    info!("{name} took {:.1} seconds", now.elapsed().as_secs_f32());
    Ok(diffs)
}

/// Point configuration mistakes at the desired state rather than the platform.
fn describe_failure(e: &anyhow::Error) -> String {
    match e.downcast_ref::<RbacError>() {
        Some(rbac_error) if rbac_error.is_configuration() => {
            format!("fix the desired state and try again: {e:#}")
        }
        _ => format!("{e:#}"),
    }
}

fn format_plan(name: &InstanceName, diffs: &[Diff]) -> String {
    let mut text = format!("{name}:\n");
    if diffs.is_empty() {
        text += "  No changes planned\n";
    }
    for diff in diffs {
        text += &textwrap::indent(&diff.to_string(), "  ");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    use maplit::hashmap;
    use rbac_core::{AssignmentPair, DiffDetails};

    fn config() -> RbacConfig {
        RbacConfig::from_yaml(
            r#"
version: "0.0.1"
name: app-sre
instances:
  acs-stage:
    url: https://central.stage.example.com
    auth_provider_id: stage-provider
    desired_state: stage.yaml
  acs-prod:
    url: https://central.prod.example.com
    auth_provider_id: prod-provider
    desired_state: prod.yaml
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_all_instances_selected_by_default() {
        let config = config();
        let selected = select_instances(&config, &None).unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_instance_filter() {
        let config = config();
        let selected = select_instances(&config, &Some(vec!["acs-prod".to_owned()])).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0, &InstanceName("acs-prod".to_owned()));
        assert!(select_instances(&config, &Some(vec!["acs-dev".to_owned()])).is_err());
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_the_instance() {
        let config = config();
        let name = InstanceName("acs-stage".to_owned());
        let creds = hashmap! {
            "acs-prod".to_owned() => hashmap! {"token".to_owned() => "token".to_owned()},
        };
        let res = reconcile_instance(&name, &config.instances[&name], &creds, true).await;
        assert!(res
            .unwrap_err()
            .to_string()
            .contains("no credentials for instance acs-stage"));
    }

    #[test]
    fn test_configuration_failures_point_at_desired_state() {
        let config_error = anyhow::Error::from(RbacError::InvalidConfig("bad grant".to_owned()))
            .context("building desired state");
        assert!(describe_failure(&config_error).starts_with("fix the desired state"));

        let fetch_error = anyhow::Error::from(RbacError::Unresolved {
            kind: "access scope",
            name: "Unrestricted".to_owned(),
        });
        assert_eq!(
            describe_failure(&fetch_error),
            "unable to resolve access scope `Unrestricted`"
        );
    }

    #[test]
    fn test_plan_output() {
        colored::control::set_override(false);
        let name = InstanceName("acs-stage".to_owned());
        assert_eq!(
            format_plan(&name, &[]),
            "acs-stage:\n  No changes planned\n"
        );

        let diffs = vec![Diff {
            role_name: "viewer".to_owned(),
            details: DiffDetails::RemoveRole {
                assignments: vec![AssignmentPair::email("foo@example.com")],
                deleted_access_scope: None,
            },
        }];
        assert_eq!(
            format_plan(&name, &diffs),
            "acs-stage:\n  - role: viewer\n    assignments:\n      - email=foo@example.com\n"
        );
    }
}
