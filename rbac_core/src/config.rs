//! Project configuration
//!
use std::fs;
use std::path::{Path, PathBuf};
use std::{collections::BTreeMap, collections::HashMap, fmt::Display};

use anyhow::{anyhow, Context, Result};

use log::debug;
use serde::{Deserialize, Serialize};
use yaml_peg::serde as yaml;

/// Default file name of the project config.
pub const CONFIG_FILE: &str = "rbac_config.yaml";

/// The user-defined name of a platform instance.
#[derive(Clone, Deserialize, Debug, Hash, PartialEq, Eq, Default, PartialOrd, Ord, Serialize)]
pub struct InstanceName(pub String);

impl Display for InstanceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Struct representing the rbac_config.yaml file.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct RbacConfig {
    version: String,
    name: String,
    /// All platform instances to reconcile.
    pub instances: BTreeMap<InstanceName, InstanceConfig>,
}

/// Config for one platform instance.
#[derive(Clone, Deserialize, Serialize, Default, Debug, PartialEq, Eq)]
pub struct InstanceConfig {
    /// Base url of the platform API, e.g. `https://central.example.com`
    pub url: String,
    /// The auth provider whose groups are managed
    pub auth_provider_id: String,
    /// Path to the desired state (yaml or json), relative to the config file
    pub desired_state: PathBuf,
}

impl RbacConfig {
    /// Read the config file. Relative `desired_state` paths are resolved
    /// against the directory of the config file.
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<RbacConfig> {
        let config_raw = fs::read_to_string(&path).context("Reading file")?;
        let mut config = Self::from_yaml(&config_raw)?;
        if let Some(dir) = path.as_ref().parent() {
            for instance in config.instances.values_mut() {
                if instance.desired_state.is_relative() {
                    instance.desired_state = dir.join(&instance.desired_state);
                }
            }
        }
        Ok(config)
    }

    /// Parse a config from yaml.
    pub fn from_yaml(raw: &str) -> Result<RbacConfig> {
        let mut config = yaml::from_str::<RbacConfig>(raw)
            .map_err(|e| anyhow!("{e}"))
            .context("Deserializing config")?;
        let config = config.pop().ok_or_else(|| anyhow!["config file is empty"])?;
        config.validate()?;
        Ok(config)
    }

    /// Get the name
    pub fn get_name(&self) -> String {
        self.name.to_owned()
    }

    fn validate(&self) -> Result<()> {
        for (name, instance) in &self.instances {
            if instance.url.is_empty() || instance.auth_provider_id.is_empty() {
                return Err(anyhow!(
                    "instance `{name}` needs both a url and an auth_provider_id"
                ));
            }
        }
        Ok(())
    }
}

/// Alias for HashMap to hold credentials information.
pub type CredentialsMap = HashMap<String, String>;

/// Fetch the credentials for every instance from a yaml file.
pub fn fetch_credentials(path: PathBuf) -> Result<HashMap<String, CredentialsMap>> {
    debug!("Trying to read credentials from {:?}", path);
    let credentials_raw = fs::read_to_string(path)?;
    let mut config = yaml::from_str::<HashMap<String, CredentialsMap>>(&credentials_raw)
        .map_err(|e| anyhow!("{e}"))?;

    config
        .pop()
        .ok_or_else(|| anyhow!["failed to generate credentials"])
}

/// Where credentials live unless told otherwise: `~/.rbac/credentials.yaml`.
pub fn default_credentials_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".rbac")
        .join("credentials.yaml")
}
