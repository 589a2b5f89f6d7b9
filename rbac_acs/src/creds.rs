use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Credentials for authenticating to the platform API.
///
/// The token is an API token with write access to roles, groups, access
/// scopes and permission sets.
#[derive(Deserialize, Default)]
pub(crate) struct AcsCredentials {
    pub(crate) url: String,
    pub(crate) token: String,
}

impl std::fmt::Debug for AcsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcsCredentials")
            .field("url", &self.url)
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

impl AcsCredentials {
    /// Perform simple field validation to catch bad input.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.url.is_empty() || self.token.is_empty() {
            return Err(anyhow!(
                "Credentials are missing. Please make sure your credentials file is correct. Credentials received: {:#?}", self
            ));
        }
        Ok(())
    }
}
