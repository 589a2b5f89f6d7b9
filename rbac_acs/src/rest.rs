//! Rest API interface for ACS
//!

use crate::{consts, creds::AcsCredentials};

use anyhow::{Context, Result};
use rbac_core::logging::debug;
use reqwest::Method;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Default)]
pub(crate) struct AcsRestConfig {
    /// Enable/disable retry logic.
    pub(crate) retry: bool,
}

/// Wrapper struct for http functionality
pub(crate) struct AcsRestClient {
    /// The credentials used to authenticate into ACS.
    credentials: AcsCredentials,
    http_client: ClientWithMiddleware,
}

impl AcsRestClient {
    pub(crate) fn new(credentials: AcsCredentials, config: AcsRestConfig) -> Result<Self> {
        credentials.validate()?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let mut client_builder = ClientBuilder::new(reqwest::Client::new());
        if config.retry {
            client_builder =
                client_builder.with(RetryTransientMiddleware::new_with_policy(retry_policy))
        }
        let client = client_builder.build();
        Ok(Self {
            credentials,
            http_client: client,
        })
    }

    /// GET an endpoint and deserialize the body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.request(Method::GET, endpoint)
            .send()
            .await
            .context("couldn't send request")?
            .error_for_status()?
            .json::<T>()
            .await
            .with_context(|| format!("couldn't parse response of GET {endpoint}"))
    }

    /// Send a body, dropping whatever comes back.
    pub(crate) async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
    ) -> Result<()> {
        self.send(method, endpoint, body).await?;
        Ok(())
    }

    /// Send a body and deserialize the response.
    pub(crate) async fn query<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        self.send(method, endpoint, body)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("couldn't parse response of {endpoint}"))
    }

    /// DELETE an endpoint.
    pub(crate) async fn delete(&self, endpoint: &str) -> Result<()> {
        self.request(Method::DELETE, endpoint)
            .send()
            .await
            .context("couldn't send request")?
            .error_for_status()?;
        Ok(())
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        debug!("{method} {endpoint}");
        let response = self
            .request(method, endpoint)
            .json(body)
            .send()
            .await
            .context("couldn't send request")?
            .error_for_status()?;
        Ok(response)
    }

    fn get_url(&self, endpoint: &str) -> String {
        format![
            "{}/v1/{}",
            self.credentials.url.trim_end_matches('/'),
            endpoint
        ]
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.http_client
            .request(method, self.get_url(endpoint))
            .header(
                consts::AUTH_HEADER,
                format!["Bearer {}", self.credentials.token],
            )
            .header(consts::ACCEPT_HEADER, "application/json")
            .header(consts::USER_AGENT_HEADER, consts::USER_AGENT)
    }
}
