use crate::config::Jenkins;
use crate::error::RelayError;
use crate::secret_string::SecretString;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    DockerHub,
    Gcr,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::DockerHub => "dockerhub",
            Provider::Gcr => "gcr",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider independent description of a pushed image, handed to the build system
/// together with the untouched webhook body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTrigger {
    pub provider: Provider,
    pub repository_name: String,
    pub repository_scope: String,
    pub tag_or_digest: String,
    pub raw_payload: Vec<u8>,
}

/// Downstream build system. Implementations must not retain the trigger past the call.
#[async_trait]
pub trait Trigger: Send + Sync {
    async fn trigger(&self, trigger: CanonicalTrigger) -> Result<()>;
}

/// Hands the trigger to the collaborator, failing once `timeout` elapses.
pub async fn dispatch(
    target: &dyn Trigger,
    trigger: CanonicalTrigger,
    timeout: Duration,
) -> Result<(), RelayError> {
    let provider = trigger.provider;
    let repository = format!("{}/{}", trigger.repository_scope, trigger.repository_name);
    let tag_or_digest = trigger.tag_or_digest.clone();

    match tokio::time::timeout(timeout, target.trigger(trigger)).await {
        Ok(Ok(())) => {
            info!(
                %provider,
                %repository,
                %tag_or_digest,
                "Triggered build"
            );
            Ok(())
        }
        Ok(Err(e)) => Err(RelayError::DispatchFailed(format!("{:#}", e))),
        Err(_) => Err(RelayError::DispatchFailed(format!(
            "trigger did not answer within {}s",
            timeout.as_secs()
        ))),
    }
}

/// Starts a parameterized Jenkins job through its remote access API.
pub struct JenkinsTrigger {
    client: Client,
    build_url: String,
    username: Option<String>,
    api_token: Option<SecretString>,
    build_token: Option<SecretString>,
}

impl JenkinsTrigger {
    pub fn new(config: &Jenkins, client: Client) -> Self {
        let build_url = format!(
            "{}/job/{}/buildWithParameters",
            config.url.trim_end_matches('/'),
            config.job
        );
        info!("Builds will be triggered at {}", build_url);
        JenkinsTrigger {
            client,
            build_url,
            username: config.username.clone(),
            api_token: config.api_token.clone(),
            build_token: config.build_token.clone(),
        }
    }
}

#[async_trait]
impl Trigger for JenkinsTrigger {
    async fn trigger(&self, trigger: CanonicalTrigger) -> Result<()> {
        let raw_payload = String::from_utf8_lossy(&trigger.raw_payload);
        let params = [
            ("PROVIDER", trigger.provider.as_str()),
            ("REPOSITORY_NAME", trigger.repository_name.as_str()),
            ("REPOSITORY_SCOPE", trigger.repository_scope.as_str()),
            ("TAG_OR_DIGEST", trigger.tag_or_digest.as_str()),
            ("RAW_PAYLOAD", &*raw_payload),
        ];

        let mut request = self.client.post(&self.build_url).form(&params);
        if let Some(build_token) = &self.build_token {
            request = request.query(&[("token", build_token.expose_secret())]);
        }
        if let Some(username) = &self.username {
            request = request.basic_auth(
                username,
                self.api_token.as_ref().map(|t| t.expose_secret()),
            );
        }

        debug!("Posting build parameters to {}", self.build_url);
        let response = request
            .send()
            .await
            .context("Failed to send build request to Jenkins")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Jenkins returned error status {} while queueing a build",
                response.status()
            );
        }
        Ok(())
    }
}
